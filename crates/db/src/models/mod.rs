mod calendar;
mod channel;
mod event;
mod recurring_event;
mod sync_history;

pub use calendar::CalendarRow;
pub use channel::ChannelRow;
pub use event::EventRow;
pub use recurring_event::RecurringEventRow;
pub use sync_history::{SyncFutureInstanceHistoryRow, SyncHistoryRow};
