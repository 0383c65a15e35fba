mod calendar;
mod channel;
mod event;
mod recurring_event;
mod sync_history;

pub use calendar::{Calendar, NewCalendar};
pub use channel::Channel;
pub use event::{Event, EventStatus};
pub use recurring_event::RecurringEvent;
pub use sync_history::{SyncFutureInstanceHistory, SyncHistory};
