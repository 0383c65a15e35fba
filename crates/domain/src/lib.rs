pub mod cache;
pub mod calendar_client;
pub mod cipher;
pub mod clock;
pub mod entities;
pub mod store;
pub mod sync_engine;
pub mod watch_manager;

pub use cache::RefreshTokenCache;
pub use calendar_client::{
    CalendarClient, CalendarClientError, CalendarClientResult, EventListing, EventPage,
    WatchRegistration,
};
pub use cipher::{CipherError, RefreshTokenCipher};
pub use clock::{Clock, FixedClock, SystemClock};
pub use entities::*;
pub use store::{RefreshTokenResolver, Store, StoreResult, StoreTransaction};
pub use sync_engine::{SyncEngine, SyncOutcome};
pub use watch_manager::{derive_channel_id, WatchManager};
