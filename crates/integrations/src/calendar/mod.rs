mod base;
mod date;
mod error;
mod models;
mod oauth_client;
mod pagination;
mod shared_client;

pub use error::GoogleCalendarError;
pub use oauth_client::OAuthCalendarClient;
pub use shared_client::{AccessTokenSource, SharedCalendarClient, StaticAccessToken};
