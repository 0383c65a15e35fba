pub mod calendar;

pub use calendar::{AccessTokenSource, OAuthCalendarClient, SharedCalendarClient, StaticAccessToken};
