mod conversions;
mod store;
mod transaction;

pub use store::PostgresStore;
pub use transaction::PgStoreTransaction;
