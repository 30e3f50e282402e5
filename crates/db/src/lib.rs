pub mod pool;
pub mod schema;

pub use pool::{create_pool, Backend};
pub use schema::migrate;
pub use sqlx::AnyPool as DbPool;
