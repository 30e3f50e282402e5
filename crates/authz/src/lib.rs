// Authorization helpers
pub mod jwt;
pub mod middleware;

pub use jwt::{Claims, TokenCodec};
pub use middleware::{AccessLookup, AuthMiddleware};
