pub mod config;
pub mod errors;
pub mod time;

pub use errors::{AppError, AppResult};
