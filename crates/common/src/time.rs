use chrono::Utc;

pub fn timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Source of Unix timestamps in seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        timestamp()
    }
}
