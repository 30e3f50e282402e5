use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct Access {
    pub id: String,
    pub user_id: String,
    pub created: i64,
    pub valid_until: i64,
    pub is_valid: bool,
}

impl Access {
    pub fn new(user_id: String, now: i64, ttl_seconds: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            created: now,
            valid_until: now + ttl_seconds,
            is_valid: true,
        }
    }

    pub fn is_valid_at(&self, now: i64) -> bool {
        self.is_valid && now < self.valid_until
    }
}

/// What a client receives when an access is opened.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    pub id: String,
    pub token: String,
    pub valid_until: i64,
}
