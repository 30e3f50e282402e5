use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: Option<String>,
    pub local_id: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub pryv_username: Option<String>,
    pub pryv_id: Option<String>,
    pub created: i64,
}

impl User {
    /// Builds a user from whichever identities are given. `None` when
    /// neither is present.
    pub fn new(
        local: Option<(String, String)>,
        pryv_username: Option<String>,
        now: i64,
    ) -> Option<Self> {
        if local.is_none() && pryv_username.is_none() {
            return None;
        }
        let (username, password_hash) = match local {
            Some((username, hash)) => (Some(username), Some(hash)),
            None => (None, None),
        };

        Some(Self {
            id: Uuid::new_v4().to_string(),
            local_id: username.as_ref().map(|_| Uuid::new_v4().to_string()),
            username,
            password_hash,
            pryv_id: pryv_username.as_ref().map(|_| Uuid::new_v4().to_string()),
            pryv_username,
            created: now,
        })
    }

    pub fn is_linked(&self) -> bool {
        self.username.is_some() && self.pryv_username.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPublic {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pryv_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pryv_id: Option<String>,
}

impl From<User> for UserPublic {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            local_id: user.local_id,
            pryv_username: user.pryv_username,
            pryv_id: user.pryv_id,
        }
    }
}

/// Pryv usernames are the first DNS label of the account's API host, so only
/// lowercase letters, digits and inner `-` are accepted.
pub fn is_valid_pryv_username(name: &str) -> bool {
    (1..=63).contains(&name.len())
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        && !name.starts_with('-')
        && !name.ends_with('-')
}

/// How a request names another user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserRef {
    Id(String),
    Username(String),
    PryvUsername(String),
}

impl std::fmt::Display for UserRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRef::Id(id) => write!(f, "id {}", id),
            UserRef::Username(name) => write!(f, "username {}", name),
            UserRef::PryvUsername(name) => write!(f, "Pryv username {}", name),
        }
    }
}
