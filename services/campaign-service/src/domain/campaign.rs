use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Active,
    Cancelled,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Active => "active",
            CampaignStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown campaign status: {0}")]
pub struct ParseCampaignStatusError(pub String);

impl FromStr for CampaignStatus {
    type Err = ParseCampaignStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(CampaignStatus::Active),
            "cancelled" => Ok(CampaignStatus::Cancelled),
            other => Err(ParseCampaignStatusError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Read,
    Contribute,
    Manage,
}

/// Access a campaign asks for on one stream or tag of the requestee's data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Permission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub default_name: String,
    pub level: PermissionLevel,
}

impl Permission {
    pub fn check(&self) -> Result<(), String> {
        match (&self.stream_id, &self.tag) {
            (Some(_), Some(_)) => return Err("permission must name a streamId or a tag, not both".to_string()),
            (None, None) => return Err("permission must name a streamId or a tag".to_string()),
            (Some(s), None) | (None, Some(s)) if s.trim().is_empty() => {
                return Err("permission target must not be empty".to_string())
            }
            _ => {}
        }
        if self.default_name.trim().is_empty() {
            return Err("permission defaultName must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: String,
    pub title: String,
    pub description: String,
    pub permissions: Vec<Permission>,
    pub creator_id: String,
    pub status: CampaignStatus,
    pub created: i64,
    pub modified: i64,
}

impl Campaign {
    pub fn new(
        title: String,
        description: String,
        permissions: Vec<Permission>,
        creator_id: String,
        now: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            description,
            permissions,
            creator_id,
            status: CampaignStatus::Active,
            created: now,
            modified: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == CampaignStatus::Active
    }
}
