use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Created,
    Seen,
    Accepted,
    Cancelled,
    Refused,
}

impl InvitationStatus {
    pub const ALL: [InvitationStatus; 5] = [
        InvitationStatus::Created,
        InvitationStatus::Seen,
        InvitationStatus::Accepted,
        InvitationStatus::Cancelled,
        InvitationStatus::Refused,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Created => "created",
            InvitationStatus::Seen => "seen",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Cancelled => "cancelled",
            InvitationStatus::Refused => "refused",
        }
    }

    /// Nothing leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, InvitationStatus::Cancelled | InvitationStatus::Refused)
    }

    pub fn valid_transitions(&self) -> &'static [InvitationStatus] {
        use InvitationStatus::*;
        match self {
            Created => &[Seen, Accepted, Cancelled, Refused],
            Seen => &[Accepted, Cancelled, Refused],
            Accepted => &[Cancelled, Refused],
            Cancelled => &[],
            Refused => &[],
        }
    }
}

impl fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown invitation status `{0}`")]
pub struct ParseStatusError(pub String);

impl FromStr for InvitationStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(InvitationStatus::Created),
            "seen" => Ok(InvitationStatus::Seen),
            "accepted" => Ok(InvitationStatus::Accepted),
            "cancelled" => Ok(InvitationStatus::Cancelled),
            "refused" => Ok(InvitationStatus::Refused),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invitation cannot go from {from} to {to}")]
pub struct InvalidTransition {
    pub from: InvitationStatus,
    pub to: InvitationStatus,
}

/// Decides whether `current -> requested` is a legal status change.
pub fn validate_transition(
    current: InvitationStatus,
    requested: InvitationStatus,
) -> Result<InvitationStatus, InvalidTransition> {
    if current.valid_transitions().contains(&requested) {
        Ok(requested)
    } else {
        Err(InvalidTransition {
            from: current,
            to: requested,
        })
    }
}

/// The status changes callers may ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionRequest {
    Seen,
    Accept { access_token: Option<String> },
    Refuse,
    /// Issued by campaign cancellation only.
    Cancel,
}

impl TransitionRequest {
    pub fn target(&self) -> InvitationStatus {
        match self {
            TransitionRequest::Seen => InvitationStatus::Seen,
            TransitionRequest::Accept { .. } => InvitationStatus::Accepted,
            TransitionRequest::Refuse => InvitationStatus::Refused,
            TransitionRequest::Cancel => InvitationStatus::Cancelled,
        }
    }
}

/// One stored version of an invitation. `id` is the logical identifier
/// shared by every version; `(id, version)` identifies the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: String,
    pub version: i64,
    pub campaign_id: String,
    pub requester_id: String,
    pub requestee_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    pub status: InvitationStatus,
    pub created: i64,
    pub modified: i64,
    /// Version that replaced this one; `None` on the live record.
    pub superseded_by: Option<i64>,
}

impl Invitation {
    pub fn new(
        campaign_id: String,
        requester_id: String,
        requestee_id: String,
        access_token: Option<String>,
        now: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            version: 1,
            campaign_id,
            requester_id,
            requestee_id,
            access_token,
            status: InvitationStatus::Created,
            created: now,
            modified: now,
            superseded_by: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.superseded_by.is_none()
    }

    /// Builds the record that will replace `self`. Everything but status,
    /// modification time and (optionally) the access token carries over.
    pub fn next_version(&self, status: InvitationStatus, access_token: Option<String>, now: i64) -> Self {
        Self {
            id: self.id.clone(),
            version: self.version + 1,
            campaign_id: self.campaign_id.clone(),
            requester_id: self.requester_id.clone(),
            requestee_id: self.requestee_id.clone(),
            access_token: access_token.or_else(|| self.access_token.clone()),
            status,
            created: self.created,
            modified: now.max(self.modified),
            superseded_by: None,
        }
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.requester_id == user_id || self.requestee_id == user_id
    }
}

/// The live record of one invitation together with its superseded versions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvitationView {
    #[serde(flatten)]
    pub latest: Invitation,
    pub history: Vec<Invitation>,
}

impl InvitationView {
    /// Splits the versions of one logical invitation into live record and
    /// history (oldest first). Returns `None` for an empty slice.
    pub fn from_versions(mut versions: Vec<Invitation>) -> Option<Self> {
        versions.sort_by_key(|v| v.version);
        let live_index = versions
            .iter()
            .position(|v| v.is_live())
            .unwrap_or(versions.len().checked_sub(1)?);
        let latest = versions.remove(live_index);

        Some(Self {
            latest,
            history: versions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use InvitationStatus::*;

    #[test]
    fn test_transition_table() {
        // (current, requested, legal)
        let cases = [
            (Created, Created, false),
            (Created, Seen, true),
            (Created, Accepted, true),
            (Created, Cancelled, true),
            (Created, Refused, true),
            (Seen, Created, false),
            (Seen, Seen, false),
            (Seen, Accepted, true),
            (Seen, Cancelled, true),
            (Seen, Refused, true),
            (Accepted, Created, false),
            (Accepted, Seen, false),
            (Accepted, Accepted, false),
            (Accepted, Cancelled, true),
            (Accepted, Refused, true),
            (Cancelled, Created, false),
            (Cancelled, Seen, false),
            (Cancelled, Accepted, false),
            (Cancelled, Cancelled, false),
            (Cancelled, Refused, false),
            (Refused, Created, false),
            (Refused, Seen, false),
            (Refused, Accepted, false),
            (Refused, Cancelled, false),
            (Refused, Refused, false),
        ];
        assert_eq!(cases.len(), 25);

        for (current, requested, legal) in cases {
            let result = validate_transition(current, requested);
            if legal {
                assert_eq!(result, Ok(requested), "{} -> {} should be legal", current, requested);
            } else {
                assert_eq!(
                    result,
                    Err(InvalidTransition { from: current, to: requested }),
                    "{} -> {} should be rejected",
                    current,
                    requested
                );
            }
        }
    }

    #[test]
    fn test_same_status_never_legal() {
        for status in InvitationStatus::ALL {
            assert!(validate_transition(status, status).is_err());
        }
    }

    #[test]
    fn test_terminal_states_have_no_successors() {
        for status in InvitationStatus::ALL {
            assert_eq!(status.is_terminal(), status.valid_transitions().is_empty());
        }
    }

    #[test]
    fn test_created_is_never_a_target() {
        for status in InvitationStatus::ALL {
            assert!(!status.valid_transitions().contains(&Created));
        }
    }

    #[test]
    fn test_status_parse_roundtrip() {
        for status in InvitationStatus::ALL {
            assert_eq!(status.as_str().parse::<InvitationStatus>().unwrap(), status);
        }
        assert!("pending".parse::<InvitationStatus>().is_err());
    }

    #[test]
    fn test_next_version_preserves_identity() {
        let first = Invitation::new("c1".into(), "alice".into(), "bob".into(), Some("tok".into()), 100);
        let second = first.next_version(Accepted, None, 150);

        assert_eq!(second.id, first.id);
        assert_eq!(second.version, 2);
        assert_eq!(second.created, 100);
        assert_eq!(second.modified, 150);
        assert_eq!(second.campaign_id, "c1");
        assert_eq!(second.requester_id, "alice");
        assert_eq!(second.requestee_id, "bob");
        assert_eq!(second.access_token.as_deref(), Some("tok"));
        assert!(second.is_live());
    }

    #[test]
    fn test_next_version_never_moves_modified_backwards() {
        let first = Invitation::new("c1".into(), "alice".into(), "bob".into(), None, 100);
        let second = first.next_version(Refused, Some("new".into()), 90);

        assert_eq!(second.modified, 100);
        assert_eq!(second.access_token.as_deref(), Some("new"));
    }

    #[test]
    fn test_view_splits_live_from_history() {
        let mut v1 = Invitation::new("c1".into(), "alice".into(), "bob".into(), None, 100);
        let mut v2 = v1.next_version(Accepted, None, 110);
        let v3 = v2.next_version(Refused, None, 120);
        v1.superseded_by = Some(2);
        v2.superseded_by = Some(3);

        let view = InvitationView::from_versions(vec![v3.clone(), v1.clone(), v2.clone()]).unwrap();

        assert_eq!(view.latest, v3);
        assert_eq!(view.history, vec![v1, v2]);
        assert!(InvitationView::from_versions(vec![]).is_none());
    }

    #[test]
    fn test_view_serializes_flat() {
        let live = Invitation::new("c1".into(), "alice".into(), "bob".into(), None, 100);
        let view = InvitationView::from_versions(vec![live.clone()]).unwrap();
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["id"], live.id);
        assert_eq!(json["status"], "created");
        assert_eq!(json["campaignId"], "c1");
        assert!(json["supersededBy"].is_null());
        assert_eq!(json["history"].as_array().unwrap().len(), 0);
    }
}
