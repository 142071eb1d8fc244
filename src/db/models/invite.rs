//! Trip invitation models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Invite lifecycle: pending, then accepted or declined for good
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Declined,
}

impl InviteStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InviteStatus::Pending)
    }
}

impl std::fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InviteStatus::Pending => write!(f, "pending"),
            InviteStatus::Accepted => write!(f, "accepted"),
            InviteStatus::Declined => write!(f, "declined"),
        }
    }
}

impl std::str::FromStr for InviteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InviteStatus::Pending),
            "accepted" => Ok(InviteStatus::Accepted),
            "declined" => Ok(InviteStatus::Declined),
            _ => Err(format!("Unknown invite status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invite {
    pub id: String,
    pub trip_id: String,
    pub invited_user_id: String,
    pub invited_by: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Invite {
    /// Unknown values are treated as resolved so they can never be accepted
    pub fn status_enum(&self) -> InviteStatus {
        self.status.parse().unwrap_or(InviteStatus::Declined)
    }
}

/// Invite joined with its trip and inviter for the invitee's inbox
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InviteWithDetails {
    pub id: String,
    pub trip_id: String,
    pub trip_name: String,
    pub destination: String,
    pub invited_by: String,
    pub invited_by_name: String,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InviteCreatedResponse {
    pub message: String,
    pub invite: Invite,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InviteListResponse {
    pub invites: Vec<InviteWithDetails>,
}
