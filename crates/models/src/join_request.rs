use crate::referral::OrganizationType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Account type a snapshot must carry to be eligible for a join request
pub const PLAYER_ACCOUNT_TYPE: &str = "player";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JoinRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl JoinRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinRequestStatus::Pending => "pending",
            JoinRequestStatus::Approved => "approved",
            JoinRequestStatus::Rejected => "rejected",
        }
    }

    /// Approved and rejected have no outgoing transitions
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JoinRequestStatus::Pending)
    }
}

impl std::fmt::Display for JoinRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JoinRequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(JoinRequestStatus::Pending),
            "approved" => Ok(JoinRequestStatus::Approved),
            "rejected" => Ok(JoinRequestStatus::Rejected),
            _ => Err(format!("Invalid join request status: {}", s)),
        }
    }
}

/// Player fields frozen at submission time (stored as JSON)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerData {
    pub position: Option<String>,
    pub age: Option<i32>,
    pub nationality: Option<String>,
    pub experience: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JoinRequest {
    pub id: Uuid,
    pub player_id: Uuid,
    pub player_name: String,
    pub player_email: String,
    pub player_phone: Option<String>,
    pub organization_id: Uuid,
    pub organization_type: OrganizationType,
    pub organization_name: String,
    pub referral_id: Uuid,
    pub referral_code: String,
    pub status: JoinRequestStatus,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub processed_by: Option<Uuid>,
    pub processed_by_name: Option<String>,
    pub notes: Option<String>,

    #[sqlx(json)]
    pub player_data: PlayerData,
}

/// What the submitting player presents about themselves
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PlayerSnapshot {
    pub account_type: String,

    #[validate(length(min = 1, max = 255))]
    pub name: String,

    #[validate(email)]
    pub email: String,

    pub phone: Option<String>,
    pub position: Option<String>,

    #[validate(range(min = 5, max = 80))]
    pub age: Option<i32>,

    pub nationality: Option<String>,
    pub experience: Option<String>,
}

impl PlayerSnapshot {
    pub fn is_player(&self) -> bool {
        self.account_type.trim().eq_ignore_ascii_case(PLAYER_ACCOUNT_TYPE)
    }

    /// Owned copy of the profile fields; later edits to the live profile
    /// never reach a stored request.
    pub fn player_data(&self) -> PlayerData {
        PlayerData {
            position: self.position.clone(),
            age: self.age,
            nationality: self.nationality.clone(),
            experience: self.experience.clone(),
        }
    }
}

/// Row inserted by a successful submission
#[derive(Debug, Clone)]
pub struct NewJoinRequest {
    pub player_id: Uuid,
    pub player_name: String,
    pub player_email: String,
    pub player_phone: Option<String>,
    pub organization_id: Uuid,
    pub organization_type: OrganizationType,
    pub organization_name: String,
    pub referral_id: Uuid,
    pub referral_code: String,
    pub requested_at: DateTime<Utc>,
    pub player_data: PlayerData,
}

impl NewJoinRequest {
    pub fn into_pending(self, id: Uuid) -> JoinRequest {
        JoinRequest {
            id,
            player_id: self.player_id,
            player_name: self.player_name,
            player_email: self.player_email,
            player_phone: self.player_phone,
            organization_id: self.organization_id,
            organization_type: self.organization_type,
            organization_name: self.organization_name,
            referral_id: self.referral_id,
            referral_code: self.referral_code,
            status: JoinRequestStatus::Pending,
            requested_at: self.requested_at,
            processed_at: None,
            processed_by: None,
            processed_by_name: None,
            notes: None,
            player_data: self.player_data,
        }
    }
}

/// Terminal decision recorded by approve or reject
#[derive(Debug, Clone)]
pub struct Resolution {
    pub status: JoinRequestStatus,
    pub processed_by: Uuid,
    pub processed_by_name: String,
    pub notes: Option<String>,
    pub processed_at: DateTime<Utc>,
}

impl Resolution {
    pub fn apply_to(&self, request: &mut JoinRequest) {
        request.status = self.status;
        request.processed_at = Some(self.processed_at);
        request.processed_by = Some(self.processed_by);
        request.processed_by_name = Some(self.processed_by_name.clone());
        request.notes = self.notes.clone();
    }
}
