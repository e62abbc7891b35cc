use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Kind of organization that owns a referral code
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrganizationType {
    Club,
    Academy,
    Trainer,
    Agent,
}

impl OrganizationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizationType::Club => "club",
            OrganizationType::Academy => "academy",
            OrganizationType::Trainer => "trainer",
            OrganizationType::Agent => "agent",
        }
    }
}

impl std::fmt::Display for OrganizationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrganizationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "club" => Ok(OrganizationType::Club),
            "academy" => Ok(OrganizationType::Academy),
            "trainer" => Ok(OrganizationType::Trainer),
            "agent" => Ok(OrganizationType::Agent),
            _ => Err(format!("Invalid organization type: {}", s)),
        }
    }
}

/// Invitation channel issued by an organization
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Referral {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub organization_type: OrganizationType,
    pub organization_name: String,
    pub code: String,
    pub invite_link: String,
    pub description: String,
    pub is_active: bool,
    pub max_usage: Option<i32>,
    pub current_usage: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Referral {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |expires_at| expires_at <= now)
    }

    /// True when the referral accepts new join requests at `now`.
    /// Capacity is not part of this check; it is enforced by the reservation.
    pub fn is_redeemable_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired_at(now)
    }

    pub fn remaining_usage(&self) -> Option<i32> {
        self.max_usage
            .map(|max| (max - self.current_usage).max(0))
    }
}

/// Create referral request (organization-supplied fields)
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateReferral {
    #[validate(length(max = 500))]
    pub description: Option<String>,

    #[validate(range(min = 1))]
    pub max_usage: Option<i32>,

    pub expires_at: Option<DateTime<Utc>>,
}

/// Update referral request
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateReferral {
    pub code: Option<String>,

    pub is_active: Option<bool>,

    #[validate(range(min = 1))]
    pub max_usage: Option<i32>,

    #[validate(length(max = 500))]
    pub description: Option<String>,

    pub expires_at: Option<DateTime<Utc>>,
}

/// Fully-resolved referral row ready for insertion
#[derive(Debug, Clone)]
pub struct NewReferral {
    pub organization_id: Uuid,
    pub organization_type: OrganizationType,
    pub organization_name: String,
    pub code: String,
    pub invite_link: String,
    pub description: String,
    pub max_usage: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Column changes applied by an authorized update.
/// `code` and `invite_link` always travel together.
#[derive(Debug, Clone, Default)]
pub struct ReferralChanges {
    pub code: Option<(String, String)>,
    pub is_active: Option<bool>,
    pub max_usage: Option<i32>,
    pub description: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ReferralChanges {
    /// Apply the changes to an in-memory copy of the row
    pub fn apply_to(&self, referral: &mut Referral, now: DateTime<Utc>) {
        if let Some((code, invite_link)) = &self.code {
            referral.code = code.clone();
            referral.invite_link = invite_link.clone();
        }
        if let Some(is_active) = self.is_active {
            referral.is_active = is_active;
        }
        if let Some(max_usage) = self.max_usage {
            referral.max_usage = Some(max_usage);
        }
        if let Some(description) = &self.description {
            referral.description = description.clone();
        }
        if let Some(expires_at) = self.expires_at {
            referral.expires_at = Some(expires_at);
        }
        referral.updated_at = now;
    }
}

lazy_static::lazy_static! {
    static ref REFERRAL_CODE_REGEX: regex::Regex = regex::Regex::new(r"^[A-Z]{3}[A-Z0-9]{6}$").unwrap();
}

/// Canonical form used for storage and lookup
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Three-letter prefix followed by six `[A-Z0-9]` characters
pub fn is_valid_code_format(code: &str) -> bool {
    REFERRAL_CODE_REGEX.is_match(code)
}
