use crate::join_request::{JoinRequest, JoinRequestStatus};
use crate::referral::OrganizationType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovedBy {
    pub user_id: Uuid,
    pub approved_at: DateTime<Utc>,
}

/// Affiliation written onto a player profile after approval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileLinkage {
    pub player_id: Uuid,
    pub organization_id: Uuid,
    pub organization_type: OrganizationType,
    pub organization_name: String,
    pub referral_code: String,
    pub joined_at: DateTime<Utc>,
    pub approved_by: ApprovedBy,
}

impl ProfileLinkage {
    /// Returns `None` unless the request has been approved
    pub fn from_request(request: &JoinRequest) -> Option<Self> {
        if request.status != JoinRequestStatus::Approved {
            return None;
        }
        let approved_at = request.processed_at?;
        let approver = request.processed_by?;

        Some(Self {
            player_id: request.player_id,
            organization_id: request.organization_id,
            organization_type: request.organization_type,
            organization_name: request.organization_name.clone(),
            referral_code: request.referral_code.clone(),
            joined_at: approved_at,
            approved_by: ApprovedBy {
                user_id: approver,
                approved_at,
            },
        })
    }

    /// e.g. `club_id`, `academy_id`
    pub fn foreign_key_field(&self) -> String {
        format!("{}_id", self.organization_type)
    }

    pub fn name_field(&self) -> String {
        format!("{}_name", self.organization_type)
    }

    /// Fields merged into the player's profile document
    pub fn to_profile_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(self.foreign_key_field(), json!(self.organization_id));
        fields.insert(self.name_field(), json!(self.organization_name));
        fields.insert("organization_type".to_string(), json!(self.organization_type));
        fields.insert("joined_via_referral".to_string(), json!(true));
        fields.insert("referral_code_used".to_string(), json!(self.referral_code));
        fields.insert("organization_joined_at".to_string(), json!(self.joined_at));
        fields.insert("approved_by".to_string(), json!(self.approved_by));
        fields
    }
}
