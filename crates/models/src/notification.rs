use crate::join_request::JoinRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NotificationKind {
    #[serde(rename = "join_request.submitted")]
    JoinRequestSubmitted,
    #[serde(rename = "join_request.approved")]
    JoinRequestApproved,
    #[serde(rename = "join_request.rejected")]
    JoinRequestRejected,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::JoinRequestSubmitted => "join_request.submitted",
            NotificationKind::JoinRequestApproved => "join_request.approved",
            NotificationKind::JoinRequestRejected => "join_request.rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecipientKind {
    Organization,
    Player,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub recipient_kind: RecipientKind,
    pub recipient_id: Uuid,
    pub request_id: Uuid,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl NotificationEvent {
    fn new(
        kind: NotificationKind,
        recipient_kind: RecipientKind,
        recipient_id: Uuid,
        request_id: Uuid,
        title: String,
        message: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            recipient_kind,
            recipient_id,
            request_id,
            title,
            message,
            created_at: Utc::now(),
        }
    }

    /// Sent to the organization when a player redeems its code
    pub fn submitted(request: &JoinRequest) -> Self {
        Self::new(
            NotificationKind::JoinRequestSubmitted,
            RecipientKind::Organization,
            request.organization_id,
            request.id,
            "New join request".to_string(),
            format!(
                "{} wants to join {} using code {}",
                request.player_name, request.organization_name, request.referral_code
            ),
        )
    }

    pub fn approved(request: &JoinRequest) -> Self {
        Self::new(
            NotificationKind::JoinRequestApproved,
            RecipientKind::Player,
            request.player_id,
            request.id,
            "Join request approved".to_string(),
            format!(
                "Your request to join {} has been approved",
                request.organization_name
            ),
        )
    }

    pub fn rejected(request: &JoinRequest) -> Self {
        let message = match request.notes.as_deref() {
            Some(reason) if !reason.trim().is_empty() => format!(
                "Your request to join {} was declined: {}",
                request.organization_name, reason
            ),
            _ => format!(
                "Your request to join {} was declined",
                request.organization_name
            ),
        };

        Self::new(
            NotificationKind::JoinRequestRejected,
            RecipientKind::Player,
            request.player_id,
            request.id,
            "Join request declined".to_string(),
            message,
        )
    }
}
