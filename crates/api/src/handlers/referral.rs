use crate::handlers::error::{referral_error, ApiError};
use crate::middleware::auth::AuthUser;
use crate::AppState;
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use pitchlink_models::{CreateReferral, OrganizationType, Referral, UpdateReferral};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Public view of a redeemable code
#[derive(Debug, Serialize, Deserialize)]
pub struct ReferralPreview {
    pub valid: bool,
    pub code: String,
    pub organization_id: Uuid,
    pub organization_name: String,
    pub organization_type: OrganizationType,
    pub description: String,
    pub remaining_usage: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<Referral> for ReferralPreview {
    fn from(referral: Referral) -> Self {
        Self {
            valid: true,
            remaining_usage: referral.remaining_usage(),
            code: referral.code,
            organization_id: referral.organization_id,
            organization_name: referral.organization_name,
            organization_type: referral.organization_type,
            description: referral.description,
            expires_at: referral.expires_at,
        }
    }
}

/// Check a code before signing up (public)
/// GET /api/referrals/validate/:code
pub async fn validate_code(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<ReferralPreview>, ApiError> {
    let referral = state
        .registry
        .find_active_by_code(&code)
        .await
        .map_err(|e| referral_error("Validate referral code", e))?
        .ok_or_else(|| {
            referral_error(
                "Validate referral code",
                pitchlink_referral::ReferralError::InvalidCode,
            )
        })?;

    Ok(Json(referral.into()))
}

/// Issue a referral code for the caller's organization
/// POST /api/referrals
pub async fn create_referral(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Json(request): Json<CreateReferral>,
) -> Result<(StatusCode, Json<Referral>), ApiError> {
    let organization = auth_user.require_organization()?;

    let referral = state
        .registry
        .create(
            organization.id,
            organization.organization_type,
            &organization.name,
            request,
        )
        .await
        .map_err(|e| referral_error("Create referral", e))?;

    Ok((StatusCode::CREATED, Json(referral)))
}

/// GET /api/referrals
pub async fn list_referrals(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Vec<Referral>>, ApiError> {
    let organization = auth_user.require_organization()?;

    let referrals = state
        .registry
        .list_for_organization(organization.id)
        .await
        .map_err(|e| referral_error("List referrals", e))?;

    Ok(Json(referrals))
}

/// GET /api/referrals/:id
pub async fn get_referral(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Path(referral_id): Path<Uuid>,
) -> Result<Json<Referral>, ApiError> {
    let organization = auth_user.require_organization()?;

    let referral = state
        .registry
        .get(referral_id, organization.id)
        .await
        .map_err(|e| referral_error("Get referral", e))?;

    Ok(Json(referral))
}

/// PATCH /api/referrals/:id
pub async fn update_referral(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Path(referral_id): Path<Uuid>,
    Json(request): Json<UpdateReferral>,
) -> Result<Json<Referral>, ApiError> {
    let organization = auth_user.require_organization()?;

    let referral = state
        .registry
        .update(referral_id, organization.id, request)
        .await
        .map_err(|e| referral_error("Update referral", e))?;

    Ok(Json(referral))
}
