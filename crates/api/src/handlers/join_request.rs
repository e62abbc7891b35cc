use crate::handlers::error::{forbidden, referral_error, ApiError};
use crate::middleware::auth::AuthUser;
use crate::AppState;
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use pitchlink_models::{JoinRequest, JoinRequestStatus, PlayerSnapshot};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Identity fields come from the token; the rest is what the player chose to share
#[derive(Debug, Deserialize)]
pub struct SubmitJoinRequest {
    pub referral_code: String,
    pub phone: Option<String>,
    pub position: Option<String>,
    pub age: Option<i32>,
    pub nationality: Option<String>,
    pub experience: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApproveJoinRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectJoinRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListJoinRequestsQuery {
    pub status: Option<JoinRequestStatus>,
}

/// POST /api/join-requests
pub async fn submit_join_request(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Json(request): Json<SubmitJoinRequest>,
) -> Result<(StatusCode, Json<JoinRequest>), ApiError> {
    let snapshot = PlayerSnapshot {
        account_type: auth_user.account_type.clone(),
        name: auth_user.name.clone(),
        email: auth_user.email.clone(),
        phone: request.phone,
        position: request.position,
        age: request.age,
        nationality: request.nationality,
        experience: request.experience,
    };

    let join_request = state
        .workflow
        .submit(auth_user.user_id, snapshot, &request.referral_code)
        .await
        .map_err(|e| referral_error("Submit join request", e))?;

    Ok((StatusCode::CREATED, Json(join_request)))
}

/// The caller's own requests, newest first
/// GET /api/join-requests/mine
pub async fn my_join_requests(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Vec<JoinRequest>>, ApiError> {
    let requests = state
        .workflow
        .list_for_player(auth_user.user_id)
        .await
        .map_err(|e| referral_error("List player join requests", e))?;

    Ok(Json(requests))
}

/// GET /api/organizations/join-requests?status=pending
pub async fn organization_join_requests(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<ListJoinRequestsQuery>,
) -> Result<Json<Vec<JoinRequest>>, ApiError> {
    let organization = auth_user.require_organization()?;

    let requests = state
        .workflow
        .list_for_organization(organization.id, query.status)
        .await
        .map_err(|e| referral_error("List organization join requests", e))?;

    Ok(Json(requests))
}

/// Only the organization a request targets may process it
async fn load_owned(
    state: &AppState,
    auth_user: &AuthUser,
    request_id: Uuid,
) -> Result<JoinRequest, ApiError> {
    let organization = auth_user.require_organization()?;

    let request = state
        .workflow
        .get(request_id)
        .await
        .map_err(|e| referral_error("Load join request", e))?;

    if request.organization_id != organization.id {
        tracing::warn!(
            "User {} attempted to process join request {} of organization {}",
            auth_user.user_id,
            request_id,
            request.organization_id
        );
        return Err(forbidden("Join request belongs to another organization"));
    }

    Ok(request)
}

/// POST /api/join-requests/:id/approve
pub async fn approve_join_request(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Path(request_id): Path<Uuid>,
    body: Option<Json<ApproveJoinRequest>>,
) -> Result<Json<JoinRequest>, ApiError> {
    load_owned(&state, &auth_user, request_id).await?;
    let notes = body.and_then(|Json(body)| body.notes);

    let request = state
        .workflow
        .approve(request_id, auth_user.user_id, &auth_user.name, notes)
        .await
        .map_err(|e| referral_error("Approve join request", e))?;

    Ok(Json(request))
}

/// POST /api/join-requests/:id/reject
pub async fn reject_join_request(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Path(request_id): Path<Uuid>,
    body: Option<Json<RejectJoinRequest>>,
) -> Result<Json<JoinRequest>, ApiError> {
    load_owned(&state, &auth_user, request_id).await?;
    let reason = body.and_then(|Json(body)| body.reason);

    let request = state
        .workflow
        .reject(request_id, auth_user.user_id, &auth_user.name, reason)
        .await
        .map_err(|e| referral_error("Reject join request", e))?;

    Ok(Json(request))
}
