use crate::handlers::ErrorResponse;
use crate::jwt::{Claims, JwtService};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use pitchlink_models::OrganizationType;
use std::sync::Arc;
use uuid::Uuid;

/// Organization the caller acts for
#[derive(Debug, Clone)]
pub struct OrganizationScope {
    pub id: Uuid,
    pub organization_type: OrganizationType,
    pub name: String,
}

/// Authenticated account context
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub account_type: String,
    pub organization: Option<OrganizationScope>,
}

impl TryFrom<Claims> for AuthUser {
    type Error = (StatusCode, Json<ErrorResponse>);

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("invalid_token", "Invalid subject in token")),
            )
        })?;

        // Organization scope is all-or-nothing; a partial scope is ignored
        let organization = match (
            claims.organization_id.as_deref().and_then(|id| Uuid::parse_str(id).ok()),
            claims
                .organization_type
                .as_deref()
                .and_then(|t| t.parse::<OrganizationType>().ok()),
        ) {
            (Some(id), Some(organization_type)) => Some(OrganizationScope {
                id,
                organization_type,
                name: claims
                    .organization_name
                    .clone()
                    .unwrap_or_else(|| claims.name.clone()),
            }),
            _ => None,
        };

        Ok(Self {
            user_id,
            email: claims.email,
            name: claims.name,
            account_type: claims.account_type,
            organization,
        })
    }
}

impl AuthUser {
    /// Organization scope or 403 for accounts that act for no organization
    pub fn require_organization(&self) -> Result<&OrganizationScope, (StatusCode, Json<ErrorResponse>)> {
        self.organization.as_ref().ok_or_else(|| {
            (
                StatusCode::FORBIDDEN,
                Json(ErrorResponse::new(
                    "organization_required",
                    "This action requires an organization account",
                )),
            )
        })
    }
}

/// Extract the bearer token from the Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, (StatusCode, Json<ErrorResponse>)> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new(
                    "missing_auth_header",
                    "Authorization header is required",
                )),
            )
        })?
        .to_str()
        .map_err(|_| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new(
                    "invalid_auth_header",
                    "Invalid Authorization header format",
                )),
            )
        })?;

    auth_header
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new(
                    "invalid_auth_scheme",
                    "Authorization header must use Bearer scheme",
                )),
            )
        })
}

pub fn validate_token(
    jwt: &JwtService,
    token: &str,
) -> Result<Claims, (StatusCode, Json<ErrorResponse>)> {
    jwt.validate_access_token(token).map_err(|e| {
        tracing::warn!("Token validation failed: {}", e);
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("invalid_token", &e.to_string())),
        )
    })
}

/// Middleware to require authentication
pub async fn require_auth(
    State(state): State<Arc<crate::AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let token = extract_bearer_token(&headers)?;
    let claims = validate_token(&state.jwt, &token)?;

    request.extensions_mut().insert(AuthUser::try_from(claims)?);

    Ok(next.run(request).await)
}
