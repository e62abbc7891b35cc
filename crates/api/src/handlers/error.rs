use axum::{http::StatusCode, Json};
use pitchlink_referral::ReferralError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn status_for(err: &ReferralError) -> StatusCode {
    match err {
        ReferralError::Validation(_) => StatusCode::BAD_REQUEST,
        ReferralError::InvalidCode | ReferralError::NotFound(_) => StatusCode::NOT_FOUND,
        ReferralError::IneligibleAccount | ReferralError::AuthorizationError(_) => {
            StatusCode::FORBIDDEN
        }
        ReferralError::CapacityExceeded
        | ReferralError::DuplicatePending
        | ReferralError::AlreadyProcessed
        | ReferralError::CodeInUse(_) => StatusCode::CONFLICT,
        ReferralError::LinkageFailed(_) | ReferralError::StoreUnavailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ReferralError::GenerationExhausted => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Map a service error onto the wire, logging server-side failures
pub fn referral_error(context: &str, err: ReferralError) -> ApiError {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!("{}: {}", context, err);
    } else {
        tracing::debug!("{}: {}", context, err);
    }

    // Store details stay in the log
    let message = match &err {
        ReferralError::StoreUnavailable(_) => "Service temporarily unavailable".to_string(),
        other => other.to_string(),
    };

    (status, Json(ErrorResponse::new(err.code(), &message)))
}

pub fn forbidden(message: &str) -> ApiError {
    (StatusCode::FORBIDDEN, Json(ErrorResponse::new("forbidden", message)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_errors_are_client_errors() {
        for err in [
            ReferralError::InvalidCode,
            ReferralError::CapacityExceeded,
            ReferralError::IneligibleAccount,
            ReferralError::DuplicatePending,
            ReferralError::AlreadyProcessed,
            ReferralError::CodeInUse("CLBAAAAAA".to_string()),
            ReferralError::Validation("bad".to_string()),
        ] {
            assert!(status_for(&err).is_client_error(), "{:?}", err);
        }
    }

    #[test]
    fn test_store_details_are_hidden() {
        let (status, Json(body)) = referral_error(
            "List referrals",
            ReferralError::StoreUnavailable("pool timed out on 10.0.0.5".to_string()),
        );
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.error, "store_unavailable");
        assert!(!body.message.contains("10.0.0.5"));
    }
}
