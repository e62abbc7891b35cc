use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReferralError>;

#[derive(Debug, Error)]
pub enum ReferralError {
    #[error("Invalid or inactive referral code")]
    InvalidCode,

    #[error("Referral code has reached its usage limit")]
    CapacityExceeded,

    #[error("Only player accounts can request to join an organization")]
    IneligibleAccount,

    #[error("A pending join request already exists for this organization")]
    DuplicatePending,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Join request has already been processed")]
    AlreadyProcessed,

    #[error("Forbidden: {0}")]
    AuthorizationError(String),

    #[error("Could not generate a unique referral code")]
    GenerationExhausted,

    #[error("Referral code already in use: {0}")]
    CodeInUse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Failed to link player profile: {0}")]
    LinkageFailed(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl ReferralError {
    /// Stable machine-readable kind
    pub fn code(&self) -> &'static str {
        match self {
            ReferralError::InvalidCode => "invalid_code",
            ReferralError::CapacityExceeded => "capacity_exceeded",
            ReferralError::IneligibleAccount => "ineligible_account",
            ReferralError::DuplicatePending => "duplicate_pending",
            ReferralError::NotFound(_) => "not_found",
            ReferralError::AlreadyProcessed => "already_processed",
            ReferralError::AuthorizationError(_) => "forbidden",
            ReferralError::GenerationExhausted => "generation_exhausted",
            ReferralError::CodeInUse(_) => "code_in_use",
            ReferralError::Validation(_) => "validation_error",
            ReferralError::LinkageFailed(_) => "linkage_failed",
            ReferralError::StoreUnavailable(_) => "store_unavailable",
        }
    }

    /// Whether repeating the whole call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ReferralError::StoreUnavailable(_) | ReferralError::LinkageFailed(_)
        )
    }
}

impl From<pitchlink_database::DatabaseError> for ReferralError {
    fn from(err: pitchlink_database::DatabaseError) -> Self {
        use pitchlink_database::DatabaseError;
        match err {
            DatabaseError::NotFound(msg) => ReferralError::NotFound(msg),
            other => ReferralError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ReferralError {
    fn from(err: validator::ValidationErrors) -> Self {
        ReferralError::Validation(err.to_string())
    }
}
