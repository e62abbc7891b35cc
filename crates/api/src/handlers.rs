pub mod error;
pub mod health;
pub mod join_request;
pub mod referral;

// Re-export common types
pub use error::{ApiError, ErrorResponse};
