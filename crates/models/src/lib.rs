pub mod join_request;
pub mod linkage;
pub mod notification;
pub mod player;
pub mod referral;

// Re-export commonly used types
pub use join_request::{
    JoinRequest, JoinRequestStatus, NewJoinRequest, PlayerData, PlayerSnapshot, Resolution,
    PLAYER_ACCOUNT_TYPE,
};
pub use linkage::{ApprovedBy, ProfileLinkage};
pub use notification::{NotificationEvent, NotificationKind, RecipientKind};
pub use player::{PlayerLookup, PlayerRecord, PlayerSource};
pub use referral::{
    is_valid_code_format, normalize_code, CreateReferral, NewReferral, OrganizationType,
    Referral, ReferralChanges, UpdateReferral,
};
