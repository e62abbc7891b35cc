//! Persistence contract for referrals, join requests and player profiles.
//!
//! The workflow never reads a counter or a status and writes it back; the two
//! mutations that race are expressed as single store primitives:
//! [`ReferralStore::increment_usage_if_available`] /
//! [`JoinRequestStore::insert_reserving`] for capacity, and
//! [`JoinRequestStore::transition`] for the `pending -> terminal` step.

use crate::error::Result;
use async_trait::async_trait;
use pitchlink_models::{
    JoinRequest, JoinRequestStatus, NewJoinRequest, NewReferral, PlayerLookup, Referral,
    ReferralChanges, Resolution,
};
use sqlx::PgConnection;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait ReferralStore: Send + Sync {
    /// Fails with `DuplicateEntry` when the normalized code is taken
    async fn insert(&self, referral: NewReferral) -> Result<Referral>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Referral>>;

    /// Lookup by normalized code, regardless of `is_active`
    async fn find_by_code(&self, code: &str) -> Result<Option<Referral>>;

    async fn code_exists(&self, code: &str) -> Result<bool>;

    /// Newest first
    async fn list_by_organization(&self, organization_id: Uuid) -> Result<Vec<Referral>>;

    /// Atomically increments `current_usage` when `max_usage` is unset or not
    /// yet reached. `None` means the referral is missing or full.
    async fn increment_usage_if_available(&self, id: Uuid) -> Result<Option<Referral>>;

    /// Fails with `NotFound` for an unknown id, `DuplicateEntry` for a code clash
    async fn update(&self, id: Uuid, changes: &ReferralChanges) -> Result<Referral>;
}

/// Result of [`JoinRequestStore::insert_reserving`]. Only `Created` writes anything.
#[derive(Debug, Clone)]
pub enum ReservedInsert {
    Created(JoinRequest),
    CapacityExceeded,
    DuplicatePending,
}

/// Result of [`JoinRequestStore::transition`]
#[derive(Debug)]
pub enum TransitionOutcome {
    Applied(JoinRequest),
    NotFound,
    /// The request already left `pending`; carries its current status
    NotPending(JoinRequestStatus),
    /// The linkage hook failed; the transition was not committed
    LinkageFailed(crate::error::DatabaseError),
}

#[async_trait]
pub trait JoinRequestStore: Send + Sync {
    /// Reserves one use of `request.referral_id` and inserts the pending
    /// request as a single unit.
    async fn insert_reserving(&self, request: NewJoinRequest) -> Result<ReservedInsert>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<JoinRequest>>;

    async fn find_pending(
        &self,
        player_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<JoinRequest>>;

    /// Newest first
    async fn list_by_organization(
        &self,
        organization_id: Uuid,
        status: Option<JoinRequestStatus>,
    ) -> Result<Vec<JoinRequest>>;

    /// Newest first
    async fn list_by_player(&self, player_id: Uuid) -> Result<Vec<JoinRequest>>;

    /// Compare-and-set from `pending` to `resolution.status`. When `linkage` is
    /// given it runs against the resolved record before the transition becomes
    /// visible, and its failure leaves the request pending.
    async fn transition(
        &self,
        id: Uuid,
        resolution: Resolution,
        linkage: Option<&dyn LinkageService>,
    ) -> Result<TransitionOutcome>;
}

#[async_trait]
pub trait PlayerRepository: Send + Sync {
    async fn find_by_id(&self, player_id: Uuid) -> Result<Option<PlayerLookup>>;
}

/// Writes organization affiliation onto the player profile
#[async_trait]
pub trait LinkageService: Send + Sync {
    async fn link(&self, request: &JoinRequest) -> Result<()>;

    /// Runs the write on the caller's open transaction so it commits or rolls
    /// back with the status change. Services that do not write to Postgres
    /// ignore the connection.
    async fn link_on(&self, _conn: &mut PgConnection, request: &JoinRequest) -> Result<()> {
        self.link(request).await
    }
}

pub type DynReferralStore = Arc<dyn ReferralStore>;
pub type DynJoinRequestStore = Arc<dyn JoinRequestStore>;
pub type DynPlayerRepository = Arc<dyn PlayerRepository>;
pub type DynLinkageService = Arc<dyn LinkageService>;
