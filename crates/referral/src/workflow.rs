use crate::error::{ReferralError, Result};
use crate::notifications::NotificationPublisher;
use crate::registry::ReferralRegistry;
use chrono::Utc;
use pitchlink_database::{
    DynJoinRequestStore, DynLinkageService, DynPlayerRepository, ReservedInsert,
    TransitionOutcome,
};
use pitchlink_models::{
    JoinRequest, JoinRequestStatus, NewJoinRequest, NotificationEvent, PlayerSnapshot,
    Resolution,
};
use uuid::Uuid;
use validator::Validate;

/// Player join-request lifecycle: submit, then approve or reject exactly once
#[derive(Clone)]
pub struct JoinRequestWorkflow {
    registry: ReferralRegistry,
    requests: DynJoinRequestStore,
    players: DynPlayerRepository,
    linkage: DynLinkageService,
    notifier: NotificationPublisher,
}

impl JoinRequestWorkflow {
    pub fn new(
        registry: ReferralRegistry,
        requests: DynJoinRequestStore,
        players: DynPlayerRepository,
        linkage: DynLinkageService,
        notifier: NotificationPublisher,
    ) -> Self {
        Self {
            registry,
            requests,
            players,
            linkage,
            notifier,
        }
    }

    pub fn registry(&self) -> &ReferralRegistry {
        &self.registry
    }

    /// Redeem a referral code on behalf of a player
    pub async fn submit(
        &self,
        player_id: Uuid,
        snapshot: PlayerSnapshot,
        code: &str,
    ) -> Result<JoinRequest> {
        let referral = self
            .registry
            .find_active_by_code(code)
            .await?
            .ok_or_else(|| {
                tracing::warn!("Join request rejected: invalid code {:?}", code.trim());
                ReferralError::InvalidCode
            })?;

        if !snapshot.is_player() {
            tracing::warn!(
                "Join request rejected: account {} has type {:?}",
                player_id,
                snapshot.account_type
            );
            return Err(ReferralError::IneligibleAccount);
        }
        match self.players.find_by_id(player_id).await? {
            Some(lookup) if lookup.is_player() => {}
            _ => {
                tracing::warn!("Join request rejected: no player record for {}", player_id);
                return Err(ReferralError::IneligibleAccount);
            }
        }

        snapshot.validate()?;

        if self
            .requests
            .find_pending(player_id, referral.organization_id)
            .await?
            .is_some()
        {
            return Err(ReferralError::DuplicatePending);
        }

        let new_request = NewJoinRequest {
            player_id,
            player_name: snapshot.name.trim().to_string(),
            player_email: snapshot.email.trim().to_string(),
            player_phone: snapshot.phone.clone(),
            organization_id: referral.organization_id,
            organization_type: referral.organization_type,
            organization_name: referral.organization_name.clone(),
            referral_id: referral.id,
            referral_code: referral.code.clone(),
            requested_at: Utc::now(),
            player_data: snapshot.player_data(),
        };

        let request = match self.requests.insert_reserving(new_request).await? {
            ReservedInsert::Created(request) => request,
            ReservedInsert::CapacityExceeded => {
                tracing::warn!(
                    "Join request rejected: referral {} is at capacity",
                    referral.code
                );
                return Err(ReferralError::CapacityExceeded);
            }
            ReservedInsert::DuplicatePending => return Err(ReferralError::DuplicatePending),
        };

        tracing::info!(
            "Join request submitted: id={}, player_id={}, organization_id={}, code={}",
            request.id,
            player_id,
            request.organization_id,
            request.referral_code
        );

        self.notifier.publish(NotificationEvent::submitted(&request));

        Ok(request)
    }

    /// Approve a pending request and link the player's profile in the same unit
    pub async fn approve(
        &self,
        request_id: Uuid,
        approver_id: Uuid,
        approver_name: &str,
        notes: Option<String>,
    ) -> Result<JoinRequest> {
        let request = self
            .resolve(
                request_id,
                Resolution {
                    status: JoinRequestStatus::Approved,
                    processed_by: approver_id,
                    processed_by_name: approver_name.to_string(),
                    notes,
                    processed_at: Utc::now(),
                },
            )
            .await?;

        tracing::info!(
            "Join request approved: id={}, player_id={}, organization_id={}, by={}",
            request.id,
            request.player_id,
            request.organization_id,
            approver_id
        );

        self.notifier.publish(NotificationEvent::approved(&request));

        Ok(request)
    }

    pub async fn reject(
        &self,
        request_id: Uuid,
        rejector_id: Uuid,
        rejector_name: &str,
        reason: Option<String>,
    ) -> Result<JoinRequest> {
        let request = self
            .resolve(
                request_id,
                Resolution {
                    status: JoinRequestStatus::Rejected,
                    processed_by: rejector_id,
                    processed_by_name: rejector_name.to_string(),
                    notes: reason,
                    processed_at: Utc::now(),
                },
            )
            .await?;

        tracing::info!(
            "Join request rejected: id={}, player_id={}, organization_id={}, by={}",
            request.id,
            request.player_id,
            request.organization_id,
            rejector_id
        );

        self.notifier.publish(NotificationEvent::rejected(&request));

        Ok(request)
    }

    async fn resolve(&self, request_id: Uuid, resolution: Resolution) -> Result<JoinRequest> {
        let linkage = match resolution.status {
            JoinRequestStatus::Approved => Some(self.linkage.as_ref()),
            _ => None,
        };

        match self
            .requests
            .transition(request_id, resolution, linkage)
            .await?
        {
            TransitionOutcome::Applied(request) => Ok(request),
            TransitionOutcome::NotFound => {
                Err(ReferralError::NotFound("Join request not found".to_string()))
            }
            TransitionOutcome::NotPending(status) => {
                tracing::warn!(
                    "Join request {} already processed (status={})",
                    request_id,
                    status
                );
                Err(ReferralError::AlreadyProcessed)
            }
            TransitionOutcome::LinkageFailed(e) => {
                tracing::error!(
                    "Profile linkage failed for join request {}: {}",
                    request_id,
                    e
                );
                Err(ReferralError::LinkageFailed(e.to_string()))
            }
        }
    }

    pub async fn get(&self, request_id: Uuid) -> Result<JoinRequest> {
        self.requests
            .find_by_id(request_id)
            .await?
            .ok_or_else(|| ReferralError::NotFound("Join request not found".to_string()))
    }

    /// Newest first, optionally filtered by status
    pub async fn list_for_organization(
        &self,
        organization_id: Uuid,
        status: Option<JoinRequestStatus>,
    ) -> Result<Vec<JoinRequest>> {
        Ok(self
            .requests
            .list_by_organization(organization_id, status)
            .await?)
    }

    pub async fn list_for_player(&self, player_id: Uuid) -> Result<Vec<JoinRequest>> {
        Ok(self.requests.list_by_player(player_id).await?)
    }
}
