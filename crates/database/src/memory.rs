//! In-process implementation of the persistence contract.
//!
//! Backs the `memory` storage backend and the service tests. Each collection
//! sits behind its own async mutex; `insert_reserving` takes the referral lock
//! before the request lock, and `transition` holds only the request lock while
//! the linkage hook runs against the player collection.

use crate::error::{DatabaseError, Result};
use crate::store::{
    JoinRequestStore, LinkageService, PlayerRepository, ReferralStore, ReservedInsert,
    TransitionOutcome,
};
use async_trait::async_trait;
use chrono::Utc;
use pitchlink_models::{
    normalize_code, JoinRequest, JoinRequestStatus, NewJoinRequest, NewReferral, PlayerLookup,
    PlayerRecord, PlayerSource, ProfileLinkage, Referral, ReferralChanges, Resolution,
};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct InMemoryStore {
    referrals: Mutex<HashMap<Uuid, Referral>>,
    requests: Mutex<HashMap<Uuid, JoinRequest>>,
    players: Mutex<HashMap<Uuid, PlayerLookup>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a player record
    pub async fn put_player(&self, source: PlayerSource, record: PlayerRecord) {
        self.players
            .lock()
            .await
            .insert(record.id, PlayerLookup { source, record });
    }

    pub async fn player_profile(&self, player_id: Uuid) -> Option<serde_json::Value> {
        self.players
            .lock()
            .await
            .get(&player_id)
            .map(|lookup| lookup.record.profile.clone())
    }
}

fn newest_first<T>(mut rows: Vec<T>, key: impl Fn(&T) -> chrono::DateTime<Utc>) -> Vec<T> {
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
    rows
}

#[async_trait]
impl ReferralStore for InMemoryStore {
    async fn insert(&self, referral: NewReferral) -> Result<Referral> {
        let mut referrals = self.referrals.lock().await;
        let code = normalize_code(&referral.code);

        if referrals.values().any(|r| normalize_code(&r.code) == code) {
            return Err(DatabaseError::duplicate("Referral", "this code"));
        }

        let now = Utc::now();
        let created = Referral {
            id: Uuid::new_v4(),
            organization_id: referral.organization_id,
            organization_type: referral.organization_type,
            organization_name: referral.organization_name,
            code,
            invite_link: referral.invite_link,
            description: referral.description,
            is_active: true,
            max_usage: referral.max_usage,
            current_usage: 0,
            created_at: now,
            updated_at: now,
            expires_at: referral.expires_at,
        };
        referrals.insert(created.id, created.clone());

        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Referral>> {
        Ok(self.referrals.lock().await.get(&id).cloned())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Referral>> {
        let code = normalize_code(code);
        Ok(self
            .referrals
            .lock()
            .await
            .values()
            .find(|r| normalize_code(&r.code) == code)
            .cloned())
    }

    async fn code_exists(&self, code: &str) -> Result<bool> {
        Ok(ReferralStore::find_by_code(self, code).await?.is_some())
    }

    async fn list_by_organization(&self, organization_id: Uuid) -> Result<Vec<Referral>> {
        let rows: Vec<Referral> = self
            .referrals
            .lock()
            .await
            .values()
            .filter(|r| r.organization_id == organization_id)
            .cloned()
            .collect();

        Ok(newest_first(rows, |r| r.created_at))
    }

    async fn increment_usage_if_available(&self, id: Uuid) -> Result<Option<Referral>> {
        let mut referrals = self.referrals.lock().await;
        Ok(reserve(&mut referrals, id))
    }

    async fn update(&self, id: Uuid, changes: &ReferralChanges) -> Result<Referral> {
        let mut referrals = self.referrals.lock().await;

        if let Some((code, _)) = &changes.code {
            let code = normalize_code(code);
            if referrals
                .values()
                .any(|r| r.id != id && normalize_code(&r.code) == code)
            {
                return Err(DatabaseError::duplicate("Referral", "this code"));
            }
        }

        let referral = referrals
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::not_found("Referral", &id.to_string()))?;
        changes.apply_to(referral, Utc::now());
        referral.code = normalize_code(&referral.code);

        Ok(referral.clone())
    }
}

/// Conditional increment under the caller's lock
fn reserve(referrals: &mut HashMap<Uuid, Referral>, id: Uuid) -> Option<Referral> {
    let referral = referrals.get_mut(&id)?;
    if let Some(max) = referral.max_usage {
        if referral.current_usage >= max {
            return None;
        }
    }
    referral.current_usage += 1;
    referral.updated_at = Utc::now();
    Some(referral.clone())
}

#[async_trait]
impl JoinRequestStore for InMemoryStore {
    async fn insert_reserving(&self, request: NewJoinRequest) -> Result<ReservedInsert> {
        let mut referrals = self.referrals.lock().await;
        let mut requests = self.requests.lock().await;

        let duplicate = requests.values().any(|r| {
            r.player_id == request.player_id
                && r.organization_id == request.organization_id
                && r.status == JoinRequestStatus::Pending
        });
        if duplicate {
            return Ok(ReservedInsert::DuplicatePending);
        }

        if reserve(&mut referrals, request.referral_id).is_none() {
            return Ok(ReservedInsert::CapacityExceeded);
        }

        let created = request.into_pending(Uuid::new_v4());
        requests.insert(created.id, created.clone());

        Ok(ReservedInsert::Created(created))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<JoinRequest>> {
        Ok(self.requests.lock().await.get(&id).cloned())
    }

    async fn find_pending(
        &self,
        player_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<JoinRequest>> {
        Ok(self
            .requests
            .lock()
            .await
            .values()
            .find(|r| {
                r.player_id == player_id
                    && r.organization_id == organization_id
                    && r.status == JoinRequestStatus::Pending
            })
            .cloned())
    }

    async fn list_by_organization(
        &self,
        organization_id: Uuid,
        status: Option<JoinRequestStatus>,
    ) -> Result<Vec<JoinRequest>> {
        let rows: Vec<JoinRequest> = self
            .requests
            .lock()
            .await
            .values()
            .filter(|r| r.organization_id == organization_id)
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();

        Ok(newest_first(rows, |r| r.requested_at))
    }

    async fn list_by_player(&self, player_id: Uuid) -> Result<Vec<JoinRequest>> {
        let rows: Vec<JoinRequest> = self
            .requests
            .lock()
            .await
            .values()
            .filter(|r| r.player_id == player_id)
            .cloned()
            .collect();

        Ok(newest_first(rows, |r| r.requested_at))
    }

    async fn transition(
        &self,
        id: Uuid,
        resolution: Resolution,
        linkage: Option<&dyn LinkageService>,
    ) -> Result<TransitionOutcome> {
        let mut requests = self.requests.lock().await;

        let current = match requests.get(&id) {
            None => return Ok(TransitionOutcome::NotFound),
            Some(r) if r.status != JoinRequestStatus::Pending => {
                return Ok(TransitionOutcome::NotPending(r.status))
            }
            Some(r) => r.clone(),
        };

        let mut resolved = current;
        resolution.apply_to(&mut resolved);

        if let Some(linkage) = linkage {
            if let Err(e) = linkage.link(&resolved).await {
                return Ok(TransitionOutcome::LinkageFailed(e));
            }
        }

        requests.insert(id, resolved.clone());
        Ok(TransitionOutcome::Applied(resolved))
    }
}

#[async_trait]
impl PlayerRepository for InMemoryStore {
    async fn find_by_id(&self, player_id: Uuid) -> Result<Option<PlayerLookup>> {
        Ok(self.players.lock().await.get(&player_id).cloned())
    }
}

#[async_trait]
impl LinkageService for InMemoryStore {
    async fn link(&self, request: &JoinRequest) -> Result<()> {
        let linkage = ProfileLinkage::from_request(request).ok_or_else(|| {
            DatabaseError::Internal(format!(
                "Join request {} is not approved; nothing to link",
                request.id
            ))
        })?;

        let mut players = self.players.lock().await;
        let lookup = players
            .get_mut(&request.player_id)
            .ok_or_else(|| DatabaseError::not_found("Player", &request.player_id.to_string()))?;

        if !lookup.record.profile.is_object() {
            lookup.record.profile = serde_json::json!({});
        }
        if let Some(profile) = lookup.record.profile.as_object_mut() {
            profile.extend(linkage.to_profile_fields());
        }

        Ok(())
    }
}
