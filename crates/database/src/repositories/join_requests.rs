use crate::error::{DatabaseError, Result};
use crate::store::{JoinRequestStore, LinkageService, ReservedInsert, TransitionOutcome};
use async_trait::async_trait;
use pitchlink_models::{JoinRequest, JoinRequestStatus, NewJoinRequest, Resolution};
use sqlx::PgPool;
use uuid::Uuid;

const JOIN_REQUEST_COLUMNS: &str = r#"
    id, player_id, player_name, player_email, player_phone, organization_id,
    organization_type, organization_name, referral_id, referral_code, status,
    requested_at, processed_at, processed_by, processed_by_name, notes, player_data
"#;

#[derive(Clone)]
pub struct PgJoinRequestRepository {
    pool: PgPool,
}

impl PgJoinRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JoinRequestStore for PgJoinRequestRepository {
    async fn insert_reserving(&self, request: NewJoinRequest) -> Result<ReservedInsert> {
        let mut tx = self.pool.begin().await?;

        // Conditional increment; never read-then-write
        let reserved: Option<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE referrals
            SET current_usage = current_usage + 1, updated_at = NOW()
            WHERE id = $1
              AND (max_usage IS NULL OR current_usage < max_usage)
            RETURNING id
            "#,
        )
        .bind(request.referral_id)
        .fetch_optional(&mut *tx)
        .await?;

        if reserved.is_none() {
            tx.rollback().await?;
            return Ok(ReservedInsert::CapacityExceeded);
        }

        let player_data = serde_json::to_value(&request.player_data)
            .map_err(|e| DatabaseError::Internal(format!("Invalid player data: {}", e)))?;

        let inserted = sqlx::query_as::<_, JoinRequest>(&format!(
            r#"
            INSERT INTO join_requests
                (player_id, player_name, player_email, player_phone, organization_id,
                 organization_type, organization_name, referral_id, referral_code,
                 status, requested_at, player_data)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending', $10, $11)
            RETURNING {}
            "#,
            JOIN_REQUEST_COLUMNS
        ))
        .bind(request.player_id)
        .bind(&request.player_name)
        .bind(&request.player_email)
        .bind(&request.player_phone)
        .bind(request.organization_id)
        .bind(request.organization_type)
        .bind(&request.organization_name)
        .bind(request.referral_id)
        .bind(&request.referral_code)
        .bind(request.requested_at)
        .bind(player_data)
        .fetch_one(&mut *tx)
        .await;

        match inserted {
            Ok(join_request) => {
                tx.commit().await?;
                Ok(ReservedInsert::Created(join_request))
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                // Lost a race against another submission for the same pair;
                // rolling back also releases the reserved use.
                tx.rollback().await?;
                Ok(ReservedInsert::DuplicatePending)
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e.into())
            }
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<JoinRequest>> {
        let request = sqlx::query_as::<_, JoinRequest>(&format!(
            "SELECT {} FROM join_requests WHERE id = $1",
            JOIN_REQUEST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    async fn find_pending(
        &self,
        player_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<JoinRequest>> {
        let request = sqlx::query_as::<_, JoinRequest>(&format!(
            r#"
            SELECT {}
            FROM join_requests
            WHERE player_id = $1 AND organization_id = $2 AND status = 'pending'
            LIMIT 1
            "#,
            JOIN_REQUEST_COLUMNS
        ))
        .bind(player_id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    async fn list_by_organization(
        &self,
        organization_id: Uuid,
        status: Option<JoinRequestStatus>,
    ) -> Result<Vec<JoinRequest>> {
        let requests = sqlx::query_as::<_, JoinRequest>(&format!(
            r#"
            SELECT {}
            FROM join_requests
            WHERE organization_id = $1
              AND ($2::varchar IS NULL OR status = $2)
            ORDER BY requested_at DESC
            "#,
            JOIN_REQUEST_COLUMNS
        ))
        .bind(organization_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    async fn list_by_player(&self, player_id: Uuid) -> Result<Vec<JoinRequest>> {
        let requests = sqlx::query_as::<_, JoinRequest>(&format!(
            r#"
            SELECT {}
            FROM join_requests
            WHERE player_id = $1
            ORDER BY requested_at DESC
            "#,
            JOIN_REQUEST_COLUMNS
        ))
        .bind(player_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    async fn transition(
        &self,
        id: Uuid,
        resolution: Resolution,
        linkage: Option<&dyn LinkageService>,
    ) -> Result<TransitionOutcome> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent approvals of the same request
        let current: Option<(JoinRequestStatus,)> =
            sqlx::query_as("SELECT status FROM join_requests WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        match current {
            None => {
                tx.rollback().await?;
                return Ok(TransitionOutcome::NotFound);
            }
            Some((status,)) if status != JoinRequestStatus::Pending => {
                tx.rollback().await?;
                return Ok(TransitionOutcome::NotPending(status));
            }
            Some(_) => {}
        }

        let updated = sqlx::query_as::<_, JoinRequest>(&format!(
            r#"
            UPDATE join_requests
            SET status = $2, processed_at = $3, processed_by = $4,
                processed_by_name = $5, notes = $6
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            JOIN_REQUEST_COLUMNS
        ))
        .bind(id)
        .bind(resolution.status)
        .bind(resolution.processed_at)
        .bind(resolution.processed_by)
        .bind(&resolution.processed_by_name)
        .bind(&resolution.notes)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(linkage) = linkage {
            if let Err(e) = linkage.link_on(&mut *tx, &updated).await {
                tx.rollback().await?;
                return Ok(TransitionOutcome::LinkageFailed(e));
            }
        }

        tx.commit().await?;
        Ok(TransitionOutcome::Applied(updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Database, DatabaseConfig};
    use crate::repositories::players::PgLinkageService;
    use crate::repositories::referrals::PgReferralRepository;
    use crate::store::ReferralStore;
    use chrono::Utc;
    use pitchlink_models::{NewReferral, OrganizationType, PlayerData};
    use serde_json::json;
    use std::time::Duration;

    async fn setup() -> (PgPool, PgReferralRepository, PgJoinRequestRepository) {
        let db = Database::new(DatabaseConfig::from_env())
            .await
            .expect("Failed to connect to database");
        db.migrate().await.expect("Failed to run migrations");
        let pool = db.pool().clone();
        (
            pool.clone(),
            PgReferralRepository::new(pool.clone()),
            PgJoinRequestRepository::new(pool),
        )
    }

    fn request_for(referral: &pitchlink_models::Referral, player_id: Uuid) -> NewJoinRequest {
        NewJoinRequest {
            player_id,
            player_name: "Kit".to_string(),
            player_email: "kit@example.com".to_string(),
            player_phone: None,
            organization_id: referral.organization_id,
            organization_type: referral.organization_type,
            organization_name: referral.organization_name.clone(),
            referral_id: referral.id,
            referral_code: referral.code.clone(),
            requested_at: Utc::now(),
            player_data: PlayerData::default(),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore] // Only run with database available
    async fn test_concurrent_reservations_respect_cap() {
        let (_pool, referrals, requests) = setup().await;
        let code = format!("CLB{}", &Uuid::new_v4().simple().to_string()[..6].to_uppercase());
        let referral = referrals
            .insert(NewReferral {
                organization_id: Uuid::new_v4(),
                organization_type: OrganizationType::Club,
                organization_name: "Harbour United".to_string(),
                invite_link: format!("http://localhost:3000/join/org/{}", code),
                code,
                description: String::new(),
                max_usage: Some(3),
                expires_at: None,
            })
            .await
            .expect("Failed to insert referral");

        let mut handles = Vec::new();
        for _ in 0..10 {
            let requests = requests.clone();
            let new_request = request_for(&referral, Uuid::new_v4());
            handles.push(tokio::spawn(async move {
                requests.insert_reserving(new_request).await
            }));
        }

        let mut created = 0;
        for handle in handles {
            if let ReservedInsert::Created(_) = handle.await.unwrap().unwrap() {
                created += 1;
            }
        }

        assert_eq!(created, 3);
        let stored = referrals.find_by_id(referral.id).await.unwrap().unwrap();
        assert_eq!(stored.current_usage, 3);
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn test_duplicate_pending_releases_reservation() {
        let (_pool, referrals, requests) = setup().await;
        let code = format!("ACD{}", &Uuid::new_v4().simple().to_string()[..6].to_uppercase());
        let referral = referrals
            .insert(NewReferral {
                organization_id: Uuid::new_v4(),
                organization_type: OrganizationType::Academy,
                organization_name: "Northside Academy".to_string(),
                invite_link: format!("http://localhost:3000/join/org/{}", code),
                code,
                description: String::new(),
                max_usage: None,
                expires_at: None,
            })
            .await
            .unwrap();
        let player_id = Uuid::new_v4();

        let first = requests.insert_reserving(request_for(&referral, player_id)).await.unwrap();
        assert!(matches!(first, ReservedInsert::Created(_)));

        let second = requests.insert_reserving(request_for(&referral, player_id)).await.unwrap();
        assert!(matches!(second, ReservedInsert::DuplicatePending));

        let stored = referrals.find_by_id(referral.id).await.unwrap().unwrap();
        assert_eq!(stored.current_usage, 1);
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn test_approval_links_profile_inside_transaction() {
        // One connection: the profile write must reuse the transaction's
        let db = Database::new(DatabaseConfig {
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(2),
            ..DatabaseConfig::from_env()
        })
        .await
        .expect("Failed to connect to database");
        db.migrate().await.expect("Failed to run migrations");
        let pool = db.pool().clone();
        let referrals = PgReferralRepository::new(pool.clone());
        let requests = PgJoinRequestRepository::new(pool.clone());
        let linkage = PgLinkageService::new(pool.clone());

        let code = format!("TRN{}", &Uuid::new_v4().simple().to_string()[..6].to_uppercase());
        let referral = referrals
            .insert(NewReferral {
                organization_id: Uuid::new_v4(),
                organization_type: OrganizationType::Trainer,
                organization_name: "Coach Ada".to_string(),
                invite_link: format!("http://localhost:3000/join/org/{}", code),
                code,
                description: String::new(),
                max_usage: None,
                expires_at: None,
            })
            .await
            .unwrap();

        let player_id = Uuid::new_v4();
        sqlx::query("INSERT INTO players (id, name, email) VALUES ($1, 'Kit', 'kit@example.com')")
            .bind(player_id)
            .execute(&pool)
            .await
            .unwrap();

        let approval = || Resolution {
            status: JoinRequestStatus::Approved,
            processed_by: Uuid::new_v4(),
            processed_by_name: "Coach Ada".to_string(),
            notes: None,
            processed_at: Utc::now(),
        };

        let created = match requests
            .insert_reserving(request_for(&referral, player_id))
            .await
            .unwrap()
        {
            ReservedInsert::Created(request) => request,
            other => panic!("expected a created request, got {:?}", other),
        };
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            requests.transition(created.id, approval(), Some(&linkage as &dyn LinkageService)),
        )
        .await
        .expect("approval waited on a second connection")
        .unwrap();
        assert!(matches!(outcome, TransitionOutcome::Applied(_)));

        let (profile,): (serde_json::Value,) =
            sqlx::query_as("SELECT profile FROM players WHERE id = $1")
                .bind(player_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(profile["trainer_id"], json!(referral.organization_id));

        // Unknown player: the link fails and the request stays pending
        let orphan = match requests
            .insert_reserving(request_for(&referral, Uuid::new_v4()))
            .await
            .unwrap()
        {
            ReservedInsert::Created(request) => request,
            other => panic!("expected a created request, got {:?}", other),
        };
        let outcome = requests
            .transition(orphan.id, approval(), Some(&linkage as &dyn LinkageService))
            .await
            .unwrap();
        assert!(matches!(outcome, TransitionOutcome::LinkageFailed(_)));
        let stored = requests.find_by_id(orphan.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JoinRequestStatus::Pending);
    }
}
