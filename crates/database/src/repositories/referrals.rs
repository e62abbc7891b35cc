use crate::error::{DatabaseError, Result};
use crate::store::ReferralStore;
use async_trait::async_trait;
use pitchlink_models::{normalize_code, NewReferral, Referral, ReferralChanges};
use sqlx::PgPool;
use uuid::Uuid;

const REFERRAL_COLUMNS: &str = r#"
    id, organization_id, organization_type, organization_name, code, invite_link,
    description, is_active, max_usage, current_usage, created_at, updated_at, expires_at
"#;

#[derive(Clone)]
pub struct PgReferralRepository {
    pool: PgPool,
}

impl PgReferralRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReferralStore for PgReferralRepository {
    async fn insert(&self, referral: NewReferral) -> Result<Referral> {
        let code = normalize_code(&referral.code);

        let created = sqlx::query_as::<_, Referral>(&format!(
            r#"
            INSERT INTO referrals
                (organization_id, organization_type, organization_name, code, invite_link,
                 description, max_usage, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            REFERRAL_COLUMNS
        ))
        .bind(referral.organization_id)
        .bind(referral.organization_type)
        .bind(&referral.organization_name)
        .bind(&code)
        .bind(&referral.invite_link)
        .bind(&referral.description)
        .bind(referral.max_usage)
        .bind(referral.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx(e, "Referral", "this code"))?;

        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Referral>> {
        let referral = sqlx::query_as::<_, Referral>(&format!(
            "SELECT {} FROM referrals WHERE id = $1",
            REFERRAL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(referral)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Referral>> {
        let referral = sqlx::query_as::<_, Referral>(&format!(
            "SELECT {} FROM referrals WHERE UPPER(TRIM(code)) = $1",
            REFERRAL_COLUMNS
        ))
        .bind(normalize_code(code))
        .fetch_optional(&self.pool)
        .await?;

        Ok(referral)
    }

    async fn code_exists(&self, code: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM referrals WHERE UPPER(TRIM(code)) = $1)",
        )
        .bind(normalize_code(code))
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn list_by_organization(&self, organization_id: Uuid) -> Result<Vec<Referral>> {
        let referrals = sqlx::query_as::<_, Referral>(&format!(
            r#"
            SELECT {}
            FROM referrals
            WHERE organization_id = $1
            ORDER BY created_at DESC
            "#,
            REFERRAL_COLUMNS
        ))
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(referrals)
    }

    async fn increment_usage_if_available(&self, id: Uuid) -> Result<Option<Referral>> {
        let referral = sqlx::query_as::<_, Referral>(&format!(
            r#"
            UPDATE referrals
            SET current_usage = current_usage + 1, updated_at = NOW()
            WHERE id = $1
              AND (max_usage IS NULL OR current_usage < max_usage)
            RETURNING {}
            "#,
            REFERRAL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(referral)
    }

    async fn update(&self, id: Uuid, changes: &ReferralChanges) -> Result<Referral> {
        let (code, invite_link) = match &changes.code {
            Some((code, link)) => (Some(normalize_code(code)), Some(link.clone())),
            None => (None, None),
        };

        let referral = sqlx::query_as::<_, Referral>(&format!(
            r#"
            UPDATE referrals
            SET code = COALESCE($2, code),
                invite_link = COALESCE($3, invite_link),
                is_active = COALESCE($4, is_active),
                max_usage = COALESCE($5, max_usage),
                description = COALESCE($6, description),
                expires_at = COALESCE($7, expires_at),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            REFERRAL_COLUMNS
        ))
        .bind(id)
        .bind(code)
        .bind(invite_link)
        .bind(changes.is_active)
        .bind(changes.max_usage)
        .bind(&changes.description)
        .bind(changes.expires_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx(e, "Referral", "this code"))?;

        referral.ok_or_else(|| DatabaseError::not_found("Referral", &id.to_string()))
    }
}
