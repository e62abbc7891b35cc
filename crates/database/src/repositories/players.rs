use crate::error::{DatabaseError, Result};
use crate::store::{LinkageService, PlayerRepository};
use async_trait::async_trait;
use pitchlink_models::{JoinRequest, PlayerLookup, PlayerRecord, PlayerSource, ProfileLinkage};
use serde_json::Value;
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

/// Resolves players from the dedicated `players` table first, then from
/// player-typed rows of the shared `users` table.
#[derive(Clone)]
pub struct PgPlayerRepository {
    pool: PgPool,
}

impl PgPlayerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn find_in<'e>(
    executor: impl PgExecutor<'e>,
    source: PlayerSource,
    player_id: Uuid,
) -> Result<Option<PlayerRecord>> {
    let record = sqlx::query_as::<_, PlayerRecord>(&format!(
        r#"
        SELECT id, name, email, phone, account_type, profile
        FROM {}
        WHERE id = $1
        "#,
        source.table_name()
    ))
    .bind(player_id)
    .fetch_optional(executor)
    .await?;

    Ok(record)
}

#[async_trait]
impl PlayerRepository for PgPlayerRepository {
    async fn find_by_id(&self, player_id: Uuid) -> Result<Option<PlayerLookup>> {
        for source in [PlayerSource::Players, PlayerSource::Users] {
            if let Some(record) = find_in(&self.pool, source, player_id).await? {
                return Ok(Some(PlayerLookup { source, record }));
            }
        }
        Ok(None)
    }
}

/// Merges affiliation fields into the player's JSON profile in whichever
/// table the player lives in.
#[derive(Clone)]
pub struct PgLinkageService {
    pool: PgPool,
}

impl PgLinkageService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LinkageService for PgLinkageService {
    async fn link(&self, request: &JoinRequest) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        self.link_on(&mut *conn, request).await
    }

    async fn link_on(&self, conn: &mut PgConnection, request: &JoinRequest) -> Result<()> {
        let linkage = ProfileLinkage::from_request(request).ok_or_else(|| {
            DatabaseError::Internal(format!(
                "Join request {} is not approved; nothing to link",
                request.id
            ))
        })?;

        let mut source = None;
        for candidate in [PlayerSource::Players, PlayerSource::Users] {
            if find_in(&mut *conn, candidate, request.player_id).await?.is_some() {
                source = Some(candidate);
                break;
            }
        }
        let source = source
            .ok_or_else(|| DatabaseError::not_found("Player", &request.player_id.to_string()))?;

        let result = sqlx::query(&format!(
            r#"
            UPDATE {}
            SET profile = profile || $2::jsonb, updated_at = NOW()
            WHERE id = $1
            "#,
            source.table_name()
        ))
        .bind(request.player_id)
        .bind(Value::Object(linkage.to_profile_fields()))
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Player", &request.player_id.to_string()));
        }

        tracing::info!(
            "Linked player_id={} to {}={} via code {}",
            request.player_id,
            linkage.foreign_key_field(),
            request.organization_id,
            request.referral_code
        );

        Ok(())
    }
}
