use crate::code_generator::{code_prefix, CodeGenerator, RandomCodeGenerator};
use crate::error::{ReferralError, Result};
use chrono::Utc;
use pitchlink_database::{DatabaseError, DynReferralStore};
use pitchlink_models::{
    is_valid_code_format, normalize_code, CreateReferral, NewReferral, OrganizationType,
    Referral, ReferralChanges, UpdateReferral,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Default bound on code generation attempts per `create`
pub const DEFAULT_MAX_CODE_ATTEMPTS: usize = 5;

/// Owner of the referral-code lifecycle
#[derive(Clone)]
pub struct ReferralRegistry {
    store: DynReferralStore,
    generator: Arc<dyn CodeGenerator>,
    base_url: String,
    max_code_attempts: usize,
}

impl ReferralRegistry {
    pub fn new(store: DynReferralStore, base_url: impl Into<String>) -> Self {
        Self {
            store,
            generator: Arc::new(RandomCodeGenerator),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_code_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn CodeGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_max_code_attempts(mut self, attempts: usize) -> Self {
        self.max_code_attempts = attempts.max(1);
        self
    }

    /// `{base_url}/join/org/{code}`
    pub fn invite_link(&self, code: &str) -> String {
        format!("{}/join/org/{}", self.base_url, code)
    }

    /// Issue a new referral code for an organization
    pub async fn create(
        &self,
        organization_id: Uuid,
        organization_type: OrganizationType,
        organization_name: &str,
        request: CreateReferral,
    ) -> Result<Referral> {
        request.validate()?;

        if organization_name.trim().is_empty() {
            return Err(ReferralError::Validation(
                "Organization name is required".to_string(),
            ));
        }
        if let Some(expires_at) = request.expires_at {
            if expires_at <= Utc::now() {
                return Err(ReferralError::Validation(
                    "Expiry must be in the future".to_string(),
                ));
            }
        }

        for attempt in 1..=self.max_code_attempts {
            let code = normalize_code(&self.generator.generate(organization_type.as_str()));

            if self.store.code_exists(&code).await? {
                tracing::debug!(
                    "Referral code collision on attempt {}/{}",
                    attempt,
                    self.max_code_attempts
                );
                continue;
            }

            let new_referral = NewReferral {
                organization_id,
                organization_type,
                organization_name: organization_name.trim().to_string(),
                invite_link: self.invite_link(&code),
                code,
                description: request.description.clone().unwrap_or_default(),
                max_usage: request.max_usage,
                expires_at: request.expires_at,
            };

            match self.store.insert(new_referral).await {
                Ok(referral) => {
                    tracing::info!(
                        "Referral created: id={}, code={}, organization_id={}",
                        referral.id,
                        referral.code,
                        organization_id
                    );
                    return Ok(referral);
                }
                // Another writer took the code between the check and the insert
                Err(DatabaseError::DuplicateEntry(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        tracing::error!(
            "Referral code generation exhausted after {} attempts for organization_id={}",
            self.max_code_attempts,
            organization_id
        );
        Err(ReferralError::GenerationExhausted)
    }

    /// Active, unexpired referral for a code; `None` otherwise.
    /// A code past `expires_at` no longer validates.
    pub async fn find_active_by_code(&self, code: &str) -> Result<Option<Referral>> {
        let code = normalize_code(code);
        if code.is_empty() {
            return Ok(None);
        }

        let referral = self.store.find_by_code(&code).await?;
        Ok(referral.filter(|r| r.is_redeemable_at(Utc::now())))
    }

    /// Atomically consume one use of the referral
    pub async fn reserve_usage(&self, referral_id: Uuid) -> Result<Referral> {
        match self.store.increment_usage_if_available(referral_id).await? {
            Some(referral) => Ok(referral),
            None => match self.store.find_by_id(referral_id).await? {
                Some(_) => Err(ReferralError::CapacityExceeded),
                None => Err(ReferralError::NotFound("Referral not found".to_string())),
            },
        }
    }

    /// Apply an owner-authorized update
    pub async fn update(
        &self,
        referral_id: Uuid,
        organization_id: Uuid,
        request: UpdateReferral,
    ) -> Result<Referral> {
        request.validate()?;

        let current = self.get(referral_id, organization_id).await?;

        let mut changes = ReferralChanges {
            code: None,
            is_active: request.is_active,
            max_usage: request.max_usage,
            description: request.description,
            expires_at: request.expires_at,
        };

        if let Some(code) = request.code {
            let code = normalize_code(&code);
            if !is_valid_code_format(&code) {
                return Err(ReferralError::Validation(format!(
                    "Referral code must be 3 letters followed by 6 letters or digits: {}",
                    code
                )));
            }
            let prefix = code_prefix(current.organization_type.as_str());
            if !code.starts_with(prefix) {
                return Err(ReferralError::Validation(format!(
                    "Referral code for a {} must start with {}: {}",
                    current.organization_type.as_str(),
                    prefix,
                    code
                )));
            }
            if code != current.code {
                if self.store.code_exists(&code).await? {
                    return Err(ReferralError::CodeInUse(code));
                }
                let invite_link = self.invite_link(&code);
                changes.code = Some((code, invite_link));
            }
        }

        let updated = self
            .store
            .update(referral_id, &changes)
            .await
            .map_err(|e| match e {
                DatabaseError::DuplicateEntry(_) => ReferralError::CodeInUse(
                    changes
                        .code
                        .as_ref()
                        .map(|(code, _)| code.clone())
                        .unwrap_or_default(),
                ),
                other => other.into(),
            })?;

        tracing::info!(
            "Referral updated: id={}, code={}, is_active={}",
            updated.id,
            updated.code,
            updated.is_active
        );

        Ok(updated)
    }

    /// Referral owned by `organization_id`
    pub async fn get(&self, referral_id: Uuid, organization_id: Uuid) -> Result<Referral> {
        let referral = self
            .store
            .find_by_id(referral_id)
            .await?
            .ok_or_else(|| ReferralError::NotFound("Referral not found".to_string()))?;

        if referral.organization_id != organization_id {
            tracing::warn!(
                "Organization {} attempted to access referral {} owned by {}",
                organization_id,
                referral_id,
                referral.organization_id
            );
            return Err(ReferralError::AuthorizationError(
                "Referral belongs to another organization".to_string(),
            ));
        }

        Ok(referral)
    }

    pub async fn list_for_organization(&self, organization_id: Uuid) -> Result<Vec<Referral>> {
        Ok(self.store.list_by_organization(organization_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pitchlink_database::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns the scripted codes in order, then repeats the last one
    struct ScriptedGenerator {
        codes: Vec<&'static str>,
        calls: AtomicUsize,
    }

    impl ScriptedGenerator {
        fn new(codes: Vec<&'static str>) -> Self {
            Self {
                codes,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl CodeGenerator for ScriptedGenerator {
        fn generate(&self, _organization_type: &str) -> String {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            self.codes[i.min(self.codes.len() - 1)].to_string()
        }
    }

    fn registry() -> ReferralRegistry {
        ReferralRegistry::new(Arc::new(InMemoryStore::new()), "https://pitchlink.test/")
    }

    async fn create(registry: &ReferralRegistry, org: Uuid, max_usage: Option<i32>) -> Referral {
        registry
            .create(
                org,
                OrganizationType::Club,
                "Harbour United",
                CreateReferral {
                    max_usage,
                    ..Default::default()
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_sets_initial_state() {
        let registry = registry();
        let org = Uuid::new_v4();
        let referral = create(&registry, org, Some(10)).await;

        assert!(referral.code.starts_with("CLB"));
        assert!(is_valid_code_format(&referral.code));
        assert_eq!(
            referral.invite_link,
            format!("https://pitchlink.test/join/org/{}", referral.code)
        );
        assert_eq!(referral.current_usage, 0);
        assert!(referral.is_active);
        assert_eq!(referral.max_usage, Some(10));
        assert_eq!(referral.organization_id, org);
    }

    #[tokio::test]
    async fn test_create_retries_on_collision() {
        let store = Arc::new(InMemoryStore::new());
        let generator = Arc::new(ScriptedGenerator::new(vec!["CLBAAAAAA", "CLBAAAAAA", "CLBBBBBBB"]));
        let registry = ReferralRegistry::new(store, "https://pitchlink.test")
            .with_generator(generator.clone());

        let first = create(&registry, Uuid::new_v4(), None).await;
        assert_eq!(first.code, "CLBAAAAAA");

        let second = create(&registry, Uuid::new_v4(), None).await;
        assert_eq!(second.code, "CLBBBBBBB");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_create_gives_up_after_retry_budget() {
        let store = Arc::new(InMemoryStore::new());
        let generator = Arc::new(ScriptedGenerator::new(vec!["CLBAAAAAA"]));
        let registry = ReferralRegistry::new(store, "https://pitchlink.test")
            .with_generator(generator.clone());

        create(&registry, Uuid::new_v4(), None).await;

        let err = registry
            .create(
                Uuid::new_v4(),
                OrganizationType::Club,
                "Other FC",
                CreateReferral::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReferralError::GenerationExhausted));
        assert_eq!(
            generator.calls.load(Ordering::SeqCst),
            1 + DEFAULT_MAX_CODE_ATTEMPTS
        );
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_payload() {
        let registry = registry();
        let err = registry
            .create(
                Uuid::new_v4(),
                OrganizationType::Agent,
                "Agency",
                CreateReferral {
                    expires_at: Some(Utc::now() - Duration::hours(1)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReferralError::Validation(_)));

        let err = registry
            .create(
                Uuid::new_v4(),
                OrganizationType::Agent,
                "Agency",
                CreateReferral {
                    max_usage: Some(0),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReferralError::Validation(_)));
    }

    #[tokio::test]
    async fn test_find_active_by_code_normalizes() {
        let registry = registry();
        let referral = create(&registry, Uuid::new_v4(), None).await;

        let lookup = format!("  {}  ", referral.code.to_lowercase());
        let found = registry.find_active_by_code(&lookup).await.unwrap().unwrap();
        assert_eq!(found.id, referral.id);

        assert!(registry.find_active_by_code("").await.unwrap().is_none());
        assert!(registry.find_active_by_code("CLB000000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_active_by_code_skips_inactive_and_expired() {
        let registry = registry();
        let org = Uuid::new_v4();
        let inactive = create(&registry, org, None).await;
        registry
            .update(
                inactive.id,
                org,
                UpdateReferral {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(registry.find_active_by_code(&inactive.code).await.unwrap().is_none());

        let expiring = registry
            .create(
                org,
                OrganizationType::Club,
                "Harbour United",
                CreateReferral {
                    expires_at: Some(Utc::now() + Duration::milliseconds(50)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(registry.find_active_by_code(&expiring.code).await.unwrap().is_some());

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        assert!(registry.find_active_by_code(&expiring.code).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reserve_usage_respects_cap() {
        let registry = registry();
        let referral = create(&registry, Uuid::new_v4(), Some(1)).await;

        let reserved = registry.reserve_usage(referral.id).await.unwrap();
        assert_eq!(reserved.current_usage, 1);

        let err = registry.reserve_usage(referral.id).await.unwrap_err();
        assert!(matches!(err, ReferralError::CapacityExceeded));

        let err = registry.reserve_usage(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ReferralError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_reserve_usage_unbounded() {
        let registry = registry();
        let referral = create(&registry, Uuid::new_v4(), None).await;
        for expected in 1..=25 {
            let reserved = registry.reserve_usage(referral.id).await.unwrap();
            assert_eq!(reserved.current_usage, expected);
        }
    }

    #[tokio::test]
    async fn test_update_requires_owner() {
        let registry = registry();
        let org = Uuid::new_v4();
        let referral = create(&registry, org, None).await;

        let err = registry
            .update(
                referral.id,
                Uuid::new_v4(),
                UpdateReferral {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReferralError::AuthorizationError(_)));

        let unchanged = registry.get(referral.id, org).await.unwrap();
        assert!(unchanged.is_active);
    }

    #[tokio::test]
    async fn test_update_code_recomputes_invite_link() {
        let registry = registry();
        let org = Uuid::new_v4();
        let referral = create(&registry, org, None).await;

        let updated = registry
            .update(
                referral.id,
                org,
                UpdateReferral {
                    code: Some(" clbsummer ".to_string()),
                    description: Some("Summer intake".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.code, "CLBSUMMER");
        assert_eq!(updated.invite_link, "https://pitchlink.test/join/org/CLBSUMMER");
        assert_eq!(updated.description, "Summer intake");
        assert!(registry.find_active_by_code(&referral.code).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_code_collision_and_format() {
        let registry = registry();
        let org = Uuid::new_v4();
        let first = create(&registry, org, None).await;
        let second = create(&registry, org, None).await;

        // Taken codes stay taken even once their referral is disabled
        registry
            .update(
                first.id,
                org,
                UpdateReferral {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = registry
            .update(
                second.id,
                org,
                UpdateReferral {
                    code: Some(first.code.to_lowercase()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReferralError::CodeInUse(_)));

        let err = registry
            .update(
                second.id,
                org,
                UpdateReferral {
                    code: Some("BAD".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReferralError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_code_keeps_type_prefix() {
        let registry = registry();
        let org = Uuid::new_v4();
        let referral = create(&registry, org, None).await;

        let err = registry
            .update(
                referral.id,
                org,
                UpdateReferral {
                    code: Some("AGT123456".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReferralError::Validation(_)));

        let stored = registry.get(referral.id, org).await.unwrap();
        assert_eq!(stored.code, referral.code);

        let renamed = registry
            .update(
                referral.id,
                org,
                UpdateReferral {
                    code: Some("clb123456".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.code, "CLB123456");
        assert_eq!(renamed.organization_type, OrganizationType::Club);
    }

    #[tokio::test]
    async fn test_list_for_organization() {
        let registry = registry();
        let org = Uuid::new_v4();
        create(&registry, org, None).await;
        create(&registry, org, Some(3)).await;
        create(&registry, Uuid::new_v4(), None).await;

        let listed = registry.list_for_organization(org).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|r| r.organization_id == org));
        assert!(listed[0].created_at >= listed[1].created_at);
    }
}
