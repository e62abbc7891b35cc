use crate::handlers;
use crate::middleware;
use crate::AppState;
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub fn create_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        // Referral management (organization accounts)
        .route(
            "/api/referrals",
            post(handlers::referral::create_referral).get(handlers::referral::list_referrals),
        )
        .route(
            "/api/referrals/:id",
            get(handlers::referral::get_referral).patch(handlers::referral::update_referral),
        )
        // Join requests
        .route(
            "/api/join-requests",
            post(handlers::join_request::submit_join_request),
        )
        .route(
            "/api/join-requests/mine",
            get(handlers::join_request::my_join_requests),
        )
        .route(
            "/api/join-requests/:id/approve",
            post(handlers::join_request::approve_join_request),
        )
        .route(
            "/api/join-requests/:id/reject",
            post(handlers::join_request::reject_join_request),
        )
        .route(
            "/api/organizations/join-requests",
            get(handlers::join_request::organization_join_requests),
        )
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        // Health check
        .route("/health", get(handlers::health::health_check))
        // Code preview for the signup page (public)
        .route(
            "/api/referrals/validate/:code",
            get(handlers::referral::validate_code),
        )
        .merge(protected)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;
    use crate::jwt::{JwtService, OrganizationClaims};
    use crate::Stores;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use pitchlink_database::InMemoryStore;
    use pitchlink_models::{PlayerRecord, PlayerSource};
    use pitchlink_referral::NotificationPublisher;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    const SECRET: &str = "router-test-secret";

    struct TestApp {
        router: Router,
        store: Arc<InMemoryStore>,
        jwt: JwtService,
    }

    impl TestApp {
        fn new() -> Self {
            let store = Arc::new(InMemoryStore::new());
            let (notifier, _events) = NotificationPublisher::channel();
            let state = Arc::new(AppState::new(
                StorageBackend::Memory,
                Stores::in_memory(store.clone()),
                JwtService::new(SECRET),
                "https://pitchlink.test",
                5,
                notifier,
            ));

            Self {
                router: create_router(state),
                store,
                jwt: JwtService::new(SECRET),
            }
        }

        fn organization_token(&self, organization_id: Uuid) -> String {
            self.jwt
                .generate_access_token(
                    Uuid::new_v4(),
                    "staff@harbour.test",
                    "Harbour Staff",
                    "club",
                    Some(OrganizationClaims {
                        id: organization_id,
                        organization_type: "club".to_string(),
                        name: "Harbour United".to_string(),
                    }),
                )
                .unwrap()
        }

        async fn player_token(&self) -> (Uuid, String) {
            let id = Uuid::new_v4();
            self.store
                .put_player(
                    PlayerSource::Players,
                    PlayerRecord {
                        id,
                        name: "Kit Marlow".to_string(),
                        email: "kit@example.com".to_string(),
                        phone: None,
                        account_type: "player".to_string(),
                        profile: json!({}),
                    },
                )
                .await;

            let token = self
                .jwt
                .generate_access_token(id, "kit@example.com", "Kit Marlow", "player", None)
                .unwrap();
            (id, token)
        }

        async fn send(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> Response {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
            }
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            self.router.clone().oneshot(request).await.unwrap()
        }
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new();
        let response = app.send(Method::GET, "/health", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["storage"], "memory");
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let app = TestApp::new();

        let response = app.send(Method::GET, "/api/referrals", None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "missing_auth_header");

        let response = app
            .send(Method::GET, "/api/referrals", Some("garbage"), None)
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_referral_to_approval_flow() {
        let app = TestApp::new();
        let organization_id = Uuid::new_v4();
        let org_token = app.organization_token(organization_id);
        let (player_id, player_token) = app.player_token().await;

        let response = app
            .send(
                Method::POST,
                "/api/referrals",
                Some(&org_token),
                Some(json!({ "description": "Spring trials", "max_usage": 10 })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let referral = json_body(response).await;
        let code = referral["code"].as_str().unwrap().to_string();
        assert!(code.starts_with("CLB"));
        assert_eq!(
            referral["invite_link"],
            format!("https://pitchlink.test/join/org/{}", code)
        );

        let response = app
            .send(
                Method::GET,
                &format!("/api/referrals/validate/{}", code.to_lowercase()),
                None,
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let preview = json_body(response).await;
        assert_eq!(preview["organization_name"], "Harbour United");
        assert_eq!(preview["remaining_usage"], 10);

        let response = app
            .send(
                Method::POST,
                "/api/join-requests",
                Some(&player_token),
                Some(json!({ "referral_code": code, "position": "goalkeeper", "age": 16 })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let request = json_body(response).await;
        assert_eq!(request["status"], "pending");
        assert_eq!(request["player_data"]["position"], "goalkeeper");
        let request_id = request["id"].as_str().unwrap().to_string();

        let response = app
            .send(
                Method::GET,
                "/api/organizations/join-requests?status=pending",
                Some(&org_token),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await.as_array().unwrap().len(), 1);

        let response = app
            .send(
                Method::POST,
                &format!("/api/join-requests/{}/approve", request_id),
                Some(&org_token),
                Some(json!({ "notes": "See you Saturday" })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let approved = json_body(response).await;
        assert_eq!(approved["status"], "approved");
        assert_eq!(approved["processed_by_name"], "Harbour Staff");

        let profile = app.store.player_profile(player_id).await.unwrap();
        assert_eq!(profile["club_id"], json!(organization_id));

        let response = app
            .send(
                Method::POST,
                &format!("/api/join-requests/{}/reject", request_id),
                Some(&org_token),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(response).await["error"], "already_processed");

        let response = app
            .send(Method::GET, "/api/join-requests/mine", Some(&player_token), None)
            .await;
        let mine = json_body(response).await;
        assert_eq!(mine[0]["status"], "approved");
    }

    #[tokio::test]
    async fn test_players_cannot_manage_referrals() {
        let app = TestApp::new();
        let (_, player_token) = app.player_token().await;

        let response = app
            .send(Method::POST, "/api/referrals", Some(&player_token), Some(json!({})))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["error"], "organization_required");
    }

    #[tokio::test]
    async fn test_other_organization_cannot_process_or_edit() {
        let app = TestApp::new();
        let owner = app.organization_token(Uuid::new_v4());
        let intruder = app.organization_token(Uuid::new_v4());
        let (_, player_token) = app.player_token().await;

        let referral = json_body(
            app.send(Method::POST, "/api/referrals", Some(&owner), Some(json!({})))
                .await,
        )
        .await;
        let referral_id = referral["id"].as_str().unwrap().to_string();

        let response = app
            .send(
                Method::PATCH,
                &format!("/api/referrals/{}", referral_id),
                Some(&intruder),
                Some(json!({ "is_active": false })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let request = json_body(
            app.send(
                Method::POST,
                "/api/join-requests",
                Some(&player_token),
                Some(json!({ "referral_code": referral["code"] })),
            )
            .await,
        )
        .await;

        let response = app
            .send(
                Method::POST,
                &format!("/api/join-requests/{}/approve", request["id"].as_str().unwrap()),
                Some(&intruder),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_business_errors_on_submit() {
        let app = TestApp::new();
        let org_token = app.organization_token(Uuid::new_v4());
        let (_, player_token) = app.player_token().await;

        let response = app
            .send(Method::GET, "/api/referrals/validate/CLBZZZZZZ", None, None)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "invalid_code");

        let referral = json_body(
            app.send(
                Method::POST,
                "/api/referrals",
                Some(&org_token),
                Some(json!({ "max_usage": 1 })),
            )
            .await,
        )
        .await;
        let body = json!({ "referral_code": referral["code"] });

        // An organization account is not a player
        let response = app
            .send(Method::POST, "/api/join-requests", Some(&org_token), Some(body.clone()))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["error"], "ineligible_account");

        let response = app
            .send(Method::POST, "/api/join-requests", Some(&player_token), Some(body.clone()))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .send(Method::POST, "/api/join-requests", Some(&player_token), Some(body.clone()))
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(response).await["error"], "duplicate_pending");

        let (_, second_player) = app.player_token().await;
        let response = app
            .send(Method::POST, "/api/join-requests", Some(&second_player), Some(body))
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(response).await["error"], "capacity_exceeded");
    }
}
