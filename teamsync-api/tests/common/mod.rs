/// Common test utilities for integration tests
///
/// Builds the full router over an [`InMemoryStore`] with a seeded admin, and
/// provides request helpers. No database is needed.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use teamsync_api::app::{build_router, AppState};
use teamsync_api::config::{ApiConfig, Config, DatabaseConfig, JwtConfig};
use teamsync_shared::auth::jwt::{create_token, Claims, TokenType};
use teamsync_shared::config::CoreConfig;
use teamsync_shared::models::{Role, User, UserId};
use teamsync_shared::store::{InMemoryStore, Store};
use tower::ServiceExt;

pub const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

/// Test context containing all necessary resources
pub struct TestContext {
    pub app: axum::Router,
    pub state: AppState,
    pub admin: User,
}

pub fn test_config() -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
        },
        database: DatabaseConfig {
            url: "postgresql://unused".to_string(),
            max_connections: 1,
        },
        jwt: JwtConfig {
            secret: SECRET.to_string(),
        },
        core: CoreConfig::default(),
    }
}

/// Mints an access token for a user
pub fn token_for(user_id: UserId, role: Role) -> String {
    create_token(&Claims::new(user_id, role, TokenType::Access), SECRET).unwrap()
}

impl TestContext {
    pub async fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let admin = User::new_admin("Root", "root@example.com");
        let mut tx = store.begin().await.unwrap();
        tx.insert_user(&admin).await.unwrap();
        tx.commit().await.unwrap();

        let state = AppState::new(store, test_config());
        let app = build_router(state.clone());
        Self { app, state, admin }
    }

    pub fn admin_token(&self) -> String {
        token_for(self.admin.id, Role::Admin)
    }

    /// Registers a user through the API and returns it with a token
    pub async fn register(&self, name: &str) -> (User, String) {
        let (status, body) = self
            .send(
                "POST",
                "/v1/users",
                None,
                Some(serde_json::json!({
                    "name": name,
                    "email": format!("{}@example.com", name.to_lowercase()),
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);

        let user: User = serde_json::from_value(body).unwrap();
        let token = token_for(user.id, Role::Member);
        (user, token)
    }

    /// Sends one request and returns status and parsed JSON body
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}
