/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use teamsync_api::{app::{build_router, AppState}, config::Config};
/// use teamsync_shared::store::InMemoryStore;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let state = AppState::new(Arc::new(InMemoryStore::new()), config);
/// let app = build_router(state);
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::config::Config;
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use teamsync_shared::{
    auth::middleware::create_jwt_middleware,
    presence::Rooms,
    services::CoreServices,
    store::Store,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Core services over the configured store
    pub core: CoreServices,

    /// WebSocket connections of this process
    pub rooms: Arc<Rooms>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires the core services to a store and a fresh set of rooms
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        let rooms = Arc::new(Rooms::new());
        let core = CoreServices::new(store, rooms.clone(), config.core.clone());
        Self {
            core,
            rooms,
            config: Arc::new(config),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.cors_permissive() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET  /health                        # store ping (public)
/// └── /v1/
///     ├── POST   /users                   # register (public)
///     ├── GET    /realtime?token=…        # WebSocket (token in query)
///     ├── GET    /users
///     ├── PUT    /admin/users/:id/admin
///     ├── GET    /admin/teams
///     ├── GET    /teams, POST /teams
///     ├── GET    /teams/:id, DELETE /teams/:id
///     ├── POST   /teams/:id/members
///     ├── DELETE /teams/:id/members/:user_id
///     ├── PUT    /teams/:id/leader
///     ├── POST   /teams/:id/leave
///     ├── GET    /tasks, POST /tasks
///     ├── GET    /tasks/:id, PUT /tasks/:id, DELETE /tasks/:id
///     ├── GET    /notifications
///     ├── PUT    /notifications/:id/read
///     └── DELETE /notifications/:id
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. JWT authentication (protected routes only)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let public_routes = Router::new()
        .route("/users", post(routes::users::register))
        .route("/realtime", get(routes::realtime::realtime));

    let protected_routes = Router::new()
        .route("/users", get(routes::users::list_users))
        .route("/admin/users/:id/admin", put(routes::users::set_admin))
        .route("/admin/teams", get(routes::teams::list_all_teams))
        .route(
            "/teams",
            get(routes::teams::list_my_teams).post(routes::teams::create_team),
        )
        .route(
            "/teams/:id",
            get(routes::teams::get_team).delete(routes::teams::delete_team),
        )
        .route("/teams/:id/members", post(routes::teams::add_member))
        .route(
            "/teams/:id/members/:user_id",
            delete(routes::teams::remove_member),
        )
        .route("/teams/:id/leader", put(routes::teams::assign_leader))
        .route("/teams/:id/leave", post(routes::teams::leave_team))
        .route(
            "/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/tasks/:id",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route("/notifications", get(routes::notifications::list_notifications))
        .route(
            "/notifications/:id/read",
            put(routes::notifications::mark_read),
        )
        .route(
            "/notifications/:id",
            delete(routes::notifications::delete_notification),
        )
        .layer(middleware::from_fn(create_jwt_middleware(
            state.config.jwt.secret.clone(),
        )));

    let v1_routes = Router::new().merge(public_routes).merge(protected_routes);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .with_state(state)
}
