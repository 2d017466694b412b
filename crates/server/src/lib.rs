//! Bug tracker backend: accounts, projects, bugs and comments behind an
//! ownership-checked REST API with rotating cookie sessions.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

pub use config::Config;
use db::{collections::CollectionReader, credentials::CredentialStore, Database};
use error::ErrorBody;
use services::{ownership::OwnershipVerifier, tokens::TokenService};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub credentials: CredentialStore,
    pub tokens: TokenService,
    pub ownership: OwnershipVerifier,
    pub collections: CollectionReader,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        let credentials = CredentialStore::new(db.pool.clone());
        let tokens = TokenService::from_config(&config, credentials.clone());

        Self {
            ownership: OwnershipVerifier::new(db.pool.clone()),
            collections: CollectionReader::new(db.pool.clone()),
            credentials,
            tokens,
            config,
            db,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    // Build protected routes (require authentication)
    let protected_routes = Router::new()
        .nest("/accounts", routes::accounts::router())
        .nest("/projects", routes::projects::router())
        .nest("/bugs", routes::bugs::router())
        .nest("/comments", routes::comments::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    // Build API router
    let api_router = Router::new()
        .route("/accounts/register", post(routes::accounts::register))
        .nest("/auth", routes::auth::router())
        .merge(protected_routes)
        .fallback(api_not_found);

    let static_dir = &state.config.static_dir;
    let spa = ServeDir::new(static_dir)
        .not_found_service(ServeFile::new(format!("{static_dir}/index.html")));

    let cors = build_cors_layer(&state.config);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_router)
        .fallback_service(spa)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn api_not_found() -> impl IntoResponse {
    let mut errors = error::FieldErrors::new();
    errors.insert("path".to_string(), "Not found".to_string());
    (StatusCode::NOT_FOUND, Json(ErrorBody { errors }))
}

/// Cookies only cross origins when a concrete front-end origin is configured.
fn build_cors_layer(config: &Config) -> CorsLayer {
    let origin = config
        .cors_origin
        .as_deref()
        .and_then(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = o, "Ignoring unparseable CORS_ORIGIN");
                None
            }
        });

    match origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    }
}
