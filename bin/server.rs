// Login Counter - Web Server
// Read-only counter views plus a login endpoint, with Axum

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use login_counter::{
    init_logging, Config, CounterView, Feature, LoginDispatcher, LoginEvent, LoginHook,
    ObjectRegistry, SqliteStore, Subject,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    registry: Arc<ObjectRegistry>,
    dispatcher: Arc<LoginDispatcher>,
    feature: Arc<Feature>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Capabilities the caller presents, comma separated in `x-capabilities`
fn capabilities(headers: &HeaderMap) -> Vec<String> {
    headers
        .get("x-capabilities")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').map(|c| c.trim().to_string()).filter(|c| !c.is_empty()).collect())
        .unwrap_or_default()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/feature - Feature declaration
async fn get_feature(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.feature.as_ref().clone()))
}

fn counter_view(state: &AppState, headers: &HeaderMap, subject: Subject) -> axum::response::Response {
    let caps = capabilities(headers);
    let caps: Vec<&str> = caps.iter().map(String::as_str).collect();

    if !state.feature.is_visible(subject.kind(), &caps) {
        return (
            StatusCode::FORBIDDEN,
            Json(ApiResponse::<CounterView>::err(format!(
                "capability '{}' required",
                state.feature.capability
            ))),
        )
            .into_response();
    }

    match state.feature.content(&subject, &state.registry) {
        Ok(Some(view)) => (StatusCode::OK, Json(ApiResponse::ok(view))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<CounterView>::err("login counter not available")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, subject = %subject, "Failed to read counter");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<CounterView>::err(e.to_string())),
            )
                .into_response()
        }
    }
}

/// GET /api/counters/user/:id - One user's login count
async fn get_user_counter(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    counter_view(&state, &headers, Subject::user(id))
}

/// GET /api/counters/role/:name - Summed login count of a role
async fn get_role_counter(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> impl IntoResponse {
    counter_view(&state, &headers, Subject::role(name))
}

/// POST /api/login - Record a successful login
async fn post_login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(event): Json<LoginEvent>,
) -> impl IntoResponse {
    let caps = capabilities(&headers);
    let caps: Vec<&str> = caps.iter().map(String::as_str).collect();

    if !state.feature.allows(&caps) {
        tracing::warn!(login = %event.login_name, "Rejected login report without capability");
        return (
            StatusCode::FORBIDDEN,
            Json(ApiResponse::<LoginEvent>::err(format!(
                "capability '{}' required",
                state.feature.capability
            ))),
        )
            .into_response();
    }

    match state.dispatcher.fire(&event) {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::ok(event))).into_response(),
        Err(e) => {
            tracing::error!(error = %e, login = %event.login_name, "Failed to record login");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<LoginEvent>::err(e.to_string())),
            )
                .into_response()
        }
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config_path = std::env::args().nth(1).map(std::path::PathBuf::from);
    let config = Config::load_or_default(config_path.as_deref())?;

    let store = Arc::new(SqliteStore::open(&config.database_path)?);
    tracing::info!(database = ?config.database_path, "Database opened");

    let registry = Arc::new(ObjectRegistry::with_login_counter(store.clone(), store.clone()));

    let mut dispatcher = LoginDispatcher::new();
    LoginHook::new(Arc::clone(&registry), store.clone()).bind(&mut dispatcher);

    let state = AppState {
        registry,
        dispatcher: Arc::new(dispatcher),
        feature: Arc::new(Feature::login_counter(&config)),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/feature", get(get_feature))
        .route("/counters/user/:id", get(get_user_counter))
        .route("/counters/role/:name", get(get_role_counter))
        .route("/login", post(post_login))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "Login counter server running");

    axum::serve(listener, app).await?;
    Ok(())
}
