use axum::{
    extract::State,
    http::Method,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::db::repository::Store;
use crate::server::config::ServerConfig;
use crate::server::group_broadcaster::GroupBroadcaster;
use crate::services::auth_service;
use crate::web::{
    error::AppError,
    handlers::ws_group_handler,
    middleware::auth,
    models::{AuthenticatedUser, LoginRequest, LoginResponse, RegisterRequest},
    routes::*,
};

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub broadcaster: Arc<GroupBroadcaster>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: Arc<ServerConfig>) -> Self {
        Self {
            store,
            broadcaster: Arc::new(GroupBroadcaster::new(config.broadcast_capacity)),
            config,
        }
    }
}

fn auth_cookie(token: &str) -> Cookie<'static> {
    Cookie::build(("token", token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(true)
        .build()
}

async fn register_handler(
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<RegisterRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let response =
        auth_service::register_user(app_state.store.as_ref(), &app_state.config, payload).await?;
    Ok((jar.add(auth_cookie(&response.token)), Json(response)))
}

async fn login_handler(
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response =
        auth_service::login_user(app_state.store.as_ref(), &app_state.config, payload).await?;
    Ok((jar.add(auth_cookie(&response.token)), Json(response)))
}

async fn me_handler(Extension(user): Extension<AuthenticatedUser>) -> Json<AuthenticatedUser> {
    Json(user)
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn create_axum_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let require_auth = || axum_middleware::from_fn_with_state(app_state.clone(), auth::auth);

    Router::new()
        .route("/api/health", get(health_check_handler))
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/me", get(me_handler).route_layer(require_auth()))
        .nest("/api/user", user_routes::create_user_router().route_layer(require_auth()))
        .route("/api/match", get(match_routes::match_handler).route_layer(require_auth()))
        .nest("/api/groups", group_routes::create_group_router().route_layer(require_auth()))
        .nest("/api/messages", message_routes::create_message_router().route_layer(require_auth()))
        .nest("/api/tasks", task_routes::create_task_router().route_layer(require_auth()))
        .nest("/api/notes", note_routes::create_note_router().route_layer(require_auth()))
        .route("/ws/groups", get(ws_group_handler::group_ws_handler))
        .with_state(app_state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
