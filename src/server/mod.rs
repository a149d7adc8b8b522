//! HTTP服务模块
//!
//! 对外暴露两个端点:
//! - `POST /api/accounts/connect`: 账号连接 (bearer令牌鉴权)
//! - `GET /api/health`: 存活探针 (命中数据库连接池)

pub mod auth;
pub mod connect_routes;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{middleware, Router};

use crate::state::AppState;

/// 组装路由
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/accounts/connect", post(connect_routes::connect_account))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ))
        .route("/api/health", get(health))
        .with_state(state)
}

/// 健康检查
async fn health(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match state.db.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "database unavailable"),
    }
}
