//! 端点鉴权中间件
//!
//! 调用方必须携带标识用户身份的bearer令牌;
//! 无令牌或令牌无效的请求在任何自动化工作开始前被拒绝 (401)。

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::warn;
use uuid::Uuid;

use crate::models::ConnectionResult;
use crate::state::AppState;

/// 已鉴权的请求方
///
/// 由中间件写入请求扩展,处理器通过 Extension 提取
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

/// Bearer令牌校验
pub async fn require_bearer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        return unauthorized("Missing authentication token");
    };

    match state.store.find_user_by_token(token).await {
        Ok(Some(user_id)) => {
            request.extensions_mut().insert(AuthUser(user_id));
            next.run(request).await
        }
        Ok(None) => unauthorized("Invalid authentication token"),
        Err(e) => {
            warn!(error = %e, "令牌校验查询失败");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ConnectionResult::failure(
                    "An unexpected error occurred while connecting the account",
                )),
            )
                .into_response()
        }
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ConnectionResult::failure(message)),
    )
        .into_response()
}
