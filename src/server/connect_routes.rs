//! 账号连接端点
//!
//! POST /api/accounts/connect
//!
//! 状态码约定:
//! - 400: 输入校验 / 登录类失败 (凭证错误、缺少两步验证密钥、
//!        登录验证失败、超时、网络变化)
//! - 401: 鉴权失败 (由中间件处理)
//! - 409: 账号已连接
//! - 500: 未预期的内部错误

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use tracing::info;

use crate::models::{ConnectError, ConnectionRequest, ConnectionResult};
use crate::server::auth::AuthUser;
use crate::state::AppState;

/// 连接一个Instagram账号
pub async fn connect_account(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(request): Json<ConnectionRequest>,
) -> (StatusCode, Json<ConnectionResult>) {
    info!(user_id = %user_id, username = %request.username, "收到账号连接请求");

    let outcome = state.connector.connect(user_id, &request).await;

    let status = match &outcome {
        Ok(_) => StatusCode::OK,
        Err(err) => status_for(err),
    };

    (status, Json(ConnectionResult::from_outcome(&outcome)))
}

/// 错误分类到HTTP状态码的映射
fn status_for(err: &ConnectError) -> StatusCode {
    match err {
        ConnectError::InvalidInput { .. }
        | ConnectError::LoginRejected
        | ConnectError::TwoFactorMissing
        | ConnectError::HomeVerificationFailed
        | ConnectError::NetworkTimeout
        | ConnectError::NetworkChanged => StatusCode::BAD_REQUEST,
        ConnectError::DuplicateAccount => StatusCode::CONFLICT,
        ConnectError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
