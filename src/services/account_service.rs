//! 账号存储服务
//!
//! 职责: 连接成功后将 StoredAccount 写入PostgreSQL。
//! 唯一约束 (user_id, username) 的冲突在此被识别并归类为
//! Duplicate,与其他后端错误区分; 本服务之外的调用方
//! 不接触sqlx原始错误。

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::errors::StoreError;
use crate::models::{AccountStatus, NewAccount, StoredAccount};

/// 账号存储接口
///
/// trait形式暴露,测试时注入内存假实现即可覆盖
/// 重复连接等持久化分支
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// 插入新账号记录
    ///
    /// (user_id, username) 冲突返回 StoreError::Duplicate
    async fn insert(&self, account: NewAccount) -> Result<StoredAccount, StoreError>;
}

/// PostgreSQL实现
pub struct PostgresAccountStore {
    pool: PgPool,
}

impl PostgresAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 解析bearer令牌对应的用户
    ///
    /// 端点鉴权在任何自动化工作开始前执行,
    /// 令牌的签发机制不在本服务范围内
    pub async fn find_user_by_token(&self, token: &str) -> Result<Option<Uuid>, StoreError> {
        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT user_id FROM api_tokens WHERE token = $1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(user_id,)| user_id))
    }
}

#[async_trait]
impl AccountStore for PostgresAccountStore {
    async fn insert(&self, account: NewAccount) -> Result<StoredAccount, StoreError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let status = AccountStatus::Active;

        let session_data = serde_json::to_value(&account.session_data)
            .map_err(|e| StoreError::Backend(format!("会话数据序列化失败: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO connected_accounts
                (id, user_id, username, encrypted_password, encrypted_two_factor_secret,
                 session_data, status, last_connected, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(id)
        .bind(account.user_id)
        .bind(&account.username)
        .bind(&account.encrypted_password)
        .bind(&account.encrypted_two_factor_secret)
        .bind(&session_data)
        .bind(status.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(
            account_id = %id,
            user_id = %account.user_id,
            username = %account.username,
            "账号记录写入成功"
        );

        Ok(StoredAccount {
            id,
            user_id: account.user_id,
            username: account.username,
            encrypted_password: account.encrypted_password,
            encrypted_two_factor_secret: account.encrypted_two_factor_secret,
            session_data,
            status,
            last_connected: now,
            created_at: now,
        })
    }
}
