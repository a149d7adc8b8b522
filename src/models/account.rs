use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::connection_result::{AccountData, ScrapedProfile, SessionData};

/// 账号生命周期状态
///
/// 连接成功时总是 Active; Warning/Error 由后续的
/// 外呼自动化任务在运行中变更 (本服务只负责写入初始状态)。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Warning,
    Error,
}

impl AccountStatus {
    /// 数据库TEXT列的存储值
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Warning => "warning",
            AccountStatus::Error => "error",
        }
    }
}

impl std::str::FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AccountStatus::Active),
            "warning" => Ok(AccountStatus::Warning),
            "error" => Ok(AccountStatus::Error),
            _ => Err(format!("Unknown account status: {}", s)),
        }
    }
}

/// 待插入的账号记录
///
/// 凭证字段已是密文,由编排器在持久化前加密。
/// 明文密码/密钥绝不出现在此结构中。
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// 所属用户
    pub user_id: Uuid,

    /// 平台用户名 (同一用户下唯一)
    pub username: String,

    /// 加密后的密码
    pub encrypted_password: String,

    /// 加密后的两步验证密钥 (可空)
    pub encrypted_two_factor_secret: Option<String>,

    /// 最近一次成功登录的会话工件
    pub session_data: SessionData,

    /// 抓取的个人主页数据
    pub profile: ScrapedProfile,
}

/// 持久化的账号实体
///
/// 对应 `connected_accounts` 表的一行。
/// (user_id, username) 的唯一性由数据库约束保证,
/// 重复连接尝试在插入时以冲突失败。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub encrypted_password: String,
    pub encrypted_two_factor_secret: Option<String>,
    pub session_data: serde_json::Value,
    pub status: AccountStatus,
    pub last_connected: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl StoredAccount {
    /// 组装对外返回的账号数据
    ///
    /// 抓取字段来自本次连接的个人主页数据,
    /// 身份字段来自已持久化的记录。
    pub fn to_account_data(&self, profile: &ScrapedProfile) -> AccountData {
        AccountData {
            id: self.id,
            username: self.username.clone(),
            status: self.status,
            followers: profile.followers,
            following: profile.following,
            posts: profile.posts,
            profile_picture: profile.profile_picture.clone(),
            bio: profile.bio.clone(),
            is_verified: profile.is_verified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_round_trip() {
        for status in [
            AccountStatus::Active,
            AccountStatus::Warning,
            AccountStatus::Error,
        ] {
            let parsed = AccountStatus::from_str(status.as_str()).unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!(AccountStatus::from_str("banned").is_err());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&AccountStatus::Active).unwrap();
        assert_eq!(json, "\"active\"");
    }
}
