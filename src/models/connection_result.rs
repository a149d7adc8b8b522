use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::account::AccountStatus;
use crate::models::errors::ConnectError;

/// 会话Cookie
///
/// 登录成功后从浏览器捕获的单条cookie。
/// 值是敏感数据,不写入日志 (仅允许记录键名)。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
}

/// 会话数据
///
/// 最近一次成功登录的会话工件,作为不透明JSON存入
/// `connected_accounts.session_data`,供后续自动化复用。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    /// 登录成功时的cookie集合
    pub cookies: Vec<SessionCookie>,

    /// 浏览器上报的User-Agent
    pub user_agent: String,

    /// 捕获时间
    pub captured_at: DateTime<Utc>,
}

impl SessionData {
    /// 获取cookie键名样本 (用于日志,不含值)
    pub fn cookie_names_for_logging(&self) -> String {
        let mut names: Vec<&str> = self.cookies.iter().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        names.join(", ")
    }
}

/// 抓取的个人主页数据
///
/// 登录成功后从用户个人主页DOM提取。
/// 任何单独缺失的字段都回退为空值/零值,不使整个操作失败
/// (部分数据容忍)。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapedProfile {
    /// 粉丝数
    pub followers: i64,

    /// 关注数
    pub following: i64,

    /// 帖子数
    pub posts: i64,

    /// 头像URL
    pub profile_picture: String,

    /// 个人简介
    pub bio: String,

    /// 是否有认证徽章
    pub is_verified: bool,
}

/// 连接成功后的完整采集结果
///
/// 个人主页数据 + 会话工件,由编排器在持久化前组装
#[derive(Debug, Clone)]
pub struct ConnectedSession {
    pub profile: ScrapedProfile,
    pub session: SessionData,
}

/// 对外返回的账号数据
///
/// 仅在 success = true 时出现在 ConnectionResult 中
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountData {
    pub id: Uuid,
    pub username: String,
    pub status: AccountStatus,
    pub followers: i64,
    pub following: i64,
    pub posts: i64,
    pub profile_picture: String,
    pub bio: String,
    pub is_verified: bool,
}

/// 连接流程结果
///
/// 不变式: `account_data` 有值 当且仅当 `success` 为 true。
/// 该不变式由构造函数保证,不存在"成功但无数据"或
/// "失败但带数据"的响应。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionResult {
    pub success: bool,

    /// 人类可读的结果或错误描述
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_data: Option<AccountData>,
}

impl ConnectionResult {
    /// 构造成功结果
    pub fn connected(data: AccountData) -> Self {
        Self {
            success: true,
            message: "Instagram account connected successfully".to_string(),
            account_data: Some(data),
        }
    }

    /// 构造失败结果
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            account_data: None,
        }
    }

    /// 从编排器输出构造
    ///
    /// 失败时使用错误分类的稳定消息
    pub fn from_outcome(outcome: &Result<AccountData, ConnectError>) -> Self {
        match outcome {
            Ok(data) => Self::connected(data.clone()),
            Err(err) => Self::failure(err.to_string()),
        }
    }
}
