use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 连接流程错误分类
///
/// 覆盖从输入校验到持久化的所有失败场景。
/// 每个变体都有一条稳定的、面向用户的消息,调用方据此区分
/// "凭证错误"、"缺少两步验证密钥"、"无法确认登录"等情况,
/// 而不是收到一条笼统的失败信息。
/// 底层驱动/数据库的原始错误绝不直接透出。
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[serde(tag = "error", content = "details")]
pub enum ConnectError {
    /// 输入校验失败
    ///
    /// 在任何浏览器活动之前短路返回,不消耗自动化资源
    #[error("{message}")]
    InvalidInput { field: String, message: String },

    /// 登录被拒绝 (用户名或密码错误)
    #[error("Invalid username or password")]
    LoginRejected,

    /// 需要两步验证但未提供密钥
    ///
    /// 与 LoginRejected 区分,调用方可据此专门提示用户补充密钥
    #[error("Two-factor authentication is required but no two-factor secret was provided")]
    TwoFactorMissing,

    /// 登录后验证失败
    ///
    /// 页面未出现登录成功的标志元素,即使没有显式报错。
    /// 防止静默登录失败被误判为成功。
    #[error("Unable to verify successful authentication with Instagram")]
    HomeVerificationFailed,

    /// 网络超时
    ///
    /// 页面导航或元素等待超出时限
    #[error("Network timeout while communicating with Instagram")]
    NetworkTimeout,

    /// 网络连接变化
    ///
    /// 登录过程中底层网络连接中断或切换
    #[error("Network connection changed during the connection attempt")]
    NetworkChanged,

    /// 账号已连接 (user_id + username 唯一约束冲突)
    #[error("This Instagram account is already connected")]
    DuplicateAccount,

    /// 未预期的内部错误
    #[error("An unexpected error occurred while connecting the account")]
    Unknown(String),
}

impl ConnectError {
    /// 构造字段级校验错误
    pub fn invalid_input(field: &str, message: &str) -> Self {
        ConnectError::InvalidInput {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// 浏览器驱动错误
///
/// 驱动层内部分类,由编排器统一映射为 ConnectError。
/// 网络超时、导航失败、元素未找到是互相独立的失败条件。
#[derive(Debug, Error)]
pub enum DriverError {
    /// 浏览器进程启动失败
    #[error("浏览器启动失败: {0}")]
    Launch(String),

    /// 页面导航失败
    #[error("页面导航失败: {0}")]
    Navigation(String),

    /// 等待元素超时
    #[error("等待元素超时: {0}")]
    WaitTimeout(String),

    /// 元素未找到
    #[error("元素未找到: {0}")]
    ElementNotFound(String),

    /// 页面脚本执行失败
    #[error("脚本执行失败: {0}")]
    Evaluation(String),

    /// 底层网络连接变化
    #[error("网络连接中断或变化")]
    NetworkChanged,

    /// CDP协议层错误
    #[error("浏览器协议错误: {0}")]
    Protocol(String),
}

/// 驱动错误到连接错误的默认映射
///
/// 注意: 登录后验证阶段的 WaitTimeout 由编排器单独处理
/// (映射为 HomeVerificationFailed 而非 NetworkTimeout)。
impl From<DriverError> for ConnectError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::WaitTimeout(_) => ConnectError::NetworkTimeout,
            DriverError::NetworkChanged => ConnectError::NetworkChanged,
            DriverError::Navigation(msg) if msg.contains("ERR_NETWORK_CHANGED") => {
                ConnectError::NetworkChanged
            }
            other => ConnectError::Unknown(other.to_string()),
        }
    }
}

/// 凭证加密错误
///
/// 加密失败必须响亮报错,绝不静默降级为弱保护存储
#[derive(Debug, Error)]
pub enum CryptoError {
    /// AEAD加密失败
    #[error("凭证加密失败")]
    EncryptFailed,

    /// AEAD解密失败 (密文被篡改或密钥不匹配)
    #[error("凭证解密失败: 密文无效或密钥不匹配")]
    DecryptFailed,

    /// 密文编码格式无效
    #[error("密文格式无效: {0}")]
    InvalidCiphertext(String),
}

/// TOTP生成错误
#[derive(Debug, Error)]
pub enum TotpError {
    /// 共享密钥不是有效的base32编码
    #[error("两步验证密钥格式无效: {0}")]
    InvalidSecret(String),
}

/// 账号存储错误
///
/// 持久化层的错误在此归类: 唯一约束冲突被单独识别,
/// 其余后端错误不区分细节。
#[derive(Debug, Error)]
pub enum StoreError {
    /// (user_id, username) 唯一约束冲突
    #[error("账号已存在")]
    Duplicate,

    /// 其他数据库错误
    #[error("存储操作失败: {0}")]
    Backend(String),
}

impl From<StoreError> for ConnectError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => ConnectError::DuplicateAccount,
            StoreError::Backend(msg) => ConnectError::Unknown(msg),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return StoreError::Duplicate;
            }
        }
        StoreError::Backend(err.to_string())
    }
}

impl From<CryptoError> for ConnectError {
    fn from(err: CryptoError) -> Self {
        ConnectError::Unknown(err.to_string())
    }
}

impl From<TotpError> for ConnectError {
    fn from(err: TotpError) -> Self {
        ConnectError::Unknown(err.to_string())
    }
}
