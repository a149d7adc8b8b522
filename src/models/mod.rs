//! 数据模型模块
//!
//! 包含所有核心数据结构:
//! - errors: 错误类型定义 (连接、驱动、加密、TOTP、存储错误)
//! - connection_request: 连接请求 (输入校验与脱敏)
//! - connection_result: 连接结果 (成功/失败不变式、会话工件)
//! - account: 账号实体 (持久化记录与生命周期状态)
//!
//! # 设计原则
//!
//! 1. **存在即合理**: 每个字段都有明确目的,无冗余
//! 2. **优雅即简约**: 类型名自文档化,代码自我阐述
//! 3. **错误处理**: 所有校验返回 Result,提供完整上下文
//! 4. **日志安全**: 敏感数据不记录到日志 (密码、密钥、cookie值)

pub mod account;
pub mod connection_request;
pub mod connection_result;
pub mod errors;

// 重导出常用类型,简化外部引用
pub use account::{AccountStatus, NewAccount, StoredAccount};
pub use connection_request::ConnectionRequest;
pub use connection_result::{
    AccountData, ConnectedSession, ConnectionResult, ScrapedProfile, SessionCookie, SessionData,
};
pub use errors::{ConnectError, CryptoError, DriverError, StoreError, TotpError};
