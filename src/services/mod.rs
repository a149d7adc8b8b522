//! 服务层模块
//!
//! 包含所有业务逻辑服务:
//! - `browser_service`: 浏览器驱动,管理Chromium进程生命周期
//! - `connect_service`: 连接编排器,驱动登录状态机
//! - `crypto_service`: 凭证加密 (AEAD + 遗留XOR兼容)
//! - `totp_service`: RFC 6238 两步验证码生成
//! - `account_service`: 账号持久化,唯一冲突识别
//! - `config_service`: 环境变量配置加载
//!
//! # 设计原则
//!
//! 1. **存在即合理**: 每个服务都有单一职责,互不重叠
//! 2. **优雅即简约**: 方法签名清晰,易于理解和使用
//! 3. **错误处理**: 所有外部调用都有完整错误处理和日志
//! 4. **日志安全**: 记录关键操作,不记录敏感数据(密码、密钥、cookie值)
//!
//! # 服务架构
//!
//! ```text
//! ┌──────────────────┐
//! │   HTTP Server    │
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────────────────────────────┐
//! │             ConnectService               │
//! │  ┌─────────────┐  ┌──────────────────┐   │
//! │  │BrowserDriver│  │ TotpService      │   │
//! │  └──────┬──────┘  └──────────────────┘   │
//! │         │         ┌──────────────────┐   │
//! │         │         │ CredentialCipher │   │
//! │         │         └──────────────────┘   │
//! │  ┌──────▼──────────────────────────┐     │
//! │  │         AccountStore            │     │
//! │  └─────────────────────────────────┘     │
//! └──────────────────────────────────────────┘
//!          │                 │
//!          ▼                 ▼
//!      Chromium          PostgreSQL
//! ```

pub mod account_service;
pub mod browser_service;
pub mod config_service;
pub mod connect_service;
pub mod crypto_service;
pub mod totp_service;

// 重导出常用类型,简化外部引用
pub use account_service::{AccountStore, PostgresAccountStore};
pub use browser_service::{BrowserDriver, ChromiumDriver, ChromiumLauncher, DriverLauncher};
pub use config_service::AppConfig;
pub use connect_service::{ConnectService, ConnectStage, ConnectTimeouts};
pub use crypto_service::CredentialCipher;
pub use totp_service::TotpService;
