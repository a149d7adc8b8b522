//! Instagram账号连接自动化服务
//!
//! 通过无头浏览器执行真实登录流程,处理凭证提交、两步验证、
//! 安全挑战,提取会话工件并加密存储凭证。
//!
//! 模块划分:
//! - `models`: 数据结构与错误分类
//! - `services`: 浏览器驱动、连接编排、加密、TOTP、账号存储
//! - `database`: PostgreSQL连接池与迁移
//! - `server`: HTTP端点与鉴权
//! - `state`: 应用全局状态
//! - `utils`: 日志初始化

pub mod database;
pub mod models;
pub mod server;
pub mod services;
pub mod state;
pub mod utils;
