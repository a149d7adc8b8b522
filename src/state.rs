use std::sync::Arc;

use crate::database::DatabaseManager;
use crate::services::{
    AppConfig, ChromiumLauncher, ConnectService, CredentialCipher, PostgresAccountStore,
};

/// 应用全局状态
///
/// 存在即合理: 每个字段代表应用核心能力的单一来源
/// - db: 数据持久化根基
/// - store: 账号与令牌存储入口
/// - connector: 账号连接编排器
#[derive(Clone)]
pub struct AppState {
    /// 数据库管理器: 健康检查与连接池
    pub db: DatabaseManager,

    /// 账号存储: 唯一的持久化入口
    pub store: Arc<PostgresAccountStore>,

    /// 连接服务: 唯一的Instagram自动化通道
    pub connector: Arc<ConnectService>,
}

impl AppState {
    /// 初始化应用状态
    ///
    /// 加密密钥缺失等配置问题在此之前已拒绝启动 -
    /// 不完整的状态等同于无用
    pub fn new(db: DatabaseManager, config: &AppConfig) -> Self {
        let store = Arc::new(PostgresAccountStore::new(db.pool().clone()));
        let launcher = Arc::new(ChromiumLauncher::new(
            config.headless,
            config.browser_args.clone(),
        ));
        let cipher = CredentialCipher::new(&config.encryption_key);

        let connector = Arc::new(ConnectService::new(launcher, store.clone(), cipher));

        tracing::info!(
            bind_addr = %config.bind_addr,
            headless = config.headless,
            "AppState initialized"
        );

        Self {
            db,
            store,
            connector,
        }
    }
}
