use insta_connect::database::DatabaseManager;
use insta_connect::server;
use insta_connect::services::AppConfig;
use insta_connect::state::AppState;
use insta_connect::utils::logger;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 环境变量优先于 .env 文件
    dotenvy::dotenv().ok();

    // 初始化日志系统
    logger::init()?;

    let config = AppConfig::from_env()?;

    // 数据库连接与迁移,任一失败都拒绝启动
    let db = DatabaseManager::from_env().await?;
    db.migrate().await?;
    db.health_check().await?;

    let state = AppState::new(db, &config);
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "HTTP服务已启动");

    axum::serve(listener, app).await?;

    Ok(())
}
