use std::env;

/// 应用配置
///
/// 启动时从环境变量一次性加载。
/// 加密密钥是硬性要求: 缺失时直接拒绝启动,
/// 绝不静默退回到弱保护存储。
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP监听地址
    pub bind_addr: String,

    /// 凭证加密密钥材料
    pub encryption_key: String,

    /// 是否无头运行Chromium
    pub headless: bool,

    /// 传递给Chromium的附加参数
    pub browser_args: Vec<String>,
}

impl AppConfig {
    /// 从环境变量加载配置
    ///
    /// 读取的变量:
    /// - BIND_ADDR: 监听地址 (默认: 127.0.0.1:8080)
    /// - CREDENTIAL_ENCRYPTION_KEY: 凭证加密密钥 (必需)
    /// - BROWSER_HEADLESS: 无头模式开关 (默认: true)
    /// - BROWSER_ARGS: 逗号分隔的Chromium参数 (默认: 沙箱相关参数)
    pub fn from_env() -> Result<Self, String> {
        let bind_addr =
            env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

        let encryption_key = env::var("CREDENTIAL_ENCRYPTION_KEY")
            .map_err(|_| "缺少必需的环境变量 CREDENTIAL_ENCRYPTION_KEY".to_string())?;
        if encryption_key.trim().is_empty() {
            return Err("CREDENTIAL_ENCRYPTION_KEY 不能为空".to_string());
        }

        let headless = env::var("BROWSER_HEADLESS")
            .map(|v| parse_bool(&v))
            .unwrap_or(true);

        let browser_args = env::var("BROWSER_ARGS")
            .map(|v| parse_args(&v))
            .unwrap_or_else(|_| {
                vec![
                    "--no-sandbox".to_string(),
                    "--disable-setuid-sandbox".to_string(),
                    "--disable-dev-shm-usage".to_string(),
                ]
            });

        Ok(Self {
            bind_addr,
            encryption_key,
            headless,
            browser_args,
        })
    }
}

/// 解析布尔型环境变量
///
/// "0" / "false" / "no" / "off" 为假,其余为真
fn parse_bool(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

/// 解析逗号分隔的参数列表,忽略空段
fn parse_args(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
