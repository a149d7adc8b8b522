//! 账号连接编排器 - 核心业务逻辑
//!
//! 职责:
//! - 按显式状态机推进Instagram登录流程
//! - 解读页面状态 (登录错误 / 两步验证 / 安全挑战 / 登录成功)
//! - 抓取个人主页数据并捕获会话工件
//! - 加密凭证并写入账号存储
//!
//! 状态转换:
//!
//! ```text
//! Init -> NavigatedToLogin -> CredentialsEntered
//!      -> (TwoFactorRequired -> TwoFactorEntered)?
//!      -> (ChallengeDetected -> ChallengeDismissed)?
//!      -> AuthenticatedHomeVerified -> ProfileScraped -> Done
//! ```
//!
//! 任一步骤失败即终止本次尝试 (单次尝试,无重试),
//! 浏览器进程在所有路径上都被关闭恰好一次。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use regex::Regex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::errors::{ConnectError, DriverError};
use crate::models::{
    AccountData, ConnectedSession, ConnectionRequest, NewAccount, ScrapedProfile, SessionData,
};
use crate::services::account_service::AccountStore;
use crate::services::browser_service::{BrowserDriver, DriverLauncher};
use crate::services::crypto_service::CredentialCipher;
use crate::services::totp_service::TotpService;

const LOGIN_URL: &str = "https://www.instagram.com/accounts/login/";
const PROFILE_URL_BASE: &str = "https://www.instagram.com/";

const USERNAME_INPUT: &str = "input[name=\"username\"]";
const PASSWORD_INPUT: &str = "input[name=\"password\"]";
const LOGIN_SUBMIT: &str = "button[type=\"submit\"]";

/// 登录失败时的内联错误元素
const INLINE_ERROR: &str = "#slfErrorAlert, p[data-testid=\"login-error-message\"]";

/// 两步验证码输入框
const TWO_FACTOR_INPUT: &str = "input[name=\"verificationCode\"]";
const TWO_FACTOR_SUBMIT: &str = "form button[type=\"button\"]";

/// 登录成功后的标志元素
const HOME_LANDMARK: &str = "svg[aria-label=\"Home\"]";

/// "是你本人吗"安全挑战的确认按钮 (尽力而为,找不到不算失败)
const CHALLENGE_DISMISS_JS: &str = r#"
(() => {
  const buttons = Array.from(document.querySelectorAll('button'));
  const hit = buttons.find(b => /this was me|it was me/i.test(b.textContent || ''));
  if (hit) { hit.click(); return true; }
  return false;
})()
"#;

/// 个人主页抓取脚本
///
/// 每个字段单独兜底为空值,页面结构局部变化不影响其余字段
const PROFILE_SCRAPE_JS: &str = r#"
(() => {
  const text = (el) => (el && (el.textContent || '').trim()) || '';
  const items = Array.from(document.querySelectorAll('header section ul li'));
  const avatar = document.querySelector('header img');
  return {
    postsCount: items[0] ? text(items[0]) : '',
    followersCount: items[1] ? text(items[1]) : '',
    followingCount: items[2] ? text(items[2]) : '',
    profilePicture: (avatar && avatar.src) || '',
    bio: text(document.querySelector('header section h1')),
    isVerified: document.querySelector('header [aria-label="Verified"]') !== null
  };
})()
"#;

/// 流程阶段
///
/// 每次转换记录一条结构化日志,失败时日志中可见终止点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStage {
    Init,
    NavigatedToLogin,
    CredentialsEntered,
    TwoFactorRequired,
    TwoFactorEntered,
    ChallengeDetected,
    ChallengeDismissed,
    AuthenticatedHomeVerified,
    ProfileScraped,
    Done,
}

impl std::fmt::Display for ConnectStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectStage::Init => "Init",
            ConnectStage::NavigatedToLogin => "NavigatedToLogin",
            ConnectStage::CredentialsEntered => "CredentialsEntered",
            ConnectStage::TwoFactorRequired => "TwoFactorRequired",
            ConnectStage::TwoFactorEntered => "TwoFactorEntered",
            ConnectStage::ChallengeDetected => "ChallengeDetected",
            ConnectStage::ChallengeDismissed => "ChallengeDismissed",
            ConnectStage::AuthenticatedHomeVerified => "AuthenticatedHomeVerified",
            ConnectStage::ProfileScraped => "ProfileScraped",
            ConnectStage::Done => "Done",
        };
        f.write_str(name)
    }
}

/// 提交凭证后的页面判定
///
/// 按优先级分类: 内联错误 > 两步验证输入框 > 继续
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubmitVerdict {
    InlineError,
    TwoFactor,
    Proceed,
}

/// 各阶段的有界等待配置
///
/// 每个等待有独立的固定时限,没有组合的整体deadline,
/// 没有退避,没有重试 (单次尝试设计)。
#[derive(Debug, Clone)]
pub struct ConnectTimeouts {
    /// 登录表单出现的等待时限
    pub login_form_wait: Duration,

    /// 提交后页面判定的轮询总时限
    pub classify_wait: Duration,

    /// 判定轮询间隔
    pub classify_poll: Duration,

    /// 登录成功标志元素的等待时限
    pub home_wait: Duration,

    /// 字段间拟人停顿范围 (毫秒)
    pub field_pause_ms: (u64, u64),
}

impl Default for ConnectTimeouts {
    fn default() -> Self {
        Self {
            login_form_wait: Duration::from_secs(10),
            classify_wait: Duration::from_secs(8),
            classify_poll: Duration::from_millis(500),
            home_wait: Duration::from_secs(10),
            field_pause_ms: (500, 1500),
        }
    }
}

/// 账号连接服务
///
/// 每次 `connect` 调用是一次独立的顺序操作: 不共享浏览器,
/// 不持有跨调用的可变状态,并发调用互不影响
/// (唯一性约束由数据库保证)。
pub struct ConnectService {
    launcher: Arc<dyn DriverLauncher>,
    store: Arc<dyn AccountStore>,
    cipher: CredentialCipher,
    timeouts: ConnectTimeouts,
}

impl ConnectService {
    pub fn new(
        launcher: Arc<dyn DriverLauncher>,
        store: Arc<dyn AccountStore>,
        cipher: CredentialCipher,
    ) -> Self {
        Self {
            launcher,
            store,
            cipher,
            timeouts: ConnectTimeouts::default(),
        }
    }

    /// 覆盖默认时限 (测试用短时限)
    pub fn with_timeouts(mut self, timeouts: ConnectTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// 执行一次完整的连接尝试
    ///
    /// 1. 输入校验 (违规则不启动浏览器)
    /// 2. 启动独占浏览器,驱动登录状态机
    /// 3. 无论成败,关闭浏览器恰好一次
    /// 4. 成功时加密凭证并写入存储
    pub async fn connect(
        &self,
        user_id: Uuid,
        request: &ConnectionRequest,
    ) -> Result<AccountData, ConnectError> {
        request.validate()?;

        info!(
            username = %request.username,
            two_factor = request.has_two_factor_secret(),
            "开始账号连接尝试"
        );

        let driver = self.launcher.launch().await.map_err(ConnectError::from)?;

        let flow_outcome = self.run_flow(driver.as_ref(), request).await;

        // 保证所有路径上的进程回收
        if let Err(e) = driver.close().await {
            warn!(error = %e, "浏览器关闭失败");
        }

        let connected = flow_outcome?;

        let account = self.persist(user_id, request, &connected).await?;

        info!(
            username = %request.username,
            account_id = %account.id,
            followers = account.followers,
            "账号连接成功"
        );

        Ok(account)
    }

    /// 登录状态机主体
    async fn run_flow(
        &self,
        driver: &dyn BrowserDriver,
        request: &ConnectionRequest,
    ) -> Result<ConnectedSession, ConnectError> {
        let mut stage = ConnectStage::Init;

        driver.navigate(LOGIN_URL).await?;
        self.advance(&mut stage, ConnectStage::NavigatedToLogin);

        driver
            .wait_for_selector(USERNAME_INPUT, self.timeouts.login_form_wait)
            .await?;

        driver.type_humanlike(USERNAME_INPUT, &request.username).await?;
        self.humanlike_pause().await;
        driver.type_humanlike(PASSWORD_INPUT, &request.password).await?;
        self.humanlike_pause().await;
        self.advance(&mut stage, ConnectStage::CredentialsEntered);

        driver.click(LOGIN_SUBMIT).await?;

        match self.classify_submit(driver).await? {
            SubmitVerdict::InlineError => {
                info!(username = %request.username, "登录被拒绝: 页面显示错误提示");
                return Err(ConnectError::LoginRejected);
            }
            SubmitVerdict::TwoFactor => {
                self.advance(&mut stage, ConnectStage::TwoFactorRequired);
                self.submit_two_factor(driver, request).await?;
                self.advance(&mut stage, ConnectStage::TwoFactorEntered);
            }
            SubmitVerdict::Proceed => {}
        }

        if self.dismiss_challenge(driver).await {
            self.advance(&mut stage, ConnectStage::ChallengeDetected);
            self.advance(&mut stage, ConnectStage::ChallengeDismissed);
        }

        // 缺少成功标志即判定失败,即使页面没有显式报错。
        // 防止静默登录失败被当作成功写入存储。
        match driver
            .wait_for_selector(HOME_LANDMARK, self.timeouts.home_wait)
            .await
        {
            Ok(()) => self.advance(&mut stage, ConnectStage::AuthenticatedHomeVerified),
            Err(DriverError::WaitTimeout(_)) => {
                warn!(username = %request.username, "未检测到登录成功标志");
                return Err(ConnectError::HomeVerificationFailed);
            }
            Err(other) => return Err(other.into()),
        }

        let profile = self.scrape_profile(driver, &request.username).await?;
        self.advance(&mut stage, ConnectStage::ProfileScraped);

        let cookies = driver.read_cookies().await?;
        let user_agent = match driver.user_agent().await {
            Ok(ua) => ua,
            Err(e) => {
                warn!(error = %e, "读取User-Agent失败,使用空值");
                String::new()
            }
        };

        let session = SessionData {
            cookies,
            user_agent,
            captured_at: Utc::now(),
        };

        debug!(
            cookie_names = %session.cookie_names_for_logging(),
            "会话工件捕获完成"
        );

        self.advance(&mut stage, ConnectStage::Done);

        Ok(ConnectedSession { profile, session })
    }

    /// 提交后的页面判定
    ///
    /// 按优先级轮询: 内联错误 > 两步验证输入框 > 成功标志。
    /// 时限内三者皆未出现时直接放行,由登录后验证兜底。
    async fn classify_submit(
        &self,
        driver: &dyn BrowserDriver,
    ) -> Result<SubmitVerdict, ConnectError> {
        let deadline = tokio::time::Instant::now() + self.timeouts.classify_wait;

        loop {
            if self.selector_present(driver, INLINE_ERROR).await? {
                return Ok(SubmitVerdict::InlineError);
            }
            if self.selector_present(driver, TWO_FACTOR_INPUT).await? {
                return Ok(SubmitVerdict::TwoFactor);
            }
            if self.selector_present(driver, HOME_LANDMARK).await? {
                return Ok(SubmitVerdict::Proceed);
            }

            if tokio::time::Instant::now() >= deadline {
                debug!("提交判定超时,进入登录后验证");
                return Ok(SubmitVerdict::Proceed);
            }
            tokio::time::sleep(self.timeouts.classify_poll).await;
        }
    }

    /// 两步验证处理
    ///
    /// 未提供密钥时返回独立于 LoginRejected 的错误,
    /// 调用方可据此专门提示用户补充密钥
    async fn submit_two_factor(
        &self,
        driver: &dyn BrowserDriver,
        request: &ConnectionRequest,
    ) -> Result<(), ConnectError> {
        if !request.has_two_factor_secret() {
            info!(username = %request.username, "需要两步验证但未提供密钥");
            return Err(ConnectError::TwoFactorMissing);
        }

        let secret = request.two_factor_secret.as_deref().unwrap_or_default();
        let code = TotpService::generate(secret)?;

        driver.type_humanlike(TWO_FACTOR_INPUT, &code).await?;
        self.humanlike_pause().await;
        driver.click(TWO_FACTOR_SUBMIT).await?;
        Ok(())
    }

    /// 尽力而为的安全挑战处理
    ///
    /// "是你本人吗"确认页不一定出现,找不到或点击失败都不算错误
    async fn dismiss_challenge(&self, driver: &dyn BrowserDriver) -> bool {
        match driver.evaluate(CHALLENGE_DISMISS_JS).await {
            Ok(value) => {
                let dismissed = value.as_bool().unwrap_or(false);
                if dismissed {
                    info!("安全挑战确认按钮已点击");
                }
                dismissed
            }
            Err(e) => {
                debug!(error = %e, "安全挑战检测失败,忽略");
                false
            }
        }
    }

    /// 抓取个人主页数据
    ///
    /// 任何单独缺失的字段回退为空值/零值,不使整个操作失败
    async fn scrape_profile(
        &self,
        driver: &dyn BrowserDriver,
        username: &str,
    ) -> Result<ScrapedProfile, ConnectError> {
        let profile_url = format!("{}{}/", PROFILE_URL_BASE, username);
        driver.navigate(&profile_url).await?;

        let raw = match driver.evaluate(PROFILE_SCRAPE_JS).await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "主页抓取脚本失败,返回空数据");
                serde_json::Value::Null
            }
        };

        let text_field = |key: &str| -> String {
            raw.get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };

        Ok(ScrapedProfile {
            followers: parse_count(&text_field("followersCount")),
            following: parse_count(&text_field("followingCount")),
            posts: parse_count(&text_field("postsCount")),
            profile_picture: text_field("profilePicture"),
            bio: text_field("bio"),
            is_verified: raw
                .get("isVerified")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
        })
    }

    /// 加密凭证并写入存储
    ///
    /// 唯一约束冲突由存储层识别,在此表现为 DuplicateAccount
    async fn persist(
        &self,
        user_id: Uuid,
        request: &ConnectionRequest,
        connected: &ConnectedSession,
    ) -> Result<AccountData, ConnectError> {
        let encrypted_password = self.cipher.encrypt(&request.password)?;
        let encrypted_two_factor_secret = if request.has_two_factor_secret() {
            Some(
                self.cipher
                    .encrypt(request.two_factor_secret.as_deref().unwrap_or_default())?,
            )
        } else {
            None
        };

        let stored = self
            .store
            .insert(NewAccount {
                user_id,
                username: request.username.clone(),
                encrypted_password,
                encrypted_two_factor_secret,
                session_data: connected.session.clone(),
                profile: connected.profile.clone(),
            })
            .await?;

        Ok(stored.to_account_data(&connected.profile))
    }

    /// 元素存在性检测 (单次,不等待)
    async fn selector_present(
        &self,
        driver: &dyn BrowserDriver,
        selector: &str,
    ) -> Result<bool, ConnectError> {
        // 组合选择器逐个检测,任一命中即为存在
        for part in selector.split(',') {
            let quoted = serde_json::to_string(part.trim())
                .map_err(|e| ConnectError::Unknown(e.to_string()))?;
            let script = format!("document.querySelector({}) !== null", quoted);
            let value = driver.evaluate(&script).await?;
            if value.as_bool().unwrap_or(false) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// 字段间随机停顿 (0.5-1.5秒),降低自动化流量特征
    async fn humanlike_pause(&self) {
        let (min, max) = self.timeouts.field_pause_ms;
        let delay = rand::thread_rng().gen_range(min..=max.max(min + 1));
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    fn advance(&self, stage: &mut ConnectStage, next: ConnectStage) {
        debug!(from = %stage, to = %next, "状态转换");
        *stage = next;
    }
}

/// 归一化页面上的数量文本
///
/// Instagram渲染形如 "1,234 followers"、"12.5K"、"1.2M" 的文本,
/// 解析为整数; 无法解析时回退为0 (部分数据容忍)。
pub fn parse_count(text: &str) -> i64 {
    // 数字主体 + 可选的K/M后缀
    static COUNT_RE: once_cell::sync::Lazy<Regex> =
        once_cell::sync::Lazy::new(|| Regex::new(r"([\d.,]+)\s*([kKmM]?)").unwrap());

    let Some(caps) = COUNT_RE.captures(text) else {
        return 0;
    };

    let number: String = caps[1].replace(',', "");
    let multiplier: f64 = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(ref s) if s == "k" => 1_000.0,
        Some(ref s) if s == "m" => 1_000_000.0,
        _ => 1.0,
    };

    number
        .parse::<f64>()
        .map(|n| (n * multiplier).round() as i64)
        .unwrap_or(0)
}
