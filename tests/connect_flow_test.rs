//! 连接状态机集成测试
//!
//! 注入假驱动/假启动器/内存存储,覆盖状态机所有分支:
//! - 输入校验短路 (不启动浏览器)
//! - 登录拒绝 / 缺少两步验证密钥 / 登录后验证失败 / 超时 / 网络变化
//! - 两步验证成功路径与会话持久化
//! - 重复连接的冲突识别
//! - 每次尝试浏览器恰好关闭一次 (所有退出路径)

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use insta_connect::models::errors::{ConnectError, DriverError, StoreError};
use insta_connect::models::{
    ConnectionRequest, ConnectionResult, NewAccount, SessionCookie, StoredAccount,
};
use insta_connect::services::account_service::AccountStore;
use insta_connect::services::browser_service::{BrowserDriver, DriverLauncher};
use insta_connect::services::{ConnectService, ConnectTimeouts, CredentialCipher};

/// 假浏览器行为配置
#[derive(Clone)]
struct FakeBehavior {
    /// 登录表单是否出现
    login_form: bool,
    /// 提交后是否显示内联错误
    login_error: bool,
    /// 提交后是否出现两步验证输入框
    two_factor_prompt: bool,
    /// 登录成功标志是否出现
    home_visible: bool,
    /// 是否出现安全挑战确认按钮
    challenge_present: bool,
    /// 导航失败注入 (错误消息)
    fail_navigation: Option<String>,
    /// 个人主页抓取脚本的返回值
    profile_json: serde_json::Value,
}

impl Default for FakeBehavior {
    fn default() -> Self {
        Self {
            login_form: true,
            login_error: false,
            two_factor_prompt: false,
            home_visible: true,
            challenge_present: false,
            fail_navigation: None,
            profile_json: serde_json::json!({
                "postsCount": "88 posts",
                "followersCount": "1,234 followers",
                "followingCount": "321 following",
                "profilePicture": "https://cdn.example.com/avatar.jpg",
                "bio": "photographer",
                "isVerified": true,
            }),
        }
    }
}

/// 跨断言共享的调用记录
#[derive(Default)]
struct Recorder {
    launches: AtomicUsize,
    closes: AtomicUsize,
    typed: Mutex<Vec<(String, String)>>,
    clicked: Mutex<Vec<String>>,
}

struct FakeDriver {
    behavior: FakeBehavior,
    rec: Arc<Recorder>,
}

impl FakeDriver {
    /// 是否"存在"该选择器
    fn has_selector(&self, selector: &str) -> bool {
        if selector.contains("slfErrorAlert") || selector.contains("login-error") {
            self.behavior.login_error
        } else if selector.contains("verificationCode") {
            self.behavior.two_factor_prompt
        } else if selector.contains("aria-label=\"Home\"") {
            self.behavior.home_visible
        } else if selector.contains("username") {
            self.behavior.login_form
        } else {
            false
        }
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn navigate(&self, _url: &str) -> Result<(), DriverError> {
        if let Some(msg) = &self.behavior.fail_navigation {
            if msg.contains("ERR_NETWORK_CHANGED") {
                return Err(DriverError::NetworkChanged);
            }
            return Err(DriverError::Navigation(msg.clone()));
        }
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        _timeout: Duration,
    ) -> Result<(), DriverError> {
        if self.has_selector(selector) {
            Ok(())
        } else {
            Err(DriverError::WaitTimeout(selector.to_string()))
        }
    }

    async fn type_humanlike(&self, selector: &str, text: &str) -> Result<(), DriverError> {
        self.rec
            .typed
            .lock()
            .unwrap()
            .push((selector.to_string(), text.to_string()));
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        self.rec.clicked.lock().unwrap().push(selector.to_string());
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, DriverError> {
        if script.contains("navigator.userAgent") {
            return Ok(serde_json::json!("FakeBrowser/1.0"));
        }
        if script.contains("this was me") {
            return Ok(serde_json::json!(self.behavior.challenge_present));
        }
        if script.contains("followersCount") {
            return Ok(self.behavior.profile_json.clone());
        }
        if let Some(rest) = script.strip_prefix("document.querySelector(") {
            // 还原JSON字符串字面量得到选择器
            let literal = rest.trim_end_matches(" !== null").trim_end_matches(')');
            let selector: String =
                serde_json::from_str(literal).unwrap_or_else(|_| literal.to_string());
            return Ok(serde_json::json!(self.has_selector(&selector)));
        }
        Ok(serde_json::Value::Null)
    }

    async fn read_cookies(&self) -> Result<Vec<SessionCookie>, DriverError> {
        Ok(vec![SessionCookie {
            name: "sessionid".to_string(),
            value: "fake-session-value".to_string(),
            domain: ".instagram.com".to_string(),
            path: "/".to_string(),
            secure: true,
            http_only: true,
        }])
    }

    async fn user_agent(&self) -> Result<String, DriverError> {
        Ok("FakeBrowser/1.0".to_string())
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.rec.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeLauncher {
    behavior: FakeBehavior,
    rec: Arc<Recorder>,
}

#[async_trait]
impl DriverLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserDriver>, DriverError> {
        self.rec.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeDriver {
            behavior: self.behavior.clone(),
            rec: self.rec.clone(),
        }))
    }
}

/// 内存账号存储
///
/// 与数据库唯一约束等价: 同一 (user_id, username) 的第二次
/// 插入返回 Duplicate
#[derive(Default)]
struct MemoryAccountStore {
    keys: Mutex<HashSet<(Uuid, String)>>,
    inserted: Mutex<Vec<NewAccount>>,
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn insert(&self, account: NewAccount) -> Result<StoredAccount, StoreError> {
        let key = (account.user_id, account.username.clone());
        if !self.keys.lock().unwrap().insert(key) {
            return Err(StoreError::Duplicate);
        }

        let session_data = serde_json::to_value(&account.session_data)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let now = Utc::now();
        let stored = StoredAccount {
            id: Uuid::new_v4(),
            user_id: account.user_id,
            username: account.username.clone(),
            encrypted_password: account.encrypted_password.clone(),
            encrypted_two_factor_secret: account.encrypted_two_factor_secret.clone(),
            session_data,
            status: insta_connect::models::AccountStatus::Active,
            last_connected: now,
            created_at: now,
        };
        self.inserted.lock().unwrap().push(account);
        Ok(stored)
    }
}

/// 测试用短时限,状态机语义不变
fn fast_timeouts() -> ConnectTimeouts {
    ConnectTimeouts {
        login_form_wait: Duration::from_millis(200),
        classify_wait: Duration::from_millis(200),
        classify_poll: Duration::from_millis(10),
        home_wait: Duration::from_millis(200),
        field_pause_ms: (1, 2),
    }
}

struct Harness {
    service: ConnectService,
    rec: Arc<Recorder>,
    store: Arc<MemoryAccountStore>,
}

fn harness(behavior: FakeBehavior) -> Harness {
    let rec = Arc::new(Recorder::default());
    let store = Arc::new(MemoryAccountStore::default());
    let launcher = Arc::new(FakeLauncher {
        behavior,
        rec: rec.clone(),
    });
    let service = ConnectService::new(
        launcher,
        store.clone(),
        CredentialCipher::new("integration-test-key"),
    )
    .with_timeouts(fast_timeouts());

    Harness {
        service,
        rec,
        store,
    }
}

fn valid_request() -> ConnectionRequest {
    ConnectionRequest {
        username: "creator_account".to_string(),
        password: "validpass123".to_string(),
        email: "a@b.com".to_string(),
        two_factor_secret: None,
    }
}

#[tokio::test]
async fn test_invalid_username_never_launches_browser() {
    let h = harness(FakeBehavior::default());
    let mut request = valid_request();
    request.username = "ab".to_string();

    let outcome = h.service.connect(Uuid::new_v4(), &request).await;

    match outcome {
        Err(ConnectError::InvalidInput { field, message }) => {
            assert_eq!(field, "username");
            assert!(message.contains("at least 3"));
        }
        other => panic!("期望 InvalidInput, 实际 {:?}", other),
    }
    assert_eq!(h.rec.launches.load(Ordering::SeqCst), 0);
    assert_eq!(h.rec.closes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_password_and_email_short_circuit() {
    let h = harness(FakeBehavior::default());

    let mut request = valid_request();
    request.password = "short".to_string();
    assert!(matches!(
        h.service.connect(Uuid::new_v4(), &request).await,
        Err(ConnectError::InvalidInput { .. })
    ));

    let mut request = valid_request();
    request.email = "no-at-sign".to_string();
    assert!(matches!(
        h.service.connect(Uuid::new_v4(), &request).await,
        Err(ConnectError::InvalidInput { .. })
    ));

    assert_eq!(h.rec.launches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_inline_error_maps_to_login_rejected() {
    let h = harness(FakeBehavior {
        login_error: true,
        home_visible: false,
        ..FakeBehavior::default()
    });

    let outcome = h.service.connect(Uuid::new_v4(), &valid_request()).await;

    assert!(matches!(outcome, Err(ConnectError::LoginRejected)));
    let result = ConnectionResult::from_outcome(&outcome);
    assert!(!result.success);
    assert_eq!(result.message, "Invalid username or password");
    // 失败路径也必须恰好关闭一次
    assert_eq!(h.rec.closes.load(Ordering::SeqCst), 1);
    assert!(h.store.inserted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_two_factor_prompt_without_secret() {
    let h = harness(FakeBehavior {
        two_factor_prompt: true,
        ..FakeBehavior::default()
    });

    let outcome = h.service.connect(Uuid::new_v4(), &valid_request()).await;

    // 与 LoginRejected 区分的独立错误
    assert!(matches!(outcome, Err(ConnectError::TwoFactorMissing)));
    assert_eq!(h.rec.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_two_factor_with_secret_succeeds() {
    let h = harness(FakeBehavior {
        two_factor_prompt: true,
        ..FakeBehavior::default()
    });
    let mut request = valid_request();
    request.two_factor_secret = Some("JBSWY3DPEHPK3PXP".to_string());

    let account = h
        .service
        .connect(Uuid::new_v4(), &request)
        .await
        .expect("两步验证路径应当成功");

    assert_eq!(account.username, "creator_account");

    // 验证码被键入两步验证输入框且恰好6位数字
    let typed = h.rec.typed.lock().unwrap();
    let (_, code) = typed
        .iter()
        .find(|(sel, _)| sel.contains("verificationCode"))
        .expect("应当输入过两步验证码");
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_digit()));

    assert_eq!(h.rec.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_home_never_appears_is_verification_failure() {
    let h = harness(FakeBehavior {
        home_visible: false,
        ..FakeBehavior::default()
    });

    let outcome = h.service.connect(Uuid::new_v4(), &valid_request()).await;

    assert!(matches!(outcome, Err(ConnectError::HomeVerificationFailed)));
    let result = ConnectionResult::from_outcome(&outcome);
    assert!(result.message.contains("verify"));
    assert_eq!(h.rec.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_login_form_timeout_is_network_timeout() {
    let h = harness(FakeBehavior {
        login_form: false,
        home_visible: false,
        ..FakeBehavior::default()
    });

    let outcome = h.service.connect(Uuid::new_v4(), &valid_request()).await;

    assert!(matches!(outcome, Err(ConnectError::NetworkTimeout)));
    assert_eq!(h.rec.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_network_changed_during_navigation() {
    let h = harness(FakeBehavior {
        fail_navigation: Some("net::ERR_NETWORK_CHANGED".to_string()),
        ..FakeBehavior::default()
    });

    let outcome = h.service.connect(Uuid::new_v4(), &valid_request()).await;

    assert!(matches!(outcome, Err(ConnectError::NetworkChanged)));
    assert_eq!(h.rec.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_successful_connection_scrapes_and_persists() {
    let h = harness(FakeBehavior::default());
    let user_id = Uuid::new_v4();

    let account = h
        .service
        .connect(user_id, &valid_request())
        .await
        .expect("成功路径");

    // 抓取字段归一化
    assert_eq!(account.followers, 1234);
    assert_eq!(account.following, 321);
    assert_eq!(account.posts, 88);
    assert_eq!(account.profile_picture, "https://cdn.example.com/avatar.jpg");
    assert_eq!(account.bio, "photographer");
    assert!(account.is_verified);

    // 持久化记录: 密文而非明文,会话工件完整
    let inserted = h.store.inserted.lock().unwrap();
    assert_eq!(inserted.len(), 1);
    let record = &inserted[0];
    assert_eq!(record.user_id, user_id);
    assert_ne!(record.encrypted_password, "validpass123");
    assert!(record.encrypted_two_factor_secret.is_none());
    assert_eq!(record.session_data.cookies.len(), 1);
    assert_eq!(record.session_data.cookies[0].name, "sessionid");
    assert_eq!(record.session_data.user_agent, "FakeBrowser/1.0");

    assert_eq!(h.rec.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_challenge_dismissal_is_best_effort() {
    let h = harness(FakeBehavior {
        challenge_present: true,
        ..FakeBehavior::default()
    });

    // 挑战出现且被处理,流程照常成功
    let outcome = h.service.connect(Uuid::new_v4(), &valid_request()).await;
    assert!(outcome.is_ok());
    assert_eq!(h.rec.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_duplicate_connection_is_conflict_not_generic_error() {
    let h = harness(FakeBehavior::default());
    let user_id = Uuid::new_v4();

    assert!(h.service.connect(user_id, &valid_request()).await.is_ok());

    let second = h.service.connect(user_id, &valid_request()).await;
    assert!(matches!(second, Err(ConnectError::DuplicateAccount)));
    let result = ConnectionResult::from_outcome(&second);
    assert_eq!(result.message, "This Instagram account is already connected");

    // 两次尝试各自启动并关闭了一次浏览器
    assert_eq!(h.rec.launches.load(Ordering::SeqCst), 2);
    assert_eq!(h.rec.closes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_result_invariant_across_all_branches() {
    // accountData 有值 当且仅当 success
    let h = harness(FakeBehavior {
        login_error: true,
        home_visible: false,
        ..FakeBehavior::default()
    });
    let failure = ConnectionResult::from_outcome(
        &h.service.connect(Uuid::new_v4(), &valid_request()).await,
    );
    assert!(!failure.success && failure.account_data.is_none());

    let h = harness(FakeBehavior::default());
    let success = ConnectionResult::from_outcome(
        &h.service.connect(Uuid::new_v4(), &valid_request()).await,
    );
    assert!(success.success && success.account_data.is_some());
}
