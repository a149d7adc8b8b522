//! 浏览器驱动服务 - Chromium 生命周期管理
//!
//! 职责:
//! - 每次连接尝试启动一个独立的Chromium进程,尝试结束即销毁
//! - 暴露自动化原语: 导航、等待元素、拟人输入、点击、脚本执行、读取cookies
//! - 保证进程在所有退出路径上被终止 (成功、失败、异常)
//!
//! 驱动以trait形式暴露,编排器不依赖具体实现,
//! 测试时注入假驱动即可覆盖全部状态机分支。

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::models::errors::DriverError;
use crate::models::SessionCookie;

/// 默认桌面User-Agent
const DESKTOP_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 元素轮询间隔
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// 拟人输入的单字符延迟范围 (毫秒)
const KEYSTROKE_DELAY_MS: (u64, u64) = (50, 150);

/// 浏览器驱动接口
///
/// 编排器只依赖这组原语。每个实现对应一个独占的浏览器实例,
/// `close` 必须幂等且在任何路径上都被调用一次。
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// 导航到指定URL
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// 有界等待元素出现
    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), DriverError>;

    /// 拟人输入: 逐字符键入并注入随机延迟 (50-150ms),模拟手动输入
    async fn type_humanlike(&self, selector: &str, text: &str) -> Result<(), DriverError>;

    /// 点击元素
    async fn click(&self, selector: &str) -> Result<(), DriverError>;

    /// 在页面上下文执行脚本并返回JSON结果
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, DriverError>;

    /// 读取当前cookies
    async fn read_cookies(&self) -> Result<Vec<SessionCookie>, DriverError>;

    /// 浏览器上报的User-Agent
    async fn user_agent(&self) -> Result<String, DriverError>;

    /// 终止浏览器进程
    async fn close(&self) -> Result<(), DriverError>;
}

/// 浏览器启动接口
///
/// 与驱动分离,使"无效输入不启动浏览器"可被测试断言
#[async_trait]
pub trait DriverLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserDriver>, DriverError>;
}

/// Chromium驱动配置
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    headless: bool,
    extra_args: Vec<String>,
}

impl ChromiumLauncher {
    pub fn new(headless: bool, extra_args: Vec<String>) -> Self {
        Self {
            headless,
            extra_args,
        }
    }
}

impl Default for ChromiumLauncher {
    fn default() -> Self {
        Self {
            headless: true,
            extra_args: vec![
                "--no-sandbox".to_string(),
                "--disable-setuid-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
            ],
        }
    }
}

#[async_trait]
impl DriverLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserDriver>, DriverError> {
        info!(headless = self.headless, "启动新 Chromium 实例");

        let mut builder = BrowserConfig::builder();
        if !self.headless {
            builder = builder.with_head();
        }
        let args: Vec<&str> = self.extra_args.iter().map(String::as_str).collect();
        let config = builder
            .args(args)
            .build()
            .map_err(|e| DriverError::Launch(format!("浏览器配置失败: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(format!("浏览器启动失败: {}", e)))?;

        // 后台任务消费CDP事件流,浏览器关闭后自然退出
        let handler_task = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
            debug!("浏览器事件处理器已退出");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Launch(format!("创建页面失败: {}", e)))?;

        page.set_user_agent(DESKTOP_USER_AGENT)
            .await
            .map_err(|e| DriverError::Launch(format!("设置 UserAgent 失败: {}", e)))?;

        info!("Chromium 实例启动成功");

        Ok(Box::new(ChromiumDriver {
            page,
            browser: Mutex::new(Some(browser)),
            handler_task,
        }))
    }
}

/// chromiumoxide实现的浏览器驱动
///
/// 一个实例独占一个Chromium进程。`close` 取走进程句柄并终止,
/// 重复调用是无害的空操作。
pub struct ChromiumDriver {
    page: Page,
    browser: Mutex<Option<Browser>>,
    handler_task: tokio::task::JoinHandle<()>,
}

impl ChromiumDriver {
    fn map_navigation_error(err: impl std::fmt::Display) -> DriverError {
        let msg = err.to_string();
        if msg.contains("ERR_NETWORK_CHANGED") {
            DriverError::NetworkChanged
        } else {
            DriverError::Navigation(msg)
        }
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        debug!(url = %url, "页面导航");
        self.page
            .goto(url)
            .await
            .map_err(Self::map_navigation_error)?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(Self::map_navigation_error)?;
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(DriverError::WaitTimeout(selector.to_string()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn type_humanlike(&self, selector: &str, text: &str) -> Result<(), DriverError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| DriverError::ElementNotFound(selector.to_string()))?;

        element
            .click()
            .await
            .map_err(|e| DriverError::Protocol(e.to_string()))?;

        for ch in text.chars() {
            element
                .type_str(ch.to_string())
                .await
                .map_err(|e| DriverError::Protocol(e.to_string()))?;

            let delay = rand::thread_rng().gen_range(KEYSTROKE_DELAY_MS.0..=KEYSTROKE_DELAY_MS.1);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| DriverError::ElementNotFound(selector.to_string()))?;

        element
            .click()
            .await
            .map_err(|e| DriverError::Protocol(e.to_string()))?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, DriverError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| DriverError::Evaluation(e.to_string()))?;

        // undefined等不可序列化的结果按Null处理
        Ok(result.into_value().unwrap_or(serde_json::Value::Null))
    }

    async fn read_cookies(&self) -> Result<Vec<SessionCookie>, DriverError> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .map_err(|e| DriverError::Protocol(format!("获取 cookies 失败: {}", e)))?;

        Ok(cookies
            .into_iter()
            .map(|c| SessionCookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                secure: c.secure,
                http_only: c.http_only,
            })
            .collect())
    }

    async fn user_agent(&self) -> Result<String, DriverError> {
        let value = self.evaluate("navigator.userAgent").await?;
        Ok(value.as_str().unwrap_or(DESKTOP_USER_AGENT).to_string())
    }

    async fn close(&self) -> Result<(), DriverError> {
        let mut guard = self.browser.lock().await;

        if let Some(mut browser) = guard.take() {
            info!("正在关闭浏览器实例");
            if let Err(e) = browser.close().await {
                warn!(error = %e, "浏览器关闭指令失败,进程将被强制回收");
            }
            if let Err(e) = browser.wait().await {
                warn!(error = %e, "等待浏览器进程退出失败");
            }
            self.handler_task.abort();
            info!("浏览器实例已关闭");
        }

        Ok(())
    }
}
