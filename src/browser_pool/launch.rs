//! Chrome-backed [`SessionFactory`] implementation
//!
//! Launches chromiumoxide browsers with stealth arguments, a tracked event
//! handler task and a unique temp profile per session. The handler task
//! MUST be aborted when the session dies, otherwise it runs forever after
//! the browser process is gone.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tracing::{debug, info, warn};

use super::SessionFactory;
use crate::error::PoolError;

/// Desktop Chrome user agent presented by pooled sessions
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// One checked-out browser + page handle pair
pub struct ChromeSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Page,
    user_data_dir: Option<PathBuf>,
}

impl ChromeSession {
    /// The session's single reusable page
    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Remove the temp profile directory.
    ///
    /// Must run after the Chrome process exited; a live process still holds
    /// file locks on the profile.
    fn cleanup_temp_dir(&mut self) {
        if let Some(path) = self.user_data_dir.take() {
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    "failed to clean up temp profile {}: {e}",
                    path.display()
                );
            }
        }
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.handler.abort();
        // Browser::drop kills the Chrome process if destroy() never ran
        if self.user_data_dir.is_some() {
            self.cleanup_temp_dir();
        }
    }
}

/// Launches real Chrome sessions for the pool
#[derive(Debug, Clone)]
pub struct ChromeFactory {
    headless: bool,
    chrome_executable: Option<PathBuf>,
    request_timeout: Duration,
}

impl Default for ChromeFactory {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_executable: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ChromeFactory {
    pub fn new(headless: bool, chrome_executable: Option<PathBuf>) -> Self {
        Self {
            headless,
            chrome_executable,
            ..Self::default()
        }
    }

    async fn launch(&self) -> Result<ChromeSession, PoolError> {
        let user_data_dir =
            std::env::temp_dir().join(format!("kwscout_chrome_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&user_data_dir)
            .map_err(|e| PoolError::SessionCreation(format!("create profile dir: {e}")))?;

        let mut builder = BrowserConfigBuilder::default()
            .request_timeout(self.request_timeout)
            .window_size(390, 844)
            .user_data_dir(user_data_dir.clone())
            .arg(format!("--user-agent={CHROME_USER_AGENT}"))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-notifications")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--disable-background-networking")
            .arg("--disable-background-timer-throttling")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--hide-scrollbars")
            .arg("--mute-audio")
            .arg("--lang=ko-KR");

        if let Some(path) = &self.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        if !self.headless {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(|e| PoolError::SessionCreation(format!("build browser config: {e}")))?;

        info!("launching Chrome session");
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| PoolError::SessionCreation(format!("launch browser: {e}")))?;

        // Tracked handler: the event stream must be pumped for CDP to work
        let handler_task = task::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler event error: {e:?}");
                }
            }
            debug!("browser event handler task completed");
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                let _ = std::fs::remove_dir_all(&user_data_dir);
                return Err(PoolError::SessionCreation(format!("create page: {e}")));
            }
        };

        Ok(ChromeSession {
            browser,
            handler: handler_task,
            page,
            user_data_dir: Some(user_data_dir),
        })
    }
}

#[async_trait]
impl SessionFactory for ChromeFactory {
    type Session = ChromeSession;

    async fn create(&self) -> Result<Self::Session, PoolError> {
        self.launch().await
    }

    async fn is_alive(&self, session: &Self::Session) -> bool {
        session.browser.version().await.is_ok()
    }

    async fn destroy(&self, mut session: Self::Session) {
        session.handler.abort();
        if let Err(e) = session.browser.close().await {
            warn!("failed to close browser cleanly: {e}");
        }
        if let Err(e) = session.browser.wait().await {
            warn!("failed to wait for browser exit: {e}");
        }
        session.cleanup_temp_dir();
    }
}
