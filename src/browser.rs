//! Chrome session acquisition and the chromiumoxide-backed page.

use std::path::Path;

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::config::ExchangerConfig;
use crate::page::{AuthPage, Session};

/// Failure to bring up a browser session. This is the one fatal error class
/// of the exchange; everything past launch is best-effort.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Chrome/Chromium not found. Install Chrome or Chromium, or put it on PATH")]
    ChromeNotFound,
    #[error("failed to configure browser: {0}")]
    Config(String),
    #[error("failed to launch browser")]
    Launch(#[source] CdpError),
    #[error("failed to open page")]
    Page(#[source] CdpError),
}

/// A live browser session, exclusively owned by one exchange invocation.
pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: Page,
}

impl BrowserSession {
    /// Launch Chrome with the configured user agent and anti-detection
    /// flags, and open a blank page.
    pub async fn launch(config: &ExchangerConfig) -> Result<Self, LaunchError> {
        let chrome_path = find_chrome().ok_or(LaunchError::ChromeNotFound)?;

        let (width, height) = config.window_size;
        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .viewport(None)
            .arg(format!("--window-size={width},{height}"))
            .arg(format!("--user-agent={}", config.user_agent));
        if !config.headless {
            builder = builder.with_head();
        }
        for arg in &config.chrome_args {
            builder = builder.arg(arg);
        }
        let browser_config = builder.build().map_err(LaunchError::Config)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(LaunchError::Launch)?;

        // Pump CDP events for the lifetime of the session.
        let handler_task = tokio::spawn(async move { while (handler.next().await).is_some() {} });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                drop(browser);
                handler_task.abort();
                return Err(LaunchError::Page(err));
            }
        };

        Ok(Self {
            browser,
            handler_task,
            page,
        })
    }
}

#[async_trait::async_trait]
impl Session for BrowserSession {
    type Page = Page;

    fn page(&self) -> &Page {
        &self.page
    }

    async fn close(self) {
        drop(self.browser);
        self.handler_task.abort();
    }
}

#[async_trait::async_trait]
impl AuthPage for Page {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.goto(url)
            .await
            .with_context(|| format!("Failed to navigate to {url}"))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        self.url().await?.context("Page has no URL")
    }

    async fn title(&self) -> Result<String> {
        Ok(self.get_title().await?.unwrap_or_default())
    }

    async fn content(&self) -> Result<String> {
        Ok(Page::content(self).await?)
    }

    async fn is_present(&self, selector: &str) -> Result<bool> {
        Ok(!self.find_elements(selector).await?.is_empty())
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<()> {
        let element = self
            .find_element(selector)
            .await
            .with_context(|| format!("No element matching {selector:?}"))?;
        element.click().await?;
        element.type_str(text).await?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.find_element(selector)
            .await
            .with_context(|| format!("No element matching {selector:?}"))?
            .click()
            .await?;
        Ok(())
    }

    async fn click_button_containing(&self, needles: &[&str]) -> Result<()> {
        for button in self.find_elements("button").await? {
            let text = button.inner_text().await?.unwrap_or_default();
            if needles.iter().any(|needle| text.contains(needle)) {
                button.click().await?;
                return Ok(());
            }
        }
        anyhow::bail!("No button with text containing any of {needles:?}")
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        self.save_screenshot(
            ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build(),
            path,
        )
        .await
        .with_context(|| format!("Failed to save screenshot to {}", path.display()))?;
        Ok(())
    }
}

/// Find Chrome/Chromium executable.
pub fn find_chrome() -> Option<String> {
    // First try using `which` to find chrome in PATH
    for name in ["google-chrome", "chromium"] {
        if let Ok(output) = std::process::Command::new("which").arg(name).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Some(path);
                }
            }
        }
    }

    // Fall back to known paths
    let candidates = [
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // NixOS
        "/run/current-system/sw/bin/google-chrome",
        "/run/current-system/sw/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];

    for candidate in candidates {
        if Path::new(candidate).exists() {
            return Some(candidate.to_string());
        }
    }
    None
}
