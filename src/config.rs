use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::duration::deserialize_duration;

/// User agent presented by the automated browser. A recent desktop Chrome
/// string keeps the brokerage's anti-bot checks from flagging the session.
fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36"
        .to_string()
}

/// Chrome flags that suppress the usual automation tells.
fn default_chrome_args() -> Vec<String> {
    [
        "--no-sandbox",
        "--disable-dev-shm-usage",
        "--disable-blink-features=AutomationControlled",
        "--disable-infobars",
        "--no-first-run",
        "--no-default-browser-check",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Direct login page, used when the authorization URL lands on an error page.
fn default_login_url() -> String {
    "https://us.etrade.com/e/t/user/login".to_string()
}

fn default_verifier_param() -> String {
    "oauth_verifier".to_string()
}

/// How long to wait for a page to stop navigating after an action (10s).
fn default_settle_timeout() -> Duration {
    Duration::from_secs(10)
}

/// How long to wait for the callback redirect to carry the verifier (15s).
fn default_redirect_timeout() -> Duration {
    Duration::from_secs(15)
}

/// Cadence for condition polls (500ms).
fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_screenshot_dir() -> PathBuf {
    std::env::temp_dir().join("etrade-verifier")
}

fn default_window_size() -> (u32, u32) {
    (1280, 800)
}

/// Configuration for the browser-driven credential exchange.
///
/// Everything that shapes the browser session (user agent, anti-detection
/// flags, window size) lives here rather than inline at the launch site, so
/// one invocation can be tuned without code changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangerConfig {
    /// User agent override for the automated browser.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Extra Chrome command-line flags.
    #[serde(default = "default_chrome_args")]
    pub chrome_args: Vec<String>,

    /// Run Chrome headless. Defaults to false: the brokerage's anti-bot
    /// measures are far more aggressive against headless sessions.
    pub headless: bool,

    /// Browser window size as (width, height).
    #[serde(default = "default_window_size")]
    pub window_size: (u32, u32),

    /// Login page to fall back to when the authorization URL errors out.
    #[serde(default = "default_login_url")]
    pub login_url: String,

    /// Name of the callback query parameter carrying the verification code.
    #[serde(default = "default_verifier_param")]
    pub verifier_param: String,

    /// Upper bound on waiting for a page to settle after navigation/submit.
    #[serde(
        default = "default_settle_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub settle_timeout: Duration,

    /// Upper bound on waiting for the callback redirect.
    #[serde(
        default = "default_redirect_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub redirect_timeout: Duration,

    /// How often condition polls re-check the page.
    #[serde(
        default = "default_poll_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub poll_interval: Duration,

    /// Where debug screenshots are written.
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: PathBuf,
}

impl Default for ExchangerConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            chrome_args: default_chrome_args(),
            headless: false,
            window_size: default_window_size(),
            login_url: default_login_url(),
            verifier_param: default_verifier_param(),
            settle_timeout: default_settle_timeout(),
            redirect_timeout: default_redirect_timeout(),
            poll_interval: default_poll_interval(),
            screenshot_dir: default_screenshot_dir(),
        }
    }
}

impl ExchangerConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ExchangerConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from a file, or return default config if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}
