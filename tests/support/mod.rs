use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use etrade_verifier::config::ExchangerConfig;
use etrade_verifier::page::{AuthPage, Session};

/// Config with timeouts shrunk so poll loops finish in milliseconds.
pub fn fast_config() -> ExchangerConfig {
    ExchangerConfig {
        settle_timeout: Duration::from_millis(5),
        redirect_timeout: Duration::from_millis(10),
        poll_interval: Duration::from_millis(1),
        screenshot_dir: std::env::temp_dir().join("etrade-verifier-test"),
        ..ExchangerConfig::default()
    }
}

#[derive(Debug, Default)]
struct MockState {
    url: String,
    title: String,
    content: String,
    present: HashSet<String>,
    buttons: Vec<String>,
    // Selector/text clicks that should move the page to a new URL.
    url_on_click: HashMap<String, String>,
    url_on_text_click: Option<String>,
    fail_navigate: bool,
    fail_fill: HashSet<String>,
    fail_click: HashSet<String>,
    fail_presence: bool,
    fail_content: bool,
    fail_screenshot: bool,
    calls: Vec<String>,
}

/// Scriptable page: presence flags, per-selector failures, and URL
/// transitions triggered by clicks. Records every interaction.
#[derive(Debug, Default)]
pub struct MockPage {
    state: Mutex<MockState>,
}

impl MockPage {
    pub fn new() -> Self {
        let page = Self::default();
        {
            let mut state = page.state.lock().unwrap();
            state.url = "https://brokerage.test/authorize".to_string();
            state.title = "Authorize Access".to_string();
            state.content = "<html><body></body></html>".to_string();
        }
        page
    }

    pub fn with_url(self, url: impl Into<String>) -> Self {
        self.state.lock().unwrap().url = url.into();
        self
    }

    pub fn with_title(self, title: impl Into<String>) -> Self {
        self.state.lock().unwrap().title = title.into();
        self
    }

    pub fn with_content(self, content: impl Into<String>) -> Self {
        self.state.lock().unwrap().content = content.into();
        self
    }

    /// Mark a selector as structurally present.
    pub fn with_present(self, selector: impl Into<String>) -> Self {
        self.state.lock().unwrap().present.insert(selector.into());
        self
    }

    /// Add a button with the given visible text.
    pub fn with_button(self, text: impl Into<String>) -> Self {
        self.state.lock().unwrap().buttons.push(text.into());
        self
    }

    /// When `selector` is clicked, move the page to `url`.
    pub fn url_on_click(self, selector: impl Into<String>, url: impl Into<String>) -> Self {
        self.state
            .lock()
            .unwrap()
            .url_on_click
            .insert(selector.into(), url.into());
        self
    }

    /// When a button is clicked by text, move the page to `url`.
    pub fn url_on_text_click(self, url: impl Into<String>) -> Self {
        self.state.lock().unwrap().url_on_text_click = Some(url.into());
        self
    }

    pub fn fail_navigate(self) -> Self {
        self.state.lock().unwrap().fail_navigate = true;
        self
    }

    pub fn fail_fill(self, selector: impl Into<String>) -> Self {
        self.state.lock().unwrap().fail_fill.insert(selector.into());
        self
    }

    pub fn fail_click(self, selector: impl Into<String>) -> Self {
        self.state.lock().unwrap().fail_click.insert(selector.into());
        self
    }

    pub fn fail_presence(self) -> Self {
        self.state.lock().unwrap().fail_presence = true;
        self
    }

    pub fn fail_content(self) -> Self {
        self.state.lock().unwrap().fail_content = true;
        self
    }

    pub fn fail_screenshot(self) -> Self {
        self.state.lock().unwrap().fail_screenshot = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn filled(&self, selector: &str) -> bool {
        self.calls().iter().any(|c| c == &format!("fill:{selector}"))
    }

    pub fn clicked(&self, selector: &str) -> bool {
        self.calls().iter().any(|c| c == &format!("click:{selector}"))
    }

    pub fn navigated_to(&self, url: &str) -> bool {
        self.calls()
            .iter()
            .any(|c| c == &format!("navigate:{url}"))
    }

    pub fn text_clicked(&self) -> bool {
        self.calls().iter().any(|c| c.starts_with("text_click"))
    }
}

#[async_trait]
impl AuthPage for MockPage {
    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("navigate:{url}"));
        if state.fail_navigate {
            anyhow::bail!("navigation refused");
        }
        state.url = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn title(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().title.clone())
    }

    async fn content(&self) -> Result<String> {
        let state = self.state.lock().unwrap();
        if state.fail_content {
            anyhow::bail!("content unavailable");
        }
        Ok(state.content.clone())
    }

    async fn is_present(&self, selector: &str) -> Result<bool> {
        let state = self.state.lock().unwrap();
        if state.fail_presence {
            anyhow::bail!("lookup failed");
        }
        Ok(state.present.contains(selector))
    }

    async fn fill(&self, selector: &str, _text: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("fill:{selector}"));
        if state.fail_fill.contains(selector) {
            anyhow::bail!("element not interactable: {selector}");
        }
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("click:{selector}"));
        if state.fail_click.contains(selector) {
            anyhow::bail!("click intercepted: {selector}");
        }
        if let Some(url) = state.url_on_click.get(selector).cloned() {
            state.url = url;
        }
        Ok(())
    }

    async fn click_button_containing(&self, needles: &[&str]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("text_click:{needles:?}"));
        let matched = state
            .buttons
            .iter()
            .any(|text| needles.iter().any(|needle| text.contains(needle)));
        if !matched {
            anyhow::bail!("no button with text containing any of {needles:?}");
        }
        if let Some(url) = state.url_on_text_click.clone() {
            state.url = url;
        }
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("screenshot:{}", path.display()));
        if state.fail_screenshot {
            anyhow::bail!("screenshot failed");
        }
        Ok(())
    }
}

/// Session wrapper that counts how many times it was released.
pub struct MockSession {
    page: MockPage,
    closed: Arc<AtomicUsize>,
}

impl MockSession {
    pub fn new(page: MockPage) -> (Self, Arc<AtomicUsize>) {
        let closed = Arc::new(AtomicUsize::new(0));
        (
            Self {
                page,
                closed: closed.clone(),
            },
            closed,
        )
    }
}

#[async_trait]
impl Session for MockSession {
    type Page = MockPage;

    fn page(&self) -> &MockPage {
        &self.page
    }

    async fn close(self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}
