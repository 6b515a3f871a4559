//! The browser-driven credential exchange flow.
//!
//! Given an authorization URL and credentials, drive the browser through
//! login and authorization approval, then pull the verification code out of
//! the callback URL or the page content. Every step past session launch is
//! best-effort: per-strategy failures are logged and the next strategy is
//! tried, and no error escapes past the guaranteed session release.

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::browser::BrowserSession;
use crate::config::ExchangerConfig;
use crate::extract;
use crate::page::{AuthPage, Session};
use crate::selectors::{
    LoginFields, AUTHORIZE_BUTTON_IDS, AUTHORIZE_FORM_IDS, AUTHORIZE_TEXT_NEEDLES,
    LOGIN_CANDIDATES, STRUCTURAL_PASSWORD, STRUCTURAL_SUBMIT, STRUCTURAL_USERNAME,
};

/// One way of locating and submitting the login form.
///
/// Strategies are tried in order; the first applicable one that submits
/// wins. Id-candidate strategies come first, the structural lookup is the
/// final fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStrategy {
    /// Fill fields located by the element ids of one candidate set.
    ById(LoginFields),
    /// Fill the first text/email input and first password input, click the
    /// first submit-typed control.
    Structural,
}

impl LoginStrategy {
    /// The full strategy list in priority order.
    pub fn ordered() -> Vec<Self> {
        LOGIN_CANDIDATES
            .iter()
            .copied()
            .map(Self::ById)
            .chain(std::iter::once(Self::Structural))
            .collect()
    }

    /// Whether this strategy's anchor element is present on the page.
    pub async fn is_applicable<P: AuthPage + Sync>(&self, page: &P) -> Result<bool> {
        match self {
            Self::ById(fields) => page.is_present(&fields.username_selector()).await,
            Self::Structural => page.is_present(STRUCTURAL_USERNAME).await,
        }
    }

    /// Fill the credentials and submit.
    pub async fn apply<P: AuthPage + Sync>(
        &self,
        page: &P,
        username: &str,
        password: &str,
    ) -> Result<()> {
        match self {
            Self::ById(fields) => {
                page.fill(&fields.username_selector(), username).await?;
                page.fill(&fields.password_selector(), password).await?;
                page.click(&fields.submit_selector()).await?;
            }
            Self::Structural => {
                page.fill(STRUCTURAL_USERNAME, username).await?;
                page.fill(STRUCTURAL_PASSWORD, password).await?;
                page.click(STRUCTURAL_SUBMIT).await?;
            }
        }
        Ok(())
    }
}

/// One way of approving the authorization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizeStrategy {
    /// An authorization form known by id; approve by clicking the first
    /// present button-id candidate inside it.
    ByFormId(&'static str),
    /// Click any button whose visible text looks like an approve action.
    ByButtonText,
}

impl AuthorizeStrategy {
    /// The full strategy list in priority order.
    pub fn ordered() -> Vec<Self> {
        AUTHORIZE_FORM_IDS
            .iter()
            .copied()
            .map(Self::ByFormId)
            .chain(std::iter::once(Self::ByButtonText))
            .collect()
    }

    pub async fn is_applicable<P: AuthPage + Sync>(&self, page: &P) -> Result<bool> {
        match self {
            Self::ByFormId(form_id) => page.is_present(&format!("#{form_id}")).await,
            // The text scan has no cheap presence probe; applying it is the probe.
            Self::ByButtonText => Ok(true),
        }
    }

    pub async fn apply<P: AuthPage + Sync>(&self, page: &P) -> Result<()> {
        match self {
            Self::ByFormId(form_id) => {
                for button_id in AUTHORIZE_BUTTON_IDS {
                    let selector = format!("#{button_id}");
                    match page.is_present(&selector).await {
                        Ok(true) => match page.click(&selector).await {
                            Ok(()) => {
                                info!("clicked authorize button #{button_id}");
                                return Ok(());
                            }
                            Err(err) => {
                                warn!("failed to click authorize button #{button_id}: {err:#}")
                            }
                        },
                        Ok(false) => {}
                        Err(err) => debug!("presence check for #{button_id} failed: {err:#}"),
                    }
                }
                anyhow::bail!("no approve button found inside form #{form_id}")
            }
            Self::ByButtonText => page.click_button_containing(&AUTHORIZE_TEXT_NEEDLES).await,
        }
    }
}

/// Drives one credential exchange over an [`AuthPage`].
pub struct Exchanger<'a, P> {
    page: &'a P,
    config: &'a ExchangerConfig,
}

impl<'a, P: AuthPage + Sync> Exchanger<'a, P> {
    pub fn new(page: &'a P, config: &'a ExchangerConfig) -> Self {
        Self { page, config }
    }

    /// Run the exchange. Returns the verification code, or `None` when the
    /// flow finished without finding one. Never returns an error: anything
    /// unexpected is logged and mapped to absence so the caller's session
    /// release always runs.
    pub async fn run(&self, auth_url: &str, username: &str, password: &str) -> Option<String> {
        match self.run_inner(auth_url, username, password).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!("exchange aborted: {err:#}");
                None
            }
        }
    }

    async fn run_inner(
        &self,
        auth_url: &str,
        username: &str,
        password: &str,
    ) -> Result<Option<String>> {
        info!("opening authorization URL: {auth_url}");
        self.page
            .navigate(auth_url)
            .await
            .context("Failed to open authorization URL")?;
        self.capture_screenshot("auth_page.png").await;
        self.settle().await;

        self.recover_from_error_page().await;

        if let Ok(url) = self.page.current_url().await {
            info!("current URL: {url}");
        }
        if let Ok(title) = self.page.title().await {
            info!("page title: {title}");
        }

        let pre_login_url = self.page.current_url().await.unwrap_or_default();
        if self.attempt_login(username, password).await {
            self.wait_for_url_change(&pre_login_url).await;
            self.settle().await;
        } else {
            info!("no login form submitted; continuing in case login is not required");
        }

        self.attempt_authorize().await;

        let callback_url = self.wait_for_redirect().await;
        self.capture_screenshot("final_page.png").await;
        info!("final URL: {callback_url}");

        if let Some(verifier) = extract::verifier_from_url(&callback_url, &self.config.verifier_param)
        {
            info!("verification code found in callback URL");
            return Ok(Some(verifier));
        }

        match self.page.content().await {
            Ok(content) => {
                if let Some(verifier) = extract::verifier_from_content(&content) {
                    info!("found verification code in page content");
                    return Ok(Some(verifier));
                }
            }
            Err(err) => warn!("could not read page content: {err:#}"),
        }

        warn!("could not find verification code in callback URL or page content");
        Ok(None)
    }

    /// If the page title looks like an error response, log the state and
    /// fall back to navigating directly to the login page.
    async fn recover_from_error_page(&self) {
        let title = match self.page.title().await {
            Ok(title) => title,
            Err(err) => {
                warn!("could not read page title: {err:#}");
                return;
            }
        };
        if !title.contains("400") && !title.contains("Error") {
            return;
        }

        warn!("error page detected, title: {title}");
        if let Ok(url) = self.page.current_url().await {
            warn!("current URL: {url}");
        }
        if let Ok(content) = self.page.content().await {
            let preview: String = content.chars().take(1000).collect();
            debug!("page content: {preview}...");
        }

        info!("navigating directly to login page: {}", self.config.login_url);
        if let Err(err) = self.page.navigate(&self.config.login_url).await {
            warn!("failed to open login page: {err:#}");
        }
        self.capture_screenshot("login_page.png").await;
        self.settle().await;
    }

    /// Try each login strategy in order. Returns true once a form was
    /// submitted. Total failure is not fatal: the site may not require a
    /// login if a session already exists.
    async fn attempt_login(&self, username: &str, password: &str) -> bool {
        for strategy in LoginStrategy::ordered() {
            match strategy.is_applicable(self.page).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    debug!("presence check for {strategy:?} failed: {err:#}");
                    continue;
                }
            }
            info!("found login form via {strategy:?}");
            match strategy.apply(self.page, username, password).await {
                Ok(()) => {
                    info!("login form submitted");
                    return true;
                }
                Err(err) => warn!("login attempt via {strategy:?} failed: {err:#}"),
            }
        }
        false
    }

    /// Try to approve the authorization request. Short-circuits when the
    /// redirect already happened. Returns true when an approval was clicked
    /// or found unnecessary; failure is not fatal.
    async fn attempt_authorize(&self) -> bool {
        match self.page.current_url().await {
            Ok(url) if extract::verifier_from_url(&url, &self.config.verifier_param).is_some() => {
                info!("already redirected to callback with verification code");
                return true;
            }
            Ok(_) => {}
            Err(err) => warn!("could not read current URL: {err:#}"),
        }

        for strategy in AuthorizeStrategy::ordered() {
            match strategy.is_applicable(self.page).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    debug!("presence check for {strategy:?} failed: {err:#}");
                    continue;
                }
            }
            match strategy.apply(self.page).await {
                Ok(()) => {
                    info!("authorization approved via {strategy:?}");
                    return true;
                }
                Err(err) => warn!("authorize attempt via {strategy:?} failed: {err:#}"),
            }
        }

        warn!("no authorize control found; the redirect may already have happened");
        false
    }

    /// Wait until the URL is stable across two consecutive polls, bounded
    /// by the settle timeout.
    async fn settle(&self) {
        let start = Instant::now();
        let mut previous: Option<String> = None;
        loop {
            tokio::time::sleep(self.config.poll_interval).await;
            match self.page.current_url().await {
                Ok(url) => {
                    if previous.as_deref() == Some(url.as_str()) {
                        return;
                    }
                    previous = Some(url);
                }
                Err(err) => debug!("settle poll failed: {err:#}"),
            }
            if start.elapsed() >= self.config.settle_timeout {
                return;
            }
        }
    }

    /// Wait for the URL to move off `previous` after a form submit, bounded
    /// by the settle timeout.
    async fn wait_for_url_change(&self, previous: &str) {
        let start = Instant::now();
        loop {
            tokio::time::sleep(self.config.poll_interval).await;
            match self.page.current_url().await {
                Ok(url) if url != previous => return,
                Ok(_) => {}
                Err(err) => debug!("post-submit poll failed: {err:#}"),
            }
            if start.elapsed() >= self.config.settle_timeout {
                debug!("page URL did not change after submit");
                return;
            }
        }
    }

    /// Poll until the URL carries the verifier parameter, bounded by the
    /// redirect timeout. Returns the last URL observed either way.
    async fn wait_for_redirect(&self) -> String {
        let start = Instant::now();
        let mut last_seen = String::new();
        loop {
            match self.page.current_url().await {
                Ok(url) => {
                    if extract::verifier_from_url(&url, &self.config.verifier_param).is_some() {
                        return url;
                    }
                    last_seen = url;
                }
                Err(err) => debug!("redirect poll failed: {err:#}"),
            }
            if start.elapsed() >= self.config.redirect_timeout {
                return last_seen;
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Best-effort debug screenshot; failures are logged and ignored.
    async fn capture_screenshot(&self, name: &str) {
        let path = self.config.screenshot_dir.join(name);
        match self.page.screenshot(&path).await {
            Ok(()) => info!("saved screenshot to {}", path.display()),
            Err(err) => warn!("failed to save screenshot: {err:#}"),
        }
    }
}

/// Run the exchange on an already-acquired session. The session is released
/// exactly once, on every exit path, after the flow outcome is captured.
pub async fn exchange_with<S: Session>(
    session: S,
    config: &ExchangerConfig,
    auth_url: &str,
    username: &str,
    password: &str,
) -> Option<String> {
    let outcome = Exchanger::new(session.page(), config)
        .run(auth_url, username, password)
        .await;
    session.close().await;
    outcome
}

/// Acquire a browser session and exchange credentials for a verification
/// code. Session acquisition failure is the one fatal error; everything
/// after that resolves to `Some(code)` or `None`.
pub async fn fetch_verifier(
    config: &ExchangerConfig,
    auth_url: &str,
    username: &str,
    password: &str,
) -> Result<Option<String>> {
    let session = BrowserSession::launch(config)
        .await
        .context("Failed to acquire browser session")?;
    Ok(exchange_with(session, config, auth_url, username, password).await)
}
