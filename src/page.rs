//! Seams between the exchange flow and the live browser.
//!
//! The flow logic only talks to these traits, which keeps it testable
//! against mocks; the chromiumoxide-backed implementations live in
//! [`crate::browser`].

use std::path::Path;

use anyhow::Result;

/// The surface of one browser page the credential exchange needs.
///
/// Selectors are CSS; id lookups go through `#id`. Matching a button by its
/// visible text is a separate operation because CSS cannot express it.
#[async_trait::async_trait]
pub trait AuthPage {
    /// Navigate the page to `url`.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// The page's current URL.
    async fn current_url(&self) -> Result<String>;

    /// The page title, empty if the document has none.
    async fn title(&self) -> Result<String>;

    /// Raw page source.
    async fn content(&self) -> Result<String>;

    /// Whether at least one element matches `selector`.
    async fn is_present(&self, selector: &str) -> Result<bool>;

    /// Focus the first element matching `selector` and type `text` into it.
    async fn fill(&self, selector: &str, text: &str) -> Result<()>;

    /// Click the first element matching `selector`.
    async fn click(&self, selector: &str) -> Result<()>;

    /// Click the first button whose visible text contains any of `needles`.
    async fn click_button_containing(&self, needles: &[&str]) -> Result<()>;

    /// Save a screenshot of the current page to `path`.
    async fn screenshot(&self, path: &Path) -> Result<()>;
}

/// An owned browser session: one page plus the resources behind it.
///
/// The driver in [`crate::exchange`] guarantees `close` runs exactly once on
/// every exit path; implementations must release everything there.
#[async_trait::async_trait]
pub trait Session {
    type Page: AuthPage + Sync;

    /// The session's page.
    fn page(&self) -> &Self::Page;

    /// Release the browser session.
    async fn close(self)
    where
        Self: Sized;
}
