//! Verification-code extraction from the callback URL or page content.

use regex::Regex;
use url::Url;

/// Pattern for a verification code surfaced in page text, e.g.
/// "Verification code: ABC123". Case-insensitive; the code itself is a
/// single alphanumeric token.
const CONTENT_PATTERN: &str = r"(?i)verification code[:\s]+([a-zA-Z0-9]+)";

/// Extract the verifier from a callback URL's query string.
///
/// Returns `None` when the URL does not parse or the parameter is absent
/// or empty.
pub fn verifier_from_url(callback_url: &str, param: &str) -> Option<String> {
    let url = Url::parse(callback_url).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == param)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Scan raw page content for a displayed verification code.
///
/// Some page variants render the code inline instead of redirecting to the
/// callback URL; this is the last-resort extraction.
pub fn verifier_from_content(content: &str) -> Option<String> {
    let pattern = Regex::new(CONTENT_PATTERN).ok()?;
    pattern
        .captures(content)
        .map(|captures| captures[1].to_string())
}
