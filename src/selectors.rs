//! Element-id candidates for the login and authorization pages.
//!
//! The brokerage does not publish or version its DOM, so these tables are
//! best-effort heuristics tuned against observed page variants. They are
//! tried in order; the first structurally-present candidate wins.

/// One candidate set of login form element ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginFields {
    pub username: &'static str,
    pub password: &'static str,
    pub submit: &'static str,
}

impl LoginFields {
    pub fn username_selector(&self) -> String {
        format!("#{}", self.username)
    }

    pub fn password_selector(&self) -> String {
        format!("#{}", self.password)
    }

    pub fn submit_selector(&self) -> String {
        format!("#{}", self.submit)
    }
}

/// Login form candidates, most specific first.
pub const LOGIN_CANDIDATES: [LoginFields; 4] = [
    LoginFields {
        username: "user_orig",
        password: "pwd_orig",
        submit: "logon_button",
    },
    LoginFields {
        username: "username",
        password: "password",
        submit: "login-button",
    },
    LoginFields {
        username: "username",
        password: "password",
        submit: "submit",
    },
    LoginFields {
        username: "user",
        password: "password",
        submit: "login",
    },
];

/// Ids the authorization form has been seen under.
pub const AUTHORIZE_FORM_IDS: [&str; 3] = ["authorize_form", "authorize-form", "oauth-authorize"];

/// Ids the approve button has been seen under.
pub const AUTHORIZE_BUTTON_IDS: [&str; 4] =
    ["authorize_button", "authorize-button", "approve", "accept"];

/// Visible-text fragments that identify an approve button when no id matches.
pub const AUTHORIZE_TEXT_NEEDLES: [&str; 3] = ["Authorize", "Approve", "Accept"];

/// Structural fallbacks when no id candidate matches: first text/email
/// input, first password input, first submit-typed control.
pub const STRUCTURAL_USERNAME: &str = "input[type='text'], input[type='email']";
pub const STRUCTURAL_PASSWORD: &str = "input[type='password']";
pub const STRUCTURAL_SUBMIT: &str = "button[type='submit'], input[type='submit']";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_selectors_are_css() {
        let fields = LOGIN_CANDIDATES[0];
        assert_eq!(fields.username_selector(), "#user_orig");
        assert_eq!(fields.password_selector(), "#pwd_orig");
        assert_eq!(fields.submit_selector(), "#logon_button");
    }

    #[test]
    fn test_most_specific_candidate_first() {
        // The vendor-specific ids must outrank the generic ones.
        assert_eq!(LOGIN_CANDIDATES[0].username, "user_orig");
        assert_eq!(AUTHORIZE_FORM_IDS[0], "authorize_form");
    }
}
