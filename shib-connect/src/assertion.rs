use std::collections::HashMap;

use http::HeaderMap;
use serde::{Deserialize, Serialize};

/// AssertionResult is what the SAML engine hands back after it processed an
/// inbound response. Everything in here has already been validated by the
/// engine; nothing downstream re-checks signatures or conditions.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct AssertionResult {
    pub authenticated: bool,
    /// Set when the IdP or the engine rejected the authentication.
    pub error_reason: Option<String>,
    /// Only meaningful when `authenticated` is true.
    pub name_id: String,
    /// Claim name to released values, in IdP order.
    pub attributes: HashMap<String, Vec<String>>,
    pub session_index: String,
}

impl AssertionResult {
    /// The error reason, ignoring empty strings.
    pub fn error_reason(&self) -> Option<&str> {
        self.error_reason.as_deref().filter(|v| !v.is_empty())
    }

    /// First released value of a claim. Later values are never consulted.
    pub fn first_value(&self, claim: &str) -> Option<&str> {
        self.attributes
            .get(claim)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// AcsRequest carries the parts of an Assertion Consumer Service request an
/// engine may need: the headers set by a fronting service provider and the
/// posted RelayState.
#[derive(Debug, Default, Clone)]
pub struct AcsRequest {
    pub headers: HeaderMap,
    pub relay_state: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_value_only() {
        let assertion = AssertionResult {
            attributes: HashMap::from([
                (
                    "mail".to_owned(),
                    vec!["a@example.com".to_owned(), "b@example.com".to_owned()],
                ),
                ("cn".to_owned(), vec![]),
            ]),
            ..Default::default()
        };
        assert_eq!(assertion.first_value("mail"), Some("a@example.com"));
        assert_eq!(assertion.first_value("cn"), None);
        assert_eq!(assertion.first_value("sn"), None);
    }

    #[test]
    fn empty_error_reason_is_none() {
        let mut assertion = AssertionResult {
            error_reason: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(assertion.error_reason(), None);
        assertion.error_reason = Some("invalid signature".to_owned());
        assert_eq!(assertion.error_reason(), Some("invalid signature"));
    }
}
