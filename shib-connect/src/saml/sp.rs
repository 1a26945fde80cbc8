use std::collections::HashMap;

use async_trait::async_trait;
use http::HeaderMap;
use serde::Deserialize;
use tracing::debug;

use shib_slo::Result;

use super::SAMLEngine;
use crate::{AcsRequest, AssertionResult};

#[derive(Debug, Clone, Deserialize)]
pub struct ShibbolethSpConfig {
    #[serde(default = "default_session_id_header")]
    pub session_id_header: String,
    #[serde(default = "default_session_index_header")]
    pub session_index_header: String,
    #[serde(default = "default_name_id_header")]
    pub name_id_header: String,
    /// Attribute headers exported by the SP. Each becomes a claim named
    /// after its header.
    #[serde(default)]
    pub attributes: Vec<String>,
}

fn default_session_id_header() -> String {
    String::from("Shib-Session-ID")
}

fn default_session_index_header() -> String {
    String::from("Shib-Session-Index")
}

fn default_name_id_header() -> String {
    String::from("persistent-id")
}

impl Default for ShibbolethSpConfig {
    fn default() -> Self {
        Self {
            session_id_header: default_session_id_header(),
            session_index_header: default_session_index_header(),
            name_id_header: default_name_id_header(),
            attributes: Vec::new(),
        }
    }
}

/// ShibbolethSp reads the outcome of an SSO exchange that a Shibboleth
/// service provider (shibd with mod_shib or an equivalent proxy) already
/// validated, from the request headers it exports.
///
/// The SP must be configured to clear any client supplied copies of these
/// headers, otherwise they can be spoofed.
#[derive(Debug, Clone)]
pub struct ShibbolethSp {
    config: ShibbolethSpConfig,
}

impl ShibbolethSp {
    pub fn new(config: ShibbolethSpConfig) -> Self {
        Self { config }
    }

    fn assertion(&self, headers: &HeaderMap) -> AssertionResult {
        if header(headers, &self.config.session_id_header).is_none() {
            debug!("no {} header, not authenticated", self.config.session_id_header);
            return AssertionResult::default();
        }
        // IdPs without a stable NameID are handled by an override claim
        let name_id = header(headers, &self.config.name_id_header)
            .unwrap_or_default();
        if name_id.is_empty() {
            debug!("no {} header released", self.config.name_id_header);
        }

        let mut attributes = HashMap::new();
        for name in &self.config.attributes {
            if let Some(raw) = header(headers, name) {
                let values = split_values(&raw);
                if !values.is_empty() {
                    attributes.insert(name.clone(), values);
                }
            }
        }

        AssertionResult {
            authenticated: true,
            error_reason: None,
            name_id,
            attributes,
            session_index: header(headers, &self.config.session_index_header)
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl SAMLEngine for ShibbolethSp {
    async fn process_response(
        &self,
        req: &AcsRequest,
    ) -> Result<AssertionResult> {
        Ok(self.assertion(&req.headers))
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).trim().to_owned())
        .filter(|v| !v.is_empty())
}

// multi-valued attributes are joined with ';', a literal ';' is sent as "\;"
fn split_values(raw: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&';') => {
                current.push(';');
                chars.next();
            }
            ';' => values.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    values.push(current);
    values.retain(|v| !v.is_empty());
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    use http::HeaderValue;

    fn sp() -> ShibbolethSp {
        ShibbolethSp::new(ShibbolethSpConfig {
            attributes: vec!["mail".to_owned(), "cn".to_owned()],
            ..Default::default()
        })
    }

    #[test]
    fn split_multi_valued() {
        assert_eq!(split_values("a;b"), vec!["a", "b"]);
        assert_eq!(split_values("a\\;b;c"), vec!["a;b", "c"]);
        assert_eq!(split_values(";a;;"), vec!["a"]);
        assert!(split_values("").is_empty());
    }

    #[tokio::test]
    async fn no_session_is_not_authenticated() {
        let result = sp()
            .process_response(&AcsRequest::default())
            .await
            .unwrap();
        assert!(!result.authenticated);
        assert_eq!(result.error_reason(), None);
    }

    #[tokio::test]
    async fn session_without_name_id_keeps_attributes() {
        let mut headers = HeaderMap::new();
        headers.insert("Shib-Session-ID", HeaderValue::from_static("_abc"));
        headers.insert("mail", HeaderValue::from_static("a@example.com"));
        let result = sp()
            .process_response(&AcsRequest {
                headers,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(result.authenticated);
        assert_eq!(result.error_reason(), None);
        assert_eq!(result.name_id, "");
        assert_eq!(result.first_value("mail"), Some("a@example.com"));
    }

    #[tokio::test]
    async fn reads_released_attributes() {
        let mut headers = HeaderMap::new();
        headers.insert("Shib-Session-ID", HeaderValue::from_static("_abc"));
        headers.insert("Shib-Session-Index", HeaderValue::from_static("_idx"));
        headers.insert(
            "persistent-id",
            HeaderValue::from_static("https://idp!https://sp!xyz"),
        );
        headers.insert(
            "mail",
            HeaderValue::from_static("a@example.com;b@example.com"),
        );
        let result = sp()
            .process_response(&AcsRequest {
                headers,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(result.authenticated);
        assert_eq!(result.name_id, "https://idp!https://sp!xyz");
        assert_eq!(result.session_index, "_idx");
        assert_eq!(result.first_value("mail"), Some("a@example.com"));
        assert!(!result.attributes.contains_key("cn"));
    }
}
