use axum::{response::Redirect, routing::get, Form, Router};
use http::HeaderMap;
use serde::Deserialize;
use validator::Validate;

use shib_connect::AcsRequest;
use shib_slo::{
    errors::{self, Code},
    Result,
};

use crate::{services::saml, valid::Valid, var::SAML_LOGINS_TOTAL, AppState};

pub fn new_router(state: AppState) -> Router {
    Router::new()
        .route("/saml/acs", get(acs).post(acs))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct AcsForm {
    #[serde(rename = "RelayState")]
    #[validate(length(max = 2048))]
    pub relay_state: Option<String>,
}

/// Assertion Consumer Service. The IdP (or the fronting SP) sends the user
/// here after authenticating off-site.
async fn acs(
    app: AppState,
    headers: HeaderMap,
    Valid(Form(form)): Valid<Form<AcsForm>>,
) -> Result<Redirect> {
    let req = AcsRequest {
        headers,
        relay_state: form.relay_state,
    };
    match saml::consume(
        app.engine.as_ref(),
        app.store.as_ref(),
        app.login.as_ref(),
        &app.config.reconciliation,
        &req,
    )
    .await
    {
        Ok(_) => {
            SAML_LOGINS_TOTAL.with_label_values(&["ok"]).inc();
            let target = req
                .relay_state
                .as_deref()
                .filter(|v| is_local_path(v))
                .unwrap_or(app.config.default_redirect.as_str());
            Ok(Redirect::to(target))
        }
        Err(err) => match err.kind() {
            Code::Authentication(message) => {
                SAML_LOGINS_TOTAL.with_label_values(&["rejected"]).inc();
                Ok(Redirect::to(&login_redirect(
                    &app.config.login_url,
                    message,
                )?))
            }
            _ => {
                SAML_LOGINS_TOTAL.with_label_values(&["error"]).inc();
                Err(err)
            }
        },
    }
}

fn login_redirect(login_url: &str, message: &str) -> Result<String> {
    let query = serde_urlencoded::to_string([("error", message)])
        .map_err(errors::any)?;
    let sep = if login_url.contains('?') { '&' } else { '?' };
    Ok(format!("{}{}{}", login_url, sep, query))
}

// only same-origin paths, "//host" would leave the site
fn is_local_path(target: &str) -> bool {
    target.starts_with('/')
        && !target.starts_with("//")
        && !target.starts_with("/\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_state_must_be_local() {
        assert!(is_local_path("/admin"));
        assert!(is_local_path("/"));
        assert!(!is_local_path("//evil.example.com"));
        assert!(!is_local_path("/\\evil.example.com"));
        assert!(!is_local_path("https://evil.example.com"));
        assert!(!is_local_path(""));
    }

    #[test]
    fn login_redirect_appends_error() {
        assert_eq!(
            login_redirect("/login", "Authentication error: 'x'").unwrap(),
            "/login?error=Authentication+error%3A+%27x%27"
        );
        assert_eq!(
            login_redirect("/login?back=1", "bad").unwrap(),
            "/login?back=1&error=bad"
        );
    }
}
