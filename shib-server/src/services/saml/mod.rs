mod nameid;
mod reconcile;

use async_trait::async_trait;
use mockall::automock;
use tracing::{error, info};

use shib_connect::{saml::SAMLEngine, AcsRequest};
use shib_slo::{
    errors::{self, Code},
    Result,
};
use shib_storage::{Identity, IdentityStore};

use crate::config::ReconciliationConfig;

pub use nameid::resolve;
pub use reconcile::reconcile;

pub const WRONG_CREDENTIALS: &str =
    "The provided details don't seem to be correct. Please try again.";

/// LoginHook marks a persisted identity as logged in. Downstream sync (for
/// example a directory keyed by the unique identifier field) hangs off this.
#[automock]
#[async_trait]
pub trait LoginHook: Send + Sync {
    async fn logged_in(&self, identity: &Identity) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct TracingLoginHook {
    unique_identifier_field: String,
}

impl TracingLoginHook {
    pub fn new(unique_identifier_field: String) -> Self {
        Self {
            unique_identifier_field,
        }
    }
}

#[async_trait]
impl LoginHook for TracingLoginHook {
    async fn logged_in(&self, identity: &Identity) -> Result<()> {
        info!(
            id = identity.id.as_deref().unwrap_or_default(),
            subject = identity
                .get(&self.unique_identifier_field)
                .unwrap_or_default(),
            "identity logged in"
        );
        Ok(())
    }
}

/// Assertion Consumer Service: turn an inbound SSO response into a logged in
/// identity.
///
/// Rejections the user should see (IdP errors, unauthenticated responses,
/// attributes the IdP did not release) come back as `Code::Authentication`
/// carrying the message to show. Nothing touches the store in those cases.
pub async fn consume<E, S, L>(
    engine: &E,
    store: &S,
    login: &L,
    config: &ReconciliationConfig,
    req: &AcsRequest,
) -> Result<Identity>
where
    E: SAMLEngine + ?Sized,
    S: IdentityStore + ?Sized,
    L: LoginHook + ?Sized,
{
    let assertion = engine.process_response(req).await?;

    if let Some(reason) = assertion.error_reason() {
        error!("{}", reason);
        return Err(errors::authentication(&format!(
            "Authentication error: '{}'",
            reason
        )));
    }

    if !assertion.authenticated {
        return Err(errors::authentication(WRONG_CREDENTIALS));
    }

    if assertion.name_id.is_empty()
        && config.name_id_override_attribute().is_none()
    {
        error!("authenticated response carried no NameID");
        return Err(errors::authentication(WRONG_CREDENTIALS));
    }

    let mut identity = match reconcile(store, config, &assertion).await {
        Ok(identity) => identity,
        Err(err) => {
            if let Code::MissingAttribute(attribute) = err.kind() {
                error!(attribute = %attribute, "{}", err);
                return Err(errors::authentication(&format!(
                    "Authentication error: '{}'",
                    err
                )));
            }
            return Err(err);
        }
    };

    store.persist(&mut identity).await?;

    login.logged_in(&identity).await?;

    Ok(identity)
}
