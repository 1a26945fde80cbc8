use tracing::{debug, warn};

use shib_connect::AssertionResult;
use shib_slo::Result;
use shib_storage::{
    identity::{Identity, EMAIL_FIELD},
    IdentityStore,
};

use super::nameid;
use crate::config::ReconciliationConfig;

/// Find or create the local identity for an authenticated assertion and
/// write the released claims onto it. Nothing is persisted here.
///
/// Lookup order, first hit wins:
/// 1. unique identifier field == NameID
/// 2. `Email` == NameID, if `allow_unsafe_email_fallback`
/// 3. `Email` == first value of the claim mapped to `Email`, if
///    `allow_insecure_email_linking`
///
/// Anything else gets a fresh identity. The lookup-then-create sequence is
/// not atomic; concurrent first logins for one subject rely on the store's
/// uniqueness constraint.
pub async fn reconcile<S>(
    store: &S,
    config: &ReconciliationConfig,
    assertion: &AssertionResult,
) -> Result<Identity>
where
    S: IdentityStore + ?Sized,
{
    let name_id = nameid::resolve(assertion, config)?;
    let unique_field = config.unique_identifier_field();

    let mut found = store.find_one(unique_field, &name_id).await?;

    if found.is_none() && config.allow_unsafe_email_fallback {
        found = store.find_one(EMAIL_FIELD, &name_id).await?;
    }

    let mut identity = match found {
        Some(identity) => identity,
        None => {
            let linked = match config
                .email_claim()
                .filter(|_| config.allow_insecure_email_linking)
                .and_then(|claim| assertion.first_value(claim))
            {
                Some(email) => store.find_one(EMAIL_FIELD, email).await?,
                None => None,
            };
            match linked {
                Some(identity) => {
                    debug!("linked existing identity by email");
                    identity
                }
                None => store.create(),
            }
        }
    };

    // always reset, the identity may have been found through an email route
    identity.set(unique_field, name_id.as_str());

    for (claim, field) in config.claims_field_mappings.iter() {
        match assertion.first_value(claim) {
            Some(value) => identity.set(field, value),
            None => warn!(
                claim = %claim,
                "Claim rule '{}' configured in claims_field_mappings, but wasn't passed through. Please check IdP claim rules.",
                claim
            ),
        }
    }

    identity.saml_session_index = assertion.session_index.clone();

    Ok(identity)
}
