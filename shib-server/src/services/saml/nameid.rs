use shib_connect::AssertionResult;
use shib_slo::{errors, Result};

use crate::config::ReconciliationConfig;

/// Pick the value that identifies the subject: the assertion's NameID, or
/// the first value of the configured override claim.
///
/// Shibboleth deployments differ in which identifier is stable (transient,
/// persistent, eduPersonPrincipalName, ...), hence the override.
pub fn resolve(
    assertion: &AssertionResult,
    config: &ReconciliationConfig,
) -> Result<String> {
    if !assertion.authenticated {
        return Err(errors::configuration(
            "provided SAML response is not authenticated, can't retrieve NameID",
        ));
    }

    let Some(attribute) = config.name_id_override_attribute() else {
        return Ok(assertion.name_id.clone());
    };

    assertion
        .first_value(attribute)
        .map(str::to_owned)
        .ok_or_else(|| errors::missing_attribute(attribute))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use shib_slo::errors::Code;

    use super::*;

    const EPPN: &str = "urn:oid:1.3.6.1.4.1.5923.1.1.1.6";

    fn assertion(attributes: &[(&str, &[&str])]) -> AssertionResult {
        AssertionResult {
            authenticated: true,
            name_id: "AAdzZWNyZXQx".to_owned(),
            attributes: attributes
                .iter()
                .map(|(k, v)| {
                    (k.to_string(), v.iter().map(|s| s.to_string()).collect())
                })
                .collect::<HashMap<_, _>>(),
            session_index: "_s1".to_owned(),
            ..Default::default()
        }
    }

    fn with_override(attribute: &str) -> ReconciliationConfig {
        ReconciliationConfig {
            name_id_override_attribute: Some(attribute.to_owned()),
            ..Default::default()
        }
    }

    #[test]
    fn native_name_id_without_override() {
        let assertion = assertion(&[(EPPN, &["jdoe@example.org"])]);
        assert_eq!(
            resolve(&assertion, &ReconciliationConfig::default()).unwrap(),
            "AAdzZWNyZXQx"
        );
        assert_eq!(resolve(&assertion, &with_override("")).unwrap(), "AAdzZWNyZXQx");
    }

    #[test]
    fn override_uses_first_value() {
        let assertion =
            assertion(&[(EPPN, &["jdoe@example.org", "john@example.org"])]);
        assert_eq!(
            resolve(&assertion, &with_override(EPPN)).unwrap(),
            "jdoe@example.org"
        );
    }

    #[test]
    fn override_claim_absent_or_empty() {
        for assertion in [assertion(&[]), assertion(&[(EPPN, &[])])] {
            let err = resolve(&assertion, &with_override(EPPN)).unwrap_err();
            assert!(
                matches!(err.kind(), Code::MissingAttribute(v) if v == EPPN)
            );
        }
    }

    #[test]
    fn unauthenticated_is_a_configuration_error() {
        let mut assertion = assertion(&[]);
        assertion.authenticated = false;
        let err =
            resolve(&assertion, &ReconciliationConfig::default()).unwrap_err();
        assert!(matches!(err.kind(), Code::Configuration(_)));
    }
}
