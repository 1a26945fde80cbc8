use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use mockall::automock;
use serde::{Deserialize, Serialize};

use shib_slo::Result;

pub const EMAIL_FIELD: &str = "Email";
pub const DEFAULT_UNIQUE_IDENTIFIER_FIELD: &str = "GUID";

/// Identity is a local user record that SAML subjects are reconciled onto.
///
/// `id` is assigned by the store on first persist, so a record built by
/// [`IdentityStore::create`] has none until it is written.
#[derive(Debug, Default, Deserialize, Serialize, PartialEq, Clone)]
pub struct Identity {
    pub id: Option<String>,
    /// Local field name to value, e.g. `GUID`, `Email`, `FirstName`.
    pub fields: BTreeMap<String, String>,
    pub saml_session_index: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<NaiveDateTime>,
}

impl Identity {
    pub fn exists(&self) -> bool {
        self.id.is_some()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn set<V: Into<String>>(&mut self, field: &str, value: V) {
        self.fields.insert(field.to_owned(), value.into());
    }
}

#[automock]
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// At most one identity whose `field` equals `value`. Which one is
    /// returned when several match is up to the store.
    async fn find_one(
        &self,
        field: &str,
        value: &str,
    ) -> Result<Option<Identity>>;

    /// A new record that is not persisted yet.
    fn create(&self) -> Identity {
        Identity::default()
    }

    /// Insert or update. Fails with a persistence error when the write
    /// would violate a uniqueness constraint.
    async fn persist(&self, identity: &mut Identity) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_identity_does_not_exist() {
        let mut identity = Identity::default();
        assert!(!identity.exists());
        identity.set(DEFAULT_UNIQUE_IDENTIFIER_FIELD, "abc");
        assert_eq!(identity.get("GUID"), Some("abc"));
        assert_eq!(identity.get(EMAIL_FIELD), None);
        identity.id = Some("1".to_owned());
        assert!(identity.exists());
    }
}
