use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        RwLock,
    },
};

use async_trait::async_trait;
use chrono::Utc;

use shib_slo::{errors, Result};

use crate::identity::{Identity, IdentityStore};

/// MemoryStore keeps identities in process. It enforces the same
/// uniqueness constraint on the unique identifier field as the MariaDB
/// store.
#[derive(Debug)]
pub struct MemoryStore {
    unique_identifier_field: String,
    seq: AtomicU64,
    records: RwLock<BTreeMap<u64, Identity>>,
}

impl MemoryStore {
    pub fn new(unique_identifier_field: String) -> Self {
        Self {
            unique_identifier_field,
            seq: AtomicU64::new(0),
            records: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|v| v.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_one(
        &self,
        field: &str,
        value: &str,
    ) -> Result<Option<Identity>> {
        let records = self.records.read().map_err(errors::any)?;
        Ok(records
            .values()
            .find(|identity| identity.get(field) == Some(value))
            .cloned())
    }

    async fn persist(&self, identity: &mut Identity) -> Result<()> {
        let mut records = self.records.write().map_err(errors::any)?;
        let id = match &identity.id {
            Some(v) => {
                let id =
                    v.parse::<u64>().map_err(|err| errors::bad_request(&err))?;
                if !records.contains_key(&id) {
                    return Err(errors::not_found(&format!(
                        "identity {} not found",
                        id
                    )));
                }
                id
            }
            None => self.seq.fetch_add(1, Ordering::SeqCst) + 1,
        };

        if let Some(unique) = identity.get(&self.unique_identifier_field) {
            let taken = records.iter().any(|(other, record)| {
                *other != id
                    && record.get(&self.unique_identifier_field)
                        == Some(unique)
            });
            if taken {
                return Err(errors::persistence(&format!(
                    "duplicate {} {}",
                    self.unique_identifier_field, unique
                )));
            }
        }

        let now = Utc::now().naive_utc();
        if identity.id.is_none() {
            identity.id = Some(id.to_string());
            identity.created_at = Some(now);
        }
        identity.updated_at = Some(now);
        records.insert(id, identity.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use shib_slo::errors::Code;

    #[tokio::test]
    async fn persist_then_find() {
        let store = MemoryStore::new("GUID".to_owned());
        let mut identity = store.create();
        identity.set("GUID", "abc");
        identity.set("Email", "a@example.com");
        store.persist(&mut identity).await.unwrap();
        assert!(identity.exists());

        let found = store.find_one("Email", "a@example.com").await.unwrap();
        assert_eq!(found, Some(identity.clone()));
        assert_eq!(store.find_one("GUID", "other").await.unwrap(), None);

        identity.set("FirstName", "Ada");
        store.persist(&mut identity).await.unwrap();
        assert_eq!(store.len(), 1);
        let found = store.find_one("GUID", "abc").await.unwrap().unwrap();
        assert_eq!(found.get("FirstName"), Some("Ada"));
    }

    #[tokio::test]
    async fn duplicate_unique_identifier_is_rejected() {
        let store = MemoryStore::new("GUID".to_owned());
        let mut first = store.create();
        first.set("GUID", "abc");
        store.persist(&mut first).await.unwrap();

        let mut second = store.create();
        second.set("GUID", "abc");
        let err = store.persist(&mut second).await.unwrap_err();
        assert!(matches!(err.kind(), Code::Persistence(_)));
        assert!(!second.exists());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn updating_a_missing_identity_fails() {
        let store = MemoryStore::new("GUID".to_owned());
        let mut identity = Identity {
            id: Some("42".to_owned()),
            ..Default::default()
        };
        identity.set("GUID", "abc");
        let err = store.persist(&mut identity).await.unwrap_err();
        assert!(matches!(err.kind(), Code::NotFound(_)));
        assert!(store.is_empty());
        assert_eq!(store.find_one("GUID", "abc").await.unwrap(), None);
    }
}
