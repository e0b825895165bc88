//! ObjectStore and ClientProvider implementations for InMemoryStore.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use secretforge_core::{ByteString, ConfigMap, DerivedSecret, ObjectKey, Resource, Secret};
use secretforge_storage::{
    ClientProvider, DynStore, Identity, ObjectStore, StoreError, WatchEvent, WatchedObject,
};
use tracing::instrument;

use crate::store::InMemoryStore;

/// Folds `stringData` into `data`, the way the cluster API persists secrets.
pub(crate) fn normalize(secret: &mut Secret) {
    for (key, value) in std::mem::take(&mut secret.string_data) {
        secret.data.insert(key, ByteString::from(value.into_bytes()));
    }
}

fn check_version(
    kind: &str,
    key: &ObjectKey,
    expected: Option<&String>,
    actual: Option<&String>,
) -> Result<(), StoreError> {
    match (expected, actual) {
        (Some(expected), Some(actual)) if expected != actual => Err(StoreError::version_conflict(
            kind,
            key,
            expected.as_str(),
            actual.as_str(),
        )),
        _ => Ok(()),
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get_config_map(&self, key: &ObjectKey) -> Result<Option<ConfigMap>, StoreError> {
        Ok(self
            .inner
            .config_maps
            .get(key)
            .map(|entry| entry.value().clone()))
    }

    async fn get_secret(&self, key: &ObjectKey) -> Result<Option<Secret>, StoreError> {
        self.authorize("get", &key.namespace)?;
        Ok(self.inner.secrets.get(key).map(|entry| entry.value().clone()))
    }

    async fn list_secrets(&self, namespace: Option<&str>) -> Result<Vec<Secret>, StoreError> {
        if let Some(namespace) = namespace {
            self.authorize("list", namespace)?;
        }
        let mut secrets: Vec<Secret> = self
            .inner
            .secrets
            .iter()
            .filter(|entry| namespace.is_none_or(|ns| entry.key().namespace == ns))
            .filter(|entry| self.is_permitted(&entry.key().namespace))
            .map(|entry| entry.value().clone())
            .collect();
        secrets.sort_by_key(|secret| secret.key());
        Ok(secrets)
    }

    #[instrument(skip(self, secret), fields(secret = %secret.key()))]
    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let key = secret.key();
        self.authorize("create", &key.namespace)?;

        let mut stored = secret.clone();
        normalize(&mut stored);
        stored.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        stored.metadata.resource_version = Some(self.next_version());

        match self.inner.secrets.entry(key.clone()) {
            Entry::Occupied(_) => return Err(StoreError::already_exists("Secret", &key)),
            Entry::Vacant(entry) => {
                entry.insert(stored.clone());
            }
        }
        self.emit(WatchEvent::Applied(WatchedObject::Secret(stored.clone())));
        Ok(stored)
    }

    #[instrument(skip(self, secret), fields(secret = %secret.key()))]
    async fn update_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let key = secret.key();
        self.authorize("update", &key.namespace)?;

        let stored = match self.inner.secrets.entry(key.clone()) {
            Entry::Vacant(_) => return Err(StoreError::not_found("Secret", &key)),
            Entry::Occupied(mut entry) => {
                check_version(
                    "Secret",
                    &key,
                    secret.metadata.resource_version.as_ref(),
                    entry.get().metadata.resource_version.as_ref(),
                )?;
                let mut stored = secret.clone();
                normalize(&mut stored);
                stored.metadata.uid = entry.get().metadata.uid.clone();
                stored.metadata.resource_version = Some(self.next_version());
                entry.insert(stored.clone());
                stored
            }
        };
        self.emit(WatchEvent::Applied(WatchedObject::Secret(stored.clone())));
        Ok(stored)
    }

    #[instrument(skip(self), fields(secret = %key))]
    async fn delete_secret(&self, key: &ObjectKey) -> Result<(), StoreError> {
        self.authorize("delete", &key.namespace)?;
        let (_, removed) = self
            .inner
            .secrets
            .remove(key)
            .ok_or_else(|| StoreError::not_found("Secret", key))?;
        self.emit(WatchEvent::Deleted(WatchedObject::Secret(removed)));
        Ok(())
    }

    async fn get_derived_secret(
        &self,
        key: &ObjectKey,
    ) -> Result<Option<DerivedSecret>, StoreError> {
        Ok(self
            .inner
            .derived_secrets
            .get(key)
            .map(|entry| entry.value().clone()))
    }

    async fn list_derived_secrets(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<DerivedSecret>, StoreError> {
        let mut items: Vec<DerivedSecret> = self
            .inner
            .derived_secrets
            .iter()
            .filter(|entry| namespace.is_none_or(|ns| entry.key().namespace == ns))
            .map(|entry| entry.value().clone())
            .collect();
        items.sort_by_key(|ds| ds.key());
        Ok(items)
    }

    #[instrument(skip(self, derived), fields(derived_secret = %derived.key()))]
    async fn update_derived_secret_status(
        &self,
        derived: &DerivedSecret,
    ) -> Result<DerivedSecret, StoreError> {
        let key = derived.key();
        let stored = match self.inner.derived_secrets.entry(key.clone()) {
            Entry::Vacant(_) => return Err(StoreError::not_found("DerivedSecret", &key)),
            Entry::Occupied(mut entry) => {
                check_version(
                    "DerivedSecret",
                    &key,
                    derived.metadata.resource_version.as_ref(),
                    entry.get().metadata.resource_version.as_ref(),
                )?;
                let mut stored = entry.get().clone();
                stored.status = derived.status.clone();
                stored.metadata.resource_version = Some(self.next_version());
                entry.insert(stored.clone());
                stored
            }
        };
        self.emit(WatchEvent::Applied(WatchedObject::DerivedSecret(
            stored.clone(),
        )));
        Ok(stored)
    }

    fn acting_as(&self) -> Option<&Identity> {
        self.acting_as.as_ref()
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

impl ClientProvider for InMemoryStore {
    fn ambient(&self) -> DynStore {
        Arc::new(Self {
            inner: Arc::clone(&self.inner),
            acting_as: None,
        })
    }

    fn impersonate(&self, identity: &Identity) -> Result<DynStore, StoreError> {
        Ok(Arc::new(self.as_identity(identity.clone())))
    }
}
