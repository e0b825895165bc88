use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use secretforge_core::{ConfigMap, DerivedSecret, ObjectKey, Resource, Secret};
use secretforge_storage::{Identity, StoreError, WatchEvent, WatchedObject};
use tokio::sync::broadcast;
use tracing::debug;

use crate::object_store::normalize;

/// Buffer size of the watch channel. Slow receivers lose older events.
const EVENT_BUFFER_SIZE: usize = 1024;

/// Who may act through an impersonated client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Impersonated identities may touch any namespace.
    #[default]
    AllowAll,
    /// Impersonated identities may only touch namespaces granted with
    /// [`InMemoryStore::grant`].
    ExplicitGrants,
}

#[derive(Debug)]
pub(crate) struct StoreInner {
    pub(crate) config_maps: DashMap<ObjectKey, ConfigMap>,
    pub(crate) secrets: DashMap<ObjectKey, Secret>,
    pub(crate) derived_secrets: DashMap<ObjectKey, DerivedSecret>,
    /// Atomic counter for generating resource versions
    version_counter: AtomicU64,
    events: broadcast::Sender<WatchEvent>,
    policy: AccessPolicy,
    grants: DashMap<Identity, HashSet<String>>,
}

/// In-memory object store backend using `DashMap` for concurrent access.
///
/// This store provides:
/// - Resource versions with optimistic concurrency on updates
/// - uid assignment and generation tracking for derived secrets
/// - Watch events over a broadcast channel
/// - Impersonated handles, optionally restricted by per-identity namespace grants
///
/// Clones share the same data.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    pub(crate) inner: Arc<StoreInner>,
    pub(crate) acting_as: Option<Identity>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates an empty store that lets impersonated clients act anywhere.
    pub fn new() -> Self {
        Self::with_access_policy(AccessPolicy::AllowAll)
    }

    pub fn with_access_policy(policy: AccessPolicy) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self {
            inner: Arc::new(StoreInner {
                config_maps: DashMap::new(),
                secrets: DashMap::new(),
                derived_secrets: DashMap::new(),
                version_counter: AtomicU64::new(1),
                events,
                policy,
                grants: DashMap::new(),
            }),
            acting_as: None,
        }
    }

    /// A handle sharing this store's data whose requests are made as `identity`.
    pub fn as_identity(&self, identity: Identity) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            acting_as: Some(identity),
        }
    }

    /// Subscribes to change events.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.inner.events.subscribe()
    }

    /// Allows `identity` to read and write secrets in `namespace`.
    pub fn grant(&self, identity: Identity, namespace: impl Into<String>) {
        self.inner
            .grants
            .entry(identity)
            .or_default()
            .insert(namespace.into());
    }

    /// Generates the next resource version.
    pub(crate) fn next_version(&self) -> String {
        self.inner
            .version_counter
            .fetch_add(1, Ordering::SeqCst)
            .to_string()
    }

    pub(crate) fn emit(&self, event: WatchEvent) {
        if self.inner.events.receiver_count() == 0 {
            return;
        }
        let kind = event.object().kind();
        let key = event.object().key();
        let count = self.inner.events.send(event).unwrap_or(0);
        debug!(kind, key = %key, subscribers = count, "Emitted watch event");
    }

    /// Checks that the acting identity may `verb` secrets in `namespace`.
    pub(crate) fn authorize(&self, verb: &str, namespace: &str) -> Result<(), StoreError> {
        if self.is_permitted(namespace) {
            return Ok(());
        }
        let identity = self
            .acting_as
            .as_ref()
            .map(Identity::username)
            .unwrap_or_default();
        Err(StoreError::forbidden(identity, verb, "Secret", namespace))
    }

    pub(crate) fn is_permitted(&self, namespace: &str) -> bool {
        let Some(identity) = &self.acting_as else {
            return true;
        };
        match self.inner.policy {
            AccessPolicy::AllowAll => true,
            AccessPolicy::ExplicitGrants => self
                .inner
                .grants
                .get(identity)
                .is_some_and(|namespaces| namespaces.contains(namespace)),
        }
    }

    // ==================== Seeding ====================
    //
    // These writes bypass access checks and optimistic concurrency; they play
    // the role of users and other controllers changing the cluster.

    /// Creates or replaces a config map.
    pub fn apply_config_map(&self, mut config_map: ConfigMap) -> ConfigMap {
        let key = config_map.key();
        let uid = self
            .inner
            .config_maps
            .get(&key)
            .and_then(|existing| existing.metadata.uid.clone());
        config_map.metadata.uid = uid.or_else(|| Some(uuid::Uuid::new_v4().to_string()));
        config_map.metadata.resource_version = Some(self.next_version());
        self.inner.config_maps.insert(key, config_map.clone());
        self.emit(WatchEvent::Applied(WatchedObject::ConfigMap(
            config_map.clone(),
        )));
        config_map
    }

    pub fn delete_config_map(&self, key: &ObjectKey) -> bool {
        match self.inner.config_maps.remove(key) {
            Some((_, removed)) => {
                self.emit(WatchEvent::Deleted(WatchedObject::ConfigMap(removed)));
                true
            }
            None => false,
        }
    }

    /// Creates or replaces a secret.
    pub fn apply_secret(&self, mut secret: Secret) -> Secret {
        let key = secret.key();
        normalize(&mut secret);
        let uid = self
            .inner
            .secrets
            .get(&key)
            .and_then(|existing| existing.metadata.uid.clone());
        secret.metadata.uid = uid.or_else(|| Some(uuid::Uuid::new_v4().to_string()));
        secret.metadata.resource_version = Some(self.next_version());
        self.inner.secrets.insert(key, secret.clone());
        self.emit(WatchEvent::Applied(WatchedObject::Secret(secret.clone())));
        secret
    }

    /// Creates a derived secret or replaces its metadata and spec.
    ///
    /// The stored status is kept. `metadata.generation` starts at 1 and is
    /// bumped only when the spec changes.
    pub fn apply_derived_secret(&self, mut derived: DerivedSecret) -> DerivedSecret {
        let key = derived.key();
        let existing = self
            .inner
            .derived_secrets
            .get(&key)
            .map(|entry| entry.value().clone());
        match existing {
            Some(existing) => {
                let generation = existing.metadata.generation.unwrap_or(1);
                derived.metadata.generation = Some(if existing.spec == derived.spec {
                    generation
                } else {
                    generation + 1
                });
                derived.metadata.uid = existing.metadata.uid;
                derived.status = existing.status;
            }
            None => {
                derived.metadata.generation = Some(1);
                derived.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
            }
        }
        derived.metadata.resource_version = Some(self.next_version());
        self.inner.derived_secrets.insert(key, derived.clone());
        self.emit(WatchEvent::Applied(WatchedObject::DerivedSecret(
            derived.clone(),
        )));
        derived
    }

    /// Deletes a derived secret together with the secrets it controls.
    pub fn delete_derived_secret(&self, key: &ObjectKey) -> bool {
        let Some((_, removed)) = self.inner.derived_secrets.remove(key) else {
            return false;
        };
        if let Some(uid) = removed.metadata.uid.clone() {
            let owned: Vec<ObjectKey> = self
                .inner
                .secrets
                .iter()
                .filter(|entry| {
                    entry
                        .metadata
                        .controller_owner()
                        .is_some_and(|owner| owner.uid == uid)
                })
                .map(|entry| entry.key().clone())
                .collect();
            for secret_key in owned {
                if let Some((_, secret)) = self.inner.secrets.remove(&secret_key) {
                    debug!(secret = %secret_key, owner = %key, "Cascading delete of owned secret");
                    self.emit(WatchEvent::Deleted(WatchedObject::Secret(secret)));
                }
            }
        }
        self.emit(WatchEvent::Deleted(WatchedObject::DerivedSecret(removed)));
        true
    }

    /// Number of stored secrets across all namespaces.
    pub fn secret_count(&self) -> usize {
        self.inner.secrets.len()
    }
}
