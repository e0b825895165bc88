//! Reconciliation behavior when the store fails part-way through.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use secretforge_controller::{ErrorKind, ReconcileError, Reconciler, ReconcilerSettings};
use secretforge_core::{
    ByteString, ConfigMap, DerivedSecret, DerivedSecretSpec, ObjectKey, ObjectMeta, Resource,
    Secret, StringTarget,
};
use secretforge_engine::DerivationEngine;
use secretforge_storage::{ClientProvider, DynStore, Identity, ObjectStore, StoreError};
use secretforge_store_memory::InMemoryStore;

#[derive(Debug, Default)]
struct Faults {
    status_write: AtomicBool,
    secret_update: AtomicBool,
    secret_list: AtomicBool,
    secret_delete: AtomicBool,
}

/// Delegates to the in-memory store unless a fault is switched on.
#[derive(Clone)]
struct FaultyStore {
    inner: InMemoryStore,
    faults: Arc<Faults>,
}

impl FaultyStore {
    fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            faults: Arc::new(Faults::default()),
        }
    }
}

#[async_trait]
impl ObjectStore for FaultyStore {
    async fn get_config_map(&self, key: &ObjectKey) -> Result<Option<ConfigMap>, StoreError> {
        self.inner.get_config_map(key).await
    }

    async fn get_secret(&self, key: &ObjectKey) -> Result<Option<Secret>, StoreError> {
        self.inner.get_secret(key).await
    }

    async fn list_secrets(&self, namespace: Option<&str>) -> Result<Vec<Secret>, StoreError> {
        if self.faults.secret_list.load(Ordering::SeqCst) {
            return Err(StoreError::connection("list timed out"));
        }
        self.inner.list_secrets(namespace).await
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        self.inner.create_secret(secret).await
    }

    async fn update_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        if self.faults.secret_update.load(Ordering::SeqCst) {
            return Err(StoreError::version_conflict(
                "Secret",
                secret.key(),
                secret.metadata.resource_version.clone().unwrap_or_default(),
                "999",
            ));
        }
        self.inner.update_secret(secret).await
    }

    async fn delete_secret(&self, key: &ObjectKey) -> Result<(), StoreError> {
        if self.faults.secret_delete.load(Ordering::SeqCst) {
            return Err(StoreError::internal("delete rejected"));
        }
        self.inner.delete_secret(key).await
    }

    async fn get_derived_secret(
        &self,
        key: &ObjectKey,
    ) -> Result<Option<DerivedSecret>, StoreError> {
        self.inner.get_derived_secret(key).await
    }

    async fn list_derived_secrets(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<DerivedSecret>, StoreError> {
        self.inner.list_derived_secrets(namespace).await
    }

    async fn update_derived_secret_status(
        &self,
        derived: &DerivedSecret,
    ) -> Result<DerivedSecret, StoreError> {
        if self.faults.status_write.load(Ordering::SeqCst) {
            return Err(StoreError::connection("status endpoint unavailable"));
        }
        self.inner.update_derived_secret_status(derived).await
    }

    fn acting_as(&self) -> Option<&Identity> {
        self.inner.acting_as()
    }

    fn backend_name(&self) -> &'static str {
        "faulty"
    }
}

impl ClientProvider for FaultyStore {
    fn ambient(&self) -> DynStore {
        Arc::new(self.clone())
    }

    fn impersonate(&self, identity: &Identity) -> Result<DynStore, StoreError> {
        Ok(Arc::new(Self {
            inner: self.inner.as_identity(identity.clone()),
            faults: Arc::clone(&self.faults),
        }))
    }
}

fn reconciler(store: &FaultyStore) -> Reconciler {
    Reconciler::new(
        Arc::new(store.clone()),
        DerivationEngine::default(),
        ReconcilerSettings::default(),
    )
}

fn literal_spec(value: &str) -> DerivedSecretSpec {
    DerivedSecretSpec {
        string_data: [("k".to_string(), StringTarget::literal(value))].into(),
        ..Default::default()
    }
}

async fn status_error(store: &InMemoryStore, key: &ObjectKey) -> String {
    store
        .ambient()
        .get_derived_secret(key)
        .await
        .unwrap()
        .unwrap()
        .status
        .error
}

#[tokio::test]
async fn test_status_write_failure_is_the_reported_error() {
    let memory = InMemoryStore::new();
    let store = FaultyStore::new(memory.clone());
    let ds = memory.apply_derived_secret(DerivedSecret::new(
        ObjectMeta::new("team-a", "app"),
        literal_spec("v"),
    ));
    store.faults.status_write.store(true, Ordering::SeqCst);

    let err = reconciler(&store).reconcile(&ds.key()).await.unwrap_err();
    assert!(matches!(err, ReconcileError::StatusUpdate { .. }));
    assert_eq!(err.kind(), ErrorKind::Status);
    assert!(err.is_transient());

    // The pipeline itself ran to completion.
    let secret = memory
        .ambient()
        .get_secret(&ObjectKey::new("team-a", "app"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(secret.data["k"], ByteString::from("v"));
}

#[tokio::test]
async fn test_status_write_failure_replaces_pipeline_error() {
    let memory = InMemoryStore::new();
    let store = FaultyStore::new(memory.clone());
    let ds = memory.apply_derived_secret(DerivedSecret::new(
        ObjectMeta::new("team-a", "app"),
        DerivedSecretSpec {
            target_namespace: Some("team-b".into()),
            ..Default::default()
        },
    ));
    store.faults.status_write.store(true, Ordering::SeqCst);

    let err = reconciler(&store).reconcile(&ds.key()).await.unwrap_err();
    assert!(matches!(err, ReconcileError::StatusUpdate { .. }));
}

#[tokio::test]
async fn test_concurrent_update_is_a_retryable_apply_error() {
    let memory = InMemoryStore::new();
    let store = FaultyStore::new(memory.clone());
    let ds = memory.apply_derived_secret(DerivedSecret::new(
        ObjectMeta::new("team-a", "app"),
        literal_spec("v1"),
    ));
    let reconciler = reconciler(&store);
    reconciler.reconcile(&ds.key()).await.unwrap();

    memory.apply_derived_secret(DerivedSecret::new(
        ObjectMeta::new("team-a", "app"),
        literal_spec("v2"),
    ));
    store.faults.secret_update.store(true, Ordering::SeqCst);

    let err = reconciler.reconcile(&ds.key()).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Apply { .. }));
    assert_eq!(err.kind(), ErrorKind::Apply);
    assert!(err.is_transient());
    assert_eq!(status_error(&memory, &ds.key()).await, err.to_string());

    store.faults.secret_update.store(false, Ordering::SeqCst);
    reconciler.reconcile(&ds.key()).await.unwrap();
    assert!(status_error(&memory, &ds.key()).await.is_empty());
}

#[tokio::test]
async fn test_cleanup_failures_do_not_fail_reconciliation() {
    let memory = InMemoryStore::new();
    let store = FaultyStore::new(memory.clone());
    let mut spec = literal_spec("v");
    spec.target_name = Some("a".into());
    let ds = memory.apply_derived_secret(DerivedSecret::new(
        ObjectMeta::new("team-a", "app"),
        spec.clone(),
    ));
    let reconciler = reconciler(&store);
    reconciler.reconcile(&ds.key()).await.unwrap();

    spec.target_name = Some("b".into());
    memory.apply_derived_secret(DerivedSecret::new(ObjectMeta::new("team-a", "app"), spec));

    store.faults.secret_delete.store(true, Ordering::SeqCst);
    reconciler.reconcile(&ds.key()).await.unwrap();
    assert!(status_error(&memory, &ds.key()).await.is_empty());
    assert_eq!(memory.secret_count(), 2);

    store.faults.secret_delete.store(false, Ordering::SeqCst);
    store.faults.secret_list.store(true, Ordering::SeqCst);
    reconciler.reconcile(&ds.key()).await.unwrap();
    assert_eq!(memory.secret_count(), 2);

    store.faults.secret_list.store(false, Ordering::SeqCst);
    reconciler.reconcile(&ds.key()).await.unwrap();
    assert_eq!(memory.secret_count(), 1);
}
