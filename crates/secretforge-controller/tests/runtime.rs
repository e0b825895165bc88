//! Controller runtime driven by in-memory watch events.

use std::sync::Arc;
use std::time::Duration;

use secretforge_controller::{Controller, Reconciler, ReconcilerSettings};
use secretforge_core::{
    ByteString, DerivedSecret, DerivedSecretSpec, ObjectKey, ObjectMeta, Reference, Resource,
    Secret, StringTarget,
};
use secretforge_engine::DerivationEngine;
use secretforge_storage::ClientProvider;
use secretforge_store_memory::InMemoryStore;
use tokio::sync::watch;

fn password_copy(name: &str) -> DerivedSecret {
    DerivedSecret::new(
        ObjectMeta::new("team-a", name),
        DerivedSecretSpec {
            references: vec![Reference::secret("db", "postgres", false)],
            string_data: [(
                "pw".to_string(),
                StringTarget::template("{{ references.db.password | utf8 }}"),
            )]
            .into(),
            ..Default::default()
        },
    )
}

fn postgres(password: &str) -> Secret {
    let mut secret = Secret::new(ObjectMeta::new("team-a", "postgres"));
    secret
        .data
        .insert("password".into(), ByteString::from(password));
    secret
}

/// Polls until `check` holds or the timeout elapses.
async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

async fn password_of(store: &InMemoryStore, key: &ObjectKey) -> Option<Vec<u8>> {
    store
        .ambient()
        .get_secret(key)
        .await
        .ok()
        .flatten()
        .and_then(|s| s.data.get("pw").map(|v| v.to_vec()))
}

fn start(
    store: &InMemoryStore,
    retry_delay: Duration,
) -> (watch::Sender<bool>, tokio::task::JoinHandle<()>) {
    let events = store.subscribe();
    let reconciler = Reconciler::new(
        Arc::new(store.clone()),
        DerivationEngine::default(),
        ReconcilerSettings {
            retry_delay,
            ..Default::default()
        },
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        Controller::new(reconciler, 2)
            .run(events, shutdown_rx)
            .await
            .unwrap();
    });
    (shutdown_tx, handle)
}

#[tokio::test]
async fn test_source_change_propagates_to_generated_secret() {
    let store = InMemoryStore::new();
    store.apply_secret(postgres("first"));
    let ds = store.apply_derived_secret(password_copy("app"));
    let target = ds.target_key();

    let (shutdown, handle) = start(&store, Duration::from_secs(5));

    assert!(eventually(|| async { password_of(&store, &target).await == Some(b"first".to_vec()) }).await);

    store.apply_secret(postgres("second"));
    assert!(eventually(|| async { password_of(&store, &target).await == Some(b"second".to_vec()) }).await);

    shutdown.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_failed_reconciliation_is_retried_after_delay() {
    let store = InMemoryStore::new();
    let ds = store.apply_derived_secret(password_copy("app"));
    let target = ds.target_key();

    let (shutdown, handle) = start(&store, Duration::from_millis(50));

    assert!(
        eventually(|| async {
            store
                .ambient()
                .get_derived_secret(&ds.key())
                .await
                .unwrap()
                .is_some_and(|d| !d.status.error.is_empty())
        })
        .await
    );

    // Each retry writes the status again, with no outside event involved.
    let version = |store: InMemoryStore, key: ObjectKey| async move {
        store
            .ambient()
            .get_derived_secret(&key)
            .await
            .unwrap()
            .and_then(|d| d.metadata.resource_version)
    };
    let first = version(store.clone(), ds.key()).await;
    assert!(eventually(|| async { version(store.clone(), ds.key()).await != first }).await);

    store.apply_secret(postgres("late"));
    assert!(eventually(|| async { password_of(&store, &target).await == Some(b"late".to_vec()) }).await);
    let status = store
        .ambient()
        .get_derived_secret(&ds.key())
        .await
        .unwrap()
        .unwrap()
        .status;
    assert!(status.error.is_empty());

    shutdown.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_new_tracked_resource_is_picked_up() {
    let store = InMemoryStore::new();
    store.apply_secret(postgres("pw"));
    let (shutdown, handle) = start(&store, Duration::from_secs(5));

    let ds = store.apply_derived_secret(password_copy("late-arrival"));
    let target = ds.target_key();
    assert!(eventually(|| async { password_of(&store, &target).await == Some(b"pw".to_vec()) }).await);

    shutdown.send(true).unwrap();
    handle.await.unwrap();
}
