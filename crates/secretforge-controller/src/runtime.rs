//! Controller runtime: watch-event dispatch and a pool of reconcile workers.

use std::collections::HashMap;
use std::sync::Arc;

use secretforge_core::{ObjectKey, Resource, SourceKind};
use secretforge_storage::{StoreError, WatchEvent, WatchedObject};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::index::ReferenceIndex;
use crate::queue::WorkQueue;
use crate::reconciler::{Action, Reconciler};

/// Drives reconciliations from watch events until shutdown.
pub struct Controller {
    reconciler: Reconciler,
    index: Arc<ReferenceIndex>,
    queue: Arc<WorkQueue<ObjectKey>>,
    workers: usize,
    /// Last seen `metadata.generation` per tracked resource
    generations: HashMap<ObjectKey, Option<i64>>,
}

impl Controller {
    pub fn new(reconciler: Reconciler, workers: usize) -> Self {
        Self {
            reconciler,
            index: Arc::new(ReferenceIndex::new()),
            queue: Arc::new(WorkQueue::new()),
            workers: workers.max(1),
            generations: HashMap::new(),
        }
    }

    pub fn index(&self) -> Arc<ReferenceIndex> {
        Arc::clone(&self.index)
    }

    pub fn queue(&self) -> Arc<WorkQueue<ObjectKey>> {
        Arc::clone(&self.queue)
    }

    /// Runs until `shutdown` flips to `true` or the event stream closes.
    ///
    /// `events` must be subscribed before calling so nothing written between
    /// the initial listing and the first receive is lost.
    pub async fn run(
        mut self,
        mut events: broadcast::Receiver<WatchEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), StoreError> {
        info!(workers = self.workers, "Starting controller");
        self.resync().await?;

        let workers: Vec<JoinHandle<()>> = (0..self.workers)
            .map(|id| {
                let reconciler = self.reconciler.clone();
                let queue = Arc::clone(&self.queue);
                tokio::spawn(worker(id, reconciler, queue))
            })
            .collect();

        loop {
            tokio::select! {
                biased;

                result = shutdown.changed() => {
                    match result {
                        Ok(()) if *shutdown.borrow() => {
                            info!("Controller shutting down");
                            break;
                        }
                        Ok(()) => {}
                        Err(_) => {
                            info!("Controller shutdown channel closed");
                            break;
                        }
                    }
                }
                received = events.recv() => {
                    match received {
                        Ok(event) => self.dispatch(event),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Watch stream lagged, resyncing");
                            if let Err(e) = self.resync().await {
                                warn!(error = %e, "Resync failed");
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            info!("Watch stream closed");
                            break;
                        }
                    }
                }
            }
        }

        self.queue.shutdown();
        for handle in workers {
            if let Err(e) = handle.await {
                warn!(error = %e, "Worker task failed");
            }
        }
        info!("Controller stopped");
        Ok(())
    }

    /// Lists every tracked resource, rebuilds its index entries and queues it.
    async fn resync(&mut self) -> Result<(), StoreError> {
        let all = self.reconciler.store().list_derived_secrets(None).await?;
        debug!(count = all.len(), "Resyncing tracked resources");
        for derived in all {
            let key = derived.key();
            self.index.upsert(&derived);
            self.generations.insert(key.clone(), derived.metadata.generation);
            self.queue.add(key);
        }
        Ok(())
    }

    /// Routes one watch event to the keys it affects.
    pub fn dispatch(&mut self, event: WatchEvent) {
        match event {
            WatchEvent::Applied(WatchedObject::DerivedSecret(derived)) => {
                let key = derived.key();
                self.index.upsert(&derived);
                let generation = derived.metadata.generation;
                let previous = self.generations.insert(key.clone(), generation);
                if previous != Some(generation) {
                    self.queue.add(key);
                }
            }
            WatchEvent::Deleted(WatchedObject::DerivedSecret(derived)) => {
                let key = derived.key();
                self.index.remove(&key);
                self.generations.remove(&key);
            }
            WatchEvent::Applied(WatchedObject::ConfigMap(config_map))
            | WatchEvent::Deleted(WatchedObject::ConfigMap(config_map)) => {
                self.enqueue_dependents(SourceKind::ConfigMap, &config_map.key());
            }
            WatchEvent::Applied(WatchedObject::Secret(secret))
            | WatchEvent::Deleted(WatchedObject::Secret(secret)) => {
                self.enqueue_dependents(SourceKind::Secret, &secret.key());
                if let Some(owner) = ReferenceIndex::owner_of(&secret) {
                    self.queue.add(owner);
                }
            }
        }
    }

    fn enqueue_dependents(&self, kind: SourceKind, key: &ObjectKey) {
        for dependent in self.index.dependents(kind, key) {
            debug!(source = %key, %kind, derived_secret = %dependent, "Source changed");
            self.queue.add(dependent);
        }
    }
}

async fn worker(id: usize, reconciler: Reconciler, queue: Arc<WorkQueue<ObjectKey>>) {
    debug!(worker = id, "Worker started");
    while let Some(key) = queue.next().await {
        let action = match reconciler.reconcile(&key).await {
            Ok(action) => action,
            Err(e) => reconciler.error_policy(&key, &e),
        };
        if let Action::Requeue(delay) = action {
            queue.add_after(key.clone(), delay);
        }
        queue.done(&key);
    }
    debug!(worker = id, "Worker stopped");
}
