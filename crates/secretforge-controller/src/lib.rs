//! # secretforge-controller
//!
//! Reconciliation pipeline and controller runtime for `DerivedSecret`
//! resources.
//!
//! One reconciliation runs these stages in order, stopping at the first
//! failure:
//!
//! 1. [`credentials`]: pick the ambient or impersonated writer client
//! 2. [`resolver`]: fetch the referenced config maps and secrets
//! 3. derivation through [`secretforge_engine::DerivationEngine`]
//! 4. [`apply`]: create or update the generated secret
//! 5. [`gc`]: delete secrets left behind by earlier targets (best effort)
//!
//! and always finishes with [`status`], which records the outcome on the
//! resource. Failures are retried after a fixed delay; successes wait for the
//! next watch event routed through the [`index`].
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use secretforge_controller::{Controller, Reconciler, ReconcilerSettings};
//! use secretforge_engine::DerivationEngine;
//! use secretforge_store_memory::InMemoryStore;
//!
//! let store = InMemoryStore::new();
//! let events = store.subscribe();
//! let reconciler = Reconciler::new(Arc::new(store), DerivationEngine::default(), ReconcilerSettings::default());
//! Controller::new(reconciler, 2).run(events, shutdown_rx).await?;
//! ```

pub mod apply;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gc;
pub mod index;
pub mod observability;
pub mod queue;
pub mod reconciler;
pub mod resolver;
pub mod runtime;
pub mod status;

pub use apply::{ApplyOperation, Applied, apply_payload, desired_secret};
pub use config::{AppConfig, ConfigError, ControllerConfig, LoggingConfig, TemplateConfig};
pub use credentials::{WriterCredentials, select_credentials, writer_client};
pub use error::{ErrorKind, ReconcileError, ReconcileResult};
pub use gc::{CleanupReport, collect_orphans};
pub use index::{ReferenceIndex, SourceRef};
pub use queue::WorkQueue;
pub use reconciler::{Action, DEFAULT_RETRY_DELAY, Reconciler, ReconcilerSettings};
pub use resolver::{resolve_references, validate_references};
pub use runtime::Controller;
