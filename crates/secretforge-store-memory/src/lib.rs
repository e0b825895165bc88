//! # secretforge-store-memory
//!
//! In-memory object store backend for secretforge.
//!
//! Backs the CLI's offline `reconcile` command and the controller's tests.
//! Beyond plain storage it mimics the cluster API behaviors the controller
//! relies on: resource versions, generations, `stringData` folding, watch
//! events, cascading deletion of owned secrets and impersonation.
//!
//! ## Example
//!
//! ```ignore
//! use secretforge_store_memory::InMemoryStore;
//! use secretforge_storage::ClientProvider;
//!
//! let store = InMemoryStore::new();
//! let events = store.subscribe();
//! let client = store.ambient();
//! ```

mod object_store;
mod store;

pub use store::{AccessPolicy, InMemoryStore};
