//! Object store traits.
//!
//! The reconciliation pipeline only talks to storage through these traits, so
//! a cluster API client, a cache-backed reader or the in-memory backend can be
//! swapped in without touching pipeline code.

use std::sync::Arc;

use async_trait::async_trait;
use secretforge_core::{ConfigMap, DerivedSecret, ObjectKey, Secret};

use crate::error::StoreError;
use crate::identity::Identity;

/// Access to the persistent objects the controller reads and writes.
///
/// Reads return `Ok(None)` for missing objects; errors are reserved for
/// infrastructure and permission failures. Implementations must be
/// thread-safe (`Send + Sync`).
///
/// # Example
///
/// ```ignore
/// use secretforge_storage::{ObjectStore, StoreError};
///
/// async fn password(store: &dyn ObjectStore, key: &ObjectKey) -> Result<Vec<u8>, StoreError> {
///     let secret = store
///         .get_secret(key)
///         .await?
///         .ok_or_else(|| StoreError::not_found("Secret", key))?;
///     Ok(secret.data.get("password").map(|v| v.to_vec()).unwrap_or_default())
/// }
/// ```
#[async_trait]
pub trait ObjectStore: Send + Sync {
    // ==================== Sources ====================

    /// Reads a config map.
    async fn get_config_map(&self, key: &ObjectKey) -> Result<Option<ConfigMap>, StoreError>;

    /// Reads a secret.
    async fn get_secret(&self, key: &ObjectKey) -> Result<Option<Secret>, StoreError>;

    // ==================== Generated secrets ====================

    /// Lists secrets, restricted to `namespace` when given.
    async fn list_secrets(&self, namespace: Option<&str>) -> Result<Vec<Secret>, StoreError>;

    /// Creates a secret and returns the stored copy (with uid and resource version).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` if a secret with the same key exists.
    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;

    /// Replaces a secret.
    ///
    /// The write only succeeds if `secret.metadata.resource_version` matches
    /// the stored version.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the secret does not exist.
    /// Returns `StoreError::VersionConflict` if it changed since it was read.
    async fn update_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;

    /// Deletes a secret.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the secret does not exist.
    async fn delete_secret(&self, key: &ObjectKey) -> Result<(), StoreError>;

    // ==================== Tracked resources ====================

    /// Reads a derived secret.
    async fn get_derived_secret(&self, key: &ObjectKey)
    -> Result<Option<DerivedSecret>, StoreError>;

    /// Lists derived secrets, restricted to `namespace` when given.
    async fn list_derived_secrets(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<DerivedSecret>, StoreError>;

    /// Writes only the status of a derived secret, guarded by its resource version.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the resource was deleted.
    /// Returns `StoreError::VersionConflict` if it changed since it was read.
    async fn update_derived_secret_status(
        &self,
        derived: &DerivedSecret,
    ) -> Result<DerivedSecret, StoreError>;

    // ==================== Metadata ====================

    /// The identity requests are made as; `None` for the controller's own credentials.
    fn acting_as(&self) -> Option<&Identity>;

    /// Returns the name of this backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// Shared handle to an object store.
pub type DynStore = Arc<dyn ObjectStore>;

/// Hands out store clients for the controller's own identity or an impersonated one.
pub trait ClientProvider: Send + Sync {
    /// Client using the controller's ambient credentials.
    fn ambient(&self) -> DynStore;

    /// Client whose requests are made as `identity`.
    ///
    /// # Errors
    ///
    /// Returns an error if an impersonating client cannot be constructed.
    fn impersonate(&self, identity: &Identity) -> Result<DynStore, StoreError>;
}
