//! # secretforge-storage
//!
//! Object store abstraction layer for secretforge.
//!
//! This crate defines the traits and types that every store backend must
//! implement. It does not contain any implementations - those are provided by
//! separate crates.
//!
//! ## Overview
//!
//! - [`ObjectStore`]: reads of source config maps/secrets, CRUD on generated
//!   secrets, and status writes on derived secrets.
//! - [`ClientProvider`]: hands out the ambient client or one impersonating an
//!   [`Identity`].
//! - [`WatchEvent`]: change notifications used to route reconciliations.

mod error;
pub mod events;
mod identity;
mod traits;

pub use error::{ErrorCategory, StoreError};
pub use events::{WatchEvent, WatchedObject};
pub use identity::Identity;
pub use traits::{ClientProvider, DynStore, ObjectStore};

/// Type alias for a store result.
pub type StoreResult<T> = Result<T, StoreError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use secretforge_storage::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{ErrorCategory, StoreError};
    pub use crate::events::{WatchEvent, WatchedObject};
    pub use crate::identity::Identity;
    pub use crate::traits::{ClientProvider, DynStore, ObjectStore};
    pub use crate::StoreResult;
}
