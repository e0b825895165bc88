pub mod bytes;
pub mod derived_secret;
pub mod error;
pub mod meta;
pub mod provenance;
pub mod resources;
pub mod time;

pub use bytes::ByteString;
pub use derived_secret::{
    BinaryTarget, DerivedSecret, DerivedSecretSpec, DerivedSecretStatus, Prefabs, Reference,
    ReferenceSubset, SourceKind, SourceSelection, SourceSelector, StringTarget, Target,
};
pub use error::{CoreError, ErrorCategory, Result};
pub use meta::{GroupVersionKind, ObjectKey, ObjectMeta, OwnerReference, Resource};
pub use provenance::ProvenanceIdentity;
pub use resources::{ConfigMap, DEFAULT_SECRET_TYPE, Secret};
pub use time::{Timestamp, now};
