//! Create-or-update of the generated secret.
//!
//! The desired secret is computed from whatever currently exists at the
//! target key, so keys written by others survive, and is only written when
//! it differs from the stored copy.

use secretforge_core::{
    ByteString, DerivedSecret, ObjectKey, ObjectMeta, OwnerReference, ProvenanceIdentity,
    Resource, Secret,
};
use secretforge_engine::DerivedPayload;
use secretforge_storage::DynStore;
use tracing::info;

use crate::error::{ReconcileError, ReconcileResult};

/// What the apply stage did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOperation {
    Created,
    Updated,
    Unchanged,
}

/// Outcome of applying a payload.
#[derive(Debug, Clone)]
pub struct Applied {
    pub key: ObjectKey,
    pub operation: ApplyOperation,
    pub secret: Secret,
}

/// Writes `payload` into the secret at `target` using `client`.
///
/// # Errors
///
/// `ReconcileError::AlreadyOwned` if the existing secret is controlled by
/// another object; `ReconcileError::Apply` for store failures, including
/// concurrent modification.
pub async fn apply_payload(
    client: &DynStore,
    owner: &DerivedSecret,
    target: &ObjectKey,
    target_type: &str,
    payload: &DerivedPayload,
) -> ReconcileResult<Applied> {
    let store_error = |source| ReconcileError::Apply {
        target: target.clone(),
        source,
    };

    let existing = client.get_secret(target).await.map_err(store_error)?;
    let base = existing
        .clone()
        .unwrap_or_else(|| Secret::new(ObjectMeta::new(&target.namespace, &target.name)));
    let desired = desired_secret(base, owner, target_type, payload)?;

    let (operation, secret) = match existing {
        None => {
            let created = client.create_secret(&desired).await.map_err(store_error)?;
            (ApplyOperation::Created, created)
        }
        Some(current) if current == desired => (ApplyOperation::Unchanged, current),
        Some(_) => {
            let updated = client.update_secret(&desired).await.map_err(store_error)?;
            (ApplyOperation::Updated, updated)
        }
    };

    if operation != ApplyOperation::Unchanged {
        info!(
            secret = %target,
            owner = %owner.key(),
            operation = ?operation,
            keys = payload.len(),
            "Applied generated secret"
        );
    }

    Ok(Applied {
        key: target.clone(),
        operation,
        secret,
    })
}

/// Merges `payload` into `existing`.
///
/// Both payload classes are written to `data`, the form the store persists.
/// Preserved keys keep their current value when present in either class.
pub fn desired_secret(
    mut secret: Secret,
    owner: &DerivedSecret,
    target_type: &str,
    payload: &DerivedPayload,
) -> ReconcileResult<Secret> {
    for (key, value) in std::mem::take(&mut secret.string_data) {
        secret.data.insert(key, ByteString::from(value.into_bytes()));
    }

    secret.type_ = Some(target_type.to_string());

    for (key, value) in &payload.data {
        if payload.is_preserved(key) && secret.contains_key(key) {
            continue;
        }
        secret.data.insert(key.clone(), value.clone());
    }
    for (key, value) in &payload.string_data {
        if payload.is_preserved(key) && secret.contains_key(key) {
            continue;
        }
        secret.data.insert(key.clone(), ByteString::from(value.as_str()));
    }

    secret
        .metadata
        .labels
        .extend(ProvenanceIdentity::of(owner).labels());

    if secret.metadata.namespace == owner.metadata.namespace {
        set_controller_reference(&mut secret, owner)?;
    }

    Ok(secret)
}

/// Makes `owner` the controlling owner of `secret`.
fn set_controller_reference(secret: &mut Secret, owner: &DerivedSecret) -> ReconcileResult<()> {
    let Some(uid) = owner.metadata.uid.clone() else {
        return Ok(());
    };

    if let Some(current) = secret.metadata.controller_owner() {
        if current.uid != uid {
            return Err(ReconcileError::AlreadyOwned {
                target: secret.key(),
                owner_kind: current.kind.clone(),
                owner_name: current.name.clone(),
            });
        }
    }

    let gvk = DerivedSecret::gvk();
    let reference = OwnerReference {
        api_version: gvk.api_version(),
        kind: gvk.kind,
        name: owner.metadata.name.clone(),
        uid,
        controller: Some(true),
        block_owner_deletion: Some(true),
    };
    let refs = &mut secret.metadata.owner_references;
    match refs.iter_mut().find(|r| r.uid == reference.uid) {
        Some(existing) => *existing = reference,
        None => refs.push(reference),
    }
    Ok(())
}
