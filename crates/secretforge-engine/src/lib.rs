//! # secretforge-engine
//!
//! Computes the payload of a generated secret from a `DerivedSecret` spec and
//! the sources its references resolved to. The engine performs no I/O.
//!
//! Evaluation order, first match wins:
//!
//! 1. `prefab.copyAll`
//! 2. `prefab.copyIncluding`
//! 3. `prefab.copyExcluding`
//! 4. explicit `data` targets, then `stringData` targets
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use secretforge_engine::{DerivationEngine, ResolvedReferences, TemplateEnvironment};
//!
//! let engine = DerivationEngine::new(Arc::new(TemplateEnvironment::default()));
//! let payload = engine.derive(&derived.spec, &ResolvedReferences::new())?;
//! ```

mod context;
mod error;
mod functions;
mod payload;
mod prefab;
mod references;
mod targets;

use std::collections::HashSet;
use std::sync::Arc;

use secretforge_core::DerivedSecretSpec;
use tracing::debug;

pub use context::{RefValue, ReferenceView, TemplateContext, config_map_view, secret_view};
pub use error::{DeriveError, PrefabMode, TargetField};
pub use functions::{TemplateEnvironment, TemplateOptions};
pub use payload::DerivedPayload;
pub use references::ResolvedReferences;

/// Result type for derivations.
pub type DeriveResult<T> = Result<T, DeriveError>;

/// Stateless payload calculator sharing one template environment.
#[derive(Debug, Clone)]
pub struct DerivationEngine {
    templates: Arc<TemplateEnvironment>,
}

impl Default for DerivationEngine {
    fn default() -> Self {
        Self::new(Arc::new(TemplateEnvironment::default()))
    }
}

impl DerivationEngine {
    pub fn new(templates: Arc<TemplateEnvironment>) -> Self {
        Self { templates }
    }

    pub fn templates(&self) -> &TemplateEnvironment {
        &self.templates
    }

    /// Computes the payload for `spec` against the resolved `refs`.
    ///
    /// When a prefab rule is configured, explicit targets are ignored and the
    /// returned preserve set is empty.
    pub fn derive(
        &self,
        spec: &DerivedSecretSpec,
        refs: &ResolvedReferences,
    ) -> DeriveResult<DerivedPayload> {
        if let Some(prefab) = &spec.prefab {
            let declared: HashSet<&str> =
                spec.references.iter().map(|r| r.name.as_str()).collect();
            if let Some(payload) = prefab::derive_prefab(prefab, &declared, refs)? {
                return Ok(payload);
            }
        }

        let context = TemplateContext::from_references(refs).to_value();
        let payload = targets::derive_targets(spec, &self.templates, &context)?;
        debug!(
            keys = payload.len(),
            preserved = payload.preserve.len(),
            references = refs.len(),
            "Derived payload from explicit targets"
        );
        Ok(payload)
    }
}
