pub mod config;
pub mod reconcile;
pub mod render;

use std::sync::Arc;

use secretforge_controller::AppConfig;
use secretforge_engine::{DerivationEngine, TemplateEnvironment};
use secretforge_store_memory::InMemoryStore;

use crate::manifests::ManifestSet;

/// Engine with the template options from `config`.
pub(crate) fn engine(config: &AppConfig) -> DerivationEngine {
    DerivationEngine::new(Arc::new(TemplateEnvironment::new(
        config.templates.options(),
    )))
}

/// Writes every source object of `set` into `store`.
pub(crate) fn seed_sources(store: &InMemoryStore, set: &ManifestSet) {
    for config_map in &set.config_maps {
        store.apply_config_map(config_map.clone());
    }
    for secret in &set.secrets {
        store.apply_secret(secret.clone());
    }
}
