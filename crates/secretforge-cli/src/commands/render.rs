use anyhow::{Context, Result, bail};
use secretforge_controller::{AppConfig, desired_secret, resolve_references};
use secretforge_core::{ObjectMeta, Secret};
use secretforge_storage::ClientProvider;
use secretforge_store_memory::InMemoryStore;

use crate::cli::{OutputFormat, RenderArgs};
use crate::manifests::load_paths;
use crate::output::{print_secrets, print_warning};

/// Derives the secret for a single DerivedSecret without writing anything.
pub async fn render(args: &RenderArgs, config: &AppConfig, format: OutputFormat) -> Result<()> {
    let tracked = load_paths(std::slice::from_ref(&args.file))?;
    let derived = match tracked.derived_secrets.as_slice() {
        [derived] => derived.clone(),
        [] => bail!("{} contains no DerivedSecret", args.file.display()),
        _ => bail!(
            "{} contains {} DerivedSecrets, expected one",
            args.file.display(),
            tracked.derived_secrets.len()
        ),
    };

    let sources = load_paths(&args.sources)?;
    if sources.skipped > 0 {
        print_warning(&format!("skipped {} unsupported documents", sources.skipped));
    }
    let store = InMemoryStore::new();
    super::seed_sources(&store, &sources);

    let references = resolve_references(store.ambient().as_ref(), &derived)
        .await
        .context("failed to resolve references")?;
    let payload = super::engine(config)
        .derive(&derived.spec, &references)
        .context("failed to derive payload")?;

    let target = derived.target_key();
    let base = Secret::new(ObjectMeta::new(&target.namespace, &target.name));
    let target_type = derived.target_type(&config.controller.default_target_type);
    let secret = desired_secret(base, &derived, &target_type, &payload)?;

    print_secrets(&[secret], format)
}
