use std::sync::Arc;

use anyhow::{Result, bail};
use secretforge_controller::{AppConfig, Reconciler};
use secretforge_core::{ProvenanceIdentity, Resource};
use secretforge_storage::ClientProvider;
use secretforge_store_memory::InMemoryStore;
use tracing::debug;

use crate::cli::{OutputFormat, ReconcileArgs};
use crate::manifests::load_paths;
use crate::output::{StatusRow, print_secrets, print_status_table, print_warning};

/// Seeds an in-memory store from manifests and reconciles every
/// DerivedSecret in it once, in key order.
pub async fn reconcile(args: &ReconcileArgs, config: &AppConfig, format: OutputFormat) -> Result<()> {
    let set = load_paths(&args.paths)?;
    if set.skipped > 0 {
        print_warning(&format!("skipped {} unsupported documents", set.skipped));
    }
    if set.is_empty() {
        bail!("no manifests found");
    }

    let store = InMemoryStore::new();
    super::seed_sources(&store, &set);
    for derived in &set.derived_secrets {
        store.apply_derived_secret(derived.clone());
    }

    let reconciler = Reconciler::new(
        Arc::new(store.clone()),
        super::engine(config),
        config.controller.reconciler_settings(),
    );
    let client = store.ambient();

    let mut rows = Vec::new();
    for derived in client.list_derived_secrets(None).await? {
        let key = derived.key();
        let error = match reconciler.reconcile(&key).await {
            Ok(action) => {
                debug!(derived_secret = %key, ?action, "Reconciled");
                None
            }
            Err(e) => Some(e.to_string()),
        };
        rows.push(StatusRow {
            derived_secret: key.to_string(),
            target: derived.target_key().to_string(),
            error,
        });
    }

    if !args.status_only {
        let generated: Vec<_> = client
            .list_secrets(None)
            .await?
            .into_iter()
            .filter(|secret| ProvenanceIdentity::of_artifact(secret).is_some())
            .collect();
        print_secrets(&generated, format)?;
    }
    print_status_table(&rows);

    let failed = rows.iter().filter(|r| r.error.is_some()).count();
    if failed > 0 {
        bail!("{failed} DerivedSecret(s) failed to reconcile");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SOURCES: &str = r#"
kind: Secret
metadata:
  name: postgres
  namespace: team-a
stringData:
  password: s3cr3t
"#;

    const DERIVED: &str = r#"
kind: DerivedSecret
apiVersion: secretforge.io/v1alpha1
metadata:
  name: app
  namespace: team-a
spec:
  references:
    - name: db
      secretRef:
        name: postgres
  stringData:
    url:
      template: "postgres://app:{{ references.db.password | utf8 }}@db"
"#;

    fn args(dir: &std::path::Path) -> ReconcileArgs {
        ReconcileArgs {
            paths: vec![dir.to_path_buf()],
            status_only: true,
        }
    }

    #[tokio::test]
    async fn test_reconciles_manifest_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("sources.yaml"), SOURCES).unwrap();
        fs::write(dir.path().join("derived.yaml"), DERIVED).unwrap();

        reconcile(&args(dir.path()), &AppConfig::default(), OutputFormat::Yaml)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_source_fails_the_command() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("derived.yaml"), DERIVED).unwrap();

        let err = reconcile(&args(dir.path()), &AppConfig::default(), OutputFormat::Yaml)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("1 DerivedSecret(s) failed"));
    }
}
