//! Loading of YAML/JSON manifests, one or more documents per file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use secretforge_core::{ConfigMap, DerivedSecret, Secret};
use serde::Deserialize;

/// Objects the CLI understands, tagged by their `kind`.
#[derive(Debug, Clone)]
pub enum Manifest {
    ConfigMap(ConfigMap),
    Secret(Secret),
    DerivedSecret(Box<DerivedSecret>),
}

/// Everything found in a set of manifests, grouped by kind.
#[derive(Debug, Default)]
pub struct ManifestSet {
    pub config_maps: Vec<ConfigMap>,
    pub secrets: Vec<Secret>,
    pub derived_secrets: Vec<DerivedSecret>,
    /// Documents of other kinds that were skipped
    pub skipped: usize,
}

impl ManifestSet {
    fn push(&mut self, manifest: Manifest) {
        match manifest {
            Manifest::ConfigMap(cm) => self.config_maps.push(cm),
            Manifest::Secret(s) => self.secrets.push(s),
            Manifest::DerivedSecret(ds) => self.derived_secrets.push(*ds),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.config_maps.is_empty() && self.secrets.is_empty() && self.derived_secrets.is_empty()
    }
}

/// Loads every manifest under `paths`. Directories are read one level deep,
/// taking `.yaml`, `.yml` and `.json` files in name order.
pub fn load_paths(paths: &[PathBuf]) -> Result<ManifestSet> {
    let mut set = ManifestSet::default();
    for path in paths {
        for file in manifest_files(path)? {
            let text = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let (manifests, skipped) =
                parse_documents(&text).with_context(|| format!("in {}", file.display()))?;
            set.skipped += skipped;
            for manifest in manifests {
                set.push(manifest);
            }
        }
    }
    Ok(set)
}

fn manifest_files(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in
        fs::read_dir(path).with_context(|| format!("failed to list {}", path.display()))?
    {
        let file = entry?.path();
        let is_manifest = file
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext, "yaml" | "yml" | "json"));
        if file.is_file() && is_manifest {
            files.push(file);
        }
    }
    files.sort();
    Ok(files)
}

/// Parses a multi-document stream. Returns the recognized manifests and the
/// number of documents of other kinds.
pub fn parse_documents(text: &str) -> Result<(Vec<Manifest>, usize)> {
    let mut manifests = Vec::new();
    let mut skipped = 0;
    for (index, document) in serde_yaml::Deserializer::from_str(text).enumerate() {
        let value = serde_yaml::Value::deserialize(document)
            .with_context(|| format!("document {} is not valid YAML", index + 1))?;
        if value.is_null() {
            continue;
        }
        let kind = value
            .get("kind")
            .and_then(|k| k.as_str())
            .unwrap_or_default()
            .to_string();
        let parsed = match kind.as_str() {
            "ConfigMap" => Manifest::ConfigMap(serde_yaml::from_value(value)?),
            "Secret" => Manifest::Secret(serde_yaml::from_value(value)?),
            "DerivedSecret" => Manifest::DerivedSecret(Box::new(serde_yaml::from_value(value)?)),
            "" => bail!("document {} has no kind", index + 1),
            _ => {
                skipped += 1;
                continue;
            }
        };
        manifests.push(parsed);
    }
    Ok((manifests, skipped))
}
