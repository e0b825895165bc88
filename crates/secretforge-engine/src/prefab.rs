//! Bulk copy rules.

use std::collections::{HashMap, HashSet};

use secretforge_core::{Prefabs, ReferenceSubset};
use tracing::debug;

use crate::error::{DeriveError, PrefabMode};
use crate::payload::DerivedPayload;
use crate::references::ResolvedReferences;

/// Evaluates the first configured prefab rule.
///
/// Returns `Ok(None)` when no rule is configured, in which case explicit
/// targets apply. The preserve set of a prefab payload is always empty.
pub(crate) fn derive_prefab(
    prefab: &Prefabs,
    declared: &HashSet<&str>,
    refs: &ResolvedReferences,
) -> Result<Option<DerivedPayload>, DeriveError> {
    if prefab.copy_all() {
        return union(PrefabMode::CopyAll, refs, |_, _| true).map(Some);
    }
    if !prefab.copy_including.is_empty() {
        let selected = select(PrefabMode::CopyIncluding, &prefab.copy_including, declared, refs)?;
        return union(PrefabMode::CopyIncluding, refs, |reference, key| {
            selected
                .get(reference)
                .is_some_and(|keys| keys.matches(key))
        })
        .map(Some);
    }
    if !prefab.copy_excluding.is_empty() {
        let excluded = select(PrefabMode::CopyExcluding, &prefab.copy_excluding, declared, refs)?;
        return union(PrefabMode::CopyExcluding, refs, |reference, key| {
            !excluded
                .get(reference)
                .is_some_and(|keys| keys.matches(key))
        })
        .map(Some);
    }
    Ok(None)
}

/// Keys named for one reference by a prefab list.
#[derive(Debug, Default)]
struct KeySelection<'a> {
    all: bool,
    keys: HashSet<&'a str>,
}

impl KeySelection<'_> {
    fn matches(&self, key: &str) -> bool {
        self.all || self.keys.contains(key)
    }
}

/// Groups a prefab list by reference. Every named reference must be declared
/// and must have been resolved; an optional reference whose source is missing
/// cannot be copied from.
fn select<'a>(
    mode: PrefabMode,
    subsets: &'a [ReferenceSubset],
    declared: &HashSet<&str>,
    refs: &ResolvedReferences,
) -> Result<HashMap<&'a str, KeySelection<'a>>, DeriveError> {
    let mut selected: HashMap<&str, KeySelection<'_>> = HashMap::new();
    for subset in subsets {
        if !declared.contains(subset.name.as_str()) {
            return Err(DeriveError::UndeclaredReference {
                mode,
                reference: subset.name.clone(),
            });
        }
        if !refs.contains(&subset.name) {
            return Err(DeriveError::UnresolvedReference {
                mode,
                reference: subset.name.clone(),
            });
        }
        let entry = selected.entry(subset.name.as_str()).or_default();
        entry.all |= subset.all_keys();
        entry.keys.extend(subset.keys.iter().map(String::as_str));
    }
    Ok(selected)
}

/// Copies every key accepted by `keep` from config maps, then secrets, in
/// declaration order. A key copied twice is an error, whichever class each
/// copy landed in.
fn union(
    mode: PrefabMode,
    refs: &ResolvedReferences,
    keep: impl Fn(&str, &str) -> bool,
) -> Result<DerivedPayload, DeriveError> {
    let mut payload = DerivedPayload::default();
    let mut owners: HashMap<String, String> = HashMap::new();

    let mut claim = |key: &str, reference: &str| -> Result<(), DeriveError> {
        if let Some(previous) = owners.get(key) {
            return Err(DeriveError::PrefabCollision {
                mode,
                key: key.to_string(),
                reference: reference.to_string(),
                previous: previous.clone(),
            });
        }
        owners.insert(key.to_string(), reference.to_string());
        Ok(())
    };

    for (reference, config_map) in &refs.config_maps {
        for (key, value) in &config_map.data {
            if keep(reference, key) {
                claim(key, reference)?;
                payload.string_data.insert(key.clone(), value.clone());
            }
        }
        for (key, value) in &config_map.binary_data {
            if keep(reference, key) {
                claim(key, reference)?;
                payload.data.insert(key.clone(), value.clone());
            }
        }
    }

    for (reference, secret) in &refs.secrets {
        for (key, value) in &secret.string_data {
            if keep(reference, key) {
                claim(key, reference)?;
                payload.string_data.insert(key.clone(), value.clone());
            }
        }
        for (key, value) in &secret.data {
            if keep(reference, key) {
                claim(key, reference)?;
                payload.data.insert(key.clone(), value.clone());
            }
        }
    }

    debug!(mode = %mode, keys = payload.len(), "Evaluated prefab rule");
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secretforge_core::{ByteString, ConfigMap, ObjectMeta, Secret};

    fn cm(pairs: &[(&str, &str)]) -> ConfigMap {
        let mut cm = ConfigMap::new(ObjectMeta::new("ns", "cm"));
        for (k, v) in pairs {
            cm.data.insert(k.to_string(), v.to_string());
        }
        cm
    }

    fn secret(pairs: &[(&str, &str)]) -> Secret {
        let mut s = Secret::new(ObjectMeta::new("ns", "s"));
        for (k, v) in pairs {
            s.data.insert(k.to_string(), ByteString::from(*v));
        }
        s
    }

    fn declared<'a>(names: &[&'a str]) -> HashSet<&'a str> {
        names.iter().copied().collect()
    }

    fn subset(name: &str, keys: &[&str], all: bool) -> ReferenceSubset {
        ReferenceSubset {
            name: name.into(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
            all_keys: Some(all),
        }
    }

    #[test]
    fn test_copy_all_routes_classes() {
        let refs = ResolvedReferences::new()
            .with_config_map("settings", cm(&[("host", "db")]))
            .with_secret("creds", secret(&[("password", "hunter2")]));
        let prefab = Prefabs {
            copy_all: Some(true),
            ..Default::default()
        };

        let payload = derive_prefab(&prefab, &declared(&["settings", "creds"]), &refs)
            .unwrap()
            .unwrap();
        assert_eq!(payload.string_data["host"], "db");
        assert_eq!(payload.data["password"].as_slice(), b"hunter2");
        assert!(payload.preserve.is_empty());
    }

    #[test]
    fn test_copy_all_collision_across_classes() {
        let refs = ResolvedReferences::new()
            .with_config_map("first", cm(&[("k", "1")]))
            .with_secret("second", secret(&[("k", "2")]));
        let prefab = Prefabs {
            copy_all: Some(true),
            ..Default::default()
        };

        let err = derive_prefab(&prefab, &declared(&["first", "second"]), &refs).unwrap_err();
        match err {
            DeriveError::PrefabCollision {
                key,
                reference,
                previous,
                ..
            } => {
                assert_eq!(key, "k");
                assert_eq!(reference, "second");
                assert_eq!(previous, "first");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_collision_within_one_secret() {
        let mut s = secret(&[("k", "bytes")]);
        s.string_data.insert("k".into(), "text".into());
        let refs = ResolvedReferences::new().with_secret("only", s);
        let prefab = Prefabs {
            copy_all: Some(true),
            ..Default::default()
        };
        assert!(matches!(
            derive_prefab(&prefab, &declared(&["only"]), &refs),
            Err(DeriveError::PrefabCollision { .. })
        ));
    }

    #[test]
    fn test_copy_including_lists_and_all_keys() {
        let refs = ResolvedReferences::new()
            .with_config_map("a", cm(&[("x", "1"), ("y", "2")]))
            .with_config_map("b", cm(&[("z", "3")]))
            .with_config_map("c", cm(&[("w", "4")]));
        let prefab = Prefabs {
            copy_including: vec![subset("a", &["x"], false), subset("b", &[], true)],
            ..Default::default()
        };

        let payload = derive_prefab(&prefab, &declared(&["a", "b", "c"]), &refs)
            .unwrap()
            .unwrap();
        let keys: Vec<_> = payload.string_data.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["x", "z"]);
    }

    #[test]
    fn test_collision_only_checked_on_copied_keys() {
        let refs = ResolvedReferences::new()
            .with_config_map("a", cm(&[("k", "1"), ("x", "2")]))
            .with_config_map("b", cm(&[("k", "3")]));
        let prefab = Prefabs {
            copy_including: vec![subset("a", &["x"], false), subset("b", &["k"], false)],
            ..Default::default()
        };
        let payload = derive_prefab(&prefab, &declared(&["a", "b"]), &refs)
            .unwrap()
            .unwrap();
        assert_eq!(payload.string_data["k"], "3");
        assert_eq!(payload.string_data["x"], "2");
    }

    #[test]
    fn test_copy_excluding() {
        let refs = ResolvedReferences::new()
            .with_config_map("a", cm(&[("keep", "1"), ("drop", "2")]))
            .with_config_map("b", cm(&[("gone", "3")]))
            .with_secret("c", secret(&[("token", "t")]));
        let prefab = Prefabs {
            copy_excluding: vec![subset("a", &["drop"], false), subset("b", &[], true)],
            ..Default::default()
        };

        let payload = derive_prefab(&prefab, &declared(&["a", "b", "c"]), &refs)
            .unwrap()
            .unwrap();
        assert_eq!(payload.string_data.keys().collect::<Vec<_>>(), vec!["keep"]);
        assert!(payload.data.contains_key("token"));
    }

    #[test]
    fn test_undeclared_reference_is_rejected() {
        let refs = ResolvedReferences::new().with_config_map("a", cm(&[("x", "1")]));
        let prefab = Prefabs {
            copy_including: vec![subset("ghost", &["x"], false)],
            ..Default::default()
        };
        let err = derive_prefab(&prefab, &declared(&["a"]), &refs).unwrap_err();
        assert!(matches!(err, DeriveError::UndeclaredReference { ref reference, .. } if reference == "ghost"));
    }

    #[test]
    fn test_declared_but_unresolved_reference_is_rejected() {
        let refs = ResolvedReferences::new().with_config_map("a", cm(&[("x", "1")]));
        let prefab = Prefabs {
            copy_including: vec![subset("a", &["x"], false), subset("optional", &[], true)],
            ..Default::default()
        };
        let err = derive_prefab(&prefab, &declared(&["a", "optional"]), &refs).unwrap_err();
        assert!(matches!(
            err,
            DeriveError::UnresolvedReference { mode: PrefabMode::CopyIncluding, ref reference }
                if reference == "optional"
        ));
        assert_eq!(
            err.to_string(),
            "prefab copyIncluding: reference optional does not exist"
        );

        let prefab = Prefabs {
            copy_excluding: vec![subset("optional", &["x"], false)],
            ..Default::default()
        };
        assert!(matches!(
            derive_prefab(&prefab, &declared(&["a", "optional"]), &refs),
            Err(DeriveError::UnresolvedReference { mode: PrefabMode::CopyExcluding, .. })
        ));
    }

    #[test]
    fn test_empty_prefab_falls_through() {
        let refs = ResolvedReferences::new();
        assert!(
            derive_prefab(&Prefabs::default(), &declared(&[]), &refs)
                .unwrap()
                .is_none()
        );
    }
}
