//! Explicit per-key targets.

use std::collections::HashSet;

use minijinja::{ErrorKind, Value};
use secretforge_core::{ByteString, DerivedSecretSpec};
use serde_yaml::Value as Yaml;
use tracing::trace;

use crate::error::{DeriveError, TargetField};
use crate::functions::TemplateEnvironment;
use crate::payload::DerivedPayload;

/// Evaluates `spec.data` then `spec.stringData`, each in key order.
///
/// Every output key, including each key a map template fans out to, must be
/// unique across both classes.
pub(crate) fn derive_targets(
    spec: &DerivedSecretSpec,
    templates: &TemplateEnvironment,
    references: &Value,
) -> Result<DerivedPayload, DeriveError> {
    let mut payload = DerivedPayload::default();
    let mut known: HashSet<String> = HashSet::new();

    for (key, target) in &spec.data {
        let field = TargetField::Data;
        if let Some(literal) = &target.literal {
            claim(&mut known, key)?;
            payload.data.insert(key.clone(), literal.clone());
            if !target.overwrite() {
                payload.preserve.insert(key.clone());
            }
            continue;
        }

        let rendered = render(templates, field, key, target.template_source(), references)?;
        if target.is_map() {
            for (out_key, encoded) in parse_map(field, key, &rendered)? {
                let bytes = decode(field, &out_key, &encoded)?;
                claim(&mut known, &out_key)?;
                if !target.overwrite() {
                    payload.preserve.insert(out_key.clone());
                }
                payload.data.insert(out_key, bytes);
            }
        } else {
            let bytes = decode(field, key, &rendered)?;
            claim(&mut known, key)?;
            payload.data.insert(key.clone(), bytes);
            if !target.overwrite() {
                payload.preserve.insert(key.clone());
            }
        }
    }

    for (key, target) in &spec.string_data {
        let field = TargetField::StringData;
        if let Some(literal) = &target.literal {
            claim(&mut known, key)?;
            payload.string_data.insert(key.clone(), literal.clone());
            if !target.overwrite() {
                payload.preserve.insert(key.clone());
            }
            continue;
        }

        let rendered = render(templates, field, key, target.template_source(), references)?;
        if target.is_map() {
            for (out_key, value) in parse_map(field, key, &rendered)? {
                claim(&mut known, &out_key)?;
                if !target.overwrite() {
                    payload.preserve.insert(out_key.clone());
                }
                payload.string_data.insert(out_key, value);
            }
        } else {
            claim(&mut known, key)?;
            payload.string_data.insert(key.clone(), rendered);
            if !target.overwrite() {
                payload.preserve.insert(key.clone());
            }
        }
    }

    Ok(payload)
}

fn claim(known: &mut HashSet<String>, key: &str) -> Result<(), DeriveError> {
    if !known.insert(key.to_string()) {
        return Err(DeriveError::KeyCollision {
            key: key.to_string(),
        });
    }
    Ok(())
}

fn render(
    templates: &TemplateEnvironment,
    field: TargetField,
    key: &str,
    source: &str,
    references: &Value,
) -> Result<String, DeriveError> {
    let name = format!("{field}[{key}]");
    let rendered = templates
        .render(&name, source, references)
        .map_err(|source| {
            if source.kind() == ErrorKind::SyntaxError {
                DeriveError::TemplateParse {
                    field,
                    key: key.to_string(),
                    source,
                }
            } else {
                DeriveError::TemplateRender {
                    field,
                    key: key.to_string(),
                    source,
                }
            }
        })?;
    trace!(target_key = %key, %field, "Rendered template");
    Ok(rendered)
}

fn decode(field: TargetField, key: &str, encoded: &str) -> Result<ByteString, DeriveError> {
    ByteString::from_base64(encoded).map_err(|source| DeriveError::Base64 {
        field,
        key: key.to_string(),
        source,
    })
}

/// Parses map template output as a flat YAML mapping of scalars.
///
/// Empty output and `null` give an empty map. Numbers and booleans are kept
/// in their textual form.
fn parse_map(
    field: TargetField,
    key: &str,
    rendered: &str,
) -> Result<Vec<(String, String)>, DeriveError> {
    let malformed = |message: String| DeriveError::MalformedMap {
        field,
        key: key.to_string(),
        message,
    };

    if rendered.trim().is_empty() {
        return Ok(Vec::new());
    }
    let document: Yaml = serde_yaml::from_str(rendered).map_err(|e| malformed(e.to_string()))?;
    let mapping = match document {
        Yaml::Null => return Ok(Vec::new()),
        Yaml::Mapping(mapping) => mapping,
        other => {
            return Err(malformed(format!(
                "expected a mapping, found {}",
                describe(&other)
            )));
        }
    };

    let mut entries = Vec::with_capacity(mapping.len());
    for (k, v) in mapping {
        let out_key = scalar(&k)
            .ok_or_else(|| malformed(format!("key of type {} is not a scalar", describe(&k))))?;
        let value = match v {
            Yaml::Null => String::new(),
            other => scalar(&other).ok_or_else(|| {
                malformed(format!(
                    "value of {out_key} is a {}, not a scalar",
                    describe(&other)
                ))
            })?,
        };
        entries.push((out_key, value));
    }
    Ok(entries)
}

fn scalar(value: &Yaml) -> Option<String> {
    match value {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Number(n) => Some(n.to_string()),
        Yaml::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn describe(value: &Yaml) -> &'static str {
    match value {
        Yaml::Null => "null",
        Yaml::Bool(_) => "boolean",
        Yaml::Number(_) => "number",
        Yaml::String(_) => "string",
        Yaml::Sequence(_) => "sequence",
        Yaml::Mapping(_) => "mapping",
        Yaml::Tagged(_) => "tagged value",
    }
}
