use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde_yaml::{Mapping, Value};

/// Separator between path segments
pub const SEPARATOR: char = '.';

/// Missing keys listed by `check` before the rest are summarised
const CHECK_PREVIEW: usize = 10;

/// Dotted path to leaf value of a locale document
pub type LocaleKeys = BTreeMap<String, Value>;

/// Read and flatten a YAML locale file
pub fn load(path: &Path) -> Result<LocaleKeys> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let doc: Value = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(flatten(&doc))
}

/// Flatten a nested mapping into dotted leaf paths.
/// Empty mappings are leaves; a non-mapping root has no keys.
pub fn flatten(doc: &Value) -> LocaleKeys {
    let mut keys = LocaleKeys::new();
    if let Some(mapping) = as_mapping(doc) {
        flatten_into(mapping, "", &mut keys);
    }
    keys
}

fn as_mapping(value: &Value) -> Option<&Mapping> {
    match value {
        Value::Mapping(mapping) => Some(mapping),
        Value::Tagged(tagged) => as_mapping(&tagged.value),
        _ => None,
    }
}

fn flatten_into(mapping: &Mapping, prefix: &str, keys: &mut LocaleKeys) {
    for (key, value) in mapping {
        let segment = key_text(key);
        let path = if prefix.is_empty() {
            segment
        } else {
            format!("{}{}{}", prefix, SEPARATOR, segment)
        };
        match as_mapping(value) {
            Some(nested) if !nested.is_empty() => flatten_into(nested, &path, keys),
            _ => {
                keys.insert(path, value.clone());
            }
        }
    }
}

/// Scalar keys render as their text, anything else as inline YAML
fn key_text(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Rebuild the nested document from dotted paths
pub fn unflatten(keys: &LocaleKeys) -> Value {
    let mut root = Mapping::new();
    for (path, value) in keys {
        let segments: Vec<&str> = path.split(SEPARATOR).collect();
        insert_path(&mut root, &segments, value.clone());
    }
    Value::Mapping(root)
}

fn insert_path(mapping: &mut Mapping, segments: &[&str], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let key = Value::String(first.to_string());
    if rest.is_empty() {
        mapping.insert(key, value);
        return;
    }
    let entry = mapping
        .entry(key)
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    if !entry.is_mapping() {
        *entry = Value::Mapping(Mapping::new());
    }
    if let Value::Mapping(nested) = entry {
        insert_path(nested, rest, value);
    }
}

/// Key comparison of a target locale against its base
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDiff {
    pub base_count: usize,
    pub target_count: usize,
    /// In base, not in target
    pub missing: BTreeSet<String>,
    /// In target, not in base
    pub extra: BTreeSet<String>,
}

impl KeyDiff {
    pub fn between(base: &LocaleKeys, target: &LocaleKeys) -> Self {
        Self {
            base_count: base.len(),
            target_count: target.len(),
            missing: base
                .keys()
                .filter(|k| !target.contains_key(*k))
                .cloned()
                .collect(),
            extra: target
                .keys()
                .filter(|k| !base.contains_key(*k))
                .cloned()
                .collect(),
        }
    }

    /// Share of base keys present in the target, in percent.
    /// None when the base has no keys.
    pub fn completion_rate(&self) -> Option<f64> {
        if self.base_count == 0 {
            None
        } else {
            Some(self.target_count as f64 / self.base_count as f64 * 100.0)
        }
    }
}

/// Translation progress report
pub fn write_check_report(diff: &KeyDiff, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "Base keys: {}", diff.base_count)?;
    writeln!(out, "Target keys: {}", diff.target_count)?;
    match diff.completion_rate() {
        Some(rate) => writeln!(out, "Completion rate: {:.1}%", rate)?,
        None => writeln!(out, "Completion rate: n/a")?,
    }

    if diff.missing.is_empty() {
        writeln!(out, "\n✅ All keys are translated!")?;
        return Ok(());
    }

    writeln!(out, "\nMissing keys: {}", diff.missing.len())?;
    writeln!(out, "Missing:")?;
    for key in diff.missing.iter().take(CHECK_PREVIEW) {
        writeln!(out, "  - {}", key)?;
    }
    if diff.missing.len() > CHECK_PREVIEW {
        writeln!(out, "  ... and {} more", diff.missing.len() - CHECK_PREVIEW)?;
    }
    Ok(())
}

/// Full listing of keys only one side has
pub fn write_extra_report(diff: &KeyDiff, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "Base keys: {}", diff.base_count)?;
    writeln!(out, "Target keys: {}", diff.target_count)?;

    if !diff.extra.is_empty() {
        writeln!(out, "\nKeys only in target ({}):", diff.extra.len())?;
        for key in &diff.extra {
            writeln!(out, "  - {}", key)?;
        }
    }

    if !diff.missing.is_empty() {
        writeln!(out, "\nKeys missing from target ({}):", diff.missing.len())?;
        for key in &diff.missing {
            writeln!(out, "  - {}", key)?;
        }
    }
    Ok(())
}
