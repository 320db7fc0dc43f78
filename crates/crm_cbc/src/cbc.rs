//! C7: parses a Conda Build Configuration (`conda_build_config.yaml`/`cbc.yaml`) file.
//!
//! CBC files reuse the recipe grammar almost exactly (a flat mapping of variable name to a list
//! of candidate values, each optionally tagged with a `# [selector]` comment), so parsing is
//! built directly on [`crm_parser::Reader`] rather than a bespoke grammar.

use std::collections::HashSet;

use indexmap::IndexMap;

use crm_parser::{Path, Reader};
use crm_selector::{BuildContext, Selector};
use crm_types::Primitive;

use crate::error::CbcError;

const SPECIAL_KEYS: &[&str] = &["pin_run_as_build", "extend_keys", "ignore_version", "ignore_build_only_deps"];

/// The built-in fallback values seeded ahead of every configured CBC file, mirroring conda-build's
/// compiled-in defaults. Unlike the original (which derives `python` from the running
/// interpreter), these are fixed so the generated variant matrix is reproducible.
const DEFAULT_VARIANTS: &[(&str, &str)] = &[
    ("python", "3.12"),
    ("perl", "5.26.2"),
    ("lua", "5"),
    ("r_base", "3.5"),
    ("cpu_optimization_target", "nocona"),
];

/// One candidate value for a CBC variable, with the selector (if any) that gates it.
#[derive(Debug, Clone)]
pub struct CbcEntry {
    pub value: Primitive,
    pub selector: Option<Selector>,
}

impl CbcEntry {
    fn applies(&self, context: &BuildContext) -> Result<bool, CbcError> {
        match &self.selector {
            Some(selector) => Ok(selector.does_apply(context)?),
            None => Ok(true),
        }
    }
}

/// A parsed CBC file: a table of variable name -> candidate values, plus the `zip_keys` groups
/// that constrain how those values are combined.
pub struct CbcFile {
    vars: IndexMap<String, Vec<CbcEntry>>,
    zip_keys: Vec<Vec<CbcEntry>>,
}

impl CbcFile {
    pub fn parse(content: &str) -> Result<Self, CbcError> {
        let reader = Reader::new(content)?;
        let root = reader.render_to_object();
        let serde_json::Value::Object(map) = root else {
            return Ok(CbcFile { vars: IndexMap::new(), zip_keys: Vec::new() });
        };

        let mut vars: IndexMap<String, Vec<CbcEntry>> = IndexMap::new();
        let mut zip_keys = Vec::new();

        for (variable, value) in map {
            if SPECIAL_KEYS.contains(&variable.as_str()) {
                continue;
            }
            if variable == "zip_keys" {
                zip_keys = parse_zip_keys(&reader, &value)?;
                continue;
            }

            let values = match &value {
                serde_json::Value::Array(items) => items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| build_entry(&reader, &Path::root().push_key(variable.as_str()).push_index(i), v))
                    .collect::<Result<Vec<_>, _>>()?,
                scalar => vec![build_entry(&reader, &Path::root().push_key(variable.as_str()), scalar)?],
            };
            vars.entry(variable).or_default().extend(values);
        }

        Ok(CbcFile { vars, zip_keys })
    }

    /// Builds the default-variants CBC file, seeded ahead of every configured CBC file in
    /// [`generate_cbc_values`].
    fn default_variants() -> Self {
        let mut vars = IndexMap::new();
        for (key, value) in DEFAULT_VARIANTS {
            vars.insert(key.to_string(), vec![CbcEntry { value: Primitive::from(*value), selector: None }]);
        }
        CbcFile { vars, zip_keys: Vec::new() }
    }

    pub fn list_cbc_variables(&self) -> Vec<&str> {
        self.vars.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, variable: &str) -> bool {
        self.vars.contains_key(variable)
    }

    pub fn get_cbc_variable_values(&self, variable: &str, context: &BuildContext) -> Result<Vec<Primitive>, CbcError> {
        let entries = self.vars.get(variable).ok_or_else(|| CbcError::VariableNotFound(variable.to_string()))?;
        let mut selected = Vec::new();
        for entry in entries {
            if entry.applies(context)? {
                selected.push(entry.value.clone());
            }
        }
        if selected.is_empty() {
            return Err(CbcError::NoSelectorMatch(variable.to_string()));
        }
        Ok(selected)
    }

    pub fn get_zip_keys(&self, context: &BuildContext) -> Result<Vec<HashSet<String>>, CbcError> {
        if self.zip_keys.is_empty() {
            return Err(CbcError::NoZipKeys);
        }
        let mut zip_keys = Vec::new();
        for group in &self.zip_keys {
            let mut keys = HashSet::new();
            for entry in group {
                if entry.applies(context)? {
                    if let Some(key) = entry.value.as_str() {
                        keys.insert(key.to_string());
                    }
                }
            }
            if !keys.is_empty() {
                zip_keys.push(keys);
            }
        }
        if zip_keys.is_empty() {
            return Err(CbcError::NoZipKeys);
        }
        validate_zip_keys(&zip_keys)?;
        Ok(zip_keys)
    }
}

fn build_entry(reader: &Reader, path: &Path, value: &serde_json::Value) -> Result<CbcEntry, CbcError> {
    let primitive = match value {
        serde_json::Value::Bool(b) => Primitive::Bool(*b),
        serde_json::Value::Number(n) => Primitive::Str(n.to_string()),
        serde_json::Value::String(s) => Primitive::Str(s.clone()),
        serde_json::Value::Null => Primitive::Null,
        _ => Primitive::Str(value.to_string()),
    };
    let selector = reader.get_selector_at_path(path);
    Ok(CbcEntry { value: primitive, selector })
}

fn parse_zip_keys(reader: &Reader, value: &serde_json::Value) -> Result<Vec<Vec<CbcEntry>>, CbcError> {
    let serde_json::Value::Array(outer) = value else {
        return Err(CbcError::ZipKeys { reason: "zip_keys must be a list".to_string() });
    };

    let is_list_of_lists = outer.iter().all(|v| matches!(v, serde_json::Value::Array(_)));
    let is_list_of_strings = outer.iter().all(|v| matches!(v, serde_json::Value::String(_)));

    if !is_list_of_lists && !is_list_of_strings {
        return Err(CbcError::ZipKeys { reason: "zip_keys must be a list of strings or a list of lists of strings".to_string() });
    }

    if is_list_of_strings {
        let group = outer
            .iter()
            .enumerate()
            .map(|(i, v)| build_entry(reader, &Path::root().push_key("zip_keys").push_index(i), v))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(vec![group]);
    }

    let mut groups = Vec::new();
    for (i, inner) in outer.iter().enumerate() {
        let serde_json::Value::Array(inner_items) = inner else { unreachable!("checked above") };
        let group = inner_items
            .iter()
            .enumerate()
            .map(|(j, v)| build_entry(reader, &Path::root().push_key("zip_keys").push_index(i).push_index(j), v))
            .collect::<Result<Vec<_>, _>>()?;
        groups.push(group);
    }
    Ok(groups)
}

/// Each zip-key group must hold at least two keys, and no key may appear in more than one group.
fn validate_zip_keys(zip_keys: &[HashSet<String>]) -> Result<(), CbcError> {
    if !zip_keys.iter().all(|keys| keys.len() > 1) {
        return Err(CbcError::ZipKeys { reason: "each set of zip keys must contain at least two values".to_string() });
    }
    let mut seen = HashSet::new();
    for group in zip_keys {
        for key in group {
            if !seen.insert(key.clone()) {
                return Err(CbcError::ZipKeys { reason: format!("duplicate zip key found: {key}") });
            }
        }
    }
    Ok(())
}

/// Combines `cbc_files` (later files override earlier ones for the same variable) into a single
/// value table and zip-key list, with the built-in default variants seeded first.
pub fn generate_cbc_values(
    cbc_files: Vec<CbcFile>,
    context: &BuildContext,
) -> Result<(IndexMap<String, Vec<Primitive>>, Vec<HashSet<String>>), CbcError> {
    let mut all_files = vec![CbcFile::default_variants()];
    all_files.extend(cbc_files);

    let mut cbc_values: IndexMap<String, Vec<Primitive>> = IndexMap::new();
    let mut zip_keys = Vec::new();

    for file in &all_files {
        if let Ok(keys) = file.get_zip_keys(context) {
            zip_keys = keys;
        }
        for variable in file.list_cbc_variables() {
            if let Ok(values) = file.get_cbc_variable_values(variable, context) {
                cbc_values.insert(variable.to_string(), values);
            }
        }
    }

    for group in &zip_keys {
        for key in group {
            if !cbc_values.contains_key(key) {
                return Err(CbcError::ZipKeys { reason: format!("zip key not found in CBC values: {key}") });
            }
        }
    }

    Ok((cbc_values, zip_keys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_selector::Platform;
    use std::collections::HashMap;

    fn linux_context() -> BuildContext {
        BuildContext::new(Platform::Linux64, HashMap::new()).unwrap()
    }

    #[test]
    fn parses_a_flat_variable_list() {
        let cbc = CbcFile::parse("python:\n  - \"3.9\"\n  - \"3.10\"\n").unwrap();
        let values = cbc.get_cbc_variable_values("python", &linux_context()).unwrap();
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn selector_gated_values_are_filtered_by_context() {
        let cbc = CbcFile::parse("zlib:\n  - \"1.2\"  # [linux]\n  - \"1.3\"  # [win]\n").unwrap();
        let values = cbc.get_cbc_variable_values("zlib", &linux_context()).unwrap();
        assert_eq!(values, vec![Primitive::Str("1.2".to_string())]);
    }

    #[test]
    fn zip_keys_of_strings_are_parsed_as_one_group() {
        let cbc = CbcFile::parse("python:\n  - \"3.9\"\nnumpy:\n  - \"1.22\"\nzip_keys:\n  - python\n  - numpy\n").unwrap();
        let keys = cbc.get_zip_keys(&linux_context()).unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].len(), 2);
    }

    #[test]
    fn default_variants_seed_generate_cbc_values() {
        let (values, _zip_keys) = generate_cbc_values(vec![], &linux_context()).unwrap();
        assert!(values.contains_key("python"));
    }
}
