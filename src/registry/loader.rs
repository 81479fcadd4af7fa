//! Type definitions loaded from JSON files
//!
//! A definition file holds a JSON array of types:
//!
//! ```json
//! [{ "name": "Node", "plural": "nodes",
//!    "fields": [{ "name": "id", "src": "hash_id", "attribute": true }] }]
//! ```
//!
//! Validation chains cannot be expressed in files; attach them in code.

use std::fs;
use std::path::Path;

use super::errors::{RegistryError, RegistryResult};
use super::type_registry::TypeRegistry;
use super::types::ObjType;
use crate::observability::{log_event_with_fields, Event};

impl TypeRegistry {
    /// Builds a registry from a JSON array of type definitions.
    pub fn from_json_str(source: &str) -> RegistryResult<Self> {
        let types = parse_definitions("<inline>", source)?;
        Self::define(types)
    }

    /// Loads every `.json` file in `dir`, in file name order.
    ///
    /// Duplicate type names across files fail the whole load.
    pub fn load_dir(dir: &Path) -> RegistryResult<Self> {
        let entries = fs::read_dir(dir).map_err(|e| {
            RegistryError::malformed(
                dir.display().to_string(),
                format!("Failed to read definition directory: {}", e),
            )
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                RegistryError::malformed(
                    dir.display().to_string(),
                    format!("Failed to read directory entry: {}", e),
                )
            })?;
            let path = entry.path();

            // Skip non-JSON files
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            paths.push(path);
        }
        paths.sort();

        let mut types = Vec::new();
        for path in &paths {
            types.extend(Self::read_file(path)?);
        }

        let registry = Self::collect(types)?;
        log_event_with_fields(
            Event::RegistryLoaded,
            &[
                ("dir", dir.display().to_string().as_str()),
                ("files", paths.len().to_string().as_str()),
                ("types", registry.len().to_string().as_str()),
            ],
        );
        Ok(registry)
    }

    fn read_file(path: &Path) -> RegistryResult<Vec<ObjType>> {
        let content = fs::read_to_string(path).map_err(|e| {
            RegistryError::malformed(
                path.display().to_string(),
                format!("Failed to read file: {}", e),
            )
        })?;
        parse_definitions(&path.display().to_string(), &content)
    }
}

fn parse_definitions(origin: &str, source: &str) -> RegistryResult<Vec<ObjType>> {
    serde_json::from_str(source)
        .map_err(|e| RegistryError::malformed(origin, format!("Invalid JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CoercionKind;
    use serde_json::json;
    use tempfile::TempDir;

    const NODE_DEFS: &str = r#"[
        {
            "name": "Node",
            "plural": "nodes",
            "fields": [
                { "name": "id", "src": "hash_id", "attribute": true },
                { "name": "is_active", "src": "active", "coerce_to": "boolean" },
                { "name": "state", "enumerated": { "inactive": 0, "active": 1 } }
            ]
        }
    ]"#;

    #[test]
    fn test_from_json_str() {
        let registry = TypeRegistry::from_json_str(NODE_DEFS).unwrap();
        let node = registry.lookup("Node").unwrap();

        assert_eq!(node.plural_label(), "nodes");
        assert_eq!(node.fields[1].coercion, Some(CoercionKind::Boolean));
        assert_eq!(node.fields[2].enumerated_label(&json!(1)), Some("active"));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let err = TypeRegistry::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, RegistryError::Malformed { .. }));
    }

    #[test]
    fn test_load_dir_skips_non_json() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("node.json"), NODE_DEFS).unwrap();
        fs::write(
            tmp.path().join("opts.json"),
            r#"[{ "name": "NodeOpts", "fields": [{ "name": "option1", "src": "opt1" }] }]"#,
        )
        .unwrap();
        fs::write(tmp.path().join("README.txt"), "ignored").unwrap();

        let registry = TypeRegistry::load_dir(tmp.path()).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("NodeOpts"));
    }

    #[test]
    fn test_load_dir_rejects_duplicates_across_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.json"), NODE_DEFS).unwrap();
        fs::write(tmp.path().join("b.json"), NODE_DEFS).unwrap();

        let err = TypeRegistry::load_dir(tmp.path()).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateType("Node".into()));
    }

    #[test]
    fn test_load_missing_dir_fails() {
        let tmp = TempDir::new().unwrap();
        let err = TypeRegistry::load_dir(&tmp.path().join("absent")).unwrap_err();
        assert!(matches!(err, RegistryError::Malformed { .. }));
    }
}
