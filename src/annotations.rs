use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::EtlError;

/// Hand-curated per-episode notes stored in `episodes.extra_info`.
///
/// Keyed by episode id. The built-in table can be replaced wholesale by a
/// YAML file mapping ids to objects:
///
/// ```yaml
/// 58:
///   guest: Steve Ross
///   relationship: son
/// 352:
///   special: Christmas special
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationTable {
    entries: BTreeMap<i64, Value>,
}

impl AnnotationTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Guest appearances and special episodes.
    pub fn builtin() -> Self {
        let guest = || json!({ "guest": "Steve Ross", "relationship": "son" });

        let mut entries = BTreeMap::new();
        for id in [58, 61, 201, 205, 370, 386] {
            entries.insert(id, guest());
        }
        entries.insert(206, json!({ "special": "Two-part episode" }));
        entries.insert(352, json!({ "special": "Christmas special" }));
        entries.insert(401, json!({ "special": "Memorial episode" }));

        Self { entries }
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, EtlError> {
        let content = std::fs::read_to_string(path).map_err(|e| EtlError::read_failed(path, e))?;
        let table = Self::from_yaml_str(&content).map_err(|reason| EtlError::Annotations {
            path: path.to_path_buf(),
            reason,
        })?;
        log::info!(
            "Loaded {} episode annotations from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, String> {
        let entries: BTreeMap<i64, Value> =
            serde_yaml::from_str(content).map_err(|e| e.to_string())?;

        if let Some((id, _)) = entries.iter().find(|(_, v)| !v.is_object()) {
            return Err(format!("annotation for episode {} is not a mapping", id));
        }
        Ok(Self { entries })
    }

    pub fn insert(&mut self, episode_id: i64, annotation: Value) {
        self.entries.insert(episode_id, annotation);
    }

    pub fn lookup(&self, episode_id: i64) -> Option<&Value> {
        self.entries.get(&episode_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
