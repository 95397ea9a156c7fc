use anyhow::{Context, Result};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::secrets::reject_secret_literals;

/// A merged configuration and its identity.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Hex SHA-256 of `canonical_json`.
    pub config_hash: String,
    /// Compact JSON with keys in sorted order.
    pub canonical_json: String,
    pub config_json: Value,
}

/// Read `paths` in merge order and load them as layers.
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let docs = paths
        .iter()
        .map(|p| std::fs::read_to_string(p).with_context(|| format!("read config layer failed: {p}")))
        .collect::<Result<Vec<String>>>()?;
    let refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&refs)
}

/// Overlay YAML documents in order, refuse secrets, then hash.
pub fn load_layered_yaml_from_strings(docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Map::new());
    for (i, doc) in docs.iter().enumerate() {
        let yaml: serde_yaml::Value = serde_yaml::from_str(doc)
            .with_context(|| format!("config layer {} is not valid yaml", i + 1))?;
        let layer = serde_json::to_value(yaml)
            .with_context(|| format!("config layer {} cannot be represented as json", i + 1))?;
        overlay(&mut merged, layer);
    }

    reject_secret_literals(&merged)?;

    // serde_json maps are key-ordered, so compact output is canonical.
    let canonical_json =
        serde_json::to_string(&merged).context("serialize canonical config failed")?;
    let config_hash = hex::encode(Sha256::digest(canonical_json.as_bytes()));

    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Objects merge key by key; anything else in `layer` replaces `base`.
fn overlay(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(into), Value::Object(from)) => {
            for (key, value) in from {
                match into.get_mut(&key) {
                    Some(existing) => overlay(existing, value),
                    None => {
                        into.insert(key, value);
                    }
                }
            }
        }
        (slot, replacement) => *slot = replacement,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn objects_merge_and_scalars_replace() {
        let mut base = json!({"a": {"x": 1, "y": [1, 2]}, "keep": true});
        overlay(&mut base, json!({"a": {"y": [3], "z": "new"}}));
        assert_eq!(base, json!({"a": {"x": 1, "y": [3], "z": "new"}, "keep": true}));
    }

    #[test]
    fn null_layer_value_clears_a_subtree() {
        let mut base = json!({"timeseries": {"tick": {"asset_classes": {}}}});
        overlay(&mut base, json!({"timeseries": {"tick": null}}));
        assert_eq!(base, json!({"timeseries": {"tick": null}}));
    }
}
