//! tsdb-config
//!
//! Layered YAML configuration for the tsdb tools.
//!
//! Documents are overlaid in order, so later files win key by key. The
//! merged tree is serialized to canonical JSON and hashed, which lets a run
//! record exactly which configuration it converged onto. Literal secrets are
//! refused at load time and keys outside the sections this workspace reads
//! are reported.
//!
//! [`desired_timeseries`] and [`load_reconcile_config`] turn the merged tree
//! into typed reconciliation input.

use serde_json::Value;

mod layers;
mod secrets;
mod timeseries;
mod unused;

pub use layers::{load_layered_yaml, load_layered_yaml_from_strings, LoadedConfig};
pub use timeseries::{desired_timeseries, load_reconcile_config, orphan_policy, ReconcileConfig};
pub use unused::{report_unused_keys, UnusedKeyPolicy, UnusedKeyReport, CONSUMED_POINTERS};

/// Every scalar of `v` with its RFC 6901 pointer, in document order.
/// A scalar root is reported as `/`.
pub(crate) fn scalar_leaves(v: &Value) -> Vec<(String, &Value)> {
    let mut out = Vec::new();
    walk(v, String::new(), &mut out);
    out
}

fn walk<'a>(v: &'a Value, at: String, out: &mut Vec<(String, &'a Value)>) {
    match v {
        Value::Object(map) => {
            for (key, child) in map {
                let token = key.replace('~', "~0").replace('/', "~1");
                walk(child, format!("{at}/{token}"), out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                walk(child, format!("{at}/{i}"), out);
            }
        }
        scalar => {
            let pointer = if at.is_empty() { "/".to_string() } else { at };
            out.push((pointer, scalar));
        }
    }
}
