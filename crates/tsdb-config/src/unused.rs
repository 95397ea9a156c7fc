use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scalar_leaves;

/// Sections read by this workspace. Every leaf under one of them counts as
/// consumed; any other leaf is reported.
pub const CONSUMED_POINTERS: &[&str] = &["/reconcile", "/timeseries"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    pub consumed_prefixes: Vec<String>,
    /// Sorted, unique.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// List leaves outside [`CONSUMED_POINTERS`]. Under `Fail` any such leaf is
/// a `CONFIG_UNUSED_KEYS` error; under `Warn` it is logged.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let mut unused: Vec<String> = scalar_leaves(config_json)
        .into_iter()
        .map(|(pointer, _)| pointer)
        .filter(|p| !CONSUMED_POINTERS.iter().any(|c| within(c, p)))
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        consumed_prefixes: CONSUMED_POINTERS.iter().map(|c| c.to_string()).collect(),
        unused_leaf_pointers: unused,
    };
    if report.is_clean() {
        return Ok(report);
    }

    let first: Vec<&str> = report
        .unused_leaf_pointers
        .iter()
        .take(12)
        .map(String::as_str)
        .collect();
    match policy {
        UnusedKeyPolicy::Fail => bail!(
            "CONFIG_UNUSED_KEYS: {} leaf key(s) are not read by any tsdb component: {}",
            report.unused_leaf_pointers.len(),
            first.join(", ")
        ),
        UnusedKeyPolicy::Warn => {
            tracing::warn!(
                count = report.unused_leaf_pointers.len(),
                first = %first.join(","),
                "config contains unused keys"
            );
            Ok(report)
        }
    }
}

/// Token-wise prefix test: `/a` covers `/a` and `/a/b` but not `/ab`.
fn within(section: &str, pointer: &str) -> bool {
    let mut outer = section.split('/').skip(1);
    let mut inner = pointer.split('/').skip(1);
    loop {
        match (outer.next(), inner.next()) {
            (None, _) => return true,
            (Some(a), Some(b)) if a == b => continue,
            _ => return false,
        }
    }
}
