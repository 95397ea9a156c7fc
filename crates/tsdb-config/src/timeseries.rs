use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use tsdb_schema::{
    AssetTable, DesiredTimeseries, Origins, OrphanPolicy, Period, SchemaKind, TimeseriesConfig,
};

// ---------------------------------------------------------------------------
// Document shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaDoc {
    #[serde(default)]
    asset_classes: BTreeMap<String, AssetClassDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AssetClassDoc {
    origins: OriginsDoc,
    #[serde(default)]
    raw: Vec<PeriodDoc>,
    #[serde(default)]
    aggregates: Vec<PeriodDoc>,
    #[serde(default)]
    ext_raw: Vec<PeriodDoc>,
    #[serde(default)]
    ext_aggregates: Vec<PeriodDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OriginsDoc {
    rth: DateTime<Utc>,
    eth: DateTime<Utc>,
    htf: DateTime<Utc>,
}

/// `1m` / `tick` as text, or a bare number of seconds.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PeriodDoc {
    Text(String),
    Seconds(i64),
}

impl PeriodDoc {
    fn period(&self) -> Result<Period> {
        match self {
            PeriodDoc::Text(s) => Period::parse(s),
            PeriodDoc::Seconds(n) => Period::from_secs(*n),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReconcileDoc {
    #[serde(default)]
    orphaned_raw_tables: OrphanPolicy,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Everything a reconciliation run reads from the merged config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileConfig {
    pub desired: DesiredTimeseries,
    pub orphan_policy: OrphanPolicy,
}

pub fn load_reconcile_config(config_json: &Value) -> Result<ReconcileConfig> {
    Ok(ReconcileConfig {
        desired: desired_timeseries(config_json)?,
        orphan_policy: orphan_policy(config_json)?,
    })
}

/// Parse `/timeseries/{tick,minute,aggregate}`. An absent section leaves
/// that schema unconfigured.
pub fn desired_timeseries(config_json: &Value) -> Result<DesiredTimeseries> {
    let mut desired = DesiredTimeseries::default();

    if let Some(section) = config_json.pointer("/timeseries") {
        let obj = section
            .as_object()
            .ok_or_else(|| anyhow!("timeseries: expected a mapping"))?;
        for key in obj.keys() {
            if !matches!(key.as_str(), "tick" | "minute" | "aggregate") {
                return Err(anyhow!(
                    "timeseries.{key}: unknown schema. expected one of: tick | minute | aggregate"
                ));
            }
        }
    }

    for kind in SchemaKind::TIMESERIES {
        let key = short_name(kind);
        let Some(v) = config_json.pointer(&format!("/timeseries/{key}")) else {
            continue;
        };
        if v.is_null() {
            continue;
        }
        let doc: SchemaDoc = serde_json::from_value(v.clone())
            .with_context(|| format!("timeseries.{key}: invalid section"))?;
        let config = build_schema(key, doc)?;
        desired.set(kind, config);
    }

    Ok(desired)
}

pub fn orphan_policy(config_json: &Value) -> Result<OrphanPolicy> {
    match config_json.pointer("/reconcile") {
        None | Some(Value::Null) => Ok(OrphanPolicy::default()),
        Some(v) => {
            let doc: ReconcileDoc =
                serde_json::from_value(v.clone()).context("reconcile: invalid section")?;
            Ok(doc.orphaned_raw_tables)
        }
    }
}

fn short_name(kind: SchemaKind) -> &'static str {
    match kind {
        SchemaKind::Tick => "tick",
        SchemaKind::Minute => "minute",
        SchemaKind::Aggregate => "aggregate",
        SchemaKind::Security => "security",
    }
}

fn build_schema(key: &str, doc: SchemaDoc) -> Result<TimeseriesConfig> {
    let mut config = TimeseriesConfig::new();
    for (asset, a) in doc.asset_classes {
        let ctx = || format!("timeseries.{key}.asset_classes.{asset}");

        let mut tables = Vec::new();
        for (periods, raw, ext) in [
            (&a.raw, true, false),
            (&a.aggregates, false, false),
            (&a.ext_raw, true, true),
            (&a.ext_aggregates, false, true),
        ] {
            for p in periods {
                let period = p.period().with_context(ctx)?;
                tables.push(AssetTable {
                    asset_class: asset.clone(),
                    period,
                    raw,
                    ext,
                });
            }
        }

        let origins = Origins::new(a.origins.rth, a.origins.eth, a.origins.htf);
        config
            .insert_asset_class(&asset, origins, tables)
            .with_context(ctx)?;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_sections_leave_schemas_unconfigured() {
        let d = desired_timeseries(&json!({})).unwrap();
        assert!(d.tick.is_none() && d.minute.is_none() && d.aggregate.is_none());
        assert_eq!(orphan_policy(&json!({})).unwrap(), OrphanPolicy::KeepIngesting);
    }

    #[test]
    fn numeric_periods_are_seconds() {
        let v = json!({
            "timeseries": { "tick": { "asset_classes": { "crypto": {
                "origins": {
                    "rth": "2000-01-03T00:00:00Z",
                    "eth": "2000-01-03T00:00:00Z",
                    "htf": "2000-01-03T00:00:00Z"
                },
                "raw": [0],
                "aggregates": [60, "5m"]
            }}}}
        });
        let d = desired_timeseries(&v).unwrap();
        let tick = d.tick.unwrap();
        let names: Vec<String> = tick
            .all_tables("crypto")
            .iter()
            .map(|t| t.table_name())
            .collect();
        assert_eq!(names, vec!["crypto_tick_raw", "crypto_1m", "crypto_5m"]);
    }

    #[test]
    fn unknown_schema_key_is_rejected() {
        let err = desired_timeseries(&json!({ "timeseries": { "hourly": {} } })).unwrap_err();
        assert!(err.to_string().contains("unknown schema"));
    }
}
