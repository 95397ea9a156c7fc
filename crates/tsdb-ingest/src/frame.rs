//! Tabular symbol input and its validation into staging rows.
//!
//! ## Column contract (case-insensitive, order-independent)
//!
//! | Column        | Example     | Notes                                  |
//! |---------------|-------------|----------------------------------------|
//! | `symbol`      | `AAPL`      | required                               |
//! | `name`        | `Apple Inc` | required                               |
//! | `exchange`    | `NASDAQ`    | required                               |
//! | `asset_class` | `us_stock`  | required, should match the timeseries config |
//! | anything else |             | packed into the `attrs` JSON object    |

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Read;
use std::path::Path;

use tsdb_schema::StagedSymbol;

pub const REQUIRED_COLUMNS: [&str; 4] = ["symbol", "name", "exchange", "asset_class"];

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameError {
    /// Two columns collide once lower-cased.
    DuplicateColumn(String),
    MissingColumns(Vec<&'static str>),
    /// Row length differs from the header.
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },
    MissingValue {
        row: usize,
        column: &'static str,
    },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::DuplicateColumn(c) => write!(f, "duplicate column '{c}'"),
            FrameError::MissingColumns(cols) => write!(f, "missing columns: {cols:?}"),
            FrameError::Ragged {
                row,
                expected,
                found,
            } => write!(f, "row {row}: expected {expected} fields, found {found}"),
            FrameError::MissingValue { row, column } => {
                write!(f, "row {row}: missing value for '{column}'")
            }
        }
    }
}

impl std::error::Error for FrameError {}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// A batch of symbol rows as named columns. Construction does not validate;
/// [`SymbolFrame::stage`] does.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SymbolFrame {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl SymbolFrame {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Read CSV with a header row. Every field is text; empty fields are null.
    /// Rows of uneven length are kept as-is and rejected by `stage`.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let columns = rdr
            .headers()
            .context("read csv header failed")?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for (i, rec) in rdr.records().enumerate() {
            let rec = rec.with_context(|| format!("read csv row {} failed", i + 1))?;
            rows.push(
                rec.iter()
                    .map(|f| {
                        if f.is_empty() {
                            Value::Null
                        } else {
                            Value::String(f.to_string())
                        }
                    })
                    .collect(),
            );
        }
        Ok(Self { columns, rows })
    }

    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("open symbols csv failed: {}", path.display()))?;
        Self::from_csv_reader(file)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Validate and convert to staging rows in load order.
    ///
    /// Columns are lower-cased before matching. Non-required columns go into
    /// `attrs`. Rows repeating a `(symbol, exchange)` key collapse onto the
    /// first position with the values of the last occurrence.
    pub fn stage(&self) -> Result<Vec<StagedSymbol>, FrameError> {
        let columns: Vec<String> = self.columns.iter().map(|c| c.to_lowercase()).collect();

        let mut seen = BTreeSet::new();
        for c in &columns {
            if !seen.insert(c.as_str()) {
                return Err(FrameError::DuplicateColumn(c.clone()));
            }
        }

        let missing: Vec<&'static str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|r| !seen.contains(r))
            .collect();
        if !missing.is_empty() {
            return Err(FrameError::MissingColumns(missing));
        }

        let index = |name: &str| columns.iter().position(|c| c == name).unwrap_or(0);
        let [i_symbol, i_name, i_exchange, i_asset] = REQUIRED_COLUMNS.map(index);
        let extras: Vec<(usize, &str)> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !REQUIRED_COLUMNS.contains(&c.as_str()))
            .map(|(i, c)| (i, c.as_str()))
            .collect();

        let mut out: Vec<StagedSymbol> = Vec::with_capacity(self.rows.len());
        let mut positions: BTreeMap<(String, String), usize> = BTreeMap::new();
        let mut collapsed = 0_usize;

        for (n, row) in self.rows.iter().enumerate() {
            let row_no = n + 1;
            if row.len() != columns.len() {
                return Err(FrameError::Ragged {
                    row: row_no,
                    expected: columns.len(),
                    found: row.len(),
                });
            }

            let required = |i: usize, column: &'static str| {
                text(&row[i]).ok_or(FrameError::MissingValue {
                    row: row_no,
                    column,
                })
            };
            let mut attrs = Map::new();
            for (i, c) in &extras {
                attrs.insert((*c).to_string(), row[*i].clone());
            }

            let staged = StagedSymbol {
                symbol: required(i_symbol, "symbol")?,
                name: required(i_name, "name")?,
                exchange: required(i_exchange, "exchange")?,
                asset_class: required(i_asset, "asset_class")?,
                attrs: Value::Object(attrs).to_string(),
            };

            let key = (staged.symbol.clone(), staged.exchange.clone());
            match positions.get(&key) {
                Some(&pos) => {
                    out[pos] = staged;
                    collapsed += 1;
                }
                None => {
                    positions.insert(key, out.len());
                    out.push(staged);
                }
            }
        }

        if collapsed > 0 {
            tracing::warn!(
                collapsed,
                "duplicate (symbol, exchange) rows in batch; last occurrence wins"
            );
        }
        Ok(out)
    }
}

fn text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn columns_match_case_insensitively_and_extras_become_attrs() {
        let f = SymbolFrame::new(
            cols(&["Symbol", "NAME", "exchange", "Asset_Class", "Sector", "lot"]),
            vec![vec![
                json!("AAPL"),
                json!("Apple Inc"),
                json!("NASDAQ"),
                json!("us_stock"),
                json!("tech"),
                json!(100),
            ]],
        );
        let staged = f.stage().unwrap();
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].symbol, "AAPL");
        assert_eq!(staged[0].asset_class, "us_stock");
        let attrs: Value = serde_json::from_str(&staged[0].attrs).unwrap();
        assert_eq!(attrs, json!({"sector": "tech", "lot": 100}));
    }

    #[test]
    fn missing_required_column_is_reported() {
        let f = SymbolFrame::new(cols(&["symbol", "name", "exchange"]), vec![]);
        assert_eq!(
            f.stage().unwrap_err(),
            FrameError::MissingColumns(vec!["asset_class"])
        );
    }

    #[test]
    fn columns_colliding_after_lowercase_are_rejected() {
        let f = SymbolFrame::new(
            cols(&["symbol", "SYMBOL", "name", "exchange", "asset_class"]),
            vec![],
        );
        assert_eq!(
            f.stage().unwrap_err(),
            FrameError::DuplicateColumn("symbol".to_string())
        );
    }

    #[test]
    fn ragged_and_empty_values_are_rejected() {
        let header = cols(&["symbol", "name", "exchange", "asset_class"]);
        let ragged = SymbolFrame::new(header.clone(), vec![vec![json!("A"), json!("B")]]);
        assert!(matches!(
            ragged.stage().unwrap_err(),
            FrameError::Ragged { row: 1, expected: 4, found: 2 }
        ));

        let blank = SymbolFrame::new(
            header,
            vec![vec![json!("A"), json!(" "), json!("X"), json!("fx")]],
        );
        assert_eq!(
            blank.stage().unwrap_err(),
            FrameError::MissingValue {
                row: 1,
                column: "name"
            }
        );
    }

    #[test]
    fn repeated_keys_collapse_last_wins() {
        let f = SymbolFrame::new(
            cols(&["symbol", "name", "exchange", "asset_class"]),
            vec![
                vec![json!("BTC"), json!("old"), json!("CB"), json!("crypto")],
                vec![json!("ETH"), json!("Ether"), json!("CB"), json!("crypto")],
                vec![json!("BTC"), json!("new"), json!("CB"), json!("crypto")],
                vec![json!("BTC"), json!("other venue"), json!("KR"), json!("crypto")],
            ],
        );
        let staged = f.stage().unwrap();
        let names: Vec<_> = staged.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["new", "Ether", "other venue"]);
    }

    #[test]
    fn csv_empty_fields_are_null() {
        let csv = "symbol,name,exchange,asset_class,note\nAAPL,Apple,NASDAQ,us_stock,\n";
        let f = SymbolFrame::from_csv_reader(csv.as_bytes()).unwrap();
        let staged = f.stage().unwrap();
        assert_eq!(staged[0].attrs, r#"{"note":null}"#);
    }
}
