use std::collections::BTreeSet;

use tsdb_schema::{AssetTable, TimeseriesConfig};

/// Asset classes split by what reconciliation must do with them. The three
/// sets are disjoint and together cover desired ∪ stored.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigDiff {
    pub to_add: BTreeSet<String>,
    pub to_update: BTreeSet<String>,
    pub to_remove: BTreeSet<String>,
}

impl ConfigDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_remove.is_empty()
    }
}

pub fn diff_configs(desired: &TimeseriesConfig, stored: &TimeseriesConfig) -> ConfigDiff {
    let want = desired.asset_classes();
    let have = stored.asset_classes();
    ConfigDiff {
        to_add: want.difference(&have).cloned().collect(),
        to_update: want.intersection(&have).cloned().collect(),
        to_remove: have.difference(&want).cloned().collect(),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UpdateState {
    Unchanged,
    /// Same tables, different origins: aggregates must be rebuilt.
    OriginChanged,
    TablesChanged,
}

/// Table-level diff of one asset class present on both sides.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableDiff {
    pub to_add: BTreeSet<AssetTable>,
    pub to_remove: BTreeSet<AssetTable>,
    pub origins_changed: bool,
}

impl TableDiff {
    pub fn state(&self) -> UpdateState {
        if !self.to_add.is_empty() || !self.to_remove.is_empty() {
            UpdateState::TablesChanged
        } else if self.origins_changed {
            UpdateState::OriginChanged
        } else {
            UpdateState::Unchanged
        }
    }
}

pub fn diff_tables(
    desired: &TimeseriesConfig,
    stored: &TimeseriesConfig,
    asset_class: &str,
) -> TableDiff {
    let want = desired.table_set(asset_class);
    let have = stored.table_set(asset_class);
    TableDiff {
        to_add: want.difference(&have).cloned().collect(),
        to_remove: have.difference(&want).cloned().collect(),
        // A missing stored row counts as changed so the upsert restores it.
        origins_changed: desired.origins(asset_class) != stored.origins(asset_class),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tsdb_schema::{Origins, Period};

    fn origins(hour: u32) -> Origins {
        let t = Utc.with_ymd_and_hms(2000, 1, 3, hour, 0, 0).unwrap();
        Origins::new(t, t, t)
    }

    fn desired(assets: &[(&str, &[AssetTable])]) -> TimeseriesConfig {
        let mut c = TimeseriesConfig::new();
        for (name, tables) in assets {
            c.insert_asset_class(name, origins(0), tables.iter().cloned())
                .unwrap();
        }
        c
    }

    fn stored(tables: &[AssetTable], with_origins: &[(&str, Origins)]) -> TimeseriesConfig {
        let mut c = TimeseriesConfig::new();
        for t in tables {
            c.insert_stored_table(t.clone());
        }
        for (a, o) in with_origins {
            c.set_stored_origins(a, *o);
        }
        c
    }

    #[test]
    fn asset_sets_are_disjoint_and_cover_both_sides() {
        let m1 = Period::minutes(1);
        let d = desired(&[
            ("crypto", &[AssetTable::raw("crypto", m1)]),
            ("us_stock", &[AssetTable::raw("us_stock", m1)]),
        ]);
        let s = stored(
            &[AssetTable::raw("us_stock", m1), AssetTable::raw("fx", m1)],
            &[],
        );

        let diff = diff_configs(&d, &s);
        assert_eq!(diff.to_add, BTreeSet::from(["crypto".to_string()]));
        assert_eq!(diff.to_update, BTreeSet::from(["us_stock".to_string()]));
        assert_eq!(diff.to_remove, BTreeSet::from(["fx".to_string()]));

        let mut union = BTreeSet::new();
        for set in [&diff.to_add, &diff.to_update, &diff.to_remove] {
            for a in set {
                assert!(union.insert(a.clone()), "{a} appears in two sets");
            }
        }
        let mut expected = d.asset_classes();
        expected.extend(s.asset_classes());
        assert_eq!(union, expected);
    }

    #[test]
    fn diffing_is_pure_and_repeatable() {
        let d = desired(&[("crypto", &[AssetTable::raw("crypto", Period::TICK)])]);
        let s = TimeseriesConfig::new();
        assert_eq!(diff_configs(&d, &s), diff_configs(&d, &s));
        assert!(diff_configs(&d, &d).to_add.is_empty());
    }

    #[test]
    fn update_states() {
        let m1 = Period::minutes(1);
        let m5 = Period::minutes(5);
        let d = desired(&[(
            "crypto",
            &[AssetTable::raw("crypto", m1), AssetTable::aggregate("crypto", m5)],
        )]);

        let same = stored(
            &[AssetTable::raw("crypto", m1), AssetTable::aggregate("crypto", m5)],
            &[("crypto", origins(0))],
        );
        assert_eq!(diff_tables(&d, &same, "crypto").state(), UpdateState::Unchanged);

        let shifted = stored(
            &[AssetTable::raw("crypto", m1), AssetTable::aggregate("crypto", m5)],
            &[("crypto", origins(9))],
        );
        assert_eq!(
            diff_tables(&d, &shifted, "crypto").state(),
            UpdateState::OriginChanged
        );

        let fewer = stored(&[AssetTable::raw("crypto", m1)], &[("crypto", origins(0))]);
        let td = diff_tables(&d, &fewer, "crypto");
        assert_eq!(td.state(), UpdateState::TablesChanged);
        assert_eq!(
            td.to_add,
            BTreeSet::from([AssetTable::aggregate("crypto", m5)])
        );
        assert!(td.to_remove.is_empty());
    }
}
