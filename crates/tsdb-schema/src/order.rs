use crate::AssetTable;

// Single place that decides dependency order. A continuous aggregate only
// ever reads from a strictly smaller period, so ascending period is a valid
// creation order and its exact reverse a valid teardown order.
fn sort_key(t: &AssetTable) -> (crate::Period, bool, bool, String) {
    (t.period, !t.raw, t.ext, t.asset_class.clone())
}

/// Ascending period; raw before aggregate at equal period.
pub fn creation_order<'a, I>(tables: I) -> Vec<AssetTable>
where
    I: IntoIterator<Item = &'a AssetTable>,
{
    let mut v: Vec<AssetTable> = tables.into_iter().cloned().collect();
    v.sort_by_key(sort_key);
    v.dedup();
    v
}

/// Exact reverse of [`creation_order`].
pub fn teardown_order<'a, I>(tables: I) -> Vec<AssetTable>
where
    I: IntoIterator<Item = &'a AssetTable>,
{
    let mut v = creation_order(tables);
    v.reverse();
    v
}
