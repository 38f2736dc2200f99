//! Property-based test generators using proptest.
//!
//! Record sets are generated with unique ids drawn from a small pool,
//! so independently generated local and remote sets overlap.

use chrono::{Duration, TimeZone, Utc};
use possync_protocol::{Expense, InventoryItem, Timestamp};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn epoch() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Strategy for timestamps within one day, at minute resolution.
pub fn timestamp_strategy() -> impl Strategy<Value = Timestamp> {
    (0i64..24 * 60).prop_map(|minutes| epoch() + Duration::minutes(minutes))
}

/// Strategy for record ids drawn from a pool of `pool` values.
pub fn record_id_strategy(pool: u8) -> impl Strategy<Value = String> {
    (0..pool).prop_map(|n| format!("id-{n}"))
}

/// Strategy for one inventory item with id `id`.
pub fn inventory_item_strategy(id: String) -> impl Strategy<Value = InventoryItem> {
    (
        "[A-Z][a-z]{2,8}",
        0u32..500,
        proptest::option::of(timestamp_strategy()),
    )
        .prop_map(move |(name, quantity, updated_at)| InventoryItem {
            id: id.clone(),
            name,
            item_type: "tablet".into(),
            strength: String::new(),
            quantity,
            cost_price: 1.0,
            sale_price: 1.5,
            expiry: None,
            reorder_level: 10,
            created_at: epoch(),
            updated_at,
        })
}

/// Strategy for inventory sets with unique ids.
pub fn inventory_set_strategy() -> impl Strategy<Value = Vec<InventoryItem>> {
    proptest::collection::btree_set(0u8..12, 0..10).prop_flat_map(|ids| {
        ids.into_iter()
            .map(|n| inventory_item_strategy(format!("id-{n}")))
            .collect::<Vec<_>>()
    })
}

/// Strategy for expense sets with unique ids.
pub fn expense_set_strategy() -> impl Strategy<Value = Vec<Expense>> {
    proptest::collection::btree_map(0u8..12, 1u32..10_000, 0..10).prop_map(
        |entries: BTreeMap<u8, u32>| {
            entries
                .into_iter()
                .map(|(n, cents)| Expense {
                    id: format!("id-{n}"),
                    date: epoch().date_naive(),
                    expense_type: "misc".into(),
                    amount: f64::from(cents) / 100.0,
                    note: String::new(),
                    created_at: epoch(),
                })
                .collect()
        },
    )
}
