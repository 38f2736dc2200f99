//! Local database behavior over a durable store.

use chrono::{NaiveDate, TimeZone, Utc};
use possync_core::{DatabaseConfig, Identity, LocalDatabase};
use possync_protocol::{ActionOp, EntityKind, InventoryItem, LineItem, Sale};
use possync_storage::{FileStore, InMemoryStore, KeyValueStore};
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

fn sale(id: &str, total: f64) -> Sale {
    Sale {
        id: id.to_string(),
        items: vec![LineItem {
            item_id: "m1".into(),
            item_name: "Paracetamol".into(),
            quantity: 2,
            price: total / 2.0,
            total,
        }],
        subtotal: total,
        discount: 0.0,
        tax: 0.0,
        total,
        payment_method: "cash".into(),
        customer_name: None,
        is_credit: false,
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
    }
}

fn item(id: &str) -> InventoryItem {
    InventoryItem {
        id: id.to_string(),
        name: format!("Item {id}"),
        item_type: "syrup".into(),
        strength: "100ml".into(),
        quantity: 5,
        cost_price: 3.0,
        sale_price: 4.5,
        expiry: NaiveDate::from_ymd_opt(2025, 6, 30),
        reorder_level: 2,
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        updated_at: None,
    }
}

#[test]
fn state_survives_reopen() {
    let dir = tempdir().unwrap();
    let cashier = Identity::new("u7", "dana", "cashier");

    {
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(dir.path()).unwrap());
        let db = LocalDatabase::open(store, DatabaseConfig::default());
        db.create(sale("s1", 20.0), Some(&cashier)).unwrap();
        db.create(item("m1"), Some(&cashier)).unwrap();
        db.offline().set_offline(true).unwrap();
    }

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(dir.path()).unwrap());
    let db = LocalDatabase::open(store, DatabaseConfig::default());

    assert!(db.snapshot(EntityKind::Sale).unwrap().contains("s1"));
    assert!(db.snapshot(EntityKind::InventoryItem).unwrap().contains("m1"));
    assert!(db.offline().is_offline().unwrap());

    let queued = db.queue().list_all().unwrap();
    let kinds: Vec<_> = queued.iter().map(|a| a.kind()).collect();
    assert_eq!(kinds, vec![EntityKind::Sale, EntityKind::InventoryItem]);
    assert!(queued.iter().all(|a| a.operation == ActionOp::Create));

    let recent = db.audit().recent().unwrap();
    assert_eq!(recent[0].action, "Add Item");
    assert_eq!(recent[1].action, "Add Sale");
}

#[test]
fn concurrent_mutations_are_not_lost() {
    let db = Arc::new(LocalDatabase::open(
        Arc::new(InMemoryStore::new()),
        DatabaseConfig::default(),
    ));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                for n in 0..25 {
                    db.create(sale(&format!("s{t}-{n}"), 10.0), None).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(db.snapshot(EntityKind::Sale).unwrap().len(), 100);
    assert_eq!(db.queue().len().unwrap(), 100);
    assert_eq!(db.audit().len().unwrap(), 100);
}

#[test]
fn queue_removal_is_selective() {
    let db = LocalDatabase::open(Arc::new(InMemoryStore::new()), DatabaseConfig::default());
    for id in ["A", "B", "C"] {
        db.create(sale(id, 5.0), None).unwrap();
    }
    let queued = db.queue().list_all().unwrap();

    // A and C confirmed, B still pending.
    db.queue().remove(&queued[0].id).unwrap();
    db.queue().remove(&queued[2].id).unwrap();

    let remaining = db.queue().list_all().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].record_id(), "B");
}

#[test]
fn small_audit_capacity_is_honored() {
    let db = LocalDatabase::open(
        Arc::new(InMemoryStore::new()),
        DatabaseConfig::new().audit_capacity(3),
    );
    for n in 0..5 {
        db.create(sale(&format!("s{n}"), 1.0), None).unwrap();
    }
    let ids: Vec<_> = db
        .audit()
        .get_all()
        .unwrap()
        .into_iter()
        .map(|e| e.entity_id)
        .collect();
    assert_eq!(ids, vec!["s2", "s3", "s4"]);
    // Eviction never touches the queue.
    assert_eq!(db.queue().len().unwrap(), 5);
}
