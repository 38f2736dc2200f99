//! Test fixtures and terminal helpers.
//!
//! Provides a ready-wired terminal and record builders for common test
//! scenarios.

use chrono::{NaiveDate, TimeZone, Utc};
use possync_core::{DatabaseConfig, Identity, LocalDatabase};
use possync_engine::{MemoryRemote, SyncConfig, SyncEngine, SyncOutcome, SyncResult};
use possync_protocol::{
    parse_timestamp, EntityKind, Expense, InventoryItem, LineItem, QueuedAction, RecordSet, Refund,
    Sale, Timestamp,
};
use possync_storage::{FileStore, InMemoryStore, KeyValueStore};
use std::sync::Arc;
use tempfile::TempDir;

/// Owner id used by [`cashier`].
pub const TEST_OWNER: &str = "user-1";

/// A configuration the gate accepts.
pub fn valid_config() -> SyncConfig {
    SyncConfig::new("https://terminal.supabase.co", "test-anon-key")
        .with_required_host_suffix("supabase.co")
}

/// The signed-in cashier used by fixtures.
pub fn cashier() -> Identity {
    Identity::new(TEST_OWNER, "cashier", "cashier")
}

/// A local database and sync engine wired to an in-process remote.
pub struct TestTerminal {
    /// The local store.
    pub store: Arc<dyn KeyValueStore>,
    /// The local database.
    pub db: Arc<LocalDatabase>,
    /// The remote, shared with the engine.
    pub remote: Arc<MemoryRemote>,
    /// The engine.
    pub engine: Arc<SyncEngine<Arc<MemoryRemote>>>,
    /// The identity passed to [`TestTerminal::sync`].
    pub identity: Identity,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestTerminal {
    /// Creates an in-memory terminal with a valid configuration.
    pub fn new() -> Self {
        Self::with_config(valid_config())
    }

    /// Creates an in-memory terminal with `config`.
    pub fn with_config(config: SyncConfig) -> Self {
        Self::build(Arc::new(InMemoryStore::new()), config, None)
    }

    /// Creates a terminal over a file store in a temporary directory.
    pub fn on_disk() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileStore::open(temp_dir.path()).expect("Failed to open file store");
        Self::build(Arc::new(store), valid_config(), Some(temp_dir))
    }

    fn build(store: Arc<dyn KeyValueStore>, config: SyncConfig, temp_dir: Option<TempDir>) -> Self {
        let db = Arc::new(LocalDatabase::open(Arc::clone(&store), DatabaseConfig::default()));
        let remote = Arc::new(MemoryRemote::new());
        let engine = Arc::new(SyncEngine::new(config, Arc::clone(&remote), Arc::clone(&db)));
        Self {
            store,
            db,
            remote,
            engine,
            identity: cashier(),
            _temp_dir: temp_dir,
        }
    }

    /// Runs one cycle as the fixture identity.
    pub fn sync(&self) -> SyncResult<SyncOutcome> {
        self.engine.sync(Some(&self.identity))
    }

    /// Returns the local set for `kind`.
    pub fn local(&self, kind: EntityKind) -> RecordSet {
        self.db.snapshot(kind).expect("Failed to read local records")
    }

    /// Returns the remote set for `kind` owned by the fixture identity.
    pub fn remote_records(&self, kind: EntityKind) -> RecordSet {
        self.remote.records(&self.identity.user_id, kind)
    }

    /// Returns the pending queue.
    pub fn queued(&self) -> Vec<QueuedAction> {
        self.db.queue().list_all().expect("Failed to read queue")
    }

    /// Returns every record collection and the queue, for before/after
    /// comparisons that ignore the offline flag.
    pub fn local_state(&self) -> (Vec<RecordSet>, Vec<QueuedAction>) {
        let sets = EntityKind::ALL.iter().map(|&kind| self.local(kind)).collect();
        (sets, self.queued())
    }
}

impl Default for TestTerminal {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses an RFC 3339 timestamp.
pub fn ts(text: &str) -> Timestamp {
    parse_timestamp(text).expect("Invalid test timestamp")
}

fn created() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
}

/// An inventory item with the given update timestamp.
pub fn inventory_item(id: &str, updated_at: Option<&str>) -> InventoryItem {
    InventoryItem {
        id: id.to_string(),
        name: format!("Item {id}"),
        item_type: "tablet".into(),
        strength: "500mg".into(),
        quantity: 20,
        cost_price: 1.25,
        sale_price: 2.0,
        expiry: NaiveDate::from_ymd_opt(2026, 12, 31),
        reorder_level: 5,
        created_at: created(),
        updated_at: updated_at.map(ts),
    }
}

/// An expense.
pub fn expense(id: &str, amount: f64) -> Expense {
    Expense {
        id: id.to_string(),
        date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        expense_type: "supplies".into(),
        amount,
        note: String::new(),
        created_at: created(),
    }
}

/// A single-line cash sale.
pub fn sale(id: &str, total: f64) -> Sale {
    Sale {
        id: id.to_string(),
        items: vec![LineItem {
            item_id: "m1".into(),
            item_name: "Item m1".into(),
            quantity: 1,
            price: total,
            total,
        }],
        subtotal: total,
        discount: 0.0,
        tax: 0.0,
        total,
        payment_method: "cash".into(),
        customer_name: None,
        is_credit: false,
        created_at: created(),
    }
}

/// A full refund of `sale_id`.
pub fn refund(id: &str, sale_id: &str, total: f64) -> Refund {
    Refund {
        id: id.to_string(),
        sale_id: sale_id.to_string(),
        items: Vec::new(),
        total,
        reason: "damaged".into(),
        created_at: created(),
    }
}
