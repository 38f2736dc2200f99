//! Entity kinds and their record types.

use crate::error::ProtocolError;
use crate::record::Record;
use crate::timestamp::Timestamp;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kinds of records that are synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Stock items (medicines, products).
    InventoryItem,
    /// Business expenses.
    Expense,
    /// Completed sales.
    Sale,
    /// Refunds against sales.
    Refund,
}

impl EntityKind {
    /// Every kind, in sync order.
    pub const ALL: [EntityKind; 4] = [
        EntityKind::InventoryItem,
        EntityKind::Expense,
        EntityKind::Sale,
        EntityKind::Refund,
    ];

    /// Returns the stable name used in storage keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::InventoryItem => "inventory_item",
            EntityKind::Expense => "expense",
            EntityKind::Sale => "sale",
            EntityKind::Refund => "refund",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownEntityKind(s.to_string()))
    }
}

/// A stock item held by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Unique id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Item category (tablet, syrup, ...).
    pub item_type: String,
    /// Strength or size label.
    #[serde(default)]
    pub strength: String,
    /// Units on hand.
    pub quantity: u32,
    /// Purchase price per unit.
    pub cost_price: f64,
    /// Sale price per unit.
    pub sale_price: f64,
    /// Expiry date, if tracked.
    #[serde(default)]
    pub expiry: Option<NaiveDate>,
    /// Stock level at which a reorder is due.
    pub reorder_level: u32,
    /// Creation instant.
    pub created_at: Timestamp,
    /// Last update instant.
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

impl InventoryItem {
    /// Returns true if stock is at or below the reorder level.
    pub fn needs_reorder(&self) -> bool {
        self.quantity <= self.reorder_level
    }
}

impl Record for InventoryItem {
    const KIND: EntityKind = EntityKind::InventoryItem;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn updated_at(&self) -> Option<Timestamp> {
        self.updated_at
    }

    fn touch(&mut self, at: Timestamp) {
        self.updated_at = Some(at);
    }
}

/// A business expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    /// Unique id.
    pub id: String,
    /// Date the expense was incurred.
    pub date: NaiveDate,
    /// Expense category (rent, utilities, ...).
    pub expense_type: String,
    /// Amount spent.
    pub amount: f64,
    /// Free-text note.
    #[serde(default)]
    pub note: String,
    /// Creation instant.
    pub created_at: Timestamp,
}

impl Record for Expense {
    const KIND: EntityKind = EntityKind::Expense;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn updated_at(&self) -> Option<Timestamp> {
        None
    }
}

/// One line of a sale or refund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Id of the inventory item sold or returned.
    pub item_id: String,
    /// Item name at the time of the transaction.
    pub item_name: String,
    /// Units.
    pub quantity: u32,
    /// Unit price.
    pub price: f64,
    /// Line total.
    pub total: f64,
}

/// A completed sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    /// Unique id.
    pub id: String,
    /// Lines sold.
    pub items: Vec<LineItem>,
    /// Sum of line totals.
    pub subtotal: f64,
    /// Discount applied.
    pub discount: f64,
    /// Tax charged.
    pub tax: f64,
    /// Amount due.
    pub total: f64,
    /// Payment method label.
    pub payment_method: String,
    /// Customer name, if recorded.
    #[serde(default)]
    pub customer_name: Option<String>,
    /// Whether the sale was made on credit.
    #[serde(default)]
    pub is_credit: bool,
    /// Creation instant.
    pub created_at: Timestamp,
}

impl Record for Sale {
    const KIND: EntityKind = EntityKind::Sale;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn updated_at(&self) -> Option<Timestamp> {
        None
    }
}

/// A refund against an earlier sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    /// Unique id.
    pub id: String,
    /// The refunded sale.
    pub sale_id: String,
    /// Lines returned.
    pub items: Vec<LineItem>,
    /// Amount refunded.
    pub total: f64,
    /// Reason given.
    #[serde(default)]
    pub reason: String,
    /// Creation instant.
    pub created_at: Timestamp,
}

impl Record for Refund {
    const KIND: EntityKind = EntityKind::Refund;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn updated_at(&self) -> Option<Timestamp> {
        None
    }
}
