//! PostgREST-style HTTP remote.
//!
//! The HTTP client itself is abstracted behind [`HttpClient`] so the
//! embedding application can bring its own (reqwest, ureq, a platform
//! bridge). This module owns the request shapes and the row mapping.

use crate::error::{SyncError, SyncResult};
use crate::remote::{Compatibility, RecordRejection, RemoteClient, UpsertOutcome};
use chrono::NaiveDate;
use parking_lot::RwLock;
use possync_protocol::{
    ActionOp, EntityKind, EntityPayload, Expense, InventoryItem, QueuedAction, RecordSet, Timestamp,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        })
    }
}

/// An outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: Method,
    /// Absolute URL including the query string.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// JSON body.
    pub body: Option<Vec<u8>>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl HttpRequest {
    /// Returns the value of header `name`, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A response that reached us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A request that never produced a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request timed out.
    Timeout,
    /// The remote could not be reached.
    Unreachable(String),
}

/// HTTP client abstraction.
pub trait HttpClient: Send + Sync {
    /// Sends `request` and returns the response, whatever its status.
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool {
        true
    }
}

/// Remote client speaking the PostgREST dialect.
///
/// - pull: `GET {url}/rest/v1/{table}?user_id=eq.{owner}`
/// - upsert: `POST {url}/rest/v1/{table}` with
///   `Prefer: resolution=merge-duplicates`
/// - replay: create is an upserting `POST`, update is
///   `PATCH ?id=eq.{id}`, delete is `DELETE ?id=eq.{id}`
///
/// Sales and refunds keep their lines in separate remote tables, so those
/// kinds are reported incompatible for push.
pub struct RestRemote<C: HttpClient> {
    base_url: String,
    access_key: String,
    client: C,
    timeout: Duration,
    connected: AtomicBool,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> RestRemote<C> {
    /// Creates a remote for `base_url`, authenticating with `access_key`.
    pub fn new(base_url: impl Into<String>, access_key: impl Into<String>, client: C) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_key: access_key.into(),
            client,
            timeout: crate::config::DEFAULT_TIMEOUT,
            connected: AtomicBool::new(true),
            last_error: RwLock::new(None),
        }
    }

    /// Creates a remote from a sync configuration.
    pub fn from_config(config: &crate::SyncConfig, client: C) -> Self {
        Self::new(&config.remote_url, &config.access_key, client).with_timeout(config.timeout)
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last transport error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Marks the remote reachable again after a transport failure.
    pub fn reconnect(&self) {
        self.clear_error();
    }

    fn set_error(&self, err: &str) {
        *self.last_error.write() = Some(err.to_string());
    }

    fn clear_error(&self) {
        self.connected.store(true, Ordering::SeqCst);
        *self.last_error.write() = None;
    }

    /// Builds the URL of `kind`'s table, with an optional `column=eq.value`
    /// filter. The value is percent-encoded, so ids and owners can hold any
    /// character.
    fn table_url(&self, kind: EntityKind, filter: Option<(&str, &str)>) -> SyncResult<String> {
        let mut url = Url::parse(&format!("{}/rest/v1/{}", self.base_url, table(kind)))
            .map_err(|e| SyncError::Configuration(format!("endpoint {:?}: {e}", self.base_url)))?;
        if let Some((column, value)) = filter {
            url.query_pairs_mut()
                .append_pair(column, &format!("eq.{value}"));
        }
        Ok(url.into())
    }

    fn request(&self, method: Method, url: String, body: Option<Vec<u8>>) -> HttpRequest {
        let mut headers = vec![
            ("apikey".to_string(), self.access_key.clone()),
            ("Authorization".to_string(), format!("Bearer {}", self.access_key)),
        ];
        if body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        if method == Method::Post {
            headers.push((
                "Prefer".to_string(),
                "resolution=merge-duplicates,return=minimal".to_string(),
            ));
        }
        HttpRequest {
            method,
            url,
            headers,
            body,
            timeout: self.timeout,
        }
    }

    fn send(&self, kind: EntityKind, request: HttpRequest) -> SyncResult<HttpResponse> {
        debug!(method = %request.method, url = %request.url, "remote request");
        let response = self.client.send(request).map_err(|e| {
            let err = match e {
                TransportError::Timeout => SyncError::Timeout,
                TransportError::Unreachable(message) => SyncError::Connectivity(message),
            };
            self.set_error(&err.to_string());
            self.connected.store(false, Ordering::SeqCst);
            err
        })?;

        // Any response means the remote is reachable again.
        self.clear_error();
        if !response.is_success() {
            let message = rejection_message(&response);
            warn!(kind = %kind, status = response.status, %message, "remote rejected request");
            return Err(SyncError::rejected(kind, message));
        }
        Ok(response)
    }
}

impl<C: HttpClient> RemoteClient for RestRemote<C> {
    fn pull(&self, kind: EntityKind, owner: &str) -> SyncResult<RecordSet> {
        let url = self.table_url(kind, Some(("user_id", owner)))?;
        let response = self.send(kind, self.request(Method::Get, url, None))?;
        let rows: Vec<Value> = serde_json::from_slice(&response.body)
            .map_err(|e| SyncError::Codec(format!("{kind} rows: {e}")))?;
        rows_to_set(kind, rows)
    }

    fn upsert(&self, owner: &str, records: &RecordSet) -> SyncResult<UpsertOutcome> {
        let kind = records.kind();
        if records.is_empty() {
            return Ok(UpsertOutcome::default());
        }
        let rows = records
            .payloads()
            .iter()
            .map(|payload| payload_to_row(payload, owner))
            .collect::<SyncResult<Vec<_>>>()?;
        let body = encode(&rows)?;
        let url = self.table_url(kind, None)?;
        self.send(kind, self.request(Method::Post, url, Some(body)))?;
        Ok(UpsertOutcome {
            accepted: rows.len(),
            rejected: Vec::<RecordRejection>::new(),
        })
    }

    fn replay(&self, owner: &str, action: &QueuedAction) -> SyncResult<()> {
        let kind = action.kind();
        let by_id = self.table_url(kind, Some(("id", action.record_id())))?;
        let request = match action.operation {
            ActionOp::Create => {
                let body = encode(&[payload_to_row(&action.payload, owner)?])?;
                self.request(Method::Post, self.table_url(kind, None)?, Some(body))
            }
            ActionOp::Update => {
                let body = encode(&payload_to_row(&action.payload, owner)?)?;
                self.request(Method::Patch, by_id, Some(body))
            }
            ActionOp::Delete => self.request(Method::Delete, by_id, None),
        };
        self.send(kind, request).map(|_| ()).map_err(|e| match e {
            SyncError::RemoteRejected { message, .. } => SyncError::QueueItemFailed {
                action_id: action.id.clone(),
                message,
            },
            other => other,
        })
    }

    fn compatibility(&self, kind: EntityKind) -> Compatibility {
        match kind {
            EntityKind::InventoryItem | EntityKind::Expense => Compatibility::Compatible,
            EntityKind::Sale => Compatibility::Incompatible {
                reason: "remote keeps sale lines in a separate sale_items table".into(),
            },
            EntityKind::Refund => Compatibility::Incompatible {
                reason: "remote keeps refund lines in a separate refund_items table".into(),
            },
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.client.is_healthy()
    }
}

fn table(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::InventoryItem => "inventory_items",
        EntityKind::Expense => "expenses",
        EntityKind::Sale => "sales",
        EntityKind::Refund => "refunds",
    }
}

fn rejection_message(response: &HttpResponse) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }
    match serde_json::from_slice::<ErrorBody>(&response.body) {
        Ok(body) => format!("{}: {}", response.status, body.message),
        Err(_) => format!("status {}", response.status),
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> SyncResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| SyncError::Codec(e.to_string()))
}

/// Remote shape of an inventory item.
#[derive(Debug, Serialize, Deserialize)]
struct InventoryRow {
    id: String,
    name: String,
    #[serde(rename = "type")]
    item_type: String,
    #[serde(default)]
    strength: Option<String>,
    quantity: u32,
    cost_price: f64,
    sale_price: f64,
    #[serde(default)]
    expiry: Option<NaiveDate>,
    reorder_level: u32,
    created_at: Timestamp,
    #[serde(default)]
    updated_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
}

impl InventoryRow {
    fn from_item(item: &InventoryItem, owner: &str) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
            item_type: item.item_type.clone(),
            strength: Some(item.strength.clone()).filter(|s| !s.is_empty()),
            quantity: item.quantity,
            cost_price: item.cost_price,
            sale_price: item.sale_price,
            expiry: item.expiry,
            reorder_level: item.reorder_level,
            created_at: item.created_at,
            updated_at: item.updated_at,
            user_id: Some(owner.to_string()),
        }
    }
}

impl From<InventoryRow> for InventoryItem {
    fn from(row: InventoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            item_type: row.item_type,
            strength: row.strength.unwrap_or_default(),
            quantity: row.quantity,
            cost_price: row.cost_price,
            sale_price: row.sale_price,
            expiry: row.expiry,
            reorder_level: row.reorder_level,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Remote shape of an expense.
#[derive(Debug, Serialize, Deserialize)]
struct ExpenseRow {
    id: String,
    expense_date: NaiveDate,
    #[serde(rename = "type")]
    expense_type: String,
    amount: f64,
    #[serde(default)]
    note: Option<String>,
    created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    #[serde(default)]
    synced: bool,
}

impl ExpenseRow {
    fn from_expense(expense: &Expense, owner: &str) -> Self {
        Self {
            id: expense.id.clone(),
            expense_date: expense.date,
            expense_type: expense.expense_type.clone(),
            amount: expense.amount,
            note: Some(expense.note.clone()).filter(|n| !n.is_empty()),
            created_at: expense.created_at,
            user_id: Some(owner.to_string()),
            synced: true,
        }
    }
}

impl From<ExpenseRow> for Expense {
    fn from(row: ExpenseRow) -> Self {
        Self {
            id: row.id,
            date: row.expense_date,
            expense_type: row.expense_type,
            amount: row.amount,
            note: row.note.unwrap_or_default(),
            created_at: row.created_at,
        }
    }
}

fn payload_to_row(payload: &EntityPayload, owner: &str) -> SyncResult<Value> {
    let value = match payload {
        EntityPayload::InventoryItem(item) => {
            serde_json::to_value(InventoryRow::from_item(item, owner))
        }
        EntityPayload::Expense(expense) => {
            serde_json::to_value(ExpenseRow::from_expense(expense, owner))
        }
        EntityPayload::Sale(sale) => serde_json::to_value(sale).map(|v| with_owner(v, owner)),
        EntityPayload::Refund(refund) => {
            serde_json::to_value(refund).map(|v| with_owner(v, owner))
        }
    };
    value.map_err(|e| SyncError::Codec(e.to_string()))
}

fn with_owner(mut value: Value, owner: &str) -> Value {
    if let Value::Object(map) = &mut value {
        map.insert("user_id".into(), Value::String(owner.to_string()));
    }
    value
}

fn rows_to_set(kind: EntityKind, rows: Vec<Value>) -> SyncResult<RecordSet> {
    fn decode<T: serde::de::DeserializeOwned>(kind: EntityKind, rows: Vec<Value>) -> SyncResult<Vec<T>> {
        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| SyncError::Codec(format!("{kind} row: {e}")))
            })
            .collect()
    }

    Ok(match kind {
        EntityKind::InventoryItem => RecordSet::InventoryItem(
            decode::<InventoryRow>(kind, rows)?.into_iter().map(Into::into).collect(),
        ),
        EntityKind::Expense => RecordSet::Expense(
            decode::<ExpenseRow>(kind, rows)?.into_iter().map(Into::into).collect(),
        ),
        EntityKind::Sale => RecordSet::Sale(decode(kind, rows)?),
        EntityKind::Refund => RecordSet::Refund(decode(kind, rows)?),
    })
}
