//! Command results

use distkv_core::{ChangeNotification, Entry, SecurityLevel, Value};
use distkv_wire::{encode_entries, encode_entry, encode_notification, encode_sync_result, encode_value};
use serde_json::{json, Value as Json};

/// Successful result of a command
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// Command with no result
    Unit,
    /// A stored value
    Value(Value),
    /// A list of entries
    Entries(Vec<Entry>),
    /// The entry under a cursor
    Entry(Entry),
    /// A count or size
    Count(usize),
    /// A cursor position
    Position(i64),
    /// A cursor predicate or move outcome
    Bool(bool),
    /// Store ids of a bundle
    StoreIds(Vec<String>),
    /// A store was opened and bound
    Store { alias: String, store_id: String },
    /// A result set was created and bound
    ResultSet { alias: String, count: usize },
    /// A security level
    SecurityLevel(SecurityLevel),
    /// The last `dataChange` notification, if any
    Notification(Option<ChangeNotification>),
    /// The last `syncComplete` payload, if any
    SyncResult(Option<Vec<(String, i32)>>),
    /// A device id
    DeviceId(String),
}

impl Output {
    /// JSON rendering used by scripts and the CLI
    pub fn to_json(&self) -> Json {
        match self {
            Output::Unit => Json::Null,
            Output::Value(v) => encode_value(v),
            Output::Entries(entries) => encode_entries(entries),
            Output::Entry(entry) => encode_entry(entry),
            Output::Count(n) => json!(n),
            Output::Position(p) => json!(p),
            Output::Bool(b) => json!(b),
            Output::StoreIds(ids) => json!(ids),
            Output::Store { alias, store_id } => json!({"store": alias, "storeId": store_id}),
            Output::ResultSet { alias, count } => json!({"resultSet": alias, "count": count}),
            Output::SecurityLevel(level) => json!(level.code()),
            Output::Notification(n) => n.as_ref().map(encode_notification).unwrap_or(Json::Null),
            Output::SyncResult(r) => r.as_deref().map(encode_sync_result).unwrap_or(Json::Null),
            Output::DeviceId(id) => json!(id),
        }
    }
}
