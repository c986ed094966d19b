//! Invocations and commands
//!
//! An [`Invocation`] is what a loosely typed caller sends: a target, a
//! method name and JSON arguments. [`Command::parse`] validates it into a
//! typed [`Command`]; all argument checking happens there.
//!
//! ## Targets
//!
//! | Target | Methods |
//! |--------|---------|
//! | `"manager"` | `getKVStore`, `closeKVStore`, `deleteKVStore`, `getAllKVStoreId` |
//! | `"session"` | `sleep`, `flush`, `notificationCount`, `lastNotification`, `lastSyncResult`, `localDeviceId` |
//! | store alias | store methods (`put`, `get`, ... `removeDeviceData`) |
//! | result set alias | cursor methods (`getCount`, `moveToNext`, ... `getEntry`) |

use crate::args::Args;
use distkv_core::{
    Entry, Error, KvStoreType, Options, Result, SecurityLevel, SubscribeType, SyncMode, Value,
};
use distkv_engine::{FieldValue, Query};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Target naming the manager
pub const MANAGER_TARGET: &str = "manager";

/// Target naming the session itself
pub const SESSION_TARGET: &str = "session";

/// One call from a loosely typed caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    /// `"manager"`, `"session"`, a store alias or a result set alias
    pub target: String,
    /// Method name, as in the SDK (`put`, `getResultSet`, ...)
    pub method: String,
    /// Positional arguments
    #[serde(default)]
    pub args: Vec<Json>,
    /// Alias to bind a returned store or result set to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
}

impl Invocation {
    /// Build an invocation without a binding
    pub fn new(target: impl Into<String>, method: impl Into<String>, args: Vec<Json>) -> Self {
        Self {
            target: target.into(),
            method: method.into(),
            args,
            bind: None,
        }
    }

    /// Bind the result to `alias`
    pub fn bind(mut self, alias: impl Into<String>) -> Self {
        self.bind = Some(alias.into());
        self
    }
}

/// Read scope of `getEntries`/`getResultSet`
#[derive(Debug, Clone)]
pub enum Selector {
    /// Keys starting with a prefix
    Prefix(String),
    /// Entries matching a query
    Query(Query),
}

/// Event kinds of `on`/`off`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// `dataChange`
    DataChange,
    /// `syncComplete`
    SyncComplete,
}

impl EventKind {
    fn parse(name: &str) -> Result<Self> {
        match name {
            "dataChange" => Ok(EventKind::DataChange),
            "syncComplete" => Ok(EventKind::SyncComplete),
            other => Err(Error::InvalidArgument(format!("unknown event '{}'", other))),
        }
    }
}

/// Cursor operations on a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorOp {
    /// `getCount`
    GetCount,
    /// `getPosition`
    GetPosition,
    /// `moveToFirst`
    MoveToFirst,
    /// `moveToLast`
    MoveToLast,
    /// `moveToNext`
    MoveToNext,
    /// `moveToPrevious`
    MoveToPrevious,
    /// `move(offset)`
    Move(i64),
    /// `moveToPosition(position)`
    MoveToPosition(i64),
    /// `isFirst`
    IsFirst,
    /// `isLast`
    IsLast,
    /// `isBeforeFirst`
    IsBeforeFirst,
    /// `isAfterLast`
    IsAfterLast,
    /// `getEntry`
    GetEntry,
}

/// A validated command
#[derive(Debug, Clone)]
pub enum Command {
    // Manager
    /// Open a store and bind the handle
    GetKvStore {
        store_id: String,
        options: Options,
        bind: String,
    },
    /// Close a bound handle
    CloseKvStore {
        bundle: String,
        store_id: String,
        store: String,
    },
    /// Delete a closed store
    DeleteKvStore { bundle: String, store_id: String },
    /// List store ids
    GetAllKvStoreId { bundle: String },

    // Store
    /// `put(key, value)`
    Put { store: String, key: String, value: Value },
    /// `get([deviceId,] key)`
    Get {
        store: String,
        device: Option<String>,
        key: String,
    },
    /// `delete(key)`
    Delete { store: String, key: String },
    /// `putBatch(entries)`
    PutBatch { store: String, entries: Vec<Entry> },
    /// `deleteBatch(keys)`
    DeleteBatch { store: String, keys: Vec<String> },
    /// `getEntries([deviceId,] prefixOrQuery)`
    GetEntries {
        store: String,
        device: Option<String>,
        selector: Selector,
    },
    /// `getResultSet([deviceId,] prefixOrQuery)`
    GetResultSet {
        store: String,
        device: Option<String>,
        selector: Selector,
        bind: Option<String>,
    },
    /// `getResultSize([deviceId,] query)`
    GetResultSize {
        store: String,
        device: Option<String>,
        query: Query,
    },
    /// `closeResultSet(resultSet)`
    CloseResultSet { store: String, result_set: String },
    /// `startTransaction()`
    StartTransaction { store: String },
    /// `commit()`
    Commit { store: String },
    /// `rollback()`
    Rollback { store: String },
    /// `on(event[, subscribeType])`
    On {
        store: String,
        event: EventKind,
        filter: SubscribeType,
    },
    /// `off(event)`
    Off { store: String, event: EventKind },
    /// `sync(deviceIds, mode[, delayMs])`
    Sync {
        store: String,
        devices: Vec<String>,
        mode: SyncMode,
        delay_ms: Option<u32>,
    },
    /// `enableSync(enabled)`
    EnableSync { store: String, enabled: bool },
    /// `setSyncRange(localLabels, remoteSupportLabels)`
    SetSyncRange {
        store: String,
        local: Vec<String>,
        remote: Vec<String>,
    },
    /// `setSyncParam(defaultAllowedDelayMs)`
    SetSyncParam { store: String, delay_ms: u32 },
    /// `removeDeviceData(deviceId)`
    RemoveDeviceData { store: String, device: String },
    /// `getSecurityLevel()`
    GetSecurityLevel { store: String },

    // Result set
    /// A cursor operation
    Cursor { result_set: String, op: CursorOp },

    // Session
    /// Sleep for a number of milliseconds
    Sleep { ms: u64 },
    /// Wait for queued notifications
    Flush,
    /// Count of notifications received by a store alias
    NotificationCount { store: String, event: EventKind },
    /// Last `dataChange` notification received by a store alias
    LastNotification { store: String },
    /// Last `syncComplete` payload received by a store alias
    LastSyncResult { store: String },
    /// Id of the local device
    LocalDeviceId,
}

fn optional_device(args: &Args<'_>, total_with_device: usize) -> Result<Option<String>> {
    if args.len() == total_with_device {
        Ok(Some(args.string(0)?))
    } else {
        Ok(None)
    }
}

fn selector(args: &Args<'_>, i: usize) -> Result<Selector> {
    let raw = args.raw(i)?;
    match raw {
        Json::String(prefix) => Ok(Selector::Prefix(prefix.clone())),
        Json::Array(_) => Ok(Selector::Query(parse_query(raw)?)),
        _ => Err(Error::invalid_argument(
            "expected a key prefix or a query",
        )),
    }
}

fn field_value(v: &Json) -> Result<FieldValue> {
    match v {
        Json::Number(n) => n
            .as_f64()
            .map(FieldValue::Number)
            .ok_or_else(|| Error::invalid_argument("query number out of range")),
        Json::String(s) => Ok(FieldValue::String(s.clone())),
        Json::Bool(b) => Ok(FieldValue::Bool(*b)),
        _ => Err(Error::invalid_argument(
            "query values must be numbers, strings or booleans",
        )),
    }
}

/// Build a [`Query`] from a list of builder calls.
///
/// Each call is `[name, args...]` or a bare name:
/// `[["prefixKey", "u"], ["greaterThan", "$.age", 30], "and", ["isNotNull", "$.name"]]`
pub fn parse_query(calls: &Json) -> Result<Query> {
    let calls = calls
        .as_array()
        .ok_or_else(|| Error::invalid_argument("query must be an array of builder calls"))?;
    let mut query = Query::new();
    for call in calls {
        let (name, rest): (&str, &[Json]) = match call {
            Json::String(name) => (name.as_str(), &[]),
            Json::Array(parts) => match parts.split_first() {
                Some((Json::String(name), rest)) => (name.as_str(), rest),
                _ => return Err(Error::invalid_argument("query call must start with a name")),
            },
            _ => return Err(Error::invalid_argument("query call must be a name or an array")),
        };
        let a = Args::new(name, rest);
        query = match name {
            "reset" => {
                a.none()?;
                query.reset()
            }
            "equalTo" | "notEqualTo" | "greaterThan" | "lessThan" | "greaterThanOrEqualTo"
            | "lessThanOrEqualTo" => {
                a.arity(2, 2)?;
                let field = a.string(0)?;
                let value = field_value(a.raw(1)?)?;
                match name {
                    "equalTo" => query.equal_to(&field, value),
                    "notEqualTo" => query.not_equal_to(&field, value),
                    "greaterThan" => query.greater_than(&field, value),
                    "lessThan" => query.less_than(&field, value),
                    "greaterThanOrEqualTo" => query.greater_than_or_equal_to(&field, value),
                    _ => query.less_than_or_equal_to(&field, value),
                }
            }
            "isNull" | "isNotNull" | "orderByAsc" | "orderByDesc" | "prefixKey"
            | "setSuggestIndex" | "deviceId" => {
                a.arity(1, 1)?;
                let s = a.string(0)?;
                match name {
                    "isNull" => query.is_null(&s),
                    "isNotNull" => query.is_not_null(&s),
                    "orderByAsc" => query.order_by_asc(&s),
                    "orderByDesc" => query.order_by_desc(&s),
                    "prefixKey" => query.prefix_key(&s),
                    "setSuggestIndex" => query.set_suggest_index(&s),
                    _ => query.device_id(&s),
                }
            }
            "inNumber" | "notInNumber" => {
                a.arity(2, 2)?;
                let field = a.string(0)?;
                let numbers = a
                    .raw(1)?
                    .as_array()
                    .and_then(|items| items.iter().map(Json::as_f64).collect::<Option<Vec<f64>>>())
                    .ok_or_else(|| Error::invalid_argument("expected an array of numbers"))?;
                if name == "inNumber" {
                    query.in_number(&field, numbers)
                } else {
                    query.not_in_number(&field, numbers)
                }
            }
            "inString" | "notInString" => {
                a.arity(2, 2)?;
                let field = a.string(0)?;
                let strings = a.strings(1)?;
                if name == "inString" {
                    query.in_string(&field, strings)
                } else {
                    query.not_in_string(&field, strings)
                }
            }
            "like" | "unlike" => {
                a.arity(2, 2)?;
                let field = a.string(0)?;
                let pattern = a.string(1)?;
                if name == "like" {
                    query.like(&field, &pattern)
                } else {
                    query.unlike(&field, &pattern)
                }
            }
            "and" | "or" | "beginGroup" | "endGroup" => {
                a.none()?;
                match name {
                    "and" => query.and(),
                    "or" => query.or(),
                    "beginGroup" => query.begin_group(),
                    _ => query.end_group(),
                }
            }
            "limit" => {
                a.arity(2, 2)?;
                query.limit(a.u32(0)? as usize, a.u32(1)? as usize)
            }
            other => {
                return Err(Error::InvalidArgument(format!(
                    "unknown query call '{}'",
                    other
                )))
            }
        };
    }
    Ok(query)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct OptionsArg {
    create_if_missing: Option<bool>,
    encrypt: Option<bool>,
    backup: Option<bool>,
    auto_sync: Option<bool>,
    kv_store_type: Option<i64>,
    security_level: Option<i64>,
}

/// Decode an SDK options object; absent fields take their defaults
pub fn parse_options(raw: &Json) -> Result<Options> {
    let arg: OptionsArg = serde_json::from_value(raw.clone())
        .map_err(|e| Error::InvalidArgument(format!("invalid options: {}", e)))?;
    let mut options = Options::default();
    if let Some(v) = arg.create_if_missing {
        options.create_if_missing = v;
    }
    if let Some(v) = arg.encrypt {
        options.encrypt = v;
    }
    if let Some(v) = arg.backup {
        options.backup = v;
    }
    if let Some(v) = arg.auto_sync {
        options.auto_sync = v;
    }
    if let Some(code) = arg.kv_store_type {
        options.kv_store_type = KvStoreType::from_code(code)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown kvStoreType {}", code)))?;
    }
    if let Some(code) = arg.security_level {
        options.security_level = SecurityLevel::from_code(code)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown securityLevel {}", code)))?;
    }
    Ok(options)
}

fn bind_required(inv: &Invocation) -> Result<String> {
    inv.bind
        .clone()
        .ok_or_else(|| Error::InvalidArgument(format!("{} needs a bind alias", inv.method)))
}

impl Command {
    /// Validate an invocation
    pub fn parse(inv: &Invocation) -> Result<Self> {
        let a = Args::new(&inv.method, &inv.args);
        match inv.target.as_str() {
            MANAGER_TARGET => Self::parse_manager(inv, &a),
            SESSION_TARGET => Self::parse_session(inv, &a),
            _ => match cursor_op(inv, &a)? {
                Some(op) => Ok(Command::Cursor {
                    result_set: inv.target.clone(),
                    op,
                }),
                None => Self::parse_store(inv, &a),
            },
        }
    }

    fn parse_manager(inv: &Invocation, a: &Args<'_>) -> Result<Self> {
        match inv.method.as_str() {
            "getKVStore" => {
                a.arity(1, 2)?;
                let options = if a.len() == 2 {
                    parse_options(a.raw(1)?)?
                } else {
                    Options::default()
                };
                Ok(Command::GetKvStore {
                    store_id: a.string(0)?,
                    options,
                    bind: bind_required(inv)?,
                })
            }
            "closeKVStore" => {
                a.arity(3, 3)?;
                Ok(Command::CloseKvStore {
                    bundle: a.string(0)?,
                    store_id: a.string(1)?,
                    store: a.string(2)?,
                })
            }
            "deleteKVStore" => {
                a.arity(2, 2)?;
                Ok(Command::DeleteKvStore {
                    bundle: a.string(0)?,
                    store_id: a.string(1)?,
                })
            }
            "getAllKVStoreId" => {
                a.arity(1, 1)?;
                Ok(Command::GetAllKvStoreId {
                    bundle: a.string(0)?,
                })
            }
            other => Err(Error::InvalidArgument(format!("unknown manager method '{}'", other))),
        }
    }

    fn parse_session(inv: &Invocation, a: &Args<'_>) -> Result<Self> {
        match inv.method.as_str() {
            "sleep" => {
                a.arity(1, 1)?;
                Ok(Command::Sleep {
                    ms: u64::from(a.u32(0)?),
                })
            }
            "flush" => {
                a.none()?;
                Ok(Command::Flush)
            }
            "notificationCount" => {
                a.arity(1, 2)?;
                let event = if a.len() == 2 {
                    EventKind::parse(&a.string(1)?)?
                } else {
                    EventKind::DataChange
                };
                Ok(Command::NotificationCount {
                    store: a.string(0)?,
                    event,
                })
            }
            "lastNotification" => {
                a.arity(1, 1)?;
                Ok(Command::LastNotification { store: a.string(0)? })
            }
            "lastSyncResult" => {
                a.arity(1, 1)?;
                Ok(Command::LastSyncResult { store: a.string(0)? })
            }
            "localDeviceId" => {
                a.none()?;
                Ok(Command::LocalDeviceId)
            }
            other => Err(Error::InvalidArgument(format!("unknown session method '{}'", other))),
        }
    }

    fn parse_store(inv: &Invocation, a: &Args<'_>) -> Result<Self> {
        let store = inv.target.clone();
        let cmd = match inv.method.as_str() {
            "put" => {
                a.arity(2, 2)?;
                Command::Put {
                    store,
                    key: a.string(0)?,
                    value: a.value(1)?,
                }
            }
            "get" => {
                a.arity(1, 2)?;
                Command::Get {
                    store,
                    device: optional_device(a, 2)?,
                    key: a.string(a.len() - 1)?,
                }
            }
            "delete" => {
                a.arity(1, 1)?;
                Command::Delete {
                    store,
                    key: a.string(0)?,
                }
            }
            "putBatch" => {
                a.arity(1, 1)?;
                Command::PutBatch {
                    store,
                    entries: a.entries(0)?,
                }
            }
            "deleteBatch" => {
                a.arity(1, 1)?;
                Command::DeleteBatch {
                    store,
                    keys: a.strings(0)?,
                }
            }
            "getEntries" => {
                a.arity(1, 2)?;
                Command::GetEntries {
                    store,
                    device: optional_device(a, 2)?,
                    selector: selector(a, a.len() - 1)?,
                }
            }
            "getResultSet" => {
                a.arity(1, 2)?;
                Command::GetResultSet {
                    store,
                    device: optional_device(a, 2)?,
                    selector: selector(a, a.len() - 1)?,
                    bind: inv.bind.clone(),
                }
            }
            "getResultSize" => {
                a.arity(1, 2)?;
                Command::GetResultSize {
                    store,
                    device: optional_device(a, 2)?,
                    query: parse_query(a.raw(a.len() - 1)?)?,
                }
            }
            "closeResultSet" => {
                a.arity(1, 1)?;
                Command::CloseResultSet {
                    store,
                    result_set: a.string(0)?,
                }
            }
            "startTransaction" => {
                a.none()?;
                Command::StartTransaction { store }
            }
            "commit" => {
                a.none()?;
                Command::Commit { store }
            }
            "rollback" => {
                a.none()?;
                Command::Rollback { store }
            }
            "on" => {
                a.arity(1, 2)?;
                let event = EventKind::parse(&a.string(0)?)?;
                let filter = match (event, a.len()) {
                    (EventKind::DataChange, 2) => {
                        let code = a.i64(1)?;
                        SubscribeType::from_code(code).ok_or_else(|| {
                            Error::InvalidArgument(format!("unknown subscribe type {}", code))
                        })?
                    }
                    (EventKind::DataChange, _) => {
                        return Err(Error::invalid_argument(
                            "on('dataChange') needs a subscribe type",
                        ))
                    }
                    (EventKind::SyncComplete, 1) => SubscribeType::All,
                    (EventKind::SyncComplete, _) => {
                        return Err(Error::invalid_argument(
                            "on('syncComplete') takes no subscribe type",
                        ))
                    }
                };
                Command::On { store, event, filter }
            }
            "off" => {
                a.arity(1, 1)?;
                Command::Off {
                    store,
                    event: EventKind::parse(&a.string(0)?)?,
                }
            }
            "sync" => {
                a.arity(2, 3)?;
                let code = a.i64(1)?;
                let mode = SyncMode::from_code(code)
                    .ok_or_else(|| Error::InvalidArgument(format!("unknown sync mode {}", code)))?;
                Command::Sync {
                    store,
                    devices: a.strings(0)?,
                    mode,
                    delay_ms: if a.len() == 3 { Some(a.u32(2)?) } else { None },
                }
            }
            "enableSync" => {
                a.arity(1, 1)?;
                Command::EnableSync {
                    store,
                    enabled: a.bool(0)?,
                }
            }
            "setSyncRange" => {
                a.arity(2, 2)?;
                Command::SetSyncRange {
                    store,
                    local: a.strings(0)?,
                    remote: a.strings(1)?,
                }
            }
            "setSyncParam" => {
                a.arity(1, 1)?;
                Command::SetSyncParam {
                    store,
                    delay_ms: a.u32(0)?,
                }
            }
            "removeDeviceData" => {
                a.arity(1, 1)?;
                Command::RemoveDeviceData {
                    store,
                    device: a.string(0)?,
                }
            }
            "getSecurityLevel" => {
                a.none()?;
                Command::GetSecurityLevel { store }
            }
            other => {
                return Err(Error::InvalidArgument(format!(
                    "unknown store method '{}'",
                    other
                )))
            }
        };
        Ok(cmd)
    }
}

fn cursor_op(inv: &Invocation, a: &Args<'_>) -> Result<Option<CursorOp>> {
    let op = match inv.method.as_str() {
        "getCount" => CursorOp::GetCount,
        "getPosition" => CursorOp::GetPosition,
        "moveToFirst" => CursorOp::MoveToFirst,
        "moveToLast" => CursorOp::MoveToLast,
        "moveToNext" => CursorOp::MoveToNext,
        "moveToPrevious" => CursorOp::MoveToPrevious,
        "isFirst" => CursorOp::IsFirst,
        "isLast" => CursorOp::IsLast,
        "isBeforeFirst" => CursorOp::IsBeforeFirst,
        "isAfterLast" => CursorOp::IsAfterLast,
        "getEntry" => CursorOp::GetEntry,
        "move" => {
            a.arity(1, 1)?;
            return Ok(Some(CursorOp::Move(a.i64(0)?)));
        }
        "moveToPosition" => {
            a.arity(1, 1)?;
            return Ok(Some(CursorOp::MoveToPosition(a.i64(0)?)));
        }
        _ => return Ok(None),
    };
    a.none()?;
    Ok(Some(op))
}
