//! Store command handlers
//!
//! Each handler forwards to one engine call and wraps the result. Device
//! ids arrive as strings and are validated here.

use distkv_core::{DeviceId, Entry, Result, Value};
use distkv_engine::{KvStore, Query, ResultSet};

use crate::command::Selector;
use crate::Output;

fn scope(device: Option<&str>) -> Result<Option<DeviceId>> {
    device.map(DeviceId::new).transpose()
}

/// Handle `put`
pub fn put(store: &KvStore, key: &str, value: Value) -> Result<Output> {
    store.put(key, value)?;
    Ok(Output::Unit)
}

/// Handle `get`
pub fn get(store: &KvStore, device: Option<&str>, key: &str) -> Result<Output> {
    let device = scope(device)?;
    Ok(Output::Value(store.get(device.as_ref(), key)?))
}

/// Handle `delete`
pub fn delete(store: &KvStore, key: &str) -> Result<Output> {
    store.delete(key)?;
    Ok(Output::Unit)
}

/// Handle `putBatch`
pub fn put_batch(store: &KvStore, entries: Vec<Entry>) -> Result<Output> {
    store.put_batch(entries)?;
    Ok(Output::Unit)
}

/// Handle `deleteBatch`
pub fn delete_batch(store: &KvStore, keys: Vec<String>) -> Result<Output> {
    store.delete_batch(keys)?;
    Ok(Output::Unit)
}

/// Handle `getEntries`
pub fn get_entries(store: &KvStore, device: Option<&str>, selector: &Selector) -> Result<Output> {
    let device = scope(device)?;
    let entries = match selector {
        Selector::Prefix(prefix) => store.get_entries(device.as_ref(), prefix)?,
        Selector::Query(query) => store.get_entries_by_query(device.as_ref(), query)?,
    };
    Ok(Output::Entries(entries))
}

/// Handle `getResultSet`; the caller binds the returned set
pub fn get_result_set(store: &KvStore, device: Option<&str>, selector: &Selector) -> Result<ResultSet> {
    let device = scope(device)?;
    match selector {
        Selector::Prefix(prefix) => store.get_result_set(device.as_ref(), prefix),
        Selector::Query(query) => store.get_result_set_by_query(device.as_ref(), query),
    }
}

/// Handle `getResultSize`
pub fn get_result_size(store: &KvStore, device: Option<&str>, query: &Query) -> Result<Output> {
    let device = scope(device)?;
    Ok(Output::Count(store.get_result_size(device.as_ref(), query)?))
}

/// Handle `enableSync`
pub fn enable_sync(store: &KvStore, enabled: bool) -> Result<Output> {
    store.enable_sync(enabled)?;
    Ok(Output::Unit)
}

/// Handle `setSyncRange`
pub fn set_sync_range(store: &KvStore, local: Vec<String>, remote: Vec<String>) -> Result<Output> {
    store.set_sync_range(local, remote)?;
    Ok(Output::Unit)
}

/// Handle `setSyncParam`
pub fn set_sync_param(store: &KvStore, delay_ms: u32) -> Result<Output> {
    store.set_sync_param(delay_ms)?;
    Ok(Output::Unit)
}

/// Handle `removeDeviceData`
pub fn remove_device_data(store: &KvStore, device: &str) -> Result<Output> {
    store.remove_device_data(device)?;
    Ok(Output::Unit)
}

/// Handle `getSecurityLevel`
pub fn get_security_level(store: &KvStore) -> Result<Output> {
    Ok(Output::SecurityLevel(store.get_security_level()?))
}
