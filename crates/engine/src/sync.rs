//! Peer sync
//!
//! A sync exchanges one request/response pair with each target device over
//! a [`SyncTransport`]. Frames are MessagePack-encoded [`SyncRequest`] and
//! [`SyncResponse`] values.
//!
//! Each device only ever sends what it wrote itself. The receiver replaces
//! the sender's previous contribution with the new one, so repeated syncs
//! converge and deletes propagate.
//!
//! Failures never surface as errors of `sync()`: every target gets a status
//! code in the `syncComplete` payload.

use async_trait::async_trait;
use distkv_core::{DeviceId, Error, Result, Value};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Weak};
use thiserror::Error;

/// Per-device sync status codes
pub mod status {
    /// Exchange completed
    pub const SUCCESS: i32 = 0;
    /// Device is not reachable on the transport
    pub const DEVICE_UNREACHABLE: i32 = 1;
    /// The store is not open on the peer
    pub const STORE_NOT_OPEN: i32 = 2;
    /// Sync is disabled locally or on the peer
    pub const SYNC_DISABLED: i32 = 3;
    /// Sync range labels do not intersect
    pub const RANGE_MISMATCH: i32 = 4;
    /// The transport failed mid-exchange
    pub const TRANSPORT_FAILURE: i32 = 5;
}

/// Smallest non-zero allowed delay, milliseconds
pub const MIN_DELAY_MS: u32 = 100;

/// Largest allowed delay, milliseconds
pub const MAX_DELAY_MS: u32 = 86_400_000;

/// Validate an allowed delay: 0, or within `MIN_DELAY_MS..=MAX_DELAY_MS`.
pub fn validate_delay(delay_ms: u32) -> Result<()> {
    if delay_ms == 0 || (MIN_DELAY_MS..=MAX_DELAY_MS).contains(&delay_ms) {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "allowed delay {}ms is outside 0 | {}..={}",
            delay_ms, MIN_DELAY_MS, MAX_DELAY_MS
        )))
    }
}

/// One entry as replicated between devices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaEntry {
    /// Key
    pub key: String,
    /// Value
    pub value: Value,
    /// Write time on the originating device, milliseconds
    pub timestamp: i64,
}

/// Request frame sent to a peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Bundle of the store
    pub bundle: String,
    /// Store id
    pub store_id: String,
    /// Sending device
    pub from: DeviceId,
    /// Sender's own entries, when pushing
    pub push: Option<Vec<ReplicaEntry>>,
    /// Whether the peer should return its own entries
    pub pull: bool,
    /// Labels the sender accepts data for
    pub remote_support_labels: Vec<String>,
}

/// Response frame returned by a peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResponse {
    /// Status code from [`status`]
    pub status: i32,
    /// Peer's own entries, when pulled
    pub entries: Vec<ReplicaEntry>,
}

impl SyncResponse {
    /// A response carrying only a status
    pub fn status(status: i32) -> Self {
        Self {
            status,
            entries: Vec::new(),
        }
    }
}

/// Encode a request frame
pub fn encode_request(request: &SyncRequest) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(request).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode a request frame
pub fn decode_request(frame: &[u8]) -> Result<SyncRequest> {
    rmp_serde::from_slice(frame).map_err(|e| Error::Serialization(e.to_string()))
}

/// Encode a response frame
pub fn encode_response(response: &SyncResponse) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(response).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode a response frame
pub fn decode_response(frame: &[u8]) -> Result<SyncResponse> {
    rmp_serde::from_slice(frame).map_err(|e| Error::Serialization(e.to_string()))
}

/// Transport-level failures
#[derive(Debug, Error)]
pub enum TransportError {
    /// No route to the device
    #[error("device {0} is unreachable")]
    Unreachable(DeviceId),

    /// The exchange failed after the device was reached
    #[error("transport failure: {0}")]
    Failed(String),
}

/// Receiving side of a transport: one per device
pub trait SyncEndpoint: Send + Sync {
    /// Handle one request frame and produce the response frame
    fn handle_frame(&self, frame: &[u8]) -> Vec<u8>;
}

/// Moves frames between devices
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Make a device reachable through this transport
    fn attach(&self, _device: &DeviceId, _endpoint: Weak<dyn SyncEndpoint>) {}

    /// Remove a device from this transport
    fn detach(&self, _device: &DeviceId) {}

    /// Devices reachable from `local`, excluding itself
    fn peers(&self, local: &DeviceId) -> Vec<DeviceId>;

    /// Send a request frame and wait for the response frame
    async fn exchange(
        &self,
        from: &DeviceId,
        to: &DeviceId,
        frame: Vec<u8>,
    ) -> std::result::Result<Vec<u8>, TransportError>;
}

/// Transport with no peers; every exchange reports the device unreachable
#[derive(Debug, Default)]
pub struct NoPeers;

#[async_trait]
impl SyncTransport for NoPeers {
    fn peers(&self, _local: &DeviceId) -> Vec<DeviceId> {
        Vec::new()
    }

    async fn exchange(
        &self,
        _from: &DeviceId,
        to: &DeviceId,
        _frame: Vec<u8>,
    ) -> std::result::Result<Vec<u8>, TransportError> {
        Err(TransportError::Unreachable(to.clone()))
    }
}

/// In-process network connecting managers of one process
///
/// Each attached manager is one device. Devices can be taken offline to
/// exercise failure paths.
#[derive(Default)]
pub struct LoopbackNetwork {
    endpoints: RwLock<BTreeMap<DeviceId, Weak<dyn SyncEndpoint>>>,
    offline: RwLock<BTreeSet<DeviceId>>,
}

impl LoopbackNetwork {
    /// Create an empty network
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Take a device offline or bring it back
    pub fn set_online(&self, device: &DeviceId, online: bool) {
        let mut offline = self.offline.write();
        if online {
            offline.remove(device);
        } else {
            offline.insert(device.clone());
        }
    }

    fn endpoint(&self, device: &DeviceId) -> Option<Arc<dyn SyncEndpoint>> {
        if self.offline.read().contains(device) {
            return None;
        }
        self.endpoints.read().get(device).and_then(Weak::upgrade)
    }
}

#[async_trait]
impl SyncTransport for LoopbackNetwork {
    fn attach(&self, device: &DeviceId, endpoint: Weak<dyn SyncEndpoint>) {
        self.endpoints.write().insert(device.clone(), endpoint);
    }

    fn detach(&self, device: &DeviceId) {
        self.endpoints.write().remove(device);
    }

    fn peers(&self, local: &DeviceId) -> Vec<DeviceId> {
        let offline = self.offline.read();
        self.endpoints
            .read()
            .iter()
            .filter(|(id, ep)| *id != local && !offline.contains(*id) && ep.strong_count() > 0)
            .map(|(id, _)| id.clone())
            .collect()
    }

    async fn exchange(
        &self,
        from: &DeviceId,
        to: &DeviceId,
        frame: Vec<u8>,
    ) -> std::result::Result<Vec<u8>, TransportError> {
        if self.endpoint(from).is_none() {
            return Err(TransportError::Failed(format!("sender {} is offline", from)));
        }
        let endpoint = self
            .endpoint(to)
            .ok_or_else(|| TransportError::Unreachable(to.clone()))?;
        Ok(endpoint.handle_frame(&frame))
    }
}
