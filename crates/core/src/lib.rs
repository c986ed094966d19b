//! Core types for distkv
//!
//! This crate defines the data model shared by every layer:
//! - Value / ValueType: the closed typed-value envelope
//! - Entry, ChangeNotification, DeviceId
//! - Options and the enums of the public API
//! - Limits and input validation
//! - Error: the canonical error enum

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod limits;
pub mod options;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use limits::Limits;
pub use options::{
    KvStoreType, Options, SecurityLevel, SubscribeType, SyncMode, UserInfo, UserType,
};
pub use types::{ChangeNotification, DeviceId, Entry, SyncResult};
pub use value::{Value, ValueType};
