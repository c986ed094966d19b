//! Loosely typed invocation layer for distkv
//!
//! Callers that hold JSON rather than Rust types (scenario scripts, the
//! `distkv` binary, foreign bindings) drive the engine through this crate:
//!
//! - [`Invocation`]: target, method name and JSON arguments
//! - [`Command`]: a validated invocation; arity, `null` and type errors are
//!   reported here as InvalidArgument
//! - [`Session`]: store and result set aliases over one manager
//! - [`run_script`]: JSON-lines scripts with optional expectations
//!
//! # Example
//!
//! ```no_run
//! use distkv_engine::{KvManager, KvManagerConfig};
//! use distkv_executor::{Invocation, Session};
//! use serde_json::json;
//!
//! # async fn demo() -> distkv_core::Result<()> {
//! let mut session = Session::new(KvManager::new(KvManagerConfig::new("com.example.app"))?);
//! session
//!     .invoke(&Invocation::new("manager", "getKVStore", vec![json!("s")]).bind("s"))
//!     .await?;
//! session.invoke(&Invocation::new("s", "put", vec![json!("k"), json!("v")])).await?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

mod args;
pub mod command;
pub mod handlers;
pub mod output;
pub mod script;
pub mod session;

#[cfg(test)]
mod tests;

pub use command::{parse_options, parse_query, Command, CursorOp, EventKind, Invocation, Selector};
pub use output::Output;
pub use script::{parse_script, run_script, Expectation, ScriptReport, Step, StepOutcome};
pub use session::Session;
