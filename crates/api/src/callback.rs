//! Callback adapter
//!
//! Every API operation is an async fn. [`invoke`] runs one on the current
//! tokio runtime and hands its result to a callback, giving the
//! callback-style form of the same operation.
//!
//! ```ignore
//! let s = store.clone();
//! callback::invoke(async move { s.get("k").await }, |result| match result {
//!     Ok(value) => println!("{:?}", value),
//!     Err(e) => eprintln!("{}", e),
//! });
//! ```

use distkv_core::Result;
use std::future::Future;
use tokio::task::JoinHandle;

/// Completion callback receiving the operation's result
pub type Callback<T> = Box<dyn FnOnce(Result<T>) + Send + 'static>;

/// Run `operation` and pass its result to `callback`
pub fn invoke<T, F, C>(operation: F, callback: C) -> JoinHandle<()>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
    C: FnOnce(Result<T>) + Send + 'static,
{
    tokio::spawn(async move {
        callback(operation.await);
    })
}

/// Like [`invoke`] with a boxed callback
pub fn invoke_boxed<T, F>(operation: F, callback: Callback<T>) -> JoinHandle<()>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    invoke(operation, callback)
}
