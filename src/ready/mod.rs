//! Readiness coordination
//!
//! [`Ready`] is a counting barrier over dynamically registered tasks;
//! [`ReadySignal`] is the one-shot notification it (and the lifecycle)
//! settles when done.
//!
//! ```rust,ignore
//! let ready = Ready::new(ReadyOptions::default());
//! let done = ready.register("redis");
//! tokio::spawn(async move {
//!     connect().await;
//!     done.done();
//! });
//! ready.wait().await?;
//! ```

mod barrier;
mod signal;

pub use barrier::{Ready, ReadyOptions, TaskDone, TaskId, TaskOptions};
pub use signal::ReadySignal;
