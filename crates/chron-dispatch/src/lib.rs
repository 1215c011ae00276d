//! # chron-dispatch
//!
//! Gets captured audits into the store, either inline with the mutation or
//! through a durable queue consumed by a [`Worker`].
//!
//! The actor, remote address and temporal bucket travel in an explicit
//! [`AuditContext`]; nothing here reads process-wide state.

pub mod context;
pub mod dispatcher;
pub mod error;
mod lockfile;
pub mod queue;
pub mod worker;

pub use context::AuditContext;
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{DispatchError, QueueError, WorkerError};
pub use queue::{AuditQueue, Delivery, JsonlQueue, MemoryQueue};
pub use worker::{Worker, WorkerSummary};
