//! ramp-scheduler — the reconciliation loop for progressive rollouts.
//!
//! # Components
//!
//! - **`workqueue`** — delayed, deduplicating queue of configuration keys
//! - **`reconciler`** — one reconciliation step: gather inputs, plan,
//!   publish, schedule the next wake
//! - **`worker`** — drain loops connecting the queue to the reconciler
//! - **`relay`** — in-process plan writer applying plan states to routes
//!
//! The queue collapses duplicate wakes and keeps one task per
//! configuration in flight, so reconciliations for a configuration are
//! strictly sequential while distinct configurations run in parallel.

pub mod error;
pub mod reconciler;
pub mod relay;
pub mod worker;
pub mod workqueue;

pub use error::{ReconcileError, ReconcileResult};
pub use reconciler::{
    Reconciler, CONTROLLER_NAME, CONTROLLER_NAMESPACE, FollowupFn, WAIT_FOR_READY,
};
pub use relay::PlanRelay;
pub use worker::Scheduler;
pub use workqueue::WorkQueue;
