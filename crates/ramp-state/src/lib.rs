//! ramp-state — embedded object store for the ramp control plane.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and
//! in-memory storage for policies, revisions, configurations, routes,
//! and plan states.
//!
//! # Architecture
//!
//! All domain objects are JSON-serialized into redb's `&[u8]` value
//! columns under `{namespace}/{name}` keys. The `StateStore` is
//! `Clone` + `Send` + `Sync` (backed by `Arc<Database>`) and can be
//! shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use store::StateStore;
