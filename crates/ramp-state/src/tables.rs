//! redb table definitions for the ramp object store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain
//! objects). Keys follow the pattern `{namespace}/{name}`.

use redb::TableDefinition;

/// Rollout policies keyed by `{namespace}/{name}`.
pub const POLICIES: TableDefinition<&str, &[u8]> = TableDefinition::new("policies");

/// Revisions keyed by `{namespace}/{name}`.
pub const REVISIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("revisions");

/// Configurations keyed by `{namespace}/{name}`.
pub const CONFIGURATIONS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("configurations");

/// Routes keyed by `{namespace}/{name}`.
pub const ROUTES: TableDefinition<&str, &[u8]> = TableDefinition::new("routes");

/// Plan states keyed by `{namespace}/{name}`.
pub const PLAN_STATES: TableDefinition<&str, &[u8]> = TableDefinition::new("plan_states");
