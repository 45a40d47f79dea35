//! Scheduler error types.

use thiserror::Error;

use ramp_core::ObjectKey;

/// Result type alias for reconciliation operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Errors that can occur during a reconciliation step.
///
/// Every variant is returned to the work queue, which backs off and
/// retries; missing objects are expected to self-heal as the rest of
/// the system converges.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("configuration not found: {0}")]
    ConfigurationNotFound(ObjectKey),

    #[error("route not found: {0}")]
    RouteNotFound(ObjectKey),

    #[error("policy not found: {0}")]
    PolicyNotFound(ObjectKey),

    #[error("plan error: {0}")]
    Plan(#[from] ramp_rollout::PlanError),

    #[error("state store error: {0}")]
    State(#[from] ramp_state::StateError),
}
