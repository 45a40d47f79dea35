//! REST API handlers.
//!
//! Each handler reads/writes via `StateStore` and returns JSON
//! responses. Writes that affect a rollout enqueue the owning
//! configuration key.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::info;

use ramp_core::{validate_policy, Configuration, ObjectKey, Policy, Revision, Route};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

// ── Policies ───────────────────────────────────────────────────────

/// GET /api/v1/policies
pub async fn list_policies(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_policies() {
        Ok(policies) => ApiResponse::ok(policies).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/policies/{namespace}/{name}
pub async fn get_policy(
    State(state): State<ApiState>,
    Path((namespace, name)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.store.get_policy(&ObjectKey::new(&namespace, &name)) {
        Ok(Some(policy)) => ApiResponse::ok(policy).into_response(),
        Ok(None) => error_response("policy not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// POST /api/v1/policies
///
/// Admission: the policy is validated before it is stored; a malformed
/// policy never reaches the planner.
pub async fn create_policy(
    State(state): State<ApiState>,
    Json(policy): Json<Policy>,
) -> impl IntoResponse {
    if let Err(e) = validate_policy(&policy.spec) {
        return error_response(&e.to_string(), StatusCode::UNPROCESSABLE_ENTITY).into_response();
    }
    match state.store.put_policy(&policy) {
        Ok(()) => (StatusCode::CREATED, ApiResponse::ok(policy)).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// DELETE /api/v1/policies/{namespace}/{name}
pub async fn delete_policy(
    State(state): State<ApiState>,
    Path((namespace, name)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.store.delete_policy(&ObjectKey::new(&namespace, &name)) {
        Ok(true) => ApiResponse::ok("deleted").into_response(),
        Ok(false) => error_response("policy not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

// ── Configurations ─────────────────────────────────────────────────

/// POST /api/v1/configurations
pub async fn create_configuration(
    State(state): State<ApiState>,
    Json(cfg): Json<Configuration>,
) -> impl IntoResponse {
    match state.store.put_configuration(&cfg) {
        Ok(()) => {
            state.queue.enqueue(&cfg.key());
            (StatusCode::CREATED, ApiResponse::ok(cfg)).into_response()
        }
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/configurations/{namespace}/{name}
pub async fn get_configuration(
    State(state): State<ApiState>,
    Path((namespace, name)): Path<(String, String)>,
) -> impl IntoResponse {
    match state
        .store
        .get_configuration(&ObjectKey::new(&namespace, &name))
    {
        Ok(Some(cfg)) => ApiResponse::ok(cfg).into_response(),
        Ok(None) => {
            error_response("configuration not found", StatusCode::NOT_FOUND).into_response()
        }
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/configurations/{namespace}/{name}/revisions
pub async fn list_revisions(
    State(state): State<ApiState>,
    Path((namespace, name)): Path<(String, String)>,
) -> impl IntoResponse {
    match state
        .store
        .list_revisions_for_configuration(&namespace, &name)
    {
        Ok(revisions) => ApiResponse::ok(revisions).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

// ── Revisions ──────────────────────────────────────────────────────

/// POST /api/v1/revisions
pub async fn create_revision(
    State(state): State<ApiState>,
    Json(revision): Json<Revision>,
) -> impl IntoResponse {
    match state.store.put_revision(&revision) {
        Ok(()) => {
            // A revision event wakes its owning configuration.
            let owner = ObjectKey::new(&revision.namespace, &revision.configuration);
            info!(revision = %revision.key(), config = %owner, "revision stored");
            state.queue.enqueue(&owner);
            (StatusCode::CREATED, ApiResponse::ok(revision)).into_response()
        }
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

// ── Routes ─────────────────────────────────────────────────────────

/// POST /api/v1/routes
pub async fn create_route(
    State(state): State<ApiState>,
    Json(route): Json<Route>,
) -> impl IntoResponse {
    match state.store.put_route(&route) {
        Ok(()) => (StatusCode::CREATED, ApiResponse::ok(route)).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/routes/{namespace}/{name}
pub async fn get_route(
    State(state): State<ApiState>,
    Path((namespace, name)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.store.get_route(&ObjectKey::new(&namespace, &name)) {
        Ok(Some(route)) => ApiResponse::ok(route).into_response(),
        Ok(None) => error_response("route not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

// ── Plan states ────────────────────────────────────────────────────

/// GET /api/v1/plan-states/{namespace}/{name}
pub async fn get_plan_state(
    State(state): State<ApiState>,
    Path((namespace, name)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.store.get_plan_state(&ObjectKey::new(&namespace, &name)) {
        Ok(Some(ps)) => ApiResponse::ok(ps).into_response(),
        Ok(None) => error_response("plan state not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}
