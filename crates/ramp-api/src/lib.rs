//! ramp-api — REST surface for the ramp control plane.
//!
//! Object writes are the controller's event source: storing a
//! configuration or revision enqueues the owning configuration for
//! reconciliation. Policies pass admission validation before they are
//! stored.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/policies` | List rollout policies |
//! | POST | `/api/v1/policies` | Create/update a policy (validated) |
//! | GET | `/api/v1/policies/{namespace}/{name}` | Get a policy |
//! | DELETE | `/api/v1/policies/{namespace}/{name}` | Delete a policy |
//! | POST | `/api/v1/configurations` | Create/update a configuration |
//! | GET | `/api/v1/configurations/{namespace}/{name}` | Get a configuration |
//! | GET | `/api/v1/configurations/{namespace}/{name}/revisions` | List owned revisions |
//! | POST | `/api/v1/revisions` | Create a revision |
//! | POST | `/api/v1/routes` | Create/update a route |
//! | GET | `/api/v1/routes/{namespace}/{name}` | Get a route |
//! | GET | `/api/v1/plan-states/{namespace}/{name}` | Get a plan state |

pub mod handlers;

use axum::routing::{get, post};
use axum::Router;

use ramp_scheduler::WorkQueue;
use ramp_state::StateStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
    pub queue: WorkQueue,
}

/// Build the complete API router.
pub fn build_router(store: StateStore, queue: WorkQueue) -> Router {
    let state = ApiState { store, queue };

    let api_routes = Router::new()
        .route(
            "/policies",
            get(handlers::list_policies).post(handlers::create_policy),
        )
        .route(
            "/policies/{namespace}/{name}",
            get(handlers::get_policy).delete(handlers::delete_policy),
        )
        .route("/configurations", post(handlers::create_configuration))
        .route(
            "/configurations/{namespace}/{name}",
            get(handlers::get_configuration),
        )
        .route(
            "/configurations/{namespace}/{name}/revisions",
            get(handlers::list_revisions),
        )
        .route("/revisions", post(handlers::create_revision))
        .route("/routes", post(handlers::create_route))
        .route("/routes/{namespace}/{name}", get(handlers::get_route))
        .route(
            "/plan-states/{namespace}/{name}",
            get(handlers::get_plan_state),
        )
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}
