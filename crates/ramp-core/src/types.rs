//! Domain objects for the ramp control plane.
//!
//! These types describe the objects the controller reads and writes:
//! rollout policies, the revisions and configurations of a managed
//! service, the route whose traffic split is being driven, and the
//! plan state that hands the computed split to the downstream writer.
//! All types are serializable to/from JSON for storage; timestamps are
//! RFC 3339 on the wire.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Annotation key on a `Configuration` that opts it into managed rollouts.
///
/// The value is `NAME` or `NAMESPACE/NAME`. The first `/` is the
/// delimiter; everything after it is the policy name verbatim, so `/`
/// must not appear inside a policy namespace.
pub const POLICY_ANNOTATION: &str = "delivery.ramp.dev/policy";

/// Condition type surfaced on a `PlanState` when the downstream writer
/// cannot apply the plan to the route.
pub const CONDITION_ROUTE_CONFIGURED: &str = "RouteConfigured";

// ── Identity ──────────────────────────────────────────────────────

/// Namespace/name identity of a control-plane object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Composite store key, `{namespace}/{name}`.
    pub fn table_key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// ── Policy ────────────────────────────────────────────────────────

/// Progress metric a policy advances on.
///
/// Only `Time` is consumed today; `Request` and `Error` are reserved
/// tags that admission rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    Time,
    Request,
    Error,
}

impl fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PolicyMode::Time => "time",
            PolicyMode::Request => "request",
            PolicyMode::Error => "error",
        };
        f.write_str(s)
    }
}

/// One step of a progressive rollout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Traffic percent the new revision is entitled to while in this
    /// stage. Must be in `[1, 99]`; the terminal 100% stage is implicit
    /// and never listed.
    pub percent: i32,
    /// Metric value that must accrue in this stage before advancing to
    /// the next one. Falls back to the policy's default threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<i32>,
}

/// Declarative description of how a rollout progresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySpec {
    pub mode: PolicyMode,
    /// Threshold used by stages that do not declare their own.
    /// Interpreted per `mode`: seconds when the mode is `time`.
    pub default_threshold: i32,
    #[serde(default)]
    pub stages: Vec<Stage>,
}

impl PolicySpec {
    /// Effective threshold of a stage.
    pub fn stage_threshold(&self, stage: &Stage) -> i32 {
        stage.threshold.unwrap_or(self.default_threshold)
    }
}

/// A named, namespaced rollout policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub namespace: String,
    pub name: String,
    pub spec: PolicySpec,
}

impl Policy {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    pub fn table_key(&self) -> String {
        self.key().table_key()
    }
}

// ── Revision ──────────────────────────────────────────────────────

/// An immutable built version of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub namespace: String,
    pub name: String,
    /// Name of the owning configuration.
    pub configuration: String,
    /// Instant the revision was created and became eligible for traffic.
    /// Creation order is the source of truth for oldest/newest.
    pub created_at: DateTime<Utc>,
}

impl Revision {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    pub fn table_key(&self) -> String {
        self.key().table_key()
    }
}

// ── Configuration ─────────────────────────────────────────────────

/// The logical service owning a sequence of revisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub namespace: String,
    pub name: String,
    /// Newest revision that has passed readiness, empty if none.
    #[serde(default)]
    pub latest_ready_revision: String,
    /// Newest revision that exists, ready or not, empty if none.
    #[serde(default)]
    pub latest_created_revision: String,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

impl Configuration {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    pub fn table_key(&self) -> String {
        self.key().table_key()
    }

    /// The latest created revision exists and has become ready.
    pub fn ready(&self) -> bool {
        !self.latest_ready_revision.is_empty()
            && self.latest_ready_revision == self.latest_created_revision
    }

    /// The rollout-policy annotation value, if the configuration opted in.
    pub fn policy_ref(&self) -> Option<&str> {
        self.annotations.get(POLICY_ANNOTATION).map(String::as_str)
    }
}

// ── Traffic ───────────────────────────────────────────────────────

/// One entry in a route plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum TrafficTarget {
    /// A pinned share for one named revision.
    Revision { name: String, percent: i32 },
    /// Track whichever revision of the configuration is newest.
    /// A plan that collapses to a single entry always uses this form.
    Latest { configuration: String, percent: i32 },
}

impl TrafficTarget {
    pub fn revision(name: &str, percent: i32) -> Self {
        TrafficTarget::Revision {
            name: name.to_string(),
            percent,
        }
    }

    pub fn latest(configuration: &str) -> Self {
        TrafficTarget::Latest {
            configuration: configuration.to_string(),
            percent: 100,
        }
    }

    pub fn percent(&self) -> i32 {
        match self {
            TrafficTarget::Revision { percent, .. } => *percent,
            TrafficTarget::Latest { percent, .. } => *percent,
        }
    }

    /// Revision name for pinned entries, `None` for the latest form.
    pub fn revision_name(&self) -> Option<&str> {
        match self {
            TrafficTarget::Revision { name, .. } => Some(name),
            TrafficTarget::Latest { .. } => None,
        }
    }

    pub fn is_latest(&self) -> bool {
        matches!(self, TrafficTarget::Latest { .. })
    }
}

// ── Route ─────────────────────────────────────────────────────────

/// Desired traffic split, written by the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSpec {
    #[serde(default)]
    pub traffic: Vec<TrafficTarget>,
}

/// Split currently being served, echoed by the plan writer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStatus {
    #[serde(default)]
    pub traffic: Vec<TrafficTarget>,
}

/// The object whose `spec.traffic` the controller drives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub spec: RouteSpec,
    #[serde(default)]
    pub status: RouteStatus,
}

impl Route {
    /// An empty route shell for a configuration.
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            spec: RouteSpec::default(),
            status: RouteStatus::default(),
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    pub fn table_key(&self) -> String {
        self.key().table_key()
    }
}

// ── PlanState ─────────────────────────────────────────────────────

/// A status condition on a plan state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Authoritative plan, set by the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStateSpec {
    #[serde(default)]
    pub traffic: Vec<TrafficTarget>,
}

/// Observed side of a plan state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStateStatus {
    /// Whatever the downstream writer has applied.
    #[serde(default)]
    pub traffic: Vec<TrafficTarget>,
    /// Next instant the plan needs recomputing. Owned by the scheduler;
    /// cleared once a rollout stabilizes. Survives controller restarts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_update_time: Option<DateTime<Utc>>,
    // TODO: set CONDITION_ROUTE_CONFIGURED to false here when the plan
    // writer fails to apply spec.traffic to the route.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// Per-configuration handoff object carrying the most recently computed
/// plan to the downstream plan writer. Created on first touch of a
/// configuration, mutated by the scheduler thereafter, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanState {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub spec: PlanStateSpec,
    #[serde(default)]
    pub status: PlanStateStatus,
}

impl PlanState {
    /// Empty plan state for a configuration.
    pub fn for_configuration(cfg: &Configuration) -> Self {
        Self {
            namespace: cfg.namespace.clone(),
            name: cfg.name.clone(),
            spec: PlanStateSpec::default(),
            status: PlanStateStatus::default(),
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    pub fn table_key(&self) -> String {
        self.key().table_key()
    }
}
