//! Traffic planning — assign shares to the live revisions of a route.
//!
//! The planner walks the revision pool newest to oldest, granting each
//! revision its policy entitlement under a running 100% cap. The
//! globally oldest revision is the traffic sink: it absorbs whatever
//! remains and never progresses on its own clock. Once younger
//! revisions saturate the cap, anything older falls out of the plan
//! entirely and never comes back.

use std::collections::HashMap;

use thiserror::Error;

use ramp_core::{Clock, PolicySpec, Revision, Route, TrafficTarget};

use crate::evaluator::{entitled_percent, seconds_until_next_stage, NEVER_SECS};

/// Result type alias for planner operations.
pub type PlanResult<T> = Result<T, PlanError>;

/// Errors that can occur while computing a plan.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("revision {0} not found")]
    MissingRevision(String),
}

/// Compute the desired traffic split for a route.
///
/// `route.status.traffic` is the pre-image of what is serving now; its
/// entries are non-zero and ordered oldest to newest, both upheld by
/// every plan this function emits. `newest_ready` joins the pool if it
/// is not serving yet. The emitted percents sum to exactly 100.
pub fn plan_traffic(
    route: &Route,
    revisions: &HashMap<String, Revision>,
    newest_ready: &str,
    policy: &PolicySpec,
    clock: &dyn Clock,
) -> PlanResult<Vec<TrafficTarget>> {
    // Ordered roster of the pool, oldest to newest.
    let mut roster: Vec<&str> = route
        .status
        .traffic
        .iter()
        .filter_map(TrafficTarget::revision_name)
        .collect();
    if !roster.contains(&newest_ready) {
        roster.push(newest_ready);
    }

    // A pool of one can only be the newest revision. Emit the
    // latest-tracking form so a change of revision identity alone never
    // requires another update.
    if roster.len() == 1 {
        let newest = revisions
            .get(newest_ready)
            .ok_or_else(|| PlanError::MissingRevision(newest_ready.to_string()))?;
        return Ok(vec![TrafficTarget::latest(&newest.configuration)]);
    }

    let oldest = oldest_revision(revisions).map(|r| r.name.as_str());
    let mut assigned = 0;
    let mut targets = Vec::with_capacity(roster.len());

    for name in roster.iter().rev() {
        let revision = revisions
            .get(*name)
            .ok_or_else(|| PlanError::MissingRevision((*name).to_string()))?;
        if Some(revision.name.as_str()) == oldest {
            // The sink takes the remainder; nothing older than it exists.
            targets.push(TrafficTarget::revision(name, 100 - assigned));
            break;
        }
        let elapsed = clock.since_secs(revision.created_at);
        let want = entitled_percent(policy, elapsed);
        let got = want.min(100 - assigned);
        assigned += got;
        targets.push(TrafficTarget::revision(name, got));
        if assigned >= 100 {
            // Saturated: every older revision is squeezed out.
            break;
        }
    }

    // The walk produced newest first.
    targets.reverse();

    // A split that progressed down to a single survivor collapses to
    // the latest-tracking form.
    if targets.len() == 1 {
        targets[0] = TrafficTarget::latest(&route.name);
    }

    Ok(targets)
}

/// Seconds until any planned revision's entitlement changes.
///
/// The globally oldest revision is skipped: as the sink it has no
/// progression clock of its own. Latest-form entries carry no revision
/// age and are skipped too. Returns [`NEVER_SECS`] when nothing in the
/// plan will advance.
pub fn seconds_until_next_event(
    traffic: &[TrafficTarget],
    revisions: &HashMap<String, Revision>,
    policy: &PolicySpec,
    clock: &dyn Clock,
) -> PlanResult<i64> {
    let oldest = oldest_revision(revisions).map(|r| r.name.as_str());
    let mut result = NEVER_SECS;
    for target in traffic {
        let Some(name) = target.revision_name() else {
            continue;
        };
        let revision = revisions
            .get(name)
            .ok_or_else(|| PlanError::MissingRevision(name.to_string()))?;
        if Some(revision.name.as_str()) == oldest {
            continue;
        }
        let elapsed = clock.since_secs(revision.created_at);
        result = result.min(seconds_until_next_stage(policy, elapsed));
    }
    Ok(result)
}

/// The revision with the earliest creation time, if any.
///
/// Ties break on the name so the sink is stable across calls.
pub fn oldest_revision(revisions: &HashMap<String, Revision>) -> Option<&Revision> {
    revisions
        .values()
        .min_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)))
}
