//! Policy evaluation — pure functions from elapsed time to entitlement.
//!
//! A policy's stages form a piecewise-constant schedule anchored at the
//! revision's creation instant: each stage holds its percent for its own
//! threshold worth of seconds, and once the final boundary has passed
//! the entitlement is 100. The invariant worth keeping in mind: the
//! first listed stage's percent is what a brand-new revision serves,
//! and it holds for that stage's threshold before anything advances.

use ramp_core::PolicySpec;

/// Sentinel for "no further stage boundary exists".
///
/// Matches the widest delay the scheduler will ever be asked to wait
/// (the stable-singleton check is what actually ends a rollout).
pub const NEVER_SECS: i64 = i32::MAX as i64;

/// Traffic percent a revision of the given age is entitled to.
///
/// An empty stage list promotes immediately (100). A revision sitting
/// exactly on a cumulative boundary has crossed it: comparisons are
/// strict, in `f64` seconds, so sub-second ages count.
pub fn entitled_percent(policy: &PolicySpec, elapsed_secs: f64) -> i32 {
    if policy.stages.is_empty() {
        return 100;
    }
    let mut cumulative: i64 = 0;
    for stage in &policy.stages {
        cumulative += i64::from(policy.stage_threshold(stage));
        if cumulative as f64 > elapsed_secs {
            return stage.percent;
        }
    }
    100
}

/// Full seconds to wait before the entitlement changes.
///
/// Strictly greater than the real remainder (and so never 0): a
/// follow-up that fires after this many seconds observes an elapsed
/// time at or past the boundary, which the strict comparison in
/// `entitled_percent` counts as crossed. Waking exactly on the boundary
/// would risk re-reading the old stage and spinning.
///
/// Returns [`NEVER_SECS`] when no boundary remains or no stage exists.
pub fn seconds_until_next_stage(policy: &PolicySpec, elapsed_secs: f64) -> i64 {
    if policy.stages.is_empty() {
        return NEVER_SECS;
    }
    let mut cumulative: i64 = 0;
    for stage in &policy.stages {
        cumulative += i64::from(policy.stage_threshold(stage));
        if cumulative as f64 > elapsed_secs {
            return next_bigger_int(cumulative as f64 - elapsed_secs);
        }
    }
    NEVER_SECS
}

/// The smallest integer strictly bigger than `f` (for positive `f`).
fn next_bigger_int(f: f64) -> i64 {
    f.floor() as i64 + 1
}
