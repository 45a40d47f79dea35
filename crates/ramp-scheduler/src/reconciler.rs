//! The reconciliation step for one configuration.
//!
//! Triggered with a configuration key whenever the configuration or one
//! of its revisions changes, and on timed follow-ups. Each step derives
//! everything fresh from the store, computes the desired split, writes
//! the plan state and then the route, and schedules its own next wake.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use ramp_core::{Clock, Configuration, ObjectKey, PlanState, PolicySpec, Revision, Route};
use ramp_rollout::{plan_traffic, seconds_until_next_event};
use ramp_state::StateStore;

use crate::error::{ReconcileError, ReconcileResult};

/// Namespace the controller's own deployment lives in.
pub const CONTROLLER_NAMESPACE: &str = "ramp-system";
/// Configuration name of the controller's own deployment.
pub const CONTROLLER_NAME: &str = "ramp-delivery";

/// Poll interval while the latest created revision is not ready yet.
/// The revision event also retriggers us; whichever fires first wins.
pub const WAIT_FOR_READY: Duration = Duration::from_secs(5);

/// Capability to schedule re-delivery of a configuration key.
pub type FollowupFn = Arc<dyn Fn(&ObjectKey, Duration) + Send + Sync>;

/// Drives rollouts for all configurations, one step at a time.
pub struct Reconciler {
    store: StateStore,
    clock: Arc<dyn Clock>,
    followup: FollowupFn,
}

impl Reconciler {
    pub fn new(store: StateStore, clock: Arc<dyn Clock>, followup: FollowupFn) -> Self {
        Self {
            store,
            clock,
            followup,
        }
    }

    /// Run one reconciliation step for the given configuration.
    pub async fn reconcile(&self, key: &ObjectKey) -> ReconcileResult<()> {
        // Changes to the controller's own deployment must not feed back
        // into the rollout loop.
        if should_skip(key) {
            return Ok(());
        }

        let Some(cfg) = self.store.get_configuration(key)? else {
            return Err(ReconcileError::ConfigurationNotFound(key.clone()));
        };

        // Bounded poll until the latest created revision is ready.
        if !cfg.ready() {
            debug!(config = %key, "latest created revision not ready, polling");
            (self.followup)(key, WAIT_FOR_READY);
            return Ok(());
        }

        // Rollouts are opt-in per configuration.
        let Some(policy_ref) = cfg.policy_ref() else {
            info!(config = %key, "no rollout policy specified, skipping");
            return Ok(());
        };

        let policy_key = identify_policy(&cfg, policy_ref);
        let Some(policy) = self.store.get_policy(&policy_key)? else {
            return Err(ReconcileError::PolicyNotFound(policy_key));
        };

        // A wake-up recorded before a controller restart must stay on
        // the queue even if this delivery turns out to be spurious.
        let mut plan_state = self.fetch_plan_state(&cfg)?;
        if let Some(next_update) = plan_state.status.next_update_time {
            if next_update > self.clock.now() {
                let wait = (next_update - self.clock.now())
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                (self.followup)(key, wait);
            }
        }

        self.update_route(&cfg, &policy.spec, &mut plan_state)
    }

    /// Load the plan state for a configuration, creating it on first touch.
    fn fetch_plan_state(&self, cfg: &Configuration) -> ReconcileResult<PlanState> {
        if let Some(ps) = self.store.get_plan_state(&cfg.key())? {
            return Ok(ps);
        }
        let ps = PlanState::for_configuration(cfg);
        self.store.put_plan_state(&ps)?;
        Ok(ps)
    }

    /// All revisions owned by the configuration, keyed by name.
    fn fetch_revisions(
        &self,
        cfg: &Configuration,
    ) -> ReconcileResult<HashMap<String, Revision>> {
        let revisions = self
            .store
            .list_revisions_for_configuration(&cfg.namespace, &cfg.name)?;
        Ok(revisions
            .into_iter()
            .map(|rev| (rev.name.clone(), rev))
            .collect())
    }

    /// Compute the new split and publish it.
    fn update_route(
        &self,
        cfg: &Configuration,
        policy: &PolicySpec,
        plan_state: &mut PlanState,
    ) -> ReconcileResult<()> {
        let key = cfg.key();
        let Some(mut route) = self.store.get_route(&key)? else {
            // Typically a namespace/name mismatch between the
            // configuration and its route.
            return Err(ReconcileError::RouteNotFound(key));
        };

        let revisions = self.fetch_revisions(cfg)?;
        let traffic = plan_traffic(
            &route,
            &revisions,
            &cfg.latest_ready_revision,
            policy,
            self.clock.as_ref(),
        )?;
        route.spec.traffic = traffic.clone();
        plan_state.spec.traffic = traffic;

        self.apply_changes(cfg, &route, plan_state, &revisions, policy)
    }

    /// Schedule future work, then publish: plan state first, route
    /// second, so an observer of the route can always find the
    /// authoritative plan source.
    fn apply_changes(
        &self,
        cfg: &Configuration,
        route: &Route,
        plan_state: &mut PlanState,
        revisions: &HashMap<String, Revision>,
        policy: &PolicySpec,
    ) -> ReconcileResult<()> {
        let key = cfg.key();

        let stabilized = route.spec.traffic.first().is_some_and(|t| t.is_latest());
        if stabilized {
            info!(config = %key, "routing state has stabilized");
            plan_state.status.next_update_time = None;
        } else {
            let delay_secs =
                seconds_until_next_event(&route.spec.traffic, revisions, policy, self.clock.as_ref())?;
            if delay_secs != 0 {
                debug!(config = %key, delay_secs, "enqueueing follow-up");
                (self.followup)(&key, Duration::from_secs(delay_secs as u64));
            }
            plan_state.status.next_update_time =
                Some(self.clock.now() + chrono::Duration::seconds(delay_secs));
        }

        self.store.put_plan_state(plan_state)?;
        self.store.put_route(route)?;
        Ok(())
    }
}

/// The controller's own configuration key is never reconciled.
fn should_skip(key: &ObjectKey) -> bool {
    key.namespace == CONTROLLER_NAMESPACE && key.name == CONTROLLER_NAME
}

/// Split a policy reference into the policy's namespace and name.
///
/// The first `/` is the delimiter; everything after it is the name
/// verbatim. Without a delimiter, the configuration's own namespace is
/// used.
fn identify_policy(cfg: &Configuration, policy_ref: &str) -> ObjectKey {
    match policy_ref.split_once('/') {
        Some((namespace, name)) => ObjectKey::new(namespace, name),
        None => ObjectKey::new(&cfg.namespace, policy_ref),
    }
}
