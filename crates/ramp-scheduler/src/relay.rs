//! Plan relay — the in-process stand-in for the downstream plan writer.
//!
//! The scheduler publishes the authoritative split in each
//! configuration's `PlanState.spec.traffic`. The relay applies it:
//! the route spec is overwritten where it drifted, the route status is
//! echoed from the spec (with the latest-tracking form pinned to the
//! configuration's current ready revision, which is what actually
//! serves), and the plan state status records what was applied. A
//! cross-process writer honoring the same contract can replace this
//! component wholesale.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use ramp_core::{ObjectKey, TrafficTarget};
use ramp_state::{StateResult, StateStore};

/// Applies plan states to routes on a fixed interval.
pub struct PlanRelay {
    store: StateStore,
}

impl PlanRelay {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    /// Apply every plan state whose route has drifted.
    ///
    /// Returns the number of routes written. Routes that don't exist
    /// yet are skipped; the next pass picks them up.
    pub fn sync_once(&self) -> StateResult<usize> {
        let mut applied = 0;
        for ps in self.store.list_plan_states()? {
            if ps.spec.traffic.is_empty() {
                continue;
            }
            let key = ps.key();
            let Some(mut route) = self.store.get_route(&key)? else {
                continue;
            };

            let served = self.materialize(&key, &ps.spec.traffic)?;
            if route.spec.traffic == ps.spec.traffic && route.status.traffic == served {
                continue;
            }
            route.spec.traffic = ps.spec.traffic.clone();
            route.status.traffic = served;
            self.store.put_route(&route)?;
            applied += 1;
            debug!(route = %key, "plan applied to route");

            if ps.status.traffic != ps.spec.traffic {
                let mut ps = ps;
                ps.status.traffic = ps.spec.traffic.clone();
                self.store.put_plan_state(&ps)?;
            }
        }
        Ok(applied)
    }

    /// What the plan actually serves: the latest-tracking form pins to
    /// the configuration's current ready revision once one is known.
    fn materialize(
        &self,
        key: &ObjectKey,
        traffic: &[TrafficTarget],
    ) -> StateResult<Vec<TrafficTarget>> {
        let latest_ready = self
            .store
            .get_configuration(key)?
            .map(|cfg| cfg.latest_ready_revision)
            .unwrap_or_default();
        Ok(traffic
            .iter()
            .map(|target| match target {
                TrafficTarget::Latest { percent, .. } if !latest_ready.is_empty() => {
                    TrafficTarget::Revision {
                        name: latest_ready.clone(),
                        percent: *percent,
                    }
                }
                other => other.clone(),
            })
            .collect())
    }

    /// Run the relay loop.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(interval_ms = interval.as_millis() as u64, "plan relay started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Err(error) = self.sync_once() {
                        warn!(%error, "plan relay pass failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("plan relay shutting down");
                    break;
                }
            }
        }
    }
}
