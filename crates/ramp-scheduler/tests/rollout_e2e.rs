//! End-to-end rollout: a second revision becomes ready, traffic walks
//! from the old revision to the new one along the policy, and the route
//! lands back on the latest-tracking singleton.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Duration as ChronoDuration;
use tokio::sync::watch;

use ramp_core::{
    Configuration, ObjectKey, Policy, PolicyMode, PolicySpec, Revision, Route, Stage,
    SystemClock, TrafficTarget, POLICY_ANNOTATION,
};
use ramp_scheduler::{PlanRelay, Reconciler, Scheduler, WorkQueue};
use ramp_state::StateStore;

const RELAY_INTERVAL: Duration = Duration::from_millis(20);

fn cfg_key() -> ObjectKey {
    ObjectKey::new("default", "svc")
}

fn seed(store: &StateStore) {
    // Two quick stages, one second each: 10% -> 50% -> 100%.
    store
        .put_policy(&Policy {
            namespace: "default".to_string(),
            name: "fast".to_string(),
            spec: PolicySpec {
                mode: PolicyMode::Time,
                default_threshold: 1,
                stages: vec![
                    Stage {
                        percent: 10,
                        threshold: None,
                    },
                    Stage {
                        percent: 50,
                        threshold: None,
                    },
                ],
            },
        })
        .unwrap();

    store
        .put_revision(&Revision {
            namespace: "default".to_string(),
            name: "v1".to_string(),
            configuration: "svc".to_string(),
            created_at: chrono::Utc::now() - ChronoDuration::seconds(1000),
        })
        .unwrap();

    let mut cfg = Configuration {
        namespace: "default".to_string(),
        name: "svc".to_string(),
        latest_ready_revision: "v1".to_string(),
        latest_created_revision: "v1".to_string(),
        annotations: HashMap::new(),
    };
    cfg.annotations
        .insert(POLICY_ANNOTATION.to_string(), "fast".to_string());
    store.put_configuration(&cfg).unwrap();

    store.put_route(&Route::new("default", "svc")).unwrap();
}

async fn wait_for<F>(store: &StateStore, what: &str, mut pred: F)
where
    F: FnMut(&Route) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(route) = store.get_route(&cfg_key()).unwrap() {
            if pred(&route) {
                return;
            }
        }
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn rollout_walks_to_the_new_revision_and_stabilizes() {
    let store = StateStore::open_in_memory().unwrap();
    seed(&store);

    let queue = WorkQueue::new();
    let followup_queue = queue.clone();
    let reconciler = Arc::new(Reconciler::new(
        store.clone(),
        Arc::new(SystemClock),
        Arc::new(move |key: &ObjectKey, delay: Duration| {
            followup_queue.enqueue_after(key, delay);
        }),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = Scheduler::new(queue.clone(), reconciler);
    let scheduler_shutdown = shutdown_rx.clone();
    let scheduler_task = tokio::spawn(async move {
        scheduler.run(2, scheduler_shutdown).await;
    });
    let relay = PlanRelay::new(store.clone());
    let relay_task = tokio::spawn(async move {
        relay.run(RELAY_INTERVAL, shutdown_rx).await;
    });

    // Only v1 exists: the route stabilizes on the latest-tracking form,
    // which the relay pins to v1 in the serving status.
    queue.enqueue(&cfg_key());
    wait_for(&store, "initial stable route", |route| {
        route.spec.traffic == vec![TrafficTarget::latest("svc")]
            && route.status.traffic == vec![TrafficTarget::revision("v1", 100)]
    })
    .await;

    // v2 is built and becomes ready; the platform reports it and pokes us.
    store
        .put_revision(&Revision {
            namespace: "default".to_string(),
            name: "v2".to_string(),
            configuration: "svc".to_string(),
            created_at: chrono::Utc::now(),
        })
        .unwrap();
    let mut cfg = store.get_configuration(&cfg_key()).unwrap().unwrap();
    cfg.latest_created_revision = "v2".to_string();
    cfg.latest_ready_revision = "v2".to_string();
    store.put_configuration(&cfg).unwrap();
    queue.enqueue(&cfg_key());

    // First stage: the newcomer gets its 10%.
    wait_for(&store, "10% canary split", |route| {
        route.spec.traffic
            == vec![
                TrafficTarget::revision("v1", 90),
                TrafficTarget::revision("v2", 10),
            ]
    })
    .await;

    // The timed follow-ups walk the rollout to 50% and then all the way.
    wait_for(&store, "50% split", |route| {
        route.spec.traffic
            == vec![
                TrafficTarget::revision("v1", 50),
                TrafficTarget::revision("v2", 50),
            ]
    })
    .await;
    wait_for(&store, "stable route on v2", |route| {
        route.spec.traffic == vec![TrafficTarget::latest("svc")]
            && route.status.traffic == vec![TrafficTarget::revision("v2", 100)]
    })
    .await;

    // Rollout finished: no further wake recorded.
    let ps = store.get_plan_state(&cfg_key()).unwrap().unwrap();
    assert_eq!(ps.status.next_update_time, None);
    assert_eq!(ps.spec.traffic, vec![TrafficTarget::latest("svc")]);

    let _ = shutdown_tx.send(true);
    let _ = scheduler_task.await;
    let _ = relay_task.await;
}
