use chrono::{Duration, TimeZone, Utc};
use spotgate_common::{
    refresh_shared, snapshot, sweep_startable, AdmissionController, Clock, Error, JobRegistry, JobSpec,
    JobState, ManualClock, MarketConfig, OracleConfig, PriceMode, PriceOracle,
    SpotPriceObservation, StaticPriceSource,
};
use std::sync::Arc;
use tokio::sync::RwLock;

struct Harness {
    clock: Arc<ManualClock>,
    source: Arc<StaticPriceSource>,
    registry: JobRegistry,
    oracle: PriceOracle,
}

fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 7, 15, 8, 0, 0).unwrap(),
    ));
    let source = Arc::new(StaticPriceSource::default());
    let registry = JobRegistry::new(MarketConfig::default(), clock.clone());
    let oracle = PriceOracle::new(
        MarketConfig::default(),
        OracleConfig::default(),
        source.clone(),
        clock.clone(),
    );

    Harness {
        clock,
        source,
        registry,
        oracle,
    }
}

fn job_spec(id: &str, threshold: f64) -> JobSpec {
    JobSpec {
        id: Some(id.to_string()),
        command: "python train.py --epochs 10".to_string(),
        threshold_price: threshold,
        description: None,
    }
}

fn live_observation(h: &Harness, price: f64, minutes_ago: i64) -> SpotPriceObservation {
    SpotPriceObservation {
        price,
        timestamp: h.clock.now() - Duration::minutes(minutes_ago),
        product_description: Some("Linux/UNIX".to_string()),
    }
}

#[test]
fn test_threshold_scenario() {
    let mut h = harness();
    let job = h.registry.create(job_spec("A", 5.00)).unwrap();

    {
        let controller = AdmissionController::new(&h.oracle);
        assert!(matches!(controller.is_admissible(&job), Err(Error::NoPriceData)));
    }

    h.oracle.add_override(4.50).unwrap();
    assert!(AdmissionController::new(&h.oracle).is_admissible(&job).unwrap());

    h.oracle.add_override(5.00).unwrap();
    assert!(!AdmissionController::new(&h.oracle).is_admissible(&job).unwrap());
}

#[test]
fn test_running_job_not_swept() {
    let mut h = harness();
    h.registry.create(job_spec("B", 1.0)).unwrap();
    h.registry.transition("B", JobState::InProgress).unwrap();

    let started = sweep_startable(&mut h.registry, &["B"]).unwrap();
    assert!(started.is_empty());
    assert_eq!(h.registry.get("B").unwrap().state_history.len(), 2);
}

#[test]
fn test_sweep_mixed_states() {
    let mut h = harness();
    for id in ["pending", "halted", "done"] {
        h.registry.create(job_spec(id, 1.0)).unwrap();
    }
    h.registry.transition("halted", JobState::InProgress).unwrap();
    h.registry.transition("halted", JobState::Halted).unwrap();
    h.registry.transition("done", JobState::Done).unwrap();

    let started = sweep_startable(&mut h.registry, &["pending", "halted", "done"]).unwrap();

    let ids: Vec<&str> = started.iter().map(|job| job.id.as_str()).collect();
    assert_eq!(ids, vec!["pending", "halted"]);
    for id in ["pending", "halted"] {
        assert_eq!(h.registry.get(id).unwrap().state, JobState::InProgress);
    }
    assert_eq!(h.registry.get("done").unwrap().state, JobState::Done);
}

#[test]
fn test_history_invariant_across_operations() {
    let mut h = harness();
    h.registry.create(job_spec("x", 1.0)).unwrap();
    h.registry.create(job_spec("y", 1.0)).unwrap();

    let steps = [
        ("x", JobState::InProgress),
        ("y", JobState::Canceled),
        ("x", JobState::Halted),
        ("x", JobState::InProgress),
        ("x", JobState::Done),
    ];
    for (step, (id, state)) in steps.iter().enumerate() {
        // jitter the clock both ways
        let offset = if step % 2 == 0 { 5 } else { -3 };
        h.clock.advance(Duration::seconds(offset));
        h.registry.transition(id, *state).unwrap();

        for job in h.registry.jobs() {
            assert!(!job.state_history.is_empty());
            assert_eq!(job.state_history.last().unwrap().state, job.state);
            assert!(job
                .state_history
                .windows(2)
                .all(|w| w[0].timestamp <= w[1].timestamp));
        }
    }
}

#[tokio::test]
async fn test_override_preempts_live_then_clear_restores() {
    let mut h = harness();
    h.source
        .set_observations(vec![live_observation(&h, 0.27, 30), live_observation(&h, 0.29, 10)]);

    h.oracle.refresh().await.unwrap();
    assert_eq!(h.oracle.current().unwrap(), 0.29);

    h.oracle.add_override(0.80).unwrap();
    let frozen = h.oracle.history();

    h.source.set_observations(vec![live_observation(&h, 0.31, 1)]);
    for _ in 0..5 {
        h.oracle.refresh().await.unwrap();
        assert_eq!(h.oracle.history(), frozen);
    }

    h.oracle.clear_override();
    h.oracle.refresh().await.unwrap();

    let prices: Vec<f64> = h.oracle.history().iter().map(|p| p.price).collect();
    assert_eq!(prices, vec![0.31]);
    assert_eq!(h.oracle.mode(), PriceMode::Live);
}

#[tokio::test]
async fn test_shared_oracle_keeps_stale_data_on_failure() {
    let h = harness();
    h.source.set_observations(vec![live_observation(&h, 0.27, 5)]);
    let source = h.source.clone();
    let oracle = RwLock::new(h.oracle);

    refresh_shared(&oracle).await.unwrap();
    source.set_unavailable(true);

    let err = refresh_shared(&oracle).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(oracle.read().await.current().unwrap(), 0.27);
}

#[test]
fn test_snapshot_reports_everything() {
    let mut h = harness();
    h.registry.create(job_spec("snap", 2.0)).unwrap();
    h.oracle.add_override(0.4).unwrap();

    let snap = snapshot(&h.registry, &h.oracle);
    assert_eq!(snap.jobs.len(), 1);
    assert_eq!(snap.spot_price_history.len(), 1);
    assert_eq!(snap.price_mode, PriceMode::Override);
    assert_eq!(snap.on_demand_price, Some(0.90));

    let json = serde_json::to_value(&snap).unwrap();
    assert!(json.get("spotPriceHistory").is_some());
    assert!(json.get("onDemandPrice").is_some());
}
