//! Admission decisions.
//!
//! Price admission and readiness are independent checks: [`sweep_startable`]
//! only looks at job states and never consults the oracle, while
//! [`AdmissionController`] decides whether the market price currently allows
//! provisioning for a job.

use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::oracle::PriceOracle;
use crate::registry::JobRegistry;
use crate::types::{Job, JobState};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum AdmissionDecision {
    #[serde(rename_all = "camelCase")]
    Admit {
        threshold_price: f64,
        current_price: f64,
    },
    #[serde(rename_all = "camelCase")]
    Reject {
        threshold_price: f64,
        current_price: f64,
    },
}

impl AdmissionDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, AdmissionDecision::Admit { .. })
    }
}

/// Threshold check against the oracle's current price
pub struct AdmissionController<'a> {
    oracle: &'a PriceOracle,
}

impl<'a> AdmissionController<'a> {
    pub fn new(oracle: &'a PriceOracle) -> Self {
        Self { oracle }
    }

    /// Admit only when the threshold is strictly above the current price
    pub fn evaluate(&self, job: &Job) -> Result<AdmissionDecision> {
        let current_price = self.oracle.current()?;
        let threshold_price = job.threshold_price;

        if threshold_price > current_price {
            Ok(AdmissionDecision::Admit {
                threshold_price,
                current_price,
            })
        } else {
            info!(
                "Threshold price for job {} not high enough (must be > {})",
                job.id, current_price
            );
            Ok(AdmissionDecision::Reject {
                threshold_price,
                current_price,
            })
        }
    }

    pub fn is_admissible(&self, job: &Job) -> Result<bool> {
        self.evaluate(job).map(|decision| decision.is_admitted())
    }
}

/// Move every PENDING or HALTED candidate to IN_PROGRESS.
///
/// All candidates are looked up before anything is mutated, so an unknown id
/// leaves the registry untouched. Returns the transitioned jobs in candidate
/// order.
pub fn sweep_startable<S: AsRef<str>>(
    registry: &mut JobRegistry,
    candidates: &[S],
) -> Result<Vec<Job>> {
    for id in candidates {
        registry.get(id.as_ref())?;
    }

    let mut started = Vec::new();
    for id in candidates {
        let id = id.as_ref();
        if !registry.get(id)?.state.is_startable() {
            continue;
        }
        started.push(registry.transition(id, JobState::InProgress)?.clone());
    }

    if !started.is_empty() {
        info!("Swept {} startable jobs to IN_PROGRESS", started.len());
    }
    Ok(started)
}

/// Sweep over every job in the registry
pub fn sweep_all(registry: &mut JobRegistry) -> Result<Vec<Job>> {
    let ids = registry.ids();
    sweep_startable(registry, ids.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{MarketConfig, OracleConfig};
    use crate::error::Error;
    use crate::price_source::StaticPriceSource;
    use crate::types::JobSpec;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn setup() -> (JobRegistry, PriceOracle) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        ));
        let registry = JobRegistry::new(MarketConfig::default(), clock.clone());
        let oracle = PriceOracle::new(
            MarketConfig::default(),
            OracleConfig::default(),
            Arc::new(StaticPriceSource::default()),
            clock,
        );
        (registry, oracle)
    }

    fn create(registry: &mut JobRegistry, id: &str, threshold: f64) -> Job {
        registry
            .create(JobSpec {
                id: Some(id.to_string()),
                command: "train".to_string(),
                threshold_price: threshold,
                description: None,
            })
            .unwrap()
    }

    #[test]
    fn test_no_price_data() {
        let (mut registry, oracle) = setup();
        let job = create(&mut registry, "a", 5.0);

        let result = AdmissionController::new(&oracle).is_admissible(&job);
        assert!(matches!(result, Err(Error::NoPriceData)));
    }

    #[test]
    fn test_strict_threshold() {
        let (mut registry, mut oracle) = setup();
        oracle.add_override(0.50).unwrap();

        let equal = create(&mut registry, "equal", 0.50);
        let above = create(&mut registry, "above", 0.50 + 1e-9);
        let below = create(&mut registry, "below", 0.49);

        let controller = AdmissionController::new(&oracle);
        assert!(!controller.is_admissible(&equal).unwrap());
        assert!(controller.is_admissible(&above).unwrap());
        assert!(!controller.is_admissible(&below).unwrap());
    }

    #[test]
    fn test_decision_carries_prices() {
        let (mut registry, mut oracle) = setup();
        oracle.add_override(4.5).unwrap();
        let job = create(&mut registry, "a", 5.0);

        let decision = AdmissionController::new(&oracle).evaluate(&job).unwrap();
        assert_eq!(
            decision,
            AdmissionDecision::Admit {
                threshold_price: 5.0,
                current_price: 4.5
            }
        );
    }

    #[test]
    fn test_sweep_ignores_price() {
        let (mut registry, _oracle) = setup();
        create(&mut registry, "cheap", 0.01);

        let started = sweep_all(&mut registry).unwrap();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].state, JobState::InProgress);
    }

    #[test]
    fn test_sweep_selects_startable_only() {
        let (mut registry, _) = setup();
        create(&mut registry, "pending", 1.0);
        create(&mut registry, "halted", 1.0);
        create(&mut registry, "done", 1.0);
        registry.transition("halted", JobState::Halted).unwrap();
        registry.transition("done", JobState::Done).unwrap();

        let started = sweep_startable(&mut registry, &["pending", "halted", "done"]).unwrap();
        let ids: Vec<&str> = started.iter().map(|job| job.id.as_str()).collect();
        assert_eq!(ids, vec!["pending", "halted"]);
        assert!(started.iter().all(|job| job.state == JobState::InProgress));

        let done = registry.get("done").unwrap();
        assert_eq!(done.state, JobState::Done);
        assert_eq!(done.state_history.len(), 2);
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let (mut registry, _) = setup();
        create(&mut registry, "a", 1.0);

        assert_eq!(sweep_all(&mut registry).unwrap().len(), 1);
        assert!(sweep_all(&mut registry).unwrap().is_empty());

        registry.transition("a", JobState::Halted).unwrap();
        assert_eq!(sweep_all(&mut registry).unwrap().len(), 1);
    }

    #[test]
    fn test_sweep_unknown_id_mutates_nothing() {
        let (mut registry, _) = setup();
        create(&mut registry, "a", 1.0);

        let result = sweep_startable(&mut registry, &["a", "ghost"]);
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(registry.get("a").unwrap().state, JobState::Pending);
    }
}
