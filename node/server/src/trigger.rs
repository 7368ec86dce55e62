use spotgate_common::{refresh_shared, sweep_all, RefreshOutcome};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::state::AppState;

const TASK_NAME: &str = "Load Spot Price History";

/// What a single tick did
#[derive(Debug, Default, PartialEq)]
pub struct TickReport {
    pub refresh: Option<RefreshOutcome>,
    pub swept: usize,
}

/// Periodic price refresh (and optional readiness sweep)
pub struct Trigger {
    state: AppState,
    interval: Duration,
    sweep_on_tick: bool,
}

impl Trigger {
    pub fn new(state: AppState, interval: Duration, sweep_on_tick: bool) -> Self {
        Self {
            state,
            interval,
            sweep_on_tick,
        }
    }

    /// Tick forever. The first tick fires immediately.
    pub async fn run(self) {
        info!("Initializing scheduled tasks...");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    /// Failures are logged and left for the next tick
    pub async fn tick(&self) -> TickReport {
        info!("Executing task: {} (every {}s)", TASK_NAME, self.interval.as_secs());
        let mut report = TickReport::default();

        match refresh_shared(&self.state.oracle).await {
            Ok(outcome) => {
                if outcome == RefreshOutcome::Suppressed {
                    debug!("Override prices active, skipping live refresh");
                }
                report.refresh = Some(outcome);
            }
            Err(e) if e.is_retryable() => warn!("Price refresh failed, retrying next tick: {}", e),
            Err(e) => error!("Price refresh failed: {}", e),
        }

        if self.sweep_on_tick {
            let mut registry = self.state.registry.write().await;
            match sweep_all(&mut registry) {
                Ok(started) => report.swept = started.len(),
                Err(e) => warn!("Sweep failed: {}", e),
            }
        }

        report
    }
}
