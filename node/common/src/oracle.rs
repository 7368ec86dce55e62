//! Spot price history for a single market.
//!
//! The oracle keeps two sequences: prices observed from the external source
//! and operator overrides. Overrides switch the oracle into
//! [`PriceMode::Override`], in which live refreshes are suppressed until the
//! overrides are cleared. The combined view is always `observed ++ overrides`
//! and its last element is the current price.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::{MarketConfig, OracleConfig};
use crate::error::{Error, Result};
use crate::price_source::PriceSource;
use crate::types::{PriceMode, PricePoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Overrides are active, nothing was fetched or changed
    Suppressed,
    Updated { observations: usize },
}

/// Everything needed to run one fetch without holding the oracle
#[derive(Clone)]
pub struct FetchPlan {
    source: Arc<dyn PriceSource>,
    instance_type: String,
    availability_zone: String,
    product_description: String,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    timeout: Duration,
    generation: u64,
}

impl FetchPlan {
    pub fn window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.window_start, self.window_end)
    }

    /// Fetch, filter to the configured platform and sort ascending
    pub async fn execute(&self) -> Result<Vec<PricePoint>> {
        let (start, end) = self.window();
        debug!("Fetching spot prices for {} from {} to {}", self.instance_type, start, end);

        let fetch = self.source.fetch_price_observations(
            &self.instance_type,
            &self.availability_zone,
            self.window_start,
            self.window_end,
        );

        let observations = tokio::time::timeout(self.timeout, fetch)
            .await
            .map_err(|_| {
                Error::UpstreamUnavailable(format!("fetch timed out after {:?}", self.timeout))
            })??;

        let mut points: Vec<PricePoint> = observations
            .into_iter()
            .filter(|obs| {
                obs.product_description
                    .as_deref()
                    .map_or(true, |desc| desc == self.product_description)
            })
            .map(|obs| PricePoint {
                price: obs.price,
                timestamp: obs.timestamp,
            })
            .collect();

        points.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(points)
    }
}

pub struct PriceOracle {
    market: MarketConfig,
    config: OracleConfig,
    source: Arc<dyn PriceSource>,
    clock: Arc<dyn Clock>,
    mode: PriceMode,
    observed: Vec<PricePoint>,
    overrides: Vec<PricePoint>,
    // bumped on every override change; stale fetch plans are discarded
    generation: u64,
}

impl PriceOracle {
    pub fn new(
        market: MarketConfig,
        config: OracleConfig,
        source: Arc<dyn PriceSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            market,
            config,
            source,
            clock,
            mode: PriceMode::Live,
            observed: Vec::new(),
            overrides: Vec::new(),
            generation: 0,
        }
    }

    pub fn market(&self) -> &MarketConfig {
        &self.market
    }

    pub fn mode(&self) -> PriceMode {
        self.mode
    }

    /// Fetch parameters for the current window, or `None` while overrides are active.
    ///
    /// Fails with `Validation` when the lookback is not positive or reaches
    /// past the representable time range.
    pub fn plan_refresh(&self) -> Result<Option<FetchPlan>> {
        if self.mode == PriceMode::Override {
            return Ok(None);
        }

        let lookback = self.config.lookback;
        if lookback <= chrono::Duration::zero() {
            return Err(Error::Validation(format!("lookback must be positive, got {}", lookback)));
        }

        let now = self.clock.now();
        let window_start = now
            .checked_sub_signed(lookback)
            .ok_or_else(|| Error::Validation(format!("lookback out of range: {}", lookback)))?;

        Ok(Some(FetchPlan {
            source: self.source.clone(),
            instance_type: self.market.instance_type.clone(),
            availability_zone: self.market.availability_zone.clone(),
            product_description: self.market.product_description.clone(),
            window_start,
            window_end: now,
            timeout: self.config.fetch_timeout,
            generation: self.generation,
        }))
    }

    /// Replace observed prices with a fetch result. Discarded if overrides
    /// are active or were touched at all since `plan` was made.
    pub fn apply_refresh(&mut self, plan: &FetchPlan, points: Vec<PricePoint>) -> RefreshOutcome {
        if self.mode == PriceMode::Override || plan.generation != self.generation {
            debug!("Discarding fetched prices, overrides changed during the fetch");
            return RefreshOutcome::Suppressed;
        }

        let observations = points.len();
        self.observed = points;

        match self.current_point() {
            Some(point) => info!(
                "Fetched spot instance price history. Current price: ${} ({}, {})",
                point.price, self.market.availability_zone, self.market.instance_type
            ),
            None => info!(
                "Fetched empty spot instance price history ({}, {})",
                self.market.availability_zone, self.market.instance_type
            ),
        }

        RefreshOutcome::Updated { observations }
    }

    /// Reload observed prices from the source. On failure the previous
    /// history is kept.
    pub async fn refresh(&mut self) -> Result<RefreshOutcome> {
        let plan = match self.plan_refresh()? {
            Some(plan) => plan,
            None => return Ok(RefreshOutcome::Suppressed),
        };

        let points = plan.execute().await?;
        Ok(self.apply_refresh(&plan, points))
    }

    pub fn current_point(&self) -> Option<PricePoint> {
        self.overrides.last().or_else(|| self.observed.last()).copied()
    }

    pub fn current(&self) -> Result<f64> {
        self.current_point()
            .map(|point| point.price)
            .ok_or(Error::NoPriceData)
    }

    pub fn history(&self) -> Vec<PricePoint> {
        self.observed
            .iter()
            .chain(self.overrides.iter())
            .copied()
            .collect()
    }

    pub fn add_override(&mut self, price: f64) -> Result<PricePoint> {
        if !price.is_finite() || price < 0.0 {
            return Err(Error::Validation(format!("invalid price: {}", price)));
        }

        let point = PricePoint {
            price,
            timestamp: self.clock.now(),
        };
        self.overrides.push(point);
        self.mode = PriceMode::Override;
        self.generation += 1;

        info!("Added override price: ${}", price);
        Ok(point)
    }

    /// Drop all overrides and resume live refreshes. Returns how many were removed.
    pub fn clear_override(&mut self) -> usize {
        let cleared = self.overrides.len();
        self.overrides.clear();
        self.mode = PriceMode::Live;
        self.generation += 1;

        info!("Cleared {} override prices", cleared);
        cleared
    }
}

/// Refresh an oracle shared behind a lock. The fetch runs with no lock held.
pub async fn refresh_shared(oracle: &RwLock<PriceOracle>) -> Result<RefreshOutcome> {
    let plan = match oracle.read().await.plan_refresh()? {
        Some(plan) => plan,
        None => return Ok(RefreshOutcome::Suppressed),
    };

    let points = plan.execute().await?;
    Ok(oracle.write().await.apply_refresh(&plan, points))
}
