use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{Error, Result};

/// Raw observation as reported by the price source
#[derive(Debug, Clone, PartialEq)]
pub struct SpotPriceObservation {
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub product_description: Option<String>,
}

/// External spot price feed
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_price_observations(
        &self,
        instance_type: &str,
        availability_zone: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<SpotPriceObservation>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SpotPriceHistoryResponse {
    #[serde(default)]
    spot_price_history: Vec<RawSpotPrice>,
}

// Prices arrive as decimal strings
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawSpotPrice {
    spot_price: String,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    product_description: Option<String>,
}

impl TryFrom<RawSpotPrice> for SpotPriceObservation {
    type Error = Error;

    fn try_from(raw: RawSpotPrice) -> Result<Self> {
        let price = raw.spot_price.trim().parse::<f64>().map_err(|_| {
            Error::UpstreamUnavailable(format!("malformed spot price: {:?}", raw.spot_price))
        })?;

        Ok(Self {
            price,
            timestamp: raw.timestamp,
            product_description: raw.product_description,
        })
    }
}

/// HTTP client for a spot price history endpoint
#[derive(Clone)]
pub struct HttpPriceSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPriceSource {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn fetch_price_observations(
        &self,
        instance_type: &str,
        availability_zone: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<SpotPriceObservation>> {
        let start = window_start.to_rfc3339();
        let end = window_end.to_rfc3339();

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("InstanceType", instance_type),
                ("AvailabilityZone", availability_zone),
                ("StartTime", start.as_str()),
                ("EndTime", end.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: SpotPriceHistoryResponse = response.json().await?;

        body.spot_price_history
            .into_iter()
            .map(SpotPriceObservation::try_from)
            .collect()
    }
}

/// In-memory source serving a fixed set of observations
#[derive(Debug, Default)]
pub struct StaticPriceSource {
    observations: Mutex<Vec<SpotPriceObservation>>,
    unavailable: AtomicBool,
    calls: AtomicUsize,
}

impl StaticPriceSource {
    pub fn new(observations: Vec<SpotPriceObservation>) -> Self {
        Self {
            observations: Mutex::new(observations),
            ..Default::default()
        }
    }

    pub fn set_observations(&self, observations: Vec<SpotPriceObservation>) {
        *self.observations.lock().unwrap_or_else(|e| e.into_inner()) = observations;
    }

    /// Make subsequent fetches fail
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    async fn fetch_price_observations(
        &self,
        _instance_type: &str,
        _availability_zone: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<SpotPriceObservation>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::UpstreamUnavailable("static source offline".to_string()));
        }

        let observations = self.observations.lock().unwrap_or_else(|e| e.into_inner());
        Ok(observations
            .iter()
            .filter(|obs| obs.timestamp >= window_start && obs.timestamp <= window_end)
            .cloned()
            .collect())
    }
}
