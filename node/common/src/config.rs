use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placement the oracle tracks prices for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    pub instance_type: String,
    pub region: String,
    pub availability_zone: String,
    pub product_description: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            instance_type: "p2.xlarge".to_string(),
            region: "us-east-1".to_string(),
            availability_zone: "us-east-1b".to_string(),
            product_description: "Linux/UNIX".to_string(),
        }
    }
}

/// Oracle fetch tuning
#[derive(Debug, Clone, PartialEq)]
pub struct OracleConfig {
    pub lookback: chrono::Duration,
    pub fetch_timeout: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            lookback: chrono::Duration::days(7),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}
