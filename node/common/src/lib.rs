pub mod admission;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod oracle;
pub mod price_source;
pub mod registry;
pub mod types;

pub use admission::{sweep_all, sweep_startable, AdmissionController, AdmissionDecision};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{MarketConfig, OracleConfig};
pub use error::{Error, Result};
pub use oracle::{refresh_shared, PriceOracle, RefreshOutcome};
pub use price_source::{HttpPriceSource, PriceSource, SpotPriceObservation, StaticPriceSource};
pub use registry::JobRegistry;
pub use types::*;

/// Snapshot of the registry and oracle for operators
pub fn snapshot(registry: &JobRegistry, oracle: &PriceOracle) -> StateSnapshot {
    StateSnapshot {
        jobs: registry.jobs().to_vec(),
        spot_price_history: oracle.history(),
        price_mode: oracle.mode(),
        on_demand_price: catalog::on_demand_price(&oracle.market().instance_type),
    }
}
