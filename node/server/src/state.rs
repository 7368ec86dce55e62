use spotgate_common::{JobRegistry, PriceOracle};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared handles to the registry and oracle. Every mutation goes through
/// the write lock.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RwLock<JobRegistry>>,
    pub oracle: Arc<RwLock<PriceOracle>>,
}

impl AppState {
    pub fn new(registry: JobRegistry, oracle: PriceOracle) -> Self {
        Self {
            registry: Arc::new(RwLock::new(registry)),
            oracle: Arc::new(RwLock::new(oracle)),
        }
    }
}
