mod http;
mod state;
mod trigger;

use anyhow::Result;
use clap::Parser;
use spotgate_common::{
    catalog, Clock, HttpPriceSource, JobRegistry, MarketConfig, OracleConfig, PriceOracle,
    PriceSource, StaticPriceSource, SystemClock,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use state::AppState;
use trigger::Trigger;

#[derive(Parser, Debug)]
#[clap(name = "spotgate")]
#[clap(about = "Spotgate - run jobs only while the spot price stays under their threshold")]
struct Args {
    #[clap(short, long, env = "SPOTGATE_PORT", default_value = "8080")]
    port: u16,

    /// Spot price history endpoint; without it live refreshes return no data
    #[clap(long, env = "SPOTGATE_PRICE_ENDPOINT")]
    price_endpoint: Option<String>,

    #[clap(long, env = "SPOTGATE_INSTANCE_TYPE", default_value = "p2.xlarge")]
    instance_type: String,

    #[clap(long, env = "SPOTGATE_REGION", default_value = "us-east-1")]
    region: String,

    #[clap(long, env = "SPOTGATE_AVAILABILITY_ZONE", default_value = "us-east-1b")]
    availability_zone: String,

    #[clap(long, env = "SPOTGATE_PRODUCT_DESCRIPTION", default_value = "Linux/UNIX")]
    product_description: String,

    #[clap(long, env = "SPOTGATE_REFRESH_SECS", default_value = "60")]
    refresh_secs: u64,

    #[clap(long, env = "SPOTGATE_FETCH_TIMEOUT_SECS", default_value = "10")]
    fetch_timeout_secs: u64,

    #[clap(
        long,
        env = "SPOTGATE_LOOKBACK_DAYS",
        default_value = "7",
        value_parser = clap::value_parser!(i64).range(1..=3650)
    )]
    lookback_days: i64,

    /// Also promote PENDING/HALTED jobs on every tick
    #[clap(long, env = "SPOTGATE_SWEEP_ON_TICK")]
    sweep_on_tick: bool,
}

impl Args {
    fn market(&self) -> MarketConfig {
        MarketConfig {
            instance_type: self.instance_type.clone(),
            region: self.region.clone(),
            availability_zone: self.availability_zone.clone(),
            product_description: self.product_description.clone(),
        }
    }

    fn oracle_config(&self) -> OracleConfig {
        OracleConfig {
            lookback: chrono::Duration::days(self.lookback_days),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting spotgate");
    info!("Market: {} in {} ({})", args.instance_type, args.availability_zone, args.region);

    let market = args.market();
    if !catalog::is_supported(&market.instance_type) {
        warn!("No on-demand price known for {}", market.instance_type);
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let source: Arc<dyn PriceSource> = match &args.price_endpoint {
        Some(endpoint) => {
            let source = HttpPriceSource::new(endpoint.clone());
            info!("Price source: {}", source.endpoint());
            Arc::new(source)
        }
        None => {
            warn!("No price endpoint configured, only override prices will be available");
            Arc::new(StaticPriceSource::default())
        }
    };

    let registry = JobRegistry::new(market.clone(), clock.clone());
    let oracle = PriceOracle::new(market, args.oracle_config(), source, clock);
    let state = AppState::new(registry, oracle);

    let trigger = Trigger::new(
        state.clone(),
        Duration::from_secs(args.refresh_secs.max(1)),
        args.sweep_on_tick,
    );
    tokio::spawn(trigger.run());

    let app = http::routes(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("API server listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
