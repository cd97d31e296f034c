mod clock;
mod config;
mod generator;
#[cfg(test)]
mod log_capture;
mod schema;
mod store;
mod walk;

use crate::clock::{SystemClock, TokioSleeper};
use crate::config::Config;
use crate::generator::Generator;
use crate::store::ElasticStore;
use crate::walk::RandomWalk;
use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn init_tracing() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,random_walk_generator=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing()?;

    tracing::info!(
        host = %config.es_host,
        index = %config.index_name,
        step_stddev = config.step_stddev,
        start_value = config.start_value,
        interval = ?config.sample_interval(),
        seeded = config.seed.is_some(),
        "random-walk-generator starting"
    );

    let rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let walk = RandomWalk::new(config.start_value, config.step_stddev, rng)?;
    let store = ElasticStore::new(&config)?;

    schema::ensure_schema(&store, &TokioSleeper).await;

    let mut generator = Generator::new(
        &store,
        walk,
        SystemClock,
        TokioSleeper,
        config.sample_interval(),
    );
    generator.run().await;

    Ok(())
}
