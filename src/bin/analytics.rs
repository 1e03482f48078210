use anyhow::{Context, Result};
use blsquest::{
    analytics::{self, QueueEvent},
    config::AnalyticsArgs,
    store::FsStore,
};
use clap::Parser;
use std::fs;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_target(false)
        .init();

    let args = AnalyticsArgs::parse();

    let event = match &args.event {
        Some(path) => {
            let raw = fs::read(path).with_context(|| format!("reading event {}", path.display()))?;
            serde_json::from_slice::<QueueEvent>(&raw)
                .with_context(|| format!("parsing event {}", path.display()))?
        }
        None => QueueEvent::default(),
    };
    info!(records = event.records.len(), "Analytics triggered");

    let store = FsStore::new(&args.store_root)?;
    analytics::run(&store, &args.bucket, &args.bls_key, &args.population_key)?;

    info!("Analytics completed successfully");
    println!("{}", serde_json::json!({ "ok": true }));
    Ok(())
}
