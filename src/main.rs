use anyhow::Result;
use blsquest::{
    config::IngestArgs,
    fetch::{self, RetryPolicy, Session},
    store::FsStore,
    sync::{self, SyncTarget},
};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("Starting ingest");

    // ─── 2) configuration + shared session ───────────────────────────
    let args = IngestArgs::parse();
    info!(bucket = %args.bucket, store = %args.store_root.display(), "Configuration");
    let session = Session::new(&args.user_agent)?;
    let store = FsStore::new(&args.store_root)?;

    // ─── 3) mirror BLS files ─────────────────────────────────────────
    info!(base = %args.bls_base, "Syncing BLS time-series data");
    let target = SyncTarget {
        index_url: args.index_url(),
        base_url: &args.bls_base,
        bucket: &args.bucket,
        prefix: &args.bls_prefix,
    };
    let report = sync::sync(&session, &store, &target, &RetryPolicy::default())?;
    info!(
        uploaded = report.uploaded.len(),
        unchanged = report.unchanged.len(),
        "Finished BLS sync"
    );

    // ─── 4) population ───────────────────────────────────────────────
    let rows = fetch::fetch_population_all_years(&session, &args.population_url)?;
    if rows.is_empty() {
        warn!("No population rows fetched from API; leaving stored copy untouched");
    } else {
        fetch::save_population(&store, &args.bucket, &args.population_key, &rows)?;
        info!(rows = rows.len(), key = %args.population_key, "Saved population rows");
    }

    info!("Ingest completed successfully");
    println!("{}", serde_json::json!({ "ok": true }));
    Ok(())
}
