// src/analytics/mod.rs

use anyhow::Result;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

use crate::records::{BestYearEntry, JoinedRow};
use crate::store::BlobStore;

pub mod load;
pub mod stats;

pub use load::{load_bls, load_population, PopulationByYear};
pub use stats::{
    compute_best_years, compute_population_stats, compute_prs30006032_q01, join_population,
    PopulationStats, POPULATION_WINDOW,
};

pub const DEFAULT_BLS_KEY: &str = "rearc-data-quest/bls/pr.data.0.Current";
pub const DEFAULT_POPULATION_KEY: &str = "rearc-data-quest/population/us_population_all_years.json";

/// How many entries of each result make it into the log.
const LOG_SAMPLE: usize = 5;

/// The queue message that triggers an analytics run. Only the batch size is used.
#[derive(Debug, Default, Deserialize)]
pub struct QueueEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<Value>,
}

/// Everything one analytics run derives.
#[derive(Debug)]
pub struct AnalyticsReport {
    pub population_stats: Option<PopulationStats>,
    pub best_years: IndexMap<String, BestYearEntry>,
    pub joined: Vec<JoinedRow>,
}

/// Load both datasets from the store, derive the three views and log them.
#[instrument(level = "info", skip(store))]
pub fn run(
    store: &dyn BlobStore,
    bucket: &str,
    bls_key: &str,
    population_key: &str,
) -> Result<AnalyticsReport> {
    let pop_by_year = load_population(store, bucket, population_key)?;
    let rows = load_bls(store, bucket, bls_key)?;

    let population_stats = compute_population_stats(&pop_by_year);
    if let Some(s) = &population_stats {
        info!(
            years = s.years,
            "Population {}-{} mean: {}",
            POPULATION_WINDOW.start(),
            POPULATION_WINDOW.end(),
            s.mean as i64
        );
        info!(
            "Population {}-{} std dev: {:.2}",
            POPULATION_WINDOW.start(),
            POPULATION_WINDOW.end(),
            s.std_dev
        );
    }

    let best_years = compute_best_years(&rows);
    info!(series = best_years.len(), "Computed best years");
    for (series_id, entry) in best_years.iter().take(LOG_SAMPLE) {
        info!(
            %series_id,
            year = entry.year,
            "Best year sample, year_sum={:.4}",
            entry.total
        );
    }

    let joined = compute_prs30006032_q01(&rows, &pop_by_year);
    info!(rows = joined.len(), "Found rows for PRS30006032 Q01");
    for r in joined.iter().take(LOG_SAMPLE) {
        info!(
            year = r.year,
            period = %r.period,
            population = ?r.population,
            "PRS30006032 row, value={:.4}",
            r.value
        );
    }

    Ok(AnalyticsReport {
        population_stats,
        best_years,
        joined,
    })
}
