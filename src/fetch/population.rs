// src/fetch/population.rs

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{info, instrument, warn};
use url::Url;

use super::{Session, DOWNLOAD_TIMEOUT};
use crate::records::{population_from_json, PopulationRecord, SkipTally};
use crate::store::{BlobStore, Metadata};

/// DataUSA national population, all years.
pub const DEFAULT_POPULATION_URL: &str = "https://honolulu-api.datausa.io/tesseract/data.jsonrecords?cube=acs_yg_total_population_1&drilldowns=Year%2CNation&locale=en&measures=Population";

const YEAR_FIELD: &str = "Year";
const POPULATION_FIELD: &str = "Population";

/// Turn an API payload into sorted population records.
///
/// The payload may be a bare array or an object carrying a `data` array.
/// Records that fail to coerce are counted in the returned tally and dropped.
pub fn parse_population_payload(payload: &Value) -> (Vec<PopulationRecord>, SkipTally) {
    let records: &[Value] = match payload {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("data") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    let mut tally = SkipTally::default();
    let mut rows = Vec::with_capacity(records.len());
    for rec in records {
        match population_from_json(rec, YEAR_FIELD, POPULATION_FIELD) {
            Ok(row) => rows.push(row),
            Err(reason) => tally.record(reason),
        }
    }

    // stable, so duplicate years keep their upstream order
    rows.sort_by_key(|r| r.year);
    (rows, tally)
}

/// Fetch every available year of population from the API.
///
/// An empty result is not an error here; the caller decides what it means.
#[instrument(level = "info", skip(session), fields(%url))]
pub fn fetch_population_all_years(session: &Session, url: &Url) -> Result<Vec<PopulationRecord>> {
    info!("requesting population data");
    let payload: Value = session
        .get_ok(url, DOWNLOAD_TIMEOUT)?
        .json()
        .with_context(|| format!("decoding JSON from {}", url))?;

    let (rows, skipped) = parse_population_payload(&payload);
    if !skipped.is_empty() {
        warn!(skipped = skipped.total(), reasons = %skipped, "dropped population records");
    }
    info!(rows = rows.len(), "fetched population rows (all years)");
    Ok(rows)
}

/// Persist population rows as a JSON array of `{year, population}`.
pub fn save_population(
    store: &dyn BlobStore,
    bucket: &str,
    key: &str,
    rows: &[PopulationRecord],
) -> Result<()> {
    let body = serde_json::to_vec(rows).context("serialising population rows")?;
    store
        .put_object(bucket, key, &body, "application/json", &Metadata::new())
        .with_context(|| format!("writing population to {}/{}", bucket, key))?;
    info!(bucket, key, rows = rows.len(), "wrote population");
    Ok(())
}
