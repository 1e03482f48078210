// src/analytics/load.rs

use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::records::{population_from_json, BlsRow, SkipReason, SkipTally};
use crate::store::BlobStore;

/// Year → population. Later duplicates overwrite earlier ones.
pub type PopulationByYear = BTreeMap<i64, i64>;

/// Column positions located from the header row.
struct BlsColumns {
    series_id: Option<usize>,
    period: Option<usize>,
    year: Option<usize>,
    value: Option<usize>,
}

impl BlsColumns {
    fn from_header(header: &StringRecord) -> Self {
        let find = |name: &str| header.iter().position(|h| h.trim() == name);
        Self {
            series_id: find("series_id"),
            period: find("period"),
            year: find("year"),
            value: find("value"),
        }
    }

    fn missing(&self) -> Vec<&'static str> {
        [
            ("series_id", self.series_id),
            ("period", self.period),
            ("year", self.year),
            ("value", self.value),
        ]
        .into_iter()
        .filter(|(_, idx)| idx.is_none())
        .map(|(name, _)| name)
        .collect()
    }
}

fn field<'r>(
    record: &'r StringRecord,
    idx: Option<usize>,
    name: &'static str,
) -> Result<&'r str, SkipReason> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .ok_or(SkipReason::MissingField(name))
}

fn parse_bls_record(record: &StringRecord, cols: &BlsColumns) -> Result<BlsRow, SkipReason> {
    let series_id = field(record, cols.series_id, "series_id")?;
    let period = field(record, cols.period, "period")?;
    let year = field(record, cols.year, "year")?
        .parse::<i64>()
        .map_err(|_| SkipReason::BadInteger("year"))?;
    let value = field(record, cols.value, "value")?
        .parse::<f64>()
        .map_err(|_| SkipReason::BadFloat("value"))?;

    Ok(BlsRow {
        series_id: series_id.to_string(),
        period: period.to_string(),
        year,
        value,
    })
}

/// Parse the BLS data file.
///
/// Tab-delimited when the header line has a tab, comma-delimited otherwise.
/// Every field is trimmed; rows that fail to parse are tallied and dropped.
pub fn parse_bls(text: &str) -> (Vec<BlsRow>, SkipTally) {
    let header_line = text.lines().next().unwrap_or_default();
    let delimiter = if header_line.contains('\t') { b'\t' } else { b',' };

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut tally = SkipTally::default();
    let mut rows = Vec::new();

    let cols = match reader.headers() {
        Ok(header) => BlsColumns::from_header(header),
        Err(e) => {
            warn!(error = %e, "unreadable BLS header");
            return (rows, tally);
        }
    };
    let missing = cols.missing();
    if !missing.is_empty() {
        warn!(?missing, "BLS header lacks expected columns");
    }

    for record in reader.records() {
        let parsed = record
            .map_err(|_| SkipReason::MalformedLine)
            .and_then(|r| parse_bls_record(&r, &cols));
        match parsed {
            Ok(row) => rows.push(row),
            Err(reason) => tally.record(reason),
        }
    }
    (rows, tally)
}

/// Parse the persisted population array into a year-keyed map.
pub fn parse_population(raw: &[u8]) -> Result<(PopulationByYear, SkipTally)> {
    let data: Value = serde_json::from_slice(raw).context("decoding population JSON")?;
    let Value::Array(records) = data else {
        bail!("population object is not a JSON array");
    };

    let mut tally = SkipTally::default();
    let mut pop_by_year = PopulationByYear::new();
    for rec in &records {
        match population_from_json(rec, "year", "population") {
            Ok(r) => {
                pop_by_year.insert(r.year, r.population);
            }
            Err(reason) => tally.record(reason),
        }
    }
    Ok((pop_by_year, tally))
}

/// Load the population JSON written by the ingest stage.
pub fn load_population(store: &dyn BlobStore, bucket: &str, key: &str) -> Result<PopulationByYear> {
    info!(bucket, key, "Loading population");
    let raw = store
        .get_object(bucket, key)
        .with_context(|| format!("reading population from {}/{}", bucket, key))?;
    let (pop_by_year, skipped) = parse_population(&raw)?;
    if !skipped.is_empty() {
        warn!(skipped = skipped.total(), reasons = %skipped, "dropped population rows");
    }
    info!(rows = pop_by_year.len(), "Loaded population rows");
    Ok(pop_by_year)
}

/// Load the mirrored BLS file.
pub fn load_bls(store: &dyn BlobStore, bucket: &str, key: &str) -> Result<Vec<BlsRow>> {
    info!(bucket, key, "Loading BLS data");
    let raw = store
        .get_object(bucket, key)
        .with_context(|| format!("reading BLS data from {}/{}", bucket, key))?;
    let text = String::from_utf8_lossy(&raw);
    let (rows, skipped) = parse_bls(&text);
    if !skipped.is_empty() {
        warn!(skipped = skipped.total(), reasons = %skipped, "dropped BLS rows");
    }
    info!(rows = rows.len(), "Loaded BLS rows");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Metadata};

    // Shape of the real file: tab-separated, padded header and fields.
    const BLS_TSV: &str = "series_id        \tyear\tperiod\t       value\tfootnote_codes\n\
PRS30006011      \t1995\tQ01\t          2.6\t\n\
PRS30006011      \t1995\tA01\t          2.1\t\n\
PRS30006032      \t2015\tQ01\t          3.3\tR\n\
PRS30006032      \tyear\tQ01\t          1.0\t\n\
PRS30006032      \t2016\tQ01\t            -\t\n";

    #[test]
    fn parses_tab_delimited_file_with_padding() {
        let (rows, skipped) = parse_bls(BLS_TSV);
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[2],
            BlsRow {
                series_id: "PRS30006032".into(),
                period: "Q01".into(),
                year: 2015,
                value: 3.3,
            }
        );
        assert!(!rows[1].is_quarterly());
        assert_eq!(skipped.count(SkipReason::BadInteger("year")), 1);
        assert_eq!(skipped.count(SkipReason::BadFloat("value")), 1);
    }

    #[test]
    fn parses_comma_delimited_file() {
        let csv = "series_id,year,period,value\n S1 ,2020, Q01 ,10\nS1,2020,Q02,20\nS1,2021\n";
        let (rows, skipped) = parse_bls(csv);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].series_id, "S1");
        assert_eq!(rows[0].period, "Q01");
        assert_eq!(skipped.count(SkipReason::MissingField("period")), 1);
    }

    #[test]
    fn header_without_expected_columns_drops_everything() {
        let (rows, skipped) = parse_bls("a,b\n1,2\n3,4\n");
        assert!(rows.is_empty());
        assert_eq!(skipped.total(), 2);
        let (rows, skipped) = parse_bls("");
        assert!(rows.is_empty());
        assert!(skipped.is_empty());
    }

    #[test]
    fn population_duplicates_keep_the_last_value() -> Result<()> {
        let raw = br#"[
            {"year": 2013, "population": 1},
            {"year": 2014, "population": 2},
            {"year": 2013, "population": 3},
            {"year": "bad", "population": 4}
        ]"#;
        let (map, skipped) = parse_population(raw)?;
        assert_eq!(map.get(&2013), Some(&3));
        assert_eq!(map.get(&2014), Some(&2));
        assert_eq!(skipped.total(), 1);
        Ok(())
    }

    #[test]
    fn population_must_be_an_array() {
        assert!(parse_population(br#"{"data": []}"#).is_err());
        assert!(parse_population(b"not json").is_err());
    }

    #[test]
    fn loads_both_objects_from_the_store() -> Result<()> {
        let store = MemoryStore::new();
        let meta = Metadata::new();
        store.put_object("b", "bls", BLS_TSV.as_bytes(), "text/csv", &meta)?;
        store.put_object(
            "b",
            "pop",
            br#"[{"year": 2015, "population": 321418821}]"#,
            "application/json",
            &meta,
        )?;

        assert_eq!(load_bls(&store, "b", "bls")?.len(), 3);
        assert_eq!(load_population(&store, "b", "pop")?.get(&2015), Some(&321418821));
        assert!(load_bls(&store, "b", "missing").is_err());
        Ok(())
    }
}
