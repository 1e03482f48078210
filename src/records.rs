// src/records.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// One year of national population, as persisted by the ingest stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationRecord {
    pub year: i64,
    pub population: i64,
}

/// A single observation from the BLS time-series file.
#[derive(Clone, Debug, PartialEq)]
pub struct BlsRow {
    pub series_id: String,
    pub period: String,
    pub year: i64,
    pub value: f64,
}

impl BlsRow {
    /// Quarterly periods are the ones coded `Q01`..`Q04`.
    pub fn is_quarterly(&self) -> bool {
        self.period.starts_with('Q')
    }
}

/// The year whose quarterly values summed highest for a series.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BestYearEntry {
    pub year: i64,
    pub total: f64,
}

/// A BLS row with the matching year's population attached, if any.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JoinedRow {
    pub series_id: String,
    pub year: i64,
    pub period: String,
    pub value: f64,
    pub population: Option<i64>,
}

/// Why a single upstream record was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Error)]
pub enum SkipReason {
    #[error("malformed line")]
    MalformedLine,
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` is not an integer")]
    BadInteger(&'static str),
    #[error("field `{0}` is not a number")]
    BadFloat(&'static str),
    #[error("population is null")]
    NullPopulation,
    #[error("population is negative")]
    NegativePopulation,
}

/// Per-reason counts of dropped records, surfaced in logs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SkipTally {
    counts: BTreeMap<SkipReason, usize>,
}

impl SkipTally {
    pub fn record(&mut self, reason: SkipReason) {
        *self.counts.entry(reason).or_insert(0) += 1;
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn count(&self, reason: SkipReason) -> usize {
        self.counts.get(&reason).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl fmt::Display for SkipTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.counts.is_empty() {
            return write!(f, "none");
        }
        let mut first = true;
        for (reason, n) in &self.counts {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", reason, n)?;
            first = false;
        }
        Ok(())
    }
}

/// Coerce a loosely-typed JSON value to an integer.
///
/// Accepts JSON integers, finite floats (truncated toward zero) and integer
/// strings (surrounding whitespace ignored).
pub fn coerce_int(value: &Value, field: &'static str) -> Result<i64, SkipReason> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            match n.as_f64() {
                Some(f) if f.is_finite() => Ok(f.trunc() as i64),
                _ => Err(SkipReason::BadInteger(field)),
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| SkipReason::BadInteger(field)),
        _ => Err(SkipReason::BadInteger(field)),
    }
}

/// Build a `PopulationRecord` from one object, given the field names it uses.
pub fn population_from_json(
    rec: &Value,
    year_field: &'static str,
    population_field: &'static str,
) -> Result<PopulationRecord, SkipReason> {
    let year = rec
        .get(year_field)
        .ok_or(SkipReason::MissingField(year_field))?;
    let year = coerce_int(year, year_field)?;

    let population = match rec.get(population_field) {
        None | Some(Value::Null) => return Err(SkipReason::NullPopulation),
        Some(v) => coerce_int(v, population_field)?,
    };
    if population < 0 {
        return Err(SkipReason::NegativePopulation);
    }

    Ok(PopulationRecord { year, population })
}
