// src/analytics/stats.rs

use indexmap::IndexMap;
use std::ops::RangeInclusive;
use tracing::warn;

use super::load::PopulationByYear;
use crate::records::{BestYearEntry, BlsRow, JoinedRow};

/// Years covered by the population summary.
pub const POPULATION_WINDOW: RangeInclusive<i64> = 2013..=2018;

pub const JOIN_SERIES_ID: &str = "PRS30006032";
pub const JOIN_PERIOD: &str = "Q01";

/// Mean and population standard deviation of yearly population.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PopulationStats {
    pub years: usize,
    pub mean: f64,
    pub std_dev: f64,
}

/// Mean and population (divide-by-N) standard deviation over `POPULATION_WINDOW`.
///
/// Years missing from the map are left out. Fewer than two points yields
/// `None` and a warning.
pub fn compute_population_stats(pop_by_year: &PopulationByYear) -> Option<PopulationStats> {
    let pops: Vec<f64> = pop_by_year
        .range(POPULATION_WINDOW)
        .map(|(_, &p)| p as f64)
        .collect();

    if pops.len() < 2 {
        warn!(
            points = pops.len(),
            "Not enough population data for {}-{} to compute stats",
            POPULATION_WINDOW.start(),
            POPULATION_WINDOW.end()
        );
        return None;
    }

    let n = pops.len() as f64;
    let mean = pops.iter().sum::<f64>() / n;
    let variance = pops.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;

    Some(PopulationStats {
        years: pops.len(),
        mean,
        std_dev: variance.sqrt(),
    })
}

/// For each series, the year with the largest sum of quarterly values.
///
/// Groups keep the order in which `(series_id, year)` first appears, and a
/// later year only wins with a strictly larger total, so ties go to the
/// earlier year.
pub fn compute_best_years(rows: &[BlsRow]) -> IndexMap<String, BestYearEntry> {
    let mut sums: IndexMap<(&str, i64), f64> = IndexMap::new();
    for row in rows.iter().filter(|r| r.is_quarterly()) {
        *sums.entry((row.series_id.as_str(), row.year)).or_insert(0.0) += row.value;
    }

    let mut best: IndexMap<String, BestYearEntry> = IndexMap::new();
    for ((series_id, year), total) in sums {
        best.entry(series_id.to_string())
            .and_modify(|entry| {
                if total > entry.total {
                    *entry = BestYearEntry { year, total };
                }
            })
            .or_insert(BestYearEntry { year, total });
    }
    best
}

/// Rows for one series and period, each with that year's population attached.
///
/// Input order is kept and duplicates are not collapsed.
pub fn join_population(
    rows: &[BlsRow],
    pop_by_year: &PopulationByYear,
    series_id: &str,
    period: &str,
) -> Vec<JoinedRow> {
    rows.iter()
        .filter(|r| r.series_id == series_id && r.period == period)
        .map(|r| JoinedRow {
            series_id: r.series_id.clone(),
            year: r.year,
            period: r.period.clone(),
            value: r.value,
            population: pop_by_year.get(&r.year).copied(),
        })
        .collect()
}

/// `PRS30006032` / `Q01` joined with population.
pub fn compute_prs30006032_q01(rows: &[BlsRow], pop_by_year: &PopulationByYear) -> Vec<JoinedRow> {
    join_population(rows, pop_by_year, JOIN_SERIES_ID, JOIN_PERIOD)
}
