//! Series Builder - canonical entities to plot-ready trajectories
//!
//! For every entity: sum its raw rows per day, scale into the active unit,
//! take the windowed delta ("new in the past N days") in that unit, then mask
//! every index whose cumulative total is below the reporting threshold.
//!
//! Invalid points are `f64::NAN` throughout. The delta mask is keyed off the
//! cumulative value at the same index, never off the delta itself.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::{SeriesConfig, Thresholds};
use crate::download::RawRow;
use crate::normalize::CanonicalEntity;
use crate::population::PopulationTable;

/// Unit the cumulative series is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Unit {
    #[default]
    Absolute,
    PerCapita,
    Density,
}

impl Unit {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "absolute" => Some(Unit::Absolute),
            "per-capita" | "percapita" | "per_capita" => Some(Unit::PerCapita),
            "density" => Some(Unit::Density),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Absolute => "absolute",
            Unit::PerCapita => "per-capita",
            Unit::Density => "density",
        }
    }

    pub fn threshold(&self, thresholds: &Thresholds) -> f64 {
        match self {
            Unit::Absolute => thresholds.absolute,
            Unit::PerCapita => thresholds.per_capita,
            Unit::Density => thresholds.density,
        }
    }

    /// Suffix appended to axis titles
    pub fn label_suffix(&self) -> &'static str {
        match self {
            Unit::Absolute => "",
            Unit::PerCapita => " per million",
            Unit::Density => " per unit of population density",
        }
    }
}

/// Inputs to one build pass
#[derive(Debug, Clone, Copy)]
pub struct SeriesParams {
    pub unit: Unit,
    pub window_size: usize,
    pub threshold: f64,
    pub per_capita_scale: f64,
    pub density_scale: f64,
}

impl SeriesParams {
    pub fn from_config(config: &SeriesConfig, unit: Unit) -> Self {
        Self {
            unit,
            window_size: config.window_size,
            threshold: unit.threshold(&config.thresholds),
            per_capita_scale: config.per_capita_scale,
            density_scale: config.density_scale,
        }
    }
}

/// Derived per-entity time series
#[derive(Debug, Clone, Serialize)]
pub struct EntitySeries {
    pub name: String,
    pub raw_cumulative: Vec<f64>,
    pub scaled_cumulative: Vec<f64>,
    /// NaN for indices below the window size
    pub windowed_delta: Vec<f64>,
    /// `scaled_cumulative` with sub-threshold indices masked
    pub cases: Vec<f64>,
    /// `windowed_delta` masked where `cases` is masked
    pub slope: Vec<f64>,
    /// Peak valid value of `cases`
    pub max_value: f64,
}

impl EntitySeries {
    /// First index where the visible delta is strictly positive
    pub fn first_growth_index(&self) -> Option<usize> {
        self.slope.iter().position(|&v| v > 0.0)
    }
}

/// `(divisor, scale)` taking an absolute count into `unit`, or `None` when
/// the entity has no usable population figure
fn unit_scaling(
    name: &str,
    params: &SeriesParams,
    population: Option<&PopulationTable>,
) -> Option<(f64, f64)> {
    if params.unit == Unit::Absolute {
        return Some((1.0, 1.0));
    }
    let d = population?.lookup(name)?;
    match params.unit {
        Unit::PerCapita if d.population > 0.0 => Some((d.population, params.per_capita_scale)),
        Unit::Density if d.density > 0.0 => Some((d.density, params.density_scale)),
        _ => None,
    }
}

/// `delta[i] = values[i] - values[i - window]`, NaN below the window
pub fn windowed_delta(values: &[f64], window: usize) -> Vec<f64> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            if i >= window {
                v - values[i - window]
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Build one entity's series; `None` if it never reaches the threshold
fn build_entity(
    entity: &CanonicalEntity,
    rows: &[RawRow],
    total_days: usize,
    (divisor, scale): (f64, f64),
    params: &SeriesParams,
) -> Option<EntitySeries> {
    let raw_cumulative: Vec<f64> = (0..total_days)
        .map(|day| {
            entity
                .rows
                .iter()
                .map(|&r| rows[r].counts.get(day).copied().unwrap_or(0))
                .sum::<u64>() as f64
        })
        .collect();

    let scaled_cumulative: Vec<f64> = raw_cumulative.iter().map(|v| v / divisor * scale).collect();
    let windowed_delta = windowed_delta(&scaled_cumulative, params.window_size);

    let valid = |i: usize| scaled_cumulative[i] >= params.threshold;
    let cases: Vec<f64> = (0..total_days)
        .map(|i| if valid(i) { scaled_cumulative[i] } else { f64::NAN })
        .collect();
    let slope: Vec<f64> = (0..total_days)
        .map(|i| if valid(i) { windowed_delta[i] } else { f64::NAN })
        .collect();

    let max_value = cases
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::NEG_INFINITY, f64::max);
    if max_value < params.threshold {
        return None;
    }

    Some(EntitySeries {
        name: entity.name.clone(),
        raw_cumulative,
        scaled_cumulative,
        windowed_delta,
        cases,
        slope,
        max_value,
    })
}

/// Build series for every entity, dropping those without a population figure
/// (non-absolute units) or that never reach the reporting threshold
pub fn build(
    rows: &[RawRow],
    entities: &[CanonicalEntity],
    total_days: usize,
    params: &SeriesParams,
    population: Option<&PopulationTable>,
) -> Vec<EntitySeries> {
    let mut out = Vec::with_capacity(entities.len());
    let mut below_threshold = 0usize;

    for entity in entities {
        let Some(scaling) = unit_scaling(&entity.name, params, population) else {
            tracing::warn!(
                "No population match for '{}', dropping from {} view",
                entity.name,
                params.unit.as_str()
            );
            continue;
        };
        match build_entity(entity, rows, total_days, scaling, params) {
            Some(series) => out.push(series),
            None => below_threshold += 1,
        }
    }

    tracing::debug!(
        "Built {} series ({} below threshold {}, unit={}, window={})",
        out.len(),
        below_threshold,
        params.threshold,
        params.unit.as_str(),
        params.window_size
    );
    out
}

/// Top-K entities by peak value, plus any notable names that are present
pub fn default_selection(series: &[EntitySeries], top_k: usize, notable: &[String]) -> BTreeSet<String> {
    let mut ranked: Vec<&EntitySeries> = series.iter().collect();
    ranked.sort_by(|a, b| {
        b.max_value
            .total_cmp(&a.max_value)
            .then_with(|| a.name.cmp(&b.name))
    });

    let mut selected: BTreeSet<String> = ranked
        .iter()
        .take(top_k)
        .map(|s| s.name.clone())
        .collect();
    selected.extend(
        notable
            .iter()
            .filter(|n| series.iter().any(|s| &s.name == *n))
            .cloned(),
    );
    selected
}

/// One plus the earliest growth index across `series`; `None` when nothing
/// has grown yet
pub fn min_valid_day<'a, I>(series: I) -> Option<usize>
where
    I: IntoIterator<Item = &'a EntitySeries>,
{
    series
        .into_iter()
        .filter_map(EntitySeries::first_growth_index)
        .min()
        .map(|i| i + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Demographic;

    fn entity(name: &str, rows: Vec<usize>) -> CanonicalEntity {
        CanonicalEntity {
            name: name.to_string(),
            rows,
        }
    }

    fn raw(counts: &[u64]) -> RawRow {
        RawRow {
            country_region: "Country X".to_string(),
            province_state: None,
            counts: counts.to_vec(),
        }
    }

    fn params(window_size: usize, threshold: f64) -> SeriesParams {
        SeriesParams {
            unit: Unit::Absolute,
            window_size,
            threshold,
            per_capita_scale: 1_000_000.0,
            density_scale: 1.0,
        }
    }

    fn same(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len()
            && a.iter()
                .zip(b)
                .all(|(x, y)| (x.is_nan() && y.is_nan()) || x == y)
    }

    const DOUBLING: [u64; 10] = [1, 2, 4, 8, 16, 32, 64, 128, 256, 512];

    #[test]
    fn test_doubling_series_lag_six() {
        let rows = vec![raw(&DOUBLING)];
        let out = build(&rows, &[entity("Country X", vec![0])], 10, &params(6, 50.0), None);
        let s = &out[0];
        let n = f64::NAN;
        assert!(same(&s.cases, &[n, n, n, n, n, n, 64.0, 128.0, 256.0, 512.0]));
        assert!(same(&s.slope, &[n, n, n, n, n, n, 63.0, 126.0, 252.0, 504.0]));
        assert_eq!(s.max_value, 512.0);
    }

    #[test]
    fn test_doubling_series_week_window() {
        let rows = vec![raw(&DOUBLING)];
        let out = build(&rows, &[entity("Country X", vec![0])], 10, &params(7, 50.0), None);
        let s = &out[0];
        let n = f64::NAN;
        assert!(same(&s.slope, &[n, n, n, n, n, n, n, 127.0, 254.0, 508.0]));
    }

    #[test]
    fn test_windowing_property() {
        let values: Vec<f64> = (0..30).map(|i| (i * i) as f64).collect();
        for window in [1, 3, 7, 14] {
            let delta = windowed_delta(&values, window);
            for (i, d) in delta.iter().enumerate() {
                if i >= window {
                    assert_eq!(*d, values[i] - values[i - window]);
                } else {
                    assert!(d.is_nan());
                }
            }
        }
    }

    #[test]
    fn test_mask_follows_cumulative_not_delta() {
        // Big jump while the running total is still under threshold
        let rows = vec![raw(&[0, 0, 40, 45, 90, 91])];
        let out = build(&rows, &[entity("X", vec![0])], 6, &params(2, 50.0), None);
        let s = &out[0];
        assert!(s.windowed_delta[3] == 45.0 && s.slope[3].is_nan());
        assert_eq!(s.slope[4], 50.0);
        for i in 0..6 {
            assert_eq!(s.cases[i].is_nan(), s.scaled_cumulative[i] < 50.0);
            assert_eq!(s.slope[i].is_nan(), s.cases[i].is_nan() || s.windowed_delta[i].is_nan());
        }
    }

    #[test]
    fn test_sums_rows_and_drops_small() {
        let rows = vec![raw(&[10, 30]), raw(&[15, 25]), raw(&[1, 2])];
        let entities = [entity("Big", vec![0, 1]), entity("Small", vec![2])];
        let out = build(&rows, &entities, 2, &params(1, 50.0), None);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].raw_cumulative, vec![25.0, 55.0]);
    }

    #[test]
    fn test_per_capita_scaling() {
        let table = PopulationTable::from_demographics(&[Demographic {
            name: "X".into(),
            id: "XXX".into(),
            population: 2_000_000.0,
            density: 4.0,
            aliases: vec![],
        }]);
        let rows = vec![raw(&[100, 300])];
        let mut p = params(1, 1.0);
        p.unit = Unit::PerCapita;
        let out = build(&rows, &[entity("X", vec![0])], 2, &p, Some(&table));
        assert_eq!(out[0].scaled_cumulative, vec![50.0, 150.0]);
        assert_eq!(out[0].slope[1], 100.0);

        p.unit = Unit::Density;
        let out = build(&rows, &[entity("X", vec![0])], 2, &p, Some(&table));
        assert_eq!(out[0].scaled_cumulative, vec![25.0, 75.0]);
    }

    #[test]
    fn test_missing_population_dropped() {
        let table = PopulationTable::default();
        let rows = vec![raw(&[100, 300])];
        let mut p = params(1, 1.0);
        p.unit = Unit::PerCapita;
        assert!(build(&rows, &[entity("X", vec![0])], 2, &p, Some(&table)).is_empty());
        assert!(build(&rows, &[entity("X", vec![0])], 2, &p, None).is_empty());
    }

    #[test]
    fn test_default_selection() {
        let rows = vec![raw(&[100]), raw(&[300]), raw(&[200]), raw(&[60])];
        let entities = [
            entity("A", vec![0]),
            entity("B", vec![1]),
            entity("C", vec![2]),
            entity("D", vec![3]),
        ];
        let out = build(&rows, &entities, 1, &params(1, 50.0), None);
        let notable = vec!["D".to_string(), "Missing".to_string()];
        let selected = default_selection(&out, 2, &notable);
        let names: Vec<_> = selected.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["B", "C", "D"]);
    }

    #[test]
    fn test_min_valid_day() {
        let rows = vec![raw(&[50, 50, 60, 70]), raw(&[50, 80, 90, 95]), raw(&[60, 60, 60, 60])];
        let entities = [entity("A", vec![0]), entity("B", vec![1]), entity("Flat", vec![2])];
        let out = build(&rows, &entities, 4, &params(1, 50.0), None);
        assert_eq!(min_valid_day(&out), Some(2));
        assert_eq!(min_valid_day(&out[..1]), Some(3));
        assert_eq!(min_valid_day(&out[2..]), None);
        assert_eq!(min_valid_day(std::iter::empty::<&EntitySeries>()), None);
    }
}
