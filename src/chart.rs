//! Chart bundle - traces, layout and config for the rendering engine
//!
//! The core never draws. Each recompute hands the renderer one bundle for the
//! current day and ranges. Masked points serialize as `null`.

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::Metric;
use crate::range::{AxisRange, RangeState, Scale};
use crate::series::{EntitySeries, Unit};

const HIGHLIGHT_COLOR: &str = "rgba(254, 52, 110, 1)";
const MUTED_COLOR: &str = "rgba(0, 0, 0, 0.15)";

#[derive(Debug, Clone, Serialize)]
pub struct ChartBundle {
    pub traces: Vec<Trace>,
    pub layout: Layout,
    pub config: ChartConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct Trace {
    pub name: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub mode: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legendgroup: Option<usize>,
    pub color: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dash: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub text: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Layout {
    pub title: String,
    pub xaxis: AxisLayout,
    pub yaxis: AxisLayout,
    pub showlegend: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AxisLayout {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub range: [f64; 2],
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartConfig {
    pub responsive: bool,
    pub image_filename: &'static str,
}

/// What the chart shows, independent of the data
#[derive(Debug, Clone, Copy)]
pub struct ChartView<'a> {
    pub metric: Metric,
    pub unit: Unit,
    pub scale: Scale,
    pub window_size: usize,
    /// Doubling time in days when the reference line is on
    pub trendline: Option<u32>,
    pub highlighted: Option<&'a str>,
}

/// Turn an upstream `m/d/yy` label into `Mar 5, 2020`; other labels pass through
pub fn display_date(label: &str) -> String {
    ["%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(label, fmt).ok())
        .map(|d| d.format("%b %-d, %Y").to_string())
        .unwrap_or_else(|| label.to_string())
}

fn axis_kind(scale: Scale) -> &'static str {
    match scale {
        Scale::Log => "log",
        Scale::Linear => "linear",
    }
}

/// Slope of `new = k * total` for steady exponential growth
pub fn doubling_slope(window_size: usize, doubling_days: u32) -> f64 {
    1.0 - 2f64.powf(-(window_size as f64) / f64::from(doubling_days.max(1)))
}

/// Data-space x extent of a range
fn x_extent(range: &AxisRange) -> (f64, f64) {
    match range.scale {
        Scale::Log => (10f64.powf(range.min), 10f64.powf(range.max)),
        Scale::Linear => (range.min.max(1.0), range.max),
    }
}

pub fn build_chart(
    series: &[&EntitySeries],
    dates: &[String],
    day: usize,
    ranges: &RangeState,
    view: &ChartView<'_>,
) -> ChartBundle {
    let day = day.min(dates.len());
    let label = view.metric.label();
    let suffix = view.unit.label_suffix();
    let color_for = |name: &str| {
        if view.highlighted == Some(name) {
            HIGHLIGHT_COLOR
        } else {
            MUTED_COLOR
        }
    };

    let mut traces: Vec<Trace> = series
        .iter()
        .enumerate()
        .map(|(i, s)| Trace {
            name: s.name.clone(),
            x: s.cases[..day.min(s.cases.len())].to_vec(),
            y: s.slope[..day.min(s.slope.len())].to_vec(),
            mode: if series.len() <= 2 { "lines+markers" } else { "lines" },
            kind: "scatter",
            legendgroup: Some(i),
            color: color_for(&s.name),
            dash: None,
            text: dates[..day].iter().map(|d| display_date(d)).collect(),
        })
        .collect();

    // Head marker at the current day
    traces.extend(series.iter().enumerate().map(|(i, s)| {
        let (x, y) = match day.checked_sub(1) {
            Some(d) if d < s.cases.len() => (vec![s.cases[d]], vec![s.slope[d]]),
            _ => (Vec::new(), Vec::new()),
        };
        Trace {
            name: s.name.clone(),
            x,
            y,
            mode: "markers+text",
            kind: "scatter",
            legendgroup: Some(i),
            color: HIGHLIGHT_COLOR,
            dash: None,
            text: vec![s.name.clone()],
        }
    }));

    if let Some(doubling) = view.trendline {
        let k = doubling_slope(view.window_size, doubling);
        let (x0, x1) = x_extent(&ranges.x);
        traces.push(Trace {
            name: format!("Doubling every {} days", doubling),
            x: vec![x0, x1],
            y: vec![k * x0, k * x1],
            mode: "lines",
            kind: "scatter",
            legendgroup: None,
            color: MUTED_COLOR,
            dash: Some("dot"),
            text: Vec::new(),
        });
    }

    let date = day
        .checked_sub(1)
        .and_then(|d| dates.get(d))
        .map(|d| display_date(d))
        .unwrap_or_default();

    ChartBundle {
        traces,
        layout: Layout {
            title: format!("Trajectory of COVID-19 {} ({})", label, date),
            xaxis: AxisLayout {
                title: format!("Total {}{}", label, suffix),
                kind: axis_kind(view.scale),
                range: ranges.x.bounds(),
            },
            yaxis: AxisLayout {
                title: format!(
                    "New {}{} (in the Past {} days)",
                    label, suffix, view.window_size
                ),
                kind: axis_kind(view.scale),
                range: ranges.y.bounds(),
            },
            showlegend: false,
        },
        config: ChartConfig {
            responsive: true,
            image_filename: "Covid Trends",
        },
    }
}
