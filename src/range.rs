//! Range Estimator - axis bounds from the visible series
//!
//! Log-axis bounds are exponents (the renderer takes `log10` ranges), linear
//! bounds are plain values.

use serde::{Deserialize, Serialize};

use crate::config::Metric;
use crate::series::Unit;

/// Floor applied to the observed maximum so sparse data keeps a usable range
pub const MIN_OBSERVED_MAX: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    #[default]
    Log,
    Linear,
}

impl Scale {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "log" | "logarithmic" => Some(Scale::Log),
            "linear" => Some(Scale::Linear),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scale::Log => "log",
            Scale::Linear => "linear",
        }
    }
}

/// X plots the cumulative total, Y the windowed delta
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
    pub scale: Scale,
}

impl AxisRange {
    pub fn bounds(&self) -> [f64; 2] {
        [self.min, self.max]
    }
}

/// Estimate an axis range over pooled values; NaN entries are ignored
pub fn estimate(values: &[f64], scale: Scale, axis: Axis) -> AxisRange {
    let valid = values.iter().copied().filter(|v| !v.is_nan());
    let (observed_min, observed_max) = valid.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let max = observed_max.max(MIN_OBSERVED_MAX);

    match scale {
        Scale::Linear => AxisRange {
            min: -0.49 * 10f64.powf(max.log10().floor()),
            max: (1.05 * max).round(),
            scale,
        },
        Scale::Log => {
            let min = match axis {
                // Keep near-zero deltas on screen
                Axis::Y if observed_min < 10.0 => 0.0,
                _ => 1.0,
            };
            AxisRange {
                min,
                max: (1.5 * max).log10().ceil(),
                scale,
            }
        }
    }
}

/// Everything that, when changed, invalidates a manual range
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RangeInputs {
    pub selection: Vec<String>,
    pub metric: Metric,
    pub region: String,
    pub unit: Unit,
    pub scale: Scale,
}

/// Range-change events coming back from the renderer
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Relayout {
    Autorange,
    Manual { x: [f64; 2], y: [f64; 2] },
}

/// Current axis ranges plus the manual-override flag
#[derive(Debug, Clone)]
pub struct RangeState {
    pub x: AxisRange,
    pub y: AxisRange,
    manual: bool,
    inputs: Option<RangeInputs>,
}

impl Default for RangeState {
    fn default() -> Self {
        Self {
            x: estimate(&[], Scale::Log, Axis::X),
            y: estimate(&[], Scale::Log, Axis::Y),
            manual: false,
            inputs: None,
        }
    }
}

impl RangeState {
    pub fn is_manual(&self) -> bool {
        self.manual
    }

    /// Re-estimate from fresh data. A changed input set drops any manual
    /// override first; unchanged inputs leave a manual range alone.
    pub fn refresh(&mut self, inputs: RangeInputs, cases: &[f64], slopes: &[f64]) {
        if self.inputs.as_ref() != Some(&inputs) {
            if self.manual {
                tracing::debug!("Chart inputs changed, clearing manual range");
            }
            self.manual = false;
        }
        let scale = inputs.scale;
        self.inputs = Some(inputs);

        if !self.manual {
            self.x = estimate(cases, scale, Axis::X);
            self.y = estimate(slopes, scale, Axis::Y);
        }
    }

    /// Apply a relayout event. Autorange needs a follow-up `refresh`.
    pub fn apply(&mut self, event: Relayout) {
        match event {
            Relayout::Autorange => {
                self.manual = false;
            }
            Relayout::Manual { x, y } => {
                self.manual = true;
                self.x = AxisRange {
                    min: x[0],
                    max: x[1],
                    scale: self.x.scale,
                };
                self.y = AxisRange {
                    min: y[0],
                    max: y[1],
                    scale: self.y.scale,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_range() {
        let r = estimate(&[10.0, f64::NAN, 1234.0], Scale::Linear, Axis::X);
        assert_eq!(r.max, 1296.0);
        assert!((r.min - -490.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_floor_on_sparse_data() {
        let r = estimate(&[3.0], Scale::Linear, Axis::Y);
        assert_eq!(r.max, 53.0);
        assert!((r.min - -4.9).abs() < 1e-9);

        let empty = estimate(&[], Scale::Linear, Axis::X);
        assert_eq!(empty.max, 53.0);
    }

    #[test]
    fn test_log_x_range() {
        let r = estimate(&[60.0, 5000.0], Scale::Log, Axis::X);
        assert_eq!(r.min, 1.0);
        assert_eq!(r.max, 4.0);
    }

    #[test]
    fn test_log_y_lower_bound() {
        let low = estimate(&[2.0, 900.0], Scale::Log, Axis::Y);
        assert_eq!(low.min, 0.0);
        assert_eq!(low.max, 4.0);

        let high = estimate(&[20.0, 900.0], Scale::Log, Axis::Y);
        assert_eq!(high.min, 1.0);
    }

    fn inputs(selection: &[&str], scale: Scale) -> RangeInputs {
        RangeInputs {
            selection: selection.iter().map(|s| s.to_string()).collect(),
            scale,
            ..Default::default()
        }
    }

    #[test]
    fn test_manual_override_survives_same_inputs() {
        let mut state = RangeState::default();
        state.refresh(inputs(&["Italy"], Scale::Log), &[100.0], &[10.0]);
        state.apply(Relayout::Manual { x: [0.5, 2.0], y: [0.0, 1.5] });
        assert!(state.is_manual());

        state.refresh(inputs(&["Italy"], Scale::Log), &[100_000.0], &[10.0]);
        assert_eq!(state.x.bounds(), [0.5, 2.0]);

        state.refresh(inputs(&["Italy", "Spain"], Scale::Log), &[100_000.0], &[10.0]);
        assert!(!state.is_manual());
        assert_eq!(state.x.max, 6.0);
    }

    #[test]
    fn test_any_input_change_clears_override() {
        let base = inputs(&["Italy"], Scale::Log);
        let changes = [
            RangeInputs {
                metric: Metric::Deaths,
                ..base.clone()
            },
            RangeInputs {
                unit: Unit::PerCapita,
                ..base.clone()
            },
            RangeInputs {
                scale: Scale::Linear,
                ..base.clone()
            },
            RangeInputs {
                region: "canada".to_string(),
                ..base.clone()
            },
        ];

        for changed in changes {
            let mut state = RangeState::default();
            state.refresh(base.clone(), &[100.0], &[10.0]);
            state.apply(Relayout::Manual { x: [0.5, 2.0], y: [0.0, 1.5] });

            // New day, same inputs: values move, the override stays
            state.refresh(base.clone(), &[250.0], &[40.0]);
            assert!(state.is_manual());
            assert_eq!(state.x.bounds(), [0.5, 2.0]);

            state.refresh(changed.clone(), &[100.0], &[10.0]);
            assert!(!state.is_manual(), "override kept after {:?}", changed);
            assert_eq!(state.x.scale, changed.scale);
        }
    }

    #[test]
    fn test_autorange_event() {
        let mut state = RangeState::default();
        let i = inputs(&["Italy"], Scale::Linear);
        state.refresh(i.clone(), &[100.0], &[10.0]);
        state.apply(Relayout::Manual { x: [0.0, 1.0], y: [0.0, 1.0] });
        state.apply(Relayout::Autorange);
        state.refresh(i, &[100.0], &[10.0]);
        assert_eq!(state.x.max, 105.0);
    }
}
