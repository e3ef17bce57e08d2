//! URL query parameters - read on load, written when sharing a view
//!
//! Unknown keys and invalid values fall back to defaults without error.

use serde::{Deserialize, Serialize};

use crate::config::{Config, Metric};
use crate::range::Scale;
use crate::series::Unit;

pub const DEFAULT_REGION: &str = "world";
pub const DEFAULT_DOUBLING_TIME: u32 = 2;

/// Everything a shareable view encodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewParams {
    pub scale: Scale,
    pub metric: Metric,
    pub region: String,
    pub unit: Unit,
    /// `None` means "use the default selection"
    pub locations: Option<Vec<String>>,
    pub trendline: bool,
    pub doubling_time: u32,
}

impl Default for ViewParams {
    fn default() -> Self {
        Self {
            scale: Scale::Log,
            metric: Metric::Cases,
            region: DEFAULT_REGION.to_string(),
            unit: Unit::Absolute,
            locations: None,
            trendline: false,
            doubling_time: DEFAULT_DOUBLING_TIME,
        }
    }
}

fn decode(raw: &str) -> Option<String> {
    let plain = raw.replace('+', " ");
    let decoded = urlencoding::decode(&plain).ok()?;
    Some(decoded.into_owned())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl ViewParams {
    /// Parse a query string. Accepts a full URL, `?a=b`, or `a=b`.
    pub fn parse(query: &str, config: &Config) -> Self {
        let mut params = ViewParams::default();
        let query = query.split_once('?').map_or(query, |(_, q)| q);
        let query = query.split('#').next().unwrap_or("");

        let mut locations: Vec<String> = Vec::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let (Some(key), Some(value)) = (decode(key), decode(value)) else {
                tracing::debug!("Skipping undecodable query pair '{}'", pair);
                continue;
            };

            match key.to_ascii_lowercase().as_str() {
                "scale" => {
                    if let Some(scale) = Scale::parse(&value) {
                        params.scale = scale;
                    }
                }
                "data" | "metric" => {
                    if let Some(metric) = Metric::parse(&value) {
                        params.metric = metric;
                    }
                }
                "region" => {
                    if let Some(region) = config.get_region(&value) {
                        params.region = region.id.clone();
                    }
                }
                "unit" | "per" => {
                    if let Some(unit) = Unit::parse(&value) {
                        params.unit = unit;
                    }
                }
                "location" | "country" => {
                    let name = config
                        .names
                        .legacy_aliases
                        .get(&value)
                        .cloned()
                        .unwrap_or(value);
                    if !locations.contains(&name) {
                        locations.push(name);
                    }
                }
                "trendline" => {
                    if let Some(on) = parse_bool(&value) {
                        params.trendline = on;
                    }
                }
                "doublingtime" => {
                    if let Some(days) = value.parse::<u32>().ok().filter(|&d| d > 0) {
                        params.doubling_time = days;
                    }
                }
                other => tracing::debug!("Ignoring unknown query key '{}'", other),
            }
        }

        if !locations.is_empty() {
            params.locations = Some(locations);
        }
        params
    }

    /// Encode as a query string; defaults are left out
    pub fn to_query(&self) -> String {
        let defaults = ViewParams::default();
        let mut pairs: Vec<(&str, String)> = Vec::new();

        if self.scale != defaults.scale {
            pairs.push(("scale", self.scale.as_str().to_string()));
        }
        if self.metric != defaults.metric {
            pairs.push(("data", self.metric.as_str().to_string()));
        }
        if self.region != defaults.region {
            pairs.push(("region", self.region.clone()));
        }
        if self.unit != defaults.unit {
            pairs.push(("unit", self.unit.as_str().to_string()));
        }
        for location in self.locations.iter().flatten() {
            pairs.push(("location", location.clone()));
        }
        if self.trendline {
            pairs.push(("trendline", "true".to_string()));
            if self.doubling_time != defaults.doubling_time {
                pairs.push(("doublingtime", self.doubling_time.to_string()));
            }
        }

        pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn share_url(&self, base: &str) -> String {
        let query = self.to_query();
        if query.is_empty() {
            base.to_string()
        } else {
            format!("{}?{}", base.trim_end_matches('?'), query)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_url() {
        let config = Config::default();
        let p = ViewParams::parse(
            "https://example.org/trends/?scale=linear&data=deaths&region=canada&unit=per-capita&location=Italy&location=Korea%2C+South&trendline=true&doublingtime=3",
            &config,
        );
        assert_eq!(p.scale, Scale::Linear);
        assert_eq!(p.metric, Metric::Deaths);
        assert_eq!(p.region, "canada");
        assert_eq!(p.unit, Unit::PerCapita);
        assert_eq!(
            p.locations,
            Some(vec!["Italy".to_string(), "South Korea".to_string()])
        );
        assert!(p.trendline);
        assert_eq!(p.doubling_time, 3);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = Config::default();
        let p = ViewParams::parse(
            "scale=cubic&data=vaccines&region=atlantis&unit=furlongs&doublingtime=-2&trendline=maybe&foo=bar",
            &config,
        );
        assert_eq!(p, ViewParams::default());
    }

    #[test]
    fn test_country_alias_and_dedup() {
        let config = Config::default();
        let p = ViewParams::parse("?country=Mainland+China&location=China", &config);
        assert_eq!(p.locations, Some(vec!["China".to_string()]));
    }

    #[test]
    fn test_export() {
        let config = Config::default();
        let p = ViewParams {
            scale: Scale::Linear,
            locations: Some(vec!["South Korea".to_string(), "US".to_string()]),
            ..Default::default()
        };
        let query = p.to_query();
        assert_eq!(query, "scale=linear&location=South%20Korea&location=US");
        assert_eq!(ViewParams::parse(&query, &config), p);
        assert_eq!(ViewParams::default().share_url("https://x.org/"), "https://x.org/");
    }
}
