//! Configuration loader - YAML tables + .env secrets
//!
//! Every table has a built-in default, so a missing `trends.yaml` still gives a
//! working world view. A YAML file only needs the keys it overrides.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ConfigError;

/// Which upstream count is being plotted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cases,
    Deaths,
    Recovered,
}

impl Metric {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cases" | "confirmed" => Some(Metric::Cases),
            "deaths" => Some(Metric::Deaths),
            "recovered" => Some(Metric::Recovered),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cases => "cases",
            Metric::Deaths => "deaths",
            Metric::Recovered => "recovered",
        }
    }

    /// Human label used in chart titles
    pub fn label(&self) -> &'static str {
        match self {
            Metric::Cases => "Confirmed Cases",
            Metric::Deaths => "Reported Deaths",
            Metric::Recovered => "Recoveries",
        }
    }
}

/// Main configuration loaded from trends.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub datasets: Vec<Dataset>,
    pub regions: Vec<Region>,
    pub names: NameConfig,
    pub notable: Vec<String>,
    pub demographics: Vec<Demographic>,
    /// Optional CSV (name,id,population,density) replacing `demographics`
    pub population_url: Option<String>,
    pub series: SeriesConfig,
    pub playback: PlaybackConfig,
    pub fetch: FetchConfig,
}

/// Upstream CSV for one metric in one region scope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub metric: Metric,
    pub region: String,
    pub url: String,
}

/// A supported region scope. `parent: None` is the country-level world view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NameConfig {
    /// Labels dropped before aggregation, matched against both label columns
    pub exclude: Vec<String>,
    /// Applied in order; a later entry for the same source label wins
    pub renames: Vec<Rename>,
    /// Sub-national regions promoted to country level
    pub pull_up: Vec<PullUp>,
    /// Old location names accepted in shared URLs
    pub legacy_aliases: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullUp {
    pub parent: String,
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Demographic {
    pub name: String,
    pub id: String,
    pub population: f64,
    /// People per square kilometre
    pub density: f64,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesConfig {
    pub window_size: usize,
    pub top_k: usize,
    pub thresholds: Thresholds,
    pub per_capita_scale: f64,
    pub density_scale: f64,
}

/// Reporting thresholds per unit. Values below are masked as invalid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub absolute: f64,
    pub per_capita: f64,
    pub density: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub tick_interval_ms: u64,
    pub autoplay: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub retries: u32,
    pub retry_backoff_ms: u64,
    pub timeout_secs: u64,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            window_size: 7,
            top_k: 10,
            thresholds: Thresholds::default(),
            per_capita_scale: 1_000_000.0,
            density_scale: 1.0,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            absolute: 50.0,
            per_capita: 1.0,
            density: 30.0,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 250,
            autoplay: true,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            retry_backoff_ms: 500,
            timeout_secs: 60,
        }
    }
}

const CSSE_BASE: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series";

impl Default for Config {
    fn default() -> Self {
        let regions: Vec<Region> = [
            ("world", "World", None),
            ("australia", "Australia", Some("Australia")),
            ("canada", "Canada", Some("Canada")),
            ("china", "China", Some("China")),
        ]
        .into_iter()
        .map(|(id, name, parent)| Region {
            id: id.to_string(),
            name: name.to_string(),
            parent: parent.map(str::to_string),
        })
        .collect();

        // All scopes slice the same global files by Province/State
        let mut datasets = Vec::new();
        for region in &regions {
            for (metric, file) in [
                (Metric::Cases, "confirmed"),
                (Metric::Deaths, "deaths"),
                (Metric::Recovered, "recovered"),
            ] {
                datasets.push(Dataset {
                    metric,
                    region: region.id.clone(),
                    url: format!("{}/time_series_covid19_{}_global.csv", CSSE_BASE, file),
                });
            }
        }

        let renames = [
            ("Taiwan*", "Taiwan"),
            ("Korea, South", "South Korea"),
            ("Republic of Korea", "South Korea"),
            ("Mainland China", "China"),
            ("Iran (Islamic Republic of)", "Iran"),
            ("Viet Nam", "Vietnam"),
            ("Russian Federation", "Russia"),
            ("Czech Republic", "Czechia"),
            ("UK", "United Kingdom"),
            ("Hong Kong SAR", "Hong Kong"),
            ("Macao SAR", "Macau"),
            ("Macao", "Macau"),
            ("Burma", "Myanmar"),
            ("Congo (Kinshasa)", "DR Congo"),
            ("Congo (Brazzaville)", "Congo"),
            ("Cote d'Ivoire", "Ivory Coast"),
            ("West Bank and Gaza", "Palestine"),
        ]
        .into_iter()
        .map(|(from, to)| Rename {
            from: from.to_string(),
            to: to.to_string(),
        })
        .collect();

        let legacy_aliases = [
            ("Korea, South", "South Korea"),
            ("Mainland China", "China"),
            ("Taiwan*", "Taiwan"),
            ("Macao", "Macau"),
            ("UK", "United Kingdom"),
        ]
        .into_iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();

        Config {
            datasets,
            regions,
            names: NameConfig {
                exclude: [
                    "Cruise Ship",
                    "Diamond Princess",
                    "Grand Princess",
                    "MS Zaandam",
                    "Recovered",
                    "Repatriated Travellers",
                    "Summer Olympics 2020",
                    "Winter Olympics 2022",
                ]
                .into_iter()
                .map(str::to_string)
                .collect(),
                renames,
                pull_up: vec![
                    PullUp {
                        parent: "China".to_string(),
                        region: "Hong Kong".to_string(),
                    },
                    PullUp {
                        parent: "China".to_string(),
                        region: "Macau".to_string(),
                    },
                ],
                legacy_aliases,
            },
            notable: [
                "Australia",
                "Canada",
                "China",
                "France",
                "Germany",
                "India",
                "Iran",
                "Italy",
                "Japan",
                "South Korea",
                "Spain",
                "Switzerland",
                "United Kingdom",
                "US",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            demographics: default_demographics(),
            population_url: None,
            series: SeriesConfig::default(),
            playback: PlaybackConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

/// Population and density (people/km²) per country-level label
fn default_demographics() -> Vec<Demographic> {
    let table: &[(&str, &str, f64, f64)] = &[
        ("Afghanistan", "AFG", 36_670_000.0, 56.0),
        ("Albania", "ALB", 2_910_000.0, 105.0),
        ("Algeria", "DZA", 45_000_000.0, 18.0),
        ("Andorra", "AND", 80_000.0, 164.0),
        ("Angola", "AGO", 32_866_000.0, 26.0),
        ("Antigua and Barbuda", "ATG", 100_000.0, 223.0),
        ("Argentina", "ARG", 45_196_000.0, 17.0),
        ("Armenia", "ARM", 2_980_000.0, 104.0),
        ("Aruba", "ABW", 110_000.0, 593.0),
        ("Australia", "AUS", 25_500_000.0, 3.3),
        ("Austria", "AUT", 9_006_000.0, 109.0),
        ("Azerbaijan", "AZE", 11_000_000.0, 123.0),
        ("Bahamas", "BHS", 380_000.0, 39.0),
        ("Bahrain", "BHR", 1_700_000.0, 2_239.0),
        ("Bangladesh", "BGD", 164_689_000.0, 1_265.0),
        ("Barbados", "BRB", 290_000.0, 668.0),
        ("Belarus", "BLR", 10_200_000.0, 47.0),
        ("Belgium", "BEL", 11_590_000.0, 383.0),
        ("Belize", "BLZ", 398_000.0, 17.0),
        ("Benin", "BEN", 10_000_000.0, 108.0),
        ("Bermuda", "BMU", 60_000.0, 1_246.0),
        ("Bhutan", "BTN", 1_000_000.0, 20.0),
        ("Bolivia", "BOL", 15_000_000.0, 11.0),
        ("Bosnia and Herzegovina", "BIH", 3_200_000.0, 64.0),
        ("Botswana", "BWA", 2_352_000.0, 4.0),
        ("Brazil", "BRA", 212_559_000.0, 25.0),
        ("Brunei", "BRN", 440_000.0, 83.0),
        ("Bulgaria", "BGR", 7_130_000.0, 64.0),
        ("Burkina Faso", "BFA", 16_500_000.0, 76.0),
        ("Burundi", "BDI", 11_891_000.0, 463.0),
        ("Cabo Verde", "CPV", 556_000.0, 138.0),
        ("Cambodia", "KHM", 18_500_000.0, 95.0),
        ("Cameroon", "CMR", 26_000_000.0, 56.0),
        ("Canada", "CAN", 37_742_000.0, 4.2),
        ("Cayman Islands", "CYM", 70_000.0, 274.0),
        ("Central African Republic", "CAF", 5_000_000.0, 8.0),
        ("Chad", "TCD", 16_670_000.0, 13.0),
        ("Channel Islands", "CHI", 170_000.0, 915.0),
        ("Chile", "CHL", 19_116_000.0, 26.0),
        ("China", "CHN", 1_439_324_000.0, 153.0),
        ("Colombia", "COL", 50_883_000.0, 46.0),
        ("Comoros", "COM", 870_000.0, 467.0),
        ("Congo", "COG", 6_000_000.0, 16.0),
        ("Costa Rica", "CRI", 5_120_000.0, 100.0),
        ("Croatia", "HRV", 4_070_000.0, 73.0),
        ("Cuba", "CUB", 11_000_000.0, 106.0),
        ("Curaçao", "CUW", 170_000.0, 366.0),
        ("Cyprus", "CYP", 1_220_000.0, 131.0),
        ("Czechia", "CZE", 10_709_000.0, 139.0),
        ("DR Congo", "COD", 70_000_000.0, 40.0),
        ("Denmark", "DNK", 5_792_000.0, 137.0),
        ("Djibouti", "DJI", 1_000_000.0, 43.0),
        ("Dominica", "DMA", 72_000.0, 96.0),
        ("Dominican Republic", "DOM", 10_848_000.0, 225.0),
        ("Ecuador", "ECU", 17_330_000.0, 71.0),
        ("Egypt", "EGY", 102_334_000.0, 103.0),
        ("El Salvador", "SLV", 5_000_000.0, 313.0),
        ("Equatorial Guinea", "GNQ", 1_500_000.0, 50.0),
        ("Eritrea", "ERI", 3_546_000.0, 35.0),
        ("Estonia", "EST", 1_330_000.0, 31.0),
        ("Eswatini", "SWZ", 1_110_000.0, 67.0),
        ("Ethiopia", "ETH", 116_670_000.0, 115.0),
        ("Faeroe Islands", "FRO", 50_000.0, 35.0),
        ("Fiji", "FJI", 1_000_000.0, 49.0),
        ("Finland", "FIN", 5_541_000.0, 18.0),
        ("France", "FRA", 65_274_000.0, 119.0),
        ("French Guiana", "GUF", 300_000.0, 4.0),
        ("French Polynesia", "PYF", 290_000.0, 77.0),
        ("Gabon", "GAB", 3_000_000.0, 9.0),
        ("Gambia", "GMB", 2_500_000.0, 239.0),
        ("Georgia", "GEO", 4_000_000.0, 57.0),
        ("Germany", "DEU", 83_784_000.0, 240.0),
        ("Ghana", "GHA", 27_500_000.0, 137.0),
        ("Gibraltar", "GIB", 30_000.0, 3_369.0),
        ("Greece", "GRC", 10_423_000.0, 81.0),
        ("Greenland", "GRL", 60_000.0, 0.14),
        ("Grenada", "GRD", 113_000.0, 331.0),
        ("Guadeloupe", "GLP", 400_000.0, 237.0),
        ("Guam", "GUM", 170_000.0, 313.0),
        ("Guatemala", "GTM", 18_000_000.0, 167.0),
        ("Guinea", "GIN", 13_133_000.0, 53.0),
        ("Guinea-Bissau", "GNB", 1_968_000.0, 70.0),
        ("Guyana", "GUY", 830_000.0, 4.0),
        ("Haiti", "HTI", 11_403_000.0, 414.0),
        ("Holy See", "VAT", 800.0, 1_818.0),
        ("Honduras", "HND", 12_000_000.0, 89.0),
        ("Hong Kong", "HKG", 7_497_000.0, 7_140.0),
        ("Hungary", "HUN", 9_660_000.0, 107.0),
        ("Iceland", "ISL", 340_000.0, 3.0),
        ("India", "IND", 1_380_004_000.0, 464.0),
        ("Indonesia", "IDN", 273_524_000.0, 151.0),
        ("Iran", "IRN", 83_993_000.0, 52.0),
        ("Iraq", "IRQ", 40_223_000.0, 93.0),
        ("Ireland", "IRL", 4_938_000.0, 72.0),
        ("Isle of Man", "IMN", 80_000.0, 149.0),
        ("Israel", "ISR", 8_656_000.0, 400.0),
        ("Italy", "ITA", 60_462_000.0, 206.0),
        ("Ivory Coast", "CIV", 30_000_000.0, 83.0),
        ("Jamaica", "JAM", 3_000_000.0, 273.0),
        ("Japan", "JPN", 126_476_000.0, 347.0),
        ("Jordan", "JOR", 9_860_000.0, 115.0),
        ("Kazakhstan", "KAZ", 22_000_000.0, 7.0),
        ("Kenya", "KEN", 70_000_000.0, 94.0),
        ("Kiribati", "KIR", 119_000.0, 147.0),
        ("Kosovo", "XKX", 1_810_000.0, 159.0),
        ("Kuwait", "KWT", 4_230_000.0, 240.0),
        ("Kyrgyzstan", "KGZ", 6_000_000.0, 34.0),
        ("Laos", "LAO", 7_276_000.0, 32.0),
        ("Latvia", "LVA", 1_870_000.0, 30.0),
        ("Lebanon", "LBN", 6_830_000.0, 667.0),
        ("Lesotho", "LSO", 2_142_000.0, 71.0),
        ("Liberia", "LBR", 5_000_000.0, 52.0),
        ("Libya", "LBY", 6_871_000.0, 4.0),
        ("Liechtenstein", "LIE", 40_000.0, 238.0),
        ("Lithuania", "LTU", 2_670_000.0, 43.0),
        ("Luxembourg", "LUX", 630_000.0, 242.0),
        ("Macau", "MAC", 649_000.0, 21_645.0),
        ("Madagascar", "MDG", 27_691_000.0, 48.0),
        ("Malawi", "MWI", 19_130_000.0, 203.0),
        ("Malaysia", "MYS", 32_366_000.0, 99.0),
        ("Maldives", "MDV", 540_000.0, 1_802.0),
        ("Mali", "MLI", 20_251_000.0, 17.0),
        ("Malta", "MLT", 440_000.0, 1_380.0),
        ("Marshall Islands", "MHL", 59_000.0, 329.0),
        ("Martinique", "MTQ", 380_000.0, 354.0),
        ("Mauritania", "MRT", 5_000_000.0, 5.0),
        ("Mauritius", "MUS", 1_170_000.0, 626.0),
        ("Mayotte", "MYT", 270_000.0, 728.0),
        ("Mexico", "MEX", 128_933_000.0, 66.0),
        ("Micronesia", "FSM", 115_000.0, 164.0),
        ("Moldova", "MDA", 4_080_000.0, 123.0),
        ("Monaco", "MCO", 40_000.0, 26_337.0),
        ("Mongolia", "MNG", 3_000_000.0, 2.0),
        ("Montenegro", "MNE", 620_000.0, 47.0),
        ("Montserrat", "MSR", 10_000.0, 50.0),
        ("Morocco", "MAR", 31_500_000.0, 83.0),
        ("Mozambique", "MOZ", 31_255_000.0, 40.0),
        ("Myanmar", "MMR", 54_410_000.0, 83.0),
        ("Namibia", "NAM", 3_000_000.0, 3.0),
        ("Nauru", "NRU", 10_800.0, 541.0),
        ("Nepal", "NPL", 33_330_000.0, 203.0),
        ("Netherlands", "NLD", 17_135_000.0, 508.0),
        ("New Caledonia", "NCL", 290_000.0, 16.0),
        ("New Zealand", "NZL", 4_822_000.0, 18.0),
        ("Nicaragua", "NIC", 5_000_000.0, 55.0),
        ("Niger", "NER", 25_000_000.0, 19.0),
        ("Nigeria", "NGA", 206_140_000.0, 226.0),
        ("North Macedonia", "MKD", 2_080_000.0, 83.0),
        ("Norway", "NOR", 5_421_000.0, 15.0),
        ("Oman", "OMN", 5_330_000.0, 16.0),
        ("Pakistan", "PAK", 220_892_000.0, 287.0),
        ("Palau", "PLW", 18_000.0, 39.0),
        ("Palestine", "PSE", 5_220_000.0, 847.0),
        ("Panama", "PAN", 4_280_000.0, 58.0),
        ("Papua New Guinea", "PNG", 8_947_000.0, 20.0),
        ("Paraguay", "PRY", 6_500_000.0, 18.0),
        ("Peru", "PER", 32_972_000.0, 26.0),
        ("Philippines", "PHL", 109_581_000.0, 368.0),
        ("Poland", "POL", 37_847_000.0, 124.0),
        ("Portugal", "PRT", 10_197_000.0, 111.0),
        ("Puerto Rico", "PRI", 3_000_000.0, 360.0),
        ("Qatar", "QAT", 2_880_000.0, 248.0),
        ("Romania", "ROU", 19_238_000.0, 84.0),
        ("Russia", "RUS", 145_934_000.0, 9.0),
        ("Rwanda", "RWA", 13_750_000.0, 525.0),
        ("Réunion", "REU", 900_000.0, 359.0),
        ("Saint Kitts and Nevis", "KNA", 53_000.0, 205.0),
        ("Saint Lucia", "LCA", 180_000.0, 301.0),
        ("Saint Martin", "MAF", 40_000.0, 730.0),
        ("Samoa", "WSM", 198_000.0, 70.0),
        ("San Marino", "SMR", 30_000.0, 566.0),
        ("Sao Tome and Principe", "STP", 219_000.0, 228.0),
        ("Saudi Arabia", "SAU", 34_814_000.0, 16.0),
        ("Senegal", "SEN", 18_000_000.0, 87.0),
        ("Serbia", "SRB", 8_580_000.0, 100.0),
        ("Seychelles", "SYC", 100_000.0, 214.0),
        ("Sierra Leone", "SLE", 7_977_000.0, 111.0),
        ("Singapore", "SGP", 5_850_000.0, 8_358.0),
        ("Sint Maarten", "SXM", 40_000.0, 1_261.0),
        ("Slovakia", "SVK", 5_390_000.0, 114.0),
        ("Slovenia", "SVN", 2_080_000.0, 103.0),
        ("Solomon Islands", "SLB", 687_000.0, 25.0),
        ("Somalia", "SOM", 16_670_000.0, 25.0),
        ("South Africa", "ZAF", 59_309_000.0, 49.0),
        ("South Korea", "KOR", 51_269_000.0, 527.0),
        ("South Sudan", "SSD", 11_194_000.0, 18.0),
        ("Spain", "ESP", 46_755_000.0, 94.0),
        ("Sri Lanka", "LKA", 20_000_000.0, 341.0),
        ("St. Barth", "BLM", 10_000.0, 470.0),
        ("St. Vincent Grenadines", "VCT", 110_000.0, 284.0),
        ("Sudan", "SDN", 40_000_000.0, 25.0),
        ("Suriname", "SUR", 500_000.0, 4.0),
        ("Sweden", "SWE", 10_099_000.0, 25.0),
        ("Switzerland", "CHE", 8_655_000.0, 219.0),
        ("Syria", "SYR", 17_501_000.0, 95.0),
        ("Taiwan", "TWN", 23_817_000.0, 673.0),
        ("Tajikistan", "TJK", 9_538_000.0, 68.0),
        ("Tanzania", "TZA", 60_000_000.0, 67.0),
        ("Thailand", "THA", 69_800_000.0, 137.0),
        ("Timor-Leste", "TLS", 1_318_000.0, 89.0),
        ("Togo", "TGO", 10_000_000.0, 152.0),
        ("Tonga", "TON", 106_000.0, 147.0),
        ("Trinidad and Tobago", "TTO", 1_500_000.0, 273.0),
        ("Tunisia", "TUN", 13_000_000.0, 76.0),
        ("Turkey", "TUR", 84_339_000.0, 110.0),
        ("Tuvalu", "TUV", 11_800.0, 393.0),
        ("U.S. Virgin Islands", "VIR", 100_000.0, 298.0),
        ("US", "USA", 331_003_000.0, 36.0),
        ("Uganda", "UGA", 45_741_000.0, 229.0),
        ("Ukraine", "UKR", 43_734_000.0, 75.0),
        ("United Arab Emirates", "ARE", 10_000_000.0, 118.0),
        ("United Kingdom", "GBR", 67_886_000.0, 281.0),
        ("Uruguay", "URY", 3_430_000.0, 20.0),
        ("Uzbekistan", "UZB", 32_860_000.0, 79.0),
        ("Vanuatu", "VUT", 307_000.0, 25.0),
        ("Venezuela", "VEN", 42_000_000.0, 32.0),
        ("Vietnam", "VNM", 97_339_000.0, 314.0),
        ("Yemen", "YEM", 29_826_000.0, 56.0),
        ("Zambia", "ZMB", 20_000_000.0, 25.0),
        ("Zimbabwe", "ZWE", 14_863_000.0, 38.0),
    ];

    // Other spellings seen in upstream tables and old share links
    let aliases: &[(&str, &str)] = &[
        ("CAF", "CAR"),
        ("COD", "DRC"),
        ("FRO", "Faroe Islands"),
        ("REU", "Reunion"),
        ("BLM", "Saint Barthelemy"),
        ("VCT", "Saint Vincent and the Grenadines"),
        ("VAT", "Vatican City"),
        ("PSE", "West Bank and Gaza"),
        ("CIV", "Cote d'Ivoire"),
        ("MMR", "Burma"),
        ("TWN", "Taiwan*"),
        ("KOR", "Korea, South"),
    ];

    table
        .iter()
        .map(|&(name, id, population, density)| Demographic {
            name: name.to_string(),
            id: id.to_string(),
            population,
            density,
            aliases: aliases
                .iter()
                .filter(|(alias_id, _)| *alias_id == id)
                .map(|(_, alias)| alias.to_string())
                .collect(),
        })
        .collect()
}

/// Secrets loaded from .env
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub data_dir: String,
    pub log_dir: String,
    pub port: u16,
    /// Base URL used for share links
    pub public_url: Option<String>,
}

impl Config {
    /// Load configuration from YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Get region by ID
    pub fn get_region(&self, id: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.id.eq_ignore_ascii_case(id))
    }

    /// Resolve the dataset URL for a metric in a region scope
    pub fn dataset_url(&self, metric: Metric, region: &str) -> Result<&str, ConfigError> {
        if self.get_region(region).is_none() {
            return Err(ConfigError::UnknownRegion(region.to_string()));
        }
        self.datasets
            .iter()
            .find(|d| d.metric == metric && d.region.eq_ignore_ascii_case(region))
            .map(|d| d.url.as_str())
            .ok_or_else(|| ConfigError::NoDataset {
                metric: metric.as_str().to_string(),
                region: region.to_string(),
            })
    }
}

impl Secrets {
    /// Load secrets from .env file
    pub fn load() -> Self {
        dotenvy::dotenv().ok();

        Secrets {
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            log_dir: std::env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8080),
            public_url: std::env::var("PUBLIC_URL").ok(),
        }
    }
}
