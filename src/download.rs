//! Dataset fetching - pull RAW time-series tables from their sources
//!
//! Wide-format CSV: Province/State, Country/Region, Lat, Long, then one
//! column per reporting day. Date columns are kept in file order and never
//! parsed for computation.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::FetchConfig;
use crate::error::DataError;

/// Number of metadata columns before the first date column
const METADATA_COLUMNS: usize = 4;

/// One upstream record: a (country, province) pair with a count per day
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub country_region: String,
    pub province_state: Option<String>,
    pub counts: Vec<u64>,
}

/// Parsed dataset: ordered date labels plus rows aligned to them
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub dates: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn total_days(&self) -> usize {
        self.dates.len()
    }
}

/// Parse a count cell. Anything unparseable counts as zero.
pub fn parse_count(cell: &str) -> u64 {
    let cell = cell.trim();
    if let Ok(n) = cell.parse::<u64>() {
        return n;
    }
    match cell.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v.trunc() as u64,
        _ => 0,
    }
}

/// Parse a wide-format time-series CSV
pub fn parse_table<R: Read>(reader: R) -> Result<RawTable, DataError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();

    let find = |names: &[&str]| {
        headers
            .iter()
            .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
    };
    let country_col = find(&["Country/Region", "Country_Region"])
        .ok_or_else(|| DataError::MissingColumn("Country/Region".to_string()))?;
    let province_col = find(&["Province/State", "Province_State"])
        .ok_or_else(|| DataError::MissingColumn("Province/State".to_string()))?;

    if headers.len() <= METADATA_COLUMNS {
        return Err(DataError::NoDateColumns);
    }
    let dates: Vec<String> = headers
        .iter()
        .skip(METADATA_COLUMNS)
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let country = record.get(country_col).unwrap_or("").trim().to_string();
        if country.is_empty() {
            continue;
        }
        let province = record
            .get(province_col)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        // Short rows pad with zeros so every row lines up with `dates`
        let counts = (0..dates.len())
            .map(|i| record.get(METADATA_COLUMNS + i).map(parse_count).unwrap_or(0))
            .collect();

        rows.push(RawRow {
            country_region: country,
            province_state: province,
            counts,
        });
    }

    tracing::debug!("Parsed {} rows x {} days", rows.len(), dates.len());
    Ok(RawTable { dates, rows })
}

/// Fetch a resource as text. `http(s)://` goes over the network with retries,
/// anything else is read as a local path.
pub async fn fetch_text(url: &str, fetch: &FetchConfig) -> Result<String, DataError> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        let path = url.strip_prefix("file://").unwrap_or(url);
        tracing::debug!("Reading local table {}", path);
        return Ok(tokio::fs::read_to_string(path).await?);
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(fetch.timeout_secs))
        .build()?;

    let mut attempt = 0;
    loop {
        match fetch_once(&client, url).await {
            Ok(body) => return Ok(body),
            Err(e) if attempt + 1 < fetch.retries => {
                let backoff = fetch.retry_backoff_ms.saturating_mul(1 << attempt.min(16));
                tracing::warn!(
                    "Fetch of {} failed (attempt {}): {}; retrying in {}ms",
                    url,
                    attempt + 1,
                    e,
                    backoff
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn fetch_once(client: &reqwest::Client, url: &str) -> Result<String, DataError> {
    tracing::debug!("Fetching from: {}", url);
    let response = client
        .get(url)
        .header("User-Agent", "CovidTrends/0.1")
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(DataError::Status {
            status: response.status().as_u16(),
            url: url.to_string(),
        });
    }

    let body = response.text().await?;
    tracing::debug!("Downloaded {} bytes", body.len());
    Ok(body)
}

/// Fetch and parse a time-series table
pub async fn fetch_table(url: &str, fetch: &FetchConfig) -> Result<RawTable, DataError> {
    let body = fetch_text(url, fetch).await?;
    parse_table(body.as_bytes())
}

/// Download a table and store the RAW CSV under `output_dir`
pub async fn download_raw(
    url: &str,
    name: &str,
    output_dir: &Path,
    fetch: &FetchConfig,
) -> Result<PathBuf, DataError> {
    tracing::info!("Downloading {} from {}", name, url);
    let body = fetch_text(url, fetch).await?;

    // Validate before writing so a bad download never replaces a good cache
    let table = parse_table(body.as_bytes())?;

    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(format!("{}.csv", name));
    std::fs::write(&path, &body)?;
    tracing::info!(
        "Saved raw table ({} rows, {} days) to {:?}",
        table.rows.len(),
        table.total_days(),
        path
    );

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Province/State,Country/Region,Lat,Long,1/22/20,1/23/20,1/24/20
,Italy,41.9,12.6,1,2,3
Hong Kong,China,22.3,114.2,0,5,x
Hubei,China,30.9,112.3,444,,549
";

    #[test]
    fn test_parse_table() {
        let table = parse_table(SAMPLE.as_bytes()).unwrap();
        assert_eq!(table.dates, vec!["1/22/20", "1/23/20", "1/24/20"]);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0].province_state, None);
        assert_eq!(table.rows[1].province_state.as_deref(), Some("Hong Kong"));
        assert_eq!(table.rows[1].counts, vec![0, 5, 0]);
        assert_eq!(table.rows[2].counts, vec![444, 0, 549]);
    }

    #[test]
    fn test_parse_count_recovers() {
        assert_eq!(parse_count("17"), 17);
        assert_eq!(parse_count(" 12.0 "), 12);
        assert_eq!(parse_count("-4"), 0);
        assert_eq!(parse_count("n/a"), 0);
        assert_eq!(parse_count(""), 0);
    }

    #[test]
    fn test_missing_country_column() {
        let csv = "Province/State,Lat,Long,Foo,1/22/20\n,1,2,3,4\n";
        assert!(matches!(
            parse_table(csv.as_bytes()),
            Err(DataError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_no_date_columns() {
        let csv = "Province/State,Country/Region,Lat,Long\n,Italy,1,2\n";
        assert!(matches!(
            parse_table(csv.as_bytes()),
            Err(DataError::NoDateColumns)
        ));
    }
}
