//! Covid Trends - Rust Implementation
//!
//! CLI commands:
//! - serve: Start HTTP server
//! - fetch: Download a raw dataset into DATA_DIR
//! - list: Load a view and list its entities
//! - render: Print the chart bundle for a view as JSON

mod chart;
mod config;
mod download;
mod error;
mod logging;
mod normalize;
mod playback;
mod population;
mod query;
mod range;
mod selection;
mod series;
mod server;
mod state;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use config::{Config, Metric, Secrets};
use population::PopulationTable;
use query::ViewParams;
use state::AppState;

#[derive(Parser)]
#[command(name = "covid_trends")]
#[command(about = "Growth trajectories of COVID-19 on a log-log plot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to trends.yaml config
    #[arg(short, long, default_value = "trends.yaml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Port to listen on (defaults to PORT from .env)
        #[arg(short, long)]
        port: Option<u16>,

        /// Initial view as a query string, e.g. "scale=linear&location=Italy"
        #[arg(short, long, default_value = "")]
        query: String,
    },

    /// Download a raw dataset
    Fetch {
        /// cases, deaths or recovered
        #[arg(short, long, default_value = "cases")]
        metric: String,

        /// Region scope id
        #[arg(short, long, default_value = query::DEFAULT_REGION)]
        region: String,
    },

    /// List entities for a view
    List {
        #[arg(short, long, default_value = "")]
        query: String,

        /// Case-insensitive name filter
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Print the chart bundle for a view as JSON
    Render {
        #[arg(short, long, default_value = "")]
        query: String,

        /// 1-based day to render (defaults to the last day)
        #[arg(short, long)]
        day: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let secrets = Secrets::load();

    // Initialize logging first
    logging::init_logging(&secrets.log_dir)?;
    tracing::info!("Covid Trends starting up");

    let cli = Cli::parse();
    tracing::debug!("CLI args parsed: config={:?}", cli.config);

    // Load config
    let config = if cli.config.exists() {
        tracing::info!("Loading config from {:?}", cli.config);
        Config::load(&cli.config)?
    } else {
        tracing::warn!("Config file not found: {:?}, using defaults", cli.config);
        Config::default()
    };
    tracing::info!(
        "Config loaded: {} datasets, {} regions, {} demographics",
        config.datasets.len(),
        config.regions.len(),
        config.demographics.len()
    );

    match cli.command {
        Commands::Serve { port, query } => {
            let state = build_state(config, &query).await?;
            let port = port.unwrap_or(secrets.port);
            let public_url = secrets
                .public_url
                .unwrap_or_else(|| format!("http://localhost:{}/", port));
            server::serve(server::ServerState::new(state, public_url), port).await?;
        }

        Commands::Fetch { metric, region } => {
            let metric = Metric::parse(&metric)
                .ok_or_else(|| anyhow::anyhow!("Unknown metric: {}", metric))?;
            let url = config.dataset_url(metric, &region)?;
            let name = format!("{}_{}", metric.as_str(), region.to_ascii_lowercase());
            let path =
                download::download_raw(url, &name, &PathBuf::from(&secrets.data_dir), &config.fetch)
                    .await?;
            println!("Saved {:?}", path);
        }

        Commands::List { query, search } => {
            let state = load_view(config, &query).await?;
            list_entities(&state, search.as_deref().unwrap_or(""));
        }

        Commands::Render { query, day } => {
            let mut state = load_view(config, &query).await?;
            if let Some(day) = day {
                state.scrub_to(day);
            }
            println!("{}", serde_json::to_string_pretty(&state.chart())?);
        }
    }

    Ok(())
}

/// State for a view, with the population table swapped in when configured.
/// Playback never starts on its own outside the server.
async fn build_state(config: Config, query: &str) -> anyhow::Result<AppState> {
    let view = ViewParams::parse(query, &config);
    let population_url = config.population_url.clone();
    let fetch = config.fetch.clone();
    let mut state = AppState::new(config)?.with_view(view);

    if let Some(url) = population_url {
        match load_population(&url, &fetch).await {
            Ok(table) if table.is_empty() => {
                tracing::warn!("Population table at {} is empty, using built-in demographics", url)
            }
            Ok(table) => state.set_population(table),
            Err(e) => {
                tracing::warn!("Population table unavailable ({}), using built-in demographics", e)
            }
        }
    }

    Ok(state)
}

async fn load_population(
    url: &str,
    fetch: &config::FetchConfig,
) -> Result<PopulationTable, error::DataError> {
    let body = download::fetch_text(url, fetch).await?;
    PopulationTable::from_csv(body.as_bytes())
}

/// Build the state and load its dataset once
async fn load_view(config: Config, query: &str) -> anyhow::Result<AppState> {
    let mut state = build_state(config, query).await?;
    let ticket = state.begin_fetch()?;
    let result = download::fetch_table(&ticket.url, &state.config.fetch).await;
    if let Err(e) = &result {
        anyhow::bail!("Failed to load {}: {}", ticket.url, e);
    }
    state.complete_fetch(ticket, result);
    Ok(state)
}

/// Print entities, marking the selected ones
fn list_entities(state: &AppState, search: &str) {
    let names = state.search(search);
    let view = state.view();
    println!(
        "{} ({}, {}) - {} entities:",
        view.metric.label(),
        view.region,
        view.unit.as_str(),
        names.len()
    );
    println!();

    for name in names {
        let peak = state
            .series()
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.max_value)
            .unwrap_or(0.0);
        let mark = if state.selection().is_selected(name) { "*" } else { " " };
        println!("  {} {} (peak {:.1})", mark, name, peak);
    }
}
