//! HTTP Server - the renderer's channel into the core
//!
//! Endpoints:
//! - GET  /api/chart          → traces/layout/config for the current day
//! - GET  /api/state          → view, playback and selection summary
//! - GET  /api/locations      → entity names, `?search=` filters
//! - GET  /api/share          → shareable query string and URL
//! - GET  /api/regions        → supported region scopes
//! - POST /api/view           → replace the view (may refetch)
//! - POST /api/refresh        → refetch the current dataset
//! - POST /api/select, /api/select-all, /api/deselect-all, /api/toggle-location
//! - POST /api/play, /api/pause, /api/toggle, /api/step/:direction, /api/scrub/:day
//! - POST /api/key            → keyboard surface (space, -, _, +, =)
//! - POST /api/relayout       → manual range / autorange from the renderer
//! - POST /api/hover          → highlight an entity (null clears)
//! - POST /api/mounted        → first render done, may trigger autoplay
//!
//! Each handler holds the state lock for its whole reaction, so reactions
//! never interleave. Ticks and fetches run as separate tasks that take the
//! lock only to apply their result.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::config::Region;
use crate::download;
use crate::playback::Tick;
use crate::query::ViewParams;
use crate::range::Relayout;
use crate::state::{AppState, StateSnapshot};

/// Shared handle passed to every handler
#[derive(Clone)]
pub struct ServerState {
    pub app: Arc<Mutex<AppState>>,
    pub public_url: String,
}

impl ServerState {
    pub fn new(app: AppState, public_url: String) -> Self {
        Self {
            app: Arc::new(Mutex::new(app)),
            public_url,
        }
    }
}

/// Start the HTTP server
pub async fn serve(state: ServerState, port: u16) -> anyhow::Result<()> {
    tracing::info!("Initializing HTTP server on port {}", port);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/chart", get(get_chart))
        .route("/state", get(get_state))
        .route("/locations", get(get_locations))
        .route("/share", get(get_share))
        .route("/regions", get(get_regions))
        .route("/view", post(post_view))
        .route("/refresh", post(post_refresh))
        .route("/select", post(post_select))
        .route("/select-all", post(post_select_all))
        .route("/deselect-all", post(post_deselect_all))
        .route("/toggle-location", post(post_toggle_location))
        .route("/play", post(post_play))
        .route("/pause", post(post_pause))
        .route("/toggle", post(post_toggle))
        .route("/step/:direction", post(post_step))
        .route("/scrub/:day", post(post_scrub))
        .route("/key", post(post_key))
        .route("/relayout", post(post_relayout))
        .route("/hover", post(post_hover))
        .route("/mounted", post(post_mounted))
        .with_state(state.clone());
    tracing::debug!("API routes registered");

    // Static renderer from ./web
    let app = Router::new()
        .nest("/api", api)
        .fallback_service(ServeDir::new("web"))
        .layer(cors);

    // Initial dataset
    spawn_fetch(state.clone());

    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("Starting server on http://localhost:{}", port);
    tracing::info!("  API: http://localhost:{}/api/chart", port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ----------------------------------------------------------------------------
// Background reactions
// ----------------------------------------------------------------------------

/// Fetch the dataset for the current view. The generation ticket makes a
/// slower, older fetch lose to a newer one.
pub fn spawn_fetch(state: ServerState) {
    tokio::spawn(async move {
        let (ticket, fetch) = {
            let mut app = state.app.lock().await;
            match app.begin_fetch() {
                Ok(ticket) => (ticket, app.config.fetch.clone()),
                Err(e) => {
                    crate::log_error!(e);
                    return;
                }
            }
        };

        let result = download::fetch_table(&ticket.url, &fetch).await;

        let mut app = state.app.lock().await;
        app.complete_fetch(ticket, result);
        start_ticks(&state, &mut app);
    });
}

/// Spawn a tick driver if the last reaction started playback. The next tick
/// is only scheduled after the previous one has been applied.
fn start_ticks(state: &ServerState, app: &mut AppState) {
    let Some(epoch) = app.take_pending_ticks() else {
        return;
    };
    let interval = Duration::from_millis(app.config.playback.tick_interval_ms);
    let shared = state.app.clone();

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let mut app = shared.lock().await;
            if app.advance(epoch) == Tick::Stop {
                tracing::debug!("Tick driver for epoch {} finished", epoch);
                break;
            }
        }
    });
}

/// Run a synchronous reaction under the lock, then kick off any ticks it asked for
async fn react<F>(state: &ServerState, f: F) -> Json<StateSnapshot>
where
    F: FnOnce(&mut AppState),
{
    let mut app = state.app.lock().await;
    f(&mut app);
    start_ticks(state, &mut app);
    Json(app.snapshot())
}

// ----------------------------------------------------------------------------
// Queries
// ----------------------------------------------------------------------------

/// GET /api/chart
async fn get_chart(State(state): State<ServerState>) -> impl IntoResponse {
    let app = state.app.lock().await;
    Json(app.chart())
}

/// GET /api/state
async fn get_state(State(state): State<ServerState>) -> impl IntoResponse {
    let app = state.app.lock().await;
    Json(app.snapshot())
}

#[derive(Deserialize)]
struct SearchQuery {
    search: Option<String>,
}

#[derive(Serialize)]
struct LocationEntry {
    name: String,
    selected: bool,
}

/// GET /api/locations?search=
async fn get_locations(
    State(state): State<ServerState>,
    Query(params): Query<SearchQuery>,
) -> impl IntoResponse {
    let app = state.app.lock().await;
    let names = app.search(params.search.as_deref().unwrap_or(""));
    let entries: Vec<LocationEntry> = names
        .into_iter()
        .map(|name| LocationEntry {
            selected: app.selection().is_selected(name),
            name: name.to_string(),
        })
        .collect();
    tracing::debug!("Returning {} locations", entries.len());
    Json(entries)
}

#[derive(Serialize)]
struct ShareResponse {
    query: String,
    url: String,
}

/// GET /api/share
async fn get_share(State(state): State<ServerState>) -> impl IntoResponse {
    let app = state.app.lock().await;
    let view = app.share_view();
    Json(ShareResponse {
        query: view.to_query(),
        url: view.share_url(&state.public_url),
    })
}

/// GET /api/regions
async fn get_regions(State(state): State<ServerState>) -> impl IntoResponse {
    let app = state.app.lock().await;
    let regions: Vec<Region> = app.config.regions.clone();
    Json(regions)
}

// ----------------------------------------------------------------------------
// Commands
// ----------------------------------------------------------------------------

/// POST /api/view
async fn post_view(
    State(state): State<ServerState>,
    Json(view): Json<ViewParams>,
) -> impl IntoResponse {
    tracing::info!("View change: {}", view.to_query());
    let mut refetch = false;
    let snapshot = react(&state, |app| refetch = app.apply_view(view)).await;
    if refetch {
        spawn_fetch(state.clone());
    }
    snapshot
}

#[derive(Deserialize)]
struct RefreshQuery {
    #[serde(default)]
    reselect: bool,
}

/// POST /api/refresh?reselect=true
async fn post_refresh(
    State(state): State<ServerState>,
    Query(params): Query<RefreshQuery>,
) -> impl IntoResponse {
    let snapshot = react(&state, |app| {
        if params.reselect {
            app.request_reselect();
        }
    })
    .await;
    spawn_fetch(state.clone());
    snapshot
}

#[derive(Deserialize)]
struct SelectBody {
    locations: Vec<String>,
}

/// POST /api/select
async fn post_select(
    State(state): State<ServerState>,
    Json(body): Json<SelectBody>,
) -> impl IntoResponse {
    react(&state, |app| app.select(body.locations)).await
}

async fn post_select_all(State(state): State<ServerState>) -> impl IntoResponse {
    react(&state, AppState::select_all).await
}

async fn post_deselect_all(State(state): State<ServerState>) -> impl IntoResponse {
    react(&state, AppState::deselect_all).await
}

#[derive(Deserialize)]
struct NameBody {
    name: Option<String>,
}

/// POST /api/toggle-location
async fn post_toggle_location(
    State(state): State<ServerState>,
    Json(body): Json<NameBody>,
) -> Result<impl IntoResponse, StatusCode> {
    let name = body.name.ok_or(StatusCode::BAD_REQUEST)?;
    Ok(react(&state, |app| app.toggle_location(&name)).await)
}

async fn post_play(State(state): State<ServerState>) -> impl IntoResponse {
    react(&state, AppState::play).await
}

async fn post_pause(State(state): State<ServerState>) -> impl IntoResponse {
    react(&state, AppState::pause).await
}

async fn post_toggle(State(state): State<ServerState>) -> impl IntoResponse {
    react(&state, AppState::toggle_play).await
}

/// POST /api/step/:direction (back | forward)
async fn post_step(
    State(state): State<ServerState>,
    Path(direction): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    match direction.as_str() {
        "back" | "backward" => Ok(react(&state, AppState::step_backward).await),
        "forward" => Ok(react(&state, AppState::step_forward).await),
        other => {
            tracing::warn!("Unknown step direction '{}'", other);
            Err(StatusCode::BAD_REQUEST)
        }
    }
}

/// POST /api/scrub/:day
async fn post_scrub(
    State(state): State<ServerState>,
    Path(day): Path<usize>,
) -> impl IntoResponse {
    react(&state, |app| app.scrub_to(day)).await
}

#[derive(Deserialize)]
struct KeyBody {
    key: String,
}

/// POST /api/key
async fn post_key(
    State(state): State<ServerState>,
    Json(body): Json<KeyBody>,
) -> impl IntoResponse {
    react(&state, |app| app.key(&body.key)).await
}

/// POST /api/relayout
async fn post_relayout(
    State(state): State<ServerState>,
    Json(event): Json<Relayout>,
) -> impl IntoResponse {
    tracing::debug!("Relayout: {:?}", event);
    react(&state, |app| app.relayout(event)).await
}

/// POST /api/hover
async fn post_hover(
    State(state): State<ServerState>,
    Json(body): Json<NameBody>,
) -> impl IntoResponse {
    react(&state, |app| app.hover(body.name)).await
}

/// POST /api/mounted
async fn post_mounted(State(state): State<ServerState>) -> impl IntoResponse {
    react(&state, AppState::graph_mounted).await
}
