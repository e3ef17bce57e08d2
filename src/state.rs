//! Application State - Single Source of Truth (SSOT)
//!
//! One explicit struct owns the dataset, the derived series and every piece of
//! view state. Mutating operations finish by running the recompute pipeline
//! (normalize -> build series -> day bounds + ranges) themselves, so the
//! derived state is always consistent when a call returns.
//!
//! Fetches are tagged with a generation number. Only the result for the
//! newest `begin_fetch` is applied; anything older is dropped. A metric or
//! region change only becomes part of the view once its dataset has loaded,
//! so the view always describes the data on screen.

use std::sync::Arc;

use serde::Serialize;

use crate::chart::{self, ChartBundle, ChartView};
use crate::config::{Config, Metric};
use crate::download::RawTable;
use crate::error::{ConfigError, DataError};
use crate::normalize::{self, NameTables, RegionMode};
use crate::playback::{KeyCommand, Playback, PlaybackSnapshot, Tick};
use crate::population::PopulationTable;
use crate::query::{ViewParams, DEFAULT_REGION};
use crate::range::{Relayout, RangeInputs, RangeState, Scale};
use crate::selection::SelectionStore;
use crate::series::{self, EntitySeries, SeriesParams, Unit};

/// Dataset a view needs: which metric in which region scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTarget {
    pub metric: Metric,
    pub region: String,
    /// Recompute the default selection once this dataset lands
    pub reselect: bool,
}

/// Handed out by `begin_fetch`, returned with the result
#[derive(Debug, Clone)]
pub struct FetchTicket {
    pub generation: u64,
    pub url: String,
    pub target: DataTarget,
}

/// Read-only summary for API clients
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub view: ViewParams,
    pub playback: PlaybackSnapshot,
    pub date: Option<String>,
    pub entities: usize,
    pub selected: Vec<String>,
    pub manual_range: bool,
    pub generation: u64,
    /// A requested metric/region is still loading
    pub loading: bool,
    pub last_error: Option<String>,
}

pub struct AppState {
    pub config: Arc<Config>,
    tables: NameTables,
    population: PopulationTable,
    view: ViewParams,
    /// Requested dataset that has not loaded yet
    pending: Option<DataTarget>,
    table: Option<RawTable>,
    series: Vec<EntitySeries>,
    selection: SelectionStore,
    playback: Playback,
    ranges: RangeState,
    generation: u64,
    /// Recompute the default selection on the next dataset
    reselect: bool,
    highlighted: Option<String>,
    last_error: Option<String>,
    /// Epoch of a play that still needs a tick driver
    pending_ticks: Option<u64>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let tables = NameTables::from_config(&config.names)?;
        let population = PopulationTable::from_demographics(&config.demographics);
        let playback = Playback::new(config.playback.autoplay);

        Ok(Self {
            config: Arc::new(config),
            tables,
            population,
            view: ViewParams::default(),
            pending: None,
            table: None,
            series: Vec::new(),
            selection: SelectionStore::default(),
            playback,
            ranges: RangeState::default(),
            generation: 0,
            reselect: true,
            highlighted: None,
            last_error: None,
            pending_ticks: None,
        })
    }

    /// Initial view (e.g. from a shared URL). Explicit locations replace the
    /// default selection.
    pub fn with_view(mut self, view: ViewParams) -> Self {
        if let Some(locations) = &view.locations {
            self.selection.select(locations.iter().cloned());
            self.reselect = false;
        }
        self.view = view;
        self
    }

    pub fn set_population(&mut self, population: PopulationTable) {
        tracing::info!("Population table loaded: {} records", population.len());
        self.population = population;
        self.recompute();
    }

    pub fn view(&self) -> &ViewParams {
        &self.view
    }

    pub fn series(&self) -> &[EntitySeries] {
        &self.series
    }

    pub fn selection(&self) -> &SelectionStore {
        &self.selection
    }

    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    pub fn ranges(&self) -> &RangeState {
        &self.ranges
    }

    pub fn dates(&self) -> &[String] {
        self.table.as_ref().map(|t| t.dates.as_slice()).unwrap_or(&[])
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // ------------------------------------------------------------------
    // Fetch lifecycle
    // ------------------------------------------------------------------

    /// Dataset the next fetch should load: the pending request, or the
    /// current view
    fn target(&self) -> DataTarget {
        self.pending.clone().unwrap_or_else(|| DataTarget {
            metric: self.view.metric,
            region: self.view.region.clone(),
            reselect: false,
        })
    }

    pub fn begin_fetch(&mut self) -> Result<FetchTicket, ConfigError> {
        let target = self.target();
        let url = self
            .config
            .dataset_url(target.metric, &target.region)?
            .to_string();
        self.generation += 1;
        tracing::debug!("Fetch generation {} -> {}", self.generation, url);
        Ok(FetchTicket {
            generation: self.generation,
            url,
            target,
        })
    }

    /// Apply a fetch result. Returns true if it replaced the dataset.
    pub fn complete_fetch(&mut self, ticket: FetchTicket, result: Result<RawTable, DataError>) -> bool {
        if ticket.generation != self.generation {
            tracing::warn!(
                "Discarding stale fetch (generation {}, current {})",
                ticket.generation,
                self.generation
            );
            return false;
        }

        match result {
            Ok(table) => {
                tracing::info!(
                    "Dataset loaded: {} rows, {} days from {}",
                    table.rows.len(),
                    table.total_days(),
                    ticket.url
                );
                self.view.metric = ticket.target.metric;
                self.view.region = ticket.target.region;
                self.reselect |= ticket.target.reselect;
                self.pending = None;
                self.table = Some(table);
                self.last_error = None;
                self.recompute();
                true
            }
            Err(e) => {
                crate::log_error!(e, url = %ticket.url);
                if self.pending.take().is_some() {
                    tracing::warn!(
                        "Keeping {} for {}",
                        self.view.metric.as_str(),
                        self.view.region
                    );
                }
                self.last_error = Some(e.to_string());
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Recompute pipeline
    // ------------------------------------------------------------------

    fn region_mode(&self) -> RegionMode {
        self.config
            .get_region(&self.view.region)
            .map(RegionMode::for_region)
            .unwrap_or(RegionMode::Countries)
    }

    /// Full rebuild from the raw table
    pub fn recompute(&mut self) {
        let Some(table) = &self.table else {
            return;
        };

        let entities = normalize::normalize(&table.rows, &self.region_mode(), &self.tables);
        let params = SeriesParams::from_config(&self.config.series, self.view.unit);
        self.series = series::build(
            &table.rows,
            &entities,
            table.total_days(),
            &params,
            Some(&self.population),
        );

        self.selection
            .set_available(self.series.iter().map(|s| s.name.clone()).collect());
        if self.reselect {
            let defaults = series::default_selection(
                &self.series,
                self.config.series.top_k,
                &self.config.notable,
            );
            tracing::info!("Default selection: {} locations", defaults.len());
            self.selection.select(defaults);
            self.reselect = false;
        }

        self.refresh_derived();
    }

    fn selected_series(&self) -> Vec<&EntitySeries> {
        self.series
            .iter()
            .filter(|s| self.selection.is_selected(&s.name))
            .collect()
    }

    /// Day bounds and axis ranges from the current selection
    fn refresh_derived(&mut self) {
        let total_days = self.dates().len();
        let selected = self.selected_series();
        let min_day = series::min_valid_day(selected.iter().copied());

        let cases: Vec<f64> = selected.iter().flat_map(|s| s.cases.iter().copied()).collect();
        let slopes: Vec<f64> = selected.iter().flat_map(|s| s.slope.iter().copied()).collect();
        let inputs = RangeInputs {
            selection: selected.iter().map(|s| s.name.clone()).collect(),
            metric: self.view.metric,
            region: self.view.region.clone(),
            unit: self.view.unit,
            scale: self.view.scale,
        };

        self.ranges.refresh(inputs, &cases, &slopes);
        self.playback.set_bounds(min_day, total_days);
        if let Some(epoch) = self.playback.try_autoplay() {
            self.pending_ticks = Some(epoch);
        }
    }

    // ------------------------------------------------------------------
    // View changes
    // ------------------------------------------------------------------

    /// Request a metric. Returns true when a refetch is needed. The view
    /// switches once the dataset loads; the selection is kept.
    pub fn set_metric(&mut self, metric: Metric) -> bool {
        let target = self.target();
        if target.metric == metric {
            return false;
        }
        self.pending = Some(DataTarget { metric, ..target });
        true
    }

    /// Request a region scope. Returns true when a refetch is needed. Unknown
    /// ids fall back to the default region. The entity set changes, so the
    /// default selection is recomputed when the dataset loads.
    pub fn set_region(&mut self, region: &str) -> bool {
        let id = match self.config.get_region(region) {
            Some(r) => r.id.clone(),
            None => {
                tracing::warn!("Unknown region '{}', using {}", region, DEFAULT_REGION);
                DEFAULT_REGION.to_string()
            }
        };
        let target = self.target();
        if target.region == id {
            return false;
        }
        self.pending = Some(DataTarget {
            region: id,
            reselect: true,
            ..target
        });
        true
    }

    pub fn set_unit(&mut self, unit: Unit) {
        if self.view.unit != unit {
            self.view.unit = unit;
            self.recompute();
        }
    }

    pub fn set_scale(&mut self, scale: Scale) {
        if self.view.scale != scale {
            self.view.scale = scale;
            self.refresh_derived();
        }
    }

    pub fn set_trendline(&mut self, enabled: bool, doubling_time: u32) {
        self.view.trendline = enabled;
        self.view.doubling_time = doubling_time.max(1);
    }

    /// Apply a whole view at once. Returns true when a refetch is needed.
    /// Unit, scale and trend line apply to the loaded data right away.
    pub fn apply_view(&mut self, view: ViewParams) -> bool {
        let mut refetch = self.set_metric(view.metric);
        refetch |= self.set_region(&view.region);
        if let Some(locations) = view.locations {
            self.selection.select(locations);
            self.reselect = false;
            if let Some(pending) = &mut self.pending {
                pending.reselect = false;
            }
        }
        self.view.unit = view.unit;
        self.view.scale = view.scale;
        self.set_trendline(view.trendline, view.doubling_time);
        self.recompute();
        refetch
    }

    /// Ask for the default selection again on the next rebuild
    pub fn request_reselect(&mut self) {
        self.reselect = true;
        self.recompute();
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    pub fn select<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection.select(names);
        self.refresh_derived();
    }

    pub fn toggle_location(&mut self, name: &str) {
        self.selection.toggle(name);
        self.refresh_derived();
    }

    pub fn select_all(&mut self) {
        self.selection.select_all();
        self.refresh_derived();
    }

    pub fn deselect_all(&mut self) {
        self.selection.deselect_all();
        self.refresh_derived();
    }

    pub fn search(&self, query: &str) -> Vec<&str> {
        self.selection.search(query)
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    fn schedule(&mut self, epoch: Option<u64>) {
        if epoch.is_some() {
            self.pending_ticks = epoch;
        }
    }

    /// Epoch a tick driver should be started for, if any
    pub fn take_pending_ticks(&mut self) -> Option<u64> {
        self.pending_ticks.take()
    }

    pub fn play(&mut self) {
        let epoch = self.playback.play();
        self.schedule(epoch);
    }

    pub fn pause(&mut self) {
        self.playback.pause();
    }

    pub fn toggle_play(&mut self) {
        let epoch = self.playback.toggle();
        self.schedule(epoch);
    }

    pub fn step_backward(&mut self) {
        self.playback.step_backward();
    }

    pub fn step_forward(&mut self) {
        self.playback.step_forward();
    }

    pub fn scrub_to(&mut self, day: usize) {
        self.playback.scrub_to(day);
    }

    pub fn key(&mut self, key: &str) {
        if let Some(command) = KeyCommand::from_key(key) {
            let epoch = self.playback.key(command);
            self.schedule(epoch);
        }
    }

    pub fn graph_mounted(&mut self) {
        let epoch = self.playback.mounted();
        self.schedule(epoch);
    }

    pub fn advance(&mut self, epoch: u64) -> Tick {
        self.playback.advance(epoch)
    }

    // ------------------------------------------------------------------
    // Renderer events and output
    // ------------------------------------------------------------------

    pub fn relayout(&mut self, event: Relayout) {
        self.ranges.apply(event);
        if event == Relayout::Autorange {
            self.refresh_derived();
        }
    }

    pub fn hover(&mut self, name: Option<String>) {
        self.highlighted = name;
    }

    pub fn chart(&self) -> ChartBundle {
        let selected = self.selected_series();
        let view = ChartView {
            metric: self.view.metric,
            unit: self.view.unit,
            scale: self.view.scale,
            window_size: self.config.series.window_size,
            trendline: self.view.trendline.then_some(self.view.doubling_time),
            highlighted: self.highlighted.as_deref(),
        };
        chart::build_chart(
            &selected,
            self.dates(),
            self.playback.current_day(),
            &self.ranges,
            &view,
        )
    }

    /// The current view with the live selection, for sharing
    pub fn share_view(&self) -> ViewParams {
        let selected = self.selection.visible_selection();
        ViewParams {
            locations: (!selected.is_empty()).then_some(selected),
            ..self.view.clone()
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let day = self.playback.current_day();
        StateSnapshot {
            view: self.share_view(),
            playback: self.playback.snapshot(),
            date: day
                .checked_sub(1)
                .and_then(|d| self.dates().get(d))
                .map(|d| chart::display_date(d)),
            entities: self.series.len(),
            selected: self.selection.visible_selection(),
            manual_range: self.ranges.is_manual(),
            generation: self.generation,
            loading: self.pending.is_some(),
            last_error: self.last_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::parse_table;

    const CASES: &str = "\
Province/State,Country/Region,Lat,Long,d1,d2,d3,d4,d5,d6
,Italy,0,0,10,60,120,240,480,960
,Spain,0,0,0,0,50,100,200,400
Hubei,China,0,0,100,200,300,400,500,600
Hong Kong,China,0,0,0,55,60,70,80,90
,Diamond Princess,0,0,700,700,700,700,700,700
,Tinyland,0,0,1,1,1,2,2,2
";

    const DEATHS: &str = "\
Province/State,Country/Region,Lat,Long,d1,d2,d3,d4,d5,d6
,Italy,0,0,0,0,50,60,70,80
,Spain,0,0,0,0,0,50,60,90
Hubei,China,0,0,50,60,70,80,90,100
Hong Kong,China,0,0,0,0,0,0,0,0
";

    fn state() -> AppState {
        let mut config = Config::default();
        config.series.window_size = 1;
        config.series.top_k = 2;
        config.notable = vec!["Spain".to_string()];
        config.playback.autoplay = false;
        AppState::new(config).unwrap()
    }

    fn load(state: &mut AppState, csv: &str) -> bool {
        let ticket = state.begin_fetch().unwrap();
        state.complete_fetch(ticket, parse_table(csv.as_bytes()))
    }

    #[test]
    fn test_first_load_builds_everything() {
        let mut s = state();
        assert!(load(&mut s, CASES));

        let names: Vec<_> = s.series().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["China", "Hong Kong", "Italy", "Spain"]);

        // Top two by peak (Italy, China) plus notable Spain
        assert_eq!(s.selection().visible_selection(), vec!["China", "Italy", "Spain"]);
        assert_eq!(s.playback().total_days(), 6);
        assert_eq!(s.playback().current_day(), 6);
        assert_eq!(s.playback().min_valid_day(), Some(2));
    }

    #[test]
    fn test_pulled_up_region_keeps_its_own_values() {
        let mut s = state();
        load(&mut s, CASES);
        let hk = s.series().iter().find(|e| e.name == "Hong Kong").unwrap();
        assert_eq!(hk.raw_cumulative, vec![0.0, 55.0, 60.0, 70.0, 80.0, 90.0]);
        let china = s.series().iter().find(|e| e.name == "China").unwrap();
        assert_eq!(china.raw_cumulative, vec![100.0, 200.0, 300.0, 400.0, 500.0, 600.0]);
    }

    #[test]
    fn test_stale_fetch_discarded() {
        let mut s = state();
        let old = s.begin_fetch().unwrap();
        let new = s.begin_fetch().unwrap();
        assert!(s.complete_fetch(new, parse_table(CASES.as_bytes())));
        assert!(!s.complete_fetch(old, parse_table(DEATHS.as_bytes())));
        assert_eq!(s.series().len(), 4);
    }

    #[test]
    fn test_failed_fetch_keeps_last_good() {
        let mut s = state();
        load(&mut s, CASES);
        let ticket = s.begin_fetch().unwrap();
        assert!(!s.complete_fetch(ticket, Err(DataError::NoDateColumns)));
        assert_eq!(s.series().len(), 4);
        assert!(s.last_error().is_some());
    }

    #[test]
    fn test_metric_switch_keeps_selection() {
        let mut s = state();
        load(&mut s, CASES);
        s.select(["Hong Kong", "Spain"]);
        assert!(s.set_metric(Metric::Deaths));
        load(&mut s, DEATHS);
        assert_eq!(s.selection().visible_selection(), vec!["Spain"]);
        assert!(s.selection().is_selected("Hong Kong"));
    }

    #[test]
    fn test_region_switch_reselects() {
        let mut s = state();
        load(&mut s, CASES);
        s.select(["Spain"]);
        assert!(s.set_region("china"));
        assert!(!s.set_region("china"));
        assert_eq!(s.view().region, "world");
        load(&mut s, CASES);
        assert_eq!(s.view().region, "china");
        let names: Vec<_> = s.series().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Hubei"]);
        assert_eq!(s.selection().visible_selection(), vec!["Hubei"]);
    }

    #[test]
    fn test_unknown_region_falls_back_to_world() {
        let mut s = state();
        assert!(s.set_region("china"));
        load(&mut s, CASES);
        assert_eq!(s.view().region, "china");

        let view = ViewParams {
            region: "atlantis".to_string(),
            ..Default::default()
        };
        assert!(s.apply_view(view));
        load(&mut s, CASES);
        assert_eq!(s.view().region, "world");
        let names: Vec<_> = s.series().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["China", "Hong Kong", "Italy", "Spain"]);
    }

    #[test]
    fn test_failed_switch_keeps_labels_for_loaded_data() {
        let mut s = state();
        load(&mut s, CASES);

        let view = ViewParams {
            metric: Metric::Deaths,
            unit: Unit::PerCapita,
            ..Default::default()
        };
        assert!(s.apply_view(view));
        assert!(s.snapshot().loading);
        let ticket = s.begin_fetch().unwrap();
        assert_eq!(ticket.target.metric, Metric::Deaths);
        assert!(!s.complete_fetch(ticket, Err(DataError::NoDateColumns)));

        assert_eq!(s.view().metric, Metric::Cases);
        assert!(!s.snapshot().loading);
        let chart = s.chart();
        assert!(chart.layout.title.starts_with("Trajectory of COVID-19 Confirmed Cases"));
        assert_eq!(chart.layout.xaxis.title, "Total Confirmed Cases per million");
        let italy = s.series().iter().find(|e| e.name == "Italy").unwrap();
        assert!(italy.max_value < 960.0);
        assert_eq!(chart.traces[0].name, "Italy");
        assert_eq!(chart.traces[0].x.last(), italy.cases.last());

        s.set_unit(Unit::Absolute);
        assert_eq!(s.chart().layout.xaxis.title, "Total Confirmed Cases");

        // The next attempt starts from the loaded metric again
        assert!(s.set_metric(Metric::Deaths));
        load(&mut s, DEATHS);
        assert_eq!(s.view().metric, Metric::Deaths);
        assert!(s.chart().layout.title.contains("Reported Deaths"));
    }

    #[test]
    fn test_empty_selection_degrades() {
        let mut s = state();
        load(&mut s, CASES);
        s.deselect_all();
        assert_eq!(s.playback().min_valid_day(), None);
        assert_eq!(s.ranges().x.max, 2.0);
        let chart = s.chart();
        assert!(chart.traces.is_empty());
    }

    #[test]
    fn test_override_cleared_by_selection_not_by_day() {
        let mut s = state();
        load(&mut s, CASES);
        s.relayout(Relayout::Manual { x: [0.0, 9.0], y: [0.0, 9.0] });
        s.step_backward();
        s.scrub_to(4);
        assert!(s.ranges().is_manual());
        s.toggle_location("Hong Kong");
        assert!(!s.ranges().is_manual());
    }

    #[test]
    fn test_unit_switch_drops_unknown_population() {
        let mut s = state();
        load(&mut s, CASES);
        s.set_unit(Unit::PerCapita);
        // China falls under one per million; Tinyland has no population
        let names: Vec<_> = s.series().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Hong Kong", "Italy", "Spain"]);
        s.set_population(PopulationTable::default());
        assert!(s.series().is_empty());
    }

    #[test]
    fn test_playback_through_state() {
        let mut s = state();
        load(&mut s, CASES);
        s.key(" ");
        let epoch = s.take_pending_ticks().unwrap();
        assert_eq!(s.playback().current_day(), 2);
        assert_eq!(s.advance(epoch), Tick::Continue);
        s.key(" ");
        assert_eq!(s.advance(epoch), Tick::Stop);
        assert_eq!(s.playback().current_day(), 3);
        assert!(s.take_pending_ticks().is_none());
    }

    #[test]
    fn test_autoplay_after_mount() {
        let mut config = Config::default();
        config.series.window_size = 1;
        let mut s = AppState::new(config).unwrap();
        s.graph_mounted();
        assert!(s.take_pending_ticks().is_none());
        load(&mut s, CASES);
        assert!(s.take_pending_ticks().is_some());
        assert!(s.playback().is_playing());
    }

    #[test]
    fn test_share_view() {
        let mut s = state();
        load(&mut s, CASES);
        s.select(["Italy"]);
        s.set_scale(Scale::Linear);
        assert_eq!(s.share_view().to_query(), "scale=linear&location=Italy");
    }
}
