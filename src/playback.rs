//! Playback Controller - day-by-day animation state machine
//!
//! `current_day` counts the days on screen (1-based), bounded below by the
//! first day of observable growth and above by the dataset length. Ticks are
//! driven from outside: `play` hands back an epoch, the driver calls
//! `advance(epoch)` once per interval and stops on `Tick::Stop`. Every
//! play/pause transition bumps the epoch, so a tick that was already in flight
//! when `pause` ran finds a stale epoch and does nothing.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayState {
    Paused,
    Playing,
}

/// What the tick driver should do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Stop,
}

/// Keyboard control surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    TogglePlay,
    StepBackward,
    StepForward,
}

impl KeyCommand {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            " " => Some(KeyCommand::TogglePlay),
            "-" | "_" => Some(KeyCommand::StepBackward),
            "+" | "=" => Some(KeyCommand::StepForward),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlaybackSnapshot {
    pub current_day: usize,
    /// `None` until some selected entity shows growth
    pub min_valid_day: Option<usize>,
    pub total_days: usize,
    pub state: PlayState,
}

#[derive(Debug, Clone)]
pub struct Playback {
    current_day: usize,
    min_valid_day: Option<usize>,
    total_days: usize,
    state: PlayState,
    epoch: u64,
    autoplay: bool,
    mounted: bool,
}

impl Playback {
    pub fn new(autoplay: bool) -> Self {
        Self {
            current_day: 0,
            min_valid_day: None,
            total_days: 0,
            state: PlayState::Paused,
            epoch: 0,
            autoplay,
            mounted: false,
        }
    }

    pub fn current_day(&self) -> usize {
        self.current_day
    }

    pub fn min_valid_day(&self) -> Option<usize> {
        self.min_valid_day
    }

    pub fn total_days(&self) -> usize {
        self.total_days
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            current_day: self.current_day,
            min_valid_day: self.min_valid_day,
            total_days: self.total_days,
            state: self.state,
        }
    }

    fn lower_bound(&self) -> usize {
        self.min_valid_day.unwrap_or(1).min(self.total_days)
    }

    /// Take new bounds after a recompute. The first dataset starts the view
    /// on its last day; later ones only clamp.
    pub fn set_bounds(&mut self, min_valid_day: Option<usize>, total_days: usize) {
        if self.total_days == 0 {
            self.current_day = total_days;
        }
        self.total_days = total_days;
        self.min_valid_day = min_valid_day.map(|d| d.min(total_days));

        self.current_day = self.current_day.min(total_days);
        if let Some(min) = self.min_valid_day {
            self.current_day = self.current_day.max(min);
        }
    }

    /// Start playing. Returns the epoch to tick with, or `None` if nothing
    /// needs scheduling.
    pub fn play(&mut self) -> Option<u64> {
        if self.is_playing() || self.total_days == 0 {
            return None;
        }
        if self.current_day == self.total_days {
            if let Some(min) = self.min_valid_day {
                self.current_day = min;
            }
        }
        self.state = PlayState::Playing;
        self.epoch += 1;
        tracing::debug!("Playback started at day {} (epoch {})", self.current_day, self.epoch);
        Some(self.epoch)
    }

    pub fn pause(&mut self) {
        if self.is_playing() {
            self.state = PlayState::Paused;
            self.epoch += 1;
            tracing::debug!("Playback paused at day {}", self.current_day);
        }
    }

    pub fn toggle(&mut self) -> Option<u64> {
        if self.is_playing() {
            self.pause();
            None
        } else {
            self.play()
        }
    }

    /// One scheduled tick
    pub fn advance(&mut self, epoch: u64) -> Tick {
        if epoch != self.epoch || !self.is_playing() {
            return Tick::Stop;
        }
        if self.min_valid_day.is_none() {
            self.current_day = self.total_days;
            self.pause();
            return Tick::Stop;
        }
        if self.current_day < self.total_days {
            self.current_day += 1;
            Tick::Continue
        } else {
            self.pause();
            Tick::Stop
        }
    }

    pub fn step_backward(&mut self) {
        self.pause();
        self.current_day = self.current_day.saturating_sub(1).max(self.lower_bound());
    }

    pub fn step_forward(&mut self) {
        self.pause();
        self.current_day = (self.current_day + 1).min(self.total_days);
    }

    /// Jump to `day`, clamped into bounds. Play state is untouched.
    pub fn scrub_to(&mut self, day: usize) {
        self.current_day = day.clamp(self.lower_bound(), self.total_days);
    }

    pub fn key(&mut self, command: KeyCommand) -> Option<u64> {
        if self.total_days == 0 {
            return None;
        }
        match command {
            KeyCommand::TogglePlay => return self.toggle(),
            KeyCommand::StepBackward => self.step_backward(),
            KeyCommand::StepForward => self.step_forward(),
        }
        None
    }

    /// The chart finished its first render
    pub fn mounted(&mut self) -> Option<u64> {
        self.mounted = true;
        self.try_autoplay()
    }

    /// Start the one-shot autoplay once the chart is up and data shows growth
    pub fn try_autoplay(&mut self) -> Option<u64> {
        if !(self.mounted && self.autoplay) {
            return None;
        }
        let min = self.min_valid_day.filter(|&d| d > 0)?;
        self.autoplay = false;
        self.current_day = min;
        tracing::info!("Autoplay from day {}", min);
        self.play()
    }
}
