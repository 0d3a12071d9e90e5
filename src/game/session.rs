//! Session - a continuous series of matches between two bound strategies

use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{validate_speed, Config, ConfigError, EngineConfig};
use crate::stats::{EloRating, SessionStats, StatRow};
use crate::store::{KeyValueStore, Ledger, TankMemory};
use crate::util::time::{unix_millis, wake_interval};
use crate::ws::protocol::ServerMsg;

use super::geometry::Trig;
use super::r#match::{Match, MatchOutcome, MatchSettings};
use super::snapshot::{ArenaSnapshot, SnapshotBuilder};
use super::strategy::{MatchEndView, Strategy, StrategyContext, StrategyRegistry};

/// Outcomes kept for `recent_outcomes` and replay
pub const HISTORY_LIMIT: usize = 10_000;

/// Publish a snapshot every n-th scheduler wake-up
const SNAPSHOT_EVERY_WAKES: u32 = 2;

/// Everything a session needs besides its engine constants
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub names: [String; 2],
    pub seed: Option<u64>,
    pub game_speed: i32,
    pub fast_forward: bool,
    pub step_mode: bool,
    pub match_settings: MatchSettings,
    pub max_matches: Option<u64>,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            names: [config.tank_a.clone(), config.tank_b.clone()],
            seed: config.seed,
            game_speed: config.game_speed,
            fast_forward: config.fast_forward,
            step_mode: false,
            match_settings: MatchSettings {
                powerups_enabled: config.powerups_enabled,
                missile_interception: config.missile_interception,
            },
            max_matches: config.max_matches,
        }
    }
}

/// Scheduler controls as seen by clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlState {
    pub paused: bool,
    pub speed: i32,
    pub step_mode: bool,
    pub fast_forward: bool,
    pub stopped: bool,
}

/// What one scheduler wake-up did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WakeReport {
    pub ticks: u64,
    pub outcomes: Vec<MatchOutcome>,
}

pub struct Session {
    rng: ChaCha8Rng,
    engine: Arc<EngineConfig>,
    names: [String; 2],
    match_settings: MatchSettings,
    max_matches: Option<u64>,
    /// Indexed by combatant index
    strategies: Vec<Box<dyn Strategy>>,
    trig: Trig,
    current: Match,
    matches_played: u64,
    stats: SessionStats,
    elo: EloRating,
    ledger: Ledger,
    store: Arc<dyn KeyValueStore>,
    history: VecDeque<MatchOutcome>,
    controls: ControlState,
    step_requested: bool,
    /// Wake-ups since the last slow-motion tick
    wake_counter: u32,
}

impl Session {
    /// Bind both strategies and start the first match
    pub fn new(
        engine: Arc<EngineConfig>,
        settings: SessionSettings,
        registry: &StrategyRegistry,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, ConfigError> {
        engine.validate()?;
        validate_speed(settings.game_speed)?;

        let seed = settings.seed.unwrap_or_else(unix_millis);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let strategies = settings
            .names
            .iter()
            .map(|name| {
                registry.create(StrategyContext {
                    name: name.clone(),
                    memory: TankMemory::new(store.clone(), name),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let ledger = Ledger::load(store.as_ref());
        let elo = EloRating::new(engine.rating_k_factor, engine.default_rating);
        let [a, b] = &settings.names;
        let stats = SessionStats::new([a.as_str(), b.as_str()]);
        let trig = Trig::for_mode(engine.trig);
        let current = Match::new(
            1,
            [a.as_str(), b.as_str()],
            engine.clone(),
            settings.match_settings,
            trig.clone(),
            &mut rng,
        );

        info!(
            tank_a = %a,
            tank_b = %b,
            seed,
            speed = settings.game_speed,
            "Session started"
        );

        Ok(Self {
            rng,
            engine,
            names: settings.names,
            match_settings: settings.match_settings,
            max_matches: settings.max_matches,
            strategies,
            trig,
            current,
            matches_played: 0,
            stats,
            elo,
            ledger,
            store,
            history: VecDeque::new(),
            controls: ControlState {
                paused: false,
                speed: settings.game_speed,
                step_mode: settings.step_mode,
                fast_forward: settings.fast_forward,
                stopped: settings.max_matches == Some(0),
            },
            step_requested: false,
            wake_counter: 0,
        })
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Number of ticks the next wake-up may run
    fn tick_budget(&mut self) -> u64 {
        let controls = self.controls;
        if controls.stopped || controls.paused {
            return 0;
        }
        if controls.step_mode {
            return u64::from(std::mem::take(&mut self.step_requested));
        }
        if controls.fast_forward {
            return self.engine.max_iterations;
        }
        match controls.speed {
            speed if speed > 0 => speed as u64,
            speed if speed < 0 => {
                self.wake_counter += 1;
                if self.wake_counter > speed.unsigned_abs() {
                    self.wake_counter = 0;
                    1
                } else {
                    0
                }
            }
            _ => 0,
        }
    }

    /// One scheduler wake-up; stops early once a match ends
    pub fn wake(&mut self) -> WakeReport {
        let mut report = WakeReport::default();
        for _ in 0..self.tick_budget() {
            report.ticks += 1;
            if let Some(outcome) = self.current.tick(&mut self.strategies, &mut self.rng) {
                self.finish_match(&outcome);
                report.outcomes.push(outcome);
                break;
            }
        }
        report
    }

    fn finish_match(&mut self, outcome: &MatchOutcome) {
        self.matches_played += 1;
        self.stats.record(outcome);

        if let Some(delta) = self.ledger.record_outcome(outcome, &self.elo) {
            debug!(
                match_number = outcome.match_number,
                first = delta.first,
                second = delta.second,
                "Ratings updated"
            );
            self.ledger.save(self.store.as_ref());
        }

        for (index, strategy) in self.strategies.iter_mut().enumerate() {
            let view = MatchEndView { index, outcome };
            if panic::catch_unwind(AssertUnwindSafe(|| strategy.on_match_end(&view))).is_err() {
                warn!(tank = %self.names[index], "Strategy panicked in match-end hook");
            }
        }

        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(outcome.clone());

        if self.max_matches.is_some_and(|max| self.matches_played >= max) {
            info!(matches = self.matches_played, "Match limit reached, session stopped");
            self.controls.stopped = true;
        }
        if !self.controls.stopped {
            self.start_next_match();
        }
    }

    fn start_next_match(&mut self) {
        let [a, b] = &self.names;
        self.current = Match::new(
            self.current.number + 1,
            [a.as_str(), b.as_str()],
            self.engine.clone(),
            self.match_settings,
            self.trig.clone(),
            &mut self.rng,
        );
        self.wake_counter = 0;
    }

    // ========================================================================
    // Controls
    // ========================================================================

    pub fn controls(&self) -> ControlState {
        self.controls
    }

    pub fn pause(&mut self) {
        self.controls.paused = true;
    }

    pub fn resume(&mut self) {
        self.controls.paused = false;
    }

    /// Queue a single tick; only honoured in step mode
    pub fn request_step(&mut self) {
        self.step_requested = true;
    }

    pub fn set_step_mode(&mut self, enabled: bool) {
        self.controls.step_mode = enabled;
        self.step_requested = false;
    }

    pub fn set_speed(&mut self, speed: i32) -> Result<(), ConfigError> {
        validate_speed(speed)?;
        self.controls.speed = speed;
        self.wake_counter = 0;
        Ok(())
    }

    pub fn set_fast_forward(&mut self, enabled: bool) {
        self.controls.fast_forward = enabled;
    }

    /// Stop after the current wake-up; the running match is abandoned
    pub fn stop(&mut self) {
        if !self.controls.stopped {
            info!(matches = self.matches_played, "Session stopped");
        }
        self.controls.stopped = true;
    }

    /// Applies from the next match on
    pub fn set_match_settings(&mut self, settings: MatchSettings) {
        self.match_settings = settings;
    }

    // ========================================================================
    // Read side
    // ========================================================================

    pub fn engine(&self) -> &EngineConfig {
        &self.engine
    }

    pub fn names(&self) -> &[String; 2] {
        &self.names
    }

    pub fn current_match(&self) -> &Match {
        &self.current
    }

    pub fn matches_played(&self) -> u64 {
        self.matches_played
    }

    pub fn snapshot(&self) -> ArenaSnapshot {
        ArenaSnapshot::capture(&self.current, &self.engine)
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn ratings(&self) -> [f64; 2] {
        [
            self.ledger.rating(&self.names[0], &self.elo),
            self.ledger.rating(&self.names[1], &self.elo),
        ]
    }

    pub fn stats_rows(&self) -> Vec<StatRow> {
        self.stats.rows(self.ratings())
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn elo(&self) -> &EloRating {
        &self.elo
    }

    pub fn reset_leaderboard(&mut self) {
        self.ledger.reset(self.store.as_ref());
    }

    pub fn history(&self) -> impl Iterator<Item = &MatchOutcome> {
        self.history.iter()
    }

    /// Most recent outcomes, newest first
    pub fn recent_outcomes(&self, limit: usize) -> Vec<MatchOutcome> {
        self.history.iter().rev().take(limit).cloned().collect()
    }
}

/// Drive a shared session at a fixed wake-up rate and publish its progress
///
/// Returns once the session is stopped.
pub async fn run_scheduler(session: Arc<Mutex<Session>>, events: broadcast::Sender<ServerMsg>) {
    let mut builder = SnapshotBuilder::new(SNAPSHOT_EVERY_WAKES);
    let mut ticker = interval(wake_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let (messages, stopped) = {
            let mut session = session.lock();
            let report = session.wake();
            let mut messages = Vec::with_capacity(report.outcomes.len() + 1);

            for outcome in report.outcomes {
                messages.push(ServerMsg::MatchEnd { outcome });
                builder.force_next();
            }
            let stopped = session.controls().stopped;
            if stopped {
                builder.force_next();
            }
            if (report.ticks > 0 || stopped) && builder.should_send() {
                messages.push(builder.build(session.current_match(), session.engine()));
            }
            (messages, stopped)
        };

        for msg in messages {
            // No subscribers is fine
            let _ = events.send(msg);
        }

        if stopped {
            info!("Scheduler finished");
            break;
        }
    }
}
