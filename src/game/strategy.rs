//! Strategy protocol - the contract between the engine and tank brains
//!
//! Each tick the engine hands every live tank's strategy a [`TankControl`]:
//! a read view of the tank and its perception plus write access to this
//! tick's commands. Calls are isolated so a misbehaving strategy only idles
//! its own tank.

use serde::Serialize;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

use crate::config::{ConfigError, EngineConfig};
use crate::store::TankMemory;

use super::geometry::{Angle, ArenaBounds, Vector2};
use super::powerup::ActivePowerUp;
use super::r#match::{MatchOutcome, MatchResult};
use super::sensor::{DetectedMissile, DetectedPowerUp, DetectedTank};
use super::tank::{CollisionFeedbackSet, RetainedMemory, Tank, TankCommands, TankCounters};

/// Failure of a single strategy invocation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StrategyError {
    #[error("strategy panicked: {0}")]
    Panicked(String),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("strategy failed: {0}")]
    Failed(String),
}

/// Arena-wide facts every strategy may read
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArenaInfo {
    pub width: f64,
    pub height: f64,
    pub iteration: u64,
    pub tanks_remaining: usize,
    pub power_ups_spawned: u32,
    pub missile_interception: bool,
}

/// A tank brain
pub trait Strategy: Send {
    /// Decide this tick's commands
    fn think(&mut self, tank: &mut TankControl<'_>) -> Result<(), StrategyError>;

    /// Called once per finished match, for learning across matches
    fn on_match_end(&mut self, _view: &MatchEndView<'_>) {}
}

/// A finished match as seen by one participant
#[derive(Debug, Clone, Copy)]
pub struct MatchEndView<'a> {
    pub index: usize,
    pub outcome: &'a MatchOutcome,
}

impl MatchEndView<'_> {
    pub fn won(&self) -> bool {
        matches!(self.outcome.result, MatchResult::Winner { index, .. } if index == self.index)
    }

    pub fn lost(&self) -> bool {
        matches!(self.outcome.result, MatchResult::Winner { index, .. } if index != self.index)
    }
}

/// Handle a strategy uses to read its tank and issue commands
pub struct TankControl<'a> {
    tank: &'a mut Tank,
    arena: &'a ArenaInfo,
    config: &'a EngineConfig,
    bounds: ArenaBounds,
}

impl<'a> TankControl<'a> {
    pub fn new(tank: &'a mut Tank, arena: &'a ArenaInfo, config: &'a EngineConfig) -> Self {
        let bounds = ArenaBounds::new(arena.width, arena.height);
        Self {
            tank,
            arena,
            config,
            bounds,
        }
    }

    pub fn index(&self) -> usize {
        self.tank.index
    }

    pub fn name(&self) -> &str {
        &self.tank.name
    }

    pub fn position(&self) -> Vector2 {
        self.tank.position
    }

    pub fn body_aim(&self) -> Angle {
        self.tank.body_aim
    }

    pub fn gun_aim(&self) -> Angle {
        self.tank.gun_aim
    }

    pub fn radar_aim(&self) -> Angle {
        self.tank.radar_aim
    }

    pub fn gun_heading(&self) -> Angle {
        self.tank.gun_heading()
    }

    pub fn radar_heading(&self) -> Angle {
        self.tank.radar_heading(self.config.radar_policy)
    }

    pub fn actual_speed(&self) -> f64 {
        self.tank.actual_speed
    }

    pub fn energy(&self) -> f64 {
        self.tank.energy
    }

    pub fn gun_heat(&self) -> f64 {
        self.tank.gun_heat
    }

    pub fn radar_arc(&self) -> f64 {
        self.tank.radar_arc
    }

    pub fn counters(&self) -> &TankCounters {
        &self.tank.counters
    }

    pub fn accuracy(&self) -> f64 {
        self.tank.accuracy
    }

    pub fn match_score(&self) -> f64 {
        self.tank.match_score
    }

    pub fn power_up(&self) -> Option<ActivePowerUp> {
        self.tank.power_up
    }

    pub fn collisions(&self) -> &CollisionFeedbackSet {
        &self.tank.feedback
    }

    pub fn is_near_wall(&self) -> bool {
        self.tank.is_near_wall
    }

    pub fn distance_to_wall(&self) -> f64 {
        self.bounds.distance_to_wall(self.tank.position)
    }

    pub fn nearest_wall_angle(&self) -> Angle {
        self.bounds.nearest_wall_angle(self.tank.position)
    }

    pub fn tanks(&self) -> &[DetectedTank] {
        &self.tank.perception.tanks
    }

    pub fn missiles(&self) -> &[DetectedMissile] {
        &self.tank.perception.missiles
    }

    pub fn power_ups(&self) -> &[DetectedPowerUp] {
        &self.tank.perception.power_ups
    }

    pub fn arena(&self) -> &ArenaInfo {
        self.arena
    }

    pub fn config(&self) -> &EngineConfig {
        self.config
    }

    /// Body turn in [-1, 1] of the maximum rate
    pub fn set_body_turn(&mut self, turn: f64) {
        self.tank.commands.body_turn = turn;
    }

    pub fn set_gun_turn(&mut self, turn: f64) {
        self.tank.commands.gun_turn = turn;
    }

    /// Ignored unless the radar is independently steerable
    pub fn set_radar_turn(&mut self, turn: f64) {
        self.tank.commands.radar_turn = turn;
    }

    /// Speed in [-1, 1] of the maximum
    pub fn set_speed(&mut self, speed: f64) {
        self.tank.commands.speed = speed;
    }

    /// Radar arc multiplier, clamped to [0.1, 1]
    pub fn set_radar_arc(&mut self, arc: f64) {
        self.tank.commands.radar_arc = Some(arc);
    }

    /// Request a shot this tick; false when the gun refuses
    pub fn fire(&mut self, power: f64) -> bool {
        if !power.is_finite() || power <= 0.0 {
            return false;
        }
        let power = power.min(self.config.max_fire_power);
        if self.tank.gun_heat > 0.0 || self.tank.energy < power {
            return false;
        }
        self.tank.commands.fire = Some(power);
        true
    }

    /// Scratch space kept for the lifetime of this tank
    pub fn memory(&mut self) -> &mut RetainedMemory {
        &mut self.tank.memory
    }
}

/// Run one strategy call with panics and bad commands contained
pub fn invoke(
    strategy: &mut dyn Strategy,
    tank: &mut Tank,
    arena: &ArenaInfo,
    config: &EngineConfig,
) -> Result<(), StrategyError> {
    tank.commands = TankCommands::default();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut control = TankControl::new(tank, arena, config);
        strategy.think(&mut control)
    }));

    let result = match result {
        Ok(Ok(())) if tank.commands.is_finite() => Ok(()),
        Ok(Ok(())) => Err(StrategyError::InvalidCommand(format!(
            "non-finite command {:?}",
            tank.commands
        ))),
        Ok(Err(e)) => Err(e),
        Err(payload) => Err(StrategyError::Panicked(panic_message(payload.as_ref()))),
    };

    match &result {
        Ok(()) => {
            if let Some(arc) = tank.commands.radar_arc.take() {
                tank.radar_arc = arc.clamp(0.1, 1.0);
            }
        }
        Err(e) => {
            warn!(tank = %tank.name, error = %e, "Strategy call failed, tank idles this tick");
            tank.commands = TankCommands::default();
        }
    }
    result
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// What a factory gets when a strategy is bound to a tank
#[derive(Debug, Clone)]
pub struct StrategyContext {
    pub name: String,
    pub memory: TankMemory,
}

pub type StrategyFactory = Arc<dyn Fn(StrategyContext) -> Box<dyn Strategy> + Send + Sync>;

/// Named strategy factories, resolved at session setup
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    factories: BTreeMap<String, StrategyFactory>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in strategies
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        super::builtin::register_all(&mut registry);
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(StrategyContext) -> Box<dyn Strategy> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn create(&self, context: StrategyContext) -> Result<Box<dyn Strategy>, ConfigError> {
        let factory = self
            .factories
            .get(&context.name)
            .ok_or_else(|| ConfigError::UnknownStrategy(context.name.clone()))?;
        Ok(factory(context))
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyValueStore, MemoryStore};

    struct Panicker;

    impl Strategy for Panicker {
        fn think(&mut self, tank: &mut TankControl<'_>) -> Result<(), StrategyError> {
            tank.set_speed(1.0);
            panic!("boom");
        }
    }

    struct NanDriver;

    impl Strategy for NanDriver {
        fn think(&mut self, tank: &mut TankControl<'_>) -> Result<(), StrategyError> {
            tank.set_body_turn(f64::NAN);
            Ok(())
        }
    }

    struct Shooter;

    impl Strategy for Shooter {
        fn think(&mut self, tank: &mut TankControl<'_>) -> Result<(), StrategyError> {
            tank.set_radar_arc(5.0);
            let counter = tank.memory().get_f64("calls").unwrap_or(0.0);
            tank.memory().set("calls", serde_json::json!(counter + 1.0));
            if tank.fire(80.0) {
                Ok(())
            } else {
                Err(StrategyError::Failed("gun refused".to_string()))
            }
        }
    }

    fn setup() -> (Tank, ArenaInfo, EngineConfig) {
        let config = EngineConfig::default();
        let tank = Tank::new(0, "t", Vector2::ORIGIN, Angle::ZERO, &config);
        let arena = ArenaInfo {
            width: config.arena_width,
            height: config.arena_height,
            iteration: 0,
            tanks_remaining: 2,
            power_ups_spawned: 0,
            missile_interception: false,
        };
        (tank, arena, config)
    }

    #[test]
    fn panic_is_contained_and_commands_cleared() {
        let (mut tank, arena, config) = setup();
        let result = invoke(&mut Panicker, &mut tank, &arena, &config);
        assert_eq!(result, Err(StrategyError::Panicked("boom".to_string())));
        assert_eq!(tank.commands, TankCommands::default());
    }

    #[test]
    fn non_finite_command_is_rejected() {
        let (mut tank, arena, config) = setup();
        let result = invoke(&mut NanDriver, &mut tank, &arena, &config);
        assert!(matches!(result, Err(StrategyError::InvalidCommand(_))));
        assert_eq!(tank.commands, TankCommands::default());
    }

    #[test]
    fn fire_clamps_power_and_memory_persists() {
        let (mut tank, arena, config) = setup();
        invoke(&mut Shooter, &mut tank, &arena, &config).unwrap();
        assert_eq!(tank.commands.fire, Some(config.max_fire_power));
        assert_eq!(tank.radar_arc, 1.0);

        invoke(&mut Shooter, &mut tank, &arena, &config).unwrap();
        assert_eq!(tank.memory.get_f64("calls"), Some(2.0));

        tank.gun_heat = 3.0;
        let refused = invoke(&mut Shooter, &mut tank, &arena, &config);
        assert!(matches!(refused, Err(StrategyError::Failed(_))));
    }

    #[test]
    fn fire_rejects_bad_power() {
        let (mut tank, arena, config) = setup();
        let mut control = TankControl::new(&mut tank, &arena, &config);
        assert!(!control.fire(0.0));
        assert!(!control.fire(-5.0));
        assert!(!control.fire(f64::INFINITY));
        assert!(control.fire(25.0));
    }

    #[test]
    fn unknown_strategy_is_a_config_error() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let registry = StrategyRegistry::with_builtins();
        let context = StrategyContext {
            name: "nope".to_string(),
            memory: TankMemory::new(store, "nope"),
        };
        assert!(matches!(
            registry.create(context),
            Err(ConfigError::UnknownStrategy(name)) if name == "nope"
        ));
        assert!(registry.contains("turret"));
    }
}
