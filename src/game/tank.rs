//! Tank state, per-tick commands and kinematics

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::config::{EngineConfig, RadarPolicy};

use super::combat::{CombatSystem, Missile};
use super::geometry::{Angle, Trig, Vector2};
use super::powerup::{ActivePowerUp, PowerUp, PowerUpKind};
use super::sensor::Perception;

/// Strategy-owned scratch space attached to one tank instance
///
/// The engine never looks inside; strategies store whatever JSON they like.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetainedMemory(Map<String, Value>);

impl RetainedMemory {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Commands a strategy issues for a single tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TankCommands {
    pub body_turn: f64,
    pub gun_turn: f64,
    pub radar_turn: f64,
    pub speed: f64,
    /// Fire power requested this tick
    pub fire: Option<f64>,
    /// New radar arc multiplier, kept once applied
    pub radar_arc: Option<f64>,
}

impl TankCommands {
    pub fn is_finite(&self) -> bool {
        self.body_turn.is_finite()
            && self.gun_turn.is_finite()
            && self.radar_turn.is_finite()
            && self.speed.is_finite()
            && self.fire.map_or(true, f64::is_finite)
            && self.radar_arc.map_or(true, f64::is_finite)
    }
}

/// Per-match counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TankCounters {
    pub missiles_fired: u32,
    pub missiles_hit: u32,
    pub tank_collisions: u32,
    pub missile_collisions: u32,
    pub wall_collisions: u32,
    pub powerups_collected: u32,
}

impl TankCounters {
    pub fn collisions(&self) -> u32 {
        self.tank_collisions + self.missile_collisions + self.wall_collisions
    }
}

/// Most recent collision of one kind, active while `remaining > 0`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollisionFeedback {
    pub angle: Angle,
    pub damage: f64,
    pub remaining: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CollisionFeedbackSet {
    pub wall: Option<CollisionFeedback>,
    pub tank: Option<CollisionFeedback>,
    pub missile: Option<CollisionFeedback>,
}

impl CollisionFeedbackSet {
    fn tick_down(slot: &mut Option<CollisionFeedback>) {
        if let Some(feedback) = slot {
            feedback.remaining = feedback.remaining.saturating_sub(1);
            if feedback.remaining == 0 {
                *slot = None;
            }
        }
    }

    pub fn tick(&mut self) {
        Self::tick_down(&mut self.wall);
        Self::tick_down(&mut self.tank);
        Self::tick_down(&mut self.missile);
    }
}

/// A combatant inside a match
#[derive(Debug, Clone)]
pub struct Tank {
    /// Identifies the combatant, independent of list order
    pub index: usize,
    pub name: String,
    pub position: Vector2,
    pub body_aim: Angle,
    /// Relative to the body
    pub gun_aim: Angle,
    /// Relative to the gun
    pub radar_aim: Angle,
    pub actual_speed: f64,
    pub energy: f64,
    pub gun_heat: f64,
    /// Scales the radar half-arc, within [0.1, 1]
    pub radar_arc: f64,
    pub counters: TankCounters,
    /// Missile energy delivered to the opponent
    pub match_score: f64,
    pub accuracy: f64,
    pub memory: RetainedMemory,
    pub power_up: Option<ActivePowerUp>,
    pub feedback: CollisionFeedbackSet,
    pub is_near_wall: bool,
    pub perception: Perception,
    pub commands: TankCommands,
}

impl Tank {
    pub fn new(
        index: usize,
        name: impl Into<String>,
        position: Vector2,
        body_aim: Angle,
        config: &EngineConfig,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            position,
            body_aim,
            gun_aim: Angle::ZERO,
            radar_aim: Angle::ZERO,
            actual_speed: 0.0,
            energy: config.max_energy,
            gun_heat: 0.0,
            radar_arc: 1.0,
            counters: TankCounters::default(),
            match_score: 0.0,
            accuracy: 0.0,
            memory: RetainedMemory::default(),
            power_up: None,
            feedback: CollisionFeedbackSet::default(),
            is_near_wall: false,
            perception: Perception::default(),
            commands: TankCommands::default(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.energy > 0.0
    }

    /// Absolute heading of the gun barrel
    pub fn gun_heading(&self) -> Angle {
        self.body_aim + self.gun_aim
    }

    /// Centre line of the radar cone under the given policy
    pub fn radar_heading(&self, policy: RadarPolicy) -> Angle {
        match policy {
            RadarPolicy::SlavedToGun => self.gun_heading(),
            RadarPolicy::Independent => self.gun_heading() + self.radar_aim,
        }
    }

    /// Effect multiplier of `kind` if it currently occupies the slot
    pub fn power_multiplier(&self, kind: PowerUpKind, config: &EngineConfig) -> f64 {
        match self.power_up {
            Some(active) if active.kind == kind && active.amount > 0.0 => kind.multiplier(config),
            _ => 1.0,
        }
    }

    fn has_power(&self, kind: PowerUpKind) -> bool {
        matches!(self.power_up, Some(active) if active.kind == kind && active.amount > 0.0)
    }

    /// Speed the tank will attempt this tick
    pub fn desired_speed(&self, config: &EngineConfig) -> f64 {
        let mut speed = self.commands.speed.clamp(-1.0, 1.0)
            * config.max_speed
            * self.power_multiplier(PowerUpKind::Speed, config);
        if config.low_energy_threshold > 0.0 && self.energy < config.low_energy_threshold {
            speed *= (self.energy / config.low_energy_threshold).max(0.0);
        }
        speed
    }

    /// Turn and move according to this tick's commands
    pub fn advance(&mut self, config: &EngineConfig, trig: &Trig) {
        let commands = self.commands;
        self.body_aim = self.body_aim
            + Angle::from_degrees(commands.body_turn.clamp(-1.0, 1.0) * config.max_body_turn_deg);
        self.gun_aim = self.gun_aim
            + Angle::from_degrees(commands.gun_turn.clamp(-1.0, 1.0) * config.max_gun_turn_deg);
        self.radar_aim = match config.radar_policy {
            RadarPolicy::SlavedToGun => Angle::ZERO,
            RadarPolicy::Independent => {
                self.radar_aim
                    + Angle::from_degrees(
                        commands.radar_turn.clamp(-1.0, 1.0) * config.max_radar_turn_deg,
                    )
            }
        };

        self.actual_speed = self.desired_speed(config);
        self.position = self
            .position
            .polar_offset(self.actual_speed, self.body_aim, trig);
    }

    /// Cool the gun and fire if a shot is pending and allowed
    pub fn service_gun(
        &mut self,
        missile_id: u64,
        config: &EngineConfig,
        trig: &Trig,
    ) -> Option<Missile> {
        self.gun_heat =
            CombatSystem::cool_gun(self.gun_heat, self.has_power(PowerUpKind::GunCool), config);

        let power = self.commands.fire.take()?;
        if !CombatSystem::can_fire(self.gun_heat) || self.energy < power || power <= 0.0 {
            return None;
        }

        self.energy -= power;
        self.gun_heat = CombatSystem::fire_heat(power, config);
        self.counters.missiles_fired += 1;

        let heading = self.gun_heading();
        let origin = self.position.polar_offset(config.tank_size, heading, trig);
        let energy =
            CombatSystem::missile_energy(power, self.has_power(PowerUpKind::FirePower), config);
        Some(Missile::new(missile_id, self.index, origin, heading, energy))
    }

    /// Lose energy, returns true if this kills the tank
    pub fn take_damage(&mut self, damage: f64) -> bool {
        let (energy, dead) = CombatSystem::apply_damage(self.energy, damage);
        self.energy = energy;
        dead
    }

    /// Pick up a power-up from the field
    pub fn collect(&mut self, power_up: &PowerUp, config: &EngineConfig) {
        self.counters.powerups_collected += 1;
        match power_up.kind {
            PowerUpKind::Energy => {
                self.energy = (self.energy + power_up.amount).min(config.max_energy);
            }
            kind => match &mut self.power_up {
                Some(active) if active.kind == kind => active.amount += power_up.amount,
                slot => {
                    *slot = Some(ActivePowerUp {
                        kind,
                        amount: power_up.amount,
                    })
                }
            },
        }
    }

    /// End-of-tick bookkeeping: accuracy, decay, timers and bounds
    pub fn finish_tick(&mut self, config: &EngineConfig) {
        self.accuracy = if self.counters.missiles_fired == 0 {
            0.0
        } else {
            self.counters.missiles_hit as f64 / self.counters.missiles_fired as f64
        };

        if let Some(active) = &mut self.power_up {
            active.amount -= config.powerup_decay_per_tick;
            if active.amount <= 0.0 {
                self.power_up = None;
            }
        }
        self.feedback.tick();

        debug_assert!(
            (0.0..=config.max_energy).contains(&self.energy),
            "energy out of range: {}",
            self.energy
        );
        if !(0.0..=config.max_energy).contains(&self.energy) {
            warn!(tank = %self.name, energy = self.energy, "Clamping tank energy");
            self.energy = self.energy.clamp(0.0, config.max_energy);
        }
        debug_assert!((0.0..=config.max_gun_heat).contains(&self.gun_heat));
        if !(0.0..=config.max_gun_heat).contains(&self.gun_heat) {
            warn!(tank = %self.name, gun_heat = self.gun_heat, "Clamping gun heat");
            self.gun_heat = self.gun_heat.clamp(0.0, config.max_gun_heat);
        }
    }
}
