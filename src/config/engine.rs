//! Engine tuning constants
//!
//! Every number the simulation depends on lives here so hosts can tune a
//! session without touching engine code. `EngineConfig::default()` is the
//! canonical set used by tests.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// How the radar cone is oriented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RadarPolicy {
    /// Radar is mechanically slaved to the gun: the cone is centred on
    /// body + gun aim and radar-turn commands are ignored.
    #[default]
    SlavedToGun,
    /// Radar is a separately steerable sensor mounted on the gun: the cone is
    /// centred on body + gun + radar aim.
    Independent,
}

/// Trigonometry backend used by the geometry kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrigMode {
    #[default]
    Exact,
    /// 4096-entry sine table (~0.0015 rad resolution)
    Lookup,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    // Arena
    pub arena_width: f64,
    pub arena_height: f64,
    /// Spawn circle radius as a fraction of min(width, height) / 2
    pub spawn_radius_fraction: f64,
    pub max_iterations: u64,

    // Tank body
    /// Half-size of a tank (collision radius)
    pub tank_size: f64,
    pub max_energy: f64,
    pub max_speed: f64,
    pub max_body_turn_deg: f64,
    pub max_gun_turn_deg: f64,
    pub max_radar_turn_deg: f64,
    /// Below this energy the commanded speed is scaled by energy / threshold
    pub low_energy_threshold: f64,
    pub near_wall_margin: f64,

    // Gun
    pub max_fire_power: f64,
    pub max_gun_heat: f64,
    /// Heat added per unit of fire power
    pub heat_per_power: f64,
    /// Heat removed per tick
    pub gun_cooldown_rate: f64,

    // Missiles
    pub missile_speed: f64,
    pub missile_energy_multiplier: f64,
    /// Energy a missile loses per tick of flight
    pub missile_travel_cost: f64,
    /// A missile at or below this energy is spent
    pub missile_spent_threshold: f64,
    pub interception_buffer: f64,

    // Collisions
    pub wall_collision_damage: f64,
    pub tank_collision_damage: f64,
    /// Ticks a collision feedback entry stays active
    pub collision_cooldown: u32,

    // Radar
    pub radar_policy: RadarPolicy,
    /// Base half-arc of the radar cone in degrees
    pub radar_half_arc_deg: f64,
    pub radar_range: f64,

    // Power-ups
    pub powerup_spawn_probability: f64,
    /// Pickup radius of a power-up
    pub powerup_size: f64,
    pub min_powerup_amount: f64,
    pub max_powerup_amount: f64,
    /// Ticks a spawned power-up stays on the field
    pub powerup_duration: u32,
    /// Amount an active power-up loses per tick
    pub powerup_decay_per_tick: f64,
    pub speed_multiplier: f64,
    pub guncool_multiplier: f64,
    pub firepower_multiplier: f64,

    // Scoring
    pub survival_bonus_points: f64,
    pub accuracy_bonus_points: f64,

    // Rating
    pub default_rating: f64,
    pub rating_k_factor: f64,

    pub trig: TrigMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            arena_width: 800.0,
            arena_height: 600.0,
            spawn_radius_fraction: 0.7,
            max_iterations: 3000,

            tank_size: 12.0,
            max_energy: 1000.0,
            max_speed: 2.0,
            max_body_turn_deg: 1.5,
            max_gun_turn_deg: 3.0,
            max_radar_turn_deg: 3.0,
            low_energy_threshold: 120.0,
            near_wall_margin: 40.0,

            max_fire_power: 50.0,
            max_gun_heat: 30.0,
            heat_per_power: 0.6,
            gun_cooldown_rate: 1.0,

            missile_speed: 4.0,
            missile_energy_multiplier: 0.2,
            missile_travel_cost: 0.02,
            missile_spent_threshold: 0.01,
            interception_buffer: 6.0,

            wall_collision_damage: 5.0,
            tank_collision_damage: 10.0,
            collision_cooldown: 40,

            radar_policy: RadarPolicy::SlavedToGun,
            radar_half_arc_deg: 90.0,
            radar_range: 1000.0,

            powerup_spawn_probability: 0.002,
            powerup_size: 10.0,
            min_powerup_amount: 25.0,
            max_powerup_amount: 100.0,
            powerup_duration: 300,
            powerup_decay_per_tick: 1.0,
            speed_multiplier: 1.5,
            guncool_multiplier: 2.0,
            firepower_multiplier: 1.5,

            survival_bonus_points: 0.5,
            accuracy_bonus_points: 500.0,

            default_rating: 1500.0,
            rating_k_factor: 32.0,

            trig: TrigMode::Exact,
        }
    }
}

impl EngineConfig {
    /// Reject parameter sets the engine cannot run safely
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("arena_width", self.arena_width)?;
        positive("arena_height", self.arena_height)?;
        positive("tank_size", self.tank_size)?;
        positive("max_energy", self.max_energy)?;
        positive("max_speed", self.max_speed)?;
        positive("max_fire_power", self.max_fire_power)?;
        positive("max_gun_heat", self.max_gun_heat)?;
        positive("gun_cooldown_rate", self.gun_cooldown_rate)?;
        positive("missile_speed", self.missile_speed)?;
        positive("missile_energy_multiplier", self.missile_energy_multiplier)?;
        positive("missile_travel_cost", self.missile_travel_cost)?;
        positive("radar_half_arc_deg", self.radar_half_arc_deg)?;
        positive("radar_range", self.radar_range)?;
        positive("powerup_size", self.powerup_size)?;
        positive("rating_k_factor", self.rating_k_factor)?;

        for (key, value) in [
            ("max_body_turn_deg", self.max_body_turn_deg),
            ("max_gun_turn_deg", self.max_gun_turn_deg),
            ("max_radar_turn_deg", self.max_radar_turn_deg),
            ("low_energy_threshold", self.low_energy_threshold),
            ("near_wall_margin", self.near_wall_margin),
            ("heat_per_power", self.heat_per_power),
            ("missile_spent_threshold", self.missile_spent_threshold),
            ("interception_buffer", self.interception_buffer),
            ("wall_collision_damage", self.wall_collision_damage),
            ("tank_collision_damage", self.tank_collision_damage),
            ("powerup_decay_per_tick", self.powerup_decay_per_tick),
            ("survival_bonus_points", self.survival_bonus_points),
            ("accuracy_bonus_points", self.accuracy_bonus_points),
        ] {
            non_negative(key, value)?;
        }

        if self.max_iterations == 0 {
            return Err(ConfigError::OutOfRange {
                key: "max_iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.spawn_radius_fraction) {
            return Err(ConfigError::OutOfRange {
                key: "spawn_radius_fraction",
                reason: "must lie in [0, 1]".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.powerup_spawn_probability) {
            return Err(ConfigError::OutOfRange {
                key: "powerup_spawn_probability",
                reason: "must lie in [0, 1]".to_string(),
            });
        }
        if self.min_powerup_amount > self.max_powerup_amount {
            return Err(ConfigError::OutOfRange {
                key: "min_powerup_amount",
                reason: "must not exceed max_powerup_amount".to_string(),
            });
        }
        // A missile must not step over a whole tank body in one tick
        if self.missile_speed > self.tank_size * 2.0 {
            return Err(ConfigError::OutOfRange {
                key: "missile_speed",
                reason: format!("must not exceed twice tank_size ({})", self.tank_size * 2.0),
            });
        }
        // Tanks must fit inside the arena with room to move
        let min_side = self.arena_width.min(self.arena_height);
        if self.tank_size * 4.0 >= min_side {
            return Err(ConfigError::OutOfRange {
                key: "tank_size",
                reason: format!("too large for a {}x{} arena", self.arena_width, self.arena_height),
            });
        }
        Ok(())
    }
}

fn positive(key: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            key,
            reason: format!("must be a positive number, got {value}"),
        })
    }
}

fn non_negative(key: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            key,
            reason: format!("must be zero or greater, got {value}"),
        })
    }
}
