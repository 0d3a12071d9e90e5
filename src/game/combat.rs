//! Combat system - missiles, gun heat, energy damage

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;

use super::geometry::{Angle, ArenaBounds, Trig, Vector2};

/// Missile in flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Missile {
    pub id: u64,
    /// Index of the tank that fired it
    pub owner: usize,
    pub position: Vector2,
    /// Position at the start of the current tick
    pub previous_position: Vector2,
    /// Fixed at launch
    pub heading: Angle,
    pub energy: f64,
    pub alive: bool,
}

impl Missile {
    pub fn new(id: u64, owner: usize, position: Vector2, heading: Angle, energy: f64) -> Self {
        Self {
            id,
            owner,
            position,
            previous_position: position,
            heading,
            energy,
            alive: energy > 0.0,
        }
    }

    /// Advance one tick, returns false once spent or out of the arena
    pub fn update(&mut self, bounds: &ArenaBounds, config: &EngineConfig, trig: &Trig) -> bool {
        if !self.alive {
            return false;
        }
        self.previous_position = self.position;
        self.position = self
            .position
            .polar_offset(config.missile_speed, self.heading, trig);
        self.energy = (self.energy - config.missile_travel_cost).max(0.0);

        if self.energy <= config.missile_spent_threshold || !bounds.contains(self.position, 0.0) {
            self.alive = false;
        }
        self.alive
    }

    /// Check a hit against a tank body
    pub fn check_hit(&self, target: Vector2, target_radius: f64) -> bool {
        self.alive && self.position.distance_to(target) <= target_radius
    }
}

/// Gun and damage rules
pub struct CombatSystem;

impl CombatSystem {
    /// The gun only fires once fully cooled
    pub fn can_fire(gun_heat: f64) -> bool {
        gun_heat <= 0.0
    }

    /// Heat left after one tick of cooling
    pub fn cool_gun(gun_heat: f64, guncool_active: bool, config: &EngineConfig) -> f64 {
        let rate = if guncool_active {
            config.gun_cooldown_rate * config.guncool_multiplier
        } else {
            config.gun_cooldown_rate
        };
        (gun_heat - rate).max(0.0)
    }

    /// Heat after a shot of the given power
    pub fn fire_heat(power: f64, config: &EngineConfig) -> f64 {
        (power * config.heat_per_power).clamp(0.0, config.max_gun_heat)
    }

    /// Energy carried by a missile fired at the given power
    pub fn missile_energy(power: f64, firepower_active: bool, config: &EngineConfig) -> f64 {
        let energy = power * config.missile_energy_multiplier;
        if firepower_active {
            energy * config.firepower_multiplier
        } else {
            energy
        }
    }

    /// Apply damage to energy, returns (new_energy, is_dead)
    pub fn apply_damage(current_energy: f64, damage: f64) -> (f64, bool) {
        let new_energy = (current_energy - damage.max(0.0)).max(0.0);
        (new_energy, new_energy <= 0.0)
    }
}

/// Missile strike resolved this tick
#[derive(Debug, Clone, PartialEq)]
pub struct HitResult {
    pub missile_id: u64,
    pub shooter: usize,
    pub target: usize,
    pub damage: f64,
    /// Bearing from the target to the impact point
    pub angle: Angle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_power_missile_carries_ten_energy_and_expires() {
        let config = EngineConfig::default();
        let bounds = ArenaBounds::new(config.arena_width, config.arena_height);
        let trig = Trig::Exact;

        let energy = CombatSystem::missile_energy(50.0, false, &config);
        assert!((energy - 10.0).abs() < 1e-9);

        let mut missile = Missile::new(1, 0, Vector2::ORIGIN, Angle::from_degrees(30.0), energy);
        let mut ticks = 0;
        while missile.update(&bounds, &config, &trig) {
            ticks += 1;
            assert!(ticks < 1_000, "missile never expired");
        }
        assert!(!missile.alive);
    }

    #[test]
    fn missile_runs_out_of_energy_in_open_space() {
        let config = EngineConfig {
            arena_width: 100_000.0,
            arena_height: 100_000.0,
            ..Default::default()
        };
        let bounds = ArenaBounds::new(config.arena_width, config.arena_height);
        let mut missile = Missile::new(1, 0, Vector2::ORIGIN, Angle::ZERO, 1.0);
        let mut ticks = 0u32;
        while missile.update(&bounds, &config, &Trig::Exact) {
            ticks += 1;
        }
        // 1.0 energy at 0.02 per tick
        assert!((48..=50).contains(&ticks));
    }

    #[test]
    fn heat_is_capped() {
        let config = EngineConfig::default();
        assert!((CombatSystem::fire_heat(50.0, &config) - 30.0).abs() < 1e-9);
        assert!((CombatSystem::fire_heat(10.0, &config) - 6.0).abs() < 1e-9);
        assert!(!CombatSystem::can_fire(0.5));
        assert_eq!(CombatSystem::cool_gun(0.5, false, &config), 0.0);
        assert!(CombatSystem::can_fire(0.0));
    }

    #[test]
    fn damage_floors_at_zero() {
        assert_eq!(CombatSystem::apply_damage(5.0, 10.0), (0.0, true));
        assert_eq!(CombatSystem::apply_damage(50.0, 10.0), (40.0, false));
    }
}
