//! Power-ups - spawning, lifetime and the slot a tank carries

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;

use super::geometry::{ArenaBounds, Vector2};

/// Power-up catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUpKind {
    /// Multiplies the commanded speed
    Speed,
    /// Multiplies the gun cooling rate
    GunCool,
    /// Multiplies the energy of fired missiles
    FirePower,
    /// Instant energy refill
    Energy,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 4] = [
        PowerUpKind::Speed,
        PowerUpKind::GunCool,
        PowerUpKind::FirePower,
        PowerUpKind::Energy,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            PowerUpKind::Speed => "⚡",
            PowerUpKind::GunCool => "❄",
            PowerUpKind::FirePower => "🔥",
            PowerUpKind::Energy => "🔋",
        }
    }

    /// Effect multiplier while this kind occupies a tank's slot
    pub fn multiplier(self, config: &EngineConfig) -> f64 {
        match self {
            PowerUpKind::Speed => config.speed_multiplier,
            PowerUpKind::GunCool => config.guncool_multiplier,
            PowerUpKind::FirePower => config.firepower_multiplier,
            PowerUpKind::Energy => 1.0,
        }
    }
}

/// A power-up lying on the field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerUp {
    pub id: u64,
    pub kind: PowerUpKind,
    pub amount: f64,
    /// Ticks left before it disappears
    pub duration: u32,
    pub position: Vector2,
    pub alive: bool,
}

impl PowerUp {
    /// Roll a power-up at a random spot inset from the walls
    pub fn spawn<R: Rng + ?Sized>(
        id: u64,
        rng: &mut R,
        bounds: &ArenaBounds,
        config: &EngineConfig,
    ) -> Self {
        let kind = PowerUpKind::ALL[rng.gen_range(0..PowerUpKind::ALL.len())];
        let margin = config.tank_size * 5.0;
        let max_x = (bounds.width / 2.0 - margin).max(0.0);
        let max_y = (bounds.height / 2.0 - margin).max(0.0);
        let position = Vector2::new(
            rng.gen_range(-max_x..=max_x),
            rng.gen_range(-max_y..=max_y),
        );
        let amount = config
            .min_powerup_amount
            .max(config.max_powerup_amount * rng.gen::<f64>());

        Self {
            id,
            kind,
            amount,
            duration: config.powerup_duration,
            position,
            alive: config.powerup_duration > 0,
        }
    }

    /// Count down the field lifetime, returns false once expired
    pub fn update(&mut self) -> bool {
        self.duration = self.duration.saturating_sub(1);
        if self.duration == 0 {
            self.alive = false;
        }
        self.alive
    }

    /// Whether a tank body at `position` overlaps this power-up
    pub fn overlaps(&self, position: Vector2, config: &EngineConfig) -> bool {
        self.alive && self.position.distance_to(position) < config.tank_size + config.powerup_size
    }
}

/// Power-up effect held by a tank
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivePowerUp {
    pub kind: PowerUpKind,
    /// Remaining amount; the effect ends when it reaches zero
    pub amount: f64,
}
