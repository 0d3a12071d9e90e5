//! Built-in strategies used to run and exercise the engine

use serde_json::json;
use tracing::{debug, warn};

use crate::store::TankMemory;

use super::geometry::Angle;
use super::strategy::{
    MatchEndView, Strategy, StrategyContext, StrategyError, StrategyRegistry, TankControl,
};

/// Register `idle`, `turret` and `wanderer`
pub fn register_all(registry: &mut StrategyRegistry) {
    registry.register("idle", |_| Box::new(Idle));
    registry.register("turret", |_| Box::new(Turret::default()));
    registry.register("wanderer", |ctx| Box::new(Wanderer::new(ctx)));
}

/// Fraction of the max turn rate needed to close `error` this tick
fn steer(error: Angle, max_turn_deg: f64) -> f64 {
    if max_turn_deg <= 0.0 {
        return 0.0;
    }
    (error.degrees() / max_turn_deg).clamp(-1.0, 1.0)
}

/// Sits still and does nothing
pub struct Idle;

impl Strategy for Idle {
    fn think(&mut self, _tank: &mut TankControl<'_>) -> Result<(), StrategyError> {
        Ok(())
    }
}

/// Stationary gun: sweeps until something shows up on radar, then tracks and fires
#[derive(Debug, Clone)]
pub struct Turret {
    sweep: f64,
    /// Shot power
    power: f64,
    /// Never fire below this much energy
    reserve: f64,
    /// Aim error (degrees) accepted before firing
    tolerance_deg: f64,
}

impl Default for Turret {
    fn default() -> Self {
        Self {
            sweep: 1.0,
            power: 30.0,
            reserve: 150.0,
            tolerance_deg: 2.0,
        }
    }
}

impl Strategy for Turret {
    fn think(&mut self, tank: &mut TankControl<'_>) -> Result<(), StrategyError> {
        let max_gun = tank.config().max_gun_turn_deg;
        let Some(target) = tank.tanks().first().cloned() else {
            tank.set_gun_turn(self.sweep);
            return Ok(());
        };

        let error = tank.gun_heading().difference(target.angle_to);
        tank.set_gun_turn(steer(error, max_gun));
        // Keep sweeping the same way the target was last seen
        self.sweep = if error.radians() >= 0.0 { 1.0 } else { -1.0 };

        if error.degrees().abs() <= self.tolerance_deg && tank.energy() > self.reserve {
            tank.fire(self.power);
        }
        Ok(())
    }
}

/// Orbits its opponent, keeps off the walls and grabs power-ups
///
/// The orbit direction is kept in private storage and flipped after a loss,
/// so it carries over between matches and sessions.
#[derive(Debug)]
pub struct Wanderer {
    memory: TankMemory,
    orbit: f64,
}

impl Wanderer {
    const ORBIT_KEY: &'static str = "orbit";
    const RESERVE: f64 = 200.0;
    const POWER: f64 = 15.0;

    pub fn new(ctx: StrategyContext) -> Self {
        let orbit = match ctx.memory.load::<f64>(Self::ORBIT_KEY) {
            Ok(Some(orbit)) if orbit < 0.0 => -1.0,
            Ok(_) => 1.0,
            Err(e) => {
                warn!(tank = %ctx.name, error = %e, "Ignoring stored orbit");
                1.0
            }
        };
        Self {
            memory: ctx.memory,
            orbit,
        }
    }

    pub fn orbit(&self) -> f64 {
        self.orbit
    }
}

impl Strategy for Wanderer {
    fn think(&mut self, tank: &mut TankControl<'_>) -> Result<(), StrategyError> {
        let max_body = tank.config().max_body_turn_deg;
        let max_gun = tank.config().max_gun_turn_deg;
        let target = tank.tanks().first().cloned();
        let power_up = tank.power_ups().first().cloned();

        let since_contact = match &target {
            Some(_) => 0.0,
            None => tank.memory().get_f64("since_contact").unwrap_or(0.0) + 1.0,
        };
        tank.memory().set("since_contact", json!(since_contact));

        let desired = if tank.is_near_wall() {
            tank.nearest_wall_angle().opposite()
        } else if let Some(p) = &power_up {
            p.angle_to
        } else if let Some(t) = &target {
            t.angle_to + Angle::from_degrees(90.0 * self.orbit)
        } else {
            tank.body_aim() + Angle::from_degrees(max_body * self.orbit)
        };
        let body_error = tank.body_aim().difference(desired);
        tank.set_body_turn(steer(body_error, max_body));
        tank.set_speed(1.0);

        match &target {
            Some(t) => {
                tank.set_radar_arc(0.5);
                let error = tank.gun_heading().difference(t.angle_to);
                tank.set_gun_turn(steer(error, max_gun));
                if error.degrees().abs() <= 3.0 && tank.energy() > Self::RESERVE {
                    tank.fire(Self::POWER);
                }
            }
            None => {
                // Widen the cone after losing contact for a while
                tank.set_radar_arc(if since_contact > 30.0 { 1.0 } else { 0.5 });
                tank.set_gun_turn(self.orbit);
            }
        }
        Ok(())
    }

    fn on_match_end(&mut self, view: &MatchEndView<'_>) {
        if !view.lost() {
            return;
        }
        self.orbit = -self.orbit;
        debug!(orbit = self.orbit, "Wanderer flips orbit after a loss");
        if let Err(e) = self.memory.save(Self::ORBIT_KEY, &self.orbit) {
            warn!(error = %e, "Failed to persist orbit direction");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::game::geometry::Vector2;
    use crate::game::r#match::{EndReason, MatchOutcome, MatchResult};
    use crate::game::sensor::SensorSystem;
    use crate::game::strategy::{invoke, ArenaInfo};
    use crate::game::tank::Tank;
    use crate::store::{KeyValueStore, MemoryStore};
    use std::sync::Arc;
    use uuid::Uuid;

    fn arena(config: &EngineConfig) -> ArenaInfo {
        ArenaInfo {
            width: config.arena_width,
            height: config.arena_height,
            iteration: 0,
            tanks_remaining: 2,
            power_ups_spawned: 0,
            missile_interception: false,
        }
    }

    #[test]
    fn turret_fires_at_aligned_target() {
        let config = EngineConfig::default();
        let mut tanks = vec![
            Tank::new(0, "turret", Vector2::new(-280.0, 0.0), Angle::ZERO, &config),
            Tank::new(1, "idle", Vector2::new(280.0, 0.0), Angle::from_degrees(180.0), &config),
        ];
        SensorSystem::refresh(&mut tanks, &[], &[], &config);

        let mut turret = Turret::default();
        invoke(&mut turret, &mut tanks[0], &arena(&config), &config).unwrap();
        assert_eq!(tanks[0].commands.fire, Some(30.0));
    }

    #[test]
    fn turret_sweeps_when_blind() {
        let config = EngineConfig::default();
        let mut tank = Tank::new(0, "turret", Vector2::ORIGIN, Angle::ZERO, &config);
        let mut turret = Turret::default();
        invoke(&mut turret, &mut tank, &arena(&config), &config).unwrap();
        assert_eq!(tank.commands.gun_turn, 1.0);
        assert!(tank.commands.fire.is_none());
    }

    #[test]
    fn wanderer_flips_and_persists_orbit_after_loss() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let ctx = || StrategyContext {
            name: "wanderer".to_string(),
            memory: TankMemory::new(store.clone(), "wanderer"),
        };

        let mut wanderer = Wanderer::new(ctx());
        assert_eq!(wanderer.orbit(), 1.0);

        let outcome = MatchOutcome {
            match_id: Uuid::nil(),
            match_number: 1,
            result: MatchResult::Winner {
                index: 0,
                name: "turret".to_string(),
            },
            reason: EndReason::Elimination,
            iterations: 10,
            powerups_spawned: 0,
            tanks: Vec::new(),
            bonuses: None,
        };
        wanderer.on_match_end(&MatchEndView {
            index: 1,
            outcome: &outcome,
        });
        assert_eq!(wanderer.orbit(), -1.0);

        // A fresh instance picks the stored direction back up
        assert_eq!(Wanderer::new(ctx()).orbit(), -1.0);
    }

    #[test]
    fn wanderer_backs_off_walls() {
        let config = EngineConfig::default();
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut wanderer = Wanderer::new(StrategyContext {
            name: "wanderer".to_string(),
            memory: TankMemory::new(store, "wanderer"),
        });
        // Facing the right wall, close to it
        let mut tank = Tank::new(0, "wanderer", Vector2::new(370.0, 0.0), Angle::ZERO, &config);
        tank.is_near_wall = true;

        invoke(&mut wanderer, &mut tank, &arena(&config), &config).unwrap();
        assert_eq!(tank.commands.speed, 1.0);
        assert_eq!(tank.commands.body_turn.abs(), 1.0);
        assert_eq!(tank.memory.get_f64("since_contact"), Some(1.0));
    }
}
