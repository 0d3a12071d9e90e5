//! Match state and the authoritative tick

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;

use super::combat::Missile;
use super::geometry::{Angle, ArenaBounds, Trig, Vector2};
use super::physics::PhysicsSystem;
use super::powerup::PowerUp;
use super::sensor::SensorSystem;
use super::strategy::{invoke, ArenaInfo, Strategy};
use super::tank::{Tank, TankCounters};

/// Toggles a host may flip between matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSettings {
    pub powerups_enabled: bool,
    pub missile_interception: bool,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            powerups_enabled: true,
            missile_interception: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchResult {
    Winner { index: usize, name: String },
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// One tank left standing
    Elimination,
    /// Both tanks died on the same tick
    MutualDestruction,
    /// `max_iterations` reached with both alive
    IterationCap,
}

/// Final figures of one combatant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankReport {
    pub index: usize,
    pub name: String,
    pub energy: f64,
    pub accuracy: f64,
    pub counters: TankCounters,
    pub match_score: f64,
    pub survived: bool,
}

impl TankReport {
    fn of(tank: &Tank) -> Self {
        Self {
            index: tank.index,
            name: tank.name.clone(),
            energy: tank.energy,
            accuracy: tank.accuracy,
            counters: tank.counters,
            match_score: tank.match_score,
            survived: tank.is_alive(),
        }
    }
}

/// Bonus points awarded to the winner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bonuses {
    pub survival: u64,
    pub accuracy: u64,
}

/// Everything known about a finished match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub match_id: Uuid,
    pub match_number: u64,
    pub result: MatchResult,
    pub reason: EndReason,
    pub iterations: u64,
    pub powerups_spawned: u32,
    /// Ordered by combatant index
    pub tanks: Vec<TankReport>,
    pub bonuses: Option<Bonuses>,
}

impl MatchOutcome {
    pub fn winner_index(&self) -> Option<usize> {
        match &self.result {
            MatchResult::Winner { index, .. } => Some(*index),
            MatchResult::Draw => None,
        }
    }
}

/// One match in progress
pub struct Match {
    pub id: Uuid,
    pub number: u64,
    pub iteration: u64,
    bounds: ArenaBounds,
    tanks: Vec<Tank>,
    fallen: Vec<Tank>,
    missiles: Vec<Missile>,
    power_ups: Vec<PowerUp>,
    power_ups_spawned: u32,
    settings: MatchSettings,
    config: Arc<EngineConfig>,
    trig: Trig,
    next_entity_id: u64,
    outcome: Option<MatchOutcome>,
}

impl Match {
    /// Place two tanks opposite each other on the spawn circle, facing the centre
    ///
    /// `trig` is shared with every later match of the session so a lookup
    /// table is built once.
    pub fn new<R: Rng + ?Sized>(
        number: u64,
        names: [&str; 2],
        config: Arc<EngineConfig>,
        settings: MatchSettings,
        trig: Trig,
        rng: &mut R,
    ) -> Self {
        let id = uuid::Builder::from_random_bytes(rng.gen()).into_uuid();
        let radius =
            config.arena_width.min(config.arena_height) / 2.0 * config.spawn_radius_fraction;
        let theta = Angle::from_radians(rng.gen_range(-PI..PI));

        let mut tanks: Vec<Tank> = names
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let bearing = if index == 0 { theta } else { theta.opposite() };
                let position = Vector2::ORIGIN.polar_offset(radius, bearing, &trig);
                let facing = position.angle_to(Vector2::ORIGIN);
                Tank::new(index, *name, position, facing, &config)
            })
            .collect();
        // List order decides who acts first each tick
        tanks.shuffle(rng);

        Self::with_tanks(id, number, tanks, config, settings, trig)
    }

    /// Start a match from explicitly placed tanks
    pub fn with_tanks(
        id: Uuid,
        number: u64,
        tanks: Vec<Tank>,
        config: Arc<EngineConfig>,
        settings: MatchSettings,
        trig: Trig,
    ) -> Self {
        debug_assert!(
            tanks
                .iter()
                .enumerate()
                .all(|(i, t)| tanks[i + 1..].iter().all(|o| o.index != t.index)),
            "duplicate tank indices"
        );

        info!(
            match_number = number,
            match_id = %id,
            tanks = ?tanks.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "Match started"
        );

        Self {
            id,
            number,
            iteration: 0,
            bounds: ArenaBounds::new(config.arena_width, config.arena_height),
            trig,
            tanks,
            fallen: Vec::new(),
            missiles: Vec::new(),
            power_ups: Vec::new(),
            power_ups_spawned: 0,
            settings,
            config,
            next_entity_id: 1,
            outcome: None,
        }
    }

    pub fn tanks(&self) -> &[Tank] {
        &self.tanks
    }

    pub fn fallen(&self) -> &[Tank] {
        &self.fallen
    }

    pub fn missiles(&self) -> &[Missile] {
        &self.missiles
    }

    pub fn power_ups(&self) -> &[PowerUp] {
        &self.power_ups
    }

    pub fn bounds(&self) -> &ArenaBounds {
        &self.bounds
    }

    pub fn settings(&self) -> MatchSettings {
        self.settings
    }

    pub fn trig(&self) -> &Trig {
        &self.trig
    }

    pub fn power_ups_spawned(&self) -> u32 {
        self.power_ups_spawned
    }

    pub fn is_over(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<&MatchOutcome> {
        self.outcome.as_ref()
    }

    pub fn arena_info(&self) -> ArenaInfo {
        ArenaInfo {
            width: self.bounds.width,
            height: self.bounds.height,
            iteration: self.iteration,
            tanks_remaining: self.tanks.len(),
            power_ups_spawned: self.power_ups_spawned,
            missile_interception: self.settings.missile_interception,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    /// Run one tick; returns the outcome on the tick the match ends
    ///
    /// `strategies` is indexed by combatant index.
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        strategies: &mut [Box<dyn Strategy>],
        rng: &mut R,
    ) -> Option<MatchOutcome> {
        if self.outcome.is_some() {
            return None;
        }

        self.spawn_power_up(rng);

        SensorSystem::refresh(&mut self.tanks, &self.missiles, &self.power_ups, &self.config);
        self.run_strategies(strategies);

        self.update_missiles();
        self.power_ups.iter_mut().for_each(|p| {
            p.update();
        });
        self.update_tanks();

        self.remove_dead();
        self.iteration += 1;

        self.check_end()
    }

    fn spawn_power_up<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if !self.settings.powerups_enabled || !self.power_ups.is_empty() {
            return;
        }
        if rng.gen::<f64>() < self.config.powerup_spawn_probability {
            let id = self.next_id();
            let power_up = PowerUp::spawn(id, rng, &self.bounds, &self.config);
            debug!(
                match_number = self.number,
                kind = ?power_up.kind,
                amount = power_up.amount,
                "Power-up spawned"
            );
            self.power_ups.push(power_up);
            self.power_ups_spawned += 1;
        }
    }

    fn run_strategies(&mut self, strategies: &mut [Box<dyn Strategy>]) {
        let arena = self.arena_info();
        for tank in self.tanks.iter_mut() {
            match strategies.get_mut(tank.index) {
                Some(strategy) => {
                    // Failures are logged inside and leave the tank idle
                    let _ = invoke(strategy.as_mut(), tank, &arena, &self.config);
                }
                None => {
                    warn!(tank = %tank.name, index = tank.index, "No strategy bound, tank idles");
                }
            }
        }
    }

    fn update_missiles(&mut self) {
        for missile in self.missiles.iter_mut() {
            missile.update(&self.bounds, &self.config, &self.trig);
        }
        if self.settings.missile_interception {
            let pairs = PhysicsSystem::intercept_missiles(&mut self.missiles, &self.config);
            if pairs > 0 {
                debug!(match_number = self.number, pairs, "Missiles intercepted");
            }
        }
    }

    fn update_tanks(&mut self) {
        let config = Arc::clone(&self.config);

        for i in 0..self.tanks.len() {
            let missile_id = self.next_entity_id;
            let tank = &mut self.tanks[i];
            tank.advance(&config, &self.trig);
            PhysicsSystem::contain_in_walls(tank, &self.bounds, &config);
            if let Some(mut missile) = tank.service_gun(missile_id, &config, &self.trig) {
                self.next_entity_id += 1;
                if !self.bounds.contains(missile.position, 0.0) {
                    missile.alive = false;
                }
                self.missiles.push(missile);
            }
        }

        for i in 0..self.tanks.len() {
            for j in (i + 1)..self.tanks.len() {
                let (left, right) = self.tanks.split_at_mut(j);
                PhysicsSystem::collide_tanks(&mut left[i], &mut right[0], &self.bounds, &config);
            }
        }

        let hits = PhysicsSystem::strike_tanks(&mut self.missiles, &mut self.tanks, &config);
        for hit in hits {
            let shooter = self
                .tanks
                .iter_mut()
                .chain(self.fallen.iter_mut())
                .find(|t| t.index == hit.shooter);
            if let Some(shooter) = shooter {
                shooter.counters.missiles_hit += 1;
                shooter.match_score += hit.damage;
            }
        }

        for power_up in self.power_ups.iter_mut().filter(|p| p.alive) {
            if let Some(tank) = self
                .tanks
                .iter_mut()
                .find(|t| t.is_alive() && power_up.overlaps(t.position, &config))
            {
                tank.collect(power_up, &config);
                power_up.alive = false;
                debug!(tank = %tank.name, kind = ?power_up.kind, "Power-up collected");
            }
        }

        for tank in self.tanks.iter_mut() {
            tank.finish_tick(&config);
        }
    }

    fn remove_dead(&mut self) {
        self.missiles.retain(|m| m.alive);
        self.power_ups.retain(|p| p.alive);

        let (alive, dead): (Vec<Tank>, Vec<Tank>) =
            self.tanks.drain(..).partition(|t| t.is_alive());
        for tank in &dead {
            info!(match_number = self.number, tank = %tank.name, iteration = self.iteration, "Tank destroyed");
        }
        self.tanks = alive;
        self.fallen.extend(dead);
    }

    fn check_end(&mut self) -> Option<MatchOutcome> {
        let reason = match self.tanks.len() {
            0 => EndReason::MutualDestruction,
            1 => EndReason::Elimination,
            _ if self.iteration >= self.config.max_iterations => EndReason::IterationCap,
            _ => return None,
        };

        let result = match reason {
            EndReason::Elimination => {
                let survivor = &self.tanks[0];
                MatchResult::Winner {
                    index: survivor.index,
                    name: survivor.name.clone(),
                }
            }
            EndReason::MutualDestruction => MatchResult::Draw,
            EndReason::IterationCap => {
                let mut ranked: Vec<&Tank> = self.tanks.iter().collect();
                ranked.sort_by(|a, b| b.energy.total_cmp(&a.energy));
                if ranked.len() > 1 && ranked[0].energy == ranked[1].energy {
                    MatchResult::Draw
                } else {
                    MatchResult::Winner {
                        index: ranked[0].index,
                        name: ranked[0].name.clone(),
                    }
                }
            }
        };

        let bonuses = match &result {
            MatchResult::Winner { index, .. } => self.tanks.iter().find(|t| t.index == *index).map(|w| Bonuses {
                survival: (w.energy * self.config.survival_bonus_points).max(0.0).floor() as u64,
                accuracy: (w.accuracy * self.config.accuracy_bonus_points).max(0.0).floor() as u64,
            }),
            MatchResult::Draw => None,
        };

        let mut tanks: Vec<TankReport> = self
            .tanks
            .iter()
            .chain(self.fallen.iter())
            .map(TankReport::of)
            .collect();
        tanks.sort_by_key(|t| t.index);

        let outcome = MatchOutcome {
            match_id: self.id,
            match_number: self.number,
            result,
            reason,
            iterations: self.iteration,
            powerups_spawned: self.power_ups_spawned,
            tanks,
            bonuses,
        };

        info!(
            match_number = self.number,
            reason = ?outcome.reason,
            winner = ?outcome.winner_index(),
            iterations = outcome.iterations,
            "Match ended"
        );
        self.outcome = Some(outcome.clone());
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::builtin::{Idle, Turret};
    use crate::game::strategy::{StrategyError, TankControl};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct Charger;

    impl Strategy for Charger {
        fn think(&mut self, tank: &mut TankControl<'_>) -> Result<(), StrategyError> {
            tank.set_speed(1.0);
            Ok(())
        }
    }

    struct Boom;

    impl Strategy for Boom {
        fn think(&mut self, _tank: &mut TankControl<'_>) -> Result<(), StrategyError> {
            panic!("strategy exploded");
        }
    }

    fn no_powerups() -> MatchSettings {
        MatchSettings {
            powerups_enabled: false,
            missile_interception: false,
        }
    }

    fn duel(config: &Arc<EngineConfig>) -> Match {
        let tanks = vec![
            Tank::new(0, "turret", Vector2::new(-280.0, 0.0), Angle::ZERO, config),
            Tank::new(1, "idle", Vector2::new(280.0, 0.0), Angle::from_degrees(180.0), config),
        ];
        Match::with_tanks(
            Uuid::nil(),
            1,
            tanks,
            config.clone(),
            no_powerups(),
            Trig::for_mode(config.trig),
        )
    }

    fn run_to_end(game: &mut Match, strategies: &mut [Box<dyn Strategy>], rng: &mut ChaCha8Rng) -> MatchOutcome {
        loop {
            if let Some(outcome) = game.tick(strategies, rng) {
                return outcome;
            }
            assert!(game.iteration <= game.config.max_iterations);
        }
    }

    #[test]
    fn spawns_opposite_each_other_facing_centre() {
        let config = Arc::new(EngineConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let game = Match::new(1, ["a", "b"], config.clone(), MatchSettings::default(), Trig::Exact, &mut rng);

        let radius = 300.0 * config.spawn_radius_fraction;
        let a = game.tanks().iter().find(|t| t.index == 0).unwrap();
        let b = game.tanks().iter().find(|t| t.index == 1).unwrap();
        assert!((a.position.distance_to(Vector2::ORIGIN) - radius).abs() < 1e-9);
        assert!((a.position.distance_to(b.position) - 2.0 * radius).abs() < 1e-6);
        assert!(a.body_aim.difference(a.position.angle_to(Vector2::ORIGIN)).abs() < 1e-9);
        assert_eq!(a.energy, config.max_energy);
    }

    #[test]
    fn turret_duel_runs_to_iteration_cap() {
        let config = Arc::new(EngineConfig::default());
        let mut game = duel(&config);
        let mut strategies: Vec<Box<dyn Strategy>> = vec![Box::new(Turret::default()), Box::new(Idle)];
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let outcome = run_to_end(&mut game, &mut strategies, &mut rng);
        assert_eq!(outcome.reason, EndReason::IterationCap);
        assert_eq!(outcome.iterations, config.max_iterations);

        let turret = &outcome.tanks[0];
        let idle = &outcome.tanks[1];
        assert!(turret.counters.missiles_fired > 0);
        assert_eq!(turret.counters.missiles_hit, idle.counters.missile_collisions);
        assert!(turret.counters.missiles_hit > 0);
        assert!(idle.energy < config.max_energy);
        // Turret spent more on shells than it dealt, idle keeps the edge
        assert_eq!(outcome.winner_index(), Some(1));
        assert!(outcome.bonuses.is_some());
    }

    #[test]
    fn energy_stays_in_bounds_every_tick() {
        let config = Arc::new(EngineConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let mut game = Match::new(1, ["turret", "charger"], config.clone(), MatchSettings::default(), Trig::Exact, &mut rng);
        let mut strategies: Vec<Box<dyn Strategy>> = vec![Box::new(Turret::default()), Box::new(Charger)];

        while game.tick(&mut strategies, &mut rng).is_none() {
            for tank in game.tanks() {
                assert!(tank.energy > 0.0 && tank.energy <= config.max_energy);
                assert!((0.0..=config.max_gun_heat).contains(&tank.gun_heat));
                assert!(game.bounds().contains(tank.position, config.tank_size - 1e-9));
            }
            for tank in game.fallen() {
                assert_eq!(tank.energy, 0.0);
            }
        }
    }

    #[test]
    fn panicking_strategy_only_idles_its_tank() {
        let config = Arc::new(EngineConfig {
            max_iterations: 200,
            ..Default::default()
        });
        let mut game = duel(&config);
        let mut strategies: Vec<Box<dyn Strategy>> = vec![Box::new(Turret::default()), Box::new(Boom)];
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let outcome = run_to_end(&mut game, &mut strategies, &mut rng);
        assert_eq!(outcome.iterations, 200);
        assert!(outcome.tanks[0].counters.missiles_fired > 0);
        assert_eq!(outcome.tanks[1].counters.missiles_fired, 0);
    }

    #[test]
    fn last_tank_standing_wins() {
        let config = Arc::new(EngineConfig::default());
        let mut game = duel(&config);
        game.tanks[1].energy = 1.0;
        let mut strategies: Vec<Box<dyn Strategy>> = vec![Box::new(Turret::default()), Box::new(Idle)];
        let mut rng = ChaCha8Rng::seed_from_u64(2);

        let outcome = run_to_end(&mut game, &mut strategies, &mut rng);
        assert_eq!(outcome.reason, EndReason::Elimination);
        assert_eq!(
            outcome.result,
            MatchResult::Winner {
                index: 0,
                name: "turret".to_string()
            }
        );
        assert!(!outcome.tanks[1].survived);
        assert_eq!(game.fallen().len(), 1);

        let bonuses = outcome.bonuses.unwrap();
        let winner = &outcome.tanks[0];
        assert_eq!(bonuses.survival, (winner.energy * 0.5).floor() as u64);
        assert_eq!(bonuses.accuracy, (winner.accuracy * 500.0).floor() as u64);
        // Finished matches ignore further ticks
        assert!(game.tick(&mut strategies, &mut rng).is_none());
    }

    #[test]
    fn equal_energy_at_cap_is_a_draw() {
        let config = Arc::new(EngineConfig {
            max_iterations: 10,
            ..Default::default()
        });
        let mut game = duel(&config);
        let mut strategies: Vec<Box<dyn Strategy>> = vec![Box::new(Idle), Box::new(Idle)];
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let outcome = run_to_end(&mut game, &mut strategies, &mut rng);
        assert_eq!(outcome.result, MatchResult::Draw);
        assert!(outcome.bonuses.is_none());
    }
}
