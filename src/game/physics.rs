//! Collision and physics resolution

use crate::config::EngineConfig;

use super::combat::{HitResult, Missile};
use super::geometry::{ArenaBounds, Vector2};
use super::tank::{CollisionFeedback, Tank};

/// Stateless collision resolver
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Keep a moved tank inside the walls, charging damage on fresh contact
    ///
    /// Only a move that had to be clipped counts as hitting the wall; a tank
    /// resting on the boundary is left alone.
    pub fn contain_in_walls(tank: &mut Tank, bounds: &ArenaBounds, config: &EngineConfig) {
        let clipped = bounds.clamp(tank.position, config.tank_size);
        if clipped != tank.position {
            let wall_angle = bounds.nearest_wall_angle(tank.position);
            tank.position = clipped;
            tank.actual_speed = 0.0;

            if tank.feedback.wall.is_none() {
                tank.take_damage(config.wall_collision_damage);
                tank.feedback.wall = Some(CollisionFeedback {
                    angle: wall_angle,
                    damage: config.wall_collision_damage,
                    remaining: config.collision_cooldown,
                });
                tank.counters.wall_collisions += 1;
            }
        }
        tank.is_near_wall = bounds.distance_to_wall(tank.position) < config.near_wall_margin;
    }

    /// Check overlap between two tank bodies
    pub fn check_tank_collision(a: Vector2, b: Vector2, radius: f64) -> bool {
        a.distance_to(b) < radius * 2.0
    }

    /// Push two overlapping bodies apart along the line between them
    pub fn resolve_tank_collision(a: Vector2, b: Vector2, radius: f64) -> (Vector2, Vector2) {
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let dist = (dx * dx + dy * dy).sqrt();

        if dist < 0.001 {
            // Same spot, separate along x
            return (
                Vector2::new(a.x - radius, a.y),
                Vector2::new(b.x + radius, b.y),
            );
        }

        let overlap = radius * 2.0 - dist;
        if overlap <= 0.0 {
            return (a, b);
        }

        let nx = dx / dist;
        let ny = dy / dist;
        let push = overlap / 2.0 + 0.1;

        (
            Vector2::new(a.x - nx * push, a.y - ny * push),
            Vector2::new(b.x + nx * push, b.y + ny * push),
        )
    }

    /// Ram damage, feedback and separation for a pair of live tanks
    pub fn collide_tanks(a: &mut Tank, b: &mut Tank, bounds: &ArenaBounds, config: &EngineConfig) {
        if !a.is_alive() || !b.is_alive() {
            return;
        }
        if !Self::check_tank_collision(a.position, b.position, config.tank_size) {
            return;
        }

        let (pos_a, pos_b) = (a.position, b.position);
        for (me, other) in [(&mut *a, pos_b), (&mut *b, pos_a)] {
            if me.feedback.tank.is_some() {
                continue;
            }
            me.take_damage(config.tank_collision_damage);
            me.feedback.tank = Some(CollisionFeedback {
                angle: me.position.angle_to(other),
                damage: config.tank_collision_damage,
                remaining: config.collision_cooldown,
            });
            me.counters.tank_collisions += 1;
        }

        let (pa, pb) = Self::resolve_tank_collision(a.position, b.position, config.tank_size);
        a.position = bounds.clamp(pa, config.tank_size);
        b.position = bounds.clamp(pb, config.tank_size);
    }

    /// Missiles striking tanks other than their owner
    ///
    /// Damage and victim bookkeeping are applied here; crediting the shooter
    /// is left to the caller, which can also reach tanks already out.
    pub fn strike_tanks(
        missiles: &mut [Missile],
        tanks: &mut [Tank],
        config: &EngineConfig,
    ) -> Vec<HitResult> {
        let mut hits = Vec::new();
        for missile in missiles.iter_mut().filter(|m| m.alive) {
            let Some(target) = tanks.iter_mut().find(|t| {
                t.is_alive()
                    && t.index != missile.owner
                    && missile.check_hit(t.position, config.tank_size)
            }) else {
                continue;
            };

            let damage = missile.energy;
            let angle = target.position.angle_to(missile.position);
            missile.alive = false;
            target.take_damage(damage);
            target.counters.missile_collisions += 1;
            target.feedback.missile = Some(CollisionFeedback {
                angle,
                damage,
                remaining: config.collision_cooldown,
            });

            hits.push(HitResult {
                missile_id: missile.id,
                shooter: missile.owner,
                target: target.index,
                damage,
                angle,
            });
        }
        hits
    }

    /// Closest distance between two points moving linearly over one tick
    pub fn closest_approach(a_from: Vector2, a_to: Vector2, b_from: Vector2, b_to: Vector2) -> f64 {
        // Relative position and velocity of b with respect to a
        let px = b_from.x - a_from.x;
        let py = b_from.y - a_from.y;
        let vx = (b_to.x - b_from.x) - (a_to.x - a_from.x);
        let vy = (b_to.y - b_from.y) - (a_to.y - a_from.y);

        let speed_sq = vx * vx + vy * vy;
        let t = if speed_sq < 1e-12 {
            0.0
        } else {
            (-(px * vx + py * vy) / speed_sq).clamp(0.0, 1.0)
        };
        (px + vx * t).hypot(py + vy * t)
    }

    /// Destroy pairs of opposing missiles whose paths cross this tick
    ///
    /// Returns the number of pairs destroyed.
    pub fn intercept_missiles(missiles: &mut [Missile], config: &EngineConfig) -> usize {
        let mut pairs = 0;
        for i in 0..missiles.len() {
            for j in (i + 1)..missiles.len() {
                let (a, b) = (&missiles[i], &missiles[j]);
                if !a.alive || !b.alive || a.owner == b.owner {
                    continue;
                }
                let gap = Self::closest_approach(
                    a.previous_position,
                    a.position,
                    b.previous_position,
                    b.position,
                );
                if gap < config.interception_buffer {
                    missiles[i].alive = false;
                    missiles[j].alive = false;
                    pairs += 1;
                    break;
                }
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::geometry::{Angle, Trig};

    fn tank_at(index: usize, x: f64, y: f64, config: &EngineConfig) -> Tank {
        Tank::new(index, format!("t{index}"), Vector2::new(x, y), Angle::ZERO, config)
    }

    #[test]
    fn tank_driving_into_wall_is_clipped() {
        let config = EngineConfig::default();
        let bounds = ArenaBounds::new(config.arena_width, config.arena_height);
        let mut tank = tank_at(0, 380.0, 0.0, &config);
        tank.commands.speed = 1.0;

        for _ in 0..20 {
            tank.advance(&config, &Trig::Exact);
            PhysicsSystem::contain_in_walls(&mut tank, &bounds, &config);
            assert!(tank.position.x <= 400.0 - config.tank_size);
            tank.finish_tick(&config);
        }
        assert_eq!(tank.position.x, 388.0);
        assert_eq!(tank.actual_speed, 0.0);
        assert!(tank.is_near_wall);
        // Cooldown stops repeated charges while grinding the wall
        assert_eq!(tank.counters.wall_collisions, 1);
        assert_eq!(tank.energy, config.max_energy - config.wall_collision_damage);
        assert_eq!(tank.feedback.wall.map(|f| f.angle), Some(Angle::ZERO));
    }

    #[test]
    fn tank_resting_against_wall_is_charged_once() {
        let config = EngineConfig::default();
        let bounds = ArenaBounds::new(config.arena_width, config.arena_height);
        let mut tank = tank_at(0, 384.0, 0.0, &config);
        tank.commands.speed = 1.0;

        for _ in 0..10 {
            tank.advance(&config, &Trig::Exact);
            PhysicsSystem::contain_in_walls(&mut tank, &bounds, &config);
            tank.finish_tick(&config);
        }
        assert_eq!(tank.position.x, 388.0);
        assert_eq!(tank.counters.wall_collisions, 1);

        // Parked on the boundary well past several cooldowns
        tank.commands.speed = 0.0;
        for _ in 0..250 {
            tank.advance(&config, &Trig::Exact);
            PhysicsSystem::contain_in_walls(&mut tank, &bounds, &config);
            tank.finish_tick(&config);
        }
        assert_eq!(tank.position.x, 388.0);
        assert!(tank.is_near_wall);
        assert_eq!(tank.counters.wall_collisions, 1);
        assert_eq!(tank.energy, config.max_energy - config.wall_collision_damage);
        assert!(tank.feedback.wall.is_none());
    }

    #[test]
    fn tank_sliding_along_wall_is_not_charged() {
        let config = EngineConfig::default();
        let bounds = ArenaBounds::new(config.arena_width, config.arena_height);
        let mut tank = Tank::new(
            0,
            "t0".to_string(),
            Vector2::new(388.0, -100.0),
            Angle::from_degrees(90.0),
            &config,
        );
        tank.commands.speed = 1.0;

        for _ in 0..50 {
            tank.advance(&config, &Trig::Exact);
            PhysicsSystem::contain_in_walls(&mut tank, &bounds, &config);
            tank.finish_tick(&config);
        }
        assert!(tank.position.y > -100.0);
        assert_eq!(tank.counters.wall_collisions, 0);
        assert_eq!(tank.energy, config.max_energy);
    }

    #[test]
    fn rammed_tanks_separate_and_take_damage_once() {
        let config = EngineConfig::default();
        let bounds = ArenaBounds::new(config.arena_width, config.arena_height);
        let mut a = tank_at(0, 0.0, 0.0, &config);
        let mut b = tank_at(1, 10.0, 0.0, &config);

        PhysicsSystem::collide_tanks(&mut a, &mut b, &bounds, &config);
        assert!(a.position.distance_to(b.position) >= 2.0 * config.tank_size);
        assert_eq!(a.energy, 990.0);
        assert_eq!(b.energy, 990.0);
        assert_eq!(a.counters.tank_collisions, 1);
        assert_eq!(b.feedback.tank.map(|f| f.angle.degrees().round()), Some(180.0));

        // Still cooling down: shove them together again without more damage
        b.position = Vector2::new(5.0, 0.0);
        a.position = Vector2::ORIGIN;
        PhysicsSystem::collide_tanks(&mut a, &mut b, &bounds, &config);
        assert_eq!(a.energy, 990.0);
        assert_eq!(b.counters.tank_collisions, 1);
    }

    #[test]
    fn missile_hits_only_other_tanks() {
        let config = EngineConfig::default();
        let mut tanks = vec![tank_at(0, 0.0, 0.0, &config), tank_at(1, 100.0, 0.0, &config)];
        let mut missiles = vec![
            Missile::new(1, 0, Vector2::new(5.0, 0.0), Angle::ZERO, 10.0),
            Missile::new(2, 0, Vector2::new(95.0, 0.0), Angle::ZERO, 10.0),
        ];

        let hits = PhysicsSystem::strike_tanks(&mut missiles, &mut tanks, &config);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].target, 1);
        assert!(missiles[0].alive);
        assert!(!missiles[1].alive);
        assert_eq!(tanks[1].energy, 990.0);
        assert_eq!(tanks[1].counters.missile_collisions, 1);
        assert_eq!(tanks[0].energy, 1000.0);
    }

    #[test]
    fn head_on_missiles_intercept_each_other() {
        let config = EngineConfig::default();
        let bounds = ArenaBounds::new(config.arena_width, config.arena_height);
        let mut missiles = vec![
            Missile::new(1, 0, Vector2::new(-3.0, 0.0), Angle::ZERO, 10.0),
            Missile::new(2, 1, Vector2::new(3.0, 0.0), Angle::from_degrees(180.0), 10.0),
            Missile::new(3, 0, Vector2::new(0.0, 100.0), Angle::ZERO, 10.0),
        ];
        for m in missiles.iter_mut() {
            m.update(&bounds, &config, &Trig::Exact);
        }

        assert_eq!(PhysicsSystem::intercept_missiles(&mut missiles, &config), 1);
        assert!(!missiles[0].alive);
        assert!(!missiles[1].alive);
        assert!(missiles[2].alive);
    }

    #[test]
    fn crowded_missiles_pair_off_in_list_order() {
        let config = EngineConfig::default();
        // All three sit within the buffer of each other and hold still
        let mut missiles = vec![
            Missile::new(1, 0, Vector2::new(0.0, 0.0), Angle::ZERO, 10.0),
            Missile::new(2, 1, Vector2::new(1.0, 0.0), Angle::ZERO, 10.0),
            Missile::new(3, 1, Vector2::new(2.0, 0.0), Angle::ZERO, 10.0),
        ];

        assert_eq!(PhysicsSystem::intercept_missiles(&mut missiles, &config), 1);
        assert!(!missiles[0].alive);
        assert!(!missiles[1].alive);
        assert!(missiles[2].alive);
    }

    #[test]
    fn same_owner_missiles_pass_through() {
        let config = EngineConfig::default();
        let mut missiles = vec![
            Missile::new(1, 0, Vector2::ORIGIN, Angle::ZERO, 10.0),
            Missile::new(2, 0, Vector2::ORIGIN, Angle::ZERO, 10.0),
        ];
        assert_eq!(PhysicsSystem::intercept_missiles(&mut missiles, &config), 0);
    }

    #[test]
    fn closest_approach_finds_crossing_paths() {
        // Crossing at the midpoint of the tick
        let gap = PhysicsSystem::closest_approach(
            Vector2::new(-2.0, 0.0),
            Vector2::new(2.0, 0.0),
            Vector2::new(0.0, -2.0),
            Vector2::new(0.0, 2.0),
        );
        assert!(gap < 1e-9);
    }
}
