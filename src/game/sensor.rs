//! Radar model - builds each tank's perception before strategies run

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;

use super::combat::Missile;
use super::geometry::{Angle, Vector2};
use super::powerup::{PowerUp, PowerUpKind};
use super::tank::Tank;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedTank {
    pub index: usize,
    pub name: String,
    pub distance: f64,
    /// Absolute bearing from the observer
    pub angle_to: Angle,
    /// Bearing relative to the observer's body
    pub relative_angle: Angle,
    pub position: Vector2,
    pub body_aim: Angle,
    pub gun_aim: Angle,
    pub actual_speed: f64,
    pub energy: f64,
    pub gun_heat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedMissile {
    pub id: u64,
    pub owner: usize,
    pub distance: f64,
    pub angle_to: Angle,
    pub heading: Angle,
    pub energy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPowerUp {
    pub id: u64,
    pub kind: PowerUpKind,
    pub distance: f64,
    pub angle_to: Angle,
    pub amount: f64,
    pub duration: u32,
}

/// What one tank's radar sees this tick, nearest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Perception {
    pub tanks: Vec<DetectedTank>,
    pub missiles: Vec<DetectedMissile>,
    pub power_ups: Vec<DetectedPowerUp>,
}

/// Radar cone of one observer
#[derive(Debug, Clone, Copy)]
pub struct RadarCone {
    pub origin: Vector2,
    pub heading: Angle,
    pub half_arc: f64,
    pub range: f64,
}

impl RadarCone {
    pub fn of(tank: &Tank, config: &EngineConfig) -> Self {
        Self {
            origin: tank.position,
            heading: tank.radar_heading(config.radar_policy),
            half_arc: tank.radar_arc.clamp(0.1, 1.0) * config.radar_half_arc_deg.to_radians(),
            range: config.radar_range,
        }
    }

    /// Distance and bearing to `point` if it lies inside the cone
    pub fn detect(&self, point: Vector2) -> Option<(f64, Angle)> {
        let distance = self.origin.distance_to(point);
        if distance > self.range {
            return None;
        }
        let bearing = self.origin.angle_to(point);
        (self.heading.difference(bearing).abs() <= self.half_arc).then_some((distance, bearing))
    }
}

pub struct SensorSystem;

impl SensorSystem {
    /// Perception for the tank at `observer` within `tanks`
    pub fn scan(
        observer: usize,
        tanks: &[Tank],
        missiles: &[Missile],
        power_ups: &[PowerUp],
        config: &EngineConfig,
    ) -> Perception {
        let me = &tanks[observer];
        let cone = RadarCone::of(me, config);

        let mut detected_tanks: Vec<DetectedTank> = tanks
            .iter()
            .enumerate()
            .filter(|(i, other)| *i != observer && other.index != me.index && other.is_alive())
            .filter_map(|(_, other)| {
                cone.detect(other.position).map(|(distance, bearing)| DetectedTank {
                    index: other.index,
                    name: other.name.clone(),
                    distance,
                    angle_to: bearing,
                    relative_angle: me.body_aim.difference(bearing),
                    position: other.position,
                    body_aim: other.body_aim,
                    gun_aim: other.gun_aim,
                    actual_speed: other.actual_speed,
                    energy: other.energy,
                    gun_heat: other.gun_heat,
                })
            })
            .collect();

        let mut detected_missiles: Vec<DetectedMissile> = missiles
            .iter()
            .filter(|m| m.alive)
            .filter_map(|m| {
                cone.detect(m.position).map(|(distance, bearing)| DetectedMissile {
                    id: m.id,
                    owner: m.owner,
                    distance,
                    angle_to: bearing,
                    heading: m.heading,
                    energy: m.energy,
                })
            })
            .collect();

        let mut detected_power_ups: Vec<DetectedPowerUp> = power_ups
            .iter()
            .filter(|p| p.alive)
            .filter_map(|p| {
                cone.detect(p.position).map(|(distance, bearing)| DetectedPowerUp {
                    id: p.id,
                    kind: p.kind,
                    distance,
                    angle_to: bearing,
                    amount: p.amount,
                    duration: p.duration,
                })
            })
            .collect();

        // sort_by is stable, equal distances keep list order
        detected_tanks.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        detected_missiles.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        detected_power_ups.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        Perception {
            tanks: detected_tanks,
            missiles: detected_missiles,
            power_ups: detected_power_ups,
        }
    }

    /// Recompute perception for every live tank
    pub fn refresh(
        tanks: &mut [Tank],
        missiles: &[Missile],
        power_ups: &[PowerUp],
        config: &EngineConfig,
    ) {
        let perceptions: Vec<Perception> = (0..tanks.len())
            .map(|i| Self::scan(i, tanks, missiles, power_ups, config))
            .collect();
        for (tank, perception) in tanks.iter_mut().zip(perceptions) {
            tank.perception = perception;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RadarPolicy;
    use proptest::prelude::*;
    use std::f64::consts::PI;

    fn pair(config: &EngineConfig, a: Vector2, b: Vector2) -> Vec<Tank> {
        vec![
            Tank::new(0, "alpha", a, Angle::ZERO, config),
            Tank::new(1, "bravo", b, Angle::ZERO, config),
        ]
    }

    #[test]
    fn sees_target_ahead_but_not_behind() {
        let config = EngineConfig::default();
        let tanks = pair(&config, Vector2::new(-100.0, 0.0), Vector2::new(100.0, 0.0));

        let ahead = SensorSystem::scan(0, &tanks, &[], &[], &config);
        assert_eq!(ahead.tanks.len(), 1);
        assert_eq!(ahead.tanks[0].index, 1);
        assert!((ahead.tanks[0].distance - 200.0).abs() < 1e-9);

        // Bravo faces +x, alpha is directly behind it
        let behind = SensorSystem::scan(1, &tanks, &[], &[], &config);
        assert!(behind.tanks.is_empty());
    }

    #[test]
    fn narrowed_arc_drops_off_axis_targets() {
        let config = EngineConfig::default();
        let mut tanks = pair(&config, Vector2::ORIGIN, Vector2::new(100.0, 100.0));
        assert_eq!(SensorSystem::scan(0, &tanks, &[], &[], &config).tanks.len(), 1);

        tanks[0].radar_arc = 0.1;
        assert!(SensorSystem::scan(0, &tanks, &[], &[], &config).tanks.is_empty());
    }

    #[test]
    fn independent_radar_follows_its_own_aim() {
        let config = EngineConfig {
            radar_policy: RadarPolicy::Independent,
            ..Default::default()
        };
        let mut tanks = pair(&config, Vector2::ORIGIN, Vector2::new(-200.0, 0.0));
        tanks[0].radar_arc = 0.5;
        assert!(SensorSystem::scan(0, &tanks, &[], &[], &config).tanks.is_empty());

        tanks[0].radar_aim = Angle::from_radians(PI);
        assert_eq!(SensorSystem::scan(0, &tanks, &[], &[], &config).tanks.len(), 1);
    }

    #[test]
    fn lists_are_sorted_by_distance() {
        let config = EngineConfig::default();
        let tanks = pair(&config, Vector2::ORIGIN, Vector2::new(300.0, 0.0));
        let missiles = vec![
            Missile::new(1, 1, Vector2::new(200.0, 10.0), Angle::ZERO, 5.0),
            Missile::new(2, 1, Vector2::new(50.0, 0.0), Angle::ZERO, 5.0),
            Missile::new(3, 1, Vector2::new(120.0, -5.0), Angle::ZERO, 5.0),
        ];
        let perception = SensorSystem::scan(0, &tanks, &missiles, &[], &config);
        let ids: Vec<u64> = perception.missiles.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    proptest! {
        #[test]
        fn detections_stay_inside_the_cone(
            ox in -350.0f64..350.0,
            oy in -250.0f64..250.0,
            tx in -350.0f64..350.0,
            ty in -250.0f64..250.0,
            body in -PI..PI,
            gun in -PI..PI,
            arc in 0.1f64..1.0,
            range in 50.0f64..1000.0,
            missile_spots in prop::collection::vec((-400.0f64..400.0, -300.0f64..300.0), 0..8),
            power_up_spots in prop::collection::vec((-400.0f64..400.0, -300.0f64..300.0), 0..8),
        ) {
            let config = EngineConfig {
                radar_range: range,
                ..Default::default()
            };
            let mut tanks = pair(&config, Vector2::new(ox, oy), Vector2::new(tx, ty));
            tanks[0].body_aim = Angle::from_radians(body);
            tanks[0].gun_aim = Angle::from_radians(gun);
            tanks[0].radar_arc = arc;

            let missiles: Vec<Missile> = missile_spots
                .iter()
                .enumerate()
                .map(|(i, &(x, y))| Missile::new(i as u64, 1, Vector2::new(x, y), Angle::ZERO, 5.0))
                .collect();
            let power_ups: Vec<PowerUp> = power_up_spots
                .iter()
                .enumerate()
                .map(|(i, &(x, y))| PowerUp {
                    id: 100 + i as u64,
                    kind: PowerUpKind::Energy,
                    amount: 50.0,
                    duration: 300,
                    position: Vector2::new(x, y),
                    alive: true,
                })
                .collect();

            let perception = SensorSystem::scan(0, &tanks, &missiles, &power_ups, &config);
            let cone = RadarCone::of(&tanks[0], &config);
            prop_assert!((cone.half_arc - arc * config.radar_half_arc_deg.to_radians()).abs() < 1e-12);

            let inside = |distance: f64, angle_to: Angle| {
                distance <= cone.range && cone.heading.difference(angle_to).abs() <= cone.half_arc + 1e-12
            };
            for seen in &perception.tanks {
                prop_assert_ne!(seen.index, 0);
                prop_assert!(inside(seen.distance, seen.angle_to));
            }
            for seen in &perception.missiles {
                prop_assert!(inside(seen.distance, seen.angle_to));
            }
            for seen in &perception.power_ups {
                prop_assert!(inside(seen.distance, seen.angle_to));
            }

            // Nothing inside the cone is left out
            let expected_missiles = missiles.iter().filter(|m| cone.detect(m.position).is_some()).count();
            let expected_power_ups = power_ups.iter().filter(|p| cone.detect(p.position).is_some()).count();
            prop_assert_eq!(perception.missiles.len(), expected_missiles);
            prop_assert_eq!(perception.power_ups.len(), expected_power_ups);
        }
    }
}
