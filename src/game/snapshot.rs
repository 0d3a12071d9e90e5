//! Snapshot building for renderers

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::ws::protocol::ServerMsg;

use super::geometry::Angle;
use super::powerup::{ActivePowerUp, PowerUpKind};
use super::r#match::Match;
use super::tank::{CollisionFeedbackSet, Tank, TankCounters};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankSnapshot {
    pub index: usize,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub body_aim: Angle,
    /// Absolute heading of the gun
    pub gun_heading: Angle,
    /// Centre of the radar cone
    pub radar_heading: Angle,
    /// Radar half-arc in radians after the arc multiplier
    pub radar_half_arc: f64,
    pub actual_speed: f64,
    pub energy: f64,
    pub gun_heat: f64,
    pub accuracy: f64,
    pub match_score: f64,
    pub counters: TankCounters,
    pub power_up: Option<ActivePowerUp>,
    pub feedback: CollisionFeedbackSet,
    pub alive: bool,
}

impl TankSnapshot {
    fn of(tank: &Tank, config: &EngineConfig) -> Self {
        Self {
            index: tank.index,
            name: tank.name.clone(),
            x: tank.position.x,
            y: tank.position.y,
            body_aim: tank.body_aim,
            gun_heading: tank.gun_heading(),
            radar_heading: tank.radar_heading(config.radar_policy),
            radar_half_arc: tank.radar_arc * config.radar_half_arc_deg.to_radians(),
            actual_speed: tank.actual_speed,
            energy: tank.energy,
            gun_heat: tank.gun_heat,
            accuracy: tank.accuracy,
            match_score: tank.match_score,
            counters: tank.counters,
            power_up: tank.power_up,
            feedback: tank.feedback,
            alive: tank.is_alive(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissileSnapshot {
    pub id: u64,
    pub owner: usize,
    pub x: f64,
    pub y: f64,
    pub heading: Angle,
    pub energy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerUpSnapshot {
    pub id: u64,
    pub kind: PowerUpKind,
    pub symbol: String,
    pub x: f64,
    pub y: f64,
    pub amount: f64,
    pub duration: u32,
}

/// Everything a renderer needs to draw one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaSnapshot {
    pub match_id: Uuid,
    pub match_number: u64,
    pub iteration: u64,
    pub width: f64,
    pub height: f64,
    /// Live tanks first, then fallen ones
    pub tanks: Vec<TankSnapshot>,
    pub missiles: Vec<MissileSnapshot>,
    pub power_ups: Vec<PowerUpSnapshot>,
    pub power_ups_spawned: u32,
    pub over: bool,
}

impl ArenaSnapshot {
    pub fn capture(game: &Match, config: &EngineConfig) -> Self {
        let bounds = game.bounds();
        Self {
            match_id: game.id,
            match_number: game.number,
            iteration: game.iteration,
            width: bounds.width,
            height: bounds.height,
            tanks: game
                .tanks()
                .iter()
                .chain(game.fallen())
                .map(|t| TankSnapshot::of(t, config))
                .collect(),
            missiles: game
                .missiles()
                .iter()
                .map(|m| MissileSnapshot {
                    id: m.id,
                    owner: m.owner,
                    x: m.position.x,
                    y: m.position.y,
                    heading: m.heading,
                    energy: m.energy,
                })
                .collect(),
            power_ups: game
                .power_ups()
                .iter()
                .map(|p| PowerUpSnapshot {
                    id: p.id,
                    kind: p.kind,
                    symbol: p.kind.symbol().to_string(),
                    x: p.position.x,
                    y: p.position.y,
                    amount: p.amount,
                    duration: p.duration,
                })
                .collect(),
            power_ups_spawned: game.power_ups_spawned(),
            over: game.is_over(),
        }
    }
}

/// Decides which scheduler wake-ups publish a snapshot
pub struct SnapshotBuilder {
    wakes_since_snapshot: u32,
    /// Publish every n-th wake
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            wakes_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.wakes_since_snapshot += 1;
        if self.wakes_since_snapshot >= self.snapshot_interval {
            self.wakes_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (match start/end, control changes)
    pub fn force_next(&mut self) {
        self.wakes_since_snapshot = self.snapshot_interval;
    }

    pub fn build(&self, game: &Match, config: &EngineConfig) -> ServerMsg {
        ServerMsg::Snapshot(ArenaSnapshot::capture(game, config))
    }
}
