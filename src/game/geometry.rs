//! Geometry kernel - angles, vectors, arena bounds and trig backends
//!
//! The arena is origin-centred with +x to the right and +y downwards, so an
//! angle of π/2 points at the bottom wall.

use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::ops::{Add, Neg, Sub};
use std::sync::Arc;

use crate::config::TrigMode;

/// An angle normalised to (-π, π]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Angle(f64);

impl Angle {
    pub const ZERO: Angle = Angle(0.0);

    pub fn from_radians(radians: f64) -> Self {
        Self(normalize(radians))
    }

    pub fn from_degrees(degrees: f64) -> Self {
        Self::from_radians(degrees.to_radians())
    }

    pub fn radians(self) -> f64 {
        self.0
    }

    pub fn degrees(self) -> f64 {
        self.0.to_degrees()
    }

    pub fn div(self, scalar: f64) -> Self {
        Self::from_radians(self.0 / scalar)
    }

    /// Signed shortest rotation that takes `self` onto `other`
    pub fn difference(self, other: Angle) -> Angle {
        Self::from_radians(other.0 - self.0)
    }

    /// Clamp the raw radian value into the range spanned by `min` and `max`
    ///
    /// Bounds given in the wrong order are swapped. A NaN bound leaves the
    /// angle unchanged.
    pub fn clamp(self, min: f64, max: f64) -> Self {
        if min.is_nan() || max.is_nan() {
            return self;
        }
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        Self::from_radians(self.0.clamp(lo, hi))
    }

    pub fn opposite(self) -> Self {
        Self::from_radians(self.0 + PI)
    }

    pub fn abs(self) -> f64 {
        self.0.abs()
    }
}

impl Add for Angle {
    type Output = Angle;

    fn add(self, rhs: Angle) -> Angle {
        Angle::from_radians(self.0 + rhs.0)
    }
}

impl Sub for Angle {
    type Output = Angle;

    fn sub(self, rhs: Angle) -> Angle {
        Angle::from_radians(self.0 - rhs.0)
    }
}

impl Neg for Angle {
    type Output = Angle;

    fn neg(self) -> Angle {
        Angle::from_radians(-self.0)
    }
}

fn normalize(radians: f64) -> f64 {
    if !radians.is_finite() {
        return 0.0;
    }
    let wrapped = (radians + PI).rem_euclid(TAU) - PI;
    // rem_euclid lands on [-π, π); fold -π onto π
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Number of entries in the sine lookup table
pub const SINE_TABLE_SIZE: usize = 4096;

/// Precomputed sine samples over one full turn
#[derive(Debug)]
pub struct SineTable {
    samples: Vec<f64>,
}

impl SineTable {
    pub fn new() -> Self {
        let samples = (0..SINE_TABLE_SIZE)
            .map(|i| (i as f64 * TAU / SINE_TABLE_SIZE as f64).sin())
            .collect();
        Self { samples }
    }

    fn index(radians: f64) -> usize {
        let steps = (radians.rem_euclid(TAU) / TAU * SINE_TABLE_SIZE as f64).round() as usize;
        steps % SINE_TABLE_SIZE
    }

    pub fn sin(&self, radians: f64) -> f64 {
        self.samples[Self::index(radians)]
    }

    /// Cosine via a quarter-turn phase shift
    pub fn cos(&self, radians: f64) -> f64 {
        self.samples[(Self::index(radians) + SINE_TABLE_SIZE / 4) % SINE_TABLE_SIZE]
    }
}

impl Default for SineTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Trigonometry service handed to everything that converts angles to offsets
#[derive(Debug, Clone)]
pub enum Trig {
    Exact,
    Lookup(Arc<SineTable>),
}

impl Trig {
    pub fn for_mode(mode: TrigMode) -> Self {
        match mode {
            TrigMode::Exact => Trig::Exact,
            TrigMode::Lookup => Trig::Lookup(Arc::new(SineTable::new())),
        }
    }

    pub fn sin(&self, angle: Angle) -> f64 {
        match self {
            Trig::Exact => angle.radians().sin(),
            Trig::Lookup(table) => table.sin(angle.radians()),
        }
    }

    pub fn cos(&self, angle: Angle) -> f64 {
        match self {
            Trig::Exact => angle.radians().cos(),
            Trig::Lookup(table) => table.cos(angle.radians()),
        }
    }
}

impl Default for Trig {
    fn default() -> Self {
        Trig::Exact
    }
}

/// A point or offset in arena coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub const ORIGIN: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Point `distance` away from `self` along `angle`
    pub fn polar_offset(self, distance: f64, angle: Angle, trig: &Trig) -> Vector2 {
        Vector2 {
            x: self.x + trig.cos(angle) * distance,
            y: self.y + trig.sin(angle) * distance,
        }
    }

    pub fn distance_to(self, other: Vector2) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Bearing from `self` towards `other`
    pub fn angle_to(self, other: Vector2) -> Angle {
        Angle::from_radians((other.y - self.y).atan2(other.x - self.x))
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Origin-centred rectangle the tanks fight in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArenaBounds {
    pub width: f64,
    pub height: f64,
}

impl ArenaBounds {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    fn half_width(&self) -> f64 {
        self.width / 2.0
    }

    fn half_height(&self) -> f64 {
        self.height / 2.0
    }

    /// Strict containment inside the bounds shrunk by `margin` on every side
    pub fn contains(&self, point: Vector2, margin: f64) -> bool {
        point.x.abs() < self.half_width() - margin && point.y.abs() < self.half_height() - margin
    }

    /// Distances to the left, right, top and bottom walls, in that order
    fn wall_distances(&self, point: Vector2) -> [f64; 4] {
        [
            point.x + self.half_width(),
            self.half_width() - point.x,
            point.y + self.half_height(),
            self.half_height() - point.y,
        ]
    }

    pub fn distance_to_wall(&self, point: Vector2) -> f64 {
        self.wall_distances(point)
            .into_iter()
            .fold(f64::INFINITY, f64::min)
    }

    /// Outward direction of the closest wall; ties go left, right, top, bottom
    pub fn nearest_wall_angle(&self, point: Vector2) -> Angle {
        const WALL_ANGLES: [f64; 4] = [PI, 0.0, -FRAC_PI_2, FRAC_PI_2];

        let distances = self.wall_distances(point);
        let mut nearest = 0;
        for (i, distance) in distances.iter().enumerate().skip(1) {
            if *distance < distances[nearest] {
                nearest = i;
            }
        }
        Angle::from_radians(WALL_ANGLES[nearest])
    }

    /// Pull a point inside the bounds shrunk by `margin`
    pub fn clamp(&self, point: Vector2, margin: f64) -> Vector2 {
        let max_x = (self.half_width() - margin).max(0.0);
        let max_y = (self.half_height() - margin).max(0.0);
        Vector2 {
            x: point.x.clamp(-max_x, max_x),
            y: point.y.clamp(-max_y, max_y),
        }
    }

    pub fn diagonal(&self) -> f64 {
        self.width.hypot(self.height)
    }
}
