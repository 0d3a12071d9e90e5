//! Logistic Elo rating

use serde::{Deserialize, Serialize};

/// Result of a match from the first player's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Standing {
    Win,
    Loss,
    Draw,
}

impl Standing {
    pub fn score(self) -> f64 {
        match self {
            Standing::Win => 1.0,
            Standing::Loss => 0.0,
            Standing::Draw => 0.5,
        }
    }

    pub fn reversed(self) -> Standing {
        match self {
            Standing::Win => Standing::Loss,
            Standing::Loss => Standing::Win,
            Standing::Draw => Standing::Draw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EloRating {
    pub k_factor: f64,
    /// Rating assigned to tanks never seen before
    pub initial: f64,
}

impl Default for EloRating {
    fn default() -> Self {
        Self {
            k_factor: 32.0,
            initial: 1500.0,
        }
    }
}

impl EloRating {
    pub fn new(k_factor: f64, initial: f64) -> Self {
        Self { k_factor, initial }
    }

    /// Probability that a player rated `rating` beats one rated `opponent`
    pub fn expected(rating: f64, opponent: f64) -> f64 {
        1.0 / (1.0 + 10f64.powf((opponent - rating) / 400.0))
    }

    /// New ratings for both players after one match
    pub fn update(&self, rating_a: f64, rating_b: f64, standing_a: Standing) -> (f64, f64) {
        let expected_a = Self::expected(rating_a, rating_b);
        let expected_b = Self::expected(rating_b, rating_a);
        let score_a = standing_a.score();
        let score_b = standing_a.reversed().score();
        (
            rating_a + self.k_factor * (score_a - expected_a),
            rating_b + self.k_factor * (score_b - expected_b),
        )
    }
}
