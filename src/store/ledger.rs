//! Persistent head-to-head leaderboard with ratings

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::game::r#match::{MatchOutcome, MatchResult};
use crate::stats::rating::{EloRating, Standing};

use super::kv::{self, KeyValueStore};

/// Storage key of the serialised ledger
pub const LEDGER_KEY: &str = "tank_arena_leaderboard";

/// Record of one tank against one opponent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadToHead {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub matches: u32,
    /// Percentage of matches won
    pub win_rate: f64,
}

impl HeadToHead {
    fn apply(&mut self, standing: Standing) {
        match standing {
            Standing::Win => self.wins += 1,
            Standing::Loss => self.losses += 1,
            Standing::Draw => self.draws += 1,
        }
        self.matches += 1;
        self.win_rate = self.wins as f64 / self.matches as f64 * 100.0;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankRecord {
    pub opponents: BTreeMap<String, HeadToHead>,
    pub rating: f64,
    pub total_matches: u32,
    pub total_wins: u32,
    pub total_losses: u32,
    /// Mean of the per-opponent win rates
    pub average_win_rate: f64,
}

impl TankRecord {
    fn new(rating: f64) -> Self {
        Self {
            opponents: BTreeMap::new(),
            rating,
            total_matches: 0,
            total_wins: 0,
            total_losses: 0,
            average_win_rate: 0.0,
        }
    }

    fn recompute_totals(&mut self) {
        self.total_matches = self.opponents.values().map(|h| h.matches).sum();
        self.total_wins = self.opponents.values().map(|h| h.wins).sum();
        self.total_losses = self.opponents.values().map(|h| h.losses).sum();
        self.average_win_rate = if self.opponents.is_empty() {
            0.0
        } else {
            self.opponents.values().map(|h| h.win_rate).sum::<f64>() / self.opponents.len() as f64
        };
    }
}

/// Rating changes applied by one recorded match
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingDelta {
    pub first: f64,
    pub second: f64,
}

/// Head-to-head ledger keyed by tank name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    tanks: BTreeMap<String, TankRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&TankRecord> {
        self.tanks.get(name)
    }

    pub fn tanks(&self) -> &BTreeMap<String, TankRecord> {
        &self.tanks
    }

    pub fn is_empty(&self) -> bool {
        self.tanks.is_empty()
    }

    /// Current rating, or the initial rating for unseen tanks
    pub fn rating(&self, name: &str, elo: &EloRating) -> f64 {
        self.tanks.get(name).map_or(elo.initial, |r| r.rating)
    }

    /// Record one match between `a` and `b`
    ///
    /// Returns the rating change of `a` and `b` (in argument order), or `None`
    /// for self-play, which is not recorded.
    pub fn record(
        &mut self,
        a: &str,
        b: &str,
        winner: Option<&str>,
        elo: &EloRating,
    ) -> Option<RatingDelta> {
        if a == b {
            return None;
        }
        // Canonical pair order keeps one increment per match
        let swapped = b < a;
        let (first, second) = if swapped { (b, a) } else { (a, b) };
        let standing = match winner {
            Some(w) if w == first => Standing::Win,
            Some(w) if w == second => Standing::Loss,
            _ => Standing::Draw,
        };

        let rating_first = self.rating(first, elo);
        let rating_second = self.rating(second, elo);
        let (new_first, new_second) = elo.update(rating_first, rating_second, standing);

        let record = self
            .tanks
            .entry(first.to_string())
            .or_insert_with(|| TankRecord::new(elo.initial));
        record
            .opponents
            .entry(second.to_string())
            .or_default()
            .apply(standing);
        record.rating = new_first;
        record.recompute_totals();

        let mirror = self
            .tanks
            .entry(second.to_string())
            .or_insert_with(|| TankRecord::new(elo.initial));
        mirror
            .opponents
            .entry(first.to_string())
            .or_default()
            .apply(standing.reversed());
        mirror.rating = new_second;
        mirror.recompute_totals();

        let delta_first = new_first - rating_first;
        let delta_second = new_second - rating_second;
        Some(if swapped {
            RatingDelta {
                first: delta_second,
                second: delta_first,
            }
        } else {
            RatingDelta {
                first: delta_first,
                second: delta_second,
            }
        })
    }

    /// Record a finished match from its outcome
    pub fn record_outcome(&mut self, outcome: &MatchOutcome, elo: &EloRating) -> Option<RatingDelta> {
        let [a, b] = outcome.tanks.as_slice() else {
            warn!(match_number = outcome.match_number, "Outcome without two tanks, skipping");
            return None;
        };
        let winner = match &outcome.result {
            MatchResult::Winner { name, .. } => Some(name.as_str()),
            MatchResult::Draw => None,
        };
        self.record(&a.name, &b.name, winner, elo)
    }

    /// Rebuild a ledger from the full match history
    pub fn replay<'a>(history: impl IntoIterator<Item = &'a MatchOutcome>, elo: &EloRating) -> Self {
        let mut ledger = Self::new();
        for outcome in history {
            ledger.record_outcome(outcome, elo);
        }
        ledger
    }

    /// Load from the store; missing or corrupt values give an empty ledger
    pub fn load(store: &dyn KeyValueStore) -> Self {
        match kv::load::<Ledger>(store, LEDGER_KEY) {
            Ok(Some(ledger)) => {
                info!(tanks = ledger.tanks.len(), "Loaded leaderboard");
                ledger
            }
            Ok(None) => Self::new(),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable leaderboard");
                Self::new()
            }
        }
    }

    /// Persist to the store; failures are logged and otherwise ignored
    pub fn save(&self, store: &dyn KeyValueStore) {
        if let Err(e) = kv::save(store, LEDGER_KEY, self) {
            warn!(error = %e, "Failed to persist leaderboard");
        }
    }

    /// Clear every record and persist the empty ledger
    pub fn reset(&mut self, store: &dyn KeyValueStore) {
        self.tanks.clear();
        self.save(store);
        info!("Leaderboard reset");
    }
}
