//! Cumulative per-session statistics and the comparison table built from them

use serde::{Deserialize, Serialize};

use crate::game::r#match::{MatchOutcome, MatchResult};

/// Running totals for one combatant slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombatantTotals {
    pub name: String,
    pub wins: u32,
    /// Match score plus any winner bonuses
    pub score: f64,
    /// Sum of end-of-match energy
    pub energy: f64,
    pub missiles_fired: u32,
    pub missiles_hit: u32,
    pub tank_collisions: u32,
    pub missile_collisions: u32,
    pub wall_collisions: u32,
    pub powerups_collected: u32,
}

/// One line of the comparison table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatRow {
    pub label: String,
    pub values: [f64; 2],
    pub difference: f64,
}

impl StatRow {
    fn new(label: &str, a: f64, b: f64) -> Self {
        Self {
            label: label.to_string(),
            values: [a, b],
            difference: truncate2((a - b).abs()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Indexed by combatant index
    pub combatants: [CombatantTotals; 2],
    pub draws: u32,
    pub matches: u32,
    pub total_iterations: u64,
    pub powerups_spawned: u32,
}

impl SessionStats {
    pub fn new(names: [&str; 2]) -> Self {
        let mut stats = Self::default();
        stats.combatants[0].name = names[0].to_string();
        stats.combatants[1].name = names[1].to_string();
        stats
    }

    /// Fold one finished match into the totals
    pub fn record(&mut self, outcome: &MatchOutcome) {
        self.matches += 1;
        self.total_iterations += outcome.iterations;
        self.powerups_spawned += outcome.powerups_spawned;

        let winner = match &outcome.result {
            MatchResult::Winner { index, .. } => Some(*index),
            MatchResult::Draw => {
                self.draws += 1;
                None
            }
        };

        for report in &outcome.tanks {
            let Some(totals) = self.combatants.get_mut(report.index) else {
                continue;
            };
            totals.score += report.match_score;
            if winner == Some(report.index) {
                totals.wins += 1;
                if let Some(bonuses) = &outcome.bonuses {
                    totals.score += (bonuses.survival + bonuses.accuracy) as f64;
                }
            }
            totals.energy += report.energy;
            totals.missiles_fired += report.counters.missiles_fired;
            totals.missiles_hit += report.counters.missiles_hit;
            totals.tank_collisions += report.counters.tank_collisions;
            totals.missile_collisions += report.counters.missile_collisions;
            totals.wall_collisions += report.counters.wall_collisions;
            totals.powerups_collected += report.counters.powerups_collected;
        }
    }

    /// Comparison table; `ratings` are the combatants' current ratings
    pub fn rows(&self, ratings: [f64; 2]) -> Vec<StatRow> {
        let [a, b] = &self.combatants;
        let matches = self.matches as f64;
        let total_score = a.score + b.score;

        let win_pct = |t: &CombatantTotals| percentage(t.wins as f64, matches);
        let score_pct = |t: &CombatantTotals| percentage(t.score, total_score);
        let avg_energy = |t: &CombatantTotals| {
            if self.matches == 0 {
                0.0
            } else {
                (t.energy / matches).trunc()
            }
        };
        let accuracy = |t: &CombatantTotals| percentage(t.missiles_hit as f64, t.missiles_fired as f64);
        let collected_pct =
            |t: &CombatantTotals| percentage(t.powerups_collected as f64, self.powerups_spawned as f64);

        vec![
            StatRow::new("Wins", a.wins as f64, b.wins as f64),
            StatRow::new("Win %", win_pct(a), win_pct(b)),
            StatRow::new("Rating", ratings[0].round(), ratings[1].round()),
            StatRow::new("Score", a.score.trunc(), b.score.trunc()),
            StatRow::new("Score %", score_pct(a), score_pct(b)),
            StatRow::new("Avg Energy", avg_energy(a), avg_energy(b)),
            StatRow::new("Accuracy %", accuracy(a), accuracy(b)),
            StatRow::new(
                "Powerups Collected",
                a.powerups_collected as f64,
                b.powerups_collected as f64,
            ),
            StatRow::new("Powerups Collected %", collected_pct(a), collected_pct(b)),
            StatRow::new("Tank Collisions", a.tank_collisions as f64, b.tank_collisions as f64),
            StatRow::new(
                "Missile Collisions",
                a.missile_collisions as f64,
                b.missile_collisions as f64,
            ),
            StatRow::new("Wall Collisions", a.wall_collisions as f64, b.wall_collisions as f64),
        ]
    }
}

/// Truncate (not round) to two decimals
pub fn truncate2(value: f64) -> f64 {
    (value * 100.0).trunc() / 100.0
}

fn percentage(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        0.0
    } else {
        truncate2(part / whole * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::r#match::{Bonuses, EndReason, TankReport};
    use crate::game::tank::TankCounters;
    use uuid::Uuid;

    fn report(index: usize, name: &str, energy: f64, fired: u32, hit: u32) -> TankReport {
        TankReport {
            index,
            name: name.to_string(),
            energy,
            accuracy: if fired == 0 { 0.0 } else { hit as f64 / fired as f64 },
            counters: TankCounters {
                missiles_fired: fired,
                missiles_hit: hit,
                ..Default::default()
            },
            match_score: hit as f64 * 10.0,
            survived: energy > 0.0,
        }
    }

    fn outcome(result: MatchResult, bonuses: Option<Bonuses>, tanks: Vec<TankReport>) -> MatchOutcome {
        MatchOutcome {
            match_id: Uuid::nil(),
            match_number: 1,
            result,
            reason: EndReason::IterationCap,
            iterations: 100,
            powerups_spawned: 3,
            tanks,
            bonuses,
        }
    }

    #[test]
    fn truncates_rather_than_rounds() {
        assert_eq!(truncate2(66.6666), 66.66);
        assert_eq!(truncate2(33.339), 33.33);
        assert_eq!(percentage(1.0, 0.0), 0.0);
    }

    #[test]
    fn winner_gets_bonus_score() {
        let mut stats = SessionStats::new(["a", "b"]);
        stats.record(&outcome(
            MatchResult::Winner {
                index: 0,
                name: "a".to_string(),
            },
            Some(Bonuses {
                survival: 400,
                accuracy: 250,
            }),
            vec![report(0, "a", 800.0, 4, 2), report(1, "b", 0.0, 3, 0)],
        ));
        stats.record(&outcome(
            MatchResult::Draw,
            None,
            vec![report(0, "a", 500.0, 2, 0), report(1, "b", 500.0, 1, 1)],
        ));

        assert_eq!(stats.matches, 2);
        assert_eq!(stats.draws, 1);
        assert_eq!(stats.combatants[0].wins, 1);
        assert_eq!(stats.combatants[0].score, 20.0 + 650.0);
        assert_eq!(stats.combatants[1].score, 10.0);
        assert_eq!(stats.powerups_spawned, 6);
        assert_eq!(stats.total_iterations, 200);

        let rows = stats.rows([1516.0, 1484.0]);
        let row = |label: &str| rows.iter().find(|r| r.label == label).unwrap().clone();
        assert_eq!(row("Win %").values, [50.0, 0.0]);
        assert_eq!(row("Rating").difference, 32.0);
        assert_eq!(row("Avg Energy").values, [650.0, 250.0]);
        assert_eq!(row("Accuracy %").values, [33.33, 25.0]);
        assert_eq!(row("Score %").values, [98.52, 1.47]);
    }
}
