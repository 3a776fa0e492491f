//! Tiered adaptive question selection.
//!
//! Every question id falls into exactly one [`Tier`] based on its history.
//! A quiz is then drawn in blocks: up to 60% from the difficult tier, up to
//! 35% from the normal tier, the rest from mastered questions, and finally a
//! fallback draw from whatever is left. The returned order is the block
//! order (difficult, normal, mastered, fallback); only the order *within*
//! a block is random.

use std::collections::HashSet;
use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::statistics::{PerformanceRecord, StatsTable};

/// Difficulty tier derived from a question's performance history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Difficult,
    Normal,
    Mastered,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Difficult => write!(f, "difficult"),
            Tier::Normal => write!(f, "normal"),
            Tier::Mastered => write!(f, "mastered"),
        }
    }
}

/// Classify a question by its record. No history means [`Tier::Normal`].
pub fn classify(record: Option<&PerformanceRecord>) -> Tier {
    let Some(record) = record.filter(|r| r.total_attempts > 0) else {
        return Tier::Normal;
    };

    let mastered = record.total_attempts >= 3
        && record.success_rate >= 0.8
        && record.last_n_all(3, true);
    if mastered {
        return Tier::Mastered;
    }

    if record.success_rate < 0.5 || record.last_n_all(2, false) {
        Tier::Difficult
    } else {
        Tier::Normal
    }
}

/// The universe split into tiers, each preserving universe order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierPartition {
    pub difficult: Vec<String>,
    pub normal: Vec<String>,
    pub mastered: Vec<String>,
}

impl TierPartition {
    pub fn len(&self) -> usize {
        self.difficult.len() + self.normal.len() + self.mastered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Which tier `id` was placed in, if it is part of the universe.
    pub fn tier_of(&self, id: &str) -> Option<Tier> {
        if self.difficult.iter().any(|d| d == id) {
            Some(Tier::Difficult)
        } else if self.normal.iter().any(|n| n == id) {
            Some(Tier::Normal)
        } else if self.mastered.iter().any(|m| m == id) {
            Some(Tier::Mastered)
        } else {
            None
        }
    }
}

/// Classify every id of `universe` against one statistics snapshot.
pub fn partition(universe: &[String], snapshot: &StatsTable) -> TierPartition {
    let mut tiers = TierPartition::default();
    for id in universe {
        match classify(snapshot.get(id)) {
            Tier::Difficult => tiers.difficult.push(id.clone()),
            Tier::Normal => tiers.normal.push(id.clone()),
            Tier::Mastered => tiers.mastered.push(id.clone()),
        }
    }
    tiers
}

/// Draw `min(n, |universe|)` distinct ids, biased toward weak questions.
///
/// Duplicate ids in `universe` are collapsed before drawing.
pub fn select_questions<R: Rng + ?Sized>(
    universe: &[String],
    snapshot: &StatsTable,
    n: usize,
    rng: &mut R,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let universe: Vec<String> = universe
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect();

    let n = n.min(universe.len());
    if n == 0 {
        return Vec::new();
    }

    let tiers = partition(&universe, snapshot);
    tracing::debug!(
        difficult = tiers.difficult.len(),
        normal = tiers.normal.len(),
        mastered = tiers.mastered.len(),
        "partitioned {} questions for a draw of {n}",
        universe.len()
    );

    let mut selected: Vec<String> = Vec::with_capacity(n);

    let difficult_count = tiers.difficult.len().min(n * 3 / 5);
    draw(&tiers.difficult, difficult_count, &mut selected, rng);

    let normal_count = tiers
        .normal
        .len()
        .min(n * 7 / 20)
        .min(n - selected.len());
    draw(&tiers.normal, normal_count, &mut selected, rng);

    let mastered_count = tiers.mastered.len().min(n - selected.len());
    draw(&tiers.mastered, mastered_count, &mut selected, rng);

    if selected.len() < n {
        let taken: HashSet<&str> = selected.iter().map(String::as_str).collect();
        let leftovers: Vec<String> = tiers
            .difficult
            .iter()
            .chain(&tiers.normal)
            .chain(&tiers.mastered)
            .filter(|id| !taken.contains(id.as_str()))
            .cloned()
            .collect();
        let remaining = n - selected.len();
        draw(&leftovers, remaining, &mut selected, rng);
    }

    selected
}

/// Append a uniform sample of `count` ids from `pool` (without replacement).
fn draw<R: Rng + ?Sized>(pool: &[String], count: usize, out: &mut Vec<String>, rng: &mut R) {
    out.extend(pool.choose_multiple(rng, count).cloned());
}
