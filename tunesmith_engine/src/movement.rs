// Melodic movement catalog and weighted selection.
//
// A movement describes how the next melodic pitch relates to the current
// one. Structural moves (chord tone, steps, neighbors, leaps, enclosures,
// escape tones, resolutions) drive the melodic walk in melody.rs; ornament
// moves (trill, turn, mordents, grace notes) decorate an already chosen host
// note.
//
// Selection uses `WeightedTable`: a cumulative weight vector built once per
// distinct weight set, sampled with a single uniform draw and a binary
// search. Contour shaping (melody.rs) produces a handful of distinct weight
// sets per passage and caches one table for each.

use serde::{Deserialize, Serialize};
use tunesmith_prng::ComposerRng;

/// The kinds of melodic move the walk can make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementKind {
    ChordTone,
    StepUp,
    StepDown,
    NeighborUp,
    NeighborDown,
    Leap,
    Enclosure,
    EscapeTone,
    Resolution,
    Trill,
    Turn,
    MordentUp,
    MordentDown,
    GraceUp,
    GraceDown,
}

impl MovementKind {
    pub fn is_ornament(self) -> bool {
        matches!(
            self,
            MovementKind::Trill
                | MovementKind::Turn
                | MovementKind::MordentUp
                | MovementKind::MordentDown
                | MovementKind::GraceUp
                | MovementKind::GraceDown
        )
    }

    /// Nominal direction of the move: +1 up, -1 down, 0 for moves whose
    /// direction is decided when the move is applied.
    pub fn direction(self) -> i32 {
        match self {
            MovementKind::StepUp
            | MovementKind::NeighborUp
            | MovementKind::MordentUp
            | MovementKind::GraceUp => 1,
            MovementKind::StepDown
            | MovementKind::NeighborDown
            | MovementKind::MordentDown
            | MovementKind::GraceDown => -1,
            _ => 0,
        }
    }
}

/// A weighted melodic move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub kind: MovementKind,
    /// Relative selection weight.
    pub weight: f64,
    /// Nominal interval in semitones. Scale quantization may override it.
    pub semitone_hint: i32,
}

impl Movement {
    const fn new(kind: MovementKind, weight: f64, semitone_hint: i32) -> Self {
        Movement {
            kind,
            weight,
            semitone_hint,
        }
    }
}

/// Default structural moves. Stepwise motion dominates, leaps are rare.
pub const STRUCTURAL_MOVES: [Movement; 9] = [
    Movement::new(MovementKind::ChordTone, 18.0, 0),
    Movement::new(MovementKind::StepUp, 22.0, 2),
    Movement::new(MovementKind::StepDown, 22.0, -2),
    Movement::new(MovementKind::NeighborUp, 7.0, 2),
    Movement::new(MovementKind::NeighborDown, 7.0, -2),
    Movement::new(MovementKind::Leap, 8.0, 5),
    Movement::new(MovementKind::Enclosure, 4.0, 1),
    Movement::new(MovementKind::EscapeTone, 4.0, 2),
    Movement::new(MovementKind::Resolution, 8.0, -1),
];

/// Default ornament moves, drawn only once an ornament has been triggered.
pub const ORNAMENT_MOVES: [Movement; 6] = [
    Movement::new(MovementKind::Trill, 2.0, 2),
    Movement::new(MovementKind::Turn, 2.0, 2),
    Movement::new(MovementKind::MordentUp, 3.0, 2),
    Movement::new(MovementKind::MordentDown, 3.0, -2),
    Movement::new(MovementKind::GraceUp, 4.0, 1),
    Movement::new(MovementKind::GraceDown, 4.0, -1),
];

/// Cumulative-weight lookup table for repeated weighted draws.
#[derive(Debug, Clone)]
pub struct WeightedTable<T> {
    items: Vec<T>,
    cumulative: Vec<f64>,
}

impl<T> WeightedTable<T> {
    /// Build from `(item, weight)` pairs. Non-positive and non-finite
    /// weights contribute nothing and are never selected.
    pub fn new(entries: impl IntoIterator<Item = (T, f64)>) -> Self {
        let mut items = Vec::new();
        let mut cumulative = Vec::new();
        let mut total = 0.0;
        for (item, weight) in entries {
            if weight.is_finite() && weight > 0.0 {
                total += weight;
                items.push(item);
                cumulative.push(total);
            }
        }
        WeightedTable { items, cumulative }
    }

    pub fn total_weight(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Pick an item with probability proportional to its weight.
    ///
    /// Consumes exactly one draw when the table is non-empty, none otherwise.
    pub fn sample(&self, rng: &mut ComposerRng) -> Option<&T> {
        if self.items.is_empty() {
            return None;
        }
        let target = rng.next_f64() * self.total_weight();
        let idx = self.cumulative.partition_point(|&c| c <= target);
        self.items.get(idx.min(self.items.len() - 1))
    }
}

impl WeightedTable<Movement> {
    /// Table over a movement set, optionally reweighted.
    pub fn from_movements(moves: &[Movement], reweight: impl Fn(&Movement) -> f64) -> Self {
        WeightedTable::new(moves.iter().map(|m| (*m, m.weight * reweight(m))))
    }
}
