// Rhythm pattern database and polyrhythm warping.
//
// A rhythm pattern is a template of (start, length, rest, accent) steps
// spanning one or more bars of a specific meter. The database groups the
// catalog by meter family and precomputes one weighted table per family, so
// selecting a pattern is a single weighted draw.
//
// Meter fallback, in order: exact meter, same numerator, same denominator,
// whole catalog. A pattern borrowed from another meter is fitted to the
// requested bar by cyclic repetition and truncation. An empty catalog yields
// the straight-eighths template of the requested meter.
//
// Polyrhythm warping is a pure transform: `warp()` compresses a pattern's
// step timings by a rational ratio and tiles the result over the original
// length. `expand_over_passage()` lays a selected pattern over every bar of
// the passage, warping individual bars with the configured probability.
//
// Times are in beats of the pattern's own meter (one beat = one
// denominator unit).

use crate::movement::WeightedTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tunesmith_prng::ComposerRng;

/// One slot of a rhythm template.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RhythmStep {
    pub start_beats: f64,
    pub length_beats: f64,
    /// Rest steps advance the timeline without producing a note.
    pub rest: bool,
    /// Emphasis 0-1, mapped to velocity by the generators.
    pub accent: f64,
}

impl RhythmStep {
    pub fn end_beats(&self) -> f64 {
        self.start_beats + self.length_beats
    }
}

/// A named rhythm template for one meter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RhythmPattern {
    pub name: String,
    pub numerator: u8,
    pub denominator: u8,
    /// Number of bars the template spans.
    pub bars: u32,
    /// Relative selection weight within its meter family.
    pub weight: f64,
    pub steps: Vec<RhythmStep>,
}

impl RhythmPattern {
    /// Build a pattern from `(start, length, rest, accent)` tuples.
    pub fn from_steps(
        name: &str,
        meter: (u8, u8),
        bars: u32,
        weight: f64,
        steps: &[(f64, f64, bool, f64)],
    ) -> Self {
        RhythmPattern {
            name: name.to_string(),
            numerator: meter.0,
            denominator: meter.1,
            bars: bars.max(1),
            weight,
            steps: steps
                .iter()
                .map(|&(start_beats, length_beats, rest, accent)| RhythmStep {
                    start_beats,
                    length_beats,
                    rest,
                    accent,
                })
                .collect(),
        }
    }

    /// Default template: a run of eighths filling one bar, accented on the
    /// downbeat and each beat.
    pub fn straight_eighths(numerator: u8, denominator: u8) -> Self {
        let beats = numerator.max(1) as usize;
        let steps = (0..beats * 2)
            .map(|i| RhythmStep {
                start_beats: i as f64 * 0.5,
                length_beats: 0.5,
                rest: false,
                accent: if i == 0 {
                    1.0
                } else if i % 2 == 0 {
                    0.7
                } else {
                    0.4
                },
            })
            .collect();
        RhythmPattern {
            name: "Straight Eighths".to_string(),
            numerator: numerator.max(1),
            denominator: denominator.max(1),
            bars: 1,
            weight: 1.0,
            steps,
        }
    }

    pub fn beats_per_bar(&self) -> f64 {
        self.numerator as f64
    }

    /// Total template length in beats.
    pub fn length_beats(&self) -> f64 {
        self.bars as f64 * self.beats_per_bar()
    }

    pub fn meter(&self) -> (u8, u8) {
        (self.numerator, self.denominator)
    }

    /// Refit the template to a single bar of another meter by repeating
    /// its steps cyclically and truncating at the bar line.
    pub fn fit_to_meter(&self, numerator: u8, denominator: u8) -> RhythmPattern {
        if self.meter() == (numerator, denominator) {
            return self.clone();
        }
        let target = numerator as f64;
        let cycle = self.length_beats();
        let mut steps = Vec::new();
        if cycle > 0.0 && !self.steps.is_empty() {
            let mut offset = 0.0;
            'tile: loop {
                for step in &self.steps {
                    let start = offset + step.start_beats;
                    if start >= target {
                        break 'tile;
                    }
                    steps.push(RhythmStep {
                        start_beats: start,
                        length_beats: step.length_beats.min(target - start),
                        ..*step
                    });
                }
                offset += cycle;
            }
        }
        if steps.is_empty() {
            return RhythmPattern::straight_eighths(numerator, denominator);
        }
        RhythmPattern {
            name: format!("{} (fitted to {}/{})", self.name, numerator, denominator),
            numerator,
            denominator,
            bars: 1,
            weight: self.weight,
            steps,
        }
    }
}

/// Compress a pattern's timings by `den/num` and tile the result across the
/// original length, truncating the last repetition.
///
/// A 3:2 ratio fits three events where two were. A ratio of 1:1, or a
/// degenerate ratio with a zero term, returns the pattern unchanged.
pub fn warp(pattern: &RhythmPattern, ratio: (u32, u32)) -> RhythmPattern {
    let (num, den) = ratio;
    if num == 0 || den == 0 || num == den {
        return pattern.clone();
    }
    let factor = den as f64 / num as f64;
    let total = pattern.length_beats();
    let cycle = total * factor;
    let mut steps = Vec::new();
    let mut offset = 0.0;
    'tile: while offset < total {
        for step in &pattern.steps {
            let start = offset + step.start_beats * factor;
            if start >= total {
                break 'tile;
            }
            steps.push(RhythmStep {
                start_beats: start,
                length_beats: (step.length_beats * factor).min(total - start),
                ..*step
            });
        }
        offset += cycle;
    }
    RhythmPattern {
        name: format!("{} ({}:{})", pattern.name, num, den),
        steps,
        ..pattern.clone()
    }
}

/// Cross-rhythm applied to selected patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PolyrhythmMode {
    #[default]
    Off,
    ThreeOverTwo,
    FourOverThree,
    FiveOverFour,
    SevenOverFour,
}

impl PolyrhythmMode {
    pub fn ratio(self) -> Option<(u32, u32)> {
        match self {
            PolyrhythmMode::Off => None,
            PolyrhythmMode::ThreeOverTwo => Some((3, 2)),
            PolyrhythmMode::FourOverThree => Some((4, 3)),
            PolyrhythmMode::FiveOverFour => Some((5, 4)),
            PolyrhythmMode::SevenOverFour => Some((7, 4)),
        }
    }

    /// Parse "3:2"-style or descriptive names. Unknown names mean Off.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "3:2" | "three-over-two" => PolyrhythmMode::ThreeOverTwo,
            "4:3" | "four-over-three" => PolyrhythmMode::FourOverThree,
            "5:4" | "five-over-four" => PolyrhythmMode::FiveOverFour,
            "7:4" | "seven-over-four" => PolyrhythmMode::SevenOverFour,
            _ => PolyrhythmMode::Off,
        }
    }
}

/// Lay a template over `bars` bars, returning steps with absolute times.
///
/// Multi-bar templates cycle bar by bar. When a polyrhythm is active, each
/// bar independently uses the warped template with probability `amount`;
/// with `amount == 0` no draws are consumed.
pub fn expand_over_passage(
    pattern: &RhythmPattern,
    bars: u32,
    polyrhythm: PolyrhythmMode,
    amount: f64,
    rng: &mut ComposerRng,
) -> Vec<RhythmStep> {
    let bpb = pattern.beats_per_bar();
    let warped = polyrhythm.ratio().map(|r| warp(pattern, r));
    let mut out = Vec::new();
    for bar in 0..bars {
        let template = match &warped {
            Some(w) if amount > 0.0 && rng.random_bool(amount) => w,
            _ => pattern,
        };
        let pattern_bar = (bar % template.bars.max(1)) as f64;
        let (lo, hi) = (pattern_bar * bpb, (pattern_bar + 1.0) * bpb);
        let bar_start = bar as f64 * bpb;
        out.extend(
            template
                .steps
                .iter()
                .filter(|s| s.start_beats >= lo && s.start_beats < hi)
                .map(|s| RhythmStep {
                    start_beats: bar_start + (s.start_beats - lo),
                    ..*s
                }),
        );
    }
    out
}

/// Catalog of rhythm templates grouped by meter family.
#[derive(Debug, Clone)]
pub struct RhythmPatternDatabase {
    patterns: Vec<RhythmPattern>,
    families: BTreeMap<(u8, u8), WeightedTable<usize>>,
}

impl RhythmPatternDatabase {
    pub fn new(patterns: Vec<RhythmPattern>) -> Self {
        let mut grouped: BTreeMap<(u8, u8), Vec<(usize, f64)>> = BTreeMap::new();
        for (i, p) in patterns.iter().enumerate() {
            grouped.entry(p.meter()).or_default().push((i, p.weight));
        }
        let families = grouped
            .into_iter()
            .map(|(meter, entries)| (meter, WeightedTable::new(entries)))
            .collect();
        RhythmPatternDatabase { patterns, families }
    }

    /// Parse a catalog from a JSON array of patterns.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let patterns: Vec<RhythmPattern> = serde_json::from_str(json)?;
        Ok(RhythmPatternDatabase::new(patterns))
    }

    pub fn patterns(&self) -> &[RhythmPattern] {
        &self.patterns
    }

    /// Meter families present in the catalog.
    pub fn meters(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        self.families.keys().copied()
    }

    /// Weighted draw of a template for the requested meter.
    ///
    /// Falls back along the meter-family policy and fits borrowed templates
    /// to the requested bar. Never fails.
    pub fn select_pattern(
        &self,
        numerator: u8,
        denominator: u8,
        rng: &mut ComposerRng,
    ) -> RhythmPattern {
        if let Some(table) = self.families.get(&(numerator, denominator)) {
            if let Some(&idx) = table.sample(rng) {
                return self.patterns[idx].clone();
            }
        }

        let fallbacks: [&dyn Fn(&RhythmPattern) -> bool; 3] = [
            &|p: &RhythmPattern| p.numerator == numerator,
            &|p: &RhythmPattern| p.denominator == denominator,
            &|_: &RhythmPattern| true,
        ];
        for accept in fallbacks {
            let table = WeightedTable::new(
                self.patterns
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| accept(p))
                    .map(|(i, p)| (i, p.weight)),
            );
            if let Some(&idx) = table.sample(rng) {
                log::debug!(
                    "no {}/{} rhythm family, borrowing '{}'",
                    numerator,
                    denominator,
                    self.patterns[idx].name
                );
                return self.patterns[idx].fit_to_meter(numerator, denominator);
            }
        }

        RhythmPattern::straight_eighths(numerator, denominator)
    }
}

impl Default for RhythmPatternDatabase {
    /// The built-in catalog.
    fn default() -> Self {
        let p = RhythmPattern::from_steps;
        let (x, o) = (true, false);
        RhythmPatternDatabase::new(vec![
            RhythmPattern::straight_eighths(4, 4),
            p("Quarter Pulse", (4, 4), 1, 2.0, &[
                (0.0, 1.0, o, 1.0), (1.0, 1.0, o, 0.5), (2.0, 1.0, o, 0.8), (3.0, 1.0, o, 0.5),
            ]),
            p("Pop Syncopation", (4, 4), 1, 3.0, &[
                (0.0, 1.5, o, 1.0), (1.5, 1.0, o, 0.8), (2.5, 0.5, o, 0.5), (3.0, 1.0, o, 0.6),
            ]),
            p("Dotted Drive", (4, 4), 1, 2.0, &[
                (0.0, 0.75, o, 1.0), (0.75, 0.25, o, 0.4), (1.0, 0.75, o, 0.7),
                (1.75, 0.25, o, 0.4), (2.0, 1.0, o, 0.8), (3.0, 0.5, x, 0.0), (3.5, 0.5, o, 0.6),
            ]),
            p("Tresillo", (4, 4), 1, 2.0, &[
                (0.0, 1.5, o, 1.0), (1.5, 1.5, o, 0.8), (3.0, 1.0, o, 0.7),
            ]),
            p("Charleston", (4, 4), 1, 1.0, &[(0.0, 1.5, o, 1.0), (1.5, 2.5, o, 0.8)]),
            p("Sixteenth Run", (4, 4), 1, 1.0, &[
                (0.0, 0.25, o, 1.0), (0.25, 0.25, o, 0.3), (0.5, 0.25, o, 0.5),
                (0.75, 0.25, o, 0.3), (1.0, 1.0, o, 0.7), (2.0, 0.5, o, 0.8),
                (2.5, 0.5, o, 0.4), (3.0, 1.0, o, 0.6),
            ]),
            p("Two-Bar Call", (4, 4), 2, 1.0, &[
                (0.0, 1.0, o, 1.0), (1.0, 1.0, o, 0.5), (2.0, 2.0, o, 0.8),
                (4.0, 0.5, o, 0.9), (4.5, 0.5, o, 0.4), (5.0, 1.0, o, 0.6),
                (6.0, 1.0, x, 0.0), (7.0, 1.0, o, 0.6),
            ]),
            p("Waltz Quarters", (3, 4), 1, 3.0, &[
                (0.0, 1.0, o, 1.0), (1.0, 1.0, o, 0.5), (2.0, 1.0, o, 0.5),
            ]),
            p("Waltz Long-Short", (3, 4), 1, 2.0, &[(0.0, 2.0, o, 1.0), (2.0, 1.0, o, 0.5)]),
            p("Waltz Eighths", (3, 4), 1, 1.0, &[
                (0.0, 1.0, o, 1.0), (1.0, 0.5, o, 0.5), (1.5, 0.5, o, 0.4), (2.0, 1.0, o, 0.6),
            ]),
            p("March", (2, 4), 1, 2.0, &[
                (0.0, 0.5, o, 1.0), (0.5, 0.5, o, 0.5), (1.0, 1.0, o, 0.7),
            ]),
            p("Two Step", (2, 4), 1, 1.0, &[(0.0, 1.0, o, 1.0), (1.0, 1.0, o, 0.6)]),
            p("Compound Lilt", (6, 8), 1, 3.0, &[
                (0.0, 2.0, o, 1.0), (2.0, 1.0, o, 0.4), (3.0, 2.0, o, 0.8), (5.0, 1.0, o, 0.4),
            ]),
            p("Compound Eighths", (6, 8), 1, 1.0, &[
                (0.0, 1.0, o, 1.0), (1.0, 1.0, o, 0.4), (2.0, 1.0, o, 0.4),
                (3.0, 1.0, o, 0.8), (4.0, 1.0, o, 0.4), (5.0, 1.0, o, 0.4),
            ]),
            p("Siciliana", (6, 8), 1, 2.0, &[
                (0.0, 1.5, o, 1.0), (1.5, 0.5, o, 0.4), (2.0, 1.0, o, 0.5),
                (3.0, 1.5, o, 0.8), (4.5, 0.5, o, 0.4), (5.0, 1.0, o, 0.5),
            ]),
            p("Shuffle Blues", (12, 8), 1, 1.0, &[
                (0.0, 2.0, o, 1.0), (2.0, 1.0, o, 0.4), (3.0, 2.0, o, 0.8), (5.0, 1.0, o, 0.4),
                (6.0, 2.0, o, 0.9), (8.0, 1.0, o, 0.4), (9.0, 2.0, o, 0.8), (11.0, 1.0, o, 0.4),
            ]),
            p("Quintuple 3+2", (5, 4), 1, 1.0, &[
                (0.0, 1.5, o, 1.0), (1.5, 1.5, o, 0.6), (3.0, 1.0, o, 0.8), (4.0, 1.0, o, 0.5),
            ]),
            p("Balkan 2-2-3", (7, 8), 1, 2.0, &[
                (0.0, 2.0, o, 1.0), (2.0, 2.0, o, 0.7), (4.0, 3.0, o, 0.8),
            ]),
            p("Balkan Eighths", (7, 8), 1, 1.0, &[
                (0.0, 1.0, o, 1.0), (1.0, 1.0, o, 0.4), (2.0, 1.0, o, 0.7), (3.0, 1.0, o, 0.4),
                (4.0, 1.5, o, 0.8), (5.5, 0.5, x, 0.0), (6.0, 1.0, o, 0.5),
            ]),
        ])
    }
}
