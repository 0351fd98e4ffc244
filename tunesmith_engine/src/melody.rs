// Melody generator: a weighted melodic walk over a selected rhythm.
//
// For every sounding step of the rhythm (the selected template laid over the
// whole passage, optionally polyrhythm-warped per bar) the walk draws a
// `Movement` relative to the current pitch and resolves it to a concrete
// pitch:
//
// - Contour shaping multiplies the weights of directional moves by
//   `1 + CONTOUR_STRENGTH * bias * direction` before the draw. The passage
//   timeline is split into `CONTOUR_BUCKETS` segments and one weighted table
//   is built per segment, so a walk never rebuilds a table per step.
// - Multi-note figures (neighbor return, leap recovery, enclosure, escape
//   tone) queue their follow-up pitches; queued pitches are consumed before
//   the next draw.
// - Chord-tone moves target the current harmony: the progression slot under
//   the step in mixture mode, otherwise the tonic triad.
// - Every pitch is snapped to the scale and kept inside the tessitura. A
//   move that would leave the range is mirrored back into it.
//
// Rest handling: template rests never sound; a sounding step becomes a rest
// with probability `rest_density`; with probability `(1 - note_density) *
// TIE_SCALE` a step extends the previous note instead of striking a new one.
//
// Ornaments are attached to host notes with probability
// `ornament_probability`. They take time from the front of the host, which
// is shortened to make room and never extended.

use crate::config::EngineConfig;
use crate::harmony::ChordSlot;
use crate::movement::{Movement, MovementKind, ORNAMENT_MOVES, STRUCTURAL_MOVES, WeightedTable};
use crate::note::{Note, fold_into_range, pitch_name, sort_notes};
use crate::rhythm::{RhythmPatternDatabase, expand_over_passage};
use crate::scale::ScaleInstance;
use std::collections::VecDeque;
use tunesmith_prng::ComposerRng;

const CONTOUR_BUCKETS: usize = 8;
const CONTOUR_STRENGTH: f64 = 0.8;
const TIE_SCALE: f64 = 0.6;
const ACCENT_VELOCITY: f64 = 25.0;
const ORNAMENT_MAX_BEATS: f64 = 0.125;

/// Snap `raw` into the scale and the `[low, high]` range.
pub(crate) fn fit_pitch(scale: &ScaleInstance, raw: i32, low: u8, high: u8) -> u8 {
    let folded = fold_into_range(raw, low, high);
    let snapped = scale.snap(folded);
    if snapped > high {
        let down = scale.step(snapped, -1);
        if down >= low as i32 {
            return down as u8;
        }
    } else if snapped < low {
        let up = scale.step(snapped, 1);
        if up <= high as i32 {
            return up as u8;
        }
    } else {
        return snapped;
    }
    folded
}

/// Pitch classes sounding at `beat`: the covering progression slot, or the
/// tonic triad without one.
pub(crate) fn harmony_at(scale: &ScaleInstance, progression: Option<&[ChordSlot]>, beat: f64) -> Vec<u8> {
    let slot = progression.and_then(|slots| {
        slots
            .iter()
            .find(|s| beat >= s.start_beats && beat < s.start_beats + s.length_beats)
    });
    match slot {
        Some(slot) => slot
            .chord
            .intervals
            .iter()
            .map(|iv| (slot.chord.root_pc + iv) % 12)
            .collect(),
        None => scale
            .stacked_thirds(0, 3)
            .iter()
            .map(|iv| (scale.tonic_pc + iv) % 12)
            .collect(),
    }
}

/// Walk state shared by the move resolvers.
struct Walk<'a> {
    scale: &'a ScaleInstance,
    low: u8,
    high: u8,
    current: u8,
    pending: VecDeque<i32>,
}

impl Walk<'_> {
    fn fit(&self, raw: i32) -> u8 {
        let raw = if raw > self.high as i32 || raw < self.low as i32 {
            2 * self.current as i32 - raw
        } else {
            raw
        };
        fit_pitch(self.scale, raw, self.low, self.high)
    }

    fn steps(&self, n: i32) -> i32 {
        self.scale.step(self.current, n)
    }

    fn nearest_chord_tone(&self, chord_pcs: &[u8], rng: &mut ComposerRng) -> i32 {
        let cur = self.current as i32;
        let candidates: Vec<i32> = (cur - 7..=cur + 7)
            .filter(|&p| p != cur && (self.low as i32..=self.high as i32).contains(&p))
            .filter(|&p| chord_pcs.contains(&(p.rem_euclid(12) as u8)))
            .collect();
        if candidates.is_empty() {
            return cur;
        }
        candidates[rng.range_usize(0, candidates.len())]
    }

    /// Resolve a structural move to its first pitch, queueing follow-ups.
    ///
    /// Interval sizes come from the move's `semitone_hint`, converted to
    /// scale steps; leaps widen by up to two further steps.
    fn resolve(&mut self, m: &Movement, bias: f64, chord_pcs: &[u8], rng: &mut ComposerRng) -> i32 {
        let cur = self.current as i32;
        let width = hint_steps(self.scale, m.semitone_hint);
        let up = rng.random_bool(((1.0 + bias) * 0.5).clamp(0.1, 0.9));
        let dir = if up { 1 } else { -1 };
        match m.kind {
            MovementKind::ChordTone => self.nearest_chord_tone(chord_pcs, rng),
            MovementKind::StepUp | MovementKind::StepDown => self.steps(width),
            MovementKind::NeighborUp | MovementKind::NeighborDown => {
                self.pending.push_back(cur);
                self.steps(width)
            }
            MovementKind::Leap => {
                let size = width.abs().max(1) + rng.range_i32_inclusive(0, 2);
                let landing = self.steps(dir * size);
                let recovery = self.scale.step(self.fit(landing), -dir);
                self.pending.push_back(recovery);
                landing
            }
            MovementKind::Enclosure => {
                let span = width.abs().max(1);
                let target = self.steps(dir * span);
                let target_pitch = self.fit(target);
                let below = self.scale.step(target_pitch, -span);
                self.pending.push_back(below);
                self.pending.push_back(target_pitch as i32);
                self.scale.step(target_pitch, span)
            }
            MovementKind::EscapeTone => {
                let span = width.abs().max(1);
                let escape = self.steps(dir * span);
                let rebound = self.scale.step(self.fit(escape), -dir * (span + 1));
                self.pending.push_back(rebound);
                escape
            }
            MovementKind::Resolution => {
                let toward = if m.semitone_hint > 0 { 1 } else { -1 };
                (1..=12)
                    .map(|d| cur + toward * d)
                    .find(|&p| {
                        (0..=127).contains(&p)
                            && matches!(self.scale.degree_of(p as u8), Some(0 | 2 | 4))
                    })
                    .unwrap_or(cur)
            }
            _ => cur,
        }
    }
}

/// Scale steps approximating a semitone interval in `scale`, keeping its
/// sign. Any non-zero interval moves at least one step.
fn hint_steps(scale: &ScaleInstance, semitones: i32) -> i32 {
    if semitones == 0 {
        return 0;
    }
    let mean_step = 12.0 / scale.scale.len().max(1) as f64;
    let steps = ((semitones.abs() as f64 / mean_step).round() as i32).max(1);
    steps * semitones.signum()
}

/// Split the front of `host` into ornament notes of the chosen kind. The
/// neighbour tones sit `semitone_hint` (in scale steps) around the host.
///
/// Returns the ornament notes; `host` is shortened in place. Hosts too short
/// for the figure are left alone.
fn ornament(
    host: &mut Note,
    m: &Movement,
    scale: &ScaleInstance,
    low: u8,
    high: u8,
) -> Vec<Note> {
    let p = host.pitch;
    let width = hint_steps(scale, m.semitone_hint).abs().max(1);
    let upper = fit_pitch(scale, scale.step(p, width), low, high);
    let lower = fit_pitch(scale, scale.step(p, -width), low, high);
    let figure: Vec<u8> = match m.kind {
        MovementKind::GraceUp => vec![lower],
        MovementKind::GraceDown => vec![upper],
        MovementKind::MordentUp => vec![p, upper],
        MovementKind::MordentDown => vec![p, lower],
        MovementKind::Trill => vec![p, upper, p, upper],
        MovementKind::Turn => vec![upper, p, lower],
        _ => return Vec::new(),
    };
    let unit = (host.length_beats / 4.0).min(ORNAMENT_MAX_BEATS);
    let span = unit * figure.len() as f64;
    if host.length_beats - span < unit {
        return Vec::new();
    }
    let velocity = (host.velocity as f64 * 0.8).round() as u8;
    let notes = figure
        .iter()
        .enumerate()
        .map(|(i, &pitch)| Note::ornament(pitch, velocity, host.start_beats + i as f64 * unit, unit))
        .collect();
    host.start_beats += span;
    host.length_beats -= span;
    notes
}

/// Walk a melody over the passage. With `progression`, chord-tone moves
/// follow it. Not humanized; see `engine::generate_melody`.
///
/// Deterministic for a given config and generator state; the result is
/// sorted by onset.
pub fn walk_melody(
    config: &EngineConfig,
    rhythms: &RhythmPatternDatabase,
    progression: Option<&[ChordSlot]>,
    rng: &mut ComposerRng,
) -> Vec<Note> {
    let config = config.sanitized();
    let scale = config.scale_instance();
    let (low, high) = config.tessitura();
    let total = config.total_beats();

    let pattern = rhythms.select_pattern(config.numerator, config.denominator, rng);
    let steps = expand_over_passage(
        &pattern,
        config.bars,
        config.polyrhythm,
        config.polyrhythm_amount,
        rng,
    );

    let tables: Vec<WeightedTable<_>> = (0..CONTOUR_BUCKETS)
        .map(|b| {
            let bias = config.contour.bias((b as f64 + 0.5) / CONTOUR_BUCKETS as f64);
            WeightedTable::from_movements(&STRUCTURAL_MOVES, |m| {
                (1.0 + CONTOUR_STRENGTH * bias * m.kind.direction() as f64).max(0.05)
            })
        })
        .collect();
    let ornaments = WeightedTable::from_movements(&ORNAMENT_MOVES, |_| 1.0);

    let center = ((low as u16 + high as u16) / 2) as u8;
    let start = fit_pitch(&scale, scale.degree_pitch(0, center), low, high);
    let mut walk = Walk {
        scale: &scale,
        low,
        high,
        current: start,
        pending: VecDeque::new(),
    };

    let mut notes: Vec<Note> = Vec::new();
    let mut last_host: Option<usize> = None;
    let mut first = true;

    for step in &steps {
        if step.rest || step.start_beats >= total {
            last_host = None;
            continue;
        }
        if config.rest_density > 0.0 && rng.random_bool(config.rest_density) {
            last_host = None;
            continue;
        }
        if let Some(idx) = last_host {
            let host = &mut notes[idx];
            let contiguous = (host.end_beats() - step.start_beats).abs() < 1e-6;
            let tie = (1.0 - config.note_density) * TIE_SCALE;
            if contiguous && tie > 0.0 && rng.random_bool(tie) {
                host.length_beats = (step.end_beats().min(total) - host.start_beats).max(host.length_beats);
                continue;
            }
        }

        let progress = step.start_beats / total;
        let bucket = ((progress * CONTOUR_BUCKETS as f64) as usize).min(CONTOUR_BUCKETS - 1);
        let bias = config.contour.bias(progress);
        let chord_pcs = harmony_at(&scale, progression, step.start_beats);

        let pitch = if first {
            first = false;
            walk.current
        } else if let Some(queued) = walk.pending.pop_front() {
            walk.fit(queued)
        } else {
            let m = tables[bucket]
                .sample(rng)
                .copied()
                .unwrap_or(STRUCTURAL_MOVES[1]);
            let raw = walk.resolve(&m, bias, &chord_pcs, rng);
            walk.fit(raw)
        };
        walk.current = pitch;

        let velocity = (config.base_velocity as f64 + (step.accent - 0.5) * ACCENT_VELOCITY)
            .round()
            .clamp(1.0, 127.0) as u8;
        let length = step.length_beats.min(total - step.start_beats);
        let mut host = Note::new(pitch, velocity, step.start_beats, length);

        if config.ornament_probability > 0.0 && rng.random_bool(config.ornament_probability) {
            if let Some(m) = ornaments.sample(rng) {
                notes.extend(ornament(&mut host, m, &scale, low, high));
            }
        }
        notes.push(host);
        last_host = Some(notes.len() - 1);
    }

    for note in &mut notes {
        note.clip_end(total);
    }
    sort_notes(&mut notes);
    log::debug!(
        "melody: {} notes over {} beats, rhythm '{}', starting on {}",
        notes.len(),
        total,
        pattern.name,
        pitch_name(start)
    );
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContourShape;

    fn config() -> EngineConfig {
        EngineConfig {
            bars: 8,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_melody_stays_in_range_and_scale() {
        let config = config();
        let scale = config.scale_instance();
        let db = RhythmPatternDatabase::default();
        for seed in 0..20 {
            let notes = walk_melody(&config, &db, None, &mut ComposerRng::new(seed));
            assert!(!notes.is_empty());
            for n in &notes {
                assert!(n.pitch >= config.tessitura_low && n.pitch <= config.tessitura_high);
                assert!(scale.contains(n.pitch), "{} not in C major", n.pitch);
                assert!(n.end_beats() <= config.total_beats() + 1e-9);
            }
        }
    }

    #[test]
    fn test_melody_is_deterministic() {
        let config = config();
        let db = RhythmPatternDatabase::default();
        let a = walk_melody(&config, &db, None, &mut ComposerRng::new(7));
        let b = walk_melody(&config, &db, None, &mut ComposerRng::new(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_full_rest_density_is_silent() {
        let config = EngineConfig {
            rest_density: 1.0,
            ..config()
        };
        let db = RhythmPatternDatabase::default();
        assert!(walk_melody(&config, &db, None, &mut ComposerRng::new(1)).is_empty());
    }

    #[test]
    fn test_ornaments_stay_inside_host_span() {
        let config = EngineConfig {
            ornament_probability: 1.0,
            ..config()
        };
        let db = RhythmPatternDatabase::default();
        let notes = walk_melody(&config, &db, None, &mut ComposerRng::new(3));
        assert!(notes.iter().any(|n| n.is_ornament));
        for n in &notes {
            assert!(n.length_beats > 0.0);
        }
    }

    #[test]
    fn test_ascending_contour_rises() {
        let db = RhythmPatternDatabase::default();
        let mut rises = 0;
        for seed in 0..20 {
            let config = EngineConfig {
                contour: ContourShape::Ascending,
                tessitura_low: 48,
                tessitura_high: 96,
                ornament_probability: 0.0,
                ..config()
            };
            let notes = walk_melody(&config, &db, None, &mut ComposerRng::new(seed));
            let half = notes.len() / 2;
            let avg = |ns: &[Note]| ns.iter().map(|n| n.pitch as f64).sum::<f64>() / ns.len().max(1) as f64;
            if avg(&notes[half..]) > avg(&notes[..half]) {
                rises += 1;
            }
        }
        assert!(rises >= 12, "ascending contour rose in only {rises}/20 runs");
    }

    #[test]
    fn test_fit_pitch() {
        let scale = ScaleInstance::new(crate::scale::scale_by_name("Major"), 60);
        assert_eq!(fit_pitch(&scale, 61, 60, 72), 60);
        assert_eq!(fit_pitch(&scale, 90, 60, 72), 65);
        assert_eq!(fit_pitch(&scale, 73, 60, 72), 60);
    }

    #[test]
    fn test_fit_pitch_narrow_range() {
        let scale = ScaleInstance::new(crate::scale::scale_by_name("Major"), 60);
        for raw in [40, 59, 68, 71, 90] {
            let p = fit_pitch(&scale, raw, 60, 67);
            assert!((60..=67).contains(&p), "{raw} -> {p}");
        }
        assert_eq!(fit_pitch(&scale, 50, 64, 64), 64);
    }

    #[test]
    fn test_hint_steps() {
        let major = ScaleInstance::new(crate::scale::scale_by_name("Major"), 60);
        assert_eq!(hint_steps(&major, 0), 0);
        assert_eq!(hint_steps(&major, 2), 1);
        assert_eq!(hint_steps(&major, -2), -1);
        assert_eq!(hint_steps(&major, 5), 3);
        assert_eq!(hint_steps(&major, 1), 1);
        let pentatonic = ScaleInstance::new(crate::scale::scale_by_name("Minor Pentatonic"), 60);
        assert_eq!(hint_steps(&pentatonic, 5), 2);
    }

    #[test]
    fn test_leap_size_follows_semitone_hint() {
        let scale = ScaleInstance::new(crate::scale::scale_by_name("Major"), 60);
        let octave_leap = Movement {
            kind: MovementKind::Leap,
            weight: 1.0,
            semitone_hint: 12,
        };
        let mut rng = ComposerRng::new(11);
        for _ in 0..50 {
            let mut walk = Walk {
                scale: &scale,
                low: 24,
                high: 108,
                current: 60,
                pending: VecDeque::new(),
            };
            let landing = walk.resolve(&octave_leap, 0.0, &[], &mut rng);
            assert!((landing - 60).abs() >= 12, "leap landed on {landing}");
            assert_eq!(walk.pending.len(), 1);
        }
    }
}
