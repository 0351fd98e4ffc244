// Humanizer: bounded timing and velocity perturbation plus swing and feel.
//
// Stages run in a fixed order so results replay exactly for a given seed:
//
// 1. Timing: every distinct onset moves by a random offset of at most
//    `timing * MAX_JITTER_BEATS`, further capped at half the gap to the
//    neighbouring onsets so no note crosses its neighbour. Notes sharing an
//    onset (chord tones) move together.
// 2. Swing: notes on the second eighth of a beat are delayed by up to a
//    triplet eighth (`swing * 1/6` beat). Their ends stay put.
// 3. Feel: notes on the beat are laid back by a fixed `feel * MAX_FEEL_BEATS`,
//    capped at half the gap to the next onset so close notes (ornaments just
//    after the beat) keep their order. Systematic, no randomness.
// 4. Velocity: each note's velocity moves by at most `velocity * 20`,
//    clamped to 1-127.
//
// Grid positions (on-beat, off-beat eighth) are classified from the input
// onsets before any stage runs. A stage with amount 0 draws nothing, so the
// all-zero settings return the input bit-for-bit.

use crate::config::HumanizeSettings;
use crate::note::{MIN_NOTE_BEATS, Note};
use tunesmith_prng::ComposerRng;

const MAX_JITTER_BEATS: f64 = 0.05;
const MAX_SWING_BEATS: f64 = 1.0 / 6.0;
const MAX_FEEL_BEATS: f64 = 0.02;
const MAX_VELOCITY_DELTA: f64 = 20.0;
const GRID_EPSILON: f64 = 1e-6;

fn on_grid(start: f64, fraction: f64) -> bool {
    (start.fract() - fraction).abs() < GRID_EPSILON
}

/// Apply the four humanize stages. Output order matches input order and
/// every note still ends by `total_beats`.
pub fn humanize(
    notes: &[Note],
    settings: &HumanizeSettings,
    total_beats: f64,
    rng: &mut ComposerRng,
) -> Vec<Note> {
    if settings.is_off() || notes.is_empty() {
        return notes.to_vec();
    }
    let mut out = notes.to_vec();

    if settings.timing > 0.0 {
        let mut onsets: Vec<f64> = notes.iter().map(|n| n.start_beats).collect();
        onsets.sort_by(f64::total_cmp);
        onsets.dedup_by(|a, b| (*a - *b).abs() < GRID_EPSILON);
        let offsets: Vec<f64> = onsets
            .iter()
            .enumerate()
            .map(|(i, &onset)| {
                let prev_gap = if i > 0 { onset - onsets[i - 1] } else { f64::INFINITY };
                let next_gap = onsets.get(i + 1).map_or(total_beats - onset, |&n| n - onset);
                let cap = (settings.timing * MAX_JITTER_BEATS)
                    .min(prev_gap * 0.5)
                    .min(next_gap * 0.5)
                    .max(0.0);
                rng.next_signed_unit() * cap
            })
            .collect();
        for note in &mut out {
            let idx = onsets.partition_point(|&o| o < note.start_beats - GRID_EPSILON);
            if let Some(offset) = offsets.get(idx) {
                note.start_beats = (note.start_beats + offset).max(0.0);
            }
        }
    }

    if settings.swing > 0.0 {
        let delay = settings.swing * MAX_SWING_BEATS;
        for (note, original) in out.iter_mut().zip(notes) {
            if on_grid(original.start_beats, 0.5) {
                let end = note.end_beats();
                note.start_beats += delay;
                note.length_beats = (end - note.start_beats).max(MIN_NOTE_BEATS);
            }
        }
    }

    if settings.feel > 0.0 {
        let delay = settings.feel * MAX_FEEL_BEATS;
        let mut onsets: Vec<f64> = out.iter().map(|n| n.start_beats).collect();
        onsets.sort_by(f64::total_cmp);
        for (note, original) in out.iter_mut().zip(notes) {
            if on_grid(original.start_beats, 0.0) {
                let idx = onsets.partition_point(|&o| o <= note.start_beats + GRID_EPSILON);
                let next = onsets.get(idx).copied().unwrap_or(total_beats);
                note.start_beats += delay.min((next - note.start_beats) * 0.5).max(0.0);
            }
        }
    }

    if settings.velocity > 0.0 {
        let spread = settings.velocity * MAX_VELOCITY_DELTA;
        for note in &mut out {
            let delta = (rng.next_signed_unit() * spread).round() as i32;
            note.velocity = (note.velocity as i32 + delta).clamp(1, 127) as u8;
        }
    }

    for note in &mut out {
        if !note.clip_end(total_beats) {
            note.start_beats = (total_beats - MIN_NOTE_BEATS).max(0.0);
            note.length_beats = total_beats - note.start_beats;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn line() -> Vec<Note> {
        (0..8)
            .map(|i| Note::new(60 + i as u8, 80, i as f64 * 0.5, 0.5))
            .collect()
    }

    #[test]
    fn test_all_zero_is_bit_identical() {
        let notes = line();
        let mut rng = ComposerRng::new(5);
        let before = rng.clone();
        let out = humanize(&notes, &HumanizeSettings::OFF, 4.0, &mut rng);
        assert_eq!(out, notes);
        assert_eq!(rng, before);
    }

    #[test]
    fn test_timing_keeps_onset_order() {
        let notes = line();
        let settings = HumanizeSettings { timing: 1.0, ..HumanizeSettings::OFF };
        let mut rng = ComposerRng::new(11);
        let out = humanize(&notes, &settings, 4.0, &mut rng);
        for w in out.windows(2) {
            assert!(w[0].start_beats < w[1].start_beats);
        }
        for (a, b) in notes.iter().zip(&out) {
            assert!((a.start_beats - b.start_beats).abs() <= MAX_JITTER_BEATS + 1e-9);
            assert!(b.end_beats() <= 4.0 + 1e-9);
        }
    }

    #[test]
    fn test_chord_tones_move_together() {
        let chord = vec![
            Note::new(60, 80, 1.0, 1.0),
            Note::new(64, 80, 1.0, 1.0),
            Note::new(67, 80, 1.0, 1.0),
        ];
        let settings = HumanizeSettings { timing: 1.0, ..HumanizeSettings::OFF };
        let mut rng = ComposerRng::new(2);
        let out = humanize(&chord, &settings, 4.0, &mut rng);
        assert!(out.iter().all(|n| n.start_beats == out[0].start_beats));
    }

    #[test]
    fn test_swing_delays_off_beats_only() {
        let notes = line();
        let settings = HumanizeSettings { swing: 1.0, ..HumanizeSettings::OFF };
        let mut rng = ComposerRng::new(1);
        let out = humanize(&notes, &settings, 4.0, &mut rng);
        assert_eq!(out[0].start_beats, 0.0);
        assert!((out[1].start_beats - (0.5 + MAX_SWING_BEATS)).abs() < 1e-9);
        assert!((out[1].end_beats() - 1.0).abs() < 1e-9, "swung note keeps its end");
    }

    #[test]
    fn test_feel_is_systematic() {
        let notes = line();
        let settings = HumanizeSettings { feel: 1.0, ..HumanizeSettings::OFF };
        let a = humanize(&notes, &settings, 4.0, &mut ComposerRng::new(1));
        let b = humanize(&notes, &settings, 4.0, &mut ComposerRng::new(999));
        assert_eq!(a, b);
        assert!((a[2].start_beats - (1.0 + MAX_FEEL_BEATS)).abs() < 1e-9);
    }

    #[test]
    fn test_feel_never_passes_a_close_onset() {
        // Grace note just after the beat, as an ornament before its host.
        let notes = vec![
            Note::new(62, 80, 1.0, 0.01),
            Note::new(60, 80, 1.01, 0.99),
            Note::new(64, 80, 2.0, 1.0),
        ];
        let settings = HumanizeSettings { timing: 1.0, feel: 1.0, ..HumanizeSettings::OFF };
        for seed in 0..50 {
            let out = humanize(&notes, &settings, 4.0, &mut ComposerRng::new(seed));
            for w in out.windows(2) {
                assert!(
                    w[0].start_beats < w[1].start_beats,
                    "seed {seed}: {} !< {}",
                    w[0].start_beats,
                    w[1].start_beats
                );
            }
        }
        let feel_only = HumanizeSettings { feel: 1.0, ..HumanizeSettings::OFF };
        let out = humanize(&notes, &feel_only, 4.0, &mut ComposerRng::new(1));
        assert!((out[0].start_beats - 1.005).abs() < 1e-9);
        assert!((out[2].start_beats - (2.0 + MAX_FEEL_BEATS)).abs() < 1e-9);
    }

    #[test]
    fn test_velocity_stays_in_range() {
        let notes = vec![Note::new(60, 1, 0.0, 1.0), Note::new(62, 127, 1.0, 1.0)];
        let settings = HumanizeSettings { velocity: 1.0, ..HumanizeSettings::OFF };
        let mut rng = ComposerRng::new(4);
        for _ in 0..50 {
            for n in humanize(&notes, &settings, 2.0, &mut rng) {
                assert!((1..=127).contains(&n.velocity));
            }
        }
    }
}
