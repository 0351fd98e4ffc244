// Post-processing passes over already generated note lists.
//
// - `make_counter_melody`: a second line answering the melody in contrary or
//   oblique motion, at reduced density, in the half of the tessitura the
//   melody uses less.
// - `make_harmony_stack`: a parallel voice at a fixed interval. Third and
//   Sixth move by scale steps, OpenFifth and Spread by semitones. Timing is
//   copied unchanged.
// - `color_chord` / `apply_chord_color`: raise or lower chord tension
//   independent of the extension density used at generation time.
// - `revoice`: re-slice simultaneous chord tones into strum and roll shapes
//   without changing pitch content or extending any note.
//
// Passes that need randomness seed their own generator from the configured
// seed plus a fixed salt, so each pass is a pure function of its input notes
// and the configuration: running it twice gives the same result.

use crate::config::{ChordColor, EngineConfig, HarmonyStackMode, RevoicePattern};
use crate::melody::fit_pitch;
use crate::note::{MIN_NOTE_BEATS, Note, fold_into_range, onset_groups, sort_notes};
use crate::scale::ScaleInstance;
use tunesmith_prng::ComposerRng;

pub(crate) const COUNTER_SALT: u64 = 0xC0C0_0001;
pub(crate) const CHORD_COLOR_SALT: u64 = 0xC0C0_0002;

// ---------------------------------------------------------------------------
// Counter-melody
// ---------------------------------------------------------------------------

/// Probability of holding the previous counter pitch instead of moving.
const OBLIQUE_PROBABILITY: f64 = 0.3;

/// Derive a counter-melody from `melody` under `config`.
pub fn make_counter_melody(melody: &[Note], config: &EngineConfig) -> Vec<Note> {
    let config = config.sanitized();
    let scale = config.scale_instance();
    let mut rng = ComposerRng::salted(config.seed, COUNTER_SALT);
    let hosts: Vec<&Note> = melody.iter().filter(|n| !n.is_ornament).collect();
    if hosts.is_empty() {
        return Vec::new();
    }

    let (low, high) = config.tessitura();
    let mid = ((low as u16 + high as u16) / 2) as u8;
    let mean = hosts.iter().map(|n| n.pitch as f64).sum::<f64>() / hosts.len() as f64;
    let above = mean < mid as f64;
    let (band_low, band_high) = if above {
        (mid.min(high.saturating_sub(12)).max(low), high)
    } else {
        (low, mid.max(low.saturating_add(12)).min(high))
    };

    let mut out = Vec::new();
    let mut current: Option<u8> = None;
    let mut previous_melody: Option<u8> = None;
    for host in hosts {
        let melody_move = previous_melody.map(|p| host.pitch as i32 - p as i32);
        previous_melody = Some(host.pitch);
        if !rng.random_bool(config.counter_density) {
            continue;
        }
        let pitch = match (current, melody_move) {
            (None, _) => {
                let offset = if above { 9 } else { -9 };
                fit_pitch(&scale, host.pitch as i32 + offset, band_low, band_high)
            }
            (Some(cur), Some(diff)) if diff != 0 && !rng.random_bool(OBLIQUE_PROBABILITY) => {
                let size = ((diff.abs() + 1) / 2).clamp(1, 2);
                let raw = scale.step(cur, -diff.signum() * size);
                let fitted = fit_pitch(&scale, raw, band_low, band_high);
                // Folding at the band edge can flip direction; hold instead.
                if (fitted as i32 - cur as i32).signum() == diff.signum() {
                    cur
                } else {
                    fitted
                }
            }
            (Some(cur), _) => cur,
        };
        current = Some(pitch);
        let velocity = host.velocity.saturating_sub(12).max(1);
        out.push(Note::new(pitch, velocity, host.start_beats, host.length_beats));
    }
    log::debug!("counter-melody: {} of {} notes answered", out.len(), melody.len());
    out
}

// ---------------------------------------------------------------------------
// Harmony stack
// ---------------------------------------------------------------------------

/// A parallel voice for `melody`. `Off` yields no notes.
pub fn make_harmony_stack(melody: &[Note], mode: HarmonyStackMode, scale: &ScaleInstance) -> Vec<Note> {
    melody
        .iter()
        .filter_map(|note| {
            let raw = match mode {
                HarmonyStackMode::Off => return None,
                HarmonyStackMode::Third => scale.step(note.pitch, 2),
                HarmonyStackMode::Sixth => scale.step(note.pitch, 5),
                HarmonyStackMode::OpenFifth => note.pitch as i32 + 7,
                HarmonyStackMode::Spread => note.pitch as i32 - 12,
            };
            Some(Note {
                pitch: fold_into_range(raw, 0, 127),
                velocity: note.velocity.saturating_sub(8).max(1),
                ..*note
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Chord colour
// ---------------------------------------------------------------------------

/// Recolour one chord. `pitches` ascend from the root; tones above `high`
/// are not added.
pub fn color_chord(
    pitches: &[u8],
    color: ChordColor,
    scale: &ScaleInstance,
    high: u8,
    rng: &mut ComposerRng,
) -> Vec<u8> {
    let Some(&root) = pitches.first() else {
        return Vec::new();
    };
    let mut out: Vec<u8> = pitches
        .iter()
        .copied()
        .filter(|&p| p.checked_sub(root).is_some_and(|iv| matches!(iv, 0 | 2..=8)))
        .collect();
    if color == ChordColor::Light {
        return out;
    }

    let seventh = match scale.degree_of(root) {
        Some(degree) => match scale.stacked_thirds(degree, 4).get(3) {
            Some(&iv @ (10 | 11)) => iv,
            _ => 10,
        },
        None => 10,
    };
    let add = |iv: u8, out: &mut Vec<u8>| {
        if let Some(p) = root.checked_add(iv).filter(|&p| p <= high) {
            out.push(p);
        }
    };
    add(seventh, &mut out);
    if color == ChordColor::Aggressive {
        let dominant = root.checked_add(4).is_some_and(|third| out.contains(&third)) && seventh == 10;
        let ninth = if dominant {
            if rng.random_bool(0.5) { 13 } else { 15 }
        } else {
            14
        };
        add(ninth, &mut out);
    }
    out.sort_unstable();
    out.dedup();
    out
}

/// Recolour every onset group of a block-voiced chord track.
///
/// The lowest tone of each group is taken as the chord root.
pub fn apply_chord_color(chords: &[Note], color: ChordColor, config: &EngineConfig) -> Vec<Note> {
    let config = config.sanitized();
    let scale = config.scale_instance();
    let mut rng = ComposerRng::salted(config.seed, CHORD_COLOR_SALT);
    let mut sorted = chords.to_vec();
    sort_notes(&mut sorted);
    let mut out = Vec::with_capacity(sorted.len());
    for group in onset_groups(&sorted) {
        let base = sorted[group[0]];
        let pitches: Vec<u8> = group.iter().map(|&i| sorted[i].pitch).collect();
        out.extend(
            color_chord(&pitches, color, &scale, config.tessitura_high, &mut rng)
                .into_iter()
                .map(|pitch| Note { pitch, ..base }),
        );
    }
    out
}

// ---------------------------------------------------------------------------
// Rhythmic re-voicing
// ---------------------------------------------------------------------------

const MAX_STRUM_STEP_BEATS: f64 = 0.04;
const MICRO_SWING_BEATS: f64 = 0.012;

/// Delay `note` by `delay` beats, keeping its end.
fn delay_keep_end(note: &Note, delay: f64) -> Note {
    let delay = delay.min(note.length_beats - MIN_NOTE_BEATS).max(0.0);
    Note {
        start_beats: note.start_beats + delay,
        length_beats: note.length_beats - delay,
        ..*note
    }
}

/// Re-slice each group of simultaneous chord tones into `pattern`.
pub fn revoice(chords: &[Note], pattern: RevoicePattern) -> Vec<Note> {
    let mut sorted = chords.to_vec();
    sort_notes(&mut sorted);
    let mut out = Vec::with_capacity(sorted.len());
    for group in onset_groups(&sorted) {
        let voices: Vec<Note> = group.iter().map(|&i| sorted[i]).collect();
        let n = voices.len();
        if n < 2 {
            out.extend(voices);
            continue;
        }
        let shortest = voices
            .iter()
            .map(|v| v.length_beats)
            .fold(f64::INFINITY, f64::min);
        match pattern {
            RevoicePattern::StrumUp | RevoicePattern::StrumDown => {
                let step = (shortest * 0.25 / n as f64).min(MAX_STRUM_STEP_BEATS);
                for (i, v) in voices.iter().enumerate() {
                    let rank = if pattern == RevoicePattern::StrumUp { i } else { n - 1 - i };
                    out.push(delay_keep_end(v, rank as f64 * step));
                }
            }
            RevoicePattern::SpreadRollIn => {
                let step = shortest * 0.5 / n as f64;
                for (i, v) in voices.iter().enumerate() {
                    out.push(delay_keep_end(v, i as f64 * step));
                }
            }
            RevoicePattern::InnerVoiceLead => {
                for (i, v) in voices.iter().enumerate() {
                    if i == 0 || i == n - 1 || v.length_beats < 2.0 * MIN_NOTE_BEATS {
                        out.push(*v);
                        continue;
                    }
                    let half = v.length_beats / 2.0;
                    out.push(Note { length_beats: half, ..*v });
                    out.push(Note {
                        start_beats: v.start_beats + half,
                        length_beats: v.length_beats - half,
                        ..*v
                    });
                }
            }
            RevoicePattern::MicroSwing => {
                for (i, v) in voices.iter().enumerate() {
                    let delay = MICRO_SWING_BEATS * ((i * 2) % 3) as f64;
                    out.push(delay_keep_end(v, delay));
                }
            }
        }
    }
    sort_notes(&mut out);
    out
}
