// Chord progression and chord-track rendering.
//
// A progression is one `ChordSlot` per harmonic-rhythm slot (`bars *
// chords_per_bar` slots of equal length). Degrees follow a weighted
// root-motion table keyed by the previous degree, favouring functional
// motion (I-IV-V-I families, descending fifths, stepwise pre-dominants).
// The first slot is the tonic; with three or more slots the penultimate is
// the dominant and the last returns to the tonic.
//
// After the diatonic degrees are chosen the color-family rules rewrite
// interior slots, then each chord is voiced:
// - root placed on the lowest pitch of its class inside the tessitura, so
//   the root is the lowest sounding tone (ranges under an octave keep only
//   the chord tones that fit)
// - extension tones added under the harmony options
// - optional chord-color pass (postprocess.rs)
// - tones outside the tessitura dropped
// and laid out in time by the configured `VoicingStyle`. The optional
// rhythmic re-voicing pass runs over the rendered notes.

use crate::config::{EngineConfig, VoicingStyle};
use crate::harmony::{AdvancedHarmonyOptions, Chord, ChordSlot, apply_color_families, apply_extensions};
use crate::melody::fit_pitch;
use crate::movement::WeightedTable;
use crate::note::{Note, interval, sort_notes};
use crate::postprocess::{CHORD_COLOR_SALT, color_chord, revoice};
use crate::scale::ScaleInstance;
use tunesmith_prng::ComposerRng;

const ALBERTI_UNIT_BEATS: f64 = 0.5;
const ANTICIPATION_BEATS: f64 = 0.5;
const CHORD_VELOCITY_OFFSET: i32 = -10;

/// Weighted next-degree tables for heptatonic scales, indexed by the
/// current degree.
const FUNCTIONAL_MOTION: [&[(usize, f64)]; 7] = [
    &[(3, 3.0), (4, 3.0), (5, 2.5), (1, 2.0), (2, 1.0)],
    &[(4, 4.0), (6, 1.0), (3, 1.0)],
    &[(5, 4.0), (3, 2.0)],
    &[(4, 4.0), (0, 2.0), (1, 2.0)],
    &[(0, 4.0), (5, 2.5)],
    &[(1, 3.0), (3, 3.0), (4, 1.0)],
    &[(0, 4.0), (2, 1.0)],
];

/// Root-motion tables for a scale.
struct RootMotion {
    tables: Vec<WeightedTable<usize>>,
}

impl RootMotion {
    fn for_scale(scale: &ScaleInstance) -> Self {
        let n = scale.scale.len();
        let tables = if n == 7 {
            FUNCTIONAL_MOTION
                .iter()
                .map(|row| WeightedTable::new(row.iter().copied()))
                .collect()
        } else {
            // Other scales: any other degree, stepwise and tonic motion
            // preferred.
            (0..n)
                .map(|from| {
                    WeightedTable::new((0..n).filter(|&to| to != from).map(|to| {
                        let dist = from.abs_diff(to).min(n - from.abs_diff(to));
                        let weight = if to == 0 { 3.0 } else if dist == 1 { 2.0 } else { 1.0 };
                        (to, weight)
                    }))
                })
                .collect()
        };
        RootMotion { tables }
    }

    fn next(&self, from: usize, rng: &mut ComposerRng) -> usize {
        self.tables
            .get(from)
            .and_then(|t| t.sample(rng))
            .copied()
            .unwrap_or(0)
    }
}

/// Build the progression for the configured passage, colour families
/// applied.
pub fn generate_progression(
    config: &EngineConfig,
    options: &AdvancedHarmonyOptions,
    rng: &mut ComposerRng,
) -> Vec<ChordSlot> {
    let config = config.sanitized();
    let scale = config.scale_instance();
    let motion = RootMotion::for_scale(&scale);
    let count = (config.bars * config.chords_per_bar as u32) as usize;
    let slot_len = config.beats_per_bar() / config.chords_per_bar as f64;
    let dominant = 4 % scale.scale.len();

    let mut degrees = Vec::with_capacity(count);
    for i in 0..count {
        let degree = match i {
            0 => 0,
            _ if count >= 3 && i == count - 1 => 0,
            _ if count >= 3 && i == count - 2 => dominant,
            _ => motion.next(degrees[i - 1], rng),
        };
        degrees.push(degree);
    }

    let slots: Vec<ChordSlot> = degrees
        .iter()
        .enumerate()
        .map(|(i, &degree)| ChordSlot {
            start_beats: i as f64 * slot_len,
            length_beats: slot_len,
            chord: Chord::diatonic(&scale, degree, 3),
        })
        .collect();
    apply_color_families(&slots, &scale, options, rng)
}

/// Absolute pitches for one chord: root lowest, extensions added, colour
/// pass applied, everything inside the tessitura.
pub fn voice_chord(
    chord: &Chord,
    config: &EngineConfig,
    scale: &ScaleInstance,
    options: &AdvancedHarmonyOptions,
    rng: &mut ComposerRng,
    color_rng: &mut ComposerRng,
) -> Vec<u8> {
    let (low, high) = config.tessitura();
    let lowest_root = low as u16 + interval::relative_pc(chord.root_pc, low) as u16;
    // A range narrower than an octave may hold no root at all; voice from
    // the octave below and keep whatever chord tones fall inside.
    let root = if lowest_root <= high as u16 {
        lowest_root as u8
    } else {
        lowest_root.saturating_sub(12) as u8
    };
    let mut pitches = apply_extensions(&chord.pitches(root), root, scale, options, rng);
    if let Some(color) = config.chord_color {
        pitches = color_chord(&pitches, color, scale, high, color_rng);
    }
    pitches.retain(|&p| p >= low && p <= high);
    if pitches.is_empty() {
        pitches.push(fit_pitch(scale, root as i32, low, high));
    }
    pitches
}

/// Lay voiced pitches out over a slot.
fn render_slot(
    pitches: &[u8],
    style: VoicingStyle,
    start: f64,
    length: f64,
    velocity: u8,
    first: bool,
    last: bool,
) -> Vec<Note> {
    let block = |s: f64, l: f64| -> Vec<Note> {
        pitches.iter().map(|&p| Note::new(p, velocity, s, l)).collect()
    };
    match style {
        VoicingStyle::Block => block(start, length),
        VoicingStyle::HalfNotes => {
            let half = length / 2.0;
            let mut notes = block(start, half);
            notes.extend(block(start + half, half));
            notes
        }
        VoicingStyle::ArpeggioUp | VoicingStyle::ArpeggioDown => {
            let mut order = pitches.to_vec();
            if style == VoicingStyle::ArpeggioDown {
                order.reverse();
            }
            let unit = length / order.len().max(1) as f64;
            order
                .iter()
                .enumerate()
                .map(|(i, &p)| Note::new(p, velocity, start + i as f64 * unit, unit))
                .collect()
        }
        VoicingStyle::Alberti => {
            if pitches.is_empty() {
                return Vec::new();
            }
            let (lo, mid, hi) = (
                pitches[0],
                pitches[pitches.len() / 2],
                pitches[pitches.len() - 1],
            );
            let figure = [lo, hi, mid, hi];
            let units = ((length / ALBERTI_UNIT_BEATS).floor() as usize).max(1);
            let unit = length / units as f64;
            (0..units)
                .map(|i| Note::new(figure[i % 4], velocity, start + i as f64 * unit, unit))
                .collect()
        }
        VoicingStyle::Anticipated => {
            let shift = ANTICIPATION_BEATS.min(length / 4.0);
            let s = if first { start } else { start - shift };
            let e = if last { start + length } else { start + length - shift };
            block(s, e - s)
        }
    }
}

/// Render a progression to notes (not humanized).
pub fn render_progression(
    progression: &[ChordSlot],
    config: &EngineConfig,
    options: &AdvancedHarmonyOptions,
    rng: &mut ComposerRng,
) -> Vec<Note> {
    let config = config.sanitized();
    let scale = config.scale_instance();
    let velocity = (config.base_velocity as i32 + CHORD_VELOCITY_OFFSET).clamp(1, 127) as u8;
    let mut color_rng = ComposerRng::salted(config.seed, CHORD_COLOR_SALT);
    let mut notes = Vec::new();
    for (i, slot) in progression.iter().enumerate() {
        let pitches = voice_chord(&slot.chord, &config, &scale, options, rng, &mut color_rng);
        notes.extend(render_slot(
            &pitches,
            config.voicing,
            slot.start_beats,
            slot.length_beats,
            velocity,
            i == 0,
            i + 1 == progression.len(),
        ));
    }
    if let Some(pattern) = config.revoice {
        notes = revoice(&notes, pattern);
    }
    let total = config.total_beats();
    notes.retain_mut(|n| n.clip_end(total));
    sort_notes(&mut notes);
    notes
}

/// Progression plus rendered notes. Not humanized; see
/// `engine::generate_chord_track`.
pub fn build_chord_track(
    config: &EngineConfig,
    options: &AdvancedHarmonyOptions,
    rng: &mut ComposerRng,
) -> (Vec<ChordSlot>, Vec<Note>) {
    let progression = generate_progression(config, options, rng);
    let notes = render_progression(&progression, config, options, rng);
    log::debug!(
        "chords: {} slots, {} notes, {} coloured",
        progression.len(),
        notes.len(),
        progression.iter().filter(|s| s.chord.color.is_some()).count()
    );
    (progression, notes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::onset_groups;

    fn config() -> EngineConfig {
        EngineConfig {
            rest_density: 0.0,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_progression_anchors() {
        let config = EngineConfig {
            bars: 4,
            chords_per_bar: 2,
            ..config()
        };
        let prog = generate_progression(&config, &AdvancedHarmonyOptions::default(), &mut ComposerRng::new(1));
        assert_eq!(prog.len(), 8);
        assert_eq!(prog[0].chord.degree, Some(0));
        assert_eq!(prog[6].chord.degree, Some(4));
        assert_eq!(prog[7].chord.degree, Some(0));
        for (i, slot) in prog.iter().enumerate() {
            assert_eq!(slot.start_beats, i as f64 * 2.0);
            assert_eq!(slot.length_beats, 2.0);
        }
    }

    #[test]
    fn test_single_and_double_slot_progressions() {
        for bars in [1, 2] {
            let config = EngineConfig { bars, ..config() };
            let prog = generate_progression(&config, &AdvancedHarmonyOptions::default(), &mut ComposerRng::new(1));
            assert_eq!(prog.len(), bars as usize);
            assert_eq!(prog[0].chord.degree, Some(0));
        }
    }

    #[test]
    fn test_block_track_root_is_lowest_and_in_range() {
        let config = config();
        let (prog, notes) = build_chord_track(&config, &AdvancedHarmonyOptions::all(0.7), &mut ComposerRng::new(4));
        let groups = onset_groups(&notes);
        assert_eq!(groups.len(), prog.len());
        for (group, slot) in groups.iter().zip(&prog) {
            let lowest = notes[group[0]].pitch;
            assert_eq!(lowest % 12, slot.chord.root_pc);
            for &i in group {
                assert!(notes[i].pitch >= config.tessitura_low && notes[i].pitch <= config.tessitura_high);
            }
        }
    }

    #[test]
    fn test_narrow_tessitura_keeps_fitting_tones() {
        for (low, high) in [(64, 66), (60, 67), (70, 70)] {
            let mut config = config();
            config.set_tessitura(low, high);
            let (prog, notes) = build_chord_track(&config, &AdvancedHarmonyOptions::all(0.7), &mut ComposerRng::new(4));
            assert_eq!(onset_groups(&notes).len(), prog.len(), "{low}-{high}");
            for n in &notes {
                assert!(n.pitch >= low && n.pitch <= high, "{} outside {low}-{high}", n.pitch);
            }
        }
    }

    #[test]
    fn test_voicing_styles_stay_inside_passage() {
        let styles = [
            VoicingStyle::Block,
            VoicingStyle::HalfNotes,
            VoicingStyle::ArpeggioUp,
            VoicingStyle::ArpeggioDown,
            VoicingStyle::Alberti,
            VoicingStyle::Anticipated,
        ];
        for voicing in styles {
            let config = EngineConfig { voicing, ..config() };
            let (_, notes) = build_chord_track(&config, &AdvancedHarmonyOptions::default(), &mut ComposerRng::new(2));
            assert!(!notes.is_empty(), "{voicing:?}");
            for n in &notes {
                assert!(n.start_beats >= 0.0);
                assert!(n.end_beats() <= config.total_beats() + 1e-9, "{voicing:?}");
            }
        }
    }

    #[test]
    fn test_alberti_figure() {
        let notes = render_slot(&[60, 64, 67], VoicingStyle::Alberti, 0.0, 2.0, 80, true, true);
        let pitches: Vec<u8> = notes.iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![60, 67, 64, 67]);
    }

    #[test]
    fn test_non_heptatonic_progression() {
        let config = EngineConfig {
            scale: "Minor Pentatonic".into(),
            bars: 8,
            ..config()
        };
        let scale = config.scale_instance();
        let prog = generate_progression(&config, &AdvancedHarmonyOptions::default(), &mut ComposerRng::new(8));
        for slot in &prog {
            assert!(scale.contains(slot.chord.root_pc + 60));
        }
    }
}
