// Generation orchestration.
//
// The pure entry points take the configuration, the rhythm catalog and the
// harmony options by reference and the random stream by `&mut`:
//
//   configure -> select rhythm -> walk melody | build progression
//             -> harmony rules (chords only) -> humanize -> clamp and return
//
// - `generate_melody`: melodic walk, then humanize.
// - `generate_chord_track`: progression, voicing, colour and re-voicing
//   passes, then humanize.
// - `generate_melody_and_chords`: the mixture. The melody follows the
//   generated progression; the chord track is thinned to 1-2 tones per
//   onset group and shortened to `mixture_chord_beats` stabs; both are
//   humanized; with `avoid_overlaps` any melody note touching a retained
//   chord tone is dropped. The overlap filter runs last so it holds on returned notes.
// - `reharmonize`: keep the first half of a caller-held chord track and
//   splice in the second half of a fresh one, split on a slot boundary.
//
// `Engine` is a thin session wrapper for hosts that want the classic
// "setters then generate" surface: it owns a config, the rhythm catalog and
// the seeded stream, and forwards to the pure functions. Harmony options
// are still passed per call and never stored.

use crate::chords::build_chord_track;
use crate::config::{EngineConfig, EngineMode};
use crate::harmony::{AdvancedHarmonyOptions, ChordSlot};
use crate::humanize::humanize;
use crate::melody::walk_melody;
use crate::note::{Note, onset_groups, sort_notes};
use crate::postprocess::{make_counter_melody, make_harmony_stack};
use crate::rhythm::RhythmPatternDatabase;
use serde::{Deserialize, Serialize};
use tunesmith_prng::ComposerRng;

/// Result of a mixture generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MelodyAndChords {
    pub melody: Vec<Note>,
    pub chords: Vec<Note>,
    /// The progression the melody followed.
    pub progression: Vec<ChordSlot>,
}

/// Generate a humanized melody.
pub fn generate_melody(
    config: &EngineConfig,
    rhythms: &RhythmPatternDatabase,
    rng: &mut ComposerRng,
) -> Vec<Note> {
    let config = config.sanitized();
    let melody = walk_melody(&config, rhythms, None, rng);
    finish(&melody, &config, rng)
}

/// Generate a humanized chord track.
pub fn generate_chord_track(
    config: &EngineConfig,
    options: &AdvancedHarmonyOptions,
    rng: &mut ComposerRng,
) -> Vec<Note> {
    let config = config.sanitized();
    let (_, chords) = build_chord_track(&config, options, rng);
    finish(&chords, &config, rng)
}

/// Humanize and restore onset order.
fn finish(notes: &[Note], config: &EngineConfig, rng: &mut ComposerRng) -> Vec<Note> {
    let mut out = humanize(notes, &config.humanize, config.total_beats(), rng);
    sort_notes(&mut out);
    out
}

/// Keep one or two tones of every onset group, chosen uniformly without
/// replacement.
pub fn thin_chords(chords: &[Note], rng: &mut ComposerRng) -> Vec<Note> {
    let mut sorted = chords.to_vec();
    sort_notes(&mut sorted);
    let mut out = Vec::new();
    for group in onset_groups(&sorted) {
        if group.len() <= 1 {
            out.extend(group.iter().map(|&i| sorted[i]));
            continue;
        }
        let keep = rng.range_usize_inclusive(1, 2);
        for pick in rng.sample_indices(group.len(), keep) {
            out.push(sorted[group[pick]]);
        }
    }
    sort_notes(&mut out);
    out
}

/// Drop every melody note whose interval intersects a chord tone.
pub fn remove_overlaps(melody: &[Note], chords: &[Note]) -> Vec<Note> {
    melody
        .iter()
        .filter(|m| !chords.iter().any(|c| m.overlaps(c)))
        .copied()
        .collect()
}

/// Melody over a generated progression plus a thinned chord layer.
pub fn generate_melody_and_chords(
    config: &EngineConfig,
    rhythms: &RhythmPatternDatabase,
    options: &AdvancedHarmonyOptions,
    avoid_overlaps: bool,
    rng: &mut ComposerRng,
) -> MelodyAndChords {
    let config = config.sanitized();
    let (progression, chords) = build_chord_track(&config, options, rng);
    let melody = walk_melody(&config, rhythms, Some(&progression), rng);

    let mut chords = thin_chords(&chords, rng);
    if config.mixture_chord_beats > 0.0 {
        for note in &mut chords {
            note.length_beats = note.length_beats.min(config.mixture_chord_beats);
        }
    }
    let chords = finish(&chords, &config, rng);
    let mut melody = finish(&melody, &config, rng);
    if avoid_overlaps {
        let before = melody.len();
        melody = remove_overlaps(&melody, &chords);
        log::debug!("mixture: dropped {} overlapping melody notes", before - melody.len());
    }
    MelodyAndChords {
        melody,
        chords,
        progression,
    }
}

/// Run the generator selected by `config.mode`. Mixture returns melody and
/// chords merged into one list.
pub fn generate(
    config: &EngineConfig,
    rhythms: &RhythmPatternDatabase,
    options: &AdvancedHarmonyOptions,
    rng: &mut ComposerRng,
) -> Vec<Note> {
    match config.mode {
        EngineMode::Chords => generate_chord_track(config, options, rng),
        EngineMode::Melody => generate_melody(config, rhythms, rng),
        EngineMode::Mixture => {
            let both = generate_melody_and_chords(config, rhythms, options, config.avoid_overlaps, rng);
            let mut notes = both.melody;
            notes.extend(both.chords);
            sort_notes(&mut notes);
            notes
        }
    }
}

/// Keep the first half of `previous` and regenerate the second half.
///
/// The split falls on the first harmonic-rhythm slot starting at or after
/// the midpoint. Fresh notes are taken by slot, so an anticipated chord
/// whose onset leads the split is kept whole; `previous` is cut at the
/// earliest fresh onset, which drops its own stub of that anticipation.
/// A passage with no slot boundary past the midpoint is returned unchanged.
pub fn reharmonize(
    previous: &[Note],
    config: &EngineConfig,
    options: &AdvancedHarmonyOptions,
    rng: &mut ComposerRng,
) -> Vec<Note> {
    let config = config.sanitized();
    let total = config.total_beats();
    let midpoint = total / 2.0;
    let (progression, fresh) = build_chord_track(&config, options, rng);
    let split = progression
        .iter()
        .map(|slot| slot.start_beats)
        .find(|&start| start >= midpoint - 1e-9)
        .unwrap_or(total);

    // Notes of earlier slots end by the split; later slots' notes reach past it.
    let second_half: Vec<Note> = fresh
        .into_iter()
        .filter(|n| n.end_beats() > split + 1e-9)
        .collect();
    let cut = second_half
        .iter()
        .map(|n| n.start_beats)
        .fold(split, f64::min);

    let mut kept: Vec<Note> = previous
        .iter()
        .copied()
        .filter_map(|mut n| n.clip_end(cut).then_some(n))
        .collect();
    log::debug!(
        "reharmonize: split at beat {split}, kept {} old notes, {} new",
        kept.len(),
        second_half.len()
    );
    kept.extend(finish(&second_half, &config, rng));
    sort_notes(&mut kept);
    kept
}

/// An editing session: configuration, rhythm catalog and seeded stream.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    rhythms: RhythmPatternDatabase,
    rng: ComposerRng,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let config = config.sanitized();
        let rng = ComposerRng::new(config.seed);
        Engine {
            config,
            rhythms: RhythmPatternDatabase::default(),
            rng,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Mutable access for the clamping setters on `EngineConfig`.
    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    pub fn set_config(&mut self, config: EngineConfig) {
        self.config = config.sanitized();
    }

    pub fn set_rhythms(&mut self, rhythms: RhythmPatternDatabase) {
        self.rhythms = rhythms;
    }

    /// Restart the random stream. Replaying the same calls afterwards gives
    /// identical notes.
    pub fn reseed(&mut self, seed: u64) {
        self.config.seed = seed;
        self.rng = ComposerRng::new(seed);
    }

    pub fn generate_melody(&mut self) -> Vec<Note> {
        generate_melody(&self.config, &self.rhythms, &mut self.rng)
    }

    pub fn generate_chord_track(&mut self, options: &AdvancedHarmonyOptions) -> Vec<Note> {
        generate_chord_track(&self.config, options, &mut self.rng)
    }

    pub fn generate_melody_and_chords(
        &mut self,
        options: &AdvancedHarmonyOptions,
        avoid_overlaps: bool,
    ) -> MelodyAndChords {
        generate_melody_and_chords(&self.config, &self.rhythms, options, avoid_overlaps, &mut self.rng)
    }

    pub fn generate(&mut self, options: &AdvancedHarmonyOptions) -> Vec<Note> {
        generate(&self.config, &self.rhythms, options, &mut self.rng)
    }

    pub fn reharmonize(&mut self, previous: &[Note], options: &AdvancedHarmonyOptions) -> Vec<Note> {
        reharmonize(previous, &self.config, options, &mut self.rng)
    }

    pub fn make_counter_melody(&self, melody: &[Note]) -> Vec<Note> {
        make_counter_melody(melody, &self.config)
    }

    /// Harmony stack in the configured mode.
    pub fn make_harmony_stack(&self, melody: &[Note]) -> Vec<Note> {
        make_harmony_stack(melody, self.config.harmony_stack, &self.config.scale_instance())
    }
}
