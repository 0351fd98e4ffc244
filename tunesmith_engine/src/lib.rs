// Tunesmith Generation Engine
//
// A procedural composition core for an instrument plugin. Given a key,
// scale, meter, bar count and a set of style and harmony parameters it
// produces timed, pitched note events: a melody, a chord track, or a
// mixture of both, plus derived layers (counter-melody, harmony stack,
// rhythmic re-voicing). Rendering and host integration live elsewhere; the
// engine only hands back note lists.
//
// Architecture:
// - note.rs: Note events, overlap and interval helpers, pitch names
// - scale.rs: Scale catalog, key-bound scale instances, snapping and scale steps
// - movement.rs: Weighted melodic movements + cumulative weighted tables
// - rhythm.rs: Rhythm templates per meter family, polyrhythm warping
// - harmony.rs: Chords, extensions and color-family substitutions under
//   host-owned `AdvancedHarmonyOptions`
// - config.rs: `EngineConfig` value type, clamping, JSON loading
// - melody.rs: Contour-shaped melodic walk with ornaments
// - chords.rs: Root-motion progressions and voicing styles
// - postprocess.rs: Counter-melody, harmony stack, chord color, re-voicing
// - humanize.rs: Timing, swing, feel and velocity humanization
// - engine.rs: Generation entry points, mixture, re-harmonization, `Engine` session
// - midi.rs: Standard MIDI File export
// - error.rs: Errors for config loading and MIDI export
//
// Generation is deterministic given a seed: the random stream
// (`tunesmith_prng::ComposerRng`) is passed explicitly into every call.

pub mod chords;
pub mod config;
pub mod engine;
pub mod error;
pub mod harmony;
pub mod humanize;
pub mod melody;
pub mod midi;
pub mod movement;
pub mod note;
pub mod postprocess;
pub mod rhythm;
pub mod scale;
