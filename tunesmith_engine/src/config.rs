// Engine configuration.
//
// `EngineConfig` is a plain value: every generation function reads one by
// reference and never mutates it. It loads from JSON (`from_json`, `load`)
// with `#[serde(default)]` on every struct, so a config file only needs the
// fields it wants to change.
//
// Invalid values are never an error. `sanitized()` clamps every numeric
// field into range and the setters clamp at assignment:
// - bars 1..=128, meter numerator 1..=32
// - meter denominator snapped to the nearest power of two in 1..=32
// - key 0..=127, densities and amounts 0..=1
// - tessitura bounds ordered and inside 0..=127; narrow ranges are kept
// Unknown scale names resolve to Major when the scale is instantiated, and
// the `from_name` parsers for the style enums fall back to their defaults.
//
// The option enums consumed by the generators (contour, voicing, engine
// mode, harmony stack, chord color, re-voicing) live here too so that a
// config file names them directly.
//
// See also: `engine.rs` for the session wrapper that owns a config plus the
// random stream, and `harmony.rs` for `AdvancedHarmonyOptions`, which is
// kept out of this struct.

use crate::error::ConfigError;
use crate::rhythm::PolyrhythmMode;
use crate::scale::{ScaleInstance, scale_by_name};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::Path;

// ---------------------------------------------------------------------------
// Style enums
// ---------------------------------------------------------------------------

/// Overall melodic shape across the passage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContourShape {
    Ascending,
    Descending,
    #[default]
    Arch,
    InvertedArch,
    Wave,
    Static,
    /// Rising plateaus: climb, hold, climb, hold.
    Terraced,
}

impl ContourShape {
    /// Directional bias at `progress` (0 = start, 1 = end of passage), in
    /// [-1, 1]. Positive favours upward moves.
    pub fn bias(self, progress: f64) -> f64 {
        let p = progress.clamp(0.0, 1.0);
        match self {
            ContourShape::Ascending => 0.8,
            ContourShape::Descending => -0.8,
            ContourShape::Arch => (PI * p).cos(),
            ContourShape::InvertedArch => -(PI * p).cos(),
            ContourShape::Wave => (4.0 * PI * p).cos(),
            ContourShape::Static => 0.0,
            ContourShape::Terraced => {
                if (p * 4.0).floor() as u32 & 1 == 0 {
                    0.8
                } else {
                    0.0
                }
            }
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "ascending" => ContourShape::Ascending,
            "descending" => ContourShape::Descending,
            "inverted-arch" | "invertedarch" => ContourShape::InvertedArch,
            "wave" => ContourShape::Wave,
            "static" => ContourShape::Static,
            "terraced" => ContourShape::Terraced,
            _ => ContourShape::Arch,
        }
    }
}

/// How each chord is laid out in time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoicingStyle {
    /// All tones together for the whole slot.
    #[default]
    Block,
    /// Block chord restruck every half of the slot.
    HalfNotes,
    ArpeggioUp,
    ArpeggioDown,
    /// Low-high-middle-high broken chord.
    Alberti,
    /// Block chord struck an eighth early, tied over the slot start.
    Anticipated,
}

impl VoicingStyle {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "half-notes" | "halfnotes" => VoicingStyle::HalfNotes,
            "arpeggio-up" | "arpeggioup" => VoicingStyle::ArpeggioUp,
            "arpeggio-down" | "arpeggiodown" => VoicingStyle::ArpeggioDown,
            "alberti" => VoicingStyle::Alberti,
            "anticipated" => VoicingStyle::Anticipated,
            _ => VoicingStyle::Block,
        }
    }
}

/// Which generator a plain `generate` call runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineMode {
    #[default]
    Chords,
    Melody,
    Mixture,
}

impl EngineMode {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "melody" => EngineMode::Melody,
            "mixture" => EngineMode::Mixture,
            _ => EngineMode::Chords,
        }
    }
}

/// Interval of the parallel harmony voice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarmonyStackMode {
    #[default]
    Off,
    /// Two scale steps up.
    Third,
    /// Five scale steps up.
    Sixth,
    /// Seven semitones up.
    OpenFifth,
    /// One octave down.
    Spread,
}

impl HarmonyStackMode {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "third" => HarmonyStackMode::Third,
            "sixth" => HarmonyStackMode::Sixth,
            "open-fifth" | "openfifth" | "fifth" => HarmonyStackMode::OpenFifth,
            "spread" => HarmonyStackMode::Spread,
            _ => HarmonyStackMode::Off,
        }
    }
}

/// Post-hoc tension level for a chord track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChordColor {
    /// Strip extensions back to the triad.
    Light,
    /// Triad plus seventh.
    Moderate,
    /// Seventh and ninth, altered ninth on dominants.
    Aggressive,
}

impl ChordColor {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "light" => Some(ChordColor::Light),
            "moderate" => Some(ChordColor::Moderate),
            "aggressive" => Some(ChordColor::Aggressive),
            _ => None,
        }
    }
}

/// Strum and pattern shapes for rhythmic re-voicing of chords.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevoicePattern {
    StrumUp,
    StrumDown,
    /// Outer voices sustain, inner voices restrike on the half.
    InnerVoiceLead,
    /// Tones enter one by one across the first part of the chord.
    SpreadRollIn,
    /// Small deterministic per-voice delays.
    MicroSwing,
}

impl RevoicePattern {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "strum-up" | "strumup" => Some(RevoicePattern::StrumUp),
            "strum-down" | "strumdown" => Some(RevoicePattern::StrumDown),
            "inner-voice-lead" | "innervoicelead" => Some(RevoicePattern::InnerVoiceLead),
            "spread-roll-in" | "spreadrollin" => Some(RevoicePattern::SpreadRollIn),
            "micro-swing" | "microswing" => Some(RevoicePattern::MicroSwing),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Humanize settings
// ---------------------------------------------------------------------------

/// Amounts (0-1) for the four humanize stages.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HumanizeSettings {
    pub timing: f64,
    pub velocity: f64,
    pub swing: f64,
    pub feel: f64,
}

impl HumanizeSettings {
    /// All amounts zero: the humanizer returns its input unchanged.
    pub const OFF: HumanizeSettings = HumanizeSettings {
        timing: 0.0,
        velocity: 0.0,
        swing: 0.0,
        feel: 0.0,
    };

    pub fn is_off(&self) -> bool {
        self.timing == 0.0 && self.velocity == 0.0 && self.swing == 0.0 && self.feel == 0.0
    }

    fn sanitized(self) -> Self {
        HumanizeSettings {
            timing: unit(self.timing),
            velocity: unit(self.velocity),
            swing: unit(self.swing),
            feel: unit(self.feel),
        }
    }
}

impl Default for HumanizeSettings {
    fn default() -> Self {
        HumanizeSettings {
            timing: 0.15,
            velocity: 0.25,
            swing: 0.0,
            feel: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Everything a generation call reads, apart from the random stream and the
/// harmony options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Key root as an absolute MIDI pitch; only its pitch class matters for
    /// scale membership.
    pub key: u8,
    /// Scale name from the catalog. Unknown names mean Major.
    pub scale: String,
    pub numerator: u8,
    pub denominator: u8,
    pub bars: u32,
    /// Probability of turning a sounding rhythm step into a rest.
    pub rest_density: f64,
    /// Probability of articulating a sounding step instead of tying it to the
    /// previous note.
    pub note_density: f64,
    pub tessitura_low: u8,
    pub tessitura_high: u8,
    pub contour: ContourShape,
    pub voicing: VoicingStyle,
    /// Harmonic rhythm: chords per bar (1-4).
    pub chords_per_bar: u8,
    pub polyrhythm: PolyrhythmMode,
    /// Per-bar probability of using the warped pattern.
    pub polyrhythm_amount: f64,
    pub humanize: HumanizeSettings,
    pub mode: EngineMode,
    pub seed: u64,
    /// Probability that a melody note receives an ornament.
    pub ornament_probability: f64,
    pub harmony_stack: HarmonyStackMode,
    /// Fraction of melody notes the counter-melody answers.
    pub counter_density: f64,
    /// Applied to the chord track on the next generation call.
    pub chord_color: Option<ChordColor>,
    /// Applied to the chord track on the next generation call.
    pub revoice: Option<RevoicePattern>,
    /// Default for mixture generation: drop melody notes that collide with
    /// retained chord tones.
    pub avoid_overlaps: bool,
    /// Mixture chord tones are shortened to stabs of at most this many beats.
    /// Zero keeps them at full slot length.
    pub mixture_chord_beats: f64,
    pub base_velocity: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            key: 60,
            scale: "Major".to_string(),
            numerator: 4,
            denominator: 4,
            bars: 4,
            rest_density: 0.1,
            note_density: 0.8,
            tessitura_low: 60,
            tessitura_high: 84,
            contour: ContourShape::default(),
            voicing: VoicingStyle::default(),
            chords_per_bar: 1,
            polyrhythm: PolyrhythmMode::Off,
            polyrhythm_amount: 0.0,
            humanize: HumanizeSettings::default(),
            mode: EngineMode::default(),
            seed: 1,
            ornament_probability: 0.08,
            harmony_stack: HarmonyStackMode::Off,
            counter_density: 0.5,
            chord_color: None,
            revoice: None,
            avoid_overlaps: true,
            mixture_chord_beats: 1.0,
            base_velocity: 84,
        }
    }
}

fn unit(x: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

/// Nearest power of two in 1..=32. Ties resolve to the smaller value.
fn snap_denominator(d: u8) -> u8 {
    const POWERS: [u8; 6] = [1, 2, 4, 8, 16, 32];
    let mut best = POWERS[0];
    for p in POWERS {
        if d.abs_diff(p) < d.abs_diff(best) {
            best = p;
        }
    }
    best
}

/// Negative or non-finite stab lengths mean full length.
fn stab_length(beats: f64) -> f64 {
    if beats.is_finite() { beats.max(0.0) } else { 0.0 }
}

/// Order the bounds and clamp both into MIDI range. Narrow ranges, even a
/// single pitch, are kept as given.
fn sanitize_tessitura(low: u8, high: u8) -> (u8, u8) {
    let (low, high) = (low.min(127), high.min(127));
    (low.min(high), low.max(high))
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON config and clamp it into range.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// A copy with every field clamped into its valid range.
    pub fn sanitized(&self) -> Self {
        let mut c = self.clone();
        c.key = c.key.min(127);
        c.numerator = c.numerator.clamp(1, 32);
        c.denominator = snap_denominator(c.denominator);
        c.bars = c.bars.clamp(1, 128);
        c.rest_density = unit(c.rest_density);
        c.note_density = unit(c.note_density);
        (c.tessitura_low, c.tessitura_high) = sanitize_tessitura(c.tessitura_low, c.tessitura_high);
        c.chords_per_bar = c.chords_per_bar.clamp(1, 4);
        c.polyrhythm_amount = unit(c.polyrhythm_amount);
        c.humanize = c.humanize.sanitized();
        c.ornament_probability = unit(c.ornament_probability);
        c.counter_density = unit(c.counter_density);
        c.mixture_chord_beats = stab_length(c.mixture_chord_beats);
        c.base_velocity = c.base_velocity.clamp(1, 127);
        c
    }

    // -- Clamping setters --------------------------------------------------

    pub fn set_key(&mut self, key: u8) {
        self.key = key.min(127);
    }

    /// Any name is accepted; unknown names generate in Major.
    pub fn set_scale(&mut self, name: &str) {
        self.scale = name.to_string();
    }

    pub fn set_meter(&mut self, numerator: u8, denominator: u8) {
        self.numerator = numerator.clamp(1, 32);
        self.denominator = snap_denominator(denominator);
    }

    pub fn set_bars(&mut self, bars: u32) {
        self.bars = bars.clamp(1, 128);
    }

    pub fn set_rest_density(&mut self, density: f64) {
        self.rest_density = unit(density);
    }

    pub fn set_note_density(&mut self, density: f64) {
        self.note_density = unit(density);
    }

    pub fn set_tessitura(&mut self, low: u8, high: u8) {
        (self.tessitura_low, self.tessitura_high) = sanitize_tessitura(low, high);
    }

    pub fn set_polyrhythm(&mut self, mode: PolyrhythmMode, amount: f64) {
        self.polyrhythm = mode;
        self.polyrhythm_amount = unit(amount);
    }

    pub fn set_humanize(&mut self, settings: HumanizeSettings) {
        self.humanize = settings.sanitized();
    }

    pub fn set_chords_per_bar(&mut self, chords: u8) {
        self.chords_per_bar = chords.clamp(1, 4);
    }

    pub fn set_ornament_probability(&mut self, p: f64) {
        self.ornament_probability = unit(p);
    }

    pub fn set_counter_density(&mut self, density: f64) {
        self.counter_density = unit(density);
    }

    pub fn set_mixture_chord_beats(&mut self, beats: f64) {
        self.mixture_chord_beats = stab_length(beats);
    }

    // -- Derived values ----------------------------------------------------

    /// Beats per bar (one beat = one denominator unit).
    pub fn beats_per_bar(&self) -> f64 {
        self.numerator.max(1) as f64
    }

    /// Passage length in beats: bars × numerator.
    pub fn total_beats(&self) -> f64 {
        self.bars.max(1) as f64 * self.beats_per_bar()
    }

    pub fn scale_instance(&self) -> ScaleInstance {
        ScaleInstance::new(scale_by_name(&self.scale), self.key)
    }

    pub fn tessitura(&self) -> (u8, u8) {
        (self.tessitura_low, self.tessitura_high)
    }
}
