// Harmony rule layer: chord extensions and color-family substitutions.
//
// Chords are pitch-class roots plus semitone offsets above the root. The
// progression generator (chords.rs) builds plain diatonic triads; this layer
// then decorates them under the host's `AdvancedHarmonyOptions`:
//
// - `apply_extensions`: adds 7th/9th/11th/13th tones, suspensions and
//   altered tensions to a voiced chord. Each addition is gated by the
//   extensions flag and a Bernoulli draw at the extensions density; upper
//   extensions only follow when the one below them was added.
// - `apply_color_families`: per progression slot, tries the color families
//   in fixed priority order (secondary dominant > borrowed > chromatic
//   mediant > Neapolitan > tritone substitution) and applies at most one.
//   Substitution replaces root and quality in place; slot timing never
//   changes. The first and last slots are cadence anchors and stay put.
//
// The options are a plain value owned by the host and passed by reference
// into each generation call; nothing here retains them.

use crate::scale::ScaleInstance;
use serde::{Deserialize, Serialize};
use tunesmith_prng::ComposerRng;

/// Enable flag plus probability density for one harmony rule.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarmonyRule {
    pub enabled: bool,
    /// Bernoulli probability (0-1) of applying the rule where eligible.
    pub density: f64,
}

impl HarmonyRule {
    pub fn new(enabled: bool, density: f64) -> Self {
        HarmonyRule {
            enabled,
            density: density.clamp(0.0, 1.0),
        }
    }

    /// Draw whether the rule fires. Disabled rules consume no randomness.
    pub fn fires(&self, rng: &mut ComposerRng) -> bool {
        self.fires_scaled(1.0, rng)
    }

    fn fires_scaled(&self, scale: f64, rng: &mut ComposerRng) -> bool {
        self.enabled && rng.random_bool(self.density.clamp(0.0, 1.0) * scale)
    }
}

/// Host-owned switches for the optional harmony rules.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedHarmonyOptions {
    pub extensions: HarmonyRule,
    pub secondary_dominants: HarmonyRule,
    pub borrowed_chords: HarmonyRule,
    pub chromatic_mediants: HarmonyRule,
    pub neapolitan: HarmonyRule,
    pub tritone_substitution: HarmonyRule,
}

impl AdvancedHarmonyOptions {
    /// Every rule enabled at the same density.
    pub fn all(density: f64) -> Self {
        let rule = HarmonyRule::new(true, density);
        AdvancedHarmonyOptions {
            extensions: rule,
            secondary_dominants: rule,
            borrowed_chords: rule,
            chromatic_mediants: rule,
            neapolitan: rule,
            tritone_substitution: rule,
        }
    }

    pub fn rule(&self, family: ColorFamily) -> &HarmonyRule {
        match family {
            ColorFamily::SecondaryDominant => &self.secondary_dominants,
            ColorFamily::Borrowed => &self.borrowed_chords,
            ColorFamily::ChromaticMediant => &self.chromatic_mediants,
            ColorFamily::Neapolitan => &self.neapolitan,
            ColorFamily::TritoneSubstitution => &self.tritone_substitution,
        }
    }
}

/// Harmonic substitution families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorFamily {
    SecondaryDominant,
    Borrowed,
    ChromaticMediant,
    Neapolitan,
    TritoneSubstitution,
}

impl ColorFamily {
    /// Tie-break order when several families are eligible on one slot.
    pub const PRIORITY: [ColorFamily; 5] = [
        ColorFamily::SecondaryDominant,
        ColorFamily::Borrowed,
        ColorFamily::ChromaticMediant,
        ColorFamily::Neapolitan,
        ColorFamily::TritoneSubstitution,
    ];
}

/// Triad quality, derived from a chord's intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChordQuality {
    Major,
    Minor,
    Diminished,
    Augmented,
    Suspended,
}

const MAJOR: &[u8] = &[0, 4, 7];
const MINOR: &[u8] = &[0, 3, 7];
const DIMINISHED: &[u8] = &[0, 3, 6];
const DOMINANT_SEVENTH: &[u8] = &[0, 4, 7, 10];

/// A chord: root pitch class plus ascending semitone offsets (first is 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chord {
    pub root_pc: u8,
    pub intervals: Vec<u8>,
    /// Scale degree of a diatonic chord; None once a color family replaced it.
    pub degree: Option<usize>,
    pub color: Option<ColorFamily>,
}

impl Chord {
    pub fn new(root_pc: u8, intervals: &[u8]) -> Self {
        Chord {
            root_pc: root_pc % 12,
            intervals: intervals.to_vec(),
            degree: None,
            color: None,
        }
    }

    /// The triad (or `voices`-note stack) of thirds on a scale degree.
    pub fn diatonic(scale: &ScaleInstance, degree: usize, voices: usize) -> Self {
        Chord {
            root_pc: scale.degree_pc(degree),
            intervals: scale.stacked_thirds(degree, voices),
            degree: Some(degree % scale.scale.len()),
            color: None,
        }
    }

    fn colored(root_pc: u8, intervals: &[u8], family: ColorFamily) -> Self {
        Chord {
            color: Some(family),
            ..Chord::new(root_pc, intervals)
        }
    }

    pub fn quality(&self) -> ChordQuality {
        let has = |iv: u8| self.intervals.contains(&iv);
        match (has(3), has(4), has(6), has(7), has(8)) {
            (_, true, _, _, true) if !has(7) => ChordQuality::Augmented,
            (_, true, _, _, _) => ChordQuality::Major,
            (true, _, true, false, _) => ChordQuality::Diminished,
            (true, _, _, _, _) => ChordQuality::Minor,
            _ => ChordQuality::Suspended,
        }
    }

    /// Major triad with a minor seventh.
    pub fn is_dominant_seventh(&self) -> bool {
        DOMINANT_SEVENTH.iter().all(|iv| self.intervals.contains(iv))
    }

    /// Absolute pitches of the chord with its root at `root_pitch`.
    pub fn pitches(&self, root_pitch: u8) -> Vec<u8> {
        self.intervals
            .iter()
            .map(|&iv| root_pitch as u16 + iv as u16)
            .filter(|&p| p <= 127)
            .map(|p| p as u8)
            .collect()
    }
}

/// A chord placed on the harmonic-rhythm grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordSlot {
    pub start_beats: f64,
    pub length_beats: f64,
    pub chord: Chord,
}

/// Add extension tones to a voiced chord.
///
/// `triad` holds absolute pitches with `chord_root` among them. Returns the
/// decorated pitches, ascending and de-duplicated. With extensions disabled
/// the input is returned unchanged and no randomness is consumed.
pub fn apply_extensions(
    triad: &[u8],
    chord_root: u8,
    scale: &ScaleInstance,
    options: &AdvancedHarmonyOptions,
    rng: &mut ComposerRng,
) -> Vec<u8> {
    let rule = &options.extensions;
    let mut notes: Vec<u16> = triad.iter().map(|&p| p as u16).collect();
    if !rule.enabled {
        return triad.to_vec();
    }
    let root = chord_root as u16;
    let third = notes
        .iter()
        .position(|&p| p > root && matches!((p - root) % 12, 3 | 4));
    let major_third = third.is_some_and(|i| (notes[i] - root) % 12 == 4);

    // Suspension replaces the third rather than stacking on it.
    if let Some(i) = third {
        if rule.fires_scaled(0.5, rng) {
            notes[i] = root + if rng.random_bool(0.5) { 2 } else { 5 };
        }
    }

    let seventh = match scale.degree_of(chord_root) {
        Some(degree) => match scale.stacked_thirds(degree, 4).get(3) {
            Some(&iv @ (10 | 11)) => iv as u16,
            _ => 10,
        },
        None => 10,
    };

    if rule.fires(rng) {
        notes.push(root + seventh);
        if rule.fires(rng) {
            notes.push(root + 14);
            if rule.fires(rng) {
                notes.push(root + 17);
                if rule.fires(rng) {
                    notes.push(root + 21);
                }
            }
        }
        // Altered tension on dominant-quality chords only.
        if major_third && seventh == 10 && rule.fires_scaled(0.3, rng) {
            let altered = root + if rng.random_bool(0.5) { 13 } else { 15 };
            notes.retain(|&p| p != root + 14);
            notes.push(altered);
        }
    }

    notes.sort_unstable();
    notes.dedup();
    notes
        .into_iter()
        .filter(|&p| p <= 127)
        .map(|p| p as u8)
        .collect()
}

/// Whether `family` may replace the chord in slot `index`, and with what.
fn color_substitute(
    family: ColorFamily,
    progression: &[ChordSlot],
    index: usize,
    scale: &ScaleInstance,
    rng: &mut ComposerRng,
) -> Option<Chord> {
    let chord = &progression[index].chord;
    let tonic = scale.tonic_pc;
    let heptatonic = scale.scale.len() == 7;
    match family {
        ColorFamily::SecondaryDominant => {
            let next = &progression.get(index + 1)?.chord;
            if next.degree == Some(0) || next.quality() == ChordQuality::Diminished {
                return None;
            }
            let root = (next.root_pc + 7) % 12;
            (root != chord.root_pc || !chord.is_dominant_seventh())
                .then(|| Chord::colored(root, DOMINANT_SEVENTH, family))
        }
        ColorFamily::Borrowed => {
            if !heptatonic {
                return None;
            }
            let degree = chord.degree?;
            let (offset, intervals) = if scale.scale.is_minor() {
                match degree {
                    1 => (2, MINOR),
                    3 => (5, MAJOR),
                    4 => (7, MAJOR),
                    _ => return None,
                }
            } else {
                match degree {
                    1 => (2, DIMINISHED),
                    2 => (3, MAJOR),
                    3 => (5, MINOR),
                    5 => (8, MAJOR),
                    6 => (10, MAJOR),
                    _ => return None,
                }
            };
            Some(Chord::colored((tonic + offset) % 12, intervals, family))
        }
        ColorFamily::ChromaticMediant => {
            chord.degree?;
            let shift = [3u8, 4, 8, 9][rng.range_usize(0, 4)];
            Some(Chord::colored((chord.root_pc + shift) % 12, MAJOR, family))
        }
        ColorFamily::Neapolitan => match chord.degree {
            Some(1) | Some(3) if heptatonic => {
                Some(Chord::colored((tonic + 1) % 12, MAJOR, family))
            }
            _ => None,
        },
        ColorFamily::TritoneSubstitution => {
            let dominant = chord.degree == Some(4) || chord.is_dominant_seventh();
            dominant.then(|| Chord::colored((chord.root_pc + 6) % 12, DOMINANT_SEVENTH, family))
        }
    }
}

/// Decorate a progression with color-family substitutions.
///
/// At most one family applies per slot: enabled, eligible families are
/// tried in `ColorFamily::PRIORITY` order and the first whose Bernoulli draw
/// succeeds wins. A failed draw falls through to the next family, so a
/// lower-priority family still gets its chance on slots where a higher one
/// was eligible but did not fire. The effective rate of a later family is
/// therefore its density times the miss rate of the families before it.
pub fn apply_color_families(
    progression: &[ChordSlot],
    scale: &ScaleInstance,
    options: &AdvancedHarmonyOptions,
    rng: &mut ComposerRng,
) -> Vec<ChordSlot> {
    let mut out = progression.to_vec();
    if out.len() < 3 {
        return out;
    }
    for index in 1..out.len() - 1 {
        for family in ColorFamily::PRIORITY {
            let rule = options.rule(family);
            if !rule.enabled {
                continue;
            }
            let Some(substitute) = color_substitute(family, &out, index, scale, rng) else {
                continue;
            };
            if rule.fires(rng) {
                log::trace!(
                    "slot {} at beat {}: {:?} -> root pc {}",
                    index,
                    out[index].start_beats,
                    family,
                    substitute.root_pc
                );
                out[index].chord = substitute;
                break;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::scale_by_name;

    fn c_major() -> ScaleInstance {
        ScaleInstance::new(scale_by_name("Major"), 60)
    }

    fn progression(scale: &ScaleInstance, degrees: &[usize]) -> Vec<ChordSlot> {
        degrees
            .iter()
            .enumerate()
            .map(|(i, &d)| ChordSlot {
                start_beats: i as f64 * 4.0,
                length_beats: 4.0,
                chord: Chord::diatonic(scale, d, 3),
            })
            .collect()
    }

    #[test]
    fn test_chord_quality() {
        let scale = c_major();
        assert_eq!(Chord::diatonic(&scale, 0, 3).quality(), ChordQuality::Major);
        assert_eq!(Chord::diatonic(&scale, 1, 3).quality(), ChordQuality::Minor);
        assert_eq!(Chord::diatonic(&scale, 6, 3).quality(), ChordQuality::Diminished);
        assert_eq!(Chord::new(0, &[0, 4, 8]).quality(), ChordQuality::Augmented);
        assert_eq!(Chord::new(0, &[0, 5, 7]).quality(), ChordQuality::Suspended);
        assert!(Chord::diatonic(&scale, 4, 4).is_dominant_seventh());
    }

    #[test]
    fn test_extensions_disabled_is_identity() {
        let scale = c_major();
        let mut rng = ComposerRng::new(1);
        let before = rng.clone();
        let out = apply_extensions(&[60, 64, 67], 60, &scale, &AdvancedHarmonyOptions::default(), &mut rng);
        assert_eq!(out, vec![60, 64, 67]);
        assert_eq!(rng, before, "disabled rules must not consume draws");
    }

    #[test]
    fn test_full_density_extensions_stack_diatonic_sevenths() {
        let scale = c_major();
        let mut options = AdvancedHarmonyOptions::default();
        options.extensions = HarmonyRule::new(true, 1.0);
        let mut rng = ComposerRng::new(2);
        // C major: the diatonic seventh on I is a major seventh.
        let out = apply_extensions(&[60, 64, 67], 60, &scale, &options, &mut rng);
        assert!(out.contains(&71), "maj7 expected in {out:?}");
        assert!(out.contains(&81), "13th expected in {out:?}");
        // D minor: minor seventh.
        let out = apply_extensions(&[62, 65, 69], 62, &scale, &options, &mut rng);
        assert!(out.contains(&72));
    }

    #[test]
    fn test_extensions_drop_pitches_above_midi_range() {
        let scale = c_major();
        let mut options = AdvancedHarmonyOptions::default();
        options.extensions = HarmonyRule::new(true, 1.0);
        let mut rng = ComposerRng::new(2);
        let out = apply_extensions(&[120, 124, 127], 120, &scale, &options, &mut rng);
        assert!(out.iter().all(|&p| p <= 127));
    }

    #[test]
    fn test_color_families_keep_timing_and_anchors() {
        let scale = c_major();
        let prog = progression(&scale, &[0, 5, 3, 4, 0]);
        let mut rng = ComposerRng::new(9);
        let out = apply_color_families(&prog, &scale, &AdvancedHarmonyOptions::all(1.0), &mut rng);
        assert_eq!(out.len(), prog.len());
        for (a, b) in prog.iter().zip(&out) {
            assert_eq!(a.start_beats, b.start_beats);
            assert_eq!(a.length_beats, b.length_beats);
        }
        assert_eq!(out[0], prog[0]);
        assert_eq!(out[4], prog[4]);
    }

    #[test]
    fn test_priority_picks_secondary_dominant_first() {
        let scale = c_major();
        // vi -> IV: the vi slot is eligible for secondary dominant and borrowed.
        let prog = progression(&scale, &[0, 5, 3, 0]);
        let mut options = AdvancedHarmonyOptions::default();
        options.secondary_dominants = HarmonyRule::new(true, 1.0);
        options.borrowed_chords = HarmonyRule::new(true, 1.0);
        let mut rng = ComposerRng::new(3);
        let out = apply_color_families(&prog, &scale, &options, &mut rng);
        // V7/IV = C7.
        assert_eq!(out[1].chord.color, Some(ColorFamily::SecondaryDominant));
        assert_eq!(out[1].chord.root_pc, 0);
        assert!(out[1].chord.is_dominant_seventh());
    }

    #[test]
    fn test_failed_draw_falls_through_to_next_family() {
        let scale = c_major();
        let prog = progression(&scale, &[0, 5, 3, 0]);
        let mut options = AdvancedHarmonyOptions::default();
        options.secondary_dominants = HarmonyRule::new(true, 0.0);
        options.borrowed_chords = HarmonyRule::new(true, 1.0);
        let mut rng = ComposerRng::new(3);
        let out = apply_color_families(&prog, &scale, &options, &mut rng);
        // vi is eligible for V7/IV but never fires; borrowed bVI takes it.
        assert_eq!(out[1].chord.color, Some(ColorFamily::Borrowed));
        assert_eq!(out[1].chord.root_pc, 8);
    }

    #[test]
    fn test_borrowed_iv_in_major() {
        let scale = c_major();
        let prog = progression(&scale, &[0, 3, 0]);
        let mut options = AdvancedHarmonyOptions::default();
        options.borrowed_chords = HarmonyRule::new(true, 1.0);
        let mut rng = ComposerRng::new(3);
        let out = apply_color_families(&prog, &scale, &options, &mut rng);
        assert_eq!(out[1].chord.root_pc, 5);
        assert_eq!(out[1].chord.quality(), ChordQuality::Minor);
    }

    #[test]
    fn test_neapolitan_and_tritone_substitution() {
        let scale = c_major();
        let prog = progression(&scale, &[0, 1, 4, 0]);
        let mut options = AdvancedHarmonyOptions::default();
        options.neapolitan = HarmonyRule::new(true, 1.0);
        options.tritone_substitution = HarmonyRule::new(true, 1.0);
        let mut rng = ComposerRng::new(3);
        let out = apply_color_families(&prog, &scale, &options, &mut rng);
        assert_eq!(out[1].chord.root_pc, 1, "Neapolitan Db on ii");
        assert_eq!(out[2].chord.root_pc, 1, "tritone sub Db7 for G");
        assert_eq!(out[2].chord.color, Some(ColorFamily::TritoneSubstitution));
    }

    #[test]
    fn test_zero_density_changes_nothing() {
        let scale = c_major();
        let prog = progression(&scale, &[0, 5, 1, 4, 0]);
        let mut rng = ComposerRng::new(3);
        let out = apply_color_families(&prog, &scale, &AdvancedHarmonyOptions::all(0.0), &mut rng);
        assert_eq!(out, prog);
    }
}
