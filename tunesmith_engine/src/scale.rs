// Scale catalog and key-relative scale operations.
//
// The catalog is static data: each scale is a name plus an ascending set of
// semitone offsets in [0, 12). Lookups never fail: an unknown name resolves
// to Major and an out-of-range index is clamped to the last entry.
//
// `ScaleInstance` binds a scale to a key (pitch class of the tonic) and
// provides what the generators need:
// - membership tests and snapping a pitch to the nearest scale member
// - transposition by scale steps (used by melodic movements, harmony stacks,
//   counter-melody motion)
// - diatonic chord construction by stacking scale thirds
//
// Used by melody.rs, chords.rs, harmony.rs and postprocess.rs.

use crate::note::{MIDI_MAX, interval};

/// A named scale: ordered semitone offsets from the tonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scale {
    pub name: &'static str,
    pub intervals: &'static [u8],
}

/// The built-in catalog. Index 0 is Major, the fallback for unknown names.
pub static SCALES: &[Scale] = &[
    Scale { name: "Major", intervals: &[0, 2, 4, 5, 7, 9, 11] },
    Scale { name: "Natural Minor", intervals: &[0, 2, 3, 5, 7, 8, 10] },
    Scale { name: "Harmonic Minor", intervals: &[0, 2, 3, 5, 7, 8, 11] },
    Scale { name: "Melodic Minor", intervals: &[0, 2, 3, 5, 7, 9, 11] },
    Scale { name: "Dorian", intervals: &[0, 2, 3, 5, 7, 9, 10] },
    Scale { name: "Phrygian", intervals: &[0, 1, 3, 5, 7, 8, 10] },
    Scale { name: "Lydian", intervals: &[0, 2, 4, 6, 7, 9, 11] },
    Scale { name: "Mixolydian", intervals: &[0, 2, 4, 5, 7, 9, 10] },
    Scale { name: "Locrian", intervals: &[0, 1, 3, 5, 6, 8, 10] },
    Scale { name: "Phrygian Dominant", intervals: &[0, 1, 4, 5, 7, 8, 10] },
    Scale { name: "Hungarian Minor", intervals: &[0, 2, 3, 6, 7, 8, 11] },
    Scale { name: "Major Pentatonic", intervals: &[0, 2, 4, 7, 9] },
    Scale { name: "Minor Pentatonic", intervals: &[0, 3, 5, 7, 10] },
    Scale { name: "Blues", intervals: &[0, 3, 5, 6, 7, 10] },
    Scale { name: "Whole Tone", intervals: &[0, 2, 4, 6, 8, 10] },
];

/// Look up a scale by exact name. Unknown names fall back to Major.
pub fn scale_by_name(name: &str) -> &'static Scale {
    SCALES.iter().find(|s| s.name == name).unwrap_or(&SCALES[0])
}

/// Look up a scale by catalog index, clamped to the valid range.
pub fn scale_by_index(index: usize) -> &'static Scale {
    &SCALES[index.min(SCALES.len() - 1)]
}

impl Scale {
    /// Number of distinct degrees per octave.
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// True if the scale's third degree is a minor third above the tonic.
    pub fn is_minor(&self) -> bool {
        self.intervals.contains(&3) && !self.intervals.contains(&4)
    }
}

/// A scale rooted on a specific key.
#[derive(Debug, Clone, Copy)]
pub struct ScaleInstance {
    pub scale: &'static Scale,
    /// Pitch class of the tonic (0 = C).
    pub tonic_pc: u8,
}

impl ScaleInstance {
    pub fn new(scale: &'static Scale, key: u8) -> Self {
        ScaleInstance {
            scale,
            tonic_pc: key % 12,
        }
    }

    /// Check if a MIDI pitch belongs to the scale.
    pub fn contains(&self, pitch: u8) -> bool {
        let pc = interval::relative_pc(pitch, self.tonic_pc);
        self.scale.intervals.contains(&pc)
    }

    /// Scale degree (0-based) of a pitch, or None if it is not a member.
    pub fn degree_of(&self, pitch: u8) -> Option<usize> {
        let pc = interval::relative_pc(pitch, self.tonic_pc);
        self.scale.intervals.iter().position(|&iv| iv == pc)
    }

    /// Snap a pitch to the nearest scale member. Ties resolve downward.
    pub fn snap(&self, pitch: u8) -> u8 {
        if self.contains(pitch) {
            return pitch;
        }
        for offset in 1u8..=6 {
            if pitch >= offset && self.contains(pitch - offset) {
                return pitch - offset;
            }
            if pitch as u16 + offset as u16 <= MIDI_MAX as u16 && self.contains(pitch + offset) {
                return pitch + offset;
            }
        }
        pitch
    }

    /// Absolute pitch of a (possibly negative or multi-octave) degree index
    /// counted from `tonic_pitch`.
    fn pitch_of_index(&self, tonic_pitch: i32, index: i32) -> i32 {
        let n = self.scale.len() as i32;
        let octave = index.div_euclid(n);
        let degree = index.rem_euclid(n) as usize;
        tonic_pitch + octave * 12 + self.scale.intervals[degree] as i32
    }

    /// Degree index of a pitch relative to the tonic at or below it, after
    /// snapping to the scale. Returns (tonic pitch, index within octave).
    fn locate(&self, pitch: u8) -> (i32, i32) {
        let snapped = self.snap(pitch);
        let rel = interval::relative_pc(snapped, self.tonic_pc) as i32;
        let tonic_pitch = snapped as i32 - rel;
        let index = self.degree_of(snapped).unwrap_or(0) as i32;
        (tonic_pitch, index)
    }

    /// Move a pitch by `steps` scale degrees (negative = down).
    ///
    /// The input is snapped to the scale first. The result may leave MIDI
    /// range; callers fold or clamp it.
    pub fn step(&self, pitch: u8, steps: i32) -> i32 {
        let (tonic_pitch, index) = self.locate(pitch);
        self.pitch_of_index(tonic_pitch, index + steps)
    }

    /// Pitch of scale degree `degree` in the octave whose tonic is at or
    /// below `reference`.
    pub fn degree_pitch(&self, degree: usize, reference: u8) -> i32 {
        let rel = interval::relative_pc(reference, self.tonic_pc) as i32;
        let tonic_pitch = reference as i32 - rel;
        self.pitch_of_index(tonic_pitch, degree as i32)
    }

    /// Semitone offsets (above the chord root) of the chord built on
    /// `degree` by stacking `voices` scale thirds.
    ///
    /// For heptatonic scales this yields the diatonic triad/seventh. For
    /// other scales "thirds" are every second scale member, which still
    /// keeps every chord tone inside the scale.
    pub fn stacked_thirds(&self, degree: usize, voices: usize) -> Vec<u8> {
        let n = self.scale.len() as i32;
        let degree = degree % self.scale.len();
        let base = self.scale.intervals[degree] as i32;
        (0..voices as i32)
            .map(|k| {
                let idx = degree as i32 + 2 * k;
                let octave = idx.div_euclid(n);
                let iv = self.scale.intervals[idx.rem_euclid(n) as usize] as i32 + octave * 12;
                (iv - base) as u8
            })
            .collect()
    }

    /// Pitch class of the root of scale degree `degree`.
    pub fn degree_pc(&self, degree: usize) -> u8 {
        (self.tonic_pc + self.scale.intervals[degree % self.scale.len()]) % 12
    }
}
