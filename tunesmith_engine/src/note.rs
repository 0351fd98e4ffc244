// Note events: the engine's output currency.
//
// Every generation call and post-processing pass produces a `Vec<Note>`.
// Times are in beats, where one beat is one denominator unit of the time
// signature (a quarter in 4/4, an eighth in 6/8). Consumers (piano roll,
// MIDI exporter) convert beats to their own resolution.
//
// Also holds small pitch helpers shared by the generators: interval classes,
// octave folding into a range, and compact note names for debug output.

use serde::{Deserialize, Serialize};

/// Lowest and highest MIDI pitch.
pub const MIDI_MIN: u8 = 0;
pub const MIDI_MAX: u8 = 127;

/// Shortest length a note may be trimmed to by any pass.
pub const MIN_NOTE_BEATS: f64 = 1.0 / 64.0;

/// A single timed, pitched note event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// MIDI pitch (0-127).
    pub pitch: u8,
    /// MIDI velocity (1-127).
    pub velocity: u8,
    /// Onset in beats from the start of the passage.
    pub start_beats: f64,
    /// Duration in beats, always > 0.
    pub length_beats: f64,
    /// True for ornament notes (grace, trill, turn, mordent) inserted into
    /// a host note's span.
    pub is_ornament: bool,
}

impl Note {
    pub fn new(pitch: u8, velocity: u8, start_beats: f64, length_beats: f64) -> Self {
        Note {
            pitch: pitch.min(MIDI_MAX),
            velocity: velocity.clamp(1, 127),
            start_beats: start_beats.max(0.0),
            length_beats: length_beats.max(MIN_NOTE_BEATS),
            is_ornament: false,
        }
    }

    pub fn ornament(pitch: u8, velocity: u8, start_beats: f64, length_beats: f64) -> Self {
        Note {
            is_ornament: true,
            ..Note::new(pitch, velocity, start_beats, length_beats)
        }
    }

    pub fn end_beats(&self) -> f64 {
        self.start_beats + self.length_beats
    }

    /// Two notes overlap iff `start1 < end2 && start2 < end1`.
    pub fn overlaps(&self, other: &Note) -> bool {
        self.start_beats < other.end_beats() && other.start_beats < self.end_beats()
    }

    /// Trim the note so it ends no later than `limit`.
    ///
    /// Returns false if nothing audible would remain, in which case the
    /// caller should drop the note.
    pub fn clip_end(&mut self, limit: f64) -> bool {
        if self.start_beats >= limit - MIN_NOTE_BEATS * 0.5 {
            return false;
        }
        if self.end_beats() > limit {
            self.length_beats = limit - self.start_beats;
        }
        true
    }
}

/// Sort notes by onset, then by pitch. Stable for equal keys.
pub fn sort_notes(notes: &mut [Note]) {
    notes.sort_by(|a, b| {
        a.start_beats
            .total_cmp(&b.start_beats)
            .then(a.pitch.cmp(&b.pitch))
    });
}

/// Group note indices by identical onset, in onset order.
///
/// Expects `notes` already sorted with `sort_notes`.
pub fn onset_groups(notes: &[Note]) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut last_start = f64::NEG_INFINITY;
    for (i, note) in notes.iter().enumerate() {
        if (note.start_beats - last_start).abs() < 1e-9 {
            if let Some(group) = groups.last_mut() {
                group.push(i);
                continue;
            }
        }
        groups.push(vec![i]);
        last_start = note.start_beats;
    }
    groups
}

/// Fold a pitch by octaves into `[low, high]`.
///
/// Keeps the pitch class when the range spans at least an octave; otherwise
/// the result is clamped to the nearest bound.
pub fn fold_into_range(pitch: i32, low: u8, high: u8) -> u8 {
    let (low, high) = (low as i32, high.max(low) as i32);
    let mut p = pitch;
    while p < low {
        p += 12;
    }
    while p > high {
        p -= 12;
    }
    p.clamp(low, high) as u8
}

/// Convert a MIDI pitch to a compact note name (e.g., "C4", "F#3").
pub fn pitch_name(pitch: u8) -> String {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
    ];
    let octave = pitch as i32 / 12 - 1;
    format!("{}{}", NAMES[(pitch % 12) as usize], octave)
}

/// Name of a pitch class (0 = C).
pub fn pitch_class_name(pc: u8) -> &'static str {
    match pc % 12 {
        0 => "C",
        1 => "C#",
        2 => "D",
        3 => "Eb",
        4 => "E",
        5 => "F",
        6 => "F#",
        7 => "G",
        8 => "Ab",
        9 => "A",
        10 => "Bb",
        _ => "B",
    }
}

/// Musical interval helpers.
pub mod interval {
    /// Pitch class of `pitch` relative to `root` (0-11).
    pub fn relative_pc(pitch: u8, root: u8) -> u8 {
        ((pitch as i32 - root as i32).rem_euclid(12)) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_is_half_open() {
        let a = Note::new(60, 90, 0.0, 1.0);
        let b = Note::new(62, 90, 1.0, 1.0);
        let c = Note::new(64, 90, 0.5, 1.0);
        assert!(!a.overlaps(&b), "touching notes do not overlap");
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }

    #[test]
    fn test_new_clamps_fields() {
        let n = Note::new(200, 0, -1.0, 0.0);
        assert_eq!(n.pitch, 127);
        assert_eq!(n.velocity, 1);
        assert_eq!(n.start_beats, 0.0);
        assert!(n.length_beats > 0.0);
    }

    #[test]
    fn test_clip_end() {
        let mut n = Note::new(60, 90, 3.0, 2.0);
        assert!(n.clip_end(4.0));
        assert_eq!(n.end_beats(), 4.0);
        let mut late = Note::new(60, 90, 4.0, 1.0);
        assert!(!late.clip_end(4.0));
    }

    #[test]
    fn test_onset_groups() {
        let mut notes = vec![
            Note::new(67, 90, 1.0, 1.0),
            Note::new(60, 90, 0.0, 1.0),
            Note::new(64, 90, 0.0, 1.0),
        ];
        sort_notes(&mut notes);
        let groups = onset_groups(&notes);
        assert_eq!(groups, vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_fold_into_range() {
        assert_eq!(fold_into_range(40, 60, 84), 64);
        assert_eq!(fold_into_range(90, 60, 84), 78);
        assert_eq!(fold_into_range(70, 60, 84), 70);
    }

    #[test]
    fn test_pitch_names() {
        assert_eq!(pitch_name(60), "C4");
        assert_eq!(pitch_name(69), "A4");
        assert_eq!(pitch_class_name(10), "Bb");
    }

    #[test]
    fn test_relative_pitch_class() {
        assert_eq!(interval::relative_pc(57, 60), 9);
        assert_eq!(interval::relative_pc(72, 60), 0);
    }
}
