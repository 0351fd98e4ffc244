// MIDI output from generated note lists.
//
// Converts note lists into a Standard MIDI File (SMF) for playback in a DAW.
// Track 0 carries tempo and time signature; each `ExportTrack` becomes its
// own MIDI track with a name, channel and program change. Beats (denominator
// units) map to ticks at `TICKS_PER_QUARTER` scaled by the meter denominator.
//
// Note-on/note-off pairs are sorted by tick with note-offs first at equal
// ticks, so a repeated pitch re-strikes cleanly. Every note lasts at least
// one tick.
//
// Uses the `midly` crate for MIDI writing. Output is SMF Format 1 (multi-track).

use crate::error::ExportError;
use crate::note::Note;
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::Path;

/// Ticks per quarter note in MIDI output.
const TICKS_PER_QUARTER: u16 = 480;

/// One named part of the export.
#[derive(Debug, Clone)]
pub struct ExportTrack {
    pub name: String,
    /// MIDI channel 0-15.
    pub channel: u8,
    /// General MIDI program number.
    pub program: u8,
    pub notes: Vec<Note>,
}

/// Ticks per beat of a meter with the given denominator.
fn ticks_per_beat(denominator: u8) -> f64 {
    TICKS_PER_QUARTER as f64 * 4.0 / denominator.max(1) as f64
}

fn to_tick(beats: f64, tpb: f64) -> u32 {
    (beats.max(0.0) * tpb).round() as u32
}

/// Convert tracks to MIDI and write to a file.
pub fn write_midi(
    tracks: &[ExportTrack],
    tempo_bpm: f64,
    meter: (u8, u8),
    path: &Path,
) -> Result<(), ExportError> {
    let bytes = to_smf_bytes(tracks, tempo_bpm, meter)?;
    std::fs::write(path, &bytes).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Encode tracks as SMF bytes.
pub fn to_smf_bytes(tracks: &[ExportTrack], tempo_bpm: f64, meter: (u8, u8)) -> Result<Vec<u8>, ExportError> {
    let smf = tracks_to_smf(tracks, tempo_bpm, meter)?;
    let mut buf = Vec::new();
    smf.write_std(&mut buf).map_err(ExportError::Encode)?;
    Ok(buf)
}

/// Convert tracks to an in-memory SMF.
fn tracks_to_smf<'a>(
    tracks: &'a [ExportTrack],
    tempo_bpm: f64,
    (numerator, denominator): (u8, u8),
) -> Result<Smf<'a>, ExportError> {
    if tracks.is_empty() {
        return Err(ExportError::Empty);
    }
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    // Track 0: tempo and meter
    let tempo_microseconds = (60_000_000.0 / tempo_bpm.clamp(10.0, 400.0)).round() as u32;
    let denominator_log2 = denominator.max(1).ilog2() as u8;
    smf.tracks.push(vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo_microseconds))),
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::TimeSignature(numerator, denominator_log2, 24, 8)),
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        },
    ]);

    let tpb = ticks_per_beat(denominator);
    for part in tracks {
        if part.channel > 15 {
            return Err(ExportError::Channel(part.channel));
        }
        let channel = u4::new(part.channel);
        let mut track: Track<'a> = vec![
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::TrackName(part.name.as_bytes())),
            },
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::ProgramChange {
                        program: u7::new(part.program.min(127)),
                    },
                },
            },
        ];

        // (tick, is_on, key, velocity); note-offs sort before note-ons.
        let mut events: Vec<(u32, bool, u8, u8)> = Vec::with_capacity(part.notes.len() * 2);
        for note in &part.notes {
            let on = to_tick(note.start_beats, tpb);
            let off = to_tick(note.end_beats(), tpb).max(on + 1);
            events.push((on, true, note.pitch.min(127), note.velocity.clamp(1, 127)));
            events.push((off, false, note.pitch.min(127), 0));
        }
        events.sort_by_key(|&(tick, is_on, key, _)| (tick, is_on, key));

        let mut last_tick = 0;
        for (tick, is_on, key, vel) in events {
            let message = if is_on {
                MidiMessage::NoteOn {
                    key: u7::new(key),
                    vel: u7::new(vel),
                }
            } else {
                MidiMessage::NoteOff {
                    key: u7::new(key),
                    vel: u7::new(0),
                }
            };
            track.push(TrackEvent {
                delta: u28::new(tick - last_tick),
                kind: TrackEventKind::Midi { channel, message },
            });
            last_tick = tick;
        }

        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        smf.tracks.push(track);
    }

    Ok(smf)
}
