// Cross-module properties of the generation engine.
//
// Drives the public entry points the way a host would (an `Engine` session
// or the pure functions with an explicit random stream) and checks the
// invariants every caller relies on: passage bounds, tessitura, scale
// membership, determinism, the mixture overlap law, and the fixed examples
// for chord tracks, humanization and harmony stacks.

use pretty_assertions::assert_eq;
use tunesmith_engine::config::{EngineConfig, EngineMode, HarmonyStackMode, HumanizeSettings};
use tunesmith_engine::engine::{Engine, generate_melody};
use tunesmith_engine::harmony::AdvancedHarmonyOptions;
use tunesmith_engine::humanize::humanize;
use tunesmith_engine::melody::walk_melody;
use tunesmith_engine::note::{Note, onset_groups};
use tunesmith_engine::postprocess::make_harmony_stack;
use tunesmith_engine::rhythm::{PolyrhythmMode, RhythmPatternDatabase};
use tunesmith_engine::scale::{ScaleInstance, scale_by_name};
use tunesmith_prng::ComposerRng;

const MODES: [EngineMode; 3] = [EngineMode::Chords, EngineMode::Melody, EngineMode::Mixture];

fn session(config: EngineConfig) -> Engine {
    Engine::new(config)
}

#[test]
fn notes_end_within_passage() {
    let meters = [(4, 4), (3, 4), (2, 4), (6, 8), (12, 8), (5, 4), (7, 8), (9, 8), (11, 16)];
    for (numerator, denominator) in meters {
        for bars in [1, 3, 8] {
            for mode in MODES {
                let config = EngineConfig {
                    numerator,
                    denominator,
                    bars,
                    mode,
                    polyrhythm: PolyrhythmMode::ThreeOverTwo,
                    polyrhythm_amount: 0.5,
                    humanize: HumanizeSettings {
                        timing: 1.0,
                        velocity: 1.0,
                        swing: 1.0,
                        feel: 1.0,
                    },
                    ..EngineConfig::default()
                };
                let total = bars as f64 * numerator as f64;
                let notes = session(config).generate(&AdvancedHarmonyOptions::all(0.6));
                for n in &notes {
                    assert!(
                        n.end_beats() <= total + 1e-9,
                        "{numerator}/{denominator} x{bars} {mode:?}: note ends at {} > {total}",
                        n.end_beats()
                    );
                    assert!(n.start_beats >= 0.0 && n.length_beats > 0.0);
                }
            }
        }
    }
}

#[test]
fn pitches_stay_inside_tessitura() {
    let ranges = [(60, 84), (36, 52), (100, 127), (0, 12), (60, 67), (72, 76), (64, 64), (0, 4)];
    for (low, high) in ranges {
        for mode in MODES {
            let mut e = session(EngineConfig {
                mode,
                bars: 6,
                ..EngineConfig::default()
            });
            e.config_mut().set_tessitura(low, high);
            for _ in 0..3 {
                let notes = e.generate(&AdvancedHarmonyOptions::all(0.8));
                assert!(!notes.is_empty(), "{mode:?}: nothing generated in {low}..={high}");
                let counter = e.make_counter_melody(&notes);
                for n in notes.iter().chain(&counter) {
                    assert!(
                        n.pitch >= low && n.pitch <= high,
                        "{mode:?}: pitch {} outside {low}..={high}",
                        n.pitch
                    );
                }
            }
        }
    }
}

#[test]
fn same_seed_same_notes() {
    let config = EngineConfig {
        bars: 8,
        seed: 1234,
        ..EngineConfig::default()
    };
    let mut a = session(config.clone());
    let mut b = session(config);
    assert_eq!(a.generate_melody(), b.generate_melody());
    let options = AdvancedHarmonyOptions::all(0.4);
    assert_eq!(a.generate_chord_track(&options), b.generate_chord_track(&options));
    assert_eq!(
        a.generate_melody_and_chords(&options, true),
        b.generate_melody_and_chords(&options, true)
    );
}

#[test]
fn harmony_stack_is_repeatable() {
    let mut e = session(EngineConfig::default());
    let melody = e.generate_melody();
    let scale = e.config().scale_instance();
    for mode in [
        HarmonyStackMode::Third,
        HarmonyStackMode::Sixth,
        HarmonyStackMode::OpenFifth,
        HarmonyStackMode::Spread,
    ] {
        let first = make_harmony_stack(&melody, mode, &scale);
        let second = make_harmony_stack(&melody, mode, &scale);
        assert_eq!(first, second);
        assert_eq!(first.len(), melody.len());
        for (stacked, original) in first.iter().zip(&melody) {
            assert_eq!(stacked.start_beats, original.start_beats);
            assert_eq!(stacked.length_beats, original.length_beats);
        }
    }
}

#[test]
fn counter_melody_is_repeatable() {
    let mut e = session(EngineConfig::default());
    let melody = e.generate_melody();
    assert_eq!(e.make_counter_melody(&melody), e.make_counter_melody(&melody));
}

#[test]
fn mixture_melody_never_overlaps_chords() {
    for seed in 0..10 {
        let mut e = session(EngineConfig {
            seed,
            bars: 4,
            ..EngineConfig::default()
        });
        let out = e.generate_melody_and_chords(&AdvancedHarmonyOptions::all(0.5), true);
        for m in &out.melody {
            for c in &out.chords {
                assert!(
                    !(m.start_beats < c.end_beats() && c.start_beats < m.end_beats()),
                    "seed {seed}: melody {m:?} overlaps chord tone {c:?}"
                );
            }
        }
        for group in onset_groups(&out.chords) {
            assert!((1..=2).contains(&group.len()));
        }
    }
}

#[test]
fn unknown_scale_generates_in_major() {
    let mut e = session(EngineConfig {
        key: 62,
        bars: 8,
        ..EngineConfig::default()
    });
    e.config_mut().set_scale("NotARealScale");
    let d_major = ScaleInstance::new(scale_by_name("Major"), 62);
    let melody = e.generate_melody();
    let chords = e.generate_chord_track(&AdvancedHarmonyOptions::default());
    assert!(!melody.is_empty() && !chords.is_empty());
    for n in melody.iter().chain(&chords) {
        assert!(d_major.contains(n.pitch), "pitch {} not in D major", n.pitch);
    }
}

#[test]
fn chord_track_has_one_group_per_slot() {
    for chords_per_bar in [1u8, 2] {
        let mut e = session(EngineConfig {
            key: 60,
            scale: "Major".into(),
            numerator: 4,
            denominator: 4,
            bars: 4,
            rest_density: 0.0,
            chords_per_bar,
            ..EngineConfig::default()
        });
        let chords = e.generate_chord_track(&AdvancedHarmonyOptions::default());
        let groups = onset_groups(&chords);
        assert_eq!(groups.len(), 4 * chords_per_bar as usize);
        for group in &groups {
            let root_pc = chords[group[0]].pitch % 12;
            assert!([0, 2, 4, 5, 7, 9, 11].contains(&root_pc), "root pc {root_pc}");
        }
    }
}

#[test]
fn zero_humanize_is_a_no_op() {
    let config = EngineConfig {
        humanize: HumanizeSettings::OFF,
        ..EngineConfig::default()
    };
    let rhythms = RhythmPatternDatabase::default();
    let raw = walk_melody(&config, &rhythms, None, &mut ComposerRng::new(77));
    let humanized = humanize(&raw, &HumanizeSettings::OFF, config.total_beats(), &mut ComposerRng::new(5));
    assert_eq!(humanized, raw);
    let via_engine = generate_melody(&config, &rhythms, &mut ComposerRng::new(77));
    assert_eq!(via_engine, raw);
}

#[test]
fn sixth_above_middle_c_is_a4() {
    let scale = ScaleInstance::new(scale_by_name("Major"), 60);
    let out = make_harmony_stack(&[Note::new(60, 100, 0.0, 1.0)], HarmonyStackMode::Sixth, &scale);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].pitch, 69);
}

#[test]
fn empty_rhythm_catalog_still_generates() {
    let mut e = session(EngineConfig {
        rest_density: 0.0,
        ..EngineConfig::default()
    });
    e.set_rhythms(RhythmPatternDatabase::new(Vec::new()));
    let melody = e.generate_melody();
    assert!(!melody.is_empty());
}

#[test]
fn clamped_config_still_generates() {
    let mut e = session(EngineConfig {
        bars: 0,
        numerator: 0,
        denominator: 0,
        key: 255,
        rest_density: -3.0,
        tessitura_low: 200,
        tessitura_high: 0,
        ..EngineConfig::default()
    });
    for mode in MODES {
        e.config_mut().mode = mode;
        let notes = e.generate(&AdvancedHarmonyOptions::default());
        assert!(notes.iter().all(|n| n.end_beats() <= 1.0 + 1e-9));
    }
}
