// Tunesmith generator: CLI entry point.
//
// Generates a passage with the engine and writes it to MIDI.
// The pipeline: load config → apply overrides → generate → derive layers →
// MIDI output.
//
// Usage:
//   cargo run -p tunesmith_engine --bin generate -- [output.mid] [--config FILE]
//     [--mode chords|melody|mixture] [--key N] [--scale NAME] [--meter N/D]
//     [--bars N] [--seed N] [--tempo BPM] [--stack MODE] [--counter]
//
// Set RUST_LOG=debug for per-stage engine logging.

use clap::Parser;
use std::path::PathBuf;
use tunesmith_engine::config::{EngineConfig, EngineMode, HarmonyStackMode};
use tunesmith_engine::engine::Engine;
use tunesmith_engine::harmony::AdvancedHarmonyOptions;
use tunesmith_engine::midi::{ExportTrack, write_midi};
use tunesmith_engine::note::{Note, pitch_class_name, pitch_name};
use tunesmith_engine::postprocess::{make_counter_melody, make_harmony_stack};

/// Tunesmith - procedural melody and chord generator
#[derive(Parser)]
#[command(name = "generate")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Output MIDI file
    #[arg(default_value = "output.mid")]
    output: PathBuf,

    /// JSON engine config; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Engine mode (chords, melody, mixture)
    #[arg(long)]
    mode: Option<String>,

    /// Key root as a MIDI pitch (60 = C4)
    #[arg(long)]
    key: Option<u8>,

    /// Scale name, e.g. "Dorian" (unknown names use Major)
    #[arg(long)]
    scale: Option<String>,

    /// Time signature as N/D, e.g. 6/8
    #[arg(long, value_parser = parse_meter)]
    meter: Option<(u8, u8)>,

    #[arg(long)]
    bars: Option<u32>,

    #[arg(long)]
    seed: Option<u64>,

    /// Tempo in quarter notes per minute
    #[arg(long, default_value_t = 100.0)]
    tempo: f64,

    /// Harmony stack over the melody (off, third, sixth, open-fifth, spread)
    #[arg(long)]
    stack: Option<String>,

    /// Add a counter-melody track
    #[arg(long)]
    counter: bool,

    /// Harmony rule density (0-1); enables every harmony rule when set
    #[arg(long)]
    harmony: Option<f64>,
}

fn parse_meter(s: &str) -> Result<(u8, u8), String> {
    let (n, d) = s
        .split_once('/')
        .ok_or_else(|| format!("expected N/D, got '{s}'"))?;
    let n = n.trim().parse().map_err(|e| format!("bad numerator: {e}"))?;
    let d = d.trim().parse().map_err(|e| format!("bad denominator: {e}"))?;
    Ok((n, d))
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match EngineConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };
    if let Some(mode) = &cli.mode {
        config.mode = EngineMode::from_name(mode);
    }
    if let Some(key) = cli.key {
        config.set_key(key);
    }
    if let Some(scale) = &cli.scale {
        config.set_scale(scale);
    }
    if let Some((n, d)) = cli.meter {
        config.set_meter(n, d);
    }
    if let Some(bars) = cli.bars {
        config.set_bars(bars);
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(stack) = &cli.stack {
        config.harmony_stack = HarmonyStackMode::from_name(stack);
    }
    let options = cli
        .harmony
        .map(AdvancedHarmonyOptions::all)
        .unwrap_or_default();
    let config = config.sanitized();

    println!("=== Tunesmith Generator ===");
    println!("Output: {}", cli.output.display());
    println!(
        "Key: {} {} ({})",
        pitch_class_name(config.key),
        config.scale_instance().scale.name,
        config.scale
    );
    println!("Meter: {}/{}, {} bars", config.numerator, config.denominator, config.bars);
    println!(
        "Range: {}-{}",
        pitch_name(config.tessitura_low),
        pitch_name(config.tessitura_high)
    );
    println!("Mode: {:?}", config.mode);
    println!("Seed: {}", config.seed);
    println!();

    println!("[1/3] Generating...");
    let mut engine = Engine::new(config.clone());
    let (melody, chords) = match config.mode {
        EngineMode::Chords => (Vec::new(), engine.generate_chord_track(&options)),
        EngineMode::Melody => (engine.generate_melody(), Vec::new()),
        EngineMode::Mixture => {
            let both = engine.generate_melody_and_chords(&options, config.avoid_overlaps);
            (both.melody, both.chords)
        }
    };
    println!("  Melody: {} notes", melody.len());
    println!("  Chords: {} notes", chords.len());

    println!("[2/3] Deriving layers...");
    let mut tracks = Vec::new();
    let mut add = |name: &str, channel: u8, program: u8, notes: Vec<Note>| {
        if !notes.is_empty() {
            println!("  {}: {} notes", name, notes.len());
            tracks.push(ExportTrack {
                name: name.to_string(),
                channel,
                program,
                notes,
            });
        }
    };
    let scale = config.scale_instance();
    let stack = make_harmony_stack(&melody, config.harmony_stack, &scale);
    let counter = if cli.counter {
        make_counter_melody(&melody, &config)
    } else {
        Vec::new()
    };
    add("Melody", 0, 0, melody);
    add("Chords", 1, 0, chords);
    add("Harmony", 2, 48, stack);
    add("Counter", 3, 71, counter);

    println!("[3/3] Writing MIDI to {}...", cli.output.display());
    match write_midi(&tracks, cli.tempo, (config.numerator, config.denominator), &cli.output) {
        Ok(()) => {
            let quarters = config.total_beats() * 4.0 / config.denominator as f64;
            println!("  Done! Duration: {:.0}s", quarters * 60.0 / cli.tempo.max(1.0));
        }
        Err(e) => {
            eprintln!("  Error writing MIDI: {}", e);
            std::process::exit(1);
        }
    }
}
