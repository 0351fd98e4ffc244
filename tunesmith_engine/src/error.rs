// Error types for the fallible edges of the engine.
//
// Generation itself never fails: out-of-range settings are clamped and
// unknown names fall back to defaults. Only loading a configuration file and
// writing a MIDI file can fail, and those surface as the enums below.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no tracks to export")]
    Empty,
    #[error("MIDI channel {0} out of range (0-15)")]
    Channel(u8),
    #[error("failed to encode MIDI: {0}")]
    Encode(std::io::Error),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
