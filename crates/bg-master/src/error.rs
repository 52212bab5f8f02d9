//! Error types for the controller and exporters.

use bg_audio::AudioError;
use bg_engine::EngineError;
use bg_formats::FormatError;
use bg_ir::ModelError;
use thiserror::Error;

/// A render or export failed. No output file is left behind.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Nothing in the song arrangement is enabled
    #[error("Song must have at least one pattern with beats checked.")]
    EmptyArrangement,
    #[error(transparent)]
    Validation(#[from] ModelError),
    /// Decoding a source or encoding the output failed
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error type for controller operations.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The operation needs a selected pattern
    #[error("no pattern is selected")]
    NoPattern,
    /// The other transport is running
    #[error("{0} playback is active")]
    PlayerActive(&'static str),
    /// The file is not an audio source we can open
    #[error("{0} is not a recognized audio file")]
    UnrecognizedSource(String),
    #[error(transparent)]
    Validation(#[from] ModelError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Format(#[from] FormatError),
    /// The output device could not be opened
    #[error("audio device: {0}")]
    Device(#[from] AudioError),
}
