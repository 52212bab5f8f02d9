//! Engine error type.

use bg_formats::FormatError;
use bg_ir::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Player setup breaks a model rule (zero beats, bad BPM, bad volume)
    #[error("invalid player setup: {0}")]
    Validation(#[from] ModelError),
    /// A sample could not be read or converted
    #[error(transparent)]
    Decode(#[from] FormatError),
    /// The output could not give us a voice or a device
    #[error("audio resource unavailable: {0}")]
    Resource(String),
}
