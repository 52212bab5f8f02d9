//! File formats for beatgrid.
//!
//! Decodes RIFF WAV sources to canonical f32 PCM, converts between sample
//! rates and channel layouts, writes integer PCM WAV, and loads and saves
//! project files.

mod convert;
mod output_format;
pub mod project_io;
mod wav_format;

pub use convert::convert;
pub use output_format::{BitDepth, ChannelLayout, SampleRate};
pub use project_io::{from_json, load_project, save_project, to_json};
pub use wav_format::{
    decode_bytes, decode_file, probe, validate_source, write_wav, write_wav_file, SourceInfo,
};

use thiserror::Error;

/// Error type for decoding, encoding and project files.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Source missing, unreadable or not a supported WAV
    #[error("cannot decode {path}: {reason}")]
    Decode { path: String, reason: String },
    /// Writer rejected the data
    #[error("cannot encode: {0}")]
    Encode(String),
    /// Requested output format is not one we produce
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    /// Sample rate conversion failed
    #[error("resampling failed: {0}")]
    Resample(String),
    /// Project file is not valid JSON for the model
    #[error("invalid project file: {0}")]
    Project(#[from] serde_json::Error),
    /// Project file breaks a model invariant
    #[error("invalid project: {0}")]
    Model(#[from] bg_ir::ModelError),
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FormatError {
    pub(crate) fn decode(path: impl Into<String>, reason: impl ToString) -> Self {
        FormatError::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for failures reading a source, as opposed to producing output.
    pub fn is_decode(&self) -> bool {
        matches!(self, FormatError::Decode { .. })
    }
}
