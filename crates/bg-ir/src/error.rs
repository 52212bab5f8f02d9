//! Model validation errors.

use core::fmt;

/// A model edit was rejected because it would break an invariant.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelError {
    /// Patterns, instruments and players need at least one beat
    ZeroBeats,
    /// A pattern needs at least one arrangement slot
    ZeroItems,
    /// Volume must lie in [0, 1]
    VolumeOutOfRange(f32),
    /// BPM outside the supported range
    BpmOutOfRange(u32),
    /// Measure count outside the supported range
    MeasuresOutOfRange(usize),
    /// Beats per measure outside the supported range
    BeatsPerMeasureOutOfRange(usize),
    /// An instrument does not match its pattern's beat count
    BeatCountMismatch { expected: usize, found: usize },
    /// Index past the end of a collection
    IndexOutOfRange { what: &'static str, index: usize },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::ZeroBeats => write!(f, "number of beats must be at least 1"),
            ModelError::ZeroItems => write!(f, "a pattern needs at least one song slot"),
            ModelError::VolumeOutOfRange(v) => write!(f, "volume {} is outside [0, 1]", v),
            ModelError::BpmOutOfRange(bpm) => write!(
                f,
                "BPM {} is outside {}..={}",
                bpm,
                crate::MIN_BPM,
                crate::MAX_BPM
            ),
            ModelError::MeasuresOutOfRange(n) => {
                write!(f, "measure count {} is outside 1..={}", n, crate::MAX_MEASURES)
            }
            ModelError::BeatsPerMeasureOutOfRange(n) => write!(
                f,
                "beats per measure {} is outside 1..={}",
                n,
                crate::MAX_BEATS_PER_MEASURE
            ),
            ModelError::BeatCountMismatch { expected, found } => write!(
                f,
                "instrument has {} beats, pattern has {}",
                found, expected
            ),
            ModelError::IndexOutOfRange { what, index } => {
                write!(f, "{} index {} out of range", what, index)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ModelError {}
