//! Instruments: a sample source plus one beat row.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::beat::{Beat, Flag};
use crate::error::ModelError;

/// A named audio sample with its own beat sequence.
///
/// The beat count is kept equal to the owning pattern's by [`crate::Pattern`].
/// An instrument with an empty source path is silent: players keep its
/// cursor in step but never give it a voice.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instrument {
    name: String,
    source_path: String,
    #[cfg_attr(feature = "serde", serde(default = "default_volume"))]
    volume: f32,
    #[cfg_attr(feature = "serde", serde(default))]
    muted: Flag,
    beats: Vec<Beat>,
}

#[cfg(feature = "serde")]
fn default_volume() -> f32 {
    1.0
}

impl Instrument {
    /// Name given to the silent filler used in empty song slots.
    pub const NULL_NAME: &'static str = "Null Instrument";

    /// Create an instrument with `beats` disabled beats.
    pub fn new(name: &str, source_path: &str, beats: usize) -> Self {
        let mut instrument = Self {
            name: name.to_string(),
            source_path: String::new(),
            volume: 1.0,
            muted: Flag::new(false),
            beats: Vec::new(),
        };
        instrument.set_source_path(source_path);
        instrument.resize(beats);
        instrument
    }

    /// Create an instrument named after the file stem of `source_path`.
    pub fn from_source(source_path: &str, beats: usize) -> Self {
        Self::new("", source_path, beats)
    }

    /// The null instrument: no source, `beats` disabled beats.
    pub fn silent(beats: usize) -> Self {
        Self::new(Self::NULL_NAME, "", beats)
    }

    /// Build an instrument around an explicit beat row.
    pub fn with_beats(name: &str, source_path: &str, beats: Vec<Beat>) -> Self {
        let mut instrument = Self::new(name, source_path, 0);
        instrument.beats = beats;
        instrument
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    /// Point the instrument at a new sample. An unnamed instrument takes the
    /// file stem as its name.
    pub fn set_source_path(&mut self, path: &str) {
        self.source_path = path.to_string();
        if self.name.is_empty() {
            self.name = name_from_path(path);
        }
    }

    pub fn is_silent(&self) -> bool {
        self.source_path.is_empty()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<(), ModelError> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(ModelError::VolumeOutOfRange(volume));
        }
        self.volume = volume;
        Ok(())
    }

    pub fn is_muted(&self) -> bool {
        self.muted.get()
    }

    /// Mute or unmute. Takes `&self` so a shared instrument can be muted
    /// while a player holds it.
    pub fn set_muted(&self, muted: bool) {
        self.muted.set(muted);
    }

    pub fn beats(&self) -> &[Beat] {
        &self.beats
    }

    pub fn beat(&self, index: usize) -> Option<&Beat> {
        self.beats.get(index)
    }

    pub fn beat_count(&self) -> usize {
        self.beats.len()
    }

    /// Indexes of the enabled beats, in order.
    pub fn enabled_beats(&self) -> impl Iterator<Item = usize> + '_ {
        self.beats
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_enabled())
            .map(|(i, _)| i)
    }

    /// Grow with disabled beats or truncate from the tail.
    pub fn resize(&mut self, beats: usize) {
        self.beats.resize_with(beats, Beat::default);
    }

    /// Clear every `playing` marker.
    pub fn clear_playing(&self) {
        for beat in &self.beats {
            beat.set_playing(false);
        }
    }
}

/// The final path component with its last extension removed.
///
/// Both `/` and `\` count as separators so project files written on either
/// platform name their instruments the same way.
pub fn name_from_path(path: &str) -> String {
    let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match file.rfind('.') {
        Some(dot) if dot > 0 => file[..dot].to_string(),
        _ => file.to_string(),
    }
}
