//! Legacy loop grid: channels split into measures of beats.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::beat::{Beat, Flag};
use crate::error::ModelError;
use crate::instrument::name_from_path;

/// One bar of a channel.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Measure {
    beats: Vec<Beat>,
}

impl Measure {
    pub fn new(beats: usize) -> Self {
        let mut measure = Self::default();
        measure.resize(beats);
        measure
    }

    pub fn beats(&self) -> &[Beat] {
        &self.beats
    }

    fn resize(&mut self, beats: usize) {
        self.beats.resize_with(beats, Beat::default);
    }
}

/// A sample row of the pre-pattern project grid.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Channel {
    name: String,
    source_path: String,
    volume: f32,
    #[cfg_attr(feature = "serde", serde(default))]
    muted: Flag,
    measures: Vec<Measure>,
}

impl Channel {
    pub fn new(source_path: &str, measures: usize, beats_per_measure: usize) -> Self {
        let mut channel = Self {
            name: name_from_path(source_path),
            source_path: source_path.to_string(),
            volume: 1.0,
            muted: Flag::new(false),
            measures: Vec::new(),
        };
        channel.resize(measures, beats_per_measure);
        channel
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

    pub fn set_source_path(&mut self, path: &str) {
        self.source_path = path.to_string();
        if self.name.is_empty() {
            self.name = name_from_path(path);
        }
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

    pub fn set_muted(&self, muted: bool) {
        self.muted.set(muted);
    }

    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    pub fn beat(&self, measure: usize, beat: usize) -> Option<&Beat> {
        self.measures.get(measure)?.beats.get(beat)
    }

    /// All beats, measure after measure.
    pub fn flattened_beats(&self) -> Vec<Beat> {
        self.measures
            .iter()
            .flat_map(|m| m.beats.iter().cloned())
            .collect()
    }

    /// Reshape to `measures` bars of `beats_per_measure` beats. New beats are
    /// disabled; excess measures and beats are dropped from the tail.
    pub fn resize(&mut self, measures: usize, beats_per_measure: usize) {
        self.measures
            .resize_with(measures, || Measure::new(beats_per_measure));
        for measure in &mut self.measures {
            measure.resize(beats_per_measure);
        }
    }
}
