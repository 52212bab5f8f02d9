//! The project: tempo, song, selection and the legacy loop grid.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::channel::Channel;
use crate::error::ModelError;
use crate::pattern::Pattern;
use crate::song::Song;

pub const DEFAULT_BPM: u32 = 120;
pub const MIN_BPM: u32 = 1;
pub const MAX_BPM: u32 = 400;

/// Song slots given to every pattern created through a project.
pub const PATTERN_ITEM_CAPACITY: usize = 400;

pub const MAX_MEASURES: usize = 8;
pub const MAX_BEATS_PER_MEASURE: usize = 16;

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Project {
    name: String,
    bpm: u32,
    song: Song,
    #[cfg_attr(feature = "serde", serde(default))]
    selected_pattern: Option<usize>,
    #[cfg_attr(feature = "serde", serde(default))]
    channels: Vec<Channel>,
    #[cfg_attr(feature = "serde", serde(default = "one"))]
    number_of_measures: usize,
    #[cfg_attr(feature = "serde", serde(default = "default_beats_per_measure"))]
    beats_per_measure: usize,
}

#[cfg(feature = "serde")]
fn one() -> usize {
    1
}

#[cfg(feature = "serde")]
fn default_beats_per_measure() -> usize {
    crate::DEFAULT_BEATS
}

impl Project {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            bpm: DEFAULT_BPM,
            song: Song::new(),
            selected_pattern: None,
            channels: Vec::new(),
            number_of_measures: 1,
            beats_per_measure: crate::DEFAULT_BEATS,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    // --- Tempo ---

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn set_bpm(&mut self, bpm: u32) -> Result<(), ModelError> {
        if !(MIN_BPM..=MAX_BPM).contains(&bpm) {
            return Err(ModelError::BpmOutOfRange(bpm));
        }
        self.bpm = bpm;
        Ok(())
    }

    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.bpm as f64
    }

    /// Whole milliseconds per beat, truncated.
    pub fn ms_per_beat(&self) -> u32 {
        60_000 / self.bpm
    }

    // --- Patterns ---

    pub fn song(&self) -> &Song {
        &self.song
    }

    pub fn song_mut(&mut self) -> &mut Song {
        &mut self.song
    }

    /// Append "Pattern N" and select it. Returns its index.
    pub fn add_pattern(&mut self) -> Result<usize, ModelError> {
        let name = format!("Pattern {}", self.song.len() + 1);
        let index = self.song.push(Pattern::new(&name, PATTERN_ITEM_CAPACITY)?);
        self.selected_pattern = Some(index);
        Ok(index)
    }

    /// Remove a pattern. Removing the selected one selects its previous
    /// neighbour, or nothing once the song is empty.
    pub fn delete_pattern(&mut self, index: usize) -> Result<Pattern, ModelError> {
        let removed = self.song.remove(index).ok_or(ModelError::IndexOutOfRange {
            what: "pattern",
            index,
        })?;
        self.selected_pattern = match self.selected_pattern {
            _ if self.song.is_empty() => None,
            Some(sel) if sel == index => Some(index.saturating_sub(1)),
            Some(sel) if sel > index => Some(sel - 1),
            other => other,
        };
        Ok(removed)
    }

    pub fn selected_pattern_index(&self) -> Option<usize> {
        self.selected_pattern
    }

    pub fn selected_pattern(&self) -> Option<&Pattern> {
        self.song.pattern(self.selected_pattern?)
    }

    pub fn selected_pattern_mut(&mut self) -> Option<&mut Pattern> {
        self.song.pattern_mut(self.selected_pattern?)
    }

    pub fn select_pattern(&mut self, index: Option<usize>) -> Result<(), ModelError> {
        if let Some(i) = index {
            if i >= self.song.len() {
                return Err(ModelError::IndexOutOfRange {
                    what: "pattern",
                    index: i,
                });
            }
        }
        self.selected_pattern = index;
        Ok(())
    }

    // --- Legacy loop grid ---

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel_mut(&mut self, index: usize) -> Option<&mut Channel> {
        self.channels.get_mut(index)
    }

    pub fn add_channel(&mut self, source_path: &str) -> usize {
        self.channels.push(Channel::new(
            source_path,
            self.number_of_measures,
            self.beats_per_measure,
        ));
        self.channels.len() - 1
    }

    pub fn remove_channel(&mut self, index: usize) -> Result<Channel, ModelError> {
        if index >= self.channels.len() {
            return Err(ModelError::IndexOutOfRange {
                what: "channel",
                index,
            });
        }
        Ok(self.channels.remove(index))
    }

    pub fn number_of_measures(&self) -> usize {
        self.number_of_measures
    }

    pub fn set_number_of_measures(&mut self, measures: usize) -> Result<(), ModelError> {
        if !(1..=MAX_MEASURES).contains(&measures) {
            return Err(ModelError::MeasuresOutOfRange(measures));
        }
        self.number_of_measures = measures;
        self.reshape_channels();
        Ok(())
    }

    pub fn beats_per_measure(&self) -> usize {
        self.beats_per_measure
    }

    pub fn set_beats_per_measure(&mut self, beats: usize) -> Result<(), ModelError> {
        if !(1..=MAX_BEATS_PER_MEASURE).contains(&beats) {
            return Err(ModelError::BeatsPerMeasureOutOfRange(beats));
        }
        self.beats_per_measure = beats;
        self.reshape_channels();
        Ok(())
    }

    /// Beats in the whole loop grid.
    pub fn loop_beats(&self) -> usize {
        self.number_of_measures * self.beats_per_measure
    }

    fn reshape_channels(&mut self) {
        for channel in &mut self.channels {
            channel.resize(self.number_of_measures, self.beats_per_measure);
        }
    }

    /// Validate and repair a project read from disk: ranges are checked,
    /// every pattern and channel is resized to its declared shape and a
    /// dangling selection is cleared.
    pub fn normalize(&mut self) -> Result<(), ModelError> {
        self.set_bpm(self.bpm)?;
        self.set_number_of_measures(self.number_of_measures)?;
        self.set_beats_per_measure(self.beats_per_measure)?;
        for index in 0..self.song.len() {
            if let Some(pattern) = self.song.pattern_mut(index) {
                pattern.normalize()?;
            }
        }
        if let Some(bad) = self
            .channels
            .iter()
            .find(|c| !(0.0..=1.0).contains(&c.volume()))
        {
            return Err(ModelError::VolumeOutOfRange(bad.volume()));
        }
        if self.selected_pattern.is_some_and(|i| i >= self.song.len()) {
            self.selected_pattern = None;
        }
        Ok(())
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bpm_range() {
        let mut p = Project::default();
        assert_eq!(p.bpm(), DEFAULT_BPM);
        assert_eq!(p.ms_per_beat(), 500);
        assert_eq!(p.set_bpm(0), Err(ModelError::BpmOutOfRange(0)));
        assert_eq!(p.set_bpm(401), Err(ModelError::BpmOutOfRange(401)));
        p.set_bpm(90).unwrap();
        assert_eq!(p.ms_per_beat(), 666);
        assert!((p.seconds_per_beat() - 0.6667).abs() < 1e-3);
    }

    #[test]
    fn add_pattern_names_and_selects() {
        let mut p = Project::default();
        assert_eq!(p.add_pattern(), Ok(0));
        assert_eq!(p.add_pattern(), Ok(1));
        assert_eq!(p.selected_pattern().unwrap().name(), "Pattern 2");
        assert_eq!(
            p.selected_pattern().unwrap().item_count(),
            PATTERN_ITEM_CAPACITY
        );
    }

    #[test]
    fn delete_selected_selects_previous() {
        let mut p = Project::default();
        for _ in 0..3 {
            p.add_pattern().unwrap();
        }
        p.select_pattern(Some(2)).unwrap();
        p.delete_pattern(2).unwrap();
        assert_eq!(p.selected_pattern_index(), Some(1));

        p.select_pattern(Some(0)).unwrap();
        p.delete_pattern(0).unwrap();
        assert_eq!(p.selected_pattern_index(), Some(0));
        assert_eq!(p.selected_pattern().unwrap().name(), "Pattern 2");

        p.delete_pattern(0).unwrap();
        assert_eq!(p.selected_pattern_index(), None);
    }

    #[test]
    fn delete_before_selection_shifts_it() {
        let mut p = Project::default();
        for _ in 0..3 {
            p.add_pattern().unwrap();
        }
        p.delete_pattern(0).unwrap();
        assert_eq!(p.selected_pattern().unwrap().name(), "Pattern 3");
        assert!(p.delete_pattern(7).is_err());
    }

    #[test]
    fn loop_grid_shape() {
        let mut p = Project::default();
        p.add_channel("kick.wav");
        p.set_number_of_measures(3).unwrap();
        p.set_beats_per_measure(6).unwrap();
        assert_eq!(p.loop_beats(), 18);
        assert_eq!(p.channels()[0].flattened_beats().len(), 18);
        assert_eq!(
            p.set_number_of_measures(9),
            Err(ModelError::MeasuresOutOfRange(9))
        );
        assert_eq!(
            p.set_beats_per_measure(0),
            Err(ModelError::BeatsPerMeasureOutOfRange(0))
        );
    }
}
