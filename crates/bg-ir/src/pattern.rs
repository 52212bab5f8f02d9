//! Patterns: a grid of instruments by beats, plus song slot toggles.

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::beat::PatternItem;
use crate::error::ModelError;
use crate::instrument::Instrument;

/// Beat count of a freshly created pattern.
pub const DEFAULT_BEATS: usize = 4;

/// A fixed-length grid of instruments × beats.
///
/// Invariant: every instrument has exactly `number_of_beats` beats.
///
/// Instruments are shared with running players through `Arc`, so toggling a
/// beat or muting is seen live. Structural edits (resize, rename, volume)
/// go through copy-on-write and leave a running player on its snapshot.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pattern {
    name: String,
    number_of_beats: usize,
    instruments: Vec<Arc<Instrument>>,
    items: Vec<PatternItem>,
}

impl Pattern {
    /// Create an empty pattern with `item_count` disabled song slots.
    pub fn new(name: &str, item_count: usize) -> Result<Self, ModelError> {
        if item_count == 0 {
            return Err(ModelError::ZeroItems);
        }
        Ok(Self {
            name: name.to_string(),
            number_of_beats: DEFAULT_BEATS,
            instruments: Vec::new(),
            items: alloc::vec![PatternItem::default(); item_count],
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn number_of_beats(&self) -> usize {
        self.number_of_beats
    }

    /// Resize every instrument. Growing appends disabled beats, shrinking
    /// drops beats from the tail whether or not they were enabled.
    pub fn set_number_of_beats(&mut self, beats: usize) -> Result<(), ModelError> {
        if beats == 0 {
            return Err(ModelError::ZeroBeats);
        }
        self.number_of_beats = beats;
        for instrument in &mut self.instruments {
            if instrument.beat_count() != beats {
                Arc::make_mut(instrument).resize(beats);
            }
        }
        Ok(())
    }

    pub fn instruments(&self) -> &[Arc<Instrument>] {
        &self.instruments
    }

    pub fn instrument(&self, index: usize) -> Option<&Arc<Instrument>> {
        self.instruments.get(index)
    }

    /// Copy-on-write access for structural edits.
    pub fn instrument_mut(&mut self, index: usize) -> Option<&mut Instrument> {
        self.instruments.get_mut(index).map(Arc::make_mut)
    }

    /// Append an instrument for `source_path` sized to this pattern.
    /// Returns its index.
    pub fn add_instrument(&mut self, source_path: &str) -> usize {
        self.instruments.push(Arc::new(Instrument::from_source(
            source_path,
            self.number_of_beats,
        )));
        self.instruments.len() - 1
    }

    /// Append an existing instrument. Its beat count must match.
    pub fn push_instrument(&mut self, instrument: Instrument) -> Result<usize, ModelError> {
        if instrument.beat_count() != self.number_of_beats {
            return Err(ModelError::BeatCountMismatch {
                expected: self.number_of_beats,
                found: instrument.beat_count(),
            });
        }
        self.instruments.push(Arc::new(instrument));
        Ok(self.instruments.len() - 1)
    }

    pub fn remove_instrument(&mut self, index: usize) -> Result<Arc<Instrument>, ModelError> {
        if index >= self.instruments.len() {
            return Err(ModelError::IndexOutOfRange {
                what: "instrument",
                index,
            });
        }
        Ok(self.instruments.remove(index))
    }

    pub fn items(&self) -> &[PatternItem] {
        &self.items
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Whether this pattern plays in song slot `slot`. Out of range is `false`.
    pub fn is_item_enabled(&self, slot: usize) -> bool {
        self.items.get(slot).is_some_and(|item| item.enabled)
    }

    pub fn set_item_enabled(&mut self, slot: usize, enabled: bool) -> Result<(), ModelError> {
        let item = self.items.get_mut(slot).ok_or(ModelError::IndexOutOfRange {
            what: "pattern item",
            index: slot,
        })?;
        item.enabled = enabled;
        Ok(())
    }

    /// Highest enabled song slot of this pattern.
    pub fn last_enabled_item(&self) -> Option<usize> {
        self.items.iter().rposition(|item| item.enabled)
    }

    /// Longest instrument beat row, 0 with no instruments.
    pub fn max_beat_count(&self) -> usize {
        self.instruments
            .iter()
            .map(|i| i.beat_count())
            .max()
            .unwrap_or(0)
    }

    /// Clear every instrument's `playing` markers.
    pub fn clear_playing(&self) {
        for instrument in &self.instruments {
            instrument.clear_playing();
        }
    }

    /// Re-establish the beat count invariant after loading from disk and
    /// reject out-of-range instrument volumes.
    pub fn normalize(&mut self) -> Result<(), ModelError> {
        if self.items.is_empty() {
            return Err(ModelError::ZeroItems);
        }
        if let Some(bad) = self
            .instruments
            .iter()
            .find(|i| !(0.0..=1.0).contains(&i.volume()))
        {
            return Err(ModelError::VolumeOutOfRange(bad.volume()));
        }
        self.set_number_of_beats(self.number_of_beats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern_with(instruments: usize, beats: usize) -> Pattern {
        let mut p = Pattern::new("P", 20).unwrap();
        p.set_number_of_beats(beats).unwrap();
        for i in 0..instruments {
            p.add_instrument(&alloc::format!("inst{}.wav", i));
        }
        p
    }

    #[test]
    fn zero_items_rejected() {
        assert_eq!(Pattern::new("P", 0).unwrap_err(), ModelError::ZeroItems);
    }

    #[test]
    fn new_instrument_matches_beat_count() {
        let p = pattern_with(2, 6);
        assert!(p.instruments().iter().all(|i| i.beat_count() == 6));
        assert_eq!(p.instrument(1).unwrap().name(), "inst1");
    }

    #[test]
    fn grow_preserves_flags_and_appends_disabled() {
        let mut p = pattern_with(2, 4);
        p.instrument(0).unwrap().beats()[1].set_enabled(true);
        p.instrument(1).unwrap().beats()[3].set_enabled(true);

        p.set_number_of_beats(7).unwrap();

        for inst in p.instruments() {
            assert_eq!(inst.beat_count(), 7);
            assert!(inst.beats()[4..].iter().all(|b| !b.is_enabled()));
        }
        assert!(p.instrument(0).unwrap().beats()[1].is_enabled());
        assert!(p.instrument(1).unwrap().beats()[3].is_enabled());
    }

    #[test]
    fn shrink_truncates_tail() {
        let mut p = pattern_with(1, 8);
        p.instrument(0).unwrap().beats()[0].set_enabled(true);
        p.instrument(0).unwrap().beats()[6].set_enabled(true);

        p.set_number_of_beats(3).unwrap();
        let inst = p.instrument(0).unwrap();
        assert_eq!(inst.beat_count(), 3);
        assert_eq!(inst.enabled_beats().collect::<Vec<_>>(), [0]);
    }

    #[test]
    fn zero_beats_rejected() {
        let mut p = pattern_with(1, 4);
        assert_eq!(p.set_number_of_beats(0), Err(ModelError::ZeroBeats));
        assert_eq!(p.number_of_beats(), 4);
    }

    #[test]
    fn push_instrument_checks_length() {
        let mut p = pattern_with(0, 4);
        let err = p.push_instrument(Instrument::silent(3)).unwrap_err();
        assert_eq!(err, ModelError::BeatCountMismatch { expected: 4, found: 3 });
        assert_eq!(p.push_instrument(Instrument::silent(4)), Ok(0));
    }

    #[test]
    fn resize_leaves_player_snapshot_alone() {
        let mut p = pattern_with(1, 4);
        let held = Arc::clone(p.instrument(0).unwrap());
        p.set_number_of_beats(8).unwrap();
        assert_eq!(held.beat_count(), 4);
        assert_eq!(p.instrument(0).unwrap().beat_count(), 8);
    }

    #[test]
    fn last_enabled_item() {
        let mut p = pattern_with(0, 4);
        assert_eq!(p.last_enabled_item(), None);
        p.set_item_enabled(2, true).unwrap();
        p.set_item_enabled(9, true).unwrap();
        assert_eq!(p.last_enabled_item(), Some(9));
        assert!(p.set_item_enabled(20, true).is_err());
        assert!(!p.is_item_enabled(200));
    }
}
