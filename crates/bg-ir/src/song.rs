//! The song: patterns laid out on one shared slot timeline.

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::instrument::Instrument;
use crate::pattern::Pattern;

/// An ordered collection of patterns. Slot `i` of the song plays every
/// pattern whose item `i` is enabled, all at once.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Song {
    patterns: Vec<Pattern>,
}

impl Song {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn pattern(&self, index: usize) -> Option<&Pattern> {
        self.patterns.get(index)
    }

    pub fn pattern_mut(&mut self, index: usize) -> Option<&mut Pattern> {
        self.patterns.get_mut(index)
    }

    pub fn push(&mut self, pattern: Pattern) -> usize {
        self.patterns.push(pattern);
        self.patterns.len() - 1
    }

    pub fn remove(&mut self, index: usize) -> Option<Pattern> {
        (index < self.patterns.len()).then(|| self.patterns.remove(index))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Highest slot any pattern has enabled, scanning every item of every
    /// pattern. `None` when nothing is arranged.
    pub fn max_enabled_slot(&self) -> Option<usize> {
        self.patterns
            .iter()
            .filter_map(Pattern::last_enabled_item)
            .max()
    }

    /// Longest instrument beat row in the song, 0 with no instruments.
    pub fn max_beat_count(&self) -> usize {
        self.patterns
            .iter()
            .map(Pattern::max_beat_count)
            .max()
            .unwrap_or(0)
    }

    /// Largest pattern beat count, 0 for an empty song.
    pub fn max_pattern_beats(&self) -> usize {
        self.patterns
            .iter()
            .map(Pattern::number_of_beats)
            .max()
            .unwrap_or(0)
    }

    /// Every pattern enabled at `slot`.
    pub fn patterns_at(&self, slot: usize) -> impl Iterator<Item = &Pattern> + '_ {
        self.patterns.iter().filter(move |p| p.is_item_enabled(slot))
    }

    /// Every instrument of every pattern enabled at `slot`.
    pub fn instruments_at(&self, slot: usize) -> impl Iterator<Item = &Arc<Instrument>> + '_ {
        self.patterns_at(slot).flat_map(|p| p.instruments().iter())
    }
}
