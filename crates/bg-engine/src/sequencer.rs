//! Beat cursor state machine.
//!
//! The sequencer owns no audio. Each call returns the actions the harness
//! has to carry out, so the whole timing model can be stepped in tests.
//!
//! Per tick, in order:
//! 1. If every cursor has run past its instrument's last beat, report
//!    `Completed`. A one-shot sequencer then stops; a looping one rewinds
//!    and carries on within the same tick.
//! 2. Each instrument clears the `playing` marker on its previous beat
//!    (beat 0 wraps to the last beat).
//! 3. Each instrument whose cursor is in range marks that beat playing,
//!    asks for a trigger if the beat is enabled and the instrument is not
//!    muted, and advances.
//!
//! Completion is therefore seen one tick after the last beat fires, which
//! gives the last beat a full interval before the next slot of a song.

use std::sync::Arc;

use bg_ir::{Instrument, ModelError};

/// Work for the harness, in the order it must happen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackAction {
    /// Restart the voice of instrument `n`
    Trigger(usize),
    /// Halt every voice and the clock
    StopVoices,
    /// Every cursor ran past the end
    Completed,
    /// Left the playing state
    Stopped,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlayState {
    #[default]
    Stopped,
    Playing,
}

pub struct Sequencer {
    instruments: Vec<Arc<Instrument>>,
    cursors: Vec<usize>,
    looping: bool,
    state: PlayState,
}

impl Sequencer {
    /// Every instrument needs at least one beat.
    pub fn new(instruments: Vec<Arc<Instrument>>, looping: bool) -> Result<Self, ModelError> {
        if instruments.iter().any(|i| i.beat_count() == 0) {
            return Err(ModelError::ZeroBeats);
        }
        Ok(Self {
            cursors: vec![0; instruments.len()],
            instruments,
            looping,
            state: PlayState::Stopped,
        })
    }

    pub fn instruments(&self) -> &[Arc<Instrument>] {
        &self.instruments
    }

    pub fn cursors(&self) -> &[usize] {
        &self.cursors
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Rewind and enter the playing state.
    pub fn start(&mut self) {
        self.reset();
        self.state = PlayState::Playing;
    }

    /// Advance one beat. Does nothing while stopped.
    pub fn tick(&mut self) -> Vec<PlaybackAction> {
        let mut actions = Vec::new();
        if !self.is_playing() {
            return actions;
        }

        if self.all_done() {
            actions.push(PlaybackAction::Completed);
            if !self.looping {
                actions.extend(self.stop());
                return actions;
            }
            self.cursors.fill(0);
        }

        for (index, instrument) in self.instruments.iter().enumerate() {
            let beats = instrument.beats();
            let cursor = self.cursors[index];

            let previous = if cursor == 0 { beats.len() - 1 } else { cursor - 1 };
            if let Some(beat) = beats.get(previous) {
                beat.set_playing(false);
            }

            if let Some(beat) = beats.get(cursor) {
                beat.set_playing(true);
                if beat.is_enabled() && !instrument.is_muted() {
                    actions.push(PlaybackAction::Trigger(index));
                }
                self.cursors[index] = cursor + 1;
            }
        }
        actions
    }

    /// Rewind and clear markers. Only leaving the playing state yields
    /// `StopVoices` and `Stopped`, so repeated stops are silent.
    pub fn stop(&mut self) -> Vec<PlaybackAction> {
        self.reset();
        if self.state == PlayState::Playing {
            self.state = PlayState::Stopped;
            vec![PlaybackAction::StopVoices, PlaybackAction::Stopped]
        } else {
            Vec::new()
        }
    }

    fn all_done(&self) -> bool {
        self.instruments
            .iter()
            .zip(&self.cursors)
            .all(|(inst, &cursor)| cursor >= inst.beat_count())
    }

    fn reset(&mut self) {
        self.cursors.fill(0);
        for instrument in &self.instruments {
            instrument.clear_playing();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PlaybackAction::*;

    fn instrument(pattern: &[u8]) -> Arc<Instrument> {
        let inst = Instrument::new("i", "i.wav", pattern.len());
        for (beat, &on) in inst.beats().iter().zip(pattern) {
            beat.set_enabled(on == 1);
        }
        Arc::new(inst)
    }

    fn run(seq: &mut Sequencer, ticks: usize) -> Vec<Vec<PlaybackAction>> {
        (0..ticks).map(|_| seq.tick()).collect()
    }

    #[test]
    fn alternating_pattern_one_shot() {
        let mut seq =
            Sequencer::new(vec![instrument(&[1, 0, 1, 0]), instrument(&[0, 1, 0, 1])], false)
                .unwrap();
        seq.start();
        let ticks = run(&mut seq, 6);

        assert_eq!(ticks[0], [Trigger(0)]);
        assert_eq!(ticks[1], [Trigger(1)]);
        assert_eq!(ticks[2], [Trigger(0)]);
        assert_eq!(ticks[3], [Trigger(1)]);
        assert_eq!(ticks[4], [Completed, StopVoices, Stopped]);
        assert!(ticks[5].is_empty());
        assert!(!seq.is_playing());
    }

    #[test]
    fn looping_rewinds_without_stopping() {
        let mut seq = Sequencer::new(vec![instrument(&[1, 0])], true).unwrap();
        seq.start();
        let ticks = run(&mut seq, 5);

        assert_eq!(ticks[0], [Trigger(0)]);
        assert!(ticks[1].is_empty());
        assert_eq!(ticks[2], [Completed, Trigger(0)]);
        assert!(ticks[3].is_empty());
        assert_eq!(ticks[4], [Completed, Trigger(0)]);
        assert!(seq.is_playing());
        assert!(ticks.iter().flatten().all(|a| *a != Stopped));
    }

    #[test]
    fn uneven_lengths_finish_together() {
        let mut seq =
            Sequencer::new(vec![instrument(&[1, 1, 1]), instrument(&[1])], false).unwrap();
        seq.start();
        let ticks = run(&mut seq, 4);
        assert_eq!(ticks[0], [Trigger(0), Trigger(1)]);
        assert_eq!(ticks[1], [Trigger(0)]);
        assert_eq!(ticks[2], [Trigger(0)]);
        assert_eq!(ticks[3][0], Completed);
    }

    #[test]
    fn muted_instrument_keeps_pace_silently() {
        let kick = instrument(&[1, 1]);
        kick.set_muted(true);
        let mut seq = Sequencer::new(vec![Arc::clone(&kick)], false).unwrap();
        seq.start();
        assert!(seq.tick().is_empty());
        assert!(kick.beats()[0].is_playing());

        kick.set_muted(false);
        assert_eq!(seq.tick(), [Trigger(0)]);
        assert_eq!(seq.cursors(), [2]);
    }

    #[test]
    fn live_beat_edits_are_seen() {
        let hat = instrument(&[0, 0, 0]);
        let mut seq = Sequencer::new(vec![Arc::clone(&hat)], false).unwrap();
        seq.start();
        seq.tick();
        hat.beats()[1].set_enabled(true);
        assert_eq!(seq.tick(), [Trigger(0)]);
    }

    #[test]
    fn playing_marker_follows_cursor() {
        let inst = instrument(&[0, 0, 0]);
        let mut seq = Sequencer::new(vec![Arc::clone(&inst)], true).unwrap();
        seq.start();
        let playing = |i: &Instrument| -> Vec<bool> { i.beats().iter().map(|b| b.is_playing()).collect() };

        seq.tick();
        assert_eq!(playing(&inst), [true, false, false]);
        seq.tick();
        seq.tick();
        assert_eq!(playing(&inst), [false, false, true]);
        seq.tick();
        assert_eq!(playing(&inst), [true, false, false], "wrap clears the last beat");
    }

    #[test]
    fn stop_is_idempotent() {
        let inst = instrument(&[1, 1]);
        let mut seq = Sequencer::new(vec![Arc::clone(&inst)], false).unwrap();
        seq.start();
        seq.tick();
        assert_eq!(seq.stop(), [StopVoices, Stopped]);
        assert!(seq.stop().is_empty());
        assert!(inst.beats().iter().all(|b| !b.is_playing()));
        assert_eq!(seq.cursors(), [0]);
    }

    #[test]
    fn zero_beats_rejected() {
        let empty = Arc::new(Instrument::new("e", "e.wav", 0));
        assert_eq!(
            Sequencer::new(vec![empty], false).err(),
            Some(ModelError::ZeroBeats)
        );
    }

    #[test]
    fn no_instruments_completes_at_once() {
        let mut seq = Sequencer::new(Vec::new(), false).unwrap();
        seq.start();
        assert_eq!(seq.tick(), [Completed, StopVoices, Stopped]);
    }
}
