//! Playback engine for beatgrid.
//!
//! A clock drives per-instrument beat cursors; triggered beats restart a
//! voice on the output mixer. Song playback chains one pattern player per
//! arrangement slot.

mod bus;
pub mod clock;
mod error;
mod frame;
mod mixer;
mod pattern_player;
mod sample_bank;
pub mod sequencer;
mod song_player;
mod voice;

use std::sync::Arc;

pub use bus::{OutputBus, VoiceKey};
pub use clock::{beat_interval, thread_clocks, Clock, ClockFactory, ManualTimeline, ThreadClock};
pub use error::EngineError;
pub use frame::Frame;
pub use mixer::{Mixer, SharedMixer, DEFAULT_MAX_VOICES};
pub use pattern_player::{EventHook, PatternPlayer, PlayerEvent};
pub use sample_bank::SampleBank;
pub use sequencer::{PlayState, PlaybackAction, Sequencer};
pub use song_player::{arrange, SongEvent, SongHook, SongPlayer};
pub use voice::Voice;

/// Everything a player needs from its surroundings: where voices play,
/// where samples come from, and how ticks are produced.
#[derive(Clone)]
pub struct PlayerContext {
    pub bus: Arc<dyn OutputBus>,
    pub bank: Arc<SampleBank>,
    pub clocks: ClockFactory,
}

impl PlayerContext {
    /// Real-time context: thread clocks and a bank matching the bus rate.
    pub fn new(bus: Arc<dyn OutputBus>) -> Self {
        let bank = Arc::new(SampleBank::new(bus.sample_rate()));
        Self {
            bus,
            bank,
            clocks: thread_clocks(),
        }
    }

    pub fn with_clocks(mut self, clocks: ClockFactory) -> Self {
        self.clocks = clocks;
        self
    }
}
