//! Song player: one pattern player per arrangement slot, run back to back.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use bg_ir::{Instrument, ModelError, Song};

use crate::pattern_player::{EventHook, PatternPlayer, PlayerEvent};
use crate::sequencer::Sequencer;
use crate::{EngineError, PlayerContext};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SongEvent {
    /// Slot `n` began playing
    SlotStarted(usize),
    /// The song stopped, by request or after its last slot (once per run)
    Stopped,
}

pub type SongHook = Arc<dyn Fn(SongEvent) + Send + Sync>;

/// Instruments for every slot from 0 to the last enabled one.
///
/// A slot gets every instrument of every pattern enabled there. A slot no
/// pattern plays gets a single silent instrument as long as the longest
/// instrument in the song (or the longest pattern, if there are no
/// instruments) so the gap keeps its length. Empty when nothing is
/// arranged.
pub fn arrange(song: &Song) -> Vec<Vec<Arc<Instrument>>> {
    let Some(last_slot) = song.max_enabled_slot() else {
        return Vec::new();
    };
    let filler_beats = match song.max_beat_count() {
        0 => song.max_pattern_beats().max(1),
        n => n,
    };

    (0..=last_slot)
        .map(|slot| {
            let instruments: Vec<_> = song.instruments_at(slot).cloned().collect();
            if instruments.is_empty() {
                vec![Arc::new(Instrument::silent(filler_beats))]
            } else {
                instruments
            }
        })
        .collect()
}

struct SongCore {
    slots: Vec<Vec<Arc<Instrument>>>,
    ctx: PlayerContext,
    bpm: u32,
    /// Player for `current`, built when the slot starts
    live: Option<PatternPlayer>,
    current: usize,
    playing: bool,
    disposed: bool,
    generation: u64,
    hook: Option<SongHook>,
}

impl SongCore {
    /// Build and start the player for `slot`.
    fn start_slot(
        &mut self,
        shared: &Arc<Mutex<SongCore>>,
        slot: usize,
    ) -> Result<(), EngineError> {
        let instruments = self.slots[slot].clone();
        let player = PatternPlayer::new(instruments, self.bpm, false, &self.ctx)?;
        // A slot's first tick never completes (every slot has at least one
        // beat), so the slot hook does not re-enter while the song lock is
        // held.
        if let Err(e) = player.play(Some(SongPlayer::slot_hook(shared, self.generation, slot))) {
            player.dispose();
            return Err(e);
        }
        self.current = slot;
        self.live = Some(player);
        Ok(())
    }
}

fn lock(core: &Mutex<SongCore>) -> MutexGuard<'_, SongCore> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Plays a song's slots in order, each on its own non-looping player.
///
/// Only one slot player exists at a time: slot `n + 1` is built and started
/// from the completion of slot `n`, whose voices are released first. Voice
/// use is bounded by the largest slot, not the length of the song.
#[derive(Clone)]
pub struct SongPlayer {
    core: Arc<Mutex<SongCore>>,
}

impl SongPlayer {
    /// Check every slot and decode every sample through the context's bank,
    /// so bad setups and unreadable files fail here rather than mid-song.
    pub fn new(song: &Song, bpm: u32, ctx: &PlayerContext) -> Result<Self, EngineError> {
        if bpm == 0 {
            return Err(ModelError::BpmOutOfRange(bpm).into());
        }
        let slots = arrange(song);
        for instruments in &slots {
            Sequencer::new(instruments.clone(), false)?;
            for inst in instruments.iter().filter(|i| !i.is_silent()) {
                if !(0.0..=1.0).contains(&inst.volume()) {
                    return Err(ModelError::VolumeOutOfRange(inst.volume()).into());
                }
                ctx.bank.load(Path::new(inst.source_path()))?;
            }
        }

        log::debug!(target: "player", "song player: {} slots at {} BPM", slots.len(), bpm);

        Ok(Self {
            core: Arc::new(Mutex::new(SongCore {
                slots,
                ctx: ctx.clone(),
                bpm,
                live: None,
                current: 0,
                playing: false,
                disposed: false,
                generation: 0,
                hook: None,
            })),
        })
    }

    pub fn slot_count(&self) -> usize {
        lock(&self.core).slots.len()
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.core).playing
    }

    /// Slot being played, if any.
    pub fn current_slot(&self) -> Option<usize> {
        let core = lock(&self.core);
        core.playing.then_some(core.current)
    }

    /// Start from slot 0. A run already in progress is stopped first and
    /// its hook gets `Stopped`. A song with nothing arranged does not start.
    ///
    /// Fails if slot 0's player cannot be built or its clock cannot start;
    /// the song is then stopped.
    pub fn play(&self, hook: Option<SongHook>) -> Result<(), EngineError> {
        self.stop();

        let mut core = lock(&self.core);
        if core.disposed {
            log::warn!(target: "player", "play on a disposed song player ignored");
            return Ok(());
        }
        core.generation += 1;
        core.hook = hook;
        core.current = 0;
        if core.slots.is_empty() {
            log::info!(target: "player", "song has no arranged slots; nothing to play");
            return Ok(());
        }

        core.start_slot(&self.core, 0)?;
        core.playing = true;
        let song_hook = core.hook.clone();
        drop(core);

        if let Some(hook) = song_hook {
            hook(SongEvent::SlotStarted(0));
        }
        Ok(())
    }

    /// Stop and release the live slot player. Only the first stop of a run
    /// reports `Stopped`.
    pub fn stop(&self) {
        let mut core = lock(&self.core);
        core.generation += 1;
        let live = core.live.take();
        let was_playing = std::mem::replace(&mut core.playing, false);
        let hook = core.hook.clone();
        drop(core);

        if let Some(player) = live {
            player.dispose();
        }
        if was_playing {
            log::debug!(target: "player", "song stopped");
            if let Some(hook) = hook {
                hook(SongEvent::Stopped);
            }
        }
    }

    /// Stop and release everything. Later `play` calls are ignored.
    /// Idempotent.
    pub fn dispose(&self) {
        self.stop();
        let mut core = lock(&self.core);
        core.disposed = true;
        core.hook = None;
    }

    fn slot_hook(core: &Arc<Mutex<SongCore>>, generation: u64, slot: usize) -> EventHook {
        let weak = Arc::downgrade(core);
        Arc::new(move |event| {
            if event == PlayerEvent::Completed {
                Self::on_slot_completed(&weak, generation, slot);
            }
        })
    }

    fn on_slot_completed(weak: &Weak<Mutex<SongCore>>, generation: u64, slot: usize) {
        let Some(shared) = weak.upgrade() else { return };
        let is_current =
            |core: &SongCore| core.generation == generation && core.playing && core.current == slot;

        let finished = {
            let mut core = lock(&shared);
            if !is_current(&core) {
                return;
            }
            core.live.take()
        };
        if let Some(player) = finished {
            player.dispose();
        }

        let mut core = lock(&shared);
        if !is_current(&core) {
            return;
        }
        let next = slot + 1;
        let hook = core.hook.clone();
        let event = if next < core.slots.len() {
            match core.start_slot(&shared, next) {
                Ok(()) => {
                    log::debug!(target: "player", "song slot {} -> {}", slot, next);
                    SongEvent::SlotStarted(next)
                }
                Err(e) => {
                    log::error!(target: "player", "song stopped, slot {} failed: {}", next, e);
                    core.playing = false;
                    core.generation += 1;
                    SongEvent::Stopped
                }
            }
        } else {
            log::debug!(target: "player", "song finished after slot {}", slot);
            core.playing = false;
            core.generation += 1;
            SongEvent::Stopped
        };
        drop(core);

        if let Some(hook) = hook {
            hook(event);
        }
    }
}
