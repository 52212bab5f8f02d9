//! Pattern player: runs a [`Sequencer`] on a clock and plays its voices.

use std::ops::ControlFlow;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use bg_ir::{Instrument, ModelError, Pattern};

use crate::clock::{beat_interval, Clock};
use crate::sequencer::{PlaybackAction, Sequencer};
use crate::voice::Voice;
use crate::{EngineError, PlayerContext};

/// Notifications from a running player.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerEvent {
    /// Every instrument ran past its last beat
    Completed,
    /// Playback stopped (once per run)
    Stopped,
}

/// Continuation for player events. Called without any player lock held,
/// so it may start or stop players, including this one.
pub type EventHook = Arc<dyn Fn(PlayerEvent) + Send + Sync>;

struct Core {
    sequencer: Sequencer,
    /// One per instrument; `None` for silent instruments
    voices: Vec<Option<Voice>>,
    clock: Box<dyn Clock>,
    hook: Option<EventHook>,
    /// Bumped whenever a run starts or ends; stale ticks check it
    generation: u64,
    disposed: bool,
}

impl Core {
    fn apply(&mut self, actions: &[PlaybackAction]) -> Vec<PlayerEvent> {
        let mut events = Vec::new();
        for action in actions {
            match *action {
                PlaybackAction::Trigger(index) => {
                    if let Some(Some(voice)) = self.voices.get(index) {
                        voice.play();
                    }
                }
                PlaybackAction::StopVoices => {
                    self.clock.stop();
                    self.generation += 1;
                    for voice in self.voices.iter().flatten() {
                        voice.stop();
                    }
                }
                PlaybackAction::Completed => events.push(PlayerEvent::Completed),
                PlaybackAction::Stopped => events.push(PlayerEvent::Stopped),
            }
        }
        events
    }
}

struct Shared {
    core: Mutex<Core>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_tick(&self, generation: u64) -> ControlFlow<()> {
        let (events, hook, flow) = {
            let mut core = self.lock();
            if core.generation != generation || !core.sequencer.is_playing() {
                return ControlFlow::Break(());
            }
            let actions = core.sequencer.tick();
            let events = core.apply(&actions);
            let flow = if core.sequencer.is_playing() {
                ControlFlow::Continue(())
            } else {
                ControlFlow::Break(())
            };
            (events, core.hook.clone(), flow)
        };
        dispatch(hook, events);
        flow
    }
}

fn dispatch(hook: Option<EventHook>, events: Vec<PlayerEvent>) {
    if let Some(hook) = hook {
        for event in events {
            hook(event);
        }
    }
}

/// Plays one pattern's instruments in lock-step, one beat per clock tick.
///
/// Cloning gives another handle to the same player. Voices and the clock
/// are released when the last handle is dropped or on [`dispose`].
///
/// [`dispose`]: PatternPlayer::dispose
#[derive(Clone)]
pub struct PatternPlayer {
    shared: Arc<Shared>,
}

impl PatternPlayer {
    /// Build a player for `instruments` at `bpm`.
    ///
    /// Every non-silent instrument gets a voice now, so decode and
    /// allocation failures surface here rather than mid-playback. Voices
    /// built before a failure are released.
    pub fn new(
        instruments: Vec<Arc<Instrument>>,
        bpm: u32,
        looping: bool,
        ctx: &PlayerContext,
    ) -> Result<Self, EngineError> {
        if bpm == 0 {
            return Err(ModelError::BpmOutOfRange(bpm).into());
        }
        let sequencer = Sequencer::new(instruments, looping)?;

        let voices = sequencer
            .instruments()
            .iter()
            .map(|inst| {
                if inst.is_silent() {
                    return Ok(None);
                }
                let voice = Voice::open(
                    Path::new(inst.source_path()),
                    inst.volume(),
                    Arc::clone(&ctx.bus),
                    &ctx.bank,
                )?;
                Ok(Some(voice))
            })
            .collect::<Result<Vec<_>, EngineError>>()?;

        log::debug!(
            target: "player",
            "pattern player: {} instruments, {} voices, {} BPM, looping={}",
            sequencer.instruments().len(),
            voices.iter().flatten().count(),
            bpm,
            looping
        );

        let clock = (ctx.clocks)(beat_interval(bpm));
        Ok(Self {
            shared: Arc::new(Shared {
                core: Mutex::new(Core {
                    sequencer,
                    voices,
                    clock,
                    hook: None,
                    generation: 0,
                    disposed: false,
                }),
            }),
        })
    }

    /// Build a player for a whole pattern. Each instrument must match the
    /// pattern's beat count.
    pub fn for_pattern(
        pattern: &Pattern,
        bpm: u32,
        looping: bool,
        ctx: &PlayerContext,
    ) -> Result<Self, EngineError> {
        let expected = pattern.number_of_beats();
        if let Some(bad) = pattern
            .instruments()
            .iter()
            .find(|i| i.beat_count() != expected)
        {
            return Err(ModelError::BeatCountMismatch {
                expected,
                found: bad.beat_count(),
            }
            .into());
        }
        Self::new(pattern.instruments().to_vec(), bpm, looping, ctx)
    }

    /// Start from beat 0 and fire beat 0 at once. A run already in
    /// progress is stopped first, so its hook still gets `Stopped`.
    ///
    /// `hook` receives this run's events. A disposed player ignores `play`.
    /// If the clock cannot start, the player stays stopped and the error is
    /// returned.
    pub fn play(&self, hook: Option<EventHook>) -> Result<(), EngineError> {
        let (ended, events, hook) = {
            let mut core = self.shared.lock();
            if core.disposed {
                log::warn!(target: "player", "play on a disposed player ignored");
                return Ok(());
            }
            let stop = core.sequencer.stop();
            let ended = (core.apply(&stop), core.hook.take());
            core.clock.stop();
            core.generation += 1;
            core.sequencer.start();

            let generation = core.generation;
            let weak: Weak<Shared> = Arc::downgrade(&self.shared);
            let started = core.clock.start(Box::new(move || match weak.upgrade() {
                Some(shared) => shared.on_tick(generation),
                None => ControlFlow::Break(()),
            }));
            if let Err(e) = started {
                core.sequencer.stop();
                core.generation += 1;
                drop(core);
                dispatch(ended.1, ended.0);
                return Err(e);
            }

            core.hook = hook;
            let actions = core.sequencer.tick();
            let events = core.apply(&actions);
            (ended, events, core.hook.clone())
        };
        dispatch(ended.1, ended.0);
        dispatch(hook, events);
        Ok(())
    }

    /// Stop playback. Safe from any thread, any number of times; only the
    /// first stop of a run reports `Stopped`.
    pub fn stop(&self) {
        let (events, hook) = {
            let mut core = self.shared.lock();
            let actions = core.sequencer.stop();
            let events = core.apply(&actions);
            core.clock.stop();
            core.generation += 1;
            (events, core.hook.clone())
        };
        dispatch(hook, events);
    }

    pub fn is_playing(&self) -> bool {
        self.shared.lock().sequencer.is_playing()
    }

    /// Current beat cursor of each instrument.
    pub fn cursors(&self) -> Vec<usize> {
        self.shared.lock().sequencer.cursors().to_vec()
    }

    /// Stop and release every voice. Idempotent.
    pub fn dispose(&self) {
        self.stop();
        let mut core = self.shared.lock();
        if !core.disposed {
            core.disposed = true;
            core.hook = None;
            for voice in core.voices.iter_mut().flatten() {
                voice.dispose();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualTimeline;
    use crate::mixer::{Mixer, SharedMixer};
    use crate::sample_bank::SampleBank;
    use crate::clock::TickHandler;
    use std::time::Duration;

    fn context(timeline: &ManualTimeline) -> (PlayerContext, SharedMixer) {
        let mixer = SharedMixer::new(Mixer::new(8000));
        let ctx = PlayerContext {
            bus: Arc::new(mixer.clone()),
            bank: Arc::new(SampleBank::new(8000)),
            clocks: timeline.factory(),
        };
        (ctx, mixer)
    }

    fn silent(pattern: &[u8]) -> Arc<Instrument> {
        let inst = Instrument::silent(pattern.len());
        for (beat, &on) in inst.beats().iter().zip(pattern) {
            beat.set_enabled(on == 1);
        }
        Arc::new(inst)
    }

    fn recorder() -> (EventHook, Arc<Mutex<Vec<PlayerEvent>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        (Arc::new(move |e| sink.lock().unwrap().push(e)), log)
    }

    #[test]
    fn play_ticks_immediately() {
        let timeline = ManualTimeline::new();
        let (ctx, _mixer) = context(&timeline);
        let player = PatternPlayer::new(vec![silent(&[1, 0, 0])], 120, false, &ctx).unwrap();

        player.play(None).unwrap();
        assert!(player.is_playing());
        assert_eq!(player.cursors(), [1]);
        timeline.advance();
        assert_eq!(player.cursors(), [2]);
    }

    #[test]
    fn one_shot_completes_then_stops() {
        let timeline = ManualTimeline::new();
        let (ctx, _mixer) = context(&timeline);
        let player =
            PatternPlayer::new(vec![silent(&[1, 0]), silent(&[0, 1])], 120, false, &ctx).unwrap();
        let (hook, log) = recorder();

        player.play(Some(hook)).unwrap();
        timeline.advance();
        assert!(log.lock().unwrap().is_empty());
        timeline.advance();
        assert_eq!(*log.lock().unwrap(), [PlayerEvent::Completed, PlayerEvent::Stopped]);
        assert!(!player.is_playing());
        assert_eq!(timeline.running(), 0);

        player.stop();
        assert_eq!(log.lock().unwrap().len(), 2, "no duplicate Stopped");
    }

    #[test]
    fn looping_never_stops_itself() {
        let timeline = ManualTimeline::new();
        let (ctx, _mixer) = context(&timeline);
        let player = PatternPlayer::new(vec![silent(&[1])], 120, true, &ctx).unwrap();
        let (hook, log) = recorder();

        player.play(Some(hook)).unwrap();
        timeline.advance_by(4);
        let events = log.lock().unwrap().clone();
        assert_eq!(events, [PlayerEvent::Completed; 4]);
        assert!(player.is_playing());

        player.stop();
        player.stop();
        assert_eq!(log.lock().unwrap().last(), Some(&PlayerEvent::Stopped));
        assert_eq!(log.lock().unwrap().len(), 5);
    }

    #[test]
    fn stop_fences_later_ticks() {
        let timeline = ManualTimeline::new();
        let (ctx, _mixer) = context(&timeline);
        let player = PatternPlayer::new(vec![silent(&[0, 0, 0, 0])], 120, false, &ctx).unwrap();
        player.play(None).unwrap();
        player.stop();
        assert_eq!(timeline.advance(), 0);
        assert_eq!(player.cursors(), [0]);
    }

    #[test]
    fn triggers_restart_voices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("click.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut w = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..4 {
            w.write_sample(16384i16).unwrap();
        }
        w.finalize().unwrap();

        let timeline = ManualTimeline::new();
        let (ctx, mixer) = context(&timeline);
        let inst = Instrument::from_source(path.to_str().unwrap(), 2);
        inst.beats()[1].set_enabled(true);
        let player = PatternPlayer::new(vec![Arc::new(inst)], 120, false, &ctx).unwrap();
        assert_eq!(mixer.lock().voice_count(), 1);

        player.play(None).unwrap();
        assert_eq!(mixer.lock().active_voices(), 0);
        timeline.advance();
        assert_eq!(mixer.lock().active_voices(), 1);
        assert_eq!(mixer.lock().render_frame().left, 0.5);

        player.dispose();
        player.dispose();
        assert_eq!(mixer.lock().voice_count(), 0);
    }

    #[test]
    fn missing_sample_fails_construction() {
        let timeline = ManualTimeline::new();
        let (ctx, mixer) = context(&timeline);
        let good = Arc::new(Instrument::silent(2));
        let bad = Arc::new(Instrument::from_source("/nope/kick.wav", 2));
        let result = PatternPlayer::new(vec![good, bad], 120, false, &ctx);
        assert!(matches!(result, Err(EngineError::Decode(_))));
        assert_eq!(mixer.lock().voice_count(), 0);
    }

    #[test]
    fn invalid_setup_rejected() {
        let timeline = ManualTimeline::new();
        let (ctx, _mixer) = context(&timeline);
        assert!(matches!(
            PatternPlayer::new(vec![silent(&[1])], 0, false, &ctx),
            Err(EngineError::Validation(ModelError::BpmOutOfRange(0)))
        ));
        let empty = Arc::new(Instrument::silent(0));
        assert!(matches!(
            PatternPlayer::new(vec![empty], 120, false, &ctx),
            Err(EngineError::Validation(ModelError::ZeroBeats))
        ));
    }

    #[test]
    fn hook_may_stop_the_player() {
        let timeline = ManualTimeline::new();
        let (ctx, _mixer) = context(&timeline);
        let player = PatternPlayer::new(vec![silent(&[1, 1, 1])], 120, true, &ctx).unwrap();
        let handle = player.clone();
        player.play(Some(Arc::new(move |e| {
            if e == PlayerEvent::Completed {
                handle.stop();
            }
        })))
        .unwrap();
        timeline.advance_by(5);
        assert!(!player.is_playing());
        // The hook holds a handle to its own player; dispose drops it.
        player.dispose();
    }

    #[test]
    fn replay_reports_stopped_to_previous_run() {
        let timeline = ManualTimeline::new();
        let (ctx, _mixer) = context(&timeline);
        let player = PatternPlayer::new(vec![silent(&[1, 1, 1, 1])], 120, true, &ctx).unwrap();
        let (first, first_log) = recorder();
        let (second, second_log) = recorder();

        player.play(Some(first)).unwrap();
        timeline.advance_by(2);
        player.play(Some(second)).unwrap();
        assert_eq!(*first_log.lock().unwrap(), [PlayerEvent::Stopped]);
        assert!(second_log.lock().unwrap().is_empty());
        assert_eq!(player.cursors(), [1]);

        player.stop();
        assert_eq!(first_log.lock().unwrap().len(), 1);
        assert_eq!(*second_log.lock().unwrap(), [PlayerEvent::Stopped]);
    }

    /// A clock whose thread can never be started.
    struct DeadClock;

    impl Clock for DeadClock {
        fn interval(&self) -> Duration {
            Duration::from_millis(500)
        }
        fn set_interval(&mut self, _: Duration) {}
        fn start(&mut self, _: TickHandler) -> Result<(), EngineError> {
            Err(EngineError::Resource("no clock thread".into()))
        }
        fn stop(&mut self) {}
        fn is_running(&self) -> bool {
            false
        }
    }

    #[test]
    fn clock_failure_leaves_player_stopped() {
        let timeline = ManualTimeline::new();
        let (mut ctx, _mixer) = context(&timeline);
        ctx.clocks = Arc::new(|_| Box::new(DeadClock) as Box<dyn Clock>);
        let player = PatternPlayer::new(vec![silent(&[1, 0])], 120, false, &ctx).unwrap();
        let (hook, log) = recorder();

        let result = player.play(Some(hook));
        assert!(matches!(result, Err(EngineError::Resource(_))));
        assert!(!player.is_playing());
        assert_eq!(player.cursors(), [0]);
        assert!(log.lock().unwrap().is_empty());
    }
}
