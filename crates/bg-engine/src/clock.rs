//! Tick sources for players.
//!
//! A clock calls its handler once per interval until stopped or until the
//! handler returns `Break`. Ticks never overlap. `start` and `stop` are
//! idempotent and `stop` never waits for the tick thread, so a handler may
//! stop its own clock.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};

use crate::EngineError;

/// Called on every tick. Returning `Break` ends the run.
pub type TickHandler = Box<dyn FnMut() -> ControlFlow<()> + Send + 'static>;

/// Makes a fresh clock for a player, given the beat interval.
pub type ClockFactory = Arc<dyn Fn(Duration) -> Box<dyn Clock> + Send + Sync>;

pub trait Clock: Send {
    fn interval(&self) -> Duration;

    /// Takes effect on the next `start`.
    fn set_interval(&mut self, interval: Duration);

    /// Begin ticking, replacing any current run. On error the clock is
    /// left stopped.
    fn start(&mut self, handler: TickHandler) -> Result<(), EngineError>;

    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// One beat at `bpm`, in whole milliseconds. `bpm` must be non-zero.
pub fn beat_interval(bpm: u32) -> Duration {
    Duration::from_millis(60_000 / bpm.max(1) as u64)
}

/// Factory for real-time thread clocks.
pub fn thread_clocks() -> ClockFactory {
    Arc::new(|interval| Box::new(ThreadClock::new(interval)) as Box<dyn Clock>)
}

// --- Thread clock ---

struct Run {
    stop_tx: Sender<()>,
    running: Arc<AtomicBool>,
}

/// A clock backed by a timing thread per run.
///
/// Deadlines are absolute, so handler time does not accumulate as drift.
/// A tick that overruns its interval delays the next one instead of
/// causing a burst.
pub struct ThreadClock {
    interval: Duration,
    run: Option<Run>,
}

impl ThreadClock {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            run: None,
        }
    }
}

impl Clock for ThreadClock {
    fn interval(&self) -> Duration {
        self.interval
    }

    fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    fn start(&mut self, mut handler: TickHandler) -> Result<(), EngineError> {
        self.stop();

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let running = Arc::new(AtomicBool::new(true));
        let interval = self.interval;
        let flag = Arc::clone(&running);

        let spawned = thread::Builder::new()
            .name("beat-clock".into())
            .spawn(move || {
                let mut next = Instant::now() + interval;
                loop {
                    match stop_rx.recv_deadline(next) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    if handler().is_break() {
                        break;
                    }
                    next = (next + interval).max(Instant::now());
                }
                flag.store(false, Ordering::Relaxed);
            });

        match spawned {
            Ok(_) => {
                log::debug!(target: "clock", "started, interval {:?}", interval);
                self.run = Some(Run { stop_tx, running });
                Ok(())
            }
            Err(e) => {
                log::error!(target: "clock", "failed to spawn clock thread: {}", e);
                Err(EngineError::Resource(format!("clock thread: {}", e)))
            }
        }
    }

    fn stop(&mut self) {
        if let Some(run) = self.run.take() {
            run.running.store(false, Ordering::Relaxed);
            let _ = run.stop_tx.try_send(());
            log::debug!(target: "clock", "stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.run
            .as_ref()
            .is_some_and(|r| r.running.load(Ordering::Relaxed))
    }
}

impl Drop for ThreadClock {
    fn drop(&mut self) {
        self.stop();
    }
}

// --- Manual clock ---

#[derive(Default)]
struct ManualState {
    interval: Duration,
    handler: Option<TickHandler>,
    running: bool,
    run_id: u64,
}

fn lock(state: &Mutex<ManualState>) -> MutexGuard<'_, ManualState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A shared timeline of manually advanced clocks.
///
/// `advance` fires one tick on every clock that was running when it was
/// called, on the caller's thread. A clock started during an advance waits
/// for the next one. Used to drive players deterministically.
#[derive(Clone, Default)]
pub struct ManualTimeline {
    clocks: Arc<Mutex<Vec<Weak<Mutex<ManualState>>>>>,
}

impl ManualTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clock(&self, interval: Duration) -> ManualClock {
        let state = Arc::new(Mutex::new(ManualState {
            interval,
            ..ManualState::default()
        }));
        let mut clocks = self.clocks.lock().unwrap_or_else(PoisonError::into_inner);
        clocks.retain(|w| w.strong_count() > 0);
        clocks.push(Arc::downgrade(&state));
        ManualClock { state }
    }

    pub fn factory(&self) -> ClockFactory {
        let timeline = self.clone();
        Arc::new(move |interval| Box::new(timeline.clock(interval)) as Box<dyn Clock>)
    }

    /// Fire one tick on every running clock. Returns how many ticked.
    pub fn advance(&self) -> usize {
        let due: Vec<(Arc<Mutex<ManualState>>, u64)> = {
            let clocks = self.clocks.lock().unwrap_or_else(PoisonError::into_inner);
            clocks
                .iter()
                .filter_map(Weak::upgrade)
                .filter_map(|state| {
                    let run = {
                        let s = lock(&state);
                        s.running.then_some(s.run_id)
                    };
                    run.map(|id| (state, id))
                })
                .collect()
        };

        let mut fired = 0;
        for (state, run_id) in due {
            let handler = {
                let mut s = lock(&state);
                if s.run_id != run_id {
                    continue;
                }
                s.handler.take()
            };
            let Some(mut handler) = handler else { continue };

            fired += 1;
            let flow = handler();

            let mut s = lock(&state);
            if s.run_id == run_id {
                if flow.is_break() {
                    s.running = false;
                } else {
                    s.handler = Some(handler);
                }
            }
        }
        fired
    }

    /// Advance `n` times. Returns total ticks fired.
    pub fn advance_by(&self, n: usize) -> usize {
        (0..n).map(|_| self.advance()).sum()
    }

    /// Clocks currently running.
    pub fn running(&self) -> usize {
        let clocks = self.clocks.lock().unwrap_or_else(PoisonError::into_inner);
        clocks
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|s| lock(s).running)
            .count()
    }
}

/// A clock that only ticks when its [`ManualTimeline`] advances.
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl Clock for ManualClock {
    fn interval(&self) -> Duration {
        lock(&self.state).interval
    }

    fn set_interval(&mut self, interval: Duration) {
        lock(&self.state).interval = interval;
    }

    fn start(&mut self, handler: TickHandler) -> Result<(), EngineError> {
        let mut s = lock(&self.state);
        s.run_id += 1;
        s.handler = Some(handler);
        s.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        let mut s = lock(&self.state);
        if s.running {
            s.run_id += 1;
            s.running = false;
        }
        s.handler = None;
    }

    fn is_running(&self) -> bool {
        lock(&self.state).running
    }
}
