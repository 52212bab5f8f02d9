//! Real-time output: a render thread that feeds the mixer into the device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use bg_audio::{AudioError, AudioOutput, CpalOutput};
use bg_engine::{Frame, Mixer, PlayerContext, SharedMixer, DEFAULT_MAX_VOICES};
use crossbeam_channel::bounded;

use crate::ControllerError;

/// Tuning for real-time playback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaybackSettings {
    /// Device ring buffer length
    pub buffer: Duration,
    /// Frames mixed per pass of the render loop
    pub block_frames: usize,
    pub max_voices: usize,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            buffer: Duration::from_millis(100),
            block_frames: 256,
            max_voices: DEFAULT_MAX_VOICES,
        }
    }
}

struct DeviceThread {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

/// Where players send their voices.
///
/// An open session owns the audio device and its render thread. A detached
/// session only carries a context; whoever built it pulls audio from the
/// bus.
pub struct Session {
    context: PlayerContext,
    device: Option<DeviceThread>,
}

impl Session {
    /// Open the default output device and start rendering into it.
    pub fn open(settings: &PlaybackSettings) -> Result<Self, ControllerError> {
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = bounded(1);

        let flag = Arc::clone(&running);
        let thread_settings = settings.clone();
        let thread = std::thread::Builder::new()
            .name("audio-render".into())
            .spawn(move || {
                let Some((mut output, mixer)) = setup(&thread_settings, &ready_tx) else {
                    return;
                };
                render_loop(&mut output, &mixer, thread_settings.block_frames, &flag);
                log::debug!(target: "audio", "render loop done, {} frames still queued", output.queued());
                let _ = output.stop();
            })
            .map_err(|e| AudioError::Thread(e.to_string()))?;

        let mixer = match ready_rx.recv() {
            Ok(Ok(mixer)) => mixer,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e.into());
            }
            Err(_) => {
                let _ = thread.join();
                return Err(AudioError::Thread("exited before the device opened".into()).into());
            }
        };

        Ok(Self {
            context: PlayerContext::new(Arc::new(mixer)),
            device: Some(DeviceThread {
                running,
                thread: Some(thread),
            }),
        })
    }

    /// A session with no device. Players use `context` as given.
    pub fn detached(context: PlayerContext) -> Self {
        Self {
            context,
            device: None,
        }
    }

    pub fn context(&self) -> &PlayerContext {
        &self.context
    }

    pub fn has_device(&self) -> bool {
        self.device.is_some()
    }

    /// Stop the render thread and release the device. Idempotent.
    pub fn close(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.running.store(false, Ordering::Relaxed);
            if let Some(handle) = device.thread.take() {
                let _ = handle.join();
            }
            log::info!(target: "audio", "output session closed");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

type Ready = crossbeam_channel::Sender<Result<SharedMixer, AudioError>>;

fn setup(settings: &PlaybackSettings, ready: &Ready) -> Option<(CpalOutput, SharedMixer)> {
    let opened = CpalOutput::new(settings.buffer).and_then(|(mut output, consumer)| {
        output.build_stream(consumer)?;
        output.start()?;
        Ok(output)
    });
    match opened {
        Ok(output) => {
            let mixer = SharedMixer::new(Mixer::with_max_voices(
                output.sample_rate(),
                settings.max_voices,
            ));
            ready.send(Ok(mixer.clone())).ok()?;
            Some((output, mixer))
        }
        Err(e) => {
            log::error!(target: "audio", "cannot open output: {}", e);
            let _ = ready.send(Err(e));
            None
        }
    }
}

fn render_loop(
    output: &mut CpalOutput,
    mixer: &SharedMixer,
    block_frames: usize,
    running: &AtomicBool,
) {
    let mut block = vec![Frame::silence(); block_frames.max(1)];
    while running.load(Ordering::Relaxed) {
        mixer.render(&mut block);
        for &frame in &block {
            if !output.write_spin(frame, running) {
                return;
            }
        }
    }
}
