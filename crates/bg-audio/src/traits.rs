//! Output backend trait and device errors.

use bg_engine::Frame;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no output device available")]
    NoDevice,
    /// The device reported no usable output configuration
    #[error("cannot query output config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),
    #[error("cannot build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("cannot start output stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
    #[error("cannot pause output stream: {0}")]
    Pause(#[from] cpal::PauseStreamError),
    /// The render thread could not be spawned or died during setup
    #[error("render thread: {0}")]
    Thread(String),
}

/// A sink for stereo frames, drained by a device at its own pace.
pub trait AudioOutput {
    fn sample_rate(&self) -> u32;

    /// Queue as many frames as fit without blocking. Returns how many were
    /// taken.
    fn write(&mut self, frames: &[Frame]) -> usize;

    /// Frames queued but not yet played.
    fn queued(&self) -> usize;

    fn start(&mut self) -> Result<(), AudioError>;

    /// Pause the device. Queued frames are kept.
    fn stop(&mut self) -> Result<(), AudioError>;
}
