//! Voice: one decoded sample bound to one output slot.

use std::path::Path;
use std::sync::Arc;

use bg_ir::{ModelError, PcmBuffer};

use crate::bus::{OutputBus, VoiceKey};
use crate::sample_bank::SampleBank;
use crate::EngineError;

/// A playback handle for one sample.
///
/// Only one playback is ever in flight: `play` restarts from frame 0 rather
/// than layering a second copy.
pub struct Voice {
    bus: Arc<dyn OutputBus>,
    key: Option<VoiceKey>,
    volume: f32,
}

impl Voice {
    /// Bind `pcm` to a new bus slot. Buffers at another rate are converted.
    pub fn new(
        pcm: Arc<PcmBuffer>,
        volume: f32,
        bus: Arc<dyn OutputBus>,
    ) -> Result<Self, EngineError> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(ModelError::VolumeOutOfRange(volume).into());
        }
        let pcm = if pcm.sample_rate() == bus.sample_rate() {
            pcm
        } else {
            Arc::new(bg_formats::convert(&pcm, bus.sample_rate(), pcm.channels())?)
        };
        let key = bus.allocate(pcm)?;
        Ok(Self {
            bus,
            key: Some(key),
            volume,
        })
    }

    /// Decode (or reuse) `path` from `bank` and bind it.
    pub fn open(
        path: &Path,
        volume: f32,
        bus: Arc<dyn OutputBus>,
        bank: &SampleBank,
    ) -> Result<Self, EngineError> {
        let pcm = bank.load(path)?;
        Self::new(pcm, volume, bus)
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Stop, rewind and start again at the configured volume.
    pub fn play(&self) {
        if let Some(key) = self.key {
            self.bus.flush(key);
            self.bus.start(key, self.volume);
        }
    }

    /// Halt output and discard anything pending.
    pub fn stop(&self) {
        if let Some(key) = self.key {
            self.bus.flush(key);
        }
    }

    /// Stop and give the slot back. Safe to call more than once.
    pub fn dispose(&mut self) {
        if let Some(key) = self.key.take() {
            self.bus.flush(key);
            self.bus.release(key);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.key.is_none()
    }
}

impl Drop for Voice {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixer::{Mixer, SharedMixer};
    use crate::Frame;

    fn mixer() -> SharedMixer {
        SharedMixer::new(Mixer::new(8000))
    }

    fn voice_on(mixer: &SharedMixer, samples: Vec<f32>, volume: f32) -> Voice {
        let pcm = Arc::new(PcmBuffer::from_interleaved(8000, 1, samples));
        Voice::new(pcm, volume, Arc::new(mixer.clone())).unwrap()
    }

    #[test]
    fn play_applies_volume_from_start() {
        let mixer = mixer();
        let voice = voice_on(&mixer, vec![0.8, 0.4], 0.5);
        voice.play();
        assert_eq!(mixer.lock().render_frame(), Frame::mono(0.4));

        voice.play();
        assert_eq!(mixer.lock().render_frame(), Frame::mono(0.4), "retrigger rewinds");
    }

    #[test]
    fn stop_silences() {
        let mixer = mixer();
        let voice = voice_on(&mixer, vec![0.8; 10], 1.0);
        voice.play();
        voice.stop();
        assert!(mixer.lock().render_frame().is_silent());
    }

    #[test]
    fn dispose_is_idempotent_and_releases() {
        let mixer = mixer();
        let mut voice = voice_on(&mixer, vec![0.8], 1.0);
        assert_eq!(mixer.lock().voice_count(), 1);
        voice.dispose();
        voice.dispose();
        voice.play();
        assert!(voice.is_disposed());
        assert_eq!(mixer.lock().voice_count(), 0);
    }

    #[test]
    fn drop_releases_slot() {
        let mixer = mixer();
        {
            let _voice = voice_on(&mixer, vec![0.8], 1.0);
        }
        assert_eq!(mixer.lock().voice_count(), 0);
    }

    #[test]
    fn bad_volume_rejected() {
        let mixer = mixer();
        let pcm = Arc::new(PcmBuffer::silence(8000, 1, 4));
        let result = Voice::new(pcm, -0.1, Arc::new(mixer.clone()));
        assert!(matches!(result, Err(EngineError::Validation(_))));
        assert_eq!(mixer.lock().voice_count(), 0);
    }
}
