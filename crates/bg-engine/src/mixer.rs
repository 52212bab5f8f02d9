//! Output mixer: sums every playing voice slot into stereo frames.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bg_ir::PcmBuffer;
use slotmap::SlotMap;

use crate::bus::{OutputBus, VoiceKey};
use crate::frame::Frame;
use crate::EngineError;

/// Slot limit of a default mixer.
pub const DEFAULT_MAX_VOICES: usize = 256;

struct VoiceSlot {
    pcm: Arc<PcmBuffer>,
    /// Next frame to read
    position: usize,
    gain: f32,
    playing: bool,
}

impl VoiceSlot {
    fn next_frame(&mut self) -> Option<Frame> {
        if !self.playing {
            return None;
        }
        if self.position >= self.pcm.frames() {
            self.playing = false;
            return None;
        }
        let frame = Frame::from_samples(self.pcm.frame(self.position)).scaled(self.gain);
        self.position += 1;
        Some(frame)
    }
}

/// Voice slots summed frame by frame.
pub struct Mixer {
    sample_rate: u32,
    max_voices: usize,
    slots: SlotMap<VoiceKey, VoiceSlot>,
}

impl Mixer {
    pub fn new(sample_rate: u32) -> Self {
        Self::with_max_voices(sample_rate, DEFAULT_MAX_VOICES)
    }

    pub fn with_max_voices(sample_rate: u32, max_voices: usize) -> Self {
        Self {
            sample_rate,
            max_voices,
            slots: SlotMap::with_key(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Bind a buffer to a new stopped slot. `None` once the mixer is full.
    pub fn allocate(&mut self, pcm: Arc<PcmBuffer>) -> Option<VoiceKey> {
        if self.slots.len() >= self.max_voices {
            return None;
        }
        Some(self.slots.insert(VoiceSlot {
            pcm,
            position: 0,
            gain: 1.0,
            playing: false,
        }))
    }

    pub fn start(&mut self, key: VoiceKey, gain: f32) {
        if let Some(slot) = self.slots.get_mut(key) {
            slot.position = 0;
            slot.gain = gain;
            slot.playing = true;
        }
    }

    pub fn flush(&mut self, key: VoiceKey) {
        if let Some(slot) = self.slots.get_mut(key) {
            slot.playing = false;
            slot.position = 0;
        }
    }

    pub fn release(&mut self, key: VoiceKey) {
        self.slots.remove(key);
    }

    /// Allocated slots.
    pub fn voice_count(&self) -> usize {
        self.slots.len()
    }

    /// Slots currently producing audio.
    pub fn active_voices(&self) -> usize {
        self.slots.values().filter(|s| s.playing).count()
    }

    pub fn is_playing(&self, key: VoiceKey) -> bool {
        self.slots.get(key).is_some_and(|s| s.playing)
    }

    /// Render a single frame.
    pub fn render_frame(&mut self) -> Frame {
        let mut out = Frame::silence();
        for slot in self.slots.values_mut() {
            if let Some(frame) = slot.next_frame() {
                out.mix(frame);
            }
        }
        out
    }

    /// Fill `out` with consecutive frames.
    pub fn render(&mut self, out: &mut [Frame]) {
        for frame in out.iter_mut() {
            *frame = self.render_frame();
        }
    }
}

/// A mixer shared between players (control side) and the device thread.
#[derive(Clone)]
pub struct SharedMixer {
    inner: Arc<Mutex<Mixer>>,
}

impl SharedMixer {
    pub fn new(mixer: Mixer) -> Self {
        Self {
            inner: Arc::new(Mutex::new(mixer)),
        }
    }

    /// Lock the mixer. A panic on another thread does not poison playback.
    pub fn lock(&self) -> MutexGuard<'_, Mixer> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn render(&self, out: &mut [Frame]) {
        self.lock().render(out);
    }
}

impl OutputBus for SharedMixer {
    fn sample_rate(&self) -> u32 {
        self.lock().sample_rate()
    }

    fn allocate(&self, pcm: Arc<PcmBuffer>) -> Result<VoiceKey, EngineError> {
        let mut mixer = self.lock();
        let key = mixer.allocate(pcm).ok_or_else(|| {
            EngineError::Resource(format!("all {} voice slots in use", mixer.max_voices))
        })?;
        log::trace!(target: "mixer", "allocated voice {:?} ({} in use)", key, mixer.voice_count());
        Ok(key)
    }

    fn start(&self, key: VoiceKey, gain: f32) {
        self.lock().start(key, gain);
    }

    fn flush(&self, key: VoiceKey) {
        self.lock().flush(key);
    }

    fn release(&self, key: VoiceKey) {
        self.lock().release(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(samples: Vec<f32>) -> Arc<PcmBuffer> {
        Arc::new(PcmBuffer::from_interleaved(8000, 1, samples))
    }

    fn render_n(mixer: &mut Mixer, n: usize) -> Vec<Frame> {
        let mut out = vec![Frame::silence(); n];
        mixer.render(&mut out);
        out
    }

    #[test]
    fn allocated_slot_is_silent_until_started() {
        let mut mixer = Mixer::new(8000);
        let key = mixer.allocate(buffer(vec![0.5; 4])).unwrap();
        assert!(render_n(&mut mixer, 2).iter().all(Frame::is_silent));

        mixer.start(key, 0.5);
        let out = render_n(&mut mixer, 5);
        assert_eq!(out[0], Frame::mono(0.25));
        assert!(out[4].is_silent(), "slot stops at the end of its buffer");
        assert!(!mixer.is_playing(key));
    }

    #[test]
    fn restart_rewinds() {
        let mut mixer = Mixer::new(8000);
        let key = mixer.allocate(buffer(vec![0.1, 0.2, 0.3])).unwrap();
        mixer.start(key, 1.0);
        render_n(&mut mixer, 2);
        mixer.start(key, 1.0);
        assert_eq!(mixer.render_frame(), Frame::mono(0.1));
    }

    #[test]
    fn voices_are_summed() {
        let mut mixer = Mixer::new(8000);
        let a = mixer.allocate(buffer(vec![0.25; 2])).unwrap();
        let b = mixer.allocate(buffer(vec![0.5; 2])).unwrap();
        mixer.start(a, 1.0);
        mixer.start(b, 1.0);
        assert_eq!(mixer.render_frame(), Frame::mono(0.75));
        assert_eq!(mixer.active_voices(), 2);

        mixer.flush(b);
        assert_eq!(mixer.render_frame(), Frame::mono(0.25));
    }

    #[test]
    fn full_mixer_refuses_allocation() {
        let shared = SharedMixer::new(Mixer::with_max_voices(8000, 1));
        shared.allocate(buffer(vec![0.0])).unwrap();
        match shared.allocate(buffer(vec![0.0])) {
            Err(EngineError::Resource(_)) => {}
            other => panic!("expected resource error, got {:?}", other),
        }
    }

    #[test]
    fn release_frees_slot() {
        let mut mixer = Mixer::new(8000);
        let key = mixer.allocate(buffer(vec![0.5])).unwrap();
        mixer.release(key);
        mixer.release(key);
        assert_eq!(mixer.voice_count(), 0);
        mixer.start(key, 1.0);
        assert!(mixer.render_frame().is_silent());
    }
}
