//! Canonical decoded audio: interleaved f32 PCM.

use alloc::vec::Vec;

/// Size of one canonical sample in bytes.
pub const BYTES_PER_SAMPLE: usize = 4;

/// Interleaved f32 PCM with its sample rate and channel count.
///
/// `samples[frame * channels + ch]` is the sample for channel `ch`.
/// The length is always a whole number of frames.
#[derive(Clone, Debug, PartialEq)]
pub struct PcmBuffer {
    sample_rate: u32,
    channels: u16,
    samples: Vec<f32>,
}

impl PcmBuffer {
    /// Create an empty buffer.
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            samples: Vec::new(),
        }
    }

    /// Create `frames` frames of silence.
    pub fn silence(sample_rate: u32, channels: u16, frames: usize) -> Self {
        let channels = channels.max(1);
        Self {
            sample_rate,
            channels,
            samples: alloc::vec![0.0; frames * channels as usize],
        }
    }

    /// Wrap interleaved samples. A trailing partial frame is dropped.
    pub fn from_interleaved(sample_rate: u32, channels: u16, mut samples: Vec<f32>) -> Self {
        let channels = channels.max(1);
        let whole = samples.len() - samples.len() % channels as usize;
        samples.truncate(whole);
        Self {
            sample_rate,
            channels,
            samples,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames.
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// One frame's samples.
    pub fn frame(&self, index: usize) -> &[f32] {
        let ch = self.channels as usize;
        &self.samples[index * ch..index * ch + ch]
    }

    /// Same rate and channel count.
    pub fn same_format(&self, other: &PcmBuffer) -> bool {
        self.sample_rate == other.sample_rate && self.channels == other.channels
    }

    /// Bytes per frame of canonical data.
    pub fn block_align(&self) -> usize {
        BYTES_PER_SAMPLE * self.channels as usize
    }

    /// Canonical bytes per millisecond of audio.
    pub fn bytes_per_ms(&self) -> f64 {
        (BYTES_PER_SAMPLE as f64 * self.channels as f64 * self.sample_rate as f64) / 1000.0
    }

    /// Whole frames covering `ms` milliseconds: the byte length
    /// (`bytes_per_ms * ms`, floored) is rounded down to the block alignment.
    pub fn frames_for_ms(&self, ms: u32) -> usize {
        let bytes = BYTES_PER_SAMPLE as u64 * self.channels as u64 * self.sample_rate as u64
            * ms as u64
            / 1000;
        bytes as usize / self.block_align()
    }

    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 * 1000.0 / self.sample_rate as f64
    }

    /// Extend with silence to at least `frames` frames.
    pub fn pad_to(&mut self, frames: usize) {
        let len = frames * self.channels as usize;
        if self.samples.len() < len {
            self.samples.resize(len, 0.0);
        }
    }

    /// Sum `source` into this buffer starting at frame `offset`, growing this
    /// buffer as needed. Only overlapping channels are mixed. No gain or
    /// clipping is applied.
    pub fn mix_at(&mut self, offset: usize, source: &PcmBuffer) {
        self.pad_to(offset + source.frames());
        let dst_ch = self.channels as usize;
        let src_ch = source.channels as usize;
        let chs = dst_ch.min(src_ch);
        for (i, src) in source.samples.chunks_exact(src_ch).enumerate() {
            let base = (offset + i) * dst_ch;
            let dst = &mut self.samples[base..base + dst_ch];
            for ch in 0..chs {
                dst[ch] += src[ch];
            }
        }
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }
}
