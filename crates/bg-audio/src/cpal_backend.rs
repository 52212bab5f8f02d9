//! cpal device output fed through a lock-free ring of stereo frames.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bg_engine::Frame;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::traits::{AudioError, AudioOutput};

/// Smallest ring we allocate, whatever the requested latency.
const MIN_RING_FRAMES: usize = 64;

/// The default output device.
///
/// A render thread pushes frames with [`write_spin`](Self::write_spin) or
/// [`AudioOutput::write`]; the device callback pops them. An empty ring or a
/// stopped output plays silence.
pub struct CpalOutput {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    producer: HeapProd<Frame>,
    running: Arc<AtomicBool>,
}

impl CpalOutput {
    /// Open the default device in its native layout, with a ring holding
    /// `latency` worth of frames.
    pub fn new(latency: Duration) -> Result<(Self, HeapCons<Frame>), AudioError> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or(AudioError::NoDevice)?;
        let config: StreamConfig = device.default_output_config()?.into();

        let ring_frames = (config.sample_rate.0 as u128 * latency.as_millis() / 1000) as usize;
        let ring_frames = ring_frames.max(MIN_RING_FRAMES);
        let (producer, consumer) = HeapRb::<Frame>::new(ring_frames).split();

        log::info!(
            target: "audio",
            "opened {} at {} Hz, {} channel(s), {} frame ring",
            device.name().unwrap_or_else(|_| "unnamed device".into()),
            config.sample_rate.0,
            config.channels,
            ring_frames
        );

        Ok((
            Self {
                device,
                config,
                stream: None,
                producer,
                running: Arc::new(AtomicBool::new(false)),
            },
            consumer,
        ))
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    /// Build the device stream around `consumer` and start it. Output is
    /// silent until [`AudioOutput::start`].
    pub fn build_stream(&mut self, mut consumer: HeapCons<Frame>) -> Result<(), AudioError> {
        let running = Arc::clone(&self.running);
        let channels = self.config.channels as usize;

        let stream = self.device.build_output_stream(
            &self.config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if running.load(Ordering::Relaxed) {
                    fill(data, channels, &mut consumer);
                } else {
                    data.fill(0.0);
                }
            },
            |err| log::error!(target: "audio", "stream error: {}", err),
            None,
        )?;

        stream.play()?;
        self.stream = Some(stream);
        Ok(())
    }

    /// Queue one frame, waiting for room while `keep_going` holds.
    /// Returns `false` if it gave up.
    pub fn write_spin(&mut self, frame: Frame, keep_going: &AtomicBool) -> bool {
        while self.producer.try_push(frame).is_err() {
            if !keep_going.load(Ordering::Relaxed) {
                return false;
            }
            std::thread::yield_now();
        }
        true
    }
}

/// Interleave frames from `ring` into a device buffer of `channels`.
/// Mono devices get the average of left and right; channels past the
/// second stay silent.
fn fill(data: &mut [f32], channels: usize, ring: &mut HeapCons<Frame>) {
    for out in data.chunks_mut(channels) {
        let frame = ring.try_pop().unwrap_or_default().clamped();
        match out {
            [mono] => *mono = (frame.left + frame.right) * 0.5,
            [left, right, rest @ ..] => {
                *left = frame.left;
                *right = frame.right;
                rest.fill(0.0);
            }
            [] => {}
        }
    }
}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn write(&mut self, frames: &[Frame]) -> usize {
        self.producer.push_slice(frames)
    }

    fn queued(&self) -> usize {
        self.producer.occupied_len()
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.running.store(true, Ordering::Relaxed);
        if let Some(stream) = &self.stream {
            stream.play()?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::Relaxed);
        if let Some(stream) = &self.stream {
            stream.pause()?;
        }
        Ok(())
    }
}
