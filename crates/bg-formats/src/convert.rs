//! Sample rate and channel layout conversion of canonical PCM.

use bg_ir::PcmBuffer;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::FormatError;

const CHUNK_SIZE: usize = 1024;

/// Convert `pcm` to `sample_rate` / `channels`.
///
/// A buffer already in the target format is returned unchanged. Downmixing
/// to mono averages all channels; widening repeats the last source channel.
/// Resampling is band-limited sinc interpolation, trimmed to the exact
/// resampled length so the result is aligned with the input.
pub fn convert(pcm: &PcmBuffer, sample_rate: u32, channels: u16) -> Result<PcmBuffer, FormatError> {
    if sample_rate == 0 || channels == 0 {
        return Err(FormatError::UnsupportedFormat(format!(
            "{} Hz, {} channels",
            sample_rate, channels
        )));
    }
    if pcm.sample_rate() == sample_rate && pcm.channels() == channels {
        return Ok(pcm.clone());
    }

    log::debug!(
        target: "formats",
        "convert {} Hz/{} ch -> {} Hz/{} ch ({} frames)",
        pcm.sample_rate(),
        pcm.channels(),
        sample_rate,
        channels,
        pcm.frames()
    );

    let mut planes = remap_channels(pcm, channels);
    if pcm.sample_rate() != sample_rate {
        planes = resample(&planes, pcm.sample_rate(), sample_rate)?;
    }
    Ok(interleave(sample_rate, channels, &planes))
}

fn remap_channels(pcm: &PcmBuffer, target: u16) -> Vec<Vec<f32>> {
    let src = pcm.channels() as usize;
    let mut planes = vec![Vec::with_capacity(pcm.frames()); target as usize];
    for frame in pcm.samples().chunks_exact(src) {
        if target == 1 {
            planes[0].push(frame.iter().sum::<f32>() / src as f32);
        } else {
            for (ch, plane) in planes.iter_mut().enumerate() {
                plane.push(frame[ch.min(src - 1)]);
            }
        }
    }
    planes
}

fn resample(planes: &[Vec<f32>], from: u32, to: u32) -> Result<Vec<Vec<f32>>, FormatError> {
    let frames = planes.first().map_or(0, Vec::len);
    let ratio = to as f64 / from as f64;
    let expected = (frames as f64 * ratio).ceil() as usize;
    if frames == 0 {
        return Ok(vec![Vec::new(); planes.len()]);
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_SIZE, planes.len())
        .map_err(|e| FormatError::Resample(e.to_string()))?;

    let delay = resampler.output_delay();
    let mut out = vec![Vec::with_capacity(expected + delay); planes.len()];

    let mut pos = 0;
    while pos + CHUNK_SIZE <= frames {
        let chunk: Vec<&[f32]> = planes.iter().map(|p| &p[pos..pos + CHUNK_SIZE]).collect();
        let block = resampler
            .process(&chunk, None)
            .map_err(|e| FormatError::Resample(e.to_string()))?;
        append(&mut out, block);
        pos += CHUNK_SIZE;
    }
    if pos < frames {
        let tail: Vec<&[f32]> = planes.iter().map(|p| &p[pos..]).collect();
        let block = resampler
            .process_partial(Some(tail.as_slice()), None)
            .map_err(|e| FormatError::Resample(e.to_string()))?;
        append(&mut out, block);
    }
    // Flush the filter until the delayed tail is out.
    while out[0].len() < expected + delay {
        let block = resampler
            .process_partial::<Vec<f32>>(None, None)
            .map_err(|e| FormatError::Resample(e.to_string()))?;
        append(&mut out, block);
    }

    for plane in &mut out {
        plane.drain(..delay);
        plane.truncate(expected);
    }
    Ok(out)
}

fn append(out: &mut [Vec<f32>], block: Vec<Vec<f32>>) {
    for (plane, chunk) in out.iter_mut().zip(block) {
        plane.extend_from_slice(&chunk);
    }
}

fn interleave(sample_rate: u32, channels: u16, planes: &[Vec<f32>]) -> PcmBuffer {
    let frames = planes.iter().map(Vec::len).min().unwrap_or(0);
    let mut samples = Vec::with_capacity(frames * channels as usize);
    for i in 0..frames {
        for plane in planes {
            samples.push(plane[i]);
        }
    }
    PcmBuffer::from_interleaved(sample_rate, channels, samples)
}
