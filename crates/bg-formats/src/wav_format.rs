//! WAV decoding to canonical PCM and integer PCM encoding.

use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;

use bg_ir::PcmBuffer;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::{BitDepth, FormatError};

/// Header facts about a source file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub frames: u32,
}

// --- Reading ---

/// Decode a WAV file to canonical f32 PCM.
pub fn decode_file(path: &Path) -> Result<PcmBuffer, FormatError> {
    let shown = path.display().to_string();
    let reader = WavReader::open(path).map_err(|e| FormatError::decode(&*shown, e))?;
    let pcm = read_pcm(reader).map_err(|e| FormatError::decode(&*shown, e))?;
    log::debug!(
        target: "formats",
        "decoded {}: {} frames, {} Hz, {} ch",
        shown,
        pcm.frames(),
        pcm.sample_rate(),
        pcm.channels()
    );
    Ok(pcm)
}

/// Decode WAV bytes held in memory.
pub fn decode_bytes(data: &[u8]) -> Result<PcmBuffer, FormatError> {
    let reader = WavReader::new(Cursor::new(data)).map_err(|e| FormatError::decode("<memory>", e))?;
    read_pcm(reader).map_err(|e| FormatError::decode("<memory>", e))
}

/// Read the header without decoding samples.
pub fn probe(path: &Path) -> Result<SourceInfo, FormatError> {
    let reader =
        WavReader::open(path).map_err(|e| FormatError::decode(path.display().to_string(), e))?;
    let spec = reader.spec();
    Ok(SourceInfo {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
        frames: reader.duration(),
    })
}

/// Whether `path` can be opened as an audio source.
pub fn validate_source(path: &Path) -> bool {
    probe(path).is_ok_and(|info| info.channels > 0 && info.sample_rate > 0)
}

fn read_pcm<R: Read>(reader: WavReader<R>) -> Result<PcmBuffer, hound::Error> {
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(hound::Error::FormatError("zero channels"));
    }
    let samples = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            if !(1..=32).contains(&spec.bits_per_sample) {
                return Err(hound::Error::FormatError("integer samples wider than 32 bits"));
            }
            let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(PcmBuffer::from_interleaved(spec.sample_rate, spec.channels, samples))
}

// --- Writing ---

/// Encode `pcm` as integer PCM at `depth`. Samples are clamped to full
/// scale; nothing is dithered so identical input gives identical bytes.
pub fn write_wav<W: Write + Seek>(
    writer: W,
    pcm: &PcmBuffer,
    depth: BitDepth,
) -> Result<(), FormatError> {
    let spec = WavSpec {
        channels: pcm.channels(),
        sample_rate: pcm.sample_rate(),
        bits_per_sample: depth.bits(),
        sample_format: SampleFormat::Int,
    };
    let mut wav = WavWriter::new(writer, spec).map_err(encode_err)?;
    let scale = depth.full_scale();

    for &s in pcm.samples() {
        let q = (s as f64 * scale).round().clamp(-(scale + 1.0), scale);
        let written = match depth {
            BitDepth::Eight => wav.write_sample(q as i8),
            BitDepth::Sixteen => wav.write_sample(q as i16),
            BitDepth::TwentyFour | BitDepth::ThirtyTwo => wav.write_sample(q as i32),
        };
        written.map_err(encode_err)?;
    }

    wav.finalize().map_err(encode_err)
}

/// Encode to a file at `path`, creating or truncating it.
pub fn write_wav_file(path: &Path, pcm: &PcmBuffer, depth: BitDepth) -> Result<(), FormatError> {
    let file = File::create(path)?;
    write_wav(BufWriter::new(file), pcm, depth)
}

fn encode_err(e: hound::Error) -> FormatError {
    match e {
        hound::Error::IoError(io) => FormatError::Io(io),
        other => FormatError::Encode(other.to_string()),
    }
}
