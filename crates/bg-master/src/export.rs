//! WAV export of patterns, songs and the loop grid.
//!
//! Output goes to `<path>.partial` and is renamed over `path` only once the
//! file is complete. A failed export leaves no file behind.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bg_formats::{BitDepth, ChannelLayout, SampleRate};
use bg_ir::{Pattern, Project, Song};

use crate::render::RenderJob;
use crate::tracker::RenderArena;
use crate::ExportError;

/// Output format of an export. Defaults to 44.1 kHz, 16 bit, mono.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExportSettings {
    pub sample_rate: SampleRate,
    pub bit_depth: BitDepth,
    pub channels: ChannelLayout,
}

impl ExportSettings {
    /// Parse raw numbers, rejecting anything outside the supported sets.
    pub fn from_raw(sample_rate: u32, bits: u16, channels: u16) -> Result<Self, ExportError> {
        Ok(Self {
            sample_rate: SampleRate::try_from(sample_rate)?,
            bit_depth: BitDepth::try_from(bits)?,
            channels: ChannelLayout::try_from(channels)?,
        })
    }
}

/// What an export produced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExportSummary {
    pub frames: usize,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_ms: f64,
}

pub fn export_pattern(
    pattern: &Pattern,
    bpm: u32,
    path: &Path,
    settings: &ExportSettings,
) -> Result<ExportSummary, ExportError> {
    export_job(&RenderJob::from_pattern(pattern, bpm)?, path, settings)
}

/// Fails with [`ExportError::EmptyArrangement`] when no pattern is
/// enabled in any slot.
pub fn export_song(
    song: &Song,
    bpm: u32,
    path: &Path,
    settings: &ExportSettings,
) -> Result<ExportSummary, ExportError> {
    export_job(&RenderJob::from_song(song, bpm)?, path, settings)
}

pub fn export_loop(
    project: &Project,
    path: &Path,
    settings: &ExportSettings,
) -> Result<ExportSummary, ExportError> {
    export_job(&RenderJob::from_loop(project)?, path, settings)
}

/// Render `job` and write it to `path`.
pub fn export_job(
    job: &RenderJob,
    path: &Path,
    settings: &ExportSettings,
) -> Result<ExportSummary, ExportError> {
    let partial = partial_path(path)?;
    let mut arena = RenderArena::new();
    let pcm = job.render(
        settings.sample_rate.hz(),
        settings.channels.count(),
        &mut arena,
    )?;

    let summary = ExportSummary {
        frames: pcm.frames(),
        sample_rate: pcm.sample_rate(),
        channels: pcm.channels(),
        duration_ms: pcm.duration_ms(),
    };

    let written = bg_formats::write_wav_file(&partial, pcm, settings.bit_depth)
        .map_err(ExportError::from)
        .and_then(|()| fs::rename(&partial, path).map_err(ExportError::from));
    if let Err(e) = written {
        let _ = fs::remove_file(&partial);
        log::warn!(target: "export", "export to {} failed: {}", path.display(), e);
        return Err(e);
    }

    log::info!(
        target: "export",
        "wrote {} ({} frames, {} Hz, {} bit, {}ch)",
        path.display(),
        summary.frames,
        summary.sample_rate,
        settings.bit_depth.bits(),
        summary.channels
    );
    Ok(summary)
}

fn partial_path(path: &Path) -> Result<PathBuf, ExportError> {
    let name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a file path", path.display()),
        )
    })?;
    let mut partial = name.to_os_string();
    partial.push(".partial");
    Ok(path.with_file_name(partial))
}
