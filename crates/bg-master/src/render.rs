//! Offline mixdown of patterns, songs and the loop grid.
//!
//! Every instrument is decoded to float PCM. The first decoded source sets
//! the working format and later sources are converted to it. Each enabled
//! beat places one copy of the sample at `beat * beat_frames`; copies and
//! instruments are summed without gain, so volume and mute do not apply.
//! The mix is padded with silence to the full pattern length and finally
//! converted to the requested output format.
//!
//! Every intermediate buffer lives in a [`RenderArena`].

use std::path::Path;

use bg_ir::{Beat, Instrument, ModelError, Pattern, PcmBuffer, Project, Song};

use crate::tracker::RenderArena;
use crate::ExportError;

/// One instrument row of a render: its source and which beats fire.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderTrack {
    pub name: String,
    pub source_path: String,
    pub enabled: Vec<bool>,
}

impl RenderTrack {
    fn from_beats(name: &str, source_path: &str, beats: &[Beat]) -> Self {
        Self {
            name: name.to_string(),
            source_path: source_path.to_string(),
            enabled: beats.iter().map(Beat::is_enabled).collect(),
        }
    }
}

/// A frozen snapshot of what to render. Edits made after the job is built
/// do not affect it.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderJob {
    tracks: Vec<RenderTrack>,
    total_beats: usize,
    ms_per_beat: u32,
}

impl RenderJob {
    pub fn new(tracks: Vec<RenderTrack>, total_beats: usize, bpm: u32) -> Result<Self, ModelError> {
        if bpm == 0 {
            return Err(ModelError::BpmOutOfRange(bpm));
        }
        Ok(Self {
            tracks,
            total_beats,
            ms_per_beat: 60_000 / bpm,
        })
    }

    pub fn from_pattern(pattern: &Pattern, bpm: u32) -> Result<Self, ModelError> {
        let tracks = pattern
            .instruments()
            .iter()
            .filter(|i| !i.is_silent())
            .map(|i| RenderTrack::from_beats(i.name(), i.source_path(), i.beats()))
            .collect();
        Self::new(tracks, pattern.number_of_beats(), bpm)
    }

    pub fn from_song(song: &Song, bpm: u32) -> Result<Self, ExportError> {
        let pattern = song_pattern(song)?;
        Ok(Self::from_pattern(&pattern, bpm)?)
    }

    /// The legacy loop grid: each channel's measures played end to end.
    pub fn from_loop(project: &Project) -> Result<Self, ModelError> {
        let tracks = project
            .channels()
            .iter()
            .filter(|c| !c.source_path().is_empty())
            .map(|c| RenderTrack::from_beats(c.name(), c.source_path(), &c.flattened_beats()))
            .collect();
        Self::new(tracks, project.loop_beats(), project.bpm())
    }

    pub fn tracks(&self) -> &[RenderTrack] {
        &self.tracks
    }

    pub fn total_beats(&self) -> usize {
        self.total_beats
    }

    pub fn ms_per_beat(&self) -> u32 {
        self.ms_per_beat
    }

    /// Mix the job down to `sample_rate`/`channels`. The result and every
    /// buffer made on the way are owned by `arena`.
    pub fn render<'a>(
        &self,
        sample_rate: u32,
        channels: u16,
        arena: &'a mut RenderArena,
    ) -> Result<&'a PcmBuffer, ExportError> {
        let mut sources = Vec::with_capacity(self.tracks.len());
        let mut working: Option<(u32, u16)> = None;

        for track in &self.tracks {
            let decoded = bg_formats::decode_file(Path::new(&track.source_path))?;
            let (rate, chs) = *working.get_or_insert((decoded.sample_rate(), decoded.channels()));
            let key = if decoded.sample_rate() != rate || decoded.channels() != chs {
                let converted = bg_formats::convert(&decoded, rate, chs)?;
                arena.track(format!("source {}", track.name), decoded);
                arena.track(format!("converted {}", track.name), converted)
            } else {
                arena.track(format!("source {}", track.name), decoded)
            };
            sources.push(key);
        }

        let (rate, chs) = working.unwrap_or((sample_rate, channels));
        let mut mix = PcmBuffer::new(rate, chs);
        let beat_frames = mix.frames_for_ms(self.ms_per_beat);

        for (track, key) in self.tracks.iter().zip(sources) {
            let Some(source) = arena.get(key) else { continue };
            let mut lane = PcmBuffer::new(rate, chs);
            for (beat, _) in track.enabled.iter().enumerate().filter(|(_, on)| **on) {
                lane.mix_at(beat * beat_frames, source);
            }
            mix.mix_at(0, &lane);
            arena.track(format!("track {}", track.name), lane);
        }

        mix.pad_to(self.total_beats * beat_frames);
        log::debug!(
            target: "render",
            "mixed {} tracks: {} beats of {} frames at {} Hz/{}ch",
            self.tracks.len(),
            self.total_beats,
            beat_frames,
            rate,
            chs
        );

        let output = if rate == sample_rate && chs == channels {
            mix
        } else {
            let converted = bg_formats::convert(&mix, sample_rate, channels)?;
            arena.track("mix", mix);
            converted
        };
        let key = arena.track("output", output);
        arena
            .get(key)
            .ok_or_else(|| ExportError::Io(std::io::Error::other("render output missing")))
    }
}

/// Flatten a song's arrangement into one long pattern.
///
/// Slots run from 0 to the last enabled one, each `max_beat_count` beats
/// wide. Every instrument of every pattern gets one row: its real beats in
/// the slots its pattern is enabled at, disabled beats elsewhere.
pub fn song_pattern(song: &Song) -> Result<Pattern, ExportError> {
    let last_slot = song.max_enabled_slot().ok_or(ExportError::EmptyArrangement)?;
    let slots = last_slot + 1;
    let slot_beats = match song.max_beat_count() {
        0 => song.max_pattern_beats().max(1),
        n => n,
    };

    let mut flat = Pattern::new("Song", slots)?;
    flat.set_number_of_beats(slots * slot_beats)?;
    for slot in 0..slots {
        flat.set_item_enabled(slot, true)?;
    }

    for pattern in song.patterns() {
        for instrument in pattern.instruments() {
            let mut beats = Vec::with_capacity(slots * slot_beats);
            for slot in 0..slots {
                let live = pattern.is_item_enabled(slot);
                beats.extend(
                    instrument
                        .beats()
                        .iter()
                        .map(|b| Beat::new(live && b.is_enabled())),
                );
                beats.resize_with(beats.len() + slot_beats - instrument.beat_count(), Beat::default);
            }
            let row = Instrument::with_beats(instrument.name(), instrument.source_path(), beats);
            row.set_muted(instrument.is_muted());
            flat.push_instrument(row)?;
        }
    }
    log::debug!(
        target: "render",
        "song flattened to {} slots x {} beats, {} rows",
        slots,
        slot_beats,
        flat.instruments().len()
    );
    Ok(flat)
}
