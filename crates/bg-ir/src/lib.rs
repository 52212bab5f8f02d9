//! Core data model for beatgrid.
//!
//! This crate defines the beat grid shared by the playback engine and the
//! offline renderer: instruments with per-beat trigger flags, patterns that
//! keep every instrument the same length, the song arrangement, and the
//! legacy channel/measure grid.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod beat;
mod channel;
mod error;
mod instrument;
mod pattern;
mod pcm;
mod project;
mod song;

pub use beat::{Beat, Flag, PatternItem};
pub use channel::{Channel, Measure};
pub use error::ModelError;
pub use instrument::{name_from_path, Instrument};
pub use pattern::{Pattern, DEFAULT_BEATS};
pub use pcm::{PcmBuffer, BYTES_PER_SAMPLE};
pub use project::{
    Project, DEFAULT_BPM, MAX_BEATS_PER_MEASURE, MAX_BPM, MAX_MEASURES, MIN_BPM,
    PATTERN_ITEM_CAPACITY,
};
pub use song::Song;
