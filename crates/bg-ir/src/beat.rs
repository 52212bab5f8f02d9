//! Beat flags and song arrangement items.

use core::sync::atomic::{AtomicBool, Ordering};

/// A boolean shared between the editing thread and a running player.
///
/// Reads and writes are `Relaxed`: the last write wins and a player picks the
/// new value up on its next tick.
#[derive(Debug, Default)]
pub struct Flag(AtomicBool);

impl Flag {
    pub const fn new(value: bool) -> Self {
        Self(AtomicBool::new(value))
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, value: bool) {
        self.0.store(value, Ordering::Relaxed);
    }

    /// Flip the flag and return the new value.
    pub fn toggle(&self) -> bool {
        !self.0.fetch_xor(true, Ordering::Relaxed)
    }
}

impl Clone for Flag {
    fn clone(&self) -> Self {
        Self::new(self.get())
    }
}

impl From<bool> for Flag {
    fn from(value: bool) -> Self {
        Self::new(value)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Flag {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(self.get())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Flag {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        <bool as serde::Deserialize>::deserialize(deserializer).map(Flag::new)
    }
}

/// One trigger slot of an instrument.
///
/// `enabled` is the persisted user choice. `playing` marks the beat the
/// player cursor is on and is never saved.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Beat {
    enabled: Flag,
    #[cfg_attr(feature = "serde", serde(skip))]
    playing: Flag,
}

impl Beat {
    pub const fn new(enabled: bool) -> Self {
        Self {
            enabled: Flag::new(enabled),
            playing: Flag::new(false),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    pub fn toggle(&self) -> bool {
        self.enabled.toggle()
    }

    pub fn is_playing(&self) -> bool {
        self.playing.get()
    }

    pub fn set_playing(&self, playing: bool) {
        self.playing.set(playing);
    }
}

/// One slot of the song timeline for a single pattern.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PatternItem {
    pub enabled: bool,
}

impl PatternItem {
    pub const fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}
