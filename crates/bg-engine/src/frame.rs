//! Audio frame type.

/// A stereo audio frame in f32, nominally within [-1, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Frame {
    pub left: f32,
    pub right: f32,
}

impl Frame {
    /// Create a silent frame.
    pub const fn silence() -> Self {
        Self {
            left: 0.0,
            right: 0.0,
        }
    }

    /// Create a mono frame (same value for both channels).
    pub const fn mono(value: f32) -> Self {
        Self {
            left: value,
            right: value,
        }
    }

    /// Read one interleaved PCM frame. Mono is centred, extra channels
    /// beyond the first two are ignored.
    pub fn from_samples(samples: &[f32]) -> Self {
        match samples {
            [] => Self::silence(),
            [m] => Self::mono(*m),
            [l, r, ..] => Self { left: *l, right: *r },
        }
    }

    /// Mix another frame into this one. No clamping: the device clamps.
    pub fn mix(&mut self, other: Frame) {
        self.left += other.left;
        self.right += other.right;
    }

    /// Scale both channels.
    pub fn scaled(self, gain: f32) -> Self {
        Self {
            left: self.left * gain,
            right: self.right * gain,
        }
    }

    /// Both channels limited to [-1, 1].
    pub fn clamped(self) -> Self {
        Self {
            left: self.left.clamp(-1.0, 1.0),
            right: self.right.clamp(-1.0, 1.0),
        }
    }

    pub fn is_silent(&self) -> bool {
        self.left == 0.0 && self.right == 0.0
    }
}
