//! The seam between voices and whatever plays them.

use std::sync::Arc;

use bg_ir::PcmBuffer;

use crate::EngineError;

slotmap::new_key_type! {
    /// Handle to one allocated playback slot on a bus.
    pub struct VoiceKey;
}

/// An output that can hold decoded buffers and play them from the start.
///
/// Implementations are shared between the control thread and clock threads.
pub trait OutputBus: Send + Sync {
    /// Rate buffers are played at.
    fn sample_rate(&self) -> u32;

    /// Bind `pcm` to a new slot.
    fn allocate(&self, pcm: Arc<PcmBuffer>) -> Result<VoiceKey, EngineError>;

    /// Rewind the slot to frame 0 and start it at `gain`.
    fn start(&self, key: VoiceKey, gain: f32);

    /// Halt the slot and drop anything still pending.
    fn flush(&self, key: VoiceKey);

    /// Free the slot and its buffer. Unknown keys are ignored.
    fn release(&self, key: VoiceKey);
}
