//! Ownership of every intermediate buffer made during a render.
//!
//! Buffers are tracked in a slot map and released together, newest first,
//! when the arena is dropped. That happens on success, on an early `?`
//! return and on unwind alike.

use bg_ir::PcmBuffer;
use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Handle to a buffer owned by a [`RenderArena`].
    pub struct BufferKey;
}

/// Called with each buffer's label as it is released.
pub type ReleaseObserver = Box<dyn FnMut(&str) + Send>;

struct Entry {
    label: String,
    pcm: PcmBuffer,
}

#[derive(Default)]
pub struct RenderArena {
    buffers: SlotMap<BufferKey, Entry>,
    order: Vec<BufferKey>,
    on_release: Option<ReleaseObserver>,
}

impl RenderArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(observer: ReleaseObserver) -> Self {
        Self {
            buffers: SlotMap::with_key(),
            order: Vec::new(),
            on_release: Some(observer),
        }
    }

    /// Take ownership of `pcm` until the arena is dropped.
    pub fn track(&mut self, label: impl Into<String>, pcm: PcmBuffer) -> BufferKey {
        let label = label.into();
        log::trace!(target: "tracker", "track {} ({} frames)", label, pcm.frames());
        let key = self.buffers.insert(Entry { label, pcm });
        self.order.push(key);
        key
    }

    pub fn get(&self, key: BufferKey) -> Option<&PcmBuffer> {
        self.buffers.get(key).map(|e| &e.pcm)
    }

    pub fn get_mut(&mut self, key: BufferKey) -> Option<&mut PcmBuffer> {
        self.buffers.get_mut(key).map(|e| &mut e.pcm)
    }

    pub fn label(&self, key: BufferKey) -> Option<&str> {
        self.buffers.get(key).map(|e| e.label.as_str())
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

impl Drop for RenderArena {
    fn drop(&mut self) {
        for key in self.order.drain(..).rev() {
            let Some(entry) = self.buffers.remove(key) else {
                continue;
            };
            log::trace!(target: "tracker", "release {}", entry.label);
            if let Some(observer) = self.on_release.as_mut() {
                observer(&entry.label);
            }
        }
    }
}
