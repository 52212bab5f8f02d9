//! Decoded sample cache keyed by source path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use bg_ir::PcmBuffer;

use crate::EngineError;

/// Decodes each source file once, already converted to the playback rate.
///
/// Shared by every player of a session so a song decodes a kit once no
/// matter how many slots use it.
pub struct SampleBank {
    sample_rate: u32,
    cache: Mutex<HashMap<PathBuf, Arc<PcmBuffer>>>,
}

impl SampleBank {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Return the cached buffer for `path`, decoding it on first use.
    pub fn load(&self, path: &Path) -> Result<Arc<PcmBuffer>, EngineError> {
        if let Some(pcm) = self.lock().get(path) {
            return Ok(Arc::clone(pcm));
        }

        let decoded = bg_formats::decode_file(path)?;
        let pcm = Arc::new(bg_formats::convert(
            &decoded,
            self.sample_rate,
            decoded.channels(),
        )?);
        log::debug!(
            target: "bank",
            "cached {} ({} frames at {} Hz)",
            path.display(),
            pcm.frames(),
            self.sample_rate
        );

        let mut cache = self.lock();
        let entry = cache.entry(path.to_path_buf()).or_insert(pcm);
        Ok(Arc::clone(entry))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every cached buffer. Voices keep the buffers they hold.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Arc<PcmBuffer>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
