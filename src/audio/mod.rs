// src/audio/mod.rs - Looping alarm sound playback
//!
//! Playback is split in two layers. [`AudioBackend`] opens a sound file and
//! starts an endless playback of it, returning a [`Playback`] handle that owns
//! whatever output resources the backend claimed. [`LoopingAudioPlayer`] wraps
//! one such handle with start/stop/replace semantics.
//!
//! Backends:
//! - [`SilentBackend`] checks that a sound file can be read and plays nothing.
//! - `RodioBackend` (feature `audio`) streams the file through a decoder on its
//!   own playback thread and output stream, looping with [`LoopingSource`].

mod looping;
#[cfg(feature = "audio")]
mod output;

pub use looping::{LoopingSource, RewindableSource};
#[cfg(feature = "audio")]
pub use output::RodioBackend;

use crate::error::{AlarmError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// A running playback. Dropping or stopping it releases its output resources.
pub trait Playback: Send {
    /// Halt playback and release resources. Must be safe to call twice.
    fn stop(&mut self);
}

/// Opens sound resources for endless playback.
pub trait AudioBackend: Send + Sync {
    /// Open `path` and start looping it.
    ///
    /// Fails with [`AlarmError::ResourceUnavailable`] when the file cannot be
    /// opened or decoded.
    fn open(&self, path: &Path) -> Result<Box<dyn Playback>>;

    /// Short name shown in the status report
    fn name(&self) -> &'static str {
        "custom"
    }
}

/// Backend for builds without audio output.
///
/// The sound file is still read so that a missing or empty file is reported
/// the same way a real backend would report it.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentBackend;

struct SilentPlayback {
    path: PathBuf,
    stopped: bool,
}

impl Playback for SilentPlayback {
    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            debug!("Silent playback of {} stopped", self.path.display());
        }
    }
}

impl AudioBackend for SilentBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn Playback>> {
        let data = std::fs::read(path).map_err(|e| AlarmError::resource(path, e))?;
        if data.is_empty() {
            return Err(AlarmError::resource(path, "no audio data"));
        }
        debug!("Silent playback of {} ({} bytes)", path.display(), data.len());
        Ok(Box::new(SilentPlayback {
            path: path.to_path_buf(),
            stopped: false,
        }))
    }

    fn name(&self) -> &'static str {
        "silent"
    }
}

/// Backend used by the module when the host does not supply one
pub fn default_backend() -> Arc<dyn AudioBackend> {
    #[cfg(feature = "audio")]
    let backend: Arc<dyn AudioBackend> = Arc::new(RodioBackend::new());
    #[cfg(not(feature = "audio"))]
    let backend: Arc<dyn AudioBackend> = Arc::new(SilentBackend);
    backend
}

struct ActivePlayback {
    path: PathBuf,
    playback: Box<dyn Playback>,
}

/// Plays one sound file on an endless loop until stopped.
pub struct LoopingAudioPlayer {
    backend: Arc<dyn AudioBackend>,
    active: Option<ActivePlayback>,
}

impl LoopingAudioPlayer {
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            backend,
            active: None,
        }
    }

    /// Start looping `path`, replacing anything this player is already playing.
    pub fn start(&mut self, path: &Path) -> Result<()> {
        self.stop();
        let playback = self.backend.open(path)?;
        info!("Alarm sound started: {}", path.display());
        self.active = Some(ActivePlayback {
            path: path.to_path_buf(),
            playback,
        });
        Ok(())
    }

    /// Stop playback. No-op when nothing is playing.
    pub fn stop(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.playback.stop();
            info!("Alarm sound stopped: {}", active.path.display());
        }
    }

    pub fn is_playing(&self) -> bool {
        self.active.is_some()
    }

    /// File currently being played
    pub fn path(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.path.as_path())
    }
}

impl Drop for LoopingAudioPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for LoopingAudioPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopingAudioPlayer")
            .field("path", &self.path())
            .finish()
    }
}
