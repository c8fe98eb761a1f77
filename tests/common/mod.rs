// tests/common/mod.rs - Shared fixtures for integration and property tests
#![allow(dead_code)]

use mod_alarm::{AlarmConfig, AlarmError, AppDirs, AudioBackend, Playback, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// What the recording backend saw
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioEvent {
    Opened(PathBuf),
    Stopped(PathBuf),
}

/// Backend that records every open and stop instead of playing
#[derive(Debug, Default, Clone)]
pub struct RecordingBackend {
    events: Arc<Mutex<Vec<AudioEvent>>>,
}

struct RecordingPlayback {
    path: PathBuf,
    events: Arc<Mutex<Vec<AudioEvent>>>,
    stopped: bool,
}

impl Playback for RecordingPlayback {
    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.events
                .lock()
                .unwrap()
                .push(AudioEvent::Stopped(self.path.clone()));
        }
    }
}

impl AudioBackend for RecordingBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn Playback>> {
        if !path.is_file() {
            return Err(AlarmError::resource(path, "not found"));
        }
        self.events
            .lock()
            .unwrap()
            .push(AudioEvent::Opened(path.to_path_buf()));
        Ok(Box::new(RecordingPlayback {
            path: path.to_path_buf(),
            events: self.events.clone(),
            stopped: false,
        }))
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(&self) -> Arc<dyn AudioBackend> {
        Arc::new(self.clone())
    }

    pub fn events(&self) -> Vec<AudioEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn opened(&self) -> usize {
        self.count(|e| matches!(e, AudioEvent::Opened(_)))
    }

    pub fn stopped(&self) -> usize {
        self.count(|e| matches!(e, AudioEvent::Stopped(_)))
    }

    /// Playbacks opened and not yet stopped
    pub fn playing(&self) -> usize {
        self.opened() - self.stopped()
    }

    fn count(&self, f: impl Fn(&AudioEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| f(e)).count()
    }
}

/// Temporary host layout with config and log directories
pub struct Fixture {
    pub root: TempDir,
    pub dirs: AppDirs,
}

impl Fixture {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let dirs = AppDirs::new(root.path().join("config"), root.path().join("log"));
        std::fs::create_dir_all(&dirs.config_dir).unwrap();
        Self { root, dirs }
    }

    /// Create a sound file and return its path
    pub fn sound(&self, name: &str) -> PathBuf {
        let path = self.root.path().join(name);
        std::fs::write(&path, b"RIFF....WAVEfmt ").unwrap();
        path
    }

    pub fn write_config(&self, entries: &[(i64, &Path)]) {
        let mut config = AlarmConfig::new();
        for (channel, path) in entries {
            assert!(config.add_channel(*channel, path));
        }
        config.save(&self.dirs.config_file()).unwrap();
    }

    pub fn read_log(&self, name: &str) -> String {
        std::fs::read_to_string(self.dirs.log_dir.join(name)).unwrap()
    }
}
