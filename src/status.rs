// src/status.rs - Module status report (ModAlarm.txt)
use crate::error::Result;
use crate::registry::{AlarmState, ChannelAlarmRegistry};
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Status file name inside the host log directory
pub const STATUS_FILE_NAME: &str = "ModAlarm.txt";

const TITLE: &str = "Sound Alarm Module";

/// Overall condition of the module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkState {
    /// Settings loaded, channels monitored
    Normal,
    /// Settings could not be loaded, nothing is monitored
    Error,
    /// Server stopped
    Stopped,
}

impl fmt::Display for WorkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkState::Normal => write!(f, "normal"),
            WorkState::Error => write!(f, "error"),
            WorkState::Stopped => write!(f, "stopped"),
        }
    }
}

/// One line of the channel listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStatus {
    pub channel: u16,
    pub sound_path: PathBuf,
    pub sound_present: bool,
    pub state: AlarmState,
    pub playing: bool,
}

/// Human readable snapshot of the module, rewritten on start and stop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub state: WorkState,
    pub backend: String,
    pub channels: Vec<ChannelStatus>,
}

impl StatusReport {
    pub fn new(state: WorkState, backend: impl Into<String>) -> Self {
        Self {
            state,
            backend: backend.into(),
            channels: Vec::new(),
        }
    }

    /// Report listing every channel of the registry
    pub fn from_registry(
        state: WorkState,
        backend: impl Into<String>,
        registry: &ChannelAlarmRegistry,
    ) -> Self {
        let channels = registry
            .entries()
            .map(|entry| ChannelStatus {
                channel: entry.channel().get(),
                sound_path: entry.sound_path().to_path_buf(),
                sound_present: entry.sound_path().is_file(),
                state: entry.state(),
                playing: entry.is_playing(),
            })
            .collect();
        Self {
            state,
            backend: backend.into(),
            channels,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "{}", TITLE)?;
        writeln!(out, "{}", "-".repeat(TITLE.len()))?;
        writeln!(out, "Version: {}", crate::VERSION)?;
        writeln!(out, "Built  : {}", crate::build_info::BUILD_TIMESTAMP)?;
        writeln!(out, "Output : {}", self.backend)?;
        writeln!(out, "State  : {}", self.state)?;
        writeln!(out)?;

        if self.channels.is_empty() {
            writeln!(out, "No alarm channels configured")?;
            return Ok(());
        }

        writeln!(out, "Channels:")?;
        for ch in &self.channels {
            write!(out, "  {:>5}  {}", ch.channel, ch.sound_path.display())?;
            if !ch.sound_present {
                write!(out, "  [missing]")?;
            }
            write!(out, "  {}", ch.state)?;
            if ch.playing {
                write!(out, " (playing)")?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    /// Rewrite the status file in `log_dir`
    pub fn write(&self, log_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(log_dir)?;
        let path = log_dir.join(STATUS_FILE_NAME);
        std::fs::write(&path, self.render())?;
        debug!("Status written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_render_channels() {
        let mut report = StatusReport::new(WorkState::Normal, "silent");
        report.channels.push(ChannelStatus {
            channel: 12,
            sound_path: PathBuf::from("/sounds/a.wav"),
            sound_present: true,
            state: AlarmState::Alarming,
            playing: true,
        });
        report.channels.push(ChannelStatus {
            channel: 45,
            sound_path: PathBuf::from("/sounds/b.wav"),
            sound_present: false,
            state: AlarmState::Quiet,
            playing: false,
        });

        let text = report.render();
        assert!(text.starts_with("Sound Alarm Module\n------------------\n"));
        assert!(text.contains("State  : normal"));
        assert!(text.contains("   12  /sounds/a.wav  alarming (playing)"));
        assert!(text.contains("   45  /sounds/b.wav  [missing]  quiet"));
    }

    #[test]
    fn test_render_empty_and_write() {
        let dir = TempDir::new().unwrap();
        let report = StatusReport::new(WorkState::Error, "silent");
        report.write(dir.path()).unwrap();

        let text = std::fs::read_to_string(dir.path().join(STATUS_FILE_NAME)).unwrap();
        assert!(text.contains("State  : error"));
        assert!(text.contains("No alarm channels configured"));
    }
}
