// src/journal.rs - Append-only action journal (ModAlarm.log)
use crate::error::Result;
use chrono::{DateTime, Local};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Journal file name inside the host log directory
pub const LOG_FILE_NAME: &str = "ModAlarm.log";

const BREAK_LINE_WIDTH: usize = 80;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamped record of what the module did, one line per action.
///
/// Sessions are separated by break lines written at start and stop. The file
/// is written unbuffered, so every line is on disk once the call returns.
pub struct ActionJournal {
    path: Option<PathBuf>,
    writer: Box<dyn Write + Send>,
}

impl ActionJournal {
    /// Open (or create) the journal in `log_dir` for appending
    pub fn open(log_dir: &Path) -> Result<Self> {
        fs::create_dir_all(log_dir)?;
        let path = log_dir.join(LOG_FILE_NAME);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!("Action journal opened: {}", path.display());
        Ok(Self {
            path: Some(path),
            writer: Box::new(file),
        })
    }

    /// Journal that writes to an arbitrary sink
    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            path: None,
            writer: Box::new(writer),
        }
    }

    /// Journal that discards everything
    pub fn discard() -> Self {
        Self::from_writer(io::sink())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Session delimiter
    pub fn write_break(&mut self) -> Result<()> {
        writeln!(self.writer, "{}", "-".repeat(BREAK_LINE_WIDTH))?;
        Ok(())
    }

    pub fn write_action(&mut self, text: &str) -> Result<()> {
        self.write_action_at(Local::now(), text)
    }

    pub fn write_error(&mut self, text: &str) -> Result<()> {
        self.write_action(&format!("Error: {}", text))
    }

    fn write_action_at(&mut self, time: DateTime<Local>, text: &str) -> Result<()> {
        writeln!(self.writer, "{} {}", time.format(TIMESTAMP_FORMAT), text)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for ActionJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionJournal")
            .field("path", &self.path)
            .finish()
    }
}
