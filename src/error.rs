use std::path::PathBuf;
use thiserror::Error;

/// Application level error type used throughout the crate.
#[derive(Error, Debug)]
pub enum AlarmError {
    /// I/O related failure
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),

    /// Module settings could not be read or parsed
    #[error("Error loading module settings: {0}")]
    ConfigLoad(String),

    /// Module settings could not be written
    #[error("Error saving module settings: {0}")]
    ConfigSave(String),

    /// Sound file missing or not decodable when playback was requested
    #[error("Sound resource unavailable: {}: {}", .path.display(), .reason)]
    ResourceUnavailable { path: PathBuf, reason: String },

    /// Rejected channel add/update
    #[error("Invalid channel settings: {0}")]
    Validation(#[from] ValidationError),

    /// Channel value that cannot be compared against the alarm threshold
    #[error("Channel {channel} has invalid value {value}")]
    InvalidValue { channel: u16, value: f64 },

    /// Error while parsing a YAML simulator scenario
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Operation needs a started module
    #[error("Module is not running")]
    NotRunning,
}

/// Reasons an alarm channel entry is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("channel number {0} is outside 0..=65535")]
    ChannelOutOfRange(i64),

    #[error("sound file path is empty")]
    EmptyPath,

    #[error("sound file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("channel {0} is already configured")]
    DuplicateChannel(u16),

    #[error("channel {0} is not configured")]
    UnknownChannel(i64),
}

/// Convenient alias over [`Result`] using [`AlarmError`]
pub type Result<T> = std::result::Result<T, AlarmError>;

impl AlarmError {
    /// Build a [`AlarmError::ResourceUnavailable`] from any displayable cause.
    pub fn resource(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        AlarmError::ResourceUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
