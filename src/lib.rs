//! mod-alarm - Sound alarm module for a SCADA server
//!
//! Watches a configured set of input channels and plays a looping alarm sound
//! for every channel whose value turns non-zero, stopping it when the value
//! returns to zero.
//!
//! # Feature Flags
//!
//! - `audio`: play sounds through the default output device with `rodio`.
//!   Without it the module validates sound files but stays silent.
//!
//! # Examples
//!
//! ```rust,no_run
//! use mod_alarm::{AppDirs, ChannelSnapshot, ModAlarm, ServerModule};
//!
//! mod_alarm::init();
//!
//! let dirs = AppDirs::new("/opt/scada/config", "/opt/scada/log");
//! let mut module = ModAlarm::default();
//!
//! module.on_server_start(&dirs);
//! module.on_cur_data_calculated(&[12], &ChannelSnapshot::new().with(12, 1.0));
//! module.on_server_stop();
//! ```

// ============================================================================
// CORE MODULES
// ============================================================================

/// Error types shared by the whole crate
pub mod error;

/// Channel identifiers and value snapshots
pub mod channel;

/// `ModAlarm.xml` settings
pub mod config;

/// Looping sound playback and output backends
pub mod audio;

/// Configured alarms with live state and playback
pub mod registry;

/// Per-tick alarm evaluation
pub mod state_machine;

// ============================================================================
// HOST INTEGRATION
// ============================================================================

/// Server module lifecycle and host hooks
pub mod module;

/// Action journal (`ModAlarm.log`)
pub mod journal;

/// Status report (`ModAlarm.txt`)
pub mod status;

/// Settings edit session
pub mod editor;

/// Scenario driven stand-in host
pub mod simulator;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use audio::{default_backend, AudioBackend, LoopingAudioPlayer, Playback, SilentBackend};
#[cfg(feature = "audio")]
pub use audio::RodioBackend;
pub use channel::{ChannelId, ChannelSnapshot};
pub use config::{AlarmConfig, CONFIG_FILE_NAME};
pub use editor::ConfigEditor;
pub use error::{AlarmError, Result, ValidationError};
pub use module::{AlarmModule, AppDirs, ModAlarm, ServerModule, SharedModule};
pub use registry::{AlarmState, ChannelAlarmEntry, ChannelAlarmRegistry, PlaybackSlot};
pub use simulator::{RunSummary, Scenario};
pub use state_machine::{AlarmStateMachine, TickReport, DEFAULT_THRESHOLD};
pub use status::{StatusReport, WorkState};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Values recorded by the build script
pub mod build_info {
    /// UTC time the crate was built
    pub const BUILD_TIMESTAMP: &str = match option_env!("MOD_ALARM_BUILD_TIMESTAMP") {
        Some(timestamp) => timestamp,
        None => "unknown",
    };
}

/// Set up diagnostics for hosts that embed the module.
///
/// Installs a `tracing` subscriber filtered by `RUST_LOG`, defaulting to
/// `mod_alarm=info`. An already installed subscriber is left alone.
pub fn init() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mod_alarm=info"));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false));

    if subscriber.try_init().is_ok() {
        tracing::debug!("mod-alarm {} diagnostics initialized", VERSION);
    }
}
