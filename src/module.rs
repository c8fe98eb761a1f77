// src/module.rs - Server module lifecycle: start, per-tick evaluation, stop
//!
//! The host calls three hooks on a [`ServerModule`]: server start, the
//! periodic "current data calculated" tick (about every 100 ms) and server
//! stop. [`ModAlarm`] implements them on top of [`AlarmModule`], which holds
//! everything that exists only while the server runs.

use crate::audio::AudioBackend;
use crate::channel::ChannelSnapshot;
use crate::config::{config_file_path, AlarmConfig};
use crate::error::{AlarmError, Result};
use crate::journal::ActionJournal;
use crate::registry::ChannelAlarmRegistry;
use crate::state_machine::{AlarmStateMachine, TickReport};
use crate::status::{StatusReport, WorkState};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

/// Module name used in journal lines
pub const MODULE_NAME: &str = "ModAlarm";

/// Directories supplied by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDirs {
    pub config_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl AppDirs {
    pub fn new(config_dir: impl Into<PathBuf>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            log_dir: log_dir.into(),
        }
    }

    /// Full path of `ModAlarm.xml`
    pub fn config_file(&self) -> PathBuf {
        config_file_path(&self.config_dir)
    }
}

// ============================================================================
// RUNNING MODULE CONTEXT
// ============================================================================

/// State of a started module. Created on server start, consumed on stop.
#[derive(Debug)]
pub struct AlarmModule {
    dirs: AppDirs,
    state: WorkState,
    registry: ChannelAlarmRegistry,
    machine: AlarmStateMachine,
    journal: ActionJournal,
    backend_name: &'static str,
    ticks: u64,
}

impl AlarmModule {
    /// Start the module.
    ///
    /// Settings that cannot be loaded put the module in the `error` state:
    /// it keeps running but monitors nothing.
    pub fn start(dirs: AppDirs, backend: Arc<dyn AudioBackend>) -> Self {
        let mut journal = match ActionJournal::open(&dirs.log_dir) {
            Ok(journal) => journal,
            Err(e) => {
                warn!("Action journal unavailable, continuing without it: {}", e);
                ActionJournal::discard()
            }
        };
        journal_write(journal.write_break());
        journal_write(journal.write_action(&format!("Start module {}", MODULE_NAME)));

        let backend_name = backend.name();
        let config_file = dirs.config_file();
        let (registry, state) = match ChannelAlarmRegistry::load(&config_file, backend.clone()) {
            Ok(registry) => {
                for (channel, path) in registry.missing_sounds() {
                    warn!("Sound file for channel {} not found: {}", channel, path.display());
                    journal_write(journal.write_action(&format!(
                        "Sound file for channel {} not found: {}",
                        channel,
                        path.display()
                    )));
                }
                (registry, WorkState::Normal)
            }
            Err(e) => {
                error!("{}", e);
                journal_write(journal.write_error(&e.to_string()));
                journal_write(
                    journal.write_action("Normal module execution is impossible"),
                );
                (ChannelAlarmRegistry::new(backend), WorkState::Error)
            }
        };

        info!(
            "{} started: {} channels, state {}, output {}",
            MODULE_NAME,
            registry.len(),
            state,
            backend_name
        );

        let module = Self {
            dirs,
            state,
            registry,
            machine: AlarmStateMachine::new(),
            journal,
            backend_name,
            ticks: 0,
        };
        module.write_status();
        module
    }

    /// Evaluate one snapshot. Does nothing unless the module works normally.
    pub fn on_tick(&mut self, snapshot: &ChannelSnapshot) -> TickReport {
        if self.state != WorkState::Normal {
            return TickReport::default();
        }
        self.ticks += 1;

        let report = self.machine.evaluate(&mut self.registry, snapshot);

        for channel in &report.started {
            journal_write(self.journal.write_action(&format!("Alarm on channel {}", channel)));
        }
        for channel in &report.stopped {
            journal_write(
                self.journal
                    .write_action(&format!("Alarm cleared on channel {}", channel)),
            );
        }
        for (channel, e) in &report.failures {
            // Invalid values repeat every tick; only the tracing log gets those
            if matches!(e, AlarmError::ResourceUnavailable { .. }) {
                journal_write(
                    self.journal
                        .write_error(&format!("Channel {}: {}", channel, e)),
                );
            }
        }
        report
    }

    /// Stop every sound, write the final status and close the session.
    pub fn stop(mut self) {
        let stopped = self.registry.stop_all();
        self.state = WorkState::Stopped;
        self.write_status();

        journal_write(
            self.journal
                .write_action(&format!("Stop module {}", MODULE_NAME)),
        );
        journal_write(self.journal.write_break());
        journal_write(self.journal.flush());
        info!(
            "{} stopped after {} ticks ({} sounds stopped)",
            MODULE_NAME, self.ticks, stopped
        );
    }

    /// Swap in edited settings without restarting.
    ///
    /// A module in the `error` state starts monitoring once valid settings
    /// arrive.
    pub fn apply_config(&mut self, config: AlarmConfig) {
        self.registry.replace_config(config);
        if self.state == WorkState::Error {
            self.state = WorkState::Normal;
            info!("{} recovered with new settings", MODULE_NAME);
        }
        journal_write(self.journal.write_action("Module settings applied"));
        self.write_status();
    }

    /// Re-read `ModAlarm.xml` and apply it
    pub fn reload(&mut self) -> Result<()> {
        let config = AlarmConfig::load(&self.dirs.config_file())?;
        self.apply_config(config);
        Ok(())
    }

    pub fn state(&self) -> WorkState {
        self.state
    }

    pub fn dirs(&self) -> &AppDirs {
        &self.dirs
    }

    pub fn registry(&self) -> &ChannelAlarmRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ChannelAlarmRegistry {
        &mut self.registry
    }

    /// Number of ticks evaluated so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn status(&self) -> StatusReport {
        StatusReport::from_registry(self.state, self.backend_name, &self.registry)
    }

    fn write_status(&self) {
        if let Err(e) = self.status().write(&self.dirs.log_dir) {
            warn!("Status file not written: {}", e);
        }
    }
}

fn journal_write(result: Result<()>) {
    if let Err(e) = result {
        warn!("Action journal write failed: {}", e);
    }
}

// ============================================================================
// HOST ADAPTER
// ============================================================================

/// Hooks a SCADA server calls on its modules
pub trait ServerModule {
    fn name(&self) -> &str;

    fn on_server_start(&mut self, dirs: &AppDirs);

    fn on_server_stop(&mut self);

    /// Called after the current data slice is calculated.
    ///
    /// `cnl_nums` lists the channels the host calculated in this slice.
    fn on_cur_data_calculated(&mut self, cnl_nums: &[i32], snapshot: &ChannelSnapshot);
}

/// The sound alarm server module
pub struct ModAlarm {
    ctx: Option<AlarmModule>,
    backend: Arc<dyn AudioBackend>,
}

impl ModAlarm {
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self { ctx: None, backend }
    }

    pub fn is_running(&self) -> bool {
        self.ctx.is_some()
    }

    pub fn module(&self) -> Option<&AlarmModule> {
        self.ctx.as_ref()
    }

    pub fn module_mut(&mut self) -> Option<&mut AlarmModule> {
        self.ctx.as_mut()
    }

    /// Evaluate a snapshot, failing when the server is not running
    pub fn tick(&mut self, snapshot: &ChannelSnapshot) -> Result<TickReport> {
        self.ctx
            .as_mut()
            .map(|ctx| ctx.on_tick(snapshot))
            .ok_or(AlarmError::NotRunning)
    }
}

impl Default for ModAlarm {
    fn default() -> Self {
        Self::new(crate::audio::default_backend())
    }
}

impl std::fmt::Debug for ModAlarm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModAlarm")
            .field("ctx", &self.ctx)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl ServerModule for ModAlarm {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    fn on_server_start(&mut self, dirs: &AppDirs) {
        if let Some(previous) = self.ctx.take() {
            warn!("Server start without stop, restarting {}", MODULE_NAME);
            previous.stop();
        }
        self.ctx = Some(AlarmModule::start(dirs.clone(), self.backend.clone()));
    }

    fn on_server_stop(&mut self) {
        match self.ctx.take() {
            Some(ctx) => ctx.stop(),
            None => debug!("Server stop while {} was not started", MODULE_NAME),
        }
    }

    fn on_cur_data_calculated(&mut self, cnl_nums: &[i32], snapshot: &ChannelSnapshot) {
        match self.ctx.as_mut() {
            Some(ctx) => {
                let _ = ctx.on_tick(snapshot);
            }
            None => debug!("Tick with {} channels before server start", cnl_nums.len()),
        }
    }
}

// ============================================================================
// SHARED HANDLE
// ============================================================================

/// Thread-safe handle for hosts that edit settings from another thread.
///
/// Settings edits and tick evaluation take the same lock, so an edit is never
/// applied halfway through a tick.
#[derive(Debug, Clone)]
pub struct SharedModule(Arc<Mutex<ModAlarm>>);

impl SharedModule {
    pub fn new(module: ModAlarm) -> Self {
        Self(Arc::new(Mutex::new(module)))
    }

    /// Lock the module. A panic on another thread does not lock it out.
    pub fn lock(&self) -> MutexGuard<'_, ModAlarm> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn start(&self, dirs: &AppDirs) {
        self.lock().on_server_start(dirs);
    }

    pub fn stop(&self) {
        self.lock().on_server_stop();
    }

    pub fn tick(&self, snapshot: &ChannelSnapshot) -> Result<TickReport> {
        self.lock().tick(snapshot)
    }

    /// Run an edit against the live registry
    pub fn edit<R>(&self, f: impl FnOnce(&mut ChannelAlarmRegistry) -> R) -> Result<R> {
        let mut guard = self.lock();
        let ctx = guard.module_mut().ok_or(AlarmError::NotRunning)?;
        Ok(f(ctx.registry_mut()))
    }

    /// Apply edited settings to the running module
    pub fn apply_config(&self, config: AlarmConfig) -> Result<()> {
        let mut guard = self.lock();
        let ctx = guard.module_mut().ok_or(AlarmError::NotRunning)?;
        ctx.apply_config(config);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SilentBackend;
    use crate::channel::ChannelId;
    use crate::journal::LOG_FILE_NAME;
    use crate::registry::AlarmState;
    use crate::status::STATUS_FILE_NAME;
    use std::path::Path;
    use tempfile::TempDir;

    fn dirs(root: &TempDir) -> AppDirs {
        AppDirs::new(root.path().join("config"), root.path().join("log"))
    }

    fn write_config(dirs: &AppDirs, entries: &[(i64, &Path)]) {
        std::fs::create_dir_all(&dirs.config_dir).unwrap();
        let mut config = AlarmConfig::new();
        for (channel, path) in entries {
            assert!(config.add_channel(*channel, path));
        }
        config.save(&dirs.config_file()).unwrap();
    }

    #[test]
    fn test_missing_config_is_degraded_mode() {
        let root = TempDir::new().unwrap();
        let mut module = AlarmModule::start(dirs(&root), Arc::new(SilentBackend));

        assert_eq!(module.state(), WorkState::Error);
        let report = module.on_tick(&ChannelSnapshot::new().with(1, 1.0));
        assert!(report.is_unchanged());
        assert_eq!(module.ticks(), 0);

        let log_dir = module.dirs().log_dir.clone();
        let status = std::fs::read_to_string(log_dir.join(STATUS_FILE_NAME)).unwrap();
        assert!(status.contains("State  : error"));

        module.stop();
        let journal = std::fs::read_to_string(log_dir.join(LOG_FILE_NAME)).unwrap();
        assert!(journal.contains("Normal module execution is impossible"));
        assert!(journal.contains("Stop module ModAlarm"));
    }

    #[test]
    fn test_lifecycle_writes_status_and_journal() {
        let root = TempDir::new().unwrap();
        let dirs = dirs(&root);
        let sound = root.path().join("a.wav");
        std::fs::write(&sound, b"RIFF").unwrap();
        write_config(&dirs, &[(7, sound.as_path())]);

        let mut module = AlarmModule::start(dirs.clone(), Arc::new(SilentBackend));
        assert_eq!(module.state(), WorkState::Normal);

        let report = module.on_tick(&ChannelSnapshot::new().with(7, 1.0));
        assert_eq!(report.started, vec![ChannelId::new(7)]);
        assert!(module.registry().get(ChannelId::new(7)).unwrap().is_audible());
        module.stop();

        let status = std::fs::read_to_string(dirs.log_dir.join(STATUS_FILE_NAME)).unwrap();
        assert!(status.contains("State  : stopped"));
        assert!(status.contains("quiet"));

        let journal = std::fs::read_to_string(dirs.log_dir.join(LOG_FILE_NAME)).unwrap();
        let lines: Vec<&str> = journal.lines().collect();
        assert!(lines.first().unwrap().starts_with("---"));
        assert!(lines.last().unwrap().starts_with("---"));
        assert!(journal.contains("Start module ModAlarm"));
        assert!(journal.contains("Alarm on channel 7"));
    }

    #[test]
    fn test_missing_sound_is_reported_at_start() {
        let root = TempDir::new().unwrap();
        let dirs = dirs(&root);
        let sound = root.path().join("gone.wav");
        std::fs::write(&sound, b"RIFF").unwrap();
        write_config(&dirs, &[(3, sound.as_path())]);
        std::fs::remove_file(&sound).unwrap();

        let mut module = AlarmModule::start(dirs.clone(), Arc::new(SilentBackend));
        assert_eq!(module.state(), WorkState::Normal);
        assert!(module.status().render().contains("[missing]"));

        let report = module.on_tick(&ChannelSnapshot::new().with(3, 1.0));
        assert!(report.has_failures());
        assert_eq!(module.registry().state(ChannelId::new(3)), Some(AlarmState::Alarming));
        module.stop();

        let journal = std::fs::read_to_string(dirs.log_dir.join(LOG_FILE_NAME)).unwrap();
        assert!(journal.contains("Sound file for channel 3 not found"));
    }

    #[test]
    fn test_apply_config_recovers_error_state() {
        let root = TempDir::new().unwrap();
        let sound = root.path().join("a.wav");
        std::fs::write(&sound, b"RIFF").unwrap();

        let mut module = AlarmModule::start(dirs(&root), Arc::new(SilentBackend));
        assert_eq!(module.state(), WorkState::Error);

        let mut config = AlarmConfig::new();
        assert!(config.add_channel(2, &sound));
        module.apply_config(config);
        assert_eq!(module.state(), WorkState::Normal);
        assert_eq!(module.on_tick(&ChannelSnapshot::new().with(2, 1.0)).started.len(), 1);
    }

    #[test]
    fn test_host_adapter() {
        let root = TempDir::new().unwrap();
        let dirs = dirs(&root);
        let mut module = ModAlarm::new(Arc::new(SilentBackend));
        assert_eq!(module.name(), "ModAlarm");

        assert!(matches!(
            module.tick(&ChannelSnapshot::new()),
            Err(AlarmError::NotRunning)
        ));
        module.on_cur_data_calculated(&[1], &ChannelSnapshot::new().with(1, 1.0));

        module.on_server_start(&dirs);
        assert!(module.is_running());
        module.on_cur_data_calculated(&[1], &ChannelSnapshot::new().with(1, 1.0));
        module.on_server_stop();
        module.on_server_stop();
        assert!(!module.is_running());
    }

    #[test]
    fn test_shared_module_edit() {
        let root = TempDir::new().unwrap();
        let dirs = dirs(&root);
        let sound = root.path().join("a.wav");
        std::fs::write(&sound, b"RIFF").unwrap();
        write_config(&dirs, &[]);

        let shared = SharedModule::new(ModAlarm::new(Arc::new(SilentBackend)));
        assert!(matches!(
            shared.edit(|r| r.len()),
            Err(AlarmError::NotRunning)
        ));

        shared.start(&dirs);
        let other = shared.clone();
        let added = std::thread::spawn(move || other.edit(|r| r.add_channel(9, &sound)).unwrap())
            .join()
            .unwrap();
        assert!(added);

        let report = shared.tick(&ChannelSnapshot::new().with(9, 4.0)).unwrap();
        assert_eq!(report.started, vec![ChannelId::new(9)]);
        shared.stop();
    }
}
