// src/simulator.rs - Stand-in host replaying channel values from a YAML scenario
//!
//! A scenario lists the channel values of consecutive ticks:
//!
//! ```yaml
//! interval_ms: 100
//! repeat: false
//! ticks:
//!   - { 12: 0.0 }
//!   - { 12: 1.0, 45: 0.0 }
//!   - { 12: 0.0, 45: 3.5 }
//! ```
//!
//! Channels left out of a tick are absent from that snapshot.
//!
//! [`play`] loops a single sound file until interrupted, for trying out a
//! sound before assigning it to a channel.

use crate::audio::{AudioBackend, LoopingAudioPlayer};
use crate::channel::ChannelSnapshot;
use crate::error::Result;
use crate::module::{AppDirs, ModAlarm, ServerModule};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

fn default_interval_ms() -> u64 {
    100
}

/// Recorded sequence of channel values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Time between ticks
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Start over after the last tick until interrupted
    #[serde(default)]
    pub repeat: bool,

    #[serde(default)]
    pub ticks: Vec<BTreeMap<i32, f64>>,
}

impl Scenario {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    fn snapshot(&self, index: usize) -> ChannelSnapshot {
        self.ticks[index]
            .iter()
            .map(|(channel, value)| (*channel, *value))
            .collect()
    }
}

/// Totals of a simulator run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub started: usize,
    pub stopped: usize,
    pub failures: usize,
    pub interrupted: bool,
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Ctrl-C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Run the module through a scenario, stopping early on Ctrl-C.
pub async fn run(module: &mut ModAlarm, dirs: &AppDirs, scenario: &Scenario) -> Result<RunSummary> {
    run_until(module, dirs, scenario, ctrl_c()).await
}

/// Loop a sound file until Ctrl-C.
pub async fn play(backend: Arc<dyn AudioBackend>, path: &Path) -> Result<()> {
    play_until(backend, path, ctrl_c()).await
}

/// Loop a sound file until `shutdown` resolves. Fails right away when the
/// sound cannot be started.
pub async fn play_until(
    backend: Arc<dyn AudioBackend>,
    path: &Path,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let mut player = LoopingAudioPlayer::new(backend);
    player.start(path)?;
    info!("Playing {} until interrupted", path.display());

    shutdown.await;
    player.stop();
    Ok(())
}

/// Run the module through a scenario until it ends or `shutdown` resolves.
///
/// The module is started before the first tick and always stopped at the end.
pub async fn run_until(
    module: &mut ModAlarm,
    dirs: &AppDirs,
    scenario: &Scenario,
    shutdown: impl Future<Output = ()>,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    module.on_server_start(dirs);

    if scenario.ticks.is_empty() {
        warn!("Scenario has no ticks");
        module.on_server_stop();
        return Ok(summary);
    }

    let mut ticker = interval(scenario.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut index = 0;
    let result = loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Simulation interrupted after {} ticks", summary.ticks);
                summary.interrupted = true;
                break Ok(());
            }
            _ = ticker.tick() => {
                let snapshot = scenario.snapshot(index);
                let report = match module.tick(&snapshot) {
                    Ok(report) => report,
                    Err(e) => break Err(e),
                };
                summary.ticks += 1;
                summary.started += report.started.len();
                summary.stopped += report.stopped.len();
                summary.failures += report.failures.len();
                debug!("Tick {}: {} channels", summary.ticks, snapshot.len());

                index += 1;
                if index == scenario.ticks.len() {
                    if !scenario.repeat {
                        break Ok(());
                    }
                    index = 0;
                }
            }
        }
    };

    module.on_server_stop();
    result.map(|()| summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SilentBackend;
    use crate::config::AlarmConfig;
    use tempfile::TempDir;

    #[test]
    fn test_scenario_defaults() {
        let scenario = Scenario::from_yaml("ticks:\n  - {1: 0}\n  - {1: 2.5, 7: -1}\n").unwrap();
        assert_eq!(scenario.interval_ms, 100);
        assert!(!scenario.repeat);
        assert_eq!(scenario.ticks.len(), 2);
        assert_eq!(scenario.ticks[1][&7], -1.0);
    }

    #[test]
    fn test_scenario_rejects_garbage() {
        assert!(Scenario::from_yaml("ticks: 5").is_err());
    }

    fn setup() -> (TempDir, AppDirs) {
        let root = TempDir::new().unwrap();
        let dirs = AppDirs::new(root.path().join("config"), root.path().join("log"));
        std::fs::create_dir_all(&dirs.config_dir).unwrap();
        let sound = root.path().join("a.wav");
        std::fs::write(&sound, b"RIFF").unwrap();

        let mut config = AlarmConfig::new();
        assert!(config.add_channel(1, &sound));
        config.save(&dirs.config_file()).unwrap();
        (root, dirs)
    }

    #[tokio::test]
    async fn test_run_scenario() {
        let (_root, dirs) = setup();
        let scenario = Scenario {
            interval_ms: 1,
            repeat: false,
            ticks: vec![
                BTreeMap::from([(1, 0.0)]),
                BTreeMap::from([(1, 1.0)]),
                BTreeMap::from([(1, 1.0)]),
                BTreeMap::from([(1, 0.0)]),
            ],
        };

        let mut module = ModAlarm::new(Arc::new(SilentBackend));
        let summary = run_until(&mut module, &dirs, &scenario, std::future::pending())
            .await
            .unwrap();

        assert_eq!(summary.ticks, 4);
        assert_eq!(summary.started, 1);
        assert_eq!(summary.stopped, 1);
        assert!(!summary.interrupted);
        assert!(!module.is_running());
    }

    #[tokio::test]
    async fn test_play_until_shutdown() {
        let (root, _dirs) = setup();
        let sound = root.path().join("a.wav");

        play_until(
            Arc::new(SilentBackend),
            &sound,
            tokio::time::sleep(Duration::from_millis(5)),
        )
        .await
        .unwrap();

        let missing = root.path().join("missing.wav");
        assert!(matches!(
            play_until(Arc::new(SilentBackend), &missing, std::future::pending()).await,
            Err(crate::error::AlarmError::ResourceUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_repeat_until_shutdown() {
        let (_root, dirs) = setup();
        let scenario = Scenario {
            interval_ms: 1,
            repeat: true,
            ticks: vec![BTreeMap::from([(1, 1.0)]), BTreeMap::from([(1, 0.0)])],
        };

        let mut module = ModAlarm::new(Arc::new(SilentBackend));
        let summary = run_until(
            &mut module,
            &dirs,
            &scenario,
            tokio::time::sleep(Duration::from_millis(50)),
        )
        .await
        .unwrap();

        assert!(summary.interrupted);
        assert!(summary.ticks >= 2);
        assert!(summary.started >= 1);
        assert!(!module.is_running());
    }
}
