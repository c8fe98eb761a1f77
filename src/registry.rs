// src/registry.rs - Configured alarms with their live state and playback
use crate::audio::{AudioBackend, LoopingAudioPlayer};
use crate::channel::ChannelId;
use crate::config::AlarmConfig;
use crate::error::{AlarmError, Result, ValidationError};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

// ============================================================================
// ENTRY TYPES
// ============================================================================

/// Alarm state of one channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AlarmState {
    /// Channel value is zero or has not been seen yet
    #[default]
    Quiet,
    /// Channel value is non-zero
    Alarming,
}

impl AlarmState {
    pub fn is_alarming(self) -> bool {
        self == AlarmState::Alarming
    }
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlarmState::Quiet => write!(f, "quiet"),
            AlarmState::Alarming => write!(f, "alarming"),
        }
    }
}

/// Playback resource of one channel
#[derive(Debug, Default)]
pub enum PlaybackSlot {
    #[default]
    Idle,
    Playing(LoopingAudioPlayer),
}

impl PlaybackSlot {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackSlot::Playing(_))
    }
}

/// One configured alarm.
///
/// The slot is `Playing` only while the state is `Alarming` and the sound file
/// was opened successfully. An alarm whose sound failed to open stays
/// `Alarming` with an `Idle` slot until the channel goes quiet again.
#[derive(Debug)]
pub struct ChannelAlarmEntry {
    channel: ChannelId,
    sound_path: PathBuf,
    state: AlarmState,
    slot: PlaybackSlot,
}

impl ChannelAlarmEntry {
    fn new(channel: ChannelId, sound_path: PathBuf) -> Self {
        Self {
            channel,
            sound_path,
            state: AlarmState::Quiet,
            slot: PlaybackSlot::Idle,
        }
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn sound_path(&self) -> &Path {
        &self.sound_path
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    pub fn slot(&self) -> &PlaybackSlot {
        &self.slot
    }

    pub fn is_playing(&self) -> bool {
        self.slot.is_playing()
    }

    /// Alarming with the sound actually playing
    pub fn is_audible(&self) -> bool {
        self.state.is_alarming() && self.slot.is_playing()
    }

    /// Release the playback resource; true if something was playing
    fn release(&mut self) -> bool {
        match std::mem::take(&mut self.slot) {
            PlaybackSlot::Playing(mut player) => {
                player.stop();
                true
            }
            PlaybackSlot::Idle => false,
        }
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Owns every configured alarm, its state and its playback handle.
pub struct ChannelAlarmRegistry {
    config: AlarmConfig,
    entries: BTreeMap<ChannelId, ChannelAlarmEntry>,
    backend: Arc<dyn AudioBackend>,
}

impl ChannelAlarmRegistry {
    /// Empty registry
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self::from_config(AlarmConfig::new(), backend)
    }

    /// Registry with every configured channel `Quiet`
    pub fn from_config(config: AlarmConfig, backend: Arc<dyn AudioBackend>) -> Self {
        let entries = config
            .iter()
            .map(|(channel, path)| (channel, ChannelAlarmEntry::new(channel, path.to_path_buf())))
            .collect();
        Self {
            config,
            entries,
            backend,
        }
    }

    /// Load the settings file into a fresh registry
    pub fn load(path: &Path, backend: Arc<dyn AudioBackend>) -> Result<Self> {
        let config = AlarmConfig::load(path)?;
        info!("Loaded {} alarm channels from {}", config.len(), path.display());
        Ok(Self::from_config(config, backend))
    }

    /// Persist the current channel mapping
    pub fn save(&self, path: &Path) -> Result<()> {
        self.config.save(path)
    }

    /// Current channel mapping
    pub fn config(&self) -> &AlarmConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, channel: ChannelId) -> Option<&ChannelAlarmEntry> {
        self.entries.get(&channel)
    }

    pub fn state(&self, channel: ChannelId) -> Option<AlarmState> {
        self.entries.get(&channel).map(ChannelAlarmEntry::state)
    }

    /// Entries in ascending channel order
    pub fn entries(&self) -> impl Iterator<Item = &ChannelAlarmEntry> + '_ {
        self.entries.values()
    }

    /// Configured channels whose sound file does not exist right now
    pub fn missing_sounds(&self) -> Vec<(ChannelId, &Path)> {
        self.entries
            .values()
            .filter(|e| !e.sound_path.is_file())
            .map(|e| (e.channel, e.sound_path.as_path()))
            .collect()
    }

    // ------------------------------------------------------------------------
    // Configuration edits
    // ------------------------------------------------------------------------

    pub fn try_add_channel(
        &mut self,
        channel: i64,
        path: impl AsRef<Path>,
    ) -> std::result::Result<ChannelId, ValidationError> {
        let path = path.as_ref();
        let id = self.config.try_add_channel(channel, path)?;
        self.entries
            .insert(id, ChannelAlarmEntry::new(id, path.to_path_buf()));
        debug!("Alarm added: channel {} -> {}", id, path.display());
        Ok(id)
    }

    /// Add an alarm; false when the channel or sound file is rejected
    pub fn add_channel(&mut self, channel: i64, path: impl AsRef<Path>) -> bool {
        self.try_add_channel(channel, path).is_ok()
    }

    /// Replace an alarm. The replaced entry stops playing and the new one
    /// starts `Quiet`, so the next tick evaluates it with the new sound.
    pub fn try_update_channel(
        &mut self,
        old_channel: i64,
        new_channel: i64,
        path: impl AsRef<Path>,
    ) -> std::result::Result<ChannelId, ValidationError> {
        let path = path.as_ref();
        let new_id = self
            .config
            .try_update_channel(old_channel, new_channel, path)?;

        // The config accepted old_channel, so it is a valid id
        if let Ok(old_id) = ChannelId::from_number(old_channel) {
            if let Some(mut old) = self.entries.remove(&old_id) {
                old.release();
            }
        }
        self.entries
            .insert(new_id, ChannelAlarmEntry::new(new_id, path.to_path_buf()));
        debug!(
            "Alarm updated: channel {} -> channel {} ({})",
            old_channel,
            new_id,
            path.display()
        );
        Ok(new_id)
    }

    pub fn update_channel(
        &mut self,
        old_channel: i64,
        new_channel: i64,
        path: impl AsRef<Path>,
    ) -> bool {
        self.try_update_channel(old_channel, new_channel, path)
            .is_ok()
    }

    /// Remove an alarm, stopping its sound
    pub fn try_remove_channel(
        &mut self,
        channel: i64,
    ) -> std::result::Result<PathBuf, ValidationError> {
        let path = self.config.try_remove_channel(channel)?;
        if let Ok(id) = ChannelId::from_number(channel) {
            if let Some(mut entry) = self.entries.remove(&id) {
                entry.release();
            }
        }
        debug!("Alarm removed: channel {}", channel);
        Ok(path)
    }

    pub fn remove_channel(&mut self, channel: i64) -> bool {
        self.try_remove_channel(channel).is_ok()
    }

    /// Swap in a whole new mapping.
    ///
    /// Entries whose channel and sound file are unchanged keep their state and
    /// playback. Everything else is stopped and dropped; new entries start
    /// `Quiet`.
    pub fn replace_config(&mut self, config: AlarmConfig) {
        let mut kept = 0;
        let mut old_entries = std::mem::take(&mut self.entries);

        for (channel, path) in config.iter() {
            let entry = match old_entries.remove(&channel) {
                Some(entry) if entry.sound_path == path => {
                    kept += 1;
                    entry
                }
                Some(mut changed) => {
                    changed.release();
                    ChannelAlarmEntry::new(channel, path.to_path_buf())
                }
                None => ChannelAlarmEntry::new(channel, path.to_path_buf()),
            };
            self.entries.insert(channel, entry);
        }

        for entry in old_entries.values_mut() {
            entry.release();
        }

        info!(
            "Alarm settings replaced: {} channels, {} unchanged, {} dropped",
            config.len(),
            kept,
            old_entries.len()
        );
        self.config = config;
    }

    // ------------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------------

    /// Raise the alarm of a channel: mark it `Alarming` and start its looping
    /// sound. Does not open a second playback while one is running.
    ///
    /// A sound that cannot be started leaves the channel `Alarming` with an
    /// idle slot.
    pub fn start_playback(&mut self, channel: ChannelId) -> Result<()> {
        let entry = self.entries.get_mut(&channel).ok_or(AlarmError::Validation(
            ValidationError::UnknownChannel(channel.get().into()),
        ))?;
        entry.state = AlarmState::Alarming;

        if entry.slot.is_playing() {
            debug!("Channel {} already playing", channel);
            return Ok(());
        }

        let mut player = LoopingAudioPlayer::new(self.backend.clone());
        player.start(&entry.sound_path)?;
        entry.slot = PlaybackSlot::Playing(player);
        Ok(())
    }

    /// Clear the alarm of a channel: mark it `Quiet` and stop its sound.
    /// Returns false when nothing was playing.
    pub fn stop_playback(&mut self, channel: ChannelId) -> bool {
        match self.entries.get_mut(&channel) {
            Some(entry) => {
                entry.state = AlarmState::Quiet;
                entry.release()
            }
            None => false,
        }
    }

    /// Stop every playing sound and return all channels to `Quiet`
    pub fn stop_all(&mut self) -> usize {
        let mut stopped = 0;
        for entry in self.entries.values_mut() {
            if entry.release() {
                stopped += 1;
            }
            entry.state = AlarmState::Quiet;
        }
        if stopped > 0 {
            info!("Stopped {} alarm sounds", stopped);
        }
        stopped
    }

    /// Channels in ascending order, for evaluation
    pub(crate) fn channels(&self) -> Vec<ChannelId> {
        self.entries.keys().copied().collect()
    }
}

impl fmt::Debug for ChannelAlarmRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelAlarmRegistry")
            .field("entries", &self.entries)
            .finish()
    }
}
