// src/editor.rs - Edit session over the persisted module settings
use crate::channel::ChannelId;
use crate::config::{config_file_path, AlarmConfig};
use crate::error::{Result, ValidationError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Editing session for `ModAlarm.xml`.
///
/// Edits are validated like registry edits and kept in memory until
/// [`ConfigEditor::save`]. [`ConfigEditor::cancel`] goes back to the last
/// loaded or saved settings.
///
/// # Examples
///
/// ```rust,no_run
/// use mod_alarm::ConfigEditor;
/// use std::path::Path;
///
/// let mut editor = ConfigEditor::open(Path::new("/opt/scada/config"))?;
/// let (channel, sound) = editor.suggested_entry();
/// editor.add(channel, &sound, false)?;
/// editor.save()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigEditor {
    path: PathBuf,
    config: AlarmConfig,
    pristine: AlarmConfig,
    modified: bool,
    last_channel: i64,
    last_sound: PathBuf,
}

impl ConfigEditor {
    /// Start a session. A missing settings file gives an empty session.
    pub fn open(config_dir: &Path) -> Result<Self> {
        let path = config_file_path(config_dir);
        let config = if path.exists() {
            AlarmConfig::load(&path)?
        } else {
            debug!("No settings at {}, starting empty", path.display());
            AlarmConfig::new()
        };
        Ok(Self::with_config(path, config))
    }

    /// Session over given settings, saved to `path`
    pub fn with_config(path: PathBuf, config: AlarmConfig) -> Self {
        let (last_channel, last_sound) = config
            .last()
            .map(|(c, p)| (i64::from(c.get()), p.to_path_buf()))
            .unwrap_or_default();
        Self {
            path,
            pristine: config.clone(),
            config,
            modified: false,
            last_channel,
            last_sound,
        }
    }

    pub fn config(&self) -> &AlarmConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Add an alarm.
    ///
    /// An already configured channel is rejected unless `replace_existing` is
    /// set, in which case its entry is replaced. A rejected replacement keeps
    /// the old entry.
    pub fn add(
        &mut self,
        channel: i64,
        path: impl AsRef<Path>,
        replace_existing: bool,
    ) -> std::result::Result<ChannelId, ValidationError> {
        let path = path.as_ref();
        let id = AlarmConfig::validate_entry(channel, path)?;

        if self.config.contains(id) {
            if !replace_existing {
                return Err(ValidationError::DuplicateChannel(id.get()));
            }
            self.config.remove_channel(channel);
        }
        self.config.try_add_channel(channel, path)?;

        self.remember(channel, path);
        Ok(id)
    }

    /// [`ConfigEditor::add`] with a missing channel or sound taken from
    /// [`ConfigEditor::suggested_entry`]
    pub fn add_or_suggested(
        &mut self,
        channel: Option<i64>,
        path: Option<&Path>,
        replace_existing: bool,
    ) -> std::result::Result<ChannelId, ValidationError> {
        let (suggested_channel, suggested_sound) = self.suggested_entry();
        let channel = channel.unwrap_or(suggested_channel);
        let path = path.map_or(suggested_sound, Path::to_path_buf);
        self.add(channel, &path, replace_existing)
    }

    pub fn update(
        &mut self,
        old_channel: i64,
        new_channel: i64,
        path: impl AsRef<Path>,
    ) -> std::result::Result<ChannelId, ValidationError> {
        let path = path.as_ref();
        let id = self
            .config
            .try_update_channel(old_channel, new_channel, path)?;
        self.remember(new_channel, path);
        Ok(id)
    }

    pub fn remove(&mut self, channel: i64) -> std::result::Result<PathBuf, ValidationError> {
        let path = self.config.try_remove_channel(channel)?;
        self.modified = true;
        Ok(path)
    }

    /// Channel and sound to pre-fill the next add with: the channel after the
    /// last one added (or the highest configured) and its sound file.
    pub fn suggested_entry(&self) -> (i64, PathBuf) {
        let channel = if self.config.is_empty() {
            self.last_channel
        } else {
            (self.last_channel + 1).min(i64::from(u16::MAX))
        };
        (channel, self.last_sound.clone())
    }

    /// Drop all unsaved edits
    pub fn cancel(&mut self) {
        self.config = self.pristine.clone();
        self.modified = false;
        debug!("Settings edits discarded");
    }

    /// Write the settings when modified. A failed save keeps the edits.
    pub fn save(&mut self) -> Result<()> {
        if !self.modified {
            return Ok(());
        }
        self.config.save(&self.path)?;
        self.pristine = self.config.clone();
        self.modified = false;
        info!("Settings saved: {} alarms in {}", self.config.len(), self.path.display());
        Ok(())
    }

    fn remember(&mut self, channel: i64, path: &Path) {
        self.last_channel = channel;
        self.last_sound = path.to_path_buf();
        self.modified = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AlarmError;
    use tempfile::TempDir;

    fn sound(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"RIFF").unwrap();
        path
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let editor = ConfigEditor::open(dir.path()).unwrap();
        assert!(editor.config().is_empty());
        assert!(!editor.is_modified());
        assert_eq!(editor.suggested_entry(), (0, PathBuf::new()));
    }

    #[test]
    fn test_add_replace_and_suggestion() {
        let dir = TempDir::new().unwrap();
        let a = sound(&dir, "a.wav");
        let b = sound(&dir, "b.wav");
        let mut editor = ConfigEditor::open(dir.path()).unwrap();

        editor.add(10, &a, false).unwrap();
        assert!(editor.is_modified());
        assert_eq!(editor.suggested_entry(), (11, a.clone()));

        assert_eq!(
            editor.add(10, &b, false),
            Err(ValidationError::DuplicateChannel(10))
        );
        editor.add(10, &b, true).unwrap();
        assert_eq!(editor.config().get(ChannelId::new(10)), Some(b.as_path()));

        // Invalid replacement keeps the existing entry
        assert!(editor.add(10, dir.path().join("none.wav"), true).is_err());
        assert_eq!(editor.config().get(ChannelId::new(10)), Some(b.as_path()));
    }

    #[test]
    fn test_add_fills_in_suggestion() {
        let dir = TempDir::new().unwrap();
        let a = sound(&dir, "a.wav");
        let b = sound(&dir, "b.wav");
        let mut editor = ConfigEditor::open(dir.path()).unwrap();

        assert_eq!(
            editor.add_or_suggested(None, None, false),
            Err(ValidationError::EmptyPath)
        );

        editor.add(10, &a, false).unwrap();
        assert_eq!(editor.add_or_suggested(None, None, false), Ok(ChannelId::new(11)));
        assert_eq!(editor.config().get(ChannelId::new(11)), Some(a.as_path()));

        assert_eq!(
            editor.add_or_suggested(None, Some(b.as_path()), false),
            Ok(ChannelId::new(12))
        );
        assert_eq!(
            editor.add_or_suggested(Some(40), None, false),
            Ok(ChannelId::new(40))
        );
        assert_eq!(editor.config().get(ChannelId::new(40)), Some(b.as_path()));
        assert_eq!(editor.suggested_entry(), (41, b));
    }

    #[test]
    fn test_suggestion_is_capped() {
        let dir = TempDir::new().unwrap();
        let a = sound(&dir, "a.wav");
        let mut editor = ConfigEditor::open(dir.path()).unwrap();
        editor.add(65535, &a, false).unwrap();
        assert_eq!(editor.suggested_entry().0, 65535);
    }

    #[test]
    fn test_cancel_and_save() {
        let dir = TempDir::new().unwrap();
        let a = sound(&dir, "a.wav");
        let mut editor = ConfigEditor::open(dir.path()).unwrap();

        editor.add(1, &a, false).unwrap();
        editor.cancel();
        assert!(editor.config().is_empty());
        assert!(!editor.is_modified());

        // Nothing to save, nothing written
        editor.save().unwrap();
        assert!(!editor.path().exists());

        editor.add(1, &a, false).unwrap();
        editor.add(2, &a, false).unwrap();
        editor.save().unwrap();
        assert!(!editor.is_modified());

        editor.remove(1).unwrap();
        editor.cancel();
        assert_eq!(editor.config().len(), 2);

        let reopened = ConfigEditor::open(dir.path()).unwrap();
        assert_eq!(reopened.config(), editor.config());
        assert_eq!(reopened.suggested_entry(), (3, a));
    }

    #[test]
    fn test_failed_save_keeps_edits() {
        let dir = TempDir::new().unwrap();
        let a = sound(&dir, "a.wav");
        let target = dir.path().join("no-such-dir").join("ModAlarm.xml");
        let mut editor = ConfigEditor::with_config(target, AlarmConfig::new());

        editor.add(4, &a, false).unwrap();
        assert!(matches!(editor.save(), Err(AlarmError::ConfigSave(_))));
        assert!(editor.is_modified());
        assert_eq!(editor.config().len(), 1);
    }

    #[test]
    fn test_update_tracks_last_entry() {
        let dir = TempDir::new().unwrap();
        let a = sound(&dir, "a.wav");
        let b = sound(&dir, "b.wav");
        let mut editor = ConfigEditor::open(dir.path()).unwrap();
        editor.add(5, &a, false).unwrap();

        editor.update(5, 8, &b).unwrap();
        assert_eq!(editor.suggested_entry(), (9, b));
        assert_eq!(editor.update(5, 6, &a), Err(ValidationError::UnknownChannel(5)));
        assert_eq!(editor.remove(5), Err(ValidationError::UnknownChannel(5)));
    }
}
