// src/config.rs - Module settings: channel to sound file mapping (ModAlarm.xml)
//!
//! The settings document looks like this:
//!
//! ```xml
//! <?xml version="1.0" encoding="utf-8"?>
//! <ModAlarm>
//!   <Alarm>
//!     <Channel>12</Channel>
//!     <Sound>C:\sounds\a.wav</Sound>
//!   </Alarm>
//! </ModAlarm>
//! ```
//!
//! Module versions 1.1 and older stored a single alarm directly under the root
//! as `<Chanel>N</Chanel><Sound>path</Sound>`. The misspelled tag is part of
//! that format. Such documents are converted on load and written back in the
//! multi-channel layout.

use crate::channel::ChannelId;
use crate::error::{AlarmError, Result, ValidationError};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Settings file name inside the host configuration directory
pub const CONFIG_FILE_NAME: &str = "ModAlarm.xml";

const ROOT_TAG: &str = "ModAlarm";
const ALARM_TAG: &str = "Alarm";
const CHANNEL_TAG: &str = "Channel";
const SOUND_TAG: &str = "Sound";
const LEGACY_CHANNEL_TAG: &str = "Chanel";

// ============================================================================
// CONFIGURATION SNAPSHOT
// ============================================================================

/// Configured alarms, ordered by channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlarmConfig {
    channels: BTreeMap<ChannelId, PathBuf>,
}

/// Outcome of parsing a settings document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfig {
    pub config: AlarmConfig,
    /// Channel converted from the single-alarm layout, if any
    pub migrated: Option<ChannelId>,
    /// Alarm entries dropped because they were incomplete or invalid
    pub skipped: usize,
}

/// Full path of the settings file
pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

impl AlarmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn contains(&self, channel: ChannelId) -> bool {
        self.channels.contains_key(&channel)
    }

    /// Sound file configured for a channel
    pub fn get(&self, channel: ChannelId) -> Option<&Path> {
        self.channels.get(&channel).map(PathBuf::as_path)
    }

    /// Entries in ascending channel order
    pub fn iter(&self) -> impl Iterator<Item = (ChannelId, &Path)> + '_ {
        self.channels.iter().map(|(c, p)| (*c, p.as_path()))
    }

    /// Entry with the highest channel number
    pub fn last(&self) -> Option<(ChannelId, &Path)> {
        self.channels
            .iter()
            .next_back()
            .map(|(c, p)| (*c, p.as_path()))
    }

    // ------------------------------------------------------------------------
    // Validated edits
    // ------------------------------------------------------------------------

    /// Check channel range, path and sound file presence
    pub fn validate_entry(
        channel: i64,
        path: &Path,
    ) -> std::result::Result<ChannelId, ValidationError> {
        let channel = ChannelId::from_number(channel)?;
        if path.as_os_str().is_empty() {
            return Err(ValidationError::EmptyPath);
        }
        if !path.is_file() {
            return Err(ValidationError::FileNotFound(path.to_path_buf()));
        }
        Ok(channel)
    }

    /// Add an alarm for a channel that is not configured yet
    pub fn try_add_channel(
        &mut self,
        channel: i64,
        path: impl AsRef<Path>,
    ) -> std::result::Result<ChannelId, ValidationError> {
        let path = path.as_ref();
        let channel = Self::validate_entry(channel, path)?;
        if self.channels.contains_key(&channel) {
            return Err(ValidationError::DuplicateChannel(channel.get()));
        }
        self.channels.insert(channel, path.to_path_buf());
        Ok(channel)
    }

    /// [`AlarmConfig::try_add_channel`] reporting only success
    pub fn add_channel(&mut self, channel: i64, path: impl AsRef<Path>) -> bool {
        self.try_add_channel(channel, path).is_ok()
    }

    /// Move an alarm to another channel and/or sound file.
    ///
    /// Nothing changes when validation fails. Moving onto a different channel
    /// that already has an alarm is rejected.
    pub fn try_update_channel(
        &mut self,
        old_channel: i64,
        new_channel: i64,
        path: impl AsRef<Path>,
    ) -> std::result::Result<ChannelId, ValidationError> {
        let path = path.as_ref();
        let new_id = Self::validate_entry(new_channel, path)?;
        let old_id = ChannelId::from_number(old_channel)
            .ok()
            .filter(|id| self.channels.contains_key(id))
            .ok_or(ValidationError::UnknownChannel(old_channel))?;
        if new_id != old_id && self.channels.contains_key(&new_id) {
            return Err(ValidationError::DuplicateChannel(new_id.get()));
        }

        self.channels.remove(&old_id);
        self.channels.insert(new_id, path.to_path_buf());
        Ok(new_id)
    }

    /// [`AlarmConfig::try_update_channel`] reporting only success
    pub fn update_channel(
        &mut self,
        old_channel: i64,
        new_channel: i64,
        path: impl AsRef<Path>,
    ) -> bool {
        self.try_update_channel(old_channel, new_channel, path).is_ok()
    }

    /// Remove the alarm of a channel, returning its sound file
    pub fn try_remove_channel(
        &mut self,
        channel: i64,
    ) -> std::result::Result<PathBuf, ValidationError> {
        ChannelId::from_number(channel)
            .ok()
            .and_then(|id| self.channels.remove(&id))
            .ok_or(ValidationError::UnknownChannel(channel))
    }

    /// [`AlarmConfig::try_remove_channel`] reporting only success
    pub fn remove_channel(&mut self, channel: i64) -> bool {
        self.try_remove_channel(channel).is_ok()
    }

    /// Insert an entry read from a settings document.
    ///
    /// The sound file is not required to exist here; missing files are
    /// reported when the module starts.
    fn insert_parsed(&mut self, channel: Option<&str>, sound: Option<&str>) -> Option<ChannelId> {
        let channel = channel?.trim().parse::<i64>().ok()?;
        let channel = ChannelId::from_number(channel).ok()?;
        let sound = sound?;
        if sound.trim().is_empty() || self.channels.contains_key(&channel) {
            return None;
        }
        self.channels.insert(channel, PathBuf::from(sound));
        Some(channel)
    }

    // ------------------------------------------------------------------------
    // XML
    // ------------------------------------------------------------------------

    /// Parse a settings document
    pub fn from_xml(xml: &str) -> Result<ParsedConfig> {
        // Sound paths are taken as written; only channel numbers are trimmed
        let mut reader = Reader::from_str(xml);

        let mut path: Vec<String> = Vec::new();
        let mut root_seen = false;
        let mut entries: Vec<RawEntry> = Vec::new();
        let mut current: Option<RawEntry> = None;
        let mut legacy = RawEntry::default();

        loop {
            let event = reader.read_event().map_err(|e| {
                AlarmError::ConfigLoad(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                ))
            })?;

            match event {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if path.is_empty() {
                        root_seen = true;
                    } else if path.len() == 1 && name == ALARM_TAG {
                        current = Some(RawEntry::default());
                    }
                    path.push(name);
                }
                Event::Empty(_) => {
                    // Childless elements carry no value; only the root matters
                    if path.is_empty() {
                        root_seen = true;
                    }
                }
                Event::End(_) => {
                    if path.len() == 2 && path[1] == ALARM_TAG {
                        if let Some(entry) = current.take() {
                            entries.push(entry);
                        }
                    }
                    path.pop();
                }
                Event::Text(t) => {
                    let text = t
                        .unescape()
                        .map_err(|e| AlarmError::ConfigLoad(e.to_string()))?
                        .into_owned();
                    assign_text(&path, text, current.as_mut(), &mut legacy);
                }
                Event::CData(c) => {
                    let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                    assign_text(&path, text, current.as_mut(), &mut legacy);
                }
                Event::Eof => {
                    if let Some(open) = path.last() {
                        return Err(AlarmError::ConfigLoad(format!(
                            "unexpected end of document inside <{}>",
                            open
                        )));
                    }
                    break;
                }
                _ => {}
            }
        }

        if !root_seen {
            return Err(AlarmError::ConfigLoad("document has no root element".into()));
        }

        let mut config = AlarmConfig::new();
        let mut skipped = 0;
        for entry in &entries {
            if config
                .insert_parsed(entry.channel.as_deref(), entry.sound.as_deref())
                .is_none()
            {
                skipped += 1;
            }
        }

        let migrated = if legacy.channel.is_some() || legacy.sound.is_some() {
            config.insert_parsed(legacy.channel.as_deref(), legacy.sound.as_deref())
        } else {
            None
        };

        Ok(ParsedConfig {
            config,
            migrated,
            skipped,
        })
    }

    /// Serialize to a settings document
    pub fn to_xml(&self) -> Result<String> {
        let save_err = |e: quick_xml::Error| AlarmError::ConfigSave(e.to_string());
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(save_err)?;
        writer
            .write_event(Event::Start(BytesStart::new(ROOT_TAG)))
            .map_err(save_err)?;

        for (channel, sound) in self.iter() {
            let channel = channel.to_string();
            let sound = sound.to_string_lossy();

            writer
                .write_event(Event::Start(BytesStart::new(ALARM_TAG)))
                .map_err(save_err)?;
            for (tag, value) in [(CHANNEL_TAG, channel.as_str()), (SOUND_TAG, sound.as_ref())] {
                writer
                    .write_event(Event::Start(BytesStart::new(tag)))
                    .map_err(save_err)?;
                writer
                    .write_event(Event::Text(BytesText::new(value)))
                    .map_err(save_err)?;
                writer
                    .write_event(Event::End(BytesEnd::new(tag)))
                    .map_err(save_err)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new(ALARM_TAG)))
                .map_err(save_err)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new(ROOT_TAG)))
            .map_err(save_err)?;

        let mut xml = String::from_utf8(writer.into_inner())
            .map_err(|e| AlarmError::ConfigSave(e.to_string()))?;
        xml.push('\n');
        Ok(xml)
    }

    // ------------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------------

    /// Load the settings file, converting and rewriting the legacy layout.
    pub fn load(path: &Path) -> Result<Self> {
        let xml = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AlarmError::ConfigLoad(format!(
                    "{}: {}. Configure the module",
                    path.display(),
                    e
                ))
            } else {
                AlarmError::ConfigLoad(format!("{}: {}", path.display(), e))
            }
        })?;

        let parsed = Self::from_xml(&xml)?;
        if parsed.skipped > 0 {
            debug!("Skipped {} invalid alarm entries in {}", parsed.skipped, path.display());
        }

        if let Some(channel) = parsed.migrated {
            info!("Converted single-alarm settings (channel {}) in {}", channel, path.display());
            if let Err(e) = parsed.config.save(path) {
                warn!("Converted settings not written back: {}", e);
            }
        }

        Ok(parsed.config)
    }

    /// Write the settings file
    pub fn save(&self, path: &Path) -> Result<()> {
        let xml = self.to_xml()?;
        std::fs::write(path, xml)
            .map_err(|e| AlarmError::ConfigSave(format!("{}: {}", path.display(), e)))?;
        debug!("Saved {} alarms to {}", self.len(), path.display());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RawEntry {
    channel: Option<String>,
    sound: Option<String>,
}

fn assign_text(path: &[String], text: String, current: Option<&mut RawEntry>, legacy: &mut RawEntry) {
    match path {
        [_, alarm, field] if alarm == ALARM_TAG => {
            if let Some(entry) = current {
                match field.as_str() {
                    CHANNEL_TAG => entry.channel = Some(text),
                    SOUND_TAG => entry.sound = Some(text),
                    _ => {}
                }
            }
        }
        [_, field] => match field.as_str() {
            LEGACY_CHANNEL_TAG => legacy.channel = Some(text),
            SOUND_TAG => legacy.sound = Some(text),
            _ => {}
        },
        _ => {}
    }
}
