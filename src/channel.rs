// src/channel.rs - Channel identifiers and per-tick channel value snapshots
use crate::error::ValidationError;
use std::collections::HashMap;
use std::fmt;
use tracing::trace;

/// Identifier of an input channel watched by the module.
///
/// Channel numbers are limited to `0..=65535`; anything outside that range is
/// rejected when an alarm is configured.
///
/// # Examples
///
/// ```rust
/// use mod_alarm::ChannelId;
///
/// let channel = ChannelId::try_from(12)?;
/// assert_eq!(channel.get(), 12);
/// assert!(ChannelId::try_from(-1).is_err());
/// assert!(ChannelId::try_from(65536).is_err());
/// # Ok::<(), mod_alarm::ValidationError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(u16);

impl ChannelId {
    /// Create a channel id from a number already known to be in range
    pub const fn new(number: u16) -> Self {
        Self(number)
    }

    /// Raw channel number
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Validate a host channel number
    pub fn from_number(number: i64) -> Result<Self, ValidationError> {
        u16::try_from(number)
            .map(Self)
            .map_err(|_| ValidationError::ChannelOutOfRange(number))
    }
}

impl TryFrom<i64> for ChannelId {
    type Error = ValidationError;

    fn try_from(number: i64) -> Result<Self, Self::Error> {
        Self::from_number(number)
    }
}

impl TryFrom<i32> for ChannelId {
    type Error = ValidationError;

    fn try_from(number: i32) -> Result<Self, Self::Error> {
        Self::from_number(number.into())
    }
}

impl From<u16> for ChannelId {
    fn from(number: u16) -> Self {
        Self(number)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current channel values handed over by the host once per evaluation tick.
///
/// The snapshot is read-only for the module and is not kept after the tick
/// that received it. Channels the host did not calculate are simply absent.
///
/// # Examples
///
/// ```rust
/// use mod_alarm::{ChannelId, ChannelSnapshot};
///
/// let snapshot: ChannelSnapshot = [(3, 1.0), (7, 0.0)].into_iter().collect();
///
/// assert_eq!(snapshot.get(ChannelId::new(3)), Some(1.0));
/// assert_eq!(snapshot.get(ChannelId::new(5)), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelSnapshot {
    values: HashMap<i32, f64>,
}

impl ChannelSnapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value of a channel
    pub fn set(&mut self, channel: i32, value: f64) {
        trace!("Snapshot channel {} = {}", channel, value);
        self.values.insert(channel, value);
    }

    /// Builder form of [`ChannelSnapshot::set`]
    pub fn with(mut self, channel: i32, value: f64) -> Self {
        self.set(channel, value);
        self
    }

    /// Value of a configured channel, `None` if the host did not supply it
    pub fn get(&self, channel: ChannelId) -> Option<f64> {
        self.values.get(&i32::from(channel.get())).copied()
    }

    /// Value by raw host channel number
    pub fn get_raw(&self, channel: i32) -> Option<f64> {
        self.values.get(&channel).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Host channel numbers present in this snapshot, in no particular order
    pub fn channels(&self) -> impl Iterator<Item = i32> + '_ {
        self.values.keys().copied()
    }
}

impl FromIterator<(i32, f64)> for ChannelSnapshot {
    fn from_iter<I: IntoIterator<Item = (i32, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl<S: std::hash::BuildHasher> From<HashMap<i32, f64, S>> for ChannelSnapshot {
    fn from(values: HashMap<i32, f64, S>) -> Self {
        values.into_iter().collect()
    }
}

impl From<std::collections::BTreeMap<i32, f64>> for ChannelSnapshot {
    fn from(values: std::collections::BTreeMap<i32, f64>) -> Self {
        values.into_iter().collect()
    }
}
