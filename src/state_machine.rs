// src/state_machine.rs - Edge-triggered alarm evaluation per tick
use crate::channel::{ChannelId, ChannelSnapshot};
use crate::error::{AlarmError, Result};
use crate::registry::{AlarmState, ChannelAlarmRegistry};
use tracing::{debug, error, info, warn};

/// Smallest absolute value still treated as zero
pub const DEFAULT_THRESHOLD: f64 = 0.001;

/// What one evaluation tick did
#[derive(Debug, Default)]
pub struct TickReport {
    /// Channels that went `Quiet -> Alarming`
    pub started: Vec<ChannelId>,
    /// Channels that went `Alarming -> Quiet`
    pub stopped: Vec<ChannelId>,
    /// Channels whose evaluation or playback start failed
    pub failures: Vec<(ChannelId, AlarmError)>,
}

impl TickReport {
    /// True when no channel changed state
    pub fn is_unchanged(&self) -> bool {
        self.started.is_empty() && self.stopped.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Turns channel values into alarm transitions.
///
/// Each configured channel is `Quiet` or `Alarming`. A value whose magnitude
/// exceeds the threshold moves a quiet channel to alarming and starts its
/// sound; a value at or below the threshold moves an alarming channel back
/// and stops the sound. Repeating the same condition does nothing, and
/// channels missing from the snapshot keep their state.
///
/// # Examples
///
/// ```rust
/// use mod_alarm::{AlarmStateMachine, ChannelAlarmRegistry, ChannelSnapshot, SilentBackend};
/// use std::sync::Arc;
///
/// let mut registry = ChannelAlarmRegistry::new(Arc::new(SilentBackend));
/// let machine = AlarmStateMachine::new();
///
/// // No channels configured: nothing to do
/// let report = machine.evaluate(&mut registry, &ChannelSnapshot::new().with(1, 5.0));
/// assert!(report.is_unchanged());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlarmStateMachine {
    threshold: f64,
}

impl Default for AlarmStateMachine {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl AlarmStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            threshold: threshold.abs(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Whether a channel value counts as an alarm condition
    pub fn is_active(&self, channel: ChannelId, value: f64) -> Result<bool> {
        if !value.is_finite() {
            return Err(AlarmError::InvalidValue {
                channel: channel.get(),
                value,
            });
        }
        Ok(value.abs() > self.threshold)
    }

    /// Evaluate one snapshot against every configured channel.
    ///
    /// A failing channel never prevents the others from being evaluated. A
    /// sound that cannot be started still leaves the channel `Alarming`; it is
    /// tried again on the next quiet to alarming edge.
    pub fn evaluate(
        &self,
        registry: &mut ChannelAlarmRegistry,
        snapshot: &ChannelSnapshot,
    ) -> TickReport {
        use AlarmState::*;

        let mut report = TickReport::default();

        for channel in registry.channels() {
            let value = match snapshot.get(channel) {
                Some(value) => value,
                None => continue,
            };

            let active = match self.is_active(channel, value) {
                Ok(active) => active,
                Err(e) => {
                    warn!("Channel {} skipped: {}", channel, e);
                    report.failures.push((channel, e));
                    continue;
                }
            };

            let state = registry.state(channel).unwrap_or_default();
            match (state, active) {
                (Quiet, true) => {
                    info!("Alarm on channel {} (value {})", channel, value);
                    report.started.push(channel);
                    if let Err(e) = registry.start_playback(channel) {
                        error!("Alarm sound for channel {} not started: {}", channel, e);
                        report.failures.push((channel, e));
                    }
                }
                (Alarming, false) => {
                    info!("Alarm cleared on channel {}", channel);
                    registry.stop_playback(channel);
                    report.stopped.push(channel);
                }
                _ => {}
            }
        }

        if !report.is_unchanged() {
            debug!(
                "Tick: {} started, {} stopped, {} failed",
                report.started.len(),
                report.stopped.len(),
                report.failures.len()
            );
        }
        report
    }
}
