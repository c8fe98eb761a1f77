// src/audio/looping.rs - Endless replay of a finite sample source
use crate::error::Result;
use tracing::{debug, warn};

/// A finite sample source that can be moved back to its first sample.
pub trait RewindableSource: Iterator {
    /// Number of samples produced since the last rewind
    fn position(&self) -> u64;

    /// Move back to the first sample
    fn rewind(&mut self) -> Result<()>;
}

/// Replays the inner source from the start every time it runs dry.
///
/// A source that is already exhausted at position 0 has nothing to play, so
/// the stream ends there instead of spinning on an empty or broken resource.
#[derive(Debug)]
pub struct LoopingSource<S> {
    inner: S,
    looping: bool,
    rewinds: u64,
}

impl<S: RewindableSource> LoopingSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            looping: true,
            rewinds: 0,
        }
    }

    /// Turn looping on or off; without looping the stream ends with the source
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// How many times the source was restarted
    pub fn rewinds(&self) -> u64 {
        self.rewinds
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: RewindableSource> Iterator for LoopingSource<S> {
    type Item = S::Item;

    fn next(&mut self) -> Option<S::Item> {
        if let Some(sample) = self.inner.next() {
            return Some(sample);
        }

        if !self.looping {
            return None;
        }

        if self.inner.position() == 0 {
            debug!("Source exhausted at position 0, ending playback");
            return None;
        }

        if let Err(e) = self.inner.rewind() {
            warn!("Failed to rewind alarm sound: {}", e);
            return None;
        }
        self.rewinds += 1;

        // An empty pass after a rewind means the source is unreadable now
        self.inner.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AlarmError;

    /// In-memory source whose rewind can be made to fail.
    struct Samples {
        data: Vec<i16>,
        cursor: usize,
        rewind_ok: bool,
    }

    impl Samples {
        fn new(data: Vec<i16>) -> Self {
            Self {
                data,
                cursor: 0,
                rewind_ok: true,
            }
        }
    }

    impl Iterator for Samples {
        type Item = i16;

        fn next(&mut self) -> Option<i16> {
            let sample = self.data.get(self.cursor).copied()?;
            self.cursor += 1;
            Some(sample)
        }
    }

    impl RewindableSource for Samples {
        fn position(&self) -> u64 {
            self.cursor as u64
        }

        fn rewind(&mut self) -> Result<()> {
            if self.rewind_ok {
                self.cursor = 0;
                Ok(())
            } else {
                Err(AlarmError::resource("flaky.wav", "seek failed"))
            }
        }
    }

    #[test]
    fn test_loops_from_start() {
        let mut source = LoopingSource::new(Samples::new(vec![1, 2, 3]));

        let samples: Vec<i16> = source.by_ref().take(7).collect();
        assert_eq!(samples, vec![1, 2, 3, 1, 2, 3, 1]);
        assert_eq!(source.rewinds(), 2);
        assert_eq!(source.inner().position(), 1);
    }

    #[test]
    fn test_empty_source_terminates() {
        let mut source = LoopingSource::new(Samples::new(Vec::new()));

        assert_eq!(source.next(), None);
        assert_eq!(source.next(), None);
        assert_eq!(source.rewinds(), 0);
    }

    #[test]
    fn test_looping_disabled_stops_at_end() {
        let mut source = LoopingSource::new(Samples::new(vec![5, 25]));
        source.set_looping(false);

        let samples: Vec<i16> = source.by_ref().collect();
        assert_eq!(samples, vec![5, 25]);
        assert!(!source.is_looping());
    }

    #[test]
    fn test_failed_rewind_ends_stream() {
        let mut flaky = Samples::new(vec![7, 8]);
        flaky.rewind_ok = false;
        let samples: Vec<i16> = LoopingSource::new(flaky).take(10).collect();
        assert_eq!(samples, vec![7, 8]);
    }
}
