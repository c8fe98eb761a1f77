// src/audio/output.rs - rodio output backend
use super::{AudioBackend, LoopingSource, Playback, RewindableSource};
use crate::error::{AlarmError, Result};
use rodio::{Decoder, OutputStream, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

/// Sound file decoded on the fly. Rewinding reopens the file and starts a
/// fresh decoder at the first sample.
struct SoundFile {
    path: PathBuf,
    decoder: Decoder<BufReader<File>>,
    position: u64,
}

impl SoundFile {
    fn open(path: &Path) -> Result<Self> {
        let decoder = Self::decoder(path)?;
        if decoder.channels() == 0 || decoder.sample_rate() == 0 {
            return Err(AlarmError::resource(path, "invalid stream format"));
        }
        debug!(
            "Opened {}: {} ch, {} Hz",
            path.display(),
            decoder.channels(),
            decoder.sample_rate()
        );
        Ok(Self {
            path: path.to_path_buf(),
            decoder,
            position: 0,
        })
    }

    fn decoder(path: &Path) -> Result<Decoder<BufReader<File>>> {
        let file = File::open(path).map_err(|e| AlarmError::resource(path, e))?;
        Decoder::new(BufReader::new(file)).map_err(|e| AlarmError::resource(path, e))
    }
}

impl Iterator for SoundFile {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        let sample = self.decoder.next()?;
        self.position += 1;
        Some(sample)
    }
}

impl RewindableSource for SoundFile {
    fn position(&self) -> u64 {
        self.position
    }

    fn rewind(&mut self) -> Result<()> {
        self.decoder = Self::decoder(&self.path)?;
        self.position = 0;
        Ok(())
    }
}

impl Source for LoopingSource<SoundFile> {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.inner().decoder.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner().decoder.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// Plays alarm sounds on the default output device.
///
/// Every playback gets its own thread that opens the decoder, owns an
/// `OutputStream` and a `Sink`; the output stream cannot move between
/// threads, so it lives and dies on the playback thread. `open` returns once
/// the decoder is initialized and the output is claimed.
#[derive(Debug, Default, Clone, Copy)]
pub struct RodioBackend;

impl RodioBackend {
    pub fn new() -> Self {
        Self
    }
}

struct RodioPlayback {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Playback for RodioPlayback {
    fn stop(&mut self) {
        // Dropping the sender wakes the playback thread as well
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!("Alarm playback thread panicked");
            }
        }
    }
}

impl Drop for RodioPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}

impl AudioBackend for RodioBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn Playback>> {
        let (ready_tx, ready_rx) = channel::<Result<()>>();
        let (stop_tx, stop_rx) = channel::<()>();
        let sound_path = path.to_path_buf();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let handle = thread::Builder::new()
            .name(format!("alarm-{}", name))
            .spawn(move || {
                let source = match SoundFile::open(&sound_path) {
                    Ok(source) => source,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let (_stream, stream_handle) = match OutputStream::try_default() {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = ready_tx.send(Err(AlarmError::resource(&sound_path, e)));
                        return;
                    }
                };
                let sink = match Sink::try_new(&stream_handle) {
                    Ok(sink) => sink,
                    Err(e) => {
                        let _ = ready_tx.send(Err(AlarmError::resource(&sound_path, e)));
                        return;
                    }
                };

                sink.append(LoopingSource::new(source));
                sink.play();
                let _ = ready_tx.send(Ok(()));

                // Block until stopped or the handle is gone
                let _ = stop_rx.recv();
                sink.stop();
            })
            .map_err(|e| AlarmError::resource(path, e))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("Output stream claimed for {}", path.display());
                Ok(Box::new(RodioPlayback {
                    stop_tx: Some(stop_tx),
                    thread: Some(handle),
                }))
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(AlarmError::resource(path, "playback thread exited"))
            }
        }
    }

    fn name(&self) -> &'static str {
        "rodio"
    }
}
