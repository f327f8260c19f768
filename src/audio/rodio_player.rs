//! Audio output using rodio on the default device.

use crate::audio::player::{AudioClip, AudioPlayer};
use crate::error::{ReadAloudError, Result};
use rodio::{Decoder, OutputStreamBuilder, Sink, Source};
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// Opening the output stream makes ALSA/JACK print probing noise that is
/// harmless but confusing next to the reader's own output.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2.
/// Safe as long as no other thread is concurrently manipulating fd 2.
#[cfg(unix)]
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

#[cfg(not(unix))]
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    f()
}

/// Player over a rodio [`Sink`].
///
/// The output stream is not `Send` on every platform, so a dedicated thread
/// opens and owns it until the player is dropped. Only the sink crosses
/// threads.
pub struct RodioPlayer {
    sink: Arc<Sink>,
    paused: AtomicBool,
    _shutdown: crossbeam_channel::Sender<()>,
}

impl RodioPlayer {
    /// Open the default output device.
    pub fn open() -> Result<Self> {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<std::result::Result<Arc<Sink>, String>>(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);

        thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let stream = match with_suppressed_stderr(OutputStreamBuilder::open_default_stream)
                {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let sink = Arc::new(Sink::connect_new(stream.mixer()));
                if ready_tx.send(Ok(sink)).is_err() {
                    return;
                }
                // Blocks until the player drops its sender.
                let _ = shutdown_rx.recv();
                drop(stream);
            })?;

        let sink = ready_rx
            .recv()
            .map_err(|_| ReadAloudError::AudioOutput {
                message: "audio output thread exited during startup".to_string(),
            })?
            .map_err(|message| ReadAloudError::AudioOutput {
                message: format!("failed to open default output device: {message}"),
            })?;

        Ok(Self {
            sink,
            paused: AtomicBool::new(false),
            _shutdown: shutdown_tx,
        })
    }
}

impl AudioPlayer for RodioPlayer {
    fn play(&self, clip: AudioClip) -> Result<Option<Duration>> {
        if clip.is_empty() {
            return Err(ReadAloudError::AudioDecode {
                message: "service returned an empty clip".to_string(),
            });
        }
        let content_type = clip.content_type.clone();
        let source = Decoder::new(Cursor::new(clip.bytes)).map_err(|e| {
            ReadAloudError::AudioDecode {
                message: match content_type {
                    Some(kind) => format!("cannot decode {kind}: {e}"),
                    None => e.to_string(),
                },
            }
        })?;
        let duration = source.total_duration();

        self.sink.clear();
        self.sink.append(source);
        self.sink.play();
        self.paused.store(false, Ordering::SeqCst);
        Ok(duration)
    }

    fn pause(&self) {
        if !self.sink.empty() {
            self.sink.pause();
            self.paused.store(true, Ordering::SeqCst);
        }
    }

    fn resume(&self) {
        self.sink.play();
        self.paused.store(false, Ordering::SeqCst);
    }

    fn stop(&self) {
        // `clear` leaves the sink reusable for the next clip.
        self.sink.clear();
        self.paused.store(false, Ordering::SeqCst);
    }

    fn set_volume(&self, volume: f32) {
        self.sink.set_volume(volume.max(0.0));
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn is_finished(&self) -> bool {
        self.sink.empty()
    }
}
