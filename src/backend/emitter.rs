//! Event delivery from a backend to the playback controller.
//!
//! Each utterance gets its own [`EventEmitter`]. Closing the emitter is the
//! cancellation point: the open flag is checked and the event is sent while
//! holding one lock, so once [`EventEmitter::close`] returns no further event
//! of that utterance reaches the channel.

use super::{BackendError, BackendEvent, BackendEventKind, UtteranceId};
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Creates the channel backends deliver their events on.
pub fn event_channel() -> (Sender<BackendEvent>, Receiver<BackendEvent>) {
    unbounded()
}

/// Cloneable, closable sender bound to one utterance.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    utterance: UtteranceId,
    tx: Sender<BackendEvent>,
    open: Arc<Mutex<bool>>,
}

impl EventEmitter {
    pub fn new(utterance: UtteranceId, tx: Sender<BackendEvent>) -> Self {
        Self {
            utterance,
            tx,
            open: Arc::new(Mutex::new(true)),
        }
    }

    pub fn utterance(&self) -> UtteranceId {
        self.utterance
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sends an event unless the emitter was closed. Returns whether it was sent.
    pub fn emit(&self, kind: BackendEventKind) -> bool {
        let open = self.lock();
        if !*open {
            return false;
        }
        self.tx
            .send(BackendEvent {
                utterance: self.utterance,
                kind,
            })
            .is_ok()
    }

    pub fn ready(&self, clip_duration: Option<Duration>) -> bool {
        self.emit(BackendEventKind::Ready { clip_duration })
    }

    pub fn word_boundary(&self, char_index: usize, char_length: usize) -> bool {
        self.emit(BackendEventKind::WordBoundary {
            char_index,
            char_length,
        })
    }

    pub fn paragraph_end(&self) -> bool {
        self.emit(BackendEventKind::ParagraphEnd)
    }

    pub fn error(&self, error: BackendError) -> bool {
        self.emit(BackendEventKind::Error(error))
    }

    /// Runs `f` only while the emitter is open, holding the lock so a
    /// concurrent [`close`](Self::close) waits for it to finish.
    pub fn run_if_open<T>(&self, f: impl FnOnce() -> T) -> Option<T> {
        let open = self.lock();
        if *open { Some(f()) } else { None }
    }

    /// Stops all further delivery for this utterance. Idempotent.
    pub fn close(&self) {
        *self.lock() = false;
    }

    pub fn is_closed(&self) -> bool {
        !*self.lock()
    }
}
