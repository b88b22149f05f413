//! Dedicated ingest thread.
//!
//! Events are handed over a bounded channel to a thread that owns the
//! [`TraceProvider`]. Readers use the [`RecordingReader`] concurrently.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use rewind_core::RawEvent;
use rewind_store::{Recording, RecordingReader};
use tracing::debug;

use crate::error::IngestError;
use crate::session::TraceProvider;
use crate::stats::SessionSummary;

enum IngestMessage {
    Event(RawEvent),
    Flush,
    Shutdown,
}

/// A trace session running on its own thread.
pub struct IngestThread {
    tx: Option<Sender<IngestMessage>>,
    handle: Option<JoinHandle<Option<SessionSummary>>>,
    recording: RecordingReader,
}

impl IngestThread {
    /// Create a session named `session_name` and run it on a new thread.
    pub fn spawn(mut provider: TraceProvider, session_name: &str) -> Result<Self, IngestError> {
        let recording = provider.create_session(session_name)?;
        Self::start(provider, recording)
    }

    /// Run a session writing into `recording` on a new thread.
    pub fn attach(mut provider: TraceProvider, recording: Arc<Recording>) -> Result<Self, IngestError> {
        let reader = provider.attach_external_recording(recording);
        Self::start(provider, reader)
    }

    fn start(provider: TraceProvider, recording: RecordingReader) -> Result<Self, IngestError> {
        let (tx, rx) = crossbeam_channel::bounded(provider.config().channel_capacity);
        let handle = thread::Builder::new()
            .name("rewind-ingest".into())
            .spawn(move || run(provider, rx))
            .map_err(IngestError::Spawn)?;
        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
            recording,
        })
    }

    /// Queue an event, blocking while the channel is full.
    pub fn send(&self, event: RawEvent) -> Result<(), IngestError> {
        let tx = self.tx.as_ref().ok_or(IngestError::Disconnected)?;
        tx.send(IngestMessage::Event(event))
            .map_err(|_| IngestError::Disconnected)
    }

    /// Queue an event without blocking.
    pub fn try_send(&self, event: RawEvent) -> Result<(), IngestError> {
        let tx = self.tx.as_ref().ok_or(IngestError::Disconnected)?;
        tx.try_send(IngestMessage::Event(event)).map_err(|e| match e {
            TrySendError::Full(_) => IngestError::ChannelFull,
            TrySendError::Disconnected(_) => IngestError::Disconnected,
        })
    }

    /// Ask the thread to commit everything it holds back once the events
    /// queued before this call are processed.
    pub fn flush(&self) -> Result<(), IngestError> {
        let tx = self.tx.as_ref().ok_or(IngestError::Disconnected)?;
        tx.send(IngestMessage::Flush)
            .map_err(|_| IngestError::Disconnected)
    }

    /// Reader for the recording being written.
    pub fn recording(&self) -> &RecordingReader {
        &self.recording
    }

    /// Process every queued event, end the session and join the thread.
    pub fn shutdown(mut self) -> Result<SessionSummary, IngestError> {
        if let Some(tx) = self.tx.take() {
            // A closed channel means the thread already exited.
            let _ = tx.send(IngestMessage::Shutdown);
        }
        let handle = self.handle.take().ok_or(IngestError::Disconnected)?;
        match handle.join() {
            Ok(Some(summary)) => Ok(summary),
            Ok(None) => Err(IngestError::NoSession),
            Err(_) => Err(IngestError::ThreadPanicked),
        }
    }
}

fn run(mut provider: TraceProvider, rx: Receiver<IngestMessage>) -> Option<SessionSummary> {
    for message in rx.iter() {
        match message {
            IngestMessage::Event(event) => {
                provider.on_event(event);
            }
            IngestMessage::Flush => provider.flush_pending(),
            IngestMessage::Shutdown => break,
        }
    }
    debug!("ingest thread stopping");
    provider.end_session()
}

impl Drop for IngestThread {
    fn drop(&mut self) {
        // Dropping the sender ends the receive loop.
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for IngestThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestThread")
            .field("recording", &self.recording.name())
            .field("running", &self.handle.is_some())
            .finish()
    }
}
