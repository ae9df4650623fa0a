//! Mixer — sums any number of concurrently playing streams.
//!
//! The [`Mixer`] owns its active set and lives on the rendering side. Other
//! threads add streams through a cloneable [`MixerHandle`]; each `add` call
//! travels as one batch over a channel and is admitted at the start of the
//! next pull, so streams added together always start on the same block.
//! Adding never takes a lock the renderer could wait on.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::{Frame, Pulled, Stream, StreamError, SILENCE};

type Batch = Vec<Box<dyn Stream>>;

/// Adds streams to a [`Mixer`] from any thread.
#[derive(Clone)]
pub struct MixerHandle {
    tx: Sender<Batch>,
    live: Arc<AtomicUsize>,
}

impl MixerHandle {
    /// Queue `streams` so they are all mixed starting with the next pull.
    pub fn add(&self, streams: Batch) {
        if streams.is_empty() {
            return;
        }
        // The mixer keeps its own receiver, so the channel never disconnects
        // while a handle can reach it; a send after the mixer is gone just
        // drops the batch.
        let _ = self.tx.send(streams);
    }

    /// Number of active streams as of the last pull.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// No active streams and nothing waiting to be admitted.
    pub fn is_idle(&self) -> bool {
        self.live() == 0 && self.tx.is_empty()
    }
}

/// Summing combiner of concurrently active streams.
///
/// The mixer never ends: with nothing to play it yields silence. It does not
/// clip; sums beyond `[-1, 1]` pass through unchanged.
pub struct Mixer {
    active: Vec<Box<dyn Stream>>,
    tx: Sender<Batch>,
    rx: Receiver<Batch>,
    scratch: Vec<Frame>,
    live: Arc<AtomicUsize>,
}

impl Mixer {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            active: Vec::new(),
            tx,
            rx,
            scratch: Vec::new(),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn handle(&self) -> MixerHandle {
        MixerHandle {
            tx: self.tx.clone(),
            live: Arc::clone(&self.live),
        }
    }

    /// Add streams directly from the owning thread.
    pub fn add(&mut self, streams: Batch) {
        self.active.extend(streams);
        self.live.store(self.active.len(), Ordering::Release);
    }

    /// Number of active streams, not counting queued batches.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    fn admit(&mut self) {
        while let Ok(batch) = self.rx.try_recv() {
            self.active.extend(batch);
        }
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream for Mixer {
    /// Always fills all of `buf`. Streams that end mid-block contribute
    /// silence for the rest of it and are dropped from the active set.
    ///
    /// If a stream fails, it is removed, the remaining streams are still
    /// mixed into `buf`, and the first error is returned.
    fn stream(&mut self, buf: &mut [Frame]) -> Result<Pulled, StreamError> {
        self.admit();
        buf.fill(SILENCE);
        if self.scratch.len() < buf.len() {
            self.scratch.resize(buf.len(), SILENCE);
        }

        let Self {
            active, scratch, ..
        } = self;
        let scratch = &mut scratch[..buf.len()];
        let mut failure = None;

        active.retain_mut(|stream| match stream.stream(scratch) {
            Ok(pulled) => {
                for (out, frame) in buf.iter_mut().zip(&scratch[..pulled.frames]) {
                    out[0] += frame[0];
                    out[1] += frame[1];
                }
                pulled.more
            }
            Err(err) => {
                log::warn!("dropping failed stream: {err}");
                failure.get_or_insert(err);
                false
            }
        });

        self.live.store(self.active.len(), Ordering::Release);
        match failure {
            Some(err) => Err(err),
            None => Ok(Pulled::new(buf.len(), true)),
        }
    }
}
