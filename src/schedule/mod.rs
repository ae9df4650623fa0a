//! Clip scheduler — picks what plays next.
//!
//! The [`Scheduler`] is a small state machine. In `Select` it draws a random
//! clip (and, for beat-capable clips, a random beat variant), wraps both in
//! gain envelopes driven by the shared [`Clock`], and hands them to the mixer
//! as one batch. In `Wait` it sleeps until the speech stream reports that it
//! has played through once. Beat loops never gate progression.
//!
//! Completion tokens carry the selection's sequence number, so a late or
//! duplicate signal from an earlier clip can never wake the scheduler twice.

pub mod periods;

use std::sync::Arc;

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use rand::Rng;
use thiserror::Error;

use crate::asset::{Catalog, BEAT_VARIANTS};
use crate::stream::{Clock, Envelope, GainCurve, MixerHandle, OnEnd, Stream};

pub use periods::{Levels, Periods};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("clip index {index} out of range (catalog has {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("beat variant {variant} out of range for clip `{name}`")]
    VariantOutOfRange { name: String, variant: usize },
}

/// What was added to the mixer by one selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub index: usize,
    pub name: String,
    /// Beat variant, if the clip has beats.
    pub variant: Option<usize>,
    /// Sequence number, starting at 1.
    pub seq: u64,
}

/// Why a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Completed,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Select,
    Wait,
    Stopped,
}

/// Asks a running [`Scheduler`] to stop selecting new clips.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Sender<()>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.tx.try_send(());
    }
}

pub struct Scheduler<R> {
    catalog: Arc<Catalog>,
    mixer: MixerHandle,
    clock: Clock,
    periods: Periods,
    levels: Levels,
    rng: R,
    state: State,
    seq: u64,
    done_tx: Sender<u64>,
    done_rx: Receiver<u64>,
    shutdown_tx: Sender<()>,
    shutdown_rx: Receiver<()>,
}

impl<R: Rng> Scheduler<R> {
    pub fn new(
        catalog: Arc<Catalog>,
        mixer: MixerHandle,
        clock: Clock,
        periods: Periods,
        levels: Levels,
        rng: R,
    ) -> Self {
        let (done_tx, done_rx) = unbounded();
        let (shutdown_tx, shutdown_rx) = bounded(1);
        Self {
            catalog,
            mixer,
            clock,
            periods,
            levels,
            rng,
            state: State::Select,
            seq: 0,
            done_tx,
            done_rx,
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Number of selections made so far.
    pub fn selections(&self) -> u64 {
        self.seq
    }

    /// Pick a uniformly random clip (and variant) and start it.
    pub fn select(&mut self) -> Result<Selection, ScheduleError> {
        let index = self.rng.gen_range(0..self.catalog.len());
        let variant = self
            .catalog
            .beats(index)
            .map(|_| self.rng.gen_range(0..BEAT_VARIANTS));
        self.play(index, variant)
    }

    /// Start clip `index`. `variant` is ignored for clips without beats;
    /// for clips with beats, `None` draws one at random.
    pub fn play(
        &mut self,
        index: usize,
        variant: Option<usize>,
    ) -> Result<Selection, ScheduleError> {
        let speech = self
            .catalog
            .speech(index)
            .ok_or(ScheduleError::IndexOutOfRange {
                index,
                len: self.catalog.len(),
            })?;
        let name = self.catalog.name(index).unwrap_or_default().to_string();

        let beat = match self.catalog.beats(index) {
            Some(set) => {
                let variant = variant.unwrap_or_else(|| self.rng.gen_range(0..BEAT_VARIANTS));
                let asset = set.get(variant).ok_or(ScheduleError::VariantOutOfRange {
                    name: name.clone(),
                    variant,
                })?;
                Some((variant, Arc::clone(asset)))
            }
            None => None,
        };

        self.seq += 1;
        let seq = self.seq;
        let done = self.done_tx.clone();
        let speech_stream = Envelope::with_curve(
            OnEnd::new(speech.streamer(), move || {
                let _ = done.send(seq);
            }),
            self.clock.clone(),
            GainCurve::speech(self.periods.speech),
        )
        .base(self.levels.base)
        .silent(self.levels.mute_speech);

        let mut batch: Vec<Box<dyn Stream>> = vec![Box::new(speech_stream)];
        let variant = beat.map(|(variant, asset)| {
            let beat_stream = Envelope::with_curve(
                asset.streamer(),
                self.clock.clone(),
                GainCurve::beat(self.periods.beat),
            )
            .base(self.levels.base)
            .silent(self.levels.mute_beats);
            batch.push(Box::new(beat_stream));
            variant
        });

        self.mixer.add(batch);
        self.state = State::Wait;

        let selection = Selection {
            index,
            name,
            variant,
            seq,
        };
        log::info!(
            "#{} playing `{}` (clip {}{})",
            selection.seq,
            selection.name,
            selection.index,
            match selection.variant {
                Some(v) => format!(", beat {}", v + 1),
                None => String::new(),
            }
        );
        Ok(selection)
    }

    fn accept(&self, token: u64) -> bool {
        token == self.seq
    }

    /// Block until the current clip completes or shutdown is requested.
    pub fn wait(&mut self) -> Wake {
        loop {
            select! {
                recv(self.done_rx) -> token => {
                    if let Ok(token) = token {
                        if self.accept(token) {
                            return Wake::Completed;
                        }
                    }
                }
                recv(self.shutdown_rx) -> _ => return Wake::Shutdown,
            }
        }
    }

    /// Non-blocking [`wait`](Self::wait).
    pub fn try_wait(&mut self) -> Option<Wake> {
        if self.shutdown_rx.try_recv().is_ok() {
            return Some(Wake::Shutdown);
        }
        while let Ok(token) = self.done_rx.try_recv() {
            if self.accept(token) {
                return Some(Wake::Completed);
            }
        }
        None
    }

    /// Advance the state machine without blocking.
    ///
    /// Returns the new selection if one was made.
    pub fn poll(&mut self) -> Result<Option<Selection>, ScheduleError> {
        if self.state == State::Wait {
            match self.try_wait() {
                Some(Wake::Completed) => self.state = State::Select,
                Some(Wake::Shutdown) => self.state = State::Stopped,
                None => {}
            }
        }
        match self.state {
            State::Select => self.select().map(Some),
            State::Wait | State::Stopped => Ok(None),
        }
    }

    /// Select and wait until shut down. Returns the number of selections.
    pub fn run(&mut self) -> Result<u64, ScheduleError> {
        loop {
            match self.state {
                State::Select => {
                    self.select()?;
                }
                State::Wait => match self.wait() {
                    Wake::Completed => self.state = State::Select,
                    Wake::Shutdown => self.state = State::Stopped,
                },
                State::Stopped => {
                    log::info!("scheduler stopped after {} selections", self.seq);
                    return Ok(self.seq);
                }
            }
        }
    }
}
