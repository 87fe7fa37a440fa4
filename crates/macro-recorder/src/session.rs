//! Session controller
//!
//! Owns one [`Recorder`], one [`Replayer`] and the current event log, and
//! refuses any transition that would let recording and replaying overlap.
//! All methods take `&self`; share the session behind an `Arc` to call it
//! from a UI thread and a hotkey thread at once.

use crate::capture::InputSource;
use crate::events::EventLog;
use crate::recorder::{Recorder, RecorderConfig};
use crate::replay::{DoneFn, ReplayConfig, Replayer};
use crate::status::StatusFn;
use crate::storage;
use macro_core::{Error, InputInjector, Result};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Called with every finished recording, after it became the current log.
pub type RecordedFn = Arc<dyn Fn(Arc<EventLog>) + Send + Sync>;

/// Which controls make sense right now. Advisory only: every operation
/// re-checks state itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub record: bool,
    pub stop: bool,
    pub replay: bool,
    pub save: bool,
    pub load: bool,
}

pub struct MacroSession {
    recorder: Recorder,
    replayer: Replayer,
    log: Arc<Mutex<Arc<EventLog>>>,
    on_recorded: Arc<Mutex<Option<RecordedFn>>>,
    /// Held across check-then-start so the two sessions cannot both begin
    transition: Mutex<()>,
}

impl MacroSession {
    pub fn new(source: Arc<dyn InputSource>, injector: Arc<dyn InputInjector>) -> Self {
        Self::with_config(
            source,
            injector,
            RecorderConfig::default(),
            ReplayConfig::default(),
        )
    }

    pub fn with_config(
        source: Arc<dyn InputSource>,
        injector: Arc<dyn InputInjector>,
        recorder: RecorderConfig,
        replay: ReplayConfig,
    ) -> Self {
        Self {
            recorder: Recorder::with_config(source, recorder),
            replayer: Replayer::with_config(injector, replay),
            log: Arc::new(Mutex::new(Arc::new(EventLog::new()))),
            on_recorded: Arc::new(Mutex::new(None)),
            transition: Mutex::new(()),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn is_replaying(&self) -> bool {
        self.replayer.is_replaying()
    }

    /// Snapshot of the current log. Empty while a recording is running.
    pub fn current_log(&self) -> Arc<EventLog> {
        self.log.lock().clone()
    }

    /// Events captured so far by a running recording
    pub fn captured(&self) -> usize {
        self.recorder.captured()
    }

    pub fn controls(&self) -> Controls {
        let recording = self.is_recording();
        let replaying = self.is_replaying();
        let has_events = !self.log.lock().is_empty();
        Controls {
            record: !recording && !replaying,
            stop: recording || replaying,
            replay: !recording && !replaying && has_events,
            save: !recording && has_events,
            load: !recording,
        }
    }

    /// Begin a new recording. The current log is replaced by an empty one and
    /// then by the finished recording once it stops.
    pub fn start_recording(&self, on_status: StatusFn) -> Result<()> {
        let _t = self.transition.lock();
        if self.replayer.is_replaying() {
            return Err(Error::already_replaying());
        }
        if self.recorder.is_recording() {
            return Err(Error::already_recording());
        }

        let previous = std::mem::replace(&mut *self.log.lock(), Arc::new(EventLog::new()));
        let slot = self.log.clone();
        let hook = self.on_recorded.clone();
        let started = self.recorder.start(
            on_status,
            Box::new(move |finished| {
                let log = Arc::new(finished);
                *slot.lock() = log.clone();
                let hook = hook.lock().clone();
                if let Some(hook) = hook {
                    hook(log);
                }
            }),
        );
        if started.is_err() {
            *self.log.lock() = previous;
        }
        started
    }

    /// Register a callback for finished recordings, replacing any previous one.
    pub fn on_recorded(&self, hook: RecordedFn) {
        *self.on_recorded.lock() = Some(hook);
    }

    /// No-op (returns false) when not recording.
    pub fn stop_recording(&self, on_status: Option<StatusFn>) -> bool {
        self.recorder.stop(on_status)
    }

    /// Replay `events` on a background thread. See [`Replayer::spawn`].
    pub fn replay_macro(
        &self,
        events: Arc<EventLog>,
        repetitions: u32,
        interval: Duration,
        on_status: StatusFn,
        on_done: DoneFn,
    ) -> Result<()> {
        let _t = self.transition.lock();
        if self.recorder.is_recording() {
            return Err(Error::already_recording());
        }
        self.replayer
            .spawn(events, repetitions, interval, on_status, on_done)
    }

    /// Replay the current log; an empty log is refused with `EmptyMacro`.
    pub fn replay_current(
        &self,
        repetitions: u32,
        interval: Duration,
        on_status: StatusFn,
        on_done: DoneFn,
    ) -> Result<()> {
        let log = self.current_log();
        if log.is_empty() {
            return Err(Error::empty_macro());
        }
        self.replay_macro(log, repetitions, interval, on_status, on_done)
    }

    /// No-op (returns false) when not replaying.
    pub fn stop_replaying(&self) -> bool {
        self.replayer.stop()
    }

    /// Block until a running replay has finished.
    pub fn wait_replay(&self) {
        self.replayer.wait();
    }

    pub fn save_macro(&self, path: impl AsRef<Path>) -> Result<()> {
        if self.recorder.is_recording() {
            return Err(Error::already_recording());
        }
        storage::save_macro(&self.current_log(), path)
    }

    /// Load a macro and make it the current log. On failure the current log
    /// is left untouched.
    pub fn load_macro(&self, path: impl AsRef<Path>) -> Result<Arc<EventLog>> {
        if self.recorder.is_recording() {
            return Err(Error::already_recording());
        }
        let log = Arc::new(storage::load_macro(path)?);
        *self.log.lock() = log.clone();
        Ok(log)
    }
}
