//! Paced replay of an event log against an injection surface
//!
//! Each event is dispatched only after its recorded delay has elapsed.
//! Sleeps are sliced by `poll_interval` so a stop request is observed
//! promptly. A failed dispatch is logged and skipped, never fatal.

use crate::events::{Action, Event, EventLog};
use crate::status::StatusFn;
use macro_core::{Error, ErrorCode, InjectResult, InputInjector, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Called exactly once per replay run, after the loop ends.
pub type DoneFn = Box<dyn FnOnce(&ReplayStats) + Send>;

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Pointer glide for moves. Some backends drop instantaneous warps.
    pub glide: Duration,
    /// Injection units per normalized scroll notch
    pub scroll_scale: f64,
    /// Playback speed (1.0 = real-time, 2.0 = 2x speed)
    pub speed: f64,
    /// Cancellation granularity while sleeping
    pub poll_interval: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            glide: Duration::from_millis(100),
            scroll_scale: 100.0,
            speed: 1.0,
            poll_interval: Duration::from_millis(10),
        }
    }
}

impl ReplayConfig {
    pub fn speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn glide(mut self, glide: Duration) -> Self {
        self.glide = glide;
        self
    }

    pub fn scroll_scale(mut self, scale: f64) -> Self {
        self.scroll_scale = scale;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    Idle,
    Replaying,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayStats {
    /// Repetitions that ran to the end
    pub repetitions: u32,
    pub dispatched: usize,
    pub failed: usize,
    pub moves: usize,
    pub clicks: usize,
    pub scrolls: usize,
    pub keys: usize,
    pub cancelled: bool,
}

/// Replay recorded macros
pub struct Replayer {
    config: ReplayConfig,
    injector: Arc<dyn InputInjector>,
    replaying: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Replayer {
    pub fn new(injector: Arc<dyn InputInjector>) -> Self {
        Self::with_config(injector, ReplayConfig::default())
    }

    pub fn with_config(injector: Arc<dyn InputInjector>, config: ReplayConfig) -> Self {
        Self {
            config,
            injector,
            replaying: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
            thread: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    pub fn state(&self) -> ReplayState {
        if self.replaying.load(Ordering::SeqCst) {
            ReplayState::Replaying
        } else {
            ReplayState::Idle
        }
    }

    pub fn is_replaying(&self) -> bool {
        self.state() == ReplayState::Replaying
    }

    /// Replay `log` `repetitions` times on a background thread, pausing
    /// `interval` between repetitions. `repetitions == 0` runs nothing and
    /// calls `on_done` right away.
    pub fn spawn(
        &self,
        log: Arc<EventLog>,
        repetitions: u32,
        interval: Duration,
        on_status: StatusFn,
        on_done: DoneFn,
    ) -> Result<()> {
        if self
            .replaying
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::already_replaying());
        }
        self.wait();

        if repetitions == 0 {
            self.replaying.store(false, Ordering::SeqCst);
            on_done(&ReplayStats::default());
            return Ok(());
        }

        self.cancel.store(false, Ordering::SeqCst);
        let run = Run {
            config: self.config.clone(),
            injector: self.injector.clone(),
            replaying: self.replaying.clone(),
            cancel: self.cancel.clone(),
        };

        tracing::info!(events = log.len(), repetitions, "replay started");
        let spawned = thread::Builder::new()
            .name("macro-replay".to_string())
            .spawn(move || run.execute(&log, repetitions, interval, on_status, on_done));

        match spawned {
            Ok(handle) => {
                *self.thread.lock() = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.replaying.store(false, Ordering::SeqCst);
                Err(Error::new(
                    ErrorCode::BackendUnavailable,
                    format!("failed to spawn replay thread: {}", e),
                ))
            }
        }
    }

    /// Request cancellation. Returns false when nothing is replaying.
    pub fn stop(&self) -> bool {
        if !self.is_replaying() {
            return false;
        }
        tracing::info!("replay cancellation requested");
        self.cancel.store(true, Ordering::SeqCst);
        true
    }

    /// Block until the current replay thread (if any) has finished.
    pub fn wait(&self) {
        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for Replayer {
    fn drop(&mut self) {
        self.stop();
        self.wait();
    }
}

struct Run {
    config: ReplayConfig,
    injector: Arc<dyn InputInjector>,
    replaying: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
}

impl Run {
    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn execute(
        self,
        log: &EventLog,
        repetitions: u32,
        interval: Duration,
        on_status: StatusFn,
        on_done: DoneFn,
    ) {
        let mut done = Completion {
            replaying: self.replaying.clone(),
            cancel: self.cancel.clone(),
            stats: ReplayStats::default(),
            on_done: Some(on_done),
        };
        let stats = &mut done.stats;

        'reps: for i in 0..repetitions {
            if self.cancelled() {
                break;
            }
            if i > 0 && !self.pause(interval) {
                break;
            }
            on_status(&format!("Replaying... Repetition {}/{}", i + 1, repetitions));

            for event in log {
                if self.cancelled() || !self.pause(self.scaled(event.delay())) {
                    break 'reps;
                }
                match dispatch(self.injector.as_ref(), event, &self.config) {
                    Ok(()) => {
                        stats.dispatched += 1;
                        count(stats, &event.action);
                    }
                    Err(e) => {
                        stats.failed += 1;
                        tracing::warn!(action = event.action.name(), error = %e, "error replaying event");
                    }
                }
            }

            if !self.cancelled() {
                stats.repetitions += 1;
            }
        }
    }

    fn scaled(&self, delay: Duration) -> Duration {
        let speed = self.config.speed;
        if speed.is_finite() && speed > 0.0 {
            Duration::try_from_secs_f64(delay.as_secs_f64() / speed).unwrap_or(Duration::MAX)
        } else {
            delay
        }
    }

    /// Sleep for at least `d`. Returns false if cancelled before it elapsed.
    /// A `d` past the clock's range sleeps until cancelled.
    fn pause(&self, d: Duration) -> bool {
        let deadline = Instant::now().checked_add(d);
        loop {
            if self.cancelled() {
                return false;
            }
            let step = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return true;
                    }
                    (deadline - now).min(self.config.poll_interval)
                }
                None => self.config.poll_interval,
            };
            thread::sleep(step);
        }
    }
}

/// Ends the run: clears the replaying flag and hands the stats to `on_done`.
/// Runs on drop so a panicking injector still releases the session.
struct Completion {
    replaying: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    stats: ReplayStats,
    on_done: Option<DoneFn>,
}

impl Drop for Completion {
    fn drop(&mut self) {
        let panicked = thread::panicking();
        self.stats.cancelled = panicked || self.cancel.load(Ordering::SeqCst);
        if panicked {
            tracing::error!(dispatched = self.stats.dispatched, "replay aborted by a panic");
        }
        tracing::info!(
            repetitions = self.stats.repetitions,
            dispatched = self.stats.dispatched,
            failed = self.stats.failed,
            cancelled = self.stats.cancelled,
            "replay finished"
        );
        self.replaying.store(false, Ordering::SeqCst);
        if let Some(on_done) = self.on_done.take() {
            on_done(&self.stats);
        }
    }
}

fn count(stats: &mut ReplayStats, action: &Action) {
    match action {
        Action::MouseMove { .. } => stats.moves += 1,
        Action::MousePress { .. } | Action::MouseRelease { .. } => stats.clicks += 1,
        Action::MouseScroll { .. } => stats.scrolls += 1,
        Action::KeyPress { .. } | Action::KeyRelease { .. } => stats.keys += 1,
    }
}

/// Drive a single event into the injector.
pub fn dispatch(injector: &dyn InputInjector, event: &Event, config: &ReplayConfig) -> InjectResult<()> {
    tracing::debug!(action = event.action.name(), "dispatch");
    match &event.action {
        Action::MouseMove { x, y } => injector.move_to(*x, *y, config.glide),
        Action::MousePress { x, y, button } => injector.mouse_down(*x, *y, *button),
        Action::MouseRelease { x, y, button } => injector.mouse_up(*x, *y, *button),
        Action::MouseScroll { x, y, dy, .. } => {
            injector.scroll(*x, *y, (dy * config.scroll_scale) as i32)
        }
        Action::KeyPress { key } => injector.key_down(&key.injector_name()),
        Action::KeyRelease { key } => injector.key_up(&key.injector_name()),
    }
}
