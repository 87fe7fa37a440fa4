//! Recorder: turns raw input notifications into a timed event log
//!
//! One pump thread per input channel drains its subscription and appends to
//! the shared capture under a single lock, so events land in arrival order
//! and every delay is measured against the previously appended event.

use crate::capture::{InputChannel, InputSource, RawInput};
use crate::events::{Action, Event, EventLog, KeyId};
use crate::status::StatusFn;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use macro_core::{Error, ErrorCode, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Called once with the finished log when a recording stops.
pub type CompleteFn = Box<dyn FnOnce(EventLog) + Send>;

/// Recorder configuration
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Key whose press stops the recording; never appended to the log
    pub cancel_key: KeyId,
    /// How often capture threads look at the stop flag
    pub poll_interval: Duration,
    /// Capacity of each subscription channel
    pub max_buffer: usize,
    /// Mouse move sampling - skip moves closer than N pixels to the last one.
    /// 0 records every move.
    pub mouse_move_threshold: f64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            cancel_key: KeyId::named("esc"),
            poll_interval: Duration::from_millis(50),
            max_buffer: 10_000,
            mouse_move_threshold: 0.0,
        }
    }
}

impl RecorderConfig {
    pub fn cancel_key(mut self, key: KeyId) -> Self {
        self.cancel_key = key;
        self
    }

    pub fn mouse_move_threshold(mut self, pixels: f64) -> Self {
        self.mouse_move_threshold = pixels;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
}

/// Everything the capture threads share. Guarded by one lock.
struct Capture {
    state: RecordingState,
    /// Bumped on every start so stragglers from an older session are ignored
    session: u64,
    events: Vec<Event>,
    last_time: Instant,
    last_pointer: Option<(i32, i32)>,
    stop: Arc<AtomicBool>,
    on_status: Option<StatusFn>,
    on_complete: Option<CompleteFn>,
}

/// What is left to do after the lock is released
struct Finished {
    log: EventLog,
    on_status: Option<StatusFn>,
    on_complete: Option<CompleteFn>,
}

impl Finished {
    fn notify(self, status: Option<StatusFn>) {
        tracing::info!(events = self.log.len(), "recording stopped");
        if let Some(done) = self.on_complete {
            done(self.log);
        }
        if let Some(status) = status.or(self.on_status) {
            status("Recording stopped.");
        }
    }
}

impl Capture {
    fn halt(&mut self) -> Finished {
        self.state = RecordingState::Idle;
        self.stop.store(true, Ordering::SeqCst);
        Finished {
            log: EventLog::from(std::mem::take(&mut self.events)),
            on_status: self.on_status.take(),
            on_complete: self.on_complete.take(),
        }
    }
}

/// The recorder
pub struct Recorder {
    config: RecorderConfig,
    source: Arc<dyn InputSource>,
    capture: Arc<Mutex<Capture>>,
    threads: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl Recorder {
    pub fn new(source: Arc<dyn InputSource>) -> Self {
        Self::with_config(source, RecorderConfig::default())
    }

    pub fn with_config(source: Arc<dyn InputSource>, config: RecorderConfig) -> Self {
        Self {
            config,
            source,
            capture: Arc::new(Mutex::new(Capture {
                state: RecordingState::Idle,
                session: 0,
                events: Vec::new(),
                last_time: Instant::now(),
                last_pointer: None,
                stop: Arc::new(AtomicBool::new(true)),
                on_status: None,
                on_complete: None,
            })),
            threads: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn state(&self) -> RecordingState {
        self.capture.lock().state
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecordingState::Recording
    }

    /// Number of events captured so far in the running session
    pub fn captured(&self) -> usize {
        self.capture.lock().events.len()
    }

    /// Start a fresh recording. `on_complete` receives the finished log
    /// exactly once, whether the session ends through [`Recorder::stop`],
    /// the cancel key, or the recorder being dropped. It is not called when
    /// `start` itself fails.
    pub fn start(&self, on_status: StatusFn, on_complete: CompleteFn) -> Result<()> {
        let (session, stop) = {
            let mut cap = self.capture.lock();
            if cap.state == RecordingState::Recording {
                return Err(Error::already_recording());
            }
            let stop = Arc::new(AtomicBool::new(false));
            cap.state = RecordingState::Recording;
            cap.session += 1;
            cap.events.clear();
            cap.last_time = Instant::now();
            cap.last_pointer = None;
            cap.stop = stop.clone();
            cap.on_status = Some(on_status.clone());
            cap.on_complete = Some(on_complete);
            (cap.session, stop)
        };
        // only pumps of earlier sessions are left to join here
        self.reap();

        let subscribed = self
            .source
            .subscribe(InputChannel::Pointer, self.config.max_buffer)
            .and_then(|pointer| {
                let keyboard = self
                    .source
                    .subscribe(InputChannel::Keyboard, self.config.max_buffer)?;
                Ok((pointer, keyboard))
            });
        let (pointer, keyboard) = match subscribed {
            Ok(pair) => pair,
            Err(e) => {
                self.abandon(session);
                return Err(e);
            }
        };

        for (name, rx) in [("macro-pointer", pointer), ("macro-keyboard", keyboard)] {
            let pump = Pump {
                capture: self.capture.clone(),
                session,
                stop: stop.clone(),
                config: self.config.clone(),
            };
            let spawned = thread::Builder::new()
                .name(name.to_string())
                .spawn(move || pump.run(rx));
            match spawned {
                Ok(handle) => self.threads.lock().push(handle),
                Err(e) => {
                    self.abandon(session);
                    return Err(Error::new(
                        ErrorCode::BackendUnavailable,
                        format!("failed to spawn capture thread: {}", e),
                    ));
                }
            }
        }

        tracing::info!(session, "recording started");
        on_status(&format!(
            "Recording... Press '{}' to stop.",
            key_label(&self.config.cancel_key)
        ));
        Ok(())
    }

    /// Stop the running recording. Returns false (and does nothing) when idle.
    /// `on_status` overrides the callback given to [`Recorder::start`].
    pub fn stop(&self, on_status: Option<StatusFn>) -> bool {
        let finished = {
            let mut cap = self.capture.lock();
            if cap.state != RecordingState::Recording {
                return false;
            }
            cap.halt()
        };
        finished.notify(on_status);
        self.reap();
        true
    }

    /// Roll back a session whose start failed. Its callbacks are dropped.
    fn abandon(&self, session: u64) {
        let mut cap = self.capture.lock();
        if cap.session == session && cap.state == RecordingState::Recording {
            drop(cap.halt());
        }
    }

    /// Join capture threads whose session has ended.
    fn reap(&self) {
        let handles = std::mem::take(&mut *self.threads.lock());
        let me = thread::current().id();
        for handle in handles {
            if handle.thread().id() != me {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.stop(None);
    }
}

// ============================================================================
// Capture threads
// ============================================================================

struct Pump {
    capture: Arc<Mutex<Capture>>,
    session: u64,
    stop: Arc<AtomicBool>,
    config: RecorderConfig,
}

impl Pump {
    fn run(self, rx: Receiver<RawInput>) {
        while !self.stop.load(Ordering::Relaxed) {
            match rx.recv_timeout(self.config.poll_interval) {
                Ok(input) => self.handle(input),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn handle(&self, input: RawInput) {
        let mut cap = self.capture.lock();
        if cap.state != RecordingState::Recording || cap.session != self.session {
            return;
        }

        if let RawInput::Key { key, pressed: true } = &input {
            if *key == self.config.cancel_key {
                let finished = cap.halt();
                drop(cap);
                finished.notify(None);
                return;
            }
        }

        if let RawInput::Move { x, y } = input {
            if self.config.mouse_move_threshold > 0.0 {
                if let Some((lx, ly)) = cap.last_pointer {
                    let (dx, dy) = (f64::from(x - lx), f64::from(y - ly));
                    if (dx * dx + dy * dy).sqrt() < self.config.mouse_move_threshold {
                        return;
                    }
                }
            }
            cap.last_pointer = Some((x, y));
        }

        let now = Instant::now();
        let elapsed = now.saturating_duration_since(cap.last_time);
        cap.last_time = now;

        let event = Event::new(to_action(input), elapsed);
        tracing::debug!(action = event.action.name(), delay = event.delay, "recorded");
        cap.events.push(event);
    }
}

fn to_action(input: RawInput) -> Action {
    match input {
        RawInput::Move { x, y } => Action::MouseMove { x, y },
        RawInput::Button { x, y, button, pressed: true } => Action::MousePress { x, y, button },
        RawInput::Button { x, y, button, pressed: false } => Action::MouseRelease { x, y, button },
        RawInput::Scroll { x, y, dx, dy } => Action::MouseScroll { x, y, dx, dy },
        RawInput::Key { key, pressed: true } => Action::KeyPress { key },
        RawInput::Key { key, pressed: false } => Action::KeyRelease { key },
    }
}

fn key_label(key: &KeyId) -> String {
    match key {
        KeyId::Char(c) => c.to_string(),
        KeyId::Named(n) => {
            let mut chars = n.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::InputHub;
    use crate::status::status_channel;
    use crossbeam_channel::{unbounded, Receiver as Rx};
    use macro_core::MouseButton;

    fn fast_config() -> RecorderConfig {
        RecorderConfig {
            poll_interval: Duration::from_millis(5),
            ..Default::default()
        }
    }

    fn setup(config: RecorderConfig) -> (Arc<InputHub>, Recorder) {
        let hub = Arc::new(InputHub::new());
        let recorder = Recorder::with_config(hub.clone(), config);
        (hub, recorder)
    }

    fn completion() -> (CompleteFn, Rx<EventLog>) {
        let (tx, rx) = unbounded();
        let f: CompleteFn = Box::new(move |log| {
            let _ = tx.send(log);
        });
        (f, rx)
    }

    fn wait_for(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not met in time");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_start_reports_status_and_rejects_second_start() {
        let (_hub, recorder) = setup(fast_config());
        let (status, msgs) = status_channel();
        let (done, _) = completion();
        recorder.start(status.clone(), done).unwrap();
        assert!(recorder.is_recording());
        assert_eq!(msgs.try_recv().unwrap(), "Recording... Press 'Esc' to stop.");

        let (done2, _) = completion();
        let err = recorder.start(status, done2).unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyRecording);
        recorder.stop(None);
    }

    #[test]
    fn test_records_in_arrival_order_with_delays() {
        let (hub, recorder) = setup(fast_config());
        let (status, _msgs) = status_channel();
        let (done, logs) = completion();
        recorder.start(status, done).unwrap();

        hub.publish(RawInput::Move { x: 10, y: 10 });
        wait_for(|| recorder.captured() == 1);
        thread::sleep(Duration::from_millis(40));
        hub.publish(RawInput::Button { x: 10, y: 10, button: MouseButton::Left, pressed: true });
        hub.publish(RawInput::Button { x: 10, y: 10, button: MouseButton::Left, pressed: false });
        wait_for(|| recorder.captured() == 3);

        assert!(recorder.stop(None));
        let log = logs.try_recv().unwrap();
        let actions: Vec<_> = log.iter().map(|e| e.action.name()).collect();
        assert_eq!(actions, vec!["mouse_move", "mouse_press", "mouse_release"]);
        assert!(log.events()[1].delay >= 0.04);
        assert!(log.iter().all(|e| e.delay >= 0.0));
    }

    #[test]
    fn test_cancel_key_stops_and_is_not_recorded() {
        let (hub, recorder) = setup(fast_config());
        let (status, msgs) = status_channel();
        let (done, logs) = completion();
        recorder.start(status, done).unwrap();

        hub.publish(RawInput::Key { key: KeyId::Char('a'), pressed: true });
        hub.publish(RawInput::Key { key: KeyId::Char('a'), pressed: false });
        hub.publish(RawInput::Key { key: KeyId::named("esc"), pressed: true });

        let log = logs.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(!recorder.is_recording());
        assert_eq!(log.len(), 2);
        assert_eq!(
            log.events()[1].action,
            Action::KeyRelease { key: KeyId::Char('a') }
        );

        let timeout = Duration::from_secs(2);
        assert!(msgs.recv_timeout(timeout).unwrap().starts_with("Recording..."));
        assert_eq!(msgs.recv_timeout(timeout).unwrap(), "Recording stopped.");
    }

    #[test]
    fn test_cancel_key_release_is_recorded_as_ordinary_key() {
        let (hub, recorder) = setup(fast_config());
        let (status, _) = status_channel();
        let (done, logs) = completion();
        recorder.start(status, done).unwrap();

        hub.publish(RawInput::Key { key: KeyId::named("esc"), pressed: false });
        wait_for(|| recorder.captured() == 1);
        recorder.stop(None);
        let log = logs.try_recv().unwrap();
        assert_eq!(log.events()[0].action, Action::KeyRelease { key: KeyId::named("esc") });
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let (_hub, recorder) = setup(fast_config());
        let (status, msgs) = status_channel();
        assert!(!recorder.stop(Some(status)));
        assert!(msgs.try_recv().is_err());
    }

    #[test]
    fn test_stop_uses_override_status_and_completes_once() {
        let (_hub, recorder) = setup(fast_config());
        let (start_status, start_msgs) = status_channel();
        let (stop_status, stop_msgs) = status_channel();
        let (done, logs) = completion();
        recorder.start(start_status, done).unwrap();
        let _ = start_msgs.try_recv();

        assert!(recorder.stop(Some(stop_status)));
        assert!(!recorder.stop(None));
        assert_eq!(stop_msgs.try_recv().unwrap(), "Recording stopped.");
        assert!(start_msgs.try_recv().is_err());
        assert!(logs.try_recv().unwrap().is_empty());
        assert!(logs.try_recv().is_err());
    }

    #[test]
    fn test_late_notifications_discarded() {
        let (hub, recorder) = setup(fast_config());
        let (status, _) = status_channel();
        let (done, logs) = completion();
        recorder.start(status, done).unwrap();
        recorder.stop(None);
        hub.publish(RawInput::Move { x: 1, y: 1 });
        assert_eq!(recorder.captured(), 0);
        assert!(logs.try_recv().unwrap().is_empty());
        assert_eq!(hub.subscriber_count(InputChannel::Pointer), 0);
    }

    #[test]
    fn test_restart_resets_log() {
        let (hub, recorder) = setup(fast_config());
        let (status, _) = status_channel();

        let (done, logs) = completion();
        recorder.start(status.clone(), done).unwrap();
        hub.publish(RawInput::Move { x: 1, y: 1 });
        wait_for(|| recorder.captured() == 1);
        recorder.stop(None);
        assert_eq!(logs.try_recv().unwrap().len(), 1);

        let (done, logs) = completion();
        recorder.start(status, done).unwrap();
        assert_eq!(recorder.captured(), 0);
        hub.publish(RawInput::Move { x: 2, y: 2 });
        wait_for(|| recorder.captured() == 1);
        recorder.stop(None);
        let log = logs.try_recv().unwrap();
        assert_eq!(log.events()[0].action, Action::MouseMove { x: 2, y: 2 });
    }

    #[test]
    fn test_move_threshold_samples_moves() {
        let (hub, recorder) = setup(RecorderConfig {
            mouse_move_threshold: 5.0,
            ..fast_config()
        });
        let (status, _) = status_channel();
        let (done, logs) = completion();
        recorder.start(status, done).unwrap();

        hub.publish(RawInput::Move { x: 0, y: 0 });
        hub.publish(RawInput::Move { x: 2, y: 2 });
        hub.publish(RawInput::Move { x: 10, y: 0 });
        hub.publish(RawInput::Scroll { x: 10, y: 0, dx: 0.0, dy: 1.0 });
        wait_for(|| recorder.captured() == 3);
        recorder.stop(None);

        let log = logs.try_recv().unwrap();
        assert_eq!(log.events()[1].action, Action::MouseMove { x: 10, y: 0 });
    }

    #[test]
    fn test_drop_completes_running_recording() {
        let (_hub, recorder) = setup(fast_config());
        let (status, _) = status_channel();
        let (done, logs) = completion();
        recorder.start(status, done).unwrap();
        drop(recorder);
        assert!(logs.try_recv().is_ok());
    }

    struct DeadSource;

    impl InputSource for DeadSource {
        fn subscribe(&self, _channel: InputChannel, _capacity: usize) -> Result<Receiver<RawInput>> {
            Err(Error::backend_unavailable("no input device"))
        }
    }

    #[test]
    fn test_failed_subscribe_leaves_recorder_idle() {
        let recorder = Recorder::with_config(Arc::new(DeadSource), fast_config());
        let (status, msgs) = status_channel();
        let (done, logs) = completion();

        let err = recorder.start(status, done).unwrap_err();
        assert_eq!(err.code, ErrorCode::BackendUnavailable);
        assert!(!recorder.is_recording());
        assert!(msgs.try_recv().is_err());
        assert!(logs.try_recv().is_err());
        assert!(!recorder.stop(None));
    }

    #[test]
    fn test_racing_starts_one_wins_without_blocking() {
        let hub = Arc::new(InputHub::new());
        let recorder = Arc::new(Recorder::with_config(hub, fast_config()));
        let barrier = Arc::new(std::sync::Barrier::new(2));

        let racers: Vec<_> = (0..2)
            .map(|_| {
                let r = recorder.clone();
                let b = barrier.clone();
                thread::spawn(move || {
                    let (status, _) = status_channel();
                    b.wait();
                    let t = Instant::now();
                    let ok = r.start(status, Box::new(|_: EventLog| {})).is_ok();
                    (ok, t.elapsed())
                })
            })
            .collect();
        let results: Vec<(bool, Duration)> = racers.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|(ok, _)| *ok).count(), 1);
        assert!(results.iter().all(|(_, took)| *took < Duration::from_secs(1)));
        assert!(recorder.is_recording());
        assert!(recorder.stop(None));
    }

    #[test]
    fn test_key_label() {
        assert_eq!(key_label(&KeyId::named("esc")), "Esc");
        assert_eq!(key_label(&KeyId::Char('q')), "q");
    }
}
