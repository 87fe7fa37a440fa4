//! Global hotkey trigger
//!
//! Watches the keyboard channel of an [`InputSource`] and fires a callback
//! on its own thread whenever the hotkey goes down. The process-wide slot
//! follows the `OnceLock<Mutex<Option<..>>>` pattern: install on launch,
//! tear down on shutdown.

use crate::capture::{InputChannel, InputSource, RawInput};
use crate::events::KeyId;
use crate::session::MacroSession;
use crate::status::StatusFn;
use crossbeam_channel::RecvTimeoutError;
use macro_core::{Error, ErrorCode, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

const POLL: Duration = Duration::from_millis(50);

pub struct HotkeyTrigger {
    hotkey: KeyId,
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl HotkeyTrigger {
    pub fn spawn<F>(source: &dyn InputSource, hotkey: KeyId, on_trigger: F) -> Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let rx = source.subscribe(InputChannel::Keyboard, 64)?;
        let stop = Arc::new(AtomicBool::new(false));
        let stop_t = stop.clone();
        let key = hotkey.clone();

        let thread = thread::Builder::new()
            .name("macro-hotkey".to_string())
            .spawn(move || {
                while !stop_t.load(Ordering::Relaxed) {
                    match rx.recv_timeout(POLL) {
                        Ok(RawInput::Key { key: k, pressed: true }) if k == key => {
                            tracing::debug!(hotkey = %key, "hotkey pressed");
                            on_trigger();
                        }
                        Ok(_) | Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|e| {
                Error::new(
                    ErrorCode::BackendUnavailable,
                    format!("failed to spawn hotkey thread: {}", e),
                )
            })?;

        tracing::info!(hotkey = %hotkey, "hotkey registered");
        Ok(Self {
            hotkey,
            stop,
            thread: Some(thread),
        })
    }

    /// Start recording on `session` each time the hotkey is pressed.
    /// Refusals (already recording, replaying) are logged and ignored.
    pub fn start_recording_on(
        source: &dyn InputSource,
        hotkey: KeyId,
        session: Arc<MacroSession>,
        on_status: StatusFn,
    ) -> Result<Self> {
        Self::spawn(source, hotkey, move || {
            if let Err(e) = session.start_recording(on_status.clone()) {
                tracing::warn!(error = %e, "hotkey ignored");
            }
        })
    }

    pub fn hotkey(&self) -> &KeyId {
        &self.hotkey
    }

    pub fn shutdown(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(t) = self.thread.take() {
            if t.thread().id() != thread::current().id() {
                let _ = t.join();
            }
        }
    }
}

impl Drop for HotkeyTrigger {
    fn drop(&mut self) {
        self.halt();
    }
}

static GLOBAL_HOTKEY: OnceLock<Mutex<Option<HotkeyTrigger>>> = OnceLock::new();

fn global_slot() -> &'static Mutex<Option<HotkeyTrigger>> {
    GLOBAL_HOTKEY.get_or_init(|| Mutex::new(None))
}

/// Install the process-wide hotkey, shutting down any previous one.
pub fn install_global(trigger: HotkeyTrigger) {
    let previous = global_slot().lock().replace(trigger);
    if let Some(previous) = previous {
        previous.shutdown();
    }
}

/// Tear down the process-wide hotkey. Returns false if none was installed.
pub fn teardown_global() -> bool {
    let current = global_slot().lock().take();
    match current {
        Some(trigger) => {
            tracing::info!(hotkey = %trigger.hotkey(), "hotkey unregistered");
            trigger.shutdown();
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::InputHub;
    use crate::recorder::RecorderConfig;
    use crate::replay::ReplayConfig;
    use crate::status::silent;
    use crossbeam_channel::unbounded;
    use macro_core::LogInjector;
    use std::time::Instant;

    #[test]
    fn test_fires_on_hotkey_press_only() {
        let hub = InputHub::new();
        let (tx, rx) = unbounded();
        let trigger = HotkeyTrigger::spawn(&hub, KeyId::named("f9"), move || {
            let _ = tx.send(());
        })
        .unwrap();

        hub.publish(RawInput::Key { key: KeyId::named("f8"), pressed: true });
        hub.publish(RawInput::Key { key: KeyId::named("f9"), pressed: false });
        hub.publish(RawInput::Key { key: KeyId::named("f9"), pressed: true });

        assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        trigger.shutdown();
        assert_eq!(hub.subscriber_count(InputChannel::Keyboard), 1);
        hub.publish(RawInput::Key { key: KeyId::named("f9"), pressed: true });
        assert_eq!(hub.subscriber_count(InputChannel::Keyboard), 0);
    }

    #[test]
    fn test_hotkey_starts_recording_from_another_thread() {
        let hub = Arc::new(InputHub::new());
        let session = Arc::new(MacroSession::with_config(
            hub.clone(),
            Arc::new(LogInjector),
            RecorderConfig {
                poll_interval: Duration::from_millis(5),
                ..Default::default()
            },
            ReplayConfig::default(),
        ));
        let trigger = HotkeyTrigger::start_recording_on(
            hub.as_ref(),
            KeyId::named("f9"),
            session.clone(),
            silent(),
        )
        .unwrap();

        hub.publish(RawInput::Key { key: KeyId::named("f9"), pressed: true });
        let deadline = Instant::now() + Duration::from_secs(2);
        while !session.is_recording() {
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(2));
        }

        // a second press while recording is refused, not fatal
        hub.publish(RawInput::Key { key: KeyId::named("f9"), pressed: true });
        thread::sleep(Duration::from_millis(20));
        assert!(session.is_recording());

        session.stop_recording(None);
        trigger.shutdown();
    }

    #[test]
    fn test_global_install_and_teardown() {
        let hub = InputHub::new();
        let trigger = HotkeyTrigger::spawn(&hub, KeyId::named("f10"), || {}).unwrap();
        install_global(trigger);
        assert!(teardown_global());
        assert!(!teardown_global());
    }
}
