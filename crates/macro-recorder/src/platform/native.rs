//! Process-wide input listener using `rdev`
//!
//! `rdev::listen` blocks its thread for the life of the process and can only
//! run once, so a single listener publishes into one global [`InputHub`] and
//! every recorder or hotkey subscribes to that hub.

use crate::capture::{InputHub, RawInput};
use crate::events::KeyId;
use crossbeam_channel::{bounded, RecvTimeoutError};
use macro_core::{Error, MouseButton, Result};
use parking_lot::Mutex;
use rdev::{Button, EventType, Key};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

// rdev reports setup failures right away; success is silence
const STARTUP_GRACE: Duration = Duration::from_millis(250);

static LISTENER: OnceLock<Mutex<Option<Arc<InputHub>>>> = OnceLock::new();

fn listener_slot() -> &'static Mutex<Option<Arc<InputHub>>> {
    LISTENER.get_or_init(|| Mutex::new(None))
}

/// The global hub fed by the host listener, starting the listener on first use.
pub fn global_hub() -> Result<Arc<InputHub>> {
    let mut slot = listener_slot().lock();
    if let Some(hub) = slot.as_ref() {
        return Ok(hub.clone());
    }

    let hub = Arc::new(InputHub::new());
    let (err_tx, err_rx) = bounded::<String>(1);
    let publish_to = hub.clone();

    thread::Builder::new()
        .name("macro-listener".to_string())
        .spawn(move || {
            let mut translator = Translator::default();
            let result = rdev::listen(move |event| {
                if let Some(input) = translator.translate(&event) {
                    publish_to.publish(input);
                }
            });
            if let Err(e) = result {
                let _ = err_tx.send(format!("{:?}", e));
            }
        })
        .map_err(|e| Error::backend_unavailable(format!("failed to spawn listener: {}", e)))?;

    match err_rx.recv_timeout(STARTUP_GRACE) {
        Ok(reason) => Err(Error::backend_unavailable(format!(
            "input listener failed: {}",
            reason
        ))),
        Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
            tracing::info!("input listener started");
            *slot = Some(hub.clone());
            Ok(hub)
        }
    }
}

/// Tracks pointer position so button and wheel events carry coordinates.
#[derive(Default)]
struct Translator {
    pointer: (f64, f64),
}

impl Translator {
    fn translate(&mut self, event: &rdev::Event) -> Option<RawInput> {
        let (x, y) = (self.pointer.0.round() as i32, self.pointer.1.round() as i32);
        Some(match &event.event_type {
            EventType::MouseMove { x, y } => {
                self.pointer = (*x, *y);
                RawInput::Move {
                    x: x.round() as i32,
                    y: y.round() as i32,
                }
            }
            EventType::ButtonPress(b) => RawInput::Button {
                x,
                y,
                button: to_button(*b)?,
                pressed: true,
            },
            EventType::ButtonRelease(b) => RawInput::Button {
                x,
                y,
                button: to_button(*b)?,
                pressed: false,
            },
            EventType::Wheel { delta_x, delta_y } => RawInput::Scroll {
                x,
                y,
                dx: *delta_x as f64,
                dy: *delta_y as f64,
            },
            EventType::KeyPress(k) => RawInput::Key {
                key: key_id(*k, event.name.as_deref()),
                pressed: true,
            },
            EventType::KeyRelease(k) => RawInput::Key {
                key: key_id(*k, event.name.as_deref()),
                pressed: false,
            },
        })
    }
}

fn to_button(b: Button) -> Option<MouseButton> {
    match b {
        Button::Left => Some(MouseButton::Left),
        Button::Right => Some(MouseButton::Right),
        Button::Middle => Some(MouseButton::Middle),
        Button::Unknown(_) => None,
    }
}

/// Printable keys become characters; everything else gets a symbolic name.
pub fn key_id(key: Key, name: Option<&str>) -> KeyId {
    if let Some(named) = named_key(key) {
        return KeyId::named(named);
    }
    if let Some(s) = name {
        let mut chars = s.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if !c.is_control() {
                return KeyId::Char(c);
            }
        }
    }
    KeyId::named(format!("{:?}", key).to_lowercase())
}

fn named_key(key: Key) -> Option<&'static str> {
    Some(match key {
        Key::Escape => "esc",
        Key::ShiftLeft => "shift",
        Key::ShiftRight => "shift_r",
        Key::ControlLeft => "ctrl_l",
        Key::ControlRight => "ctrl_r",
        Key::Alt => "alt",
        Key::AltGr => "alt_gr",
        Key::MetaLeft => "cmd",
        Key::MetaRight => "cmd_r",
        Key::Space => "space",
        Key::Return | Key::KpReturn => "enter",
        Key::Tab => "tab",
        Key::Backspace => "backspace",
        Key::Delete => "delete",
        Key::CapsLock => "caps_lock",
        Key::UpArrow => "up",
        Key::DownArrow => "down",
        Key::LeftArrow => "left",
        Key::RightArrow => "right",
        Key::Home => "home",
        Key::End => "end",
        Key::PageUp => "page_up",
        Key::PageDown => "page_down",
        Key::Insert => "insert",
        Key::F1 => "f1",
        Key::F2 => "f2",
        Key::F3 => "f3",
        Key::F4 => "f4",
        Key::F5 => "f5",
        Key::F6 => "f6",
        Key::F7 => "f7",
        Key::F8 => "f8",
        Key::F9 => "f9",
        Key::F10 => "f10",
        Key::F11 => "f11",
        Key::F12 => "f12",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn ev(event_type: EventType, name: Option<&str>) -> rdev::Event {
        rdev::Event {
            time: SystemTime::now(),
            name: name.map(str::to_string),
            event_type,
        }
    }

    #[test]
    fn test_key_id_prefers_symbolic_names() {
        assert_eq!(key_id(Key::Escape, Some("\u{1b}")), KeyId::named("esc"));
        assert_eq!(key_id(Key::Space, Some(" ")), KeyId::named("space"));
        assert_eq!(key_id(Key::KeyA, Some("A")), KeyId::Char('A'));
        assert_eq!(key_id(Key::KeyA, None), KeyId::named("keya"));
    }

    #[test]
    fn test_buttons_carry_last_pointer_position() {
        let mut t = Translator::default();
        t.translate(&ev(EventType::MouseMove { x: 10.4, y: 20.6 }, None));
        let input = t.translate(&ev(EventType::ButtonPress(Button::Left), None));
        assert_eq!(
            input,
            Some(RawInput::Button { x: 10, y: 21, button: MouseButton::Left, pressed: true })
        );
        assert_eq!(t.translate(&ev(EventType::ButtonPress(Button::Unknown(8)), None)), None);
    }
}
