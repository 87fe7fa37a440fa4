//! Host input injection via `enigo`

use crate::input::{InjectError, InjectResult, InputInjector, MouseButton};
use enigo::{Axis, Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
use parking_lot::Mutex;
use std::thread;
use std::time::Duration;

// One interpolation step per 10ms of glide
const GLIDE_STEP: Duration = Duration::from_millis(10);

pub struct EnigoInjector {
    enigo: Mutex<Enigo>,
}

impl EnigoInjector {
    pub fn new() -> InjectResult<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| InjectError::Backend(e.to_string()))?;
        Ok(Self {
            enigo: Mutex::new(enigo),
        })
    }

    fn warp(enigo: &mut Enigo, x: i32, y: i32) -> InjectResult<()> {
        enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| InjectError::Backend(e.to_string()))
    }

    fn button(&self, x: i32, y: i32, button: MouseButton, dir: Direction) -> InjectResult<()> {
        let mut enigo = self.enigo.lock();
        Self::warp(&mut enigo, x, y)?;
        enigo
            .button(to_enigo_button(button), dir)
            .map_err(|e| InjectError::Backend(e.to_string()))
    }

    fn key(&self, name: &str, dir: Direction) -> InjectResult<()> {
        let key = key_from_name(name).ok_or_else(|| InjectError::UnknownKey(name.to_string()))?;
        self.enigo
            .lock()
            .key(key, dir)
            .map_err(|e| InjectError::Backend(e.to_string()))
    }
}

impl InputInjector for EnigoInjector {
    fn move_to(&self, x: i32, y: i32, glide: Duration) -> InjectResult<()> {
        let mut enigo = self.enigo.lock();
        let steps = (glide.as_millis() / GLIDE_STEP.as_millis()).max(1) as i32;
        let (x0, y0) = enigo
            .location()
            .map_err(|e| InjectError::Backend(e.to_string()))?;

        for i in 1..=steps {
            let xi = x0 + (x - x0) * i / steps;
            let yi = y0 + (y - y0) * i / steps;
            Self::warp(&mut enigo, xi, yi)?;
            if i < steps {
                thread::sleep(glide / steps as u32);
            }
        }
        Ok(())
    }

    fn mouse_down(&self, x: i32, y: i32, button: MouseButton) -> InjectResult<()> {
        self.button(x, y, button, Direction::Press)
    }

    fn mouse_up(&self, x: i32, y: i32, button: MouseButton) -> InjectResult<()> {
        self.button(x, y, button, Direction::Release)
    }

    fn scroll(&self, x: i32, y: i32, amount: i32) -> InjectResult<()> {
        let mut enigo = self.enigo.lock();
        Self::warp(&mut enigo, x, y)?;
        // enigo scrolls down for positive lengths
        enigo
            .scroll(-amount, Axis::Vertical)
            .map_err(|e| InjectError::Backend(e.to_string()))
    }

    fn key_down(&self, key: &str) -> InjectResult<()> {
        self.key(key, Direction::Press)
    }

    fn key_up(&self, key: &str) -> InjectResult<()> {
        self.key(key, Direction::Release)
    }
}

fn to_enigo_button(button: MouseButton) -> Button {
    match button {
        MouseButton::Left => Button::Left,
        MouseButton::Right => Button::Right,
        MouseButton::Middle => Button::Middle,
    }
}

/// Map an undecorated key name to an enigo key.
pub fn key_from_name(name: &str) -> Option<Key> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Some(Key::Unicode(c));
    }

    Some(match name.to_lowercase().as_str() {
        "shift" | "shift_l" | "shift_r" => Key::Shift,
        "ctrl" | "ctrl_l" | "ctrl_r" | "control" => Key::Control,
        "alt" | "alt_l" | "alt_r" | "alt_gr" | "option" => Key::Alt,
        "cmd" | "cmd_l" | "cmd_r" | "super" | "meta" | "win" => Key::Meta,
        "esc" | "escape" => Key::Escape,
        "enter" | "return" => Key::Return,
        "tab" => Key::Tab,
        "space" => Key::Space,
        "backspace" => Key::Backspace,
        "delete" => Key::Delete,
        "caps_lock" | "capslock" => Key::CapsLock,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "home" => Key::Home,
        "end" => Key::End,
        "page_up" | "pageup" => Key::PageUp,
        "page_down" | "pagedown" => Key::PageDown,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        _ => return None,
    })
}
