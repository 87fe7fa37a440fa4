//! Input-injection surface
//!
//! The replay engine only ever talks to [`InputInjector`]. Concrete backends
//! live behind it: [`LogInjector`] for dry runs, and an `enigo` backend when
//! the `native` feature is enabled.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Pointer button identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[serde(alias = "Button.left")]
    Left,
    #[serde(alias = "Button.right")]
    Right,
    #[serde(alias = "Button.middle")]
    Middle,
}

impl MouseButton {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Middle => "middle",
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum InjectError {
    #[error("unknown key: {0}")]
    UnknownKey(String),
    #[error("unsupported button: {0}")]
    UnsupportedButton(MouseButton),
    #[error("injection backend failed: {0}")]
    Backend(String),
}

pub type InjectResult<T> = std::result::Result<T, InjectError>;

/// Abstract capability for synthesizing pointer and keyboard input on the host.
///
/// Key names arrive undecorated: `"a"`, `"shift"`, `"esc"`, `"f9"`.
pub trait InputInjector: Send + Sync {
    /// Move the pointer to `(x, y)`, gliding over `glide`.
    fn move_to(&self, x: i32, y: i32, glide: Duration) -> InjectResult<()>;

    fn mouse_down(&self, x: i32, y: i32, button: MouseButton) -> InjectResult<()>;

    fn mouse_up(&self, x: i32, y: i32, button: MouseButton) -> InjectResult<()>;

    /// Scroll vertically by `amount` injection units at `(x, y)`. Positive is up.
    fn scroll(&self, x: i32, y: i32, amount: i32) -> InjectResult<()>;

    fn key_down(&self, key: &str) -> InjectResult<()>;

    fn key_up(&self, key: &str) -> InjectResult<()>;
}

/// Dry-run injector: logs every call and never touches the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogInjector;

impl InputInjector for LogInjector {
    fn move_to(&self, x: i32, y: i32, glide: Duration) -> InjectResult<()> {
        tracing::info!(x, y, glide_ms = glide.as_millis() as u64, "move_to");
        Ok(())
    }

    fn mouse_down(&self, x: i32, y: i32, button: MouseButton) -> InjectResult<()> {
        tracing::info!(x, y, %button, "mouse_down");
        Ok(())
    }

    fn mouse_up(&self, x: i32, y: i32, button: MouseButton) -> InjectResult<()> {
        tracing::info!(x, y, %button, "mouse_up");
        Ok(())
    }

    fn scroll(&self, x: i32, y: i32, amount: i32) -> InjectResult<()> {
        tracing::info!(x, y, amount, "scroll");
        Ok(())
    }

    fn key_down(&self, key: &str) -> InjectResult<()> {
        tracing::info!(key, "key_down");
        Ok(())
    }

    fn key_up(&self, key: &str) -> InjectResult<()> {
        tracing::info!(key, "key_up");
        Ok(())
    }
}
