//! macro-recorder - Input-event recording and timed replay
//!
//! Captures pointer and keyboard input with the delay before each event,
//! saves and loads it as JSON, and replays it with the recorded cadence.
//!
//! ## Flow
//!
//! raw input -> [`Recorder`] -> [`EventLog`] -> [`save_macro`] / [`Replayer`]
//! -> [`InputInjector`](macro_core::InputInjector)
//!
//! [`MacroSession`] sits on top and keeps recording and replaying mutually
//! exclusive.
//!
//! ## Platform Support
//!
//! Host capture (`rdev`) and injection (`enigo`) are behind the `native`
//! feature. Without it, feed the recorder from an [`InputHub`] and replay
//! into any injector.

pub mod capture;
pub mod events;
pub mod hotkey;
pub mod platform;
pub mod recorder;
pub mod replay;
pub mod session;
pub mod status;
pub mod storage;

pub use capture::{InputChannel, InputHub, InputSource, RawInput};
pub use events::*;
pub use hotkey::HotkeyTrigger;
pub use recorder::{CompleteFn, Recorder, RecorderConfig, RecordingState};
pub use replay::{DoneFn, ReplayConfig, ReplayState, ReplayStats, Replayer};
pub use session::{Controls, MacroSession, RecordedFn};
pub use status::{status_channel, StatusFn};
pub use storage::{load_macro, save_macro, MacroLibrary};

#[cfg(feature = "native")]
pub use platform::native::global_hub;

pub mod prelude {
    pub use crate::capture::{InputChannel, InputHub, InputSource, RawInput};
    pub use crate::events::*;
    pub use crate::hotkey::HotkeyTrigger;
    pub use crate::recorder::{Recorder, RecorderConfig};
    pub use crate::replay::{ReplayConfig, ReplayStats, Replayer};
    pub use crate::session::{Controls, MacroSession, RecordedFn};
    pub use crate::status::{status_channel, StatusFn};
    pub use crate::storage::{load_macro, save_macro, MacroLibrary};
    pub use macro_core::prelude::*;

    #[cfg(feature = "native")]
    pub use crate::platform::native::global_hub;
}
