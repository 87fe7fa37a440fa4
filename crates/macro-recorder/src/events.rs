//! Event model: one captured action plus the delay that preceded it
//!
//! Events serialize to `{"action": "...", "details": {...}, "delay": 0.25}`,
//! which is the on-disk format of a saved macro.

use macro_core::MouseButton;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::time::Duration;

/// Single recorded event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Action kind and payload
    #[serde(flatten)]
    pub action: Action,
    /// Seconds elapsed since the previous event (or since recording start)
    #[serde(deserialize_with = "non_negative_seconds")]
    pub delay: f64,
}

impl Event {
    /// Build an event from an action and the time elapsed before it.
    pub fn new(action: Action, elapsed: Duration) -> Self {
        Self {
            action,
            delay: elapsed.as_secs_f64(),
        }
    }

    /// The delay as a `Duration`, saturating at `Duration::MAX`.
    pub fn delay(&self) -> Duration {
        if self.delay > 0.0 {
            Duration::try_from_secs_f64(self.delay).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        }
    }
}

fn non_negative_seconds<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let secs = f64::deserialize(d)?;
    if secs.is_finite() && secs >= 0.0 {
        Ok(secs)
    } else {
        Err(serde::de::Error::custom(format!(
            "delay must be a non-negative number of seconds, got {}",
            secs
        )))
    }
}

/// Pointer coordinate. Some capture backends report fractional pixels;
/// those are rounded to the nearest whole pixel.
fn coordinate<'de, D: Deserializer<'de>>(d: D) -> Result<i32, D::Error> {
    let v = f64::deserialize(d)?.round();
    if v.is_finite() && v >= f64::from(i32::MIN) && v <= f64::from(i32::MAX) {
        Ok(v as i32)
    } else {
        Err(serde::de::Error::custom(format!(
            "coordinate out of range: {}",
            v
        )))
    }
}

/// Action kind and payload - closed tagged union
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "details", rename_all = "snake_case")]
pub enum Action {
    MouseMove {
        #[serde(deserialize_with = "coordinate")]
        x: i32,
        #[serde(deserialize_with = "coordinate")]
        y: i32,
    },
    MousePress {
        #[serde(deserialize_with = "coordinate")]
        x: i32,
        #[serde(deserialize_with = "coordinate")]
        y: i32,
        button: MouseButton,
    },
    MouseRelease {
        #[serde(deserialize_with = "coordinate")]
        x: i32,
        #[serde(deserialize_with = "coordinate")]
        y: i32,
        button: MouseButton,
    },
    /// `dx`/`dy` are normalized wheel deltas, one notch is 1.0
    MouseScroll {
        #[serde(deserialize_with = "coordinate")]
        x: i32,
        #[serde(deserialize_with = "coordinate")]
        y: i32,
        dx: f64,
        dy: f64,
    },
    KeyPress { key: KeyId },
    KeyRelease { key: KeyId },
}

impl Action {
    /// Discriminator as written to disk
    pub fn name(&self) -> &'static str {
        match self {
            Self::MouseMove { .. } => "mouse_move",
            Self::MousePress { .. } => "mouse_press",
            Self::MouseRelease { .. } => "mouse_release",
            Self::MouseScroll { .. } => "mouse_scroll",
            Self::KeyPress { .. } => "key_press",
            Self::KeyRelease { .. } => "key_release",
        }
    }

    pub fn is_pointer(&self) -> bool {
        !matches!(self, Self::KeyPress { .. } | Self::KeyRelease { .. })
    }
}

/// Key identifier: a printable character, or a named symbolic key.
///
/// Named keys are written with a `Key.` prefix (`Key.esc`, `Key.shift`) so
/// they never collide with a character. A `null` key (no character and no
/// name at capture time) loads as [`KeyId::unknown`], which no injector
/// accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Option<String>", into = "String")]
pub enum KeyId {
    Char(char),
    Named(String),
}

const NAMED_PREFIX: &str = "Key.";
const UNKNOWN_KEY: &str = "unknown";

impl KeyId {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn unknown() -> Self {
        Self::named(UNKNOWN_KEY)
    }

    /// Undecorated name handed to the injector: `Key.shift` becomes `shift`.
    pub fn injector_name(&self) -> String {
        match self {
            Self::Char(c) => c.to_string(),
            Self::Named(n) => n.clone(),
        }
    }

    pub fn parse(s: &str) -> Result<Self, String> {
        if let Some(name) = s.strip_prefix(NAMED_PREFIX) {
            if name.is_empty() {
                return Err("empty key name".to_string());
            }
            return Ok(Self::Named(name.to_string()));
        }

        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (None, _) => Err("empty key identifier".to_string()),
            (Some(c), None) => Ok(Self::Char(c)),
            _ => Ok(Self::Named(s.to_string())),
        }
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char(c) => write!(f, "{}", c),
            Self::Named(n) => write!(f, "{}{}", NAMED_PREFIX, n),
        }
    }
}

impl TryFrom<String> for KeyId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl TryFrom<Option<String>> for KeyId {
    type Error = String;

    fn try_from(s: Option<String>) -> Result<Self, Self::Error> {
        match s {
            Some(s) => Self::parse(&s),
            None => Ok(Self::unknown()),
        }
    }
}

impl From<KeyId> for String {
    fn from(k: KeyId) -> Self {
        k.to_string()
    }
}

/// Ordered event sequence. Insertion order is replay order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    /// Sum of all delays, i.e. the duration of one paced repetition
    pub fn duration(&self) -> Duration {
        self.events
            .iter()
            .map(Event::delay)
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    pub fn counts(&self) -> ActionCounts {
        let mut counts = ActionCounts::default();
        for e in &self.events {
            match e.action {
                Action::MouseMove { .. } => counts.moves += 1,
                Action::MousePress { .. } | Action::MouseRelease { .. } => counts.buttons += 1,
                Action::MouseScroll { .. } => counts.scrolls += 1,
                Action::KeyPress { .. } | Action::KeyRelease { .. } => counts.keys += 1,
            }
        }
        counts
    }
}

impl From<Vec<Event>> for EventLog {
    fn from(events: Vec<Event>) -> Self {
        Self { events }
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ActionCounts {
    pub moves: usize,
    pub buttons: usize,
    pub scrolls: usize,
    pub keys: usize,
}
