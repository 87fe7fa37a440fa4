//! Raw input notifications and their fan-out
//!
//! Input arrives on two independent channels, pointer and keyboard. An
//! [`InputSource`] hands out one crossbeam receiver per subscription; a
//! subscription ends when its receiver is dropped.

use crate::events::KeyId;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use macro_core::{MouseButton, Result};
use parking_lot::Mutex;

/// Raw notification from the host, before timestamping
#[derive(Debug, Clone, PartialEq)]
pub enum RawInput {
    Move { x: i32, y: i32 },
    Button { x: i32, y: i32, button: MouseButton, pressed: bool },
    Scroll { x: i32, y: i32, dx: f64, dy: f64 },
    Key { key: KeyId, pressed: bool },
}

impl RawInput {
    pub fn channel(&self) -> InputChannel {
        match self {
            Self::Key { .. } => InputChannel::Keyboard,
            _ => InputChannel::Pointer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputChannel {
    Pointer,
    Keyboard,
}

/// Anything that can deliver raw input notifications
pub trait InputSource: Send + Sync {
    /// Open a subscription on `channel` buffering at most `capacity` notifications.
    fn subscribe(&self, channel: InputChannel, capacity: usize) -> Result<Receiver<RawInput>>;
}

/// In-process fan-out of raw input to every live subscriber.
///
/// The native listener publishes into a process-wide hub; tests publish
/// scripted input into a local one.
#[derive(Default)]
pub struct InputHub {
    pointer: Mutex<Vec<Sender<RawInput>>>,
    keyboard: Mutex<Vec<Sender<RawInput>>>,
}

impl InputHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn subscribers(&self, channel: InputChannel) -> &Mutex<Vec<Sender<RawInput>>> {
        match channel {
            InputChannel::Pointer => &self.pointer,
            InputChannel::Keyboard => &self.keyboard,
        }
    }

    /// Deliver to every subscriber of the notification's channel. Never blocks:
    /// full subscribers drop the notification, closed ones are pruned.
    pub fn publish(&self, input: RawInput) {
        let mut subs = self.subscribers(input.channel()).lock();
        subs.retain(|tx| match tx.try_send(input.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!("input subscriber lagging, notification dropped");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    pub fn subscriber_count(&self, channel: InputChannel) -> usize {
        self.subscribers(channel).lock().len()
    }
}

impl InputSource for InputHub {
    fn subscribe(&self, channel: InputChannel, capacity: usize) -> Result<Receiver<RawInput>> {
        let (tx, rx) = bounded(capacity.max(1));
        self.subscribers(channel).lock().push(tx);
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_by_channel() {
        let hub = InputHub::new();
        let ptr = hub.subscribe(InputChannel::Pointer, 8).unwrap();
        let kbd = hub.subscribe(InputChannel::Keyboard, 8).unwrap();

        hub.publish(RawInput::Move { x: 1, y: 2 });
        hub.publish(RawInput::Key { key: KeyId::Char('a'), pressed: true });

        assert_eq!(ptr.try_recv().unwrap(), RawInput::Move { x: 1, y: 2 });
        assert!(ptr.try_recv().is_err());
        assert_eq!(
            kbd.try_recv().unwrap(),
            RawInput::Key { key: KeyId::Char('a'), pressed: true }
        );
    }

    #[test]
    fn test_prunes_dropped_subscribers() {
        let hub = InputHub::new();
        let rx = hub.subscribe(InputChannel::Pointer, 8).unwrap();
        assert_eq!(hub.subscriber_count(InputChannel::Pointer), 1);
        drop(rx);
        hub.publish(RawInput::Move { x: 0, y: 0 });
        assert_eq!(hub.subscriber_count(InputChannel::Pointer), 0);
    }

    #[test]
    fn test_full_subscriber_does_not_block() {
        let hub = InputHub::new();
        let rx = hub.subscribe(InputChannel::Pointer, 1).unwrap();
        hub.publish(RawInput::Move { x: 1, y: 1 });
        hub.publish(RawInput::Move { x: 2, y: 2 });
        assert_eq!(rx.try_recv().unwrap(), RawInput::Move { x: 1, y: 1 });
        assert!(rx.try_recv().is_err());
        assert_eq!(hub.subscriber_count(InputChannel::Pointer), 1);
    }
}
