//! Status callbacks
//!
//! Background threads report progress through a [`StatusFn`]. A UI that owns
//! its own event loop should not mutate widgets from those threads; it can
//! use [`status_channel`] and drain the receiver on its own loop instead.

use crossbeam_channel::{unbounded, Receiver};
use std::sync::Arc;

pub type StatusFn = Arc<dyn Fn(&str) + Send + Sync>;

/// A status callback that forwards every message into a channel.
pub fn status_channel() -> (StatusFn, Receiver<String>) {
    let (tx, rx) = unbounded();
    let f: StatusFn = Arc::new(move |msg: &str| {
        let _ = tx.send(msg.to_string());
    });
    (f, rx)
}

/// A status callback that drops everything.
pub fn silent() -> StatusFn {
    Arc::new(|_: &str| {})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_channel_forwards_in_order() {
        let (f, rx) = status_channel();
        f("one");
        f("two");
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec!["one", "two"]);
    }

    #[test]
    fn test_status_channel_survives_dropped_receiver() {
        let (f, rx) = status_channel();
        drop(rx);
        f("nobody listening");
    }
}
