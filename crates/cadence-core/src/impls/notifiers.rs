//! Notifier implementations.
//!
//! - `TracingNotifier`: logs each notification as JSON at debug level.
//! - `ChannelNotifier`: pushes into an unbounded mpsc channel that a transport
//!   layer drains. A dropped receiver is ignored.

use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::Notification;
use crate::ports::Notifier;

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn dispatch(&self, notification: Notification) {
        match serde_json::to_string(&notification) {
            Ok(payload) => debug!(target_actor = %notification.target(), %payload, "notify"),
            Err(e) => debug!(error = %e, "notify_encode_failed"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn dispatch(&self, notification: Notification) {
        // ignore send error: nobody is listening anymore
        let _ = self.tx.send(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ActorRef;

    #[tokio::test]
    async fn channel_notifier_delivers_in_order() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier.dispatch(Notification::EffectValue {
            target: ActorRef::npc("a"),
            value: 1,
        });
        notifier.dispatch(Notification::EffectValue {
            target: ActorRef::npc("a"),
            value: 2,
        });

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(matches!(first, Notification::EffectValue { value: 1, .. }));
        assert!(matches!(second, Notification::EffectValue { value: 2, .. }));
    }

    #[test]
    fn dropped_receiver_does_not_panic() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);
        notifier.dispatch(Notification::Animation {
            target: ActorRef::character("c"),
            animation_key: "poison".into(),
        });
    }
}
