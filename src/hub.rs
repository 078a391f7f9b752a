//! # Connection Hub
//!
//! Registers one push channel per session id and delivers typed pipeline
//! events to it. The hub is the only piece of shared mutable state between
//! concurrently running pipelines and the WebSocket layer, so the channel map
//! sits behind an `RwLock` exactly like the session map.
//!
//! ## Delivery contract:
//! Delivery is best-effort. A push to a session without a registered channel
//! is dropped silently (the run still completes and history stays queryable).
//! A push that fails because the receiving side went away logs a warning and
//! evicts the registration; the failure is never raised to the caller.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

/// Outcome of one push attempt. Informational only; callers never treat any
/// of these as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The frame was handed to the session's channel
    Delivered,
    /// No channel is registered for the session
    NoChannel,
    /// The channel was dead; its registration has been evicted
    Evicted,
    /// The event could not be serialized; any registered channel is untouched
    Unserializable,
}

/// One push channel per session id.
///
/// ## Thread Safety:
/// Uses RwLock to allow multiple readers (pushing events) or one writer
/// (connecting/disconnecting channels) at a time. Senders are cloned out of
/// the map before use so the lock is never held across a send.
pub struct ConnectionHub {
    /// Registered channels mapped by session ID. The sender carries
    /// pre-serialized JSON frames so the WebSocket actor only forwards text.
    channels: RwLock<HashMap<String, UnboundedSender<String>>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Register a push channel for a session.
    ///
    /// A duplicate `connect` for the same session id overwrites the prior
    /// registration. A reconnecting client (page refresh, dropped socket) is
    /// the common case, and the stale channel would be evicted on the next
    /// push anyway.
    pub fn connect(&self, session_id: &str, sender: UnboundedSender<String>) {
        let mut channels = self.channels.write().unwrap();
        if channels.insert(session_id.to_string(), sender).is_some() {
            debug!("Replaced existing push channel for session {}", session_id);
        } else {
            debug!("Registered push channel for session {}", session_id);
        }
    }

    /// Remove a session's channel registration. Idempotent.
    pub fn disconnect(&self, session_id: &str) {
        let mut channels = self.channels.write().unwrap();
        if channels.remove(session_id).is_some() {
            debug!("Removed push channel for session {}", session_id);
        }
    }

    /// Remove a session's registration only if `sender` is still the
    /// registered channel.
    ///
    /// A stopping WebSocket actor calls this instead of `disconnect` so that
    /// a reconnect which already overwrote the registration is left alone.
    pub fn disconnect_channel(&self, session_id: &str, sender: &UnboundedSender<String>) {
        let mut channels = self.channels.write().unwrap();
        if let Some(registered) = channels.get(session_id) {
            if registered.same_channel(sender) {
                channels.remove(session_id);
                debug!("Removed push channel for session {}", session_id);
            }
        }
    }

    /// Serialize an event and deliver it to the session's channel.
    ///
    /// If the send fails (the receiver was dropped), the registration is
    /// evicted so later pushes don't keep hitting a dead channel.
    pub fn push<E: Serialize>(&self, session_id: &str, event: &E) -> Delivery {
        let frame = match serde_json::to_string(event) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("Failed to serialize event for session {}: {}", session_id, err);
                return Delivery::Unserializable;
            }
        };

        let sender = {
            let channels = self.channels.read().unwrap();
            match channels.get(session_id) {
                Some(sender) => sender.clone(),
                None => return Delivery::NoChannel,
            }
        };

        if sender.send(frame).is_err() {
            warn!(
                "Push channel for session {} is closed; evicting registration",
                session_id
            );
            self.disconnect(session_id);
            return Delivery::Evicted;
        }

        Delivery::Delivered
    }

    /// Whether a channel is currently registered for the session.
    pub fn connected(&self, session_id: &str) -> bool {
        self.channels.read().unwrap().contains_key(session_id)
    }

    /// Number of currently registered channels (for health reporting).
    pub fn connection_count(&self) -> usize {
        self.channels.read().unwrap().len()
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::events::PipelineEvent;
    use tokio::sync::mpsc;

    #[test]
    fn test_push_without_channel_is_dropped() {
        let hub = ConnectionHub::new();
        let outcome = hub.push("nobody", &PipelineEvent::Complete {});
        assert_eq!(outcome, Delivery::NoChannel);
    }

    #[test]
    fn test_push_delivers_serialized_frame() {
        let hub = ConnectionHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.connect("s1", tx);

        let outcome = hub.push("s1", &PipelineEvent::progress("emotion", 3, 12));
        assert_eq!(outcome, Delivery::Delivered);

        let frame = rx.try_recv().unwrap();
        let json: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(json["type"], "progress_update");
        assert_eq!(json["percentage"], 25);
    }

    #[test]
    fn test_dead_channel_is_evicted_on_push() {
        let hub = ConnectionHub::new();
        let (tx, rx) = mpsc::unbounded_channel();
        hub.connect("s1", tx);
        assert!(hub.connected("s1"));

        drop(rx);

        let outcome = hub.push("s1", &PipelineEvent::Complete {});
        assert_eq!(outcome, Delivery::Evicted);
        assert!(!hub.connected("s1"));

        // Subsequent pushes see no channel, not repeated eviction
        let outcome = hub.push("s1", &PipelineEvent::Complete {});
        assert_eq!(outcome, Delivery::NoChannel);
    }

    #[test]
    fn test_unserializable_event_leaves_channel_registered() {
        struct Opaque;
        impl Serialize for Opaque {
            fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("not representable as JSON"))
            }
        }

        let hub = ConnectionHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.connect("s1", tx);

        assert_eq!(hub.push("s1", &Opaque), Delivery::Unserializable);
        assert!(hub.connected("s1"));
        assert!(rx.try_recv().is_err());

        // A well-formed event still goes through afterwards
        assert_eq!(
            hub.push("s1", &PipelineEvent::Complete {}),
            Delivery::Delivered
        );
    }

    #[test]
    fn test_duplicate_connect_overwrites() {
        let hub = ConnectionHub::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();

        hub.connect("s1", tx1);
        hub.connect("s1", tx2);
        assert_eq!(hub.connection_count(), 1);

        hub.push("s1", &PipelineEvent::Complete {});
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_disconnect_channel_spares_replacement() {
        let hub = ConnectionHub::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        hub.connect("s1", tx1.clone());
        hub.connect("s1", tx2);

        // The superseded connection's cleanup must not evict the new channel
        hub.disconnect_channel("s1", &tx1);
        assert!(hub.connected("s1"));
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let hub = ConnectionHub::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        hub.connect("s1", tx);

        hub.disconnect("s1");
        hub.disconnect("s1");
        assert_eq!(hub.connection_count(), 0);
    }
}
