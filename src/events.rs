//! Token lifecycle notifications.
//!
//! The guard emits one event per successful issue, refresh and revocation, synchronously
//! and in call order. What happens to an event is up to the [`EventSink`].

use tokio::sync::mpsc::UnboundedSender;
use tracing::{Level, debug, event};

use crate::token::Payload;

#[derive(Clone, Debug, PartialEq)]
pub enum LifecycleEvent {
    Issued {
        payload: Payload,
        token: String,
        expires_in: u64,
        refresh_ttl: u64,
    },
    Refreshed {
        old_payload: Payload,
        new_payload: Payload,
        old_token: String,
        new_token: String,
    },
    Revoked {
        payload: Payload,
        jti: String,
        reason: String,
    },
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Issued { .. } => "token.issued",
            LifecycleEvent::Refreshed { .. } => "token.refreshed",
            LifecycleEvent::Revoked { .. } => "token.revoked",
        }
    }

    /// jti of the token the event is about (the new one for refreshes).
    pub fn jti(&self) -> &str {
        match self {
            LifecycleEvent::Issued { payload, .. } => &payload.jti,
            LifecycleEvent::Refreshed { new_payload, .. } => &new_payload.jti,
            LifecycleEvent::Revoked { jti, .. } => jti,
        }
    }
}

/// Receives lifecycle events. Must not block; delivery is fire-and-forget.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &LifecycleEvent);
}

impl<F> EventSink for F
where
    F: Fn(&LifecycleEvent) + Send + Sync,
{
    fn emit(&self, event: &LifecycleEvent) {
        self(event)
    }
}

/// Drops every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: &LifecycleEvent) {}
}

/// Writes each event as a structured `tracing` record. Token strings are never logged.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, lifecycle: &LifecycleEvent) {
        match lifecycle {
            LifecycleEvent::Issued {
                payload,
                expires_in,
                refresh_ttl,
                ..
            } => {
                event!(
                    Level::INFO,
                    jti = %payload.jti,
                    user = %payload.user_identifier(),
                    expires_in,
                    refresh_ttl,
                    "token.issued"
                );
            }
            LifecycleEvent::Refreshed {
                old_payload,
                new_payload,
                ..
            } => {
                event!(
                    Level::INFO,
                    old_jti = %old_payload.jti,
                    new_jti = %new_payload.jti,
                    user = %new_payload.user_identifier(),
                    "token.refreshed"
                );
            }
            LifecycleEvent::Revoked {
                payload,
                jti,
                reason,
            } => {
                event!(
                    Level::INFO,
                    jti = %jti,
                    user = %payload.user_identifier(),
                    reason = %reason,
                    "token.revoked"
                );
            }
        }
    }
}

/// Forwards events into an unbounded channel.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    tx: UnboundedSender<LifecycleEvent>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<LifecycleEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &LifecycleEvent) {
        if self.tx.send(event.clone()).is_err() {
            debug!(event = event.name(), "events.receiver_dropped");
        }
    }
}
