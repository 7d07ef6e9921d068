//! Session event delivery.
//!
//! The real-time transport (websocket, SSE, ...) lives outside this crate.
//! It either implements [`EventSink`] itself or subscribes to a
//! [`BroadcastSink`].

use crate::types::{Event, SessionEvent, SessionId};
use tokio::sync::broadcast;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

/// Default broadcast buffer size
pub const DEFAULT_EVENT_CAPACITY: usize = 1000;

/// Receiver of session-addressed events
///
/// `emit` must not block: it is called from upload tasks between chunks.
pub trait EventSink: Send + Sync {
    /// Deliver `event` to `session`
    fn emit(&self, session: &SessionId, event: Event);
}

/// Event sink backed by a tokio broadcast channel
///
/// Events are dropped silently when nobody is subscribed.
#[derive(Clone, Debug)]
pub struct BroadcastSink {
    tx: broadcast::Sender<SessionEvent>,
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl BroadcastSink {
    /// Create a sink buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to every session's events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Stream of the events addressed to one session
    ///
    /// A slow consumer that lags behind loses the overflowed events; the
    /// loss is logged and the stream continues.
    pub fn session_stream(&self, session: SessionId) -> impl Stream<Item = Event> + Send + 'static {
        BroadcastStream::new(self.tx.subscribe()).filter_map(move |item| match item {
            Ok(SessionEvent { session: target, event }) if target == session => Some(event),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(session = %session, skipped, "session event stream lagged");
                None
            }
        })
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, session: &SessionId, event: Event) {
        tracing::trace!(session = %session, event = event.name(), "emitting session event");
        let _ = self.tx.send(SessionEvent {
            session: session.clone(),
            event,
        });
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_receives_addressed_events() {
        let sink = BroadcastSink::default();
        let mut rx = sink.subscribe();

        sink.emit(&SessionId::from("a"), Event::Progress { progress: 10 });

        let received = rx.recv().await.unwrap();
        assert_eq!(received.session, SessionId::from("a"));
        assert_eq!(received.event, Event::Progress { progress: 10 });
    }

    #[tokio::test]
    async fn test_session_stream_filters_other_sessions() {
        let sink = BroadcastSink::new(16);
        let stream = sink.session_stream(SessionId::from("mine"));
        tokio::pin!(stream);

        sink.emit(&SessionId::from("other"), Event::loader("not for me"));
        sink.emit(&SessionId::from("mine"), Event::loader("hello"));

        let event = stream.next().await.unwrap();
        assert_eq!(event, Event::loader("hello"));
    }

    #[test]
    fn test_emit_without_subscribers_is_harmless() {
        let sink = BroadcastSink::new(0);
        sink.emit(&SessionId::from("nobody"), Event::loader("dropped"));
    }
}
