use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures::stream::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::models::error::CaptureError;
use crate::models::metadata::SessionId;

/// What a session's pump fans out to subscribers.
#[derive(Debug, Clone)]
pub(crate) enum StreamEvent {
    Chunk(Bytes),
    Failed(CaptureError),
}

/// Subscriber registry of one session. `None` once the session stopped.
///
/// Each subscriber owns an unbounded queue, so a slow reader never loses
/// chunks; it only holds them in memory until it catches up.
#[derive(Clone)]
pub(crate) struct Fanout {
    subscribers: Arc<Mutex<Option<Vec<mpsc::UnboundedSender<StreamEvent>>>>>,
}

impl Fanout {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Some(Vec::new()))),
        }
    }

    /// A new subscriber that sees every event published from now on.
    ///
    /// Subscribing after `close` yields a stream that is already finished.
    pub(crate) fn subscribe(&self, session: SessionId) -> ByteStream {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(subscribers) = self.subscribers.lock().as_mut() {
            subscribers.push(tx);
        }
        ByteStream {
            session,
            fanout: self.clone(),
            rx,
            finished: false,
        }
    }

    /// Queue `event` for every live subscriber and forget dropped ones.
    pub(crate) fn publish(&self, event: StreamEvent) {
        if let Some(subscribers) = self.subscribers.lock().as_mut() {
            subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    /// Stop accepting events. Subscribers end after draining their queue.
    pub(crate) fn close(&self) {
        self.subscribers.lock().take();
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.lock().as_ref().map_or(0, Vec::len)
    }
}

/// Live audio bytes of one capture session.
///
/// Yields every chunk in backend order, starting from the moment of
/// subscription. A backend failure is yielded once as `Err` and ends the
/// stream.
///
/// Cloning subscribes again from the current position of the live stream.
pub struct ByteStream {
    session: SessionId,
    fanout: Fanout,
    rx: mpsc::UnboundedReceiver<StreamEvent>,
    finished: bool,
}

impl ByteStream {
    /// Session this stream belongs to.
    pub fn session_id(&self) -> SessionId {
        self.session
    }

    /// Whether both streams read from the same backend session.
    pub fn same_session(&self, other: &ByteStream) -> bool {
        self.session == other.session
    }
}

impl Clone for ByteStream {
    fn clone(&self) -> Self {
        self.fanout.subscribe(self.session)
    }
}

impl Stream for ByteStream {
    type Item = Result<Bytes, CaptureError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match ready!(self.rx.poll_recv(cx)) {
            Some(StreamEvent::Chunk(chunk)) => Poll::Ready(Some(Ok(chunk))),
            Some(StreamEvent::Failed(error)) => {
                self.finished = true;
                Poll::Ready(Some(Err(error)))
            }
            None => {
                self.finished = true;
                Poll::Ready(None)
            }
        }
    }
}

impl fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteStream")
            .field("session", &self.session)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    fn chunk(byte: u8) -> StreamEvent {
        StreamEvent::Chunk(Bytes::from(vec![byte; 4]))
    }

    #[tokio::test]
    async fn yields_chunks_in_order_then_ends() {
        let fanout = Fanout::new();
        let stream = fanout.subscribe(SessionId::new());

        fanout.publish(chunk(1));
        fanout.publish(chunk(2));
        fanout.close();

        let items: Vec<_> = stream.collect().await;
        assert_eq!(
            items,
            vec![Ok(Bytes::from(vec![1; 4])), Ok(Bytes::from(vec![2; 4]))]
        );
    }

    #[tokio::test]
    async fn failure_is_yielded_once_and_ends_stream() {
        let fanout = Fanout::new();
        let stream = fanout.subscribe(SessionId::new());

        fanout.publish(chunk(1));
        fanout.publish(StreamEvent::Failed(CaptureError::backend("device unplugged")));
        fanout.publish(chunk(2));

        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[1],
            Err(CaptureError::BackendUnavailable("device unplugged".into()))
        );
    }

    #[tokio::test]
    async fn slow_subscriber_receives_every_chunk_from_the_first() {
        let fanout = Fanout::new();
        let stream = fanout.subscribe(SessionId::new());

        for byte in 0..100u8 {
            fanout.publish(chunk(byte));
        }
        fanout.close();

        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 100);
        assert_eq!(items[0], Ok(Bytes::from(vec![0; 4])));
        assert_eq!(items[99], Ok(Bytes::from(vec![99; 4])));
    }

    #[tokio::test]
    async fn clone_shares_session_and_sees_later_chunks() {
        let fanout = Fanout::new();
        let mut first = fanout.subscribe(SessionId::new());

        fanout.publish(chunk(1));
        let mut second = first.clone();
        fanout.publish(chunk(2));
        fanout.close();

        assert!(first.same_session(&second));
        assert_eq!(first.next().await, Some(Ok(Bytes::from(vec![1; 4]))));
        assert_eq!(second.next().await, Some(Ok(Bytes::from(vec![2; 4]))));
        assert_eq!(second.next().await, None);
    }

    #[tokio::test]
    async fn dropped_subscribers_are_forgotten() {
        let fanout = Fanout::new();
        let kept = fanout.subscribe(SessionId::new());
        drop(kept.clone());

        fanout.publish(chunk(1));
        assert_eq!(fanout.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn subscribing_after_close_ends_at_once() {
        let fanout = Fanout::new();
        fanout.close();

        let mut late = fanout.subscribe(SessionId::new());
        assert_eq!(late.next().await, None);
    }
}
