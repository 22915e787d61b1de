//! The producer boundary.
//!
//! Chain-sync networking and block decoding live upstream; the core only
//! sees an ordered stream of typed messages. Order is the contract: points
//! arrive monotonically except for explicit rollback commands.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::{Stream, StreamExt};

use marketindex_core::{ChainPoint, IndexError, MarketEvent};

/// One message from the producer.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainMessage {
    /// A new block at `point` with its decoded marketplace events.
    Apply {
        point: ChainPoint,
        events: Vec<MarketEvent>,
    },
    /// The chain reorganized; everything past `point` is retracted.
    Rollback { point: ChainPoint },
}

/// Delivers ordered chain messages. `None` ends the stream.
#[async_trait]
pub trait Producer: Send {
    async fn next_message(&mut self) -> Result<Option<ChainMessage>, IndexError>;
}

/// Replays a fixed message sequence. Tests and replay tooling.
#[derive(Debug, Default)]
pub struct ScriptProducer {
    messages: VecDeque<ChainMessage>,
}

impl ScriptProducer {
    pub fn new(messages: impl IntoIterator<Item = ChainMessage>) -> Self {
        Self {
            messages: messages.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Producer for ScriptProducer {
    async fn next_message(&mut self) -> Result<Option<ChainMessage>, IndexError> {
        Ok(self.messages.pop_front())
    }
}

/// Adapts any ordered message stream — typically the receiving end of a
/// bounded channel fed by the chain-sync task — into a producer.
#[derive(Debug)]
pub struct StreamProducer<S> {
    inner: S,
}

impl<S> StreamProducer<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S> Producer for StreamProducer<S>
where
    S: Stream<Item = ChainMessage> + Unpin + Send,
{
    async fn next_message(&mut self) -> Result<Option<ChainMessage>, IndexError> {
        Ok(self.inner.next().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn script_producer_replays_in_order() {
        let a = ChainPoint::new(1, "a".repeat(64));
        let b = ChainPoint::new(2, "b".repeat(64));
        let mut producer = ScriptProducer::new([
            ChainMessage::Apply {
                point: a.clone(),
                events: vec![],
            },
            ChainMessage::Rollback { point: b.clone() },
        ]);

        assert!(matches!(
            producer.next_message().await.unwrap(),
            Some(ChainMessage::Apply { point, .. }) if point == a
        ));
        assert!(matches!(
            producer.next_message().await.unwrap(),
            Some(ChainMessage::Rollback { point }) if point == b
        ));
        assert!(producer.next_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stream_producer_drains_a_channel() {
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        let point = ChainPoint::new(7, "c".repeat(64));
        tx.send(ChainMessage::Rollback {
            point: point.clone(),
        })
        .await
        .unwrap();
        drop(tx);

        let mut producer =
            StreamProducer::new(tokio_stream_adapter(rx));
        assert!(matches!(
            producer.next_message().await.unwrap(),
            Some(ChainMessage::Rollback { point: p }) if p == point
        ));
        assert!(producer.next_message().await.unwrap().is_none());
    }

    /// Minimal receiver→stream shim so the test avoids an extra dependency.
    fn tokio_stream_adapter(
        mut rx: tokio::sync::mpsc::Receiver<ChainMessage>,
    ) -> impl Stream<Item = ChainMessage> + Unpin {
        Box::pin(futures::stream::poll_fn(move |cx| rx.poll_recv(cx)))
    }
}
