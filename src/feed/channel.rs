#![allow(dead_code)]

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::protocol::{ControlMessage, FeedUpdate};
use super::transport::{FeedTransport, TransportEvent};
use crate::metrics::prometheus::record_feed_message;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Topic-multiplexed live feed.
///
/// Subscribes to its topics each time the transport reports a fresh
/// connection and writes decoded updates into their state slot in receipt
/// order. Frames for other topics are dropped.
pub struct FeedChannel<T> {
    transport: T,
    topics: Vec<String>,
    state: AppState,
    connection: watch::Sender<ConnectionState>,
}

impl<T: FeedTransport> FeedChannel<T> {
    pub fn new(transport: T, topics: Vec<String>, state: AppState) -> Self {
        Self {
            transport,
            topics,
            state,
            connection: watch::channel(ConnectionState::Disconnected).0,
        }
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    pub async fn run(mut self, cancel: CancellationToken) -> anyhow::Result<()> {
        info!(topics = ?self.topics, "feed channel started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = self.transport.next_event() => match event {
                    Some(event) => self.handle_event(event).await?,
                    None => break,
                },
            }
        }

        self.connection.send_replace(ConnectionState::Disconnected);
        info!("feed channel stopped");
        Ok(())
    }

    async fn handle_event(&mut self, event: TransportEvent) -> anyhow::Result<()> {
        match event {
            TransportEvent::Connecting => {
                self.connection.send_replace(ConnectionState::Connecting);
            }
            TransportEvent::Connected(connection) => {
                debug!(connection, "transport connected");
                self.connection.send_replace(ConnectionState::Connected);
                self.subscribe().await?;
            }
            TransportEvent::Reconnecting => {
                self.connection.send_replace(ConnectionState::Reconnecting);
            }
            TransportEvent::Disconnected => {
                self.connection.send_replace(ConnectionState::Disconnected);
            }
            TransportEvent::Message(text) => self.apply(&text),
        }
        Ok(())
    }

    async fn subscribe(&mut self) -> anyhow::Result<()> {
        let frame = serde_json::to_string(&ControlMessage::Subscribe {
            topics: self.topics.clone(),
        })?;
        match self.transport.send(frame).await {
            Ok(()) => info!(topics = ?self.topics, "subscribed"),
            // the transport reports the lost connection on its own
            Err(err) => warn!(error = %err, "subscribe not sent"),
        }
        Ok(())
    }

    fn apply(&self, text: &str) {
        match FeedUpdate::decode(text) {
            Ok(update) => {
                record_feed_message(update.kind());
                match update {
                    FeedUpdate::GasPrices(prices) => {
                        debug!(?prices, "gas prices received");
                        self.state.publish_gas_prices(prices);
                    }
                    FeedUpdate::Unknown { topic } => trace!(%topic, "ignoring frame"),
                    FeedUpdate::Untagged => trace!("ignoring untagged frame"),
                }
            }
            Err(err) => {
                record_feed_message("malformed");
                warn!(error = %err, "dropping feed frame");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::protocol::GAS_PRICE_TOPIC;
    use crate::feed::transport::WsTransport;
    use crate::market_data::types::GasPrices;
    use async_trait::async_trait;
    use futures::{SinkExt, StreamExt};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;
    use url::Url;

    struct ScriptedTransport {
        events: VecDeque<TransportEvent>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedTransport {
        fn new(events: impl IntoIterator<Item = TransportEvent>) -> (Self, Arc<Mutex<Vec<String>>>) {
            let sent = Arc::new(Mutex::new(Vec::new()));
            let transport = Self {
                events: events.into_iter().collect(),
                sent: sent.clone(),
            };
            (transport, sent)
        }
    }

    #[async_trait]
    impl FeedTransport for ScriptedTransport {
        async fn next_event(&mut self) -> Option<TransportEvent> {
            self.events.pop_front()
        }

        async fn send(&mut self, text: String) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(text);
            Ok(())
        }
    }

    fn gas(standard: f64) -> TransportEvent {
        TransportEvent::Message(format!(
            r#"{{"topic":"{GAS_PRICE_TOPIC}","data":{{"standard":{standard},"fast":50,"faster":60}}}}"#
        ))
    }

    fn topics() -> Vec<String> {
        vec![GAS_PRICE_TOPIC.to_string()]
    }

    const SUBSCRIBE: &str = r#"{"op":"subscribe","topics":["ethGas:getGasPrices"]}"#;

    #[tokio::test]
    async fn subscribes_once_per_connection_not_per_message() {
        let (transport, sent) = ScriptedTransport::new([
            TransportEvent::Connecting,
            TransportEvent::Connected(1),
            gas(1.0),
            gas(2.0),
            gas(3.0),
        ]);
        let state = AppState::new();
        FeedChannel::new(transport, topics(), state.clone())
            .run(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(*sent.lock().unwrap(), vec![SUBSCRIBE.to_string()]);
    }

    #[tokio::test]
    async fn resubscribes_after_reconnect() {
        let (transport, sent) = ScriptedTransport::new([
            TransportEvent::Connecting,
            TransportEvent::Connected(1),
            gas(1.0),
            TransportEvent::Reconnecting,
            TransportEvent::Connecting,
            TransportEvent::Connected(2),
            gas(2.0),
        ]);
        let state = AppState::new();
        FeedChannel::new(transport, topics(), state.clone())
            .run(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(sent.lock().unwrap().len(), 2);
        assert_eq!(state.gas_prices().unwrap().standard, 2.0);
    }

    #[tokio::test]
    async fn last_write_wins_and_foreign_topics_are_ignored() {
        let (transport, _) = ScriptedTransport::new([
            TransportEvent::Connected(1),
            gas(1.0),
            gas(2.0),
            TransportEvent::Message(r#"{"topic":"uniswap:pairs","data":{"standard":99}}"#.into()),
            TransportEvent::Message(r#"{"data":{"standard":98}}"#.into()),
            TransportEvent::Message("garbage".into()),
        ]);
        let state = AppState::new();
        FeedChannel::new(transport, topics(), state.clone())
            .run(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            state.gas_prices(),
            Some(GasPrices {
                standard: 2.0,
                fast: 50.0,
                faster: 60.0
            })
        );
    }

    #[tokio::test]
    async fn connection_state_follows_transport() {
        let (transport, _) = ScriptedTransport::new([]);
        let mut channel = FeedChannel::new(transport, topics(), AppState::new());
        let rx = channel.connection_state();
        assert_eq!(*rx.borrow(), ConnectionState::Disconnected);

        for (event, expected) in [
            (TransportEvent::Connecting, ConnectionState::Connecting),
            (TransportEvent::Connected(1), ConnectionState::Connected),
            (TransportEvent::Reconnecting, ConnectionState::Reconnecting),
            (TransportEvent::Connecting, ConnectionState::Connecting),
            (TransportEvent::Connected(2), ConnectionState::Connected),
            (TransportEvent::Disconnected, ConnectionState::Disconnected),
        ] {
            channel.handle_event(event).await.unwrap();
            assert_eq!(*rx.borrow(), expected);
        }
    }

    #[tokio::test]
    async fn websocket_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (subscribed_tx, subscribed_rx) = tokio::sync::oneshot::channel();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            let first = ws.next().await.unwrap().unwrap();
            let _ = subscribed_tx.send(first.into_text().unwrap());
            ws.send(Message::Text(
                r#"{"topic":"other","data":{}}"#.to_string(),
            ))
            .await
            .unwrap();
            ws.send(Message::Text(
                r#"{"topic":"ethGas:getGasPrices","data":{"standard":11,"fast":22,"faster":33}}"#
                    .to_string(),
            ))
            .await
            .unwrap();
            // keep the socket open until the client goes away
            while let Some(Ok(_)) = ws.next().await {}
        });

        let url = Url::parse(&format!("ws://{addr}")).unwrap();
        let state = AppState::new();
        let channel = FeedChannel::new(
            WsTransport::connect(url, Duration::from_secs(1)),
            topics(),
            state.clone(),
        );
        let mut connection = channel.connection_state();
        let mut gas_rx = state.subscribe_gas_prices();
        let cancel = CancellationToken::new();
        let feed = tokio::spawn(channel.run(cancel.clone()));

        let subscribe = tokio::time::timeout(Duration::from_secs(5), subscribed_rx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(subscribe, SUBSCRIBE);

        tokio::time::timeout(Duration::from_secs(5), gas_rx.wait_for(Option::is_some))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.gas_prices().unwrap().faster, 33.0);
        assert_eq!(*connection.borrow_and_update(), ConnectionState::Connected);

        cancel.cancel();
        feed.await.unwrap().unwrap();
        assert_eq!(*connection.borrow(), ConnectionState::Disconnected);
        server.abort();
    }

    #[tokio::test]
    async fn lagging_consumer_subscribes_once_on_new_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (frames_tx, mut frames_rx) = tokio::sync::mpsc::unbounded_channel();

        let server = tokio::spawn(async move {
            // first connection is dropped right after the handshake
            let (socket, _) = listener.accept().await.unwrap();
            drop(tokio_tungstenite::accept_async(socket).await.unwrap());

            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Text(text) = msg {
                    let _ = frames_tx.send(text);
                }
            }
        });

        let url = Url::parse(&format!("ws://{addr}")).unwrap();
        let transport = WsTransport::connect(url, Duration::from_secs(1));
        // both connections happen before the channel reads a single event
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        let cancel = CancellationToken::new();
        let feed = tokio::spawn(
            FeedChannel::new(transport, topics(), AppState::new()).run(cancel.clone()),
        );

        let first = tokio::time::timeout(Duration::from_secs(5), frames_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first, SUBSCRIBE);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(frames_rx.try_recv().is_err());

        cancel.cancel();
        feed.await.unwrap().unwrap();
        server.abort();
    }
}
