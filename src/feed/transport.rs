use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::metrics::prometheus::record_feed_connection;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const EVENT_BUFFER: usize = 1_024;
const OUTBOUND_BUFFER: usize = 64;

/// What the socket layer reports upward.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connecting,
    /// A connection is up. Numbers increase with every new connection.
    Connected(u64),
    Message(String),
    /// Connection lost or attempt failed; another attempt follows.
    Reconnecting,
    /// The transport gave up for good.
    Disconnected,
}

/// A persistent bidirectional text connection that owns its own reconnect
/// policy.
#[async_trait]
pub trait FeedTransport: Send {
    /// `None` once the transport is finished.
    async fn next_event(&mut self) -> Option<TransportEvent>;
    async fn send(&mut self, text: String) -> anyhow::Result<()>;
}

/// WebSocket transport with exponential reconnect backoff.
///
/// Outbound frames are stamped with the connection the consumer last saw
/// reported as [`TransportEvent::Connected`]. The socket task drops frames
/// stamped for an earlier connection.
pub struct WsTransport {
    events: mpsc::Receiver<TransportEvent>,
    outbound: mpsc::Sender<(u64, String)>,
    connection: u64,
    task: JoinHandle<()>,
}

impl WsTransport {
    pub fn connect(url: Url, max_backoff: Duration) -> Self {
        let (event_tx, events) = mpsc::channel(EVENT_BUFFER);
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let task = tokio::spawn(run_socket(url, max_backoff, event_tx, outbound_rx));
        Self {
            events,
            outbound,
            connection: 0,
            task,
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
impl FeedTransport for WsTransport {
    async fn next_event(&mut self) -> Option<TransportEvent> {
        let event = self.events.recv().await;
        if let Some(TransportEvent::Connected(connection)) = event {
            self.connection = connection;
        }
        event
    }

    async fn send(&mut self, text: String) -> anyhow::Result<()> {
        self.outbound
            .send((self.connection, text))
            .await
            .map_err(|_| anyhow::anyhow!("feed transport is closed"))
    }
}

async fn run_socket(
    url: Url,
    max_backoff: Duration,
    events: mpsc::Sender<TransportEvent>,
    mut outbound: mpsc::Receiver<(u64, String)>,
) {
    let mut backoff = INITIAL_BACKOFF;
    let mut connection = 0u64;

    loop {
        if events.send(TransportEvent::Connecting).await.is_err() {
            return;
        }
        info!(target: "feed", %url, "connecting");

        match connect_async(url.as_str()).await {
            Ok((mut stream, _)) => {
                record_feed_connection("connected");
                connection += 1;
                backoff = INITIAL_BACKOFF;
                if events.send(TransportEvent::Connected(connection)).await.is_err() {
                    return;
                }
                info!(target: "feed", connection, "connected");

                loop {
                    tokio::select! {
                        out = outbound.recv() => match out {
                            Some((stamp, _)) if stamp != connection => {
                                debug!(target: "feed", stamp, connection, "dropping frame for an earlier connection");
                            }
                            Some((_, text)) => {
                                if let Err(e) = stream.send(Message::Text(text)).await {
                                    warn!(target: "feed", "send failed: {}", e);
                                    break;
                                }
                            }
                            None => {
                                let _ = stream.close(None).await;
                                let _ = events.send(TransportEvent::Disconnected).await;
                                return;
                            }
                        },
                        msg = stream.next() => match msg {
                            Some(Ok(Message::Text(text))) => {
                                if events.send(TransportEvent::Message(text)).await.is_err() {
                                    return;
                                }
                            }
                            Some(Ok(Message::Binary(bin))) => match String::from_utf8(bin) {
                                Ok(text) => {
                                    if events.send(TransportEvent::Message(text)).await.is_err() {
                                        return;
                                    }
                                }
                                Err(_) => debug!(target: "feed", "non-utf8 binary frame ignored"),
                            },
                            Some(Ok(Message::Ping(payload))) => {
                                if let Err(e) = stream.send(Message::Pong(payload)).await {
                                    warn!(target: "feed", "pong failed: {}", e);
                                    break;
                                }
                            }
                            Some(Ok(Message::Close(_))) => {
                                warn!(target: "feed", "server closed");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!(target: "feed", "recv error: {}", e);
                                break;
                            }
                            None => {
                                warn!(target: "feed", "stream ended");
                                break;
                            }
                        },
                    }
                }
            }
            Err(e) => {
                warn!(target: "feed", "connect failed: {}", e);
            }
        }

        record_feed_connection("reconnecting");
        if events.send(TransportEvent::Reconnecting).await.is_err() {
            return;
        }
        info!(target: "feed", "reconnecting in {:?}", backoff);
        sleep(backoff).await;
        backoff = (backoff * 2).min(max_backoff);
    }
}
