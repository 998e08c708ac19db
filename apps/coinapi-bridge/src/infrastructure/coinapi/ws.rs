//! CoinAPI WebSocket Transport
//!
//! Adapter implementing [`StreamTransport`] over the vendor's streaming
//! endpoint. Decoded trade/quote events are produced onto the event channel
//! handed in at construction; control messages submitted through
//! [`StreamTransport::send_hello`] are queued and written by the run loop,
//! so a hello sent before the socket is up goes out as soon as the
//! connection establishes.
//!
//! No reconnection happens here: when the connection drops, the run loop
//! reports the disconnect and returns. Retry policy belongs to the process
//! supervisor, not the ingestion core.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::messages::{InboundMessage, encode_hello};
use crate::application::ports::{Hello, StreamEvent, StreamEventSender, StreamTransport, TransportError};

/// WebSocket transport for the vendor's streaming connection.
pub struct CoinApiWsTransport {
    url: String,
    events: StreamEventSender,
    cancel: CancellationToken,
    outbound: mpsc::UnboundedSender<String>,
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    connected: watch::Sender<bool>,
}

impl CoinApiWsTransport {
    /// Create a transport for `url`, publishing events into `events`.
    #[must_use]
    pub fn new(url: String, events: StreamEventSender, cancel: CancellationToken) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (connected, _) = watch::channel(false);

        Self {
            url,
            events,
            cancel,
            outbound,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            connected,
        }
    }

    /// Run the connection: connect, flush queued control messages, and
    /// decode inbound frames until cancelled or the connection drops.
    ///
    /// # Errors
    ///
    /// [`TransportError`] when the connection cannot be established, drops,
    /// or the run loop is started twice.
    pub async fn run(self: Arc<Self>) -> Result<(), TransportError> {
        let mut outbound = self
            .outbound_rx
            .lock()
            .take()
            .ok_or(TransportError::AlreadyRunning)?;

        tracing::info!(url = %self.url, "connecting to stream");

        let (ws_stream, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|error| TransportError::ConnectFailed(error.to_string()))?;

        let (mut write, mut read) = ws_stream.split();

        let _ = self.connected.send(true);
        let _ = self.events.send(StreamEvent::Connected).await;

        let result = loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("stream transport cancelled");
                    break Ok(());
                }
                frame = outbound.recv() => {
                    // The sender half lives as long as self, so this arm
                    // only fires with a frame to write.
                    if let Some(frame) = frame {
                        if let Err(error) = write.send(Message::Text(frame.into())).await {
                            break Err(TransportError::SendFailed(error.to_string()));
                        }
                    }
                }
                message = read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => self.handle_frame(&text).await,
                        Some(Ok(Message::Ping(payload))) => {
                            if let Err(error) = write.send(Message::Pong(payload)).await {
                                break Err(TransportError::SendFailed(error.to_string()));
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("server sent close frame");
                            break Err(TransportError::Closed);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(error)) => {
                            break Err(TransportError::ConnectFailed(error.to_string()));
                        }
                        None => {
                            tracing::info!("stream ended");
                            break Err(TransportError::Closed);
                        }
                    }
                }
            }
        };

        let _ = self.connected.send(false);
        let _ = self.events.send(StreamEvent::Disconnected).await;
        result
    }

    /// Decode one text frame and publish the resulting event.
    async fn handle_frame(&self, text: &str) {
        match serde_json::from_str::<InboundMessage>(text) {
            Ok(InboundMessage::Trade(trade)) => {
                let _ = self.events.send(StreamEvent::Trade(trade.into())).await;
            }
            Ok(InboundMessage::Quote(quote)) => {
                let _ = self.events.send(StreamEvent::Quote(quote.into())).await;
            }
            Ok(InboundMessage::Heartbeat) => {
                tracing::trace!("heartbeat");
            }
            Ok(InboundMessage::Error(error)) => {
                tracing::error!(message = %error.message, "stream error message");
                let _ = self.events.send(StreamEvent::Error(error.message)).await;
            }
            Ok(InboundMessage::Reconnect(reconnect)) => {
                tracing::warn!(within_seconds = ?reconnect.within_seconds, "server requested reconnect");
            }
            Ok(InboundMessage::Unknown) => {
                tracing::trace!("ignoring unhandled message type");
            }
            Err(error) => {
                tracing::debug!(error = %error, "undecodable frame");
            }
        }
    }
}

#[async_trait]
impl StreamTransport for CoinApiWsTransport {
    async fn send_hello(&self, hello: &Hello) -> Result<(), TransportError> {
        let frame =
            encode_hello(hello).map_err(|error| TransportError::SendFailed(error.to_string()))?;

        self.outbound
            .send(frame)
            .map_err(|_| TransportError::Closed)
    }

    async fn wait_connected(&self, timeout: Duration) -> Result<(), TransportError> {
        let mut connected = self.connected.subscribe();

        match tokio::time::timeout(timeout, connected.wait_for(|up| *up)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => Err(TransportError::NotConnected { waited: timeout }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hello_is_queued_before_the_socket_is_up() {
        let (events, _events_rx) = mpsc::channel(8);
        let transport = CoinApiWsTransport::new(
            "wss://ws.coinapi.io/v1/".to_string(),
            events,
            CancellationToken::new(),
        );

        let hello = Hello {
            apikey: uuid::Uuid::nil(),
            heartbeat: true,
            subscribe_data_type: vec!["trade".to_string()],
            subscribe_filter_symbol_id: vec!["$no_symbol_requested$".to_string()],
        };

        // Queued, not errored: the run loop will flush it after connecting.
        transport.send_hello(&hello).await.unwrap();
    }

    #[tokio::test]
    async fn wait_connected_times_out_when_never_connected() {
        let (events, _events_rx) = mpsc::channel(8);
        let transport = CoinApiWsTransport::new(
            "wss://ws.coinapi.io/v1/".to_string(),
            events,
            CancellationToken::new(),
        );

        let result = transport.wait_connected(Duration::from_millis(10)).await;

        assert_eq!(
            result,
            Err(TransportError::NotConnected {
                waited: Duration::from_millis(10)
            })
        );
    }
}
