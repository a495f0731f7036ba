use crate::errors::RelayError;
use crate::signaling::SignalingMessage;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;

/// Signaling transport between the viewer and the camera.
///
/// Sends are fire-and-forget. Inbound traffic is delivered by the concrete
/// adapter as already-decoded [`SignalingMessage`]s.
#[async_trait]
pub trait RelayChannel: Send + Sync {
    async fn send(&self, message: &SignalingMessage) -> Result<(), RelayError>;

    /// Flips to `true` once the channel is closed and stays there.
    fn closed(&self) -> watch::Receiver<bool>;
}

/// WebSocket relay channel.
pub struct WsRelay {
    outbound: mpsc::UnboundedSender<Message>,
    closed: watch::Receiver<bool>,
}

impl WsRelay {
    /// Connects and starts the reader and writer tasks.
    ///
    /// The returned receiver ends when the socket closes.
    pub async fn connect(
        url: &str,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<SignalingMessage>), RelayError> {
        let (ws, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| RelayError::Connect(e.to_string()))?;
        log::info!("WebSocket connected successfully");

        let (mut ws_tx, mut ws_rx) = ws.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = watch::channel(false);
        let closed_tx = Arc::new(closed_tx);

        let writer_closed = Arc::clone(&closed_tx);
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = ws_tx.send(msg).await {
                    log::error!("WebSocket send failed: {}", e);
                    writer_closed.send_replace(true);
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            while let Some(frame) = ws_rx.next().await {
                let message = match frame {
                    Ok(Message::Text(text)) => SignalingMessage::parse(&text),
                    Ok(Message::Binary(data)) => SignalingMessage::parse_bytes(&data),
                    Ok(Message::Close(frame)) => {
                        log::warn!("WebSocket closed: {:?}", frame);
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        log::error!("WebSocket connection error: {}", e);
                        break;
                    }
                };
                log::debug!("Relay inbound {}", message.kind());
                if in_tx.send(message).is_err() {
                    break;
                }
            }
            closed_tx.send_replace(true);
        });

        let relay = Arc::new(Self {
            outbound: out_tx,
            closed: closed_rx,
        });
        Ok((relay, in_rx))
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Sends a close frame; the reader finishes once the server acknowledges.
    pub fn close(&self) {
        let _ = self.outbound.send(Message::Close(None));
    }
}

#[async_trait]
impl RelayChannel for WsRelay {
    async fn send(&self, message: &SignalingMessage) -> Result<(), RelayError> {
        if self.is_closed() {
            return Err(RelayError::Closed);
        }
        let text = message.to_wire()?;
        log::debug!("Relay outbound {}", message.kind());
        self.outbound
            .send(Message::Text(text))
            .map_err(|_| RelayError::Closed)
    }

    fn closed(&self) -> watch::Receiver<bool> {
        self.closed.clone()
    }
}
