//! WebSocket transport for a room
//!
//! The socket is split into two tasks: a reader forwarding frames as
//! [`ConnectionEvent`]s and a writer draining an outgoing queue. The room
//! talks to both through unbounded channels and never touches the socket.

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, warn};
use shared::protocol::CLOSE_ABNORMAL;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::error::{ClientError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Binary (or text) frame payload
    Message(Vec<u8>),
    Error(String),
    Close {
        code: u16,
        reason: String,
        was_clean: bool,
    },
}

pub struct Connection {
    outgoing: mpsc::UnboundedSender<WsMessage>,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl Connection {
    /// Opens the socket and starts the reader and writer tasks
    pub async fn connect(url: &str) -> Result<Self> {
        debug!("Opening room socket {}", url);
        let (stream, _response) = connect_async(url).await?;
        let (mut sink, mut stream) = stream.split();

        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<WsMessage>();
        let (events_tx, events) = mpsc::unbounded_channel();

        let writer = tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                let closing = matches!(message, WsMessage::Close(_));
                if let Err(e) = sink.send(message).await {
                    error!("Failed to write to room socket: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let reader = tokio::spawn(async move {
            while let Some(result) = stream.next().await {
                let event = match result {
                    Ok(WsMessage::Binary(bytes)) => ConnectionEvent::Message(bytes),
                    Ok(WsMessage::Text(text)) => ConnectionEvent::Message(text.into_bytes()),
                    Ok(WsMessage::Close(frame)) => {
                        let (code, reason) = match frame {
                            Some(frame) => (u16::from(frame.code), frame.reason.into_owned()),
                            None => (u16::from(CloseCode::Status), String::new()),
                        };
                        let _ = events_tx.send(ConnectionEvent::Close {
                            code,
                            reason,
                            was_clean: true,
                        });
                        return;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        warn!("Room socket error: {}", e);
                        let _ = events_tx.send(ConnectionEvent::Error(e.to_string()));
                        let _ = events_tx.send(ConnectionEvent::Close {
                            code: CLOSE_ABNORMAL,
                            reason: e.to_string(),
                            was_clean: false,
                        });
                        return;
                    }
                };

                if events_tx.send(event).is_err() {
                    return;
                }
            }

            let _ = events_tx.send(ConnectionEvent::Close {
                code: CLOSE_ABNORMAL,
                reason: String::new(),
                was_clean: false,
            });
        });

        Ok(Self {
            outgoing,
            events,
            tasks: vec![reader, writer],
        })
    }

    /// Connection without a socket, driven through the returned channels
    #[cfg(test)]
    pub(crate) fn detached() -> (
        Self,
        mpsc::UnboundedReceiver<WsMessage>,
        mpsc::UnboundedSender<ConnectionEvent>,
    ) {
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let connection = Self {
            outgoing,
            events,
            tasks: Vec::new(),
        };
        (connection, outgoing_rx, events_tx)
    }

    pub fn send(&self, bytes: Vec<u8>) -> Result<()> {
        self.outgoing
            .send(WsMessage::Binary(bytes))
            .map_err(|_| ClientError::ConnectionClosed)
    }

    /// Queues a close frame; the writer stops after sending it
    pub fn close(&self, code: u16, reason: &str) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        self.outgoing
            .send(WsMessage::Close(Some(frame)))
            .map_err(|_| ClientError::ConnectionClosed)
    }

    /// Next event from the reader; `None` once the reader has finished
    pub async fn recv(&mut self) -> Option<ConnectionEvent> {
        self.events.recv().await
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
