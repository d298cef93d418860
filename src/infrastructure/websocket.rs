// WebSocket connector for the live channel
use crate::application::connection_manager::{Connection, Connector};
use crate::error::TransportError;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: String) -> Self {
        Self { url }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self) -> Result<Connection, TransportError> {
        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        tracing::debug!("WebSocket connected to {}", self.url);

        let (mut write, mut read) = ws_stream.split();

        // Writer lives until the manager drops the outbound sender
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = write.send(Message::Text(text.into())).await {
                    tracing::debug!("WebSocket send failed: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
        });

        let inbound = async_stream::stream! {
            while let Some(message) = read.next().await {
                match message {
                    Ok(Message::Text(text)) => yield Ok(text.as_str().to_owned()),
                    Ok(Message::Close(_)) => break,
                    // Ping/pong are answered by tungstenite; binary frames are not part of the protocol
                    Ok(_) => {}
                    Err(e) => {
                        yield Err(TransportError::Receive(e.to_string()));
                        break;
                    }
                }
            }
        };

        Ok(Connection {
            outbound,
            inbound: Box::pin(inbound),
        })
    }
}
