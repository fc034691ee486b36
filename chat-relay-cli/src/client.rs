//! WebSocket client for a running relay

use anyhow::{bail, Context, Result};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

pub struct RelayClient {
    base_url: String,
}

impl RelayClient {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or_else(|| "ws://127.0.0.1:8000".to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    pub fn session_url(&self, session_id: &str) -> String {
        format!("{}/ws/{}", self.base_url, session_id)
    }

    /// Send one message on `session_id` and wait for the reply frame
    pub async fn send(&self, session_id: &str, message: &str) -> Result<String> {
        let url = self.session_url(session_id);
        let (mut stream, _) = connect_async(url.as_str())
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;
        debug!("Connected to {}", url);

        stream.send(Message::Text(message.to_string())).await?;

        let reply = loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => break text,
                Some(Ok(Message::Close(frame))) => match frame {
                    Some(frame) => bail!(
                        "Relay closed the connection ({}): {}",
                        u16::from(frame.code),
                        frame.reason
                    ),
                    None => bail!("Relay closed the connection"),
                },
                Some(Ok(other)) => debug!("Skipping frame: {:?}", other),
                Some(Err(e)) => return Err(e.into()),
                None => bail!("Connection ended before a reply arrived"),
            }
        };

        let _ = stream.close(None).await;
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chat_relay_agent::ChatRelay;
    use chat_relay_core::config::{ProviderErrorPolicy, RelayConfig};
    use chat_relay_core::session::SessionStore;
    use chat_relay_providers::{
        LLMProvider, LLMResponse, Message as LlmMessage, ProviderError, ProviderResult,
    };
    use chat_relay_server::{serve, AppState};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use tokio::sync::broadcast;

    struct FixedProvider(Option<&'static str>);

    #[async_trait]
    impl LLMProvider for FixedProvider {
        async fn chat(
            &self,
            _messages: Vec<LlmMessage>,
            _model: Option<String>,
            _max_tokens: u32,
            _temperature: f64,
        ) -> ProviderResult<LLMResponse> {
            match self.0 {
                Some(text) => Ok(LLMResponse {
                    content: Some(text.to_string()),
                    finish_reason: "stop".to_string(),
                    usage: HashMap::new(),
                }),
                None => Err(ProviderError::ApiError("HTTP 500: down".to_string())),
            }
        }
    }

    async fn start(provider: FixedProvider) -> (String, broadcast::Sender<()>) {
        let relay = ChatRelay::new(
            Arc::new(SessionStore::new()),
            Arc::new(provider),
            &RelayConfig::default(),
        );
        let state = AppState::new(relay, ProviderErrorPolicy::Close);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (tx, rx) = broadcast::channel(1);
        tokio::spawn(serve(listener, state, rx));
        (url, tx)
    }

    #[test]
    fn test_session_url() {
        let client = RelayClient::new(Some("ws://localhost:9000/".to_string()));
        assert_eq!(client.session_url("test123"), "ws://localhost:9000/ws/test123");
        let client = RelayClient::new(None);
        assert_eq!(client.session_url("a"), "ws://127.0.0.1:8000/ws/a");
    }

    #[tokio::test]
    async fn test_send_receives_reply() {
        let (url, _shutdown) = start(FixedProvider(Some("Chào bạn!"))).await;
        let reply = RelayClient::new(Some(url))
            .send("test123", "Xin chào")
            .await
            .unwrap();
        assert_eq!(reply, "Chào bạn!");
    }

    #[tokio::test]
    async fn test_send_reports_close_frame() {
        let (url, _shutdown) = start(FixedProvider(None)).await;
        let err = RelayClient::new(Some(url))
            .send("test123", "Xin chào")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("1011"));
    }

    #[tokio::test]
    async fn test_send_without_server_fails() {
        let err = RelayClient::new(Some("ws://127.0.0.1:1".to_string()))
            .send("x", "hi")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to connect"));
    }
}
