//! Client for a remote `/api/chat` endpoint

use super::ChatError;
use crate::api::{ChatRequest, ChatResponse, ErrorResponse};
use crate::conversation::Turn;
use crate::runtime::ChatClient;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Sends chat turns to another EcoBot server over HTTP
pub struct HttpChatClient {
    client: Client,
    url: String,
}

impl HttpChatClient {
    pub fn new(url: impl Into<String>) -> Result<Self, ChatError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatClient for HttpChatClient {
    async fn reply(&self, message: &str, history: &[Turn]) -> Result<String, ChatError> {
        let body = ChatRequest {
            message: message.to_string(),
            history: history.to_vec(),
        };

        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .await
                .map_or_else(|_| status.to_string(), |e| e.error);
            return Err(ChatError::Endpoint {
                status: status.as_u16(),
                message,
            });
        }

        let ChatResponse { reply } = response.json().await?;
        Ok(reply)
    }
}
