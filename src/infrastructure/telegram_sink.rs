// Telegram alert sink - posts alert text through the Bot API
use crate::application::alerts::{Alert, AlertError, AlertSink};
use async_trait::async_trait;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct TelegramSink {
    client: reqwest::Client,
    api_base: String,
    token: String,
    chat_id: String,
}

impl TelegramSink {
    pub fn new(api_base: String, token: String, chat_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base,
            token,
            chat_id,
        }
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base.trim_end_matches('/'), self.token)
    }
}

#[async_trait]
impl AlertSink for TelegramSink {
    async fn notify(&self, alert: &Alert) -> Result<(), AlertError> {
        let text = alert.message();
        let response = self
            .client
            .post(self.send_message_url())
            .form(&[("chat_id", self.chat_id.as_str()), ("text", text.as_str())])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| AlertError::Transport(e.without_url().to_string()))?;

        if !response.status().is_success() {
            return Err(AlertError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    // The token is part of the URL, so it stays out of logs
    fn describe(&self) -> String {
        format!("telegram chat {}", self.chat_id)
    }
}
