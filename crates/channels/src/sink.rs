//! Progress delivery through a chat channel.

use async_trait::async_trait;
use reasonloop_agent::dialogue::split_for_delivery;
use reasonloop_agent::progress::{ProgressSink, SinkError};
use reasonloop_core::channel::Channel;
use std::sync::Arc;
use tracing::debug;

/// Longest single message most chat platforms accept.
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 4000;

/// Sends every progress line to one chat on a [`Channel`].
///
/// Long lines are split to fit the platform limit, and a typing indicator is
/// refreshed after each line while the session keeps working.
pub struct ChannelSink {
    channel: Arc<dyn Channel>,
    chat_id: String,
    max_message_chars: usize,
}

impl ChannelSink {
    pub fn new(channel: Arc<dyn Channel>, chat_id: impl Into<String>) -> Self {
        Self {
            channel,
            chat_id: chat_id.into(),
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
        }
    }

    pub fn with_max_message_chars(mut self, max: usize) -> Self {
        self.max_message_chars = max;
        self
    }

    /// Deliver arbitrary text (the final answer, the dialogue) in chunks.
    pub async fn send_long(&self, text: &str) -> Result<(), SinkError> {
        for part in split_for_delivery(text, self.max_message_chars) {
            self.channel
                .send(&self.chat_id, &part)
                .await
                .map_err(|e| SinkError::Delivery(e.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressSink for ChannelSink {
    async fn notify(&self, text: &str) -> Result<(), SinkError> {
        self.send_long(text).await?;

        if let Err(e) = self.channel.send_typing(&self.chat_id).await {
            debug!(channel = self.channel.name(), error = %e, "Typing indicator failed");
        }
        Ok(())
    }
}
