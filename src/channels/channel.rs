//! Channel trait and the message types that cross it.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use uuid::Uuid;

use crate::attachments::AttachmentRef;
use crate::error::ChannelError;

/// Stream of messages produced by a started channel.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// What the user actually sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePayload {
    Text(String),
    Attachment(AttachmentRef),
    /// Inline button press carrying its callback token.
    Callback(String),
}

/// A message received from a channel.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub id: Uuid,
    pub channel: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub payload: MessagePayload,
    pub received_at: DateTime<Utc>,
    /// Channel-specific routing data (e.g. the Telegram `chat_id`).
    pub metadata: serde_json::Value,
}

impl IncomingMessage {
    /// Text message.
    pub fn new(channel: &str, user_id: &str, text: &str) -> Self {
        Self::with_payload(channel, user_id, MessagePayload::Text(text.to_string()))
    }

    pub fn with_payload(channel: &str, user_id: &str, payload: MessagePayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.to_string(),
            user_id: user_id.to_string(),
            user_name: None,
            payload,
            received_at: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_user_name(mut self, name: &str) -> Self {
        self.user_name = Some(name.to_string());
        self
    }

    /// Short description for logs; never includes answer text.
    pub fn kind(&self) -> &'static str {
        match self.payload {
            MessagePayload::Text(_) => "text",
            MessagePayload::Attachment(_) => "attachment",
            MessagePayload::Callback(_) => "callback",
        }
    }
}

/// A button on an inline keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub text: String,
    pub data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            data: data.into(),
        }
    }
}

/// Keyboard attached to a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// Persistent reply buttons; pressing one sends its label as text.
    Reply(Vec<Vec<String>>),
    /// Buttons under the message; pressing one sends a callback token.
    Inline(Vec<Vec<InlineButton>>),
    /// Hide any reply keyboard.
    Remove,
}

impl Keyboard {
    /// Reply keyboard from rows of labels.
    pub fn reply(rows: &[&[&str]]) -> Self {
        Keyboard::Reply(
            rows.iter()
                .map(|row| row.iter().map(|l| l.to_string()).collect())
                .collect(),
        )
    }
}

/// A reply to send back to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingResponse {
    pub content: String,
    pub keyboard: Option<Keyboard>,
}

impl OutgoingResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// Transient status shown while a message is processed.
#[derive(Debug, Clone)]
pub enum StatusUpdate {
    /// Work in progress (typing / uploading indicator).
    Typing,
    /// A short informational notice.
    Status(String),
}

/// A bidirectional message transport.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Start receiving messages.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Reply to a message on this channel.
    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError>;

    /// Show a status indicator. Channels without one ignore it.
    async fn send_status(
        &self,
        _status: StatusUpdate,
        _metadata: &serde_json::Value,
    ) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_message_builder() {
        let msg = IncomingMessage::new("cli", "local-user", "hello")
            .with_metadata(serde_json::json!({"chat_id": "1"}))
            .with_user_name("Alice");
        assert_eq!(msg.channel, "cli");
        assert_eq!(msg.user_id, "local-user");
        assert_eq!(msg.user_name.as_deref(), Some("Alice"));
        assert_eq!(msg.payload, MessagePayload::Text("hello".into()));
        assert_eq!(msg.metadata["chat_id"], "1");
        assert_eq!(msg.kind(), "text");
    }

    #[test]
    fn callback_message_kind() {
        let msg = IncomingMessage::with_payload(
            "telegram",
            "42",
            MessagePayload::Callback("finish_form".into()),
        );
        assert_eq!(msg.kind(), "callback");
    }

    #[test]
    fn reply_keyboard_from_labels() {
        let kb = Keyboard::reply(&[&["a", "b"], &["c"]]);
        assert_eq!(
            kb,
            Keyboard::Reply(vec![vec!["a".into(), "b".into()], vec!["c".into()]])
        );
    }
}
