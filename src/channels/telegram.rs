//! Telegram channel. Long-polls the Bot API for updates.
//!
//! Handles text messages, photos, documents and inline-button callbacks,
//! sends replies with reply or inline keyboards, and downloads attachments
//! through `getFile`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::attachments::{AttachmentFetcher, AttachmentRef};
use crate::channels::{
    Channel, IncomingMessage, Keyboard, MessagePayload, MessageStream, OutgoingResponse,
    StatusUpdate,
};
use crate::error::{AttachmentError, ChannelError};

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Telegram channel connected to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    allowed_users: Vec<String>,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString, allowed_users: Vec<String>) -> Self {
        Self {
            bot_token,
            allowed_users,
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the channel at another Bot API server (local bot-api, tests).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base,
            self.bot_token.expose_secret()
        )
    }

    fn file_url(&self, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{file_path}",
            self.api_base,
            self.bot_token.expose_secret()
        )
    }

    /// Check if a username or id is in the allowed list.
    pub fn is_user_allowed(&self, username: &str) -> bool {
        self.allowed_users.iter().any(|u| u == "*" || u == username)
    }

    /// Check if any of the provided identities is allowed.
    pub fn is_any_user_allowed<'a, I>(&self, identities: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        identities.into_iter().any(|id| self.is_user_allowed(id))
    }

    /// Send a text message, splitting it to fit Telegram's limit. The
    /// keyboard goes with the last chunk.
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.iter().enumerate() {
            let markup = if i == last { keyboard.map(reply_markup) } else { None };
            self.send_message_chunk(chat_id, chunk, markup).await?;
        }
        Ok(())
    }

    /// Send one chunk, Markdown first with a plain-text fallback. User
    /// answers echoed in previews can break Markdown parsing.
    async fn send_message_chunk(
        &self,
        chat_id: &str,
        text: &str,
        markup: Option<serde_json::Value>,
    ) -> Result<(), ChannelError> {
        let mut markdown_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown"
        });
        if let Some(ref markup) = markup {
            markdown_body["reply_markup"] = markup.clone();
        }

        let markdown_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&markdown_body)
            .send()
            .await
            .map_err(|e| send_failed(e.to_string()))?;

        if markdown_resp.status().is_success() {
            return Ok(());
        }

        let markdown_status = markdown_resp.status();
        tracing::warn!(
            status = ?markdown_status,
            "Telegram sendMessage with Markdown failed; retrying without parse_mode"
        );

        let mut plain_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(markup) = markup {
            plain_body["reply_markup"] = markup;
        }

        let plain_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&plain_body)
            .send()
            .await
            .map_err(|e| send_failed(e.to_string()))?;

        if !plain_resp.status().is_success() {
            let plain_err = plain_resp.text().await.unwrap_or_default();
            return Err(send_failed(format!(
                "sendMessage failed (markdown: {markdown_status}, plain: {plain_err})"
            )));
        }

        Ok(())
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let updates_url = self.api_url("getUpdates");
        let answer_url = self.api_url("answerCallbackQuery");
        let allowed_users = self.allowed_users.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": 30,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client.post(&updates_url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let data: serde_json::Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let Some(results) = data.get("result").and_then(serde_json::Value::as_array)
                else {
                    continue;
                };

                for update in results {
                    if let Some(uid) = update.get("update_id").and_then(serde_json::Value::as_i64)
                    {
                        offset = uid + 1;
                    }

                    // Stop the client-side spinner on the pressed button.
                    if let Some(query_id) = update
                        .get("callback_query")
                        .and_then(|q| q.get("id"))
                        .and_then(serde_json::Value::as_str)
                    {
                        let _ = client
                            .post(&answer_url)
                            .json(&serde_json::json!({ "callback_query_id": query_id }))
                            .send()
                            .await;
                    }

                    let Some(incoming) = parse_update(update, &allowed_users) else {
                        continue;
                    };

                    tracing::debug!(
                        user_id = %incoming.user_id,
                        kind = incoming.kind(),
                        "Telegram update received"
                    );

                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let chat_id = msg
            .metadata
            .get("chat_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| send_failed("No chat_id in message metadata".into()))?;

        self.send_message(chat_id, &response.content, response.keyboard.as_ref())
            .await
    }

    async fn send_status(
        &self,
        status: StatusUpdate,
        metadata: &serde_json::Value,
    ) -> Result<(), ChannelError> {
        let Some(chat_id) = metadata.get("chat_id").and_then(|v| v.as_str()) else {
            return Ok(());
        };
        match status {
            StatusUpdate::Typing => {
                let _ = self
                    .client
                    .post(self.api_url("sendChatAction"))
                    .json(&serde_json::json!({
                        "chat_id": chat_id,
                        "action": "typing"
                    }))
                    .send()
                    .await;
            }
            StatusUpdate::Status(ref msg) if !msg.is_empty() => {
                let _ = self
                    .send_message(chat_id, &format!("ℹ️ {msg}"), None)
                    .await;
            }
            StatusUpdate::Status(_) => {}
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Attachment download ─────────────────────────────────────────────

#[async_trait]
impl AttachmentFetcher for TelegramChannel {
    async fn fetch(&self, attachment: &AttachmentRef) -> Result<Vec<u8>, AttachmentError> {
        let resolve_err = |reason: String| AttachmentError::Resolve {
            file_id: attachment.file_id.clone(),
            reason,
        };

        let resp = self
            .client
            .post(self.api_url("getFile"))
            .json(&serde_json::json!({ "file_id": attachment.file_id }))
            .send()
            .await
            .map_err(|e| resolve_err(e.to_string()))?;

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| resolve_err(e.to_string()))?;

        let file_path = data
            .get("result")
            .and_then(|r| r.get("file_path"))
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| resolve_err("getFile returned no file_path".into()))?;

        let resp = self
            .client
            .get(self.file_url(file_path))
            .send()
            .await
            .map_err(|e| AttachmentError::Download(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(AttachmentError::Download(format!(
                "file download returned {}",
                resp.status()
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| AttachmentError::Download(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn send_failed(reason: String) -> ChannelError {
    ChannelError::SendFailed {
        name: "telegram".into(),
        reason,
    }
}

/// Turn one update into an `IncomingMessage`, or `None` when it carries
/// nothing the bot handles or comes from a user outside the allowlist.
fn parse_update(update: &serde_json::Value, allowed_users: &[String]) -> Option<IncomingMessage> {
    let (from, chat, payload) = if let Some(query) = update.get("callback_query") {
        let data = query.get("data").and_then(serde_json::Value::as_str)?;
        let chat = query.get("message").and_then(|m| m.get("chat"))?;
        (
            query.get("from")?,
            chat,
            MessagePayload::Callback(data.to_string()),
        )
    } else {
        let message = update.get("message")?;
        (
            message.get("from")?,
            message.get("chat")?,
            message_payload(message)?,
        )
    };

    let username = from
        .get("username")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("unknown");
    let user_id = from
        .get("id")
        .and_then(serde_json::Value::as_i64)
        .map(|id| id.to_string());

    let mut identities = vec![username];
    if let Some(ref id) = user_id {
        identities.push(id.as_str());
    }
    if !check_user_allowed(allowed_users, identities.iter().copied()) {
        tracing::warn!(
            "Telegram: ignoring message from unauthorized user: \
             username={username}, user_id={}",
            user_id.as_deref().unwrap_or("unknown")
        );
        return None;
    }

    let chat_id = chat
        .get("id")
        .and_then(serde_json::Value::as_i64)
        .map(|id| id.to_string())
        .unwrap_or_default();

    let first_name = from.get("first_name").and_then(serde_json::Value::as_str);

    let incoming =
        IncomingMessage::with_payload("telegram", user_id.as_deref().unwrap_or(username), payload)
            .with_metadata(serde_json::json!({
                "chat_id": chat_id,
                "username": username,
            }))
            .with_user_name(first_name.unwrap_or(username));
    Some(incoming)
}

/// Text, the largest photo size, or a document. Other message kinds are
/// ignored.
fn message_payload(message: &serde_json::Value) -> Option<MessagePayload> {
    if let Some(text) = message.get("text").and_then(serde_json::Value::as_str) {
        return Some(MessagePayload::Text(text.to_string()));
    }
    if let Some(sizes) = message.get("photo").and_then(serde_json::Value::as_array) {
        let file_id = sizes
            .last()
            .and_then(|p| p.get("file_id"))
            .and_then(serde_json::Value::as_str)?;
        return Some(MessagePayload::Attachment(AttachmentRef::photo(
            "telegram", file_id,
        )));
    }
    if let Some(doc) = message.get("document") {
        let file_id = doc.get("file_id").and_then(serde_json::Value::as_str)?;
        let file_name = doc.get("file_name").and_then(serde_json::Value::as_str);
        return Some(MessagePayload::Attachment(AttachmentRef::document(
            "telegram", file_id, file_name,
        )));
    }
    None
}

/// Bot API `reply_markup` object for a keyboard.
fn reply_markup(keyboard: &Keyboard) -> serde_json::Value {
    match keyboard {
        Keyboard::Reply(rows) => {
            let rows: Vec<Vec<serde_json::Value>> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|label| serde_json::json!({ "text": label }))
                        .collect()
                })
                .collect();
            serde_json::json!({ "keyboard": rows, "resize_keyboard": true })
        }
        Keyboard::Inline(rows) => {
            let rows: Vec<Vec<serde_json::Value>> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|b| serde_json::json!({ "text": b.text, "callback_data": b.data }))
                        .collect()
                })
                .collect();
            serde_json::json!({ "inline_keyboard": rows })
        }
        Keyboard::Remove => serde_json::json!({ "remove_keyboard": true }),
    }
}

/// Check if any identity in the iterator matches the allowed users list.
fn check_user_allowed<'a>(
    allowed_users: &[String],
    identities: impl IntoIterator<Item = &'a str>,
) -> bool {
    let ids: Vec<&str> = identities.into_iter().collect();
    allowed_users
        .iter()
        .any(|u| u == "*" || ids.contains(&u.as_str()))
}

/// Split a message into chunks of at most `max_len` characters.
/// Prefers newlines, then spaces, then hard-cuts on a char boundary.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.chars().count() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let hard_cut = remaining
            .char_indices()
            .nth(max_len)
            .map_or(remaining.len(), |(i, _)| i);
        let chunk = &remaining[..hard_cut];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(hard_cut);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
