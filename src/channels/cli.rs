//! CLI channel: stdin/stdout REPL for filling the form locally.
//!
//! `/attach <path>` sends a local file as an attachment.

use std::path::Path;

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::attachments::{AttachmentFetcher, AttachmentRef};
use crate::channels::{
    Channel, IncomingMessage, Keyboard, MessagePayload, MessageStream, OutgoingResponse,
    StatusUpdate,
};
use crate::error::{AttachmentError, ChannelError};

const CLI_USER: &str = "local-user";

/// A simple CLI channel that reads from stdin and writes to stdout.
#[derive(Default)]
pub struct CliChannel;

impl CliChannel {
    pub fn new() -> Self {
        Self
    }
}

/// Map one input line to a message. Inline buttons are pressed with
/// `/press <token>`.
fn parse_line(line: &str) -> Option<IncomingMessage> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let payload = if let Some(path) = line.strip_prefix("/attach ") {
        let path = path.trim();
        let file_name = Path::new(path).file_name().and_then(|n| n.to_str());
        MessagePayload::Attachment(AttachmentRef::document("cli", path, file_name))
    } else if let Some(token) = line.strip_prefix("/press ") {
        MessagePayload::Callback(token.trim().to_string())
    } else {
        MessagePayload::Text(line.to_string())
    };
    Some(IncomingMessage::with_payload("cli", CLI_USER, payload))
}

/// Text rendering of a keyboard for the terminal.
fn render_keyboard(keyboard: &Keyboard) -> String {
    match keyboard {
        Keyboard::Reply(rows) => rows
            .iter()
            .map(|row| format!("  [{}]", row.join("] [")))
            .collect::<Vec<_>>()
            .join("\n"),
        Keyboard::Inline(rows) => rows
            .iter()
            .flatten()
            .map(|b| format!("  {}  (/press {})", b.text, b.data))
            .collect::<Vec<_>>()
            .join("\n"),
        Keyboard::Remove => String::new(),
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some(msg) = parse_line(&line) else {
                            eprint!("> ");
                            continue;
                        };
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        _msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        println!("\n{}", response.content);
        if let Some(keyboard) = response.keyboard.as_ref() {
            let rendered = render_keyboard(keyboard);
            if !rendered.is_empty() {
                println!("{rendered}");
            }
        }
        println!();
        eprint!("> ");
        Ok(())
    }

    async fn send_status(
        &self,
        status: StatusUpdate,
        _metadata: &serde_json::Value,
    ) -> Result<(), ChannelError> {
        match status {
            StatusUpdate::Typing => eprintln!("⏳ ..."),
            StatusUpdate::Status(msg) => eprintln!("ℹ️  {}", msg),
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[async_trait]
impl AttachmentFetcher for CliChannel {
    async fn fetch(&self, attachment: &AttachmentRef) -> Result<Vec<u8>, AttachmentError> {
        tokio::fs::read(&attachment.file_id)
            .await
            .map_err(|e| AttachmentError::Resolve {
                file_id: attachment.file_id.clone(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::InlineButton;

    #[test]
    fn plain_line_is_text() {
        let msg = parse_line("  Иванов ").unwrap();
        assert_eq!(msg.user_id, CLI_USER);
        assert_eq!(msg.payload, MessagePayload::Text("Иванов".into()));
        assert!(parse_line("   ").is_none());
    }

    #[test]
    fn attach_and_press_commands() {
        let msg = parse_line("/attach /tmp/scan.pdf").unwrap();
        let MessagePayload::Attachment(att) = msg.payload else {
            panic!("expected attachment");
        };
        assert_eq!(att.channel, "cli");
        assert_eq!(att.file_id, "/tmp/scan.pdf");
        assert_eq!(att.file_name.as_deref(), Some("scan.pdf"));

        let msg = parse_line("/press finish_form").unwrap();
        assert_eq!(msg.payload, MessagePayload::Callback("finish_form".into()));
    }

    #[test]
    fn keyboards_render_as_text() {
        let reply = render_keyboard(&Keyboard::reply(&[&["Да", "Нет"]]));
        assert_eq!(reply, "  [Да] [Нет]");

        let inline = render_keyboard(&Keyboard::Inline(vec![vec![InlineButton::new(
            "Паспорт",
            "section:passport",
        )]]));
        assert!(inline.contains("/press section:passport"));
    }

    #[tokio::test]
    async fn fetch_reads_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, b"img").unwrap();

        let att = AttachmentRef::photo("cli", path.to_str().unwrap());
        assert_eq!(CliChannel::new().fetch(&att).await.unwrap(), b"img");

        let missing = AttachmentRef::photo("cli", "/nonexistent/file");
        assert!(CliChannel::new().fetch(&missing).await.is_err());
    }
}
