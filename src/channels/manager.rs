//! Runs several channels side by side and routes replies back.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream;

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse, StatusUpdate};
use crate::error::ChannelError;

/// Owns the active channels keyed by name.
#[derive(Default)]
pub struct ChannelManager {
    channels: HashMap<String, Arc<dyn Channel>>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, channel: Arc<dyn Channel>) {
        let name = channel.name().to_string();
        tracing::info!(channel = %name, "Channel registered");
        self.channels.insert(name, channel);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Channel>> {
        self.channels.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.keys().cloned().collect();
        names.sort();
        names
    }

    /// Start every channel and merge their streams. A channel that fails to
    /// start is logged and left out.
    pub async fn start_all(&self) -> Result<MessageStream, ChannelError> {
        let mut streams = Vec::new();
        for (name, channel) in &self.channels {
            match channel.start().await {
                Ok(s) => {
                    tracing::info!(channel = %name, "Channel started");
                    streams.push(s);
                }
                Err(e) => tracing::error!(channel = %name, "Channel failed to start: {e}"),
            }
        }

        if streams.is_empty() {
            return Err(ChannelError::StartupFailed {
                name: "all".into(),
                reason: "no channel could be started".into(),
            });
        }

        Ok(Box::pin(stream::select_all(streams)))
    }

    pub async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let channel = self
            .channels
            .get(&msg.channel)
            .ok_or_else(|| ChannelError::UnknownChannel(msg.channel.clone()))?;
        channel.respond(msg, response).await
    }

    pub async fn send_status(
        &self,
        msg: &IncomingMessage,
        status: StatusUpdate,
    ) -> Result<(), ChannelError> {
        let channel = self
            .channels
            .get(&msg.channel)
            .ok_or_else(|| ChannelError::UnknownChannel(msg.channel.clone()))?;
        channel.send_status(status, &msg.metadata).await
    }

    /// Health of every channel, by name.
    pub async fn health_check_all(&self) -> HashMap<String, Result<(), ChannelError>> {
        let mut results = HashMap::new();
        for (name, channel) in &self.channels {
            results.insert(name.clone(), channel.health_check().await);
        }
        results
    }

    pub async fn shutdown_all(&self) {
        for (name, channel) in &self.channels {
            if let Err(e) = channel.shutdown().await {
                tracing::warn!(channel = %name, "Channel shutdown failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures::StreamExt;

    use super::*;

    struct FixedChannel {
        name: &'static str,
        inbox: Vec<&'static str>,
        sent: Mutex<Vec<String>>,
    }

    impl FixedChannel {
        fn new(name: &'static str, inbox: Vec<&'static str>) -> Self {
            Self {
                name,
                inbox,
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Channel for FixedChannel {
        fn name(&self) -> &str {
            self.name
        }

        async fn start(&self) -> Result<MessageStream, ChannelError> {
            let name = self.name;
            let msgs: Vec<IncomingMessage> = self
                .inbox
                .iter()
                .map(|t| IncomingMessage::new(name, "u1", t))
                .collect();
            Ok(Box::pin(stream::iter(msgs)))
        }

        async fn respond(
            &self,
            _msg: &IncomingMessage,
            response: OutgoingResponse,
        ) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push(response.content);
            Ok(())
        }

        async fn health_check(&self) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn merges_streams_from_all_channels() {
        let mut manager = ChannelManager::new();
        manager.add(Arc::new(FixedChannel::new("a", vec!["1", "2"])));
        manager.add(Arc::new(FixedChannel::new("b", vec!["3"])));

        let stream = manager.start_all().await.unwrap();
        let msgs: Vec<IncomingMessage> = stream.collect().await;
        assert_eq!(msgs.len(), 3);
        assert_eq!(manager.names(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn respond_routes_to_origin_channel() {
        let a = Arc::new(FixedChannel::new("a", vec![]));
        let b = Arc::new(FixedChannel::new("b", vec![]));
        let mut manager = ChannelManager::new();
        manager.add(a.clone());
        manager.add(b.clone());

        let msg = IncomingMessage::new("b", "u1", "hi");
        manager
            .respond(&msg, OutgoingResponse::text("reply"))
            .await
            .unwrap();

        assert!(a.sent.lock().unwrap().is_empty());
        assert_eq!(*b.sent.lock().unwrap(), vec!["reply".to_string()]);
    }

    #[tokio::test]
    async fn respond_unknown_channel_errors() {
        let manager = ChannelManager::new();
        let msg = IncomingMessage::new("nope", "u1", "hi");
        let err = manager
            .respond(&msg, OutgoingResponse::text("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::UnknownChannel(_)));
    }

    #[tokio::test]
    async fn start_all_without_channels_fails() {
        let manager = ChannelManager::new();
        assert!(manager.start_all().await.is_err());
    }
}
