//! Dispatcher: reads every channel, feeds each user's events to that user's
//! worker in arrival order, and runs the background maintenance tasks.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::channels::{ChannelManager, IncomingMessage, StatusUpdate};
use crate::error::ChannelError;
use crate::export::{Exporter, spawn_reconcile_task};
use crate::wizard::WizardManager;

const DEFAULT_PRUNE_INTERVAL: Duration = Duration::from_secs(600);

struct Worker {
    tx: mpsc::UnboundedSender<IncomingMessage>,
    handle: JoinHandle<()>,
}

pub struct Dispatcher {
    channels: Arc<ChannelManager>,
    wizard: Arc<WizardManager>,
    exporter: Option<Arc<Exporter>>,
    session_idle: Duration,
    prune_interval: Duration,
    reconcile_interval: Duration,
    workers: HashMap<String, Worker>,
}

impl Dispatcher {
    pub fn new(channels: Arc<ChannelManager>, wizard: Arc<WizardManager>) -> Self {
        Self {
            channels,
            wizard,
            exporter: None,
            session_idle: Duration::from_secs(3600),
            prune_interval: DEFAULT_PRUNE_INTERVAL,
            reconcile_interval: Duration::from_secs(300),
            workers: HashMap::new(),
        }
    }

    /// Run periodic reconciliation with this exporter.
    pub fn with_exporter(mut self, exporter: Arc<Exporter>, interval: Duration) -> Self {
        self.exporter = Some(exporter);
        self.reconcile_interval = interval;
        self
    }

    pub fn with_session_idle(mut self, idle: Duration) -> Self {
        self.session_idle = idle;
        self.prune_interval = DEFAULT_PRUNE_INTERVAL.min(idle);
        self
    }

    /// Run until Ctrl+C or until every channel stream ends.
    pub async fn run(self) -> Result<(), ChannelError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
            tracing::info!("Ctrl+C received, shutting down...");
        })
        .await
    }

    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), ChannelError>
    where
        F: Future<Output = ()>,
    {
        let mut message_stream = self.channels.start_all().await?;

        let wizard = Arc::clone(&self.wizard);
        let idle = self.session_idle;
        let prune_interval = self.prune_interval;
        let pruning_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(prune_interval);
            interval.tick().await; // Skip immediate first tick
            loop {
                interval.tick().await;
                wizard.prune_idle(idle).await;
            }
        });

        let reconcile_handle = self
            .exporter
            .as_ref()
            .map(|exporter| spawn_reconcile_task(Arc::clone(exporter), self.reconcile_interval));

        tracing::info!(channels = ?self.channels.names(), "Bot ready and listening");

        tokio::pin!(shutdown);
        loop {
            let message = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                msg = message_stream.next() => match msg {
                    Some(m) => m,
                    None => {
                        tracing::info!("All channel streams ended, shutting down...");
                        break;
                    }
                },
            };
            self.dispatch(message);
        }

        pruning_handle.abort();
        if let Some(handle) = reconcile_handle {
            handle.abort();
        }

        // Let queued events finish before the channels go away.
        let workers: Vec<Worker> = self.workers.drain().map(|(_, w)| w).collect();
        for worker in workers {
            drop(worker.tx);
            if let Err(e) = worker.handle.await {
                tracing::error!("User worker panicked: {e}");
            }
        }

        self.channels.shutdown_all().await;
        tracing::info!(sessions = self.wizard.active_sessions().await, "Bot stopped");
        Ok(())
    }

    /// Queue the message on its user's worker, starting one if needed.
    fn dispatch(&mut self, message: IncomingMessage) {
        tracing::debug!(
            channel = %message.channel,
            user_id = %message.user_id,
            kind = message.kind(),
            "Incoming message"
        );

        self.workers.retain(|_, w| !w.handle.is_finished());

        let mut previous = None;
        let message = match self.workers.get(&message.user_id) {
            Some(worker) => match worker.tx.send(message) {
                Ok(()) => return,
                Err(mpsc::error::SendError(message)) => {
                    previous = self.workers.remove(&message.user_id).map(|w| w.handle);
                    message
                }
            },
            None => message,
        };

        let user_id = message.user_id.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(user_worker(
            rx,
            Arc::clone(&self.channels),
            Arc::clone(&self.wizard),
            self.session_idle,
            previous,
        ));
        // A fresh receiver is open, so this send cannot fail.
        let _ = tx.send(message);
        self.workers.insert(user_id, Worker { tx, handle });
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

/// Handles one user's events strictly in order.
///
/// Exits after `idle` without events. Events queued before the exit are
/// still handled; later ones go to a new worker, which waits for this one
/// to finish first.
async fn user_worker(
    mut rx: mpsc::UnboundedReceiver<IncomingMessage>,
    channels: Arc<ChannelManager>,
    wizard: Arc<WizardManager>,
    idle: Duration,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous
        && let Err(e) = previous.await
    {
        tracing::error!("User worker panicked: {e}");
    }

    loop {
        let message = match tokio::time::timeout(idle, rx.recv()).await {
            Ok(Some(message)) => message,
            Ok(None) => break,
            Err(_) => {
                rx.close();
                continue;
            }
        };

        let _ = channels.send_status(&message, StatusUpdate::Typing).await;

        for response in wizard.handle_message(&message).await {
            if let Err(e) = channels.respond(&message, response).await {
                tracing::error!(
                    channel = %message.channel,
                    user_id = %message.user_id,
                    "Failed to send reply: {e}"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures::stream;

    use super::*;
    use crate::attachments::{AttachmentFetcher, AttachmentRef, AttachmentStore};
    use crate::channels::{Channel, MessageStream, OutgoingResponse};
    use crate::error::AttachmentError;
    use crate::store::{Database, LibSqlBackend};

    struct NoFetch;

    #[async_trait]
    impl AttachmentFetcher for NoFetch {
        async fn fetch(&self, a: &AttachmentRef) -> Result<Vec<u8>, AttachmentError> {
            Err(AttachmentError::Resolve {
                file_id: a.file_id.clone(),
                reason: "offline".into(),
            })
        }
    }

    /// Replays a fixed script of (user, text) pairs and records replies.
    struct ScriptChannel {
        script: Vec<(&'static str, &'static str)>,
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Channel for ScriptChannel {
        fn name(&self) -> &str {
            "script"
        }

        async fn start(&self) -> Result<MessageStream, ChannelError> {
            let msgs: Vec<IncomingMessage> = self
                .script
                .iter()
                .map(|(user, text)| IncomingMessage::new("script", user, text))
                .collect();
            Ok(Box::pin(stream::iter(msgs)))
        }

        async fn respond(
            &self,
            msg: &IncomingMessage,
            response: OutgoingResponse,
        ) -> Result<(), ChannelError> {
            self.sent
                .lock()
                .unwrap()
                .push((msg.user_id.clone(), response.content));
            Ok(())
        }

        async fn health_check(&self) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    async fn setup(
        script: Vec<(&'static str, &'static str)>,
    ) -> (Dispatcher, Arc<ScriptChannel>, Arc<LibSqlBackend>, tempfile::TempDir) {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let dir = tempfile::tempdir().unwrap();
        let wizard = Arc::new(WizardManager::new(
            db.clone(),
            Arc::new(NoFetch),
            AttachmentStore::new(dir.path()),
        ));
        let channel = Arc::new(ScriptChannel {
            script,
            sent: Mutex::new(Vec::new()),
        });
        let mut channels = ChannelManager::new();
        channels.add(channel.clone());
        (
            Dispatcher::new(Arc::new(channels), wizard),
            channel,
            db,
            dir,
        )
    }

    #[tokio::test]
    async fn processes_each_users_events_in_order() {
        let (dispatcher, channel, db, _dir) = setup(vec![
            ("u1", "/form"),
            ("u2", "/form"),
            ("u1", "Иванов"),
            ("u2", "Петров"),
        ])
        .await;

        // Text at the section menu is answered with the menu again.
        dispatcher
            .run_until(std::future::pending())
            .await
            .unwrap();

        assert!(db.get_latest("u1").await.unwrap().is_none());

        let sent = channel.sent.lock().unwrap();
        let u1: Vec<&String> = sent.iter().filter(|(u, _)| u == "u1").map(|(_, c)| c).collect();
        assert_eq!(u1.len(), 2);
        assert!(u1[0].contains("Выберите раздел"));
        assert!(u1[1].starts_with("Выберите раздел с помощью кнопок"));
        assert_eq!(sent.iter().filter(|(u, _)| u == "u2").count(), 2);
    }

    #[tokio::test]
    async fn one_worker_per_user() {
        let (mut dispatcher, _channel, _db, _dir) = setup(vec![]).await;
        dispatcher.dispatch(IncomingMessage::new("script", "u1", "/help"));
        dispatcher.dispatch(IncomingMessage::new("script", "u1", "/help"));
        dispatcher.dispatch(IncomingMessage::new("script", "u2", "/help"));
        assert_eq!(dispatcher.worker_count(), 2);
    }

    #[tokio::test]
    async fn idle_workers_exit_and_are_released() {
        let (dispatcher, channel, _db, _dir) = setup(vec![]).await;
        let mut dispatcher = dispatcher.with_session_idle(Duration::from_millis(50));
        dispatcher.dispatch(IncomingMessage::new("script", "u1", "/help"));
        dispatcher.dispatch(IncomingMessage::new("script", "u2", "/help"));
        assert_eq!(dispatcher.worker_count(), 2);

        tokio::time::sleep(Duration::from_millis(300)).await;
        dispatcher.dispatch(IncomingMessage::new("script", "u3", "/help"));
        assert_eq!(dispatcher.worker_count(), 1);

        // A returning user gets a fresh worker.
        dispatcher.dispatch(IncomingMessage::new("script", "u1", "/help"));
        assert_eq!(dispatcher.worker_count(), 2);

        tokio::time::sleep(Duration::from_millis(300)).await;
        let sent = channel.sent.lock().unwrap();
        let replies = |user: &str| sent.iter().filter(|(u, _)| u == user).count();
        assert!(replies("u2") > 0);
        assert_eq!(replies("u1"), 2 * replies("u2"));
        assert_eq!(replies("u3"), replies("u2"));
    }

    #[tokio::test]
    async fn closed_worker_is_replaced_in_order() {
        let (mut dispatcher, channel, _db, _dir) = setup(vec![]).await;
        dispatcher.dispatch(IncomingMessage::new("script", "u1", "/help"));
        // The worker stops accepting events but has not finished yet.
        let closed = mpsc::unbounded_channel().0;
        if let Some(worker) = dispatcher.workers.get_mut("u1") {
            worker.tx = closed;
        }
        dispatcher.dispatch(IncomingMessage::new("script", "u1", "/help"));
        assert_eq!(dispatcher.worker_count(), 1);

        let workers: Vec<Worker> = dispatcher.workers.drain().map(|(_, w)| w).collect();
        for worker in workers {
            drop(worker.tx);
            worker.handle.await.unwrap();
        }
        let sent = channel.sent.lock().unwrap();
        assert!(sent.iter().all(|(u, _)| u == "u1"));
        assert!(!sent.is_empty());
    }

    #[tokio::test]
    async fn shutdown_future_stops_the_loop() {
        let (dispatcher, _channel, _db, _dir) = setup(vec![("u1", "/start")]).await;
        dispatcher.run_until(async {}).await.unwrap();
    }
}
