//! Wizard manager: runs one user event through the state machine.
//!
//! Owns the in-memory sessions and does all I/O around the pure
//! transition function: attachment download, persistence with one retry,
//! export on confirm and reply rendering. Errors never escape `handle`;
//! they become notices to the user.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::attachments::{AttachmentFetcher, AttachmentRef, AttachmentStore};
use crate::channels::{IncomingMessage, MessagePayload, OutgoingResponse};
use crate::error::{AttachmentError, DatabaseError, WizardError};
use crate::export::Exporter;
use crate::form::{FileField, FileRef, FormRecord, ProgressLayout};
use crate::store::Database;

use super::graph;
use super::input::{CANCEL, MY_FORM, MenuAction, START_FORM, StepInput};
use super::machine::{self, Outcome, Rejection};
use super::prompts;
use super::session::WizardSession;
use super::step::{Step, StepKind};

type SessionSlot = Arc<Mutex<WizardSession>>;

/// Commands accepted at any point of the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Help,
    Form,
    MyForm,
    Cancel,
}

impl Command {
    /// Slash commands (with optional `@bot` suffix or arguments) and the
    /// main keyboard buttons.
    fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        match text {
            START_FORM => return Some(Self::Form),
            MY_FORM => return Some(Self::MyForm),
            CANCEL => return Some(Self::Cancel),
            _ => {}
        }
        let word = text.split_whitespace().next()?;
        let word = word.split('@').next().unwrap_or(word);
        match word {
            "/start" => Some(Self::Start),
            "/help" => Some(Self::Help),
            "/form" => Some(Self::Form),
            "/myform" => Some(Self::MyForm),
            "/cancel" => Some(Self::Cancel),
            _ => None,
        }
    }
}

pub struct WizardManager {
    db: Arc<dyn Database>,
    fetcher: Arc<dyn AttachmentFetcher>,
    attachments: AttachmentStore,
    exporter: Option<Arc<Exporter>>,
    layout: ProgressLayout,
    sessions: RwLock<HashMap<String, SessionSlot>>,
}

impl WizardManager {
    pub fn new(
        db: Arc<dyn Database>,
        fetcher: Arc<dyn AttachmentFetcher>,
        attachments: AttachmentStore,
    ) -> Self {
        Self {
            db,
            fetcher,
            attachments,
            exporter: None,
            layout: ProgressLayout::default(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_exporter(mut self, exporter: Arc<Exporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn with_layout(mut self, layout: ProgressLayout) -> Self {
        self.layout = layout;
        self
    }

    pub async fn handle_message(&self, msg: &IncomingMessage) -> Vec<OutgoingResponse> {
        self.handle(&msg.user_id, &msg.payload).await
    }

    /// Process one event for `user_id` and return the replies to send.
    pub async fn handle(&self, user_id: &str, payload: &MessagePayload) -> Vec<OutgoingResponse> {
        match payload {
            MessagePayload::Text(text) => match Command::parse(text) {
                Some(command) => self.command(user_id, command).await,
                None => self.step_input(user_id, StepInput::from_text(text)).await,
            },
            MessagePayload::Attachment(attachment) => self.attachment(user_id, attachment).await,
            MessagePayload::Callback(token) => match MenuAction::parse(token) {
                Some(action) => self.menu_action(user_id, action).await,
                None => {
                    tracing::debug!(user_id, token = %token, "Unknown callback token");
                    vec![OutgoingResponse::text(prompts::rejection_text(
                        Rejection::UseMenu,
                    ))]
                }
            },
        }
    }

    // ── Commands ────────────────────────────────────────────────────

    async fn command(&self, user_id: &str, command: Command) -> Vec<OutgoingResponse> {
        tracing::debug!(user_id, ?command, "Command");
        match command {
            Command::Start => vec![prompts::welcome()],
            Command::Help => vec![prompts::help()],
            Command::Form => self.start_form(user_id).await,
            Command::MyForm => self.my_form(user_id).await,
            Command::Cancel => self.cancel(user_id).await,
        }
    }

    /// Fresh session at the section menu holding the latest persisted record.
    async fn start_form(&self, user_id: &str) -> Vec<OutgoingResponse> {
        let record = match self.load_record(user_id).await {
            Ok(record) => record,
            Err(_) => return vec![prompts::load_failed()],
        };
        let resumed = record.is_some();
        let session = WizardSession::resume(record.unwrap_or_default());
        let reply = prompts::section_menu(
            &session.record,
            self.layout,
            prompts::start_heading(resumed),
        );
        self.sessions
            .write()
            .await
            .insert(user_id.to_string(), Arc::new(Mutex::new(session)));

        tracing::info!(user_id, resumed, "Wizard started");
        vec![reply]
    }

    async fn my_form(&self, user_id: &str) -> Vec<OutgoingResponse> {
        let record = match self.session(user_id).await {
            Some(slot) => Some(slot.lock().await.record.clone()),
            None => match self.load_record(user_id).await {
                Ok(record) => record,
                Err(_) => return vec![prompts::load_failed()],
            },
        };
        match record {
            Some(record) if !record.is_empty() => vec![prompts::my_form(&record, self.layout)],
            _ => vec![prompts::no_form()],
        }
    }

    /// Drop the session. Unsaved answers are flushed first so the record
    /// stays persisted.
    async fn cancel(&self, user_id: &str) -> Vec<OutgoingResponse> {
        if let Some(slot) = self.session(user_id).await {
            let mut session = slot.lock().await;
            if session.dirty
                && let Err(e) = self.persist(user_id, &mut session).await
            {
                tracing::warn!(user_id, "Unsaved answers lost on cancel: {e}");
            }
            self.sessions.write().await.remove(user_id);
            tracing::info!(user_id, step = %session.step, "Wizard cancelled");
        }
        vec![prompts::cancelled()]
    }

    // ── Menu ────────────────────────────────────────────────────────

    async fn menu_action(&self, user_id: &str, action: MenuAction) -> Vec<OutgoingResponse> {
        let slot = match self.session_or_resume(user_id).await {
            Ok(slot) => slot,
            Err(reply) => return vec![reply],
        };
        let mut session = slot.lock().await;
        let mut replies = Vec::new();

        match action {
            MenuAction::Open(section) => {
                self.refresh_before_edit(user_id, &mut session, &mut replies)
                    .await;
                let outcome = machine::select_section(&session, section).apply(&mut session);
                match outcome {
                    Outcome::Rejected(r) => replies.push(prompts::rejected(r, session.step)),
                    _ => {
                        tracing::debug!(user_id, %section, "Section opened");
                        replies.push(prompts::section_intro(section));
                    }
                }
            }
            MenuAction::Finish => {
                if session.dirty
                    && self.persist(user_id, &mut session).await.is_err()
                {
                    replies.push(prompts::persist_failed());
                }
                match machine::finish(&session).apply(&mut session) {
                    Outcome::Rejected(r) => replies.push(prompts::rejected(r, session.step)),
                    _ => replies.push(prompts::review(&session.record)),
                }
            }
        }
        replies
    }

    /// Before editing a section: flush a dirty session, otherwise pick up
    /// the persisted record so edits never overwrite newer stored answers.
    async fn refresh_before_edit(
        &self,
        user_id: &str,
        session: &mut WizardSession,
        replies: &mut Vec<OutgoingResponse>,
    ) {
        if session.dirty {
            if self.persist(user_id, session).await.is_err() {
                replies.push(prompts::persist_failed());
            }
            return;
        }
        match self.db.get_latest(user_id).await {
            Ok(Some(stored)) => session.record = stored.record,
            Ok(None) => {}
            Err(e) => tracing::warn!(user_id, "Re-read before edit failed: {e}"),
        }
    }

    // ── Question steps ──────────────────────────────────────────────

    async fn attachment(&self, user_id: &str, attachment: &AttachmentRef) -> Vec<OutgoingResponse> {
        let Some(slot) = self.session(user_id).await else {
            return vec![prompts::not_started()];
        };
        let mut session = slot.lock().await;

        let input = match graph::lookup(session.step).map(|row| row.kind) {
            Some(StepKind::File(field)) => {
                match self.store_attachment(user_id, field, attachment).await {
                    Ok(file) => StepInput::File(file),
                    Err(e) => {
                        tracing::warn!(
                            user_id,
                            step = %session.step,
                            file_id = %attachment.file_id,
                            "Attachment fetch failed: {e}"
                        );
                        return vec![prompts::attachment_failed(session.step)];
                    }
                }
            }
            // Not an attachment step: let the machine reject it without
            // downloading anything.
            _ => StepInput::File(FileRef(attachment.file_id.clone())),
        };

        self.advance(user_id, &mut session, input).await
    }

    async fn store_attachment(
        &self,
        user_id: &str,
        field: FileField,
        attachment: &AttachmentRef,
    ) -> Result<FileRef, AttachmentError> {
        let bytes = self.fetcher.fetch(attachment).await?;
        self.attachments
            .save(user_id, field, attachment, &bytes)
            .await
    }

    async fn step_input(&self, user_id: &str, input: StepInput) -> Vec<OutgoingResponse> {
        let Some(slot) = self.session(user_id).await else {
            return vec![prompts::not_started()];
        };
        let mut session = slot.lock().await;
        self.advance(user_id, &mut session, input).await
    }

    /// Run one transition, persist, and render the replies.
    async fn advance(
        &self,
        user_id: &str,
        session: &mut WizardSession,
        input: StepInput,
    ) -> Vec<OutgoingResponse> {
        let from = session.step;
        let outcome = machine::next(session, &input).apply(session);
        tracing::debug!(user_id, from = %from, to = %session.step, ?outcome, "Wizard transition");

        match outcome {
            Outcome::Rejected(Rejection::NotStarted) => vec![prompts::not_started()],
            Outcome::Rejected(Rejection::UseMenu) => vec![prompts::section_menu(
                &session.record,
                self.layout,
                prompts::rejection_text(Rejection::UseMenu),
            )],
            Outcome::Rejected(r) => vec![prompts::rejected(r, session.step)],
            Outcome::Advanced | Outcome::Skipped => {
                let mut replies = Vec::new();
                if session.dirty && self.persist(user_id, session).await.is_err() {
                    replies.push(prompts::persist_failed());
                }
                replies.push(self.after_step(session, from, outcome));
                replies
            }
            Outcome::Moved => vec![self.after_step(session, from, outcome)],
            Outcome::Submit => self.submit(user_id, session).await,
            Outcome::Cancelled => {
                self.sessions.write().await.remove(user_id);
                tracing::info!(user_id, "Wizard cancelled from review");
                vec![prompts::cancelled()]
            }
        }
    }

    /// Reply for the step the session just landed on.
    fn after_step(&self, session: &WizardSession, from: Step, outcome: Outcome) -> OutgoingResponse {
        match session.step {
            Step::SectionMenu => match (outcome, graph::section_of(from)) {
                (Outcome::Advanced | Outcome::Skipped, Some(section)) => {
                    prompts::section_done(&session.record, self.layout, section)
                }
                _ => prompts::section_menu(&session.record, self.layout, ""),
            },
            Step::FinalReview => prompts::review(&session.record),
            Step::Idle => prompts::not_started(),
            step if outcome == Outcome::Skipped => prompts::ask_after_skip(step),
            step => {
                let entered = graph::section_of(step);
                if entered != graph::section_of(from)
                    && let Some(section) = entered
                    && graph::first_step(section) == step
                {
                    prompts::section_intro(section)
                } else {
                    prompts::ask(step)
                }
            }
        }
    }

    /// Confirmed review: persist, flag submitted, export, drop the session.
    /// Export failures are left to reconciliation.
    async fn submit(&self, user_id: &str, session: &mut WizardSession) -> Vec<OutgoingResponse> {
        let id = match self.persist(user_id, session).await {
            Ok(id) => id,
            Err(_) => return vec![prompts::submit_failed()],
        };
        if let Err(e) = self.mark_submitted(id).await {
            tracing::error!(user_id, form_id = %id, "Failed to mark form submitted: {e}");
            return vec![prompts::submit_failed()];
        }
        tracing::info!(user_id, form_id = %id, "Form submitted");

        if let Some(exporter) = &self.exporter {
            match self.db.get_by_id(id).await {
                Ok(Some(stored)) => {
                    if let Err(e) = exporter.export(&stored).await {
                        tracing::warn!(
                            form_id = %id,
                            "Export deferred to reconciliation: {e}"
                        );
                    }
                }
                Ok(None) => tracing::warn!(form_id = %id, "Submitted form vanished before export"),
                Err(e) => tracing::warn!(form_id = %id, "Export deferred to reconciliation: {e}"),
            }
        }

        let reply = prompts::submitted(&session.record, self.layout);
        self.sessions.write().await.remove(user_id);
        vec![reply]
    }

    // ── Persistence ─────────────────────────────────────────────────

    /// Upsert the session record, retrying once. Clears `dirty` on success;
    /// on failure the session keeps its answers for the next attempt.
    async fn persist(&self, user_id: &str, session: &mut WizardSession) -> Result<Uuid, WizardError> {
        let first = match self.db.upsert(user_id, &session.record).await {
            Ok(id) => {
                session.dirty = false;
                return Ok(id);
            }
            Err(e) => e,
        };
        tracing::warn!(user_id, "Persist failed, retrying once: {first}");

        match self.db.upsert(user_id, &session.record).await {
            Ok(id) => {
                session.dirty = false;
                Ok(id)
            }
            Err(source) => {
                tracing::error!(user_id, "Persist failed after retry: {source}");
                Err(WizardError::PersistFailed {
                    user_id: user_id.to_string(),
                    source,
                })
            }
        }
    }

    async fn mark_submitted(&self, id: Uuid) -> Result<(), DatabaseError> {
        match self.db.mark_submitted(id).await {
            Ok(()) => Ok(()),
            Err(first) => {
                tracing::warn!(form_id = %id, "mark_submitted failed, retrying once: {first}");
                self.db.mark_submitted(id).await
            }
        }
    }

    async fn load_record(&self, user_id: &str) -> Result<Option<FormRecord>, WizardError> {
        self.db
            .get_latest(user_id)
            .await
            .map(|stored| stored.map(|s| s.record))
            .map_err(|source| {
                tracing::error!(user_id, "Failed to load form: {source}");
                WizardError::PersistFailed {
                    user_id: user_id.to_string(),
                    source,
                }
            })
    }

    // ── Sessions ────────────────────────────────────────────────────

    async fn session(&self, user_id: &str) -> Option<SessionSlot> {
        self.sessions.read().await.get(user_id).cloned()
    }

    /// Menu buttons outlive sessions (restarts, pruning). Pressing one
    /// resumes from the persisted record.
    async fn session_or_resume(&self, user_id: &str) -> Result<SessionSlot, OutgoingResponse> {
        if let Some(slot) = self.session(user_id).await {
            return Ok(slot);
        }
        let record = self
            .load_record(user_id)
            .await
            .map_err(|_| prompts::load_failed())?;
        let slot = Arc::new(Mutex::new(WizardSession::resume(record.unwrap_or_default())));
        let mut sessions = self.sessions.write().await;
        Ok(sessions
            .entry(user_id.to_string())
            .or_insert(slot)
            .clone())
    }

    /// Copy of a user's session, if one is active.
    pub async fn session_snapshot(&self, user_id: &str) -> Option<WizardSession> {
        let slot = self.session(user_id).await?;
        let session = slot.lock().await;
        Some(session.clone())
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions idle for longer than `timeout`, flushing unsaved
    /// answers first. Sessions busy with an event are left alone.
    pub async fn prune_idle(&self, timeout: Duration) -> usize {
        let now = Utc::now();
        let candidates: Vec<(String, SessionSlot)> = {
            let sessions = self.sessions.read().await;
            sessions
                .iter()
                .filter(|(_, slot)| {
                    slot.try_lock()
                        .map(|s| s.is_idle(now, timeout))
                        .unwrap_or(false)
                })
                .map(|(user, slot)| (user.clone(), slot.clone()))
                .collect()
        };

        let mut pruned = 0;
        for (user_id, slot) in candidates {
            let mut session = slot.lock().await;
            if !session.is_idle(now, timeout) {
                continue;
            }
            if session.dirty
                && let Err(e) = self.persist(&user_id, &mut session).await
            {
                tracing::warn!(user_id = %user_id, "Keeping idle session with unsaved answers: {e}");
                continue;
            }
            self.sessions.write().await.remove(&user_id);
            pruned += 1;
        }

        if pruned > 0 {
            tracing::info!(pruned, "Idle sessions pruned");
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::form::TextField;
    use crate::store::{LibSqlBackend, StoredForm};
    use crate::wizard::input::{SKIP, YES};

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

    async fn manager() -> (WizardManager, Arc<LibSqlBackend>, tempfile::TempDir) {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let dir = tempfile::tempdir().unwrap();
        let manager =
            WizardManager::new(db.clone(), Arc::new(NoFetch), AttachmentStore::new(dir.path()));
        (manager, db, dir)
    }

    /// Store whose next `upsert_failures` upserts fail.
    struct FlakyDb {
        inner: LibSqlBackend,
        upsert_failures: AtomicUsize,
    }

    #[async_trait]
    impl Database for FlakyDb {
        async fn run_migrations(&self) -> Result<(), DatabaseError> {
            self.inner.run_migrations().await
        }

        async fn upsert(&self, user_id: &str, record: &FormRecord) -> Result<Uuid, DatabaseError> {
            let failing = self
                .upsert_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(DatabaseError::Query("database is locked".into()));
            }
            self.inner.upsert(user_id, record).await
        }

        async fn get_latest(&self, user_id: &str) -> Result<Option<StoredForm>, DatabaseError> {
            self.inner.get_latest(user_id).await
        }

        async fn get_by_id(&self, id: Uuid) -> Result<Option<StoredForm>, DatabaseError> {
            self.inner.get_by_id(id).await
        }

        async fn mark_submitted(&self, id: Uuid) -> Result<(), DatabaseError> {
            self.inner.mark_submitted(id).await
        }

        async fn mark_exported(&self, id: Uuid) -> Result<(), DatabaseError> {
            self.inner.mark_exported(id).await
        }

        async fn list_unexported(&self) -> Result<Vec<StoredForm>, DatabaseError> {
            self.inner.list_unexported().await
        }
    }

    async fn flaky_manager() -> (WizardManager, Arc<FlakyDb>, tempfile::TempDir) {
        let db = Arc::new(FlakyDb {
            inner: LibSqlBackend::new_memory().await.unwrap(),
            upsert_failures: AtomicUsize::new(0),
        });
        let dir = tempfile::tempdir().unwrap();
        let manager =
            WizardManager::new(db.clone(), Arc::new(NoFetch), AttachmentStore::new(dir.path()));
        (manager, db, dir)
    }

    fn has_persist_notice(replies: &[OutgoingResponse]) -> bool {
        let notice = prompts::persist_failed().content;
        replies.iter().any(|r| r.content == notice)
    }

    fn text(s: &str) -> MessagePayload {
        MessagePayload::Text(s.to_string())
    }

    fn callback(s: &str) -> MessagePayload {
        MessagePayload::Callback(s.to_string())
    }

    #[test]
    fn command_parsing() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/start promo"), Some(Command::Start));
        assert_eq!(Command::parse("/cancel@anketa_bot"), Some(Command::Cancel));
        assert_eq!(Command::parse(START_FORM), Some(Command::Form));
        assert_eq!(Command::parse(MY_FORM), Some(Command::MyForm));
        assert_eq!(Command::parse("Иванов"), None);
    }

    #[tokio::test]
    async fn input_before_start_is_refused() {
        let (manager, _db, _dir) = manager().await;
        let replies = manager.handle("u1", &text("Иванов")).await;
        assert_eq!(replies.len(), 1);
        assert!(replies[0].content.contains("Начать заполнение"));
        assert_eq!(manager.active_sessions().await, 0);
    }

    #[tokio::test]
    async fn answers_persist_after_each_step() {
        let (manager, db, _dir) = manager().await;
        manager.handle("u1", &text("/form")).await;
        manager.handle("u1", &callback("section:personal")).await;
        let replies = manager.handle("u1", &text("Иванов")).await;
        assert_eq!(replies.last().unwrap().content, prompts::question(Step::Name));

        let stored = db.get_latest("u1").await.unwrap().unwrap();
        assert_eq!(stored.record.text(TextField::Surname), Some("Иванов"));
        assert!(!manager.session_snapshot("u1").await.unwrap().dirty);
    }

    #[tokio::test]
    async fn single_store_failure_is_retried_silently() {
        let (manager, db, _dir) = flaky_manager().await;
        manager.handle("u1", &text("/form")).await;
        manager.handle("u1", &callback("section:personal")).await;

        db.upsert_failures.store(1, Ordering::SeqCst);
        let replies = manager.handle("u1", &text("Иванов")).await;
        assert!(!has_persist_notice(&replies));
        assert_eq!(replies.last().unwrap().content, prompts::question(Step::Name));

        let stored = db.get_latest("u1").await.unwrap().unwrap();
        assert_eq!(stored.record.text(TextField::Surname), Some("Иванов"));
        assert!(!manager.session_snapshot("u1").await.unwrap().dirty);
    }

    #[tokio::test]
    async fn failed_persist_keeps_answer_until_next_step() {
        let (manager, db, _dir) = flaky_manager().await;
        manager.handle("u1", &text("/form")).await;
        manager.handle("u1", &callback("section:personal")).await;

        db.upsert_failures.store(2, Ordering::SeqCst);
        let replies = manager.handle("u1", &text("Иванов")).await;
        assert!(has_persist_notice(&replies));
        assert_eq!(replies.last().unwrap().content, prompts::question(Step::Name));

        let session = manager.session_snapshot("u1").await.unwrap();
        assert!(session.dirty);
        assert_eq!(session.step, Step::Name);
        assert_eq!(session.record.text(TextField::Surname), Some("Иванов"));
        assert!(db.get_latest("u1").await.unwrap().is_none());

        let replies = manager.handle("u1", &text("Иван")).await;
        assert!(!has_persist_notice(&replies));
        let stored = db.get_latest("u1").await.unwrap().unwrap();
        assert_eq!(stored.record.text(TextField::Surname), Some("Иванов"));
        assert_eq!(stored.record.text(TextField::Name), Some("Иван"));
        assert!(!manager.session_snapshot("u1").await.unwrap().dirty);
    }

    #[tokio::test]
    async fn skip_reply_is_acknowledged() {
        let (manager, _db, _dir) = manager().await;
        manager.handle("u1", &text("/form")).await;
        manager.handle("u1", &callback("section:contacts")).await;
        let replies = manager.handle("u1", &text(SKIP)).await;
        assert!(replies[0].content.starts_with("Пропущено."));
    }

    #[tokio::test]
    async fn attachment_fetch_failure_reprompts() {
        let (manager, db, _dir) = manager().await;
        manager.handle("u1", &text("/form")).await;
        manager.handle("u1", &callback("section:passport")).await;
        {
            let slot = manager.session("u1").await.unwrap();
            slot.lock().await.step = Step::PassportPhoto;
        }
        let replies = manager
            .handle(
                "u1",
                &MessagePayload::Attachment(AttachmentRef::photo("telegram", "f1")),
            )
            .await;
        assert!(replies[0].content.contains("Не удалось загрузить файл"));
        assert_eq!(
            manager.session_snapshot("u1").await.unwrap().step,
            Step::PassportPhoto
        );
        assert!(db.get_latest("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn confirmations_refused_for_domestic_menu() {
        let (manager, _db, _dir) = manager().await;
        manager.handle("u1", &text("/form")).await;
        let replies = manager.handle("u1", &callback("section:confirmations")).await;
        assert!(replies[0].content.contains("только иностранные граждане"));
        assert_eq!(
            manager.session_snapshot("u1").await.unwrap().step,
            Step::SectionMenu
        );
    }

    #[tokio::test]
    async fn section_select_picks_up_stored_record() {
        let (manager, db, _dir) = manager().await;
        manager.handle("u1", &text("/form")).await;

        // Written elsewhere after the session was opened.
        let mut newer = FormRecord::new();
        newer.set_text(TextField::Phone, "+7 900".into());
        db.upsert("u1", &newer).await.unwrap();

        manager.handle("u1", &callback("section:personal")).await;
        let session = manager.session_snapshot("u1").await.unwrap();
        assert_eq!(session.record.text(TextField::Phone), Some("+7 900"));
    }

    #[tokio::test]
    async fn menu_button_without_session_resumes() {
        let (manager, db, _dir) = manager().await;
        let mut record = FormRecord::new();
        record.set_text(TextField::Surname, "Петров".into());
        db.upsert("u1", &record).await.unwrap();

        let replies = manager.handle("u1", &callback("section:consents")).await;
        assert!(replies[0].content.contains("Согласия"));
        let session = manager.session_snapshot("u1").await.unwrap();
        assert_eq!(session.step, Step::PersonalDataConsent);
        assert_eq!(session.record.text(TextField::Surname), Some("Петров"));

        manager.handle("u1", &text(YES)).await;
        let stored = db.get_latest("u1").await.unwrap().unwrap();
        assert_eq!(stored.record.text(TextField::Surname), Some("Петров"));
    }

    #[tokio::test]
    async fn finish_with_empty_form_is_refused() {
        let (manager, _db, _dir) = manager().await;
        manager.handle("u1", &text("/form")).await;
        let replies = manager.handle("u1", &callback("finish_form")).await;
        assert!(replies[0].content.contains("Анкета пуста"));
    }

    #[tokio::test]
    async fn prune_drops_idle_sessions() {
        let (manager, _db, _dir) = manager().await;
        manager.handle("u1", &text("/form")).await;
        manager.handle("u2", &text("/form")).await;
        {
            let slot = manager.session("u1").await.unwrap();
            slot.lock().await.last_activity = Utc::now() - chrono::Duration::hours(2);
        }
        assert_eq!(manager.prune_idle(Duration::from_secs(3600)).await, 1);
        assert!(manager.session_snapshot("u1").await.is_none());
        assert!(manager.session_snapshot("u2").await.is_some());
    }
}
