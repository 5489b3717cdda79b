//! `Database` trait: the async interface the wizard and exporter persist through.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::form::FormRecord;

/// A persisted form row.
#[derive(Debug, Clone, Serialize)]
pub struct StoredForm {
    pub id: Uuid,
    pub user_id: String,
    pub record: FormRecord,
    pub filled_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub exported: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredForm {
    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }
}

/// Backend-agnostic store for questionnaire records.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// Write the user's record.
    ///
    /// Updates the user's latest row if it has not been exported yet,
    /// otherwise inserts a fresh row. Returns the row id.
    async fn upsert(&self, user_id: &str, record: &FormRecord) -> Result<Uuid, DatabaseError>;

    /// The most recent row for a user.
    async fn get_latest(&self, user_id: &str) -> Result<Option<StoredForm>, DatabaseError>;

    /// Fetch a row by id.
    async fn get_by_id(&self, id: Uuid) -> Result<Option<StoredForm>, DatabaseError>;

    /// Record that the user confirmed the form.
    async fn mark_submitted(&self, id: Uuid) -> Result<(), DatabaseError>;

    /// Record that the row reached the spreadsheet. Never cleared.
    async fn mark_exported(&self, id: Uuid) -> Result<(), DatabaseError>;

    /// Submitted rows not yet exported, oldest `updated_at` first.
    async fn list_unexported(&self) -> Result<Vec<StoredForm>, DatabaseError>;
}
