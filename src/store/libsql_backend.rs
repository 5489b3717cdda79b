//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::form::FormRecord;
use crate::store::migrations;
use crate::store::traits::{Database, StoredForm};

/// Column list shared by every SELECT, matching `row_to_form`.
const FORM_COLUMNS: &str =
    "id, user_id, form_data, filled_at, submitted_at, exported, created_at, updated_at";

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Latest row for a user, newest first by creation.
    /// Overwrite the data of a row that has not been exported yet.
    /// Returns `false` when the row is gone or already exported.
    async fn update_draft(&self, id: Uuid, form_data: &str, now: &str) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE forms SET form_data = ?1, updated_at = ?2 WHERE id = ?3 AND exported = 0",
                params![form_data, now, id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert update: {e}")))?;
        Ok(affected > 0)
    }

    async fn latest_row(&self, user_id: &str) -> Result<Option<StoredForm>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {FORM_COLUMNS} FROM forms WHERE user_id = ?1 \
                     ORDER BY created_at DESC, rowid DESC LIMIT 1"
                ),
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_latest: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_form(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_latest: {e}"))),
        }
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    // Rows imported from the old bot carry naive ISO timestamps.
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Fixed-width RFC 3339 timestamp so text ordering matches time ordering.
fn now_str() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_optional_datetime(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref().map(|s| parse_datetime(s))
}

fn row_to_form(row: &libsql::Row) -> Result<StoredForm, DatabaseError> {
    let read = |e: libsql::Error| DatabaseError::Query(format!("form row parse: {e}"));

    let id_str: String = row.get(0).map_err(read)?;
    let user_id: String = row.get(1).map_err(read)?;
    let form_data: String = row.get(2).map_err(read)?;
    let filled_str: String = row.get(3).map_err(read)?;
    let submitted_str: Option<String> = row.get(4).ok();
    let exported: i64 = row.get(5).map_err(read)?;
    let created_str: String = row.get(6).map_err(read)?;
    let updated_str: String = row.get(7).map_err(read)?;

    let id = Uuid::parse_str(&id_str)
        .map_err(|e| DatabaseError::Serialization(format!("form id '{id_str}': {e}")))?;
    let record: FormRecord = serde_json::from_str(&form_data)
        .map_err(|e| DatabaseError::Serialization(format!("form {id} data: {e}")))?;

    Ok(StoredForm {
        id,
        user_id,
        record,
        filled_at: parse_datetime(&filled_str),
        submitted_at: parse_optional_datetime(&submitted_str),
        exported: exported != 0,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

// ── Database impl ───────────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn upsert(&self, user_id: &str, record: &FormRecord) -> Result<Uuid, DatabaseError> {
        let form_data = serde_json::to_string(record)
            .map_err(|e| DatabaseError::Serialization(format!("upsert: {e}")))?;
        let now = now_str();

        // An export landing between the read and the write leaves the row
        // untouched; the answers then go to a fresh row.
        if let Some(existing) = self.latest_row(user_id).await?
            && !existing.exported
            && self.update_draft(existing.id, &form_data, &now).await?
        {
            debug!(user_id, form_id = %existing.id, "Form updated");
            return Ok(existing.id);
        }

        let id = Uuid::new_v4();
        self.conn()
            .execute(
                "INSERT INTO forms (id, user_id, form_data, filled_at, submitted_at, exported, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, NULL, 0, ?4, ?4)",
                params![id.to_string(), user_id, form_data, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert insert: {e}")))?;
        debug!(user_id, form_id = %id, "Form inserted");
        Ok(id)
    }

    async fn get_latest(&self, user_id: &str) -> Result<Option<StoredForm>, DatabaseError> {
        self.latest_row(user_id).await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<StoredForm>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {FORM_COLUMNS} FROM forms WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_by_id: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_form(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_by_id: {e}"))),
        }
    }

    async fn mark_submitted(&self, id: Uuid) -> Result<(), DatabaseError> {
        let now = now_str();
        let affected = self
            .conn()
            .execute(
                "UPDATE forms SET submitted_at = ?1, updated_at = ?1 WHERE id = ?2",
                params![now, id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("mark_submitted: {e}")))?;

        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "form".into(),
                id: id.to_string(),
            });
        }
        debug!(form_id = %id, "Form marked submitted");
        Ok(())
    }

    async fn mark_exported(&self, id: Uuid) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE forms SET exported = 1 WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("mark_exported: {e}")))?;

        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "form".into(),
                id: id.to_string(),
            });
        }
        debug!(form_id = %id, "Form marked exported");
        Ok(())
    }

    async fn list_unexported(&self) -> Result<Vec<StoredForm>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {FORM_COLUMNS} FROM forms \
                     WHERE exported = 0 AND submitted_at IS NOT NULL \
                     ORDER BY updated_at ASC, rowid ASC"
                ),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_unexported: {e}")))?;

        let mut forms = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_unexported: {e}")))?
        {
            forms.push(row_to_form(&row)?);
        }
        Ok(forms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{FlagField, TextField};

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn record_with_surname(surname: &str) -> FormRecord {
        let mut record = FormRecord::new();
        record.set_text(TextField::Surname, surname.into());
        record
    }

    #[tokio::test]
    async fn upsert_inserts_then_updates_same_row() {
        let db = test_db().await;
        let first = db.upsert("u1", &record_with_surname("Ivanov")).await.unwrap();
        let second = db.upsert("u1", &record_with_surname("Petrov")).await.unwrap();
        assert_eq!(first, second);

        let latest = db.get_latest("u1").await.unwrap().unwrap();
        assert_eq!(latest.id, first);
        assert_eq!(latest.record.text(TextField::Surname), Some("Petrov"));
        assert!(!latest.exported);
        assert!(latest.submitted_at.is_none());
    }

    #[tokio::test]
    async fn get_latest_missing_user_is_none() {
        let db = test_db().await;
        assert!(db.get_latest("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn users_are_isolated() {
        let db = test_db().await;
        db.upsert("u1", &record_with_surname("A")).await.unwrap();
        db.upsert("u2", &record_with_surname("B")).await.unwrap();

        let u1 = db.get_latest("u1").await.unwrap().unwrap();
        let u2 = db.get_latest("u2").await.unwrap().unwrap();
        assert_ne!(u1.id, u2.id);
        assert_eq!(u2.record.text(TextField::Surname), Some("B"));
    }

    #[tokio::test]
    async fn upsert_after_export_starts_new_row() {
        let db = test_db().await;
        let first = db.upsert("u1", &record_with_surname("A")).await.unwrap();
        db.mark_submitted(first).await.unwrap();
        db.mark_exported(first).await.unwrap();

        let second = db.upsert("u1", &record_with_surname("B")).await.unwrap();
        assert_ne!(first, second);

        let old = db.get_by_id(first).await.unwrap().unwrap();
        assert!(old.exported);
        assert_eq!(old.record.text(TextField::Surname), Some("A"));

        let latest = db.get_latest("u1").await.unwrap().unwrap();
        assert_eq!(latest.id, second);
    }

    #[tokio::test]
    async fn draft_update_leaves_exported_row_alone() {
        let db = test_db().await;
        let id = db.upsert("u1", &record_with_surname("A")).await.unwrap();
        let data = serde_json::to_string(&record_with_surname("B")).unwrap();
        assert!(db.update_draft(id, &data, &now_str()).await.unwrap());

        // Export finishes after upsert has read the row as a draft.
        db.mark_submitted(id).await.unwrap();
        db.mark_exported(id).await.unwrap();
        let late = serde_json::to_string(&record_with_surname("C")).unwrap();
        assert!(!db.update_draft(id, &late, &now_str()).await.unwrap());

        let exported = db.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(exported.record.text(TextField::Surname), Some("B"));
        assert!(!db.update_draft(Uuid::new_v4(), &late, &now_str()).await.unwrap());
    }

    #[tokio::test]
    async fn list_unexported_only_returns_submitted_rows() {
        let db = test_db().await;
        let draft = db.upsert("draft", &record_with_surname("D")).await.unwrap();
        let a = db.upsert("a", &record_with_surname("A")).await.unwrap();
        let b = db.upsert("b", &record_with_surname("B")).await.unwrap();
        db.mark_submitted(a).await.unwrap();
        db.mark_submitted(b).await.unwrap();

        let pending = db.list_unexported().await.unwrap();
        let ids: Vec<Uuid> = pending.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![a, b]);
        assert!(!ids.contains(&draft));

        db.mark_exported(a).await.unwrap();
        let pending = db.list_unexported().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b);
    }

    #[tokio::test]
    async fn mark_on_unknown_id_is_not_found() {
        let db = test_db().await;
        let err = db.mark_exported(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
        let err = db.mark_submitted(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn record_roundtrips_through_json_column() {
        let db = test_db().await;
        let mut record = record_with_surname("Ivanov");
        record.set_flag(FlagField::Compensation, false);
        let id = db.upsert("u1", &record).await.unwrap();

        let stored = db.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.record, record);
        assert_eq!(stored.user_id, "u1");
        assert!(stored.filled_at <= stored.updated_at);
    }

    #[tokio::test]
    async fn local_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("anketa.db");
        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.upsert("u1", &record_with_surname("Ivanov")).await.unwrap();
        }
        let db = LibSqlBackend::new_local(&path).await.unwrap();
        let stored = db.get_latest("u1").await.unwrap().unwrap();
        assert_eq!(stored.record.text(TextField::Surname), Some("Ivanov"));
    }
}
