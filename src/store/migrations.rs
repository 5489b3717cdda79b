//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.
//! A `forms` table left behind by the previous bot (integer ids, a
//! `sent_to_sheets` flag, no `_migrations` table) is renamed aside and its
//! rows are carried over into the V1 schema.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "forms",
        sql: r#"
            CREATE TABLE IF NOT EXISTS forms (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                form_data TEXT NOT NULL,
                filled_at TEXT NOT NULL,
                submitted_at TEXT,
                exported INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_forms_user ON forms(user_id);
        "#,
    },
    Migration {
        version: 2,
        name: "forms_export_queue_index",
        sql: r#"
            CREATE INDEX IF NOT EXISTS idx_forms_export_queue
                ON forms(exported, submitted_at, updated_at);
        "#,
    },
];

/// Copies rows from the renamed legacy table into the V1 schema.
///
/// Rows already pushed to the spreadsheet are treated as submitted and
/// exported; everything else becomes an in-progress draft.
const LEGACY_IMPORT_SQL: &str = r#"
    INSERT INTO forms (id, user_id, form_data, filled_at, submitted_at, exported, created_at, updated_at)
    SELECT
        lower(hex(randomblob(16))),
        CAST(user_id AS TEXT),
        form_data,
        filled_at,
        CASE WHEN sent_to_sheets = 1 THEN updated_at ELSE NULL END,
        COALESCE(sent_to_sheets, 0),
        created_at,
        updated_at
    FROM forms_legacy;
    DROP TABLE forms_legacy;
"#;

/// Run all pending migrations against the given connection.
///
/// Creates the `_migrations` table if it doesn't exist.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let current_version = get_current_version(conn).await?;

    let legacy = current_version == 0 && legacy_forms_table_exists(conn).await?;
    if legacy {
        conn.execute("ALTER TABLE forms RENAME TO forms_legacy", ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("Failed to rename legacy forms: {e}")))?;
        tracing::info!("Legacy forms table detected, importing into V1 schema");
    }

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                DatabaseError::Migration(format!(
                    "Migration V{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
            seed_version(conn, migration.version, migration.name).await?;

            if legacy && migration.version == 1 {
                conn.execute_batch(LEGACY_IMPORT_SQL).await.map_err(|e| {
                    DatabaseError::Migration(format!("Legacy forms import failed: {e}"))
                })?;
            }
        }
    }

    let version = get_current_version(conn).await?;
    tracing::info!(version, "Database migrations complete");

    Ok(())
}

/// Get the highest applied migration version, or 0 if none.
async fn get_current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to query migration version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to read migration version: {e}")))?;

    match row {
        Some(row) => {
            let version: i64 = row.get(0).map_err(|e| {
                DatabaseError::Migration(format!("Failed to parse migration version: {e}"))
            })?;
            Ok(version)
        }
        None => Ok(0),
    }
}

/// Check for a `forms` table with the old `sent_to_sheets` column.
async fn legacy_forms_table_exists(conn: &Connection) -> Result<bool, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT COUNT(*) FROM pragma_table_info('forms') WHERE name = 'sent_to_sheets'",
            (),
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("Failed to check legacy tables: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("Failed to read legacy check: {e}")))?;

    match row {
        Some(row) => {
            let count: i64 = row.get(0).unwrap_or(0);
            Ok(count > 0)
        }
        None => Ok(false),
    }
}

/// Insert a version record into `_migrations`.
async fn seed_version(conn: &Connection, version: i64, name: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{FlagField, FormRecord, Gender, TextField};

    async fn test_conn() -> Connection {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .unwrap();
        db.connect().unwrap()
    }

    async fn count(conn: &Connection, sql: &str) -> i64 {
        let mut rows = conn.query(sql, ()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        row.get(0).unwrap()
    }

    #[tokio::test]
    async fn migrations_create_forms_table() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();

        for table in &["forms", "_migrations"] {
            let mut rows = conn
                .query(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    libsql::params![*table],
                )
                .await
                .unwrap();
            let row = rows.next().await.unwrap().unwrap();
            let count: i64 = row.get(0).unwrap();
            assert_eq!(count, 1, "Table '{}' should exist", table);
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();
        run_migrations(&conn).await.unwrap();

        let version = get_current_version(&conn).await.unwrap();
        assert_eq!(version, 2);
    }

    #[tokio::test]
    async fn legacy_forms_are_imported() {
        let conn = test_conn().await;
        conn.execute_batch(
            r#"CREATE TABLE forms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                form_data TEXT NOT NULL,
                filled_at TEXT NOT NULL,
                sent_to_sheets INTEGER DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX idx_user_id ON forms(user_id);
            INSERT INTO forms (user_id, form_data, filled_at, sent_to_sheets, created_at, updated_at)
                VALUES (42, '{"comments":"hi"}', '2024-01-01T10:00:00', 1,
                        '2024-01-01T10:00:00', '2024-01-01T11:00:00');
            INSERT INTO forms (user_id, form_data, filled_at, sent_to_sheets, created_at, updated_at)
                VALUES (43, '{}', '2024-01-02T10:00:00', 0,
                        '2024-01-02T10:00:00', '2024-01-02T10:00:00');
            INSERT INTO forms (user_id, form_data, filled_at, sent_to_sheets, created_at, updated_at)
                VALUES (44, '{"personal_data": {"surname": "Петров", "gender": "Мужской"},
                              "documents": {"medical_book": true, "work_permit": false,
                                              "files": {"work_permit": "data/44/work_permit.jpg"}}}',
                        '2024-01-03T10:00:00', 0, '2024-01-03T10:00:00', '2024-01-03T10:00:00');
            INSERT INTO forms (user_id, form_data, filled_at, sent_to_sheets, created_at, updated_at)
                VALUES (45, '{"personal_data": {"name": "Анна", "gender": "другое"}}',
                        '2024-01-04T10:00:00', 0, '2024-01-04T10:00:00', '2024-01-04T10:00:00');"#,
        )
        .await
        .unwrap();

        run_migrations(&conn).await.unwrap();

        assert_eq!(count(&conn, "SELECT COUNT(*) FROM forms").await, 4);
        assert_eq!(
            count(&conn, "SELECT COUNT(*) FROM forms WHERE exported = 1 AND submitted_at IS NOT NULL").await,
            1
        );
        assert_eq!(
            count(&conn, "SELECT COUNT(*) FROM forms WHERE user_id = '43' AND submitted_at IS NULL").await,
            1
        );
        assert_eq!(
            count(&conn, "SELECT COUNT(*) FROM sqlite_master WHERE name = 'forms_legacy'").await,
            0
        );

        let petrov = form_data(&conn, "44").await;
        assert_eq!(petrov.text(TextField::Surname), Some("Петров"));
        let personal = petrov.personal_data.as_ref().unwrap();
        assert_eq!(personal.gender.get(), Some(&Gender::Male));
        assert_eq!(petrov.flag(FlagField::MedicalBook), Some(true));

        let anna = form_data(&conn, "45").await;
        assert_eq!(anna.text(TextField::Name), Some("Анна"));
        assert!(!anna.personal_data.as_ref().unwrap().gender.is_set());
    }

    async fn form_data(conn: &Connection, user_id: &str) -> FormRecord {
        let mut rows = conn
            .query(
                "SELECT form_data FROM forms WHERE user_id = ?1",
                libsql::params![user_id],
            )
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let json: String = row.get(0).unwrap();
        serde_json::from_str(&json).unwrap()
    }
}
