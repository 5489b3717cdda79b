//! Pushes submitted forms to the sink and flags them exported.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::ExportError;
use crate::store::{Database, StoredForm};

use super::row::to_row;
use super::sheets::ExportSink;

const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub pending: usize,
    pub exported: usize,
    pub failed: usize,
}

pub struct Exporter {
    db: Arc<dyn Database>,
    sink: Arc<dyn ExportSink>,
    retry_delay: Duration,
    // One export at a time so a confirm and a reconcile pass never append
    // the same row twice.
    lock: Mutex<()>,
}

impl Exporter {
    pub fn new(db: Arc<dyn Database>, sink: Arc<dyn ExportSink>) -> Self {
        Self {
            db,
            sink,
            retry_delay: DEFAULT_RETRY_DELAY,
            lock: Mutex::new(()),
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn sink_name(&self) -> &str {
        self.sink.name()
    }

    /// Append the form's row (one retry) and flag it exported. Rows that are
    /// already exported are left alone.
    pub async fn export(&self, stored: &StoredForm) -> Result<(), ExportError> {
        let _guard = self.lock.lock().await;

        // Re-read: the row may have been exported since `stored` was loaded.
        let current = self.db.get_by_id(stored.id).await?;
        if current.as_ref().is_some_and(|f| f.exported) {
            tracing::debug!(form_id = %stored.id, "Form already exported");
            return Ok(());
        }
        let form = current.as_ref().unwrap_or(stored);

        let row = to_row(form);
        if let Err(first) = self.sink.append_row(&row).await {
            tracing::warn!(
                form_id = %form.id,
                sink = self.sink.name(),
                "Export failed, retrying once: {first}"
            );
            tokio::time::sleep(self.retry_delay).await;
            self.sink.append_row(&row).await?;
        }

        self.db.mark_exported(form.id).await?;
        tracing::info!(
            form_id = %form.id,
            user_id = %form.user_id,
            sink = self.sink.name(),
            "Form exported"
        );
        Ok(())
    }

    /// Export every submitted row the sink has not received yet.
    pub async fn reconcile(&self) -> Result<ReconcileReport, ExportError> {
        let pending = self.db.list_unexported().await?;
        let mut report = ReconcileReport {
            pending: pending.len(),
            ..Default::default()
        };

        for form in &pending {
            match self.export(form).await {
                Ok(()) => report.exported += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(form_id = %form.id, "Reconcile export failed: {e}");
                }
            }
        }

        if report.pending > 0 {
            tracing::info!(
                pending = report.pending,
                exported = report.exported,
                failed = report.failed,
                "Reconciliation pass finished"
            );
        }
        Ok(report)
    }
}

/// Run `reconcile` every `interval` until the task is aborted.
pub fn spawn_reconcile_task(exporter: Arc<Exporter>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = exporter.reconcile().await {
                tracing::error!("Reconciliation pass failed: {e}");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::form::{FormRecord, TextField};
    use crate::store::LibSqlBackend;

    /// Fails the first `failures` calls, then records rows.
    struct FlakySink {
        failures: AtomicUsize,
        rows: StdMutex<Vec<Vec<String>>>,
    }

    impl FlakySink {
        fn new(failures: usize) -> Self {
            Self {
                failures: AtomicUsize::new(failures),
                rows: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ExportSink for FlakySink {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn append_row(&self, row: &[String]) -> Result<(), ExportError> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(ExportError::Unreachable("down".into()));
            }
            self.rows.lock().unwrap().push(row.to_vec());
            Ok(())
        }
    }

    async fn submitted_form(db: &LibSqlBackend, user: &str) -> StoredForm {
        let mut record = FormRecord::new();
        record.set_text(TextField::Surname, user.to_string());
        let id = db.upsert(user, &record).await.unwrap();
        db.mark_submitted(id).await.unwrap();
        db.get_by_id(id).await.unwrap().unwrap()
    }

    fn exporter(db: Arc<LibSqlBackend>, sink: Arc<FlakySink>) -> Exporter {
        Exporter::new(db, sink).with_retry_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn export_retries_once_then_marks() {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let sink = Arc::new(FlakySink::new(1));
        let form = submitted_form(&db, "u1").await;

        exporter(db.clone(), sink.clone()).export(&form).await.unwrap();

        assert_eq!(sink.rows.lock().unwrap().len(), 1);
        assert!(db.get_by_id(form.id).await.unwrap().unwrap().exported);
    }

    #[tokio::test]
    async fn export_gives_up_after_two_attempts() {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let sink = Arc::new(FlakySink::new(2));
        let form = submitted_form(&db, "u1").await;

        let err = exporter(db.clone(), sink.clone()).export(&form).await.unwrap_err();
        assert!(matches!(err, ExportError::Unreachable(_)));
        assert!(!db.get_by_id(form.id).await.unwrap().unwrap().exported);
        assert_eq!(db.list_unexported().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn export_skips_already_exported() {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let sink = Arc::new(FlakySink::new(0));
        let form = submitted_form(&db, "u1").await;
        let exporter = exporter(db.clone(), sink.clone());

        exporter.export(&form).await.unwrap();
        exporter.export(&form).await.unwrap();
        assert_eq!(sink.rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reconcile_exports_pending_rows() {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let sink = Arc::new(FlakySink::new(0));
        submitted_form(&db, "u1").await;
        submitted_form(&db, "u2").await;

        // Unsubmitted drafts are not exported.
        db.upsert("u3", &FormRecord::new()).await.unwrap();

        let report = exporter(db.clone(), sink.clone()).reconcile().await.unwrap();
        assert_eq!(
            report,
            ReconcileReport {
                pending: 2,
                exported: 2,
                failed: 0
            }
        );
        let rows = sink.rows.lock().unwrap();
        assert_eq!(rows[0][0], "u1");
        assert_eq!(rows[1][0], "u2");
        assert!(db.list_unexported().await.unwrap().is_empty());
    }
}
