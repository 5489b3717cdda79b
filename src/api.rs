//! Admin HTTP endpoints: health, pending exports and manual reconciliation.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::export::Exporter;
use crate::store::{Database, StoredForm};
use crate::wizard::WizardManager;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<dyn Database>,
    pub wizard: Arc<WizardManager>,
    /// `None` when no spreadsheet is configured.
    pub exporter: Option<Arc<Exporter>>,
}

/// Build the admin router.
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/forms/pending", get(pending_forms))
        .route("/api/export/reconcile", post(reconcile))
        .with_state(state)
}

/// Listing entry for a submitted form waiting for export.
#[derive(Debug, Serialize)]
struct PendingForm {
    id: Uuid,
    user_id: String,
    full_name: String,
    submitted_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl From<&StoredForm> for PendingForm {
    fn from(form: &StoredForm) -> Self {
        Self {
            id: form.id,
            user_id: form.user_id.clone(),
            full_name: form.record.full_name(),
            submitted_at: form.submitted_at,
            updated_at: form.updated_at,
        }
    }
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let sessions = state.wizard.active_sessions().await;
    let export = state.exporter.as_ref().map(|e| e.sink_name());

    match state.db.list_unexported().await {
        Ok(pending) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ok",
                "service": "anketa-bot",
                "active_sessions": sessions,
                "pending_exports": pending.len(),
                "export_sink": export,
            })),
        ),
        Err(e) => {
            tracing::error!("Health check: store unavailable: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "degraded",
                    "service": "anketa-bot",
                    "active_sessions": sessions,
                    "error": e.to_string(),
                })),
            )
        }
    }
}

async fn pending_forms(State(state): State<ApiState>) -> impl IntoResponse {
    match state.db.list_unexported().await {
        Ok(forms) => {
            let pending: Vec<PendingForm> = forms.iter().map(PendingForm::from).collect();
            (StatusCode::OK, Json(serde_json::json!(pending)))
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        ),
    }
}

async fn reconcile(State(state): State<ApiState>) -> impl IntoResponse {
    let Some(exporter) = state.exporter else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "Export is not configured"})),
        );
    };

    match exporter.reconcile().await {
        Ok(report) => {
            tracing::info!(exported = report.exported, "Manual reconciliation finished");
            (StatusCode::OK, Json(serde_json::json!(report)))
        }
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({"error": e.to_string()})),
        ),
    }
}
