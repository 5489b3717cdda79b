//! Google Sheets sink over the Sheets v4 REST API.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::ExportError;

use super::row::{COLUMN_COUNT, HEADER};

const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";

/// Destination for exported rows.
#[async_trait]
pub trait ExportSink: Send + Sync {
    fn name(&self) -> &str;

    /// Append one row after the last filled row.
    async fn append_row(&self, row: &[String]) -> Result<(), ExportError>;
}

/// State of the sheet's first row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderStatus {
    /// The sheet is empty.
    Missing,
    /// First row has the expected number of columns.
    Present,
    /// First row exists with a different width.
    Mismatch { columns: usize },
}

/// Appends rows to a spreadsheet through `values:append`.
pub struct GoogleSheetsSink {
    spreadsheet_id: String,
    range: String,
    access_token: SecretString,
    api_base: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl GoogleSheetsSink {
    pub fn new(
        spreadsheet_id: impl Into<String>,
        range: impl Into<String>,
        access_token: SecretString,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            range: range.into(),
            access_token,
            api_base: DEFAULT_API_BASE.to_string(),
            timeout,
            client,
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Sheet (tab) part of the configured range.
    fn sheet(&self) -> &str {
        self.range.split('!').next().unwrap_or(&self.range)
    }

    fn values_url(&self, range: &str, suffix: &str) -> Result<reqwest::Url, ExportError> {
        let mut url = reqwest::Url::parse(&self.api_base)
            .map_err(|e| ExportError::Unreachable(format!("invalid api base: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ExportError::Unreachable("api base cannot be a base url".into()))?
            .pop_if_empty()
            .push("v4")
            .push("spreadsheets")
            .push(&self.spreadsheet_id)
            .push("values")
            .push(&format!("{range}{suffix}"));
        Ok(url)
    }

    fn transport_error(&self, e: reqwest::Error) -> ExportError {
        if e.is_timeout() {
            ExportError::Timeout(self.timeout)
        } else {
            ExportError::Unreachable(e.to_string())
        }
    }

    async fn status_error(&self, resp: reqwest::Response) -> ExportError {
        let status = resp.status().as_u16();
        match status {
            401 | 403 => ExportError::AuthFailed { status },
            404 => ExportError::TargetNotFound(self.spreadsheet_id.clone()),
            _ => ExportError::Rejected {
                status,
                body: resp.text().await.unwrap_or_default(),
            },
        }
    }

    /// Read the first row of the sheet.
    pub async fn check(&self) -> Result<HeaderStatus, ExportError> {
        let url = self.values_url(&format!("{}!1:1", self.sheet()), "")?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !resp.status().is_success() {
            return Err(self.status_error(resp).await);
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ExportError::Unreachable(format!("invalid response: {e}")))?;

        let columns = data
            .get("values")
            .and_then(serde_json::Value::as_array)
            .and_then(|rows| rows.first())
            .and_then(serde_json::Value::as_array)
            .map_or(0, Vec::len);

        Ok(match columns {
            0 => HeaderStatus::Missing,
            COLUMN_COUNT => HeaderStatus::Present,
            columns => HeaderStatus::Mismatch { columns },
        })
    }

    /// Write the header row into an empty sheet. Returns whether it wrote.
    pub async fn ensure_header(&self) -> Result<bool, ExportError> {
        match self.check().await? {
            HeaderStatus::Missing => {
                let header: Vec<String> = HEADER.iter().map(|h| h.to_string()).collect();
                self.append_row(&header).await?;
                tracing::info!(spreadsheet = %self.spreadsheet_id, "Header row written");
                Ok(true)
            }
            HeaderStatus::Present => Ok(false),
            HeaderStatus::Mismatch { columns } => {
                tracing::warn!(
                    spreadsheet = %self.spreadsheet_id,
                    columns,
                    expected = COLUMN_COUNT,
                    "Sheet header has unexpected width"
                );
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl ExportSink for GoogleSheetsSink {
    fn name(&self) -> &str {
        "google_sheets"
    }

    async fn append_row(&self, row: &[String]) -> Result<(), ExportError> {
        let mut url = self.values_url(&self.range, ":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let resp = self
            .client
            .post(url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&serde_json::json!({ "values": [row] }))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !resp.status().is_success() {
            return Err(self.status_error(resp).await);
        }
        Ok(())
    }
}
