//! Error types for the questionnaire bot.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Attachment error: {0}")]
    Attachment(#[from] AttachmentError),

    #[error("Wizard error: {0}")]
    Wizard(#[from] WizardError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),
}

/// Errors pushing rows to the external spreadsheet.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Export sink unreachable: {0}")]
    Unreachable(String),

    #[error("Export sink rejected credentials (status {status})")]
    AuthFailed { status: u16 },

    #[error("Export target not found: {0}")]
    TargetNotFound(String),

    #[error("Export sink returned status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Export timed out after {0:?}")]
    Timeout(Duration),

    #[error("Record store error during export: {0}")]
    Store(#[from] DatabaseError),
}

/// Errors fetching or storing a user attachment.
#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("Attachment {file_id} could not be resolved: {reason}")]
    Resolve { file_id: String, reason: String },

    #[error("Attachment download failed: {0}")]
    Download(String),

    #[error("Attachment is empty")]
    Empty,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the wizard manager to the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("Failed to persist form for user {user_id} after retry: {source}")]
    PersistFailed {
        user_id: String,
        #[source]
        source: DatabaseError,
    },
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_errors_convert_into_top_level() {
        let err: Error = ExportError::AuthFailed { status: 403 }.into();
        assert!(matches!(err, Error::Export(_)));
        assert_eq!(
            err.to_string(),
            "Export error: Export sink rejected credentials (status 403)"
        );

        let err: Error = ConfigError::MissingRequired {
            key: "TELEGRAM_BOT_TOKEN".into(),
            hint: "Set it".into(),
        }
        .into();
        assert!(err.to_string().contains("TELEGRAM_BOT_TOKEN"));
    }

    #[test]
    fn persist_failure_keeps_store_cause() {
        use std::error::Error as _;

        let err = WizardError::PersistFailed {
            user_id: "42".into(),
            source: DatabaseError::Query("disk I/O error".into()),
        };
        assert!(err.source().is_some_and(|s| s.to_string().contains("disk I/O")));
    }
}
