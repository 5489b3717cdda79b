//! Per-user wizard session. Lives in memory only.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::form::FormRecord;

use super::step::Step;

/// Cursor and working copy of one user's questionnaire.
#[derive(Debug, Clone)]
pub struct WizardSession {
    pub step: Step,
    pub record: FormRecord,
    /// Work-experience entry currently being written, if any.
    pub work_index: Option<usize>,
    /// The record holds changes that have not reached the store.
    pub dirty: bool,
    pub last_activity: DateTime<Utc>,
}

impl WizardSession {
    /// Fresh session at the section menu with an empty record.
    pub fn new() -> Self {
        Self::resume(FormRecord::new())
    }

    /// Session at the section menu holding a previously persisted record.
    pub fn resume(record: FormRecord) -> Self {
        Self {
            step: Step::SectionMenu,
            record,
            work_index: None,
            dirty: false,
            last_activity: Utc::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// No activity for longer than `timeout` as of `now`.
    pub fn is_idle(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        match chrono::Duration::from_std(timeout) {
            Ok(timeout) => now - self.last_activity > timeout,
            Err(_) => false,
        }
    }
}

impl Default for WizardSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_at_menu_clean() {
        let session = WizardSession::new();
        assert_eq!(session.step, Step::SectionMenu);
        assert!(session.record.is_empty());
        assert!(!session.dirty);
        assert!(session.work_index.is_none());
    }

    #[test]
    fn idle_detection() {
        let mut session = WizardSession::new();
        let now = Utc::now();
        session.last_activity = now - chrono::Duration::seconds(120);
        assert!(session.is_idle(now, Duration::from_secs(60)));
        assert!(!session.is_idle(now, Duration::from_secs(600)));

        session.touch();
        assert!(!session.is_idle(Utc::now(), Duration::from_secs(60)));
    }
}
