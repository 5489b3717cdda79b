//! Pure transition function over the step graph.
//!
//! `next` never touches I/O: it looks at the session and one input and
//! returns the target step, the record writes to perform and an outcome.
//! The caller applies the writes and persists.

use crate::form::{
    CitizenshipType, FileField, FileRef, FlagField, FormRecord, Gender, Section, TextField,
    WorkField,
};

use super::graph;
use super::input::{self, AddMoreChoice, ReviewChoice, StepInput};
use super::session::WizardSession;
use super::step::{Step, StepKind, StepSpec};

/// A single write to the form record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Text(TextField, String),
    Flag(FlagField, bool),
    Gender(Gender),
    File(FileField, FileRef),
    Citizenship(CitizenshipType),
    AppendWorkEntry,
    Work {
        index: usize,
        field: WorkField,
        value: String,
    },
}

impl Mutation {
    pub fn apply(&self, record: &mut FormRecord) {
        match self {
            Mutation::Text(field, value) => record.set_text(*field, value.clone()),
            Mutation::Flag(field, value) => record.set_flag(*field, *value),
            Mutation::Gender(gender) => record.set_gender(*gender),
            Mutation::File(field, file) => record.set_file(*field, file.clone()),
            Mutation::Citizenship(kind) => record.set_citizenship_type(*kind),
            Mutation::AppendWorkEntry => {
                record.push_work_entry();
            }
            Mutation::Work {
                index,
                field,
                value,
            } => {
                if !record.set_work(*index, *field, value.clone()) {
                    tracing::warn!(index, "Work entry index out of range, write dropped");
                }
            }
        }
    }
}

/// Why an input was not accepted. The step is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Blank text on a text step.
    EmptyText,
    /// An attachment where text or a choice was expected.
    TextExpected,
    /// Text where an attachment was expected.
    FileExpected,
    /// Text that matches none of the offered options.
    UnknownChoice,
    /// Skip on a mandatory step.
    MandatorySkip,
    /// "No" on a mandatory yes/no gate.
    MandatoryNo,
    /// Confirmations selected by a non-foreign user.
    ForeignOnly,
    /// Finish requested with nothing filled in.
    EmptyForm,
    /// Free input while the section menu is shown.
    UseMenu,
    /// Input outside of an active wizard.
    NotStarted,
}

/// What happened as a result of an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Answer recorded, moved on.
    Advanced,
    /// Question skipped, moved on.
    Skipped,
    /// Navigated without answering (back, section select, edit).
    Moved,
    Rejected(Rejection),
    /// User confirmed the final review.
    Submit,
    /// User cancelled from the final review.
    Cancelled,
}

/// Result of one transition, not yet applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub step: Step,
    pub work_index: Option<usize>,
    pub mutations: Vec<Mutation>,
    pub outcome: Outcome,
}

impl Transition {
    fn stay(session: &WizardSession, rejection: Rejection) -> Self {
        Self {
            step: session.step,
            work_index: session.work_index,
            mutations: Vec::new(),
            outcome: Outcome::Rejected(rejection),
        }
    }

    fn move_to(step: Step, work_index: Option<usize>, outcome: Outcome) -> Self {
        Self {
            step,
            work_index: scoped_work_index(step, work_index),
            mutations: Vec::new(),
            outcome,
        }
    }

    /// Apply the writes and move the cursor. Marks the session dirty when
    /// anything was written.
    ///
    /// Leaving the work-experience section drops entries that were started
    /// but never answered.
    pub fn apply(self, session: &mut WizardSession) -> Outcome {
        let in_work = |step| graph::section_of(step) == Some(Section::WorkExperience);
        for mutation in &self.mutations {
            mutation.apply(&mut session.record);
        }
        if !self.mutations.is_empty() {
            session.dirty = true;
        }
        if in_work(session.step) && !in_work(self.step) && session.record.drop_empty_work_entries() {
            session.dirty = true;
        }
        session.step = self.step;
        session.work_index = self.work_index;
        session.touch();
        self.outcome
    }
}

/// Advance the wizard by one input.
pub fn next(session: &WizardSession, input: &StepInput) -> Transition {
    match session.step {
        Step::Idle => Transition::stay(session, Rejection::NotStarted),
        Step::SectionMenu => Transition::stay(session, Rejection::UseMenu),
        Step::FinalReview => review(session, input),
        step => match graph::lookup(step) {
            Some(row) => question(session, row, input),
            None => Transition::stay(session, Rejection::NotStarted),
        },
    }
}

/// Jump to the first step of a section.
pub fn select_section(session: &WizardSession, section: Section) -> Transition {
    if session.step == Step::Idle {
        return Transition::stay(session, Rejection::NotStarted);
    }
    if section == Section::Confirmations && !session.record.is_foreign() {
        return Transition::stay(session, Rejection::ForeignOnly);
    }
    Transition::move_to(graph::first_step(section), None, Outcome::Moved)
}

/// Open the final review.
pub fn finish(session: &WizardSession) -> Transition {
    if session.step == Step::Idle {
        return Transition::stay(session, Rejection::NotStarted);
    }
    if session.record.is_empty() {
        return Transition::stay(session, Rejection::EmptyForm);
    }
    Transition::move_to(Step::FinalReview, None, Outcome::Moved)
}

// ── Question steps ──────────────────────────────────────────────────

fn question(session: &WizardSession, row: &StepSpec, input: &StepInput) -> Transition {
    match input {
        StepInput::Back => Transition::move_to(row.back, session.work_index, Outcome::Moved),
        StepInput::Skip => {
            if row.mandatory {
                return Transition::stay(session, Rejection::MandatorySkip);
            }
            if row.kind == StepKind::AddMore {
                return Transition::move_to(Step::SectionMenu, None, Outcome::Skipped);
            }
            advance(session, row, Vec::new(), session.work_index, Outcome::Skipped)
        }
        StepInput::File(file) => match row.kind {
            StepKind::File(field) => advance(
                session,
                row,
                vec![Mutation::File(field, file.clone())],
                session.work_index,
                Outcome::Advanced,
            ),
            _ => Transition::stay(session, Rejection::TextExpected),
        },
        StepInput::Text(text) => answer(session, row, text),
    }
}

fn answer(session: &WizardSession, row: &StepSpec, text: &str) -> Transition {
    let text = text.trim();
    let mutation = match row.kind {
        StepKind::Text(field) => {
            if text.is_empty() {
                return Transition::stay(session, Rejection::EmptyText);
            }
            Mutation::Text(field, text.to_string())
        }
        StepKind::Flag(field) => match input::parse_yes_no(text) {
            Some(false) if row.mandatory => {
                return Transition::stay(session, Rejection::MandatoryNo);
            }
            Some(value) => Mutation::Flag(field, value),
            None => return Transition::stay(session, Rejection::UnknownChoice),
        },
        StepKind::Gender => match input::parse_gender(text) {
            Some(gender) => Mutation::Gender(gender),
            None => return Transition::stay(session, Rejection::UnknownChoice),
        },
        StepKind::CitizenshipChoice => match input::parse_citizenship(text) {
            Some(kind) => Mutation::Citizenship(kind),
            None => return Transition::stay(session, Rejection::UnknownChoice),
        },
        StepKind::File(_) => return Transition::stay(session, Rejection::FileExpected),
        StepKind::Work(field) => {
            if text.is_empty() {
                return Transition::stay(session, Rejection::EmptyText);
            }
            return work_write(session, row, field, text);
        }
        StepKind::AddMore => {
            return match input::parse_add_more(text) {
                Some(AddMoreChoice::Add) => {
                    // Index of the entry about to be appended.
                    let index = session.record.work_experience.len();
                    Transition {
                        step: Step::WorkPeriod,
                        work_index: Some(index),
                        mutations: vec![Mutation::AppendWorkEntry],
                        outcome: Outcome::Advanced,
                    }
                }
                Some(AddMoreChoice::Continue) => {
                    Transition::move_to(Step::SectionMenu, None, Outcome::Advanced)
                }
                None => Transition::stay(session, Rejection::UnknownChoice),
            };
        }
    };
    advance(session, row, vec![mutation], session.work_index, Outcome::Advanced)
}

/// First write of an entry cycle appends a new entry; later writes target it.
fn work_write(session: &WizardSession, row: &StepSpec, field: WorkField, value: &str) -> Transition {
    let len = session.record.work_experience.len();
    let mut mutations = Vec::with_capacity(2);
    let index = match session.work_index {
        Some(index) if index < len => index,
        _ => {
            mutations.push(Mutation::AppendWorkEntry);
            len
        }
    };
    mutations.push(Mutation::Work {
        index,
        field,
        value: value.to_string(),
    });
    advance(session, row, mutations, Some(index), Outcome::Advanced)
}

/// Move to the step's successor. Forks are resolved on the record with
/// `mutations` already applied.
fn advance(
    session: &WizardSession,
    row: &StepSpec,
    mutations: Vec<Mutation>,
    work_index: Option<usize>,
    outcome: Outcome,
) -> Transition {
    let step = if mutations.is_empty() {
        row.next.resolve(&session.record)
    } else {
        let mut after = session.record.clone();
        for mutation in &mutations {
            mutation.apply(&mut after);
        }
        row.next.resolve(&after)
    };
    Transition {
        step,
        work_index: scoped_work_index(step, work_index),
        mutations,
        outcome,
    }
}

// ── Final review ────────────────────────────────────────────────────

fn review(session: &WizardSession, input: &StepInput) -> Transition {
    match input {
        StepInput::Back => Transition::move_to(Step::SectionMenu, None, Outcome::Moved),
        StepInput::Text(text) => match input::parse_review(text) {
            Some(ReviewChoice::Confirm) => Transition {
                step: Step::FinalReview,
                work_index: None,
                mutations: Vec::new(),
                outcome: Outcome::Submit,
            },
            Some(ReviewChoice::Edit) => {
                Transition::move_to(Step::SectionMenu, None, Outcome::Moved)
            }
            Some(ReviewChoice::Cancel) => Transition::move_to(Step::Idle, None, Outcome::Cancelled),
            None => Transition::stay(session, Rejection::UnknownChoice),
        },
        StepInput::Skip | StepInput::File(_) => {
            Transition::stay(session, Rejection::UnknownChoice)
        }
    }
}

/// The active work entry only survives while the cursor stays in the
/// work-experience section.
fn scoped_work_index(step: Step, work_index: Option<usize>) -> Option<usize> {
    match graph::section_of(step) {
        Some(Section::WorkExperience) => work_index,
        _ => None,
    }
}
