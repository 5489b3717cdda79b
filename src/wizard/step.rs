//! Wizard steps and the shape of their graph entries.

use serde::{Deserialize, Serialize};

use crate::form::{FileField, FlagField, FormRecord, Section, TextField, WorkField};

/// Where a user currently is in the questionnaire.
///
/// Three control states (`Idle`, `SectionMenu`, `FinalReview`) plus one
/// state per question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Idle,
    SectionMenu,
    FinalReview,

    // Personal data
    Surname,
    Name,
    Patronymic,
    BirthDate,
    BirthPlace,
    Citizenship,
    Gender,
    Photo3x4,

    // Passport
    PassportSeriesNumber,
    PassportIssuedBy,
    PassportIssueDate,
    PassportDivisionCode,
    RegistrationAddress,
    ActualAddress,
    PassportAdditional,
    PassportPhoto,

    // Contacts
    Phone,
    Email,
    SocialMedia,
    CitizenshipChoice,

    // Documents
    MedicalBook,
    Registration,
    Snils,
    Inn,
    MedicalBookFile,
    ForeignerId,
    Fingerprinting,
    MedicalExam,
    RegistryCheck,

    // Education
    EducationInstitution,
    EducationPeriod,
    EducationSpecialty,
    EducationDocument,
    Diploma,

    // Work experience
    WorkPeriod,
    WorkOrganization,
    WorkPosition,
    WorkDuties,
    WorkAddMore,

    // Readiness
    Track,
    StartDate,
    BusinessTrips,
    City,

    // Consents
    PersonalDataConsent,
    RotationConsent,

    // Comments
    Comments,

    // Confirmations (foreign citizens)
    Tuberculosis,
    ChronicDiseases,
    RussiaStay,
    NinetyDaysWarning,
    DocumentsReadiness,
    SelfEmployment,
    Compensation,
}

impl Step {
    /// True for every state that asks the user a question.
    pub fn is_question(&self) -> bool {
        !matches!(self, Self::Idle | Self::SectionMenu | Self::FinalReview)
    }
}

impl Default for Step {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Debug names are stable; keep logs in snake_case like the serde form.
        let name = format!("{self:?}");
        let mut out = String::with_capacity(name.len() + 4);
        for (i, ch) in name.chars().enumerate() {
            if ch.is_ascii_uppercase() {
                if i > 0 {
                    out.push('_');
                }
                out.push(ch.to_ascii_lowercase());
            } else {
                out.push(ch);
            }
        }
        f.write_str(&out)
    }
}

/// What kind of answer a question step takes and where it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Text(TextField),
    Flag(FlagField),
    Gender,
    File(FileField),
    CitizenshipChoice,
    Work(WorkField),
    AddMore,
}

/// Successor of a step, possibly depending on the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    To(Step),
    IfForeign { then: Step, otherwise: Step },
    IfCitizenshipUnset { then: Step, otherwise: Step },
}

impl Next {
    /// Resolve against the record as it stands after the step's write.
    pub fn resolve(&self, record: &FormRecord) -> Step {
        match *self {
            Next::To(step) => step,
            Next::IfForeign { then, otherwise } => {
                if record.is_foreign() {
                    then
                } else {
                    otherwise
                }
            }
            Next::IfCitizenshipUnset { then, otherwise } => {
                if record.citizenship_type.is_set() {
                    otherwise
                } else {
                    then
                }
            }
        }
    }
}

/// One row of the step graph.
#[derive(Debug, Clone, Copy)]
pub struct StepSpec {
    pub step: Step,
    pub section: Section,
    pub kind: StepKind,
    /// Skipping (and, for yes/no gates, answering "no") is refused.
    pub mandatory: bool,
    pub next: Next,
    pub back: Step,
}
