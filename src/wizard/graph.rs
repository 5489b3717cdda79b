//! The step graph: one static table describing every question.
//!
//! Each row names the section, the answer kind, whether the step is
//! mandatory, its successor (possibly a fork on the citizenship
//! discriminator) and its unique static predecessor. The first step of
//! every section goes back to the section menu.

use crate::form::{FileField, FlagField, Section, TextField, WorkField};

use super::step::{Next, Step, StepKind, StepSpec};

const MENU: Step = Step::SectionMenu;

const fn ask(step: Step, section: Section, kind: StepKind, next: Next, back: Step) -> StepSpec {
    StepSpec {
        step,
        section,
        kind,
        mandatory: false,
        next,
        back,
    }
}

const fn gate(step: Step, section: Section, kind: StepKind, next: Next, back: Step) -> StepSpec {
    StepSpec {
        step,
        section,
        kind,
        mandatory: true,
        next,
        back,
    }
}

const fn text(
    step: Step,
    section: Section,
    field: TextField,
    next: Step,
    back: Step,
) -> StepSpec {
    ask(step, section, StepKind::Text(field), Next::To(next), back)
}

const fn flag(
    step: Step,
    section: Section,
    field: FlagField,
    next: Step,
    back: Step,
) -> StepSpec {
    ask(step, section, StepKind::Flag(field), Next::To(next), back)
}

const fn file(
    step: Step,
    section: Section,
    field: FileField,
    next: Step,
    back: Step,
) -> StepSpec {
    ask(step, section, StepKind::File(field), Next::To(next), back)
}

const fn work(step: Step, field: WorkField, next: Step, back: Step) -> StepSpec {
    ask(step, Section::WorkExperience, StepKind::Work(field), Next::To(next), back)
}

/// Every question step, grouped by section in asking order.
pub static STEPS: &[StepSpec] = &[
    // ── Personal ────────────────────────────────────────────────────
    text(Step::Surname, Section::Personal, TextField::Surname, Step::Name, MENU),
    text(Step::Name, Section::Personal, TextField::Name, Step::Patronymic, Step::Surname),
    text(Step::Patronymic, Section::Personal, TextField::Patronymic, Step::BirthDate, Step::Name),
    text(Step::BirthDate, Section::Personal, TextField::BirthDate, Step::BirthPlace, Step::Patronymic),
    text(Step::BirthPlace, Section::Personal, TextField::BirthPlace, Step::Citizenship, Step::BirthDate),
    text(Step::Citizenship, Section::Personal, TextField::Citizenship, Step::Gender, Step::BirthPlace),
    ask(Step::Gender, Section::Personal, StepKind::Gender, Next::To(Step::Photo3x4), Step::Citizenship),
    file(Step::Photo3x4, Section::Personal, FileField::Photo3x4, MENU, Step::Gender),
    // ── Passport ────────────────────────────────────────────────────
    text(
        Step::PassportSeriesNumber,
        Section::Passport,
        TextField::PassportSeriesNumber,
        Step::PassportIssuedBy,
        MENU,
    ),
    text(
        Step::PassportIssuedBy,
        Section::Passport,
        TextField::PassportIssuedBy,
        Step::PassportIssueDate,
        Step::PassportSeriesNumber,
    ),
    text(
        Step::PassportIssueDate,
        Section::Passport,
        TextField::PassportIssueDate,
        Step::PassportDivisionCode,
        Step::PassportIssuedBy,
    ),
    text(
        Step::PassportDivisionCode,
        Section::Passport,
        TextField::PassportDivisionCode,
        Step::RegistrationAddress,
        Step::PassportIssueDate,
    ),
    text(
        Step::RegistrationAddress,
        Section::Passport,
        TextField::RegistrationAddress,
        Step::ActualAddress,
        Step::PassportDivisionCode,
    ),
    text(
        Step::ActualAddress,
        Section::Passport,
        TextField::ActualAddress,
        Step::PassportAdditional,
        Step::RegistrationAddress,
    ),
    text(
        Step::PassportAdditional,
        Section::Passport,
        TextField::PassportAdditional,
        Step::PassportPhoto,
        Step::ActualAddress,
    ),
    file(
        Step::PassportPhoto,
        Section::Passport,
        FileField::PassportPhoto,
        MENU,
        Step::PassportAdditional,
    ),
    // ── Contacts ────────────────────────────────────────────────────
    text(Step::Phone, Section::Contacts, TextField::Phone, Step::Email, MENU),
    text(Step::Email, Section::Contacts, TextField::Email, Step::SocialMedia, Step::Phone),
    ask(
        Step::SocialMedia,
        Section::Contacts,
        StepKind::Text(TextField::SocialMedia),
        Next::IfCitizenshipUnset {
            then: Step::CitizenshipChoice,
            otherwise: MENU,
        },
        Step::Email,
    ),
    ask(
        Step::CitizenshipChoice,
        Section::Contacts,
        StepKind::CitizenshipChoice,
        Next::To(MENU),
        Step::SocialMedia,
    ),
    // ── Documents ───────────────────────────────────────────────────
    flag(Step::MedicalBook, Section::Documents, FlagField::MedicalBook, Step::Registration, MENU),
    flag(
        Step::Registration,
        Section::Documents,
        FlagField::Registration,
        Step::Snils,
        Step::MedicalBook,
    ),
    text(Step::Snils, Section::Documents, TextField::Snils, Step::Inn, Step::Registration),
    text(Step::Inn, Section::Documents, TextField::Inn, Step::MedicalBookFile, Step::Snils),
    ask(
        Step::MedicalBookFile,
        Section::Documents,
        StepKind::File(FileField::MedicalBookFile),
        Next::IfForeign {
            then: Step::ForeignerId,
            otherwise: MENU,
        },
        Step::Inn,
    ),
    text(
        Step::ForeignerId,
        Section::Documents,
        TextField::ForeignerId,
        Step::Fingerprinting,
        Step::MedicalBookFile,
    ),
    flag(
        Step::Fingerprinting,
        Section::Documents,
        FlagField::Fingerprinting,
        Step::MedicalExam,
        Step::ForeignerId,
    ),
    flag(
        Step::MedicalExam,
        Section::Documents,
        FlagField::MedicalExam,
        Step::RegistryCheck,
        Step::Fingerprinting,
    ),
    flag(
        Step::RegistryCheck,
        Section::Documents,
        FlagField::RegistryCheck,
        MENU,
        Step::MedicalExam,
    ),
    // ── Education ───────────────────────────────────────────────────
    text(
        Step::EducationInstitution,
        Section::Education,
        TextField::EducationInstitution,
        Step::EducationPeriod,
        MENU,
    ),
    text(
        Step::EducationPeriod,
        Section::Education,
        TextField::EducationPeriod,
        Step::EducationSpecialty,
        Step::EducationInstitution,
    ),
    text(
        Step::EducationSpecialty,
        Section::Education,
        TextField::EducationSpecialty,
        Step::EducationDocument,
        Step::EducationPeriod,
    ),
    text(
        Step::EducationDocument,
        Section::Education,
        TextField::EducationDocument,
        Step::Diploma,
        Step::EducationSpecialty,
    ),
    file(Step::Diploma, Section::Education, FileField::Diploma, MENU, Step::EducationDocument),
    // ── Work experience ─────────────────────────────────────────────
    work(Step::WorkPeriod, WorkField::Period, Step::WorkOrganization, MENU),
    work(Step::WorkOrganization, WorkField::Organization, Step::WorkPosition, Step::WorkPeriod),
    work(Step::WorkPosition, WorkField::Position, Step::WorkDuties, Step::WorkOrganization),
    work(Step::WorkDuties, WorkField::Duties, Step::WorkAddMore, Step::WorkPosition),
    // The "add" branch is handled by the machine; this is the "continue" edge.
    ask(
        Step::WorkAddMore,
        Section::WorkExperience,
        StepKind::AddMore,
        Next::To(MENU),
        Step::WorkDuties,
    ),
    // ── Readiness ───────────────────────────────────────────────────
    text(Step::Track, Section::Readiness, TextField::Track, Step::StartDate, MENU),
    text(Step::StartDate, Section::Readiness, TextField::StartDate, Step::BusinessTrips, Step::Track),
    flag(
        Step::BusinessTrips,
        Section::Readiness,
        FlagField::BusinessTrips,
        Step::City,
        Step::StartDate,
    ),
    text(Step::City, Section::Readiness, TextField::City, MENU, Step::BusinessTrips),
    // ── Consents ────────────────────────────────────────────────────
    gate(
        Step::PersonalDataConsent,
        Section::Consents,
        StepKind::Flag(FlagField::PersonalDataConsent),
        Next::To(Step::RotationConsent),
        MENU,
    ),
    flag(
        Step::RotationConsent,
        Section::Consents,
        FlagField::RotationConsent,
        MENU,
        Step::PersonalDataConsent,
    ),
    // ── Comments ────────────────────────────────────────────────────
    ask(
        Step::Comments,
        Section::Comments,
        StepKind::Text(TextField::Comments),
        Next::IfForeign {
            then: Step::Tuberculosis,
            otherwise: MENU,
        },
        MENU,
    ),
    // ── Confirmations ───────────────────────────────────────────────
    gate(
        Step::Tuberculosis,
        Section::Confirmations,
        StepKind::Flag(FlagField::Tuberculosis),
        Next::To(Step::ChronicDiseases),
        MENU,
    ),
    gate(
        Step::ChronicDiseases,
        Section::Confirmations,
        StepKind::Flag(FlagField::ChronicDiseases),
        Next::To(Step::RussiaStay),
        Step::Tuberculosis,
    ),
    flag(
        Step::RussiaStay,
        Section::Confirmations,
        FlagField::RussiaStay,
        Step::NinetyDaysWarning,
        Step::ChronicDiseases,
    ),
    flag(
        Step::NinetyDaysWarning,
        Section::Confirmations,
        FlagField::NinetyDaysWarning,
        Step::DocumentsReadiness,
        Step::RussiaStay,
    ),
    flag(
        Step::DocumentsReadiness,
        Section::Confirmations,
        FlagField::DocumentsReadiness,
        Step::SelfEmployment,
        Step::NinetyDaysWarning,
    ),
    flag(
        Step::SelfEmployment,
        Section::Confirmations,
        FlagField::SelfEmployment,
        Step::Compensation,
        Step::DocumentsReadiness,
    ),
    flag(
        Step::Compensation,
        Section::Confirmations,
        FlagField::Compensation,
        MENU,
        Step::SelfEmployment,
    ),
];

/// Graph row for a question step. `None` for control states.
pub fn lookup(step: Step) -> Option<&'static StepSpec> {
    STEPS.iter().find(|s| s.step == step)
}

/// Entry step of a section.
pub fn first_step(section: Section) -> Step {
    match section {
        Section::Personal => Step::Surname,
        Section::Passport => Step::PassportSeriesNumber,
        Section::Contacts => Step::Phone,
        Section::Documents => Step::MedicalBook,
        Section::Education => Step::EducationInstitution,
        Section::WorkExperience => Step::WorkPeriod,
        Section::Readiness => Step::Track,
        Section::Consents => Step::PersonalDataConsent,
        Section::Comments => Step::Comments,
        Section::Confirmations => Step::Tuberculosis,
    }
}

/// Section a step belongs to, if it is a question.
pub fn section_of(step: Step) -> Option<Section> {
    lookup(step).map(|s| s.section)
}

/// Whether the step takes an attachment.
pub fn expects_file(step: Step) -> bool {
    matches!(lookup(step).map(|s| s.kind), Some(StepKind::File(_)))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn targets(next: Next) -> Vec<Step> {
        match next {
            Next::To(s) => vec![s],
            Next::IfForeign { then, otherwise } | Next::IfCitizenshipUnset { then, otherwise } => {
                vec![then, otherwise]
            }
        }
    }

    #[test]
    fn fifty_three_unique_question_steps() {
        assert_eq!(STEPS.len(), 53);
        let unique: HashSet<Step> = STEPS.iter().map(|s| s.step).collect();
        assert_eq!(unique.len(), 53);
        assert!(STEPS.iter().all(|s| s.step.is_question()));
    }

    #[test]
    fn first_step_of_each_section_goes_back_to_menu() {
        for section in Section::ALL {
            let first = first_step(section);
            let row = lookup(first).unwrap();
            assert_eq!(row.section, section);
            assert_eq!(row.back, Step::SectionMenu, "{first} should go back to menu");
        }
    }

    #[test]
    fn back_is_the_unique_static_predecessor() {
        // Every question reached from another question names it as `back`,
        // except section entries reached through the comments fork.
        for row in STEPS {
            for target in targets(row.next) {
                if let Some(next_row) = lookup(target) {
                    if next_row.section != row.section {
                        assert_eq!(next_row.back, Step::SectionMenu, "{target}");
                        continue;
                    }
                    assert_eq!(
                        next_row.back, row.step,
                        "{} is reached from {} but goes back to {}",
                        target, row.step, next_row.back
                    );
                }
            }
        }
    }

    #[test]
    fn every_non_first_step_is_reachable_from_its_back() {
        for row in STEPS {
            if row.back == Step::SectionMenu {
                continue;
            }
            let prev = lookup(row.back).unwrap();
            assert!(
                targets(prev.next).contains(&row.step),
                "{} does not lead to {}",
                prev.step,
                row.step
            );
        }
    }

    #[test]
    fn back_from_confirmations_returns_to_menu() {
        let row = lookup(first_step(Section::Confirmations)).unwrap();
        assert_eq!(row.step, Step::Tuberculosis);
        assert_eq!(row.back, Step::SectionMenu);
    }

    #[test]
    fn mandatory_gates() {
        let mandatory: Vec<Step> = STEPS.iter().filter(|s| s.mandatory).map(|s| s.step).collect();
        assert_eq!(
            mandatory,
            vec![Step::PersonalDataConsent, Step::Tuberculosis, Step::ChronicDiseases]
        );
    }

    #[test]
    fn steps_stay_within_their_section() {
        for row in STEPS {
            for target in targets(row.next) {
                if let Some(next_row) = lookup(target) {
                    // Comments hands over to confirmations for foreign citizens.
                    if row.step == Step::Comments {
                        continue;
                    }
                    assert_eq!(next_row.section, row.section, "{} → {}", row.step, target);
                }
            }
        }
    }

    #[test]
    fn file_steps() {
        assert!(expects_file(Step::Photo3x4));
        assert!(expects_file(Step::MedicalBookFile));
        assert!(!expects_file(Step::Surname));
        assert!(!expects_file(Step::SectionMenu));
    }

    #[test]
    fn control_states_have_no_row() {
        assert!(lookup(Step::Idle).is_none());
        assert!(lookup(Step::SectionMenu).is_none());
        assert!(lookup(Step::FinalReview).is_none());
        assert_eq!(section_of(Step::RegistryCheck), Some(Section::Documents));
    }
}
