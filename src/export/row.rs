//! Spreadsheet row layout: 14 fixed columns per submitted form.

use crate::form::{FlagField, FormRecord, TextField};
use crate::store::StoredForm;

/// Column titles, in order.
pub const HEADER: [&str; 14] = [
    "ID",
    "Дата заполнения",
    "ФИО",
    "Телефон",
    "Гражданство",
    "Направление",
    "Город",
    "Дата выхода",
    "Паспорт",
    "ID иностранца",
    "Проверка по реестру",
    "Медицина / дактилоскопия",
    "Согласия / подтверждения",
    "Комментарии",
];

pub const COLUMN_COUNT: usize = HEADER.len();

const MEDICAL_FLAGS: [(FlagField, &str); 4] = [
    (FlagField::MedicalBook, "Медкнижка"),
    (FlagField::Registration, "Регистрация"),
    (FlagField::Fingerprinting, "Дактилоскопия"),
    (FlagField::MedicalExam, "Медосмотр"),
];

const CONSENT_FLAGS: [(FlagField, &str); 10] = [
    (FlagField::PersonalDataConsent, "Согласие на обработку ПД"),
    (FlagField::RotationConsent, "Вахта"),
    (FlagField::BusinessTrips, "Командировки"),
    (FlagField::Tuberculosis, "Нет тяжелых заболеваний"),
    (FlagField::ChronicDiseases, "Нет хронических заболеваний"),
    (FlagField::RussiaStay, "Пребывание в РФ"),
    (FlagField::NinetyDaysWarning, "Предупрежден о 90 днях"),
    (FlagField::DocumentsReadiness, "Готов оформить документы"),
    (FlagField::SelfEmployment, "Самозанятость"),
    (FlagField::Compensation, "Компенсация"),
];

pub fn yes_no(value: bool) -> &'static str {
    if value { "Да" } else { "Нет" }
}

/// Map a stored form to exactly `COLUMN_COUNT` cells.
pub fn to_row(stored: &StoredForm) -> Vec<String> {
    let record = &stored.record;
    let text = |field: TextField| record.text(field).unwrap_or_default().to_string();

    let mut row = vec![
        stored.user_id.clone(),
        stored.filled_at.format("%d.%m.%Y").to_string(),
        record.full_name(),
        text(TextField::Phone),
        citizenship(record),
        text(TextField::Track),
        text(TextField::City),
        text(TextField::StartDate),
        text(TextField::PassportSeriesNumber),
        text(TextField::ForeignerId),
        record
            .flag(FlagField::RegistryCheck)
            .map(yes_no)
            .unwrap_or_default()
            .to_string(),
        summary(record, &MEDICAL_FLAGS),
        summary(record, &CONSENT_FLAGS),
        text(TextField::Comments),
    ];
    row.resize(COLUMN_COUNT, String::new());
    row
}

/// Typed citizenship answer and the domestic/foreign choice, whichever
/// are present.
fn citizenship(record: &FormRecord) -> String {
    let typed = record.text(TextField::Citizenship);
    let kind = record.citizenship_type.get().map(|k| k.label());
    match (typed, kind) {
        (Some(t), Some(k)) => format!("{t} ({k})"),
        (Some(t), None) => t.to_string(),
        (None, Some(k)) => k.to_string(),
        (None, None) => String::new(),
    }
}

/// `Label: Да/Нет` for every set flag, joined by `; `.
fn summary(record: &FormRecord, flags: &[(FlagField, &str)]) -> String {
    flags
        .iter()
        .filter_map(|(field, label)| record.flag(*field).map(|v| format!("{label}: {}", yes_no(v))))
        .collect::<Vec<_>>()
        .join("; ")
}
