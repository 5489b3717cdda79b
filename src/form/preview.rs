//! Human-readable preview of a form record.

use std::fmt::Write;

use crate::form::model::{
    Confirmations, Consents, Contacts, Documents, Education, Field, FileRef, FormRecord,
    PassportData, PersonalData, Readiness, Section, WorkEntry,
};

const NOT_SET: &str = "Не указано";
const DUTIES_PREVIEW_CHARS: usize = 50;
const COMMENTS_PREVIEW_CHARS: usize = 200;

/// Render the preview: header, one block per present section, footer.
///
/// Sections absent from the record (or present but with nothing set) are
/// left out entirely.
pub fn render_preview(record: &FormRecord) -> String {
    let mut out = String::from("📋 Предпросмотр анкеты:\n\n");

    for section in Section::ALL {
        if !record.is_section_filled(section) {
            continue;
        }
        let _ = writeln!(out, "{} {}:", section.emoji(), section.title());
        match section {
            Section::Personal => {
                if let Some(s) = &record.personal_data {
                    personal(&mut out, s);
                }
            }
            Section::Passport => {
                if let Some(s) = &record.passport_data {
                    passport(&mut out, s);
                }
            }
            Section::Contacts => {
                if let Some(s) = &record.contacts {
                    contacts(&mut out, s);
                }
            }
            Section::Documents => {
                if let Some(s) = &record.documents {
                    documents(&mut out, s, record.is_foreign());
                }
            }
            Section::Education => {
                if let Some(s) = &record.education {
                    education(&mut out, s);
                }
            }
            Section::WorkExperience => work(&mut out, &record.work_experience),
            Section::Readiness => {
                if let Some(s) = &record.readiness {
                    readiness(&mut out, s);
                }
            }
            Section::Consents => {
                if let Some(s) = &record.consents {
                    consents(&mut out, s);
                }
            }
            Section::Comments => {
                if let Some(text) = record.comments.get() {
                    let _ = writeln!(out, "{}", truncate(text, COMMENTS_PREVIEW_CHARS));
                }
            }
            Section::Confirmations => {
                if let Some(s) = &record.confirmations {
                    confirmations(&mut out, s);
                }
            }
        }
        out.push('\n');
    }

    if let Some(kind) = record.citizenship_type.get() {
        let _ = writeln!(out, "🌐 Статус: {}\n", kind.label());
    }

    out.push_str("Используйте кнопки ниже для редактирования или подтверждения.");
    out
}

// ── Section blocks ──────────────────────────────────────────────────

fn personal(out: &mut String, s: &PersonalData) {
    line(out, "Фамилия", text(&s.surname));
    line(out, "Имя", text(&s.name));
    line(out, "Отчество", text(&s.patronymic));
    line(out, "Дата рождения", text(&s.birth_date));
    line(out, "Место рождения", text(&s.birth_place));
    line(out, "Гражданство", text(&s.citizenship));
    line(out, "Пол", s.gender.get().map(|g| g.label()).unwrap_or(NOT_SET));
    line(out, "Фото 3×4", file(&s.photo_3x4));
}

fn passport(out: &mut String, s: &PassportData) {
    line(out, "Серия и номер", text(&s.series_number));
    line(out, "Кем выдан", text(&s.issued_by));
    line(out, "Дата выдачи", text(&s.issue_date));
    line(out, "Код подразделения", text(&s.division_code));
    line(out, "Адрес регистрации", text(&s.registration_address));
    line(out, "Фактический адрес", text(&s.actual_address));
    line(out, "Дополнительно", text(&s.additional));
    line(out, "Фото паспорта", file(&s.photo));
}

fn contacts(out: &mut String, s: &Contacts) {
    line(out, "Телефон", text(&s.phone));
    line(out, "Email", text(&s.email));
    line(out, "Соцсети", text(&s.social_media));
}

fn documents(out: &mut String, s: &Documents, foreign: bool) {
    line(out, "Медкнижка", flag(&s.medical_book));
    line(out, "Регистрация", flag(&s.registration));
    line(out, "СНИЛС", text(&s.snils));
    line(out, "ИНН", text(&s.inn));
    line(out, "Скан медкнижки", file(&s.medical_book_file));
    if foreign {
        line(out, "ID иностранного гражданина", text(&s.foreigner_id));
        line(out, "Дактилоскопия", flag(&s.fingerprinting));
        line(out, "Медосвидетельствование", flag(&s.medical_exam));
        line(out, "Проверка по реестру", flag(&s.registry_check));
    }
}

fn education(out: &mut String, s: &Education) {
    line(out, "Учебное заведение", text(&s.institution));
    line(out, "Период обучения", text(&s.period));
    line(out, "Специальность", text(&s.specialty));
    line(out, "Документ", text(&s.document));
    line(out, "Диплом", file(&s.diploma));
}

fn work(out: &mut String, entries: &[WorkEntry]) {
    for (i, entry) in entries.iter().filter(|e| e.is_filled()).enumerate() {
        let _ = writeln!(out, "  Место {}:", i + 1);
        line(out, "  Период", text(&entry.period));
        line(out, "  Организация", text(&entry.organization));
        line(out, "  Должность", text(&entry.position));
        let duties = entry
            .duties
            .get()
            .map(|d| truncate(d, DUTIES_PREVIEW_CHARS))
            .unwrap_or_else(|| NOT_SET.to_string());
        line(out, "  Обязанности", &duties);
    }
}

fn readiness(out: &mut String, s: &Readiness) {
    line(out, "Направление", text(&s.track));
    line(out, "Дата выхода", text(&s.start_date));
    line(out, "Командировки", flag(&s.business_trips));
    line(out, "Город", text(&s.city));
}

fn consents(out: &mut String, s: &Consents) {
    line(out, "Обработка ПД", flag(&s.personal_data));
    line(out, "Разрешение на вахту", flag(&s.rotation));
}

fn confirmations(out: &mut String, s: &Confirmations) {
    line(out, "Нет туберкулёза", flag(&s.tuberculosis));
    line(out, "Нет хронических заболеваний", flag(&s.chronic_diseases));
    line(out, "Пребывание в РФ", flag(&s.russia_stay));
    line(out, "Предупреждение о 90 днях", flag(&s.ninety_days_warning));
    line(out, "Готовность оформить документы", flag(&s.documents_readiness));
    line(out, "Самозанятость", flag(&s.self_employment));
    line(out, "Компенсация затрат", flag(&s.compensation));
}

// ── Helpers ─────────────────────────────────────────────────────────

fn line(out: &mut String, label: &str, value: &str) {
    let _ = writeln!(out, "{label}: {value}");
}

fn text(field: &Field<String>) -> &str {
    field.get().map(String::as_str).unwrap_or(NOT_SET)
}

fn flag(field: &Field<bool>) -> &'static str {
    match field {
        Field::Set(true) => "✅ Да",
        Field::Set(false) => "❌ Нет",
        Field::Unset => NOT_SET,
    }
}

fn file(field: &Field<FileRef>) -> &'static str {
    if field.is_set() {
        "✅ Загружено"
    } else {
        "❌ Не загружено"
    }
}

/// Cut to `max` characters, marking the cut with an ellipsis.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut cut: String = s.chars().take(max).collect();
        cut.push('…');
        cut
    }
}
