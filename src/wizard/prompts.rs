//! Everything the wizard says: questions, keyboards, menus and notices.

use crate::channels::{InlineButton, Keyboard, OutgoingResponse};
use crate::form::{self, FormRecord, ProgressLayout, Section};

use super::graph;
use super::input::{
    ADD_MORE, BACK, CANCEL, CONFIRM, CONTINUE, DOMESTIC, EDIT, FEMALE, FOREIGN, MALE, MY_FORM,
    MenuAction, NO, SKIP, START_FORM, YES,
};
use super::machine::Rejection;
use super::step::{Step, StepKind};

/// Question text for a step.
pub fn question(step: Step) -> &'static str {
    match step {
        Step::Idle | Step::SectionMenu => "Выберите раздел:",
        Step::FinalReview => "Подтвердите отправку анкеты:",

        Step::Surname => "Введите вашу фамилию:",
        Step::Name => "Введите имя:",
        Step::Patronymic => "Введите отчество:",
        Step::BirthDate => "Введите дату рождения (ДД.ММ.ГГГГ):",
        Step::BirthPlace => "Введите место рождения:",
        Step::Citizenship => "Введите гражданство:",
        Step::Gender => "Выберите пол:",
        Step::Photo3x4 => "Загрузите фото 3×4 (отправьте фото):",

        Step::PassportSeriesNumber => "Введите серию и номер паспорта (например: 1234 567890):",
        Step::PassportIssuedBy => "Введите кем выдан паспорт:",
        Step::PassportIssueDate => "Введите дату выдачи (ДД.ММ.ГГГГ):",
        Step::PassportDivisionCode => "Введите код подразделения:",
        Step::RegistrationAddress => "Введите адрес регистрации:",
        Step::ActualAddress => "Введите фактический адрес проживания:",
        Step::PassportAdditional => "Введите дополнительно (СНИЛС, ИНН, Грин-карта):",
        Step::PassportPhoto => "Загрузите фото паспорта (отправьте фото):",

        Step::Phone => "Введите мобильный телефон (например: +7 900 123 45 67):",
        Step::Email => "Введите электронную почту:",
        Step::SocialMedia => "Введите соцсети / мессенджеры:",
        Step::CitizenshipChoice => "Укажите ваш статус гражданства:",

        Step::MedicalBook => "Есть ли у вас медицинская книжка?",
        Step::Registration => "Есть ли у вас регистрация по месту пребывания?",
        Step::Snils => "Введите СНИЛС:",
        Step::Inn => "Введите ИНН:",
        Step::MedicalBookFile => "Загрузите медицинскую книжку (отправьте файл или фото):",
        Step::ForeignerId => "Введите номер ID иностранного гражданина:",
        Step::Fingerprinting => "Прошли ли вы дактилоскопию?",
        Step::MedicalExam => "Есть ли у вас медосмотр / допуск?",
        Step::RegistryCheck => "Проверены ли вы по реестру контролируемых лиц?",

        Step::EducationInstitution => "Введите название учебного заведения:",
        Step::EducationPeriod => "Введите период обучения (например: 2015-2019):",
        Step::EducationSpecialty => "Введите специальность / квалификацию:",
        Step::EducationDocument => "Введите серию и номер документа об образовании:",
        Step::Diploma => "Загрузите диплом / аттестат (отправьте файл или фото):",

        Step::WorkPeriod => "Введите период работы (например: 01.2020 - 12.2023):",
        Step::WorkOrganization => "Введите название организации:",
        Step::WorkPosition => "Введите должность:",
        Step::WorkDuties => "Введите основные обязанности:",
        Step::WorkAddMore => "Добавить еще один блок опыта работы?",

        Step::Track => "Укажите направление / трек, на который вы претендуете:",
        Step::StartDate => "С какой даты вы готовы приступить к работе?",
        Step::BusinessTrips => "Готовы ли вы к командировкам / вахте?",
        Step::City => "Укажите город, в котором вы готовы работать:",

        Step::PersonalDataConsent => "Согласны ли вы на обработку персональных данных?",
        Step::RotationConsent => "Даете ли вы разрешение на выезд и проживание на вахте?",

        Step::Comments => {
            "Если у вас есть дополнительные комментарии или вопросы, укажите их здесь (необязательно):"
        }

        Step::Tuberculosis => {
            "Подтверждаете ли вы, что у вас нет таких заболеваний как туберкулез, сифилис, ВИЧ?"
        }
        Step::ChronicDiseases => {
            "Подтверждаете ли вы, что у вас нет хронических заболеваний, мешающих работать на производстве?"
        }
        Step::RussiaStay => {
            "Подтверждаете ли вы, что в этом году находились в России менее 2 месяцев без оформления разрешающих документов?"
        }
        Step::NinetyDaysWarning => {
            "Подтверждаете ли вы, что вас предупредили, что в России можно находиться без разрешающих документов в течение года только 90 дней?"
        }
        Step::DocumentsReadiness => {
            "Готовы ли вы оформить разрешительные документы для работы в РФ (ИНН, СНИЛС, дактилоскопия, медицина, российский номер)?"
        }
        Step::SelfEmployment => "Согласны ли вы получать выплаты по системе самозанятости?",
        Step::Compensation => {
            "Согласны ли вы компенсировать все затраты, связанные с вашей доставкой и оформлением в России при досрочном расторжении договора?"
        }
    }
}

/// Lead-in shown above the first question of a section.
fn section_lead(section: Section) -> &'static str {
    match section {
        Section::Personal => "Начнем с основных данных.",
        Section::Passport => "Переходим к паспортным данным.",
        Section::Contacts => "Укажите контактные данные для связи.",
        Section::Documents => "Проверим наличие необходимых документов.",
        Section::Education => "Укажите информацию об образовании.",
        Section::WorkExperience => "Расскажите о вашем профессиональном опыте.",
        Section::Readiness => "Уточним вашу готовность к работе.",
        Section::Consents => "Необходимо ваше согласие на обработку данных.",
        Section::Comments => "Последний раздел.",
        Section::Confirmations => "Требуется подтверждение важных сведений.",
    }
}

fn section_number(section: Section) -> usize {
    Section::ALL
        .iter()
        .position(|s| *s == section)
        .map_or(0, |i| i + 1)
}

/// Keyboard offered with a question. Mandatory gates get no skip button.
pub fn keyboard(step: Step) -> Keyboard {
    let Some(row) = graph::lookup(step) else {
        return Keyboard::Remove;
    };
    match row.kind {
        StepKind::Flag(_) => Keyboard::reply(&[&[YES, NO], &[BACK]]),
        StepKind::Gender => Keyboard::reply(&[&[MALE, FEMALE], &[BACK]]),
        StepKind::CitizenshipChoice => Keyboard::reply(&[&[DOMESTIC, FOREIGN], &[BACK]]),
        StepKind::AddMore => Keyboard::reply(&[&[ADD_MORE, CONTINUE], &[BACK]]),
        StepKind::Text(_) | StepKind::File(_) | StepKind::Work(_) if row.mandatory => {
            Keyboard::reply(&[&[BACK]])
        }
        StepKind::Text(_) | StepKind::File(_) | StepKind::Work(_) => {
            Keyboard::reply(&[&[SKIP, BACK]])
        }
    }
}

/// Question for a step with its keyboard.
pub fn ask(step: Step) -> OutgoingResponse {
    OutgoingResponse::text(question(step)).with_keyboard(keyboard(step))
}

/// Question prefixed with a skip acknowledgement.
pub fn ask_after_skip(step: Step) -> OutgoingResponse {
    OutgoingResponse::text(format!("Пропущено. {}", question(step))).with_keyboard(keyboard(step))
}

/// Section header plus its first question.
pub fn section_intro(section: Section) -> OutgoingResponse {
    let first = graph::first_step(section);
    OutgoingResponse::text(format!(
        "{} Раздел {}: {}\n\n{} {}",
        section.emoji(),
        section_number(section),
        section.title(),
        section_lead(section),
        question(first)
    ))
    .with_keyboard(keyboard(first))
}

/// Message shown when a section is finished. The variant is fixed per
/// section so replies stay reproducible.
pub fn completion_message(section: Section) -> String {
    let title = section.title();
    match section_number(section) % 4 {
        1 => format!("✅ Раздел '{title}' успешно завершен!"),
        2 => format!("🎯 Отлично! Раздел '{title}' заполнен."),
        3 => format!("✨ Раздел '{title}' готов. Продолжаем дальше!"),
        _ => format!("🌟 Превосходно! Раздел '{title}' завершен."),
    }
}

// ── Section menu ────────────────────────────────────────────────────

/// Sections listed on the menu. Confirmations only for foreign citizens.
pub fn menu_sections(record: &FormRecord) -> Vec<Section> {
    Section::ALL
        .into_iter()
        .filter(|s| *s != Section::Confirmations || record.is_foreign())
        .collect()
}

/// Inline keyboard of sections with a finish button. Filled sections are
/// marked with a check.
pub fn menu_keyboard(record: &FormRecord) -> Keyboard {
    let mut rows: Vec<Vec<InlineButton>> = menu_sections(record)
        .into_iter()
        .map(|section| {
            let mark = if record.is_section_filled(section) {
                "✅"
            } else {
                section.emoji()
            };
            vec![InlineButton::new(
                format!("{mark} {}", section.title()),
                MenuAction::Open(section).token(),
            )]
        })
        .collect();
    rows.push(vec![InlineButton::new(
        "✅ Завершить анкету",
        MenuAction::Finish.token(),
    )]);
    Keyboard::Inline(rows)
}

/// Progress block followed by the section menu.
pub fn section_menu(record: &FormRecord, layout: ProgressLayout, heading: &str) -> OutgoingResponse {
    let progress = form::score(record, layout);
    let mut text = String::new();
    if !heading.is_empty() {
        text.push_str(heading);
        text.push_str("\n\n");
    }
    text.push_str(&progress.render());
    text.push_str("\n\nВыберите раздел:");
    OutgoingResponse::text(text).with_keyboard(menu_keyboard(record))
}

/// Menu shown when a section was just completed.
pub fn section_done(record: &FormRecord, layout: ProgressLayout, section: Section) -> OutgoingResponse {
    section_menu(record, layout, &completion_message(section))
}

// ── Commands ────────────────────────────────────────────────────────

pub fn main_keyboard() -> Keyboard {
    Keyboard::reply(&[&[START_FORM, MY_FORM], &[CANCEL]])
}

pub fn welcome() -> OutgoingResponse {
    OutgoingResponse::text(
        "👋 Добро пожаловать в систему заполнения анкеты!\n\n\
         📊 Я помогу вам пройти процесс заполнения анкеты пошагово.\n\
         🎯 Каждый заполненный раздел приближает вас к завершению.\n\n\
         Нажмите кнопку ниже, чтобы начать заполнение.",
    )
    .with_keyboard(main_keyboard())
}

pub fn help() -> OutgoingResponse {
    OutgoingResponse::text(
        "📋 Помощь по использованию бота:\n\n\
         /start - Начать работу с ботом\n\
         /form - Заполнить или продолжить анкету\n\
         /myform - Показать текущую анкету\n\
         /cancel - Отменить заполнение анкеты\n\
         /help - Показать это сообщение\n\n\
         Анкета состоит из нескольких разделов. \
         Вы можете заполнять их по порядку или переходить к нужному разделу.",
    )
}

/// Heading for the menu when the wizard is (re)started.
pub fn start_heading(resumed: bool) -> &'static str {
    if resumed {
        "📝 Продолжение заполнения анкеты"
    } else {
        "📝 Заполнение анкеты"
    }
}

/// Preview of the current record with progress.
pub fn my_form(record: &FormRecord, layout: ProgressLayout) -> OutgoingResponse {
    let progress = form::score(record, layout);
    OutgoingResponse::text(format!(
        "{}\n\n{}",
        progress.render(),
        form::render_preview(record)
    ))
    .with_keyboard(menu_keyboard(record))
}

pub fn review(record: &FormRecord) -> OutgoingResponse {
    OutgoingResponse::text(format!(
        "{}\n\n{}",
        form::render_preview(record),
        question(Step::FinalReview)
    ))
    .with_keyboard(Keyboard::reply(&[&[CONFIRM], &[EDIT, CANCEL]]))
}

pub fn submitted(record: &FormRecord, layout: ProgressLayout) -> OutgoingResponse {
    let progress = form::score(record, layout);
    OutgoingResponse::text(format!(
        "🎉 Поздравляем! Анкета успешно отправлена!\n\n\
         📊 Финальный прогресс: {} {}%\n\
         ✨ Спасибо за заполнение. Ваши данные сохранены.",
        progress.bar(),
        progress.percentage
    ))
    .with_keyboard(main_keyboard())
}

pub fn cancelled() -> OutgoingResponse {
    OutgoingResponse::text(
        "❌ Заполнение анкеты отменено. Введенные ответы сохранены, \
         вы сможете продолжить позже.",
    )
    .with_keyboard(main_keyboard())
}

pub fn no_form() -> OutgoingResponse {
    OutgoingResponse::text("❌ Анкета еще не заполнена. Начните заполнение.")
        .with_keyboard(main_keyboard())
}

pub fn not_started() -> OutgoingResponse {
    OutgoingResponse::text("Нажмите «📝 Начать заполнение анкеты», чтобы начать.")
        .with_keyboard(main_keyboard())
}

pub fn persist_failed() -> OutgoingResponse {
    OutgoingResponse::text(
        "⚠️ Не удалось сохранить ответ. Он не потерян и будет сохранен при следующем шаге.",
    )
}

pub fn load_failed() -> OutgoingResponse {
    OutgoingResponse::text("⚠️ Не удалось загрузить анкету. Попробуйте еще раз чуть позже.")
        .with_keyboard(main_keyboard())
}

pub fn attachment_failed(step: Step) -> OutgoingResponse {
    OutgoingResponse::text(format!(
        "❌ Не удалось загрузить файл. Попробуйте еще раз.\n\n{}",
        question(step)
    ))
    .with_keyboard(keyboard(step))
}

pub fn submit_failed() -> OutgoingResponse {
    OutgoingResponse::text(
        "⚠️ Не удалось отправить анкету. Попробуйте подтвердить еще раз чуть позже.",
    )
    .with_keyboard(Keyboard::reply(&[&[CONFIRM], &[EDIT, CANCEL]]))
}

/// Explanation for a refused input. The caller repeats the question.
pub fn rejection_text(rejection: Rejection) -> &'static str {
    match rejection {
        Rejection::EmptyText => "❌ Ответ не может быть пустым.",
        Rejection::TextExpected => "❌ Здесь нужен текстовый ответ.",
        Rejection::FileExpected => "❌ Пожалуйста, отправьте файл или фото.",
        Rejection::UnknownChoice => "❌ Пожалуйста, выберите вариант на клавиатуре.",
        Rejection::MandatorySkip | Rejection::MandatoryNo => {
            "❌ Для продолжения необходимо ответить «Да» на этот вопрос."
        }
        Rejection::ForeignOnly => "❌ Этот раздел заполняют только иностранные граждане.",
        Rejection::EmptyForm => "❌ Анкета пуста. Заполните хотя бы один раздел.",
        Rejection::UseMenu => "Выберите раздел с помощью кнопок ниже.",
        Rejection::NotStarted => "Нажмите «📝 Начать заполнение анкеты», чтобы начать.",
    }
}

/// Rejection notice with the step's question repeated.
pub fn rejected(rejection: Rejection, step: Step) -> OutgoingResponse {
    if step.is_question() {
        OutgoingResponse::text(format!("{}\n\n{}", rejection_text(rejection), question(step)))
            .with_keyboard(keyboard(step))
    } else {
        OutgoingResponse::text(rejection_text(rejection))
    }
}
