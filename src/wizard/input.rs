//! User input as the wizard sees it, plus the keyboard labels it recognizes.

use crate::form::{CitizenshipType, FileRef, Gender, Section};

// ── Keyboard labels ─────────────────────────────────────────────────

pub const SKIP: &str = "⏭️ Пропустить";
pub const BACK: &str = "⏪ Назад";
pub const YES: &str = "✅ Да";
pub const NO: &str = "❌ Нет";
pub const MALE: &str = "👨 Мужской";
pub const FEMALE: &str = "👩 Женский";
pub const ADD_MORE: &str = "➕ Добавить еще";
pub const CONTINUE: &str = "➡️ Продолжить";
pub const DOMESTIC: &str = "🇷🇺 Гражданин России";
pub const FOREIGN: &str = "🌍 Иностранный гражданин";
pub const CONFIRM: &str = "✅ Подтвердить и отправить";
pub const EDIT: &str = "✏️ Редактировать";
pub const CANCEL: &str = "❌ Отменить";
pub const START_FORM: &str = "📝 Начать заполнение анкеты";
pub const MY_FORM: &str = "📋 Моя анкета";

/// One wizard input after transport details are stripped away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepInput {
    Skip,
    Back,
    Text(String),
    /// An attachment. Stored on disk only when the current step expects one.
    File(FileRef),
}

impl StepInput {
    /// Classify a text message: the skip/back buttons (or their slash
    /// aliases) become control inputs, everything else is an answer.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        match trimmed {
            SKIP | "/skip" => Self::Skip,
            BACK | "/back" => Self::Back,
            _ => Self::Text(trimmed.to_string()),
        }
    }
}

/// Choice offered at the end of a work-experience entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddMoreChoice {
    Add,
    Continue,
}

/// Choice offered on the final review screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewChoice {
    Confirm,
    Edit,
    Cancel,
}

// ── Menu callbacks ──────────────────────────────────────────────────

pub const SECTION_CALLBACK_PREFIX: &str = "section:";
pub const FINISH_CALLBACK: &str = "finish_form";

/// An inline-button press on the section menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Open(Section),
    Finish,
}

impl MenuAction {
    pub fn parse(token: &str) -> Option<Self> {
        if token == FINISH_CALLBACK {
            return Some(Self::Finish);
        }
        token
            .strip_prefix(SECTION_CALLBACK_PREFIX)
            .and_then(Section::from_key)
            .map(Self::Open)
    }

    pub fn token(&self) -> String {
        match self {
            Self::Open(section) => format!("{SECTION_CALLBACK_PREFIX}{}", section.key()),
            Self::Finish => FINISH_CALLBACK.to_string(),
        }
    }
}

/// Match a label exactly, or any of the plain aliases case-insensitively.
fn matches_any(text: &str, label: &str, aliases: &[&str]) -> bool {
    let text = text.trim();
    if text == label {
        return true;
    }
    let lower = text.to_lowercase();
    aliases.iter().any(|a| lower == *a)
}

pub fn parse_yes_no(text: &str) -> Option<bool> {
    if matches_any(text, YES, &["да", "yes", "y", "д"]) {
        Some(true)
    } else if matches_any(text, NO, &["нет", "no", "n", "н"]) {
        Some(false)
    } else {
        None
    }
}

pub fn parse_gender(text: &str) -> Option<Gender> {
    if matches_any(text, MALE, &["мужской", "м", "male", "m"]) {
        Some(Gender::Male)
    } else if matches_any(text, FEMALE, &["женский", "ж", "female", "f"]) {
        Some(Gender::Female)
    } else {
        None
    }
}

pub fn parse_citizenship(text: &str) -> Option<CitizenshipType> {
    if matches_any(text, DOMESTIC, &["гражданин россии", "рф", "domestic"]) {
        Some(CitizenshipType::Domestic)
    } else if matches_any(text, FOREIGN, &["иностранный гражданин", "иностранец", "foreign"]) {
        Some(CitizenshipType::Foreign)
    } else {
        None
    }
}

pub fn parse_add_more(text: &str) -> Option<AddMoreChoice> {
    if matches_any(text, ADD_MORE, &["добавить", "добавить еще", "add"]) {
        Some(AddMoreChoice::Add)
    } else if matches_any(text, CONTINUE, &["продолжить", "continue"]) {
        Some(AddMoreChoice::Continue)
    } else {
        None
    }
}

pub fn parse_review(text: &str) -> Option<ReviewChoice> {
    if matches_any(text, CONFIRM, &["подтвердить", "confirm"]) {
        Some(ReviewChoice::Confirm)
    } else if matches_any(text, EDIT, &["редактировать", "edit"]) {
        Some(ReviewChoice::Edit)
    } else if matches_any(text, CANCEL, &["отменить", "cancel"]) {
        Some(ReviewChoice::Cancel)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_labels_are_classified() {
        assert_eq!(StepInput::from_text(SKIP), StepInput::Skip);
        assert_eq!(StepInput::from_text(" /back "), StepInput::Back);
        assert_eq!(
            StepInput::from_text("  Иванов "),
            StepInput::Text("Иванов".into())
        );
    }

    #[test]
    fn yes_no_accepts_labels_and_aliases() {
        assert_eq!(parse_yes_no(YES), Some(true));
        assert_eq!(parse_yes_no("Да"), Some(true));
        assert_eq!(parse_yes_no("NO"), Some(false));
        assert_eq!(parse_yes_no(NO), Some(false));
        assert_eq!(parse_yes_no("может быть"), None);
    }

    #[test]
    fn choice_parsers() {
        assert_eq!(parse_gender(FEMALE), Some(Gender::Female));
        assert_eq!(parse_gender("м"), Some(Gender::Male));
        assert_eq!(parse_citizenship(FOREIGN), Some(CitizenshipType::Foreign));
        assert_eq!(parse_citizenship("РФ"), Some(CitizenshipType::Domestic));
        assert_eq!(parse_add_more(ADD_MORE), Some(AddMoreChoice::Add));
        assert_eq!(parse_add_more(CONTINUE), Some(AddMoreChoice::Continue));
        assert_eq!(parse_review(CONFIRM), Some(ReviewChoice::Confirm));
        assert_eq!(parse_review("edit"), Some(ReviewChoice::Edit));
        assert_eq!(parse_review("whatever"), None);
    }

    #[test]
    fn menu_callbacks() {
        assert_eq!(
            MenuAction::parse("section:work_experience"),
            Some(MenuAction::Open(Section::WorkExperience))
        );
        assert_eq!(MenuAction::parse("finish_form"), Some(MenuAction::Finish));
        assert_eq!(MenuAction::parse("section:nope"), None);
        assert_eq!(MenuAction::parse("section_1"), None);
        assert_eq!(MenuAction::Open(Section::Passport).token(), "section:passport");
    }
}
