//! Progress scoring: how much of the questionnaire is filled.

use std::str::FromStr;

use serde::Serialize;

use crate::form::model::{FormRecord, Section};

const BAR_FILLED: &str = "█";
const BAR_EMPTY: &str = "░";
const BAR_MAX_LEN: usize = 10;

/// Which sections count toward progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProgressLayout {
    /// All ten sections.
    #[default]
    Full,
    /// Seven sections, as in the short form layout.
    Compact,
}

impl ProgressLayout {
    pub fn sections(&self) -> &'static [Section] {
        match self {
            Self::Full => &[
                Section::Personal,
                Section::Passport,
                Section::Contacts,
                Section::Documents,
                Section::Education,
                Section::WorkExperience,
                Section::Readiness,
                Section::Consents,
                Section::Confirmations,
                Section::Comments,
            ],
            Self::Compact => &[
                Section::Personal,
                Section::Passport,
                Section::Contacts,
                Section::Documents,
                Section::Readiness,
                Section::Consents,
                Section::Comments,
            ],
        }
    }
}

impl FromStr for ProgressLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown progress layout '{other}' (expected full or compact)")),
        }
    }
}

/// Motivational band for a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    NotStarted,
    Started,
    Quarter,
    Half,
    Momentum,
    FinalStretch,
    Complete,
}

impl Tier {
    pub fn from_percentage(percentage: u32) -> Self {
        match percentage {
            0 => Self::NotStarted,
            1..=19 => Self::Started,
            20..=39 => Self::Quarter,
            40..=59 => Self::Half,
            60..=79 => Self::Momentum,
            80..=99 => Self::FinalStretch,
            _ => Self::Complete,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::NotStarted => "🎯 Начните заполнение анкеты — первый шаг к успеху!",
            Self::Started => "🌱 Отличное начало! Продолжайте в том же духе.",
            Self::Quarter => "📈 Вы на правильном пути! Уже четверть пути пройдено.",
            Self::Half => "💪 Половина работы уже сделана! Осталось совсем немного.",
            Self::Momentum => "🚀 Отличный прогресс! Вы почти у цели.",
            Self::FinalStretch => "✨ Финальный рывок! Осталось заполнить последние разделы.",
            Self::Complete => "🎉 Поздравляем! Анкета полностью заполнена!",
        }
    }
}

/// Result of scoring a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub percentage: u32,
    pub tier: Tier,
}

impl Progress {
    /// Fixed-width bar of `min(total, 10)` glyphs.
    pub fn bar(&self) -> String {
        let len = self.total.min(BAR_MAX_LEN);
        let filled = if self.total == 0 {
            0
        } else {
            (self.completed * len / self.total).min(len)
        };
        let mut bar = BAR_FILLED.repeat(filled);
        bar.push_str(&BAR_EMPTY.repeat(len - filled));
        bar
    }

    /// Multi-line block shown to the user.
    pub fn render(&self) -> String {
        format!(
            "📊 Прогресс заполнения: {}/{} разделов ({}%)\n{}\n\n{}",
            self.completed,
            self.total,
            self.percentage,
            self.bar(),
            self.tier.message()
        )
    }
}

/// Score a record against the given layout.
pub fn score(record: &FormRecord, layout: ProgressLayout) -> Progress {
    let sections = layout.sections();
    let total = sections.len();
    let completed = sections
        .iter()
        .filter(|s| record.is_section_filled(**s))
        .count();
    let percentage = if total == 0 {
        0
    } else {
        (completed * 100 / total) as u32
    };
    Progress {
        completed,
        total,
        percentage,
        tier: Tier::from_percentage(percentage),
    }
}
