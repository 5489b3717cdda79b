//! Questionnaire data: the record tree, progress scoring and preview text.

pub mod model;
pub mod preview;
pub mod progress;

pub use model::{
    CitizenshipType, Field, FileField, FileRef, FlagField, FormRecord, Gender, Section, TextField,
    WorkField,
};
pub use preview::render_preview;
pub use progress::{Progress, ProgressLayout, Tier, score};
