//! Anketa Bot: a questionnaire wizard for job applicants.

pub mod api;
pub mod attachments;
pub mod bot;
pub mod channels;
pub mod config;
pub mod error;
pub mod export;
pub mod form;
pub mod store;
pub mod wizard;
