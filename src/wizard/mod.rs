//! Questionnaire wizard: step graph, transition function and the manager
//! that drives it for each user.

pub mod graph;
pub mod input;
pub mod machine;
pub mod manager;
pub mod prompts;
pub mod session;
pub mod step;

pub use input::{MenuAction, StepInput};
pub use machine::{Mutation, Outcome, Rejection, Transition};
pub use manager::WizardManager;
pub use session::WizardSession;
pub use step::{Next, Step, StepKind, StepSpec};
