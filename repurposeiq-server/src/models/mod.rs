//! Wire-facing DTOs shared by handlers and background services.

pub mod user;
pub mod workflow;

pub use user::UserPublic;
pub use workflow::{StepCondition, Workflow, WorkflowStep};
