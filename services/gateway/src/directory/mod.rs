//! Read-mostly adapter for the shared user directory.

mod models;
pub mod repo;

pub use models::{Admin, LoginToken, MetaType, Parent, RoleRecord, Student, Teacher, User};
pub use repo::LinkOutcome;
