use thiserror::Error;

use crate::roster::StudentId;

/// Reasons a roster cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    #[error("roster must contain at least one student")]
    Empty,

    #[error("student id {0} appears more than once in the roster")]
    DuplicateId(StudentId),
}
