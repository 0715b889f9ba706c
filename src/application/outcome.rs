use crate::infrastructure::error::InfraError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("overlaps block {with}")]
    Overlap { with: String },
    #[error("duration must be at least {minimum_minutes} minutes")]
    DurationTooShort { minimum_minutes: u32 },
    #[error("name must not be empty")]
    EmptyName,
    #[error("interval would cross the day boundary")]
    CrossesDayBoundary,
    #[error("start lies outside the loaded day")]
    OutsideLoadedDay,
    #[error("no free slot left in the day")]
    NoFreeSlot,
    #[error("block not found: {0}")]
    UnknownBlock(String),
    #[error("task not found: {0}")]
    UnknownTask(String),
    #[error("project not found: {0}")]
    UnknownProject(String),
    #[error("icon not in catalog: {0}")]
    UnknownIcon(String),
    #[error("task {todo_id} is not assigned to block {block_id}")]
    NotAssigned { todo_id: String, block_id: String },
    #[error("task {todo_id} is already assigned to block {block_id}")]
    AlreadyAssigned { todo_id: String, block_id: String },
    #[error("nothing to change")]
    Unchanged,
}

/// Result of a planner operation. Nothing here is a hard error: rejected and
/// failed operations leave the persisted state as it was.
#[derive(Debug)]
pub enum Outcome<T> {
    Applied(T),
    Rejected(Rejection),
    PersistenceFailed(InfraError),
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(value) => Some(value),
            _ => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }

    pub fn is_persistence_failure(&self) -> bool {
        matches!(self, Self::PersistenceFailed(_))
    }

    pub fn map<U>(self, transform: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Applied(value) => Outcome::Applied(transform(value)),
            Self::Rejected(rejection) => Outcome::Rejected(rejection),
            Self::PersistenceFailed(error) => Outcome::PersistenceFailed(error),
        }
    }
}

impl<T> From<Rejection> for Outcome<T> {
    fn from(value: Rejection) -> Self {
        Self::Rejected(value)
    }
}
