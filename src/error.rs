use thiserror::Error;

use crate::coordinator::types::CoordinatorState;
use crate::ranking::SubjectId;

pub type Result<T> = std::result::Result<T, LeaderboardError>;

#[derive(Debug, Error)]
pub enum LeaderboardError {
    #[error("subject {0} not found")]
    NotFound(SubjectId),
    #[error("subject {0} is already registered")]
    AlreadyRegistered(SubjectId),
    #[error("bootstrap source unavailable: {0}")]
    BootstrapSourceUnavailable(#[source] anyhow::Error),
    #[error("corrupted bootstrap payload: {0}")]
    CorruptedBootstrapPayload(String),
    #[error("coordinator not ready (state: {0:?})")]
    NotReady(CoordinatorState),
    #[error("registration sequence space is exhausted")]
    RegistrationSequenceExhausted,
    #[error("invalid page request: page {page}, page_size {page_size}")]
    InvalidPage { page: u64, page_size: u64 },
}
