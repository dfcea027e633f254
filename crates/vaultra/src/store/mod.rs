//! Persistence seam. Each domain module declares the repository trait it needs; the
//! in-process [`MemoryStore`] implements all of them with the same unique constraints a
//! relational backend would enforce.

mod memory;

pub use memory::MemoryStore;

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("{0} already exists")]
    Conflict(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
