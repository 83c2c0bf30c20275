//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::arena::NodeId;

/// Domain errors represent misuse of the error tree.
///
/// Failures *held* by nodes are data (see [`Failure`](crate::domain::Failure)),
/// never returned through this type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("error tree is already borrowed (re-entrant call from a listener?)")]
    TreeBorrowed,
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
