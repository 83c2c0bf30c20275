//! Error values held by tree nodes.

use std::error::Error;
use std::fmt;

use thiserror::Error;

/// Zero-argument action that re-attempts whatever produced a failure.
pub type RetryAction = Box<dyn FnOnce()>;

/// Underlying error type accepted by the tree.
pub type BoxError = Box<dyn Error + 'static>;

/// An error paired with the action that remedies it.
///
/// The description is the underlying error's description.
pub struct RetryableError {
    underlying: BoxError,
    action: RetryAction,
}

impl RetryableError {
    pub fn new(underlying: impl Into<BoxError>, action: impl FnOnce() + 'static) -> Self {
        Self {
            underlying: underlying.into(),
            action: Box::new(action),
        }
    }

    pub fn underlying(&self) -> &(dyn Error + 'static) {
        self.underlying.as_ref()
    }

    /// Split into the underlying error and its action.
    pub fn into_parts(self) -> (BoxError, RetryAction) {
        (self.underlying, self.action)
    }
}

impl fmt::Debug for RetryableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryableError")
            .field("underlying", &self.underlying)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for RetryableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.underlying)
    }
}

impl Error for RetryableError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.underlying.as_ref())
    }
}

/// A failure held by a node.
#[derive(Error, Debug)]
pub enum Failure {
    /// Externally supplied error without a remedy.
    #[error("{0}")]
    Plain(BoxError),

    /// Externally supplied error carrying a retry action.
    #[error("{0}")]
    Retryable(RetryableError),

    /// Created by the tree on a parent when several of its children fail at once.
    #[error("multiple scopes failed")]
    Aggregate,
}

impl Failure {
    pub fn plain(error: impl Into<BoxError>) -> Self {
        Self::Plain(error.into())
    }

    pub fn retryable(error: impl Into<BoxError>, action: impl FnOnce() + 'static) -> Self {
        Self::Retryable(RetryableError::new(error, action))
    }

    /// Retryable failures and the aggregate marker count as retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_) | Self::Aggregate)
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Self::Aggregate)
    }

    /// Same rendered text, the equality used by description-based removal.
    pub fn describes_same(&self, other: &dyn fmt::Display) -> bool {
        self.to_string() == other.to_string()
    }

    /// Consume the failure, yielding its retry action if it has one.
    pub(crate) fn into_action(self) -> Option<RetryAction> {
        match self {
            Self::Retryable(r) => Some(r.into_parts().1),
            Self::Plain(_) | Self::Aggregate => None,
        }
    }
}

impl From<RetryableError> for Failure {
    fn from(value: RetryableError) -> Self {
        Self::Retryable(value)
    }
}
