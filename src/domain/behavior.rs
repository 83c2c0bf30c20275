//! Per-node behaviors, fixed at creation time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether aggregation on a parent may hide this node's own display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PresentationBehavior {
    /// The node can be folded into an aggregate error on its parent.
    #[default]
    AcceptsSuppression,
    /// The node always displays its own errors; vetoes aggregation among its siblings.
    PrefersDisplay,
}

/// Which node(s) a retry request on this node ultimately targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RetryBehavior {
    /// Delegate to the parent's retry, ending at a parentless node.
    #[default]
    Ancestor,
    /// Retry this node and its subtree only.
    Descendants,
    /// Retry every child of the parent (and their subtrees), not the parent itself.
    Siblings,
}

impl fmt::Display for PresentationBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AcceptsSuppression => write!(f, "accepts-suppression"),
            Self::PrefersDisplay => write!(f, "prefers-display"),
        }
    }
}

impl fmt::Display for RetryBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ancestor => write!(f, "ancestor"),
            Self::Descendants => write!(f, "descendants"),
            Self::Siblings => write!(f, "siblings"),
        }
    }
}

/// Error parsing a behavior name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BehaviorParseError {
    #[error("unknown presentation behavior: {0}")]
    Presentation(String),

    #[error("unknown retry behavior: {0}")]
    Retry(String),
}

impl FromStr for PresentationBehavior {
    type Err = BehaviorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "accepts-suppression" => Ok(Self::AcceptsSuppression),
            "prefers-display" => Ok(Self::PrefersDisplay),
            other => Err(BehaviorParseError::Presentation(other.to_string())),
        }
    }
}

impl FromStr for RetryBehavior {
    type Err = BehaviorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ancestor" => Ok(Self::Ancestor),
            "descendants" => Ok(Self::Descendants),
            "siblings" => Ok(Self::Siblings),
            other => Err(BehaviorParseError::Retry(other.to_string())),
        }
    }
}
