//! Text rendering of error trees for diagnostics.

use std::fmt;

use itertools::Itertools;
use termtree::Tree;

use crate::domain::arena::{ErrorNode, ErrorTree, NodeId};
use crate::domain::behavior::{PresentationBehavior, RetryBehavior};
use crate::domain::error::DomainResult;

/// What a rendered node line contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Show tags instead of node ids
    pub show_tags: bool,
    /// List failure descriptions after the status
    pub show_errors: bool,
    /// Cap on listed failure descriptions per node
    pub max_errors: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_tags: true,
            show_errors: true,
            max_errors: 3,
        }
    }
}

/// Status of a node as one line of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLabel {
    pub name: String,
    pub status: NodeStatus,
    pub presentation: PresentationBehavior,
    pub retry: RetryBehavior,
    pub errors: Vec<String>,
    pub hidden_errors: usize,
}

/// Display state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Ok,
    /// Has failures and is shown
    Showing,
    /// Has failures but an ancestor displays for it
    Suppressed,
    /// No failures, suppression flag still set
    Hidden,
}

impl NodeStatus {
    pub fn of(node: &ErrorNode) -> Self {
        match (node.has_error(), node.is_presentation_suppressed()) {
            (false, false) => Self::Ok,
            (true, false) => Self::Showing,
            (true, true) => Self::Suppressed,
            (false, true) => Self::Hidden,
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Showing => write!(f, "FAILED"),
            Self::Suppressed => write!(f, "failed (suppressed)"),
            Self::Hidden => write!(f, "ok (suppressed)"),
        }
    }
}

impl NodeLabel {
    pub fn new(id: NodeId, node: &ErrorNode, options: &RenderOptions) -> Self {
        let name = if options.show_tags {
            node.tag().to_string()
        } else {
            id.to_string()
        };
        let (errors, hidden_errors) = if options.show_errors {
            let shown: Vec<String> = node
                .failures()
                .iter()
                .take(options.max_errors)
                .map(ToString::to_string)
                .collect();
            let hidden = node.failures().len() - shown.len();
            (shown, hidden)
        } else {
            (Vec::new(), node.failures().len())
        };
        Self {
            name,
            status: NodeStatus::of(node),
            presentation: node.presentation(),
            retry: node.retry_behavior(),
            errors,
            hidden_errors,
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.status)?;
        if self.presentation == PresentationBehavior::PrefersDisplay {
            write!(f, " !display")?;
        }
        if self.retry != RetryBehavior::Ancestor {
            write!(f, " retry={}", self.retry)?;
        }
        if !self.errors.is_empty() {
            write!(f, ": {}", self.errors.iter().join("; "))?;
        }
        if self.hidden_errors > 0 {
            write!(f, " (+{})", self.hidden_errors)?;
        }
        Ok(())
    }
}

impl ErrorTree {
    /// Render the subtree rooted at `id`.
    pub fn render(&self, id: NodeId, options: &RenderOptions) -> DomainResult<Tree<NodeLabel>> {
        let node = self.node(id)?;
        let leaves = node
            .children()
            .iter()
            .map(|&child| self.render(child, options))
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(Tree::new(NodeLabel::new(id, node, options)).with_leaves(leaves))
    }

    /// Render every root, in the order they became roots.
    pub fn render_all(&self, options: &RenderOptions) -> DomainResult<Vec<Tree<NodeLabel>>> {
        self.roots()
            .iter()
            .map(|&root| self.render(root, options))
            .collect()
    }
}
