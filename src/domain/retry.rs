//! Retry dispatch and execution.
//!
//! Retrying happens in two phases. [`ErrorTree::plan_retry`] resolves the
//! target from the node's [`RetryBehavior`], clears failures and suppression
//! across it and collects the retry actions. [`RetryPlan::run`] then invokes
//! the actions in order, with no borrow of the tree held, so an action may
//! report a fresh failure back into the tree.

use std::fmt;

use tracing::{debug, instrument, trace};

use crate::domain::arena::{ErrorTree, NodeId};
use crate::domain::behavior::RetryBehavior;
use crate::domain::error::DomainResult;
use crate::domain::failure::RetryAction;

/// The nodes a retry request resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryTarget {
    /// The node itself followed by its whole subtree.
    SelfAndDescendants(NodeId),
    /// Every child of the node and their subtrees, not the node itself.
    Descendants(NodeId),
}

impl RetryTarget {
    pub fn node(&self) -> NodeId {
        match self {
            Self::SelfAndDescendants(id) | Self::Descendants(id) => *id,
        }
    }
}

impl fmt::Display for RetryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfAndDescendants(id) => write!(f, "{} and descendants", id),
            Self::Descendants(id) => write!(f, "descendants of {}", id),
        }
    }
}

/// Retry actions collected from cleared nodes, in execution order.
pub struct RetryPlan {
    target: RetryTarget,
    cleared: Vec<NodeId>,
    actions: Vec<(NodeId, RetryAction)>,
}

impl fmt::Debug for RetryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPlan")
            .field("target", &self.target)
            .field("cleared", &self.cleared)
            .field("actions", &self.actions.len())
            .finish()
    }
}

impl RetryPlan {
    fn new(target: RetryTarget) -> Self {
        Self {
            target,
            cleared: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn target(&self) -> RetryTarget {
        self.target
    }

    /// Nodes whose failures were cleared, in visiting order.
    pub fn cleared(&self) -> &[NodeId] {
        &self.cleared
    }

    /// Nodes owning the pending actions, one entry per action.
    pub fn action_owners(&self) -> Vec<NodeId> {
        self.actions.iter().map(|(id, _)| *id).collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Invoke every collected action once, in order.
    pub fn run(self) -> RetryReport {
        let actions_invoked = self.actions.len();
        for (owner, action) in self.actions {
            trace!("retry action of {}", owner);
            action();
        }
        RetryReport {
            target: self.target,
            cleared: self.cleared,
            actions_invoked,
        }
    }
}

/// Outcome of an executed retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryReport {
    pub target: RetryTarget,
    pub cleared: Vec<NodeId>,
    pub actions_invoked: usize,
}

impl ErrorTree {
    /// Resolve which nodes retrying `id` affects.
    ///
    /// A parentless node (root or detached) always targets itself and its
    /// subtree. `Ancestor` delegates to the parent, which resolves by its own
    /// behavior in turn.
    pub fn retry_target(&self, id: NodeId) -> DomainResult<RetryTarget> {
        let node = self.node(id)?;
        let Some(parent) = node.parent else {
            return Ok(RetryTarget::SelfAndDescendants(id));
        };
        match node.retry {
            RetryBehavior::Ancestor => self.retry_target(parent),
            RetryBehavior::Descendants => Ok(RetryTarget::SelfAndDescendants(id)),
            RetryBehavior::Siblings => Ok(RetryTarget::Descendants(parent)),
        }
    }

    /// Clear the target of a retry on `id` and return its actions unexecuted.
    #[instrument(level = "debug", skip(self))]
    pub fn plan_retry(&mut self, id: NodeId) -> DomainResult<RetryPlan> {
        let target = self.retry_target(id)?;
        debug!("retry: {} resolved to {}", id, target);
        let mut plan = RetryPlan::new(target);
        match target {
            RetryTarget::SelfAndDescendants(node) => {
                self.retry_self(node, &mut plan)?;
                self.retry_descendants(node, &mut plan)?;
            }
            RetryTarget::Descendants(node) => self.retry_descendants(node, &mut plan)?,
        }
        self.flush_pending_removals();
        Ok(plan)
    }

    /// Retry `id` according to its behavior and run the collected actions.
    pub fn retry(&mut self, id: NodeId) -> DomainResult<RetryReport> {
        Ok(self.plan_retry(id)?.run())
    }

    fn retry_self(&mut self, id: NodeId, plan: &mut RetryPlan) -> DomainResult<()> {
        let failures = std::mem::take(&mut self.node_mut(id)?.failures);
        let count = failures.len();
        plan.actions
            .extend(failures.into_iter().filter_map(|f| f.into_action()).map(|a| (id, a)));
        plan.cleared.push(id);
        trace!("retry_self: {} dropped {} failures", id, count);
        self.notify_changed(id);
        self.set_presentation_suppressed(id, false)
    }

    fn retry_descendants(&mut self, id: NodeId, plan: &mut RetryPlan) -> DomainResult<()> {
        let children = self.node(id)?.children.clone();
        for child in children {
            self.retry_self(child, plan)?;
            self.retry_descendants(child, plan)?;
        }
        Ok(())
    }
}
