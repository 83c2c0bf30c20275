//! RAII handles over a shared [`ErrorTree`].
//!
//! A [`Scope`] owns exactly one node. Dropping it removes the node from the
//! tree, which also unlinks it from its parent's children. A scope dropped
//! while the tree is borrowed (from a listener, or owned by a failure being
//! dropped) queues its node; the tree removes it before the borrowing
//! operation returns.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::domain::arena::{ErrorNode, ErrorTree, NodeId, NodeOptions, PendingRemovals};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::failure::Failure;
use crate::domain::notify::{ChangeListener, SubscriptionId};
use crate::domain::retry::RetryReport;

/// Tree shared by all scopes created from the same root.
pub type SharedTree = Rc<RefCell<ErrorTree>>;

pub struct Scope {
    tree: SharedTree,
    id: NodeId,
    pending: PendingRemovals,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id)
            .field("tag", &self.tag())
            .finish()
    }
}

impl Scope {
    /// Create a root scope in a fresh tree.
    pub fn root(options: NodeOptions) -> Self {
        let tree = SharedTree::default();
        let (id, pending) = {
            let mut inner = tree.borrow_mut();
            (inner.root(options), inner.pending_removals())
        };
        Self { tree, id, pending }
    }

    /// Create an additional root scope in an existing tree.
    pub fn root_in(tree: &SharedTree, options: NodeOptions) -> DomainResult<Self> {
        let (id, pending) = {
            let mut inner = tree
                .try_borrow_mut()
                .map_err(|_| DomainError::TreeBorrowed)?;
            (inner.root(options), inner.pending_removals())
        };
        Ok(Self {
            tree: Rc::clone(tree),
            id,
            pending,
        })
    }

    /// Create a child scope; the caller keeps it alive for as long as the UI scope exists.
    pub fn child(&self, options: NodeOptions) -> DomainResult<Scope> {
        let id = self.write(|tree| tree.child(self.id, options))?;
        Ok(Self {
            tree: Rc::clone(&self.tree),
            id,
            pending: Rc::clone(&self.pending),
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &SharedTree {
        &self.tree
    }

    /// False once the node was removed from the tree by other means.
    pub fn is_alive(&self) -> bool {
        self.read(|_| ()).is_some()
    }

    pub fn receive(&self, failure: Failure) -> DomainResult<()> {
        self.write(|tree| tree.receive(self.id, failure))
    }

    pub fn remove_all_errors(&self) -> DomainResult<usize> {
        // Dropped after the borrow is released: failures may own other scopes.
        let removed = self.write(|tree| tree.remove_all_errors(self.id))?;
        Ok(removed.len())
    }

    pub fn remove_error(&self, error: &dyn fmt::Display) -> DomainResult<usize> {
        let removed = self.write(|tree| tree.remove_error(self.id, error))?;
        Ok(removed.len())
    }

    /// Retry according to this node's behavior; actions run after the tree is released.
    pub fn retry(&self) -> DomainResult<RetryReport> {
        let plan = self.write(|tree| tree.plan_retry(self.id))?;
        Ok(plan.run())
    }

    pub fn detach(&self) -> DomainResult<bool> {
        self.write(|tree| tree.detach(self.id))
    }

    pub fn subscribe(&self, listener: impl ChangeListener + 'static) -> DomainResult<SubscriptionId> {
        self.write(|tree| Ok(tree.subscribe(listener)))
    }

    pub fn tag(&self) -> Option<String> {
        self.read(|node| node.tag().to_string())
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.read(ErrorNode::parent).flatten()
    }

    pub fn child_ids(&self) -> Vec<NodeId> {
        self.read(|node| node.children().to_vec()).unwrap_or_default()
    }

    pub fn error_descriptions(&self) -> Vec<String> {
        self.read(|node| node.failures().iter().map(ToString::to_string).collect())
            .unwrap_or_default()
    }

    pub fn has_error(&self) -> bool {
        self.read(ErrorNode::has_error).unwrap_or(false)
    }

    pub fn has_single_error(&self) -> bool {
        self.read(ErrorNode::has_single_error).unwrap_or(false)
    }

    pub fn show_error(&self) -> bool {
        self.read(ErrorNode::show_error).unwrap_or(false)
    }

    pub fn has_retryable_error(&self) -> bool {
        self.read(ErrorNode::has_retryable_error).unwrap_or(false)
    }

    pub fn is_presentation_suppressed(&self) -> bool {
        self.read(ErrorNode::is_presentation_suppressed)
            .unwrap_or(false)
    }

    /// Read this node's state. None when the node is gone or the tree is mid-mutation.
    fn read<T>(&self, f: impl FnOnce(&ErrorNode) -> T) -> Option<T> {
        let tree = self.tree.try_borrow().ok()?;
        tree.node(self.id).ok().map(f)
    }

    fn write<T>(&self, f: impl FnOnce(&mut ErrorTree) -> DomainResult<T>) -> DomainResult<T> {
        let mut tree = self
            .tree
            .try_borrow_mut()
            .map_err(|_| DomainError::TreeBorrowed)?;
        let result = f(&mut tree);
        tree.flush_pending_removals();
        result
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        let removed = match self.tree.try_borrow_mut() {
            Ok(mut tree) if tree.contains(self.id) => tree.remove(self.id).ok(),
            Ok(_) => None,
            Err(_) => {
                debug!("scope {} dropped while its tree is borrowed; removal queued", self.id);
                self.pending.borrow_mut().push(self.id);
                None
            }
        };
        // Released outside the borrow: retry actions may capture other scopes.
        drop(removed);
    }
}
