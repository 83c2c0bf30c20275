use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use generational_arena::{Arena, Index};
use tracing::{debug, instrument, trace};

use crate::domain::behavior::{PresentationBehavior, RetryBehavior};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::failure::Failure;
use crate::domain::notify::{ChangeListener, Listeners, SubscriptionId};

/// Generational handle of a node in an [`ErrorTree`].
///
/// A handle outliving its node is detected as stale rather than aliasing a
/// newer node in the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) Index);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (slot, generation) = self.0.into_raw_parts();
        write!(f, "#{}.{}", slot, generation)
    }
}

/// Creation parameters for a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeOptions {
    /// Diagnostic identifier; generated when absent
    pub tag: Option<String>,
    pub presentation: PresentationBehavior,
    pub retry: RetryBehavior,
}

impl NodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn presentation(mut self, presentation: PresentationBehavior) -> Self {
        self.presentation = presentation;
        self
    }

    pub fn retry(mut self, retry: RetryBehavior) -> Self {
        self.retry = retry;
        self
    }
}

/// One UI scope in the error tree.
#[derive(Debug)]
pub struct ErrorNode {
    pub(crate) tag: String,
    /// Non-owning back-reference, None for roots and detached nodes
    pub(crate) parent: Option<NodeId>,
    /// Children in creation order
    pub(crate) children: Vec<NodeId>,
    pub(crate) presentation: PresentationBehavior,
    pub(crate) retry: RetryBehavior,
    /// Held failures in arrival order
    pub(crate) failures: Vec<Failure>,
    pub(crate) presentation_suppressed: bool,
}

impl ErrorNode {
    fn new(options: NodeOptions, parent: Option<NodeId>) -> Self {
        let tag = options
            .tag
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        Self {
            tag,
            parent,
            children: Vec::new(),
            presentation: options.presentation,
            retry: options.retry,
            failures: Vec::new(),
            presentation_suppressed: false,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn presentation(&self) -> PresentationBehavior {
        self.presentation
    }

    pub fn retry_behavior(&self) -> RetryBehavior {
        self.retry
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    pub fn is_presentation_suppressed(&self) -> bool {
        self.presentation_suppressed
    }

    pub fn has_error(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn has_single_error(&self) -> bool {
        self.failures.len() == 1
    }

    /// Whether the host should display this node's failure.
    pub fn show_error(&self) -> bool {
        self.has_error() && !self.presentation_suppressed
    }

    pub fn has_retryable_error(&self) -> bool {
        self.failures.iter().any(Failure::is_retryable)
    }

    pub fn has_aggregate_error(&self) -> bool {
        self.failures.iter().any(Failure::is_aggregate)
    }

    /// Description of the single held failure, or a count when there are several.
    pub fn summary(&self) -> Option<String> {
        match self.failures.as_slice() {
            [] => None,
            [only] => Some(only.to_string()),
            many => Some(format!("{} errors", many.len())),
        }
    }
}

/// Nodes whose removal was requested while the tree was borrowed.
pub(crate) type PendingRemovals = Rc<RefCell<Vec<NodeId>>>;

/// Arena holding one or more trees of error nodes.
///
/// Parents own their children: [`ErrorTree::remove`] frees a node and turns
/// its children into roots. Children refer to their parent through a
/// [`NodeId`] that is cleared on detachment.
pub struct ErrorTree {
    pub(crate) arena: Arena<ErrorNode>,
    /// Parentless nodes in the order they became roots
    roots: Vec<NodeId>,
    pub(crate) listeners: Listeners,
    pending: PendingRemovals,
}

impl Default for ErrorTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ErrorTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorTree")
            .field("arena", &self.arena)
            .field("roots", &self.roots)
            .field("listeners", &self.listeners.len())
            .field("pending", &self.pending.borrow().len())
            .finish()
    }
}

impl ErrorTree {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            roots: Vec::new(),
            listeners: Listeners::default(),
            pending: PendingRemovals::default(),
        }
    }

    /// Create a parentless node.
    #[instrument(level = "trace", skip(self))]
    pub fn root(&mut self, options: NodeOptions) -> NodeId {
        self.flush_pending_removals();
        let id = NodeId(self.arena.insert(ErrorNode::new(options, None)));
        self.roots.push(id);
        id
    }

    /// Create a node appended to `parent`'s children.
    #[instrument(level = "trace", skip(self))]
    pub fn child(&mut self, parent: NodeId, options: NodeOptions) -> DomainResult<NodeId> {
        self.flush_pending_removals();
        self.node(parent)?;
        let id = NodeId(self.arena.insert(ErrorNode::new(options, Some(parent))));
        self.node_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// Queue shared with scope handles, which push their node when dropped
    /// during a borrow of the tree.
    pub(crate) fn pending_removals(&self) -> PendingRemovals {
        Rc::clone(&self.pending)
    }

    /// Remove every node queued for deferred removal.
    ///
    /// Dropping a removed node may drop scopes owned by its failures; those
    /// queue up again and are removed in the next pass.
    pub(crate) fn flush_pending_removals(&mut self) {
        loop {
            let queued = std::mem::take(&mut *self.pending.borrow_mut());
            if queued.is_empty() {
                return;
            }
            for id in queued {
                if self.contains(id) {
                    debug!("deferred removal: {}", id);
                    drop(self.remove_node(id));
                }
            }
        }
    }

    pub fn node(&self, id: NodeId) -> DomainResult<&ErrorNode> {
        self.arena.get(id.0).ok_or(DomainError::NodeNotFound(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> DomainResult<&mut ErrorNode> {
        self.arena.get_mut(id.0).ok_or(DomainError::NodeNotFound(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.contains(id.0)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn parent(&self, id: NodeId) -> DomainResult<Option<NodeId>> {
        Ok(self.node(id)?.parent)
    }

    pub fn children(&self, id: NodeId) -> DomainResult<&[NodeId]> {
        Ok(&self.node(id)?.children)
    }

    pub fn tag(&self, id: NodeId) -> DomainResult<&str> {
        Ok(self.node(id)?.tag())
    }

    pub fn failures(&self, id: NodeId) -> DomainResult<&[Failure]> {
        Ok(self.node(id)?.failures())
    }

    pub fn has_error(&self, id: NodeId) -> DomainResult<bool> {
        Ok(self.node(id)?.has_error())
    }

    pub fn has_single_error(&self, id: NodeId) -> DomainResult<bool> {
        Ok(self.node(id)?.has_single_error())
    }

    pub fn show_error(&self, id: NodeId) -> DomainResult<bool> {
        Ok(self.node(id)?.show_error())
    }

    pub fn has_retryable_error(&self, id: NodeId) -> DomainResult<bool> {
        Ok(self.node(id)?.has_retryable_error())
    }

    pub fn is_presentation_suppressed(&self, id: NodeId) -> DomainResult<bool> {
        Ok(self.node(id)?.is_presentation_suppressed())
    }

    pub fn summary(&self, id: NodeId) -> DomainResult<Option<String>> {
        Ok(self.node(id)?.summary())
    }

    /// First node with the given tag, in root order then pre-order.
    pub fn find_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.roots
            .iter()
            .flat_map(|&root| self.iter(root))
            .find(|(_, node)| node.tag == tag)
            .map(|(id, _)| id)
    }

    /// Top-most node reachable by following parent links.
    pub fn top_most(&self, id: NodeId) -> DomainResult<NodeId> {
        let mut current = id;
        while let Some(parent) = self.node(current)?.parent {
            current = parent;
        }
        Ok(current)
    }

    /// All descendants of `id` in pre-order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> DomainResult<Vec<NodeId>> {
        self.node(id)?;
        Ok(self.iter(id).skip(1).map(|(idx, _)| idx).collect())
    }

    /// Number of levels in the subtree rooted at `id` (a leaf has depth 1).
    #[instrument(level = "trace", skip(self))]
    pub fn depth(&self, id: NodeId) -> usize {
        if let Some(node) = self.arena.get(id.0) {
            1 + node
                .children
                .iter()
                .map(|&child| self.depth(child))
                .max()
                .unwrap_or(0)
        } else {
            0
        }
    }

    /// Pre-order traversal of the subtree rooted at `id`.
    pub fn iter(&self, id: NodeId) -> PreOrderIter<'_> {
        PreOrderIter::new(self, id)
    }

    pub fn subscribe(&mut self, listener: impl ChangeListener + 'static) -> SubscriptionId {
        self.listeners.subscribe(Box::new(listener))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    pub(crate) fn notify_changed(&self, id: NodeId) {
        if let Some(node) = self.arena.get(id.0) {
            self.listeners.notify(id, node);
        }
    }

    /// Remove `id` from its parent's children. Returns false when already parentless.
    #[instrument(level = "debug", skip(self))]
    pub fn detach(&mut self, id: NodeId) -> DomainResult<bool> {
        let detached = self.unlink(id);
        self.flush_pending_removals();
        detached
    }

    fn unlink(&mut self, id: NodeId) -> DomainResult<bool> {
        let Some(parent) = self.node(id)?.parent else {
            return Ok(false);
        };
        if let Some(parent_node) = self.arena.get_mut(parent.0) {
            parent_node.children.retain(|&child| child != id);
        }
        self.node_mut(id)?.parent = None;
        self.roots.push(id);
        debug!("detach: {} from {}", id, parent);
        Ok(true)
    }

    /// Destroy a node: detach it, orphan its children and free its slot.
    ///
    /// Returns the removed node so the caller decides when its failures
    /// (and their retry actions) are dropped.
    #[instrument(level = "debug", skip(self))]
    pub fn remove(&mut self, id: NodeId) -> DomainResult<ErrorNode> {
        let node = self.remove_node(id);
        self.flush_pending_removals();
        node
    }

    fn remove_node(&mut self, id: NodeId) -> DomainResult<ErrorNode> {
        self.unlink(id)?;
        let children = std::mem::take(&mut self.node_mut(id)?.children);
        for child in children {
            if let Some(child_node) = self.arena.get_mut(child.0) {
                child_node.parent = None;
                self.roots.push(child);
            }
        }
        self.roots.retain(|&root| root != id);
        let node = self.arena.remove(id.0).ok_or(DomainError::NodeNotFound(id))?;
        debug!("remove: {} ({})", id, node.tag);
        Ok(node)
    }

    /// Record a failure on `id` and run suppression propagation.
    ///
    /// The whole cascade completes before this returns.
    #[instrument(level = "debug", skip(self, failure), fields(failure = %failure))]
    pub fn receive(&mut self, id: NodeId, failure: Failure) -> DomainResult<()> {
        let received = self.receive_inner(id, failure);
        self.flush_pending_removals();
        received
    }

    fn receive_inner(&mut self, id: NodeId, failure: Failure) -> DomainResult<()> {
        self.node_mut(id)?.failures.push(failure);
        self.notify_changed(id);
        self.notify_parent(id)
    }

    /// Clear all failures. Suppression is left as is and nothing propagates.
    pub fn remove_all_errors(&mut self, id: NodeId) -> DomainResult<Vec<Failure>> {
        let removed = std::mem::take(&mut self.node_mut(id)?.failures);
        debug!("remove_all_errors: {} removed {}", id, removed.len());
        self.notify_changed(id);
        self.flush_pending_removals();
        Ok(removed)
    }

    /// Remove every failure whose description equals `error`'s description.
    ///
    /// Distinct failures rendering the same text are all removed.
    pub fn remove_error(
        &mut self,
        id: NodeId,
        error: &dyn fmt::Display,
    ) -> DomainResult<Vec<Failure>> {
        let description = error.to_string();
        let node = self.node_mut(id)?;
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut node.failures)
            .into_iter()
            .partition(|f| f.describes_same(&description));
        node.failures = kept;
        debug!("remove_error: {} removed {} x '{}'", id, removed.len(), description);
        self.notify_changed(id);
        self.flush_pending_removals();
        Ok(removed)
    }

    fn notify_parent(&mut self, id: NodeId) -> DomainResult<()> {
        match self.node(id)?.parent {
            None => self.suppress_descendants_presentation(id),
            Some(parent) => self.suppress_descendants_presentation_if_required(parent),
        }
    }

    /// Aggregate on `parent` when several (or all) of its children fail and
    /// none of them prefers display; otherwise hide the failing children's subtrees.
    fn suppress_descendants_presentation_if_required(&mut self, parent: NodeId) -> DomainResult<()> {
        let (failing, total, prefers_display) = {
            let node = self.node(parent)?;
            let mut failing = Vec::new();
            let mut prefers_display = false;
            for &child in &node.children {
                let child_node = self.node(child)?;
                if child_node.has_error() {
                    failing.push(child);
                }
                if child_node.presentation == PresentationBehavior::PrefersDisplay {
                    prefers_display = true;
                }
            }
            (failing, node.children.len(), prefers_display)
        };

        if !prefers_display && (failing.len() > 1 || failing.len() == total) {
            debug!(
                "aggregate: {} has {}/{} failing children",
                parent,
                failing.len(),
                total
            );
            self.receive_inner(parent, Failure::Aggregate)
        } else {
            for child in failing {
                self.suppress_descendants_presentation(child)?;
            }
            Ok(())
        }
    }

    fn suppress_descendants_presentation(&mut self, id: NodeId) -> DomainResult<()> {
        let children = self.node(id)?.children.clone();
        for child in children {
            self.set_presentation_suppressed(child, true)?;
            self.suppress_descendants_presentation(child)?;
        }
        Ok(())
    }

    pub(crate) fn set_presentation_suppressed(&mut self, id: NodeId, value: bool) -> DomainResult<()> {
        self.node_mut(id)?.presentation_suppressed = value;
        trace!("presentation_suppressed: {} = {}", id, value);
        self.notify_changed(id);
        Ok(())
    }
}

/// Depth-first pre-order iterator, children in creation order.
pub struct PreOrderIter<'a> {
    tree: &'a ErrorTree,
    stack: Vec<NodeId>,
}

impl<'a> PreOrderIter<'a> {
    fn new(tree: &'a ErrorTree, start: NodeId) -> Self {
        Self {
            tree,
            stack: vec![start],
        }
    }
}

impl<'a> Iterator for PreOrderIter<'a> {
    type Item = (NodeId, &'a ErrorNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current) = self.stack.pop() {
            if let Some(node) = self.tree.arena.get(current.0) {
                // Reverse so the first child is popped first
                for &child in node.children.iter().rev() {
                    self.stack.push(child);
                }
                return Some((current, node));
            }
        }
        None
    }
}
