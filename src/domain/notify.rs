//! Change-notification port.
//!
//! The tree calls every subscribed listener synchronously after each state
//! mutation of a node (receive, removal, suppression, unsuppression). The
//! listener gets a read-only view of the node so it can re-read whatever it
//! renders; whether it re-renders immediately or defers is up to the host.

use std::fmt;

use crate::domain::arena::{ErrorNode, NodeId};

/// Host-side observer of node state changes.
pub trait ChangeListener {
    fn state_changed(&self, id: NodeId, node: &ErrorNode);
}

impl<F> ChangeListener for F
where
    F: Fn(NodeId, &ErrorNode),
{
    fn state_changed(&self, id: NodeId, node: &ErrorNode) {
        self(id, node)
    }
}

/// Handle returned by [`ErrorTree::subscribe`](crate::domain::ErrorTree::subscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Default)]
pub(crate) struct Listeners {
    next: u64,
    entries: Vec<(SubscriptionId, Box<dyn ChangeListener>)>,
}

impl Listeners {
    pub(crate) fn subscribe(&mut self, listener: Box<dyn ChangeListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next);
        self.next += 1;
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(sub, _)| *sub != id);
        before != self.entries.len()
    }

    pub(crate) fn notify(&self, id: NodeId, node: &ErrorNode) {
        for (_, listener) in &self.entries {
            listener.state_changed(id, node);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::arena::{ErrorNode, ErrorTree, NodeId, NodeOptions};
    use crate::domain::failure::Failure;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_unsubscribed_listener_is_not_called() {
        let mut tree = ErrorTree::new();
        let root = tree.root(NodeOptions::new());
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let sub = tree.subscribe(move |_: NodeId, _: &ErrorNode| counter.set(counter.get() + 1));

        tree.receive(root, Failure::plain("x")).unwrap();
        assert_eq!(calls.get(), 1);

        assert!(tree.unsubscribe(sub));
        assert!(!tree.unsubscribe(sub));
        tree.remove_all_errors(root).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(tree.listeners.len(), 0);
    }
}
