//! Hierarchical error state for trees of cooperating UI scopes.
//!
//! Each node of an [`ErrorTree`](domain::ErrorTree) holds the failures of one
//! UI scope. When several siblings fail at once their parent takes over the
//! display with an aggregate failure and hides their subtrees; a retry on any
//! node resolves, by the node's [`RetryBehavior`](domain::RetryBehavior), to
//! the subtree it clears and whose retry actions it runs.
//!
//! ```
//! use scopetree::domain::{ErrorTree, Failure, NodeOptions};
//!
//! let mut tree = ErrorTree::new();
//! let screen = tree.root(NodeOptions::new().tag("screen"));
//! let a = tree.child(screen, NodeOptions::new().tag("a")).unwrap();
//! let b = tree.child(screen, NodeOptions::new().tag("b")).unwrap();
//!
//! tree.receive(a, Failure::plain("offline")).unwrap();
//! tree.receive(b, Failure::retryable("timeout", || {})).unwrap();
//! assert!(tree.show_error(screen).unwrap());
//! assert!(!tree.show_error(a).unwrap());
//!
//! tree.retry(a).unwrap();
//! assert!(!tree.has_error(screen).unwrap());
//! ```

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
