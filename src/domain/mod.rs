//! Domain layer: the error tree
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod behavior;
pub mod error;
pub mod failure;
pub mod notify;
pub mod render;
pub mod retry;
pub mod scope;

pub use arena::{ErrorNode, ErrorTree, NodeId, NodeOptions, PreOrderIter};
pub use behavior::{PresentationBehavior, RetryBehavior};
pub use error::{DomainError, DomainResult};
pub use failure::{BoxError, Failure, RetryAction, RetryableError};
pub use notify::{ChangeListener, SubscriptionId};
pub use render::{NodeLabel, NodeStatus, RenderOptions};
pub use retry::{RetryPlan, RetryReport, RetryTarget};
pub use scope::{Scope, SharedTree};
