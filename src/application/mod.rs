//! Application layer: scenario model and services
//!
//! This layer drives the error tree and depends on I/O boundary traits.

pub mod error;
pub mod error_ext;
pub mod scenario;
pub mod services;

pub use error::{ApplicationError, ApplicationResult};
pub use error_ext::IoResultExt;
pub use scenario::{Expectation, Scenario, ScopeSpec, Step};
