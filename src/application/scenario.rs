//! Scenario files: a declared scope tree plus a script of events.
//!
//! ```toml
//! name = "two children fail"
//!
//! [[scope]]
//! tag = "root"
//!
//! [[scope]]
//! tag = "a"
//! parent = "root"
//!
//! [[step]]
//! action = "fail"
//! scope = "a"
//! message = "network down"
//! retryable = true
//!
//! [[step]]
//! action = "expect"
//! scope = "a"
//! show_error = true
//! ```

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{PresentationBehavior, RetryBehavior};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "scope")]
    pub scopes: Vec<ScopeSpec>,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

/// Declaration of one scope; parents must be declared first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeSpec {
    pub tag: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub presentation: Option<PresentationBehavior>,
    #[serde(default)]
    pub retry: Option<RetryBehavior>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Step {
    /// Deliver a failure to a scope
    Fail {
        scope: String,
        message: String,
        #[serde(default)]
        retryable: bool,
    },
    /// Remove all failures of a scope
    Clear { scope: String },
    /// Remove failures matching a description
    Resolve { scope: String, message: String },
    /// Trigger the scope's retry
    Retry { scope: String },
    /// Unlink the scope from its parent
    Detach { scope: String },
    /// Destroy the scope; its children become roots
    Release { scope: String },
    /// Assert the scope's state
    Expect(Expectation),
    /// Capture a rendering of the tree (or of one scope's subtree)
    Show {
        #[serde(default)]
        scope: Option<String>,
    },
}

impl Step {
    /// Scope the step refers to, if any.
    pub fn scope(&self) -> Option<&str> {
        match self {
            Step::Fail { scope, .. }
            | Step::Clear { scope }
            | Step::Resolve { scope, .. }
            | Step::Retry { scope }
            | Step::Detach { scope }
            | Step::Release { scope } => Some(scope),
            Step::Expect(expectation) => Some(&expectation.scope),
            Step::Show { scope } => scope.as_deref(),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Fail {
                scope,
                message,
                retryable,
            } => {
                let kind = if *retryable { "retryable " } else { "" };
                write!(f, "fail {} with {}'{}'", scope, kind, message)
            }
            Step::Clear { scope } => write!(f, "clear {}", scope),
            Step::Resolve { scope, message } => write!(f, "resolve '{}' on {}", message, scope),
            Step::Retry { scope } => write!(f, "retry {}", scope),
            Step::Detach { scope } => write!(f, "detach {}", scope),
            Step::Release { scope } => write!(f, "release {}", scope),
            Step::Expect(expectation) => write!(f, "expect {}", expectation.scope),
            Step::Show { scope: Some(scope) } => write!(f, "show {}", scope),
            Step::Show { scope: None } => write!(f, "show"),
        }
    }
}

/// Expected state of a scope; unset fields are not checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expectation {
    pub scope: String,
    #[serde(default)]
    pub has_error: Option<bool>,
    #[serde(default)]
    pub show_error: Option<bool>,
    #[serde(default)]
    pub suppressed: Option<bool>,
    /// Number of held failures
    #[serde(default)]
    pub errors: Option<usize>,
    /// Whether an aggregate failure is held
    #[serde(default)]
    pub aggregate: Option<bool>,
    #[serde(default)]
    pub retryable: Option<bool>,
    /// Tag of the expected parent, empty string for none
    #[serde(default)]
    pub parent: Option<String>,
}

impl Scenario {
    pub fn from_toml(content: &str) -> ApplicationResult<Self> {
        toml::from_str(content).map_err(|e| ApplicationError::Scenario {
            message: e.to_string(),
        })
    }

    /// Static checks: unique tags, parents declared before children, steps
    /// referring to declared scopes.
    pub fn validate(&self) -> ApplicationResult<()> {
        let mut declared: HashSet<&str> = HashSet::new();
        for scope in &self.scopes {
            if scope.tag.is_empty() {
                return Err(ApplicationError::Scenario {
                    message: "scope with empty tag".to_string(),
                });
            }
            if let Some(parent) = &scope.parent {
                if !declared.contains(parent.as_str()) {
                    return Err(ApplicationError::UnknownScope(parent.clone()));
                }
            }
            if !declared.insert(scope.tag.as_str()) {
                return Err(ApplicationError::DuplicateScope(scope.tag.clone()));
            }
        }
        for step in &self.steps {
            if let Some(scope) = step.scope() {
                if !declared.contains(scope) {
                    return Err(ApplicationError::UnknownScope(scope.to_string()));
                }
            }
            if let Step::Expect(Expectation {
                parent: Some(parent),
                ..
            }) = step
            {
                if !parent.is_empty() && !declared.contains(parent.as_str()) {
                    return Err(ApplicationError::UnknownScope(parent.clone()));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name = "sample"

[[scope]]
tag = "root"

[[scope]]
tag = "a"
parent = "root"
presentation = "prefers-display"
retry = "siblings"

[[step]]
action = "fail"
scope = "a"
message = "boom"
retryable = true

[[step]]
action = "expect"
scope = "a"
show_error = true
errors = 1

[[step]]
action = "show"
"#;

    #[test]
    fn test_parse_sample() {
        let scenario = Scenario::from_toml(SAMPLE).unwrap();
        assert_eq!(scenario.name.as_deref(), Some("sample"));
        assert_eq!(scenario.scopes.len(), 2);
        assert_eq!(scenario.scopes[1].presentation, Some(PresentationBehavior::PrefersDisplay));
        assert_eq!(scenario.scopes[1].retry, Some(RetryBehavior::Siblings));
        assert_eq!(
            scenario.steps[0],
            Step::Fail {
                scope: "a".into(),
                message: "boom".into(),
                retryable: true
            }
        );
        assert_eq!(
            scenario.steps[1],
            Step::Expect(Expectation {
                scope: "a".into(),
                show_error: Some(true),
                errors: Some(1),
                ..Expectation::default()
            })
        );
        assert_eq!(scenario.steps[2], Step::Show { scope: None });
        scenario.validate().unwrap();
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let err = Scenario::from_toml("[[step]]\naction = \"explode\"\nscope = \"x\"\n").unwrap_err();
        assert!(matches!(err, ApplicationError::Scenario { .. }));
    }

    #[test]
    fn test_validate_rejects_forward_parent() {
        let scenario = Scenario {
            scopes: vec![ScopeSpec {
                tag: "child".into(),
                parent: Some("later".into()),
                presentation: None,
                retry: None,
            }],
            ..Scenario::default()
        };
        assert!(matches!(
            scenario.validate(),
            Err(ApplicationError::UnknownScope(tag)) if tag == "later"
        ));
    }

    #[test]
    fn test_step_display() {
        let step = Step::Fail {
            scope: "a".into(),
            message: "down".into(),
            retryable: true,
        };
        assert_eq!(step.to_string(), "fail a with retryable 'down'");
    }
}
