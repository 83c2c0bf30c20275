//! Scenario service
//!
//! Loads scenario files and plays them against an [`ErrorTree`], the way a
//! host UI would: scopes are created up front, then failures, retries and
//! teardown arrive one step at a time.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, info};

use crate::application::{
    ApplicationError, ApplicationResult, Expectation, IoResultExt, Scenario, Step,
};
use crate::config::Settings;
use crate::domain::{ErrorTree, Failure, NodeId, NodeOptions, RenderOptions};
use crate::infrastructure::traits::FileSystem;

/// What happened when a step was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Applied,
    /// Number of failures removed
    Removed(usize),
    /// Whether the scope had a parent to detach from
    Detached(bool),
    Retried {
        target: String,
        cleared: usize,
        actions: usize,
    },
    Passed,
    /// Expectation mismatches, one line each
    Failed(Vec<String>),
    /// Rendered tree lines
    Rendered(Vec<String>),
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => write!(f, "applied"),
            Self::Removed(n) => write!(f, "removed {}", n),
            Self::Detached(true) => write!(f, "detached"),
            Self::Detached(false) => write!(f, "already detached"),
            Self::Retried {
                target,
                cleared,
                actions,
            } => write!(
                f,
                "retried {} ({} scopes cleared, {} actions)",
                target, cleared, actions
            ),
            Self::Passed => write!(f, "ok"),
            Self::Failed(mismatches) => write!(f, "{}", mismatches.join(", ")),
            Self::Rendered(lines) => write!(f, "{} lines", lines.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    /// 1-based position in the scenario
    pub index: usize,
    pub step: Step,
    pub outcome: StepOutcome,
}

/// Result of playing a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunReport {
    pub name: Option<String>,
    pub steps: Vec<StepRecord>,
    /// Retry actions in invocation order, as `scope: message`
    pub invoked_actions: Vec<String>,
    /// Rendering of every root after the last step
    pub final_tree: Vec<String>,
}

impl RunReport {
    pub fn failures(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps
            .iter()
            .filter(|record| matches!(record.outcome, StepOutcome::Failed(_)))
    }

    pub fn passed(&self) -> bool {
        self.failures().next().is_none()
    }

    /// First failed expectation as an error, for callers that want `?`.
    pub fn into_result(self) -> ApplicationResult<Self> {
        let first = self.failures().next().map(|record| (record.index, record.outcome.to_string()));
        match first {
            Some((step, message)) => Err(ApplicationError::ExpectationFailed { step, message }),
            None => Ok(self),
        }
    }
}

/// Service for loading and running scenarios.
pub struct ScenarioService {
    fs: Arc<dyn FileSystem>,
    settings: Arc<Settings>,
}

impl ScenarioService {
    pub fn new(fs: Arc<dyn FileSystem>, settings: Arc<Settings>) -> Self {
        Self { fs, settings }
    }

    /// Read, parse and validate a scenario file.
    pub fn load(&self, path: &Path) -> ApplicationResult<Scenario> {
        debug!("load: {}", path.display());
        let content = self
            .fs
            .read_to_string(path)
            .with_path_context("read scenario", path)?;
        let scenario = Scenario::from_toml(&content)?;
        scenario.validate()?;
        debug!(
            "load: {} scopes, {} steps",
            scenario.scopes.len(),
            scenario.steps.len()
        );
        Ok(scenario)
    }

    /// Write a starter scenario. Refuses to overwrite unless `force`.
    pub fn write_template(&self, path: &Path, force: bool) -> ApplicationResult<()> {
        if self.fs.exists(path) && !force {
            return Err(ApplicationError::Scenario {
                message: format!("{} exists (use --force to overwrite)", path.display()),
            });
        }
        self.fs
            .ensure_parent(path)
            .with_path_context("create directory for", path)?;
        self.fs
            .write(path, SCENARIO_TEMPLATE)
            .with_path_context("write scenario", path)
    }

    /// Build the declared tree and apply every step in order.
    ///
    /// Failed expectations are recorded and the run continues; structural
    /// errors (a step naming a released scope) abort it.
    pub fn run(&self, scenario: &Scenario) -> ApplicationResult<RunReport> {
        let mut run = ScenarioRun::build(scenario, &self.settings)?;
        let mut report = RunReport {
            name: scenario.name.clone(),
            ..RunReport::default()
        };

        for (i, step) in scenario.steps.iter().enumerate() {
            let index = i + 1;
            let outcome = run.apply(step)?;
            info!("step {}: {} -> {}", index, step, outcome);
            report.steps.push(StepRecord {
                index,
                step: step.clone(),
                outcome,
            });
        }

        report.invoked_actions = run.invoked.borrow().clone();
        report.final_tree = run.render(None)?;
        Ok(report)
    }
}

struct ScenarioRun {
    tree: ErrorTree,
    scopes: HashMap<String, NodeId>,
    invoked: Rc<RefCell<Vec<String>>>,
    render: RenderOptions,
}

impl ScenarioRun {
    fn build(scenario: &Scenario, settings: &Settings) -> ApplicationResult<Self> {
        let mut tree = ErrorTree::new();
        let mut scopes = HashMap::new();
        for spec in &scenario.scopes {
            let options = NodeOptions::new()
                .tag(spec.tag.clone())
                .presentation(spec.presentation.unwrap_or(settings.default_presentation))
                .retry(spec.retry.unwrap_or(settings.default_retry));
            let id = match &spec.parent {
                None => tree.root(options),
                Some(parent) => {
                    let parent_id = *scopes
                        .get(parent)
                        .ok_or_else(|| ApplicationError::UnknownScope(parent.clone()))?;
                    tree.child(parent_id, options)?
                }
            };
            if scopes.insert(spec.tag.clone(), id).is_some() {
                return Err(ApplicationError::DuplicateScope(spec.tag.clone()));
            }
        }
        Ok(Self {
            tree,
            scopes,
            invoked: Rc::new(RefCell::new(Vec::new())),
            render: settings.render.into(),
        })
    }

    fn lookup(&self, tag: &str) -> ApplicationResult<NodeId> {
        self.scopes
            .get(tag)
            .copied()
            .ok_or_else(|| ApplicationError::UnknownScope(tag.to_string()))
    }

    fn apply(&mut self, step: &Step) -> ApplicationResult<StepOutcome> {
        match step {
            Step::Fail {
                scope,
                message,
                retryable,
            } => {
                let id = self.lookup(scope)?;
                let failure = if *retryable {
                    let log = Rc::clone(&self.invoked);
                    let entry = format!("{}: {}", scope, message);
                    Failure::retryable(message.clone(), move || log.borrow_mut().push(entry))
                } else {
                    Failure::plain(message.clone())
                };
                self.tree.receive(id, failure)?;
                Ok(StepOutcome::Applied)
            }
            Step::Clear { scope } => {
                let removed = self.tree.remove_all_errors(self.lookup(scope)?)?;
                Ok(StepOutcome::Removed(removed.len()))
            }
            Step::Resolve { scope, message } => {
                let removed = self.tree.remove_error(self.lookup(scope)?, message)?;
                Ok(StepOutcome::Removed(removed.len()))
            }
            Step::Retry { scope } => {
                let report = self.tree.retry(self.lookup(scope)?)?;
                let target = self.tree.tag(report.target.node())?.to_string();
                Ok(StepOutcome::Retried {
                    target,
                    cleared: report.cleared.len(),
                    actions: report.actions_invoked,
                })
            }
            Step::Detach { scope } => {
                let detached = self.tree.detach(self.lookup(scope)?)?;
                Ok(StepOutcome::Detached(detached))
            }
            Step::Release { scope } => {
                let id = self.lookup(scope)?;
                self.tree.remove(id)?;
                self.scopes.remove(scope);
                Ok(StepOutcome::Applied)
            }
            Step::Expect(expectation) => {
                let mismatches = self.check(expectation)?;
                if mismatches.is_empty() {
                    Ok(StepOutcome::Passed)
                } else {
                    Ok(StepOutcome::Failed(mismatches))
                }
            }
            Step::Show { scope } => {
                let id = scope.as_deref().map(|tag| self.lookup(tag)).transpose()?;
                Ok(StepOutcome::Rendered(self.render(id)?))
            }
        }
    }

    fn check(&self, expected: &Expectation) -> ApplicationResult<Vec<String>> {
        let id = self.lookup(&expected.scope)?;
        let node = self.tree.node(id)?;
        let mut mismatches = Vec::new();

        compare("has_error", expected.has_error, node.has_error(), &mut mismatches);
        compare("show_error", expected.show_error, node.show_error(), &mut mismatches);
        compare(
            "suppressed",
            expected.suppressed,
            node.is_presentation_suppressed(),
            &mut mismatches,
        );
        compare("errors", expected.errors, node.failures().len(), &mut mismatches);
        compare(
            "aggregate",
            expected.aggregate,
            node.has_aggregate_error(),
            &mut mismatches,
        );
        compare(
            "retryable",
            expected.retryable,
            node.has_retryable_error(),
            &mut mismatches,
        );
        if expected.parent.is_some() {
            let actual = match node.parent() {
                Some(parent) => self.tree.tag(parent)?.to_string(),
                None => String::new(),
            };
            compare("parent", expected.parent.clone(), actual, &mut mismatches);
        }

        Ok(mismatches
            .into_iter()
            .map(|m| format!("{}: {}", expected.scope, m))
            .collect())
    }

    fn render(&self, id: Option<NodeId>) -> ApplicationResult<Vec<String>> {
        let trees = match id {
            Some(id) => vec![self.tree.render(id, &self.render)?],
            None => self.tree.render_all(&self.render)?,
        };
        Ok(trees
            .iter()
            .flat_map(|tree| {
                tree.to_string()
                    .lines()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect())
    }
}

fn compare<T>(field: &str, expected: Option<T>, actual: T, mismatches: &mut Vec<String>)
where
    T: PartialEq + fmt::Debug,
{
    if let Some(expected) = expected {
        if expected != actual {
            mismatches.push(format!("{} expected {:?}, got {:?}", field, expected, actual));
        }
    }
}

const SCENARIO_TEMPLATE: &str = r#"# scopetree scenario
#
# Scopes are declared parents-first. Behaviors default to the configured
# default_presentation / default_retry.
name = "two sibling scopes fail"

[[scope]]
tag = "screen"

[[scope]]
tag = "profile"
parent = "screen"

[[scope]]
tag = "feed"
parent = "screen"
# presentation = "prefers-display"   # never folded into the parent's error
# retry = "siblings"                 # ancestor | descendants | siblings

[[step]]
action = "fail"
scope = "profile"
message = "profile service unavailable"
retryable = true

[[step]]
action = "expect"
scope = "profile"
show_error = true

[[step]]
action = "fail"
scope = "feed"
message = "feed timed out"
retryable = true

[[step]]
action = "expect"
scope = "screen"
aggregate = true
show_error = true

[[step]]
action = "expect"
scope = "feed"
suppressed = true

[[step]]
action = "show"

[[step]]
action = "retry"
scope = "feed"

[[step]]
action = "expect"
scope = "screen"
has_error = false
"#;
