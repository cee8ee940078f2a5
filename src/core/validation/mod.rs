use butterfly_extensions::{
    Condition, ConditionEngine, ErrorCategory, Node, NodeBody, Template, TransformationError,
};
use indexmap::IndexSet;
use serde::Serialize;
use std::fmt;

pub mod rules;

/// One validation offence found in a template.
#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    pub code: String,
    pub message: String,
    pub location: Option<String>,
}

impl Violation {
    pub fn new(code: &str, message: impl Into<String>, location: Option<String>) -> Self {
        Violation {
            code: code.to_string(),
            message: message.into(),
            location,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "[{}] {} (at {})", self.code, self.message, location),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

/// Everything a check needs to inspect a template.
pub struct TemplateView<'a> {
    pub template: &'a Template,
    /// Attribute names pre-seeded into the context before the walk.
    pub seeds: IndexSet<String>,
    pub conditions: &'a ConditionEngine,
}

/// Trait implemented by template validation checks. Checks collect every
/// offence they can see; nothing fails fast.
pub trait TemplateCheck {
    fn check(&self, view: &TemplateView) -> Vec<Violation>;
}

/// Pre-execution static validator. Runs all built-in checks and reports the
/// full batch of offences as one definition error.
pub struct TemplateValidator {
    conditions: ConditionEngine,
    checks: Vec<Box<dyn TemplateCheck>>,
}

impl Default for TemplateValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateValidator {
    pub fn new() -> Self {
        TemplateValidator {
            conditions: ConditionEngine::default(),
            checks: rules::built_in_checks(),
        }
    }

    /// Collect all violations, sorted by `(code, location)` so the batch is
    /// deterministic.
    pub fn run<I>(&self, template: &Template, seeds: I) -> Vec<Violation>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let view = TemplateView {
            template,
            seeds: seeds.into_iter().map(Into::into).collect(),
            conditions: &self.conditions,
        };
        let mut violations = Vec::new();
        for check in &self.checks {
            violations.extend(check.check(&view));
        }
        violations.sort_by(|a, b| a.code.cmp(&b.code).then(a.location.cmp(&b.location)));
        violations
    }

    /// Validate, folding the batch into a single definition error.
    pub fn validate<I>(&self, template: &Template, seeds: I) -> Result<(), TransformationError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let violations = self.run(template, seeds);
        if violations.is_empty() {
            return Ok(());
        }
        let listing = violations
            .iter()
            .map(Violation::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(TransformationError::new(
            ErrorCategory::Definition,
            format!(
                "template '{}' failed validation with {} offence(s): {}",
                template.name(),
                violations.len(),
                listing
            ),
        )
        .with_code("BF-VAL-000"))
    }
}

/// Phase of a declaration-order walk. `Enter` fires before a node's
/// references are resolvable against it; `Leave` fires after the node (and
/// any children) completed, the point where its name and saved attribute
/// become visible to later nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Enter,
    Leave,
}

/// Walk a node tree in declaration order, mirroring execution semantics.
pub(crate) fn visit<'a, F>(nodes: &'a [Node], parent_path: &str, callback: &mut F)
where
    F: FnMut(&str, &'a Node, Phase),
{
    for node in nodes {
        let path = join_path(parent_path, node.name());
        callback(&path, node, Phase::Enter);
        match node.body() {
            NodeBody::Group(children) => visit(children, &path, callback),
            NodeBody::Conditional { child, .. } => {
                visit(std::slice::from_ref(child.as_ref()), &path, callback)
            }
            _ => {}
        }
        callback(&path, node, Phase::Leave);
    }
}

pub(crate) fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Conditions declared on a node, both the node's own guard and a
/// conditional composite's predicate.
pub(crate) fn node_conditions(node: &Node) -> Vec<&Condition> {
    let mut out = Vec::new();
    if let Some(condition) = node.condition() {
        out.push(condition);
    }
    if let NodeBody::Conditional { condition, .. } = node.body() {
        out.push(condition);
    }
    out
}
