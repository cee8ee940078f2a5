use crate::condition::Condition;
use crate::context::ContextSnapshot;
use crate::path::PathSpec;
use crate::result::{OperationResult, UtilityResult};
use std::path::Path;
use std::sync::Arc;

/// Non-mutating unit of work: reads files and context, optionally produces
/// a value for the transformation context.
pub trait Utility: Send + Sync {
    /// Human-readable description of what this utility does.
    fn describe(&self) -> String;

    /// Run against the resolved target path and a read-only context view.
    ///
    /// Implementations return a result rather than unwinding; failures are
    /// wrapped with [`UtilityResult::error`].
    fn execute(&self, target: &Path, context: &ContextSnapshot) -> UtilityResult;
}

/// Mutating unit of work: edits one file in the working folder.
pub trait Operation: Send + Sync {
    /// Short type name, used when composites synthesise clones.
    fn type_name(&self) -> &'static str;

    fn describe(&self) -> String;

    fn execute(&self, target: &Path, context: &ContextSnapshot) -> OperationResult;

    /// Pure clone with all settings copied; clones share no mutable state.
    fn duplicate(&self) -> Box<dyn Operation>;
}

/// What a node actually is.
#[derive(Clone)]
pub enum NodeBody {
    Utility(Arc<dyn Utility>),
    Operation(Arc<dyn Operation>),
    /// Sequentially executes its static children.
    Group(Vec<Node>),
    /// Expands at execution time into one clone of the template operation
    /// per file listed under the given context attributes.
    MultiFile {
        template: Arc<dyn Operation>,
        attributes: Vec<String>,
    },
    /// Wraps a single child; equivalent to setting the child's condition.
    Conditional {
        condition: Condition,
        child: Box<Node>,
    },
}

impl std::fmt::Debug for NodeBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeBody::Utility(utility) => write!(f, "Utility({})", utility.describe()),
            NodeBody::Operation(operation) => write!(f, "Operation({})", operation.describe()),
            NodeBody::Group(children) => write!(f, "Group({} children)", children.len()),
            NodeBody::MultiFile { template, attributes } => write!(
                f,
                "MultiFile({} over {:?})",
                template.type_name(),
                attributes
            ),
            NodeBody::Conditional { child, .. } => write!(f, "Conditional({})", child.name()),
        }
    }
}

/// One position in a transformation template.
///
/// The parent back-reference is logical (a name), maintained by the template
/// builder and the engine; node graphs stay acyclic and cheap to clone.
#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    parent: Option<String>,
    order: usize,
    description: Option<String>,
    path: PathSpec,
    save_result_as: Option<String>,
    condition: Option<Condition>,
    dependencies: Vec<String>,
    abort_on_failure: bool,
    body: NodeBody,
}

impl Node {
    fn with_body<S: Into<String>>(name: S, body: NodeBody) -> Self {
        Node {
            name: name.into(),
            parent: None,
            order: 0,
            description: None,
            path: PathSpec::default(),
            save_result_as: None,
            condition: None,
            dependencies: Vec::new(),
            abort_on_failure: false,
            body,
        }
    }

    pub fn utility<S, U>(name: S, utility: U) -> Self
    where
        S: Into<String>,
        U: Utility + 'static,
    {
        Self::with_body(name, NodeBody::Utility(Arc::new(utility)))
    }

    pub fn operation<S, O>(name: S, operation: O) -> Self
    where
        S: Into<String>,
        O: Operation + 'static,
    {
        Self::with_body(name, NodeBody::Operation(Arc::new(operation)))
    }

    /// Wrap an already-boxed operation, as produced by
    /// [`Operation::duplicate`] during composite expansion.
    pub fn operation_boxed<S: Into<String>>(name: S, operation: Box<dyn Operation>) -> Self {
        Self::with_body(name, NodeBody::Operation(Arc::from(operation)))
    }

    pub fn group<S: Into<String>>(name: S) -> Self {
        Self::with_body(name, NodeBody::Group(Vec::new()))
    }

    /// Composite applying `template` to every file listed under the given
    /// context attributes. The template carries no path of its own; targets
    /// are assigned per synthesised clone at execution time, and the
    /// template is frozen once the composite is constructed.
    pub fn multiple<S, O, A>(name: S, template: O, attributes: A) -> Self
    where
        S: Into<String>,
        O: Operation + 'static,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Self::with_body(
            name,
            NodeBody::MultiFile {
                template: Arc::new(template),
                attributes: attributes.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn conditional<S: Into<String>>(name: S, condition: Condition, child: Node) -> Self {
        Self::with_body(
            name,
            NodeBody::Conditional {
                condition,
                child: Box::new(child),
            },
        )
    }

    // Chainable setters, consumed while assembling a template.

    pub fn relative<P: Into<std::path::PathBuf>>(mut self, path: P) -> Self {
        self.path = PathSpec::relative(path);
        self
    }

    pub fn absolute<P: Into<std::path::PathBuf>>(mut self, path: P) -> Self {
        self.path = PathSpec::absolute(path);
        self
    }

    pub fn path_from_attribute<S: Into<String>>(mut self, attribute: S) -> Self {
        self.path = PathSpec::from_attribute(attribute);
        self
    }

    pub fn with_path(mut self, path: PathSpec) -> Self {
        self.path = path;
        self
    }

    pub fn describe_as<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Save the result value into the context under `name`.
    pub fn save_result_as<S: Into<String>>(mut self, name: S) -> Self {
        self.save_result_as = Some(name.into());
        self
    }

    pub fn only_if(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Require `name` to have completed with a non-ERROR result first.
    pub fn depends_on<S: Into<String>>(mut self, name: S) -> Self {
        self.dependencies.push(name.into());
        self
    }

    /// An ERROR result from this node aborts the whole transformation.
    pub fn abort_on_failure(mut self) -> Self {
        self.abort_on_failure = true;
        self
    }

    // Accessors.

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn description(&self) -> String {
        if let Some(description) = &self.description {
            return description.clone();
        }
        match &self.body {
            NodeBody::Utility(utility) => utility.describe(),
            NodeBody::Operation(operation) => operation.describe(),
            NodeBody::Group(children) => format!("Group of {} nodes", children.len()),
            NodeBody::MultiFile { template, .. } => format!(
                "Perform operation {} against multiple files",
                template.type_name()
            ),
            NodeBody::Conditional { child, .. } => {
                format!("Conditionally perform {}", child.name())
            }
        }
    }

    pub fn path(&self) -> &PathSpec {
        &self.path
    }

    pub fn save_result_attribute(&self) -> Option<&str> {
        self.save_result_as.as_deref()
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn aborts_on_failure(&self) -> bool {
        self.abort_on_failure
    }

    pub fn body(&self) -> &NodeBody {
        &self.body
    }

    pub(crate) fn set_parent<S: Into<String>>(&mut self, parent: S) {
        self.parent = Some(parent.into());
    }

    pub(crate) fn set_order(&mut self, order: usize) {
        self.order = order;
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match &mut self.body {
            NodeBody::Group(children) => Some(children),
            _ => None,
        }
    }

    /// Used by the engine when synthesising composite children.
    pub fn assign_position<S: Into<String>>(&mut self, parent: S, order: usize) {
        self.parent = Some(parent.into());
        self.order = order;
    }
}
