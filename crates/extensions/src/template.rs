use crate::error::{ErrorCategory, TransformationError};
use crate::node::Node;

/// Static, ordered tree of nodes describing a transformation.
///
/// Built with the fluent `add`/`add_to` API; `seal` freezes it after the
/// validation pass and further mutation is a definition error.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    description: Option<String>,
    extension: Option<String>,
    nodes: Vec<Node>,
    sealed: bool,
}

impl Template {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Template {
            name: name.into(),
            description: None,
            extension: None,
            nodes: Vec::new(),
            sealed: false,
        }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Name of the extension this template was registered by.
    pub fn with_extension<S: Into<String>>(mut self, extension: S) -> Self {
        self.extension = Some(extension.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Freeze the template. Called by the engine once validation passes.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Append a top-level node. Order is assigned monotonically; names must
    /// be unique among siblings.
    pub fn add(&mut self, node: Node) -> Result<&mut Self, TransformationError> {
        self.ensure_open()?;
        Self::insert(&mut self.nodes, node, None)?;
        Ok(self)
    }

    /// Append a node under the group named `parent`.
    pub fn add_to(&mut self, node: Node, parent: &str) -> Result<&mut Self, TransformationError> {
        self.ensure_open()?;
        let missing_group = || {
            TransformationError::new(
                ErrorCategory::Definition,
                format!("no group named '{}' in template", parent),
            )
            .with_code("BF-TPL-002")
        };

        let mut indices = Vec::new();
        if !Self::locate_group(&self.nodes, parent, &mut indices) {
            return Err(missing_group());
        }
        let mut siblings = &mut self.nodes;
        for index in indices {
            match siblings[index].children_mut() {
                Some(children) => siblings = children,
                None => return Err(missing_group()),
            }
        }
        Self::insert(siblings, node, Some(parent.to_string()))?;
        Ok(self)
    }

    fn ensure_open(&self) -> Result<(), TransformationError> {
        if self.sealed {
            return Err(TransformationError::new(
                ErrorCategory::Definition,
                format!("template '{}' is sealed and cannot be modified", self.name),
            )
            .with_code("BF-TPL-001"));
        }
        Ok(())
    }

    fn insert(
        siblings: &mut Vec<Node>,
        mut node: Node,
        parent: Option<String>,
    ) -> Result<(), TransformationError> {
        if node.name().is_empty() {
            return Err(TransformationError::new(
                ErrorCategory::Definition,
                "node name must not be empty",
            )
            .with_code("BF-TPL-003"));
        }
        if siblings.iter().any(|sibling| sibling.name() == node.name()) {
            return Err(TransformationError::new(
                ErrorCategory::Definition,
                format!("duplicate node name '{}' within the same parent", node.name()),
            )
            .with_code("BF-TPL-004"));
        }
        node.set_order(siblings.len() + 1);
        if let Some(parent) = parent {
            node.set_parent(parent);
        }
        siblings.push(node);
        Ok(())
    }

    /// Record the index path to the group named `name`, depth first.
    fn locate_group(nodes: &[Node], name: &str, indices: &mut Vec<usize>) -> bool {
        for (index, node) in nodes.iter().enumerate() {
            if let crate::node::NodeBody::Group(children) = node.body() {
                if node.name() == name {
                    indices.push(index);
                    return true;
                }
                indices.push(index);
                if Self::locate_group(children, name, indices) {
                    return true;
                }
                indices.pop();
            }
        }
        false
    }
}
