use crate::error::{ErrorCategory, TransformationError};
use crate::result::{OperationResult, UtilityResult};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Per-run, string-keyed attribute store shared across nodes.
///
/// Utilities returning VALUE write into it (mediated by the engine); later
/// utilities and operations read it through snapshots. It also carries the
/// working-application folder, the append-only transcript, and the bag of
/// transformation-result properties for the final report.
#[derive(Debug)]
pub struct TransformationContext {
    working_folder: PathBuf,
    attributes: IndexMap<String, Value>,
    writers: HashMap<String, String>,
    transcript: Vec<TranscriptEntry>,
    properties: IndexMap<String, Value>,
}

impl TransformationContext {
    pub fn new<P: Into<PathBuf>>(working_folder: P) -> Self {
        TransformationContext {
            working_folder: working_folder.into(),
            attributes: IndexMap::new(),
            writers: HashMap::new(),
            transcript: Vec::new(),
            properties: IndexMap::new(),
        }
    }

    pub fn working_folder(&self) -> &Path {
        &self.working_folder
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Attribute names in insertion order.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.writers.remove(name);
        self.attributes.shift_remove(name)
    }

    /// Store `value` under `name` on behalf of `writer` (a node name).
    ///
    /// A null value is equivalent to `remove`. Writing a different value
    /// under a name already owned by a different node is a definition error;
    /// the same node re-running (inside a composite) overwrites freely.
    pub fn put<N, W>(&mut self, name: N, value: Value, writer: W) -> Result<(), TransformationError>
    where
        N: Into<String>,
        W: Into<String>,
    {
        let name = name.into();
        let writer = writer.into();
        if name.is_empty() {
            return Err(TransformationError::new(
                ErrorCategory::Definition,
                "context attribute name must not be empty",
            )
            .with_code("BF-CTX-001"));
        }
        if value.is_null() {
            self.remove(&name);
            return Ok(());
        }
        if let Some(previous_writer) = self.writers.get(&name) {
            if previous_writer != &writer && self.attributes.get(&name) != Some(&value) {
                return Err(TransformationError::new(
                    ErrorCategory::Definition,
                    format!(
                        "context attribute '{}' already set by node '{}', cannot be overwritten by node '{}'",
                        name, previous_writer, writer
                    ),
                )
                .with_code("BF-CTX-002"));
            }
        }
        debug!(attribute = %name, writer = %writer, "context attribute set");
        self.attributes.insert(name.clone(), value);
        self.writers.insert(name, writer);
        Ok(())
    }

    /// Pre-seed an attribute before the walk starts.
    pub fn seed<N: Into<String>>(&mut self, name: N, value: Value) -> Result<(), TransformationError> {
        self.put(name, value, "<seed>")
    }

    /// Shallow immutable view for condition evaluation and path resolution.
    pub fn snapshot(&self) -> ContextSnapshot {
        let mut map = Map::new();
        for (name, value) in &self.attributes {
            map.insert(name.clone(), value.clone());
        }
        ContextSnapshot {
            attributes: Value::Object(map),
        }
    }

    pub fn record(&mut self, entry: TranscriptEntry) {
        self.transcript.push(entry);
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn into_transcript(self) -> Vec<TranscriptEntry> {
        self.transcript
    }

    /// Set a transformation-result property surfaced in the final report.
    pub fn put_property<N: Into<String>>(&mut self, name: N, value: Value) {
        self.properties.insert(name.into(), value);
    }

    pub fn properties(&self) -> &IndexMap<String, Value> {
        &self.properties
    }
}

/// Read-only view of the context attributes, taken immediately before a node
/// is invoked. Nodes never see the mutable store.
#[derive(Debug, Clone)]
pub struct ContextSnapshot {
    attributes: Value,
}

impl ContextSnapshot {
    pub fn empty() -> Self {
        ContextSnapshot {
            attributes: Value::Object(Map::new()),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.as_object().and_then(|map| map.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The whole attribute map as one JSON object, for expression scopes.
    pub fn as_value(&self) -> &Value {
        &self.attributes
    }
}

/// One line of the append-only run transcript.
#[derive(Debug, PartialEq)]
pub struct TranscriptEntry {
    pub node_path: String,
    pub record: TranscriptRecord,
}

/// What happened at one template position.
#[derive(Debug, PartialEq)]
pub enum TranscriptRecord {
    Utility(UtilityResult),
    Operation(OperationResult),
    /// Condition evaluated to false; the node body never ran.
    Skipped { details: String },
    /// A fatal error, cancellation, or timeout ended the walk earlier.
    SkippedDueToAbort,
}

impl TranscriptRecord {
    pub fn is_error(&self) -> bool {
        match self {
            TranscriptRecord::Utility(result) => {
                result.result_type() == crate::result::UtilityResultType::Error
            }
            TranscriptRecord::Operation(result) => {
                result.result_type() == crate::result::OperationResultType::Error
            }
            _ => false,
        }
    }

    pub fn is_warning(&self) -> bool {
        match self {
            TranscriptRecord::Utility(result) => {
                result.result_type() == crate::result::UtilityResultType::Warning
            }
            TranscriptRecord::Operation(result) => {
                result.result_type() == crate::result::OperationResultType::Warning
            }
            _ => false,
        }
    }

    pub fn summary(&self) -> TranscriptRecordSummary {
        match self {
            TranscriptRecord::Utility(result) => TranscriptRecordSummary::Utility(result.summary()),
            TranscriptRecord::Operation(result) => {
                TranscriptRecordSummary::Operation(result.summary())
            }
            TranscriptRecord::Skipped { details } => TranscriptRecordSummary::Skipped {
                details: details.clone(),
            },
            TranscriptRecord::SkippedDueToAbort => TranscriptRecordSummary::SkippedDueToAbort,
        }
    }
}

/// Serializable rendering of a [`TranscriptRecord`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranscriptRecordSummary {
    Utility(crate::result::ResultSummary),
    Operation(crate::result::ResultSummary),
    Skipped { details: String },
    SkippedDueToAbort,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_get_remove() {
        let mut context = TransformationContext::new("/tmp/app");
        context.put("object", json!("house"), "node-a").unwrap();
        assert!(context.contains("object"));
        assert_eq!(context.get("object"), Some(&json!("house")));
        context.remove("object");
        assert!(!context.contains("object"));
    }

    #[test]
    fn put_null_is_remove() {
        let mut context = TransformationContext::new("/tmp/app");
        context.put("color", json!("blue"), "node-a").unwrap();
        context.put("color", Value::Null, "node-b").unwrap();
        assert!(!context.contains("color"));
    }

    #[test]
    fn collision_by_different_node_is_definition_error() {
        let mut context = TransformationContext::new("/tmp/app");
        context.put("color", json!("blue"), "node-a").unwrap();
        let err = context.put("color", json!("red"), "node-b").unwrap_err();
        assert_eq!(err.category, ErrorCategory::Definition);
    }

    #[test]
    fn same_node_rerun_overwrites() {
        let mut context = TransformationContext::new("/tmp/app");
        context.put("color", json!("blue"), "node-a").unwrap();
        context.put("color", json!("red"), "node-a").unwrap();
        assert_eq!(context.get("color"), Some(&json!("red")));
    }

    #[test]
    fn empty_name_rejected() {
        let mut context = TransformationContext::new("/tmp/app");
        let err = context.put("", json!(1), "node-a").unwrap_err();
        assert_eq!(err.category, ErrorCategory::Definition);
    }

    #[test]
    fn snapshot_is_detached() {
        let mut context = TransformationContext::new("/tmp/app");
        context.put("object", json!("house"), "node-a").unwrap();
        let snapshot = context.snapshot();
        context.put("object", json!("boat"), "node-a").unwrap();
        assert_eq!(snapshot.get("object"), Some(&json!("house")));
    }

    #[test]
    fn attribute_order_is_insertion_order() {
        let mut context = TransformationContext::new("/tmp/app");
        context.put("b", json!(1), "n").unwrap();
        context.put("a", json!(2), "n").unwrap();
        let names: Vec<&str> = context.attribute_names().collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
