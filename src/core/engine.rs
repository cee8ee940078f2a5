use crate::core::compression::CompressionHandler;
use crate::core::instructions::ManualInstructionsWriter;
use crate::core::registry::ExtensionRegistry;
use crate::core::report::{TransformationOutcome, TransformationReport};
use crate::core::validation::{join_path, TemplateValidator};
use butterfly_extensions::{
    Condition, ConditionEngine, ContextSnapshot, ErrorCategory, ExecutionResult, Node, NodeBody,
    Operation, OperationResult, OperationResultType, ResultState, Template, TransformationContext,
    TransformationError, TranscriptEntry, TranscriptRecord, UtilityResult, UtilityResultType,
};
use chrono::Utc;
use indexmap::{IndexMap, IndexSet};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

/// Options supplied by the host for one transformation run.
#[derive(Clone, Default)]
pub struct TransformationOptions {
    /// Folder the working copy is created under. Defaults to a `butterfly`
    /// directory in the system temp folder.
    pub output_folder: Option<PathBuf>,
    /// Zip the transformed folder after the walk.
    pub zip_output: bool,
    /// Transform the source folder in place instead of copying it first.
    pub modify_original_folder: bool,
    /// Transformation-wide timeout covering the whole walk.
    pub timeout: Option<Duration>,
    /// Advisory cancellation flag, honoured between nodes.
    pub cancellation: Option<Arc<AtomicBool>>,
    /// Context attributes seeded before the walk starts.
    pub seed_attributes: IndexMap<String, Value>,
}

/// The transformation executor.
///
/// Collaborators are explicit constructor dependencies; the engine owns no
/// process-wide state, and independent runs share nothing mutable.
pub struct TransformationEngine {
    registry: ExtensionRegistry,
    validator: TemplateValidator,
    instructions: ManualInstructionsWriter,
    compression: CompressionHandler,
    conditions: ConditionEngine,
}

impl TransformationEngine {
    pub fn new(
        registry: ExtensionRegistry,
        validator: TemplateValidator,
        instructions: ManualInstructionsWriter,
        compression: CompressionHandler,
    ) -> Self {
        TransformationEngine {
            registry,
            validator,
            instructions,
            compression,
            conditions: ConditionEngine::default(),
        }
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    /// Run a template registered under `template_name`.
    pub fn transform_registered(
        &self,
        source: &Path,
        template_name: &str,
        options: &TransformationOptions,
    ) -> Result<TransformationReport, TransformationError> {
        let template = self.registry.get(template_name).ok_or_else(|| {
            TransformationError::new(
                ErrorCategory::Definition,
                format!("no template registered under '{}'", template_name),
            )
            .with_code("BF-ENG-001")
        })?;
        self.transform(source, &template, options)
    }

    /// Apply `template` to a copy of `source` and report the outcome.
    pub fn transform(
        &self,
        source: &Path,
        template: &Template,
        options: &TransformationOptions,
    ) -> Result<TransformationReport, TransformationError> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        info!(template = template.name(), source = %source.display(), %run_id, "transformation starting");

        // Prepare: the working copy must exist before any node runs.
        let working_folder = self.prepare_working_folder(source, options, run_id)?;

        // Validate: all offences batched into one definition error.
        self.validator
            .validate(template, options.seed_attributes.keys().cloned())?;
        let mut template = template.clone();
        template.seal();

        let mut context = TransformationContext::new(&working_folder);
        for (name, value) in &options.seed_attributes {
            context.seed(name.clone(), value.clone())?;
        }

        let mut walk = Walk {
            engine: self,
            context,
            completed: HashMap::new(),
            abort: None,
            deadline: options.timeout.map(|timeout| Instant::now() + timeout),
            cancellation: options.cancellation.clone(),
        };
        walk.run_sequence("", template.nodes().to_vec())?;

        let cancelled = matches!(
            walk.abort,
            Some(AbortKind::Cancelled) | Some(AbortKind::TimedOut)
        );
        let mut context = walk.context;
        let executed = context
            .transcript()
            .iter()
            .filter(|entry| {
                matches!(
                    entry.record,
                    TranscriptRecord::Utility(_) | TranscriptRecord::Operation(_)
                )
            })
            .count();
        let errors = context
            .transcript()
            .iter()
            .filter(|entry| entry.record.is_error())
            .count();
        let warnings = context
            .transcript()
            .iter()
            .filter(|entry| entry.record.is_warning())
            .count();
        context.put_property("nodes_executed", json!(executed));
        context.put_property("errors", json!(errors));
        context.put_property("warnings", json!(warnings));
        let properties = context.properties().clone();
        let transcript = context.into_transcript();

        let any_error = errors > 0;
        let any_warning = warnings > 0;
        let outcome = if any_error || cancelled {
            TransformationOutcome::Incomplete
        } else if any_warning {
            TransformationOutcome::CompleteWithWarnings
        } else {
            TransformationOutcome::Complete
        };

        // Emit: manual instructions and optional archive.
        let manual_instructions =
            self.instructions
                .write(&working_folder, template.name(), &transcript)?;
        let archive = if options.zip_output {
            Some(self.compression.compress(&working_folder)?)
        } else {
            None
        };

        info!(template = template.name(), %outcome, "transformation finished");
        Ok(TransformationReport {
            run_id,
            template: template.name().to_string(),
            transformed_folder: working_folder,
            outcome,
            cancelled,
            transcript,
            manual_instructions,
            archive,
            properties,
            started_at,
            completed_at: Utc::now(),
        })
    }

    fn prepare_working_folder(
        &self,
        source: &Path,
        options: &TransformationOptions,
        run_id: Uuid,
    ) -> Result<PathBuf, TransformationError> {
        if !source.is_dir() {
            return Err(TransformationError::new(
                ErrorCategory::Engine,
                format!("application folder {} does not exist", source.display()),
            )
            .with_code("BF-ENG-002"));
        }
        if options.modify_original_folder {
            return Ok(source.to_path_buf());
        }

        let app_name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "application".to_string());
        let parent = options
            .output_folder
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("butterfly"));
        let working = parent.join(format!("{}-transformed-{}", app_name, run_id.simple()));

        copy_tree(source, &working).map_err(|err| {
            TransformationError::with_source(
                ErrorCategory::Engine,
                format!(
                    "failed to prepare working folder {} from {}",
                    working.display(),
                    source.display()
                ),
                err,
            )
            .with_code("BF-ENG-003")
        })?;
        debug!(working = %working.display(), "working folder prepared");
        Ok(working)
    }
}

fn copy_tree(source: &Path, destination: &Path) -> std::io::Result<()> {
    fs::create_dir_all(destination)?;
    for entry in WalkDir::new(source).min_depth(1) {
        let entry = entry.map_err(std::io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(std::io::Error::other)?;
        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AbortKind {
    /// A node with `abort_on_failure` returned ERROR.
    FatalError,
    Cancelled,
    TimedOut,
}

/// Mutable state of one walk over a sealed template.
struct Walk<'a> {
    engine: &'a TransformationEngine,
    context: TransformationContext,
    /// Node name -> whether it completed with an ERROR result.
    completed: HashMap<String, bool>,
    abort: Option<AbortKind>,
    deadline: Option<Instant>,
    cancellation: Option<Arc<AtomicBool>>,
}

impl Walk<'_> {
    /// Execute `nodes` in declaration order under `parent_path`. Composite
    /// expansions are spliced at the front of the local queue, so they run
    /// before any later sibling.
    fn run_sequence(
        &mut self,
        parent_path: &str,
        nodes: Vec<Node>,
    ) -> Result<(), TransformationError> {
        let mut queue: VecDeque<Node> = nodes.into();
        while let Some(node) = queue.pop_front() {
            let node_path = join_path(parent_path, node.name());
            if self.abort.is_some() {
                self.context.record(TranscriptEntry {
                    node_path,
                    record: TranscriptRecord::SkippedDueToAbort,
                });
                continue;
            }
            if let Some(cancel) = &self.cancellation {
                if cancel.load(Ordering::SeqCst) {
                    warn!(node = %node_path, "cancellation observed, aborting walk");
                    self.abort = Some(AbortKind::Cancelled);
                    self.context.record(TranscriptEntry {
                        node_path,
                        record: TranscriptRecord::SkippedDueToAbort,
                    });
                    continue;
                }
            }
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    // The timeout fires as if a fatal error were raised at
                    // the node about to execute.
                    warn!(node = %node_path, "transformation timeout fired");
                    self.abort = Some(AbortKind::TimedOut);
                    let error = TransformationError::new(
                        ErrorCategory::Timeout,
                        "transformation exceeded its configured timeout",
                    )
                    .with_code("BF-TIME-001");
                    self.record_failure(&node_path, &node, error);
                    continue;
                }
            }
            self.run_node(&node_path, node, &mut queue)?;
        }
        Ok(())
    }

    /// The node pipeline: condition, dependencies, path resolution, body,
    /// save-result-as.
    fn run_node(
        &mut self,
        node_path: &str,
        node: Node,
        queue: &mut VecDeque<Node>,
    ) -> Result<(), TransformationError> {
        // 1. Condition.
        if let Some(condition) = node.condition() {
            match self.evaluate_condition(condition) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(node = %node_path, "condition false, skipping");
                    self.context.record(TranscriptEntry {
                        node_path: node_path.to_string(),
                        record: TranscriptRecord::Skipped {
                            details: "condition evaluated to false".to_string(),
                        },
                    });
                    return Ok(());
                }
                Err(error) => {
                    self.record_failure(node_path, &node, error);
                    return Ok(());
                }
            }
        }

        // 2. Dependencies must have completed without ERROR.
        for dependency in node.dependencies() {
            let satisfied = matches!(self.completed.get(dependency.as_str()), Some(false));
            if !satisfied {
                let error = TransformationError::new(
                    ErrorCategory::Engine,
                    format!("unmet dependency '{}'", dependency),
                )
                .with_code("BF-ENG-004");
                self.record_failure(node_path, &node, error);
                return Ok(());
            }
        }

        // 3. Path resolution, against the snapshot taken immediately before
        // invocation.
        let snapshot = self.context.snapshot();
        let target = match node
            .path()
            .resolve(self.context.working_folder(), &snapshot)
        {
            Ok(target) => target,
            Err(error) => {
                self.record_failure(node_path, &node, error);
                return Ok(());
            }
        };

        // 4. Body, then 5. save-result-as.
        match node.body().clone() {
            NodeBody::Utility(utility) => {
                let mut result = run_utility_body(|| utility.execute(&target, &snapshot));
                result.set_node_name(node.name());
                self.finish_utility(node_path, &node, result)?;
            }
            NodeBody::Operation(operation) => {
                let mut result = run_operation_body(|| operation.execute(&target, &snapshot));
                result.set_node_name(node.name());
                self.finish_operation(node_path, &node, result);
            }
            NodeBody::Group(children) => {
                self.run_group(node_path, &node, children)?;
            }
            NodeBody::MultiFile { template, attributes } => {
                self.run_multi_file(node_path, &node, template, attributes, &snapshot, queue)?;
            }
            NodeBody::Conditional { condition, child } => {
                match self.evaluate_condition(&condition) {
                    Ok(true) => {
                        let child_path = join_path(node_path, child.name());
                        let child_name = child.name().to_string();
                        self.run_node(&child_path, *child, queue)?;
                        // The wrapper completes with its child's status.
                        let errored = self.completed.get(&child_name).copied().unwrap_or(false);
                        self.completed.insert(node.name().to_string(), errored);
                    }
                    Ok(false) => {
                        self.context.record(TranscriptEntry {
                            node_path: node_path.to_string(),
                            record: TranscriptRecord::Skipped {
                                details: "condition evaluated to false".to_string(),
                            },
                        });
                    }
                    Err(error) => {
                        self.record_failure(node_path, &node, error);
                    }
                }
            }
        }
        Ok(())
    }

    fn evaluate_condition(&self, condition: &Condition) -> Result<bool, TransformationError> {
        self.engine
            .conditions
            .evaluate(condition, &self.context.snapshot())
    }

    /// Record a utility result, saving its value into the context when the
    /// node asks for it.
    fn finish_utility(
        &mut self,
        node_path: &str,
        node: &Node,
        mut result: UtilityResult,
    ) -> Result<(), TransformationError> {
        if result.result_type() == UtilityResultType::Value {
            if let (Some(attribute), Some(value)) =
                (node.save_result_attribute(), result.produced().cloned())
            {
                self.context.put(attribute, value, node.name())?;
            }
        }
        let errored = result.result_type() == UtilityResultType::Error;
        if errored {
            result = self.note_error(node_path, node, result);
        }
        self.completed.insert(node.name().to_string(), errored);
        self.context.record(TranscriptEntry {
            node_path: node_path.to_string(),
            record: TranscriptRecord::Utility(result),
        });
        Ok(())
    }

    fn finish_operation(&mut self, node_path: &str, node: &Node, result: OperationResult) {
        let errored = result.result_type() == OperationResultType::Error;
        let result = if errored {
            self.note_error(node_path, node, result)
        } else {
            result
        };
        self.completed.insert(node.name().to_string(), errored);
        self.context.record(TranscriptEntry {
            node_path: node_path.to_string(),
            record: TranscriptRecord::Operation(result),
        });
    }

    /// Log an error result and arm the abort flag when the node is fatal.
    fn note_error<T: ResultState>(
        &mut self,
        node_path: &str,
        node: &Node,
        result: ExecutionResult<T>,
    ) -> ExecutionResult<T> {
        warn!(
            node = %node_path,
            error = %result.exception().map(|e| e.message.as_str()).unwrap_or("unknown"),
            "node failed"
        );
        if node.aborts_on_failure() {
            self.abort = Some(AbortKind::FatalError);
        }
        result
    }

    /// Record an ERROR produced by the pre-check pipeline, typed to match
    /// the node kind.
    fn record_failure(&mut self, node_path: &str, node: &Node, error: TransformationError) {
        self.completed.insert(node.name().to_string(), true);
        if node.aborts_on_failure() {
            self.abort = Some(AbortKind::FatalError);
        }
        warn!(node = %node_path, error = %error.message, "node failed before execution");
        let record = match node.body() {
            NodeBody::Operation(_) => {
                let mut result = OperationResult::error(error);
                result.set_node_name(node.name());
                TranscriptRecord::Operation(result)
            }
            _ => {
                let mut result = UtilityResult::error(error);
                result.set_node_name(node.name());
                TranscriptRecord::Utility(result)
            }
        };
        self.context.record(TranscriptEntry {
            node_path: node_path.to_string(),
            record,
        });
    }

    /// Execute a group's static children, then record the aggregate result:
    /// VALUE over the children's transcript slice, WARNING if any child
    /// warned, ERROR if a fatal child error aborted the walk.
    fn run_group(
        &mut self,
        node_path: &str,
        node: &Node,
        children: Vec<Node>,
    ) -> Result<(), TransformationError> {
        let abort_before = self.abort;
        let start = self.context.transcript().len();
        self.run_sequence(node_path, children)?;

        let slice = &self.context.transcript()[start..];
        let any_warning = slice.iter().any(|entry| entry.record.is_warning());
        let aborted_here = abort_before.is_none() && self.abort == Some(AbortKind::FatalError);
        let slice_value: Vec<Value> = slice
            .iter()
            .map(|entry| {
                json!({
                    "node": entry.node_path,
                    "record": entry.record.summary(),
                })
            })
            .collect();

        let mut result = if aborted_here {
            UtilityResult::error(
                TransformationError::new(
                    ErrorCategory::Utility,
                    format!("group '{}' aborted by a fatal child failure", node.name()),
                )
                .with_code("BF-ENG-005"),
            )
        } else {
            UtilityResult::value(Value::Array(slice_value))
        };
        if any_warning && !aborted_here {
            result.add_warning(TransformationError::new(
                ErrorCategory::Utility,
                format!("group '{}' finished with child warnings", node.name()),
            ));
        }
        result.set_node_name(node.name());
        self.finish_utility(node_path, node, result)
    }

    /// Expand a multi-file composite: union the file lists in first-seen
    /// order, synthesise one clone of the template operation per file, and
    /// splice the clones right after the composite.
    fn run_multi_file(
        &mut self,
        node_path: &str,
        node: &Node,
        template: Arc<dyn Operation>,
        attributes: Vec<String>,
        snapshot: &ContextSnapshot,
        queue: &mut VecDeque<Node>,
    ) -> Result<(), TransformationError> {
        let mut files: IndexSet<String> = IndexSet::new();
        for attribute in &attributes {
            let Some(value) = snapshot.get(attribute) else {
                // An absent list contributes nothing.
                continue;
            };
            let Some(items) = value.as_array() else {
                let error = TransformationError::new(
                    ErrorCategory::Utility,
                    format!("attribute '{}' does not hold a file list", attribute),
                )
                .with_code("BF-ENG-006");
                self.record_failure(node_path, node, error);
                return Ok(());
            };
            for item in items {
                let Some(file) = item.as_str() else {
                    let error = TransformationError::new(
                        ErrorCategory::Utility,
                        format!("attribute '{}' holds a non-path entry", attribute),
                    )
                    .with_code("BF-ENG-006");
                    self.record_failure(node_path, node, error);
                    return Ok(());
                };
                files.insert(file.to_string());
            }
        }

        let working = self.context.working_folder().to_path_buf();
        let mut synthesised = Vec::with_capacity(files.len());
        let mut names = Vec::with_capacity(files.len());
        for (index, file) in files.iter().enumerate() {
            let order = index + 1;
            let name = format!(
                "{}-{}-{}-TEMPLATE_OPERATION",
                node.name(),
                order,
                template.type_name()
            );
            let file_path = PathBuf::from(file);
            let mut child = Node::operation_boxed(&name, template.duplicate());
            child = match file_path.strip_prefix(&working) {
                Ok(relative) => child.relative(relative.to_path_buf()),
                Err(_) => child.absolute(file_path),
            };
            child.assign_position(node.name(), order);
            names.push(Value::String(name));
            synthesised.push(child);
        }

        debug!(
            node = %node_path,
            operations = synthesised.len(),
            template = template.type_name(),
            "multi-file composite expanded"
        );
        let mut result = UtilityResult::value(Value::Array(names)).with_details(format!(
            "Multiple operation {} resulted in {} operations based on {}",
            node.name(),
            synthesised.len(),
            template.type_name()
        ));
        result.set_node_name(node.name());
        self.finish_utility(node_path, node, result)?;

        for child in synthesised.into_iter().rev() {
            queue.push_front(child);
        }
        Ok(())
    }
}

/// Body invocations never unwind into the engine; a panic becomes an ERROR
/// result referencing the node.
fn run_utility_body<F: FnOnce() -> UtilityResult>(body: F) -> UtilityResult {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(result) => result,
        Err(panic) => UtilityResult::error(
            TransformationError::new(
                ErrorCategory::Utility,
                format!("utility body panicked: {}", panic_message(&panic)),
            )
            .with_code("BF-ENG-007"),
        ),
    }
}

fn run_operation_body<F: FnOnce() -> OperationResult>(body: F) -> OperationResult {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(result) => result,
        Err(panic) => OperationResult::error(
            TransformationError::new(
                ErrorCategory::Operation,
                format!("operation body panicked: {}", panic_message(&panic)),
            )
            .with_code("BF-ENG-007"),
        ),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
