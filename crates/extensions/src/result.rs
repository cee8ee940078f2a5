use crate::error::{ErrorSummary, TransformationError};
use serde::Serialize;
use serde_json::Value;

/// Behaviour shared by the utility and operation result type enums.
pub trait ResultState: std::fmt::Debug + Copy + PartialEq + Eq {
    /// Type after a warning cause is attached. NO_OP/NULL/SUCCESS/VALUE
    /// escalate to WARNING; WARNING and ERROR are left unchanged.
    fn on_warning(self) -> Self;
    /// WARNING and ERROR results may carry an exception.
    fn is_exception_type(self) -> bool;
    fn as_str(self) -> &'static str;
}

/// Outcome classification for a transformation utility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UtilityResultType {
    /// The utility ran and produced a value.
    Value,
    /// The utility ran but produced no value.
    Null,
    Warning,
    Error,
}

impl ResultState for UtilityResultType {
    fn on_warning(self) -> Self {
        match self {
            UtilityResultType::Value | UtilityResultType::Null => UtilityResultType::Warning,
            other => other,
        }
    }

    fn is_exception_type(self) -> bool {
        matches!(self, UtilityResultType::Warning | UtilityResultType::Error)
    }

    fn as_str(self) -> &'static str {
        match self {
            UtilityResultType::Value => "VALUE",
            UtilityResultType::Null => "NULL",
            UtilityResultType::Warning => "WARNING",
            UtilityResultType::Error => "ERROR",
        }
    }
}

/// Outcome classification for a transformation operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationResultType {
    /// No error happened, but the operation had nothing to change.
    NoOp,
    /// The operation executed and a change was performed.
    Success,
    /// A complete change was performed, but a non-fatal situation happened.
    Warning,
    /// The operation failed; the file may be unchanged or partially changed.
    Error,
}

impl ResultState for OperationResultType {
    fn on_warning(self) -> Self {
        match self {
            OperationResultType::NoOp | OperationResultType::Success => OperationResultType::Warning,
            other => other,
        }
    }

    fn is_exception_type(self) -> bool {
        matches!(
            self,
            OperationResultType::Warning | OperationResultType::Error
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            OperationResultType::NoOp => "NO_OP",
            OperationResultType::Success => "SUCCESS",
            OperationResultType::Warning => "WARNING",
            OperationResultType::Error => "ERROR",
        }
    }
}

/// Execution outcome of a single node.
///
/// At most one of `value` and `exception` is set; ERROR always carries an
/// exception and NO_OP/NULL never carry a value. The factory functions are
/// the only way to construct one, which keeps those invariants by shape.
#[derive(Debug)]
pub struct ExecutionResult<T: ResultState> {
    node_name: String,
    result_type: T,
    value: Option<Value>,
    exception: Option<TransformationError>,
    details: Option<String>,
    warnings: Vec<TransformationError>,
}

/// Result of a transformation utility.
pub type UtilityResult = ExecutionResult<UtilityResultType>;
/// Result of a transformation operation.
pub type OperationResult = ExecutionResult<OperationResultType>;

impl<T: ResultState> ExecutionResult<T> {
    fn bare(result_type: T) -> Self {
        ExecutionResult {
            node_name: String::new(),
            result_type,
            value: None,
            exception: None,
            details: None,
            warnings: Vec::new(),
        }
    }

    pub fn with_details<S: Into<String>>(mut self, details: S) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Attach a warning cause, escalating NO_OP/NULL/SUCCESS/VALUE to
    /// WARNING. WARNING and ERROR keep their type.
    pub fn add_warning(&mut self, cause: TransformationError) {
        self.warnings.push(cause);
        self.result_type = self.result_type.on_warning();
    }

    pub fn result_type(&self) -> T {
        self.result_type
    }

    pub fn is_exception_type(&self) -> bool {
        self.result_type.is_exception_type()
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Stamped by the engine once the owning node is known.
    pub fn set_node_name<S: Into<String>>(&mut self, name: S) {
        self.node_name = name.into();
    }

    /// The produced attribute value, if any.
    pub fn produced(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn exception(&self) -> Option<&TransformationError> {
        self.exception.as_ref()
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    pub fn warnings(&self) -> &[TransformationError] {
        &self.warnings
    }

    /// Serializable view used by transcript and report rendering.
    pub fn summary(&self) -> ResultSummary {
        ResultSummary {
            node: self.node_name.clone(),
            result_type: self.result_type.as_str(),
            value: self.value.clone(),
            details: self.details.clone(),
            exception: self.exception.as_ref().map(TransformationError::summary),
            warnings: self.warnings.iter().map(TransformationError::summary).collect(),
        }
    }
}

/// Equality is structural on (node name, type, value, exception message).
impl<T: ResultState> PartialEq for ExecutionResult<T> {
    fn eq(&self, other: &Self) -> bool {
        self.node_name == other.node_name
            && self.result_type == other.result_type
            && self.value == other.value
            && self.exception.as_ref().map(|e| e.message.as_str())
                == other.exception.as_ref().map(|e| e.message.as_str())
    }
}

impl UtilityResult {
    /// The utility ran and produced `value`.
    pub fn value(value: Value) -> Self {
        let mut result = Self::bare(UtilityResultType::Value);
        result.value = Some(value);
        result
    }

    /// The utility ran but produced no value.
    pub fn null() -> Self {
        Self::bare(UtilityResultType::Null)
    }

    pub fn warning<S: Into<String>>(details: S) -> Self {
        Self::bare(UtilityResultType::Warning).with_details(details)
    }

    pub fn warning_with_exception(exception: TransformationError) -> Self {
        let mut result = Self::bare(UtilityResultType::Warning);
        result.exception = Some(exception);
        result
    }

    pub fn error(exception: TransformationError) -> Self {
        let mut result = Self::bare(UtilityResultType::Error);
        result.exception = Some(exception);
        result
    }
}

impl OperationResult {
    pub fn no_op<S: Into<String>>(details: S) -> Self {
        Self::bare(OperationResultType::NoOp).with_details(details)
    }

    pub fn success() -> Self {
        Self::bare(OperationResultType::Success)
    }

    pub fn warning<S: Into<String>>(details: S) -> Self {
        Self::bare(OperationResultType::Warning).with_details(details)
    }

    pub fn warning_with_exception(exception: TransformationError) -> Self {
        let mut result = Self::bare(OperationResultType::Warning);
        result.exception = Some(exception);
        result
    }

    pub fn error(exception: TransformationError) -> Self {
        let mut result = Self::bare(OperationResultType::Error);
        result.exception = Some(exception);
        result
    }
}

/// Flat, serializable rendering of an [`ExecutionResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSummary {
    pub node: String,
    pub result_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<ErrorSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ErrorSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use serde_json::json;

    #[test]
    fn error_always_carries_exception() {
        let result =
            OperationResult::error(TransformationError::new(ErrorCategory::Operation, "boom"));
        assert_eq!(result.result_type(), OperationResultType::Error);
        assert!(result.exception().is_some());
        assert!(result.produced().is_none());
    }

    #[test]
    fn value_only_on_value_type() {
        let result = UtilityResult::value(json!("This house is blue"));
        assert_eq!(result.result_type(), UtilityResultType::Value);
        assert!(result.exception().is_none());

        let null = UtilityResult::null();
        assert!(null.produced().is_none());
    }

    #[test]
    fn warning_escalates_success_and_no_op() {
        let mut success = OperationResult::success();
        success.add_warning(TransformationError::new(ErrorCategory::Operation, "odd"));
        assert_eq!(success.result_type(), OperationResultType::Warning);

        let mut no_op = OperationResult::no_op("nothing to do");
        no_op.add_warning(TransformationError::new(ErrorCategory::Operation, "odd"));
        assert_eq!(no_op.result_type(), OperationResultType::Warning);
    }

    #[test]
    fn warning_never_downgrades_error() {
        let mut error =
            OperationResult::error(TransformationError::new(ErrorCategory::Operation, "boom"));
        error.add_warning(TransformationError::new(ErrorCategory::Operation, "odd"));
        assert_eq!(error.result_type(), OperationResultType::Error);
        assert_eq!(error.warnings().len(), 1);
    }

    #[test]
    fn exception_types() {
        assert!(UtilityResultType::Warning.is_exception_type());
        assert!(UtilityResultType::Error.is_exception_type());
        assert!(!UtilityResultType::Value.is_exception_type());
        assert!(!OperationResultType::NoOp.is_exception_type());
    }

    #[test]
    fn structural_equality() {
        let mut a = UtilityResult::value(json!(1));
        a.set_node_name("n");
        let mut b = UtilityResult::value(json!(1)).with_details("different details");
        b.set_node_name("n");
        assert_eq!(a, b);

        let mut c = UtilityResult::value(json!(2));
        c.set_node_name("n");
        assert_ne!(a, c);
    }
}
