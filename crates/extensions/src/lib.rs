//! Extension API for the Butterfly transformation engine.
//!
//! Everything a utility or operation implementer needs lives here: the
//! result model, the transformation context, the node contracts, path
//! specifications, conditions, and the template builder. The engine itself
//! lives in the `butterfly` crate and drives these types.

pub mod condition;
pub mod context;
pub mod error;
pub mod node;
pub mod path;
pub mod result;
pub mod template;

pub use condition::{Condition, ConditionEngine};
pub use context::{
    ContextSnapshot, TransformationContext, TranscriptEntry, TranscriptRecord,
    TranscriptRecordSummary,
};
pub use error::{ErrorCategory, ErrorSummary, TransformationError};
pub use node::{Node, NodeBody, Operation, Utility};
pub use path::PathSpec;
pub use result::{
    ExecutionResult, OperationResult, OperationResultType, ResultState, ResultSummary,
    UtilityResult, UtilityResultType,
};
pub use template::Template;
