use serde::Serialize;
use std::fmt;

/// Broad classification of a transformation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Template is malformed: unknown references, duplicate names, bad
    /// artifact coordinates. Raised before any node executes.
    Definition,
    /// A utility body failed while computing its value.
    Utility,
    /// An operation body failed after partial or no change.
    Operation,
    /// Engine-level failure: working folder preparation, cancellation,
    /// I/O catastrophe.
    Engine,
    Io,
    Timeout,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Definition => "definition",
            ErrorCategory::Utility => "utility",
            ErrorCategory::Operation => "operation",
            ErrorCategory::Engine => "engine",
            ErrorCategory::Io => "io",
            ErrorCategory::Timeout => "timeout",
        };
        write!(f, "{}", name)
    }
}

impl ErrorCategory {
    fn default_code(&self) -> &'static str {
        match self {
            ErrorCategory::Definition => "BF-DEF-000",
            ErrorCategory::Utility => "BF-TU-000",
            ErrorCategory::Operation => "BF-TO-000",
            ErrorCategory::Engine => "BF-ENG-000",
            ErrorCategory::Io => "BF-IO-000",
            ErrorCategory::Timeout => "BF-TIME-000",
        }
    }
}

/// Structured failure carried inside results and returned by the engine.
///
/// Node bodies never unwind across the engine boundary; anything that escapes
/// is wrapped into one of these and recorded in the transcript.
#[derive(Debug)]
pub struct TransformationError {
    pub category: ErrorCategory,
    pub code: String,
    pub message: String,
    pub source: Option<anyhow::Error>,
}

impl TransformationError {
    pub fn new<T: Into<String>>(category: ErrorCategory, message: T) -> Self {
        TransformationError {
            category,
            code: category.default_code().to_string(),
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source<T, E>(category: ErrorCategory, message: T, source: E) -> Self
    where
        T: Into<String>,
        E: Into<anyhow::Error>,
    {
        let mut error = TransformationError::new(category, message);
        error.source = Some(source.into());
        error
    }

    pub fn with_code<T: Into<String>>(mut self, code: T) -> Self {
        self.code = code.into();
        self
    }

    /// Messages of the cause chain, outermost first, excluding this error.
    pub fn causes(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(source) = &self.source {
            for cause in source.chain() {
                out.push(cause.to_string());
            }
        }
        out
    }

    /// Serializable view used by transcript and report rendering.
    pub fn summary(&self) -> ErrorSummary {
        ErrorSummary {
            code: self.code.clone(),
            category: self.category,
            message: self.message.clone(),
            causes: self.causes(),
        }
    }
}

impl fmt::Display for TransformationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.category, self.message)?;
        for cause in self.causes() {
            write!(f, "\nCaused by: {}", cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for TransformationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|err| &**err as &(dyn std::error::Error + 'static))
    }
}

/// Equality is on category and message; the source chain is informational.
impl PartialEq for TransformationError {
    fn eq(&self, other: &Self) -> bool {
        self.category == other.category && self.message == other.message
    }
}

impl From<std::io::Error> for TransformationError {
    fn from(err: std::io::Error) -> Self {
        TransformationError::with_source(ErrorCategory::Io, err.to_string(), err)
    }
}

/// Flat, serializable rendering of a [`TransformationError`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorSummary {
    pub code: String,
    pub category: ErrorCategory,
    pub message: String,
    pub causes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_cause_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let error = TransformationError::with_source(
            ErrorCategory::Operation,
            "Property file could not be modified",
            io,
        );
        assert_eq!(error.causes(), vec!["no such file".to_string()]);
        assert_eq!(error.summary().causes.len(), 1);
    }

    #[test]
    fn equality_ignores_source() {
        let a = TransformationError::new(ErrorCategory::Utility, "boom");
        let b = TransformationError::with_source(
            ErrorCategory::Utility,
            "boom",
            std::io::Error::other("detail"),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn code_override() {
        let error =
            TransformationError::new(ErrorCategory::Definition, "bad template").with_code("BF-DEF-007");
        assert_eq!(error.code, "BF-DEF-007");
    }
}
