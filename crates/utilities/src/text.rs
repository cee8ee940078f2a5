use butterfly_extensions::{
    ContextSnapshot, ErrorCategory, Operation, OperationResult, TransformationError,
};
use regex::Regex;
use std::fs;
use std::path::Path;

/// Replace every regex match in a text file.
#[derive(Debug, Clone)]
pub struct ReplaceText {
    pattern: Regex,
    replacement: String,
}

impl ReplaceText {
    /// Fails with a definition error when the pattern does not compile.
    pub fn new<R: Into<String>>(pattern: &str, replacement: R) -> Result<Self, TransformationError> {
        let pattern = Regex::new(pattern).map_err(|err| {
            TransformationError::with_source(
                ErrorCategory::Definition,
                format!("invalid replacement pattern '{}'", pattern),
                err,
            )
            .with_code("BF-DEF-010")
        })?;
        Ok(ReplaceText {
            pattern,
            replacement: replacement.into(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

impl Operation for ReplaceText {
    fn type_name(&self) -> &'static str {
        "ReplaceText"
    }

    fn describe(&self) -> String {
        format!(
            "Replace text matching '{}' with '{}'",
            self.pattern.as_str(),
            self.replacement
        )
    }

    fn execute(&self, target: &Path, _context: &ContextSnapshot) -> OperationResult {
        let content = match fs::read_to_string(target) {
            Ok(content) => content,
            Err(err) => {
                return OperationResult::error(TransformationError::with_source(
                    ErrorCategory::Operation,
                    "Text file could not be modified",
                    err,
                ))
            }
        };

        let matches = self.pattern.find_iter(&content).count();
        if matches == 0 {
            return OperationResult::no_op(format!(
                "No text matching '{}' found",
                self.pattern.as_str()
            ));
        }

        let replaced = self
            .pattern
            .replace_all(&content, self.replacement.as_str());
        if let Err(err) = fs::write(target, replaced.as_bytes()) {
            return OperationResult::error(TransformationError::with_source(
                ErrorCategory::Operation,
                "Text file could not be modified",
                err,
            ));
        }
        OperationResult::success().with_details(format!("{} occurrences replaced", matches))
    }

    fn duplicate(&self) -> Box<dyn Operation> {
        Box::new(self.clone())
    }
}
