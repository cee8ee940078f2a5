use butterfly_extensions::{
    ContextSnapshot, ErrorCategory, TransformationError, Utility, UtilityResult,
};
use serde_json::Value;
use std::path::Path;

/// Apply context attribute values to a `%s` format string and produce the
/// formatted text as the utility value.
#[derive(Debug, Clone)]
pub struct StringFormat {
    format: String,
    attribute_names: Vec<String>,
}

impl StringFormat {
    pub fn new<F: Into<String>>(format: F) -> Self {
        StringFormat {
            format: format.into(),
            attribute_names: Vec::new(),
        }
    }

    pub fn with_attribute_names<A>(mut self, attribute_names: A) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
    {
        self.attribute_names = attribute_names.into_iter().map(Into::into).collect();
        self
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn attribute_names(&self) -> &[String] {
        &self.attribute_names
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

impl Utility for StringFormat {
    fn describe(&self) -> String {
        format!(
            "Apply transformation context attributes [{}] to '{}'",
            self.attribute_names.join(", "),
            self.format
        )
    }

    fn execute(&self, _target: &Path, context: &ContextSnapshot) -> UtilityResult {
        let holes = self.format.matches("%s").count();
        if holes != self.attribute_names.len() {
            return UtilityResult::error(
                TransformationError::new(
                    ErrorCategory::Utility,
                    "String format and arguments don't match",
                )
                .with_code("BF-TU-010"),
            );
        }

        let mut formatted = String::new();
        let mut pieces = self.format.split("%s");
        if let Some(first) = pieces.next() {
            formatted.push_str(first);
        }
        for (piece, name) in pieces.zip(&self.attribute_names) {
            let Some(value) = context.get(name) else {
                return UtilityResult::error(
                    TransformationError::new(
                        ErrorCategory::Utility,
                        format!(
                            "attribute '{}' is not present in the transformation context",
                            name
                        ),
                    )
                    .with_code("BF-TU-011"),
                );
            };
            formatted.push_str(&render(value));
            formatted.push_str(piece);
        }
        UtilityResult::value(Value::String(formatted))
    }
}
