use butterfly_extensions::{
    ContextSnapshot, ErrorCategory, Operation, OperationResult, TransformationError,
};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Add a property to a Java properties file, or overwrite its value in
/// place when the key already exists.
#[derive(Debug, Clone)]
pub struct AddProperty {
    property_name: String,
    property_value: String,
}

impl AddProperty {
    pub fn new<N, V>(property_name: N, property_value: V) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        AddProperty {
            property_name: property_name.into(),
            property_value: property_value.into(),
        }
    }

    pub fn property_name(&self) -> &str {
        &self.property_name
    }

    pub fn property_value(&self) -> &str {
        &self.property_value
    }

    fn apply(&self, target: &Path) -> Result<OperationResult, std::io::Error> {
        let content = fs::read_to_string(target)?;
        let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
        let mut replaced = false;
        let mut unchanged = false;

        for line in lines.iter_mut() {
            let trimmed = line.trim_start();
            if trimmed.starts_with('#') || trimmed.starts_with('!') {
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                continue;
            };
            if key.trim() == self.property_name {
                if value.trim() == self.property_value {
                    unchanged = true;
                } else {
                    *line = format!("{}={}", self.property_name, self.property_value);
                }
                replaced = true;
                break;
            }
        }

        if unchanged {
            return Ok(OperationResult::no_op(format!(
                "Property {} is already set to {}",
                self.property_name, self.property_value
            )));
        }
        if !replaced {
            lines.push(format!("{}={}", self.property_name, self.property_value));
        }

        let mut output = lines.join("\n");
        output.push('\n');
        fs::write(target, output)?;

        debug!(
            property = %self.property_name,
            file = %target.display(),
            overwritten = replaced,
            "property applied"
        );
        Ok(
            OperationResult::success().with_details(if replaced {
                format!(
                    "Property {} value overwritten with {}",
                    self.property_name, self.property_value
                )
            } else {
                format!(
                    "Property {} added with value {}",
                    self.property_name, self.property_value
                )
            }),
        )
    }
}

impl Operation for AddProperty {
    fn type_name(&self) -> &'static str {
        "AddProperty"
    }

    fn describe(&self) -> String {
        format!(
            "Add new property ({} = {}) to a properties file",
            self.property_name, self.property_value
        )
    }

    fn execute(&self, target: &Path, _context: &ContextSnapshot) -> OperationResult {
        match self.apply(target) {
            Ok(result) => result,
            Err(err) => OperationResult::error(TransformationError::with_source(
                ErrorCategory::Operation,
                "Property file could not be modified",
                err,
            )),
        }
    }

    fn duplicate(&self) -> Box<dyn Operation> {
        Box::new(self.clone())
    }
}
