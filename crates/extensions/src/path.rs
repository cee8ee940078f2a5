use crate::context::ContextSnapshot;
use crate::error::{ErrorCategory, TransformationError};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Where a node's target file or folder comes from. The three forms are
/// mutually exclusive; the default targets the working folder itself.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSpec {
    /// Resolved against the working folder.
    Relative(PathBuf),
    /// Base path read from a context attribute holding an absolute path,
    /// with an optional relative suffix appended.
    FromAttribute {
        attribute: String,
        relative: Option<PathBuf>,
    },
    /// Used verbatim.
    Absolute(PathBuf),
}

impl Default for PathSpec {
    fn default() -> Self {
        PathSpec::Relative(PathBuf::new())
    }
}

impl PathSpec {
    pub fn relative<P: Into<PathBuf>>(path: P) -> Self {
        PathSpec::Relative(path.into())
    }

    pub fn from_attribute<S: Into<String>>(attribute: S) -> Self {
        PathSpec::FromAttribute {
            attribute: attribute.into(),
            relative: None,
        }
    }

    pub fn from_attribute_with<S: Into<String>, P: Into<PathBuf>>(attribute: S, relative: P) -> Self {
        PathSpec::FromAttribute {
            attribute: attribute.into(),
            relative: Some(relative.into()),
        }
    }

    pub fn absolute<P: Into<PathBuf>>(path: P) -> Self {
        PathSpec::Absolute(path.into())
    }

    /// The context attribute this specification reads, if any.
    pub fn attribute(&self) -> Option<&str> {
        match self {
            PathSpec::FromAttribute { attribute, .. } => Some(attribute.as_str()),
            _ => None,
        }
    }

    /// Compute the absolute target for a node. Runs before the node body;
    /// failure produces an ERROR result without invoking the body.
    pub fn resolve(
        &self,
        working_folder: &Path,
        snapshot: &ContextSnapshot,
    ) -> Result<PathBuf, TransformationError> {
        match self {
            PathSpec::Relative(path) => {
                if path.is_absolute() {
                    return Err(TransformationError::new(
                        ErrorCategory::Engine,
                        format!(
                            "relative path specification '{}' must not be absolute",
                            path.display()
                        ),
                    )
                    .with_code("BF-PATH-001"));
                }
                Ok(working_folder.join(path))
            }
            PathSpec::FromAttribute { attribute, relative } => {
                let value = snapshot.get(attribute).ok_or_else(|| {
                    TransformationError::new(
                        ErrorCategory::Engine,
                        format!(
                            "path attribute '{}' is not present in the transformation context",
                            attribute
                        ),
                    )
                    .with_code("BF-PATH-002")
                })?;
                let base = match value {
                    Value::String(path) => PathBuf::from(path),
                    other => {
                        return Err(TransformationError::new(
                            ErrorCategory::Engine,
                            format!(
                                "path attribute '{}' does not hold a path string (got {})",
                                attribute, other
                            ),
                        )
                        .with_code("BF-PATH-003"))
                    }
                };
                Ok(match relative {
                    Some(suffix) => base.join(suffix),
                    None => base,
                })
            }
            PathSpec::Absolute(path) => Ok(path.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TransformationContext;
    use serde_json::json;

    #[test]
    fn relative_resolves_against_working_folder() {
        let spec = PathSpec::relative("src/main/resources/application.properties");
        let resolved = spec
            .resolve(Path::new("/work/app"), &ContextSnapshot::empty())
            .unwrap();
        assert_eq!(
            resolved,
            PathBuf::from("/work/app/src/main/resources/application.properties")
        );
    }

    #[test]
    fn default_targets_working_folder() {
        let resolved = PathSpec::default()
            .resolve(Path::new("/work/app"), &ContextSnapshot::empty())
            .unwrap();
        assert_eq!(resolved, PathBuf::from("/work/app"));
    }

    #[test]
    fn from_attribute_reads_snapshot() {
        let mut context = TransformationContext::new("/work/app");
        context.put("pom_folder", json!("/work/app/module"), "n").unwrap();
        let snapshot = context.snapshot();

        let spec = PathSpec::from_attribute_with("pom_folder", "pom.xml");
        let resolved = spec.resolve(Path::new("/work/app"), &snapshot).unwrap();
        assert_eq!(resolved, PathBuf::from("/work/app/module/pom.xml"));
    }

    #[test]
    fn missing_attribute_is_unresolvable() {
        let spec = PathSpec::from_attribute("missing");
        let err = spec
            .resolve(Path::new("/work/app"), &ContextSnapshot::empty())
            .unwrap_err();
        assert_eq!(err.category, ErrorCategory::Engine);
    }
}
