use butterfly_extensions::{
    ContextSnapshot, ErrorCategory, TransformationError, Utility, UtilityResult,
};
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Walk the resolved folder and produce the list of files whose name
/// matches, as a sorted array of absolute paths. Feeds multi-file
/// composites.
#[derive(Debug, Clone)]
pub struct FindFiles {
    name_pattern: Regex,
    recursive: bool,
}

impl FindFiles {
    /// Fails with a definition error when the pattern does not compile.
    pub fn new(name_pattern: &str, recursive: bool) -> Result<Self, TransformationError> {
        let name_pattern = Regex::new(name_pattern).map_err(|err| {
            TransformationError::with_source(
                ErrorCategory::Definition,
                format!("invalid file name pattern '{}'", name_pattern),
                err,
            )
            .with_code("BF-DEF-011")
        })?;
        Ok(FindFiles {
            name_pattern,
            recursive,
        })
    }
}

impl Utility for FindFiles {
    fn describe(&self) -> String {
        format!(
            "Find files named like '{}'{}",
            self.name_pattern.as_str(),
            if self.recursive { ", recursively" } else { "" }
        )
    }

    fn execute(&self, target: &Path, _context: &ContextSnapshot) -> UtilityResult {
        if !target.is_dir() {
            return UtilityResult::error(
                TransformationError::new(
                    ErrorCategory::Utility,
                    format!("search folder {} does not exist", target.display()),
                )
                .with_code("BF-TU-020"),
            );
        }

        let mut walker = WalkDir::new(target).sort_by_file_name();
        if !self.recursive {
            walker = walker.max_depth(1);
        }

        let mut found = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    return UtilityResult::error(TransformationError::with_source(
                        ErrorCategory::Utility,
                        format!("failed to walk {}", target.display()),
                        err,
                    ))
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if self.name_pattern.is_match(&name) {
                found.push(entry.path().to_string_lossy().into_owned());
            }
        }
        found.sort();

        debug!(pattern = %self.name_pattern, count = found.len(), "file search finished");
        if found.is_empty() {
            return UtilityResult::null().with_details(format!(
                "No files named like '{}' found",
                self.name_pattern.as_str()
            ));
        }
        UtilityResult::value(Value::Array(found.into_iter().map(Value::String).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use butterfly_extensions::UtilityResultType;
    use std::fs;

    fn sample_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/main/resources")).unwrap();
        fs::write(dir.path().join("app.properties"), "a=1\n").unwrap();
        fs::write(
            dir.path().join("src/main/resources/application.properties"),
            "b=2\n",
        )
        .unwrap();
        fs::write(dir.path().join("readme.md"), "hi\n").unwrap();
        dir
    }

    #[test]
    fn finds_matching_files_recursively() {
        let dir = sample_tree();
        let utility = FindFiles::new(r"\.properties$", true).unwrap();
        let result = utility.execute(dir.path(), &ContextSnapshot::empty());
        assert_eq!(result.result_type(), UtilityResultType::Value);
        let files = result.produced().unwrap().as_array().unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn non_recursive_stays_at_top_level() {
        let dir = sample_tree();
        let utility = FindFiles::new(r"\.properties$", false).unwrap();
        let result = utility.execute(dir.path(), &ContextSnapshot::empty());
        let files = result.produced().unwrap().as_array().unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn no_match_produces_null() {
        let dir = sample_tree();
        let utility = FindFiles::new(r"\.yaml$", true).unwrap();
        let result = utility.execute(dir.path(), &ContextSnapshot::empty());
        assert_eq!(result.result_type(), UtilityResultType::Null);
        assert!(result.produced().is_none());
    }

    #[test]
    fn missing_folder_is_an_error() {
        let utility = FindFiles::new(r"\.properties$", true).unwrap();
        let result = utility.execute(Path::new("/definitely/absent"), &ContextSnapshot::empty());
        assert_eq!(result.result_type(), UtilityResultType::Error);
    }
}
