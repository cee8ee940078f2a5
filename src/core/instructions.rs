use butterfly_extensions::{
    ErrorCategory, TransformationError, TranscriptEntry, TranscriptRecord,
};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const INSTRUCTIONS_FILE: &str = "MANUAL_INSTRUCTIONS.md";

/// Renders the per-node messages collected during the walk into a Markdown
/// file at the working-folder root. Returns `None` when nothing needs
/// manual attention.
#[derive(Debug, Default)]
pub struct ManualInstructionsWriter;

impl ManualInstructionsWriter {
    pub fn new() -> Self {
        ManualInstructionsWriter
    }

    pub fn write(
        &self,
        working_folder: &Path,
        template_name: &str,
        transcript: &[TranscriptEntry],
    ) -> Result<Option<PathBuf>, TransformationError> {
        let mut sections = Vec::new();
        for entry in transcript {
            let mut lines = Vec::new();
            match &entry.record {
                TranscriptRecord::Utility(result) => {
                    collect_messages(&mut lines, result.details(), result.exception(), result.warnings());
                }
                TranscriptRecord::Operation(result) => {
                    collect_messages(&mut lines, result.details(), result.exception(), result.warnings());
                }
                TranscriptRecord::Skipped { .. } | TranscriptRecord::SkippedDueToAbort => continue,
            }
            if !lines.is_empty() {
                sections.push((entry.node_path.clone(), lines));
            }
        }

        if sections.is_empty() {
            return Ok(None);
        }

        let mut body = String::new();
        let _ = writeln!(body, "# Manual instructions: {}", template_name);
        let _ = writeln!(body);
        let _ = writeln!(
            body,
            "The following steps could not be fully automated and need review."
        );
        for (node_path, lines) in sections {
            let _ = writeln!(body);
            let _ = writeln!(body, "## {}", node_path);
            for line in lines {
                let _ = writeln!(body, "- {}", line);
            }
        }

        let path = working_folder.join(INSTRUCTIONS_FILE);
        fs::write(&path, body).map_err(|err| {
            TransformationError::with_source(
                ErrorCategory::Engine,
                format!("failed to write {}", path.display()),
                err,
            )
            .with_code("BF-MI-001")
        })?;
        info!(file = %path.display(), "manual instructions written");
        Ok(Some(path))
    }
}

fn collect_messages(
    lines: &mut Vec<String>,
    details: Option<&str>,
    exception: Option<&TransformationError>,
    warnings: &[TransformationError],
) {
    if let Some(exception) = exception {
        let mut message = exception.message.clone();
        for cause in exception.causes() {
            let _ = write!(message, " (caused by: {})", cause);
        }
        if let Some(details) = details {
            let _ = write!(message, " ({})", details);
        }
        lines.push(message);
        for warning in warnings {
            lines.push(warning.message.clone());
        }
        return;
    }
    for warning in warnings {
        lines.push(warning.message.clone());
    }
}
