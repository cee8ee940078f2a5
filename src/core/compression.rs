use butterfly_extensions::{ErrorCategory, TransformationError};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Zips a transformed application folder into a sibling archive named
/// `<folder>.zip`.
#[derive(Debug, Default)]
pub struct CompressionHandler;

impl CompressionHandler {
    pub fn new() -> Self {
        CompressionHandler
    }

    pub fn compress(&self, folder: &Path) -> Result<PathBuf, TransformationError> {
        let archive_path = PathBuf::from(format!("{}.zip", folder.display()));
        let archive = File::create(&archive_path).map_err(|err| {
            TransformationError::with_source(
                ErrorCategory::Engine,
                format!("failed to create archive {}", archive_path.display()),
                err,
            )
            .with_code("BF-ZIP-001")
        })?;

        let mut writer = ZipWriter::new(archive);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for entry in WalkDir::new(folder).sort_by_file_name() {
            let entry = entry.map_err(|err| {
                TransformationError::with_source(
                    ErrorCategory::Engine,
                    format!("failed to walk {}", folder.display()),
                    err,
                )
                .with_code("BF-ZIP-002")
            })?;
            let relative = match entry.path().strip_prefix(folder) {
                Ok(relative) if !relative.as_os_str().is_empty() => relative,
                _ => continue,
            };
            let name = relative.to_string_lossy().replace('\\', "/");
            let io_result = if entry.file_type().is_dir() {
                writer.add_directory(name.as_str(), options).map(|_| ())
            } else {
                writer
                    .start_file(name.as_str(), options)
                    .and_then(|_| {
                        let mut file = File::open(entry.path())?;
                        io::copy(&mut file, &mut writer)?;
                        Ok(())
                    })
                    .map(|_| ())
            };
            io_result.map_err(|err| {
                TransformationError::with_source(
                    ErrorCategory::Engine,
                    format!("failed to archive {}", entry.path().display()),
                    err,
                )
                .with_code("BF-ZIP-003")
            })?;
        }

        writer.finish().map_err(|err| {
            TransformationError::with_source(
                ErrorCategory::Engine,
                format!("failed to finish archive {}", archive_path.display()),
                err,
            )
            .with_code("BF-ZIP-004")
        })?;

        info!(archive = %archive_path.display(), "transformed application compressed");
        Ok(archive_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn archive_lands_next_to_folder() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("app-transformed");
        fs::create_dir_all(app.join("src")).unwrap();
        fs::write(app.join("src/main.txt"), "hello\n").unwrap();
        fs::write(app.join("top.txt"), "top\n").unwrap();

        let archive = CompressionHandler::new().compress(&app).unwrap();
        assert_eq!(archive, dir.path().join("app-transformed.zip"));

        let file = File::open(&archive).unwrap();
        let mut zip = zip::ZipArchive::new(file).unwrap();
        let names: Vec<String> = (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.iter().any(|name| name == "src/main.txt"));
        assert!(names.iter().any(|name| name == "top.txt"));
    }
}
