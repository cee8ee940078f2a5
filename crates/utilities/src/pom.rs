use butterfly_extensions::{
    ContextSnapshot, ErrorCategory, TransformationError, Utility, UtilityResult,
};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::debug;
use url::Url;

const DEFAULT_REPO_URI: &str = "https://repo1.maven.org/maven2";

/// Load a Maven artifact, model it, and place it in the transformation
/// context. The artifact is specified either by its coordinates (group id,
/// artifact id, version; fetched from the repository) or as a local file
/// via the node's path specification. When both are set, the coordinates
/// win and the file is ignored.
#[derive(Debug, Clone)]
pub struct PomModel {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
    repo_uri: String,
}

impl Default for PomModel {
    fn default() -> Self {
        Self::new()
    }
}

impl PomModel {
    pub fn new() -> Self {
        PomModel {
            group_id: None,
            artifact_id: None,
            version: None,
            repo_uri: DEFAULT_REPO_URI.to_string(),
        }
    }

    pub fn with_coordinates<G, A, V>(mut self, group_id: G, artifact_id: A, version: V) -> Self
    where
        G: Into<String>,
        A: Into<String>,
        V: Into<String>,
    {
        self.group_id = Some(group_id.into());
        self.artifact_id = Some(artifact_id.into());
        self.version = Some(version.into());
        self
    }

    /// Set the coordinates from a single `groupId:artifactId:version` string.
    pub fn set_artifact(self, artifact_info: &str) -> Result<Self, TransformationError> {
        let parts: Vec<&str> = artifact_info.split(':').collect();
        if parts.len() != 3 || parts.iter().any(|part| part.trim().is_empty()) {
            return Err(TransformationError::new(
                ErrorCategory::Definition,
                "Artifact info should be specified as [groupId]:[artifactId]:[version]",
            )
            .with_code("BF-DEF-020"));
        }
        Ok(self.with_coordinates(parts[0], parts[1], parts[2]))
    }

    /// Override the Maven repository URI; must be http or https.
    pub fn with_repo_uri(mut self, repo_uri: &str) -> Result<Self, TransformationError> {
        let trimmed = repo_uri.trim_end_matches('/');
        let parsed = Url::parse(trimmed).map_err(|err| {
            TransformationError::with_source(
                ErrorCategory::Definition,
                "repoURI is not a valid URI",
                err,
            )
            .with_code("BF-DEF-021")
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(TransformationError::new(
                ErrorCategory::Definition,
                "repoURI is not a valid URI",
            )
            .with_code("BF-DEF-021"));
        }
        self.repo_uri = trimmed.to_string();
        Ok(self)
    }

    pub fn group_id(&self) -> Option<&str> {
        self.group_id.as_deref()
    }

    pub fn artifact_id(&self) -> Option<&str> {
        self.artifact_id.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn coordinates(&self) -> Option<(&str, &str, &str)> {
        match (&self.group_id, &self.artifact_id, &self.version) {
            (Some(group), Some(artifact), Some(version)) => {
                Some((group.as_str(), artifact.as_str(), version.as_str()))
            }
            _ => None,
        }
    }

    /// Repository URL of the artifact, when coordinates are set.
    pub fn artifact_url(&self) -> Option<String> {
        self.coordinates().map(|(group, artifact, version)| {
            format!(
                "{}/{}/{}/{}/{}-{}.pom",
                self.repo_uri,
                group.replace('.', "/"),
                artifact,
                version,
                artifact,
                version
            )
        })
    }

    fn fetch(&self, url: &str) -> Result<String, TransformationError> {
        debug!(url, "downloading pom");
        let mut response = ureq::get(url).call().map_err(|err| {
            TransformationError::with_source(
                ErrorCategory::Utility,
                "The specified file could not be found or read and parsed as valid Maven pom file",
                err,
            )
        })?;
        response.body_mut().read_to_string().map_err(|err| {
            TransformationError::with_source(
                ErrorCategory::Utility,
                "The specified file could not be found or read and parsed as valid Maven pom file",
                err,
            )
        })
    }
}

impl Utility for PomModel {
    fn describe(&self) -> String {
        "Retrieve a Maven pom and load it into a model object".to_string()
    }

    fn execute(&self, target: &Path, _context: &ContextSnapshot) -> UtilityResult {
        let text = if let Some(url) = self.artifact_url() {
            match self.fetch(&url) {
                Ok(text) => text,
                Err(err) => return UtilityResult::error(err),
            }
        } else if target.is_file() {
            match fs::read_to_string(target) {
                Ok(text) => text,
                Err(err) => {
                    return UtilityResult::error(TransformationError::with_source(
                        ErrorCategory::Utility,
                        "The specified file could not be found or read and parsed as valid Maven pom file",
                        err,
                    ))
                }
            }
        } else {
            return UtilityResult::error(TransformationError::new(
                ErrorCategory::Utility,
                "Maven coordinates are missing and local file was not set",
            ));
        };

        match parse_pom(&text) {
            Ok(model) => UtilityResult::value(model),
            Err(err) => UtilityResult::error(err),
        }
    }
}

/// Parse a pom file into a JSON model with coordinates, parent, properties
/// and dependency list.
pub fn parse_pom(xml: &str) -> Result<Value, TransformationError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut model = Map::new();
    let mut parent = Map::new();
    let mut properties = Map::new();
    let mut dependencies: Vec<Value> = Vec::new();
    let mut dependency = Map::new();
    let mut seen_project = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref element)) => {
                let name = String::from_utf8_lossy(element.local_name().as_ref()).into_owned();
                if path.is_empty() && name == "project" {
                    seen_project = true;
                }
                path.push(name);
            }
            Ok(Event::End(_)) => {
                if path == ["project", "dependencies", "dependency"] {
                    dependencies.push(Value::Object(std::mem::take(&mut dependency)));
                }
                path.pop();
            }
            Ok(Event::Text(text)) => {
                let value = text
                    .decode()
                    .ok()
                    .and_then(|decoded| {
                        quick_xml::escape::unescape(&decoded)
                            .map(|unescaped| unescaped.into_owned())
                            .ok()
                    })
                    .unwrap_or_default();
                let parts: Vec<&str> = path.iter().map(String::as_str).collect();
                match parts.as_slice() {
                    ["project", field @ ("groupId" | "artifactId" | "version" | "packaging" | "name")] => {
                        model.insert((*field).to_string(), Value::String(value));
                    }
                    ["project", "parent", field @ ("groupId" | "artifactId" | "version")] => {
                        parent.insert((*field).to_string(), Value::String(value));
                    }
                    ["project", "properties", property] => {
                        properties.insert(property.to_string(), Value::String(value));
                    }
                    ["project", "dependencies", "dependency", field @ ("groupId" | "artifactId" | "version" | "scope")] =>
                    {
                        dependency.insert((*field).to_string(), Value::String(value));
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(TransformationError::with_source(
                    ErrorCategory::Utility,
                    "The specified file could not be found or read and parsed as valid Maven pom file",
                    err,
                ))
            }
            _ => {}
        }
    }

    if !seen_project {
        return Err(TransformationError::new(
            ErrorCategory::Utility,
            "The specified file could not be found or read and parsed as valid Maven pom file",
        ));
    }

    if !parent.is_empty() {
        model.insert("parent".to_string(), Value::Object(parent));
    }
    model.insert("properties".to_string(), Value::Object(properties));
    model.insert("dependencies".to_string(), Value::Array(dependencies));
    Ok(Value::Object(model))
}

#[cfg(test)]
mod tests {
    use super::*;
    use butterfly_extensions::UtilityResultType;
    use serde_json::json;

    const SAMPLE_POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
    <parent>
        <groupId>com.example</groupId>
        <artifactId>parent-pom</artifactId>
        <version>2.0.0</version>
    </parent>
    <groupId>com.example.app</groupId>
    <artifactId>sample-app</artifactId>
    <version>1.0.0</version>
    <packaging>jar</packaging>
    <properties>
        <java.version>1.8</java.version>
    </properties>
    <dependencies>
        <dependency>
            <groupId>junit</groupId>
            <artifactId>junit</artifactId>
            <version>4.12</version>
            <scope>test</scope>
        </dependency>
    </dependencies>
</project>
"#;

    #[test]
    fn parses_local_pom_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pom.xml");
        fs::write(&path, SAMPLE_POM).unwrap();

        let result = PomModel::new().execute(&path, &ContextSnapshot::empty());
        assert_eq!(result.result_type(), UtilityResultType::Value);
        let model = result.produced().unwrap();
        assert_eq!(model["groupId"], json!("com.example.app"));
        assert_eq!(model["artifactId"], json!("sample-app"));
        assert_eq!(model["parent"]["version"], json!("2.0.0"));
        assert_eq!(model["properties"]["java.version"], json!("1.8"));
        assert_eq!(model["dependencies"][0]["scope"], json!("test"));
    }

    #[test]
    fn coordinates_win_over_file() {
        let model = PomModel::new().with_coordinates("com.example", "lib", "1.2.3");
        assert_eq!(
            model.artifact_url().unwrap(),
            "https://repo1.maven.org/maven2/com/example/lib/1.2.3/lib-1.2.3.pom"
        );
    }

    #[test]
    fn missing_coordinates_and_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = PomModel::new().execute(dir.path(), &ContextSnapshot::empty());
        assert_eq!(result.result_type(), UtilityResultType::Error);
        assert_eq!(
            result.exception().unwrap().message,
            "Maven coordinates are missing and local file was not set"
        );
    }

    #[test]
    fn artifact_info_must_have_three_parts() {
        let err = PomModel::new().set_artifact("only:two").unwrap_err();
        assert_eq!(err.category, ErrorCategory::Definition);

        let model = PomModel::new().set_artifact("com.example:lib:1.0").unwrap();
        assert_eq!(model.group_id(), Some("com.example"));
        assert_eq!(model.version(), Some("1.0"));
    }

    #[test]
    fn repo_uri_must_be_http() {
        let err = PomModel::new().with_repo_uri("ftp://repo").unwrap_err();
        assert_eq!(err.category, ErrorCategory::Definition);

        let model = PomModel::new().with_repo_uri("https://mirror.example/maven2/").unwrap();
        let model = model.with_coordinates("g", "a", "1");
        assert!(model
            .artifact_url()
            .unwrap()
            .starts_with("https://mirror.example/maven2/g/a/1/"));
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse_pom("not xml at all").is_err());
    }
}
