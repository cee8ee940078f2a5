use butterfly::core::compression::CompressionHandler;
use butterfly::core::engine::{TransformationEngine, TransformationOptions};
use butterfly::core::instructions::ManualInstructionsWriter;
use butterfly::core::registry::ExtensionRegistry;
use butterfly::core::report::TransformationOutcome;
use butterfly::core::validation::TemplateValidator;
use butterfly_extensions::{Node, Template, TranscriptRecord};
use butterfly_utilities::{AddProperty, FindFiles};
use indexmap::IndexMap;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

fn engine() -> TransformationEngine {
    TransformationEngine::new(
        ExtensionRegistry::new(),
        TemplateValidator::new(),
        ManualInstructionsWriter::new(),
        CompressionHandler::new(),
    )
}

fn app_with_properties(dir: &Path) -> PathBuf {
    let app = dir.join("app");
    fs::create_dir_all(app.join("module-a")).unwrap();
    fs::create_dir_all(app.join("module-b")).unwrap();
    fs::write(app.join("module-a/application.properties"), "a=1\n").unwrap();
    fs::write(app.join("module-b/application.properties"), "b=2\n").unwrap();
    fs::write(app.join("top.properties"), "t=0\n").unwrap();
    app
}

#[test]
fn template_operation_is_applied_to_every_found_file() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with_properties(dir.path());

    let mut template = Template::new("stamp-all");
    template
        .add(
            Node::utility(
                "find-properties",
                FindFiles::new(r"\.properties$", true).unwrap(),
            )
            .save_result_as("properties_files"),
        )
        .unwrap()
        .add(Node::multiple(
            "stamp",
            AddProperty::new("stamped", "yes"),
            ["properties_files"],
        ))
        .unwrap();

    let options = TransformationOptions {
        output_folder: Some(dir.path().join("out")),
        ..TransformationOptions::default()
    };
    let report = engine().transform(&app, &template, &options).unwrap();
    assert_eq!(report.outcome, TransformationOutcome::Complete);

    for file in [
        "module-a/application.properties",
        "module-b/application.properties",
        "top.properties",
    ] {
        let content = fs::read_to_string(report.transformed_folder.join(file)).unwrap();
        assert!(content.contains("stamped=yes"), "{} not stamped", file);
    }

    // Composite entry first, then one synthesised operation per file.
    assert_eq!(report.transcript.len(), 2 + 3);
    assert_eq!(report.transcript[0].node_path, "find-properties");
    assert_eq!(report.transcript[1].node_path, "stamp");
    let synthesised: Vec<&str> = report.transcript[2..]
        .iter()
        .map(|entry| entry.node_path.as_str())
        .collect();
    assert_eq!(
        synthesised,
        vec![
            "stamp-1-AddProperty-TEMPLATE_OPERATION",
            "stamp-2-AddProperty-TEMPLATE_OPERATION",
            "stamp-3-AddProperty-TEMPLATE_OPERATION",
        ]
    );
}

#[test]
fn file_lists_union_in_first_seen_order() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with_properties(dir.path());

    // Lists [a, b] and [b, c]: exactly three operations over a, b, c.
    let a = app.join("module-a/application.properties");
    let b = app.join("module-b/application.properties");
    let c = app.join("top.properties");
    let mut seeds = IndexMap::new();
    seeds.insert(
        "left".to_string(),
        json!([a.to_str().unwrap(), b.to_str().unwrap()]),
    );
    seeds.insert(
        "right".to_string(),
        json!([b.to_str().unwrap(), c.to_str().unwrap()]),
    );

    let mut template = Template::new("dedup");
    template
        .add(Node::multiple(
            "stamp",
            AddProperty::new("stamped", "yes"),
            ["left", "right"],
        ))
        .unwrap();

    let options = TransformationOptions {
        output_folder: Some(dir.path().join("out")),
        modify_original_folder: true,
        seed_attributes: seeds,
        ..TransformationOptions::default()
    };
    let report = engine().transform(&app, &template, &options).unwrap();
    assert_eq!(report.outcome, TransformationOutcome::Complete);

    let TranscriptRecord::Utility(composite) = &report.transcript[0].record else {
        panic!("expected composite record first");
    };
    let names = composite.produced().unwrap().as_array().unwrap();
    assert_eq!(names.len(), 3);
    assert_eq!(report.transcript.len(), 4);

    for file in [&a, &b, &c] {
        let content = fs::read_to_string(file).unwrap();
        assert_eq!(content.matches("stamped=yes").count(), 1);
    }
}

#[test]
fn absent_attribute_contributes_no_files() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with_properties(dir.path());

    let a = app.join("top.properties");
    let mut seeds = IndexMap::new();
    seeds.insert("left".to_string(), json!([a.to_str().unwrap()]));

    let mut template = Template::new("partial");
    template
        .add(Node::multiple(
            "stamp",
            AddProperty::new("stamped", "yes"),
            ["left", "missing"],
        ))
        .unwrap();

    let options = TransformationOptions {
        output_folder: Some(dir.path().join("out")),
        modify_original_folder: true,
        seed_attributes: seeds,
        ..TransformationOptions::default()
    };
    // "missing" is not producible, so validation rejects the template; seed
    // it as an empty list to model an attribute that resolved to nothing.
    let err = engine().transform(&app, &template, &options).unwrap_err();
    assert!(err.message.contains("missing"));

    let mut seeds = IndexMap::new();
    seeds.insert("left".to_string(), json!([a.to_str().unwrap()]));
    seeds.insert("missing".to_string(), json!([]));
    let options = TransformationOptions {
        output_folder: Some(dir.path().join("out")),
        modify_original_folder: true,
        seed_attributes: seeds,
        ..TransformationOptions::default()
    };
    let report = engine().transform(&app, &template, &options).unwrap();
    assert_eq!(report.outcome, TransformationOutcome::Complete);
    assert_eq!(report.transcript.len(), 2);
}

#[test]
fn synthesised_operations_run_before_later_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with_properties(dir.path());

    let a = app.join("top.properties");
    let mut seeds = IndexMap::new();
    seeds.insert("files".to_string(), json!([a.to_str().unwrap()]));

    let mut template = Template::new("ordering");
    template
        .add(Node::multiple(
            "stamp",
            AddProperty::new("stamped", "yes"),
            ["files"],
        ))
        .unwrap()
        .add(Node::operation("later", AddProperty::new("later", "yes")).relative("top.properties"))
        .unwrap();

    let options = TransformationOptions {
        output_folder: Some(dir.path().join("out")),
        modify_original_folder: true,
        seed_attributes: seeds,
        ..TransformationOptions::default()
    };
    let report = engine().transform(&app, &template, &options).unwrap();

    let paths: Vec<&str> = report
        .transcript
        .iter()
        .map(|entry| entry.node_path.as_str())
        .collect();
    assert_eq!(
        paths,
        vec!["stamp", "stamp-1-AddProperty-TEMPLATE_OPERATION", "later"]
    );
}

#[test]
fn non_list_attribute_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with_properties(dir.path());

    let mut seeds = IndexMap::new();
    seeds.insert("files".to_string(), json!("not-a-list"));

    let mut template = Template::new("bad-attribute");
    template
        .add(Node::multiple(
            "stamp",
            AddProperty::new("stamped", "yes"),
            ["files"],
        ))
        .unwrap();

    let options = TransformationOptions {
        output_folder: Some(dir.path().join("out")),
        modify_original_folder: true,
        seed_attributes: seeds,
        ..TransformationOptions::default()
    };
    let report = engine().transform(&app, &template, &options).unwrap();
    assert_eq!(report.outcome, TransformationOutcome::Incomplete);
    let TranscriptRecord::Utility(result) = &report.transcript[0].record else {
        panic!("expected utility record");
    };
    assert!(result
        .exception()
        .unwrap()
        .message
        .contains("does not hold a file list"));
}
