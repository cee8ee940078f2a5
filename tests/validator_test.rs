use butterfly::core::validation::TemplateValidator;
use butterfly_extensions::{Condition, ContextSnapshot, Node, Template, Utility, UtilityResult};
use butterfly_utilities::AddProperty;
use std::path::Path;

struct Probe;

impl Utility for Probe {
    fn describe(&self) -> String {
        "Probe".to_string()
    }

    fn execute(&self, _target: &Path, _context: &ContextSnapshot) -> UtilityResult {
        UtilityResult::null()
    }
}

fn no_seeds() -> Vec<String> {
    Vec::new()
}

#[test]
fn clean_template_passes() {
    let mut template = Template::new("clean");
    template
        .add(Node::utility("first", Probe).save_result_as("first_value"))
        .unwrap()
        .add(
            Node::utility("second", Probe)
                .depends_on("first")
                .only_if(Condition::expr("context.first_value == ()")),
        )
        .unwrap();

    assert!(TemplateValidator::new()
        .validate(&template, no_seeds())
        .is_ok());
}

#[test]
fn all_offences_reported_in_one_batch() {
    let mut template = Template::new("broken");
    template
        .add(
            Node::utility("first", Probe)
                .depends_on("ghost")
                .only_if(Condition::expr("context.phantom == 1")),
        )
        .unwrap()
        .add(Node::multiple(
            "multi",
            AddProperty::new("k", "v"),
            Vec::<String>::new(),
        ))
        .unwrap();

    let violations = TemplateValidator::new().run(&template, no_seeds());
    let codes: Vec<&str> = violations
        .iter()
        .map(|violation| violation.code.as_str())
        .collect();
    assert!(codes.contains(&"BF-VAL-002"), "unknown dependency: {:?}", codes);
    assert!(codes.contains(&"BF-VAL-006"), "unproducible condition attr: {:?}", codes);
    assert!(codes.contains(&"BF-VAL-008"), "empty multi-file attrs: {:?}", codes);
    assert!(violations.len() >= 3);
}

#[test]
fn forward_dependency_is_rejected() {
    let mut template = Template::new("forward");
    template
        .add(Node::utility("first", Probe).depends_on("second"))
        .unwrap()
        .add(Node::utility("second", Probe))
        .unwrap();

    let violations = TemplateValidator::new().run(&template, no_seeds());
    assert!(violations
        .iter()
        .any(|violation| violation.code == "BF-VAL-002"));
}

#[test]
fn repeated_dependency_entries_are_rejected() {
    let mut template = Template::new("repeated");
    template
        .add(Node::utility("first", Probe))
        .unwrap()
        .add(
            Node::utility("second", Probe)
                .depends_on("first")
                .depends_on("first"),
        )
        .unwrap();

    let violations = TemplateValidator::new().run(&template, no_seeds());
    assert!(violations
        .iter()
        .any(|violation| violation.code == "BF-VAL-003"));
}

#[test]
fn malformed_condition_is_rejected() {
    let mut template = Template::new("bad-condition");
    template
        .add(Node::utility("first", Probe).only_if(Condition::expr("context.color ==")))
        .unwrap();

    let violations = TemplateValidator::new().run(&template, no_seeds());
    assert!(violations
        .iter()
        .any(|violation| violation.code == "BF-VAL-005"));
}

#[test]
fn seeded_attributes_count_as_producible() {
    let mut template = Template::new("seeded");
    template
        .add(Node::utility("first", Probe).only_if(Condition::expr("context.color == \"blue\"")))
        .unwrap();

    let validator = TemplateValidator::new();
    assert!(validator.validate(&template, ["color"]).is_ok());
    assert!(validator.validate(&template, no_seeds()).is_err());
}

#[test]
fn path_attribute_must_be_producible() {
    let mut template = Template::new("path-ref");
    template
        .add(Node::utility("reader", Probe).path_from_attribute("pom_folder"))
        .unwrap();

    let violations = TemplateValidator::new().run(&template, no_seeds());
    assert!(violations
        .iter()
        .any(|violation| violation.code == "BF-VAL-007"));
}

#[test]
fn duplicate_save_attribute_is_rejected() {
    let mut template = Template::new("dup-save");
    template
        .add(Node::utility("first", Probe).save_result_as("shared"))
        .unwrap()
        .add(Node::utility("second", Probe).save_result_as("shared"))
        .unwrap();

    let violations = TemplateValidator::new().run(&template, no_seeds());
    assert!(violations
        .iter()
        .any(|violation| violation.code == "BF-VAL-010"));
}

#[test]
fn group_children_cannot_use_the_groups_own_result() {
    let mut template = Template::new("self-reference");
    template.add(Node::group("outer")).unwrap();
    template
        .add_to(
            Node::utility("inner", Probe).only_if(Condition::expr("context.outer_value == 1")),
            "outer",
        )
        .unwrap();
    // The group's own attribute becomes visible only after its children ran.
    let violations = TemplateValidator::new().run(&template, no_seeds());
    assert!(violations
        .iter()
        .any(|violation| violation.code == "BF-VAL-006"));
}

#[test]
fn validation_error_lists_every_offence() {
    let mut template = Template::new("noisy");
    template
        .add(Node::utility("first", Probe).depends_on("ghost"))
        .unwrap()
        .add(Node::utility("second", Probe).path_from_attribute("nowhere"))
        .unwrap();

    let err = TemplateValidator::new()
        .validate(&template, no_seeds())
        .unwrap_err();
    assert!(err.message.contains("ghost"));
    assert!(err.message.contains("nowhere"));
    assert!(err.message.contains("2 offence(s)"));
}
