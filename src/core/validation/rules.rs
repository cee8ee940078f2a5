use super::{node_conditions, visit, Phase, TemplateCheck, TemplateView, Violation};
use butterfly_extensions::NodeBody;
use indexmap::IndexSet;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

pub fn built_in_checks() -> Vec<Box<dyn TemplateCheck>> {
    vec![
        Box::new(DuplicateNamesCheck),
        Box::new(DependencyResolutionCheck),
        Box::new(DependencyCycleCheck),
        Box::new(ConditionCheck),
        Box::new(AttributeReferenceCheck),
        Box::new(MultiFileCheck),
        Box::new(DuplicateSaveAttributeCheck),
    ]
}

/// Node names must be unique within each parent.
struct DuplicateNamesCheck;

impl TemplateCheck for DuplicateNamesCheck {
    fn check(&self, view: &TemplateView) -> Vec<Violation> {
        let mut out = Vec::new();
        let mut seen_per_parent: HashMap<String, HashSet<String>> = HashMap::new();
        visit(view.template.nodes(), "", &mut |path, node, phase| {
            if phase != Phase::Enter {
                return;
            }
            let parent = path
                .rsplit_once('/')
                .map(|(head, _)| head.to_string())
                .unwrap_or_default();
            let seen = seen_per_parent.entry(parent).or_default();
            if !seen.insert(node.name().to_string()) {
                out.push(Violation::new(
                    "BF-VAL-001",
                    format!("duplicate node name '{}' within the same parent", node.name()),
                    Some(path.to_string()),
                ));
            }
        });
        out
    }
}

/// Dependencies must reference a node that completes earlier, and no name
/// may be listed twice in one dependency set.
struct DependencyResolutionCheck;

impl TemplateCheck for DependencyResolutionCheck {
    fn check(&self, view: &TemplateView) -> Vec<Violation> {
        let mut out = Vec::new();
        let mut completed: IndexSet<String> = IndexSet::new();
        visit(view.template.nodes(), "", &mut |path, node, phase| {
            match phase {
                Phase::Enter => {
                    let mut listed = HashSet::new();
                    for dependency in node.dependencies() {
                        if !listed.insert(dependency.as_str()) {
                            out.push(Violation::new(
                                "BF-VAL-003",
                                format!("dependency '{}' listed more than once", dependency),
                                Some(path.to_string()),
                            ));
                            continue;
                        }
                        if !completed.contains(dependency.as_str()) {
                            out.push(Violation::new(
                                "BF-VAL-002",
                                format!(
                                    "dependency '{}' does not resolve to an earlier node",
                                    dependency
                                ),
                                Some(path.to_string()),
                            ));
                        }
                    }
                }
                Phase::Leave => {
                    completed.insert(node.name().to_string());
                }
            }
        });
        out
    }
}

/// Cycle detection over the dependency digraph. Earlier-only references make
/// cycles impossible in a well-formed template, so anything Tarjan finds is
/// a definition error.
struct DependencyCycleCheck;

impl TemplateCheck for DependencyCycleCheck {
    fn check(&self, view: &TemplateView) -> Vec<Violation> {
        let mut graph: DiGraph<String, ()> = DiGraph::new();
        let mut indices: HashMap<String, NodeIndex> = HashMap::new();
        visit(view.template.nodes(), "", &mut |_, node, phase| {
            if phase == Phase::Enter {
                indices
                    .entry(node.name().to_string())
                    .or_insert_with(|| graph.add_node(node.name().to_string()));
            }
        });
        let mut edges: Vec<(NodeIndex, NodeIndex)> = Vec::new();
        visit(view.template.nodes(), "", &mut |_, node, phase| {
            if phase != Phase::Enter {
                return;
            }
            let Some(&from) = indices.get(node.name()) else {
                return;
            };
            for dependency in node.dependencies() {
                if let Some(&to) = indices.get(dependency.as_str()) {
                    edges.push((from, to));
                }
            }
        });
        for (from, to) in edges {
            graph.add_edge(from, to, ());
        }

        let mut out = Vec::new();
        for component in tarjan_scc(&graph) {
            if component.len() > 1 {
                let mut names: Vec<&str> =
                    component.iter().map(|index| graph[*index].as_str()).collect();
                names.sort();
                out.push(Violation::new(
                    "BF-VAL-004",
                    format!("dependency cycle between nodes: {}", names.join(", ")),
                    None,
                ));
            }
        }
        out
    }
}

/// Condition expressions must compile under the condition engine.
struct ConditionCheck;

impl TemplateCheck for ConditionCheck {
    fn check(&self, view: &TemplateView) -> Vec<Violation> {
        let mut out = Vec::new();
        visit(view.template.nodes(), "", &mut |path, node, phase| {
            if phase != Phase::Enter {
                return;
            }
            for condition in node_conditions(node) {
                if let Some(expr) = condition.expression() {
                    if let Err(err) = view.conditions.compile(expr) {
                        out.push(Violation::new(
                            "BF-VAL-005",
                            err.message,
                            Some(path.to_string()),
                        ));
                    }
                }
            }
        });
        out
    }
}

/// Every attribute a condition or path specification reads must be
/// producible by an earlier `save_result_as` or a pre-seeded value.
struct AttributeReferenceCheck;

impl TemplateCheck for AttributeReferenceCheck {
    fn check(&self, view: &TemplateView) -> Vec<Violation> {
        let mut out = Vec::new();
        let mut available: IndexSet<String> = view.seeds.clone();
        visit(view.template.nodes(), "", &mut |path, node, phase| {
            match phase {
                Phase::Enter => {
                    for condition in node_conditions(node) {
                        for attribute in condition.referenced_attributes() {
                            if !available.contains(&attribute) {
                                out.push(Violation::new(
                                    "BF-VAL-006",
                                    format!(
                                        "condition references attribute '{}' which no earlier node produces",
                                        attribute
                                    ),
                                    Some(path.to_string()),
                                ));
                            }
                        }
                    }
                    if let Some(attribute) = node.path().attribute() {
                        if !available.contains(attribute) {
                            out.push(Violation::new(
                                "BF-VAL-007",
                                format!(
                                    "path specification reads attribute '{}' which no earlier node produces",
                                    attribute
                                ),
                                Some(path.to_string()),
                            ));
                        }
                    }
                }
                Phase::Leave => {
                    if let Some(attribute) = node.save_result_attribute() {
                        available.insert(attribute.to_string());
                    }
                }
            }
        });
        out
    }
}

/// Multi-file composites must name at least one attribute, each producible.
struct MultiFileCheck;

impl TemplateCheck for MultiFileCheck {
    fn check(&self, view: &TemplateView) -> Vec<Violation> {
        let mut out = Vec::new();
        let mut available: IndexSet<String> = view.seeds.clone();
        visit(view.template.nodes(), "", &mut |path, node, phase| {
            match phase {
                Phase::Enter => {
                    let NodeBody::MultiFile { attributes, .. } = node.body() else {
                        return;
                    };
                    if attributes.is_empty() {
                        out.push(Violation::new(
                            "BF-VAL-008",
                            "multi-file composite names no file-list attributes",
                            Some(path.to_string()),
                        ));
                    }
                    for attribute in attributes {
                        if !available.contains(attribute.as_str()) {
                            out.push(Violation::new(
                                "BF-VAL-009",
                                format!(
                                    "multi-file attribute '{}' is not produced by any earlier node",
                                    attribute
                                ),
                                Some(path.to_string()),
                            ));
                        }
                    }
                }
                Phase::Leave => {
                    if let Some(attribute) = node.save_result_attribute() {
                        available.insert(attribute.to_string());
                    }
                }
            }
        });
        out
    }
}

/// Two different nodes saving under the same attribute is a definition
/// error; only a node re-running inside a composite may overwrite itself.
struct DuplicateSaveAttributeCheck;

impl TemplateCheck for DuplicateSaveAttributeCheck {
    fn check(&self, view: &TemplateView) -> Vec<Violation> {
        let mut out = Vec::new();
        let mut writers: HashMap<String, String> = HashMap::new();
        for seed in &view.seeds {
            writers.insert(seed.clone(), "<seed>".to_string());
        }
        visit(view.template.nodes(), "", &mut |path, node, phase| {
            if phase != Phase::Enter {
                return;
            }
            let Some(attribute) = node.save_result_attribute() else {
                return;
            };
            match writers.get(attribute) {
                Some(previous) => out.push(Violation::new(
                    "BF-VAL-010",
                    format!(
                        "attribute '{}' is saved by both '{}' and '{}'",
                        attribute, previous, path
                    ),
                    Some(path.to_string()),
                )),
                None => {
                    writers.insert(attribute.to_string(), path.to_string());
                }
            }
        });
        out
    }
}
