use crate::context::ContextSnapshot;
use crate::error::{ErrorCategory, TransformationError};
use regex::Regex;
use rhai::{Array, Dynamic, Engine, Map, Scope, AST};
use serde_json::Value;
use std::sync::OnceLock;

/// Predicate guarding a node. Absent conditions always run.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Bool(bool),
    Expr { expr: String },
}

impl Condition {
    pub fn expr<S: Into<String>>(expr: S) -> Self {
        Condition::Expr { expr: expr.into() }
    }

    pub fn expression(&self) -> Option<&str> {
        match self {
            Condition::Expr { expr } => Some(expr.as_str()),
            Condition::Bool(_) => None,
        }
    }

    /// Context attributes the expression reads, for static validation.
    ///
    /// Attributes are referenced as `context.name` or `context["name"]`;
    /// both spellings are collected.
    pub fn referenced_attributes(&self) -> Vec<String> {
        let expr = match self {
            Condition::Expr { expr } => expr,
            Condition::Bool(_) => return Vec::new(),
        };
        let dotted = attr_dotted_pattern();
        let indexed = attr_indexed_pattern();
        let mut out = Vec::new();
        for capture in dotted.captures_iter(expr) {
            out.push(capture[1].to_string());
        }
        for capture in indexed.captures_iter(expr) {
            out.push(capture[1].to_string());
        }
        out.sort();
        out.dedup();
        out
    }
}

fn attr_dotted_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"context\.([A-Za-z_][A-Za-z0-9_]*)").unwrap())
}

fn attr_indexed_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"context\[\s*"([^"]+)"\s*\]"#).unwrap())
}

/// Condition evaluation engine using a locked-down Rhai configuration.
///
/// Expressions see a single `context` map variable holding the snapshot
/// attributes and must evaluate to a boolean.
pub struct ConditionEngine {
    engine: Engine,
}

impl Default for ConditionEngine {
    fn default() -> Self {
        let mut engine = Engine::new_raw();
        engine.set_max_operations(50_000);
        engine.set_max_call_levels(16);
        engine.set_max_expr_depths(32, 32);
        engine.on_print(|_| {});
        engine.on_debug(|_, _, _| {});
        ConditionEngine { engine }
    }
}

impl ConditionEngine {
    /// Compile the expression, surfacing parse failures as definition errors.
    pub fn compile(&self, expr: &str) -> Result<AST, TransformationError> {
        self.engine.compile(expr).map_err(|err| {
            TransformationError::new(
                ErrorCategory::Definition,
                format!("condition compile error: {}", err),
            )
            .with_code("BF-COND-001")
        })
    }

    /// Evaluate the condition against the given context snapshot.
    pub fn evaluate(
        &self,
        condition: &Condition,
        snapshot: &ContextSnapshot,
    ) -> Result<bool, TransformationError> {
        let expr = match condition {
            Condition::Bool(value) => return Ok(*value),
            Condition::Expr { expr } => expr,
        };
        let mut scope = Scope::new();
        scope.push_dynamic("context", to_dynamic(snapshot.as_value()));
        let result = self
            .engine
            .eval_with_scope::<Dynamic>(&mut scope, expr)
            .map_err(|err| {
                TransformationError::new(
                    ErrorCategory::Engine,
                    format!("condition execution error: {}", err),
                )
                .with_code("BF-COND-002")
            })?;
        result.as_bool().map_err(|actual| {
            TransformationError::new(
                ErrorCategory::Engine,
                format!("condition did not evaluate to a boolean (got {})", actual),
            )
            .with_code("BF-COND-003")
        })
    }
}

fn to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Dynamic::from(i)
            } else if let Some(f) = n.as_f64() {
                Dynamic::from(f)
            } else {
                Dynamic::from(0_i64)
            }
        }
        Value::String(s) => Dynamic::from(s.clone()),
        Value::Array(items) => {
            let mut arr = Array::new();
            for item in items {
                arr.push(to_dynamic(item));
            }
            Dynamic::from_array(arr)
        }
        Value::Object(map) => {
            let mut rhai_map = Map::new();
            for (key, value) in map {
                rhai_map.insert(key.into(), to_dynamic(value));
            }
            Dynamic::from_map(rhai_map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TransformationContext;
    use serde_json::json;

    fn snapshot_with(pairs: &[(&str, Value)]) -> ContextSnapshot {
        let mut context = TransformationContext::new("/tmp/app");
        for (name, value) in pairs {
            context.put(*name, value.clone(), "test").unwrap();
        }
        context.snapshot()
    }

    #[test]
    fn boolean_condition_short_circuits() {
        let engine = ConditionEngine::default();
        let snapshot = ContextSnapshot::empty();
        assert!(engine.evaluate(&Condition::Bool(true), &snapshot).unwrap());
        assert!(!engine.evaluate(&Condition::Bool(false), &snapshot).unwrap());
    }

    #[test]
    fn expression_reads_context_attributes() {
        let engine = ConditionEngine::default();
        let snapshot = snapshot_with(&[("color", json!("blue"))]);
        let condition = Condition::expr(r#"context.color == "blue""#);
        assert!(engine.evaluate(&condition, &snapshot).unwrap());

        let condition = Condition::expr(r#"context.color == "red""#);
        assert!(!engine.evaluate(&condition, &snapshot).unwrap());
    }

    #[test]
    fn non_boolean_result_is_an_error() {
        let engine = ConditionEngine::default();
        let snapshot = snapshot_with(&[("count", json!(3))]);
        let condition = Condition::expr("context.count");
        let err = engine.evaluate(&condition, &snapshot).unwrap_err();
        assert_eq!(err.category, ErrorCategory::Engine);
    }

    #[test]
    fn compile_failure_is_a_definition_error() {
        let engine = ConditionEngine::default();
        let err = engine.compile("context.color ==").unwrap_err();
        assert_eq!(err.category, ErrorCategory::Definition);
    }

    #[test]
    fn referenced_attributes_are_extracted() {
        let condition = Condition::expr(r#"context.color == "blue" && context["object"] != ()"#);
        assert_eq!(
            condition.referenced_attributes(),
            vec!["color".to_string(), "object".to_string()]
        );
        assert!(Condition::Bool(true).referenced_attributes().is_empty());
    }
}
