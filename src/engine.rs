//! Compilation seam between the template scanner and an expression language.
//!
//! The scanner and the preview facade only see [`ExpressionEngine`] and
//! [`CompiledExpression`]; [`SpelEngine`] is the built-in implementation.

use std::fmt;

use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;

use crate::error::SpelError;
use crate::expr::eval::evaluate;
pub use crate::expr::eval::EvalState;
use crate::expr::{parse_expression_with_depth, DEFAULT_MAX_DEPTH};
use crate::expr::parser::Expr;
use crate::template::{parse_expressions, Segment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
/// Classification of runtime evaluation failures.
pub enum EvalErrorKind {
    /// Navigation through a missing property or a null value.
    NullPointerException,
    /// Type mismatch, unknown function or method, bad arguments.
    SpelEvaluationException,
    /// List or string index outside its bounds.
    IndexOutOfBoundsException,
}

impl EvalErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvalErrorKind::NullPointerException => "NullPointerException",
            EvalErrorKind::SpelEvaluationException => "SpelEvaluationException",
            EvalErrorKind::IndexOutOfBoundsException => "IndexOutOfBoundsException",
        }
    }
}

impl fmt::Display for EvalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{kind}: {message}")]
/// Error raised while evaluating a compiled expression.
pub struct EvaluationError {
    pub kind: EvalErrorKind,
    pub message: String,
    /// Value on top of the active-context stack when evaluation failed.
    /// Filled in by [`evaluate_with_diagnostics`].
    pub active_context: Option<JsonValue>,
}

impl EvaluationError {
    pub fn new(kind: EvalErrorKind, message: String) -> Self {
        Self {
            kind,
            message,
            active_context: None,
        }
    }

    pub fn null_pointer(message: String) -> Self {
        Self::new(EvalErrorKind::NullPointerException, message)
    }

    pub fn evaluation(message: String) -> Self {
        Self::new(EvalErrorKind::SpelEvaluationException, message)
    }

    pub fn index_out_of_bounds(message: String) -> Self {
        Self::new(EvalErrorKind::IndexOutOfBoundsException, message)
    }

    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }
}

/// A unit that can be evaluated repeatedly against different contexts.
pub trait CompiledExpression: fmt::Debug + Send + Sync {
    /// Source text this unit was compiled from.
    fn source(&self) -> &str;

    /// Evaluates against `context`, recording navigation in `state`.
    fn evaluate(
        &self,
        context: &JsonValue,
        state: &mut EvalState,
    ) -> Result<JsonValue, EvaluationError>;
}

/// Compiles expression text into evaluable units.
pub trait ExpressionEngine {
    fn compile(&self, text: &str) -> Result<Box<dyn CompiledExpression>, SpelError>;

    /// Compiles under the caller's limits. Engines without structural
    /// limits of their own can rely on the default, which ignores them.
    fn compile_with_limits(
        &self,
        text: &str,
        _limits: &CompileLimits,
    ) -> Result<Box<dyn CompiledExpression>, SpelError> {
        self.compile(text)
    }
}

/// Literal template text; evaluates to itself regardless of context.
#[derive(Debug, Clone)]
pub struct LiteralExpression {
    text: String,
}

impl LiteralExpression {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl CompiledExpression for LiteralExpression {
    fn source(&self) -> &str {
        &self.text
    }

    fn evaluate(&self, _: &JsonValue, _: &mut EvalState) -> Result<JsonValue, EvaluationError> {
        Ok(JsonValue::String(self.text.clone()))
    }
}

/// Built-in SpEL-style engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpelEngine;

#[derive(Debug)]
struct SpelExpression {
    source: String,
    ast: Expr,
}

impl CompiledExpression for SpelExpression {
    fn source(&self) -> &str {
        &self.source
    }

    fn evaluate(
        &self,
        context: &JsonValue,
        state: &mut EvalState,
    ) -> Result<JsonValue, EvaluationError> {
        evaluate(&self.ast, context, state)
    }
}

impl ExpressionEngine for SpelEngine {
    fn compile(&self, text: &str) -> Result<Box<dyn CompiledExpression>, SpelError> {
        self.compile_with_limits(text, &CompileLimits::default())
    }

    fn compile_with_limits(
        &self,
        text: &str,
        limits: &CompileLimits,
    ) -> Result<Box<dyn CompiledExpression>, SpelError> {
        let ast = parse_expression_with_depth(text, limits.max_nesting_depth)?;
        Ok(Box::new(SpelExpression {
            source: text.to_string(),
            ast,
        }))
    }
}

/// Evaluates `compiled` with a fresh state. On failure the error carries
/// the active context at the point of failure; success is passed through.
pub fn evaluate_with_diagnostics(
    compiled: &dyn CompiledExpression,
    context: &JsonValue,
) -> Result<JsonValue, EvaluationError> {
    let mut state = EvalState::new();
    compiled.evaluate(context, &mut state).map_err(|mut err| {
        if err.active_context.is_none() {
            err.active_context = state.active_context().cloned();
        }
        err
    })
}

/// Size limits applied while compiling a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileLimits {
    pub max_segments: usize,
    pub max_expression_len: usize,
    /// Deepest expression tree the engine accepts.
    pub max_nesting_depth: usize,
}

impl Default for CompileLimits {
    fn default() -> Self {
        Self {
            max_segments: 128,
            max_expression_len: 4096,
            max_nesting_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// All compiled units of one template, in template order.
#[derive(Debug)]
pub struct CompiledTemplate {
    source: String,
    units: Vec<Box<dyn CompiledExpression>>,
}

impl CompiledTemplate {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn units(&self) -> &[Box<dyn CompiledExpression>] {
        &self.units
    }

    /// Evaluates every unit in order, stopping at the first failure.
    pub fn evaluate(&self, context: &JsonValue) -> Result<Vec<JsonValue>, EvaluationError> {
        let mut values = Vec::with_capacity(self.units.len());
        for unit in &self.units {
            values.push(evaluate_with_diagnostics(unit.as_ref(), context)?);
        }
        Ok(values)
    }
}

/// Scans `template` and compiles each segment: literal segments become
/// [`LiteralExpression`]s, expression segments go through `engine`.
pub fn compile_template(
    engine: &dyn ExpressionEngine,
    template: &str,
    limits: &CompileLimits,
) -> Result<CompiledTemplate, SpelError> {
    let segments = parse_expressions(template)?;
    if segments.len() > limits.max_segments {
        return Err(SpelError::LimitExceeded(format!(
            "too many segments in one template: {} (max {})",
            segments.len(),
            limits.max_segments
        )));
    }

    let mut units: Vec<Box<dyn CompiledExpression>> = Vec::with_capacity(segments.len());
    for segment in segments {
        match segment {
            Segment::Literal { text, .. } => units.push(Box::new(LiteralExpression::new(text))),
            Segment::Expression { text, start } => {
                if text.chars().count() > limits.max_expression_len {
                    return Err(SpelError::LimitExceeded(format!(
                        "expression at character {start} exceeds max length ({})",
                        limits.max_expression_len
                    )));
                }
                debug!(start, expression = %text, "compiling expression");
                units.push(engine.compile_with_limits(&text, limits)?);
            }
        }
    }

    Ok(CompiledTemplate {
        source: template.to_string(),
        units,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn literal_ignores_context() {
        let literal = LiteralExpression::new("abc");
        let mut state = EvalState::new();
        assert_eq!(
            literal.evaluate(&json!({"abc": 1}), &mut state).unwrap(),
            json!("abc")
        );
        assert_eq!(state.depth(), 0);
    }

    #[test]
    fn diagnostics_capture_active_context() {
        let compiled = SpelEngine.compile("trigger.missing").unwrap();
        let err =
            evaluate_with_diagnostics(compiled.as_ref(), &json!({"trigger": {"id": 7}})).unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::NullPointerException);
        assert_eq!(err.active_context, Some(json!({"id": 7})));
    }

    #[test]
    fn diagnostics_leave_success_untouched() {
        let compiled = SpelEngine.compile("a + 1").unwrap();
        assert_eq!(
            evaluate_with_diagnostics(compiled.as_ref(), &json!({"a": 1})).unwrap(),
            json!(2)
        );
    }

    #[test]
    fn nesting_limit_rejects_deep_trees() {
        let limits = CompileLimits {
            max_nesting_depth: 8,
            ..CompileLimits::default()
        };
        let shallow = format!("{}1{}", "(".repeat(2), ")".repeat(2));
        assert!(SpelEngine.compile_with_limits(&shallow, &limits).is_ok());

        let deep = format!("{}1{}", "(".repeat(8), ")".repeat(8));
        let err = SpelEngine.compile_with_limits(&deep, &limits).unwrap_err();
        assert!(matches!(err, SpelError::LimitExceeded(_)));

        let chain = vec!["1"; 20].join(" + ");
        assert!(matches!(
            SpelEngine.compile_with_limits(&chain, &limits),
            Err(SpelError::LimitExceeded(_))
        ));
        assert!(SpelEngine.compile(&chain).is_ok());
    }

    #[test]
    fn compile_template_enforces_segment_limit() {
        let limits = CompileLimits {
            max_segments: 2,
            ..CompileLimits::default()
        };
        let err = compile_template(&SpelEngine, "${a}-${b}", &limits).unwrap_err();
        assert!(matches!(err, SpelError::LimitExceeded(_)));
    }
}
