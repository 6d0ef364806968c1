//! Template-aware expression previews.
//!
//! Scans strings such as `deploy ${trigger.tag} to ${env}` into literal and
//! expression segments, evaluates each expression against a JSON context,
//! and reports either the rendered preview or a display-ready error.

pub mod cache;
pub mod engine;
pub mod error;
pub mod expr;
pub mod options;
pub mod preview;
pub mod template;

pub use cache::TemplateCache;
pub use engine::{
    compile_template, evaluate_with_diagnostics, CompiledExpression, CompiledTemplate,
    EvalErrorKind, EvalState, EvaluationError, ExpressionEngine, LiteralExpression, SpelEngine,
};
pub use error::SpelError;
pub use options::PreviewOptions;
pub use preview::{evaluate_expression, evaluate_expression_with, ErrorShape, Preview};
pub use template::{contains_expression, parse_expressions, Segment};

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{evaluate_expression, parse_expressions, Segment};

    #[test]
    fn previews_minimal_template() {
        let preview = evaluate_expression(&json!({"name": "world"}), Some("hello ${name}!"));
        assert_eq!(preview.preview.as_deref(), Some("hello world!"));
        assert!(preview.error.is_none());
    }

    #[test]
    fn unterminated_marker_fails() {
        let preview = evaluate_expression(&json!({}), Some("${foo"));
        assert!(preview.preview.is_none());
        let message = preview.error.unwrap().message.unwrap();
        assert!(message.contains("No ending suffix"));
    }

    #[test]
    fn segments_keep_template_order() {
        let segments = parse_expressions("a${b}c").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Literal {
                    text: "a".to_string(),
                    start: 0
                },
                Segment::Expression {
                    text: "b".to_string(),
                    start: 1
                },
                Segment::Literal {
                    text: "c".to_string(),
                    start: 5
                },
            ]
        );
    }
}
