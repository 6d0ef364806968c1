//! SpEL-style expression language evaluated inside `${...}` markers.

/// Expression evaluator and runtime support.
pub mod eval;
/// Built-in functions.
pub mod functions;
/// Tokenizer for expression source text.
pub mod lexer;
/// Methods on strings, lists and maps.
pub mod methods;
/// Parser and expression AST definitions.
pub mod parser;

use crate::error::SpelError;

/// Nesting depth accepted by [`parse_expression`].
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Parses expression source into an AST.
pub fn parse_expression(input: &str) -> Result<parser::Expr, SpelError> {
    parse_expression_with_depth(input, DEFAULT_MAX_DEPTH)
}

/// Parses expression source, rejecting trees nested deeper than `max_depth`.
///
/// Evaluation recurses over the tree, so this bound also bounds evaluation.
pub fn parse_expression_with_depth(
    input: &str,
    max_depth: usize,
) -> Result<parser::Expr, SpelError> {
    let tokens = lexer::tokenize(input)?;
    parser::parse(&tokens, max_depth)
}
