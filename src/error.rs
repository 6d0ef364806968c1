//! Error definitions for template scanning, compilation and evaluation.

use serde::Serialize;
use thiserror::Error;

use crate::engine::EvaluationError;

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
/// Top-level error type returned by public APIs.
pub enum SpelError {
    /// A `${` marker has no matching `}`.
    #[error("No ending suffix '}}' for expression starting at character {position}: {remainder}")]
    NoEndingSuffix { position: usize, remainder: String },
    /// A marker contains nothing but whitespace.
    #[error("No expression defined within delimiter '${{}}' at character {position}")]
    EmptyExpression { position: usize },
    /// A close bracket was found while no bracket was open.
    #[error("Found closing '{bracket}' at position {position} without an opening '{opening}'")]
    UnmatchedClosingBracket {
        bracket: char,
        opening: char,
        position: usize,
    },
    /// A close bracket does not match the most recent open bracket.
    #[error("Found closing '{bracket}' at position {position} but most recent opening is '{opening}' at position {opening_position}")]
    MismatchedBracket {
        bracket: char,
        position: usize,
        opening: char,
        opening_position: usize,
    },
    /// A quote inside an expression has no terminating quote.
    #[error("Found non terminating string literal starting at position {position}")]
    UnterminatedLiteral { position: usize },
    /// An open bracket is still pending when the marker ends.
    #[error("Missing closing '{closing}' for '{bracket}' at position {position}")]
    MissingClosingBracket {
        bracket: char,
        closing: char,
        position: usize,
    },
    /// Expression syntax error raised by an engine while compiling.
    #[error("{0}")]
    ExpressionError(String),
    /// A configured size limit was exceeded.
    #[error("{0}")]
    LimitExceeded(String),
    /// Runtime failure while evaluating a compiled expression.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

impl SpelError {
    /// Short error name shown in front of the message in previews.
    pub fn name(&self) -> &str {
        match self {
            SpelError::ExpressionError(_) => "SpelParseException",
            SpelError::LimitExceeded(_) => "LimitExceeded",
            SpelError::Evaluation(err) => err.name(),
            _ => "Error",
        }
    }

    /// Message without the name prefix.
    pub fn message(&self) -> String {
        match self {
            SpelError::Evaluation(err) => err.message.clone(),
            other => other.to_string(),
        }
    }
}
