//! Tunables for previews.

use serde::Deserialize;

use crate::engine::CompileLimits;

/// Options for [`crate::evaluate_expression_with`] and [`crate::TemplateCache`].
///
/// Deserializes from JSON with every field optional:
/// `{"context_truncate_len": 80}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreviewOptions {
    /// Characters of the error context kept in `contextTruncated`.
    pub context_truncate_len: usize,
    /// Maximum literal plus expression segments per template.
    pub max_segments: usize,
    /// Maximum characters in one expression.
    pub max_expression_len: usize,
    /// Maximum nesting of one expression's syntax tree.
    pub max_nesting_depth: usize,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        let limits = CompileLimits::default();
        Self {
            context_truncate_len: 200,
            max_segments: limits.max_segments,
            max_expression_len: limits.max_expression_len,
            max_nesting_depth: limits.max_nesting_depth,
        }
    }
}

impl PreviewOptions {
    pub fn limits(&self) -> CompileLimits {
        CompileLimits {
            max_segments: self.max_segments,
            max_expression_len: self.max_expression_len,
            max_nesting_depth: self.max_nesting_depth,
        }
    }
}
