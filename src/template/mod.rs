//! Template scanning.
//!
//! Splits a template such as `hello ${name}!` into ordered literal and
//! expression segments. A marker starts at `${` and ends at the first `}`
//! reached with no bracket left open; quoted literals inside a marker are
//! skipped as opaque spans.

/// Bracket records and the explicit bracket stack.
pub mod bracket;

use serde::Serialize;
use tracing::trace;

use crate::error::SpelError;

use bracket::{closing_for, opening_for, Bracket, BracketStack};

/// Marker prefix.
pub const PREFIX: &str = "${";
/// Marker suffix.
pub const SUFFIX: char = '}';

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
/// One parsed unit of a template.
pub enum Segment {
    /// Verbatim text; `start` is the offset of its first character.
    Literal { text: String, start: usize },
    /// Trimmed expression text; `start` is the offset of the marker's `$`.
    Expression { text: String, start: usize },
}

impl Segment {
    pub fn text(&self) -> &str {
        match self {
            Segment::Literal { text, .. } | Segment::Expression { text, .. } => text,
        }
    }

    pub fn start(&self) -> usize {
        match self {
            Segment::Literal { start, .. } | Segment::Expression { start, .. } => *start,
        }
    }

    pub fn is_expression(&self) -> bool {
        matches!(self, Segment::Expression { .. })
    }
}

/// Returns true when `value` contains an expression marker prefix.
pub fn contains_expression(value: &str) -> bool {
    value.contains(PREFIX)
}

/// Scans `template` into segments. Offsets in errors and segments are
/// character offsets. The empty template yields no segments.
pub fn parse_expressions(template: &str) -> Result<Vec<Segment>, SpelError> {
    let chars: Vec<char> = template.chars().collect();
    let mut segments = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let Some(prefix_index) = find_prefix(&chars, start) else {
            segments.push(Segment::Literal {
                text: collect(&chars[start..]),
                start,
            });
            break;
        };

        if prefix_index != start {
            segments.push(Segment::Literal {
                text: collect(&chars[start..prefix_index]),
                start,
            });
        }

        let after_prefix = prefix_index + PREFIX.len();
        let suffix_index = skip_to_correct_end_suffix(&chars, after_prefix)?.ok_or_else(|| {
            SpelError::NoEndingSuffix {
                position: prefix_index,
                remainder: collect(&chars[prefix_index..]),
            }
        })?;

        if suffix_index == after_prefix {
            return Err(SpelError::EmptyExpression {
                position: prefix_index,
            });
        }

        let text = collect(&chars[after_prefix..suffix_index]).trim().to_string();
        if text.is_empty() {
            return Err(SpelError::EmptyExpression {
                position: prefix_index,
            });
        }

        trace!(start = prefix_index, end = suffix_index, expression = %text, "found expression marker");
        segments.push(Segment::Expression {
            text,
            start: prefix_index,
        });
        start = suffix_index + 1;
    }

    Ok(segments)
}

fn find_prefix(chars: &[char], from: usize) -> Option<usize> {
    (from..chars.len().saturating_sub(1)).find(|&i| chars[i] == '$' && chars[i + 1] == '{')
}

/// Finds the offset of the `}` closing the marker whose content starts at
/// `after_prefix`. `Ok(None)` means no closing suffix exists.
fn skip_to_correct_end_suffix(
    chars: &[char],
    after_prefix: usize,
) -> Result<Option<usize>, SpelError> {
    if !chars[after_prefix..].contains(&SUFFIX) {
        return Ok(None);
    }

    let mut stack = BracketStack::new();
    let mut pos = after_prefix;

    while pos < chars.len() {
        // The suffix only counts once every nested bracket is closed.
        if chars[pos] == SUFFIX && stack.is_empty() {
            break;
        }

        let ch = chars[pos];
        match ch {
            '{' | '[' | '(' => stack.push(Bracket::new(ch, pos)),
            '}' | ']' | ')' => {
                let Some(open) = stack.pop() else {
                    return Err(SpelError::UnmatchedClosingBracket {
                        bracket: ch,
                        opening: opening_for(ch).unwrap_or(ch),
                        position: pos,
                    });
                };
                if !open.compatible_with_close(ch) {
                    return Err(SpelError::MismatchedBracket {
                        bracket: ch,
                        position: pos,
                        opening: open.bracket,
                        opening_position: open.pos,
                    });
                }
            }
            '\'' | '"' => {
                let end = chars[pos + 1..]
                    .iter()
                    .position(|&c| c == ch)
                    .map(|offset| pos + 1 + offset)
                    .ok_or(SpelError::UnterminatedLiteral { position: pos })?;
                pos = end;
            }
            _ => {}
        }
        pos += 1;
    }

    if let Some(open) = stack.pop() {
        return Err(SpelError::MissingClosingBracket {
            bracket: open.bracket,
            closing: closing_for(open.bracket).unwrap_or(open.bracket),
            position: open.pos,
        });
    }

    if chars.get(pos) != Some(&SUFFIX) {
        return Ok(None);
    }
    Ok(Some(pos))
}

fn collect(chars: &[char]) -> String {
    chars.iter().collect()
}
