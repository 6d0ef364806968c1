use crate::error::SpelError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    String(String),
    Bool(bool),
    Null,
    Ident(String),
    Hash,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    SafeDot,
    Question,
    Elvis,
    SelectAll,
    SelectFirst,
    SelectLast,
    Project,
    Bang,
    EqEq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    AndAnd,
    OrOr,
    Matches,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: usize,
}

pub fn tokenize(input: &str) -> Result<Vec<Token>, SpelError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0usize;

    while i < chars.len() {
        let ch = chars[i];
        if ch.is_whitespace() {
            i += 1;
            continue;
        }

        let next = chars.get(i + 1).copied();
        let start = i;
        let (kind, width) = match ch {
            '0'..='9' => {
                let mut end = i;
                let mut seen_dot = false;
                while end < chars.len() {
                    let c = chars[end];
                    if c.is_ascii_digit() {
                        end += 1;
                    } else if c == '.'
                        && !seen_dot
                        && chars.get(end + 1).is_some_and(|d| d.is_ascii_digit())
                    {
                        seen_dot = true;
                        end += 1;
                    } else {
                        break;
                    }
                }
                let raw: String = chars[start..end].iter().collect();
                let n: f64 = raw.parse().map_err(|e| {
                    SpelError::ExpressionError(format!(
                        "invalid number literal '{raw}' at {start}: {e}"
                    ))
                })?;
                (TokenKind::Number(n), end - start)
            }
            '\'' | '"' => {
                let (literal, end) = read_string(&chars, start, ch)?;
                (TokenKind::String(literal), end - start)
            }
            '#' => (TokenKind::Hash, 1),
            '+' => (TokenKind::Plus, 1),
            '-' => (TokenKind::Minus, 1),
            '*' => (TokenKind::Star, 1),
            '/' => (TokenKind::Slash, 1),
            '%' => (TokenKind::Percent, 1),
            '^' => (TokenKind::Caret, 1),
            '(' => (TokenKind::LParen, 1),
            ')' => (TokenKind::RParen, 1),
            '[' => (TokenKind::LBracket, 1),
            ']' => (TokenKind::RBracket, 1),
            '{' => (TokenKind::LBrace, 1),
            '}' => (TokenKind::RBrace, 1),
            ',' => (TokenKind::Comma, 1),
            ':' => (TokenKind::Colon, 1),
            '.' => match (next, chars.get(i + 2).copied()) {
                (Some('?'), Some('[')) => (TokenKind::SelectAll, 3),
                (Some('^'), Some('[')) => (TokenKind::SelectFirst, 3),
                (Some('$'), Some('[')) => (TokenKind::SelectLast, 3),
                (Some('!'), Some('[')) => (TokenKind::Project, 3),
                _ => (TokenKind::Dot, 1),
            },
            '?' => match next {
                Some('.') => (TokenKind::SafeDot, 2),
                Some(':') => (TokenKind::Elvis, 2),
                _ => (TokenKind::Question, 1),
            },
            '!' => match next {
                Some('=') => (TokenKind::NotEq, 2),
                _ => (TokenKind::Bang, 1),
            },
            '=' => match next {
                Some('=') => (TokenKind::EqEq, 2),
                _ => {
                    return Err(SpelError::ExpressionError(format!(
                        "unexpected '=' at {i}; assignment is not supported, use '==' for equality"
                    )))
                }
            },
            '<' => match next {
                Some('=') => (TokenKind::Lte, 2),
                _ => (TokenKind::Lt, 1),
            },
            '>' => match next {
                Some('=') => (TokenKind::Gte, 2),
                _ => (TokenKind::Gt, 1),
            },
            '&' => match next {
                Some('&') => (TokenKind::AndAnd, 2),
                _ => {
                    return Err(SpelError::ExpressionError(format!(
                        "unexpected '&' at {i}; expected '&&'"
                    )))
                }
            },
            '|' => match next {
                Some('|') => (TokenKind::OrOr, 2),
                _ => {
                    return Err(SpelError::ExpressionError(format!(
                        "unexpected '|' at {i}; expected '||'"
                    )))
                }
            },
            c if is_ident_start(c) => {
                let mut end = i;
                while end < chars.len() && is_ident_continue(chars[end]) {
                    end += 1;
                }
                let raw: String = chars[start..end].iter().collect();
                (keyword_or_ident(raw), end - start)
            }
            other => {
                return Err(SpelError::ExpressionError(format!(
                    "unexpected character '{other}' at {i}"
                )))
            }
        };

        tokens.push(Token { kind, pos: start });
        i += width;
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        pos: chars.len(),
    });
    Ok(tokens)
}

/// Reads a quoted literal starting at `start`; a doubled quote is an escaped
/// quote. Returns the literal and the offset just past the closing quote.
fn read_string(chars: &[char], start: usize, quote: char) -> Result<(String, usize), SpelError> {
    let mut out = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if c == quote {
            if chars.get(i + 1) == Some(&quote) {
                out.push(quote);
                i += 2;
                continue;
            }
            return Ok((out, i + 1));
        }
        out.push(c);
        i += 1;
    }
    Err(SpelError::ExpressionError(format!(
        "unterminated string literal starting at {start}"
    )))
}

fn keyword_or_ident(raw: String) -> TokenKind {
    match raw.to_ascii_lowercase().as_str() {
        "true" => TokenKind::Bool(true),
        "false" => TokenKind::Bool(false),
        "null" => TokenKind::Null,
        "and" => TokenKind::AndAnd,
        "or" => TokenKind::OrOr,
        "not" => TokenKind::Bang,
        "eq" => TokenKind::EqEq,
        "ne" => TokenKind::NotEq,
        "lt" => TokenKind::Lt,
        "le" => TokenKind::Lte,
        "gt" => TokenKind::Gt,
        "ge" => TokenKind::Gte,
        "div" => TokenKind::Slash,
        "mod" => TokenKind::Percent,
        "matches" => TokenKind::Matches,
        _ => TokenKind::Ident(raw),
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_navigation_operators() {
        assert_eq!(
            kinds("a?.b.?[x].![y]"),
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::SafeDot,
                TokenKind::Ident("b".to_string()),
                TokenKind::SelectAll,
                TokenKind::Ident("x".to_string()),
                TokenKind::RBracket,
                TokenKind::Project,
                TokenKind::Ident("y".to_string()),
                TokenKind::RBracket,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn doubled_quote_escapes() {
        assert_eq!(
            kinds("'it''s'"),
            vec![TokenKind::String("it's".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn word_operators_are_case_insensitive() {
        assert_eq!(
            kinds("a AND not b"),
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::AndAnd,
                TokenKind::Bang,
                TokenKind::Ident("b".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn trailing_dot_after_number_is_navigation() {
        assert_eq!(
            kinds("1.size()")[..2].to_vec(),
            vec![TokenKind::Number(1.0), TokenKind::Dot]
        );
    }
}
