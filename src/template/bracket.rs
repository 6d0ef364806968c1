//! Bracket bookkeeping for locating the true end of an expression marker.

/// An open bracket seen while scanning, with its character offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bracket {
    pub bracket: char,
    pub pos: usize,
}

impl Bracket {
    pub fn new(bracket: char, pos: usize) -> Self {
        Self { bracket, pos }
    }

    /// Whether `close` terminates this bracket.
    pub fn compatible_with_close(&self, close: char) -> bool {
        closing_for(self.bracket) == Some(close)
    }
}

/// Returns the close bracket matching `open`.
pub fn closing_for(open: char) -> Option<char> {
    match open {
        '{' => Some('}'),
        '[' => Some(']'),
        '(' => Some(')'),
        _ => None,
    }
}

/// Returns the open bracket matching `close`.
pub fn opening_for(close: char) -> Option<char> {
    match close {
        '}' => Some('{'),
        ']' => Some('['),
        ')' => Some('('),
        _ => None,
    }
}

/// Explicit LIFO stack of open brackets.
#[derive(Debug, Default)]
pub struct BracketStack {
    items: Vec<Bracket>,
}

impl BracketStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bracket: Bracket) {
        self.items.push(bracket);
    }

    pub fn pop(&mut self) -> Option<Bracket> {
        self.items.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
