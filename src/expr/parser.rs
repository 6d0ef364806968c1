//! Recursive-descent parser and AST for expressions.

use serde_json::Value as JsonValue;

use crate::error::SpelError;

use super::lexer::{Token, TokenKind};

#[derive(Debug, Clone)]
/// Expression AST node.
pub enum Expr {
    /// String, number, boolean or null literal.
    Literal(JsonValue),
    /// Inline list (`{1, 2}`).
    InlineList(Vec<Expr>),
    /// Inline map (`{a: 1}`).
    InlineMap(Vec<(String, Expr)>),
    /// Property read on the active context object.
    Property(String),
    /// Variable reference (`#root`, `#this`, `#name`).
    Variable(String),
    /// Function call (`max(a, b)` or `#toJson(a)`).
    Call {
        /// Function name without the `#` prefix.
        name: String,
        /// Call argument expressions.
        args: Vec<Expr>,
    },
    /// Navigation chain starting at `head`.
    Compound {
        head: Box<Expr>,
        steps: Vec<Step>,
    },
    /// Unary operation.
    Unary {
        /// Unary operator.
        op: UnaryOp,
        /// Operand expression.
        expr: Box<Expr>,
    },
    /// Binary operation.
    Binary {
        /// Binary operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// `condition ? then : otherwise`
    Ternary {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// `value ?: fallback`
    Elvis {
        value: Box<Expr>,
        fallback: Box<Expr>,
    },
}

#[derive(Debug, Clone)]
/// One navigation step applied to the value produced so far.
pub struct Step {
    /// Step was written with `?.` and yields null on a null receiver.
    pub null_safe: bool,
    pub kind: StepKind,
}

#[derive(Debug, Clone)]
pub enum StepKind {
    /// `.name`
    Property(String),
    /// `.name(args)`
    Method { name: String, args: Vec<Expr> },
    /// `[index]`
    Index(Box<Expr>),
    /// `.?[predicate]`, `.^[predicate]`, `.$[predicate]`
    Select {
        mode: SelectMode,
        predicate: Box<Expr>,
    },
    /// `.![projection]`
    Project(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectMode {
    All,
    First,
    Last,
}

#[derive(Debug, Clone, Copy)]
/// Unary operators.
pub enum UnaryOp {
    /// Arithmetic negation (`-x`).
    Neg,
    /// Boolean negation (`!x`, `not x`).
    Not,
}

#[derive(Debug, Clone, Copy)]
/// Binary operators in the expression language.
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`, `div`
    Div,
    /// `%`, `mod`
    Mod,
    /// `^`
    Pow,
    /// `==`, `eq`
    Eq,
    /// `!=`, `ne`
    NotEq,
    /// `<`, `lt`
    Lt,
    /// `<=`, `le`
    Lte,
    /// `>`, `gt`
    Gt,
    /// `>=`, `ge`
    Gte,
    /// `matches`
    Matches,
    /// `&&`, `and`
    And,
    /// `||`, `or`
    Or,
}

/// Parses token stream into an expression AST.
///
/// `max_depth` bounds the nesting of the resulting tree: parenthesised and
/// bracketed sub-expressions, prefix operators and operator chains each add a
/// level. Deeper input fails with [`SpelError::LimitExceeded`].
pub fn parse(tokens: &[Token], max_depth: usize) -> Result<Expr, SpelError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        max_depth,
    };
    let expr = parser.parse_expression()?;
    if !matches!(parser.current().kind, TokenKind::Eof) {
        return Err(SpelError::ExpressionError(format!(
            "unexpected token {:?} after expression at position {}",
            parser.current().kind,
            parser.current().pos
        )));
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    fn parse_expression(&mut self) -> Result<Expr, SpelError> {
        self.descend()?;
        let expr = self.parse_conditional();
        self.depth -= 1;
        expr
    }

    fn parse_conditional(&mut self) -> Result<Expr, SpelError> {
        let expr = self.parse_or()?;

        if self.consume_if(|k| matches!(k, TokenKind::Elvis)).is_some() {
            let fallback = self.parse_expression()?;
            return Ok(Expr::Elvis {
                value: Box::new(expr),
                fallback: Box::new(fallback),
            });
        }

        if self.consume_if(|k| matches!(k, TokenKind::Question)).is_some() {
            let then = self.parse_expression()?;
            self.expect(
                |k| matches!(k, TokenKind::Colon),
                "expected ':' in ternary expression",
            )?;
            let otherwise = self.parse_expression()?;
            return Ok(Expr::Ternary {
                condition: Box::new(expr),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }

        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr, SpelError> {
        let mut expr = self.parse_and()?;
        let mut chain = 0;
        while self.consume_if(|k| matches!(k, TokenKind::OrOr)).is_some() {
            self.descend()?;
            chain += 1;
            let right = self.parse_and()?;
            expr = binary(BinaryOp::Or, expr, right);
        }
        self.depth -= chain;
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, SpelError> {
        let mut expr = self.parse_relational()?;
        let mut chain = 0;
        while self
            .consume_if(|k| matches!(k, TokenKind::AndAnd))
            .is_some()
        {
            self.descend()?;
            chain += 1;
            let right = self.parse_relational()?;
            expr = binary(BinaryOp::And, expr, right);
        }
        self.depth -= chain;
        Ok(expr)
    }

    fn parse_relational(&mut self) -> Result<Expr, SpelError> {
        let expr = self.parse_sum()?;
        let op = match self.current().kind {
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::NotEq,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Lte => BinaryOp::Lte,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Gte => BinaryOp::Gte,
            TokenKind::Matches => BinaryOp::Matches,
            _ => return Ok(expr),
        };
        self.pos += 1;
        let right = self.parse_sum()?;
        Ok(binary(op, expr, right))
    }

    fn parse_sum(&mut self) -> Result<Expr, SpelError> {
        let mut expr = self.parse_product()?;
        let mut chain = 0;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            self.descend()?;
            chain += 1;
            let right = self.parse_product()?;
            expr = binary(op, expr, right);
        }
        self.depth -= chain;
        Ok(expr)
    }

    fn parse_product(&mut self) -> Result<Expr, SpelError> {
        let mut expr = self.parse_power()?;
        let mut chain = 0;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.pos += 1;
            self.descend()?;
            chain += 1;
            let right = self.parse_power()?;
            expr = binary(op, expr, right);
        }
        self.depth -= chain;
        Ok(expr)
    }

    fn parse_power(&mut self) -> Result<Expr, SpelError> {
        let expr = self.parse_unary()?;
        if self.consume_if(|k| matches!(k, TokenKind::Caret)).is_some() {
            let right = self.parse_unary()?;
            return Ok(binary(BinaryOp::Pow, expr, right));
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, SpelError> {
        self.descend()?;
        let expr = self.parse_prefixed();
        self.depth -= 1;
        expr
    }

    fn parse_prefixed(&mut self) -> Result<Expr, SpelError> {
        if self.consume_if(|k| matches!(k, TokenKind::Minus)).is_some() {
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                expr: Box::new(expr),
            });
        }

        if self.consume_if(|k| matches!(k, TokenKind::Bang)).is_some() {
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(expr),
            });
        }

        if self.consume_if(|k| matches!(k, TokenKind::Plus)).is_some() {
            return self.parse_unary();
        }

        self.parse_navigation()
    }

    fn parse_navigation(&mut self) -> Result<Expr, SpelError> {
        let head = self.parse_primary()?;
        let mut steps = Vec::new();

        loop {
            let token = self.current().clone();
            let step = match token.kind {
                TokenKind::Dot | TokenKind::SafeDot => {
                    self.pos += 1;
                    let name = self.expect_ident("expected property or method name after '.'")?;
                    let kind = if self.consume_if(|k| matches!(k, TokenKind::LParen)).is_some() {
                        StepKind::Method {
                            name,
                            args: self.parse_args()?,
                        }
                    } else {
                        StepKind::Property(name)
                    };
                    Step {
                        null_safe: matches!(token.kind, TokenKind::SafeDot),
                        kind,
                    }
                }
                TokenKind::LBracket => {
                    self.pos += 1;
                    let index = self.parse_expression()?;
                    self.expect_close_bracket()?;
                    Step {
                        null_safe: false,
                        kind: StepKind::Index(Box::new(index)),
                    }
                }
                TokenKind::SelectAll | TokenKind::SelectFirst | TokenKind::SelectLast => {
                    self.pos += 1;
                    let predicate = self.parse_expression()?;
                    self.expect_close_bracket()?;
                    let mode = match token.kind {
                        TokenKind::SelectFirst => SelectMode::First,
                        TokenKind::SelectLast => SelectMode::Last,
                        _ => SelectMode::All,
                    };
                    Step {
                        null_safe: false,
                        kind: StepKind::Select {
                            mode,
                            predicate: Box::new(predicate),
                        },
                    }
                }
                TokenKind::Project => {
                    self.pos += 1;
                    let projection = self.parse_expression()?;
                    self.expect_close_bracket()?;
                    Step {
                        null_safe: false,
                        kind: StepKind::Project(Box::new(projection)),
                    }
                }
                _ => break,
            };
            steps.push(step);
        }

        if steps.is_empty() {
            Ok(head)
        } else {
            Ok(Expr::Compound {
                head: Box::new(head),
                steps,
            })
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, SpelError> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Number(n) => {
                self.pos += 1;
                Ok(Expr::Literal(number_literal(n)))
            }
            TokenKind::String(ref s) => {
                self.pos += 1;
                Ok(Expr::Literal(JsonValue::String(s.clone())))
            }
            TokenKind::Bool(v) => {
                self.pos += 1;
                Ok(Expr::Literal(JsonValue::Bool(v)))
            }
            TokenKind::Null => {
                self.pos += 1;
                Ok(Expr::Literal(JsonValue::Null))
            }
            TokenKind::Ident(ref name) => {
                self.pos += 1;
                if self.consume_if(|k| matches!(k, TokenKind::LParen)).is_some() {
                    Ok(Expr::Call {
                        name: name.clone(),
                        args: self.parse_args()?,
                    })
                } else {
                    Ok(Expr::Property(name.clone()))
                }
            }
            TokenKind::Hash => {
                self.pos += 1;
                let name = self.expect_ident("expected variable or function name after '#'")?;
                if self.consume_if(|k| matches!(k, TokenKind::LParen)).is_some() {
                    Ok(Expr::Call {
                        name,
                        args: self.parse_args()?,
                    })
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            TokenKind::LParen => {
                self.pos += 1;
                let expr = self.parse_expression()?;
                self.expect(
                    |k| matches!(k, TokenKind::RParen),
                    "expected ')' after expression",
                )?;
                Ok(expr)
            }
            TokenKind::LBrace => {
                self.pos += 1;
                self.parse_inline()
            }
            _ => Err(SpelError::ExpressionError(format!(
                "unexpected token {:?} at {}",
                token.kind, token.pos
            ))),
        }
    }

    /// Parses the body of `{...}` after the opening brace.
    fn parse_inline(&mut self) -> Result<Expr, SpelError> {
        if self.consume_if(|k| matches!(k, TokenKind::RBrace)).is_some() {
            return Ok(Expr::InlineList(Vec::new()));
        }
        if matches!(self.current().kind, TokenKind::Colon)
            && matches!(self.peek_kind(1), Some(TokenKind::RBrace))
        {
            self.pos += 2;
            return Ok(Expr::InlineMap(Vec::new()));
        }

        let is_map = matches!(self.peek_kind(1), Some(TokenKind::Colon))
            && matches!(
                self.current().kind,
                TokenKind::Ident(_) | TokenKind::String(_) | TokenKind::Number(_)
            );

        if is_map {
            let mut entries = Vec::new();
            loop {
                let key = match &self.current().kind {
                    TokenKind::Ident(v) | TokenKind::String(v) => v.clone(),
                    TokenKind::Number(n) => number_literal(*n).to_string(),
                    other => {
                        return Err(SpelError::ExpressionError(format!(
                            "expected map key, got {:?} at {}",
                            other,
                            self.current().pos
                        )))
                    }
                };
                self.pos += 1;
                self.expect(
                    |k| matches!(k, TokenKind::Colon),
                    "expected ':' after map key",
                )?;
                entries.push((key, self.parse_expression()?));
                if self.consume_if(|k| matches!(k, TokenKind::Comma)).is_some() {
                    continue;
                }
                self.expect(
                    |k| matches!(k, TokenKind::RBrace),
                    "expected '}' after inline map",
                )?;
                return Ok(Expr::InlineMap(entries));
            }
        }

        let mut items = Vec::new();
        loop {
            items.push(self.parse_expression()?);
            if self.consume_if(|k| matches!(k, TokenKind::Comma)).is_some() {
                continue;
            }
            self.expect(
                |k| matches!(k, TokenKind::RBrace),
                "expected '}' after inline list",
            )?;
            return Ok(Expr::InlineList(items));
        }
    }

    /// Parses call arguments after the opening parenthesis.
    fn parse_args(&mut self) -> Result<Vec<Expr>, SpelError> {
        let mut args = Vec::new();
        if self
            .consume_if(|k| matches!(k, TokenKind::RParen))
            .is_some()
        {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if self.consume_if(|k| matches!(k, TokenKind::Comma)).is_some() {
                continue;
            }
            self.expect(
                |k| matches!(k, TokenKind::RParen),
                "expected ')' after call",
            )?;
            return Ok(args);
        }
    }

    fn descend(&mut self) -> Result<(), SpelError> {
        if self.depth >= self.max_depth {
            return Err(SpelError::LimitExceeded(format!(
                "expression nesting exceeds max depth ({}) at {}",
                self.max_depth,
                self.current().pos
            )));
        }
        self.depth += 1;
        Ok(())
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn consume_if(&mut self, predicate: fn(&TokenKind) -> bool) -> Option<&Token> {
        if predicate(&self.current().kind) {
            let current = &self.tokens[self.pos];
            self.pos += 1;
            Some(current)
        } else {
            None
        }
    }

    fn expect(
        &mut self,
        predicate: fn(&TokenKind) -> bool,
        message: &str,
    ) -> Result<(), SpelError> {
        if self.consume_if(predicate).is_some() {
            Ok(())
        } else {
            Err(SpelError::ExpressionError(format!(
                "{} at {}",
                message,
                self.current().pos
            )))
        }
    }

    fn expect_close_bracket(&mut self) -> Result<(), SpelError> {
        self.expect(|k| matches!(k, TokenKind::RBracket), "expected ']'")
    }

    fn expect_ident(&mut self, message: &str) -> Result<String, SpelError> {
        match &self.current().kind {
            TokenKind::Ident(v) => {
                let name = v.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(SpelError::ExpressionError(format!(
                "{} at {}",
                message,
                self.current().pos
            ))),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn number_literal(n: f64) -> JsonValue {
    if n.fract() == 0.0 && n <= i64::MAX as f64 {
        JsonValue::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
    }
}
