//! Recursive descent parser for predicate expressions.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! or       := and (("||" | "or") and)*
//! and      := unary (("&&" | "and") unary)*
//! unary    := ("!" | "not") unary | test
//! test     := operand [ cmp operand
//!                     | "is" ["not"] "null"
//!                     | ["not"] "in" list
//!                     | ["not"] "like" string
//!                     | ["not"] "between" operand "and" operand ]
//! operand  := primary ("." ident "(" [or ("," or)*] ")")*
//! primary  := ident | literal | list | "(" or ")"
//! ```

use ormbatch_proto::{CompareOp, Expr, Value};

use crate::error::ParseError;
use crate::lexer::{tokenize, SpannedToken, Token};
use crate::span::Span;

/// Parser over a pre-lexed token stream.
pub struct Parser<'source> {
    tokens: Vec<SpannedToken>,
    pos: usize,
    source: &'source str,
}

impl<'source> Parser<'source> {
    /// Create a parser for the given source.
    pub fn new(source: &'source str) -> Result<Self, ParseError> {
        Ok(Self {
            tokens: tokenize(source)?,
            pos: 0,
            source,
        })
    }

    /// Parse a complete expression, rejecting trailing input.
    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        if self.tokens.is_empty() {
            return Err(ParseError::new("empty predicate", Span::new(0, 0)));
        }

        let expr = self.parse_or()?;
        if let Some(tok) = self.peek() {
            return Err(ParseError::new(
                format!("unexpected {:?} after expression", tok.token),
                tok.span,
            ));
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = left.or(right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        while self.eat(&Token::And) {
            let right = self.parse_unary()?;
            left = left.and(right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::Bang) || self.eat(&Token::Not) {
            let inner = self.parse_unary()?;
            return Ok(!inner);
        }
        self.parse_test()
    }

    /// Parse an operand optionally followed by a comparison or keyword test.
    fn parse_test(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_operand()?;

        let Some((next, span)) = self.peek().map(|t| (t.token.clone(), t.span)) else {
            return Ok(left);
        };

        let op = match next {
            Token::Eq => Some(CompareOp::Eq),
            Token::Ne => Some(CompareOp::Ne),
            Token::Lt => Some(CompareOp::Lt),
            Token::Le => Some(CompareOp::Le),
            Token::Gt => Some(CompareOp::Gt),
            Token::Ge => Some(CompareOp::Ge),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            let right = self.parse_operand()?;
            return Ok(Expr::Compare {
                op,
                lhs: Box::new(left),
                rhs: Box::new(right),
            });
        }

        match next {
            Token::Is => {
                self.pos += 1;
                let negated = self.eat(&Token::Not);
                self.expect(Token::Null, "'null' after 'is'")?;
                Ok(if negated {
                    left.is_not_null()
                } else {
                    left.is_null()
                })
            }
            Token::Not => {
                // `not` directly after an operand only introduces a negated
                // keyword test.
                self.pos += 1;
                match self.peek().map(|t| &t.token) {
                    Some(Token::In) | Some(Token::Like) | Some(Token::Between) => {
                        Ok(!self.parse_keyword_test(left)?)
                    }
                    _ => Err(ParseError::new(
                        "expected 'in', 'like' or 'between' after 'not'",
                        span,
                    )),
                }
            }
            Token::In | Token::Like | Token::Between => self.parse_keyword_test(left),
            _ => Ok(left),
        }
    }

    fn parse_keyword_test(&mut self, left: Expr) -> Result<Expr, ParseError> {
        let tok = self.next_token()?;
        match tok.token {
            Token::In => {
                let list = self.parse_list()?;
                Ok(left.call("is_in", vec![list]))
            }
            Token::Like => {
                let pattern = self.parse_string()?;
                Ok(left.like(pattern))
            }
            Token::Between => {
                let low = self.parse_operand()?;
                self.expect(Token::And, "'and' between the bounds of 'between'")?;
                let high = self.parse_operand()?;
                Ok(left.call("between", vec![low, high]))
            }
            other => Err(ParseError::new(
                format!("expected 'in', 'like' or 'between', found {:?}", other),
                tok.span,
            )),
        }
    }

    /// Parse a primary followed by any number of method calls.
    fn parse_operand(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;

        while self.eat(&Token::Dot) {
            let method = self.expect_ident()?;
            self.expect(Token::LParen, "'(' after method name")?;
            let mut args = Vec::new();
            if !self.eat(&Token::RParen) {
                loop {
                    args.push(self.parse_or()?);
                    if self.eat(&Token::RParen) {
                        break;
                    }
                    self.expect(Token::Comma, "',' or ')' in argument list")?;
                }
            }
            expr = expr.call(method, args);
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let tok = self.next_token()?;
        let expr = match tok.token {
            Token::Ident(name) => Expr::Column(name),
            Token::Null => Expr::Literal(Value::Null),
            Token::True => Expr::Literal(Value::Bool(true)),
            Token::False => Expr::Literal(Value::Bool(false)),
            Token::Int(i) => Expr::Literal(int_value(i)),
            Token::Float(f) => Expr::Literal(Value::Float64(f)),
            Token::String(s) | Token::StringSingle(s) => Expr::Literal(Value::String(s)),
            Token::LParen => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen, "')' to close '('")?;
                inner
            }
            Token::LBracket => {
                self.pos -= 1;
                self.parse_list()?
            }
            other => {
                return Err(ParseError::new(
                    format!("expected operand, found {:?}", other),
                    tok.span,
                ))
            }
        };
        Ok(expr)
    }

    /// Parse `[expr, ...]`.
    fn parse_list(&mut self) -> Result<Expr, ParseError> {
        self.expect(Token::LBracket, "'[' to start a list")?;
        let mut items = Vec::new();

        if self.eat(&Token::RBracket) {
            return Ok(Expr::List(items));
        }

        loop {
            items.push(self.parse_operand()?);
            if self.eat(&Token::RBracket) {
                break;
            }
            self.expect(Token::Comma, "',' or ']' in list")?;
        }

        Ok(Expr::List(items))
    }

    fn parse_string(&mut self) -> Result<String, ParseError> {
        let tok = self.next_token()?;
        match tok.token {
            Token::String(s) | Token::StringSingle(s) => Ok(s),
            other => Err(ParseError::new(
                format!("expected string literal, found {:?}", other),
                tok.span,
            )),
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        let tok = self.next_token()?;
        match tok.token {
            Token::Ident(name) => Ok(name),
            other => Err(ParseError::new(
                format!("expected identifier, found {:?}", other),
                tok.span,
            )),
        }
    }

    /// Expect and consume a specific token.
    fn expect(&mut self, expected: Token, what: &str) -> Result<SpannedToken, ParseError> {
        let tok = self.next_token()?;
        if std::mem::discriminant(&tok.token) == std::mem::discriminant(&expected) {
            Ok(tok)
        } else {
            Err(ParseError::new(
                format!("expected {}, found {:?}", what, tok.token),
                tok.span,
            ))
        }
    }

    /// Consume the next token if it matches.
    fn eat(&mut self, expected: &Token) -> bool {
        match self.peek() {
            Some(tok) if &tok.token == expected => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn peek(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    /// Get the next token or error if EOF.
    fn next_token(&mut self) -> Result<SpannedToken, ParseError> {
        match self.tokens.get(self.pos) {
            Some(tok) => {
                self.pos += 1;
                Ok(tok.clone())
            }
            None => Err(ParseError::new(
                "unexpected end of input",
                Span::new(self.source.len(), self.source.len()),
            )),
        }
    }
}

/// Integer literals take the narrowest representation that fits.
fn int_value(i: i64) -> Value {
    match i32::try_from(i) {
        Ok(small) => Value::Int32(small),
        Err(_) => Value::Int64(i),
    }
}

/// Parse a predicate expression.
pub fn parse(source: &str) -> Result<Expr, ParseError> {
    Parser::new(source)?.parse_expression()
}
