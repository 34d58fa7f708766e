//! Recursive-descent parser.
//!
//! ```text
//! expr       := or
//! or         := and ( "or" and )*
//! and        := atom ( "and" atom )*
//! atom       := "True" | "False" | "(" expr ")" | comparison
//! comparison := operand CMP operand
//! operand    := "-"? NUMBER | VARIABLE
//! ```
//!
//! `and`/`or` chains are collected into flat clause lists and parenthesis
//! nesting is capped at [`MAX_DEPTH`], so recursion stays shallow.

use super::{ExprError, MAX_DEPTH};
use super::ast::{Expr, Operand, Var};
use super::lexer::{Spanned, Token};

pub struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Spanned]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    /// Parses the whole token stream; trailing tokens are an error.
    pub fn parse(mut self) -> Result<Expr, ExprError> {
        if self.tokens.is_empty() {
            return Err(ExprError::Empty);
        }

        let expr = self.or()?;

        match self.peek() {
            None => Ok(expr),
            Some(tok) => Err(self.unexpected(tok)),
        }
    }

    fn peek(&self) -> Option<&'a Spanned> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<&'a Spanned, ExprError> {
        let tok = self.tokens.get(self.pos).ok_or(ExprError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(tok)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek().is_some_and(|t| &t.token == token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self, tok: &Spanned) -> ExprError {
        ExprError::UnexpectedToken {
            found: format!("{:?}", tok.token),
            pos: tok.pos,
        }
    }

    fn or(&mut self) -> Result<Expr, ExprError> {
        let mut clauses = vec![self.and()?];
        while self.eat(&Token::Or) {
            clauses.push(self.and()?);
        }
        Ok(match clauses.len() {
            1 => clauses.remove(0),
            _ => Expr::Or(clauses),
        })
    }

    fn and(&mut self) -> Result<Expr, ExprError> {
        let mut clauses = vec![self.atom()?];
        while self.eat(&Token::And) {
            clauses.push(self.atom()?);
        }
        Ok(match clauses.len() {
            1 => clauses.remove(0),
            _ => Expr::And(clauses),
        })
    }

    fn atom(&mut self) -> Result<Expr, ExprError> {
        let Some(tok) = self.peek() else {
            return Err(ExprError::UnexpectedEnd);
        };

        match tok.token {
            Token::True => {
                self.pos += 1;
                Ok(Expr::Bool(true))
            }
            Token::False => {
                self.pos += 1;
                Ok(Expr::Bool(false))
            }
            Token::LParen => {
                if self.depth >= MAX_DEPTH {
                    return Err(ExprError::TooDeep { pos: tok.pos });
                }
                self.pos += 1;
                self.depth += 1;
                let inner = self.or()?;
                self.depth -= 1;
                let close = self.next()?;
                if close.token != Token::RParen {
                    return Err(self.unexpected(close));
                }
                Ok(inner)
            }
            _ => self.comparison(),
        }
    }

    fn comparison(&mut self) -> Result<Expr, ExprError> {
        let lhs = self.operand()?;

        let tok = self.next()?;
        let Token::Cmp(op) = tok.token else {
            return Err(self.unexpected(tok));
        };

        let rhs = self.operand()?;
        Ok(Expr::Cmp { lhs, op, rhs })
    }

    fn operand(&mut self) -> Result<Operand, ExprError> {
        let tok = self.next()?;
        match &tok.token {
            Token::Number(n) => Ok(Operand::Num(*n)),
            Token::Minus => {
                let num = self.next()?;
                match num.token {
                    Token::Number(n) => Ok(Operand::Num(-n)),
                    _ => Err(self.unexpected(num)),
                }
            }
            Token::Ident(name) => Var::lookup(name)
                .map(Operand::Var)
                .ok_or_else(|| ExprError::UnknownVariable(name.clone())),
            _ => Err(self.unexpected(tok)),
        }
    }
}
