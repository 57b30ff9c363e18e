// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Precedence-climbing expression parser.
//!
//! From lowest to highest precedence:
//!
//! ```text
//! logical    := binary ( ('&&' | '||') binary )*
//! binary     := equality ( ('&' | '|' | '^') equality )*
//! equality   := inequality ( ('=' | '!=') equality )?
//! inequality := shift ( ('<' | '<=' | '>' | '>=') shift )*
//! shift      := addsub ( ('<<' | '>>') addsub )*
//! addsub     := muldiv ( ('+' | '-') muldiv )*
//! muldiv     := unary ( ('*' | '/' | '%') unary )*
//! unary      := ('-' | '+' | '~' | '!' | LO | HI | BANK) unary | value
//! value      := '$' | '*' | '(' logical ')' | NUMBER | STRING | SYMBOL
//! ```
//!
//! The parser pulls whitespace-free tokens from an [`ExprContext`] and pushes
//! the first token it does not consume back, so the caller sees the
//! terminator (a comma or end of line) next.

use crate::core::expr::{BinaryOp, Expr, UnaryOp};
use crate::core::tokenizer::{Keyword, Operator, Token};

use super::error::AsmError;

/// Token supply and symbol resolution for the parser.
pub trait ExprContext {
    /// Next token with whitespace skipped.
    fn next_real_token(&mut self) -> Token;

    fn push_token(&mut self, token: Token);

    /// Address of the current line. Reports its own diagnostics.
    fn origin(&mut self) -> Expr;

    /// Value of a symbol. Undefined symbols report their own diagnostics
    /// and evaluate to zero.
    fn lookup(&mut self, name: &str) -> Expr;

    /// Whether every symbol has its final value, so a zero divisor is real.
    fn symbols_settled(&self) -> bool {
        true
    }
}

/// Parse one expression, leaving the terminating token unread.
pub fn parse_expression<C: ExprContext>(ctx: &mut C) -> Result<Expr, AsmError> {
    let token = ctx.next_real_token();
    let mut parser = ExprParser { ctx, token };
    let expr = parser.logical();
    let ExprParser { ctx, token } = parser;
    match expr {
        Ok(expr) => {
            ctx.push_token(token);
            Ok(expr)
        }
        Err(err) => {
            recover(ctx, token);
            Err(err)
        }
    }
}

/// Skip to the next comma or end of line so one bad operand yields one error.
fn recover<C: ExprContext>(ctx: &mut C, mut token: Token) {
    while !matches!(token, Token::Comma | Token::EndOfLine) {
        token = ctx.next_real_token();
    }
    ctx.push_token(token);
}

struct ExprParser<'a, C: ExprContext> {
    ctx: &'a mut C,
    token: Token,
}

impl<C: ExprContext> ExprParser<'_, C> {
    fn advance(&mut self) {
        self.token = self.ctx.next_real_token();
    }

    fn operator(&self) -> Option<Operator> {
        match self.token {
            Token::Operator(op) => Some(op),
            _ => None,
        }
    }

    /// Parse a left-associative level whose operators are mapped by `select`.
    fn level(
        &mut self,
        select: fn(Operator) -> Option<BinaryOp>,
        next: fn(&mut Self) -> Result<Expr, AsmError>,
    ) -> Result<Expr, AsmError> {
        let mut left = next(self)?;
        while let Some(op) = self.operator().and_then(select) {
            self.advance();
            let right = next(self)?;
            left = self.combine(op, left, right)?;
        }
        Ok(left)
    }

    fn combine(&self, op: BinaryOp, left: Expr, right: Expr) -> Result<Expr, AsmError> {
        if matches!(op, BinaryOp::Div | BinaryOp::Mod)
            && right == Expr::Value(0)
            && self.ctx.symbols_settled()
        {
            return Err(AsmError::DivisionByZero);
        }
        Ok(Expr::binary(op, left, right))
    }

    fn logical(&mut self) -> Result<Expr, AsmError> {
        self.level(
            |op| match op {
                Operator::LogicalAnd => Some(BinaryOp::LogicalAnd),
                Operator::LogicalOr => Some(BinaryOp::LogicalOr),
                _ => None,
            },
            Self::binary,
        )
    }

    fn binary(&mut self) -> Result<Expr, AsmError> {
        self.level(
            |op| match op {
                Operator::BitAnd => Some(BinaryOp::And),
                Operator::BitOr => Some(BinaryOp::Or),
                Operator::BitXor => Some(BinaryOp::Xor),
                _ => None,
            },
            Self::equality,
        )
    }

    fn equality(&mut self) -> Result<Expr, AsmError> {
        let left = self.inequality()?;
        let op = match self.operator() {
            Some(Operator::Eq) => BinaryOp::Eq,
            Some(Operator::Ne) => BinaryOp::Ne,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.equality()?;
        self.combine(op, left, right)
    }

    fn inequality(&mut self) -> Result<Expr, AsmError> {
        self.level(
            |op| match op {
                Operator::Lt => Some(BinaryOp::Lt),
                Operator::Le => Some(BinaryOp::Le),
                Operator::Gt => Some(BinaryOp::Gt),
                Operator::Ge => Some(BinaryOp::Ge),
                _ => None,
            },
            Self::shift,
        )
    }

    fn shift(&mut self) -> Result<Expr, AsmError> {
        self.level(
            |op| match op {
                Operator::Shl => Some(BinaryOp::Shl),
                Operator::Shr => Some(BinaryOp::Shr),
                _ => None,
            },
            Self::addsub,
        )
    }

    fn addsub(&mut self) -> Result<Expr, AsmError> {
        self.level(
            |op| match op {
                Operator::Plus => Some(BinaryOp::Add),
                Operator::Minus => Some(BinaryOp::Sub),
                _ => None,
            },
            Self::muldiv,
        )
    }

    fn muldiv(&mut self) -> Result<Expr, AsmError> {
        self.level(
            |op| match op {
                Operator::Times => Some(BinaryOp::Mul),
                Operator::Divide => Some(BinaryOp::Div),
                Operator::Modulo => Some(BinaryOp::Mod),
                _ => None,
            },
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Expr, AsmError> {
        let op = match &self.token {
            Token::Operator(Operator::Minus) => UnaryOp::Neg,
            Token::Operator(Operator::Plus) => UnaryOp::Plus,
            Token::Operator(Operator::Complement) => UnaryOp::Complement,
            Token::Operator(Operator::LogicalNot) => UnaryOp::LogicalNot,
            Token::Keyword(Keyword::Lo) => UnaryOp::Lo,
            Token::Keyword(Keyword::Hi) => UnaryOp::Hi,
            Token::Keyword(Keyword::Bank) => UnaryOp::Bank,
            _ => return self.value(),
        };
        self.advance();
        let operand = self.unary()?;
        Ok(Expr::unary(op, operand))
    }

    fn value(&mut self) -> Result<Expr, AsmError> {
        let expr = match &self.token {
            Token::Origin | Token::Operator(Operator::Times) => self.ctx.origin(),
            Token::Operator(Operator::LParen) => {
                self.advance();
                let inner = self.logical()?;
                if self.token != Token::Operator(Operator::RParen) {
                    return Err(AsmError::MissingParen);
                }
                inner
            }
            Token::Number { value, .. } => Expr::Value(*value),
            Token::Str(text) => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Expr::Value(i64::from(u32::from(c))),
                    _ => return Err(AsmError::InvalidExpression),
                }
            }
            Token::Symbol(name) => {
                let name = name.clone();
                self.ctx.lookup(&name)
            }
            _ => return Err(AsmError::InvalidExpression),
        };
        self.advance();
        Ok(expr)
    }
}
