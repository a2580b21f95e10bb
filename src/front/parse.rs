//! The parser.
//!
//! Recursive descent with precedence climbing, grounded in the reference
//! implementation's statement/expression split: `parse_statement` mirrors
//! its statement-level dispatch, and the expression chain (`or` → `and` →
//! `equality` → `comparison` → `additive` → `multiplicative` → `unary` →
//! postfix indexing → atoms) mirrors its `ArithmeticParser`, corrected so
//! `<=` maps to `Lte` rather than `Gte`.

use std::fmt::Debug;

use derive_more::derive::Display;

use crate::common::Id;
use crate::value::Value;

use super::ast::{BinOp, Expr, ExprKind, MonOp, Program};
use super::lex::{Lexer, Token, TokenKind};

#[derive(Display)]
#[display("parse error: {_0}")]
pub struct ParseError(String);

impl Debug for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl std::error::Error for ParseError {}

/// Lex and parse a whole source file into a [`Program`].
pub fn parse(input: &str) -> Result<Program, ParseError> {
    log::debug!("parsing {} bytes of source", input.len());
    let tokens = Lexer::new(input)
        .tokenize()
        .map_err(|e| ParseError(e.to_string()))?;
    Parser::new(tokens).parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == Some(kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance().unwrap())
        } else {
            Err(self.unexpected(&format!("{kind:?}")))
        }
    }

    fn expect_ident(&mut self) -> Result<Id, ParseError> {
        match self.peek() {
            Some(TokenKind::Ident) => {
                let tok = self.advance().unwrap();
                Ok(Id::new(tok.text))
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.tokens.get(self.pos) {
            Some(tok) => ParseError(format!("expected {expected}, found {tok}")),
            None => ParseError(format!("expected {expected}, found end of input")),
        }
    }

    fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut items = Vec::new();
        while self.pos < self.tokens.len() {
            items.push(self.parse_statement()?);
        }
        Ok(Program { items })
    }

    fn parse_block(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(&TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            stmts.push(self.parse_statement()?);
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(stmts)
    }

    fn parse_statement(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some(TokenKind::Let) => self.parse_let(),
            Some(TokenKind::If) => self.parse_if(),
            Some(TokenKind::While) => self.parse_while(),
            Some(TokenKind::Function) => self.parse_function_def(),
            Some(TokenKind::Return) => self.parse_return(),
            Some(TokenKind::Ident) => self.parse_ident_statement(),
            _ => self.parse_expr_statement(),
        }
    }

    fn parse_let(&mut self) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::Let)?;
        let name = self.expect_ident()?;
        self.expect(&TokenKind::Assign)?;
        let right = self.parse_expression()?;
        self.expect(&TokenKind::Semi)?;
        Ok(Expr::new(ExprKind::Assign {
            name,
            right: Box::new(right),
            is_reassign: false,
        }))
    }

    /// `x = e;`, `x[i] = e;` (chainable), or `f(a, b);` as a statement.
    fn parse_ident_statement(&mut self) -> Result<Expr, ParseError> {
        let name = self.expect_ident()?;

        if self.check(&TokenKind::LParen) {
            self.advance();
            let args = self.parse_args()?;
            self.expect(&TokenKind::RParen)?;
            self.expect(&TokenKind::Semi)?;
            return Ok(Expr::new(ExprKind::FuncCall { name, args }));
        }

        let mut indices = Vec::new();
        while self.check(&TokenKind::LBracket) {
            self.advance();
            indices.push(self.parse_expression()?);
            self.expect(&TokenKind::RBracket)?;
        }

        self.expect(&TokenKind::Assign)?;
        let rhs = self.parse_expression()?;
        self.expect(&TokenKind::Semi)?;

        let right = if indices.is_empty() {
            rhs
        } else {
            desugar_list_assign(&name, &indices, rhs)
        };
        Ok(Expr::new(ExprKind::Assign {
            name,
            right: Box::new(right),
            is_reassign: true,
        }))
    }

    fn parse_if(&mut self) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::If)?;
        self.expect(&TokenKind::LParen)?;
        let cond = self.parse_expression()?;
        self.expect(&TokenKind::RParen)?;
        let then_body = self.parse_block()?;
        let else_body = if self.check(&TokenKind::Else) {
            self.advance();
            self.parse_block()?
        } else {
            Vec::new()
        };
        Ok(Expr::new(ExprKind::If {
            cond: Box::new(cond),
            then_body,
            else_body,
        }))
    }

    fn parse_while(&mut self) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::While)?;
        self.expect(&TokenKind::LParen)?;
        let cond = self.parse_expression()?;
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(Expr::new(ExprKind::While {
            cond: Box::new(cond),
            body,
        }))
    }

    fn parse_function_def(&mut self) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::Function)?;
        let name = self.expect_ident()?;
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                params.push(self.expect_ident()?);
                if self.check(&TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(Expr::new(ExprKind::FuncDef { name, params, body }))
    }

    fn parse_return(&mut self) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::Return)?;
        if self.check(&TokenKind::Semi) {
            self.advance();
            return Ok(Expr::new(ExprKind::Empty).returnable(true));
        }
        let e = self.parse_expression()?;
        self.expect(&TokenKind::Semi)?;
        Ok(e.returnable(true))
    }

    fn parse_expr_statement(&mut self) -> Result<Expr, ParseError> {
        let e = self.parse_expression()?;
        self.expect(&TokenKind::Semi)?;
        Ok(e)
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.check(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(args)
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.check(&TokenKind::OrOr) {
            self.advance();
            let right = self.parse_and()?;
            left = binary(BinOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_equality()?;
        while self.check(&TokenKind::AndAnd) {
            self.advance();
            let right = self.parse_equality()?;
            left = binary(BinOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::EqEq) => BinOp::Eq,
                Some(TokenKind::BangEq) => BinOp::Neq,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            // `<=` maps to `Lte`, not `Gte`.
            let op = match self.peek() {
                Some(TokenKind::Lt) => BinOp::Lt,
                Some(TokenKind::Lte) => BinOp::Lte,
                Some(TokenKind::Gt) => BinOp::Gt,
                Some(TokenKind::Gte) => BinOp::Gte,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Plus) => BinOp::Add,
                Some(TokenKind::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Star) => BinOp::Mul,
                Some(TokenKind::Slash) => BinOp::Div,
                Some(TokenKind::Percent) => BinOp::Mod,
                Some(TokenKind::Caret) => BinOp::Pow,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Some(TokenKind::Minus) => Some(MonOp::Neg),
            Some(TokenKind::Bang) => Some(MonOp::Not),
            Some(TokenKind::Size) => Some(MonOp::Size),
            Some(TokenKind::Print) => Some(MonOp::Print),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let right = self.parse_unary()?;
            return Ok(Expr::new(ExprKind::Monadic {
                op,
                right: Box::new(right),
            }));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut e = self.parse_atom()?;
        while self.check(&TokenKind::LBracket) {
            self.advance();
            let index = self.parse_expression()?;
            self.expect(&TokenKind::RBracket)?;
            e = Expr::new(ExprKind::ListAccess {
                collection: Box::new(e),
                index: Box::new(index),
            });
        }
        Ok(e)
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        match self.peek().cloned() {
            Some(TokenKind::Int(n)) => {
                self.advance();
                Ok(Expr::new(ExprKind::Const(Value::Int(n))))
            }
            Some(TokenKind::True) => {
                self.advance();
                Ok(Expr::new(ExprKind::Const(Value::Bool(true))))
            }
            Some(TokenKind::False) => {
                self.advance();
                Ok(Expr::new(ExprKind::Const(Value::Bool(false))))
            }
            Some(TokenKind::Str(s)) => {
                self.advance();
                Ok(Expr::new(ExprKind::Const(Value::String(s))))
            }
            Some(TokenKind::LBracket) => {
                self.advance();
                let mut elements = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    loop {
                        elements.push(self.parse_expression()?);
                        if self.check(&TokenKind::Comma) {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RBracket)?;
                Ok(Expr::new(ExprKind::ListLit { elements }))
            }
            Some(TokenKind::LParen) => {
                self.advance();
                let e = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                Ok(e)
            }
            Some(TokenKind::Ident) => {
                let tok = self.advance().unwrap();
                let name = Id::new(tok.text);
                if self.check(&TokenKind::LParen) {
                    self.advance();
                    let args = self.parse_args()?;
                    self.expect(&TokenKind::RParen)?;
                    Ok(Expr::new(ExprKind::FuncCall { name, args }))
                } else {
                    Ok(Expr::new(ExprKind::Var(name)))
                }
            }
            _ => Err(self.unexpected("an expression")),
        }
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::new(ExprKind::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

/// Desugar `name[i0][i1]...[ik] = value` into a single assignment whose RHS
/// is a chain of `ListModify` nodes wrapping `ListAccess` prefixes, exactly
/// as the reference parser builds it — each prefix index expression is
/// cloned once per enclosing level, which is why `Expr` needs a deep clone.
fn desugar_list_assign(name: &Id, indices: &[Expr], value: Expr) -> Expr {
    let depth = indices.len();
    let mut result = value;
    for level in (0..depth).rev() {
        let collection = access_chain(Expr::new(ExprKind::Var(name.clone())), &indices[..level]);
        result = Expr::new(ExprKind::ListModify {
            collection: Box::new(collection),
            index: Box::new(indices[level].clone()),
            value: Box::new(result),
        });
    }
    result
}

fn access_chain(base: Expr, indices: &[Expr]) -> Expr {
    indices.iter().fold(base, |acc, idx| {
        Expr::new(ExprKind::ListAccess {
            collection: Box::new(acc),
            index: Box::new(idx.clone()),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn let_and_reassign() {
        let prog = parse("let x = 3; x = x + 1;").unwrap();
        assert_eq!(prog.items.len(), 2);
        match &prog.items[0].kind {
            ExprKind::Assign { is_reassign, .. } => assert!(!is_reassign),
            other => panic!("wrong kind: {other:?}"),
        }
        match &prog.items[1].kind {
            ExprKind::Assign { is_reassign, .. } => assert!(*is_reassign),
            other => panic!("wrong kind: {other:?}"),
        }
    }

    #[test]
    fn comparison_maps_lte_correctly() {
        let prog = parse("let ok = n <= 1;").unwrap();
        let ExprKind::Assign { right, .. } = &prog.items[0].kind else {
            panic!("expected assign");
        };
        match &right.kind {
            ExprKind::Binary { op, .. } => assert_eq!(*op, BinOp::Lte),
            other => panic!("wrong kind: {other:?}"),
        }
    }

    #[test]
    fn chained_list_assign_desugars_to_nested_modify() {
        let prog = parse("arr[0][1] = 9;").unwrap();
        let ExprKind::Assign {
            right, is_reassign, ..
        } = &prog.items[0].kind
        else {
            panic!("expected assign");
        };
        assert!(*is_reassign);
        match &right.kind {
            ExprKind::ListModify { collection, .. } => match &collection.kind {
                ExprKind::ListAccess { .. } => {}
                other => panic!("expected inner ListAccess, got {other:?}"),
            },
            other => panic!("expected outer ListModify, got {other:?}"),
        }
    }

    #[test]
    fn precedence_respects_arithmetic() {
        let prog = parse("let r = 1 + 2 * 3;").unwrap();
        let ExprKind::Assign { right, .. } = &prog.items[0].kind else {
            panic!("expected assign");
        };
        match &right.kind {
            ExprKind::Binary {
                op: BinOp::Add,
                right: mul,
                ..
            } => match &mul.kind {
                ExprKind::Binary { op: BinOp::Mul, .. } => {}
                other => panic!("expected nested Mul, got {other:?}"),
            },
            other => panic!("expected outer Add, got {other:?}"),
        }
    }

    #[test]
    fn function_def_and_call() {
        let prog = parse("function add(a, b) { return a + b; } print(add(1, 2));").unwrap();
        match &prog.items[0].kind {
            ExprKind::FuncDef { params, body, .. } => {
                assert_eq!(params.len(), 2);
                assert!(body[0].returnable);
            }
            other => panic!("wrong kind: {other:?}"),
        }
    }

    #[test]
    fn bare_return_is_returnable_empty() {
        let prog = parse("function f() { return; }").unwrap();
        let ExprKind::FuncDef { body, .. } = &prog.items[0].kind else {
            panic!("expected funcdef");
        };
        assert!(body[0].returnable);
        assert_eq!(body[0].kind, ExprKind::Empty);
    }

    #[test]
    fn unexpected_token_is_reported() {
        let err = parse("let = 3;").unwrap_err();
        assert!(err.to_string().contains("identifier"));
    }
}
