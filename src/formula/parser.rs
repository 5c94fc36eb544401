//! Recursive-descent parser from tokens to [`Expr`].
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! cond    := logic ("if" logic "else" cond)?
//! logic   := compare (("&" | "|") compare)*
//! compare := add (("<" | ">" | "<=" | ">=" | "==" | "!=") add)?
//! add     := mul (("+" | "-") mul)*
//! mul     := unary (("*" | "/" | "%") unary)*
//! unary   := "-" unary | primary
//! primary := NUM | SYM | SYM "(" args ")" | "(" cond ")"
//! ```

use super::ast::{BinOp, Expr, Sigil};
use super::lexer::{tokenize, Spanned, Token};
use crate::utils::error::FormulaError;

/// Parse formula text into an expression tree
///
/// **Public** - main entry point for the formula grammar
///
/// # Errors
/// * `FormulaError::UnexpectedChar` - text contains a character outside the grammar
/// * `FormulaError::UnexpectedToken` - tokens in an invalid order
/// * `FormulaError::UnexpectedEnd` - formula is truncated
pub fn parse_formula(text: &str) -> Result<Expr, FormulaError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.cond()?;

    match parser.tokens.get(parser.pos) {
        None => Ok(expr),
        Some(extra) => Err(unexpected(extra)),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

fn unexpected(spanned: &Spanned) -> FormulaError {
    FormulaError::UnexpectedToken {
        token: spanned.token.describe(),
        offset: spanned.offset,
    }
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn bump(&mut self) -> Option<Spanned> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, wanted: Token) -> Result<(), FormulaError> {
        match self.bump() {
            Some(s) if s.token == wanted => Ok(()),
            Some(s) => Err(unexpected(&s)),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }

    fn cond(&mut self) -> Result<Expr, FormulaError> {
        let then = self.logic()?;
        if self.peek() != Some(&Token::If) {
            return Ok(then);
        }
        self.pos += 1;
        let cond = self.logic()?;
        self.expect(Token::Else)?;
        let otherwise = self.cond()?;

        Ok(Expr::Cond {
            then: Box::new(then),
            cond: Box::new(cond),
            otherwise: Box::new(otherwise),
        })
    }

    fn logic(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.compare()?;
        loop {
            let op = match self.peek() {
                Some(Token::And) => BinOp::And,
                Some(Token::Or) => BinOp::Or,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.compare()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn compare(&mut self) -> Result<Expr, FormulaError> {
        let lhs = self.add()?;
        let op = match self.peek() {
            Some(Token::Lt) => BinOp::Lt,
            Some(Token::Gt) => BinOp::Gt,
            Some(Token::Le) => BinOp::Le,
            Some(Token::Ge) => BinOp::Ge,
            Some(Token::EqEq) => BinOp::Eq,
            Some(Token::Ne) => BinOp::Ne,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.add()?;
        Ok(Expr::binary(op, lhs, rhs))
    }

    fn add(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.mul()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.mul()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn mul(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Mod,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        let spanned = self.bump().ok_or(FormulaError::UnexpectedEnd)?;

        match spanned.token {
            Token::Num(text) => Ok(Expr::Num(text)),
            Token::LParen => {
                let inner = self.cond()?;
                self.expect(Token::RParen)?;
                Ok(Expr::paren(inner))
            }
            Token::Sym(sym) => {
                let callable = sym.sigil == Sigil::Bare && !sym.is_qualified();
                if callable && self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let args = self.args()?;
                    return Ok(Expr::Call {
                        func: sym.name,
                        args,
                    });
                }
                Ok(Expr::Symbol(sym))
            }
            _ => Err(unexpected(&spanned)),
        }
    }

    fn args(&mut self) -> Result<Vec<Expr>, FormulaError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.cond()?);
            match self.bump() {
                Some(Spanned {
                    token: Token::Comma,
                    ..
                }) => continue,
                Some(Spanned {
                    token: Token::RParen,
                    ..
                }) => return Ok(args),
                Some(other) => return Err(unexpected(&other)),
                None => return Err(FormulaError::UnexpectedEnd),
            }
        }
    }
}
