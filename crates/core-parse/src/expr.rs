//! Expression grammar: a small lexer plus precedence-climbing parser.
//!
//! Grammar, lowest precedence first: comparison (`<` `>` `<=` `>=` `==` `!=`,
//! with `=` accepted as `==`), additive, multiplicative, signed primary.
//! Leaves are numeric literals, user variables (`&name`), system variables
//! (`%(N)`), parenthesized expressions, and bare identifiers which survive
//! as `Expr::Raw` tokens (e.g. the `T` cutter-compensation argument).

use core_program::{BinOp, Expr};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct ExprError(pub String);

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ExprError {}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Ident(String),
    UserVar(String),
    SysVar(u32),
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    Slash,
    Lt,
    Gt,
    Le,
    Ge,
    EqEq,
    Ne,
}

fn err(msg: impl Into<String>) -> ExprError {
    ExprError(msg.into())
}

fn lex(input: &str) -> Result<Vec<Tok>, ExprError> {
    let mut toks = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut lit = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        lit.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n: f64 = lit
                    .parse()
                    .map_err(|_| err(format!("bad number literal: {lit}")))?;
                toks.push(Tok::Num(n));
            }
            '&' => {
                chars.next();
                let name = lex_ident(&mut chars);
                if name.is_empty() {
                    return Err(err("'&' without a variable name"));
                }
                toks.push(Tok::UserVar(name.to_lowercase()));
            }
            '%' => {
                chars.next();
                if chars.next() != Some('(') {
                    return Err(err("'%' must be followed by '(selector)'"));
                }
                let mut digits = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        digits.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if chars.next() != Some(')') {
                    return Err(err("unterminated system-variable selector"));
                }
                let sel: u32 = digits
                    .parse()
                    .map_err(|_| err("empty system-variable selector"))?;
                toks.push(Tok::SysVar(sel));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let name = lex_ident(&mut chars);
                toks.push(Tok::Ident(name));
            }
            '(' => {
                chars.next();
                toks.push(Tok::LParen);
            }
            ')' => {
                chars.next();
                toks.push(Tok::RParen);
            }
            '+' => {
                chars.next();
                toks.push(Tok::Plus);
            }
            '-' => {
                chars.next();
                toks.push(Tok::Minus);
            }
            '*' => {
                chars.next();
                toks.push(Tok::Star);
            }
            '/' => {
                chars.next();
                toks.push(Tok::Slash);
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    toks.push(Tok::Le);
                } else {
                    toks.push(Tok::Lt);
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    toks.push(Tok::Ge);
                } else {
                    toks.push(Tok::Gt);
                }
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                }
                // Single '=' is the legacy equality spelling.
                toks.push(Tok::EqEq);
            }
            '!' => {
                chars.next();
                if chars.next() != Some('=') {
                    return Err(err("'!' must be followed by '='"));
                }
                toks.push(Tok::Ne);
            }
            other => return Err(err(format!("unexpected character: {other}"))),
        }
    }
    Ok(toks)
}

fn lex_ident(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut name = String::new();
    while let Some(&d) = chars.peek() {
        if d.is_ascii_alphanumeric() || d == '_' {
            name.push(d);
            chars.next();
        } else {
            break;
        }
    }
    name
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn bump(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn comparison(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.additive()?;
        while let Some(op) = match self.peek() {
            Some(Tok::Lt) => Some(BinOp::Lt),
            Some(Tok::Gt) => Some(BinOp::Gt),
            Some(Tok::Le) => Some(BinOp::Le),
            Some(Tok::Ge) => Some(BinOp::Ge),
            Some(Tok::EqEq) => Some(BinOp::Eq),
            Some(Tok::Ne) => Some(BinOp::Ne),
            _ => None,
        } {
            self.bump();
            let right = self.additive()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.multiplicative()?;
        while let Some(op) = match self.peek() {
            Some(Tok::Plus) => Some(BinOp::Add),
            Some(Tok::Minus) => Some(BinOp::Sub),
            _ => None,
        } {
            self.bump();
            let right = self.multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.primary()?;
        while let Some(op) = match self.peek() {
            Some(Tok::Star) => Some(BinOp::Mul),
            Some(Tok::Slash) => Some(BinOp::Div),
            _ => None,
        } {
            self.bump();
            let right = self.primary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        match self.bump() {
            Some(Tok::Num(n)) => Ok(Expr::Number(n)),
            Some(Tok::UserVar(name)) => Ok(Expr::UserVar(name)),
            Some(Tok::SysVar(sel)) => Ok(Expr::SysVar(sel)),
            Some(Tok::Ident(name)) => Ok(Expr::Raw(name)),
            Some(Tok::LParen) => {
                let inner = self.comparison()?;
                match self.bump() {
                    Some(Tok::RParen) => Ok(inner),
                    _ => Err(err("missing closing parenthesis")),
                }
            }
            // Sign folds into a numeric literal so the fast path and the
            // grammar agree on `-5`; anything else becomes `0 - expr`.
            Some(Tok::Minus) => match self.peek() {
                Some(Tok::Num(n)) => {
                    let n = *n;
                    self.bump();
                    Ok(Expr::Number(-n))
                }
                _ => {
                    let operand = self.primary()?;
                    Ok(Expr::Binary {
                        op: BinOp::Sub,
                        left: Box::new(Expr::Number(0.0)),
                        right: Box::new(operand),
                    })
                }
            },
            Some(Tok::Plus) => self.primary(),
            Some(other) => Err(err(format!("unexpected token: {other:?}"))),
            None => Err(err("empty expression")),
        }
    }
}

/// Parse a complete expression; trailing tokens are an error so callers can
/// fall back to a raw-text leaf for legacy idioms.
pub fn parse_expression(input: &str) -> Result<Expr, ExprError> {
    let toks = lex(input)?;
    if toks.is_empty() {
        return Err(err("empty expression"));
    }
    let mut p = Parser { toks, pos: 0 };
    let e = p.comparison()?;
    if p.pos != p.toks.len() {
        return Err(err(format!(
            "trailing input after expression: {:?}",
            &p.toks[p.pos..]
        )));
    }
    Ok(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bin(op: BinOp, l: Expr, r: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(l),
            right: Box::new(r),
        }
    }

    #[test]
    fn precedence_mul_over_add() {
        let e = parse_expression("1+2*3").unwrap();
        assert_eq!(
            e,
            bin(
                BinOp::Add,
                Expr::Number(1.0),
                bin(BinOp::Mul, Expr::Number(2.0), Expr::Number(3.0)),
            )
        );
    }

    #[test]
    fn comparison_binds_loosest() {
        let e = parse_expression("&a+1 > 2*2").unwrap();
        match e {
            Expr::Binary { op: BinOp::Gt, .. } => {}
            other => panic!("expected Gt at root, got {other:?}"),
        }
    }

    #[test]
    fn single_equals_is_equality() {
        assert_eq!(parse_expression("&a = 1"), parse_expression("&a == 1"));
    }

    #[test]
    fn signed_literal_folds() {
        assert_eq!(parse_expression("-5").unwrap(), Expr::Number(-5.0));
        assert_eq!(parse_expression("+5").unwrap(), Expr::Number(5.0));
        assert_eq!(parse_expression("-0.25").unwrap(), Expr::Number(-0.25));
    }

    #[test]
    fn negated_variable_subtracts_from_zero() {
        let e = parse_expression("-&a").unwrap();
        assert_eq!(
            e,
            bin(BinOp::Sub, Expr::Number(0.0), Expr::UserVar("a".into()))
        );
    }

    #[test]
    fn sysvar_selector() {
        assert_eq!(parse_expression("%(71)").unwrap(), Expr::SysVar(71));
        assert!(parse_expression("%(").is_err());
        assert!(parse_expression("%(x)").is_err());
    }

    #[test]
    fn bareword_is_raw() {
        assert_eq!(parse_expression("T").unwrap(), Expr::Raw("T".into()));
    }

    #[test]
    fn user_var_names_fold_case() {
        assert_eq!(parse_expression("&Foo"), parse_expression("&foo"));
    }

    #[test]
    fn parens_override() {
        let e = parse_expression("(1+2)*3").unwrap();
        match e {
            Expr::Binary { op: BinOp::Mul, .. } => {}
            other => panic!("expected Mul at root, got {other:?}"),
        }
    }

    #[test]
    fn trailing_tokens_rejected() {
        assert!(parse_expression("1 2").is_err());
        assert!(parse_expression("part file").is_err());
    }
}
