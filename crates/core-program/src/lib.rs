//! Program model for the OpenSBP runtime: statements, expressions, and the
//! immutable statement sequence produced by the parser.
//!
//! The parser emits exactly one `Statement` per source line (blank lines and
//! comment-only lines become `Statement::Comment`), so a program counter value
//! maps to source line `pc + 1`. The analyzer and engine rely on that
//! correspondence when reporting line numbers.

use std::fmt;

// -------------------------------------------------------------------------------------------------
// Mnemonics
// -------------------------------------------------------------------------------------------------

/// A two-letter OpenSBP command code, normalized to ASCII uppercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mnemonic([u8; 2]);

impl Mnemonic {
    /// Build a mnemonic from two ASCII characters, uppercasing as the dialect
    /// is case-insensitive.
    pub fn new(a: char, b: char) -> Self {
        Self([
            a.to_ascii_uppercase() as u8,
            b.to_ascii_uppercase() as u8,
        ])
    }

    /// Parse from a string that must be exactly two ASCII alphanumerics.
    pub fn parse(s: &str) -> Option<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some(a), Some(b), None) if a.is_ascii_alphanumeric() && b.is_ascii_alphanumeric() => {
                Some(Self::new(a, b))
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        // Constructed from ASCII only.
        std::str::from_utf8(&self.0).unwrap_or("??")
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -------------------------------------------------------------------------------------------------
// Expressions
// -------------------------------------------------------------------------------------------------

/// Binary operators of the expression grammar. `=` in source is accepted as
/// an alias for `==`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
        }
    }
}

/// Expression tree. Leaves are literals, user variables (`&name`), system
/// variables (`%(N)`), or raw tokens the expression grammar could not reduce
/// (bareword arguments such as the `T` in `CG,..,T,..`).
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    UserVar(String),
    SysVar(u32),
    Raw(String),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    /// Syntactic check for system-variable references anywhere in the tree.
    /// The stack-break classifier uses this; it must not evaluate anything.
    pub fn references_sysvar(&self) -> bool {
        match self {
            Expr::SysVar(_) => true,
            Expr::Binary { left, right, .. } => {
                left.references_sysvar() || right.references_sysvar()
            }
            Expr::Number(_) | Expr::UserVar(_) | Expr::Raw(_) => false,
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Statements
// -------------------------------------------------------------------------------------------------

/// One parsed source line.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Two-letter command with positional arguments. Empty argument slots
    /// (consecutive commas) are `None` and take the handler's default.
    Cmd {
        mnemonic: Mnemonic,
        args: Vec<Option<Expr>>,
    },
    /// `&name = expr`
    Assign { name: String, expr: Expr },
    /// `IF test THEN stmt` (single-statement conditional)
    Cond { test: Expr, then: Box<Statement> },
    Goto { label: String },
    Gosub { label: String },
    Return,
    End,
    Label { name: String },
    Comment { text: String },
    /// `PAUSE [expr]` — with an expression, a timed dwell; without, a no-op.
    Pause { expr: Option<Expr> },
}

impl Statement {
    /// True when any expression evaluated for this statement references a
    /// system variable.
    pub fn references_sysvar(&self) -> bool {
        match self {
            Statement::Cmd { args, .. } => {
                args.iter().flatten().any(Expr::references_sysvar)
            }
            Statement::Assign { expr, .. } => expr.references_sysvar(),
            Statement::Cond { test, then } => {
                test.references_sysvar() || then.references_sysvar()
            }
            Statement::Pause { expr } => {
                expr.as_ref().is_some_and(Expr::references_sysvar)
            }
            _ => false,
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Program
// -------------------------------------------------------------------------------------------------

/// A finite ordered statement sequence, immutable after parsing. Index `pc`
/// corresponds to source line `pc + 1`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    statements: Vec<Statement>,
}

impl Program {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn get(&self, pc: usize) -> Option<&Statement> {
        self.statements.get(pc)
    }

    /// 1-based source line of the statement at `pc`.
    pub fn line_of(&self, pc: usize) -> usize {
        pc + 1
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Statement> {
        self.statements.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mnemonic_normalizes_case() {
        assert_eq!(Mnemonic::parse("mx"), Mnemonic::parse("MX"));
        assert_eq!(Mnemonic::parse("Cg").unwrap().as_str(), "CG");
        assert_eq!(Mnemonic::parse("m2").unwrap().as_str(), "M2");
        assert!(Mnemonic::parse("M").is_none());
        assert!(Mnemonic::parse("MXY").is_none());
    }

    #[test]
    fn sysvar_detection_walks_nested_expressions() {
        let e = Expr::Binary {
            op: BinOp::Add,
            left: Box::new(Expr::Number(1.0)),
            right: Box::new(Expr::Binary {
                op: BinOp::Mul,
                left: Box::new(Expr::SysVar(1)),
                right: Box::new(Expr::UserVar("a".into())),
            }),
        };
        assert!(e.references_sysvar());
        assert!(!Expr::UserVar("a".into()).references_sysvar());
    }

    #[test]
    fn statement_sysvar_detection_covers_cond_arms() {
        let inner = Statement::Cmd {
            mnemonic: Mnemonic::parse("MX").unwrap(),
            args: vec![Some(Expr::SysVar(1))],
        };
        let cond = Statement::Cond {
            test: Expr::Number(1.0),
            then: Box::new(inner),
        };
        assert!(cond.references_sysvar());
    }

    #[test]
    fn empty_arg_slots_are_none() {
        let stmt = Statement::Cmd {
            mnemonic: Mnemonic::parse("M2").unwrap(),
            args: vec![None, Some(Expr::Number(3.0))],
        };
        assert!(!stmt.references_sysvar());
    }
}
