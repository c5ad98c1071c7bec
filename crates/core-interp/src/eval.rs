//! Expression evaluator.
//!
//! Evaluation is eager, left-to-right, recursive. Values are IEEE-754
//! doubles plus the raw-text strings the parser preserves for legacy
//! idioms; strings coerce to numbers on demand and fail loudly when they
//! cannot. Booleans from comparisons are 1/0 in numeric context.
//!
//! A system-variable read is observable: it flips a flag on the (transient)
//! evaluation context, which the engine folds into its bookkeeping. The
//! stack-break classifier never evaluates, so it stays pure.

use crate::status::MachineStatus;
use crate::sysvar;
use core_config::DriveSettings;
use core_program::{BinOp, Expr};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("unknown system variable %({0})")]
    UnknownSysVar(u32),
    #[error("undefined user variable &{0}")]
    UndefinedVar(String),
    #[error("division by zero")]
    DivideByZero,
    #[error("not a number: {0:?}")]
    NotNumeric(String),
}

/// A runtime value: a number, or raw text carried through from source.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Num(f64),
    Str(String),
}

impl Value {
    /// Numeric coercion. Raw text that parses as a number passes through;
    /// anything else is an error.
    pub fn as_number(&self) -> Result<f64, EvalError> {
        match self {
            Value::Num(n) => Ok(*n),
            Value::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| EvalError::NotNumeric(s.clone())),
        }
    }

    /// Condition truth: nonzero numbers and nonempty strings.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Num(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Num(if b { 1.0 } else { 0.0 })
    }
}

/// Transient evaluation context: bindings plus the sysvar-read flag.
pub struct EvalContext<'a> {
    vars: &'a HashMap<String, Value>,
    status: &'a MachineStatus,
    settings: &'a DriveSettings,
    sysvar_read: bool,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        vars: &'a HashMap<String, Value>,
        status: &'a MachineStatus,
        settings: &'a DriveSettings,
    ) -> Self {
        Self {
            vars,
            status,
            settings,
            sysvar_read: false,
        }
    }

    /// True once any system variable was read through this context.
    pub fn sysvar_read(&self) -> bool {
        self.sysvar_read
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Number(n) => Ok(Value::Num(*n)),
            Expr::Raw(s) => Ok(Value::Str(s.clone())),
            Expr::UserVar(name) => self
                .vars
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::UndefinedVar(name.clone())),
            Expr::SysVar(sel) => {
                let v = sysvar::resolve(*sel, self.status, self.settings)?;
                self.sysvar_read = true;
                Ok(Value::Num(v))
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                apply(*op, l, r)
            }
        }
    }
}

fn apply(op: BinOp, l: Value, r: Value) -> Result<Value, EvalError> {
    match op {
        BinOp::Add => Ok(Value::Num(l.as_number()? + r.as_number()?)),
        BinOp::Sub => Ok(Value::Num(l.as_number()? - r.as_number()?)),
        BinOp::Mul => Ok(Value::Num(l.as_number()? * r.as_number()?)),
        BinOp::Div => {
            let d = r.as_number()?;
            if d == 0.0 {
                return Err(EvalError::DivideByZero);
            }
            Ok(Value::Num(l.as_number()? / d))
        }
        BinOp::Lt => Ok(Value::from(l.as_number()? < r.as_number()?)),
        BinOp::Gt => Ok(Value::from(l.as_number()? > r.as_number()?)),
        BinOp::Le => Ok(Value::from(l.as_number()? <= r.as_number()?)),
        BinOp::Ge => Ok(Value::from(l.as_number()? >= r.as_number()?)),
        // Equality compares text when both sides are text, numbers otherwise.
        BinOp::Eq => match (&l, &r) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::from(a.eq_ignore_ascii_case(b))),
            _ => Ok(Value::from(l.as_number()? == r.as_number()?)),
        },
        BinOp::Ne => match (&l, &r) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::from(!a.eq_ignore_ascii_case(b))),
            _ => Ok(Value::from(l.as_number()? != r.as_number()?)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_fixtures() -> (HashMap<String, Value>, MachineStatus, DriveSettings) {
        let mut vars = HashMap::new();
        vars.insert("a".to_string(), Value::Num(2.0));
        vars.insert("b".to_string(), Value::Num(3.0));
        let status = MachineStatus {
            posx: 7.5,
            ..MachineStatus::default()
        };
        (vars, status, DriveSettings::default())
    }

    fn eval_str(src: &str) -> Result<Value, EvalError> {
        let (vars, status, settings) = ctx_fixtures();
        let expr = core_parse::expr::parse_expression(src).unwrap();
        let mut cx = EvalContext::new(&vars, &status, &settings);
        cx.eval(&expr)
    }

    #[test]
    fn arithmetic_and_variables() {
        assert_eq!(eval_str("&a+&b").unwrap(), Value::Num(5.0));
        assert_eq!(eval_str("&a*&b-1").unwrap(), Value::Num(5.0));
        assert_eq!(eval_str("6/&b").unwrap(), Value::Num(2.0));
    }

    #[test]
    fn comparisons_yield_unit_numbers() {
        assert_eq!(eval_str("&a < &b").unwrap(), Value::Num(1.0));
        assert_eq!(eval_str("&a >= &b").unwrap(), Value::Num(0.0));
        assert_eq!(eval_str("&a = 2").unwrap(), Value::Num(1.0));
        assert_eq!(eval_str("&a != 2").unwrap(), Value::Num(0.0));
    }

    #[test]
    fn sysvar_read_sets_flag() {
        let (vars, status, settings) = ctx_fixtures();
        let expr = core_parse::expr::parse_expression("%(1)+1").unwrap();
        let mut cx = EvalContext::new(&vars, &status, &settings);
        assert_eq!(cx.eval(&expr).unwrap(), Value::Num(8.5));
        assert!(cx.sysvar_read());
    }

    #[test]
    fn flag_stays_clear_without_sysvars() {
        let (vars, status, settings) = ctx_fixtures();
        let expr = core_parse::expr::parse_expression("&a+1").unwrap();
        let mut cx = EvalContext::new(&vars, &status, &settings);
        cx.eval(&expr).unwrap();
        assert!(!cx.sysvar_read());
    }

    #[test]
    fn error_cases() {
        assert_eq!(
            eval_str("&missing"),
            Err(EvalError::UndefinedVar("missing".into()))
        );
        assert_eq!(eval_str("1/0"), Err(EvalError::DivideByZero));
        assert_eq!(eval_str("%(9)"), Err(EvalError::UnknownSysVar(9)));
    }

    #[test]
    fn raw_text_coerces_when_numeric() {
        assert_eq!(Value::Str(" 4.5 ".into()).as_number().unwrap(), 4.5);
        assert!(Value::Str("T".into()).as_number().is_err());
    }

    #[test]
    fn truthiness() {
        assert!(Value::Num(-1.0).truthy());
        assert!(!Value::Num(0.0).truthy());
        assert!(Value::Str("T".into()).truthy());
        assert!(!Value::Str("".into()).truthy());
    }
}
