//! Program analysis: two passes over the parsed statement sequence, no I/O.
//!
//! The label pass builds the label -> index map (duplicates are fatal); the
//! reference pass verifies every branch target, including targets buried in
//! a conditional's `then` arm. Analysis failures abort before execution —
//! a program is never partially loaded.

use core_program::{Program, Statement};
use std::collections::HashMap;
use thiserror::Error;

pub type LabelMap = HashMap<String, usize>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LabelError {
    #[error("line {line}: duplicate label: {name}")]
    Duplicate { name: String, line: usize },
    #[error("line {line}: undefined label: {name}")]
    Undefined { name: String, line: usize },
}

pub fn analyze(program: &Program) -> Result<LabelMap, LabelError> {
    let mut labels = LabelMap::new();
    for (index, stmt) in program.iter().enumerate() {
        if let Statement::Label { name } = stmt {
            if labels.insert(name.clone(), index).is_some() {
                return Err(LabelError::Duplicate {
                    name: name.clone(),
                    line: program.line_of(index),
                });
            }
        }
    }
    for (index, stmt) in program.iter().enumerate() {
        check_targets(stmt, program.line_of(index), &labels)?;
    }
    Ok(labels)
}

fn check_targets(stmt: &Statement, line: usize, labels: &LabelMap) -> Result<(), LabelError> {
    match stmt {
        Statement::Goto { label } | Statement::Gosub { label } => {
            if !labels.contains_key(label) {
                return Err(LabelError::Undefined {
                    name: label.clone(),
                    line,
                });
            }
            Ok(())
        }
        Statement::Cond { then, .. } => check_targets(then, line, labels),
        _ => Ok(()),
    }
}
