//! Validator expression execution.
//!
//! User-supplied expressions run in a sandboxed, step-bounded interpreter
//! against row, file, or package scope. The only writable state is the
//! `ctx` accumulator table, shared by every validator within one scope
//! call, which is what makes uniqueness checks and cross-row totals work
//! without global state.

mod eval;
mod expr;

pub use eval::{Env, EvalError};
pub use expr::Program;

use std::collections::HashMap;

use crate::report::Severity;
use crate::value::{Table, Value};

/// Compile an expression to a runnable program.
pub fn compile(src: &str) -> Result<Program, String> {
    expr::parse_program(src)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Scope {
    Row,
    File,
    Package,
}

impl Scope {
    /// Hard step quota per expression run.
    pub fn quota(&self) -> usize {
        match self {
            Scope::Row => 1_000,
            Scope::File => 10_000,
            Scope::Package => 100_000,
        }
    }
}

/// One declared validator: an expression and a severity level. A bare
/// expression string defaults to error level.
#[derive(Debug, Clone)]
pub struct ValidatorSpec {
    pub expr: String,
    pub level: Severity,
}

impl ValidatorSpec {
    pub fn error(expr: impl Into<String>) -> Self {
        Self { expr: expr.into(), level: Severity::Error }
    }

    pub fn warn(expr: impl Into<String>) -> Self {
        Self { expr: expr.into(), level: Severity::Warning }
    }

    /// Build from a parsed manifest value: a raw expression string, or a
    /// table `{expr=..., level=...}`.
    pub fn from_value(v: &Value) -> Option<Self> {
        match v {
            Value::Str(s) => Some(Self::error(s.clone())),
            Value::Table(t) => {
                let expr = t.get(&Value::Str("expr".into()))?.as_str()?.to_string();
                let level = match t.get(&Value::Str("level".into())) {
                    Some(Value::Str(l)) => Severity::parse(l)?,
                    None => Severity::Error,
                    _ => return None,
                };
                Some(Self { expr, level })
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorFailure {
    pub index: usize,
    pub message: String,
    pub level: Severity,
}

/// Interpret an evaluation result: `true` or `""` pass; `false` or nil
/// fail with the default message; a non-empty string is the failure
/// message; anything else is an unexpected value.
fn interpret(result: &Value) -> Option<String> {
    match result {
        Value::Bool(true) => None,
        Value::Str(s) if s.is_empty() => None,
        Value::Bool(false) | Value::Nil => Some("validation failed".to_string()),
        Value::Str(s) => Some(s.clone()),
        _ => Some("unexpected value".to_string()),
    }
}

/// Run validators in order against one scope environment. The same `ctx`
/// is passed to every expression. The first error-level failure stops the
/// run; warning-level failures only accumulate.
pub fn run_scope(
    scope: Scope,
    validators: &[ValidatorSpec],
    vars: &HashMap<String, Value>,
    ctx: &mut Value,
) -> Vec<ValidatorFailure> {
    let mut failures = Vec::new();
    for (index, spec) in validators.iter().enumerate() {
        let message = match compile(&spec.expr) {
            Err(_) => Some("failed to compile".to_string()),
            Ok(program) => {
                let mut env = Env::new(vars, ctx, scope.quota());
                match eval::run(&program, &mut env) {
                    Ok(result) => interpret(&result),
                    Err(EvalError::Quota) => Some("quota exceeded".to_string()),
                    Err(EvalError::Runtime(_)) => Some("execution error".to_string()),
                }
            }
        };
        if let Some(message) = message {
            let level = spec.level;
            failures.push(ValidatorFailure { index, message, level });
            if level == Severity::Error {
                break;
            }
        }
    }
    failures
}

/// Environment for a row-scope run.
pub fn row_vars(row: Value, row_index: usize, file_name: &str) -> HashMap<String, Value> {
    let mut vars = HashMap::new();
    vars.insert("self".to_string(), row);
    vars.insert("rowIndex".to_string(), Value::Int(row_index as i64));
    vars.insert("fileName".to_string(), Value::Str(file_name.to_string()));
    vars
}

/// Environment for a file-scope run.
pub fn file_vars(rows: Value, file_name: &str) -> HashMap<String, Value> {
    let mut vars = HashMap::new();
    vars.insert("rows".to_string(), rows);
    vars.insert("fileName".to_string(), Value::Str(file_name.to_string()));
    vars
}

/// Environment for a package-scope run.
pub fn package_vars(files: Value, package_id: &str) -> HashMap<String, Value> {
    let mut vars = HashMap::new();
    vars.insert("files".to_string(), files);
    vars.insert("packageId".to_string(), Value::Str(package_id.to_string()));
    vars
}

/// Run a compiled restriction predicate against a single value. Used by
/// `validate`-column custom types; the value is exposed as `self`.
pub fn run_constraint(program: &Program, value: &Value) -> bool {
    let mut vars = HashMap::new();
    vars.insert("self".to_string(), value.clone());
    let mut ctx = Value::Table(Table::new());
    let mut env = Env::new(&vars, &mut ctx, Scope::Row.quota());
    match eval::run(program, &mut env) {
        Ok(result) => interpret(&result).is_none(),
        Err(_) => false,
    }
}
