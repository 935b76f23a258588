//! Interpreter for compiled validator programs.
//!
//! Evaluation is step-bounded: every node costs one step and exhausting
//! the quota aborts the run. The environment is read-only except for the
//! `ctx` accumulator table; function calls resolve against a fixed
//! allow-list keyed by dotted path.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::expr::{BinOp, Expr, Program, Stmt, UnOp};
use crate::value::{self, Table, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    Quota,
    Runtime(String),
}

impl EvalError {
    fn runtime(msg: impl Into<String>) -> Self {
        EvalError::Runtime(msg.into())
    }
}

pub struct Env<'a> {
    /// Scope variables: `self`, `rows`, `files`, `rowIndex`, `fileName`,
    /// `packageId`. Never mutated by expressions.
    pub vars: &'a HashMap<String, Value>,
    /// The writable accumulator, shared across validators in one scope run.
    pub ctx: &'a mut Value,
    steps: usize,
}

impl<'a> Env<'a> {
    pub fn new(vars: &'a HashMap<String, Value>, ctx: &'a mut Value, quota: usize) -> Self {
        Self { vars, ctx, steps: quota }
    }

    fn step(&mut self) -> Result<(), EvalError> {
        if self.steps == 0 {
            return Err(EvalError::Quota);
        }
        self.steps -= 1;
        Ok(())
    }
}

enum Flow {
    Normal(Value),
    Return(Value),
}

/// Run a program to its result value: an explicit `return`, or the value
/// of the last bare expression statement.
pub fn run(program: &Program, env: &mut Env<'_>) -> Result<Value, EvalError> {
    match exec_block(&program.stmts, env)? {
        Flow::Return(v) | Flow::Normal(v) => Ok(v),
    }
}

fn exec_block(stmts: &[Stmt], env: &mut Env<'_>) -> Result<Flow, EvalError> {
    let mut last = Value::Nil;
    for stmt in stmts {
        match exec_stmt(stmt, env)? {
            Flow::Return(v) => return Ok(Flow::Return(v)),
            Flow::Normal(v) => last = v,
        }
    }
    Ok(Flow::Normal(last))
}

fn exec_stmt(stmt: &Stmt, env: &mut Env<'_>) -> Result<Flow, EvalError> {
    env.step()?;
    match stmt {
        Stmt::Return(expr) => {
            let v = match expr {
                Some(e) => eval(e, env)?,
                None => Value::Nil,
            };
            Ok(Flow::Return(v))
        }
        Stmt::Expr(expr) => Ok(Flow::Normal(eval(expr, env)?)),
        Stmt::Assign(target, rhs) => {
            let v = eval(rhs, env)?;
            assign(target, v, env)?;
            Ok(Flow::Normal(Value::Nil))
        }
        Stmt::If { arms, else_body } => {
            for (cond, body) in arms {
                if eval(cond, env)?.truthy() {
                    return exec_block(body, env);
                }
            }
            match else_body {
                Some(body) => exec_block(body, env),
                None => Ok(Flow::Normal(Value::Nil)),
            }
        }
    }
}

/// Only paths rooted at `ctx` are writable.
fn assign(target: &Expr, v: Value, env: &mut Env<'_>) -> Result<(), EvalError> {
    // Collect the index path down to the root identifier.
    let mut keys: Vec<Value> = Vec::new();
    let mut cursor = target;
    loop {
        match cursor {
            Expr::Ident(name) => {
                if name != "ctx" {
                    return Err(EvalError::runtime(format!("'{name}' is read-only")));
                }
                break;
            }
            Expr::Index(base, key) => {
                keys.push(eval_key(key, env)?);
                cursor = base;
            }
            _ => return Err(EvalError::runtime("bad assignment target")),
        }
    }
    keys.reverse();
    if keys.is_empty() {
        return Err(EvalError::runtime("cannot replace ctx itself"));
    }
    if !matches!(&*env.ctx, Value::Table(_)) {
        *env.ctx = Value::Table(Table::new());
    }
    let mut slot: &mut Value = &mut *env.ctx;
    for key in &keys[..keys.len() - 1] {
        let table = match slot {
            Value::Table(t) => t,
            _ => return Err(EvalError::runtime("indexing a non-table in ctx")),
        };
        if table.get(key).is_none() {
            table.set(key.clone(), Value::Table(Table::new()));
        }
        let idx = table
            .entries
            .iter()
            .position(|(k, _)| value::compare(k, key) == Ordering::Equal)
            .ok_or_else(|| EvalError::runtime("indexing a non-table in ctx"))?;
        slot = &mut table.entries[idx].1;
    }
    let table = match slot {
        Value::Table(t) => t,
        _ => return Err(EvalError::runtime("indexing a non-table in ctx")),
    };
    let last = keys.last().cloned().unwrap_or(Value::Nil);
    table.set(last, v);
    Ok(())
}

fn eval_key(key: &Expr, env: &mut Env<'_>) -> Result<Value, EvalError> {
    let k = eval(key, env)?;
    if matches!(k, Value::Nil) {
        return Err(EvalError::runtime("nil index"));
    }
    Ok(k)
}

fn eval(expr: &Expr, env: &mut Env<'_>) -> Result<Value, EvalError> {
    env.step()?;
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Ident(name) => {
            if name == "ctx" {
                return Ok(env.ctx.clone());
            }
            match env.vars.get(name) {
                Some(v) => Ok(v.clone()),
                None => Ok(Value::Nil),
            }
        }
        Expr::Index(base, key) => {
            let b = eval(base, env)?;
            let k = eval(key, env)?;
            match (&b, &k) {
                (Value::Table(t), _) => {
                    if let Value::Int(i) = k {
                        // 1-based positional access reaches the seq part.
                        if i >= 1 && (i as usize) <= t.seq.len() {
                            return Ok(t.seq[i as usize - 1].clone());
                        }
                    }
                    Ok(t.get(&k).cloned().unwrap_or(Value::Nil))
                }
                (Value::Nil, _) => Err(EvalError::runtime("indexing a nil value")),
                _ => Err(EvalError::runtime("indexing a non-table value")),
            }
        }
        Expr::Call(callee, args) => {
            let Some(path) = call_path(callee) else {
                return Err(EvalError::runtime("only named functions can be called"));
            };
            let mut evaluated = Vec::with_capacity(args.len());
            for a in args {
                evaluated.push(eval(a, env)?);
            }
            call_builtin(&path, &evaluated)
        }
        Expr::Unary(op, inner) => {
            let v = eval(inner, env)?;
            match op {
                UnOp::Not => Ok(Value::Bool(!v.truthy())),
                UnOp::Neg => match v {
                    Value::Int(i) => Ok(Value::Int(-i)),
                    Value::Float(f) => Ok(Value::Float(-f)),
                    _ => Err(EvalError::runtime("negating a non-number")),
                },
            }
        }
        Expr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, env),
        Expr::TableCtor(items) => {
            let mut t = Table::new();
            for (key, value_expr) in items {
                let v = eval(value_expr, env)?;
                match key {
                    Some(k) => {
                        let k = eval_key(k, env)?;
                        t.set(k, v);
                    }
                    None => t.seq.push(v),
                }
            }
            Ok(Value::Table(t))
        }
    }
}

fn eval_binary(op: BinOp, lhs: &Expr, rhs: &Expr, env: &mut Env<'_>) -> Result<Value, EvalError> {
    // Short-circuit forms first.
    match op {
        BinOp::And => {
            let l = eval(lhs, env)?;
            return if l.truthy() { eval(rhs, env) } else { Ok(l) };
        }
        BinOp::Or => {
            let l = eval(lhs, env)?;
            return if l.truthy() { Ok(l) } else { eval(rhs, env) };
        }
        _ => {}
    }
    let l = eval(lhs, env)?;
    let r = eval(rhs, env)?;
    match op {
        BinOp::Eq => Ok(Value::Bool(value::compare(&l, &r) == Ordering::Equal)),
        BinOp::Ne => Ok(Value::Bool(value::compare(&l, &r) != Ordering::Equal)),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ord = comparable(&l, &r)?;
            Ok(Value::Bool(match op {
                BinOp::Lt => ord == Ordering::Less,
                BinOp::Le => ord != Ordering::Greater,
                BinOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            }))
        }
        BinOp::Concat => {
            let ls = concat_text(&l)?;
            let rs = concat_text(&r)?;
            Ok(Value::Str(format!("{ls}{rs}")))
        }
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => arith(op, &l, &r),
        BinOp::And | BinOp::Or | BinOp::Eq | BinOp::Ne => unreachable!(),
    }
}

fn comparable(l: &Value, r: &Value) -> Result<Ordering, EvalError> {
    match (l, r) {
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_))
        | (Value::Str(_), Value::Str(_)) => Ok(value::compare(l, r)),
        _ => Err(EvalError::runtime("comparing incompatible values")),
    }
}

fn concat_text(v: &Value) -> Result<String, EvalError> {
    match v {
        Value::Str(s) => Ok(s.clone()),
        Value::Int(_) | Value::Float(_) => Ok(value::to_plain_number(v)),
        _ => Err(EvalError::runtime("concatenating a non-string value")),
    }
}

fn arith(op: BinOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => {
            let a = *a;
            let b = *b;
            Ok(match op {
                BinOp::Add => Value::Int(a.wrapping_add(b)),
                BinOp::Sub => Value::Int(a.wrapping_sub(b)),
                BinOp::Mul => Value::Int(a.wrapping_mul(b)),
                BinOp::Div => {
                    if b == 0 {
                        return Err(EvalError::runtime("division by zero"));
                    }
                    if a % b == 0 { Value::Int(a / b) } else { Value::Float(a as f64 / b as f64) }
                }
                BinOp::Mod => {
                    if b == 0 {
                        return Err(EvalError::runtime("division by zero"));
                    }
                    Value::Int(a.rem_euclid(b))
                }
                _ => unreachable!(),
            })
        }
        _ => {
            let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) else {
                return Err(EvalError::runtime("arithmetic on a non-number"));
            };
            Ok(Value::Float(match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => a / b,
                BinOp::Mod => a.rem_euclid(b),
                _ => unreachable!(),
            }))
        }
    }
}

/// Flatten `predicates.is_name`-style callee expressions to a dotted path.
fn call_path(callee: &Expr) -> Option<String> {
    match callee {
        Expr::Ident(name) => Some(name.clone()),
        Expr::Index(base, key) => {
            let base_path = call_path(base)?;
            match key.as_ref() {
                Expr::Literal(Value::Str(s)) => Some(format!("{base_path}.{s}")),
                _ => None,
            }
        }
        _ => None,
    }
}

fn expect_str(args: &[Value], i: usize) -> Result<&str, EvalError> {
    args.get(i)
        .and_then(|v| v.as_str())
        .ok_or_else(|| EvalError::runtime("expected a string argument"))
}

fn expect_num(args: &[Value], i: usize) -> Result<f64, EvalError> {
    args.get(i)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| EvalError::runtime("expected a number argument"))
}

fn call_builtin(path: &str, args: &[Value]) -> Result<Value, EvalError> {
    use crate::predicates;
    match path {
        "type" => Ok(Value::Str(
            args.first().unwrap_or(&Value::Nil).type_name().to_string(),
        )),
        "count" => match args.first() {
            Some(Value::Table(t)) => Ok(Value::Int((t.seq.len() + t.entries.len()) as i64)),
            Some(Value::Nil) | None => Ok(Value::Int(0)),
            _ => Err(EvalError::runtime("count expects a table")),
        },
        "sum" => match args.first() {
            Some(Value::Table(t)) => {
                let mut total = 0.0;
                let mut all_int = true;
                for v in t.seq.iter().chain(t.entries.iter().map(|(_, v)| v)) {
                    match v {
                        Value::Int(i) => total += *i as f64,
                        Value::Float(f) => {
                            all_int = false;
                            total += f;
                        }
                        Value::Nil => {}
                        _ => return Err(EvalError::runtime("sum expects numbers")),
                    }
                }
                if all_int && total.abs() < 9.2e18 {
                    Ok(Value::Int(total as i64))
                } else {
                    Ok(Value::Float(total))
                }
            }
            Some(Value::Nil) | None => Ok(Value::Int(0)),
            _ => Err(EvalError::runtime("sum expects a table")),
        },
        // predicate namespace
        "predicates.is_name" => Ok(Value::Bool(predicates::is_name(expect_str(args, 0)?))),
        "predicates.is_identifier" => {
            Ok(Value::Bool(predicates::is_identifier(expect_str(args, 0)?)))
        }
        "predicates.is_integer_value" => {
            Ok(Value::Bool(predicates::is_integer_value(expect_str(args, 0)?)))
        }
        "predicates.is_percent" => Ok(Value::Bool(predicates::is_percent(expect_str(args, 0)?))),
        "predicates.is_http_url" => Ok(Value::Bool(predicates::is_http_url(expect_str(args, 0)?))),
        "predicates.is_filename" => Ok(Value::Bool(predicates::is_filename(expect_str(args, 0)?))),
        "predicates.is_version" => Ok(Value::Bool(predicates::is_version(expect_str(args, 0)?))),
        // stringUtils namespace
        "stringUtils.trim" => Ok(Value::Str(expect_str(args, 0)?.trim().to_string())),
        "stringUtils.startsWith" => Ok(Value::Bool(
            expect_str(args, 0)?.starts_with(expect_str(args, 1)?),
        )),
        "stringUtils.endsWith" => Ok(Value::Bool(
            expect_str(args, 0)?.ends_with(expect_str(args, 1)?),
        )),
        "stringUtils.contains" => Ok(Value::Bool(
            expect_str(args, 0)?.contains(expect_str(args, 1)?),
        )),
        "stringUtils.split" => {
            let parts = expect_str(args, 0)?
                .split(expect_str(args, 1)?)
                .map(|p| Value::Str(p.to_string()))
                .collect();
            Ok(Value::Table(Table { seq: parts, entries: vec![] }))
        }
        // math namespace
        "math.floor" => Ok(Value::Int(expect_num(args, 0)?.floor() as i64)),
        "math.ceil" => Ok(Value::Int(expect_num(args, 0)?.ceil() as i64)),
        "math.abs" => match args.first() {
            Some(Value::Int(i)) => Ok(Value::Int(i.wrapping_abs())),
            _ => Ok(Value::Float(expect_num(args, 0)?.abs())),
        },
        "math.sqrt" => Ok(Value::Float(expect_num(args, 0)?.sqrt())),
        "math.min" => {
            let a = expect_num(args, 0)?;
            let b = expect_num(args, 1)?;
            Ok(Value::Float(a.min(b)))
        }
        "math.max" => {
            let a = expect_num(args, 0)?;
            let b = expect_num(args, 1)?;
            Ok(Value::Float(a.max(b)))
        }
        // string namespace
        "string.len" => Ok(Value::Int(expect_str(args, 0)?.chars().count() as i64)),
        "string.lower" => Ok(Value::Str(expect_str(args, 0)?.to_lowercase())),
        "string.upper" => Ok(Value::Str(expect_str(args, 0)?.to_uppercase())),
        "string.rep" => {
            let s = expect_str(args, 0)?;
            let n = expect_num(args, 1)?.max(0.0) as usize;
            if s.len().saturating_mul(n) > (1 << 20) {
                return Err(EvalError::runtime("string.rep result too large"));
            }
            Ok(Value::Str(s.repeat(n)))
        }
        "string.sub" => {
            let s = expect_str(args, 0)?;
            let chars: Vec<char> = s.chars().collect();
            let from = expect_num(args, 1)? as i64;
            let to = args.get(2).and_then(|v| v.as_f64()).map(|f| f as i64);
            let len = chars.len() as i64;
            let norm = |i: i64| -> i64 {
                if i < 0 { (len + i + 1).max(1) } else { i.max(1) }
            };
            let from = norm(from);
            let to = to.map(norm).unwrap_or(len).min(len);
            if from > to {
                return Ok(Value::Str(String::new()));
            }
            Ok(Value::Str(
                chars[(from - 1) as usize..to as usize].iter().collect(),
            ))
        }
        _ => Err(EvalError::runtime(format!("unknown function '{path}'"))),
    }
}
