//! Runtime evaluator for expression AST values.

use std::cmp::Ordering;
use std::sync::OnceLock;

use moka::sync::Cache;
use regex::Regex;
use serde_json::{Map as JsonMap, Number as JsonNumber, Value as JsonValue};

use crate::engine::EvaluationError;

use super::functions::call_function;
use super::methods::call_method;
use super::parser::{BinaryOp, Expr, SelectMode, Step, StepKind, UnaryOp};

/// Mutable evaluation state for one evaluation call.
///
/// `active_context` holds the object each property, method or index step is
/// applied to; the top of the stack is the value being navigated when an
/// error surfaces. `scope` holds the objects `#this` refers to, with the
/// evaluation root at the bottom.
#[derive(Debug, Default)]
pub struct EvalState {
    active_context: Vec<JsonValue>,
    scope: Vec<JsonValue>,
}

impl EvalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value on top of the active-context stack.
    pub fn active_context(&self) -> Option<&JsonValue> {
        self.active_context.last()
    }

    /// Number of entries on the active-context stack.
    pub fn depth(&self) -> usize {
        self.active_context.len()
    }

    fn push_active(&mut self, value: JsonValue) {
        self.active_context.push(value);
    }

    fn pop_active(&mut self) {
        self.active_context.pop();
    }

    fn active(&self) -> &JsonValue {
        self.active_context.last().unwrap_or(&JsonValue::Null)
    }

    fn root(&self) -> &JsonValue {
        self.scope.first().unwrap_or(&JsonValue::Null)
    }

    fn this(&self) -> &JsonValue {
        self.scope.last().unwrap_or(&JsonValue::Null)
    }
}

/// Evaluates `expr` with `root` as both the root object and the initial
/// active context. On error the state is left as it was at the failure point.
pub fn evaluate(
    expr: &Expr,
    root: &JsonValue,
    state: &mut EvalState,
) -> Result<JsonValue, EvaluationError> {
    state.scope.push(root.clone());
    state.push_active(root.clone());
    let value = eval_node(expr, state)?;
    state.pop_active();
    state.scope.pop();
    Ok(value)
}

fn eval_node(expr: &Expr, state: &mut EvalState) -> Result<JsonValue, EvaluationError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::InlineList(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval_node(item, state)?);
            }
            Ok(JsonValue::Array(out))
        }
        Expr::InlineMap(entries) => {
            let mut out = JsonMap::new();
            for (key, item) in entries {
                out.insert(key.clone(), eval_node(item, state)?);
            }
            Ok(JsonValue::Object(out))
        }
        Expr::Property(name) => {
            let receiver = state.active().clone();
            read_property(&receiver, name, false)
        }
        Expr::Variable(name) => Ok(match name.as_str() {
            "root" => state.root().clone(),
            "this" => state.this().clone(),
            _ => JsonValue::Null,
        }),
        Expr::Call { name, args } => {
            let values = eval_args(args, state)?;
            call_function(name, &values)
        }
        Expr::Compound { head, steps } => {
            let mut current = eval_node(head, state)?;
            for step in steps {
                state.push_active(current.clone());
                let next = eval_step(step, &current, state)?;
                state.pop_active();
                current = next;
            }
            Ok(current)
        }
        Expr::Unary { op, expr } => {
            let value = eval_node(expr, state)?;
            match op {
                UnaryOp::Neg => number(-as_f64(&value)?),
                UnaryOp::Not => Ok(JsonValue::Bool(!as_bool(&value)?)),
            }
        }
        Expr::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => {
            if !as_bool(&eval_node(left, state)?)? {
                return Ok(JsonValue::Bool(false));
            }
            Ok(JsonValue::Bool(as_bool(&eval_node(right, state)?)?))
        }
        Expr::Binary {
            op: BinaryOp::Or,
            left,
            right,
        } => {
            if as_bool(&eval_node(left, state)?)? {
                return Ok(JsonValue::Bool(true));
            }
            Ok(JsonValue::Bool(as_bool(&eval_node(right, state)?)?))
        }
        Expr::Binary { op, left, right } => {
            let l = eval_node(left, state)?;
            let r = eval_node(right, state)?;
            eval_binary(*op, l, r)
        }
        Expr::Ternary {
            condition,
            then,
            otherwise,
        } => {
            if as_bool(&eval_node(condition, state)?)? {
                eval_node(then, state)
            } else {
                eval_node(otherwise, state)
            }
        }
        Expr::Elvis { value, fallback } => {
            let v = eval_node(value, state)?;
            match &v {
                JsonValue::Null => eval_node(fallback, state),
                JsonValue::String(s) if s.is_empty() => eval_node(fallback, state),
                _ => Ok(v),
            }
        }
    }
}

/// Arguments and indexes are evaluated against the current `#this`, not the
/// receiver of the step they belong to.
fn eval_args(args: &[Expr], state: &mut EvalState) -> Result<Vec<JsonValue>, EvaluationError> {
    let this = state.this().clone();
    state.push_active(this);
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(eval_node(arg, state)?);
    }
    state.pop_active();
    Ok(values)
}

fn eval_step(
    step: &Step,
    receiver: &JsonValue,
    state: &mut EvalState,
) -> Result<JsonValue, EvaluationError> {
    if step.null_safe && receiver.is_null() {
        return Ok(JsonValue::Null);
    }

    match &step.kind {
        StepKind::Property(name) => read_property(receiver, name, step.null_safe),
        StepKind::Method { name, args } => {
            if receiver.is_null() {
                return Err(EvaluationError::null_pointer(format!(
                    "Method call: Attempted to call method {name}() on null context object"
                )));
            }
            let values = eval_args(args, state)?;
            call_method(receiver, name, &values)
        }
        StepKind::Index(index) => {
            let mut values = eval_args(std::slice::from_ref(index.as_ref()), state)?;
            let index = values.pop().unwrap_or(JsonValue::Null);
            read_index(receiver, &index)
        }
        StepKind::Select { mode, predicate } => {
            let items = as_collection(receiver, "selection")?;
            let mut selected = Vec::new();
            for item in items {
                if as_bool(&eval_in_scope(predicate, item, state)?)? {
                    selected.push(item.clone());
                    if *mode == SelectMode::First {
                        break;
                    }
                }
            }
            Ok(match mode {
                SelectMode::All => JsonValue::Array(selected),
                SelectMode::First => selected.into_iter().next().unwrap_or(JsonValue::Null),
                SelectMode::Last => selected.pop().unwrap_or(JsonValue::Null),
            })
        }
        StepKind::Project(projection) => {
            let items = as_collection(receiver, "projection")?;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval_in_scope(projection, item, state)?);
            }
            Ok(JsonValue::Array(out))
        }
    }
}

/// Evaluates `expr` with `item` as both `#this` and the active context.
fn eval_in_scope(
    expr: &Expr,
    item: &JsonValue,
    state: &mut EvalState,
) -> Result<JsonValue, EvaluationError> {
    state.scope.push(item.clone());
    state.push_active(item.clone());
    let value = eval_node(expr, state)?;
    state.pop_active();
    state.scope.pop();
    Ok(value)
}

fn as_collection<'a>(
    receiver: &'a JsonValue,
    operation: &str,
) -> Result<&'a Vec<JsonValue>, EvaluationError> {
    match receiver {
        JsonValue::Array(items) => Ok(items),
        JsonValue::Null => Err(EvaluationError::null_pointer(format!(
            "Cannot perform {operation} on null"
        ))),
        other => Err(EvaluationError::evaluation(format!(
            "{operation} is only supported on lists, got {}",
            json_type_name(other)
        ))),
    }
}

fn read_property(
    receiver: &JsonValue,
    name: &str,
    null_safe: bool,
) -> Result<JsonValue, EvaluationError> {
    match receiver {
        JsonValue::Null => Err(EvaluationError::null_pointer(format!(
            "Cannot read property '{name}' of null"
        ))),
        JsonValue::Object(map) => match map.get(name) {
            Some(value) => Ok(value.clone()),
            None if null_safe => Ok(JsonValue::Null),
            None => Err(EvaluationError::null_pointer(format!(
                "Property '{name}' does not exist"
            ))),
        },
        _ if null_safe => Ok(JsonValue::Null),
        _ => Err(EvaluationError::null_pointer(format!(
            "Property '{name}' does not exist"
        ))),
    }
}

fn read_index(receiver: &JsonValue, index: &JsonValue) -> Result<JsonValue, EvaluationError> {
    match receiver {
        JsonValue::Null => Err(EvaluationError::null_pointer(
            "Cannot index into a null value".to_string(),
        )),
        JsonValue::Object(map) => {
            let key = json_to_string(index);
            Ok(map.get(&key).cloned().unwrap_or(JsonValue::Null))
        }
        JsonValue::Array(items) => {
            let i = as_index(index)?;
            items.get(i).cloned().ok_or_else(|| {
                EvaluationError::index_out_of_bounds(format!(
                    "Index {i} out of bounds for length {}",
                    items.len()
                ))
            })
        }
        JsonValue::String(s) => {
            let i = as_index(index)?;
            s.chars()
                .nth(i)
                .map(|c| JsonValue::String(c.to_string()))
                .ok_or_else(|| {
                    EvaluationError::index_out_of_bounds(format!(
                        "Index {i} out of bounds for length {}",
                        s.chars().count()
                    ))
                })
        }
        other => Err(EvaluationError::evaluation(format!(
            "Cannot index into a value of type {}",
            json_type_name(other)
        ))),
    }
}

fn as_index(value: &JsonValue) -> Result<usize, EvaluationError> {
    let n = as_i64(value)?;
    usize::try_from(n).map_err(|_| {
        EvaluationError::index_out_of_bounds(format!("Index {n} out of bounds"))
    })
}

fn eval_binary(
    op: BinaryOp,
    left: JsonValue,
    right: JsonValue,
) -> Result<JsonValue, EvaluationError> {
    match op {
        BinaryOp::Add => {
            if left.is_string() || right.is_string() {
                Ok(JsonValue::String(format!(
                    "{}{}",
                    json_to_string(&left),
                    json_to_string(&right)
                )))
            } else {
                number(as_f64(&left)? + as_f64(&right)?)
            }
        }
        BinaryOp::Sub => number(as_f64(&left)? - as_f64(&right)?),
        BinaryOp::Mul => number(as_f64(&left)? * as_f64(&right)?),
        BinaryOp::Div => {
            let rhs = as_f64(&right)?;
            if rhs == 0.0 {
                return Err(EvaluationError::evaluation("division by zero".to_string()));
            }
            number(as_f64(&left)? / rhs)
        }
        BinaryOp::Mod => {
            let rhs = as_f64(&right)?;
            if rhs == 0.0 {
                return Err(EvaluationError::evaluation("modulo by zero".to_string()));
            }
            number(as_f64(&left)? % rhs)
        }
        BinaryOp::Pow => number(as_f64(&left)?.powf(as_f64(&right)?)),
        BinaryOp::Eq => Ok(JsonValue::Bool(values_equal(&left, &right))),
        BinaryOp::NotEq => Ok(JsonValue::Bool(!values_equal(&left, &right))),
        BinaryOp::Lt => compare(&left, &right, |o| o == Ordering::Less),
        BinaryOp::Lte => compare(&left, &right, |o| o != Ordering::Greater),
        BinaryOp::Gt => compare(&left, &right, |o| o == Ordering::Greater),
        BinaryOp::Gte => compare(&left, &right, |o| o != Ordering::Less),
        BinaryOp::Matches => {
            let subject = as_str(&left)?;
            let pattern = as_str(&right)?;
            let re = compiled_regex(&format!("^(?:{pattern})$")).map_err(|e| {
                EvaluationError::evaluation(format!("invalid regular expression '{pattern}': {e}"))
            })?;
            Ok(JsonValue::Bool(re.is_match(subject)))
        }
        BinaryOp::And | BinaryOp::Or => {
            let l = as_bool(&left)?;
            let r = as_bool(&right)?;
            Ok(JsonValue::Bool(if matches!(op, BinaryOp::And) {
                l && r
            } else {
                l || r
            }))
        }
    }
}

fn compare<F>(left: &JsonValue, right: &JsonValue, accept: F) -> Result<JsonValue, EvaluationError>
where
    F: Fn(Ordering) -> bool,
{
    let ordering = match (left, right) {
        (JsonValue::Number(_), JsonValue::Number(_)) => {
            as_f64(left)?.partial_cmp(&as_f64(right)?)
        }
        (JsonValue::String(l), JsonValue::String(r)) => Some(l.cmp(r)),
        _ => None,
    };
    match ordering {
        Some(o) => Ok(JsonValue::Bool(accept(o))),
        None => Err(EvaluationError::evaluation(format!(
            "cannot compare {} with {}",
            json_type_name(left),
            json_type_name(right)
        ))),
    }
}

/// Equality with numbers compared by value (`1 == 1.0`).
const PATTERN_CACHE_CAPACITY: u64 = 256;

fn pattern_cache() -> &'static Cache<String, Regex> {
    static PATTERNS: OnceLock<Cache<String, Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| Cache::new(PATTERN_CACHE_CAPACITY))
}

/// Compiles `pattern`, reusing earlier compilations. Previews re-evaluate the
/// same expressions on every edit, so patterns are mostly cache hits.
pub(crate) fn compiled_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let cache = pattern_cache();
    if let Some(re) = cache.get(pattern) {
        return Ok(re);
    }
    let re = Regex::new(pattern)?;
    cache.insert(pattern.to_string(), re.clone());
    Ok(re)
}

/// Fails unless exactly `expected` arguments were passed to `name`.
pub(crate) fn require_arity(
    name: &str,
    args: &[JsonValue],
    expected: usize,
) -> Result<(), EvaluationError> {
    if args.len() != expected {
        return Err(EvaluationError::evaluation(format!(
            "{name}() expects {expected} arguments, got {}",
            args.len()
        )));
    }
    Ok(())
}

pub(crate) fn require_arity_at_least(
    name: &str,
    args: &[JsonValue],
    min: usize,
) -> Result<(), EvaluationError> {
    if args.len() < min {
        return Err(EvaluationError::evaluation(format!(
            "{name}() expects at least {min} arguments, got {}",
            args.len()
        )));
    }
    Ok(())
}

pub(crate) fn values_equal(left: &JsonValue, right: &JsonValue) -> bool {
    match (left, right) {
        (JsonValue::Number(l), JsonValue::Number(r)) => l.as_f64() == r.as_f64(),
        _ => left == right,
    }
}

pub(crate) fn as_f64(value: &JsonValue) -> Result<f64, EvaluationError> {
    value.as_f64().ok_or_else(|| {
        EvaluationError::evaluation(format!("expected number, got {}", json_type_name(value)))
    })
}

pub(crate) fn as_i64(value: &JsonValue) -> Result<i64, EvaluationError> {
    if let Some(v) = value.as_i64() {
        Ok(v)
    } else if let Some(v) = value.as_u64() {
        i64::try_from(v).map_err(|_| {
            EvaluationError::evaluation(format!("integer value out of range: {v}"))
        })
    } else {
        Err(EvaluationError::evaluation(format!(
            "expected integer, got {}",
            json_type_name(value)
        )))
    }
}

pub(crate) fn as_bool(value: &JsonValue) -> Result<bool, EvaluationError> {
    value.as_bool().ok_or_else(|| {
        EvaluationError::evaluation(format!("expected boolean, got {}", json_type_name(value)))
    })
}

pub(crate) fn as_str(value: &JsonValue) -> Result<&str, EvaluationError> {
    value.as_str().ok_or_else(|| {
        EvaluationError::evaluation(format!("expected string, got {}", json_type_name(value)))
    })
}

/// Converts a float result to JSON, keeping integral values as integers.
pub(crate) fn number(value: f64) -> Result<JsonValue, EvaluationError> {
    let num = JsonNumber::from_f64(value).ok_or_else(|| {
        EvaluationError::evaluation(format!("invalid numeric result {value}"))
    })?;

    if value.fract() == 0.0 && value >= i64::MIN as f64 && value <= i64::MAX as f64 {
        return Ok(JsonValue::Number(JsonNumber::from(value as i64)));
    }

    Ok(JsonValue::Number(num))
}

pub(crate) fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "list",
        JsonValue::Object(_) => "map",
    }
}

pub(crate) fn json_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(v) => v.clone(),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn patterns_are_compiled_once() {
        let pattern = "^(?:eval-cache-[0-9]+)$";
        let first = compiled_regex(pattern).unwrap();
        assert!(pattern_cache().contains_key(pattern));
        let second = compiled_regex(pattern).unwrap();
        assert_eq!(first.as_str(), second.as_str());
        assert!(second.is_match("eval-cache-42"));
    }

    #[test]
    fn invalid_patterns_are_not_cached() {
        assert!(compiled_regex("eval-cache-(").is_err());
        assert!(!pattern_cache().contains_key("eval-cache-("));
    }

    #[test]
    fn arity_checks_name_the_callee() {
        let args = [json!(1), json!(2)];
        assert!(require_arity("abs", &args[..2], 2).is_ok());
        let err = require_arity("abs", &args[..1], 2).unwrap_err();
        assert_eq!(err.message, "abs() expects 2 arguments, got 1");
        let err = require_arity_at_least("max", &[], 1).unwrap_err();
        assert_eq!(err.message, "max() expects at least 1 arguments, got 0");
    }
}
