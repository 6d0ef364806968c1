//! Built-in functions, callable as `name(args)` or `#name(args)`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{Number as JsonNumber, Value as JsonValue};

use crate::engine::EvaluationError;

use super::eval::{
    as_f64, as_str, json_type_name, number, require_arity, require_arity_at_least,
};

pub fn call_function(name: &str, args: &[JsonValue]) -> Result<JsonValue, EvaluationError> {
    match name {
        "min" => {
            require_arity_at_least(name, args, 1)?;
            let mut m = f64::INFINITY;
            for value in args {
                m = m.min(as_f64(value)?);
            }
            number(m)
        }
        "max" => {
            require_arity_at_least(name, args, 1)?;
            let mut m = f64::NEG_INFINITY;
            for value in args {
                m = m.max(as_f64(value)?);
            }
            number(m)
        }
        "abs" => {
            require_arity(name, args, 1)?;
            number(as_f64(&args[0])?.abs())
        }
        "floor" => {
            require_arity(name, args, 1)?;
            number(as_f64(&args[0])?.floor())
        }
        "ceil" => {
            require_arity(name, args, 1)?;
            number(as_f64(&args[0])?.ceil())
        }
        "round" => {
            require_arity(name, args, 1)?;
            number(as_f64(&args[0])?.round())
        }
        "len" => {
            require_arity(name, args, 1)?;
            let n = match &args[0] {
                JsonValue::String(v) => v.chars().count() as i64,
                JsonValue::Array(v) => v.len() as i64,
                JsonValue::Object(v) => v.len() as i64,
                _ => {
                    return Err(EvaluationError::evaluation(
                        "len() expects string, list, or map".to_string(),
                    ))
                }
            };
            Ok(JsonValue::Number(JsonNumber::from(n)))
        }
        "coalesce" => {
            require_arity_at_least(name, args, 1)?;
            Ok(args
                .iter()
                .find(|value| !value.is_null())
                .cloned()
                .unwrap_or(JsonValue::Null))
        }
        "toJson" => {
            require_arity(name, args, 1)?;
            serde_json::to_string(&args[0])
                .map(JsonValue::String)
                .map_err(|e| EvaluationError::evaluation(format!("toJson failed: {e}")))
        }
        "readJson" => {
            require_arity(name, args, 1)?;
            serde_json::from_str(as_str(&args[0])?)
                .map_err(|e| EvaluationError::evaluation(format!("readJson failed: {e}")))
        }
        "alphanumerical" => {
            require_arity(name, args, 1)?;
            Ok(JsonValue::String(
                as_str(&args[0])?
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .collect(),
            ))
        }
        "toInt" => {
            require_arity(name, args, 1)?;
            match &args[0] {
                JsonValue::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(JsonValue::from)
                    .map_err(|e| EvaluationError::evaluation(format!("toInt('{s}') failed: {e}"))),
                other => number(as_f64(other)?.trunc()),
            }
        }
        "toFloat" => {
            require_arity(name, args, 1)?;
            let value = match &args[0] {
                JsonValue::String(s) => s.trim().parse::<f64>().map_err(|e| {
                    EvaluationError::evaluation(format!("toFloat('{s}') failed: {e}"))
                })?,
                other => as_f64(other)?,
            };
            JsonNumber::from_f64(value)
                .map(JsonValue::Number)
                .ok_or_else(|| EvaluationError::evaluation(format!("invalid float {value}")))
        }
        "toBoolean" => {
            require_arity(name, args, 1)?;
            match &args[0] {
                JsonValue::Bool(b) => Ok(JsonValue::Bool(*b)),
                JsonValue::String(s) => Ok(JsonValue::Bool(s.trim().eq_ignore_ascii_case("true"))),
                other => Err(EvaluationError::evaluation(format!(
                    "toBoolean() expects string or boolean, got {}",
                    json_type_name(other)
                ))),
            }
        }
        "toBase64" => {
            require_arity(name, args, 1)?;
            Ok(JsonValue::String(STANDARD.encode(as_str(&args[0])?)))
        }
        "fromBase64" => {
            require_arity(name, args, 1)?;
            let bytes = STANDARD
                .decode(as_str(&args[0])?)
                .map_err(|e| EvaluationError::evaluation(format!("fromBase64 failed: {e}")))?;
            String::from_utf8(bytes)
                .map(JsonValue::String)
                .map_err(|e| EvaluationError::evaluation(format!("fromBase64 failed: {e}")))
        }
        _ => Err(EvaluationError::evaluation(format!(
            "Function '{name}' could not be found"
        ))),
    }
}
