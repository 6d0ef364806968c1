//! Methods callable on strings, lists and maps (`name.toUpperCase()`).

use serde_json::Value as JsonValue;

use crate::engine::EvaluationError;

use super::eval::{
    as_i64, as_str, compiled_regex, json_to_string, json_type_name, require_arity, values_equal,
};

pub fn call_method(
    receiver: &JsonValue,
    name: &str,
    args: &[JsonValue],
) -> Result<JsonValue, EvaluationError> {
    let result = match receiver {
        JsonValue::String(s) => string_method(s, name, args)?,
        JsonValue::Array(items) => list_method(items, name, args)?,
        JsonValue::Object(map) => map_method(map, name, args)?,
        _ => None,
    };

    if let Some(value) = result {
        return Ok(value);
    }

    match name {
        "toString" => {
            require_arity(name, args, 0)?;
            Ok(JsonValue::String(json_to_string(receiver)))
        }
        "equals" => {
            require_arity(name, args, 1)?;
            Ok(JsonValue::Bool(values_equal(receiver, &args[0])))
        }
        _ => Err(EvaluationError::evaluation(format!(
            "Method call: Method {name}() cannot be found on type {}",
            json_type_name(receiver)
        ))),
    }
}

fn string_method(
    s: &str,
    name: &str,
    args: &[JsonValue],
) -> Result<Option<JsonValue>, EvaluationError> {
    let value = match name {
        "length" | "size" => {
            require_arity(name, args, 0)?;
            JsonValue::from(s.chars().count())
        }
        "isEmpty" => {
            require_arity(name, args, 0)?;
            JsonValue::Bool(s.is_empty())
        }
        "toUpperCase" => {
            require_arity(name, args, 0)?;
            JsonValue::String(s.to_uppercase())
        }
        "toLowerCase" => {
            require_arity(name, args, 0)?;
            JsonValue::String(s.to_lowercase())
        }
        "trim" => {
            require_arity(name, args, 0)?;
            JsonValue::String(s.trim().to_string())
        }
        "contains" => {
            require_arity(name, args, 1)?;
            JsonValue::Bool(s.contains(as_str(&args[0])?))
        }
        "startsWith" => {
            require_arity(name, args, 1)?;
            JsonValue::Bool(s.starts_with(as_str(&args[0])?))
        }
        "endsWith" => {
            require_arity(name, args, 1)?;
            JsonValue::Bool(s.ends_with(as_str(&args[0])?))
        }
        "indexOf" => {
            require_arity(name, args, 1)?;
            let needle = as_str(&args[0])?;
            let index = s
                .find(needle)
                .map(|byte| s[..byte].chars().count() as i64)
                .unwrap_or(-1);
            JsonValue::from(index)
        }
        "charAt" => {
            require_arity(name, args, 1)?;
            let i = as_i64(&args[0])?;
            let c = usize::try_from(i)
                .ok()
                .and_then(|i| s.chars().nth(i))
                .ok_or_else(|| out_of_bounds(i, s.chars().count()))?;
            JsonValue::String(c.to_string())
        }
        "substring" => {
            if args.is_empty() || args.len() > 2 {
                return Err(EvaluationError::evaluation(format!(
                    "{name}() expects 1 or 2 arguments, got {}",
                    args.len()
                )));
            }
            let chars: Vec<char> = s.chars().collect();
            let begin = as_i64(&args[0])?;
            let end = match args.get(1) {
                Some(v) => as_i64(v)?,
                None => chars.len() as i64,
            };
            if begin < 0 || end > chars.len() as i64 || begin > end {
                return Err(EvaluationError::index_out_of_bounds(format!(
                    "begin {begin}, end {end}, length {}",
                    chars.len()
                )));
            }
            JsonValue::String(chars[begin as usize..end as usize].iter().collect())
        }
        "replace" => {
            require_arity(name, args, 2)?;
            JsonValue::String(s.replace(as_str(&args[0])?, as_str(&args[1])?))
        }
        "split" => {
            require_arity(name, args, 1)?;
            let pattern = as_str(&args[0])?;
            let re = compiled_regex(pattern).map_err(|e| {
                EvaluationError::evaluation(format!("invalid regular expression '{pattern}': {e}"))
            })?;
            let mut parts: Vec<&str> = re.split(s).collect();
            while parts.len() > 1 && parts.last().is_some_and(|p| p.is_empty()) {
                parts.pop();
            }
            JsonValue::Array(
                parts
                    .into_iter()
                    .map(|p| JsonValue::String(p.to_string()))
                    .collect(),
            )
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn list_method(
    items: &[JsonValue],
    name: &str,
    args: &[JsonValue],
) -> Result<Option<JsonValue>, EvaluationError> {
    let value = match name {
        "size" => {
            require_arity(name, args, 0)?;
            JsonValue::from(items.len())
        }
        "isEmpty" => {
            require_arity(name, args, 0)?;
            JsonValue::Bool(items.is_empty())
        }
        "contains" => {
            require_arity(name, args, 1)?;
            JsonValue::Bool(items.iter().any(|item| values_equal(item, &args[0])))
        }
        "indexOf" => {
            require_arity(name, args, 1)?;
            let index = items
                .iter()
                .position(|item| values_equal(item, &args[0]))
                .map(|i| i as i64)
                .unwrap_or(-1);
            JsonValue::from(index)
        }
        "get" => {
            require_arity(name, args, 1)?;
            let i = as_i64(&args[0])?;
            usize::try_from(i)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or_else(|| out_of_bounds(i, items.len()))?
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn map_method(
    map: &serde_json::Map<String, JsonValue>,
    name: &str,
    args: &[JsonValue],
) -> Result<Option<JsonValue>, EvaluationError> {
    let value = match name {
        "size" => {
            require_arity(name, args, 0)?;
            JsonValue::from(map.len())
        }
        "isEmpty" => {
            require_arity(name, args, 0)?;
            JsonValue::Bool(map.is_empty())
        }
        "containsKey" => {
            require_arity(name, args, 1)?;
            JsonValue::Bool(map.contains_key(&json_to_string(&args[0])))
        }
        "get" => {
            require_arity(name, args, 1)?;
            map.get(&json_to_string(&args[0]))
                .cloned()
                .unwrap_or(JsonValue::Null)
        }
        "keySet" => {
            require_arity(name, args, 0)?;
            JsonValue::Array(map.keys().cloned().map(JsonValue::String).collect())
        }
        "values" => {
            require_arity(name, args, 0)?;
            JsonValue::Array(map.values().cloned().collect())
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn out_of_bounds(index: i64, len: usize) -> EvaluationError {
    EvaluationError::index_out_of_bounds(format!("Index {index} out of bounds for length {len}"))
}
