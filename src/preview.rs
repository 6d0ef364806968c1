//! Preview facade used by form fields: template + context in, a
//! `{ value, error, preview }` record out. Never fails; every problem is
//! reported through `error`.

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::engine::{compile_template, CompiledTemplate, EvalErrorKind, ExpressionEngine, SpelEngine};
use crate::error::SpelError;
use crate::options::PreviewOptions;

/// Appended to `contextTruncated` when the context was cut.
pub const TRUNCATION_MARKER: &str = "...";

/// Outcome of previewing one template. Exactly one of `error` and `preview`
/// is set for non-empty input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub value: Option<String>,
    pub error: Option<ErrorShape>,
    pub preview: Option<String>,
}

impl Preview {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Display-ready description of a failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorShape {
    pub message: Option<String>,
    /// Pretty-printed value being navigated when a null reference failed.
    pub context: Option<String>,
    /// `context` cut for inline display.
    pub context_truncated: Option<String>,
}

/// Previews `value` against `context` with the built-in engine and default
/// options.
pub fn evaluate_expression(context: &JsonValue, value: Option<&str>) -> Preview {
    evaluate_expression_with(&SpelEngine, &PreviewOptions::default(), context, value)
}

/// Previews `value` against `context` with an injected engine.
pub fn evaluate_expression_with(
    engine: &dyn ExpressionEngine,
    options: &PreviewOptions,
    context: &JsonValue,
    value: Option<&str>,
) -> Preview {
    let Some(template) = value.filter(|v| !v.is_empty()) else {
        return empty_preview(value);
    };

    match compile_template(engine, template, &options.limits()) {
        Ok(compiled) => render(&compiled, context, options),
        Err(err) => failure(template, &err, options),
    }
}

/// Evaluates an already compiled template.
pub fn render(compiled: &CompiledTemplate, context: &JsonValue, options: &PreviewOptions) -> Preview {
    match compiled.evaluate(context) {
        Ok(values) => {
            let preview: String = values.iter().map(stringify).collect();
            debug!(template = compiled.source(), "preview evaluated");
            Preview {
                value: Some(compiled.source().to_string()),
                error: None,
                preview: Some(preview),
            }
        }
        Err(err) => failure(compiled.source(), &SpelError::from(err), options),
    }
}

pub(crate) fn empty_preview(value: Option<&str>) -> Preview {
    Preview {
        value: value.map(str::to_string),
        error: None,
        preview: Some(String::new()),
    }
}

pub(crate) fn failure(template: &str, err: &SpelError, options: &PreviewOptions) -> Preview {
    debug!(template, error = %err, "preview failed");
    Preview {
        value: Some(template.to_string()),
        error: Some(error_shape(err, options)),
        preview: None,
    }
}

/// Builds the error record for `err`.
pub fn error_shape(err: &SpelError, options: &PreviewOptions) -> ErrorShape {
    let name = err.name();
    let message = err.message();

    if name.is_empty() || message.is_empty() {
        return ErrorShape {
            message: Some(serde_json::to_string_pretty(err).unwrap_or_else(|_| err.to_string())),
            ..ErrorShape::default()
        };
    }

    let mut shape = ErrorShape {
        message: Some(format!("{name}: {message}")),
        ..ErrorShape::default()
    };

    if let SpelError::Evaluation(eval) = err {
        if eval.kind == EvalErrorKind::NullPointerException {
            if let Some(active) = &eval.active_context {
                let pretty = pretty_json(active);
                shape.context_truncated = Some(truncate(&pretty, options.context_truncate_len));
                shape.context = Some(pretty);
            }
        }
    }

    shape
}

/// Renders one evaluated segment: strings verbatim, lists and maps as
/// two-space indented JSON, everything else in JSON form.
pub fn stringify(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(_) | JsonValue::Object(_) => pretty_json(value),
        other => other.to_string(),
    }
}

fn pretty_json(value: &JsonValue) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Keeps the first `max` characters of `text`, appending
/// [`TRUNCATION_MARKER`] when anything was cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}
