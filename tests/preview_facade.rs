use std::sync::{Arc, Mutex};

use serde_json::{json, Value as JsonValue};

use spel_preview::{
    evaluate_expression, evaluate_expression_with, CompiledExpression, EvalState,
    EvaluationError, ExpressionEngine, Preview, PreviewOptions, SpelError,
};

/// Engine that records compile and evaluate calls. Expressions named in
/// `failing` raise an evaluation error.
#[derive(Debug, Default, Clone)]
struct RecordingEngine {
    compiled: Arc<Mutex<Vec<String>>>,
    evaluated: Arc<Mutex<Vec<String>>>,
    failing: Vec<String>,
}

#[derive(Debug)]
struct RecordingExpression {
    source: String,
    fails: bool,
    evaluated: Arc<Mutex<Vec<String>>>,
}

impl ExpressionEngine for RecordingEngine {
    fn compile(&self, text: &str) -> Result<Box<dyn CompiledExpression>, SpelError> {
        self.compiled.lock().unwrap().push(text.to_string());
        Ok(Box::new(RecordingExpression {
            source: text.to_string(),
            fails: self.failing.iter().any(|f| f == text),
            evaluated: Arc::clone(&self.evaluated),
        }))
    }
}

impl CompiledExpression for RecordingExpression {
    fn source(&self) -> &str {
        &self.source
    }

    fn evaluate(&self, context: &JsonValue, _: &mut EvalState) -> Result<JsonValue, EvaluationError> {
        self.evaluated.lock().unwrap().push(self.source.clone());
        if self.fails {
            return Err(EvaluationError::evaluation(format!("{} failed", self.source)));
        }
        Ok(context.get(&self.source).cloned().unwrap_or(JsonValue::Null))
    }
}

fn preview_with(engine: &RecordingEngine, context: &JsonValue, value: Option<&str>) -> Preview {
    evaluate_expression_with(engine, &PreviewOptions::default(), context, value)
}

#[test]
fn empty_input_short_circuits() {
    let engine = RecordingEngine::default();
    let ctx = json!({"a": 1});

    let preview = preview_with(&engine, &ctx, Some(""));
    assert_eq!(
        preview,
        Preview {
            value: Some(String::new()),
            error: None,
            preview: Some(String::new()),
        }
    );

    let preview = preview_with(&engine, &ctx, None);
    assert_eq!(preview.value, None);
    assert_eq!(preview.error, None);
    assert_eq!(preview.preview.as_deref(), Some(""));

    assert!(engine.compiled.lock().unwrap().is_empty());
}

#[test]
fn literal_only_template_skips_engine() {
    let engine = RecordingEngine::default();
    let preview = preview_with(&engine, &json!({}), Some("plain text"));
    assert_eq!(preview.preview.as_deref(), Some("plain text"));
    assert!(engine.compiled.lock().unwrap().is_empty());
}

#[test]
fn interpolates_multiple_segments() {
    let preview = evaluate_expression(&json!({"name": "world"}), Some("hello ${name}!"));
    assert_eq!(preview.value.as_deref(), Some("hello ${name}!"));
    assert_eq!(preview.preview.as_deref(), Some("hello world!"));
    assert!(preview.error.is_none());
}

#[test]
fn stops_at_first_failing_segment() {
    let engine = RecordingEngine {
        failing: vec!["a".to_string()],
        ..RecordingEngine::default()
    };
    let preview = preview_with(&engine, &json!({"b": 1}), Some("${a}${b}"));

    assert_eq!(*engine.evaluated.lock().unwrap(), vec!["a".to_string()]);
    assert!(preview.preview.is_none());
    let error = preview.error.unwrap();
    assert_eq!(
        error.message.as_deref(),
        Some("SpelEvaluationException: a failed")
    );
    assert!(error.context.is_none());
    assert!(error.context_truncated.is_none());
}

#[test]
fn segments_evaluate_in_template_order() {
    let engine = RecordingEngine::default();
    let preview = preview_with(&engine, &json!({"x": "1", "y": "2"}), Some("${y}-${x}-${y}"));
    assert_eq!(preview.preview.as_deref(), Some("2-1-2"));
    assert_eq!(
        *engine.evaluated.lock().unwrap(),
        vec!["y".to_string(), "x".to_string(), "y".to_string()]
    );
}

#[test]
fn parse_errors_use_the_same_shape() {
    let preview = evaluate_expression(&json!({}), Some("${}"));
    assert!(preview.preview.is_none());
    let error = preview.error.unwrap();
    assert_eq!(
        error.message.as_deref(),
        Some("Error: No expression defined within delimiter '${}' at character 0")
    );
    assert!(error.context.is_none());
}

#[test]
fn syntax_errors_are_named() {
    let preview = evaluate_expression(&json!({}), Some("${1 +}"));
    let message = preview.error.unwrap().message.unwrap();
    assert!(message.starts_with("SpelParseException: "));
}

#[test]
fn null_reference_reports_context() {
    let ctx = json!({"trigger": {"tag": "v1"}});
    let preview = evaluate_expression(&ctx, Some("tag: ${trigger.missing}"));
    let error = preview.error.unwrap();
    assert_eq!(
        error.message.as_deref(),
        Some("NullPointerException: Property 'missing' does not exist")
    );
    assert_eq!(error.context.as_deref(), Some("{\n  \"tag\": \"v1\"\n}"));
    assert_eq!(error.context_truncated, error.context);
}

#[test]
fn long_context_is_truncated_at_200_characters() {
    let ctx = json!({"trigger": {"payload": "x".repeat(300)}});
    let preview = evaluate_expression(&ctx, Some("${trigger.missing}"));
    let error = preview.error.unwrap();

    let context = error.context.unwrap();
    let truncated = error.context_truncated.unwrap();
    assert!(context.chars().count() > 200);
    assert_eq!(truncated.chars().count(), 203);
    assert!(truncated.ends_with("..."));
    assert_eq!(
        &truncated[..200],
        &context.chars().take(200).collect::<String>()
    );
}

#[test]
fn truncation_length_is_configurable() {
    let options = PreviewOptions {
        context_truncate_len: 5,
        ..PreviewOptions::default()
    };
    let preview = evaluate_expression_with(
        &spel_preview::SpelEngine,
        &options,
        &json!({"a": {"b": 1}}),
        Some("${a.c}"),
    );
    assert_eq!(
        preview.error.unwrap().context_truncated.as_deref(),
        Some("{\n  \"...")
    );
}

#[test]
fn stringifies_values() {
    let ctx = json!({"n": null, "obj": {"a": [1, 2]}, "flag": true, "num": 2.5});
    assert_eq!(
        evaluate_expression(&ctx, Some("value ${n}")).preview.as_deref(),
        Some("value null")
    );
    assert_eq!(
        evaluate_expression(&ctx, Some("${obj}")).preview.as_deref(),
        Some("{\n  \"a\": [\n    1,\n    2\n  ]\n}")
    );
    assert_eq!(
        evaluate_expression(&ctx, Some("${flag}/${num}")).preview.as_deref(),
        Some("true/2.5")
    );
}

#[test]
fn repeated_calls_are_identical() {
    let ctx = json!({"trigger": {"tag": "v1"}});
    for template in ["${trigger.tag}", "${trigger.nope}", "${", "x"] {
        let first = evaluate_expression(&ctx, Some(template));
        let second = evaluate_expression(&ctx, Some(template));
        assert_eq!(first, second);
    }
}

#[test]
fn exactly_one_of_preview_and_error_is_set() {
    let ctx = json!({"a": 1});
    for template in ["${a}", "${b}", "${a", "text", "${a)}"] {
        let preview = evaluate_expression(&ctx, Some(template));
        assert_ne!(preview.preview.is_some(), preview.error.is_some(), "{template}");
    }
}

#[test]
fn serializes_with_camel_case_error_fields() {
    let preview = evaluate_expression(&json!({"a": {}}), Some("${a.b}"));
    let value = serde_json::to_value(&preview).unwrap();
    assert_eq!(value["preview"], JsonValue::Null);
    assert_eq!(value["value"], json!("${a.b}"));
    assert_eq!(value["error"]["contextTruncated"], json!("{}"));
    assert_eq!(value["error"]["context"], json!("{}"));
}

#[test]
fn segment_limit_is_reported_as_error() {
    let options = PreviewOptions {
        max_segments: 1,
        ..PreviewOptions::default()
    };
    let preview = evaluate_expression_with(
        &spel_preview::SpelEngine,
        &options,
        &json!({"a": 1}),
        Some("x ${a}"),
    );
    let message = preview.error.unwrap().message.unwrap();
    assert!(message.starts_with("LimitExceeded: too many segments"));
}

#[test]
fn deeply_nested_expressions_fail_as_previews() {
    let ctx = json!({});
    let templates = [
        format!("${{{}1{}}}", "(".repeat(300), ")".repeat(300)),
        format!("${{{}1}}", "-".repeat(3000)),
        format!("${{{}}}", vec!["1"; 1500].join("+")),
    ];
    for template in &templates {
        let preview = evaluate_expression(&ctx, Some(template));
        assert!(preview.preview.is_none());
        let message = preview.error.unwrap().message.unwrap();
        assert!(
            message.starts_with("LimitExceeded: expression nesting exceeds max depth (128)"),
            "{message}"
        );
    }
}

#[test]
fn moderate_nesting_still_evaluates() {
    let template = format!("${{{}1{}}}", "(".repeat(20), ")".repeat(20));
    let preview = evaluate_expression(&json!({}), Some(&template));
    assert_eq!(preview.preview.as_deref(), Some("1"));
    assert_eq!(
        evaluate_expression(&json!({}), Some("${-(-(-1))}")).preview.as_deref(),
        Some("-1")
    );
}

#[test]
fn nesting_limit_is_configurable() {
    let options = PreviewOptions {
        max_nesting_depth: 4,
        ..PreviewOptions::default()
    };
    let preview = evaluate_expression_with(
        &spel_preview::SpelEngine,
        &options,
        &json!({}),
        Some("${(((1)))}"),
    );
    let message = preview.error.unwrap().message.unwrap();
    assert!(message.starts_with("LimitExceeded: "));
}
