use spel_preview::{parse_expressions, Segment, SpelError};

fn literal(text: &str, start: usize) -> Segment {
    Segment::Literal {
        text: text.to_string(),
        start,
    }
}

fn expression(text: &str, start: usize) -> Segment {
    Segment::Expression {
        text: text.to_string(),
        start,
    }
}

#[test]
fn plain_text_is_one_literal() {
    assert_eq!(
        parse_expressions("no markers here").unwrap(),
        vec![literal("no markers here", 0)]
    );
}

#[test]
fn empty_template_has_no_segments() {
    assert!(parse_expressions("").unwrap().is_empty());
}

#[test]
fn nested_marker_closes_on_balanced_brace() {
    assert_eq!(
        parse_expressions("hello ${foo${abc}}").unwrap(),
        vec![literal("hello ", 0), expression("foo${abc}", 6)]
    );
}

#[test]
fn quoted_brackets_do_not_count() {
    assert_eq!(
        parse_expressions("${'a{b'}").unwrap(),
        vec![expression("'a{b'", 0)]
    );
    assert_eq!(
        parse_expressions(r#"${"}" + a}"#).unwrap(),
        vec![expression(r#""}" + a"#, 0)]
    );
}

#[test]
fn adjacent_markers_produce_no_empty_literals() {
    assert_eq!(
        parse_expressions("${a}${b}").unwrap(),
        vec![expression("a", 0), expression("b", 4)]
    );
}

#[test]
fn expression_text_is_trimmed() {
    assert_eq!(
        parse_expressions("x${  a.b  }y").unwrap(),
        vec![literal("x", 0), expression("a.b", 1), literal("y", 11)]
    );
}

#[test]
fn lone_dollar_and_brace_stay_literal() {
    assert_eq!(
        parse_expressions("$ {x} }").unwrap(),
        vec![literal("$ {x} }", 0)]
    );
    assert_eq!(
        parse_expressions("$${a}").unwrap(),
        vec![literal("$", 0), expression("a", 1)]
    );
}

#[test]
fn suffix_after_closed_brackets_ends_marker() {
    assert_eq!(
        parse_expressions("${map['k']}x}").unwrap(),
        vec![expression("map['k']", 0), literal("x}", 11)]
    );
    assert_eq!(
        parse_expressions("${ {1,2}[0] }").unwrap(),
        vec![expression("{1,2}[0]", 0)]
    );
}

#[test]
fn empty_marker_is_rejected() {
    assert_eq!(
        parse_expressions("${}").unwrap_err(),
        SpelError::EmptyExpression { position: 0 }
    );
    assert_eq!(
        parse_expressions("x ${   }").unwrap_err(),
        SpelError::EmptyExpression { position: 2 }
    );
}

#[test]
fn unterminated_marker_reports_start_and_rest() {
    let err = parse_expressions("a ${foo").unwrap_err();
    assert_eq!(
        err,
        SpelError::NoEndingSuffix {
            position: 2,
            remainder: "${foo".to_string()
        }
    );
    assert_eq!(
        err.to_string(),
        "No ending suffix '}' for expression starting at character 2: ${foo"
    );
}

#[test]
fn closing_bracket_without_opening_fails() {
    let err = parse_expressions("${a)}").unwrap_err();
    assert_eq!(
        err,
        SpelError::UnmatchedClosingBracket {
            bracket: ')',
            opening: '(',
            position: 3
        }
    );
    assert_eq!(
        err.to_string(),
        "Found closing ')' at position 3 without an opening '('"
    );
}

#[test]
fn brace_inside_open_paren_is_a_mismatch() {
    assert_eq!(
        parse_expressions("${a(}").unwrap_err(),
        SpelError::MismatchedBracket {
            bracket: '}',
            position: 4,
            opening: '(',
            opening_position: 3
        }
    );
}

#[test]
fn open_bracket_left_on_stack_fails() {
    let err = parse_expressions("${(a '}'").unwrap_err();
    assert_eq!(
        err,
        SpelError::MissingClosingBracket {
            bracket: '(',
            closing: ')',
            position: 2
        }
    );
    assert_eq!(err.to_string(), "Missing closing ')' for '(' at position 2");
}

#[test]
fn unterminated_quote_fails() {
    assert_eq!(
        parse_expressions("${'abc}").unwrap_err(),
        SpelError::UnterminatedLiteral { position: 2 }
    );
}

#[test]
fn later_marker_errors_abort_whole_parse() {
    assert!(matches!(
        parse_expressions("${ok} and ${}"),
        Err(SpelError::EmptyExpression { position: 10 })
    ));
}
