use sigcomp_parser::{parse, parse_equation};

#[test]
fn unknown_identifier_is_rejected() {
    let err = parse("foo(t)").unwrap_err();
    assert!(err.message.contains("unknown identifier 'foo'"));
    assert_eq!(err.position, 0);
    assert_eq!(err.found_token.as_deref(), Some("foo"));
}

#[test]
fn code_like_input_is_rejected() {
    assert!(parse("__import__(os)").is_err());
    assert!(parse("t; s").is_err());
    assert!(parse("open(t)").is_err());
}

#[test]
fn syntax_errors_report_position() {
    let err = parse("t +").unwrap_err();
    assert_eq!(err.position, 3);
    assert!(err.found_token.is_none());

    let err = parse("(t+1").unwrap_err();
    assert_eq!(err.expected.as_deref(), Some("')'"));

    let err = parse("t t").unwrap_err();
    assert!(err.to_string().starts_with("Parse error at position 2"));
    assert!(err.to_string().contains("(found: 't')"));
}

#[test]
fn empty_and_invalid_characters() {
    let err = parse("   ").unwrap_err();
    assert_eq!(err.message, "empty expression");

    let err = parse("t $ 1").unwrap_err();
    assert!(err.message.contains("Invalid token"));
    assert_eq!(err.found_token.as_deref(), Some("$"));
}

#[test]
fn function_needs_arguments() {
    assert!(parse("sin").is_err());
    assert!(parse("sin()").is_err());
    let err = parse("exp(t, s)").unwrap_err();
    assert!(err.message.contains("expects 1 argument"));
}

#[test]
fn signals_only_in_equations() {
    let err = parse("x(t)").unwrap_err();
    assert!(err.message.contains("only allowed in system equations"));
    assert!(parse_equation("y(t) = x(t)").is_ok());
    assert!(parse_equation("y = x").is_err());
    assert!(parse_equation("y(t) = x(t) = 1").is_err());
}

#[test]
fn positions_refer_to_the_typed_text() {
    let err = parse("u(t)+foo").unwrap_err();
    assert_eq!(err.position, 5);
    assert_eq!(err.found_token.as_deref(), Some("foo"));

    let err = parse("δ(t)*bar").unwrap_err();
    assert_eq!(err.position, "δ(t)*".len());

    let err = parse("u(t)+").unwrap_err();
    assert_eq!(err.position, 5);
    assert!(err.found_token.is_none());
}
