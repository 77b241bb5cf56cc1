use super::*;

#[test]
fn retryable_kinds_match_taxonomy() {
    assert!(ErrorKind::IoRead.is_retryable());
    assert!(ErrorKind::WorkerCrash.is_retryable());
    assert!(ErrorKind::DbWrite.is_retryable());
    assert!(ErrorKind::Protocol.is_retryable());
    assert!(!ErrorKind::RouterUnmatched.is_retryable());
    assert!(!ErrorKind::ExtractError.is_retryable());
}

#[test]
fn non_fatal_kinds_are_lex_and_parse_only() {
    assert!(ErrorKind::LexError.is_non_fatal());
    assert!(ErrorKind::ParseError.is_non_fatal());
    assert!(!ErrorKind::WorkerCrash.is_non_fatal());
}

#[test]
fn kind_serializes_to_snake_case() {
    let json = serde_json::to_string(&ErrorKind::WorkerCrash).unwrap();
    assert_eq!(json, "\"worker_crash\"");
}

#[test]
fn step_error_display_includes_kind_and_message() {
    let err = StepError::new(ErrorKind::ExtractError, "bad node").with_node_path("0/2/1");
    assert_eq!(err.to_string(), "extract_error: bad node");
    assert_eq!(err.node_path.as_deref(), Some("0/2/1"));
}

#[test]
fn diagnostic_display_is_line_column_message() {
    let d = Diagnostic::new(3, 7, "unexpected token");
    assert_eq!(d.to_string(), "3:7: unexpected token");
}
