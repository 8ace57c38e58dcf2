//! End-to-end evaluation scenarios and the read-print round trip

use lone_runtime::value::{Value, is_equal};
use lone_runtime::{Error, Interpreter, Reader, printer};

fn evaluate(source: &str) -> (Interpreter, Value) {
    let mut interpreter = Interpreter::new().unwrap();
    let value = interpreter.evaluate_str(source).unwrap();
    (interpreter, value)
}

#[test]
fn test_addition_scenario() {
    let (_, value) = evaluate("(+ 1 2 3)");
    assert_eq!(value.as_integer(), Some(6));
}

#[test]
fn test_let_arithmetic_scenario() {
    let (_, value) = evaluate("(let (x 10 y (* x 2)) (- y x))");
    assert_eq!(value.as_integer(), Some(10));
}

#[test]
fn test_closure_if_zero_scenario() {
    let (_, value) =
        evaluate("((lambda (n) (if (zero? n) 1 (* n ((lambda (k) (- k 1)) n)))) 5)");
    assert_eq!(value.as_integer(), Some(20));

    let (_, value) =
        evaluate("((lambda (n) (if (zero? n) 1 (* n ((lambda (k) (- k 1)) n)))) 0)");
    assert_eq!(value.as_integer(), Some(1));
}

#[test]
fn test_improper_list_prints_with_dot() {
    let (interpreter, value) = evaluate("'(1 2 . 3)");
    assert_eq!(printer::to_string(&interpreter.heap, value), "(1 2 . 3)");
}

#[test]
fn test_quasiquote_scenario() {
    let (interpreter, value) =
        evaluate("`(1 (unquote (+ 1 1)) (unquote* (list 3 4)))");
    assert_eq!(printer::to_string(&interpreter.heap, value), "(1 2 3 4)");
}

#[test]
fn test_unclosed_form_is_a_fatal_reader_error() {
    let mut interpreter = Interpreter::new().unwrap();
    assert!(matches!(
        interpreter.evaluate_str("(a b"),
        Err(Error::Reader(_))
    ));
}

/// Reads one value, prints it, reads it back, and requires structural
/// equality.
fn assert_round_trip(source: &str) {
    let mut interpreter = Interpreter::new().unwrap();

    let mut reader = Reader::for_bytes(&mut interpreter, source.as_bytes()).unwrap();
    let original = reader.read(&mut interpreter).unwrap().unwrap();
    reader.finish(&mut interpreter);

    let printed = printer::to_string(&interpreter.heap, original);

    let mut reader = Reader::for_bytes(&mut interpreter, printed.as_bytes()).unwrap();
    let reread = reader.read(&mut interpreter).unwrap().unwrap();
    reader.finish(&mut interpreter);

    assert!(
        is_equal(&interpreter.heap, original, reread),
        "round trip failed for {source:?}: printed as {printed:?}"
    );
}

#[test]
fn test_read_print_round_trip() {
    for source in [
        "0",
        "42",
        "-7",
        "\"some text\"",
        "symbol",
        "(1 2 3)",
        "(1 (2 (3)) \"x\")",
        "[1 2 [3]]",
        "(a . 4)",
    ] {
        assert_round_trip(source);
    }
}

#[test]
fn test_nil_round_trips_through_evaluation() {
    // nil prints as the unbound symbol `nil`, which evaluates back to nil
    let (interpreter, value) = evaluate("()");
    assert!(value.is_nil());
    assert_eq!(printer::to_string(&interpreter.heap, value), "nil");

    let (_, value) = evaluate("nil");
    assert!(value.is_nil());
}

#[test]
fn test_garbage_collection_between_top_level_forms_preserves_bindings() {
    let mut interpreter = Interpreter::new().unwrap();
    // load_null_from_source collects after every form; bindings survive
    interpreter
        .load_null_from_source(Box::new(std::io::Cursor::new(
            "(set items (list 1 2 3))
             (set doubled (map (lambda (x) (* x 2)) items))"
                .to_string(),
        )))
        .unwrap();

    let value = interpreter.evaluate_str("(first doubled)").unwrap();
    assert_eq!(value.as_integer(), Some(2));
}

#[test]
fn test_truthiness_is_not_nil() {
    let (_, value) = evaluate("(if 0 'yes 'no)");
    assert!(value.is_truthy());
    let (interpreter, value) = evaluate("(if () 'yes 'no)");
    assert_eq!(printer::to_string(&interpreter.heap, value), "no");
}
