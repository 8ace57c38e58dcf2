//! Module loading, import/export and embedded-module behavior
//!
//! These tests drive the module system through real files in scratch
//! directories and through in-memory embedded tables.

use std::fs;
use std::path::Path;

use lone_runtime::interpreter::Options;
use lone_runtime::value::is_identical;
use lone_runtime::{Error, Interpreter, modules, table};

fn interpreter_with_path(directory: &Path) -> Interpreter {
    Interpreter::with_options(Options {
        module_path: vec![directory.to_path_buf()],
        ..Options::default()
    })
    .unwrap()
}

#[test]
fn test_load_module_from_search_path() {
    let directory = tempfile::tempdir().unwrap();
    fs::write(
        directory.path().join("greeting.ln"),
        "(set hello 42) (export hello)",
    )
    .unwrap();

    let mut interpreter = interpreter_with_path(directory.path());
    let value = interpreter
        .evaluate_str("(import (greeting hello)) hello")
        .unwrap();
    assert_eq!(value.as_integer(), Some(42));
}

#[test]
fn test_bare_symbol_imports_all_exports() {
    let directory = tempfile::tempdir().unwrap();
    fs::write(
        directory.path().join("greeting.ln"),
        "(set hello 1) (set goodbye 2) (export hello goodbye)",
    )
    .unwrap();

    let mut interpreter = interpreter_with_path(directory.path());
    let value = interpreter
        .evaluate_str("(import greeting) (+ hello goodbye)")
        .unwrap();
    assert_eq!(value.as_integer(), Some(3));
}

#[test]
fn test_nested_module_names_map_to_directories() {
    let directory = tempfile::tempdir().unwrap();
    fs::create_dir(directory.path().join("nested")).unwrap();
    fs::write(
        directory.path().join("nested/inner.ln"),
        "(set x 7) (export x)",
    )
    .unwrap();

    let mut interpreter = interpreter_with_path(directory.path());
    let value = interpreter
        .evaluate_str("(import ((nested inner) x)) x")
        .unwrap();
    assert_eq!(value.as_integer(), Some(7));
}

#[test]
fn test_private_symbols_cannot_be_imported() {
    let directory = tempfile::tempdir().unwrap();
    fs::write(
        directory.path().join("greeting.ln"),
        "(set hello 1) (set secret 2) (export hello)",
    )
    .unwrap();

    let mut interpreter = interpreter_with_path(directory.path());
    let error = interpreter
        .evaluate_str("(import (greeting secret))")
        .unwrap_err();
    assert!(matches!(error, Error::Resolution(_)));
}

#[test]
fn test_missing_modules_are_fatal() {
    let directory = tempfile::tempdir().unwrap();
    let mut interpreter = interpreter_with_path(directory.path());
    assert!(matches!(
        interpreter.evaluate_str("(import absent)"),
        Err(Error::Resolution(_))
    ));
}

#[test]
fn test_modules_load_once_and_dedupe_by_canonical_name() {
    let directory = tempfile::tempdir().unwrap();
    fs::write(directory.path().join("single.ln"), "(export) ").unwrap();

    let mut interpreter = interpreter_with_path(directory.path());
    let name = interpreter.intern(b"single").unwrap();
    let first = modules::load(&mut interpreter, name).unwrap();
    let second = modules::load(&mut interpreter, name).unwrap();
    assert!(is_identical(first, second));
}

#[test]
fn test_prefixed_and_unprefixed_toggle() {
    let directory = tempfile::tempdir().unwrap();
    fs::write(
        directory.path().join("greeting.ln"),
        "(set hello 42) (export hello)",
    )
    .unwrap();

    let mut interpreter = interpreter_with_path(directory.path());
    let value = interpreter
        .evaluate_str(
            "(import prefixed (greeting hello) unprefixed (greeting hello))
             (+ greeting.hello hello)",
        )
        .unwrap();
    assert_eq!(value.as_integer(), Some(84));
}

#[test]
fn test_embedded_modules_satisfy_imports_before_the_filesystem() {
    let mut interpreter = Interpreter::new().unwrap();
    let embedded = interpreter
        .evaluate_str("{ (carried) \"(set x 9) (export x)\" }")
        .unwrap();
    interpreter.modules.embedded = embedded;

    let value = interpreter.evaluate_str("(import (carried x)) x").unwrap();
    assert_eq!(value.as_integer(), Some(9));

    // a satisfied embedded entry is removed from the registry
    assert_eq!(table::count(&interpreter.heap, embedded).unwrap(), 0);
}

#[test]
fn test_module_environments_are_isolated_from_the_null_module() {
    let directory = tempfile::tempdir().unwrap();
    fs::write(
        directory.path().join("isolated.ln"),
        "(set internal 5) (set shown internal) (export shown)",
    )
    .unwrap();

    let mut interpreter = interpreter_with_path(directory.path());
    let value = interpreter
        .evaluate_str("(import (isolated shown)) internal")
        .unwrap();
    // `internal` never leaked into the null module
    assert!(value.is_nil());
}
