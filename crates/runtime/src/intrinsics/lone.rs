//! The `lone` module: special forms, predicates, equality and print
//!
//! The special forms take their arguments unevaluated and drive the
//! evaluator themselves; that is the whole trick behind `quote`, `if`
//! and `let` being ordinary primitives.

use std::io::Write;

use lone_core::error::{Error, Result};

use crate::evaluator::evaluate;
use crate::heap::Heap;
use crate::interpreter::Interpreter;
use crate::intrinsics::{apply_comparator, apply_predicate};
use crate::list;
use crate::modules;
use crate::printer;
use crate::table;
use crate::value::{
    Function, FunctionFlags, HeapValue, Value, is_equal, is_equivalent, is_identical,
};

pub fn initialize(interpreter: &mut Interpreter) -> Result<()> {
    let name = interpreter.intern_static("lone")?;
    let module = modules::for_name(interpreter, name)?;
    let unevaluated = FunctionFlags::empty();

    modules::export_primitive(interpreter, module, "begin", "begin", begin, module, unevaluated)?;
    modules::export_primitive(interpreter, module, "when", "when", when, module, unevaluated)?;
    modules::export_primitive(interpreter, module, "unless", "unless", unless, module, unevaluated)?;
    modules::export_primitive(interpreter, module, "if", "if", r#if, module, unevaluated)?;
    modules::export_primitive(interpreter, module, "let", "let", r#let, module, unevaluated)?;
    modules::export_primitive(interpreter, module, "set", "set", set, module, unevaluated)?;
    modules::export_primitive(interpreter, module, "quote", "quote", quote, module, unevaluated)?;
    modules::export_primitive(
        interpreter,
        module,
        "quasiquote",
        "quasiquote",
        quasiquote,
        module,
        unevaluated,
    )?;
    modules::export_primitive(interpreter, module, "lambda", "lambda", lambda, module, unevaluated)?;
    modules::export_primitive(
        interpreter,
        module,
        "lambda!",
        "lambda_bang",
        lambda_bang,
        module,
        unevaluated,
    )?;
    modules::export_primitive(
        interpreter,
        module,
        "lambda*",
        "lambda_star",
        lambda_star,
        module,
        unevaluated,
    )?;

    let evaluated = FunctionFlags::EVALUATE_ARGUMENTS;

    modules::export_primitive(interpreter, module, "print", "print", print, module, evaluated)?;
    modules::export_primitive(interpreter, module, "list?", "is_list", is_list, module, evaluated)?;
    modules::export_primitive(
        interpreter,
        module,
        "vector?",
        "is_vector",
        is_vector,
        module,
        evaluated,
    )?;
    modules::export_primitive(
        interpreter,
        module,
        "table?",
        "is_table",
        is_table,
        module,
        evaluated,
    )?;
    modules::export_primitive(
        interpreter,
        module,
        "symbol?",
        "is_symbol",
        is_symbol,
        module,
        evaluated,
    )?;
    modules::export_primitive(interpreter, module, "text?", "is_text", is_text, module, evaluated)?;
    modules::export_primitive(
        interpreter,
        module,
        "integer?",
        "is_integer",
        is_integer,
        module,
        evaluated,
    )?;
    modules::export_primitive(
        interpreter,
        module,
        "identical?",
        "is_identical",
        identical,
        module,
        evaluated,
    )?;
    modules::export_primitive(
        interpreter,
        module,
        "equivalent?",
        "is_equivalent",
        equivalent,
        module,
        evaluated,
    )?;
    modules::export_primitive(interpreter, module, "equal?", "is_equal", equal, module, evaluated)?;

    modules::bind_exports_to_top_level(interpreter, module)
}

/// `(begin body...)`: evaluates in sequence, yields the last value.
fn begin(
    interpreter: &mut Interpreter,
    module: Value,
    environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let mut result = Value::Nil;
    let mut remaining = arguments;
    while !remaining.is_nil() {
        let expression = list::first(&interpreter.heap, remaining)?;
        result = evaluate(interpreter, module, environment, expression)?;
        remaining = list::rest(&interpreter.heap, remaining)?;
    }
    Ok(result)
}

/// `(when test body...)`
fn when(
    interpreter: &mut Interpreter,
    module: Value,
    environment: Value,
    arguments: Value,
    closure: Value,
) -> Result<Value> {
    if arguments.is_nil() {
        return Err(Error::Arity("when requires a test".into()));
    }
    let test = list::first(&interpreter.heap, arguments)?;
    let body = list::rest(&interpreter.heap, arguments)?;

    if evaluate(interpreter, module, environment, test)?.is_truthy() {
        begin(interpreter, module, environment, body, closure)
    } else {
        Ok(Value::Nil)
    }
}

/// `(unless test body...)`
fn unless(
    interpreter: &mut Interpreter,
    module: Value,
    environment: Value,
    arguments: Value,
    closure: Value,
) -> Result<Value> {
    if arguments.is_nil() {
        return Err(Error::Arity("unless requires a test".into()));
    }
    let test = list::first(&interpreter.heap, arguments)?;
    let body = list::rest(&interpreter.heap, arguments)?;

    if evaluate(interpreter, module, environment, test)?.is_truthy() {
        Ok(Value::Nil)
    } else {
        begin(interpreter, module, environment, body, closure)
    }
}

/// `(if test consequent alternative?)`: extra arguments are fatal.
fn r#if(
    interpreter: &mut Interpreter,
    module: Value,
    environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    if arguments.is_nil() {
        return Err(Error::Arity("if requires a test".into()));
    }
    let test = list::first(&interpreter.heap, arguments)?;
    let arguments = list::rest(&interpreter.heap, arguments)?;

    if arguments.is_nil() {
        return Err(Error::Arity("if requires a consequent".into()));
    }
    let consequent = list::first(&interpreter.heap, arguments)?;
    let arguments = list::rest(&interpreter.heap, arguments)?;

    let alternative = if arguments.is_nil() {
        Value::Nil
    } else {
        let alternative = list::first(&interpreter.heap, arguments)?;
        if !list::rest(&interpreter.heap, arguments)?.is_nil() {
            return Err(Error::Arity("if takes at most three forms".into()));
        }
        alternative
    };

    if evaluate(interpreter, module, environment, test)?.is_truthy() {
        evaluate(interpreter, module, environment, consequent)
    } else {
        evaluate(interpreter, module, environment, alternative)
    }
}

/// `(let (n1 v1 n2 v2 ...) body...)`: bindings are sequential and each
/// value sees the bindings before it.
fn r#let(
    interpreter: &mut Interpreter,
    module: Value,
    environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    if arguments.is_nil() {
        return Err(Error::Arity("let requires a binding list".into()));
    }
    let bindings = list::first(&interpreter.heap, arguments)?;
    if !bindings.is_list_or_nil(&interpreter.heap) {
        return Err(Error::Type("let bindings must be a list".into()));
    }

    let scope = table::create(&mut interpreter.heap, 8, environment);

    let mut remaining = bindings;
    while !remaining.is_nil() {
        let name = list::first(&interpreter.heap, remaining)?;
        if !name.is_symbol(&interpreter.heap) {
            return Err(Error::Type("let binding names must be symbols".into()));
        }
        let rest = list::rest(&interpreter.heap, remaining)?;
        if rest.is_nil() {
            return Err(Error::Arity("let binding without a value".into()));
        }
        let expression = list::first(&interpreter.heap, rest)?;
        let value = evaluate(interpreter, module, scope, expression)?;
        table::set(&mut interpreter.heap, scope, name, value)?;
        remaining = list::rest(&interpreter.heap, rest)?;
    }

    let mut result = Value::Nil;
    let mut body = list::rest(&interpreter.heap, arguments)?;
    while !body.is_nil() {
        let expression = list::first(&interpreter.heap, body)?;
        result = evaluate(interpreter, module, scope, expression)?;
        body = list::rest(&interpreter.heap, body)?;
    }
    Ok(result)
}

/// `(set name value?)`: binds in the current environment, yields the
/// value.
fn set(
    interpreter: &mut Interpreter,
    module: Value,
    environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    if arguments.is_nil() {
        return Err(Error::Arity("set requires a variable name".into()));
    }
    let name = list::first(&interpreter.heap, arguments)?;
    if !name.is_symbol(&interpreter.heap) {
        return Err(Error::Type("variable names must be symbols".into()));
    }

    let arguments = list::rest(&interpreter.heap, arguments)?;
    let expression = if arguments.is_nil() {
        Value::Nil
    } else {
        let expression = list::first(&interpreter.heap, arguments)?;
        if !list::rest(&interpreter.heap, arguments)?.is_nil() {
            return Err(Error::Arity("set takes a name and at most one value".into()));
        }
        expression
    };

    let value = evaluate(interpreter, module, environment, expression)?;
    table::set(&mut interpreter.heap, environment, name, value)?;
    Ok(value)
}

/// `(quote x)`: exactly one argument, returned untouched.
fn quote(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let [value] = list::destructure::<1>(&interpreter.heap, arguments)?;
    Ok(value)
}

/// `(quasiquote form)`: copies the form, replacing `(unquote e)` with
/// the value of `e` and splicing `(unquote* e)` when it evaluates to a
/// list.
fn quasiquote(
    interpreter: &mut Interpreter,
    module: Value,
    environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let [form] = list::destructure::<1>(&interpreter.heap, arguments)?;
    if !form.is_list(&interpreter.heap) {
        return Ok(form);
    }

    let unquote = interpreter.intern_static("unquote")?;
    let splice = interpreter.intern_static("unquote*")?;

    let elements = list::collect_values(&interpreter.heap, form)?;
    let mut builder = list::ListBuilder::new();

    for element in elements {
        let escape = if element.is_list(&interpreter.heap) {
            let head = list::first(&interpreter.heap, element)?;
            if is_equivalent(&interpreter.heap, head, unquote) {
                Some(false)
            } else if is_equivalent(&interpreter.heap, head, splice) {
                Some(true)
            } else {
                None
            }
        } else {
            None
        };

        match escape {
            None => builder.push(&mut interpreter.heap, element),
            Some(splicing) => {
                let rest = list::rest(&interpreter.heap, element)?;
                let [expression] =
                    list::destructure::<1>(&interpreter.heap, rest).map_err(|_| {
                        Error::Arity("unquote takes exactly one form".into())
                    })?;
                let result = evaluate(interpreter, module, environment, expression)?;

                if splicing && result.is_list(&interpreter.heap) {
                    for value in list::collect_values(&interpreter.heap, result)? {
                        builder.push(&mut interpreter.heap, value);
                    }
                } else {
                    builder.push(&mut interpreter.heap, result);
                }
            }
        }
    }

    Ok(builder.finish())
}

fn lambda_with_flags(
    interpreter: &mut Interpreter,
    environment: Value,
    arguments: Value,
    flags: FunctionFlags,
) -> Result<Value> {
    let bindings = list::first(&interpreter.heap, arguments)?;
    if !bindings.is_list_or_nil(&interpreter.heap) {
        return Err(Error::Type("lambda parameters must be a list".into()));
    }
    let code = list::rest(&interpreter.heap, arguments)?;

    Ok(interpreter.heap.allocate(HeapValue::Function(Function {
        arguments: bindings,
        code,
        environment,
        flags,
    })))
}

/// `(lambda params body...)`: arguments evaluate at the call site.
fn lambda(
    interpreter: &mut Interpreter,
    _module: Value,
    environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    lambda_with_flags(
        interpreter,
        environment,
        arguments,
        FunctionFlags::EVALUATE_ARGUMENTS,
    )
}

/// `(lambda! params body...)`: the macro-like form, arguments arrive raw.
fn lambda_bang(
    interpreter: &mut Interpreter,
    _module: Value,
    environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    lambda_with_flags(interpreter, environment, arguments, FunctionFlags::empty())
}

/// `(lambda* (args) body...)`: the single parameter receives the whole
/// argument list.
fn lambda_star(
    interpreter: &mut Interpreter,
    _module: Value,
    environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    lambda_with_flags(
        interpreter,
        environment,
        arguments,
        FunctionFlags::EVALUATE_ARGUMENTS | FunctionFlags::VARIABLE_ARGUMENTS,
    )
}

/// `(print v...)`: writes each value and a newline to standard output.
fn print(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let values = list::collect_values(&interpreter.heap, arguments)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for value in values {
        printer::print(&interpreter.heap, value, &mut out)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(Value::Nil)
}

fn is_list(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    apply_predicate(interpreter, arguments, Value::is_list)
}

fn is_vector(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    apply_predicate(interpreter, arguments, Value::is_vector)
}

fn is_table(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    apply_predicate(interpreter, arguments, Value::is_table)
}

fn is_symbol(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    apply_predicate(interpreter, arguments, Value::is_symbol)
}

fn is_text(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    apply_predicate(interpreter, arguments, Value::is_text)
}

fn is_integer(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    apply_predicate(interpreter, arguments, |value, _| value.is_integer())
}

fn identical(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    apply_comparator(interpreter, arguments, |_, x, y| Ok(is_identical(x, y)))
}

fn equivalent(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    apply_comparator(interpreter, arguments, comparator_equivalent)
}

fn equal(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    apply_comparator(interpreter, arguments, comparator_equal)
}

fn comparator_equivalent(heap: &Heap, x: Value, y: Value) -> Result<bool> {
    Ok(is_equivalent(heap, x, y))
}

fn comparator_equal(heap: &Heap, x: Value, y: Value) -> Result<bool> {
    Ok(is_equal(heap, x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn integer_result(source: &str) -> i64 {
        let mut interpreter = Interpreter::new().unwrap();
        interpreter
            .evaluate_str(source)
            .unwrap()
            .as_integer()
            .unwrap()
    }

    fn result(source: &str) -> (Interpreter, Value) {
        let mut interpreter = Interpreter::new().unwrap();
        let value = interpreter.evaluate_str(source).unwrap();
        (interpreter, value)
    }

    #[test]
    fn test_quote_returns_the_raw_form() {
        let (interpreter, value) = result("(quote (+ 1 2))");
        assert!(value.is_list(&interpreter.heap));
    }

    #[test]
    fn test_quote_arity() {
        let mut interpreter = Interpreter::new().unwrap();
        assert!(matches!(
            interpreter.evaluate_str("(quote)"),
            Err(Error::Arity(_))
        ));
        assert!(matches!(
            interpreter.evaluate_str("(quote a b)"),
            Err(Error::Arity(_))
        ));
    }

    #[test]
    fn test_if_branches_on_truthiness() {
        assert_eq!(integer_result("(if 0 1 2)"), 1); // zero is truthy
        assert_eq!(integer_result("(if () 1 2)"), 2);
        assert_eq!(integer_result("(if 'anything 1 2)"), 1);
    }

    #[test]
    fn test_if_with_too_many_forms_is_fatal() {
        let mut interpreter = Interpreter::new().unwrap();
        assert!(matches!(
            interpreter.evaluate_str("(if 1 2 3 4)"),
            Err(Error::Arity(_))
        ));
    }

    #[test]
    fn test_when_and_unless() {
        assert_eq!(integer_result("(when 1 2 3)"), 3);
        let (_, value) = result("(when () 1)");
        assert!(value.is_nil());
        assert_eq!(integer_result("(unless () 5)"), 5);
        let (_, value) = result("(unless 1 5)");
        assert!(value.is_nil());
    }

    #[test]
    fn test_begin_yields_the_last_value() {
        assert_eq!(integer_result("(begin 1 2 3)"), 3);
        let (_, value) = result("(begin)");
        assert!(value.is_nil());
    }

    #[test]
    fn test_set_binds_and_returns_the_value() {
        assert_eq!(integer_result("(set x 4)"), 4);
        assert_eq!(integer_result("(set x 4) (+ x 1)"), 5);
        let (_, value) = result("(set x)");
        assert!(value.is_nil());
    }

    #[test]
    fn test_lambda_bang_receives_raw_arguments() {
        // the argument (+ 1 2) arrives as a list, not as 3
        let (interpreter, value) = result("((lambda! (form) form) (+ 1 2))");
        assert!(value.is_list(&interpreter.heap));
    }

    #[test]
    fn test_quasiquote_with_unquote_and_splice() {
        let (interpreter, value) =
            result("`(1 (unquote (+ 1 1)) (unquote* (list 3 4)))");
        let heap = &interpreter.heap;
        let values = list::collect_values(heap, value).unwrap();
        let integers: Vec<i64> = values.iter().map(|v| v.as_integer().unwrap()).collect();
        assert_eq!(integers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_quasiquote_splice_of_non_list_inserts_the_value() {
        let (interpreter, value) = result("`((unquote* 9))");
        let values = list::collect_values(&interpreter.heap, value).unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].as_integer(), Some(9));
    }

    #[test]
    fn test_predicates_return_true_or_nil() {
        let (interpreter, value) = result("(list? '(1))");
        assert!(is_identical(value, interpreter.constants.truth));
        let (_, value) = result("(list? 1)");
        assert!(value.is_nil());
        let (interpreter, value) = result("(integer? 1)");
        assert!(is_identical(value, interpreter.constants.truth));
        let (interpreter, value) = result("(symbol? 'a)");
        assert!(is_identical(value, interpreter.constants.truth));
    }

    #[test]
    fn test_equality_primitives() {
        let (interpreter, value) = result("(equal? '(1 2) '(1 2))");
        assert!(is_identical(value, interpreter.constants.truth));
        let (_, value) = result("(identical? '(1 2) '(1 2))");
        assert!(value.is_nil());
        let (interpreter, value) = result("(equivalent? \"ab\" \"ab\")");
        assert!(is_identical(value, interpreter.constants.truth));
        // chained comparison over three equal values
        let (interpreter, value) = result("(equal? 1 1 1)");
        assert!(is_identical(value, interpreter.constants.truth));
    }
}
