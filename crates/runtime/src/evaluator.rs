//! Tree-walking evaluator and applicator
//!
//! Everything self-evaluates except symbols, which resolve through the
//! environment's prototype chain (a miss is nil), and lists, which are
//! form applications: the head is evaluated, then applied as a function
//! or primitive, or indexed as a vector or table.
//!
//! There is no syntactic class of special forms. Functions and
//! primitives carry flags saying whether their arguments and result are
//! themselves evaluated; `quote`, `if`, `let` and friends are ordinary
//! primitives whose argument evaluation is turned off.

use lone_core::error::{Error, Result};

use crate::interpreter::Interpreter;
use crate::list::{self, ListBuilder};
use crate::table;
use crate::value::{FunctionFlags, HeapValue, Value};
use crate::vector;

/// Evaluates `value` in the given module and environment.
pub fn evaluate(
    interpreter: &mut Interpreter,
    module: Value,
    environment: Value,
    value: Value,
) -> Result<Value> {
    if value.is_list(&interpreter.heap) {
        evaluate_form(interpreter, module, environment, value)
    } else if value.is_symbol(&interpreter.heap) {
        table::get(&interpreter.heap, environment, value)
    } else {
        Ok(value)
    }
}

/// Evaluates each element of a proper list, preserving order.
pub fn evaluate_all(
    interpreter: &mut Interpreter,
    module: Value,
    environment: Value,
    arguments: Value,
) -> Result<Value> {
    let elements = list::collect_values(&interpreter.heap, arguments)?;
    let mut builder = ListBuilder::new();
    for element in elements {
        let value = evaluate(interpreter, module, environment, element)?;
        builder.push(&mut interpreter.heap, value);
    }
    Ok(builder.finish())
}

/// Evaluates `value` with the module's own environment as top scope.
/// This is what module loading drives.
pub fn evaluate_in_module(
    interpreter: &mut Interpreter,
    module: Value,
    value: Value,
) -> Result<Value> {
    let environment = match module.heap_value(&interpreter.heap) {
        Some(HeapValue::Module(module)) => module.environment,
        _ => return Err(Error::Type("expected a module value".into())),
    };
    evaluate(interpreter, module, environment, value)
}

fn evaluate_form(
    interpreter: &mut Interpreter,
    module: Value,
    environment: Value,
    form: Value,
) -> Result<Value> {
    let head = list::first(&interpreter.heap, form)?;
    let arguments = list::rest(&interpreter.heap, form)?;

    let applicable = evaluate(interpreter, module, environment, head)?;

    if applicable.is_applicable(&interpreter.heap) {
        apply(interpreter, module, environment, applicable, arguments)
    } else if applicable.is_vector(&interpreter.heap) || applicable.is_table(&interpreter.heap) {
        evaluate_form_index(interpreter, module, environment, applicable, arguments)
    } else {
        Err(Error::Type(
            "first element of a form is not applicable".into(),
        ))
    }
}

/// Collection access: one argument reads, two arguments write and yield
/// the written value.
fn evaluate_form_index(
    interpreter: &mut Interpreter,
    module: Value,
    environment: Value,
    collection: Value,
    arguments: Value,
) -> Result<Value> {
    if arguments.is_nil() {
        return Err(Error::Arity("collection access requires a key".into()));
    }
    let key_expression = list::first(&interpreter.heap, arguments)?;
    let arguments = list::rest(&interpreter.heap, arguments)?;
    let key = evaluate(interpreter, module, environment, key_expression)?;

    if arguments.is_nil() {
        return if collection.is_vector(&interpreter.heap) {
            vector::get(&interpreter.heap, collection, key)
        } else {
            table::get(&interpreter.heap, collection, key)
        };
    }

    let value_expression = list::first(&interpreter.heap, arguments)?;
    let arguments = list::rest(&interpreter.heap, arguments)?;
    if !arguments.is_nil() {
        return Err(Error::Arity(
            "collection access takes a key and at most one value".into(),
        ));
    }

    let value = evaluate(interpreter, module, environment, value_expression)?;
    if collection.is_vector(&interpreter.heap) {
        vector::set(&mut interpreter.heap, collection, key, value)?;
    } else {
        table::set(&mut interpreter.heap, collection, key, value)?;
    }
    Ok(value)
}

/// Applies a function or primitive to a raw argument list.
pub fn apply(
    interpreter: &mut Interpreter,
    module: Value,
    environment: Value,
    applicable: Value,
    arguments: Value,
) -> Result<Value> {
    match applicable.heap_value(&interpreter.heap) {
        Some(HeapValue::Function(function)) => {
            let (names, code, closure, flags) = (
                function.arguments,
                function.code,
                function.environment,
                function.flags,
            );
            apply_function(
                interpreter,
                module,
                environment,
                names,
                code,
                closure,
                flags,
                arguments,
            )
        }
        Some(HeapValue::Primitive(primitive)) => {
            let (function, closure, flags) =
                (primitive.function, primitive.closure, primitive.flags);

            let arguments = if flags.contains(FunctionFlags::EVALUATE_ARGUMENTS) {
                evaluate_all(interpreter, module, environment, arguments)?
            } else {
                arguments
            };

            let mut result = function(interpreter, module, environment, arguments, closure)?;

            if flags.contains(FunctionFlags::EVALUATE_RESULT) {
                result = evaluate(interpreter, module, environment, result)?;
            }
            Ok(result)
        }
        _ => Err(Error::Type("expected a function or primitive".into())),
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_function(
    interpreter: &mut Interpreter,
    module: Value,
    environment: Value,
    names: Value,
    code: Value,
    closure: Value,
    flags: FunctionFlags,
    arguments: Value,
) -> Result<Value> {
    let arguments = if flags.contains(FunctionFlags::EVALUATE_ARGUMENTS) {
        evaluate_all(interpreter, module, environment, arguments)?
    } else {
        arguments
    };

    // fresh scope whose prototype is the captured closure environment
    let scope = table::create(&mut interpreter.heap, 16, closure);

    if flags.contains(FunctionFlags::VARIABLE_ARGUMENTS) {
        let [name] = list::destructure::<1>(&interpreter.heap, names).map_err(|_| {
            Error::Arity("variadic function takes exactly one parameter".into())
        })?;
        table::set(&mut interpreter.heap, scope, name, arguments)?;
    } else {
        let mut names = names;
        let mut remaining = arguments;
        loop {
            match (names.is_nil(), remaining.is_nil()) {
                (true, true) => break,
                (true, false) => {
                    return Err(Error::Arity("too many arguments".into()));
                }
                (false, true) => {
                    return Err(Error::Arity("too few arguments".into()));
                }
                (false, false) => {}
            }

            let name = list::first(&interpreter.heap, names)?;
            let argument = list::first(&interpreter.heap, remaining)?;
            table::set(&mut interpreter.heap, scope, name, argument)?;

            names = list::rest(&interpreter.heap, names)?;
            remaining = list::rest(&interpreter.heap, remaining)?;
        }
    }

    let mut result = Value::Nil;
    let mut body = code;
    while !body.is_nil() {
        let expression = list::first(&interpreter.heap, body)?;
        result = evaluate(interpreter, module, scope, expression)?;
        body = list::rest(&interpreter.heap, body)?;
    }

    if flags.contains(FunctionFlags::EVALUATE_RESULT) {
        result = evaluate(interpreter, module, environment, result)?;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluate_source(source: &str) -> Result<(Interpreter, Value)> {
        let mut interpreter = Interpreter::new()?;
        let value = interpreter.evaluate_str(source)?;
        Ok((interpreter, value))
    }

    fn integer_result(source: &str) -> i64 {
        let (_, value) = evaluate_source(source).unwrap();
        value.as_integer().unwrap()
    }

    #[test]
    fn test_self_evaluating_values() {
        assert_eq!(integer_result("42"), 42);
        let (_, value) = evaluate_source("\"text\"").unwrap();
        assert!(value.is_heap_value());
    }

    #[test]
    fn test_unbound_symbols_evaluate_to_nil() {
        let (_, value) = evaluate_source("no-such-binding").unwrap();
        assert!(value.is_nil());
    }

    #[test]
    fn test_lexical_scoping() {
        // ((lambda (x) (lambda (y) x)) 1) applied to 2 yields 1
        assert_eq!(integer_result("(((lambda (x) (lambda (y) x)) 1) 2)"), 1);
    }

    #[test]
    fn test_let_bindings_are_sequential() {
        assert_eq!(integer_result("(let (x 1 y x) y)"), 1);
        assert_eq!(integer_result("(let (x 10 y (* x 2)) (- y x))"), 10);
    }

    #[test]
    fn test_fixed_arity_is_strict() {
        assert!(matches!(
            evaluate_source("((lambda (x) x) 1 2)"),
            Err(Error::Arity(_))
        ));
        assert!(matches!(
            evaluate_source("((lambda (x y) y) 1)"),
            Err(Error::Arity(_))
        ));
    }

    #[test]
    fn test_variadic_lambda_binds_the_whole_list() {
        assert_eq!(integer_result("((lambda* (args) (first args)) 7 8 9)"), 7);
    }

    #[test]
    fn test_function_body_evaluates_in_sequence() {
        assert_eq!(integer_result("((lambda () 1 2 3))"), 3);
    }

    #[test]
    fn test_collection_access_forms() {
        assert_eq!(integer_result("([10 20 30] 1)"), 20);
        assert_eq!(integer_result("({ a 1 b 2 } 'b)"), 2);
        // two arguments write and return the written value
        assert_eq!(integer_result("(let (v [1]) (v 0 5) (v 0))"), 5);
        assert_eq!(integer_result("(let (t { a 1 }) (t 'a 9))"), 9);
    }

    #[test]
    fn test_collection_access_arity_is_checked() {
        assert!(matches!(
            evaluate_source("([1 2])"),
            Err(Error::Arity(_))
        ));
        assert!(matches!(
            evaluate_source("([1 2] 0 1 2)"),
            Err(Error::Arity(_))
        ));
    }

    #[test]
    fn test_non_applicable_head_is_a_type_error() {
        assert!(matches!(evaluate_source("(1 2 3)"), Err(Error::Type(_))));
    }

    #[test]
    fn test_arguments_evaluate_left_to_right() {
        let source = "
            (set order [])
            (set note (lambda (n) (order (count order) n) n))
            (+ (note 1) (note 2) (note 3))
            order
        ";
        // count comes from the vector module via the top level environment
        let (interpreter, value) = evaluate_source(&format!(
            "(import (vector count)) {}",
            source
        ))
        .unwrap();
        let heap = &interpreter.heap;
        assert_eq!(vector::count(heap, value).unwrap(), 3);
        for index in 0..3 {
            assert_eq!(
                vector::get_at(heap, value, index).unwrap().as_integer(),
                Some(index as i64 + 1)
            );
        }
    }
}
