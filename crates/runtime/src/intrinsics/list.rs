//! The `list` module: construct, first, rest, map, reduce, flatten
//!
//! Also exports `list`, the variadic list builder, which simply returns
//! its evaluated argument list.

use lone_core::error::{Error, Result};

use crate::evaluator::apply;
use crate::interpreter::Interpreter;
use crate::list;
use crate::modules;
use crate::value::{FunctionFlags, Value};

pub fn initialize(interpreter: &mut Interpreter) -> Result<()> {
    let name = interpreter.intern_static("list")?;
    let module = modules::for_name(interpreter, name)?;
    let flags = FunctionFlags::EVALUATE_ARGUMENTS;

    modules::export_primitive(interpreter, module, "list", "list", build, module, flags)?;
    modules::export_primitive(
        interpreter,
        module,
        "construct",
        "construct",
        construct,
        module,
        flags,
    )?;
    modules::export_primitive(interpreter, module, "first", "first", first, module, flags)?;
    modules::export_primitive(interpreter, module, "rest", "rest", rest, module, flags)?;
    modules::export_primitive(interpreter, module, "map", "map", map, module, flags)?;
    modules::export_primitive(interpreter, module, "reduce", "reduce", reduce, module, flags)?;
    modules::export_primitive(interpreter, module, "flatten", "flatten", flatten, module, flags)?;

    modules::bind_exports_to_top_level(interpreter, module)
}

/// `(list v...)`: the evaluated arguments, as a list.
fn build(
    _interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    Ok(arguments)
}

/// `(construct first rest)`: one new pair.
fn construct(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let [first, rest] = list::destructure::<2>(&interpreter.heap, arguments)?;
    Ok(list::cons(&mut interpreter.heap, first, rest))
}

fn first(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let [value] = list::destructure::<1>(&interpreter.heap, arguments)?;
    list::first(&interpreter.heap, value)
}

fn rest(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let [value] = list::destructure::<1>(&interpreter.heap, arguments)?;
    list::rest(&interpreter.heap, value)
}

/// `(map f list)`: applies `f` to each element, yielding the results in
/// order.
fn map(
    interpreter: &mut Interpreter,
    module: Value,
    environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let [function, target] = list::destructure::<2>(&interpreter.heap, arguments)?;
    if !function.is_applicable(&interpreter.heap) {
        return Err(Error::Type("map requires an applicable value".into()));
    }
    if target.is_nil() {
        return Ok(Value::Nil);
    }
    if !target.is_list(&interpreter.heap) {
        return Err(Error::Type("map requires a list".into()));
    }

    let elements = list::collect_values(&interpreter.heap, target)?;
    let mut builder = list::ListBuilder::new();
    for element in elements {
        let call_arguments = list::from_slice(&mut interpreter.heap, &[element]);
        let result = apply(interpreter, module, environment, function, call_arguments)?;
        builder.push(&mut interpreter.heap, result);
    }
    Ok(builder.finish())
}

/// `(reduce f initial list)`: folds left with `f` of accumulator and
/// element.
fn reduce(
    interpreter: &mut Interpreter,
    module: Value,
    environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let [function, initial, target] = list::destructure::<3>(&interpreter.heap, arguments)?;
    if !function.is_applicable(&interpreter.heap) {
        return Err(Error::Type("reduce requires an applicable value".into()));
    }
    if target.is_nil() {
        return Ok(initial);
    }
    if !target.is_list(&interpreter.heap) {
        return Err(Error::Type("reduce requires a list".into()));
    }

    let elements = list::collect_values(&interpreter.heap, target)?;
    let mut accumulator = initial;
    for element in elements {
        let call_arguments = list::from_slice(&mut interpreter.heap, &[accumulator, element]);
        accumulator = apply(interpreter, module, environment, function, call_arguments)?;
    }
    Ok(accumulator)
}

/// `(flatten v...)`: splices every nested list in the argument list.
fn flatten(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    list::flatten(&mut interpreter.heap, arguments)
}
