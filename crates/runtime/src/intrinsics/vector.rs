//! The `vector` module: get, set, slice, each, count
//!
//! Shares operation names with the table module, so its exports stay
//! behind explicit imports instead of the top-level environment.

use lone_core::error::{Error, Result};

use crate::evaluator::apply;
use crate::interpreter::Interpreter;
use crate::list;
use crate::modules;
use crate::value::{FunctionFlags, Value};
use crate::vector;

pub fn initialize(interpreter: &mut Interpreter) -> Result<()> {
    let name = interpreter.intern_static("vector")?;
    let module = modules::for_name(interpreter, name)?;
    let flags = FunctionFlags::EVALUATE_ARGUMENTS;

    modules::export_primitive(interpreter, module, "get", "vector_get", get, module, flags)?;
    modules::export_primitive(interpreter, module, "set", "vector_set", set, module, flags)?;
    modules::export_primitive(interpreter, module, "slice", "vector_slice", slice, module, flags)?;
    modules::export_primitive(interpreter, module, "each", "vector_each", each, module, flags)?;
    modules::export_primitive(interpreter, module, "count", "vector_count", count, module, flags)?;
    Ok(())
}

fn expect_vector(interpreter: &Interpreter, value: Value) -> Result<Value> {
    if value.is_vector(&interpreter.heap) {
        Ok(value)
    } else {
        Err(Error::Type("expected a vector value".into()))
    }
}

fn get(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let [target, index] = list::destructure::<2>(&interpreter.heap, arguments)?;
    let target = expect_vector(interpreter, target)?;
    vector::get(&interpreter.heap, target, index)
}

fn set(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let [target, index, value] = list::destructure::<3>(&interpreter.heap, arguments)?;
    let target = expect_vector(interpreter, target)?;
    vector::set(&mut interpreter.heap, target, index, value)?;
    Ok(Value::Nil)
}

/// `(slice v start end?)`: a fresh vector of the half-open range.
fn slice(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let values = list::collect_values(&interpreter.heap, arguments)?;
    if !(2..=3).contains(&values.len()) {
        return Err(Error::Arity("slice takes a vector, a start and an optional end".into()));
    }

    let target = expect_vector(interpreter, values[0])?;
    let start = index_from(values[1])?;
    let end = match values.get(2) {
        Some(&end) => index_from(end)?,
        None => vector::count(&interpreter.heap, target)?,
    };

    let result = vector::create(&mut interpreter.heap, end.saturating_sub(start));
    for (position, index) in (start..end).enumerate() {
        let value = vector::get_at(&interpreter.heap, target, index)?;
        vector::set_at(&mut interpreter.heap, result, position, value)?;
    }
    Ok(result)
}

fn index_from(value: Value) -> Result<usize> {
    let Some(index) = value.as_integer() else {
        return Err(Error::Type("slice indices must be integers".into()));
    };
    usize::try_from(index)
        .map_err(|_| Error::Resolution(format!("slice index {} out of range", index)))
}

/// `(each v f)`: applies `f` to each element in index order; yields the
/// last result.
fn each(
    interpreter: &mut Interpreter,
    module: Value,
    environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let [target, function] = list::destructure::<2>(&interpreter.heap, arguments)?;
    let target = expect_vector(interpreter, target)?;
    if !function.is_applicable(&interpreter.heap) {
        return Err(Error::Type("each requires an applicable value".into()));
    }

    let mut result = Value::Nil;
    for element in vector::values(&interpreter.heap, target)? {
        let call_arguments = list::from_slice(&mut interpreter.heap, &[element]);
        result = apply(interpreter, module, environment, function, call_arguments)?;
    }
    Ok(result)
}

fn count(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let [target] = list::destructure::<1>(&interpreter.heap, arguments)?;
    let target = expect_vector(interpreter, target)?;
    Ok(Value::Integer(vector::count(&interpreter.heap, target)? as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::to_string;

    fn printed(source: &str) -> String {
        let mut interpreter = Interpreter::new().unwrap();
        let program = format!("(import vector) {}", source);
        let value = interpreter.evaluate_str(&program).unwrap();
        to_string(&interpreter.heap, value)
    }

    #[test]
    fn test_get_set_and_count() {
        assert_eq!(printed("(get [1 2 3] 1)"), "2");
        assert_eq!(printed("(let (v [1 2 3]) (set v 0 9) v)"), "[ 9 2 3 ]");
        assert_eq!(printed("(count [1 2 3])"), "3");
    }

    #[test]
    fn test_slice_ranges() {
        assert_eq!(printed("(slice [1 2 3 4] 1 3)"), "[ 2 3 ]");
        assert_eq!(printed("(slice [1 2 3 4] 2)"), "[ 3 4 ]");
    }

    #[test]
    fn test_each_visits_in_order() {
        assert_eq!(
            printed("(let (acc []) (each [1 2 3] (lambda (x) (acc (count acc) x))) acc)"),
            "[ 1 2 3 ]"
        );
    }

    #[test]
    fn test_prefixed_import_renames() {
        let mut interpreter = Interpreter::new().unwrap();
        let value = interpreter
            .evaluate_str("(import prefixed (vector count)) (vector.count [1 2])")
            .unwrap();
        assert_eq!(value.as_integer(), Some(2));
    }
}
