//! The `table` module: get, set, delete, each, count

use lone_core::error::{Error, Result};

use crate::evaluator::apply;
use crate::interpreter::Interpreter;
use crate::list;
use crate::modules;
use crate::table;
use crate::value::{FunctionFlags, Value};

pub fn initialize(interpreter: &mut Interpreter) -> Result<()> {
    let name = interpreter.intern_static("table")?;
    let module = modules::for_name(interpreter, name)?;
    let flags = FunctionFlags::EVALUATE_ARGUMENTS;

    modules::export_primitive(interpreter, module, "get", "table_get", get, module, flags)?;
    modules::export_primitive(interpreter, module, "set", "table_set", set, module, flags)?;
    modules::export_primitive(
        interpreter,
        module,
        "delete",
        "table_delete",
        delete,
        module,
        flags,
    )?;
    modules::export_primitive(interpreter, module, "each", "table_each", each, module, flags)?;
    modules::export_primitive(interpreter, module, "count", "table_count", count, module, flags)?;
    Ok(())
}

fn expect_table(interpreter: &Interpreter, value: Value) -> Result<Value> {
    if value.is_table(&interpreter.heap) {
        Ok(value)
    } else {
        Err(Error::Type("expected a table value".into()))
    }
}

fn get(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let [target, key] = list::destructure::<2>(&interpreter.heap, arguments)?;
    let target = expect_table(interpreter, target)?;
    table::get(&interpreter.heap, target, key)
}

fn set(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let [target, key, value] = list::destructure::<3>(&interpreter.heap, arguments)?;
    let target = expect_table(interpreter, target)?;
    table::set(&mut interpreter.heap, target, key, value)?;
    Ok(Value::Nil)
}

fn delete(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let [target, key] = list::destructure::<2>(&interpreter.heap, arguments)?;
    let target = expect_table(interpreter, target)?;
    table::delete(&mut interpreter.heap, target, key)?;
    Ok(Value::Nil)
}

/// `(each t f)`: applies `f` to each key and value in insertion order;
/// yields the last result.
fn each(
    interpreter: &mut Interpreter,
    module: Value,
    environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let [target, function] = list::destructure::<2>(&interpreter.heap, arguments)?;
    let target = expect_table(interpreter, target)?;
    if !function.is_applicable(&interpreter.heap) {
        return Err(Error::Type("each requires an applicable value".into()));
    }

    let mut result = Value::Nil;
    for (key, value) in table::entries(&interpreter.heap, target)? {
        let call_arguments = list::from_slice(&mut interpreter.heap, &[key, value]);
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
    let target = expect_table(interpreter, target)?;
    Ok(Value::Integer(table::count(&interpreter.heap, target)? as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::to_string;

    fn printed(source: &str) -> String {
        let mut interpreter = Interpreter::new().unwrap();
        let program = format!("(import table) {}", source);
        let value = interpreter.evaluate_str(&program).unwrap();
        to_string(&interpreter.heap, value)
    }

    #[test]
    fn test_get_set_delete_count() {
        assert_eq!(printed("(get { a 1 } 'a)"), "1");
        assert_eq!(printed("(get { a 1 } 'b)"), "nil");
        assert_eq!(printed("(let (t { a 1 }) (set t 'b 2) (get t 'b))"), "2");
        assert_eq!(printed("(let (t { a 1 b 2 }) (delete t 'a) t)"), "{ b 2 }");
        assert_eq!(printed("(count { a 1 b 2 })"), "2");
    }

    #[test]
    fn test_each_visits_in_insertion_order() {
        let mut interpreter = Interpreter::new().unwrap();
        let value = interpreter
            .evaluate_str(
                "(import prefixed table)
                 (let (acc {}) (table.each { a 1 b 2 } (lambda (k v) (acc k v))) acc)",
            )
            .unwrap();
        assert_eq!(to_string(&interpreter.heap, value), "{ a 1 b 2 }");
    }
}
