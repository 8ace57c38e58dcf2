//! Intrinsic modules
//!
//! A fixed set of modules installed at bootstrap: `lone` (special forms,
//! predicates, print), `math`, `text`, `list`, `vector`, `table`,
//! `bytes` and `linux`. Each registers itself in the loaded-modules
//! table exactly like a file-based module.
//!
//! The exports of the modules whose names do not collide (`lone`,
//! `math`, `text`, `list`, `linux`) are additionally bound into the
//! top-level environment, so programs fed from standard input can call
//! `print` or `+` without importing anything. The container modules
//! share operation names (`get`, `set`, `count`, ...) and stay behind
//! explicit imports.

use lone_core::error::Result;

use crate::heap::Heap;
use crate::interpreter::Interpreter;
use crate::list as list_ops;
use crate::value::Value;

pub mod bytes;
pub mod linux;
pub mod list;
pub mod lone;
pub mod math;
pub mod table;
pub mod text;
pub mod vector;

pub fn initialize(interpreter: &mut Interpreter) -> Result<()> {
    lone::initialize(interpreter)?;
    math::initialize(interpreter)?;
    text::initialize(interpreter)?;
    list::initialize(interpreter)?;
    vector::initialize(interpreter)?;
    table::initialize(interpreter)?;
    bytes::initialize(interpreter)?;
    linux::initialize(interpreter)?;
    Ok(())
}

/// Applies a one-argument type predicate, yielding `true` or nil.
pub(crate) fn apply_predicate(
    interpreter: &Interpreter,
    arguments: Value,
    predicate: fn(Value, &Heap) -> bool,
) -> Result<Value> {
    let [value] = list_ops::destructure::<1>(&interpreter.heap, arguments)?;
    Ok(interpreter.boolean(predicate(value, &interpreter.heap)))
}

/// Chains a binary comparator over adjacent argument pairs; an empty
/// argument list is vacuously true.
pub(crate) fn apply_comparator(
    interpreter: &Interpreter,
    arguments: Value,
    comparator: fn(&Heap, Value, Value) -> Result<bool>,
) -> Result<Value> {
    let values = list_ops::collect_values(&interpreter.heap, arguments)?;
    for pair in values.windows(2) {
        if !comparator(&interpreter.heap, pair[0], pair[1])? {
            return Ok(Value::Nil);
        }
    }
    Ok(interpreter.boolean(true))
}
