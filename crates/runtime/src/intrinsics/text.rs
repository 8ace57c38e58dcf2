//! The `text` module: join, concatenate, to-symbol

use lone_core::bytes::ByteString;
use lone_core::error::{Error, Result};

use crate::interpreter::Interpreter;
use crate::list;
use crate::modules;
use crate::value::{FunctionFlags, HeapValue, Value, bytes_of};

pub fn initialize(interpreter: &mut Interpreter) -> Result<()> {
    let name = interpreter.intern_static("text")?;
    let module = modules::for_name(interpreter, name)?;
    let flags = FunctionFlags::EVALUATE_ARGUMENTS;

    modules::export_primitive(interpreter, module, "join", "join", join, module, flags)?;
    modules::export_primitive(
        interpreter,
        module,
        "concatenate",
        "concatenate",
        concatenate,
        module,
        flags,
    )?;
    modules::export_primitive(
        interpreter,
        module,
        "to-symbol",
        "to_symbol",
        to_symbol,
        module,
        flags,
    )?;

    modules::bind_exports_to_top_level(interpreter, module)
}

fn joined_bytes(
    interpreter: &Interpreter,
    separator: Value,
    parts: &[Value],
) -> Result<Vec<u8>> {
    let heap = &interpreter.heap;
    let separator = match separator {
        Value::Nil => None,
        value => Some(bytes_of(heap, value)?),
    };

    let mut joined = Vec::new();
    for (position, &part) in parts.iter().enumerate() {
        if position > 0 {
            if let Some(separator) = separator {
                joined.extend_from_slice(separator);
            }
        }
        joined.extend_from_slice(bytes_of(heap, part)?);
    }
    Ok(joined)
}

/// `(join sep part...)`: concatenates the parts with the separator
/// between them. Separator and parts must carry bytes.
fn join(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let values = list::collect_values(&interpreter.heap, arguments)?;
    let Some((&separator, parts)) = values.split_first() else {
        return Err(Error::Arity("join requires a separator".into()));
    };

    let joined = joined_bytes(interpreter, separator, parts)?;
    Ok(interpreter
        .heap
        .allocate(HeapValue::Text(ByteString::from_slice(&joined))))
}

/// `(concatenate part...)`: join with no separator.
fn concatenate(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let values = list::collect_values(&interpreter.heap, arguments)?;
    let joined = joined_bytes(interpreter, Value::Nil, &values)?;
    Ok(interpreter
        .heap
        .allocate(HeapValue::Text(ByteString::from_slice(&joined))))
}

/// `(to-symbol t)`: interns the text's content.
fn to_symbol(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let [value] = list::destructure::<1>(&interpreter.heap, arguments)?;
    let content = bytes_of(&interpreter.heap, value)?.to_vec();
    interpreter.intern(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::to_string;
    use crate::value::is_identical;

    fn result(source: &str) -> (Interpreter, Value) {
        let mut interpreter = Interpreter::new().unwrap();
        let value = interpreter.evaluate_str(source).unwrap();
        (interpreter, value)
    }

    #[test]
    fn test_join_with_separator() {
        let (interpreter, value) = result("(join \"/\" \"usr\" \"lib\" \"lone\")");
        assert_eq!(to_string(&interpreter.heap, value), "\"usr/lib/lone\"");
    }

    #[test]
    fn test_join_accepts_symbols_and_bytes_content() {
        let (interpreter, value) = result("(join \".\" 'math 'sign)");
        assert_eq!(to_string(&interpreter.heap, value), "\"math.sign\"");
    }

    #[test]
    fn test_concatenate() {
        let (interpreter, value) = result("(concatenate \"ab\" \"cd\")");
        assert_eq!(to_string(&interpreter.heap, value), "\"abcd\"");
    }

    #[test]
    fn test_to_symbol_interns() {
        let (mut interpreter, value) = {
            let mut interpreter = Interpreter::new().unwrap();
            let value = interpreter.evaluate_str("(to-symbol \"print\")").unwrap();
            (interpreter, value)
        };
        let canonical = interpreter.intern(b"print").unwrap();
        assert!(is_identical(value, canonical));
    }

    #[test]
    fn test_join_rejects_values_without_bytes() {
        let mut interpreter = Interpreter::new().unwrap();
        assert!(interpreter.evaluate_str("(join \",\" 1 2)").is_err());
    }
}
