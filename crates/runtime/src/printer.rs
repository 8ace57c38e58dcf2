//! Textual serialization of values
//!
//! Writes any value back as text: integers in decimal, lists in
//! parenthesized form with dotted improper tails, vectors and tables in
//! bracket and brace form, bytes as hexadecimal. For reader-producible
//! values the output reads back `equal` to the original.
//!
//! Values can be cyclic by construction, so printing carries a depth
//! budget; exceeding it truncates with an ellipsis instead of recursing
//! forever.

use std::io::{self, Write};

use crate::heap::Heap;
use crate::list;
use crate::value::{HeapValue, Value};

/// Nesting budget before printing gives up on a (possibly cyclic) value.
pub const MAXIMUM_DEPTH: usize = 256;

/// Elements printed per list spine before giving up on a cyclic chain.
pub const MAXIMUM_LIST_ELEMENTS: usize = 65536;

/// Writes `value` as text to `out`.
pub fn print(heap: &Heap, value: Value, out: &mut dyn Write) -> io::Result<()> {
    print_value(heap, value, out, 0)
}

/// Renders `value` to a string. Printing aid for messages and tests.
pub fn to_string(heap: &Heap, value: Value) -> String {
    let mut buffer = Vec::new();
    print(heap, value, &mut buffer).expect("writing to a vec cannot fail");
    String::from_utf8_lossy(&buffer).into_owned()
}

fn print_value(heap: &Heap, value: Value, out: &mut dyn Write, depth: usize) -> io::Result<()> {
    if depth > MAXIMUM_DEPTH {
        return out.write_all(b"...");
    }

    match value {
        Value::Nil => out.write_all(b"nil"),
        Value::Integer(integer) => write!(out, "{}", integer),
        Value::Pointer(pointer) => match unsafe { pointer.dereference() } {
            // the pointer was constructed with a typed read capability
            Some(pointee) => write!(out, "{}", pointee),
            None => write!(out, "{}", pointer.address),
        },
        Value::Heap(reference) => match heap.get(reference) {
            HeapValue::Module(module) => {
                out.write_all(b"#<module ")?;
                print_value(heap, module.name, out, depth + 1)?;
                out.write_all(b">")
            }
            HeapValue::Primitive(primitive) => {
                out.write_all(b"#<primitive ")?;
                print_value(heap, primitive.name, out, depth + 1)?;
                out.write_all(b">")
            }
            HeapValue::Function(function) => {
                out.write_all("(\u{1d6cc} ".as_bytes())?;
                print_value(heap, function.arguments, out, depth + 1)?;
                let mut body = function.code;
                while body.is_list(heap) {
                    out.write_all(b"\n  ")?;
                    let expression = list::first(heap, body).expect("body is a list");
                    print_value(heap, expression, out, depth + 1)?;
                    body = list::rest(heap, body).expect("body is a list");
                }
                out.write_all(b")")
            }
            HeapValue::List(_) => {
                out.write_all(b"(")?;
                print_list(heap, value, out, depth + 1)?;
                out.write_all(b")")
            }
            HeapValue::Vector(vector) => {
                if vector.values.is_empty() {
                    return out.write_all(b"[]");
                }
                out.write_all(b"[ ")?;
                for &element in &vector.values {
                    print_value(heap, element, out, depth + 1)?;
                    out.write_all(b" ")?;
                }
                out.write_all(b"]")
            }
            HeapValue::Table(table) => {
                if table.entries.is_empty() {
                    return out.write_all(b"{}");
                }
                out.write_all(b"{ ")?;
                for entry in &table.entries {
                    print_value(heap, entry.key, out, depth + 1)?;
                    out.write_all(b" ")?;
                    print_value(heap, entry.value, out, depth + 1)?;
                    out.write_all(b" ")?;
                }
                out.write_all(b"}")
            }
            HeapValue::Bytes(content) => {
                if content.is_empty() {
                    return out.write_all(b"bytes[]");
                }
                write!(out, "bytes[0x{}]", hex::encode_upper(content.as_slice()))
            }
            HeapValue::Symbol(content) => out.write_all(content.as_slice()),
            HeapValue::Text(content) => {
                out.write_all(b"\"")?;
                out.write_all(content.as_slice())?;
                out.write_all(b"\"")
            }
        },
    }
}

fn print_list(heap: &Heap, value: Value, out: &mut dyn Write, depth: usize) -> io::Result<()> {
    let mut current = value;
    let mut printed = 0;

    loop {
        if printed == MAXIMUM_LIST_ELEMENTS {
            return out.write_all(b"...");
        }

        let first = list::first(heap, current).expect("printing a list cell");
        let rest = list::rest(heap, current).expect("printing a list cell");

        print_value(heap, first, out, depth)?;
        printed += 1;

        if rest.is_list(heap) {
            out.write_all(b" ")?;
            current = rest;
        } else if !rest.is_nil() {
            out.write_all(b" . ")?;
            return print_value(heap, rest, out, depth);
        } else {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::Interpreter;

    fn printed(source: &str) -> String {
        let mut interpreter = Interpreter::new().unwrap();
        let value = interpreter.evaluate_str(source).unwrap();
        to_string(&interpreter.heap, value)
    }

    #[test]
    fn test_integers_print_in_decimal() {
        assert_eq!(printed("42"), "42");
        assert_eq!(printed("-7"), "-7");
        assert_eq!(printed("0"), "0");
    }

    #[test]
    fn test_nil_prints_as_nil() {
        assert_eq!(printed("()"), "nil");
    }

    #[test]
    fn test_lists_print_in_parenthesized_form() {
        assert_eq!(printed("'(1 2 3)"), "(1 2 3)");
        assert_eq!(printed("'(1 (2 3))"), "(1 (2 3))");
    }

    #[test]
    fn test_improper_tails_use_dot_syntax() {
        assert_eq!(printed("'(1 2 . 3)"), "(1 2 . 3)");
    }

    #[test]
    fn test_vectors_and_tables() {
        assert_eq!(printed("[1 2]"), "[ 1 2 ]");
        assert_eq!(printed("[]"), "[]");
        assert_eq!(printed("{ a 1 }"), "{ a 1 }");
        assert_eq!(printed("{}"), "{}");
    }

    #[test]
    fn test_symbols_print_bare_and_texts_quoted() {
        assert_eq!(printed("'sym"), "sym");
        assert_eq!(printed("\"some text\""), "\"some text\"");
    }

    #[test]
    fn test_bytes_print_as_hexadecimal() {
        let mut interpreter = Interpreter::new().unwrap();
        let empty = interpreter
            .heap
            .allocate(crate::value::HeapValue::Bytes(
                lone_core::bytes::ByteString::from_slice(&[]),
            ));
        assert_eq!(to_string(&interpreter.heap, empty), "bytes[]");

        let bytes = interpreter
            .heap
            .allocate(crate::value::HeapValue::Bytes(
                lone_core::bytes::ByteString::from_slice(&[0xaa, 0xbb, 0x01]),
            ));
        assert_eq!(to_string(&interpreter.heap, bytes), "bytes[0xAABB01]");
    }

    #[test]
    fn test_modules_and_primitives_use_hash_notation() {
        let printed = printed("(quote ignored) print");
        // `print` resolves to the primitive exported by the lone module
        assert_eq!(printed, "#<primitive print>");
    }

    #[test]
    fn test_cyclic_values_truncate_instead_of_diverging() {
        let mut interpreter = Interpreter::new().unwrap();
        let cell = crate::list::cons(&mut interpreter.heap, Value::Integer(1), Value::Nil);
        if let HeapValue::List(pair) =
            interpreter.heap.get_mut(cell.heap_ref().unwrap())
        {
            pair.rest = cell;
        }
        let output = to_string(&interpreter.heap, cell);
        assert!(output.ends_with("..."));
    }
}
