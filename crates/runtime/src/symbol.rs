//! Symbol interning
//!
//! The intern table maps byte content to the canonical symbol cell: the
//! keys are bytes values compared by content, the values are the symbols
//! themselves. Two byte-identical inputs therefore always produce
//! identical values, which is what lets hashing and equivalence treat
//! symbols by cell identity.

use lone_core::bytes::ByteString;
use lone_core::error::Result;

use crate::heap::Heap;
use crate::table;
use crate::value::{HeapValue, Value};

/// Interns `content`, copying it into owned storage if it is new.
pub fn intern(heap: &mut Heap, symbols: Value, content: &[u8]) -> Result<Value> {
    intern_with(heap, symbols, content, || ByteString::from_slice(content))
}

/// Interns constant content without copying it.
pub fn intern_static(heap: &mut Heap, symbols: Value, content: &'static str) -> Result<Value> {
    let bytes = content.as_bytes();
    intern_with(heap, symbols, bytes, || ByteString::from_static(bytes))
}

fn intern_with(
    heap: &mut Heap,
    symbols: Value,
    content: &[u8],
    storage: impl FnOnce() -> ByteString,
) -> Result<Value> {
    let key = heap.allocate(HeapValue::Bytes(ByteString::from_slice(content)));
    let existing = table::get(heap, symbols, key)?;
    if !existing.is_nil() {
        return Ok(existing);
    }

    let symbol = heap.allocate(HeapValue::Symbol(storage()));
    table::set(heap, symbols, key, symbol)?;
    Ok(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::is_identical;

    fn fixture() -> (Heap, Value) {
        let mut heap = Heap::new();
        let symbols = table::create(&mut heap, 256, Value::Nil);
        (heap, symbols)
    }

    #[test]
    fn test_interning_is_idempotent() {
        let (mut heap, symbols) = fixture();
        let first = intern(&mut heap, symbols, b"lambda").unwrap();
        let second = intern(&mut heap, symbols, b"lambda").unwrap();
        assert!(is_identical(first, second));
    }

    #[test]
    fn test_different_content_interns_differently() {
        let (mut heap, symbols) = fixture();
        let x = intern(&mut heap, symbols, b"x").unwrap();
        let y = intern(&mut heap, symbols, b"y").unwrap();
        assert!(!is_identical(x, y));
    }

    #[test]
    fn test_static_and_copied_content_share_a_cell() {
        let (mut heap, symbols) = fixture();
        let from_static = intern_static(&mut heap, symbols, "print").unwrap();
        let from_copy = intern(&mut heap, symbols, b"print").unwrap();
        assert!(is_identical(from_static, from_copy));
        assert!(from_static.is_symbol(&heap));
    }
}
