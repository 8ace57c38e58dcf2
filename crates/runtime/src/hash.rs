//! Type-aware FNV-1a hashing
//!
//! The hash of a value covers its type tag and its payload: integers and
//! pointers hash their raw bytes, lists hash both halves of every cell,
//! text and bytes hash their content, and symbols hash their cell index,
//! which is stable and unique because symbols are interned. Aggregates
//! with identity semantics (modules, functions, primitives, vectors,
//! tables) are not hashable and cannot be table keys.
//!
//! The offset basis is stored on the heap and may be seeded at bootstrap
//! so hash ordering differs between runs.

use byteorder::{ByteOrder, LittleEndian};
use lone_core::error::{Error, Result};

use crate::heap::Heap;
use crate::value::{HeapValue, Value};

pub const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

const TAG_NIL: u8 = 0;
const TAG_INTEGER: u8 = 1;
const TAG_POINTER: u8 = 2;
const TAG_LIST: u8 = 3;
const TAG_SYMBOL: u8 = 4;
const TAG_TEXT: u8 = 5;
const TAG_BYTES: u8 = 6;

fn fnv_1a(bytes: &[u8], mut hash: u64) -> u64 {
    for &byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Hashes `value` with the heap's offset basis.
pub fn hash_value(heap: &Heap, value: Value) -> Result<u64> {
    hash_recursively(heap, value, heap.hash_basis)
}

fn hash_recursively(heap: &Heap, value: Value, mut hash: u64) -> Result<u64> {
    match value {
        Value::Nil => Ok(fnv_1a(&[TAG_NIL], hash)),
        Value::Integer(integer) => {
            hash = fnv_1a(&[TAG_INTEGER], hash);
            let mut bytes = [0; 8];
            LittleEndian::write_i64(&mut bytes, integer);
            Ok(fnv_1a(&bytes, hash))
        }
        Value::Pointer(pointer) => {
            hash = fnv_1a(&[TAG_POINTER], hash);
            let mut bytes = [0; 8];
            LittleEndian::write_u64(&mut bytes, pointer.address as u64);
            Ok(fnv_1a(&bytes, hash))
        }
        Value::Heap(reference) => match heap.get(reference) {
            HeapValue::List(_) => {
                // hash every cell of the chain without native recursion on rest
                let mut current = value;
                loop {
                    let HeapValue::List(pair) =
                        heap.get(current.heap_ref().expect("list chain holds heap values"))
                    else {
                        return hash_recursively(heap, current, hash);
                    };
                    let pair = *pair;
                    hash = fnv_1a(&[TAG_LIST], hash);
                    hash = hash_recursively(heap, pair.first, hash)?;
                    current = pair.rest;
                    if !current.is_list(heap) {
                        return hash_recursively(heap, current, hash);
                    }
                }
            }
            HeapValue::Symbol(_) => {
                hash = fnv_1a(&[TAG_SYMBOL], hash);
                let mut bytes = [0; 4];
                LittleEndian::write_u32(&mut bytes, reference.index());
                Ok(fnv_1a(&bytes, hash))
            }
            HeapValue::Text(content) => {
                hash = fnv_1a(&[TAG_TEXT], hash);
                Ok(fnv_1a(content.as_slice(), hash))
            }
            HeapValue::Bytes(content) => {
                hash = fnv_1a(&[TAG_BYTES], hash);
                Ok(fnv_1a(content.as_slice(), hash))
            }
            HeapValue::Module(_)
            | HeapValue::Function(_)
            | HeapValue::Primitive(_)
            | HeapValue::Vector(_)
            | HeapValue::Table(_) => Err(Error::Type("value cannot be hashed".into())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list;
    use crate::table;
    use lone_core::bytes::ByteString;

    #[test]
    fn test_equal_immediates_hash_equal() {
        let heap = Heap::new();
        assert_eq!(
            hash_value(&heap, Value::Integer(42)).unwrap(),
            hash_value(&heap, Value::Integer(42)).unwrap()
        );
        assert_ne!(
            hash_value(&heap, Value::Integer(42)).unwrap(),
            hash_value(&heap, Value::Integer(43)).unwrap()
        );
    }

    #[test]
    fn test_tag_distinguishes_nil_from_zero() {
        let heap = Heap::new();
        assert_ne!(
            hash_value(&heap, Value::Nil).unwrap(),
            hash_value(&heap, Value::Integer(0)).unwrap()
        );
    }

    #[test]
    fn test_text_hashes_by_content() {
        let mut heap = Heap::new();
        let x = heap.allocate(HeapValue::Text(ByteString::from_slice(b"abc")));
        let y = heap.allocate(HeapValue::Text(ByteString::from_slice(b"abc")));
        assert_eq!(hash_value(&heap, x).unwrap(), hash_value(&heap, y).unwrap());
    }

    #[test]
    fn test_equal_lists_hash_equal() {
        let mut heap = Heap::new();
        let x = list::from_slice(&mut heap, &[Value::Integer(1), Value::Integer(2)]);
        let y = list::from_slice(&mut heap, &[Value::Integer(1), Value::Integer(2)]);
        assert_eq!(hash_value(&heap, x).unwrap(), hash_value(&heap, y).unwrap());
    }

    #[test]
    fn test_tables_are_unhashable() {
        let mut heap = Heap::new();
        let table = table::create(&mut heap, 8, Value::Nil);
        assert!(hash_value(&heap, table).is_err());
    }

    #[test]
    fn test_basis_changes_hashes() {
        let x = Heap::with_hash_basis(FNV_OFFSET_BASIS);
        let y = Heap::with_hash_basis(FNV_OFFSET_BASIS ^ 0xdead_beef);
        assert_ne!(
            hash_value(&x, Value::Integer(1)).unwrap(),
            hash_value(&y, Value::Integer(1)).unwrap()
        );
    }
}
