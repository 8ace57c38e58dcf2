//! Vector operations
//!
//! Reads past the end produce nil; writes past the end grow the vector
//! with nil fill. This is what collection access through the evaluator
//! relies on.

use lone_core::error::{Error, Result};

use crate::heap::Heap;
use crate::value::{HeapValue, Value, Vector, is_equal};

pub fn create(heap: &mut Heap, capacity: usize) -> Value {
    heap.allocate(HeapValue::Vector(Vector {
        values: Vec::with_capacity(capacity),
    }))
}

fn data<'heap>(heap: &'heap Heap, vector: Value) -> Result<&'heap Vector> {
    match vector.heap_value(heap) {
        Some(HeapValue::Vector(data)) => Ok(data),
        _ => Err(Error::Type("expected a vector value".into())),
    }
}

fn data_mut<'heap>(heap: &'heap mut Heap, vector: Value) -> Result<&'heap mut Vector> {
    match vector.heap_ref().map(|reference| heap.get_mut(reference)) {
        Some(HeapValue::Vector(data)) => Ok(data),
        _ => Err(Error::Type("expected a vector value".into())),
    }
}

pub fn count(heap: &Heap, vector: Value) -> Result<usize> {
    Ok(data(heap, vector)?.values.len())
}

/// Reads by position; anything outside the vector is nil.
pub fn get_at(heap: &Heap, vector: Value, index: usize) -> Result<Value> {
    Ok(data(heap, vector)?
        .values
        .get(index)
        .copied()
        .unwrap_or(Value::Nil))
}

/// Reads by value index, which must be an integer. Negative indices are
/// outside the vector and read as nil.
pub fn get(heap: &Heap, vector: Value, index: Value) -> Result<Value> {
    let Some(index) = index.as_integer() else {
        return Err(Error::Type("vector index must be an integer".into()));
    };
    match usize::try_from(index) {
        Ok(index) => get_at(heap, vector, index),
        Err(_) => Ok(Value::Nil),
    }
}

/// Writes by position, growing with nil fill as needed.
pub fn set_at(heap: &mut Heap, vector: Value, index: usize, value: Value) -> Result<()> {
    let data = data_mut(heap, vector)?;
    if index >= data.values.len() {
        data.values.resize(index + 1, Value::Nil);
    }
    data.values[index] = value;
    Ok(())
}

pub fn set(heap: &mut Heap, vector: Value, index: Value, value: Value) -> Result<()> {
    let Some(index) = index.as_integer() else {
        return Err(Error::Type("vector index must be an integer".into()));
    };
    let index = usize::try_from(index)
        .map_err(|_| Error::Resolution(format!("vector index {} out of range", index)))?;
    set_at(heap, vector, index, value)
}

pub fn push(heap: &mut Heap, vector: Value, value: Value) -> Result<()> {
    data_mut(heap, vector)?.values.push(value);
    Ok(())
}

pub fn contains(heap: &Heap, vector: Value, value: Value) -> Result<bool> {
    let values = &data(heap, vector)?.values;
    Ok(values.iter().any(|&element| is_equal(heap, element, value)))
}

/// Snapshot of the elements, for iteration that may mutate the heap.
pub fn values(heap: &Heap, vector: Value) -> Result<Vec<Value>> {
    Ok(data(heap, vector)?.values.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_reads_are_nil() {
        let mut heap = Heap::new();
        let vector = create(&mut heap, 4);
        push(&mut heap, vector, Value::Integer(1)).unwrap();
        assert!(get(&heap, vector, Value::Integer(5)).unwrap().is_nil());
        assert!(get(&heap, vector, Value::Integer(-1)).unwrap().is_nil());
        assert_eq!(
            get(&heap, vector, Value::Integer(0)).unwrap().as_integer(),
            Some(1)
        );
    }

    #[test]
    fn test_set_past_the_end_grows_with_nil_fill() {
        let mut heap = Heap::new();
        let vector = create(&mut heap, 0);
        set_at(&mut heap, vector, 3, Value::Integer(9)).unwrap();
        assert_eq!(count(&heap, vector).unwrap(), 4);
        assert!(get_at(&heap, vector, 1).unwrap().is_nil());
        assert_eq!(get_at(&heap, vector, 3).unwrap().as_integer(), Some(9));
    }

    #[test]
    fn test_non_integer_index_is_a_type_error() {
        let mut heap = Heap::new();
        let vector = create(&mut heap, 0);
        assert!(get(&heap, vector, Value::Nil).is_err());
    }

    #[test]
    fn test_contains_uses_structural_equality() {
        let mut heap = Heap::new();
        let vector = create(&mut heap, 2);
        let list = crate::list::from_slice(&mut heap, &[Value::Integer(1)]);
        push(&mut heap, vector, list).unwrap();

        let probe = crate::list::from_slice(&mut heap, &[Value::Integer(1)]);
        assert!(contains(&heap, vector, probe).unwrap());
    }
}
