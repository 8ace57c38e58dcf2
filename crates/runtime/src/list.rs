//! List operations
//!
//! Lists are chains of pairs. Nil is not a pair: taking the first or rest
//! of nil yields nil, while taking either of any other non-list value is
//! a type error, exactly as the evaluator relies on when walking argument
//! lists.

use lone_core::error::{Error, Result};

use crate::heap::Heap;
use crate::value::{HeapValue, Pair, Value};

pub fn cons(heap: &mut Heap, first: Value, rest: Value) -> Value {
    heap.allocate(HeapValue::List(Pair { first, rest }))
}

fn pair(heap: &Heap, value: Value) -> Result<Option<Pair>> {
    match value {
        Value::Nil => Ok(None),
        _ => match value.heap_value(heap) {
            Some(HeapValue::List(pair)) => Ok(Some(*pair)),
            _ => Err(Error::Type("expected a list value".into())),
        },
    }
}

pub fn first(heap: &Heap, value: Value) -> Result<Value> {
    Ok(pair(heap, value)?.map_or(Value::Nil, |pair| pair.first))
}

pub fn rest(heap: &Heap, value: Value) -> Result<Value> {
    Ok(pair(heap, value)?.map_or(Value::Nil, |pair| pair.rest))
}

/// Replaces the rest of an existing pair. Used by the reader's improper
/// list syntax.
pub fn set_rest(heap: &mut Heap, value: Value, rest: Value) -> Result<()> {
    match value.heap_ref().map(|reference| heap.get_mut(reference)) {
        Some(HeapValue::List(pair)) => {
            pair.rest = rest;
            Ok(())
        }
        _ => Err(Error::Type("expected a list value".into())),
    }
}

pub fn has_rest(heap: &Heap, value: Value) -> Result<bool> {
    Ok(pair(heap, value)?.is_some_and(|pair| !pair.rest.is_nil()))
}

/// Builds a proper list by appending, preserving push order.
#[derive(Debug, Clone, Copy)]
pub struct ListBuilder {
    first: Value,
    head: Value,
}

impl Default for ListBuilder {
    fn default() -> ListBuilder {
        ListBuilder::new()
    }
}

impl ListBuilder {
    pub fn new() -> ListBuilder {
        ListBuilder {
            first: Value::Nil,
            head: Value::Nil,
        }
    }

    pub fn push(&mut self, heap: &mut Heap, value: Value) {
        let cell = cons(heap, value, Value::Nil);
        if self.head.is_nil() {
            self.first = cell;
            self.head = cell;
        } else {
            set_rest(heap, self.head, cell).expect("builder head is a pair");
            self.head = cell;
        }
    }

    /// The most recently appended pair, nil while empty.
    pub fn head(&self) -> Value {
        self.head
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_nil()
    }

    pub fn finish(self) -> Value {
        self.first
    }
}

pub fn from_slice(heap: &mut Heap, values: &[Value]) -> Value {
    let mut builder = ListBuilder::new();
    for &value in values {
        builder.push(heap, value);
    }
    builder.finish()
}

/// Collects a proper list into a vec of its elements.
pub fn collect_values(heap: &Heap, list: Value) -> Result<Vec<Value>> {
    let mut values = Vec::new();
    let mut current = list;
    while !current.is_nil() {
        values.push(first(heap, current)?);
        current = rest(heap, current)?;
    }
    Ok(values)
}

pub fn to_vector(heap: &mut Heap, list: Value) -> Result<Value> {
    let values = collect_values(heap, list)?;
    let vector = crate::vector::create(heap, values.len());
    for value in values {
        crate::vector::push(heap, vector, value)?;
    }
    Ok(vector)
}

/// Splices nested lists into one flat list, depth first.
pub fn flatten(heap: &mut Heap, list: Value) -> Result<Value> {
    let mut builder = ListBuilder::new();
    flatten_into(heap, list, &mut builder)?;
    Ok(builder.finish())
}

fn flatten_into(heap: &mut Heap, list: Value, builder: &mut ListBuilder) -> Result<()> {
    let mut current = list;
    while !current.is_nil() {
        let element = first(heap, current)?;
        if element.is_list(heap) {
            flatten_into(heap, element, builder)?;
        } else {
            builder.push(heap, element);
        }
        current = rest(heap, current)?;
    }
    Ok(())
}

/// Extracts exactly `N` elements from a proper list.
pub fn destructure<const N: usize>(heap: &Heap, list: Value) -> Result<[Value; N]> {
    let values = collect_values(heap, list)?;
    values.try_into().map_err(|values: Vec<Value>| {
        Error::Arity(format!(
            "expected {} arguments, got {}",
            N,
            values.len()
        ))
    })
}
