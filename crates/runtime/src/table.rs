//! Table operations
//!
//! Open addressing with linear probing over a sparse index array; the
//! entries themselves live in a compact array in insertion order, which
//! iteration and printing rely on. Deletion back-shifts the probe
//! sequence (Knuth 6.4 algorithm R) and closes up the compact array so
//! the remaining entries keep their relative order.
//!
//! Lookup misses fall through to the prototype table, which is how both
//! lexical environments and user-visible prototype chains work.

use lone_core::error::{Error, Result};

use crate::hash::hash_value;
use crate::heap::{Heap, HeapRef};
use crate::value::{HeapValue, Table, TableEntry, Value, is_equal};

const MINIMUM_CAPACITY: usize = 8;
const LOAD_FACTOR: f64 = 0.7;
const GROWTH_FACTOR: usize = 2;

pub fn create(heap: &mut Heap, capacity: usize, prototype: Value) -> Value {
    let capacity = capacity.max(MINIMUM_CAPACITY);
    heap.allocate(HeapValue::Table(Table {
        indexes: vec![None; capacity].into_boxed_slice(),
        entries: Vec::new(),
        prototype,
    }))
}

fn table_ref(heap: &Heap, table: Value) -> Result<HeapRef> {
    match table.heap_ref() {
        Some(reference) if matches!(heap.get(reference), HeapValue::Table(_)) => Ok(reference),
        _ => Err(Error::Type("expected a table value".into())),
    }
}

fn data<'heap>(heap: &'heap Heap, table: Value) -> Result<&'heap Table> {
    match table.heap_value(heap) {
        Some(HeapValue::Table(data)) => Ok(data),
        _ => Err(Error::Type("expected a table value".into())),
    }
}

/// Probes for `key`, returning the slot where it lives or would live.
/// The load factor keeps at least one slot empty, so probing terminates.
fn find_slot(heap: &Heap, data: &Table, key: Value) -> Result<usize> {
    let capacity = data.indexes.len();
    let mut slot = (hash_value(heap, key)? % capacity as u64) as usize;

    while let Some(entry) = data.indexes[slot] {
        if is_equal(heap, data.entries[entry as usize].key, key) {
            break;
        }
        slot = (slot + 1) % capacity;
    }

    Ok(slot)
}

/// Looks `key` up, falling through the prototype chain; final miss is nil.
pub fn get(heap: &Heap, table: Value, key: Value) -> Result<Value> {
    let data = data(heap, table)?;
    let slot = find_slot(heap, data, key)?;

    if let Some(entry) = data.indexes[slot] {
        Ok(data.entries[entry as usize].value)
    } else if !data.prototype.is_nil() {
        get(heap, data.prototype, key)
    } else {
        Ok(Value::Nil)
    }
}

/// Binds `key` in this table, growing when the load factor would pass 0.7.
pub fn set(heap: &mut Heap, table: Value, key: Value, value: Value) -> Result<()> {
    with_taken(heap, table, |heap, data| {
        if (data.entries.len() + 1) as f64 / data.indexes.len() as f64 > LOAD_FACTOR {
            resize(heap, data, data.indexes.len() * GROWTH_FACTOR)?;
        }

        let slot = find_slot(heap, data, key)?;
        match data.indexes[slot] {
            Some(entry) => data.entries[entry as usize].value = value,
            None => {
                data.indexes[slot] = Some(data.entries.len() as u32);
                data.entries.push(TableEntry { key, value });
            }
        }
        Ok(())
    })
}

/// Removes `key` from this table only; absent keys are a no-op.
pub fn delete(heap: &mut Heap, table: Value, key: Value) -> Result<()> {
    with_taken(heap, table, |heap, data| {
        let capacity = data.indexes.len();
        let slot = find_slot(heap, data, key)?;
        let Some(removed) = data.indexes[slot] else {
            return Ok(());
        };
        let removed = removed as usize;

        // back-shift the probe sequence so open addressing stays intact
        let mut vacant = slot;
        let mut probe = slot;
        loop {
            probe = (probe + 1) % capacity;
            let Some(entry) = data.indexes[probe] else {
                break;
            };
            let home =
                (hash_value(heap, data.entries[entry as usize].key)? % capacity as u64) as usize;
            let wraps = probe < vacant;
            let out_of_sequence = if wraps {
                home <= vacant && home > probe
            } else {
                home <= vacant || home > probe
            };
            if out_of_sequence {
                data.indexes[vacant] = data.indexes[probe];
                vacant = probe;
            }
        }
        data.indexes[vacant] = None;

        // close up the compact array, preserving insertion order
        data.entries.remove(removed);
        for index in data.indexes.iter_mut().flatten() {
            if *index as usize > removed {
                *index -= 1;
            }
        }
        Ok(())
    })
}

pub fn count(heap: &Heap, table: Value) -> Result<usize> {
    Ok(data(heap, table)?.entries.len())
}

pub fn capacity(heap: &Heap, table: Value) -> Result<usize> {
    Ok(data(heap, table)?.indexes.len())
}

pub fn prototype(heap: &Heap, table: Value) -> Result<Value> {
    Ok(data(heap, table)?.prototype)
}

pub fn key_at(heap: &Heap, table: Value, position: usize) -> Result<Value> {
    Ok(data(heap, table)?.entries[position].key)
}

pub fn value_at(heap: &Heap, table: Value, position: usize) -> Result<Value> {
    Ok(data(heap, table)?.entries[position].value)
}

/// Snapshot of the entries in insertion order, for iteration that may
/// mutate the heap.
pub fn entries(heap: &Heap, table: Value) -> Result<Vec<(Value, Value)>> {
    Ok(data(heap, table)?
        .entries
        .iter()
        .map(|entry| (entry.key, entry.value))
        .collect())
}

/// Runs `operation` with the table's storage taken out of the cell, so it
/// can hash and compare keys against the rest of the heap. Hashing never
/// reads tables, so the temporarily emptied cell is unobservable.
fn with_taken(
    heap: &mut Heap,
    table: Value,
    operation: impl FnOnce(&mut Heap, &mut Table) -> Result<()>,
) -> Result<()> {
    let reference = table_ref(heap, table)?;
    let mut taken = match heap.get_mut(reference) {
        HeapValue::Table(data) => std::mem::take(data),
        _ => unreachable!("reference checked as table"),
    };

    let result = operation(heap, &mut taken);

    match heap.get_mut(reference) {
        HeapValue::Table(data) => *data = taken,
        _ => unreachable!("reference checked as table"),
    }
    result
}

fn resize(heap: &Heap, data: &mut Table, new_capacity: usize) -> Result<()> {
    let mut indexes: Box<[Option<u32>]> = vec![None; new_capacity].into_boxed_slice();

    for (position, entry) in data.entries.iter().enumerate() {
        let mut slot = (hash_value(heap, entry.key)? % new_capacity as u64) as usize;
        while indexes[slot].is_some() {
            slot = (slot + 1) % new_capacity;
        }
        indexes[slot] = Some(position as u32);
    }

    data.indexes = indexes;
    Ok(())
}
