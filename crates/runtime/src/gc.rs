//! Mark-and-sweep garbage collector
//!
//! Runs between top-level expressions during module loads, when nothing
//! but the interpreter's registered state and the caller-supplied values
//! can reference the heap. All roots are precise: the interpreter hands
//! over its global tables plus whatever in-flight values the current
//! operation still needs, so there is no conservative stack scanning and
//! a live value can never be missed.
//!
//! Marking walks an explicit worklist and is cycle-safe through the mark
//! bit. Sweeping drops the payload of every unmarked live cell, which
//! releases its owned buffers, then all-dead slabs are unlinked.

use crate::heap::{Heap, HeapRef};
use crate::value::{HeapValue, Value};

/// What one collection accomplished.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectionStats {
    pub swept: usize,
    pub reclaimed_slabs: usize,
}

/// Collects everything unreachable from `roots`.
pub fn collect(heap: &mut Heap, roots: &[Value]) -> CollectionStats {
    let mut worklist: Vec<HeapRef> = roots.iter().filter_map(|value| value.heap_ref()).collect();
    mark(heap, &mut worklist);

    let mut stats = CollectionStats::default();
    heap.for_each_cell_mut(|cell| {
        if cell.value.is_some() && !cell.marked {
            cell.value = None;
            stats.swept += 1;
        }
        cell.marked = false;
    });

    stats.reclaimed_slabs = heap.deallocate_dead_slabs();
    stats
}

fn mark(heap: &mut Heap, worklist: &mut Vec<HeapRef>) {
    while let Some(reference) = worklist.pop() {
        let cell = heap.cell_mut(reference);
        if cell.marked || cell.value.is_none() {
            continue;
        }
        cell.marked = true;

        match cell.value.as_ref().expect("cell checked live") {
            HeapValue::Module(module) => {
                push(worklist, module.name);
                push(worklist, module.environment);
                push(worklist, module.exports);
            }
            HeapValue::Function(function) => {
                push(worklist, function.arguments);
                push(worklist, function.code);
                push(worklist, function.environment);
            }
            HeapValue::Primitive(primitive) => {
                push(worklist, primitive.name);
                push(worklist, primitive.closure);
            }
            HeapValue::List(pair) => {
                push(worklist, pair.first);
                push(worklist, pair.rest);
            }
            HeapValue::Vector(vector) => {
                for &value in &vector.values {
                    push(worklist, value);
                }
            }
            HeapValue::Table(table) => {
                push(worklist, table.prototype);
                for entry in &table.entries {
                    push(worklist, entry.key);
                    push(worklist, entry.value);
                }
            }
            HeapValue::Symbol(_) | HeapValue::Text(_) | HeapValue::Bytes(_) => {}
        }
    }
}

fn push(worklist: &mut Vec<HeapRef>, value: Value) {
    if let Some(reference) = value.heap_ref() {
        worklist.push(reference);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::HEAP_VALUE_COUNT;
    use crate::list;
    use lone_core::bytes::ByteString;

    fn text(heap: &mut Heap, content: &str) -> Value {
        heap.allocate(HeapValue::Text(ByteString::from_slice(content.as_bytes())))
    }

    #[test]
    fn test_unreachable_values_are_swept() {
        let mut heap = Heap::new();
        let _garbage = text(&mut heap, "garbage");
        let stats = collect(&mut heap, &[]);
        assert_eq!(stats.swept, 1);
        assert_eq!(heap.live_count(), 0);
    }

    #[test]
    fn test_rooted_graphs_survive() {
        let mut heap = Heap::new();
        let a = text(&mut heap, "a");
        let b = text(&mut heap, "b");
        let root = list::from_slice(&mut heap, &[a, b]);
        let _garbage = text(&mut heap, "garbage");

        collect(&mut heap, &[root]);

        assert!(heap.is_live(a.heap_ref().unwrap()));
        assert!(heap.is_live(b.heap_ref().unwrap()));
        assert!(heap.is_live(root.heap_ref().unwrap()));
        assert_eq!(heap.live_count(), 4);
    }

    #[test]
    fn test_cycles_are_marked_once_and_collected_when_unreachable() {
        let mut heap = Heap::new();
        let cell = list::cons(&mut heap, Value::Integer(1), Value::Nil);
        // close the loop: (1 1 1 ...)
        if let HeapValue::List(pair) = heap.get_mut(cell.heap_ref().unwrap()) {
            pair.rest = cell;
        }

        collect(&mut heap, &[cell]);
        assert!(heap.is_live(cell.heap_ref().unwrap()));

        collect(&mut heap, &[]);
        assert_eq!(heap.live_count(), 0);
    }

    #[test]
    fn test_collection_reclaims_emptied_slabs() {
        let mut heap = Heap::new();
        let keep = text(&mut heap, "keep");
        for i in 0..HEAP_VALUE_COUNT * 2 {
            let _ = text(&mut heap, &i.to_string());
        }
        assert!(heap.slab_count() >= 3);

        let stats = collect(&mut heap, &[keep]);
        assert!(stats.reclaimed_slabs >= 2);
        assert_eq!(heap.slab_count(), 1);
        assert!(heap.is_live(keep.heap_ref().unwrap()));
    }

    #[test]
    fn test_marks_are_cleared_after_collection() {
        let mut heap = Heap::new();
        let root = text(&mut heap, "root");
        collect(&mut heap, &[root]);
        // a second collection with the same root must keep it alive again
        collect(&mut heap, &[root]);
        assert!(heap.is_live(root.heap_ref().unwrap()));
    }
}
