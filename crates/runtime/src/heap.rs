//! Heap slabs
//!
//! Heap values live in fixed-capacity slabs chained off the interpreter.
//! A cell is dead when it holds no payload; dropping the payload releases
//! whatever auxiliary storage the value owned. Allocation reuses the first
//! dead cell anywhere in the chain before linking a fresh slab.
//!
//! `HeapRef` indices are stable: slabs never move and a freed slab slot is
//! only reused for a new slab, whose cells are reachable solely through
//! newly handed out references.

use crate::hash::FNV_OFFSET_BASIS;
use crate::value::{HeapValue, Value};

/// Cells per slab.
pub const HEAP_VALUE_COUNT: usize = 512;

/// Stable index of a heap cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapRef(u32);

impl HeapRef {
    fn slab(self) -> usize {
        self.0 as usize / HEAP_VALUE_COUNT
    }

    fn cell(self) -> usize {
        self.0 as usize % HEAP_VALUE_COUNT
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

pub(crate) struct HeapCell {
    pub(crate) marked: bool,
    pub(crate) value: Option<HeapValue>,
}

struct Slab {
    cells: Box<[HeapCell]>,
}

impl Slab {
    fn new() -> Slab {
        Slab {
            cells: (0..HEAP_VALUE_COUNT)
                .map(|_| HeapCell {
                    marked: false,
                    value: None,
                })
                .collect(),
        }
    }

    fn is_dead(&self) -> bool {
        self.cells.iter().all(|cell| cell.value.is_none())
    }
}

/// The slab chain. Slot 0 is the head slab and anchors the chain; it is
/// never reclaimed.
pub struct Heap {
    slabs: Vec<Option<Box<Slab>>>,
    /// FNV-1a offset basis, optionally seeded at bootstrap
    pub(crate) hash_basis: u64,
}

impl Default for Heap {
    fn default() -> Heap {
        Heap::new()
    }
}

impl Heap {
    pub fn new() -> Heap {
        Heap::with_hash_basis(FNV_OFFSET_BASIS)
    }

    pub fn with_hash_basis(hash_basis: u64) -> Heap {
        Heap {
            slabs: vec![Some(Box::new(Slab::new()))],
            hash_basis,
        }
    }

    /// Places a value in the first dead cell, linking a new slab when the
    /// chain is full, and returns it as a `Value`.
    pub fn allocate(&mut self, value: HeapValue) -> Value {
        Value::Heap(self.allocate_value(value))
    }

    /// Places a value in the first dead cell and returns its reference.
    pub fn allocate_value(&mut self, value: HeapValue) -> HeapRef {
        for (slot, slab) in self.slabs.iter_mut().enumerate() {
            let Some(slab) = slab else { continue };
            for (index, cell) in slab.cells.iter_mut().enumerate() {
                if cell.value.is_none() {
                    cell.value = Some(value);
                    cell.marked = false;
                    return HeapRef((slot * HEAP_VALUE_COUNT + index) as u32);
                }
            }
        }

        // every cell live: link a fresh slab, reusing a reclaimed slot
        let mut slab = Box::new(Slab::new());
        slab.cells[0].value = Some(value);
        let slot = match self.slabs.iter().position(|slab| slab.is_none()) {
            Some(slot) => {
                self.slabs[slot] = Some(slab);
                slot
            }
            None => {
                self.slabs.push(Some(slab));
                self.slabs.len() - 1
            }
        };
        HeapRef((slot * HEAP_VALUE_COUNT) as u32)
    }

    pub fn get(&self, reference: HeapRef) -> &HeapValue {
        self.slabs[reference.slab()]
            .as_ref()
            .and_then(|slab| slab.cells[reference.cell()].value.as_ref())
            .expect("dangling heap reference")
    }

    pub fn get_mut(&mut self, reference: HeapRef) -> &mut HeapValue {
        self.slabs[reference.slab()]
            .as_mut()
            .and_then(|slab| slab.cells[reference.cell()].value.as_mut())
            .expect("dangling heap reference")
    }

    pub fn is_live(&self, reference: HeapRef) -> bool {
        self.slabs
            .get(reference.slab())
            .and_then(|slab| slab.as_ref())
            .is_some_and(|slab| slab.cells[reference.cell()].value.is_some())
    }

    pub fn live_count(&self) -> usize {
        self.slabs
            .iter()
            .flatten()
            .map(|slab| slab.cells.iter().filter(|cell| cell.value.is_some()).count())
            .sum()
    }

    pub fn slab_count(&self) -> usize {
        self.slabs.iter().flatten().count()
    }

    pub(crate) fn cell_mut(&mut self, reference: HeapRef) -> &mut HeapCell {
        self.slabs[reference.slab()]
            .as_mut()
            .map(|slab| &mut slab.cells[reference.cell()])
            .expect("dangling heap reference")
    }

    pub(crate) fn for_each_cell_mut(&mut self, mut f: impl FnMut(&mut HeapCell)) {
        for slab in self.slabs.iter_mut().flatten() {
            for cell in slab.cells.iter_mut() {
                f(cell);
            }
        }
    }

    /// Unlinks and frees every all-dead slab except the head slab.
    /// Returns the number of slabs released.
    pub fn deallocate_dead_slabs(&mut self) -> usize {
        let mut reclaimed = 0;
        for slab in self.slabs.iter_mut().skip(1) {
            if slab.as_ref().is_some_and(|slab| slab.is_dead()) {
                *slab = None;
                reclaimed += 1;
            }
        }
        reclaimed
    }
}
