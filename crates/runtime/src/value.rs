//! Tagged value model
//!
//! A `Value` fits in a couple of registers: nil, integers and pointers are
//! immediate, everything else is a reference into the heap. Heap cells own
//! the aggregate payloads; references between values are traced by the
//! collector and never freed by hand.
//!
//! Three equalities with increasing depth: `identical` compares cells,
//! `equivalent` also compares immediate payloads and byte contents, and
//! `equal` descends structurally through lists and vectors.

use bitflags::bitflags;
use lone_core::bytes::ByteString;
use lone_core::error::{Error, Result};

use crate::heap::{Heap, HeapRef};
use crate::interpreter::Interpreter;

bitflags! {
    /// Evaluation protocol of a function or primitive.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FunctionFlags: u8 {
        /// Evaluate arguments in the caller's environment before applying
        const EVALUATE_ARGUMENTS = 1 << 0;
        /// Evaluate the result in the caller's environment after applying
        const EVALUATE_RESULT = 1 << 1;
        /// Bind the whole argument list to a single parameter
        const VARIABLE_ARGUMENTS = 1 << 2;
    }
}

/// Native function behind a primitive value.
///
/// Receives the interpreter, the module and environment of the call site,
/// the raw argument list and the closure value captured at creation.
pub type PrimitiveFn = fn(&mut Interpreter, Value, Value, Value, Value) -> Result<Value>;

/// What a pointer value knows how to dereference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerType {
    Unknown,
    U8,
    S8,
    U16,
    S16,
    U32,
    S32,
    U64,
    S64,
}

/// A raw address plus a dereferencing capability. Owns nothing.
#[derive(Debug, Clone, Copy)]
pub struct Pointer {
    pub address: usize,
    pub to: PointerType,
}

impl Pointer {
    /// Reads the pointee. Unknown-typed pointers have no defined read.
    ///
    /// # Safety
    ///
    /// The address must be valid readable memory of the pointee's width.
    pub unsafe fn dereference(self) -> Option<i64> {
        let address = self.address;
        let value = match self.to {
            PointerType::Unknown => return None,
            PointerType::U8 => unsafe { *(address as *const u8) as i64 },
            PointerType::S8 => unsafe { *(address as *const i8) as i64 },
            PointerType::U16 => unsafe { *(address as *const u16) as i64 },
            PointerType::S16 => unsafe { *(address as *const i16) as i64 },
            PointerType::U32 => unsafe { *(address as *const u32) as i64 },
            PointerType::S32 => unsafe { *(address as *const i32) as i64 },
            PointerType::U64 => unsafe { *(address as *const u64) as i64 },
            PointerType::S64 => unsafe { *(address as *const i64) },
        };
        Some(value)
    }
}

/// A lisp value. Copy; aggregate state lives in the heap.
#[derive(Debug, Clone, Copy)]
pub enum Value {
    Nil,
    Integer(i64),
    Pointer(Pointer),
    Heap(HeapRef),
}

/// A list cell.
#[derive(Debug, Clone, Copy)]
pub struct Pair {
    pub first: Value,
    pub rest: Value,
}

/// A named environment with an explicit export list.
#[derive(Debug)]
pub struct Module {
    /// Canonical name: a list of symbols, or nil for the null module
    pub name: Value,
    /// Table holding the module's bindings
    pub environment: Value,
    /// Vector of exported symbols
    pub exports: Value,
}

/// A closure: parameters, body and captured environment.
#[derive(Debug)]
pub struct Function {
    /// Proper list of parameter symbols, or nil
    pub arguments: Value,
    /// List of body expressions
    pub code: Value,
    /// Environment captured at creation
    pub environment: Value,
    pub flags: FunctionFlags,
}

/// A native function exposed to lisp code.
pub struct Primitive {
    /// Symbol naming the primitive
    pub name: Value,
    pub function: PrimitiveFn,
    /// Arbitrary value passed back on every call
    pub closure: Value,
    pub flags: FunctionFlags,
}

impl std::fmt::Debug for Primitive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Primitive")
            .field("name", &self.name)
            .field("closure", &self.closure)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

/// Dense growable array of values.
#[derive(Debug, Default)]
pub struct Vector {
    pub values: Vec<Value>,
}

/// One key/value slot of a table's compact entry array.
#[derive(Debug, Clone, Copy)]
pub struct TableEntry {
    pub key: Value,
    pub value: Value,
}

/// Open-addressed hash table with insertion-order entries and an optional
/// prototype consulted on lookup miss.
#[derive(Debug)]
pub struct Table {
    /// Sparse probe array; each used slot holds a position in `entries`
    pub indexes: Box<[Option<u32>]>,
    /// Compact entries in insertion order
    pub entries: Vec<TableEntry>,
    pub prototype: Value,
}

impl Default for Table {
    fn default() -> Table {
        Table {
            indexes: Box::new([]),
            entries: Vec::new(),
            prototype: Value::Nil,
        }
    }
}

/// Payload of a live heap cell.
#[derive(Debug)]
pub enum HeapValue {
    Module(Module),
    Function(Function),
    Primitive(Primitive),
    List(Pair),
    Vector(Vector),
    Table(Table),
    Symbol(ByteString),
    Text(ByteString),
    Bytes(ByteString),
}

impl Value {
    pub fn is_nil(self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Anything that is not nil counts as true.
    pub fn is_truthy(self) -> bool {
        !self.is_nil()
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Value::Integer(_))
    }

    pub fn is_pointer(self) -> bool {
        matches!(self, Value::Pointer(_))
    }

    pub fn is_heap_value(self) -> bool {
        matches!(self, Value::Heap(_))
    }

    pub fn as_integer(self) -> Option<i64> {
        match self {
            Value::Integer(integer) => Some(integer),
            _ => None,
        }
    }

    pub fn heap_ref(self) -> Option<HeapRef> {
        match self {
            Value::Heap(reference) => Some(reference),
            _ => None,
        }
    }

    pub fn heap_value(self, heap: &Heap) -> Option<&HeapValue> {
        self.heap_ref().map(|reference| heap.get(reference))
    }

    pub fn is_module(self, heap: &Heap) -> bool {
        matches!(self.heap_value(heap), Some(HeapValue::Module(_)))
    }

    pub fn is_function(self, heap: &Heap) -> bool {
        matches!(self.heap_value(heap), Some(HeapValue::Function(_)))
    }

    pub fn is_primitive(self, heap: &Heap) -> bool {
        matches!(self.heap_value(heap), Some(HeapValue::Primitive(_)))
    }

    /// Functions and primitives may head an evaluated list.
    pub fn is_applicable(self, heap: &Heap) -> bool {
        self.is_function(heap) || self.is_primitive(heap)
    }

    pub fn is_list(self, heap: &Heap) -> bool {
        matches!(self.heap_value(heap), Some(HeapValue::List(_)))
    }

    pub fn is_list_or_nil(self, heap: &Heap) -> bool {
        self.is_nil() || self.is_list(heap)
    }

    pub fn is_vector(self, heap: &Heap) -> bool {
        matches!(self.heap_value(heap), Some(HeapValue::Vector(_)))
    }

    pub fn is_table(self, heap: &Heap) -> bool {
        matches!(self.heap_value(heap), Some(HeapValue::Table(_)))
    }

    pub fn is_bytes(self, heap: &Heap) -> bool {
        matches!(self.heap_value(heap), Some(HeapValue::Bytes(_)))
    }

    pub fn is_text(self, heap: &Heap) -> bool {
        matches!(self.heap_value(heap), Some(HeapValue::Text(_)))
    }

    pub fn is_symbol(self, heap: &Heap) -> bool {
        matches!(self.heap_value(heap), Some(HeapValue::Symbol(_)))
    }

    /// Bytes, text and symbol values share byte-slice storage.
    pub fn has_bytes(self, heap: &Heap) -> bool {
        matches!(
            self.heap_value(heap),
            Some(HeapValue::Bytes(_) | HeapValue::Text(_) | HeapValue::Symbol(_))
        )
    }
}

/// Byte content of a bytes, text or symbol value.
pub fn bytes_of(heap: &Heap, value: Value) -> Result<&[u8]> {
    match value.heap_value(heap) {
        Some(HeapValue::Bytes(bytes) | HeapValue::Text(bytes) | HeapValue::Symbol(bytes)) => {
            Ok(bytes.as_slice())
        }
        _ => Err(Error::Type("expected a bytes, text or symbol value".into())),
    }
}

fn has_same_type(heap: &Heap, x: Value, y: Value) -> bool {
    match (x, y) {
        (Value::Nil, Value::Nil) => true,
        (Value::Integer(_), Value::Integer(_)) => true,
        (Value::Pointer(_), Value::Pointer(_)) => true,
        (Value::Heap(x), Value::Heap(y)) => {
            std::mem::discriminant(heap.get(x)) == std::mem::discriminant(heap.get(y))
        }
        _ => false,
    }
}

/// Same cell, or same immediate payload.
pub fn is_identical(x: Value, y: Value) -> bool {
    match (x, y) {
        (Value::Nil, Value::Nil) => true,
        (Value::Integer(x), Value::Integer(y)) => x == y,
        (Value::Pointer(x), Value::Pointer(y)) => x.address == y.address,
        (Value::Heap(x), Value::Heap(y)) => x == y,
        _ => false,
    }
}

/// Identical, or same type with equal payload. Bytes and text compare by
/// content; symbols are interned so identity suffices; aggregates fall
/// back to identity.
pub fn is_equivalent(heap: &Heap, x: Value, y: Value) -> bool {
    if !has_same_type(heap, x, y) {
        return false;
    }

    match (x.heap_value(heap), y.heap_value(heap)) {
        (Some(HeapValue::Text(x)), Some(HeapValue::Text(y)))
        | (Some(HeapValue::Bytes(x)), Some(HeapValue::Bytes(y))) => x == y,
        _ => is_identical(x, y),
    }
}

/// Structural equality over lists and vectors; tables compare by
/// identity; everything else by equivalence.
pub fn is_equal(heap: &Heap, x: Value, y: Value) -> bool {
    if !has_same_type(heap, x, y) {
        return false;
    }

    match (x.heap_value(heap), y.heap_value(heap)) {
        (Some(HeapValue::List(_)), Some(HeapValue::List(_))) => list_equal(heap, x, y),
        (Some(HeapValue::Vector(x)), Some(HeapValue::Vector(y))) => {
            x.values.len() == y.values.len()
                && x.values
                    .iter()
                    .zip(y.values.iter())
                    .all(|(&x, &y)| is_equal(heap, x, y))
        }
        (Some(HeapValue::Table(_)), Some(HeapValue::Table(_))) => is_identical(x, y),
        (Some(HeapValue::Symbol(_)), Some(HeapValue::Symbol(_))) => is_identical(x, y),
        _ => is_equivalent(heap, x, y),
    }
}

fn list_equal(heap: &Heap, mut x: Value, mut y: Value) -> bool {
    loop {
        let (Some(HeapValue::List(px)), Some(HeapValue::List(py))) =
            (x.heap_value(heap), y.heap_value(heap))
        else {
            return is_equal(heap, x, y);
        };
        let (px, py) = (*px, *py);

        if !is_equal(heap, px.first, py.first) {
            return false;
        }

        x = px.rest;
        y = py.rest;

        if !(x.is_list(heap) && y.is_list(heap)) {
            return is_equal(heap, x, y);
        }
    }
}

fn integer_pair(x: Value, y: Value) -> Result<(i64, i64)> {
    match (x, y) {
        (Value::Integer(x), Value::Integer(y)) => Ok((x, y)),
        _ => Err(Error::UndefinedOperation(
            "ordering is only defined between integers".into(),
        )),
    }
}

pub fn integer_is_less_than(x: Value, y: Value) -> Result<bool> {
    integer_pair(x, y).map(|(x, y)| x < y)
}

pub fn integer_is_less_than_or_equal_to(x: Value, y: Value) -> Result<bool> {
    integer_pair(x, y).map(|(x, y)| x <= y)
}

pub fn integer_is_greater_than(x: Value, y: Value) -> Result<bool> {
    integer_pair(x, y).map(|(x, y)| x > y)
}

pub fn integer_is_greater_than_or_equal_to(x: Value, y: Value) -> Result<bool> {
    integer_pair(x, y).map(|(x, y)| x >= y)
}
