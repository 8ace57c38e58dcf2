//! The `bytes` module: buffer creation and typed access at offsets
//!
//! Readers and writers exist per width; the multibyte widths come in
//! native, little-endian (`-le`) and big-endian (`-be`) variants.
//! Access out of range is a fatal bounds error, unlike vectors, because
//! byte buffers talk to system calls and silent truncation would
//! corrupt them.

use lone_core::bytes::{ByteString, Endianness, Width, read_integer, write_integer};
use lone_core::error::{Error, Result};

use crate::interpreter::Interpreter;
use crate::list;
use crate::modules;
use crate::value::{FunctionFlags, HeapValue, PrimitiveFn, Value};

pub fn initialize(interpreter: &mut Interpreter) -> Result<()> {
    let name = interpreter.intern_static("bytes")?;
    let module = modules::for_name(interpreter, name)?;
    let flags = FunctionFlags::EVALUATE_ARGUMENTS;

    modules::export_primitive(interpreter, module, "new", "bytes_new", new, module, flags)?;

    for &(symbol, name, function) in ACCESSORS {
        modules::export_primitive(interpreter, module, symbol, name, function, module, flags)?;
    }
    Ok(())
}

/// `(new count)`: a zeroed buffer of `count` bytes; zero or negative
/// counts are likely mistakes and fatal.
fn new(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let [count] = list::destructure::<1>(&interpreter.heap, arguments)?;
    let Some(count) = count.as_integer() else {
        return Err(Error::Type("byte count must be an integer".into()));
    };
    if count <= 0 {
        return Err(Error::Type("byte count must be positive".into()));
    }

    Ok(interpreter
        .heap
        .allocate(HeapValue::Bytes(ByteString::zeroed(count as usize))))
}

fn buffer_and_offset(interpreter: &Interpreter, buffer: Value, offset: Value) -> Result<usize> {
    if !buffer.is_bytes(&interpreter.heap) {
        return Err(Error::Type("expected a bytes value".into()));
    }
    let Some(offset) = offset.as_integer() else {
        return Err(Error::Type("offset must be an integer".into()));
    };
    usize::try_from(offset)
        .map_err(|_| Error::Resolution(format!("offset {} out of range", offset)))
}

fn read(
    interpreter: &mut Interpreter,
    arguments: Value,
    width: Width,
    endianness: Endianness,
) -> Result<Value> {
    let [buffer, offset] = list::destructure::<2>(&interpreter.heap, arguments)?;
    let offset = buffer_and_offset(interpreter, buffer, offset)?;

    let content = crate::value::bytes_of(&interpreter.heap, buffer)?;
    read_integer(content, offset, width, endianness)
        .map(Value::Integer)
        .ok_or_else(|| Error::Resolution(format!("read of {} bytes at offset {} out of range", width.size(), offset)))
}

fn write(
    interpreter: &mut Interpreter,
    arguments: Value,
    width: Width,
    endianness: Endianness,
) -> Result<Value> {
    let [buffer, offset, value] = list::destructure::<3>(&interpreter.heap, arguments)?;
    let offset = buffer_and_offset(interpreter, buffer, offset)?;
    let Some(integer) = value.as_integer() else {
        return Err(Error::Type("written value must be an integer".into()));
    };

    let reference = buffer.heap_ref().expect("bytes values live in the heap");
    let HeapValue::Bytes(content) = interpreter.heap.get_mut(reference) else {
        unreachable!("buffer checked as bytes");
    };
    if !write_integer(content.as_mut_slice(), offset, width, endianness, integer) {
        return Err(Error::Resolution(format!(
            "write of {} bytes at offset {} out of range",
            width.size(),
            offset
        )));
    }
    Ok(value)
}

macro_rules! accessors {
    ($(($reader:ident, $writer:ident, $width:expr, $endianness:expr)),* $(,)?) => {
        $(
            fn $reader(
                interpreter: &mut Interpreter,
                _module: Value,
                _environment: Value,
                arguments: Value,
                _closure: Value,
            ) -> Result<Value> {
                read(interpreter, arguments, $width, $endianness)
            }

            fn $writer(
                interpreter: &mut Interpreter,
                _module: Value,
                _environment: Value,
                arguments: Value,
                _closure: Value,
            ) -> Result<Value> {
                write(interpreter, arguments, $width, $endianness)
            }
        )*
    };
}

accessors!(
    (read_u8, write_u8, Width::U8, Endianness::Native),
    (read_s8, write_s8, Width::S8, Endianness::Native),
    (read_u16, write_u16, Width::U16, Endianness::Native),
    (read_s16, write_s16, Width::S16, Endianness::Native),
    (read_u32, write_u32, Width::U32, Endianness::Native),
    (read_s32, write_s32, Width::S32, Endianness::Native),
    (read_u64, write_u64, Width::U64, Endianness::Native),
    (read_s64, write_s64, Width::S64, Endianness::Native),
    (read_u16le, write_u16le, Width::U16, Endianness::Little),
    (read_s16le, write_s16le, Width::S16, Endianness::Little),
    (read_u32le, write_u32le, Width::U32, Endianness::Little),
    (read_s32le, write_s32le, Width::S32, Endianness::Little),
    (read_u64le, write_u64le, Width::U64, Endianness::Little),
    (read_s64le, write_s64le, Width::S64, Endianness::Little),
    (read_u16be, write_u16be, Width::U16, Endianness::Big),
    (read_s16be, write_s16be, Width::S16, Endianness::Big),
    (read_u32be, write_u32be, Width::U32, Endianness::Big),
    (read_s32be, write_s32be, Width::S32, Endianness::Big),
    (read_u64be, write_u64be, Width::U64, Endianness::Big),
    (read_s64be, write_s64be, Width::S64, Endianness::Big),
);

const ACCESSORS: &[(&str, &str, PrimitiveFn)] = &[
    ("read-u8", "bytes_read_u8", read_u8),
    ("read-s8", "bytes_read_s8", read_s8),
    ("read-u16", "bytes_read_u16", read_u16),
    ("read-s16", "bytes_read_s16", read_s16),
    ("read-u32", "bytes_read_u32", read_u32),
    ("read-s32", "bytes_read_s32", read_s32),
    ("read-u64", "bytes_read_u64", read_u64),
    ("read-s64", "bytes_read_s64", read_s64),
    ("read-u16le", "bytes_read_u16le", read_u16le),
    ("read-s16le", "bytes_read_s16le", read_s16le),
    ("read-u32le", "bytes_read_u32le", read_u32le),
    ("read-s32le", "bytes_read_s32le", read_s32le),
    ("read-u64le", "bytes_read_u64le", read_u64le),
    ("read-s64le", "bytes_read_s64le", read_s64le),
    ("read-u16be", "bytes_read_u16be", read_u16be),
    ("read-s16be", "bytes_read_s16be", read_s16be),
    ("read-u32be", "bytes_read_u32be", read_u32be),
    ("read-s32be", "bytes_read_s32be", read_s32be),
    ("read-u64be", "bytes_read_u64be", read_u64be),
    ("read-s64be", "bytes_read_s64be", read_s64be),
    ("write-u8", "bytes_write_u8", write_u8),
    ("write-s8", "bytes_write_s8", write_s8),
    ("write-u16", "bytes_write_u16", write_u16),
    ("write-s16", "bytes_write_s16", write_s16),
    ("write-u32", "bytes_write_u32", write_u32),
    ("write-s32", "bytes_write_s32", write_s32),
    ("write-u64", "bytes_write_u64", write_u64),
    ("write-s64", "bytes_write_s64", write_s64),
    ("write-u16le", "bytes_write_u16le", write_u16le),
    ("write-s16le", "bytes_write_s16le", write_s16le),
    ("write-u32le", "bytes_write_u32le", write_u32le),
    ("write-s32le", "bytes_write_s32le", write_s32le),
    ("write-u64le", "bytes_write_u64le", write_u64le),
    ("write-s64le", "bytes_write_s64le", write_s64le),
    ("write-u16be", "bytes_write_u16be", write_u16be),
    ("write-s16be", "bytes_write_s16be", write_s16be),
    ("write-u32be", "bytes_write_u32be", write_u32be),
    ("write-s32be", "bytes_write_s32be", write_s32be),
    ("write-u64be", "bytes_write_u64be", write_u64be),
    ("write-s64be", "bytes_write_s64be", write_s64be),
];
