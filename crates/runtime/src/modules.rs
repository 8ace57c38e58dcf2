//! Module system
//!
//! A module is a named environment plus an explicit export list. Names
//! canonicalize to a list of symbols; the canonical list keys the
//! loaded-modules table so `(import m)` and `(import (m))` dedupe to the
//! same module. Modules are registered before their source is evaluated,
//! which permits self-reference during load.
//!
//! Loading first consults the embedded-modules table carried inside the
//! interpreter's own executable image, then walks the search path looking
//! for `<dir>/<c1>/.../<cn>.ln`. The collector runs after every
//! top-level form evaluated during a load.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use lone_core::error::{Error, Result};
use tracing::{debug, trace};

use crate::elf;
use crate::evaluator;
use crate::interpreter::Interpreter;
use crate::list;
use crate::printer;
use crate::reader::Reader;
use crate::table;
use crate::value::{
    FunctionFlags, HeapValue, Module, Primitive, PrimitiveFn, Value, bytes_of, is_equivalent,
};
use crate::vector;

/// Module source file extension.
pub const EXTENSION: &str = "ln";

/// Process-wide module state.
pub struct Modules {
    /// Canonical name to module
    pub loaded: Value,
    /// Canonical name to source bytes, deserialized from the executable
    pub embedded: Value,
    /// The anonymous module fed from standard input
    pub null: Value,
    /// Prototype of every module environment
    pub top_level_environment: Value,
    /// Vector of search path directories
    pub path: Value,
    /// The shared `import` primitive
    pub import: Value,
    /// The shared `export` primitive
    pub export: Value,
}

impl Modules {
    pub(crate) fn uninitialized() -> Modules {
        Modules {
            loaded: Value::Nil,
            embedded: Value::Nil,
            null: Value::Nil,
            top_level_environment: Value::Nil,
            path: Value::Nil,
            import: Value::Nil,
            export: Value::Nil,
        }
    }
}

/// Canonicalizes a module name: a symbol becomes a one-element list, a
/// list of symbols passes through, a module canonicalizes its own name.
pub fn name_to_key(interpreter: &mut Interpreter, name: Value) -> Result<Value> {
    if name.is_symbol(&interpreter.heap) {
        return Ok(list::from_slice(&mut interpreter.heap, &[name]));
    }

    if name.is_list(&interpreter.heap) {
        let components = list::collect_values(&interpreter.heap, name)?;
        if components.is_empty()
            || !components
                .iter()
                .all(|&component| component.is_symbol(&interpreter.heap))
        {
            return Err(Error::Type(
                "module name components must be symbols".into(),
            ));
        }
        return Ok(name);
    }

    if let Some(HeapValue::Module(module)) = name.heap_value(&interpreter.heap) {
        let name = module.name;
        return name_to_key(interpreter, name);
    }

    Err(Error::Type("invalid module name".into()))
}

/// Creates a module with an empty environment prototyped on the
/// top-level environment and an empty export vector. Does not register.
pub fn create(interpreter: &mut Interpreter, name: Value) -> Result<Value> {
    let environment = table::create(
        &mut interpreter.heap,
        64,
        interpreter.modules.top_level_environment,
    );
    let exports = vector::create(&mut interpreter.heap, 8);
    Ok(interpreter.heap.allocate(HeapValue::Module(Module {
        name,
        environment,
        exports,
    })))
}

fn get_or_create(interpreter: &mut Interpreter, name: Value) -> Result<(Value, bool)> {
    let key = name_to_key(interpreter, name)?;
    let existing = table::get(&interpreter.heap, interpreter.modules.loaded, key)?;
    if !existing.is_nil() {
        return Ok((existing, false));
    }

    let module = create(interpreter, key)?;
    // register before loading to permit self-reference
    table::set(&mut interpreter.heap, interpreter.modules.loaded, key, module)?;

    let satisfied_from_image = try_load_embedded(interpreter, module, key)?;
    Ok((module, !satisfied_from_image))
}

/// The module registered under `name`, created empty if absent. Does not
/// search the filesystem.
pub fn for_name(interpreter: &mut Interpreter, name: Value) -> Result<Value> {
    let (module, _) = get_or_create(interpreter, name)?;
    Ok(module)
}

/// Loads the module named `name`, from the registry, the embedded table
/// or the search path, in that order. Missing everywhere is fatal.
pub fn load(interpreter: &mut Interpreter, name: Value) -> Result<Value> {
    let key = name_to_key(interpreter, name)?;
    let (module, not_found) = get_or_create(interpreter, key)?;

    if not_found {
        let path = search(interpreter, key)?;
        debug!(path = %path.display(), "loading module from file");
        let file = File::open(&path)?;
        load_from_source(interpreter, module, Box::new(file))?;
    }

    Ok(module)
}

fn try_load_embedded(interpreter: &mut Interpreter, module: Value, key: Value) -> Result<bool> {
    let embedded = interpreter.modules.embedded;
    if embedded.is_nil() {
        return Ok(false);
    }

    let source = table::get(&interpreter.heap, embedded, key)?;
    if source.is_nil() {
        return Ok(false);
    }
    if !source.has_bytes(&interpreter.heap) {
        return Err(Error::Type("embedded module source must be bytes".into()));
    }

    debug!("loading module from embedded segment");
    let content = bytes_of(&interpreter.heap, source)?.to_vec();
    load_from_bytes(interpreter, module, &content)?;
    table::delete(&mut interpreter.heap, embedded, key)?;
    Ok(true)
}

/// Walks the search path for `<dir>/<c1>/.../<cn>.ln`.
fn search(interpreter: &mut Interpreter, key: Value) -> Result<PathBuf> {
    let components = list::collect_values(&interpreter.heap, key)?;
    let directories = vector::values(&interpreter.heap, interpreter.modules.path)?;

    for directory in directories {
        let mut path = PathBuf::from(path_component(&interpreter.heap, directory)?);
        for (position, &component) in components.iter().enumerate() {
            let name = path_component(&interpreter.heap, component)?;
            if position + 1 == components.len() {
                path.push(format!("{}.{}", name, EXTENSION));
            } else {
                path.push(name);
            }
        }

        trace!(path = %path.display(), "probing module path");
        if path.is_file() {
            return Ok(path);
        }
    }

    let mut name = Vec::new();
    printer::print(&interpreter.heap, key, &mut name)?;
    Err(Error::Resolution(format!(
        "module {} not found in search path",
        String::from_utf8_lossy(&name)
    )))
}

fn path_component(heap: &crate::heap::Heap, value: Value) -> Result<String> {
    Ok(String::from_utf8_lossy(bytes_of(heap, value)?).into_owned())
}

/// Reads and evaluates every form from `source` against `module`,
/// collecting garbage after each top-level form.
pub fn load_from_source(
    interpreter: &mut Interpreter,
    module: Value,
    source: Box<dyn Read>,
) -> Result<()> {
    let mut reader = Reader::for_source(interpreter, source)?;
    let result = load_from_reader(interpreter, module, &mut reader);
    reader.finish(interpreter);
    result
}

/// Same as `load_from_source` for an in-memory byte slice.
pub fn load_from_bytes(interpreter: &mut Interpreter, module: Value, source: &[u8]) -> Result<()> {
    let mut reader = Reader::for_bytes(interpreter, source)?;
    let result = load_from_reader(interpreter, module, &mut reader);
    reader.finish(interpreter);
    result
}

fn load_from_reader(
    interpreter: &mut Interpreter,
    module: Value,
    reader: &mut Reader,
) -> Result<()> {
    interpreter.load_depth += 1;
    let result = load_loop(interpreter, module, reader);
    interpreter.load_depth -= 1;
    result
}

fn load_loop(interpreter: &mut Interpreter, module: Value, reader: &mut Reader) -> Result<()> {
    loop {
        match reader.read(interpreter)? {
            Some(value) => {
                evaluator::evaluate_in_module(interpreter, module, value)?;
                // only the outermost driver may collect: nested loads run
                // under live evaluation frames whose values are not roots
                if interpreter.load_depth == 1 {
                    interpreter.collect(&[module]);
                }
            }
            None => return Ok(()),
        }
    }
}

/// Appends `symbol` to the module's export vector.
pub fn export(interpreter: &mut Interpreter, module: Value, symbol: Value) -> Result<()> {
    if !symbol.is_symbol(&interpreter.heap) {
        return Err(Error::Type("only symbols can be exported".into()));
    }
    let exports = module_exports(interpreter, module)?;
    vector::push(&mut interpreter.heap, exports, symbol)
}

/// Binds `symbol` in the module environment and marks it exported.
pub fn set_and_export(
    interpreter: &mut Interpreter,
    module: Value,
    symbol: Value,
    value: Value,
) -> Result<()> {
    export(interpreter, module, symbol)?;
    let environment = module_environment(interpreter, module)?;
    table::set(&mut interpreter.heap, environment, symbol, value)
}

/// Creates a primitive and binds it exported in `module`. Used by the
/// intrinsic module setup.
pub fn export_primitive(
    interpreter: &mut Interpreter,
    module: Value,
    symbol: &'static str,
    name: &'static str,
    function: PrimitiveFn,
    closure: Value,
    flags: FunctionFlags,
) -> Result<()> {
    let name = interpreter.intern_static(name)?;
    let primitive = interpreter.heap.allocate(HeapValue::Primitive(Primitive {
        name,
        function,
        closure,
        flags,
    }));
    let symbol = interpreter.intern_static(symbol)?;
    set_and_export(interpreter, module, symbol, primitive)
}

pub fn module_environment(interpreter: &Interpreter, module: Value) -> Result<Value> {
    match module.heap_value(&interpreter.heap) {
        Some(HeapValue::Module(module)) => Ok(module.environment),
        _ => Err(Error::Type("expected a module value".into())),
    }
}

pub fn module_exports(interpreter: &Interpreter, module: Value) -> Result<Value> {
    match module.heap_value(&interpreter.heap) {
        Some(HeapValue::Module(module)) => Ok(module.exports),
        _ => Err(Error::Type("expected a module value".into())),
    }
}

pub fn module_name(interpreter: &Interpreter, module: Value) -> Result<Value> {
    match module.heap_value(&interpreter.heap) {
        Some(HeapValue::Module(module)) => Ok(module.name),
        _ => Err(Error::Type("expected a module value".into())),
    }
}

/// Appends a directory to the module search path.
pub fn path_push(interpreter: &mut Interpreter, directory: &Path) -> Result<()> {
    let text = interpreter.heap.allocate(HeapValue::Text(
        lone_core::bytes::ByteString::from_slice(directory.as_os_str().as_encoded_bytes()),
    ));
    vector::push(&mut interpreter.heap, interpreter.modules.path, text)
}

/// Reads the interpreter's own executable image and installs the
/// embedded module table, if one is present.
pub fn install_embedded_from_executable(interpreter: &mut Interpreter) -> Result<()> {
    let Some(blob) = elf::embedded_blob_from_current_executable() else {
        return Ok(());
    };

    debug!(bytes = blob.len(), "deserializing embedded module table");
    let mut reader = Reader::for_bytes(interpreter, &blob)?;
    let value = reader.read(interpreter)?;
    reader.finish(interpreter);

    match value {
        Some(table) if table.is_table(&interpreter.heap) => {
            interpreter.modules.embedded = table;
            Ok(())
        }
        _ => Err(Error::Type(
            "embedded segment does not hold a module table".into(),
        )),
    }
}

struct ImportSpecification {
    module: Value,
    /// Vector of symbols to bind
    symbols: Value,
    /// Environment receiving the bindings
    environment: Value,
    prefixed: bool,
}

/// `(import spec...)`: a bare symbol or `(m)` imports all exports, a
/// list `(m s...)` imports the named symbols, and the bare symbols
/// `prefixed` / `unprefixed` toggle renaming to `m.s` for what follows.
pub(crate) fn primitive_import(
    interpreter: &mut Interpreter,
    _module: Value,
    environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    if arguments.is_nil() {
        return Err(Error::Arity("nothing to import".into()));
    }

    let prefixed = interpreter.intern_static("prefixed")?;
    let unprefixed = interpreter.intern_static("unprefixed")?;

    let mut specification = ImportSpecification {
        module: Value::Nil,
        symbols: Value::Nil,
        environment,
        prefixed: false,
    };

    let mut remaining = arguments;
    while !remaining.is_nil() {
        let argument = list::first(&interpreter.heap, remaining)?;

        if argument.is_list(&interpreter.heap) {
            import_form(interpreter, &mut specification, argument)?;
        } else if argument.is_symbol(&interpreter.heap) {
            if is_equivalent(&interpreter.heap, argument, prefixed) {
                specification.prefixed = true;
            } else if is_equivalent(&interpreter.heap, argument, unprefixed) {
                specification.prefixed = false;
            } else {
                import_form(interpreter, &mut specification, argument)?;
            }
        } else {
            return Err(Error::Type("invalid import argument".into()));
        }

        remaining = list::rest(&interpreter.heap, remaining)?;
    }

    Ok(Value::Nil)
}

fn import_form(
    interpreter: &mut Interpreter,
    specification: &mut ImportSpecification,
    argument: Value,
) -> Result<()> {
    let (name, symbols) = if argument.is_symbol(&interpreter.heap) {
        (argument, Value::Nil)
    } else {
        let name = list::first(&interpreter.heap, argument)?;
        let symbols = list::rest(&interpreter.heap, argument)?;
        if name.is_nil() {
            return Err(Error::Arity("nothing to import".into()));
        }
        (name, symbols)
    };

    specification.module = load(interpreter, name)?;
    specification.symbols = if symbols.is_nil() {
        module_exports(interpreter, specification.module)?
    } else {
        list::to_vector(&mut interpreter.heap, symbols)?
    };

    bind_imports(interpreter, specification)
}

fn bind_imports(
    interpreter: &mut Interpreter,
    specification: &ImportSpecification,
) -> Result<()> {
    let exports = module_exports(interpreter, specification.module)?;
    let environment = module_environment(interpreter, specification.module)?;
    let symbols = vector::values(&interpreter.heap, specification.symbols)?;

    for symbol in symbols {
        if !symbol.is_symbol(&interpreter.heap) {
            return Err(Error::Type("imported names must be symbols".into()));
        }

        if !vector::contains(&interpreter.heap, exports, symbol)? {
            let mut name = Vec::new();
            printer::print(&interpreter.heap, symbol, &mut name)?;
            return Err(Error::Resolution(format!(
                "cannot import private symbol {}",
                String::from_utf8_lossy(&name)
            )));
        }

        let value = table::get(&interpreter.heap, environment, symbol)?;

        let binding = if specification.prefixed {
            prefix_symbol(interpreter, specification.module, symbol)?
        } else {
            symbol
        };

        table::set(&mut interpreter.heap, specification.environment, binding, value)?;
    }

    Ok(())
}

/// Renames `symbol` to `m.s`, joining the module name components with
/// dots.
fn prefix_symbol(interpreter: &mut Interpreter, module: Value, symbol: Value) -> Result<Value> {
    let name = module_name(interpreter, module)?;
    let components = list::collect_values(&interpreter.heap, name)?;

    let mut joined = Vec::new();
    for component in components {
        joined.extend_from_slice(bytes_of(&interpreter.heap, component)?);
        joined.push(b'.');
    }
    joined.extend_from_slice(bytes_of(&interpreter.heap, symbol)?);

    interpreter.intern(&joined)
}

/// `(export s...)`: appends each symbol to the current module's exports.
pub(crate) fn primitive_export(
    interpreter: &mut Interpreter,
    module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let symbols = list::collect_values(&interpreter.heap, arguments)?;
    for symbol in symbols {
        export(interpreter, module, symbol)?;
    }
    Ok(Value::Nil)
}

/// Binds every export of `module` into the top-level environment. Used
/// at bootstrap for the intrinsic modules whose names do not collide.
pub(crate) fn bind_exports_to_top_level(
    interpreter: &mut Interpreter,
    module: Value,
) -> Result<()> {
    let specification = ImportSpecification {
        module,
        symbols: module_exports(interpreter, module)?,
        environment: interpreter.modules.top_level_environment,
        prefixed: false,
    };
    bind_imports(interpreter, &specification)
}
