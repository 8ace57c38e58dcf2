//! Interpreter state and bootstrap
//!
//! One `Interpreter` owns the arena, the heap slab chain, the symbol
//! intern table and the module registry. Bootstrap carves the arena,
//! links the first heap slab, seeds the symbol table and constants,
//! installs the intrinsic modules and binds their exports into the
//! top-level environment so programs read from standard input can use
//! them without imports.

use std::io::Read;
use std::path::PathBuf;

use lone_core::arena::Arena;
use lone_core::error::Result;
use tracing::{debug, trace};

use crate::gc::{self, CollectionStats};
use crate::heap::Heap;
use crate::hash::FNV_OFFSET_BASIS;
use crate::intrinsics;
use crate::modules::{self, Modules};
use crate::reader::Reader;
use crate::symbol;
use crate::table;
use crate::value::{FunctionFlags, HeapValue, Primitive, PrimitiveFn, Value};

/// Default arena span.
pub const MEMORY_SIZE: usize = 4 * 1024 * 1024;

/// Values the interpreter keeps interned for the lifetime of the process.
#[derive(Debug, Clone, Copy)]
pub struct Constants {
    /// The symbol `true`, returned by predicates
    pub truth: Value,
}

/// Bootstrap knobs.
pub struct Options {
    pub memory_size: usize,
    /// Seed mixed into the FNV-1a offset basis; none keeps it fixed
    pub hash_seed: Option<u64>,
    /// Module search path entries, in search order
    pub module_path: Vec<PathBuf>,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            memory_size: MEMORY_SIZE,
            hash_seed: None,
            module_path: vec![PathBuf::from("."), PathBuf::from("/usr/lib/lone/modules")],
        }
    }
}

/// The interpreter instance. Single threaded; every operation borrows it.
pub struct Interpreter {
    pub arena: Arena,
    pub heap: Heap,
    /// Intern table: bytes content to canonical symbol
    pub symbols: Value,
    pub constants: Constants,
    pub modules: Modules,
    /// Active driver loops. Collection only runs from the outermost one,
    /// when no evaluation frame holds unregistered heap references.
    pub(crate) load_depth: usize,
}

impl Interpreter {
    pub fn new() -> Result<Interpreter> {
        Interpreter::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Result<Interpreter> {
        let hash_basis = match options.hash_seed {
            Some(seed) => FNV_OFFSET_BASIS ^ seed,
            None => FNV_OFFSET_BASIS,
        };

        let mut interpreter = Interpreter {
            arena: Arena::new(options.memory_size),
            heap: Heap::with_hash_basis(hash_basis),
            symbols: Value::Nil,
            constants: Constants { truth: Value::Nil },
            modules: Modules::uninitialized(),
            load_depth: 0,
        };

        interpreter.symbols = table::create(&mut interpreter.heap, 256, Value::Nil);
        interpreter.constants.truth = interpreter.intern_static("true")?;

        interpreter.modules.top_level_environment =
            table::create(&mut interpreter.heap, 64, Value::Nil);
        interpreter.modules.loaded = table::create(&mut interpreter.heap, 32, Value::Nil);
        interpreter.modules.path = crate::vector::create(&mut interpreter.heap, 8);

        let import = interpreter.create_primitive(
            "import",
            modules::primitive_import,
            Value::Nil,
            FunctionFlags::empty(),
        )?;
        let export = interpreter.create_primitive(
            "export",
            modules::primitive_export,
            Value::Nil,
            FunctionFlags::empty(),
        )?;
        interpreter.modules.import = import;
        interpreter.modules.export = export;

        let top_level = interpreter.modules.top_level_environment;
        let import_symbol = interpreter.intern_static("import")?;
        let export_symbol = interpreter.intern_static("export")?;
        table::set(&mut interpreter.heap, top_level, import_symbol, import)?;
        table::set(&mut interpreter.heap, top_level, export_symbol, export)?;

        interpreter.modules.null = modules::create(&mut interpreter, Value::Nil)?;

        intrinsics::initialize(&mut interpreter)?;

        for directory in &options.module_path {
            modules::path_push(&mut interpreter, directory)?;
        }

        debug!(
            memory_size = options.memory_size,
            live_values = interpreter.heap.live_count(),
            "interpreter bootstrapped"
        );
        Ok(interpreter)
    }

    /// Interns `content` as a symbol, copying it on first use.
    pub fn intern(&mut self, content: &[u8]) -> Result<Value> {
        symbol::intern(&mut self.heap, self.symbols, content)
    }

    /// Interns constant content without copying.
    pub fn intern_static(&mut self, content: &'static str) -> Result<Value> {
        symbol::intern_static(&mut self.heap, self.symbols, content)
    }

    /// The symbol `true` or nil.
    pub fn boolean(&self, value: bool) -> Value {
        if value { self.constants.truth } else { Value::Nil }
    }

    pub fn create_primitive(
        &mut self,
        name: &'static str,
        function: PrimitiveFn,
        closure: Value,
        flags: FunctionFlags,
    ) -> Result<Value> {
        let name = self.intern_static(name)?;
        Ok(self.heap.allocate(HeapValue::Primitive(Primitive {
            name,
            function,
            closure,
            flags,
        })))
    }

    /// Collects garbage. `protected` names the in-flight values the
    /// current operation still needs; everything else reachable only from
    /// dead temporaries goes away.
    pub fn collect(&mut self, protected: &[Value]) -> CollectionStats {
        let mut roots = vec![
            self.symbols,
            self.constants.truth,
            self.modules.loaded,
            self.modules.embedded,
            self.modules.null,
            self.modules.top_level_environment,
            self.modules.path,
            self.modules.import,
            self.modules.export,
        ];
        roots.extend_from_slice(protected);

        let stats = gc::collect(&mut self.heap, &roots);
        trace!(
            swept = stats.swept,
            reclaimed_slabs = stats.reclaimed_slabs,
            live = self.heap.live_count(),
            "collection finished"
        );
        stats
    }

    /// Reads and evaluates every form in `source` in the null module and
    /// returns the value of the last one. Test and `-e` entry point.
    pub fn evaluate_str(&mut self, source: &str) -> Result<Value> {
        let null = self.modules.null;
        let mut reader = Reader::for_bytes(self, source.as_bytes())?;
        // keep nested module loads from collecting under our feet
        self.load_depth += 1;
        let mut result = Ok(Value::Nil);
        loop {
            match reader.read(self) {
                Ok(Some(value)) => {
                    match crate::evaluator::evaluate_in_module(self, null, value) {
                        Ok(value) => result = Ok(value),
                        Err(error) => {
                            result = Err(error);
                            break;
                        }
                    }
                }
                Ok(None) => break,
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }
        }
        self.load_depth -= 1;
        reader.finish(self);
        result
    }

    /// Reads and evaluates `source` in the null module until end of
    /// input, collecting after each top-level form.
    pub fn load_null_from_source(&mut self, source: Box<dyn Read>) -> Result<()> {
        let null = self.modules.null;
        modules::load_from_source(self, null, source)
    }
}
