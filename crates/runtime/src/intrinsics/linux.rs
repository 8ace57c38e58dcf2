//! The `linux` module: raw system calls and process start-up state
//!
//! Exposes `system-call`, a table mapping syscall name symbols to
//! numbers, the argument list, the environment and the parsed auxiliary
//! vector. Arguments to `system-call` convert the obvious way: integers
//! pass through, nil is zero, pointers pass their address and values
//! with byte content pass the address of their buffer.

use std::os::unix::ffi::OsStrExt;

use lone_core::bytes::ByteString;
use lone_core::error::{Error, Result};

use crate::interpreter::Interpreter;
use crate::list::{self, ListBuilder};
use crate::modules;
use crate::table;
use crate::value::{FunctionFlags, HeapValue, Pointer, PointerType, Value, bytes_of};

pub fn initialize(interpreter: &mut Interpreter) -> Result<()> {
    let name = interpreter.intern_static("linux")?;
    let module = modules::for_name(interpreter, name)?;

    let calls = table::create(&mut interpreter.heap, 256, Value::Nil);
    fill_system_call_table(interpreter, calls)?;

    let system_call = interpreter.create_primitive(
        "linux_system_call",
        system_call,
        calls,
        FunctionFlags::EVALUATE_ARGUMENTS,
    )?;
    let symbol = interpreter.intern_static("system-call")?;
    modules::set_and_export(interpreter, module, symbol, system_call)?;

    let symbol = interpreter.intern_static("system-call-table")?;
    modules::set_and_export(interpreter, module, symbol, calls)?;

    let count = Value::Integer(std::env::args_os().count() as i64);
    let symbol = interpreter.intern_static("argument-count")?;
    modules::set_and_export(interpreter, module, symbol, count)?;

    let arguments = arguments_to_list(interpreter)?;
    let symbol = interpreter.intern_static("arguments")?;
    modules::set_and_export(interpreter, module, symbol, arguments)?;

    let environment = environment_to_table(interpreter)?;
    let symbol = interpreter.intern_static("environment")?;
    modules::set_and_export(interpreter, module, symbol, environment)?;

    let auxiliary = auxiliary_vector_to_table(interpreter)?;
    let symbol = interpreter.intern_static("auxiliary-values")?;
    modules::set_and_export(interpreter, module, symbol, auxiliary)?;

    modules::bind_exports_to_top_level(interpreter, module)
}

/// `(system-call name-or-number argument...)`: invokes the kernel and
/// yields the raw return value, negative errno included.
fn system_call(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    closure: Value,
) -> Result<Value> {
    let values = list::collect_values(&interpreter.heap, arguments)?;
    let Some((&call, rest)) = values.split_first() else {
        return Err(Error::Arity("system-call requires a call name or number".into()));
    };
    if rest.len() > 6 {
        return Err(Error::Arity("system calls take at most six arguments".into()));
    }

    let number = if call.is_symbol(&interpreter.heap) {
        let number = table::get(&interpreter.heap, closure, call)?;
        number.as_integer().ok_or_else(|| {
            Error::Resolution(format!(
                "unknown system call {}",
                crate::printer::to_string(&interpreter.heap, call)
            ))
        })?
    } else {
        call.as_integer()
            .ok_or_else(|| Error::Type("system call must be a symbol or an integer".into()))?
    };

    let mut converted = [0i64; 6];
    for (slot, &value) in converted.iter_mut().zip(rest.iter()) {
        *slot = system_call_argument(interpreter, value)?;
    }

    let result = unsafe {
        libc::syscall(
            number as libc::c_long,
            converted[0],
            converted[1],
            converted[2],
            converted[3],
            converted[4],
            converted[5],
        )
    };
    Ok(Value::Integer(result))
}

fn system_call_argument(interpreter: &Interpreter, value: Value) -> Result<i64> {
    match value {
        Value::Nil => Ok(0),
        Value::Integer(integer) => Ok(integer),
        Value::Pointer(pointer) => Ok(pointer.address as i64),
        Value::Heap(_) if value.has_bytes(&interpreter.heap) => {
            Ok(bytes_of(&interpreter.heap, value)?.as_ptr() as i64)
        }
        _ => Err(Error::Type("value cannot be passed to a system call".into())),
    }
}

macro_rules! system_calls {
    ($($name:literal => $number:expr),* $(,)?) => {
        &[$(($name, $number as i64)),*]
    };
}

/// Calls shared by every architecture the interpreter targets.
const SYSTEM_CALLS: &[(&str, i64)] = system_calls! {
    "read" => libc::SYS_read,
    "write" => libc::SYS_write,
    "openat" => libc::SYS_openat,
    "close" => libc::SYS_close,
    "lseek" => libc::SYS_lseek,
    "mmap" => libc::SYS_mmap,
    "munmap" => libc::SYS_munmap,
    "mprotect" => libc::SYS_mprotect,
    "brk" => libc::SYS_brk,
    "ioctl" => libc::SYS_ioctl,
    "pread64" => libc::SYS_pread64,
    "pwrite64" => libc::SYS_pwrite64,
    "readv" => libc::SYS_readv,
    "writev" => libc::SYS_writev,
    "pipe2" => libc::SYS_pipe2,
    "dup" => libc::SYS_dup,
    "dup3" => libc::SYS_dup3,
    "fcntl" => libc::SYS_fcntl,
    "fsync" => libc::SYS_fsync,
    "fdatasync" => libc::SYS_fdatasync,
    "ftruncate" => libc::SYS_ftruncate,
    "getcwd" => libc::SYS_getcwd,
    "chdir" => libc::SYS_chdir,
    "mkdirat" => libc::SYS_mkdirat,
    "unlinkat" => libc::SYS_unlinkat,
    "renameat" => libc::SYS_renameat,
    "symlinkat" => libc::SYS_symlinkat,
    "readlinkat" => libc::SYS_readlinkat,
    "faccessat" => libc::SYS_faccessat,
    "exit" => libc::SYS_exit,
    "exit_group" => libc::SYS_exit_group,
    "getpid" => libc::SYS_getpid,
    "gettid" => libc::SYS_gettid,
    "getppid" => libc::SYS_getppid,
    "getuid" => libc::SYS_getuid,
    "geteuid" => libc::SYS_geteuid,
    "getgid" => libc::SYS_getgid,
    "getegid" => libc::SYS_getegid,
    "kill" => libc::SYS_kill,
    "tgkill" => libc::SYS_tgkill,
    "clock_gettime" => libc::SYS_clock_gettime,
    "clock_nanosleep" => libc::SYS_clock_nanosleep,
    "sched_yield" => libc::SYS_sched_yield,
    "socket" => libc::SYS_socket,
    "bind" => libc::SYS_bind,
    "listen" => libc::SYS_listen,
    "connect" => libc::SYS_connect,
    "accept4" => libc::SYS_accept4,
    "sendto" => libc::SYS_sendto,
    "recvfrom" => libc::SYS_recvfrom,
    "shutdown" => libc::SYS_shutdown,
    "getrandom" => libc::SYS_getrandom,
};

fn fill_system_call_table(interpreter: &mut Interpreter, calls: Value) -> Result<()> {
    for &(name, number) in SYSTEM_CALLS {
        let symbol = interpreter.intern(name.as_bytes())?;
        table::set(&mut interpreter.heap, calls, symbol, Value::Integer(number))?;
    }
    Ok(())
}

fn arguments_to_list(interpreter: &mut Interpreter) -> Result<Value> {
    let mut builder = ListBuilder::new();
    for argument in std::env::args_os() {
        let text = interpreter.heap.allocate(HeapValue::Text(ByteString::from_slice(
            argument.as_os_str().as_bytes(),
        )));
        builder.push(&mut interpreter.heap, text);
    }
    Ok(builder.finish())
}

fn environment_to_table(interpreter: &mut Interpreter) -> Result<Value> {
    let environment = table::create(&mut interpreter.heap, 64, Value::Nil);
    for (name, value) in std::env::vars_os() {
        let name = interpreter
            .heap
            .allocate(HeapValue::Text(ByteString::from_slice(name.as_bytes())));
        let value = interpreter
            .heap
            .allocate(HeapValue::Text(ByteString::from_slice(value.as_bytes())));
        table::set(&mut interpreter.heap, environment, name, value)?;
    }
    Ok(environment)
}

enum AuxiliaryKind {
    Integer,
    Address,
    CString,
    Random,
}

const AUXILIARY_VALUES: &[(&str, libc::c_ulong, AuxiliaryKind)] = &[
    ("page-size", libc::AT_PAGESZ, AuxiliaryKind::Integer),
    ("clock-tick", libc::AT_CLKTCK, AuxiliaryKind::Integer),
    ("program-headers-address", libc::AT_PHDR, AuxiliaryKind::Address),
    ("program-header-size", libc::AT_PHENT, AuxiliaryKind::Integer),
    ("program-header-count", libc::AT_PHNUM, AuxiliaryKind::Integer),
    ("user-id", libc::AT_UID, AuxiliaryKind::Integer),
    ("effective-user-id", libc::AT_EUID, AuxiliaryKind::Integer),
    ("group-id", libc::AT_GID, AuxiliaryKind::Integer),
    ("effective-group-id", libc::AT_EGID, AuxiliaryKind::Integer),
    ("secure", libc::AT_SECURE, AuxiliaryKind::Integer),
    ("flags", libc::AT_FLAGS, AuxiliaryKind::Integer),
    ("hardware-capabilities", libc::AT_HWCAP, AuxiliaryKind::Integer),
    ("hardware-capabilities-2", libc::AT_HWCAP2, AuxiliaryKind::Integer),
    ("interpreter-base-address", libc::AT_BASE, AuxiliaryKind::Address),
    ("entry-point", libc::AT_ENTRY, AuxiliaryKind::Address),
    ("vDSO", libc::AT_SYSINFO_EHDR, AuxiliaryKind::Address),
    ("platform", libc::AT_PLATFORM, AuxiliaryKind::CString),
    ("executable-file-name", libc::AT_EXECFN, AuxiliaryKind::CString),
    ("random", libc::AT_RANDOM, AuxiliaryKind::Random),
];

fn auxiliary_vector_to_table(interpreter: &mut Interpreter) -> Result<Value> {
    let auxiliary = table::create(&mut interpreter.heap, 32, Value::Nil);

    for (name, kind, raw) in AUXILIARY_VALUES
        .iter()
        .map(|(name, key, kind)| (name, kind, unsafe { libc::getauxval(*key) }))
    {
        let value = match kind {
            AuxiliaryKind::Integer => Some(Value::Integer(raw as i64)),
            AuxiliaryKind::Address if raw != 0 => Some(Value::Pointer(Pointer {
                address: raw as usize,
                to: PointerType::Unknown,
            })),
            AuxiliaryKind::CString if raw != 0 => {
                let content = unsafe { std::ffi::CStr::from_ptr(raw as *const libc::c_char) };
                Some(interpreter.heap.allocate(HeapValue::Text(
                    ByteString::from_slice(content.to_bytes()),
                )))
            }
            AuxiliaryKind::Random if raw != 0 => {
                let content = unsafe { std::slice::from_raw_parts(raw as *const u8, 16) };
                Some(
                    interpreter
                        .heap
                        .allocate(HeapValue::Bytes(ByteString::from_slice(content))),
                )
            }
            _ => None,
        };

        if let Some(value) = value {
            let key = interpreter.intern(name.as_bytes())?;
            table::set(&mut interpreter.heap, auxiliary, key, value)?;
        }
    }

    Ok(auxiliary)
}

/// Eight bytes of kernel-provided randomness, for seeding the hash
/// basis at process start.
pub fn random_seed() -> Option<u64> {
    let address = unsafe { libc::getauxval(libc::AT_RANDOM) };
    if address == 0 {
        return None;
    }
    let bytes = unsafe { std::slice::from_raw_parts(address as *const u8, 8) };
    Some(u64::from_le_bytes(bytes.try_into().expect("slice of eight bytes")))
}
