//! Interpreter error type
//!
//! The interpreter fails fast: the first fault unwinds all the way out of
//! the evaluator and terminates the process with a non-zero status. Errors
//! carry a kind and a one-line message; there is no catch mechanism in the
//! language itself. Lookup misses are not errors - they produce nil.

use std::fmt;
use std::io;

/// Fault categories surfaced by the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed input or end of input inside an unclosed form
    Reader(String),
    /// Operand of the wrong type
    Type(String),
    /// Wrong number of arguments
    Arity(String),
    /// Operation undefined for the given operands (e.g. comparing non-integers)
    UndefinedOperation(String),
    /// Module not found, private import, strict index out of range
    Resolution(String),
    /// Allocator exhaustion
    OutOfMemory(String),
    /// A blocking system call failed
    Io(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Reader(message) => write!(f, "reader error: {}", message),
            Error::Type(message) => write!(f, "type error: {}", message),
            Error::Arity(message) => write!(f, "arity error: {}", message),
            Error::UndefinedOperation(message) => write!(f, "undefined operation: {}", message),
            Error::Resolution(message) => write!(f, "resolution error: {}", message),
            Error::OutOfMemory(message) => write!(f, "out of memory: {}", message),
            Error::Io(message) => write!(f, "i/o error: {}", message),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::Io(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind_and_message() {
        let error = Error::Arity("expected 2 arguments".to_string());
        assert_eq!(error.to_string(), "arity error: expected 2 arguments");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "gone");
        let error: Error = io_error.into();
        assert!(matches!(error, Error::Io(_)));
    }
}
