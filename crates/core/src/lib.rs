//! Lone Core: the memory layer of the lone lisp interpreter
//!
//! This crate contains everything the interpreter needs before any lisp
//! state exists:
//!
//! - `arena`: first-fit split/coalesce block allocator over a fixed region
//! - `bytes`: owned/borrowed byte strings and endian-aware integer access
//! - `error`: the error type shared by every layer
//!
//! Nothing in here knows about lisp values. The runtime crate builds the
//! tagged value model, heap and evaluator on top of this.

pub mod arena;
pub mod bytes;
pub mod error;

pub use arena::Arena;
pub use bytes::{ByteString, Endianness, Width};
pub use error::{Error, Result};
