//! Streaming reader: lexer plus recursive-descent parser
//!
//! The reader is fed either by any byte source (buffered and refilled on
//! demand, the buffer doubling in place through the arena allocator) or
//! by a fixed byte slice. It distinguishes three outcomes precisely: a
//! value, clean end of input at a form boundary, and malformed input or
//! end of input inside an unclosed form, which is fatal to the caller.
//!
//! Tokenization is deliberately sparse: whitespace is space, tab and
//! newline; tokens end only at whitespace, a closing bracket or end of
//! input, so brackets other than `)`, `]` and `}` may appear inside
//! symbols. `+` and `-` begin a number only when a digit follows.

use std::io::Read;

use lone_core::bytes::ByteString;
use lone_core::error::{Error, Result};

use crate::interpreter::Interpreter;
use crate::list::{self, ListBuilder};
use crate::table;
use crate::value::{HeapValue, Value};
use crate::vector;

/// Initial capacity of descriptor-backed buffers.
pub const BUFFER_SIZE: usize = 4096;

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n')
}

fn is_closer(byte: u8) -> bool {
    matches!(byte, b')' | b']' | b'}')
}

fn is_digit(byte: u8) -> bool {
    byte.is_ascii_digit()
}

/// A streaming S-expression reader over one input source.
pub struct Reader {
    source: Option<Box<dyn Read>>,
    /// Arena offset of the input buffer
    buffer: usize,
    capacity: usize,
    /// Read cursor: next byte to consume
    read: usize,
    /// Write cursor: bytes present in the buffer
    write: usize,
    end_of_input: bool,
    error: bool,
}

impl Reader {
    /// Reader over a refillable byte source.
    pub fn for_source(
        interpreter: &mut Interpreter,
        source: Box<dyn Read>,
    ) -> Result<Reader> {
        let buffer = interpreter.arena.allocate(BUFFER_SIZE)?;
        Ok(Reader {
            source: Some(source),
            buffer,
            capacity: BUFFER_SIZE,
            read: 0,
            write: 0,
            end_of_input: false,
            error: false,
        })
    }

    /// Reader over a fixed byte slice, copied into the arena.
    pub fn for_bytes(interpreter: &mut Interpreter, bytes: &[u8]) -> Result<Reader> {
        let capacity = bytes.len().max(1);
        let buffer = interpreter.arena.allocate(capacity)?;
        interpreter.arena.bytes_mut(buffer, bytes.len()).copy_from_slice(bytes);
        Ok(Reader {
            source: None,
            buffer,
            capacity,
            read: 0,
            write: bytes.len(),
            end_of_input: false,
            error: false,
        })
    }

    /// Clean end of input was reached at a form boundary.
    pub fn end_of_input(&self) -> bool {
        self.end_of_input
    }

    /// Malformed input or end of input inside an unclosed form.
    pub fn had_error(&self) -> bool {
        self.error
    }

    /// Returns the buffer to the arena.
    pub fn finish(self, interpreter: &mut Interpreter) {
        interpreter.arena.deallocate(self.buffer);
    }

    /// Reads one value. `Ok(None)` is clean end of input.
    pub fn read(&mut self, interpreter: &mut Interpreter) -> Result<Option<Value>> {
        match self.lex(interpreter)? {
            Some(token) => self.parse(interpreter, token).map(Some),
            None => Ok(None),
        }
    }

    fn fail(&mut self, message: &str) -> Error {
        self.error = true;
        Error::Reader(message.to_string())
    }

    fn fill(&mut self, interpreter: &mut Interpreter) -> Result<()> {
        let Some(source) = self.source.as_mut() else {
            return Ok(());
        };

        loop {
            if self.write == self.capacity {
                let grown = self.capacity * 2;
                self.buffer = interpreter.arena.reallocate(self.buffer, grown)?;
                self.capacity = grown;
            }

            let destination =
                &mut interpreter.arena.bytes_mut(self.buffer, self.capacity)[self.write..];
            let count = source.read(destination)?;
            if count == 0 {
                return Ok(());
            }
            self.write += count;
            if self.write < self.capacity {
                return Ok(());
            }
        }
    }

    /// Byte at cursor + k, refilling as needed; none when input runs out.
    fn peek_k(&mut self, interpreter: &mut Interpreter, k: usize) -> Result<Option<u8>> {
        if self.read + k >= self.write {
            self.fill(interpreter)?;
            if self.read + k >= self.write {
                return Ok(None);
            }
        }
        Ok(Some(interpreter.arena.bytes(self.buffer, self.write)[self.read + k]))
    }

    fn peek(&mut self, interpreter: &mut Interpreter) -> Result<Option<u8>> {
        self.peek_k(interpreter, 0)
    }

    fn consume(&mut self, count: usize) {
        self.read += count;
    }

    /// Emits one token, skipping whitespace. `Ok(None)` is end of input.
    fn lex(&mut self, interpreter: &mut Interpreter) -> Result<Option<Value>> {
        loop {
            let Some(byte) = self.peek(interpreter)? else {
                self.end_of_input = true;
                return Ok(None);
            };

            if is_whitespace(byte) {
                self.consume(1);
                continue;
            }

            let token = match byte {
                b'+' | b'-' => {
                    if self.peek_k(interpreter, 1)?.is_some_and(is_digit) {
                        self.consume_number(interpreter)?
                    } else {
                        self.consume_symbol(interpreter)?
                    }
                }
                byte if is_digit(byte) => self.consume_number(interpreter)?,
                b'"' => self.consume_text(interpreter)?,
                b'(' | b')' | b'[' | b']' | b'{' | b'}' | b'\'' | b'`' | b'.' => {
                    self.consume_character(interpreter)?
                }
                _ => self.consume_symbol(interpreter)?,
            };
            return Ok(Some(token));
        }
    }

    /// Requires the next byte to end the previous token.
    fn check_terminator(&mut self, interpreter: &mut Interpreter) -> Result<()> {
        match self.peek(interpreter)? {
            None => Ok(()),
            Some(byte) if is_whitespace(byte) || is_closer(byte) => Ok(()),
            Some(byte) => Err(self.fail(&format!(
                "token not terminated before byte {:?}",
                byte as char
            ))),
        }
    }

    fn consume_number(&mut self, interpreter: &mut Interpreter) -> Result<Value> {
        let negative = match self.peek(interpreter)? {
            Some(b'-') => {
                self.consume(1);
                true
            }
            Some(b'+') => {
                self.consume(1);
                false
            }
            _ => false,
        };

        let mut value: i64 = 0;
        let mut digits = 0;
        while let Some(byte) = self.peek(interpreter)? {
            if !is_digit(byte) {
                break;
            }
            self.consume(1);
            digits += 1;
            let digit = (byte - b'0') as i64;
            value = value
                .checked_mul(10)
                .and_then(|value| {
                    if negative {
                        value.checked_sub(digit)
                    } else {
                        value.checked_add(digit)
                    }
                })
                .ok_or_else(|| self.fail("integer literal overflows"))?;
        }

        if digits == 0 {
            return Err(self.fail("expected digits"));
        }
        self.check_terminator(interpreter)?;
        Ok(Value::Integer(value))
    }

    fn consume_text(&mut self, interpreter: &mut Interpreter) -> Result<Value> {
        self.consume(1); // opening quote

        let mut content = Vec::new();
        loop {
            match self.peek(interpreter)? {
                None => return Err(self.fail("end of input inside text literal")),
                Some(b'"') => {
                    self.consume(1);
                    break;
                }
                Some(byte) => {
                    self.consume(1);
                    content.push(byte);
                }
            }
        }

        self.check_terminator(interpreter)?;
        Ok(interpreter
            .heap
            .allocate(HeapValue::Text(ByteString::from_slice(&content))))
    }

    fn consume_symbol(&mut self, interpreter: &mut Interpreter) -> Result<Value> {
        let mut content = Vec::new();
        while let Some(byte) = self.peek(interpreter)? {
            if is_whitespace(byte) || is_closer(byte) {
                break;
            }
            self.consume(1);
            content.push(byte);
        }
        interpreter.intern(&content)
    }

    fn consume_character(&mut self, interpreter: &mut Interpreter) -> Result<Value> {
        let byte = self
            .peek(interpreter)?
            .expect("character token dispatched on a present byte");
        self.consume(1);
        interpreter.intern(&[byte])
    }

    /// One-byte symbol content, for bracket and dot dispatch.
    fn special_byte(&self, interpreter: &Interpreter, token: Value) -> Option<u8> {
        match token.heap_value(&interpreter.heap) {
            Some(HeapValue::Symbol(content)) if content.len() == 1 => {
                Some(content.as_slice()[0])
            }
            _ => None,
        }
    }

    fn parse(&mut self, interpreter: &mut Interpreter, token: Value) -> Result<Value> {
        match self.special_byte(interpreter, token) {
            Some(b'(') => self.parse_list(interpreter),
            Some(b'[') => self.parse_vector(interpreter),
            Some(b'{') => self.parse_table(interpreter),
            Some(b')') | Some(b']') | Some(b'}') => {
                Err(self.fail("unexpected closing bracket"))
            }
            Some(b'\'') => self.parse_quoted(interpreter, "quote"),
            Some(b'`') => self.parse_quoted(interpreter, "quasiquote"),
            _ => Ok(token),
        }
    }

    fn parse_list(&mut self, interpreter: &mut Interpreter) -> Result<Value> {
        let mut builder = ListBuilder::new();

        loop {
            let Some(token) = self.lex(interpreter)? else {
                return Err(self.fail("end of input inside list"));
            };

            match self.special_byte(interpreter, token) {
                Some(b')') => break,
                Some(b'.') => {
                    if builder.is_empty() {
                        return Err(self.fail("dotted tail requires a preceding element"));
                    }

                    let Some(token) = self.lex(interpreter)? else {
                        return Err(self.fail("end of input after dot"));
                    };
                    let tail = self.parse(interpreter, token)?;
                    list::set_rest(&mut interpreter.heap, builder.head(), tail)?;

                    let Some(close) = self.lex(interpreter)? else {
                        return Err(self.fail("end of input after dotted tail"));
                    };
                    if self.special_byte(interpreter, close) != Some(b')') {
                        return Err(self.fail("dotted tail admits a single value"));
                    }
                    break;
                }
                _ => {
                    let value = self.parse(interpreter, token)?;
                    builder.push(&mut interpreter.heap, value);
                }
            }
        }

        Ok(builder.finish())
    }

    fn parse_vector(&mut self, interpreter: &mut Interpreter) -> Result<Value> {
        let vector = vector::create(&mut interpreter.heap, 32);

        loop {
            let Some(token) = self.lex(interpreter)? else {
                return Err(self.fail("end of input inside vector"));
            };
            if self.special_byte(interpreter, token) == Some(b']') {
                break;
            }
            let value = self.parse(interpreter, token)?;
            vector::push(&mut interpreter.heap, vector, value)?;
        }

        Ok(vector)
    }

    fn parse_table(&mut self, interpreter: &mut Interpreter) -> Result<Value> {
        let table = table::create(&mut interpreter.heap, 32, Value::Nil);

        loop {
            let Some(token) = self.lex(interpreter)? else {
                return Err(self.fail("end of input inside table"));
            };
            if self.special_byte(interpreter, token) == Some(b'}') {
                break;
            }
            let key = self.parse(interpreter, token)?;

            let Some(token) = self.lex(interpreter)? else {
                return Err(self.fail("end of input inside table"));
            };
            if self.special_byte(interpreter, token) == Some(b'}') {
                return Err(self.fail("table literal requires an even number of elements"));
            }
            let value = self.parse(interpreter, token)?;

            table::set(&mut interpreter.heap, table, key, value)?;
        }

        Ok(table)
    }

    fn parse_quoted(
        &mut self,
        interpreter: &mut Interpreter,
        which: &'static str,
    ) -> Result<Value> {
        let symbol = interpreter.intern_static(which)?;
        let Some(token) = self.lex(interpreter)? else {
            return Err(self.fail("end of input after quote"));
        };
        let value = self.parse(interpreter, token)?;
        Ok(list::from_slice(&mut interpreter.heap, &[symbol, value]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{bytes_of, is_identical};
    use std::io::Cursor;

    fn read_all(source: &str) -> (Interpreter, Vec<Value>) {
        let mut interpreter = Interpreter::new().unwrap();
        let mut reader = Reader::for_bytes(&mut interpreter, source.as_bytes()).unwrap();
        let mut values = Vec::new();
        while let Some(value) = reader.read(&mut interpreter).unwrap() {
            values.push(value);
        }
        assert!(reader.end_of_input());
        reader.finish(&mut interpreter);
        (interpreter, values)
    }

    fn read_error(source: &str) -> Error {
        let mut interpreter = Interpreter::new().unwrap();
        let mut reader = Reader::for_bytes(&mut interpreter, source.as_bytes()).unwrap();
        loop {
            match reader.read(&mut interpreter) {
                Ok(Some(_)) => continue,
                Ok(None) => panic!("expected a reader error"),
                Err(error) => {
                    assert!(reader.had_error());
                    return error;
                }
            }
        }
    }

    #[test]
    fn test_reads_integers_with_signs() {
        let (_, values) = read_all(" 42 +7 -13 ");
        let integers: Vec<i64> = values.iter().map(|v| v.as_integer().unwrap()).collect();
        assert_eq!(integers, vec![42, 7, -13]);
    }

    #[test]
    fn test_sign_without_digits_is_a_symbol() {
        let (interpreter, values) = read_all("+ -");
        assert_eq!(bytes_of(&interpreter.heap, values[0]).unwrap(), b"+");
        assert_eq!(bytes_of(&interpreter.heap, values[1]).unwrap(), b"-");
    }

    #[test]
    fn test_integer_overflow_is_a_reader_error() {
        assert!(matches!(
            read_error("99999999999999999999"),
            Error::Reader(_)
        ));
    }

    #[test]
    fn test_reads_text_without_escapes() {
        let (interpreter, values) = read_all("\"hello world\"");
        assert!(values[0].is_text(&interpreter.heap));
        assert_eq!(bytes_of(&interpreter.heap, values[0]).unwrap(), b"hello world");
    }

    #[test]
    fn test_unterminated_text_is_an_error() {
        assert!(matches!(read_error("\"abc"), Error::Reader(_)));
    }

    #[test]
    fn test_symbols_end_only_at_whitespace_and_closers() {
        let (interpreter, values) = read_all("foo(bar baz");
        // '(' does not terminate a symbol, so the first token is "foo(bar"
        assert_eq!(bytes_of(&interpreter.heap, values[0]).unwrap(), b"foo(bar");
        assert_eq!(bytes_of(&interpreter.heap, values[1]).unwrap(), b"baz");
    }

    #[test]
    fn test_symbols_are_interned_by_the_reader() {
        let (interpreter, values) = read_all("twice twice");
        assert!(is_identical(values[0], values[1]));
        assert!(values[0].is_symbol(&interpreter.heap));
    }

    #[test]
    fn test_reads_nested_lists() {
        let (interpreter, values) = read_all("(a (b c) 3)");
        let heap = &interpreter.heap;
        let [a, inner, three] = crate::list::destructure::<3>(heap, values[0]).unwrap();
        assert_eq!(bytes_of(heap, a).unwrap(), b"a");
        assert_eq!(three.as_integer(), Some(3));
        let [b, c] = crate::list::destructure::<2>(heap, inner).unwrap();
        assert_eq!(bytes_of(heap, b).unwrap(), b"b");
        assert_eq!(bytes_of(heap, c).unwrap(), b"c");
    }

    #[test]
    fn test_reads_improper_lists() {
        let (interpreter, values) = read_all("(1 2 . 3)");
        let heap = &interpreter.heap;
        let list = values[0];
        assert_eq!(crate::list::first(heap, list).unwrap().as_integer(), Some(1));
        let rest = crate::list::rest(heap, list).unwrap();
        assert_eq!(crate::list::first(heap, rest).unwrap().as_integer(), Some(2));
        assert_eq!(crate::list::rest(heap, rest).unwrap().as_integer(), Some(3));
    }

    #[test]
    fn test_dot_requires_an_element_and_a_single_tail() {
        assert!(matches!(read_error("(. 1)"), Error::Reader(_)));
        assert!(matches!(read_error("(1 . 2 3)"), Error::Reader(_)));
    }

    #[test]
    fn test_reads_vectors_in_order() {
        let (interpreter, values) = read_all("[1 2 3]");
        let heap = &interpreter.heap;
        assert_eq!(vector::count(heap, values[0]).unwrap(), 3);
        for index in 0..3 {
            assert_eq!(
                vector::get_at(heap, values[0], index).unwrap().as_integer(),
                Some(index as i64 + 1)
            );
        }
    }

    #[test]
    fn test_reads_tables_as_key_value_pairs() {
        let (mut interpreter, values) = read_all("{ a 1 b 2 }");
        let a = interpreter.intern(b"a").unwrap();
        let b = interpreter.intern(b"b").unwrap();
        let heap = &interpreter.heap;
        assert_eq!(table::count(heap, values[0]).unwrap(), 2);
        assert_eq!(table::get(heap, values[0], a).unwrap().as_integer(), Some(1));
        assert_eq!(table::get(heap, values[0], b).unwrap().as_integer(), Some(2));
    }

    #[test]
    fn test_odd_table_literal_is_an_error() {
        assert!(matches!(read_error("{ a 1 b }"), Error::Reader(_)));
    }

    #[test]
    fn test_quote_and_quasiquote_sugar() {
        let (mut interpreter, values) = read_all("'x `y");
        let quote = interpreter.intern(b"quote").unwrap();
        let quasiquote = interpreter.intern(b"quasiquote").unwrap();
        let heap = &interpreter.heap;

        let [head, _] = crate::list::destructure::<2>(heap, values[0]).unwrap();
        assert!(is_identical(head, quote));
        let [head, _] = crate::list::destructure::<2>(heap, values[1]).unwrap();
        assert!(is_identical(head, quasiquote));
    }

    #[test]
    fn test_leading_closer_is_an_error() {
        assert!(matches!(read_error(")"), Error::Reader(_)));
        assert!(matches!(read_error("]"), Error::Reader(_)));
    }

    #[test]
    fn test_unclosed_list_at_end_of_input_is_an_error() {
        assert!(matches!(read_error("(a b"), Error::Reader(_)));
    }

    #[test]
    fn test_clean_end_of_input_between_forms() {
        let (_, values) = read_all("(a) (b)");
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_descriptor_source_with_buffer_growth() {
        let mut interpreter = Interpreter::new().unwrap();
        // enough forms to overflow the initial buffer several times
        let source: String = (0..4096).map(|i| format!("{} ", i)).collect();
        let mut reader =
            Reader::for_source(&mut interpreter, Box::new(Cursor::new(source))).unwrap();

        let mut count = 0i64;
        while let Some(value) = reader.read(&mut interpreter).unwrap() {
            assert_eq!(value.as_integer(), Some(count));
            count += 1;
        }
        assert_eq!(count, 4096);
        reader.finish(&mut interpreter);
    }
}
