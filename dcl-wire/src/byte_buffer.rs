//! Length-prefixed, endian-neutral serialization of primitives, strings,
//! byte blobs and homogeneous sequences (spec.md C1).
//!
//! Multibyte integers in the body are little-endian; the framing header
//! that wraps a whole message is explicitly big-endian ("network byte
//! order", spec.md §6.1). `ByteBuffer` only deals with the body encoding;
//! `crate::envelope` handles the header.

use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

/// Sequences and strings longer than this many elements/bytes are rejected
/// on read rather than trusted to allocate (spec.md §4.1).
pub const DEFAULT_MAX_LEN: u32 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// A read ran past the end of the written region. Recoverable: the
    /// caller must treat the enclosing message as malformed.
    UnexpectedEof,
    /// A declared string/blob/sequence length exceeded the configured cap.
    LengthExceedsCap { declared: u32, cap: u32 },
    /// A string's bytes were not valid UTF-8.
    InvalidUtf8,
    /// A frame header named a `type_tag` with no entry in the dispatch
    /// table (spec.md §9 "static dispatch table for messages").
    UnknownTypeTag(u32),
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferError::UnexpectedEof => write!(f, "read past the end of the buffer"),
            BufferError::LengthExceedsCap { declared, cap } => {
                write!(f, "declared length {} exceeds cap of {} bytes", declared, cap)
            }
            BufferError::InvalidUtf8 => write!(f, "string bytes were not valid utf-8"),
            BufferError::UnknownTypeTag(tag) => write!(f, "unknown message type tag {}", tag),
        }
    }
}

impl std::error::Error for BufferError {}

pub type BufferResult<T> = Result<T, BufferError>;

/// A sequential read/write byte buffer with separate read and write
/// positions. Writing appends at the end; reading advances from the front.
#[derive(Debug, Clone, Default)]
pub struct ByteBuffer {
    data: Vec<u8>,
    read_pos: usize,
    max_len: u32,
}

impl ByteBuffer {
    pub fn new() -> Self {
        ByteBuffer { data: Vec::new(), read_pos: 0, max_len: DEFAULT_MAX_LEN }
    }

    pub fn with_capacity(cap: usize) -> Self {
        ByteBuffer { data: Vec::with_capacity(cap), read_pos: 0, max_len: DEFAULT_MAX_LEN }
    }

    /// Wrap already-received bytes for reading (e.g. a message body read
    /// off the wire).
    pub fn from_vec(data: Vec<u8>) -> Self {
        ByteBuffer { data, read_pos: 0, max_len: DEFAULT_MAX_LEN }
    }

    pub fn with_max_len(mut self, max_len: u32) -> Self {
        self.max_len = max_len;
        self
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.read_pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> BufferResult<&[u8]> {
        if self.remaining() < n {
            return Err(BufferError::UnexpectedEof);
        }
        let start = self.read_pos;
        self.read_pos += n;
        Ok(&self.data[start..self.read_pos])
    }

    // --- primitives: write ---

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.data.push(value);
        self
    }

    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.write_u8(if value { 1 } else { 0 })
    }

    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        let mut buf = [0u8; 2];
        LittleEndian::write_u16(&mut buf, value);
        self.data.extend_from_slice(&buf);
        self
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, value);
        self.data.extend_from_slice(&buf);
        self
    }

    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        let mut buf = [0u8; 8];
        LittleEndian::write_u64(&mut buf, value);
        self.data.extend_from_slice(&buf);
        self
    }

    pub fn write_i32(&mut self, value: i32) -> &mut Self {
        self.write_u32(value as u32)
    }

    pub fn write_i64(&mut self, value: i64) -> &mut Self {
        self.write_u64(value as u64)
    }

    pub fn write_f32(&mut self, value: f32) -> &mut Self {
        let mut buf = [0u8; 4];
        LittleEndian::write_f32(&mut buf, value);
        self.data.extend_from_slice(&buf);
        self
    }

    pub fn write_f64(&mut self, value: f64) -> &mut Self {
        let mut buf = [0u8; 8];
        LittleEndian::write_f64(&mut buf, value);
        self.data.extend_from_slice(&buf);
        self
    }

    /// Raw bytes with no length prefix. Used when the caller already knows
    /// the length from elsewhere (e.g. event bodies streamed separately).
    pub fn write_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn write_string(&mut self, value: &str) -> &mut Self {
        self.write_u32(value.len() as u32);
        self.write_raw(value.as_bytes())
    }

    /// `(size, bytes)` blob, as used for serialized info values and kernel
    /// scalar arguments (spec.md §3 "Binary blob").
    pub fn write_blob(&mut self, value: &[u8]) -> &mut Self {
        self.write_u32(value.len() as u32);
        self.write_raw(value)
    }

    pub fn write_sequence<T, F>(&mut self, items: &[T], mut write_elem: F) -> &mut Self
    where
        F: FnMut(&mut Self, &T),
    {
        self.write_u32(items.len() as u32);
        for item in items {
            write_elem(self, item);
        }
        self
    }

    // --- primitives: read ---

    pub fn read_u8(&mut self) -> BufferResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> BufferResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> BufferResult<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> BufferResult<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_u64(&mut self) -> BufferResult<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    pub fn read_i32(&mut self) -> BufferResult<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_i64(&mut self) -> BufferResult<i64> {
        Ok(self.read_u64()? as i64)
    }

    pub fn read_f32(&mut self) -> BufferResult<f32> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    pub fn read_f64(&mut self) -> BufferResult<f64> {
        Ok(LittleEndian::read_f64(self.take(8)?))
    }

    pub fn read_raw(&mut self, len: usize) -> BufferResult<Vec<u8>> {
        Ok(self.take(len)?.to_vec())
    }

    fn check_len_cap(&self, declared: u32) -> BufferResult<()> {
        if declared > self.max_len {
            return Err(BufferError::LengthExceedsCap { declared, cap: self.max_len });
        }
        Ok(())
    }

    pub fn read_string(&mut self) -> BufferResult<String> {
        let len = self.read_u32()?;
        self.check_len_cap(len)?;
        let bytes = self.take(len as usize)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| BufferError::InvalidUtf8)
    }

    pub fn read_blob(&mut self) -> BufferResult<Vec<u8>> {
        let len = self.read_u32()?;
        self.check_len_cap(len)?;
        self.read_raw(len as usize)
    }

    pub fn read_sequence<T, F>(&mut self, mut read_elem: F) -> BufferResult<Vec<T>>
    where
        F: FnMut(&mut Self) -> BufferResult<T>,
    {
        let count = self.read_u32()?;
        self.check_len_cap(count)?;
        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            items.push(read_elem(self)?);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn primitives_round_trip() {
        let mut buf = ByteBuffer::new();
        buf.write_u8(7).write_u32(0xdead_beef).write_bool(true).write_i64(-123).write_f64(1.5);

        assert_eq!(buf.read_u8().unwrap(), 7);
        assert_eq!(buf.read_u32().unwrap(), 0xdead_beef);
        assert_eq!(buf.read_bool().unwrap(), true);
        assert_eq!(buf.read_i64().unwrap(), -123);
        assert_eq!(buf.read_f64().unwrap(), 1.5);
        assert!(buf.is_exhausted());
    }

    #[test]
    fn string_round_trips_with_length_prefix_not_terminator() {
        let mut buf = ByteBuffer::new();
        buf.write_string("hello world");
        assert_eq!(buf.as_slice().len(), 4 + 11);
        assert_eq!(buf.read_string().unwrap(), "hello world");
    }

    #[test]
    fn sequence_round_trips() {
        let mut buf = ByteBuffer::new();
        buf.write_sequence(&[1u32, 2, 3], |b, v| {
            b.write_u32(*v);
        });
        let values = buf.read_sequence(|b| b.read_u32()).unwrap();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn reading_past_the_end_is_a_recoverable_error() {
        let mut buf = ByteBuffer::new();
        buf.write_u8(1);
        let _ = buf.read_u8().unwrap();
        assert_eq!(buf.read_u8(), Err(BufferError::UnexpectedEof));
    }

    #[test]
    fn oversized_declared_length_is_rejected() {
        let mut buf = ByteBuffer::new();
        buf.write_u32(DEFAULT_MAX_LEN + 1);
        buf.write_raw(&[0u8; 8]);
        let low_cap = ByteBuffer::from_vec(buf.into_vec()).with_max_len(1024);
        let mut low_cap = low_cap;
        assert_eq!(
            low_cap.read_blob(),
            Err(BufferError::LengthExceedsCap { declared: DEFAULT_MAX_LEN + 1, cap: 1024 })
        );
    }

    #[test]
    fn zero_length_string_round_trips() {
        let mut buf = ByteBuffer::new();
        buf.write_string("");
        assert_eq!(buf.read_string().unwrap(), "");
    }
}
