//! Reverse-fill BER encoding.
//!
//! BER lengths precede the content they describe, so encoding front-to-back
//! would need either two passes or buffer shifting. [`EncodeBuf`] instead
//! builds the message back-to-front: every `push_*` call appends the
//! byte-reversed encoding of its field, and [`finish`](EncodeBuf::finish)
//! reverses the buffer once. Callers therefore push fields in reverse
//! order - the last field of a SEQUENCE is pushed first.

use super::length::encode_length;
use super::tag;
use crate::oid::Oid;
use bytes::Bytes;

/// Reverse-fill encode buffer.
pub struct EncodeBuf {
    buf: Vec<u8>,
}

impl EncodeBuf {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self { buf: Vec::with_capacity(128) }
    }

    /// Create with a capacity hint.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append raw bytes (stored reversed for the final flip).
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buf.extend(data.iter().rev());
    }

    /// Append a single tag byte.
    pub fn push_tag(&mut self, tag: u8) {
        self.buf.push(tag);
    }

    /// Append a length field for `len` content bytes.
    pub fn push_length(&mut self, len: usize) {
        let (bytes, n) = encode_length(len);
        self.buf.extend_from_slice(&bytes[..n]);
    }

    /// Append a signed INTEGER TLV in minimum two's-complement bytes.
    pub fn push_integer(&mut self, value: i32) {
        let bytes = value.to_be_bytes();
        let len = super::integer_content_len(value);
        self.push_bytes(&bytes[4 - len..]);
        self.push_length(len);
        self.push_tag(tag::universal::INTEGER);
    }

    /// Append an unsigned 32-bit TLV with the given tag.
    ///
    /// Values whose top bit would read as a sign get a leading 0x00.
    pub fn push_unsigned32(&mut self, tag: u8, value: u32) {
        let mut bytes = [0u8; 5];
        bytes[1..].copy_from_slice(&value.to_be_bytes());
        let len = super::unsigned32_content_len(value);
        self.push_bytes(&bytes[5 - len..]);
        self.push_length(len);
        self.push_tag(tag);
    }

    /// Append a Counter64 TLV.
    pub fn push_unsigned64(&mut self, value: u64) {
        let mut bytes = [0u8; 9];
        bytes[1..].copy_from_slice(&value.to_be_bytes());
        let len = super::unsigned64_content_len(value);
        self.push_bytes(&bytes[9 - len..]);
        self.push_length(len);
        self.push_tag(tag::application::COUNTER64);
    }

    /// Append an OCTET STRING TLV.
    pub fn push_octet_string(&mut self, data: &[u8]) {
        self.push_bytes(data);
        self.push_length(data.len());
        self.push_tag(tag::universal::OCTET_STRING);
    }

    /// Append a NULL TLV.
    pub fn push_null(&mut self) {
        self.push_length(0);
        self.push_tag(tag::universal::NULL);
    }

    /// Append an OBJECT IDENTIFIER TLV.
    pub fn push_oid(&mut self, oid: &Oid) {
        let body = oid.to_ber_smallvec();
        self.push_bytes(&body);
        self.push_length(body.len());
        self.push_tag(tag::universal::OBJECT_IDENTIFIER);
    }

    /// Append an IpAddress TLV (application tag 0x40, always 4 bytes).
    pub fn push_ip_address(&mut self, addr: [u8; 4]) {
        self.push_bytes(&addr);
        self.push_length(4);
        self.push_tag(tag::application::IP_ADDRESS);
    }

    /// Append a constructed TLV whose content is produced by `f`.
    ///
    /// `f` must push the inner fields in reverse order.
    pub fn push_constructed(&mut self, tag: u8, f: impl FnOnce(&mut Self)) {
        let start = self.buf.len();
        f(self);
        let content_len = self.buf.len() - start;
        self.push_length(content_len);
        self.push_tag(tag);
    }

    /// Append a SEQUENCE whose content is produced by `f` (fields in
    /// reverse order).
    pub fn push_sequence(&mut self, f: impl FnOnce(&mut Self)) {
        self.push_constructed(tag::universal::SEQUENCE, f);
    }

    /// Flip the buffer into wire order.
    pub fn finish(mut self) -> Bytes {
        self.buf.reverse();
        Bytes::from(self.buf)
    }
}

impl Default for EncodeBuf {
    fn default() -> Self {
        Self::new()
    }
}
