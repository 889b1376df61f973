//! Bounds-checked BER decoding over `Bytes`.
//!
//! A [`Decoder`] never reads past the declared length of its parent TLV:
//! constructed types hand out sub-decoders sliced to the inner content.

use super::length::decode_length;
use super::tag;
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;
use bytes::Bytes;

/// BER decoder reading from a byte buffer.
pub struct Decoder {
    data: Bytes,
    offset: usize,
}

impl Decoder {
    /// Create a new decoder from bytes.
    pub fn new(data: Bytes) -> Self {
        Self { data, offset: 0 }
    }

    /// Create a decoder from a byte slice (copies the data).
    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    /// Current offset within the buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Remaining bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Whether the end has been reached.
    pub fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    /// Peek at the next tag byte without consuming it.
    pub fn peek_tag(&self) -> Option<u8> {
        self.data.get(self.offset).copied()
    }

    /// Read a single byte.
    pub fn read_byte(&mut self) -> Result<u8> {
        let byte = *self
            .data
            .get(self.offset)
            .ok_or_else(|| Error::decode(self.offset, DecodeErrorKind::TruncatedData))?;
        self.offset += 1;
        Ok(byte)
    }

    /// Read a tag byte.
    pub fn read_tag(&mut self) -> Result<u8> {
        self.read_byte()
    }

    /// Read a length field.
    pub fn read_length(&mut self) -> Result<usize> {
        let (len, consumed) = decode_length(&self.data[self.offset..], self.offset)?;
        self.offset += consumed;
        Ok(len)
    }

    /// Read raw bytes without copying.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        // saturating_add so a hostile length cannot wrap past the bounds check
        if self.offset.saturating_add(len) > self.data.len() {
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::TlvOverflow,
            ));
        }
        let bytes = self.data.slice(self.offset..self.offset + len);
        self.offset += len;
        Ok(bytes)
    }

    /// Read and require a specific tag, returning the content length.
    pub fn expect_tag(&mut self, expected: u8) -> Result<usize> {
        let actual = self.read_tag()?;
        if actual != expected {
            tracing::debug!(
                offset = self.offset - 1,
                expected = format_args!("0x{:02X}", expected),
                actual = format_args!("0x{:02X}", actual),
                "unexpected BER tag"
            );
            return Err(Error::decode(
                self.offset - 1,
                DecodeErrorKind::UnexpectedTag { expected, actual },
            ));
        }
        self.read_length()
    }

    /// Read a signed INTEGER.
    pub fn read_integer(&mut self) -> Result<i32> {
        let len = self.expect_tag(tag::universal::INTEGER)?;
        self.read_integer_value(len)
    }

    /// Read a signed integer body of the given length.
    pub fn read_integer_value(&mut self, len: usize) -> Result<i32> {
        if len == 0 {
            return Err(Error::decode(self.offset, DecodeErrorKind::ZeroLengthInteger));
        }
        if len > 4 {
            // Permissive: truncate to the low 4 bytes, matching net-snmp
            tracing::warn!(offset = self.offset, length = len, "integer too long, truncating");
        }

        let bytes = self.read_bytes(len)?;

        let mut value: i32 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
        for &byte in bytes.iter().take(4) {
            value = (value << 8) | (byte as i32);
        }

        Ok(value)
    }

    /// Read an unsigned 32-bit value with a specific application tag.
    pub fn read_unsigned32(&mut self, expected_tag: u8) -> Result<u32> {
        let len = self.expect_tag(expected_tag)?;
        self.read_unsigned32_value(len)
    }

    /// Read an unsigned 32-bit body of the given length.
    pub fn read_unsigned32_value(&mut self, len: usize) -> Result<u32> {
        if len == 0 {
            return Err(Error::decode(self.offset, DecodeErrorKind::ZeroLengthInteger));
        }
        if len > 5 {
            // 5 bytes max: one leading zero plus four value bytes
            tracing::warn!(offset = self.offset, length = len, "unsigned32 too long, truncating");
        }

        let bytes = self.read_bytes(len)?;
        let mut value: u32 = 0;
        for &byte in bytes.iter().take(5) {
            value = (value << 8) | (byte as u32);
        }

        Ok(value)
    }

    /// Read an unsigned 64-bit body of the given length (Counter64).
    pub fn read_unsigned64_value(&mut self, len: usize) -> Result<u64> {
        if len == 0 {
            return Err(Error::decode(self.offset, DecodeErrorKind::ZeroLengthInteger));
        }
        if len > 9 {
            // 9 bytes max: one leading zero plus eight value bytes
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::Integer64TooLong { length: len },
            ));
        }

        let bytes = self.read_bytes(len)?;
        let mut value: u64 = 0;
        for &byte in bytes.iter() {
            value = (value << 8) | (byte as u64);
        }

        Ok(value)
    }

    /// Read an OCTET STRING.
    pub fn read_octet_string(&mut self) -> Result<Bytes> {
        let len = self.expect_tag(tag::universal::OCTET_STRING)?;
        self.read_bytes(len)
    }

    /// Read a NULL.
    pub fn read_null(&mut self) -> Result<()> {
        let len = self.expect_tag(tag::universal::NULL)?;
        if len != 0 {
            return Err(Error::decode(self.offset, DecodeErrorKind::InvalidNull));
        }
        Ok(())
    }

    /// Read an OBJECT IDENTIFIER.
    pub fn read_oid(&mut self) -> Result<Oid> {
        let len = self.expect_tag(tag::universal::OBJECT_IDENTIFIER)?;
        self.read_oid_value(len)
    }

    /// Read an OID body of the given length.
    pub fn read_oid_value(&mut self, len: usize) -> Result<Oid> {
        let bytes = self.read_bytes(len)?;
        Oid::from_ber(&bytes)
    }

    /// Read an IpAddress (application tag 0x40, 4 bytes).
    pub fn read_ip_address(&mut self) -> Result<[u8; 4]> {
        let len = self.expect_tag(tag::application::IP_ADDRESS)?;
        if len != 4 {
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::InvalidIpAddressLength { length: len },
            ));
        }
        let bytes = self.read_bytes(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Read a SEQUENCE, returning a decoder over its content.
    pub fn read_sequence(&mut self) -> Result<Decoder> {
        self.read_constructed(tag::universal::SEQUENCE)
    }

    /// Read a constructed TLV with a specific tag, returning a decoder
    /// over its content.
    pub fn read_constructed(&mut self, expected_tag: u8) -> Result<Decoder> {
        let len = self.expect_tag(expected_tag)?;
        let content = self.read_bytes(len)?;
        Ok(Decoder::new(content))
    }

    /// Create a sub-decoder over the next `len` bytes.
    pub fn sub_decoder(&mut self, len: usize) -> Result<Decoder> {
        let content = self.read_bytes(len)?;
        Ok(Decoder::new(content))
    }

    /// Skip a TLV without parsing it.
    pub fn skip_tlv(&mut self) -> Result<()> {
        let _tag = self.read_tag()?;
        let len = self.read_length()?;
        let new_offset = self.offset.saturating_add(len);
        if new_offset > self.data.len() {
            return Err(Error::decode(self.offset, DecodeErrorKind::TlvOverflow));
        }
        self.offset = new_offset;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_integer() {
        let mut dec = Decoder::from_slice(&[0x02, 0x01, 0x00]);
        assert_eq!(dec.read_integer().unwrap(), 0);

        let mut dec = Decoder::from_slice(&[0x02, 0x01, 0x7F]);
        assert_eq!(dec.read_integer().unwrap(), 127);

        let mut dec = Decoder::from_slice(&[0x02, 0x02, 0x00, 0x80]);
        assert_eq!(dec.read_integer().unwrap(), 128);

        let mut dec = Decoder::from_slice(&[0x02, 0x01, 0xFF]);
        assert_eq!(dec.read_integer().unwrap(), -1);

        let mut dec = Decoder::from_slice(&[0x02, 0x01, 0x80]);
        assert_eq!(dec.read_integer().unwrap(), -128);
    }

    #[test]
    fn decode_sequence() {
        let mut dec = Decoder::from_slice(&[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]);
        let mut seq = dec.read_sequence().unwrap();
        assert_eq!(seq.read_integer().unwrap(), 1);
        assert_eq!(seq.read_integer().unwrap(), 2);
        assert!(seq.is_empty());
    }

    #[test]
    fn decode_octet_string() {
        let mut dec = Decoder::from_slice(&[0x04, 0x05, b'h', b'e', b'l', b'l', b'o']);
        assert_eq!(&dec.read_octet_string().unwrap()[..], b"hello");
    }

    #[test]
    fn sub_decoder_is_bounded() {
        // Inner TLV claims more content than the parent sequence holds
        let mut dec = Decoder::from_slice(&[0x30, 0x04, 0x04, 0x10, 0xAA, 0xBB]);
        let mut seq = dec.read_sequence().unwrap();
        assert!(seq.read_octet_string().is_err());
    }

    #[test]
    fn tag_mismatch() {
        let mut dec = Decoder::from_slice(&[0x04, 0x01, 0x00]);
        let err = dec.read_integer().unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                kind: DecodeErrorKind::UnexpectedTag { expected: 0x02, actual: 0x04 },
                ..
            }
        ));
    }

    #[test]
    fn accept_non_minimal_integer() {
        // Non-minimal encodings accepted for permissive parsing (matches net-snmp)
        let mut dec = Decoder::from_slice(&[0x02, 0x02, 0x00, 0x01]);
        assert_eq!(dec.read_integer().unwrap(), 1);

        let mut dec = Decoder::from_slice(&[0x02, 0x02, 0xFF, 0xFF]);
        assert_eq!(dec.read_integer().unwrap(), -1);
    }

    #[test]
    fn oversized_read_rejected() {
        let mut dec = Decoder::from_slice(&[0x01, 0x02, 0x03]);
        assert!(dec.read_bytes(100).is_err());
    }

    #[test]
    fn skip_tlv_bounds_checked() {
        let mut dec = Decoder::from_slice(&[0x04, 0x82, 0x01, 0x00, 0xAA, 0xBB, 0xCC]);
        assert!(dec.skip_tlv().is_err());
    }

    #[test]
    fn unsigned64_limits() {
        let mut dec = Decoder::from_slice(&[0x46, 0x09, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        let len = dec.expect_tag(0x46).unwrap();
        assert_eq!(dec.read_unsigned64_value(len).unwrap(), u64::MAX);

        let mut dec = Decoder::from_slice(&[0x46, 0x0A, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        let len = dec.expect_tag(0x46).unwrap();
        assert!(dec.read_unsigned64_value(len).is_err());
    }
}
