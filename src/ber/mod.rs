//! BER (Basic Encoding Rules) subset sufficient for SNMP.
//!
//! Every primitive encodes as tag | length | value; constructed types set
//! the constructed bit and contain inner TLVs. Lengths use the short form
//! below 128 and the definite long form otherwise; the indefinite form is
//! rejected.

mod decode;
mod encode;
mod length;

pub use decode::Decoder;
pub use encode::EncodeBuf;
pub use length::{MAX_LENGTH, decode_length, encode_length, length_encoded_len};

/// BER tag constants used by SNMP.
pub mod tag {
    /// Universal-class tags.
    pub mod universal {
        pub const INTEGER: u8 = 0x02;
        pub const OCTET_STRING: u8 = 0x04;
        pub const NULL: u8 = 0x05;
        pub const OBJECT_IDENTIFIER: u8 = 0x06;
        pub const SEQUENCE: u8 = 0x30;
        /// Constructed OCTET STRING form; documented by net-snmp but not parsed.
        pub const OCTET_STRING_CONSTRUCTED: u8 = 0x24;
    }

    /// Application-class tags (RFC 2578 SMIv2 types).
    pub mod application {
        pub const IP_ADDRESS: u8 = 0x40;
        pub const COUNTER32: u8 = 0x41;
        pub const GAUGE32: u8 = 0x42;
        pub const TIMETICKS: u8 = 0x43;
        pub const OPAQUE: u8 = 0x44;
        pub const COUNTER64: u8 = 0x46;
    }

    /// Context-class tags: v2c/v3 response exceptions (RFC 3416).
    pub mod context {
        pub const NO_SUCH_OBJECT: u8 = 0x80;
        pub const NO_SUCH_INSTANCE: u8 = 0x81;
        pub const END_OF_MIB_VIEW: u8 = 0x82;
    }

    /// Context-class constructed tags: PDU types (RFC 3416, RFC 1157).
    pub mod pdu {
        pub const GET_REQUEST: u8 = 0xA0;
        pub const GET_NEXT_REQUEST: u8 = 0xA1;
        pub const RESPONSE: u8 = 0xA2;
        pub const SET_REQUEST: u8 = 0xA3;
        pub const TRAP_V1: u8 = 0xA4;
        pub const GET_BULK_REQUEST: u8 = 0xA5;
        pub const INFORM_REQUEST: u8 = 0xA6;
        pub const TRAP_V2: u8 = 0xA7;
        pub const REPORT: u8 = 0xA8;
    }
}

/// Content length of a signed 32-bit integer in minimum two's-complement bytes.
pub fn integer_content_len(value: i32) -> usize {
    let mut len = 4;
    let bytes = value.to_be_bytes();
    // Drop redundant leading bytes while the sign is preserved
    for i in 0..3 {
        let lead = bytes[i];
        let next = bytes[i + 1];
        if (lead == 0x00 && next & 0x80 == 0) || (lead == 0xFF && next & 0x80 != 0) {
            len -= 1;
        } else {
            break;
        }
    }
    len
}

/// Content length of an unsigned 32-bit value, with leading 0x00 when the
/// high bit would read as a sign.
pub fn unsigned32_content_len(value: u32) -> usize {
    let significant = (4 - (value.leading_zeros() / 8) as usize).max(1);
    let top_byte = (value >> ((significant - 1) * 8)) as u8;
    if top_byte & 0x80 != 0 {
        significant + 1
    } else {
        significant
    }
}

/// Content length of an unsigned 64-bit value.
pub fn unsigned64_content_len(value: u64) -> usize {
    let significant = (8 - (value.leading_zeros() / 8) as usize).max(1);
    let top_byte = (value >> ((significant - 1) * 8)) as u8;
    if top_byte & 0x80 != 0 {
        significant + 1
    } else {
        significant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_lengths() {
        assert_eq!(integer_content_len(0), 1);
        assert_eq!(integer_content_len(127), 1);
        assert_eq!(integer_content_len(128), 2);
        assert_eq!(integer_content_len(-1), 1);
        assert_eq!(integer_content_len(-128), 1);
        assert_eq!(integer_content_len(-129), 2);
        assert_eq!(integer_content_len(i32::MAX), 4);
        assert_eq!(integer_content_len(i32::MIN), 4);
    }

    #[test]
    fn unsigned_lengths() {
        assert_eq!(unsigned32_content_len(0), 1);
        assert_eq!(unsigned32_content_len(127), 1);
        // 128 would read as negative, needs a leading zero
        assert_eq!(unsigned32_content_len(128), 2);
        assert_eq!(unsigned32_content_len(0xFFFF_FFFF), 5);
        assert_eq!(unsigned64_content_len(0), 1);
        assert_eq!(unsigned64_content_len(u64::MAX), 9);
    }
}
