//! SNMP message envelopes.
//!
//! v1/v2c share the community envelope; v3 carries global data, USM
//! security parameters and a (possibly encrypted) scoped PDU.

mod community;
mod v3;

pub use community::CommunityMessage;
pub use v3::{
    MSG_MAX_SIZE_MINIMUM, MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, SecurityModel,
    V3Message, V3MessageData,
};

use crate::ber::Decoder;
use crate::error::{DecodeErrorKind, Error, Result};
use crate::version::Version;
use bytes::Bytes;

/// Peek the version field of a serialized message without full decoding.
///
/// Every SNMP message starts `SEQUENCE { INTEGER version, ... }`; the trap
/// server uses this to pick the right security processing before parsing
/// the rest.
pub fn peek_version(data: &Bytes) -> Result<Version> {
    let mut decoder = Decoder::new(data.clone());
    let mut seq = decoder.read_sequence()?;
    let raw = seq.read_integer()?;
    Version::from_i32(raw)
        .ok_or_else(|| Error::decode(seq.offset(), DecodeErrorKind::UnknownVersion(raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::pdu::Pdu;

    #[test]
    fn peek_version_community() {
        let pdu = Pdu::get_request(1, &[oid!(1, 3, 6)]);
        let v1 = CommunityMessage::new(Version::V1, &b"public"[..], pdu.clone()).encode();
        let v2c = CommunityMessage::new(Version::V2c, &b"public"[..], pdu).encode();

        assert_eq!(peek_version(&v1).unwrap(), Version::V1);
        assert_eq!(peek_version(&v2c).unwrap(), Version::V2c);
    }

    #[test]
    fn peek_version_v3() {
        let msg = V3Message::discovery_request(42, 1400);
        assert_eq!(peek_version(&msg.encode()).unwrap(), Version::V3);
    }

    #[test]
    fn peek_version_rejects_unknown() {
        // SEQUENCE { INTEGER 2 } - the never-deployed party-based v2
        let data = Bytes::from_static(&[0x30, 0x03, 0x02, 0x01, 0x02]);
        assert!(peek_version(&data).is_err());
    }
}
