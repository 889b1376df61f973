//! Community-based message format (v1/v2c).
//!
//! `SEQUENCE { version INTEGER, community OCTET STRING, pdu }` - the two
//! versions differ only in the version number.

use crate::ber::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::Pdu;
use crate::version::Version;
use bytes::Bytes;

/// Community-based SNMP message (v1/v2c).
#[derive(Debug, Clone)]
pub struct CommunityMessage {
    /// SNMP version (V1 or V2c)
    pub version: Version,
    /// Community string
    pub community: Bytes,
    /// Protocol data unit
    pub pdu: Pdu,
}

impl CommunityMessage {
    /// Create a new community message.
    ///
    /// # Panics
    /// Panics on `Version::V3`; use [`V3Message`](super::V3Message).
    pub fn new(version: Version, community: impl Into<Bytes>, pdu: Pdu) -> Self {
        assert!(
            matches!(version, Version::V1 | Version::V2c),
            "CommunityMessage only supports V1/V2c, not {:?}",
            version
        );
        Self {
            version,
            community: community.into(),
            pdu,
        }
    }

    /// Encode to BER.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();

        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.community);
            buf.push_integer(self.version.as_i32());
        });

        buf.finish()
    }

    /// Decode from BER.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;

        let raw_version = seq.read_integer()?;
        let version = Version::from_i32(raw_version).ok_or_else(|| {
            Error::decode(seq.offset(), DecodeErrorKind::UnknownVersion(raw_version))
        })?;
        if version == Version::V3 {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::UnknownVersion(3),
            ));
        }

        let community = seq.read_octet_string()?;
        let pdu = Pdu::decode(&mut seq)?;

        Ok(CommunityMessage {
            version,
            community,
            pdu,
        })
    }

    /// Consume and return the PDU.
    pub fn into_pdu(self) -> Pdu {
        self.pdu
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    #[test]
    fn v1_roundtrip() {
        let pdu = Pdu::get_request(42, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]);
        let msg = CommunityMessage::new(Version::V1, &b"public"[..], pdu);

        let decoded = CommunityMessage::decode(msg.encode()).unwrap();

        assert_eq!(decoded.version, Version::V1);
        assert_eq!(decoded.community.as_ref(), b"public");
        assert_eq!(decoded.pdu.request_id, 42);
    }

    #[test]
    fn v2c_roundtrip() {
        let pdu = Pdu::get_request(123, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]);
        let msg = CommunityMessage::new(Version::V2c, &b"private"[..], pdu);

        let decoded = CommunityMessage::decode(msg.encode()).unwrap();

        assert_eq!(decoded.version, Version::V2c);
        assert_eq!(decoded.community.as_ref(), b"private");
        assert_eq!(decoded.pdu.request_id, 123);
    }

    #[test]
    fn v3_wire_version_rejected() {
        // A community decode must not accept a v3 envelope
        let msg = crate::message::V3Message::discovery_request(1, 1400);
        assert!(CommunityMessage::decode(msg.encode()).is_err());
    }

    #[test]
    #[should_panic(expected = "only supports V1/V2c")]
    fn v3_construction_panics() {
        let pdu = Pdu::get_request(1, &[oid!(1, 3, 6)]);
        let _ = CommunityMessage::new(Version::V3, &b"x"[..], pdu);
    }
}
