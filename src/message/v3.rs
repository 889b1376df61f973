//! SNMPv3 message format (RFC 3412).
//!
//! ```text
//! SEQUENCE {
//!     INTEGER version (3)
//!     SEQUENCE msgGlobalData {
//!         INTEGER msgID
//!         INTEGER msgMaxSize
//!         OCTET STRING msgFlags (1 byte: reportable | priv | auth)
//!         INTEGER msgSecurityModel (3 = USM)
//!     }
//!     OCTET STRING msgSecurityParameters (USM-encoded)
//!     msgData (plaintext ScopedPDU or encrypted OCTET STRING)
//! }
//! ```

use crate::ber::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::Pdu;
use bytes::Bytes;

/// RFC 3412 Section 6.1: smallest msgMaxSize a conforming engine may state.
pub const MSG_MAX_SIZE_MINIMUM: i32 = 484;

/// SNMPv3 security model identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum SecurityModel {
    /// User-based Security Model (RFC 3414)
    Usm = 3,
}

impl SecurityModel {
    /// Create from the wire value.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            3 => Some(Self::Usm),
            _ => None,
        }
    }

    /// Get the wire value.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// SNMPv3 security level, ordered weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecurityLevel {
    /// No authentication, no privacy
    NoAuthNoPriv,
    /// Authentication only
    AuthNoPriv,
    /// Authentication and privacy
    AuthPriv,
}

impl SecurityLevel {
    /// Decode from the msgFlags byte; priv without auth is invalid.
    pub fn from_flags(flags: u8) -> Option<Self> {
        let auth = flags & 0x01 != 0;
        let privacy = flags & 0x02 != 0;

        match (auth, privacy) {
            (false, false) => Some(Self::NoAuthNoPriv),
            (true, false) => Some(Self::AuthNoPriv),
            (true, true) => Some(Self::AuthPriv),
            (false, true) => None,
        }
    }

    /// Encode the auth/priv bits (without the reportable flag).
    pub fn to_flags(self) -> u8 {
        match self {
            Self::NoAuthNoPriv => 0x00,
            Self::AuthNoPriv => 0x01,
            Self::AuthPriv => 0x03,
        }
    }

    /// Whether authentication applies.
    pub fn requires_auth(self) -> bool {
        matches!(self, Self::AuthNoPriv | Self::AuthPriv)
    }

    /// Whether encryption applies.
    pub fn requires_priv(self) -> bool {
        matches!(self, Self::AuthPriv)
    }
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAuthNoPriv => write!(f, "noAuthNoPriv"),
            Self::AuthNoPriv => write!(f, "authNoPriv"),
            Self::AuthPriv => write!(f, "authPriv"),
        }
    }
}

/// Message flags (RFC 3412 Section 6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgFlags {
    /// Security level
    pub security_level: SecurityLevel,
    /// Whether a Report PDU may be sent on error
    pub reportable: bool,
}

impl MsgFlags {
    /// Create new message flags.
    pub fn new(security_level: SecurityLevel, reportable: bool) -> Self {
        Self {
            security_level,
            reportable,
        }
    }

    /// Decode from the flags byte.
    pub fn from_byte(byte: u8) -> Result<Self> {
        let security_level = SecurityLevel::from_flags(byte)
            .ok_or_else(|| Error::decode(0, DecodeErrorKind::InvalidMsgFlags))?;
        Ok(Self {
            security_level,
            reportable: byte & 0x04 != 0,
        })
    }

    /// Encode to the flags byte.
    pub fn to_byte(self) -> u8 {
        let mut flags = self.security_level.to_flags();
        if self.reportable {
            flags |= 0x04;
        }
        flags
    }
}

/// msgGlobalData header.
#[derive(Debug, Clone)]
pub struct MsgGlobalData {
    /// Message id for request/response correlation
    pub msg_id: i32,
    /// Maximum message size the sender accepts
    pub msg_max_size: i32,
    /// Flags (security level + reportable)
    pub msg_flags: MsgFlags,
    /// Security model (USM only)
    pub msg_security_model: SecurityModel,
}

impl MsgGlobalData {
    /// Create new global data with the USM security model.
    pub fn new(msg_id: i32, msg_max_size: i32, msg_flags: MsgFlags) -> Self {
        Self {
            msg_id,
            msg_max_size,
            msg_flags,
            msg_security_model: SecurityModel::Usm,
        }
    }

    /// Encode into the buffer.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            buf.push_integer(self.msg_security_model.as_i32());
            // msgFlags is a 1-byte OCTET STRING
            buf.push_octet_string(&[self.msg_flags.to_byte()]);
            buf.push_integer(self.msg_max_size);
            buf.push_integer(self.msg_id);
        });
    }

    /// Decode, validating msgMaxSize and the security model.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;

        let msg_id = seq.read_integer()?;
        let msg_max_size = seq.read_integer()?;

        if msg_max_size < MSG_MAX_SIZE_MINIMUM {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::MsgMaxSizeTooSmall {
                    value: msg_max_size,
                    minimum: MSG_MAX_SIZE_MINIMUM,
                },
            ));
        }

        let flags_bytes = seq.read_octet_string()?;
        if flags_bytes.len() != 1 {
            return Err(Error::decode(seq.offset(), DecodeErrorKind::InvalidMsgFlags));
        }
        let msg_flags = MsgFlags::from_byte(flags_bytes[0])?;

        let raw_model = seq.read_integer()?;
        let msg_security_model = SecurityModel::from_i32(raw_model).ok_or_else(|| {
            Error::decode(seq.offset(), DecodeErrorKind::UnknownSecurityModel(raw_model))
        })?;

        Ok(Self {
            msg_id,
            msg_max_size,
            msg_flags,
            msg_security_model,
        })
    }
}

/// Scoped PDU: context engine id, context name, and the PDU itself.
#[derive(Debug, Clone)]
pub struct ScopedPdu {
    /// Context engine id (usually the authoritative engine id)
    pub context_engine_id: Bytes,
    /// Context name (usually empty)
    pub context_name: Bytes,
    /// The PDU
    pub pdu: Pdu,
}

impl ScopedPdu {
    /// Create a new scoped PDU.
    pub fn new(
        context_engine_id: impl Into<Bytes>,
        context_name: impl Into<Bytes>,
        pdu: Pdu,
    ) -> Self {
        Self {
            context_engine_id: context_engine_id.into(),
            context_name: context_name.into(),
            pdu,
        }
    }

    /// Create with an empty context.
    pub fn with_empty_context(pdu: Pdu) -> Self {
        Self::new(Bytes::new(), Bytes::new(), pdu)
    }

    /// Encode into the buffer.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.context_name);
            buf.push_octet_string(&self.context_engine_id);
        });
    }

    /// Encode to standalone bytes (the encryption input).
    pub fn encode_to_bytes(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        self.encode(&mut buf);
        buf.finish()
    }

    /// Decode from a decoder.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;

        let context_engine_id = seq.read_octet_string()?;
        let context_name = seq.read_octet_string()?;
        let pdu = Pdu::decode(&mut seq)?;

        Ok(Self {
            context_engine_id,
            context_name,
            pdu,
        })
    }
}

/// Message data payload.
#[derive(Debug, Clone)]
pub enum V3MessageData {
    /// Plaintext scoped PDU (noAuthNoPriv / authNoPriv)
    Plaintext(ScopedPdu),
    /// Encrypted scoped PDU ciphertext (authPriv)
    Encrypted(Bytes),
}

/// SNMPv3 message.
#[derive(Debug, Clone)]
pub struct V3Message {
    /// Header
    pub global_data: MsgGlobalData,
    /// Opaque USM security parameters
    pub security_params: Bytes,
    /// Plaintext or encrypted payload
    pub data: V3MessageData,
}

impl V3Message {
    /// Create a message with plaintext data.
    pub fn new(global_data: MsgGlobalData, security_params: Bytes, scoped_pdu: ScopedPdu) -> Self {
        Self {
            global_data,
            security_params,
            data: V3MessageData::Plaintext(scoped_pdu),
        }
    }

    /// Create a message with encrypted data.
    pub fn new_encrypted(
        global_data: MsgGlobalData,
        security_params: Bytes,
        encrypted: Bytes,
    ) -> Self {
        Self {
            global_data,
            security_params,
            data: V3MessageData::Encrypted(encrypted),
        }
    }

    /// The scoped PDU, if plaintext.
    pub fn scoped_pdu(&self) -> Option<&ScopedPdu> {
        match &self.data {
            V3MessageData::Plaintext(pdu) => Some(pdu),
            V3MessageData::Encrypted(_) => None,
        }
    }

    /// Consume into the scoped PDU, if plaintext.
    pub fn into_scoped_pdu(self) -> Option<ScopedPdu> {
        match self.data {
            V3MessageData::Plaintext(pdu) => Some(pdu),
            V3MessageData::Encrypted(_) => None,
        }
    }

    /// The message id.
    pub fn msg_id(&self) -> i32 {
        self.global_data.msg_id
    }

    /// The security level from msgFlags.
    pub fn security_level(&self) -> SecurityLevel {
        self.global_data.msg_flags.security_level
    }

    /// Encode to BER.
    ///
    /// For authenticated messages the caller encodes with a zeroed auth
    /// placeholder, computes the HMAC over the whole encoding, and patches
    /// the placeholder in place.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();

        buf.push_sequence(|buf| {
            match &self.data {
                V3MessageData::Plaintext(scoped_pdu) => scoped_pdu.encode(buf),
                V3MessageData::Encrypted(ciphertext) => buf.push_octet_string(ciphertext),
            }

            buf.push_octet_string(&self.security_params);
            self.global_data.encode(buf);
            buf.push_integer(3);
        });

        buf.finish()
    }

    /// Decode from BER.
    ///
    /// With the priv flag set, `data` holds the raw ciphertext; the caller
    /// decrypts through USM before touching the scoped PDU.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;

        let version = seq.read_integer()?;
        if version != 3 {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::UnknownVersion(version),
            ));
        }

        let global_data = MsgGlobalData::decode(&mut seq)?;
        let security_params = seq.read_octet_string()?;

        let data = if global_data.msg_flags.security_level.requires_priv() {
            V3MessageData::Encrypted(seq.read_octet_string()?)
        } else {
            V3MessageData::Plaintext(ScopedPdu::decode(&mut seq)?)
        };

        Ok(Self {
            global_data,
            security_params,
            data,
        })
    }

    /// Build an engine discovery request.
    ///
    /// Empty engine id, boots/time zero, empty user name, noAuthNoPriv with
    /// the reportable flag set, wrapping an empty GetRequest. The peer
    /// answers with a usmStatsUnknownEngineIDs Report.
    pub fn discovery_request(msg_id: i32, msg_max_size: i32) -> Self {
        let global_data = MsgGlobalData::new(
            msg_id,
            msg_max_size,
            MsgFlags::new(SecurityLevel::NoAuthNoPriv, true),
        );

        let security_params = crate::usm::UsmSecurityParams::empty().encode();
        let scoped_pdu = ScopedPdu::with_empty_context(Pdu::get_request(0, &[]));

        Self::new(global_data, security_params, scoped_pdu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    #[test]
    fn security_level_flags() {
        assert_eq!(SecurityLevel::NoAuthNoPriv.to_flags(), 0x00);
        assert_eq!(SecurityLevel::AuthNoPriv.to_flags(), 0x01);
        assert_eq!(SecurityLevel::AuthPriv.to_flags(), 0x03);

        assert_eq!(SecurityLevel::from_flags(0x00), Some(SecurityLevel::NoAuthNoPriv));
        assert_eq!(SecurityLevel::from_flags(0x01), Some(SecurityLevel::AuthNoPriv));
        assert_eq!(SecurityLevel::from_flags(0x03), Some(SecurityLevel::AuthPriv));
        // priv without auth is invalid
        assert_eq!(SecurityLevel::from_flags(0x02), None);
    }

    #[test]
    fn msg_flags_roundtrip() {
        let flags = MsgFlags::new(SecurityLevel::AuthPriv, true);
        assert_eq!(flags.to_byte(), 0x07);

        let decoded = MsgFlags::from_byte(0x07).unwrap();
        assert_eq!(decoded.security_level, SecurityLevel::AuthPriv);
        assert!(decoded.reportable);
    }

    #[test]
    fn global_data_roundtrip() {
        let global = MsgGlobalData::new(12345, 1400, MsgFlags::new(SecurityLevel::AuthNoPriv, true));

        let mut buf = EncodeBuf::new();
        global.encode(&mut buf);
        let mut decoder = Decoder::new(buf.finish());
        let decoded = MsgGlobalData::decode(&mut decoder).unwrap();

        assert_eq!(decoded.msg_id, 12345);
        assert_eq!(decoded.msg_max_size, 1400);
        assert_eq!(decoded.msg_flags.security_level, SecurityLevel::AuthNoPriv);
        assert!(decoded.msg_flags.reportable);
        assert_eq!(decoded.msg_security_model, SecurityModel::Usm);
    }

    #[test]
    fn global_data_rejects_small_msg_max_size() {
        let global = MsgGlobalData::new(1, 400, MsgFlags::new(SecurityLevel::NoAuthNoPriv, true));

        let mut buf = EncodeBuf::new();
        global.encode(&mut buf);
        let mut decoder = Decoder::new(buf.finish());

        let err = MsgGlobalData::decode(&mut decoder).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                kind: DecodeErrorKind::MsgMaxSizeTooSmall { value: 400, minimum: 484 },
                ..
            }
        ));
    }

    #[test]
    fn global_data_rejects_unknown_security_model() {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_integer(99);
            buf.push_octet_string(&[0x04]);
            buf.push_integer(1400);
            buf.push_integer(1);
        });
        let mut decoder = Decoder::new(buf.finish());

        let err = MsgGlobalData::decode(&mut decoder).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                kind: DecodeErrorKind::UnknownSecurityModel(99),
                ..
            }
        ));
    }

    #[test]
    fn scoped_pdu_roundtrip() {
        let pdu = Pdu::get_request(42, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]);
        let scoped = ScopedPdu::new(&b"engine"[..], &b"ctx"[..], pdu);

        let mut buf = EncodeBuf::new();
        scoped.encode(&mut buf);
        let mut decoder = Decoder::new(buf.finish());
        let decoded = ScopedPdu::decode(&mut decoder).unwrap();

        assert_eq!(decoded.context_engine_id.as_ref(), b"engine");
        assert_eq!(decoded.context_name.as_ref(), b"ctx");
        assert_eq!(decoded.pdu.request_id, 42);
    }

    #[test]
    fn plaintext_message_roundtrip() {
        let global = MsgGlobalData::new(100, 1400, MsgFlags::new(SecurityLevel::NoAuthNoPriv, true));
        let pdu = Pdu::get_request(42, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]);
        let msg = V3Message::new(
            global,
            Bytes::from_static(b"usm-params"),
            ScopedPdu::with_empty_context(pdu),
        );

        let decoded = V3Message::decode(msg.encode()).unwrap();

        assert_eq!(decoded.msg_id(), 100);
        assert_eq!(decoded.security_level(), SecurityLevel::NoAuthNoPriv);
        assert_eq!(decoded.security_params.as_ref(), b"usm-params");
        assert_eq!(decoded.scoped_pdu().unwrap().pdu.request_id, 42);
    }

    #[test]
    fn encrypted_message_roundtrip() {
        let global = MsgGlobalData::new(200, 1400, MsgFlags::new(SecurityLevel::AuthPriv, false));
        let msg = V3Message::new_encrypted(
            global,
            Bytes::from_static(b"usm-params"),
            Bytes::from_static(b"ciphertext"),
        );

        let decoded = V3Message::decode(msg.encode()).unwrap();
        assert_eq!(decoded.security_level(), SecurityLevel::AuthPriv);
        match &decoded.data {
            V3MessageData::Encrypted(data) => assert_eq!(data.as_ref(), b"ciphertext"),
            V3MessageData::Plaintext(_) => panic!("expected ciphertext"),
        }
    }

    #[test]
    fn discovery_request_shape() {
        let msg = V3Message::discovery_request(7, 1400);
        assert_eq!(msg.security_level(), SecurityLevel::NoAuthNoPriv);
        assert!(msg.global_data.msg_flags.reportable);

        let scoped = msg.scoped_pdu().unwrap();
        assert!(scoped.context_engine_id.is_empty());
        assert!(scoped.pdu.varbinds.is_empty());

        // Must survive its own codec
        let decoded = V3Message::decode(msg.encode()).unwrap();
        assert_eq!(decoded.msg_id(), 7);
    }
}
