//! USM security parameters (RFC 3414 Section 2.4).
//!
//! Carried inside the v3 message as an OCTET STRING wrapping this sequence:
//!
//! ```text
//! UsmSecurityParameters ::= SEQUENCE {
//!     msgAuthoritativeEngineID     OCTET STRING,
//!     msgAuthoritativeEngineBoots  INTEGER (0..2147483647),
//!     msgAuthoritativeEngineTime   INTEGER (0..2147483647),
//!     msgUserName                  OCTET STRING (SIZE(0..32)),
//!     msgAuthenticationParameters  OCTET STRING,
//!     msgPrivacyParameters         OCTET STRING
//! }
//! ```

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, Result};

/// USM security parameters.
#[derive(Debug, Clone)]
pub struct UsmSecurityParams {
    /// Authoritative engine id
    pub engine_id: Bytes,
    /// Engine boot count
    pub engine_boots: u32,
    /// Engine time, seconds since last boot
    pub engine_time: u32,
    /// User name
    pub username: Bytes,
    /// Authentication parameters (12-byte HMAC-96, or empty)
    pub auth_params: Bytes,
    /// Privacy parameters (8-byte salt, or empty)
    pub priv_params: Bytes,
}

impl UsmSecurityParams {
    /// Create parameters with empty auth/priv fields.
    pub fn new(
        engine_id: impl Into<Bytes>,
        engine_boots: u32,
        engine_time: u32,
        username: impl Into<Bytes>,
    ) -> Self {
        Self {
            engine_id: engine_id.into(),
            engine_boots,
            engine_time,
            username: username.into(),
            auth_params: Bytes::new(),
            priv_params: Bytes::new(),
        }
    }

    /// Fully empty parameters, as sent in a discovery request.
    pub fn empty() -> Self {
        Self::new(Bytes::new(), 0, 0, Bytes::new())
    }

    /// Set authentication parameters.
    pub fn with_auth_params(mut self, auth_params: impl Into<Bytes>) -> Self {
        self.auth_params = auth_params.into();
        self
    }

    /// Set privacy parameters.
    pub fn with_priv_params(mut self, priv_params: impl Into<Bytes>) -> Self {
        self.priv_params = priv_params.into();
        self
    }

    /// Install the zeroed auth placeholder the HMAC is computed over.
    pub fn with_auth_placeholder(mut self, mac_len: usize) -> Self {
        self.auth_params = Bytes::from(vec![0u8; mac_len]);
        self
    }

    /// Encode to standalone BER bytes.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_octet_string(&self.priv_params);
            buf.push_octet_string(&self.auth_params);
            buf.push_octet_string(&self.username);
            buf.push_unsigned32(tag::universal::INTEGER, self.engine_time);
            buf.push_unsigned32(tag::universal::INTEGER, self.engine_boots);
            buf.push_octet_string(&self.engine_id);
        });
        buf.finish()
    }

    /// Decode from BER bytes.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;

        let engine_id = seq.read_octet_string()?;

        let raw_boots = seq.read_integer()?;
        if raw_boots < 0 {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::EngineFieldOutOfRange { value: raw_boots },
            ));
        }

        let raw_time = seq.read_integer()?;
        if raw_time < 0 {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::EngineFieldOutOfRange { value: raw_time },
            ));
        }

        let username = seq.read_octet_string()?;
        let auth_params = seq.read_octet_string()?;
        let priv_params = seq.read_octet_string()?;

        Ok(Self {
            engine_id,
            engine_boots: raw_boots as u32,
            engine_time: raw_time as u32,
            username,
            auth_params,
            priv_params,
        })
    }

    /// Locate the auth params content within a fully encoded v3 message.
    ///
    /// Returns (offset, length) of the msgAuthenticationParameters value so
    /// the HMAC can be patched in place after signing, or verified after
    /// zeroing. Walks the fixed message structure: outer SEQUENCE, version,
    /// msgGlobalData, the security-parameters OCTET STRING, then the USM
    /// sequence fields up to authParams.
    pub fn find_auth_params_offset(encoded_msg: &[u8]) -> Option<(usize, usize)> {
        let mut offset = 0;

        // Outer SEQUENCE header
        if *encoded_msg.get(offset)? != 0x30 {
            return None;
        }
        offset += 1;
        let (_, len_size) = parse_length(&encoded_msg[offset..])?;
        offset += len_size;

        // version INTEGER
        if *encoded_msg.get(offset)? != 0x02 {
            return None;
        }
        offset += 1;
        let (ver_len, len_size) = parse_length(&encoded_msg[offset..])?;
        offset += len_size + ver_len;

        // msgGlobalData SEQUENCE, skipped whole
        if *encoded_msg.get(offset)? != 0x30 {
            return None;
        }
        offset += 1;
        let (global_len, len_size) = parse_length(&encoded_msg[offset..])?;
        offset += len_size + global_len;

        // msgSecurityParameters OCTET STRING header
        if *encoded_msg.get(offset)? != 0x04 {
            return None;
        }
        offset += 1;
        let (_, len_size) = parse_length(&encoded_msg[offset..])?;
        offset += len_size;

        // USM SEQUENCE header
        if *encoded_msg.get(offset)? != 0x30 {
            return None;
        }
        offset += 1;
        let (_, len_size) = parse_length(&encoded_msg[offset..])?;
        offset += len_size;

        // engineID, boots, time, username
        for _ in 0..4 {
            offset = skip_tlv(encoded_msg, offset)?;
        }

        // authParams OCTET STRING
        if *encoded_msg.get(offset)? != 0x04 {
            return None;
        }
        offset += 1;
        let (auth_len, len_size) = parse_length(&encoded_msg[offset..])?;
        let auth_start = offset + len_size;

        if auth_start + auth_len > encoded_msg.len() {
            return None;
        }

        Some((auth_start, auth_len))
    }
}

/// Parse a BER length, returning (length, bytes consumed).
fn parse_length(data: &[u8]) -> Option<(usize, usize)> {
    let first = *data.first()?;
    if first < 0x80 {
        Some((first as usize, 1))
    } else if first == 0x80 {
        None
    } else {
        let count = (first & 0x7F) as usize;
        if count == 0 || count > 4 || data.len() < 1 + count {
            return None;
        }
        let mut len = 0usize;
        for &b in &data[1..1 + count] {
            len = (len << 8) | (b as usize);
        }
        Some((len, 1 + count))
    }
}

/// Skip one TLV, returning the offset past it.
fn skip_tlv(data: &[u8], offset: usize) -> Option<usize> {
    if offset >= data.len() {
        return None;
    }
    let mut pos = offset + 1;
    let (len, len_size) = parse_length(data.get(pos..)?)?;
    pos += len_size + len;
    if pos > data.len() {
        return None;
    }
    Some(pos)
}
