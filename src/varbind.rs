//! Variable bindings: (OID, value) pairs and list helpers.
//!
//! The list helpers implement the ordered-sequence operations the bulk-walk
//! aggregation relies on: stable sort by OID, consecutive-duplicate removal,
//! subtree matching and exact lookup.

use crate::ber::{Decoder, EncodeBuf};
use crate::error::Result;
use crate::oid::Oid;
use crate::value::Value;

/// Variable binding - an OID paired with a value.
#[derive(Debug, Clone, PartialEq)]
pub struct VarBind {
    /// The object identifier.
    pub oid: Oid,
    /// The value.
    pub value: Value,
}

impl VarBind {
    /// Create a new VarBind.
    pub fn new(oid: Oid, value: Value) -> Self {
        Self { oid, value }
    }

    /// Create a VarBind with a NULL value (request placeholder).
    pub fn null(oid: Oid) -> Self {
        Self {
            oid,
            value: Value::Null,
        }
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            self.value.encode(buf);
            buf.push_oid(&self.oid);
        });
    }

    /// Exact encoded size in bytes, computed without allocating.
    pub fn encoded_size(&self) -> usize {
        use crate::ber::length_encoded_len;

        let content = self.oid.ber_encoded_len() + self.value.ber_encoded_len();
        1 + length_encoded_len(content) + content
    }

    /// Decode from BER.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        let oid = seq.read_oid()?;
        let value = Value::decode(&mut seq)?;
        Ok(VarBind { oid, value })
    }
}

impl std::fmt::Display for VarBind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.oid, self.value)
    }
}

/// Encode a varbind list as SEQUENCE OF SEQUENCE { oid, value }.
pub fn encode_varbind_list(buf: &mut EncodeBuf, varbinds: &[VarBind]) {
    buf.push_sequence(|buf| {
        // Reverse order into the reverse-fill buffer
        for vb in varbinds.iter().rev() {
            vb.encode(buf);
        }
    });
}

/// Decode a varbind list.
pub fn decode_varbind_list(decoder: &mut Decoder) -> Result<Vec<VarBind>> {
    let mut seq = decoder.read_sequence()?;

    let estimated = (seq.remaining() / 16).max(1);
    let mut varbinds = Vec::with_capacity(estimated);

    while !seq.is_empty() {
        varbinds.push(VarBind::decode(&mut seq)?);
    }

    Ok(varbinds)
}

/// Stable sort by OID.
pub fn sort_varbinds(mut varbinds: Vec<VarBind>) -> Vec<VarBind> {
    varbinds.sort_by(|a, b| a.oid.cmp(&b.oid));
    varbinds
}

/// Remove consecutive entries with duplicate OIDs, keeping the first.
///
/// On a sorted list this removes exactly the duplicates.
pub fn uniq_varbinds(varbinds: Vec<VarBind>) -> Vec<VarBind> {
    let mut out: Vec<VarBind> = Vec::with_capacity(varbinds.len());
    for vb in varbinds {
        match out.last() {
            Some(prev) if prev.oid == vb.oid => {}
            _ => out.push(vb),
        }
    }
    out
}

/// Collect the varbinds whose OIDs sit in the subtree rooted at `base`.
pub fn match_base_oids<'a>(varbinds: &'a [VarBind], base: &Oid) -> Vec<&'a VarBind> {
    varbinds
        .iter()
        .filter(|vb| vb.oid.starts_with(base))
        .collect()
}

/// Find the first varbind with exactly the given OID.
pub fn match_oid<'a>(varbinds: &'a [VarBind], oid: &Oid) -> Option<&'a VarBind> {
    varbinds.iter().find(|vb| &vb.oid == oid)
}
