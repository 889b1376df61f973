//! Object Identifier (OID) type.
//!
//! OIDs are stored as `SmallVec<[u32; 16]>` to avoid heap allocation for
//! common OIDs. Ordering is total and lexicographic over the arcs.

use crate::error::{DecodeErrorKind, Error, OidErrorKind, Result};
use smallvec::SmallVec;
use std::fmt;

/// Maximum number of arcs (sub-identifiers) allowed in an OID.
///
/// Per RFC 2578 Section 3.5: "there are at most 128 sub-identifiers in a
/// value". Enforced during BER decoding.
pub const MAX_OID_LEN: usize = 128;

/// Object Identifier.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Oid {
    arcs: SmallVec<[u32; 16]>,
}

impl Oid {
    /// Create an empty OID.
    pub fn empty() -> Self {
        Self {
            arcs: SmallVec::new(),
        }
    }

    /// Create an OID from arc values.
    pub fn new(arcs: impl IntoIterator<Item = u32>) -> Self {
        Self {
            arcs: arcs.into_iter().collect(),
        }
    }

    /// Create an OID from a slice of arcs.
    pub fn from_slice(arcs: &[u32]) -> Self {
        Self {
            arcs: SmallVec::from_slice(arcs),
        }
    }

    /// Parse an OID from dotted notation (e.g. "1.3.6.1.2.1.1.1.0").
    ///
    /// Parses the string format only; arc constraints (first arc 0..=2,
    /// second arc <= 39 below joint-iso) are checked by
    /// [`validate()`](Self::validate).
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(Self::empty());
        }

        let mut arcs = SmallVec::new();
        for part in s.split('.') {
            if part.is_empty() {
                continue;
            }
            let arc: u32 = part.parse().map_err(|_| {
                Error::invalid_oid_with_input(OidErrorKind::InvalidArc, s.to_string())
            })?;
            arcs.push(arc);
        }

        Ok(Self { arcs })
    }

    /// Get the arc values.
    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    /// Get the number of arcs.
    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    /// Check if the OID is empty.
    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// Check if this OID starts with another OID.
    ///
    /// An OID always starts with itself, and any OID starts with an
    /// empty OID. `base.is_prefix_of(oid)` is the mirror of
    /// `oid.starts_with(base)`.
    pub fn starts_with(&self, other: &Oid) -> bool {
        self.arcs.len() >= other.arcs.len() && self.arcs[..other.arcs.len()] == other.arcs[..]
    }

    /// Check if this OID is a prefix of another (subtree containment).
    pub fn is_prefix_of(&self, other: &Oid) -> bool {
        other.starts_with(self)
    }

    /// The longest common prefix of two OIDs.
    pub fn common_prefix(&self, other: &Oid) -> Oid {
        let shared = self
            .arcs
            .iter()
            .zip(other.arcs.iter())
            .take_while(|(a, b)| a == b)
            .count();
        Self::from_slice(&self.arcs[..shared])
    }

    /// Create a child OID by appending an arc.
    pub fn child(&self, arc: u32) -> Oid {
        let mut arcs = self.arcs.clone();
        arcs.push(arc);
        Oid { arcs }
    }

    /// Validate arc constraints per X.690 Section 8.19.4.
    ///
    /// The first arc must be 0, 1, or 2; the second arc must be <= 39 when
    /// the first is 0 or 1. Sub-identifier 0 is permitted anywhere after
    /// the first pair.
    pub fn validate(&self) -> Result<()> {
        if self.arcs.is_empty() {
            return Ok(());
        }

        let first = self.arcs[0];
        if first > 2 {
            return Err(Error::invalid_oid(OidErrorKind::InvalidFirstArc(first)));
        }

        if self.arcs.len() >= 2 {
            let second = self.arcs[1];
            if first < 2 && second >= 40 {
                return Err(Error::invalid_oid(OidErrorKind::InvalidSecondArc {
                    first,
                    second,
                }));
            }
        }

        if self.arcs.len() > MAX_OID_LEN {
            return Err(Error::invalid_oid(OidErrorKind::TooManyArcs {
                count: self.arcs.len(),
                max: MAX_OID_LEN,
            }));
        }

        Ok(())
    }

    /// Encode the OID body into a stack-allocated buffer.
    ///
    /// X.690 Section 8.19: the first two arcs pack as `arc1 * 40 + arc2`;
    /// every sub-identifier is base-128 big-endian with the high bit set on
    /// all but the final byte.
    pub fn to_ber_smallvec(&self) -> SmallVec<[u8; 64]> {
        let mut bytes = SmallVec::new();

        if self.arcs.is_empty() {
            return bytes;
        }

        // First pair packs into one subidentifier; base-128 because arc2
        // can exceed 127 under joint-iso (arc1 = 2)
        if self.arcs.len() >= 2 {
            encode_subidentifier(&mut bytes, self.arcs[0] * 40 + self.arcs[1]);
        } else {
            encode_subidentifier(&mut bytes, self.arcs[0] * 40);
        }

        for &arc in self.arcs.iter().skip(2) {
            encode_subidentifier(&mut bytes, arc);
        }

        bytes
    }

    /// Encode the OID body to a Vec.
    pub fn to_ber(&self) -> Vec<u8> {
        self.to_ber_smallvec().to_vec()
    }

    /// Total encoded length of the OID TLV (tag + length + body).
    pub(crate) fn ber_encoded_len(&self) -> usize {
        let body = self.to_ber_smallvec().len();
        1 + crate::ber::length_encoded_len(body) + body
    }

    /// Decode an OID body.
    ///
    /// Enforces [`MAX_OID_LEN`] per RFC 2578 Section 3.5.
    pub fn from_ber(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::empty());
        }

        let mut arcs = SmallVec::new();

        let (first_subid, consumed) = decode_subidentifier(data)?;
        if first_subid < 40 {
            arcs.push(0);
            arcs.push(first_subid);
        } else if first_subid < 80 {
            arcs.push(1);
            arcs.push(first_subid - 40);
        } else {
            arcs.push(2);
            arcs.push(first_subid - 80);
        }

        let mut i = consumed;
        while i < data.len() {
            let (arc, n) = decode_subidentifier(&data[i..])?;
            arcs.push(arc);
            i += n;

            if arcs.len() > MAX_OID_LEN {
                return Err(Error::decode(
                    i,
                    DecodeErrorKind::OidTooLong {
                        count: arcs.len(),
                        max: MAX_OID_LEN,
                    },
                ));
            }
        }

        Ok(Self { arcs })
    }
}

/// Encode one subidentifier in base-128, high bit on all but the last byte.
#[inline]
fn encode_subidentifier(bytes: &mut SmallVec<[u8; 64]>, value: u32) {
    if value == 0 {
        bytes.push(0);
        return;
    }

    let mut groups = 0;
    let mut temp = value;
    while temp > 0 {
        groups += 1;
        temp >>= 7;
    }

    for i in (0..groups).rev() {
        let mut byte = ((value >> (i * 7)) & 0x7F) as u8;
        if i > 0 {
            byte |= 0x80;
        }
        bytes.push(byte);
    }
}

/// Decode one subidentifier, returning (value, bytes consumed).
fn decode_subidentifier(data: &[u8]) -> Result<(u32, usize)> {
    let mut value: u32 = 0;
    let mut i = 0;

    loop {
        let Some(&byte) = data.get(i) else {
            return Err(Error::decode(i, DecodeErrorKind::TruncatedData));
        };
        i += 1;

        if value > (u32::MAX >> 7) {
            return Err(Error::decode(i, DecodeErrorKind::IntegerOverflow));
        }

        value = (value << 7) | ((byte & 0x7F) as u32);

        if byte & 0x80 == 0 {
            break;
        }
    }

    Ok((value, i))
}

/// Sort OIDs lexicographically (stable).
pub fn sort_oids(mut oids: Vec<Oid>) -> Vec<Oid> {
    oids.sort();
    oids
}

/// Drop OIDs that are contained in an earlier kept OID's subtree.
///
/// Input must be sorted; used to collapse overlapping walk roots so a
/// subtree is never retrieved twice.
pub fn uniq_base_oids(oids: Vec<Oid>) -> Vec<Oid> {
    let mut out: Vec<Oid> = Vec::with_capacity(oids.len());
    for oid in oids {
        match out.last() {
            Some(kept) if oid.starts_with(kept) => {}
            _ => out.push(oid),
        }
    }
    out
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.arcs {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{}", arc)?;
            first = false;
        }
        Ok(())
    }
}

impl std::str::FromStr for Oid {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Self::from_slice(arcs)
    }
}

impl<const N: usize> From<[u32; N]> for Oid {
    fn from(arcs: [u32; N]) -> Self {
        Self::new(arcs)
    }
}

impl PartialOrd for Oid {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Oid {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.arcs.cmp(&other.arcs)
    }
}

/// Create an OID from literal arcs.
///
/// ```
/// use snmpkit::oid;
///
/// let sys_descr = oid!(1, 3, 6, 1, 2, 1, 1, 1, 0);
/// assert_eq!(sys_descr.to_string(), "1.3.6.1.2.1.1.1.0");
/// ```
#[macro_export]
macro_rules! oid {
    ($($arc:expr),* $(,)?) => {
        $crate::oid::Oid::from_slice(&[$($arc),*])
    };
}
