//! SNMP protocol version.

/// SNMP protocol version.
///
/// The wire values are 0 (v1), 1 (v2c) and 3 (v3); value 2 was assigned to
/// the never-deployed party-based SNMPv2 and is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Version {
    /// SNMPv1 (RFC 1157)
    V1,
    /// SNMPv2c (RFC 1901)
    V2c,
    /// SNMPv3 (RFC 3411-3414)
    V3,
}

impl Version {
    /// Create from the wire value.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::V1),
            1 => Some(Self::V2c),
            3 => Some(Self::V3),
            _ => None,
        }
    }

    /// Get the wire value.
    pub fn as_i32(self) -> i32 {
        match self {
            Self::V1 => 0,
            Self::V2c => 1,
            Self::V3 => 3,
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V1 => write!(f, "SNMPv1"),
            Self::V2c => write!(f, "SNMPv2c"),
            Self::V3 => write!(f, "SNMPv3"),
        }
    }
}
