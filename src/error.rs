//! Error types for snmpkit.
//!
//! One crate-level [`Error`] enum covers all failure classes:
//!
//! - `Argument` - invalid configuration or call argument, raised before any I/O
//! - `Decode` - malformed wire bytes, never retried
//! - `Io` / `Timeout` - transport failures, retried per policy
//! - `AuthenticationFailed` / `DecryptionFailed` / `EncryptionFailed` /
//!   `UnknownEngineId` / `NotInTimeWindow` - SNMPv3 security failures
//!
//! A non-zero error-status in a Response PDU is **not** an error: operations
//! return the PDU so callers can inspect `error_status` and `error_index`.
//! [`ErrorStatus`] enumerates the RFC 3416 codes for that purpose.

use std::net::SocketAddr;
use std::time::Duration;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Authentication failure kinds (SNMPv3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// No authentication key available.
    NoAuthKey,
    /// HMAC verification failed.
    HmacMismatch,
    /// Authentication parameters have the wrong length.
    WrongMacLength { expected: usize, actual: usize },
    /// Could not locate the auth params field in the message.
    AuthParamsNotFound,
}

impl std::fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAuthKey => write!(f, "no authentication key available"),
            Self::HmacMismatch => write!(f, "HMAC verification failed"),
            Self::WrongMacLength { expected, actual } => {
                write!(f, "wrong MAC length: expected {}, got {}", expected, actual)
            }
            Self::AuthParamsNotFound => write!(f, "could not locate auth params in message"),
        }
    }
}

/// Cryptographic failure kinds (SNMPv3 privacy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoErrorKind {
    /// No privacy key available.
    NoPrivKey,
    /// Invalid key length for the cipher.
    InvalidKeyLength,
    /// Cipher operation failed.
    CipherError,
    /// privParameters field has the wrong length.
    InvalidPrivParamsLength { expected: usize, actual: usize },
    /// Ciphertext length is not a multiple of the cipher block size.
    InvalidCiphertextLength { length: usize, block_size: usize },
}

impl std::fmt::Display for CryptoErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPrivKey => write!(f, "no privacy key available"),
            Self::InvalidKeyLength => write!(f, "invalid key length"),
            Self::CipherError => write!(f, "cipher operation failed"),
            Self::InvalidPrivParamsLength { expected, actual } => {
                write!(
                    f,
                    "invalid privParameters length: expected {}, got {}",
                    expected, actual
                )
            }
            Self::InvalidCiphertextLength { length, block_size } => {
                write!(
                    f,
                    "ciphertext length {} not multiple of block size {}",
                    length, block_size
                )
            }
        }
    }
}

/// BER decode failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// Expected a different tag.
    UnexpectedTag { expected: u8, actual: u8 },
    /// Data ended before the declared length.
    TruncatedData,
    /// Invalid BER length encoding.
    InvalidLength,
    /// Indefinite length not supported.
    IndefiniteLength,
    /// Length field uses too many octets.
    LengthTooLong { octets: usize },
    /// Length exceeds the decoder's sanity cap.
    LengthExceedsMax { length: usize, max: usize },
    /// Zero-length integer body.
    ZeroLengthInteger,
    /// Integer value out of range for its type.
    IntegerOverflow,
    /// Counter64 body too long.
    Integer64TooLong { length: usize },
    /// Invalid OID encoding.
    InvalidOidEncoding,
    /// OID exceeds the arc-count limit.
    OidTooLong { count: usize, max: usize },
    /// NULL with non-zero length.
    InvalidNull,
    /// IpAddress body is not 4 bytes.
    InvalidIpAddressLength { length: usize },
    /// Unknown SNMP version field.
    UnknownVersion(i32),
    /// Unknown PDU tag.
    UnknownPduType(u8),
    /// Unknown value tag in a varbind.
    UnknownValueTag(u8),
    /// msgFlags sets priv without auth.
    InvalidMsgFlags,
    /// Unknown msgSecurityModel.
    UnknownSecurityModel(i32),
    /// msgMaxSize below the RFC 3412 minimum of 484.
    MsgMaxSizeTooSmall { value: i32, minimum: i32 },
    /// Engine boots/time outside 0..=2^31-1.
    EngineFieldOutOfRange { value: i32 },
    /// TLV extends past the end of its parent.
    TlvOverflow,
    /// Response carried no varbinds where one was required.
    EmptyResponse,
    /// Expected a plaintext scoped PDU, found ciphertext (or vice versa).
    UnexpectedEncryption,
}

impl std::fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedTag { expected, actual } => {
                write!(f, "expected tag 0x{:02X}, got 0x{:02X}", expected, actual)
            }
            Self::TruncatedData => write!(f, "unexpected end of data"),
            Self::InvalidLength => write!(f, "invalid length encoding"),
            Self::IndefiniteLength => write!(f, "indefinite length encoding not supported"),
            Self::LengthTooLong { octets } => {
                write!(f, "length encoding too long ({} octets)", octets)
            }
            Self::LengthExceedsMax { length, max } => {
                write!(f, "length {} exceeds maximum {}", length, max)
            }
            Self::ZeroLengthInteger => write!(f, "zero-length integer"),
            Self::IntegerOverflow => write!(f, "integer overflow"),
            Self::Integer64TooLong { length } => {
                write!(f, "integer64 too long: {} bytes", length)
            }
            Self::InvalidOidEncoding => write!(f, "invalid OID encoding"),
            Self::OidTooLong { count, max } => {
                write!(f, "OID has {} arcs, exceeds maximum {}", count, max)
            }
            Self::InvalidNull => write!(f, "NULL with non-zero length"),
            Self::InvalidIpAddressLength { length } => {
                write!(f, "IP address must be 4 bytes, got {}", length)
            }
            Self::UnknownVersion(v) => write!(f, "unknown SNMP version: {}", v),
            Self::UnknownPduType(t) => write!(f, "unknown PDU type: 0x{:02X}", t),
            Self::UnknownValueTag(t) => write!(f, "unknown value tag: 0x{:02X}", t),
            Self::InvalidMsgFlags => write!(f, "invalid msgFlags: privacy without authentication"),
            Self::UnknownSecurityModel(m) => write!(f, "unknown security model: {}", m),
            Self::MsgMaxSizeTooSmall { value, minimum } => {
                write!(f, "msgMaxSize {} below RFC 3412 minimum {}", value, minimum)
            }
            Self::EngineFieldOutOfRange { value } => {
                write!(f, "engine boots/time {} outside 0..=2147483647", value)
            }
            Self::TlvOverflow => write!(f, "TLV extends past end of data"),
            Self::EmptyResponse => write!(f, "empty response"),
            Self::UnexpectedEncryption => {
                write!(f, "scoped PDU encryption does not match msgFlags")
            }
        }
    }
}

/// BER / message encode failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeErrorKind {
    /// V3 security not configured.
    NoSecurityConfig,
    /// Engine not discovered yet.
    EngineNotDiscovered,
    /// Auth key not available for signing.
    MissingAuthKey,
    /// Privacy key not available.
    NoPrivKey,
    /// Could not locate the auth params position in the encoded message.
    MissingAuthParams,
}

impl std::fmt::Display for EncodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSecurityConfig => write!(f, "V3 security config not set"),
            Self::EngineNotDiscovered => write!(f, "engine not discovered"),
            Self::MissingAuthKey => write!(f, "auth key not available for signing"),
            Self::NoPrivKey => write!(f, "privacy key not available"),
            Self::MissingAuthParams => {
                write!(f, "could not find auth params position in encoded message")
            }
        }
    }
}

/// OID validation failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OidErrorKind {
    /// Invalid arc value in text form.
    InvalidArc,
    /// First arc must be 0, 1, or 2.
    InvalidFirstArc(u32),
    /// Second arc too large for the first arc value.
    InvalidSecondArc { first: u32, second: u32 },
    /// Too many arcs.
    TooManyArcs { count: usize, max: usize },
}

impl std::fmt::Display for OidErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArc => write!(f, "invalid arc value"),
            Self::InvalidFirstArc(v) => write!(f, "first arc must be 0, 1, or 2, got {}", v),
            Self::InvalidSecondArc { first, second } => {
                write!(f, "second arc {} too large for first arc {}", second, first)
            }
            Self::TooManyArcs { count, max } => {
                write!(f, "OID has {} arcs, exceeds maximum {}", count, max)
            }
        }
    }
}

/// SNMP protocol error-status codes (RFC 3416 Section 3).
///
/// Carried in Response PDUs; surfaced to callers as part of the PDU rather
/// than as an [`Error`] so that error-status and error-index stay inspectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorStatus {
    /// Operation completed successfully (0).
    NoError,
    /// Response would not fit in a single message (1).
    TooBig,
    /// Requested OID not found (2). SNMPv1; v2c+ uses exception values.
    NoSuchName,
    /// Invalid value in a SET request (3).
    BadValue,
    /// Attempted to SET a read-only object (4).
    ReadOnly,
    /// Unspecified error (5).
    GenErr,
    /// Object exists but access is denied (6).
    NoAccess,
    /// SET value has the wrong ASN.1 type (7).
    WrongType,
    /// SET value has an incorrect length (8).
    WrongLength,
    /// SET value uses the wrong encoding (9).
    WrongEncoding,
    /// SET value is out of range (10).
    WrongValue,
    /// Object does not support row creation (11).
    NoCreation,
    /// Value inconsistent with other managed objects (12).
    InconsistentValue,
    /// Resource required for the SET is unavailable (13).
    ResourceUnavailable,
    /// SET commit phase failed (14).
    CommitFailed,
    /// SET undo phase failed (15).
    UndoFailed,
    /// Access denied (16).
    AuthorizationError,
    /// Object does not support modification (17).
    NotWritable,
    /// Named object cannot be created (18).
    InconsistentName,
    /// Unknown or future error-status code.
    Unknown(i32),
}

impl ErrorStatus {
    /// Create from the raw status code.
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::NoError,
            1 => Self::TooBig,
            2 => Self::NoSuchName,
            3 => Self::BadValue,
            4 => Self::ReadOnly,
            5 => Self::GenErr,
            6 => Self::NoAccess,
            7 => Self::WrongType,
            8 => Self::WrongLength,
            9 => Self::WrongEncoding,
            10 => Self::WrongValue,
            11 => Self::NoCreation,
            12 => Self::InconsistentValue,
            13 => Self::ResourceUnavailable,
            14 => Self::CommitFailed,
            15 => Self::UndoFailed,
            16 => Self::AuthorizationError,
            17 => Self::NotWritable,
            18 => Self::InconsistentName,
            other => Self::Unknown(other),
        }
    }

    /// Convert to the raw status code.
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::NoError => 0,
            Self::TooBig => 1,
            Self::NoSuchName => 2,
            Self::BadValue => 3,
            Self::ReadOnly => 4,
            Self::GenErr => 5,
            Self::NoAccess => 6,
            Self::WrongType => 7,
            Self::WrongLength => 8,
            Self::WrongEncoding => 9,
            Self::WrongValue => 10,
            Self::NoCreation => 11,
            Self::InconsistentValue => 12,
            Self::ResourceUnavailable => 13,
            Self::CommitFailed => 14,
            Self::UndoFailed => 15,
            Self::AuthorizationError => 16,
            Self::NotWritable => 17,
            Self::InconsistentName => 18,
            Self::Unknown(code) => *code,
        }
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoError => write!(f, "noError"),
            Self::TooBig => write!(f, "tooBig"),
            Self::NoSuchName => write!(f, "noSuchName"),
            Self::BadValue => write!(f, "badValue"),
            Self::ReadOnly => write!(f, "readOnly"),
            Self::GenErr => write!(f, "genErr"),
            Self::NoAccess => write!(f, "noAccess"),
            Self::WrongType => write!(f, "wrongType"),
            Self::WrongLength => write!(f, "wrongLength"),
            Self::WrongEncoding => write!(f, "wrongEncoding"),
            Self::WrongValue => write!(f, "wrongValue"),
            Self::NoCreation => write!(f, "noCreation"),
            Self::InconsistentValue => write!(f, "inconsistentValue"),
            Self::ResourceUnavailable => write!(f, "resourceUnavailable"),
            Self::CommitFailed => write!(f, "commitFailed"),
            Self::UndoFailed => write!(f, "undoFailed"),
            Self::AuthorizationError => write!(f, "authorizationError"),
            Self::NotWritable => write!(f, "notWritable"),
            Self::InconsistentName => write!(f, "inconsistentName"),
            Self::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

/// The error type for all snmpkit operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Invalid configuration or out-of-range call argument; raised before any I/O.
    #[error("invalid argument `{value}`: {message}")]
    Argument { value: String, message: String },

    /// BER decoding error.
    #[error("decode error at offset {offset}: {kind}")]
    Decode {
        offset: usize,
        kind: DecodeErrorKind,
    },

    /// Message encoding error.
    #[error("encode error: {kind}")]
    Encode { kind: EncodeErrorKind },

    /// Invalid OID.
    #[error("invalid OID{}: {kind}", input.as_deref().map(|i| format!(" `{}`", i)).unwrap_or_default())]
    InvalidOid {
        kind: OidErrorKind,
        input: Option<Box<str>>,
    },

    /// I/O error during network communication.
    #[error("I/O error{}: {source}", target.map(|t| format!(" communicating with {}", t)).unwrap_or_default())]
    Io {
        target: Option<SocketAddr>,
        #[source]
        source: std::io::Error,
    },

    /// Request timed out after all retries.
    #[error("timeout after {elapsed:?}{} (request_id={request_id}, retries={retries})", target.map(|t| format!(" waiting for {}", t)).unwrap_or_default())]
    Timeout {
        target: Option<SocketAddr>,
        elapsed: Duration,
        request_id: i32,
        retries: u32,
    },

    /// Response request id does not match the request.
    #[error("request ID mismatch: expected {expected}, got {actual}")]
    RequestIdMismatch { expected: i32, actual: i32 },

    /// Response version does not match the request.
    #[error("version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        expected: crate::version::Version,
        actual: crate::version::Version,
    },

    /// Encoded message exceeds the configured maximum size.
    #[error("message too large: {size} bytes exceeds maximum {max}")]
    MessageTooLarge { size: usize, max: usize },

    /// Peer reported an unknown engine id (SNMPv3).
    #[error("unknown engine ID")]
    UnknownEngineId { target: Option<SocketAddr> },

    /// Message outside the 150 s time window and not resolvable by resync (SNMPv3).
    #[error("message not in time window")]
    NotInTimeWindow { target: Option<SocketAddr> },

    /// Authentication failed (SNMPv3).
    #[error("authentication failed: {kind}")]
    AuthenticationFailed {
        target: Option<SocketAddr>,
        kind: AuthErrorKind,
    },

    /// Decryption failed (SNMPv3).
    #[error("decryption failed: {kind}")]
    DecryptionFailed {
        target: Option<SocketAddr>,
        kind: CryptoErrorKind,
    },

    /// Encryption failed (SNMPv3).
    #[error("encryption failed: {kind}")]
    EncryptionFailed {
        target: Option<SocketAddr>,
        kind: CryptoErrorKind,
    },

    /// Peer reported an unknown user name or the entry lookup failed (SNMPv3).
    #[error("unknown user name")]
    UnknownUserName { target: Option<SocketAddr> },
}

impl Error {
    /// Create an argument error carrying the offending value.
    pub fn argument(value: impl std::fmt::Display, message: impl Into<String>) -> Self {
        Self::Argument {
            value: value.to_string(),
            message: message.into(),
        }
    }

    /// Create a decode error.
    pub fn decode(offset: usize, kind: DecodeErrorKind) -> Self {
        Self::Decode { offset, kind }
    }

    /// Create an encode error.
    pub fn encode(kind: EncodeErrorKind) -> Self {
        Self::Encode { kind }
    }

    /// Create an authentication error.
    pub fn auth(target: Option<SocketAddr>, kind: AuthErrorKind) -> Self {
        Self::AuthenticationFailed { target, kind }
    }

    /// Create a decryption error.
    pub fn decrypt(target: Option<SocketAddr>, kind: CryptoErrorKind) -> Self {
        Self::DecryptionFailed { target, kind }
    }

    /// Create an encryption error.
    pub fn encrypt(target: Option<SocketAddr>, kind: CryptoErrorKind) -> Self {
        Self::EncryptionFailed { target, kind }
    }

    /// Create an invalid-OID error from a kind (no input string).
    pub fn invalid_oid(kind: OidErrorKind) -> Self {
        Self::InvalidOid { kind, input: None }
    }

    /// Create an invalid-OID error with the input string that failed.
    pub fn invalid_oid_with_input(kind: OidErrorKind, input: impl Into<Box<str>>) -> Self {
        Self::InvalidOid {
            kind,
            input: Some(input.into()),
        }
    }

    /// Whether this error is transient and worth a retry.
    ///
    /// Transport timeouts and I/O failures are retriable; decode and
    /// security errors are not.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Io { .. })
    }

    /// Get the peer address if this error has one.
    pub fn target(&self) -> Option<SocketAddr> {
        match self {
            Self::Io { target, .. }
            | Self::Timeout { target, .. }
            | Self::UnknownEngineId { target }
            | Self::NotInTimeWindow { target }
            | Self::AuthenticationFailed { target, .. }
            | Self::DecryptionFailed { target, .. }
            | Self::EncryptionFailed { target, .. }
            | Self::UnknownUserName { target } => *target,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_roundtrip() {
        for code in 0..=18 {
            let status = ErrorStatus::from_i32(code);
            assert_eq!(status.as_i32(), code);
            assert!(!matches!(status, ErrorStatus::Unknown(_)));
        }
        assert_eq!(ErrorStatus::from_i32(99), ErrorStatus::Unknown(99));
        assert_eq!(ErrorStatus::Unknown(99).as_i32(), 99);
    }

    #[test]
    fn error_status_display() {
        assert_eq!(ErrorStatus::NoError.to_string(), "noError");
        assert_eq!(ErrorStatus::NoSuchName.to_string(), "noSuchName");
        assert_eq!(ErrorStatus::AuthorizationError.to_string(), "authorizationError");
    }

    #[test]
    fn argument_error_carries_value() {
        let err = Error::argument(42, "MessageMaxSize is range 484..2147483647");
        let text = err.to_string();
        assert!(text.contains("42"));
        assert!(text.contains("484"));
    }

    #[test]
    fn retriable_classification() {
        let timeout = Error::Timeout {
            target: None,
            elapsed: Duration::from_secs(5),
            request_id: 1,
            retries: 0,
        };
        assert!(timeout.is_retriable());

        let decode = Error::decode(0, DecodeErrorKind::TruncatedData);
        assert!(!decode.is_retriable());

        let auth = Error::auth(None, AuthErrorKind::HmacMismatch);
        assert!(!auth.is_retriable());
    }

    #[test]
    fn target_extraction() {
        let addr: SocketAddr = "192.0.2.1:161".parse().unwrap();
        let err = Error::Timeout {
            target: Some(addr),
            elapsed: Duration::from_secs(1),
            request_id: 7,
            retries: 2,
        };
        assert_eq!(err.target(), Some(addr));
        assert_eq!(Error::decode(0, DecodeErrorKind::TruncatedData).target(), None);
    }
}
