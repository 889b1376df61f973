//! SNMP Protocol Data Units.
//!
//! [`Pdu`] covers every operation sharing the standard body layout
//! (request-id, error-status, error-index, varbind list); GETBULK reuses
//! that layout with error-status/error-index carrying non-repeaters and
//! max-repetitions. [`TrapV1Pdu`] is the distinct SNMPv1 trap layout.

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, ErrorStatus, Result};
use crate::oid::Oid;
use crate::varbind::{VarBind, decode_varbind_list, encode_varbind_list};

/// PDU type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PduType {
    GetRequest = 0xA0,
    GetNextRequest = 0xA1,
    Response = 0xA2,
    SetRequest = 0xA3,
    TrapV1 = 0xA4,
    GetBulkRequest = 0xA5,
    InformRequest = 0xA6,
    TrapV2 = 0xA7,
    Report = 0xA8,
}

impl PduType {
    /// Create from the tag byte.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0xA0 => Some(Self::GetRequest),
            0xA1 => Some(Self::GetNextRequest),
            0xA2 => Some(Self::Response),
            0xA3 => Some(Self::SetRequest),
            0xA4 => Some(Self::TrapV1),
            0xA5 => Some(Self::GetBulkRequest),
            0xA6 => Some(Self::InformRequest),
            0xA7 => Some(Self::TrapV2),
            0xA8 => Some(Self::Report),
            _ => None,
        }
    }

    /// Get the tag byte.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Whether this PDU type expects a Response.
    pub fn is_confirmed(self) -> bool {
        matches!(
            self,
            Self::GetRequest
                | Self::GetNextRequest
                | Self::GetBulkRequest
                | Self::SetRequest
                | Self::InformRequest
        )
    }
}

impl std::fmt::Display for PduType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GetRequest => write!(f, "GetRequest"),
            Self::GetNextRequest => write!(f, "GetNextRequest"),
            Self::Response => write!(f, "Response"),
            Self::SetRequest => write!(f, "SetRequest"),
            Self::TrapV1 => write!(f, "TrapV1"),
            Self::GetBulkRequest => write!(f, "GetBulkRequest"),
            Self::InformRequest => write!(f, "InformRequest"),
            Self::TrapV2 => write!(f, "TrapV2"),
            Self::Report => write!(f, "Report"),
        }
    }
}

/// Generic PDU for request/response operations.
///
/// For GETBULK, `error_status` holds non-repeaters and `error_index` holds
/// max-repetitions (RFC 3416 Section 4.2.3).
#[derive(Debug, Clone, PartialEq)]
pub struct Pdu {
    /// PDU type
    pub pdu_type: PduType,
    /// Request id correlating requests and responses
    pub request_id: i32,
    /// Error status (0 in requests; RFC 3416 code in responses)
    pub error_status: i32,
    /// Error index (1-based varbind index, 0 = whole PDU)
    pub error_index: i32,
    /// Variable bindings
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    /// Create a GetRequest with NULL-valued varbinds.
    pub fn get_request(request_id: i32, oids: &[Oid]) -> Self {
        Self::request(PduType::GetRequest, request_id, oids)
    }

    /// Create a GetNextRequest with NULL-valued varbinds.
    pub fn get_next_request(request_id: i32, oids: &[Oid]) -> Self {
        Self::request(PduType::GetNextRequest, request_id, oids)
    }

    fn request(pdu_type: PduType, request_id: i32, oids: &[Oid]) -> Self {
        Self {
            pdu_type,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: oids.iter().map(|oid| VarBind::null(oid.clone())).collect(),
        }
    }

    /// Create a SetRequest.
    pub fn set_request(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type: PduType::SetRequest,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    /// Create a GetBulkRequest.
    pub fn get_bulk_request(
        request_id: i32,
        non_repeaters: i32,
        max_repetitions: i32,
        oids: &[Oid],
    ) -> Self {
        Self {
            pdu_type: PduType::GetBulkRequest,
            request_id,
            error_status: non_repeaters,
            error_index: max_repetitions,
            varbinds: oids.iter().map(|oid| VarBind::null(oid.clone())).collect(),
        }
    }

    /// Create a Response carrying the given varbinds.
    pub fn response(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type: PduType::Response,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    /// Create a notification (TrapV2 or InformRequest) PDU.
    pub fn notification(pdu_type: PduType, request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    /// Non-repeaters of a GETBULK (alias of `error_status`).
    pub fn non_repeaters(&self) -> i32 {
        self.error_status
    }

    /// Max-repetitions of a GETBULK (alias of `error_index`).
    pub fn max_repetitions(&self) -> i32 {
        self.error_index
    }

    /// Whether the response carries a non-zero error-status.
    pub fn is_error(&self) -> bool {
        self.error_status != 0
    }

    /// Error status as an enum.
    pub fn error_status_enum(&self) -> ErrorStatus {
        ErrorStatus::from_i32(self.error_status)
    }

    /// Build the Response acknowledging this PDU (Inform handling).
    pub fn to_response(&self) -> Self {
        Self {
            pdu_type: PduType::Response,
            request_id: self.request_id,
            error_status: 0,
            error_index: 0,
            varbinds: self.varbinds.clone(),
        }
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(self.pdu_type.tag(), |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_integer(self.error_index);
            buf.push_integer(self.error_status);
            buf.push_integer(self.request_id);
        });
    }

    /// Decode from BER.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let tag = decoder.read_tag()?;
        let pdu_type = PduType::from_tag(tag)
            .ok_or_else(|| Error::decode(decoder.offset(), DecodeErrorKind::UnknownPduType(tag)))?;

        let len = decoder.read_length()?;
        let mut pdu = decoder.sub_decoder(len)?;

        let request_id = pdu.read_integer()?;
        let error_status = pdu.read_integer()?;
        let error_index = pdu.read_integer()?;
        let varbinds = decode_varbind_list(&mut pdu)?;

        Ok(Pdu {
            pdu_type,
            request_id,
            error_status,
            error_index,
            varbinds,
        })
    }
}

/// SNMPv1 generic trap types (RFC 1157 Section 4.1.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum GenericTrap {
    ColdStart = 0,
    WarmStart = 1,
    LinkDown = 2,
    LinkUp = 3,
    AuthenticationFailure = 4,
    EgpNeighborLoss = 5,
    /// Vendor-specific; see the specific-trap field.
    EnterpriseSpecific = 6,
}

impl GenericTrap {
    /// Create from the wire value.
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(Self::ColdStart),
            1 => Some(Self::WarmStart),
            2 => Some(Self::LinkDown),
            3 => Some(Self::LinkUp),
            4 => Some(Self::AuthenticationFailure),
            5 => Some(Self::EgpNeighborLoss),
            6 => Some(Self::EnterpriseSpecific),
            _ => None,
        }
    }

    /// Get the wire value.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// SNMPv1 Trap PDU (RFC 1157 Section 4.1.6).
///
/// Structurally unlike every other PDU: enterprise OID, agent address,
/// generic/specific trap numbers and a timestamp precede the varbinds.
#[derive(Debug, Clone, PartialEq)]
pub struct TrapV1Pdu {
    /// Enterprise OID (sysObjectID of the trap sender)
    pub enterprise: Oid,
    /// Agent IPv4 address
    pub agent_addr: [u8; 4],
    /// Generic trap type (0..=6)
    pub generic_trap: i32,
    /// Specific trap code (meaningful for enterpriseSpecific)
    pub specific_trap: i32,
    /// sysUpTime at trap generation, hundredths of a second
    pub time_stamp: u32,
    /// Variable bindings
    pub varbinds: Vec<VarBind>,
}

impl TrapV1Pdu {
    /// Create a new SNMPv1 trap PDU.
    pub fn new(
        enterprise: Oid,
        agent_addr: [u8; 4],
        generic_trap: GenericTrap,
        specific_trap: i32,
        time_stamp: u32,
        varbinds: Vec<VarBind>,
    ) -> Self {
        Self {
            enterprise,
            agent_addr,
            generic_trap: generic_trap.as_i32(),
            specific_trap,
            time_stamp,
            varbinds,
        }
    }

    /// The generic trap type as an enum, if in range.
    pub fn generic_trap_enum(&self) -> Option<GenericTrap> {
        GenericTrap::from_i32(self.generic_trap)
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(tag::pdu::TRAP_V1, |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_unsigned32(tag::application::TIMETICKS, self.time_stamp);
            buf.push_integer(self.specific_trap);
            buf.push_integer(self.generic_trap);
            buf.push_ip_address(self.agent_addr);
            buf.push_oid(&self.enterprise);
        });
    }

    /// Decode from BER.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut pdu = decoder.read_constructed(tag::pdu::TRAP_V1)?;

        let enterprise = pdu.read_oid()?;
        let agent_addr = pdu.read_ip_address()?;
        let generic_trap = pdu.read_integer()?;
        let specific_trap = pdu.read_integer()?;
        let time_stamp = pdu.read_unsigned32(tag::application::TIMETICKS)?;
        let varbinds = decode_varbind_list(&mut pdu)?;

        Ok(TrapV1Pdu {
            enterprise,
            agent_addr,
            generic_trap,
            specific_trap,
            time_stamp,
            varbinds,
        })
    }
}
