//! Per-peer engine state and id allocation (RFC 3414 Section 2.3).
//!
//! A non-authoritative engine (the client) tracks the peer's engine id,
//! boots and time, learned once through discovery and nudged forward by
//! every authenticated response. Message ids and request ids come from an
//! atomic 31-bit counter.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use bytes::Bytes;

use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};

/// Time window in seconds (RFC 3414 Section 2.2.3).
pub const TIME_WINDOW: u32 = 150;

/// Maximum snmpEngineTime / snmpEngineBoots value (2^31 - 1).
pub const MAX_ENGINE_TIME: u32 = 2_147_483_647;

/// usmStats OIDs carried in Report PDUs.
pub mod report_oids {
    use crate::Oid;
    use crate::oid;

    /// usmStatsUnsupportedSecLevels (1.3.6.1.6.3.15.1.1.1.0)
    pub fn unsupported_sec_levels() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 1, 0)
    }

    /// usmStatsNotInTimeWindows (1.3.6.1.6.3.15.1.1.2.0)
    pub fn not_in_time_windows() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 2, 0)
    }

    /// usmStatsUnknownUserNames (1.3.6.1.6.3.15.1.1.3.0)
    pub fn unknown_user_names() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 3, 0)
    }

    /// usmStatsUnknownEngineIDs (1.3.6.1.6.3.15.1.1.4.0)
    pub fn unknown_engine_ids() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 4, 0)
    }

    /// usmStatsWrongDigests (1.3.6.1.6.3.15.1.1.5.0)
    pub fn wrong_digests() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 5, 0)
    }

    /// usmStatsDecryptionErrors (1.3.6.1.6.3.15.1.1.6.0)
    pub fn decryption_errors() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 6, 0)
    }
}

/// Discovered per-peer engine state.
#[derive(Debug, Clone)]
pub struct EngineState {
    /// Authoritative engine id
    pub engine_id: Bytes,
    /// Engine boot count
    pub engine_boots: u32,
    /// Engine time at the moment of sync
    pub engine_time: u32,
    /// Monotonic local time when engine_time was received
    pub synced_at: Instant,
    /// Highest engine time seen, for anti-replay (RFC 3414 Section 3.2 7b)
    pub latest_received_engine_time: u32,
}

impl EngineState {
    /// Create state from discovered values.
    pub fn new(engine_id: Bytes, engine_boots: u32, engine_time: u32) -> Self {
        Self {
            engine_id,
            engine_boots,
            engine_time,
            synced_at: Instant::now(),
            latest_received_engine_time: engine_time,
        }
    }

    /// Estimated current engine time: synced time plus elapsed monotonic
    /// seconds, clamped to 2^31 - 1.
    pub fn estimated_time(&self) -> u32 {
        let elapsed = self.synced_at.elapsed().as_secs() as u32;
        self.engine_time
            .saturating_add(elapsed)
            .min(MAX_ENGINE_TIME)
    }

    /// Fold a received (boots, time) pair into local state.
    ///
    /// Updates only on a newer boot cycle, or on the same cycle with a
    /// strictly newer time than any previously received (anti-replay).
    /// Returns whether the state changed.
    pub fn update_time(&mut self, response_boots: u32, response_time: u32) -> bool {
        if response_boots > self.engine_boots {
            self.engine_boots = response_boots;
            self.engine_time = response_time;
            self.synced_at = Instant::now();
            self.latest_received_engine_time = response_time;
            true
        } else if response_boots == self.engine_boots
            && response_time > self.latest_received_engine_time
        {
            self.engine_time = response_time;
            self.synced_at = Instant::now();
            self.latest_received_engine_time = response_time;
            true
        } else {
            false
        }
    }

    /// Check a received (boots, time) pair against the 150 s window.
    ///
    /// Outside the window when boots is latched at the maximum, when boots
    /// differ, or when the times diverge by more than [`TIME_WINDOW`].
    pub fn is_in_time_window(&self, msg_boots: u32, msg_time: u32) -> bool {
        if self.engine_boots == MAX_ENGINE_TIME {
            return false;
        }
        if msg_boots != self.engine_boots {
            return false;
        }
        msg_time.abs_diff(self.estimated_time()) <= TIME_WINDOW
    }
}

/// Atomic allocator for message ids and request ids.
///
/// Values stay within 0..=2^31-1 (the INTEGER range SNMP expects) and wrap
/// around; the start point is randomized so restarted processes do not
/// replay id sequences.
pub struct IdAllocator(AtomicU32);

impl IdAllocator {
    /// Create an allocator seeded from OS randomness.
    pub fn new() -> Self {
        let mut buf = [0u8; 4];
        getrandom::fill(&mut buf).expect("getrandom failed");
        Self(AtomicU32::new(u32::from_ne_bytes(buf)))
    }

    /// Create an allocator with a fixed start (tests).
    pub fn from_value(value: u32) -> Self {
        Self(AtomicU32::new(value))
    }

    /// Allocate the next id, wrapping at 2^31 - 1.
    pub fn next(&self) -> i32 {
        (self.0.fetch_add(1, Ordering::Relaxed) & 0x7FFF_FFFF) as i32
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

fn is_report_with(pdu: &Pdu, oid: Oid) -> bool {
    pdu.pdu_type == PduType::Report && pdu.varbinds.iter().any(|vb| vb.oid == oid)
}

/// Whether a Report PDU carries usmStatsUnknownEngineIDs (discovery reply).
pub fn is_unknown_engine_id_report(pdu: &Pdu) -> bool {
    is_report_with(pdu, report_oids::unknown_engine_ids())
}

/// Whether a Report PDU carries usmStatsNotInTimeWindows.
pub fn is_not_in_time_window_report(pdu: &Pdu) -> bool {
    is_report_with(pdu, report_oids::not_in_time_windows())
}

/// Whether a Report PDU carries usmStatsUnknownUserNames.
pub fn is_unknown_user_name_report(pdu: &Pdu) -> bool {
    is_report_with(pdu, report_oids::unknown_user_names())
}

/// Whether a Report PDU carries usmStatsWrongDigests.
pub fn is_wrong_digest_report(pdu: &Pdu) -> bool {
    is_report_with(pdu, report_oids::wrong_digests())
}

/// Whether a Report PDU carries usmStatsDecryptionErrors.
pub fn is_decryption_error_report(pdu: &Pdu) -> bool {
    is_report_with(pdu, report_oids::decryption_errors())
}

/// Whether a Report PDU carries usmStatsUnsupportedSecLevels.
pub fn is_unsupported_sec_level_report(pdu: &Pdu) -> bool {
    is_report_with(pdu, report_oids::unsupported_sec_levels())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use crate::varbind::VarBind;

    #[test]
    fn estimated_time_advances() {
        let state = EngineState::new(Bytes::from_static(b"engine"), 1, 1000);
        assert!(state.estimated_time() >= 1000);
    }

    #[test]
    fn estimated_time_clamps() {
        let state = EngineState::new(Bytes::from_static(b"engine"), 1, MAX_ENGINE_TIME);
        assert_eq!(state.estimated_time(), MAX_ENGINE_TIME);
    }

    #[test]
    fn update_time_is_monotone() {
        let mut state = EngineState::new(Bytes::from_static(b"engine"), 1, 1000);

        assert!(state.update_time(1, 1100));
        assert_eq!(state.latest_received_engine_time, 1100);

        // Same cycle, older time: replay, rejected
        assert!(!state.update_time(1, 1050));
        assert!(!state.update_time(1, 1100));
        assert_eq!(state.latest_received_engine_time, 1100);

        // New boot cycle resets
        assert!(state.update_time(2, 500));
        assert_eq!(state.engine_boots, 2);
        assert_eq!(state.latest_received_engine_time, 500);

        // Older boots never accepted
        assert!(!state.update_time(1, 9999));
    }

    #[test]
    fn time_window_acceptance() {
        let state = EngineState::new(Bytes::from_static(b"engine"), 3, 10_000);

        let now = state.estimated_time();
        // Accepted well inside +/-150 s (margin absorbs test wall time)
        assert!(state.is_in_time_window(3, now));
        assert!(state.is_in_time_window(3, now + TIME_WINDOW - 10));
        assert!(state.is_in_time_window(3, now - TIME_WINDOW + 10));

        // Rejected well outside
        assert!(!state.is_in_time_window(3, now + TIME_WINDOW + 10));
        assert!(!state.is_in_time_window(3, now - TIME_WINDOW - 10));

        // Boots mismatch always fails
        assert!(!state.is_in_time_window(2, now));
        assert!(!state.is_in_time_window(4, now));
    }

    #[test]
    fn latched_boots_rejects_everything() {
        let state = EngineState::new(Bytes::from_static(b"engine"), MAX_ENGINE_TIME, 0);
        assert!(!state.is_in_time_window(MAX_ENGINE_TIME, state.estimated_time()));
    }

    #[test]
    fn id_allocator_wraps_at_31_bits() {
        let alloc = IdAllocator::from_value(0x7FFF_FFFE);
        assert_eq!(alloc.next(), 0x7FFF_FFFE);
        assert_eq!(alloc.next(), 0x7FFF_FFFF);
        // u32 continues to 0x80000000, masked back into range
        assert_eq!(alloc.next(), 0);
        assert_eq!(alloc.next(), 1);
    }

    #[test]
    fn id_allocator_never_negative() {
        let alloc = IdAllocator::from_value(u32::MAX - 2);
        for _ in 0..8 {
            assert!(alloc.next() >= 0);
        }
    }

    #[test]
    fn report_classification() {
        let report = Pdu {
            pdu_type: PduType::Report,
            request_id: 0,
            error_status: 0,
            error_index: 0,
            varbinds: vec![VarBind::new(
                report_oids::unknown_engine_ids(),
                Value::Counter32(1),
            )],
        };
        assert!(is_unknown_engine_id_report(&report));
        assert!(!is_not_in_time_window_report(&report));

        // Same varbind in a non-Report PDU does not classify
        let response = Pdu {
            pdu_type: PduType::Response,
            ..report.clone()
        };
        assert!(!is_unknown_engine_id_report(&response));
    }
}
