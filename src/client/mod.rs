//! SNMP client.
//!
//! One [`Client`] owns one connected transport and talks to one peer,
//! sequentially: a single request is in flight at a time. Protocol errors
//! (non-zero error-status) come back as the Response PDU so callers can
//! inspect error-status and error-index; only transport, decode and
//! security failures are `Err`.

mod builder;
mod v3;
mod walk;

pub use builder::ClientBuilder;
pub use v3::UsmConfig;

use std::sync::Mutex;
use std::time::Instant;

use bytes::Bytes;

use crate::engine::IdAllocator;
use crate::error::{Error, Result};
use crate::message::CommunityMessage;
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType, TrapV1Pdu};
use crate::transport::{Transport, UdpTransport};
use crate::util::encode_hex;
use crate::varbind::VarBind;
use crate::version::Version;

use v3::{SendOpts, V3State};

/// Client configuration.
///
/// Built through [`ClientBuilder`], which validates every field before any
/// I/O happens.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// SNMP version
    pub version: Version,
    /// Transport network: `udp` (default), `udp4`, `udp6`
    pub network: String,
    /// Peer address, `host:port`
    pub address: String,
    /// Per-attempt timeout (default 5 s)
    pub timeout: std::time::Duration,
    /// Additional attempts after the first (default 0)
    pub retries: u32,
    /// Maximum message size, 484..=2^31-1 (default 1400)
    pub message_max_size: i32,
    /// Community string (v1/v2c)
    pub community: Bytes,
    /// USM security configuration (v3)
    pub security: Option<UsmConfig>,
}

/// SNMP client bound to a single peer.
pub struct Client<T: Transport = UdpTransport> {
    transport: T,
    config: ClientConfig,
    ids: IdAllocator,
    v3: Mutex<V3State>,
}

impl Client<UdpTransport> {
    /// Start building a client for the given peer address.
    pub fn builder(address: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(address)
    }
}

impl<T: Transport> Client<T> {
    /// Open a client over an already-connected transport.
    ///
    /// For v3 this performs engine discovery unless a security engine id
    /// was configured (the authoritative-sender case).
    pub async fn open(transport: T, config: ClientConfig) -> Result<Self> {
        let client = Self {
            transport,
            config,
            ids: IdAllocator::new(),
            v3: Mutex::new(V3State::default()),
        };

        if client.config.version == Version::V3 {
            client.open_v3().await?;
        }

        Ok(client)
    }

    /// The peer address.
    pub fn peer_addr(&self) -> std::net::SocketAddr {
        self.transport.peer_addr()
    }

    /// The configuration this client was opened with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Close the client, releasing the socket and engine state.
    pub fn close(self) {
        drop(self);
    }

    pub(crate) fn next_request_id(&self) -> i32 {
        self.ids.next()
    }

    /// GetRequest: one round trip, returns the Response PDU.
    pub async fn get(&self, oids: &[Oid]) -> Result<Pdu> {
        let pdu = Pdu::get_request(self.next_request_id(), oids);
        self.send_confirmed(pdu).await
    }

    /// GetNextRequest: one round trip, returns the Response PDU.
    pub async fn get_next(&self, oids: &[Oid]) -> Result<Pdu> {
        let pdu = Pdu::get_next_request(self.next_request_id(), oids);
        self.send_confirmed(pdu).await
    }

    /// SetRequest: one round trip, returns the Response PDU.
    pub async fn set(&self, varbinds: Vec<VarBind>) -> Result<Pdu> {
        let pdu = Pdu::set_request(self.next_request_id(), varbinds);
        self.send_confirmed(pdu).await
    }

    /// GetBulkRequest (v2c/v3 only).
    ///
    /// RFC 3416 Section 3: non-repeaters and max-repetitions are
    /// non-negative INTEGERs.
    pub async fn get_bulk(
        &self,
        oids: &[Oid],
        non_repeaters: i32,
        max_repetitions: i32,
    ) -> Result<Pdu> {
        if self.config.version < Version::V2c {
            return Err(Error::argument(
                self.config.version,
                "GetBulkRequest requires SNMPv2c or v3",
            ));
        }
        if non_repeaters < 0 {
            return Err(Error::argument(
                non_repeaters,
                "NonRepeaters is range 0..2147483647",
            ));
        }
        if max_repetitions < 0 {
            return Err(Error::argument(
                max_repetitions,
                "MaxRepetitions is range 0..2147483647",
            ));
        }

        let pdu = Pdu::get_bulk_request(
            self.next_request_id(),
            non_repeaters,
            max_repetitions,
            oids,
        );
        self.send_confirmed(pdu).await
    }

    /// SNMPv1 trap: fire-and-forget datagram with the distinct Trap-v1
    /// PDU layout. v1 only.
    pub async fn v1_trap(&self, trap: TrapV1Pdu) -> Result<()> {
        if self.config.version != Version::V1 {
            return Err(Error::argument(
                self.config.version,
                "V1Trap requires SNMPv1",
            ));
        }

        let mut buf = crate::ber::EncodeBuf::new();
        buf.push_sequence(|buf| {
            trap.encode(buf);
            buf.push_octet_string(&self.config.community);
            buf.push_integer(self.config.version.as_i32());
        });
        let data = buf.finish();
        self.check_message_size(data.len())?;

        tracing::trace!(bytes = data.len(), dump = %encode_hex(&data), "sending v1 trap");
        self.transport.send(&data, self.config.timeout).await
    }

    /// SNMPv2 trap: unconfirmed notification (v2c/v3). A request id is
    /// still allocated for the PDU.
    pub async fn v2_trap(&self, varbinds: Vec<VarBind>) -> Result<()> {
        self.notify(PduType::TrapV2, varbinds, SendOpts::default())
            .await?;
        Ok(())
    }

    /// SNMPv2 trap with explicit engine boots/time (v3 authoritative
    /// sender). The override applies to this send only.
    pub async fn v2_trap_with_boots_time(
        &self,
        varbinds: Vec<VarBind>,
        engine_boots: i32,
        engine_time: i32,
    ) -> Result<()> {
        if engine_boots < 0 {
            return Err(Error::argument(
                engine_boots,
                "EngineBoots is range 0..2147483647",
            ));
        }
        if engine_time < 0 {
            return Err(Error::argument(
                engine_time,
                "EngineTime is range 0..2147483647",
            ));
        }

        let opts = SendOpts {
            boots_time: Some((engine_boots as u32, engine_time as u32)),
        };
        self.notify(PduType::TrapV2, varbinds, opts).await?;
        Ok(())
    }

    /// InformRequest: confirmed notification (v2c/v3), returns the
    /// acknowledging Response PDU.
    pub async fn inform(&self, varbinds: Vec<VarBind>) -> Result<Pdu> {
        let pdu = self
            .notify(PduType::InformRequest, varbinds, SendOpts::default())
            .await?;
        pdu.ok_or_else(|| Error::decode(0, crate::error::DecodeErrorKind::EmptyResponse))
    }

    async fn notify(
        &self,
        pdu_type: PduType,
        varbinds: Vec<VarBind>,
        opts: SendOpts,
    ) -> Result<Option<Pdu>> {
        if self.config.version < Version::V2c {
            return Err(Error::argument(
                self.config.version,
                "notifications require SNMPv2c or v3",
            ));
        }

        let pdu = Pdu::notification(pdu_type, self.next_request_id(), varbinds);
        let expect_response = pdu_type.is_confirmed();
        self.dispatch(pdu, expect_response, opts).await
    }

    async fn send_confirmed(&self, pdu: Pdu) -> Result<Pdu> {
        let response = self.dispatch(pdu, true, SendOpts::default()).await?;
        response.ok_or_else(|| Error::decode(0, crate::error::DecodeErrorKind::EmptyResponse))
    }

    /// Send a PDU, optionally awaiting its Response, with retries.
    async fn dispatch(
        &self,
        pdu: Pdu,
        expect_response: bool,
        opts: SendOpts,
    ) -> Result<Option<Pdu>> {
        if self.config.version == Version::V3 {
            return self.dispatch_v3(pdu, expect_response, opts).await;
        }

        let message = CommunityMessage::new(
            self.config.version,
            self.config.community.clone(),
            pdu,
        );
        let data = message.encode();
        self.check_message_size(data.len())?;
        let request_id = message.pdu.request_id;

        let start = Instant::now();
        let mut last_error: Option<Error> = None;

        for attempt in 0..=self.config.retries {
            if attempt > 0 {
                tracing::debug!(request_id, attempt, "retrying request");
            }

            tracing::trace!(bytes = data.len(), request_id, "sending request");
            match self.exchange(&data, expect_response).await {
                Ok(None) => return Ok(None),
                Ok(Some(reply)) => {
                    let response = CommunityMessage::decode(reply)?;
                    if response.version != self.config.version {
                        return Err(Error::VersionMismatch {
                            expected: self.config.version,
                            actual: response.version,
                        });
                    }

                    let response_pdu = response.into_pdu();
                    if response_pdu.request_id != request_id {
                        return Err(Error::RequestIdMismatch {
                            expected: request_id,
                            actual: response_pdu.request_id,
                        });
                    }

                    tracing::debug!(
                        request_id,
                        error_status = response_pdu.error_status,
                        varbind_count = response_pdu.varbinds.len(),
                        "received response"
                    );
                    return Ok(Some(response_pdu));
                }
                Err(e) if e.is_retriable() => {
                    last_error = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        Err(self.exhausted(last_error, request_id, start))
    }

    /// One send (and optionally one receive) on the transport.
    async fn exchange(&self, data: &[u8], expect_response: bool) -> Result<Option<Bytes>> {
        self.transport.send(data, self.config.timeout).await?;
        if !expect_response {
            return Ok(None);
        }
        let reply = self.transport.recv(self.config.timeout).await?;
        Ok(Some(reply))
    }

    fn check_message_size(&self, size: usize) -> Result<()> {
        let max = self.config.message_max_size as usize;
        if size > max {
            return Err(Error::MessageTooLarge { size, max });
        }
        Ok(())
    }

    /// Final error after every attempt failed.
    fn exhausted(&self, last_error: Option<Error>, request_id: i32, start: Instant) -> Error {
        let elapsed = start.elapsed();
        tracing::debug!(
            request_id,
            retries = self.config.retries,
            ?elapsed,
            "request failed after all attempts"
        );
        match last_error {
            Some(Error::Timeout { target, .. }) => Error::Timeout {
                target,
                elapsed,
                request_id,
                retries: self.config.retries,
            },
            Some(other) => other,
            None => Error::Timeout {
                target: Some(self.peer_addr()),
                elapsed,
                request_id,
                retries: self.config.retries,
            },
        }
    }
}
