//! In-process UDP mock agents.
//!
//! `MockAgent` answers community (v1/v2c) Get/GetNext/GetBulk requests from
//! a fixed MIB map and can drop a configurable number of datagrams to
//! exercise retries. `V3Agent` additionally speaks USM: it answers engine
//! discovery with a usmStatsUnknownEngineIDs Report and serves
//! authenticated, encrypted requests.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use snmpkit::ber::Decoder;
use snmpkit::engine::report_oids;
use snmpkit::message::{
    CommunityMessage, MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, V3Message, V3MessageData,
};
use snmpkit::oid::Oid;
use snmpkit::pdu::{Pdu, PduType};
use snmpkit::usm::{
    AuthProtocol, LocalizedKey, PrivKey, PrivProtocol, SaltCounter, UsmSecurityParams,
    authenticate_message, verify_message,
};
use snmpkit::value::Value;
use snmpkit::varbind::VarBind;
use snmpkit::version::Version;

/// Builder for [`MockAgent`].
pub struct MockAgentBuilder {
    mib: BTreeMap<Oid, Value>,
    community: Bytes,
    version: Version,
    drop_first: usize,
}

impl MockAgentBuilder {
    pub fn new() -> Self {
        Self {
            mib: BTreeMap::new(),
            community: Bytes::from_static(b"public"),
            version: Version::V2c,
            drop_first: 0,
        }
    }

    pub fn mib(mut self, mib: BTreeMap<Oid, Value>) -> Self {
        self.mib = mib;
        self
    }

    pub fn community(mut self, community: &[u8]) -> Self {
        self.community = Bytes::copy_from_slice(community);
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Ignore the first `n` datagrams (for retry tests).
    pub fn drop_first(mut self, n: usize) -> Self {
        self.drop_first = n;
        self
    }

    pub async fn start(self) -> MockAgent {
        let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind agent");
        let addr = socket.local_addr().expect("agent local addr");
        let requests_seen = Arc::new(AtomicUsize::new(0));

        let seen = requests_seen.clone();
        let handle = tokio::spawn(async move {
            let mut dropped = 0usize;
            let mut buf = vec![0u8; 65535];
            loop {
                let Ok((n, source)) = socket.recv_from(&mut buf).await else {
                    return;
                };
                seen.fetch_add(1, Ordering::SeqCst);

                if dropped < self.drop_first {
                    dropped += 1;
                    continue;
                }

                let data = Bytes::copy_from_slice(&buf[..n]);
                let Ok(message) = CommunityMessage::decode(data) else {
                    continue;
                };
                if message.version != self.version || message.community != self.community {
                    continue;
                }

                let response_pdu = answer(&self.mib, &message.pdu);
                let response =
                    CommunityMessage::new(self.version, self.community.clone(), response_pdu);
                let _ = socket.send_to(&response.encode(), source).await;
            }
        });

        MockAgent {
            addr,
            requests_seen,
            handle,
        }
    }
}

/// Community (v1/v2c) mock agent on an ephemeral port.
pub struct MockAgent {
    addr: SocketAddr,
    requests_seen: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl MockAgent {
    pub fn builder() -> MockAgentBuilder {
        MockAgentBuilder::new()
    }

    /// v2c agent with community "public".
    pub async fn start(mib: BTreeMap<Oid, Value>) -> Self {
        MockAgentBuilder::new().mib(mib).start().await
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Datagrams received so far, including dropped ones.
    pub fn requests_seen(&self) -> usize {
        self.requests_seen.load(Ordering::SeqCst)
    }
}

impl Drop for MockAgent {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Answer one request PDU from the MIB.
fn answer(mib: &BTreeMap<Oid, Value>, request: &Pdu) -> Pdu {
    let varbinds = match request.pdu_type {
        PduType::GetRequest => request
            .varbinds
            .iter()
            .map(|vb| {
                let value = mib
                    .get(&vb.oid)
                    .cloned()
                    .unwrap_or(Value::NoSuchInstance);
                VarBind::new(vb.oid.clone(), value)
            })
            .collect(),
        PduType::GetNextRequest => request
            .varbinds
            .iter()
            .map(|vb| next_of(mib, &vb.oid))
            .collect(),
        PduType::GetBulkRequest => bulk_answer(mib, request),
        PduType::SetRequest => request.varbinds.clone(),
        _ => return request.to_response(),
    };

    Pdu::response(request.request_id, varbinds)
}

fn next_of(mib: &BTreeMap<Oid, Value>, oid: &Oid) -> VarBind {
    match mib
        .range::<Oid, _>((Bound::Excluded(oid.clone()), Bound::Unbounded))
        .next()
    {
        Some((next_oid, value)) => VarBind::new(next_oid.clone(), value.clone()),
        None => VarBind::new(oid.clone(), Value::EndOfMibView),
    }
}

/// GETBULK per RFC 3416 Section 4.2.3: one GETNEXT for each non-repeater,
/// then up to max-repetitions rounds over the repeaters.
fn bulk_answer(mib: &BTreeMap<Oid, Value>, request: &Pdu) -> Vec<VarBind> {
    let nr = (request.non_repeaters().max(0) as usize).min(request.varbinds.len());
    let max_rep = request.max_repetitions().max(0) as usize;

    let mut out: Vec<VarBind> = Vec::new();
    for vb in &request.varbinds[..nr] {
        out.push(next_of(mib, &vb.oid));
    }

    let mut cursors: Vec<Oid> = request.varbinds[nr..].iter().map(|vb| vb.oid.clone()).collect();
    for _round in 0..max_rep {
        for cursor in cursors.iter_mut() {
            let vb = next_of(mib, cursor);
            *cursor = vb.oid.clone();
            out.push(vb);
        }
    }

    out
}

/// USM credentials held by the v3 mock agent.
#[derive(Clone)]
pub struct V3AgentConfig {
    pub engine_id: Vec<u8>,
    pub engine_boots: u32,
    pub engine_time: u32,
    pub username: Vec<u8>,
    pub auth: (AuthProtocol, Vec<u8>),
    pub privacy: Option<(PrivProtocol, Vec<u8>)>,
}

/// v3 mock agent: answers discovery, verifies HMACs, decrypts requests and
/// encrypts responses.
pub struct V3Agent {
    addr: SocketAddr,
    auth_verified: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl V3Agent {
    pub async fn start(mib: BTreeMap<Oid, Value>, config: V3AgentConfig) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind v3 agent");
        let addr = socket.local_addr().expect("v3 agent local addr");
        let auth_verified = Arc::new(AtomicUsize::new(0));

        let auth_key = LocalizedKey::from_password(config.auth.0, &config.auth.1, &config.engine_id);
        let priv_key = config.privacy.as_ref().map(|(protocol, password)| {
            PrivKey::from_password(config.auth.0, *protocol, password, &config.engine_id)
        });
        let salt = SaltCounter::from_value(1);

        let verified = auth_verified.clone();
        let handle = tokio::spawn(async move {
            let mut buf = vec![0u8; 65535];
            loop {
                let Ok((n, source)) = socket.recv_from(&mut buf).await else {
                    return;
                };
                let data = Bytes::copy_from_slice(&buf[..n]);
                let Ok(message) = V3Message::decode(data.clone()) else {
                    continue;
                };
                let Ok(usm) = UsmSecurityParams::decode(message.security_params.clone()) else {
                    continue;
                };

                if usm.engine_id.is_empty() {
                    // Discovery: Report with our engine id, boots and time
                    let reply = discovery_report(&message, &config);
                    let _ = socket.send_to(&reply, source).await;
                    continue;
                }

                if usm.username.as_ref() != config.username.as_slice() {
                    continue;
                }

                // The auth params field must be exactly the truncated HMAC
                // over the zeroized message
                let Some((offset, len)) = UsmSecurityParams::find_auth_params_offset(&data) else {
                    continue;
                };
                if !verify_message(&auth_key, &data, offset, len) {
                    continue;
                }
                verified.fetch_add(1, Ordering::SeqCst);

                let request_pdu = match &message.data {
                    V3MessageData::Plaintext(scoped) => scoped.pdu.clone(),
                    V3MessageData::Encrypted(ciphertext) => {
                        let Some(priv_key) = priv_key.as_ref() else {
                            continue;
                        };
                        let Ok(plaintext) = priv_key.decrypt(
                            ciphertext,
                            usm.engine_boots,
                            usm.engine_time,
                            &usm.priv_params,
                        ) else {
                            continue;
                        };
                        let mut decoder = Decoder::new(plaintext);
                        let Ok(scoped) = ScopedPdu::decode(&mut decoder) else {
                            continue;
                        };
                        scoped.pdu
                    }
                };

                let response_pdu = answer(&mib, &request_pdu);
                let reply = seal_response(
                    &message,
                    &config,
                    response_pdu,
                    &auth_key,
                    priv_key.as_ref(),
                    &salt,
                );
                let _ = socket.send_to(&reply, source).await;
            }
        });

        Self {
            addr,
            auth_verified,
            handle,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Requests whose HMAC matched the recomputed value.
    pub fn auth_verified(&self) -> usize {
        self.auth_verified.load(Ordering::SeqCst)
    }
}

impl Drop for V3Agent {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn discovery_report(incoming: &V3Message, config: &V3AgentConfig) -> Bytes {
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

    let usm = UsmSecurityParams::new(
        Bytes::copy_from_slice(&config.engine_id),
        config.engine_boots,
        config.engine_time,
        Bytes::new(),
    );
    let global = MsgGlobalData::new(
        incoming.global_data.msg_id,
        1400,
        MsgFlags::new(SecurityLevel::NoAuthNoPriv, false),
    );
    let scoped = ScopedPdu::new(Bytes::copy_from_slice(&config.engine_id), Bytes::new(), report);

    V3Message::new(global, usm.encode(), scoped).encode()
}

fn seal_response(
    incoming: &V3Message,
    config: &V3AgentConfig,
    pdu: Pdu,
    auth_key: &LocalizedKey,
    priv_key: Option<&PrivKey>,
    salt: &SaltCounter,
) -> Bytes {
    let level = incoming.security_level();
    let scoped = ScopedPdu::new(
        Bytes::copy_from_slice(&config.engine_id),
        Bytes::new(),
        pdu,
    );

    let mut usm = UsmSecurityParams::new(
        Bytes::copy_from_slice(&config.engine_id),
        config.engine_boots,
        config.engine_time,
        Bytes::copy_from_slice(&config.username),
    );

    let (data, priv_params) = if level.requires_priv() {
        let priv_key = priv_key.expect("agent privacy key");
        let (ciphertext, params) = priv_key
            .encrypt_with_salt(
                &scoped.encode_to_bytes(),
                config.engine_boots,
                config.engine_time,
                salt.next(),
            )
            .expect("agent encryption");
        (V3MessageData::Encrypted(ciphertext), params)
    } else {
        (V3MessageData::Plaintext(scoped), Bytes::new())
    };

    if level.requires_auth() {
        usm = usm.with_auth_placeholder(auth_key.mac_len());
    }
    if level.requires_priv() {
        usm = usm.with_priv_params(priv_params);
    }

    let global = MsgGlobalData::new(
        incoming.global_data.msg_id,
        1400,
        MsgFlags::new(level, false),
    );

    let message = match data {
        V3MessageData::Plaintext(scoped) => V3Message::new(global, usm.encode(), scoped),
        V3MessageData::Encrypted(ciphertext) => {
            V3Message::new_encrypted(global, usm.encode(), ciphertext)
        }
    };

    let mut encoded = message.encode().to_vec();
    if level.requires_auth() {
        let (offset, len) =
            UsmSecurityParams::find_auth_params_offset(&encoded).expect("auth params offset");
        authenticate_message(auth_key, &mut encoded, offset, len);
    }

    Bytes::from(encoded)
}
