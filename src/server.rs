//! Trap server: receive SNMP notifications on a UDP socket.
//!
//! Each datagram is matched against the registered [`SecurityEntry`] set -
//! by community for v1/v2c, by engine id and user name for v3. Datagrams
//! with no matching entry are dropped silently. Once an entry matches, the
//! listener callback fires exactly once for the datagram: with the decoded
//! PDU on success, or with the error and no PDU when authentication,
//! decryption or decoding fails. InformRequests are acknowledged
//! automatically at the sender's security level.

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::net::UdpSocket;

use crate::ber::{Decoder, tag};
use crate::error::{AuthErrorKind, Error, Result};
use crate::message::{
    CommunityMessage, MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, V3Message, V3MessageData,
    peek_version,
};
use crate::pdu::{Pdu, PduType, TrapV1Pdu};
use crate::usm::{
    AuthProtocol, KeyCache, LocalizedKey, PrivKey, PrivProtocol, UsmSecurityParams,
    authenticate_message, verify_message,
};
use crate::util::parse_engine_id;
use crate::version::Version;

/// Credentials accepted by the trap server.
#[derive(Debug, Clone)]
pub struct SecurityEntry {
    /// SNMP version this entry accepts
    pub version: Version,
    /// Community string (v1/v2c)
    pub community: Option<Bytes>,
    /// USM user name (v3)
    pub username: Option<Bytes>,
    /// Authentication protocol and pass-phrase (v3)
    pub auth: Option<(AuthProtocol, Vec<u8>)>,
    /// Privacy protocol and pass-phrase (v3)
    pub privacy: Option<(PrivProtocol, Vec<u8>)>,
    /// Restrict to one engine id; entries without it accept any engine and
    /// localize keys per received engine id
    pub security_engine_id: Option<Bytes>,
}

impl SecurityEntry {
    /// Entry accepting v1 or v2c notifications with a community string.
    pub fn community(version: Version, community: impl Into<Bytes>) -> Self {
        Self {
            version,
            community: Some(community.into()),
            username: None,
            auth: None,
            privacy: None,
            security_engine_id: None,
        }
    }

    /// Entry accepting v3 notifications for a USM user.
    pub fn usm(username: impl Into<Bytes>) -> Self {
        Self {
            version: Version::V3,
            community: None,
            username: Some(username.into()),
            auth: None,
            privacy: None,
            security_engine_id: None,
        }
    }

    /// Add authentication credentials.
    pub fn auth(mut self, protocol: AuthProtocol, password: impl AsRef<[u8]>) -> Self {
        self.auth = Some((protocol, password.as_ref().to_vec()));
        self
    }

    /// Add privacy credentials.
    pub fn privacy(mut self, protocol: PrivProtocol, password: impl AsRef<[u8]>) -> Self {
        self.privacy = Some((protocol, password.as_ref().to_vec()));
        self
    }

    /// Restrict the entry to an engine id given in hex (`0x` prefix
    /// optional).
    pub fn security_engine_id(mut self, hex: &str) -> Result<Self> {
        self.security_engine_id = Some(Bytes::from(parse_engine_id(hex)?));
        Ok(self)
    }

    /// The security level implied by the configured credentials.
    pub fn security_level(&self) -> SecurityLevel {
        match (&self.auth, &self.privacy) {
            (None, _) => SecurityLevel::NoAuthNoPriv,
            (Some(_), None) => SecurityLevel::AuthNoPriv,
            (Some(_), Some(_)) => SecurityLevel::AuthPriv,
        }
    }
}

/// A notification delivered to the listener.
#[derive(Debug, Clone)]
pub enum TrapMessage {
    /// SNMPv1 trap with its distinct PDU layout.
    V1 {
        community: Bytes,
        trap: TrapV1Pdu,
    },
    /// SNMPv2c trap or inform.
    V2c {
        community: Bytes,
        pdu: Pdu,
    },
    /// SNMPv3 trap or inform, after verification and decryption.
    V3 {
        username: Bytes,
        engine_id: Bytes,
        context_engine_id: Bytes,
        context_name: Bytes,
        pdu: Pdu,
    },
}

impl TrapMessage {
    /// The inner generic PDU, when the notification has one (v2c/v3).
    pub fn pdu(&self) -> Option<&Pdu> {
        match self {
            TrapMessage::V1 { .. } => None,
            TrapMessage::V2c { pdu, .. } | TrapMessage::V3 { pdu, .. } => Some(pdu),
        }
    }
}

/// One listener callback invocation: the source address plus either the
/// decoded notification or the error that stopped it after the security
/// match.
#[derive(Debug)]
pub struct TrapEvent {
    /// Sender address
    pub source: SocketAddr,
    /// Decoded notification, absent on error
    pub message: Option<TrapMessage>,
    /// Security or decode failure, absent on success
    pub error: Option<Error>,
}

/// Callback invoked once per accepted datagram.
pub trait TrapListener: Send + Sync {
    /// Handle one notification event.
    fn on_trap(&self, event: TrapEvent);
}

impl<F> TrapListener for F
where
    F: Fn(TrapEvent) + Send + Sync,
{
    fn on_trap(&self, event: TrapEvent) {
        self(event)
    }
}

/// Builder for [`TrapServer`].
pub struct TrapServerBuilder {
    local_addr: String,
    entries: Vec<SecurityEntry>,
}

impl TrapServerBuilder {
    /// Start a builder; the default bind address is `0.0.0.0:162`.
    pub fn new() -> Self {
        Self {
            local_addr: "0.0.0.0:162".to_string(),
            entries: Vec::new(),
        }
    }

    /// Set the local bind address (`host:port`).
    pub fn local_addr(mut self, addr: impl Into<String>) -> Self {
        self.local_addr = addr.into();
        self
    }

    /// Register a security entry.
    pub fn security_entry(mut self, entry: SecurityEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Bind the UDP socket.
    pub async fn bind(self) -> Result<TrapServer> {
        let socket = UdpSocket::bind(&self.local_addr)
            .await
            .map_err(|e| Error::Io {
                target: None,
                source: e,
            })?;
        let local_addr = socket.local_addr().map_err(|e| Error::Io {
            target: None,
            source: e,
        })?;

        tracing::debug!(local = %local_addr, entries = self.entries.len(), "trap server bound");

        Ok(TrapServer {
            socket,
            local_addr,
            entries: self.entries,
            key_cache: KeyCache::new(),
        })
    }
}

impl Default for TrapServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// SNMP notification receiver.
pub struct TrapServer {
    socket: UdpSocket,
    local_addr: SocketAddr,
    entries: Vec<SecurityEntry>,
    key_cache: KeyCache,
}

impl TrapServer {
    /// Start building a trap server.
    pub fn builder() -> TrapServerBuilder {
        TrapServerBuilder::new()
    }

    /// The bound local address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run the receive-dispatch loop, invoking `listener` once per
    /// datagram that passes the security lookup. Runs until the socket
    /// fails; dropping the future stops the server.
    pub async fn serve<L: TrapListener>(&self, listener: L) -> Result<()> {
        let mut buf = vec![0u8; 65535];
        loop {
            let (n, source) = self
                .socket
                .recv_from(&mut buf)
                .await
                .map_err(|e| Error::Io {
                    target: None,
                    source: e,
                })?;
            let data = Bytes::copy_from_slice(&buf[..n]);

            if let Some(event) = self.handle_datagram(data, source).await {
                listener.on_trap(event);
            }
        }
    }

    /// Process one datagram. `None` means silent drop (no matching entry,
    /// unparseable version field, or a non-notification PDU).
    pub(crate) async fn handle_datagram(
        &self,
        data: Bytes,
        source: SocketAddr,
    ) -> Option<TrapEvent> {
        let version = match peek_version(&data) {
            Ok(version) => version,
            Err(_) => {
                tracing::debug!(source = %source, "dropping datagram with unreadable version");
                return None;
            }
        };

        match version {
            Version::V1 => self.handle_v1(data, source).await,
            Version::V2c => self.handle_v2c(data, source).await,
            Version::V3 => self.handle_v3(data, source).await,
        }
    }

    fn find_community_entry(&self, version: Version, community: &[u8]) -> Option<&SecurityEntry> {
        self.entries.iter().find(|entry| {
            entry.version == version
                && entry
                    .community
                    .as_ref()
                    .is_some_and(|c| c.as_ref() == community)
        })
    }

    fn find_usm_entry(&self, username: &[u8], engine_id: &[u8]) -> Option<&SecurityEntry> {
        self.entries.iter().find(|entry| {
            entry.version == Version::V3
                && entry
                    .username
                    .as_ref()
                    .is_some_and(|u| u.as_ref() == username)
                && entry
                    .security_engine_id
                    .as_ref()
                    .is_none_or(|id| id.as_ref() == engine_id)
        })
    }

    async fn handle_v1(&self, data: Bytes, source: SocketAddr) -> Option<TrapEvent> {
        // Decode the envelope by hand: the Trap-v1 PDU has its own layout
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence().ok()?;
        let _version = seq.read_integer().ok()?;
        let community = seq.read_octet_string().ok()?;

        self.find_community_entry(Version::V1, &community)?;

        if seq.peek_tag() != Some(tag::pdu::TRAP_V1) {
            tracing::debug!(source = %source, "v1 datagram is not a trap, dropping");
            return None;
        }

        match TrapV1Pdu::decode(&mut seq) {
            Ok(trap) => Some(TrapEvent {
                source,
                message: Some(TrapMessage::V1 { community, trap }),
                error: None,
            }),
            Err(e) => Some(TrapEvent {
                source,
                message: None,
                error: Some(e),
            }),
        }
    }

    async fn handle_v2c(&self, data: Bytes, source: SocketAddr) -> Option<TrapEvent> {
        // Pull the community out first; full decode happens only for
        // registered senders
        let community = {
            let mut decoder = Decoder::new(data.clone());
            let mut seq = decoder.read_sequence().ok()?;
            let _version = seq.read_integer().ok()?;
            seq.read_octet_string().ok()?
        };

        self.find_community_entry(Version::V2c, &community)?;

        let message = match CommunityMessage::decode(data) {
            Ok(message) => message,
            Err(e) => {
                return Some(TrapEvent {
                    source,
                    message: None,
                    error: Some(e),
                });
            }
        };

        let pdu = message.pdu;
        if !matches!(pdu.pdu_type, PduType::TrapV2 | PduType::InformRequest) {
            tracing::debug!(source = %source, pdu_type = %pdu.pdu_type, "not a notification, dropping");
            return None;
        }

        if pdu.pdu_type == PduType::InformRequest {
            let ack = CommunityMessage::new(Version::V2c, community.clone(), pdu.to_response());
            if let Err(e) = self.socket.send_to(&ack.encode(), source).await {
                tracing::debug!(source = %source, error = %e, "failed to ack inform");
            }
        }

        Some(TrapEvent {
            source,
            message: Some(TrapMessage::V2c { community, pdu }),
            error: None,
        })
    }

    async fn handle_v3(&self, data: Bytes, source: SocketAddr) -> Option<TrapEvent> {
        let message = V3Message::decode(data.clone()).ok()?;
        let usm_params = UsmSecurityParams::decode(message.security_params.clone()).ok()?;

        let entry = self.find_usm_entry(&usm_params.username, &usm_params.engine_id)?;
        let level = message.security_level();

        if level != entry.security_level() {
            tracing::debug!(
                source = %source,
                message_level = %level,
                entry_level = %entry.security_level(),
                "security level mismatch"
            );
            return Some(TrapEvent {
                source,
                message: None,
                error: Some(Error::auth(Some(source), AuthErrorKind::NoAuthKey)),
            });
        }

        let auth_key = entry.auth.as_ref().map(|(protocol, password)| {
            self.key_cache
                .localized(*protocol, password, &usm_params.engine_id)
        });

        if level.requires_auth() {
            let Some(auth_key) = auth_key.as_ref() else {
                return Some(TrapEvent {
                    source,
                    message: None,
                    error: Some(Error::auth(Some(source), AuthErrorKind::NoAuthKey)),
                });
            };

            let Some((offset, len)) = UsmSecurityParams::find_auth_params_offset(&data) else {
                return Some(TrapEvent {
                    source,
                    message: None,
                    error: Some(Error::auth(Some(source), AuthErrorKind::AuthParamsNotFound)),
                });
            };

            if !verify_message(auth_key, &data, offset, len) {
                tracing::warn!(
                    source = %source,
                    username = %String::from_utf8_lossy(&usm_params.username),
                    "v3 notification failed authentication"
                );
                return Some(TrapEvent {
                    source,
                    message: None,
                    error: Some(Error::auth(Some(source), AuthErrorKind::HmacMismatch)),
                });
            }
        }

        let priv_key = match (&entry.auth, &entry.privacy) {
            (Some((auth_protocol, _)), Some((priv_protocol, password))) => {
                let localized =
                    self.key_cache
                        .localized(*auth_protocol, password, &usm_params.engine_id);
                Some(PrivKey::from_localized(
                    *auth_protocol,
                    *priv_protocol,
                    localized.as_bytes(),
                ))
            }
            _ => None,
        };

        let scoped = match &message.data {
            V3MessageData::Plaintext(scoped) => scoped.clone(),
            V3MessageData::Encrypted(ciphertext) => {
                let Some(priv_key) = priv_key.as_ref() else {
                    return Some(TrapEvent {
                        source,
                        message: None,
                        error: Some(Error::decrypt(
                            Some(source),
                            crate::error::CryptoErrorKind::NoPrivKey,
                        )),
                    });
                };

                let plaintext = match priv_key.decrypt(
                    ciphertext,
                    usm_params.engine_boots,
                    usm_params.engine_time,
                    &usm_params.priv_params,
                ) {
                    Ok(plaintext) => plaintext,
                    Err(e) => {
                        return Some(TrapEvent {
                            source,
                            message: None,
                            error: Some(e),
                        });
                    }
                };

                let mut decoder = Decoder::new(plaintext);
                match ScopedPdu::decode(&mut decoder) {
                    Ok(scoped) => scoped,
                    Err(e) => {
                        return Some(TrapEvent {
                            source,
                            message: None,
                            error: Some(e),
                        });
                    }
                }
            }
        };

        if !matches!(
            scoped.pdu.pdu_type,
            PduType::TrapV2 | PduType::InformRequest
        ) {
            tracing::debug!(source = %source, pdu_type = %scoped.pdu.pdu_type, "not a notification, dropping");
            return None;
        }

        if scoped.pdu.pdu_type == PduType::InformRequest {
            match self.seal_v3_ack(
                &message,
                &usm_params,
                &scoped,
                auth_key.as_ref(),
                priv_key.as_ref(),
            ) {
                Ok(ack) => {
                    if let Err(e) = self.socket.send_to(&ack, source).await {
                        tracing::debug!(source = %source, error = %e, "failed to ack v3 inform");
                    }
                }
                Err(e) => {
                    tracing::debug!(source = %source, error = %e, "failed to build v3 inform ack");
                }
            }
        }

        Some(TrapEvent {
            source,
            message: Some(TrapMessage::V3 {
                username: usm_params.username.clone(),
                engine_id: usm_params.engine_id.clone(),
                context_engine_id: scoped.context_engine_id.clone(),
                context_name: scoped.context_name.clone(),
                pdu: scoped.pdu,
            }),
            error: None,
        })
    }

    /// Build the Response message acknowledging a v3 InformRequest, sealed
    /// at the sender's security level with the sender's boots/time.
    fn seal_v3_ack(
        &self,
        incoming: &V3Message,
        incoming_usm: &UsmSecurityParams,
        incoming_scoped: &ScopedPdu,
        auth_key: Option<&LocalizedKey>,
        priv_key: Option<&PrivKey>,
    ) -> Result<Bytes> {
        let level = incoming.security_level();
        let global = MsgGlobalData::new(
            incoming.global_data.msg_id,
            incoming.global_data.msg_max_size,
            MsgFlags::new(level, false),
        );
        let scoped = ScopedPdu::new(
            incoming_scoped.context_engine_id.clone(),
            incoming_scoped.context_name.clone(),
            incoming_scoped.pdu.to_response(),
        );

        let mut usm = UsmSecurityParams::new(
            incoming_usm.engine_id.clone(),
            incoming_usm.engine_boots,
            incoming_usm.engine_time,
            incoming_usm.username.clone(),
        );

        let (msg_data, priv_params) = if level.requires_priv() {
            let priv_key = priv_key.ok_or_else(|| {
                Error::encrypt(None, crate::error::CryptoErrorKind::NoPrivKey)
            })?;
            let (ciphertext, salt) = priv_key.encrypt(
                &scoped.encode_to_bytes(),
                incoming_usm.engine_boots,
                incoming_usm.engine_time,
            )?;
            (V3MessageData::Encrypted(ciphertext), salt)
        } else {
            (V3MessageData::Plaintext(scoped), Bytes::new())
        };

        if level.requires_auth() {
            let mac_len = auth_key
                .map(|k| k.mac_len())
                .ok_or_else(|| Error::auth(None, AuthErrorKind::NoAuthKey))?;
            usm = usm.with_auth_placeholder(mac_len);
        }
        if level.requires_priv() {
            usm = usm.with_priv_params(priv_params);
        }

        let response = match msg_data {
            V3MessageData::Plaintext(scoped) => V3Message::new(global, usm.encode(), scoped),
            V3MessageData::Encrypted(ciphertext) => {
                V3Message::new_encrypted(global, usm.encode(), ciphertext)
            }
        };

        let mut encoded = response.encode().to_vec();
        if level.requires_auth() {
            let auth_key = auth_key.ok_or_else(|| Error::auth(None, AuthErrorKind::NoAuthKey))?;
            let (offset, len) = UsmSecurityParams::find_auth_params_offset(&encoded)
                .ok_or_else(|| {
                    Error::encode(crate::error::EncodeErrorKind::MissingAuthParams)
                })?;
            authenticate_message(auth_key, &mut encoded, offset, len);
        }

        Ok(Bytes::from(encoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn community_entry_matching() {
        let entry = SecurityEntry::community(Version::V2c, &b"public"[..]);
        assert_eq!(entry.version, Version::V2c);
        assert_eq!(entry.security_level(), SecurityLevel::NoAuthNoPriv);
    }

    #[test]
    fn usm_entry_levels() {
        let entry = SecurityEntry::usm(&b"usr"[..]);
        assert_eq!(entry.security_level(), SecurityLevel::NoAuthNoPriv);

        let entry = SecurityEntry::usm(&b"usr"[..]).auth(AuthProtocol::Sha1, "maplesyrup");
        assert_eq!(entry.security_level(), SecurityLevel::AuthNoPriv);

        let entry = SecurityEntry::usm(&b"usr"[..])
            .auth(AuthProtocol::Sha1, "maplesyrup")
            .privacy(PrivProtocol::Aes128, "maplesyrup");
        assert_eq!(entry.security_level(), SecurityLevel::AuthPriv);
    }

    #[test]
    fn engine_id_restriction_parses_hex() {
        let entry = SecurityEntry::usm(&b"usr"[..])
            .security_engine_id("0x80001f8880e9630000d61ff4")
            .unwrap();
        assert_eq!(entry.security_engine_id.unwrap().len(), 12);

        assert!(SecurityEntry::usm(&b"usr"[..]).security_engine_id("xyz").is_err());
    }
}
