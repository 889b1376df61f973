//! SNMPv3 client paths: discovery, key derivation, message sealing and
//! unsealing, Report handling and time resynchronization.

use bytes::Bytes;

use crate::ber::Decoder;
use crate::engine::{EngineState, is_not_in_time_window_report, is_unknown_engine_id_report};
use crate::error::{
    AuthErrorKind, CryptoErrorKind, DecodeErrorKind, EncodeErrorKind, Error, Result,
};
use crate::message::{
    MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, V3Message, V3MessageData,
};
use crate::pdu::{Pdu, PduType};
use crate::transport::Transport;
use crate::usm::{
    AuthProtocol, LocalizedKey, PrivKey, PrivProtocol, UsmSecurityParams, authenticate_message,
    verify_message,
};
use crate::util::encode_hex;

use super::Client;

/// USM credentials and context for a v3 client.
#[derive(Clone)]
pub struct UsmConfig {
    /// User name, 1..=32 bytes
    pub username: Bytes,
    /// Authentication protocol and pass-phrase
    pub auth: Option<(AuthProtocol, Vec<u8>)>,
    /// Privacy protocol and pass-phrase
    pub privacy: Option<(PrivProtocol, Vec<u8>)>,
    /// Fixed authoritative engine id; set when this client is the
    /// authoritative sender (traps), skips discovery
    pub security_engine_id: Option<Bytes>,
    /// Context engine id override (defaults to the authoritative engine id)
    pub context_engine_id: Option<Bytes>,
    /// Context name (defaults to empty)
    pub context_name: Bytes,
}

impl UsmConfig {
    /// Credentials with just a user name (noAuthNoPriv).
    pub fn new(username: impl Into<Bytes>) -> Self {
        Self {
            username: username.into(),
            auth: None,
            privacy: None,
            security_engine_id: None,
            context_engine_id: None,
            context_name: Bytes::new(),
        }
    }

    /// Add authentication.
    pub fn auth(mut self, protocol: AuthProtocol, password: impl AsRef<[u8]>) -> Self {
        self.auth = Some((protocol, password.as_ref().to_vec()));
        self
    }

    /// Add privacy.
    pub fn privacy(mut self, protocol: PrivProtocol, password: impl AsRef<[u8]>) -> Self {
        self.privacy = Some((protocol, password.as_ref().to_vec()));
        self
    }

    /// The security level implied by the configured credentials.
    pub fn security_level(&self) -> SecurityLevel {
        match (&self.auth, &self.privacy) {
            (None, _) => SecurityLevel::NoAuthNoPriv,
            (Some(_), None) => SecurityLevel::AuthNoPriv,
            (Some(_), Some(_)) => SecurityLevel::AuthPriv,
        }
    }

    /// Derive localized keys for an engine id.
    pub fn derive_keys(&self, engine_id: &[u8]) -> DerivedKeys {
        let auth_key = self
            .auth
            .as_ref()
            .map(|(protocol, password)| LocalizedKey::from_password(*protocol, password, engine_id));

        let priv_key = match (&self.auth, &self.privacy) {
            (Some((auth_protocol, _)), Some((priv_protocol, password))) => Some(
                PrivKey::from_password(*auth_protocol, *priv_protocol, password, engine_id),
            ),
            _ => None,
        };

        DerivedKeys { auth_key, priv_key }
    }
}

impl std::fmt::Debug for UsmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsmConfig")
            .field("username", &String::from_utf8_lossy(&self.username))
            .field("auth", &self.auth.as_ref().map(|(p, _)| p))
            .field("privacy", &self.privacy.as_ref().map(|(p, _)| p))
            .field("security_engine_id", &self.security_engine_id.as_deref().map(encode_hex))
            .finish()
    }
}

/// Localized keys for the discovered engine.
pub(crate) struct DerivedKeys {
    pub auth_key: Option<LocalizedKey>,
    pub priv_key: Option<PrivKey>,
}

/// Per-send overrides.
///
/// An explicit option bag rather than mutated configuration: the override
/// lives exactly as long as the send.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SendOpts {
    /// Engine boots/time to stamp into the outgoing message.
    pub boots_time: Option<(u32, u32)>,
}

/// Mutable v3 client state: discovered engine plus derived keys.
#[derive(Default)]
pub(crate) struct V3State {
    pub engine: Option<EngineState>,
    pub keys: Option<DerivedKeys>,
}

impl<T: Transport> Client<T> {
    fn usm(&self) -> Result<&UsmConfig> {
        self.config
            .security
            .as_ref()
            .ok_or_else(|| Error::encode(EncodeErrorKind::NoSecurityConfig))
    }

    /// Open-time v3 setup: adopt the configured engine id, or discover one.
    pub(super) async fn open_v3(&self) -> Result<()> {
        let usm = self.usm()?;

        if let Some(engine_id) = usm.security_engine_id.clone() {
            // Authoritative-sender mode: no discovery, boots/time start at
            // zero and are overridden per send or resynced from reports
            let keys = usm.derive_keys(&engine_id);
            let mut state = self.v3.lock().expect("v3 state poisoned");
            state.engine = Some(EngineState::new(engine_id, 0, 0));
            state.keys = Some(keys);
            return Ok(());
        }

        self.discover_engine().await
    }

    /// Engine discovery (RFC 3414 Section 4).
    ///
    /// Sends the empty noAuthNoPriv reportable GetRequest; the peer's
    /// usmStatsUnknownEngineIDs Report carries its engine id, boots and
    /// time in the USM security parameters.
    pub(super) async fn discover_engine(&self) -> Result<()> {
        let msg_id = self.next_request_id();
        let request = V3Message::discovery_request(msg_id, self.config.message_max_size);
        let data = request.encode();

        tracing::debug!(msg_id, "performing engine discovery");

        let start = std::time::Instant::now();
        let mut last_error: Option<Error> = None;
        for attempt in 0..=self.config.retries {
            if attempt > 0 {
                tracing::debug!(msg_id, attempt, "retrying discovery");
            }

            self.transport.send(&data, self.config.timeout).await?;
            let reply = match self.transport.recv(self.config.timeout).await {
                Ok(reply) => reply,
                Err(e) if e.is_retriable() => {
                    last_error = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let response = V3Message::decode(reply)?;
            let usm_params = UsmSecurityParams::decode(response.security_params.clone())?;

            if usm_params.engine_id.is_empty() {
                return Err(Error::UnknownEngineId {
                    target: Some(self.peer_addr()),
                });
            }
            if let Some(scoped) = response.scoped_pdu() {
                if scoped.pdu.pdu_type == PduType::Report
                    && !is_unknown_engine_id_report(&scoped.pdu)
                {
                    tracing::debug!("discovery Report did not carry usmStatsUnknownEngineIDs");
                }
            }

            tracing::debug!(
                engine_id = %encode_hex(&usm_params.engine_id),
                engine_boots = usm_params.engine_boots,
                engine_time = usm_params.engine_time,
                "discovered engine"
            );

            let usm = self.usm()?;
            let keys = usm.derive_keys(&usm_params.engine_id);
            let mut state = self.v3.lock().expect("v3 state poisoned");
            state.engine = Some(EngineState::new(
                usm_params.engine_id,
                usm_params.engine_boots,
                usm_params.engine_time,
            ));
            state.keys = Some(keys);
            return Ok(());
        }

        Err(self.exhausted(last_error, msg_id, start))
    }

    /// Seal a PDU into a v3 message: scoped PDU, optional encryption, USM
    /// parameters, optional in-place HMAC.
    fn seal_v3(&self, pdu: &Pdu, opts: &SendOpts) -> Result<Vec<u8>> {
        let usm = self.usm()?;
        let level = usm.security_level();

        let state = self.v3.lock().expect("v3 state poisoned");
        let engine = state
            .engine
            .as_ref()
            .ok_or_else(|| Error::encode(EncodeErrorKind::EngineNotDiscovered))?;

        let (engine_boots, engine_time) = match opts.boots_time {
            Some(pair) => pair,
            None => (engine.engine_boots, engine.estimated_time()),
        };

        let context_engine_id = usm
            .context_engine_id
            .clone()
            .unwrap_or_else(|| engine.engine_id.clone());
        let scoped_pdu = ScopedPdu::new(context_engine_id, usm.context_name.clone(), pdu.clone());

        // msg_id mirrors the request id so responses correlate either way
        let msg_id = pdu.request_id;

        let (msg_data, priv_params) = if level.requires_priv() {
            let priv_key = state
                .keys
                .as_ref()
                .and_then(|k| k.priv_key.as_ref())
                .ok_or_else(|| Error::encode(EncodeErrorKind::NoPrivKey))?;

            let plaintext = scoped_pdu.encode_to_bytes();
            let (ciphertext, salt) = priv_key.encrypt(&plaintext, engine_boots, engine_time)?;
            tracing::trace!(
                plaintext_len = plaintext.len(),
                ciphertext_len = ciphertext.len(),
                "encrypted scoped PDU"
            );
            (V3MessageData::Encrypted(ciphertext), salt)
        } else {
            (V3MessageData::Plaintext(scoped_pdu), Bytes::new())
        };

        let mut usm_params = UsmSecurityParams::new(
            engine.engine_id.clone(),
            engine_boots,
            engine_time,
            usm.username.clone(),
        );
        if level.requires_auth() {
            let mac_len = state
                .keys
                .as_ref()
                .and_then(|k| k.auth_key.as_ref())
                .map(|k| k.mac_len())
                .ok_or_else(|| Error::encode(EncodeErrorKind::MissingAuthKey))?;
            usm_params = usm_params.with_auth_placeholder(mac_len);
        }
        if level.requires_priv() {
            usm_params = usm_params.with_priv_params(priv_params);
        }

        let global_data = MsgGlobalData::new(
            msg_id,
            self.config.message_max_size,
            MsgFlags::new(level, pdu.pdu_type.is_confirmed()),
        );

        let message = match msg_data {
            V3MessageData::Plaintext(scoped) => {
                V3Message::new(global_data, usm_params.encode(), scoped)
            }
            V3MessageData::Encrypted(ciphertext) => {
                V3Message::new_encrypted(global_data, usm_params.encode(), ciphertext)
            }
        };

        let mut encoded = message.encode().to_vec();

        if level.requires_auth() {
            let auth_key = state
                .keys
                .as_ref()
                .and_then(|k| k.auth_key.as_ref())
                .ok_or_else(|| Error::encode(EncodeErrorKind::MissingAuthKey))?;

            let (offset, len) = UsmSecurityParams::find_auth_params_offset(&encoded)
                .ok_or_else(|| Error::encode(EncodeErrorKind::MissingAuthParams))?;
            authenticate_message(auth_key, &mut encoded, offset, len);
            tracing::trace!(offset, len, "applied HMAC authentication");
        }

        Ok(encoded)
    }

    /// Unseal a received v3 message: verify, decrypt, decode.
    ///
    /// Returns the inner PDU and the sender's USM parameters.
    fn unseal_v3(&self, data: Bytes) -> Result<(Pdu, UsmSecurityParams)> {
        let usm = self.usm()?;
        let level = usm.security_level();
        let state = self.v3.lock().expect("v3 state poisoned");

        let message = V3Message::decode(data.clone())?;
        let usm_params = UsmSecurityParams::decode(message.security_params.clone())?;

        // Reports about unknown engines/users arrive unauthenticated even
        // on auth sessions; verify only messages that claim auth
        let claims_auth = message.security_level().requires_auth();
        if level.requires_auth() && claims_auth {
            let auth_key = state
                .keys
                .as_ref()
                .and_then(|k| k.auth_key.as_ref())
                .ok_or_else(|| Error::auth(Some(self.peer_addr()), AuthErrorKind::NoAuthKey))?;

            let (offset, len) = UsmSecurityParams::find_auth_params_offset(&data)
                .ok_or_else(|| {
                    Error::auth(Some(self.peer_addr()), AuthErrorKind::AuthParamsNotFound)
                })?;
            if !verify_message(auth_key, &data, offset, len) {
                return Err(Error::auth(
                    Some(self.peer_addr()),
                    AuthErrorKind::HmacMismatch,
                ));
            }
            tracing::trace!("verified response HMAC");
        }

        let pdu = match message.data {
            V3MessageData::Plaintext(scoped) => scoped.pdu,
            V3MessageData::Encrypted(ciphertext) => {
                let priv_key = state
                    .keys
                    .as_ref()
                    .and_then(|k| k.priv_key.as_ref())
                    .ok_or_else(|| {
                        Error::decrypt(Some(self.peer_addr()), CryptoErrorKind::NoPrivKey)
                    })?;

                let plaintext = priv_key.decrypt(
                    &ciphertext,
                    usm_params.engine_boots,
                    usm_params.engine_time,
                    &usm_params.priv_params,
                )?;
                let mut decoder = Decoder::new(plaintext);
                ScopedPdu::decode(&mut decoder)?.pdu
            }
        };

        Ok((pdu, usm_params))
    }

    /// v3 dispatch: seal, send, unseal, classify reports, enforce the time
    /// window with one resynchronization, and retry on transport faults.
    pub(super) async fn dispatch_v3(
        &self,
        pdu: Pdu,
        expect_response: bool,
        opts: SendOpts,
    ) -> Result<Option<Pdu>> {
        let level = self.usm()?.security_level();
        let request_id = pdu.request_id;
        let start = std::time::Instant::now();

        let mut last_error: Option<Error> = None;
        let mut resynced = false;
        let mut attempt = 0u32;

        while attempt <= self.config.retries {
            if attempt > 0 {
                tracing::debug!(request_id, attempt, "retrying v3 request");
            }

            // Re-seal every attempt: engine time moves and the salt is
            // single-use
            let data = self.seal_v3(&pdu, &opts)?;
            self.check_message_size(data.len())?;

            tracing::trace!(bytes = data.len(), request_id, "sending v3 request");
            let reply = match self.exchange(&data, expect_response).await {
                Ok(None) => return Ok(None),
                Ok(Some(reply)) => reply,
                Err(e) if e.is_retriable() => {
                    last_error = Some(e);
                    attempt += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let (response_pdu, usm_params) = self.unseal_v3(reply)?;

            if response_pdu.pdu_type == PduType::Report {
                if is_not_in_time_window_report(&response_pdu) {
                    if resynced {
                        return Err(Error::NotInTimeWindow {
                            target: Some(self.peer_addr()),
                        });
                    }
                    tracing::debug!(
                        engine_boots = usm_params.engine_boots,
                        engine_time = usm_params.engine_time,
                        "notInTimeWindow report, resynchronizing"
                    );
                    self.resync(&usm_params);
                    resynced = true;
                    // The resync retry does not consume an attempt
                    continue;
                }
                if is_unknown_engine_id_report(&response_pdu) {
                    return Err(Error::UnknownEngineId {
                        target: Some(self.peer_addr()),
                    });
                }
                if crate::engine::is_unknown_user_name_report(&response_pdu) {
                    return Err(Error::UnknownUserName {
                        target: Some(self.peer_addr()),
                    });
                }
                if crate::engine::is_wrong_digest_report(&response_pdu) {
                    return Err(Error::auth(
                        Some(self.peer_addr()),
                        AuthErrorKind::HmacMismatch,
                    ));
                }
                if crate::engine::is_decryption_error_report(&response_pdu) {
                    return Err(Error::decrypt(
                        Some(self.peer_addr()),
                        CryptoErrorKind::CipherError,
                    ));
                }
                // Any other report is a malformed exchange
                return Err(Error::decode(0, DecodeErrorKind::EmptyResponse));
            }

            if response_pdu.request_id != request_id {
                return Err(Error::RequestIdMismatch {
                    expected: request_id,
                    actual: response_pdu.request_id,
                });
            }

            // Time window check on authenticated responses, with a single
            // resynchronization from the received values
            if level.requires_auth() && opts.boots_time.is_none() {
                let in_window = {
                    let state = self.v3.lock().expect("v3 state poisoned");
                    state
                        .engine
                        .as_ref()
                        .map(|e| {
                            e.is_in_time_window(usm_params.engine_boots, usm_params.engine_time)
                        })
                        .unwrap_or(false)
                };
                if !in_window {
                    if resynced {
                        return Err(Error::NotInTimeWindow {
                            target: Some(self.peer_addr()),
                        });
                    }
                    tracing::debug!("response outside time window, resynchronizing");
                    self.resync(&usm_params);
                    resynced = true;
                    continue;
                }
            }

            // Nudge local engine time forward from the response
            self.resync(&usm_params);

            tracing::debug!(
                request_id,
                error_status = response_pdu.error_status,
                varbind_count = response_pdu.varbinds.len(),
                "received v3 response"
            );
            return Ok(Some(response_pdu));
        }

        Err(self.exhausted(last_error, request_id, start))
    }

    /// Fold received engine boots/time into local state.
    fn resync(&self, usm_params: &UsmSecurityParams) {
        let mut state = self.v3.lock().expect("v3 state poisoned");
        if let Some(engine) = state.engine.as_mut() {
            engine.update_time(usm_params.engine_boots, usm_params.engine_time);
        }
    }
}
