//! Client construction with fail-fast argument validation.
//!
//! Every rule checked here fires before any I/O: unknown versions, the
//! RFC 3412 message-size range, RFC 3414 user-name and pass-phrase
//! minimums, and malformed hex engine ids all surface as
//! [`Error::Argument`](crate::Error::Argument) from `connect`.

use std::time::Duration;

use bytes::Bytes;

use crate::client::{Client, ClientConfig, UsmConfig};
use crate::error::{Error, Result};
use crate::message::MSG_MAX_SIZE_MINIMUM;
use crate::transport::UdpTransport;
use crate::usm::{AuthProtocol, PrivProtocol};
use crate::util::parse_engine_id;
use crate::version::Version;

const TIMEOUT_DEFAULT: Duration = Duration::from_secs(5);
const MSG_SIZE_DEFAULT: i32 = 1400;

/// Builder for [`Client`].
pub struct ClientBuilder {
    version: Version,
    network: String,
    address: String,
    timeout: Duration,
    retries: u32,
    message_max_size: i32,
    community: Bytes,
    username: Option<Bytes>,
    auth: Option<(AuthProtocol, Vec<u8>)>,
    privacy: Option<(PrivProtocol, Vec<u8>)>,
    security_engine_id: Option<String>,
    context_engine_id: Option<String>,
    context_name: Bytes,
}

impl ClientBuilder {
    /// Start a builder for the given peer address (`host:port`).
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            version: Version::V2c,
            network: "udp".to_string(),
            address: address.into(),
            timeout: TIMEOUT_DEFAULT,
            retries: 0,
            message_max_size: MSG_SIZE_DEFAULT,
            community: Bytes::new(),
            username: None,
            auth: None,
            privacy: None,
            security_engine_id: None,
            context_engine_id: None,
            context_name: Bytes::new(),
        }
    }

    /// SNMP version (default V2c).
    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Transport network: `udp` (default), `udp4`, `udp6`.
    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    /// Per-attempt timeout (default 5 s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Additional attempts after the first (default 0).
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Maximum message size (default 1400; RFC 3412 floor 484).
    pub fn message_max_size(mut self, size: i32) -> Self {
        self.message_max_size = size;
        self
    }

    /// Community string (v1/v2c).
    pub fn community(mut self, community: impl Into<Bytes>) -> Self {
        self.community = community.into();
        self
    }

    /// USM user name (v3).
    pub fn username(mut self, username: impl Into<Bytes>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// USM authentication protocol and pass-phrase (v3).
    pub fn auth(mut self, protocol: AuthProtocol, password: impl AsRef<[u8]>) -> Self {
        self.auth = Some((protocol, password.as_ref().to_vec()));
        self
    }

    /// USM privacy protocol and pass-phrase (v3).
    pub fn privacy(mut self, protocol: PrivProtocol, password: impl AsRef<[u8]>) -> Self {
        self.privacy = Some((protocol, password.as_ref().to_vec()));
        self
    }

    /// Authoritative engine id in hex, optional `0x` prefix (v3).
    ///
    /// Setting this makes the client the authoritative sender (trap use)
    /// and skips discovery at open.
    pub fn security_engine_id(mut self, hex: impl Into<String>) -> Self {
        self.security_engine_id = Some(hex.into());
        self
    }

    /// Context engine id in hex, optional `0x` prefix (v3).
    pub fn context_engine_id(mut self, hex: impl Into<String>) -> Self {
        self.context_engine_id = Some(hex.into());
        self
    }

    /// Context name (v3, default empty).
    pub fn context_name(mut self, name: impl Into<Bytes>) -> Self {
        self.context_name = name.into();
        self
    }

    /// Validate into a [`ClientConfig`] without connecting.
    pub fn build_config(self) -> Result<ClientConfig> {
        if self.address.is_empty() {
            return Err(Error::argument("", "Address is required"));
        }

        // RFC 3412 Section 6
        if self.message_max_size < MSG_MAX_SIZE_MINIMUM {
            return Err(Error::argument(
                self.message_max_size,
                format!("MessageMaxSize is range {}..{}", MSG_MAX_SIZE_MINIMUM, i32::MAX),
            ));
        }

        if self.timeout.is_zero() {
            return Err(Error::argument("0s", "Timeout must be positive"));
        }

        let security = if self.version == Version::V3 {
            // RFC 3414 Section 5
            let username = self
                .username
                .ok_or_else(|| Error::argument("", "UserName length is range 1..32"))?;
            if username.is_empty() || username.len() > 32 {
                return Err(Error::argument(
                    String::from_utf8_lossy(&username),
                    "UserName length is range 1..32",
                ));
            }

            // RFC 3414 Section 11.2
            if let Some((_, password)) = &self.auth {
                if password.len() < 8 {
                    return Err(Error::argument(
                        "AuthPassword",
                        "AuthPassword is at least 8 characters in length",
                    ));
                }
            }
            if let Some((_, password)) = &self.privacy {
                if self.auth.is_none() {
                    return Err(Error::argument(
                        "PrivProtocol",
                        "PrivProtocol requires AuthProtocol",
                    ));
                }
                if password.len() < 8 {
                    return Err(Error::argument(
                        "PrivPassword",
                        "PrivPassword is at least 8 characters in length",
                    ));
                }
            }

            let security_engine_id = self
                .security_engine_id
                .as_deref()
                .map(parse_engine_id)
                .transpose()?
                .map(Bytes::from);
            let context_engine_id = self
                .context_engine_id
                .as_deref()
                .map(parse_engine_id)
                .transpose()?
                .map(Bytes::from);

            Some(UsmConfig {
                username,
                auth: self.auth,
                privacy: self.privacy,
                security_engine_id,
                context_engine_id,
                context_name: self.context_name,
            })
        } else {
            if self.username.is_some() || self.auth.is_some() || self.privacy.is_some() {
                return Err(Error::argument(
                    self.version,
                    "USM credentials require SNMPv3",
                ));
            }
            None
        };

        Ok(ClientConfig {
            version: self.version,
            network: self.network,
            address: self.address,
            timeout: self.timeout,
            retries: self.retries,
            message_max_size: self.message_max_size,
            community: self.community,
            security,
        })
    }

    /// Validate, connect the UDP socket and open the client (running v3
    /// engine discovery where applicable).
    pub async fn connect(self) -> Result<Client<UdpTransport>> {
        let config = self.build_config()?;
        let transport = UdpTransport::connect(&config.network, &config.address).await?;
        Client::open(transport, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v3_base() -> ClientBuilder {
        ClientBuilder::new("127.0.0.1:161")
            .version(Version::V3)
            .username(&b"usr"[..])
    }

    #[test]
    fn defaults() {
        let config = ClientBuilder::new("127.0.0.1:161")
            .community(&b"public"[..])
            .build_config()
            .unwrap();

        assert_eq!(config.version, Version::V2c);
        assert_eq!(config.network, "udp");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retries, 0);
        assert_eq!(config.message_max_size, 1400);
        assert!(config.security.is_none());
    }

    #[test]
    fn message_max_size_range() {
        assert!(ClientBuilder::new("h:1").message_max_size(483).build_config().is_err());
        assert!(ClientBuilder::new("h:1").message_max_size(484).build_config().is_ok());
        assert!(ClientBuilder::new("h:1").message_max_size(i32::MAX).build_config().is_ok());
    }

    #[test]
    fn empty_address_rejected() {
        assert!(ClientBuilder::new("").build_config().is_err());
    }

    #[test]
    fn v3_requires_username() {
        let err = ClientBuilder::new("h:1")
            .version(Version::V3)
            .build_config()
            .unwrap_err();
        assert!(matches!(err, Error::Argument { .. }));
    }

    #[test]
    fn username_length_bounds() {
        assert!(v3_base().build_config().is_ok());
        assert!(
            ClientBuilder::new("h:1")
                .version(Version::V3)
                .username(Bytes::from(vec![b'a'; 32]))
                .build_config()
                .is_ok()
        );
        assert!(
            ClientBuilder::new("h:1")
                .version(Version::V3)
                .username(Bytes::from(vec![b'a'; 33]))
                .build_config()
                .is_err()
        );
        assert!(
            ClientBuilder::new("h:1")
                .version(Version::V3)
                .username(Bytes::new())
                .build_config()
                .is_err()
        );
    }

    #[test]
    fn password_minimums() {
        assert!(
            v3_base()
                .auth(AuthProtocol::Sha1, "short")
                .build_config()
                .is_err()
        );
        assert!(
            v3_base()
                .auth(AuthProtocol::Sha1, "12345678")
                .build_config()
                .is_ok()
        );
        assert!(
            v3_base()
                .auth(AuthProtocol::Sha1, "longenough")
                .privacy(PrivProtocol::Aes128, "short")
                .build_config()
                .is_err()
        );
    }

    #[test]
    fn privacy_requires_auth() {
        let err = v3_base()
            .privacy(PrivProtocol::Aes128, "longenough")
            .build_config()
            .unwrap_err();
        assert!(matches!(err, Error::Argument { .. }));
    }

    #[test]
    fn engine_id_parsing() {
        // Odd-length hex is rejected
        let config = v3_base()
            .security_engine_id("0x80001f8880e9630000d61ff")
            .build_config();
        assert!(config.is_err());

        let config = v3_base()
            .security_engine_id("0x80001f8880e9630000d61ff4")
            .build_config()
            .unwrap();
        let usm = config.security.unwrap();
        assert_eq!(usm.security_engine_id.unwrap().len(), 12);
    }

    #[test]
    fn usm_on_v2c_rejected() {
        let err = ClientBuilder::new("h:1")
            .username(&b"usr"[..])
            .build_config()
            .unwrap_err();
        assert!(matches!(err, Error::Argument { .. }));
    }

    #[test]
    fn security_level_from_credentials() {
        let config = v3_base()
            .auth(AuthProtocol::Md5, "maplesyrup")
            .privacy(PrivProtocol::Des, "maplesyrup")
            .build_config()
            .unwrap();
        let usm = config.security.unwrap();
        assert_eq!(
            usm.security_level(),
            crate::message::SecurityLevel::AuthPriv
        );
    }
}
