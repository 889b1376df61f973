//! # snmpkit
//!
//! Async SNMP v1/v2c/v3 client and trap-receiver toolkit.
//!
//! - Full SNMPv1, v2c and v3 (USM) support
//! - Async API built on Tokio, one connected socket per client
//! - BER codec for every SNMP type including the response exceptions
//! - GetBulk-driven subtree walks with multi-OID cursor tracking
//! - Trap server with per-sender security entries
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use snmpkit::{Client, oid};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), snmpkit::Error> {
//!     let client = Client::builder("192.0.2.1:161")
//!         .community(&b"public"[..])
//!         .timeout(Duration::from_secs(5))
//!         .connect()
//!         .await?;
//!
//!     let response = client.get(&[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]).await?;
//!     for vb in &response.varbinds {
//!         println!("{}", vb);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## SNMPv3
//!
//! ```rust,no_run
//! use snmpkit::{AuthProtocol, Client, PrivProtocol, Version, oid};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), snmpkit::Error> {
//!     let client = Client::builder("192.0.2.1:161")
//!         .version(Version::V3)
//!         .username(&b"admin"[..])
//!         .auth(AuthProtocol::Sha1, "authpass123")
//!         .privacy(PrivProtocol::Aes128, "privpass123")
//!         .connect()
//!         .await?;
//!
//!     let response = client.get(&[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]).await?;
//!     println!("sysDescr: {}", response.varbinds[0].value);
//!     Ok(())
//! }
//! ```

pub mod ber;
pub mod client;
pub mod engine;
pub mod error;
pub mod message;
pub mod oid;
pub mod pdu;
pub mod server;
pub mod transport;
pub mod usm;
pub mod util;
pub mod value;
pub mod varbind;
pub mod version;

pub use client::{Client, ClientBuilder, ClientConfig, UsmConfig};
pub use error::{
    AuthErrorKind, CryptoErrorKind, DecodeErrorKind, EncodeErrorKind, Error, ErrorStatus,
    OidErrorKind, Result,
};
pub use message::SecurityLevel;
pub use oid::Oid;
pub use pdu::{GenericTrap, Pdu, PduType, TrapV1Pdu};
pub use server::{SecurityEntry, TrapEvent, TrapListener, TrapMessage, TrapServer, TrapServerBuilder};
pub use transport::{Transport, UdpTransport};
pub use usm::{AuthProtocol, LocalizedKey, PrivKey, PrivProtocol};
pub use value::Value;
pub use varbind::VarBind;
pub use version::Version;
