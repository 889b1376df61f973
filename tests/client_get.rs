//! GET/GETNEXT/SET against the mock agent.

mod common;

use common::{MockAgent, system_mib};
use snmpkit::{Client, Error, Value, VarBind, oid};
use std::time::Duration;

/// A v2c GetRequest for sysDescr.0 returns the expected octet string.
#[tokio::test]
async fn get_returns_sys_descr() {
    let agent = MockAgent::start(system_mib()).await;

    let client = Client::builder(agent.addr().to_string())
        .community(&b"public"[..])
        .connect()
        .await
        .unwrap();

    let response = client.get(&[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]).await.unwrap();

    assert_eq!(response.error_status, 0);
    assert_eq!(response.varbinds.len(), 1);
    assert_eq!(response.varbinds[0].oid, oid!(1, 3, 6, 1, 2, 1, 1, 1, 0));
    assert_eq!(response.varbinds[0].value, Value::from("linux"));
}

/// Multiple OIDs in one request come back in order.
#[tokio::test]
async fn get_multiple_oids() {
    let agent = MockAgent::start(system_mib()).await;

    let client = Client::builder(agent.addr().to_string())
        .community(&b"public"[..])
        .connect()
        .await
        .unwrap();

    let response = client
        .get(&[
            oid!(1, 3, 6, 1, 2, 1, 1, 1, 0),
            oid!(1, 3, 6, 1, 2, 1, 1, 5, 0),
        ])
        .await
        .unwrap();

    assert_eq!(response.varbinds.len(), 2);
    assert_eq!(response.varbinds[0].value, Value::from("linux"));
    assert_eq!(response.varbinds[1].value, Value::from("test-agent"));
}

/// A missing OID yields the NoSuchInstance sentinel, not an error.
#[tokio::test]
async fn get_missing_oid_is_sentinel() {
    let agent = MockAgent::start(system_mib()).await;

    let client = Client::builder(agent.addr().to_string())
        .community(&b"public"[..])
        .connect()
        .await
        .unwrap();

    let response = client.get(&[oid!(1, 3, 6, 1, 99, 1, 0)]).await.unwrap();

    assert_eq!(response.error_status, 0);
    assert_eq!(response.varbinds[0].value, Value::NoSuchInstance);
}

/// GetNextRequest walks to the lexicographic successor.
#[tokio::test]
async fn get_next_returns_successor() {
    let agent = MockAgent::start(system_mib()).await;

    let client = Client::builder(agent.addr().to_string())
        .community(&b"public"[..])
        .connect()
        .await
        .unwrap();

    let response = client.get_next(&[oid!(1, 3, 6, 1, 2, 1, 1)]).await.unwrap();
    assert_eq!(response.varbinds[0].oid, oid!(1, 3, 6, 1, 2, 1, 1, 1, 0));

    // Past the last object the agent answers endOfMibView
    let response = client.get_next(&[oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)]).await.unwrap();
    assert_eq!(response.varbinds[0].value, Value::EndOfMibView);
}

/// SetRequest round-trips the varbinds.
#[tokio::test]
async fn set_echoes_varbinds() {
    let agent = MockAgent::builder()
        .mib(system_mib())
        .community(b"private")
        .start()
        .await;

    let client = Client::builder(agent.addr().to_string())
        .community(&b"private"[..])
        .connect()
        .await
        .unwrap();

    let response = client
        .set(vec![VarBind::new(
            oid!(1, 3, 6, 1, 2, 1, 1, 5, 0),
            Value::from("renamed"),
        )])
        .await
        .unwrap();

    assert_eq!(response.error_status, 0);
    assert_eq!(response.varbinds[0].value, Value::from("renamed"));
}

/// A wrong community string gets no answer and times out.
#[tokio::test]
async fn wrong_community_times_out() {
    let agent = MockAgent::start(system_mib()).await;

    let client = Client::builder(agent.addr().to_string())
        .community(&b"wrong"[..])
        .timeout(Duration::from_millis(100))
        .connect()
        .await
        .unwrap();

    let err = client.get(&[oid!(1, 3, 6, 1)]).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));
}

/// GetBulk on a v1 client fails fast before any I/O.
#[tokio::test]
async fn get_bulk_rejected_on_v1() {
    let agent = MockAgent::start(system_mib()).await;

    let client = Client::builder(agent.addr().to_string())
        .version(snmpkit::Version::V1)
        .community(&b"public"[..])
        .connect()
        .await
        .unwrap();

    let err = client.get_bulk(&[oid!(1, 3, 6)], 0, 10).await.unwrap_err();
    assert!(matches!(err, Error::Argument { .. }));
}

/// Negative bulk arguments fail fast.
#[tokio::test]
async fn get_bulk_argument_ranges() {
    let agent = MockAgent::start(system_mib()).await;

    let client = Client::builder(agent.addr().to_string())
        .community(&b"public"[..])
        .connect()
        .await
        .unwrap();

    assert!(matches!(
        client.get_bulk(&[oid!(1, 3, 6)], -1, 10).await.unwrap_err(),
        Error::Argument { .. }
    ));
    assert!(matches!(
        client.get_bulk(&[oid!(1, 3, 6)], 0, -1).await.unwrap_err(),
        Error::Argument { .. }
    ));
}
