//! GetBulkWalk subtree retrieval against the mock agent.

mod common;

use common::{MockAgent, if_descr_mib, system_mib};
use snmpkit::{Client, Value, oid};
use std::collections::BTreeMap;

async fn client_for(agent: &MockAgent) -> Client {
    Client::builder(agent.addr().to_string())
        .community(&b"public"[..])
        .connect()
        .await
        .unwrap()
}

/// Walking ifDescr returns exactly the four entries, sorted, whatever the
/// max-repetitions batch size.
#[tokio::test]
async fn walk_completeness_across_batch_sizes() {
    let agent = MockAgent::start(if_descr_mib()).await;
    let client = client_for(&agent).await;

    for max_repetitions in [1, 5, 100] {
        let response = client
            .get_bulk_walk(&[oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2)], 0, max_repetitions)
            .await
            .unwrap();

        assert_eq!(response.error_status, 0, "max_repetitions={}", max_repetitions);
        assert_eq!(response.varbinds.len(), 4, "max_repetitions={}", max_repetitions);

        let descrs: Vec<_> = response
            .varbinds
            .iter()
            .map(|vb| vb.value.as_str().unwrap().to_string())
            .collect();
        assert_eq!(descrs, ["lo", "eth0", "eth1", "wlan0"]);

        // Sorted lexicographically by OID
        let mut oids: Vec<_> = response.varbinds.iter().map(|vb| vb.oid.clone()).collect();
        let sorted = {
            let mut s = oids.clone();
            s.sort();
            s
        };
        assert_eq!(oids, sorted);
        oids.dedup();
        assert_eq!(oids.len(), 4);
    }
}

/// Four ifDescr entries retrieved three at a time: the final short batch
/// terminates the subtree.
#[tokio::test]
async fn walk_if_descr_in_threes() {
    let agent = MockAgent::start(if_descr_mib()).await;
    let client = client_for(&agent).await;

    let response = client
        .get_bulk_walk(&[oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2)], 0, 3)
        .await
        .unwrap();

    assert_eq!(response.varbinds.len(), 4);
}

/// Two disjoint subtrees walked in one call.
#[tokio::test]
async fn walk_multiple_subtrees() {
    let mut mib = system_mib();
    mib.extend(if_descr_mib());
    let agent = MockAgent::start(mib).await;
    let client = client_for(&agent).await;

    let response = client
        .get_bulk_walk(
            &[oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2), oid!(1, 3, 6, 1, 2, 1, 1)],
            0,
            2,
        )
        .await
        .unwrap();

    // 3 system entries + 4 ifDescr entries
    assert_eq!(response.varbinds.len(), 7);
}

/// Overlapping roots collapse; the subtree is fetched once.
#[tokio::test]
async fn walk_overlapping_roots_deduplicated() {
    let agent = MockAgent::start(if_descr_mib()).await;
    let client = client_for(&agent).await;

    let response = client
        .get_bulk_walk(
            &[
                oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2),
                oid!(1, 3, 6, 1, 2, 1, 2, 2),
            ],
            0,
            5,
        )
        .await
        .unwrap();

    assert_eq!(response.varbinds.len(), 4);
}

/// Non-repeaters are fetched once and lead the result list.
#[tokio::test]
async fn walk_with_non_repeater() {
    let mut mib = system_mib();
    mib.extend(if_descr_mib());
    let agent = MockAgent::start(mib).await;
    let client = client_for(&agent).await;

    let response = client
        .get_bulk_walk(
            &[oid!(1, 3, 6, 1, 2, 1, 1, 1), oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2)],
            1,
            3,
        )
        .await
        .unwrap();

    // GETNEXT of 1.3.6.1.2.1.1.1 is sysDescr.0, then the four ifDescr rows
    assert_eq!(response.varbinds.len(), 5);
    assert_eq!(response.varbinds[0].oid, oid!(1, 3, 6, 1, 2, 1, 1, 1, 0));
    assert_eq!(response.varbinds[0].value, Value::from("linux"));
}

/// An empty subtree produces an empty result, not an error.
#[tokio::test]
async fn walk_empty_subtree() {
    let agent = MockAgent::start(system_mib()).await;
    let client = client_for(&agent).await;

    let response = client
        .get_bulk_walk(&[oid!(1, 3, 6, 1, 9, 9)], 0, 10)
        .await
        .unwrap();

    assert!(response.varbinds.is_empty());
}

/// A large table walks to completion without duplicates.
#[tokio::test]
async fn walk_large_table() {
    let mut mib = BTreeMap::new();
    for i in 0..250u32 {
        mib.insert(oid!(1, 3, 6, 1, 4, 1, 4242, 1, i), Value::Counter32(i));
    }
    let agent = MockAgent::start(mib).await;
    let client = client_for(&agent).await;

    let response = client
        .get_bulk_walk(&[oid!(1, 3, 6, 1, 4, 1, 4242)], 0, 25)
        .await
        .unwrap();

    assert_eq!(response.varbinds.len(), 250);
    for (i, vb) in response.varbinds.iter().enumerate() {
        assert_eq!(vb.value, Value::Counter32(i as u32));
    }
}

/// Out-of-range walk arguments fail fast.
#[tokio::test]
async fn walk_argument_validation() {
    let agent = MockAgent::start(system_mib()).await;
    let client = client_for(&agent).await;

    assert!(
        client
            .get_bulk_walk(&[oid!(1, 3, 6)], 2, 10)
            .await
            .is_err()
    );
    assert!(
        client
            .get_bulk_walk(&[oid!(1, 3, 6)], -1, 10)
            .await
            .is_err()
    );
}
