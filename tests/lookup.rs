//! Iterative lookups and bucket eviction over an in-process [Testnet].
//!
//! Run with: cargo test --test lookup

use kadnode::{Error, Id, Testnet, MAX_BUCKET_SIZE_K};
use std::{
    thread,
    time::{Duration, Instant},
};

/// Poll until `condition` holds or two seconds pass.
fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();

    while start.elapsed() < Duration::from_secs(2) {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }

    false
}

/// Ids with a single bit set in the first byte, `0x80 >> i`, so every
/// next node is closer to the last one.
fn chain_ids(count: usize) -> Vec<Id> {
    (0..count)
        .map(|i| {
            let mut bytes = [0; 16];
            bytes[0] = 0x80 >> i;
            Id(bytes)
        })
        .collect()
}

/// Nodes only know their neighbours.
fn chain(count: usize) -> Testnet {
    let testnet = Testnet::with_ids(&chain_ids(count)).unwrap();

    for i in 0..count - 1 {
        testnet.connect(i, i + 1);
        testnet.connect(i + 1, i);
    }

    testnet
}

#[test]
fn lookup_converges_along_a_chain() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();

    let testnet = chain(8);
    let target = *testnet.nodes[7].id();

    let found = testnet.nodes[0].find(target).unwrap();

    assert_eq!(found.id, target);
    assert_eq!(found.port, testnet.nodes[7].local().port);

    // The lookup taught the origin about the target.
    assert_eq!(testnet.nodes[0].find_one(target).unwrap().id, target);
}

#[test]
fn concurrent_lookups() {
    let testnet = chain(8);
    let target = *testnet.nodes[7].id();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let dht = testnet.nodes[0].clone();
            thread::spawn(move || dht.find(target))
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap().id, target);
    }
}

#[test]
fn lookup_of_unknown_target_returns_closest() {
    let testnet = chain(4);

    let mut bytes = [0; 16];
    bytes[0] = 0x10;
    bytes[15] = 1;
    let target = Id(bytes);

    // 0x10 is the last node, and the closest one to 0x10..01
    let found = testnet.nodes[0].find(target).unwrap();
    assert_eq!(found.id, *testnet.nodes[3].id());
}

#[test]
fn lookup_from_isolated_node() {
    let testnet = Testnet::new(2).unwrap();

    assert!(matches!(
        testnet.nodes[0].find(*testnet.nodes[1].id()),
        Err(Error::NotFound)
    ));
}

#[test]
fn lookup_stops_at_dead_node() {
    let testnet = Testnet::with_ids(&chain_ids(4)).unwrap();
    let target = *testnet.nodes[3].id();

    testnet.kill(1);

    testnet.connect(0, 1);
    testnet.connect(2, 3);

    // Node 1 can not answer, so node 0 never learns anything closer.
    let found = testnet.nodes[0].find(target).unwrap();
    assert_eq!(found.id, *testnet.nodes[1].id());
}

#[test]
fn bootstrap_from_seed() {
    let testnet = Testnet::bootstrapped(4).unwrap();
    let seed = testnet.nodes[0].local().clone();

    let address = testnet.address(0).unwrap();
    assert_eq!(*address.ip(), seed.ip);
    assert_eq!(address.port() as u32, seed.port);

    // Every node learns the seed's real id from its pong, and the seed
    // learns every node from their pings.
    assert!(eventually(|| {
        testnet.nodes[1..]
            .iter()
            .all(|dht| dht.find_one(seed.id).is_ok_and(|node| node.id == seed.id))
    }));
    assert!(eventually(|| {
        testnet.nodes[0].info().unwrap().routing_table_size() == 3
    }));

    let target = *testnet.nodes[1].id();
    assert_eq!(testnet.nodes[3].find(target).unwrap().id, target);
}

/// Node 0 has the zero id, nodes `1..=k+1` all fall into its partition 128.
fn crowded_bucket() -> Testnet {
    let ids: Vec<Id> = (0..=MAX_BUCKET_SIZE_K + 1)
        .map(|i| {
            let mut bytes = [0; 16];
            if i > 0 {
                bytes[0] = 0x80;
                bytes[15] = i as u8;
            }
            Id(bytes)
        })
        .collect();

    let testnet = Testnet::with_ids(&ids).unwrap();

    for i in 1..=MAX_BUCKET_SIZE_K {
        testnet.connect(0, i);
    }

    let local = &testnet.nodes[0];
    assert!(eventually(|| {
        local.info().unwrap().routing_table_size() == MAX_BUCKET_SIZE_K
    }));

    testnet
}

#[test]
fn full_bucket_evicts_dead_node() {
    let testnet = crowded_bucket();
    let local = &testnet.nodes[0];
    let candidate = testnet.nodes[MAX_BUCKET_SIZE_K + 1].local().clone();

    for i in 1..=MAX_BUCKET_SIZE_K {
        testnet.kill(i);
    }

    testnet.connect(0, MAX_BUCKET_SIZE_K + 1);

    assert!(eventually(|| {
        local.find_local(candidate.id, false).unwrap().contains(&candidate)
    }));
    assert_eq!(
        local.info().unwrap().buckets().get(&128),
        Some(&MAX_BUCKET_SIZE_K)
    );
}

#[test]
fn full_bucket_keeps_live_node() {
    let testnet = crowded_bucket();
    let local = &testnet.nodes[0];
    let candidate = testnet.nodes[MAX_BUCKET_SIZE_K + 1].local().clone();

    let bucket: Vec<Id> = testnet.nodes[1..=MAX_BUCKET_SIZE_K]
        .iter()
        .map(|dht| *dht.id())
        .collect();

    testnet.connect(0, MAX_BUCKET_SIZE_K + 1);

    // Settled once no contact in the bucket is waiting on a liveness ping
    // anymore, the first check already runs after the candidate was admitted.
    assert!(eventually(|| {
        bucket.iter().all(|id| {
            local
                .find_local(*id, false)
                .unwrap()
                .iter()
                .any(|node| node.id == *id && !node.awaiting_probe())
        })
    }));

    assert!(!local
        .find_local(candidate.id, false)
        .unwrap()
        .iter()
        .any(|node| node.id == candidate.id));
    assert_eq!(local.info().unwrap().routing_table_size(), MAX_BUCKET_SIZE_K);
}
