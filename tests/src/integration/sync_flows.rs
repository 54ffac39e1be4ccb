//! # Sync Flows
//!
//! `info` on connect → `request:blocks` for every tracked chain that is
//! behind → one or more `response:blocks` → pending cache committed.

use super::harness::{decode_all, handshake, TestNode};
use node_runtime::FileStorage;
use qc_01_ledger::LedgerRegistry;
use qc_02_gossip::{Behavior, GossipConfig, Peer, RequestBlocks};
use std::sync::Arc;

// =============================================================================
// Block sync
// =============================================================================

#[test]
fn test_follower_syncs_full_chain() {
    let owner = TestNode::new("owner");
    let follower = TestNode::new("follower");
    let chain_id = owner.create_chain(b"genesis");
    let created = owner.extend(&chain_id, 4, 32);

    follower.track(&chain_id);
    let transcript = handshake(&owner, &follower);

    assert!(transcript.errors.is_empty(), "{:?}", transcript.errors);
    assert_eq!(transcript.count_of("request:blocks"), 1);
    assert_eq!(follower.count(&chain_id), 5);
    assert_eq!(follower.block(&chain_id, 4).as_ref(), created.last());
    assert_eq!(follower.block(&chain_id, 0), owner.block(&chain_id, 0));
}

#[test]
fn test_follower_requests_only_missing_heights() {
    let owner = TestNode::new("owner");
    let follower = TestNode::new("follower");
    let chain_id = owner.create_chain(b"genesis");
    owner.extend(&chain_id, 2, 16);
    follower.track(&chain_id);
    handshake(&owner, &follower);
    assert_eq!(follower.count(&chain_id), 3);

    owner.extend(&chain_id, 2, 16);
    let replies = follower.gossip.handle_message("owner", &owner.greeting());

    assert_eq!(
        decode_all(&replies),
        vec![Behavior::RequestBlocks(RequestBlocks {
            chain_id: chain_id.clone(),
            from: 3,
            to: 4,
        })]
    );
}

#[test]
fn test_in_sync_nodes_exchange_only_info() {
    let owner = TestNode::new("owner");
    let follower = TestNode::new("follower");
    let chain_id = owner.create_chain(b"genesis");
    owner.extend(&chain_id, 3, 16);
    follower.track(&chain_id);
    handshake(&owner, &follower);

    let transcript = handshake(&owner, &follower);

    assert_eq!(transcript.frames, 2);
    assert_eq!(transcript.count_of("info"), 2);
}

#[test]
fn test_only_tracked_chains_are_synced() {
    let owner = TestNode::new("owner");
    let follower = TestNode::new("follower");
    let wanted = owner.create_chain(b"wanted");
    let ignored = owner.create_chain(b"ignored");
    owner.extend(&wanted, 2, 16);
    owner.extend(&ignored, 2, 16);

    follower.track(&wanted);
    handshake(&owner, &follower);

    assert_eq!(follower.count(&wanted), 3);
    assert!(follower.ledger.chain(&ignored).unwrap().is_none());
}

#[test]
fn test_owner_behind_its_follower_does_not_request() {
    let owner = TestNode::new("owner");
    let follower = TestNode::new("follower");
    let chain_id = owner.create_chain(b"genesis");
    owner.extend(&chain_id, 3, 16);
    follower.track(&chain_id);
    handshake(&owner, &follower);

    let replies = owner.gossip.handle_message("follower", &follower.greeting());
    assert!(replies.is_empty());
}

// =============================================================================
// Batching
// =============================================================================

#[test]
fn test_divided_response_commits_every_batch() {
    let config = GossipConfig {
        max_message_size: 4 * 1024,
        ..GossipConfig::default()
    };
    let owner = TestNode::with_config("owner", config);
    let follower = TestNode::new("follower");
    let chain_id = owner.create_chain(b"genesis");
    owner.extend(&chain_id, 20, 600);

    follower.track(&chain_id);
    let transcript = handshake(&owner, &follower);

    assert!(transcript.count_of("response:blocks") > 1);
    assert!(transcript.errors.is_empty(), "{:?}", transcript.errors);
    assert_eq!(follower.count(&chain_id), 21);
    assert_eq!(follower.block(&chain_id, 20), owner.block(&chain_id, 20));
}

#[test]
fn test_undivided_response_is_single_message() {
    let config = GossipConfig {
        division: false,
        max_message_size: 1024,
        ..GossipConfig::default()
    };
    let owner = TestNode::with_config("owner", config);
    let follower = TestNode::new("follower");
    let chain_id = owner.create_chain(b"genesis");
    owner.extend(&chain_id, 10, 400);

    follower.track(&chain_id);
    let transcript = handshake(&owner, &follower);

    assert_eq!(transcript.count_of("response:blocks"), 1);
    assert_eq!(follower.count(&chain_id), 11);
}

// =============================================================================
// Peer sync
// =============================================================================

#[test]
fn test_peer_sync_learns_discovered_peers() {
    let seed = TestNode::new("seed");
    seed.peers.save_peer(&Peer::connected("ws://10.0.0.1:32767")).unwrap();
    seed.peers.save_peer(&Peer::connected("ws://10.0.0.2:32767")).unwrap();

    let newcomer = TestNode::with_config(
        "newcomer",
        GossipConfig {
            peer_sync: true,
            ..GossipConfig::default()
        },
    );

    let transcript = handshake(&seed, &newcomer);

    assert_eq!(transcript.count_of("request:peers"), 1);
    assert_eq!(newcomer.peers.count_of_peers().unwrap(), 2);
    let learned = newcomer.peers.get_peer("ws://10.0.0.1:32767").unwrap().unwrap();
    assert_eq!(learned.last_seen, 0);
    assert_eq!(seed.peers.count_of_peers().unwrap(), 2);
}

#[test]
fn test_peer_sync_disabled_by_default() {
    let seed = TestNode::new("seed");
    seed.peers.save_peer(&Peer::connected("ws://10.0.0.1:32767")).unwrap();
    let newcomer = TestNode::new("newcomer");

    let transcript = handshake(&seed, &newcomer);

    assert_eq!(transcript.count_of("request:peers"), 0);
    assert_eq!(newcomer.peers.count_of_peers().unwrap(), 0);
}

// =============================================================================
// Persistence
// =============================================================================

#[test]
fn test_file_backed_follower_keeps_synced_chain() {
    let dir = tempfile::tempdir().unwrap();
    let owner = TestNode::new("owner");
    let chain_id = owner.create_chain(b"genesis");
    owner.extend(&chain_id, 5, 64);

    {
        let storage = Arc::new(FileStorage::open(dir.path()).unwrap());
        let follower =
            TestNode::with_stores("follower", storage.clone(), storage, GossipConfig::default());
        follower.track(&chain_id);
        handshake(&owner, &follower);
        assert_eq!(follower.count(&chain_id), 6);
    }

    let reopened = LedgerRegistry::new(Arc::new(FileStorage::open(dir.path()).unwrap()));
    assert_eq!(reopened.load_all().unwrap(), 1);
    assert_eq!(reopened.summary().unwrap().get(&chain_id), Some(&6));

    let chain = reopened.chain(&chain_id).unwrap().unwrap();
    let chain = chain.lock();
    assert!(!chain.is_owner());
    assert_eq!(chain.get_block(5).unwrap(), owner.block(&chain_id, 5));
}
