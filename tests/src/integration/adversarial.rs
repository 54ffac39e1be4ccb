//! # Adversarial Inputs
//!
//! Forged, tampered and forked blocks and malformed requests. Every case
//! must be answered with an error reply and leave the receiving ledger as it
//! was.

use super::harness::{handshake, single_error, TestNode};
use qc_01_ledger::Block;
use qc_02_gossip::{
    new_message_id, Behavior, BroadcastBlock, Message, RequestBlocks, ResponseBlocks,
    ResponsePeers,
};
use shared_crypto::KeyPair;

const SOME_TIME: u64 = 1_700_000_000;

fn broadcast_frame(block: &Block) -> Vec<u8> {
    let id = new_message_id();
    let broadcast = BroadcastBlock::new(id.clone(), block).unwrap();
    Message::with_id(id, &Behavior::BroadcastBlock(broadcast))
        .unwrap()
        .encode()
        .unwrap()
}

fn frame(behavior: Behavior) -> Vec<u8> {
    Message::new(&behavior).unwrap().encode().unwrap()
}

fn response_frame(blocks: &[Block]) -> Vec<u8> {
    frame(Behavior::ResponseBlocks(
        ResponseBlocks::from_blocks(blocks).unwrap(),
    ))
}

/// Owner with `count` blocks and a follower synced to all of them.
fn synced_pair(count: usize) -> (TestNode, TestNode, String) {
    let owner = TestNode::new("owner");
    let follower = TestNode::new("follower");
    let chain_id = owner.create_chain(b"genesis");
    owner.extend(&chain_id, count - 1, 16);
    follower.track(&chain_id);
    handshake(&owner, &follower);
    assert_eq!(follower.count(&chain_id), count as u64);
    (owner, follower, chain_id)
}

fn owner_key(node: &TestNode, chain_id: &str) -> KeyPair {
    let wif = node.ledger.chain(chain_id).unwrap().unwrap().lock().wif().unwrap();
    KeyPair::from_wif(&wif).unwrap()
}

// =============================================================================
// Forged signers
// =============================================================================

#[test]
fn test_block_signed_by_stranger_is_refused() {
    let (owner, mut follower, chain_id) = synced_pair(1);
    let tip = owner.block(&chain_id, 0).unwrap();

    let stranger = KeyPair::generate();
    let forged = Block::sign_new(&stranger, 1, SOME_TIME, tip.hash, b"mine now".to_vec()).unwrap();

    let reply = single_error(&follower.gossip.handle_message("owner", &broadcast_frame(&forged)));
    assert_eq!(reply.code, "ChainNotAcceptedError");

    let reply = single_error(&follower.gossip.handle_message("owner", &response_frame(&[forged])));
    assert_eq!(reply.code, "ChainNotAcceptedError");

    assert_eq!(follower.count(&chain_id), 1);
    assert!(follower.take_broadcasts().is_empty());
}

#[test]
fn test_rehashed_payload_does_not_recover_owner() {
    let (owner, follower, chain_id) = synced_pair(1);
    owner.extend(&chain_id, 1, 16);
    let mut block = owner.block(&chain_id, 1).unwrap();
    block.payload = b"rewritten".to_vec();
    block.hash = block.compute_hash().unwrap();

    let reply = single_error(&follower.gossip.handle_message("owner", &broadcast_frame(&block)));
    assert!(
        matches!(reply.code.as_str(), "ChainNotAcceptedError" | "InvalidBlockError"),
        "unexpected {reply:?}"
    );
    assert_eq!(follower.count(&chain_id), 1);
}

// =============================================================================
// Tampering
// =============================================================================

#[test]
fn test_tampered_broadcast_is_invalid() {
    let (owner, mut follower, chain_id) = synced_pair(1);
    owner.extend(&chain_id, 1, 16);
    let mut block = owner.block(&chain_id, 1).unwrap();
    block.payload = b"tampered".to_vec();
    let frame = broadcast_frame(&block);
    let id = Message::decode(&frame).unwrap().id;

    let reply = single_error(&follower.gossip.handle_message("owner", &frame));
    assert_eq!(reply.code, "InvalidBlockError");
    assert_eq!(follower.count(&chain_id), 1);
    assert!(follower.take_broadcasts().is_empty());
    assert!(!follower.gossip.memo().contains(&id));
}

#[test]
fn test_tampered_response_is_invalid_and_sync_recovers() {
    let owner = TestNode::new("owner");
    let follower = TestNode::new("follower");
    let chain_id = owner.create_chain(b"genesis");
    owner.extend(&chain_id, 3, 16);
    follower.track(&chain_id);

    let mut blocks: Vec<Block> = (0..4).filter_map(|h| owner.block(&chain_id, h)).collect();
    blocks[2].payload = b"tampered".to_vec();

    let reply = single_error(&follower.gossip.handle_message("owner", &response_frame(&blocks)));
    assert_eq!(reply.code, "InvalidBlockError");
    assert_eq!(follower.count(&chain_id), 0);
    let mirror = follower.ledger.chain(&chain_id).unwrap().unwrap();
    assert_eq!(mirror.lock().pending_len(), 0);

    let transcript = handshake(&owner, &follower);
    assert!(transcript.errors.is_empty(), "{:?}", transcript.errors);
    assert_eq!(follower.count(&chain_id), 4);
    assert_eq!(follower.block(&chain_id, 2), owner.block(&chain_id, 2));
}

#[test]
fn test_undecodable_block_json() {
    let (_owner, follower, _chain_id) = synced_pair(1);
    let broken = frame(Behavior::ResponseBlocks(ResponseBlocks {
        blocks: vec![serde_json::json!({"height": -1, "payload": 7})],
        decoded: Vec::new(),
    }));

    let reply = single_error(&follower.gossip.handle_message("owner", &broken));
    assert_eq!(reply.code, "JSONDecodeError");
}

// =============================================================================
// Forks
// =============================================================================

#[test]
fn test_fork_at_existing_height_is_rejected() {
    let (owner, mut follower, chain_id) = synced_pair(3);
    let key = owner_key(&owner, &chain_id);
    let genesis = owner.block(&chain_id, 0).unwrap();
    let original = follower.block(&chain_id, 1).unwrap();

    let fork = Block::sign_new(&key, 1, SOME_TIME, genesis.hash, b"other history".to_vec()).unwrap();

    let reply = single_error(&follower.gossip.handle_message("owner", &broadcast_frame(&fork)));
    assert_eq!(reply.code, "ForkError");

    let reply = single_error(&follower.gossip.handle_message("owner", &response_frame(&[fork])));
    assert_eq!(reply.code, "ForkError");

    assert_eq!(follower.count(&chain_id), 3);
    assert_eq!(follower.block(&chain_id, 1), Some(original));
    assert!(follower.take_broadcasts().is_empty());
}

#[test]
fn test_wrong_parent_at_next_height_is_dangled() {
    let (owner, follower, chain_id) = synced_pair(3);
    let key = owner_key(&owner, &chain_id);
    let genesis = owner.block(&chain_id, 0).unwrap();

    let stray = Block::sign_new(&key, 3, SOME_TIME, genesis.hash, b"wrong parent".to_vec()).unwrap();

    let reply = single_error(&follower.gossip.handle_message("owner", &broadcast_frame(&stray)));
    assert_eq!(reply.code, "DangledBlockError");
    assert_eq!(follower.count(&chain_id), 3);
}

// =============================================================================
// Malformed requests
// =============================================================================

#[test]
fn test_incompatible_protocol_version() {
    let (owner, follower, _chain_id) = synced_pair(1);
    let mut info = owner.gossip.info().unwrap();
    info.version = "1.0".to_string();

    let reply = single_error(&follower.gossip.handle_message("owner", &frame(Behavior::Info(info))));
    assert_eq!(reply.code, "IncompatibleProtocolVersionError");
}

#[test]
fn test_garbage_frame() {
    let node = TestNode::new("node");
    let reply = single_error(&node.gossip.handle_message("peer", b"\x00\x01 not json"));
    assert_eq!(reply.code, "InvalidMessageError");
}

#[test]
fn test_request_beyond_tip() {
    let (owner, _follower, chain_id) = synced_pair(2);
    let request = frame(Behavior::RequestBlocks(RequestBlocks {
        chain_id,
        from: 10,
        to: 12,
    }));

    let reply = single_error(&owner.gossip.handle_message("follower", &request));
    assert_eq!(reply.code, "BadRequestError");
}

#[test]
fn test_non_websocket_peer_urls_are_not_saved() {
    let node = TestNode::new("node");
    let response = frame(Behavior::ResponsePeers(ResponsePeers {
        peers: vec!["ws://10.0.0.1:32767".into(), "http://10.0.0.2".into()],
    }));

    let reply = single_error(&node.gossip.handle_message("peer", &response));
    assert_eq!(reply.code, "InvalidURLError");
    assert_eq!(node.peers.count_of_peers().unwrap(), 0);
}
