//! # Broadcast Flooding
//!
//! A block created on one node travels hop by hop under a single message id.
//! Each node re-floods it at most once and never back to the peer it came
//! from.

use super::harness::{handshake, single_error, TestNode};
use qc_02_gossip::Message;

/// Owner plus `n` followers, all synced to the owner's one-block chain.
fn synced_line(n: usize) -> (TestNode, Vec<TestNode>, String) {
    let owner = TestNode::new("a");
    let chain_id = owner.create_chain(b"genesis");
    let followers: Vec<TestNode> = (0..n)
        .map(|i| {
            let follower = TestNode::new(&format!("f{i}"));
            follower.track(&chain_id);
            handshake(&owner, &follower);
            assert_eq!(follower.count(&chain_id), 1);
            follower
        })
        .collect();
    (owner, followers, chain_id)
}

fn message_id(frame: &[u8]) -> String {
    Message::decode(frame).unwrap().id
}

// =============================================================================
// Flooding
// =============================================================================

#[test]
fn test_block_floods_along_a_line() {
    let (mut a, mut followers, chain_id) = synced_line(2);
    let mut c = followers.pop().unwrap();
    let mut b = followers.pop().unwrap();

    let block = a.publish(&chain_id, b"fresh");
    let sent = a.take_broadcasts();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].exclude, None);
    let id = message_id(&sent[0].frame);

    // a -> b
    assert!(b.gossip.handle_message(&a.name, &sent[0].frame).is_empty());
    assert_eq!(b.block(&chain_id, 1), Some(block.clone()));
    let from_b = b.take_broadcasts();
    assert_eq!(from_b.len(), 1);
    assert_eq!(from_b[0].exclude.as_deref(), Some("a"));
    assert_eq!(message_id(&from_b[0].frame), id);

    // b -> c
    assert!(c.gossip.handle_message(&b.name, &from_b[0].frame).is_empty());
    assert_eq!(c.block(&chain_id, 1), Some(block));
    let from_c = c.take_broadcasts();
    assert_eq!(from_c.len(), 1);
    assert_eq!(from_c[0].exclude.as_deref(), Some("f0"));

    // c -> a and c -> b are echoes and dropped without a reply
    assert!(a.gossip.handle_message(&c.name, &from_c[0].frame).is_empty());
    assert!(b.gossip.handle_message(&c.name, &from_c[0].frame).is_empty());
    assert!(a.take_broadcasts().is_empty());
    assert!(b.take_broadcasts().is_empty());
    assert_eq!(a.count(&chain_id), 2);
}

#[test]
fn test_same_broadcast_from_two_peers_is_reflooded_once() {
    let (mut a, mut followers, chain_id) = synced_line(1);
    let mut b = followers.pop().unwrap();

    a.publish(&chain_id, b"fresh");
    let frame = a.take_broadcasts().remove(0).frame;

    assert!(b.gossip.handle_message("a", &frame).is_empty());
    assert!(b.gossip.handle_message("c", &frame).is_empty());

    assert_eq!(b.take_broadcasts().len(), 1);
    assert_eq!(b.count(&chain_id), 2);
}

#[test]
fn test_successive_blocks_keep_follower_in_step() {
    let (mut a, mut followers, chain_id) = synced_line(1);
    let mut b = followers.pop().unwrap();

    for i in 0..5u8 {
        a.publish(&chain_id, &[b'x', i]);
        for envelope in a.take_broadcasts() {
            assert!(b.gossip.handle_message("a", &envelope.frame).is_empty());
        }
    }

    assert_eq!(b.count(&chain_id), 6);
    assert_eq!(b.take_broadcasts().len(), 5);
    assert_eq!(b.block(&chain_id, 5), a.block(&chain_id, 5));
}

// =============================================================================
// Rejection
// =============================================================================

#[test]
fn test_untracked_chain_is_refused() {
    let mut a = TestNode::new("a");
    let mut b = TestNode::new("b");
    let chain_id = a.create_chain(b"genesis");

    a.publish(&chain_id, b"fresh");
    let frame = a.take_broadcasts().remove(0).frame;

    let reply = single_error(&b.gossip.handle_message("a", &frame));
    assert_eq!(reply.code, "ChainNotAcceptedError");
    assert!(b.take_broadcasts().is_empty());
    assert!(b.ledger.chain(&chain_id).unwrap().is_none());
}

#[test]
fn test_height_gap_is_dangled_and_not_reflooded() {
    let (mut a, mut followers, chain_id) = synced_line(1);
    let mut b = followers.pop().unwrap();

    a.extend(&chain_id, 1, 8);
    a.publish(&chain_id, b"ahead");
    let frame = a.take_broadcasts().remove(0).frame;

    let reply = single_error(&b.gossip.handle_message("a", &frame));
    assert_eq!(reply.code, "DangledBlockError");
    assert!(b.take_broadcasts().is_empty());
    assert_eq!(b.count(&chain_id), 1);

    // the next handshake fills the gap
    handshake(&a, &b);
    assert_eq!(b.count(&chain_id), 3);
}

#[test]
fn test_block_already_synced_is_reported_as_existing() {
    let (mut a, mut followers, chain_id) = synced_line(1);
    let mut b = followers.pop().unwrap();

    a.publish(&chain_id, b"fresh");
    let frame = a.take_broadcasts().remove(0).frame;
    handshake(&a, &b);
    assert_eq!(b.count(&chain_id), 2);

    let reply = single_error(&b.gossip.handle_message("a", &frame));
    assert_eq!(reply.code, "ExistBlockError");
    assert!(b.take_broadcasts().is_empty());
}
