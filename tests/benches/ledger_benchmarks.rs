//! # Quill-Chain Benchmarks
//!
//! | Area | Operation |
//! |------|-----------|
//! | shared-crypto | sign, recover, base58 |
//! | qc-01 Ledger | create + save block, validate, range read |
//! | qc-02 Gossip | `handle_message` for broadcast and sync |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use qc_01_ledger::{Block, ChainHandle, InMemoryStorage, LedgerRegistry};
use qc_02_gossip::{
    new_message_id, Behavior, BroadcastBlock, BroadcastMemo, GossipConfig, GossipService,
    InMemoryPeerDirectory, Message, RequestBlocks,
};
use rand::Rng;
use shared_crypto::{from_base58, to_base58, KeyPair};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn random_payload(len: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen()).collect()
}

fn registry() -> Arc<LedgerRegistry> {
    Arc::new(LedgerRegistry::new(Arc::new(InMemoryStorage::new())))
}

fn owned_chain(ledger: &LedgerRegistry, blocks: u64, payload_len: usize) -> ChainHandle {
    let handle = ledger.create_chain(random_payload(payload_len)).unwrap();
    {
        let mut chain = handle.lock();
        while chain.count() < blocks {
            let block = chain.create_block(random_payload(payload_len)).unwrap();
            chain.save_block(block).unwrap();
        }
    }
    handle
}

fn service(ledger: Arc<LedgerRegistry>) -> GossipService {
    // No fan-out task; none of the benches below re-flood.
    let (fanout, _) = mpsc::unbounded_channel();
    GossipService::new(
        ledger,
        Arc::new(InMemoryPeerDirectory::new()),
        Arc::new(BroadcastMemo::default()),
        GossipConfig::default(),
        fanout,
    )
}

// ============================================================================
// shared-crypto
// ============================================================================

fn bench_crypto(c: &mut Criterion) {
    let mut group = c.benchmark_group("shared-crypto");
    let key = KeyPair::generate();
    let message = random_payload(256);
    let signature = key.sign(&message).unwrap();

    group.bench_function("sign", |b| b.iter(|| black_box(key.sign(&message).unwrap())));
    group.bench_function("recover_address", |b| {
        b.iter(|| black_box(shared_crypto::recover_address(&signature, &message).unwrap()))
    });

    for size in [64usize, 1024, 4096] {
        let data = random_payload(size);
        let text = to_base58(&data);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("base58_round_trip", size), &text, |b, text| {
            b.iter(|| black_box(from_base58(text).unwrap()))
        });
    }
    group.finish();
}

// ============================================================================
// qc-01 Ledger
// ============================================================================

fn bench_ledger(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-01-ledger");
    group.measurement_time(Duration::from_secs(5));

    let ledger = registry();
    let handle = owned_chain(&ledger, 1, 32);
    group.bench_function("create_and_save_block", |b| {
        b.iter(|| {
            let mut chain = handle.lock();
            let block = chain.create_block(b"bench payload".to_vec()).unwrap();
            black_box(chain.save_block(block).unwrap())
        })
    });

    let source = owned_chain(&ledger, 2, 512);
    let tip = source.lock().get_block(1).unwrap().unwrap();
    let mirror = registry().track_chain(source.lock().id()).unwrap();
    mirror
        .lock()
        .save_block(source.lock().get_block(0).unwrap().unwrap())
        .unwrap();
    group.bench_function("validate_block", |b| {
        b.iter(|| black_box(mirror.lock().validate_block(&tip).is_ok()))
    });

    let long = owned_chain(&ledger, 500, 128);
    group.throughput(Throughput::Elements(100));
    group.bench_function("get_blocks_100", |b| {
        b.iter(|| black_box(long.lock().get_blocks(200, 299).unwrap().len()))
    });
    group.finish();
}

// ============================================================================
// qc-02 Gossip
// ============================================================================

fn bench_gossip(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-02-gossip");

    let owner_ledger = registry();
    let source = owned_chain(&owner_ledger, 200, 128);
    let chain_id = source.lock().id().to_string();
    let owner = service(owner_ledger);

    let request = Message::new(&Behavior::RequestBlocks(RequestBlocks {
        chain_id: chain_id.clone(),
        from: 0,
        to: 199,
    }))
    .unwrap()
    .encode()
    .unwrap();
    group.throughput(Throughput::Elements(200));
    group.bench_function("serve_request_blocks_200", |b| {
        b.iter(|| black_box(owner.handle_message("bench", &request).len()))
    });

    // Broadcasts of an already-held block: decode, memo check, verify and
    // validation all run, nothing is committed.
    let follower_ledger = registry();
    let mirror = follower_ledger.track_chain(&chain_id).unwrap();
    for block in source.lock().get_blocks(0, 10).unwrap() {
        mirror.lock().save_block(block).unwrap();
    }
    let follower = service(follower_ledger);
    let held: Block = source.lock().get_block(10).unwrap().unwrap();
    group.throughput(Throughput::Elements(1));
    group.bench_function("broadcast_existing_block", |b| {
        b.iter_batched(
            || {
                let id = new_message_id();
                let broadcast = BroadcastBlock::new(id.clone(), &held).unwrap();
                Message::with_id(id, &Behavior::BroadcastBlock(broadcast))
                    .unwrap()
                    .encode()
                    .unwrap()
            },
            |frame| black_box(follower.handle_message("bench", &frame)),
            criterion::BatchSize::SmallInput,
        )
    });
    group.finish();
}

criterion_group!(benches, bench_crypto, bench_ledger, bench_gossip);
criterion_main!(benches);
