//! # File Storage
//!
//! Durable [`Storage`] and [`PeerDirectory`] backed by plain files:
//!
//! ```text
//! <root>/chains.json          chain index, rewritten atomically
//! <root>/blocks/<ref>.jsonl   one JSON block record per line, append-only
//! <root>/peers.json           peer list, rewritten atomically
//! <root>/payloads/<hash>      raw payloads above SPILL_THRESHOLD
//! <root>/LOCK                 held while the store is open
//! ```
//!
//! Block records carry the payload as base58 text, or `"*"` when the bytes
//! live in `payloads/`. The index and block records are held in memory;
//! spilled payloads are read from disk on demand.

use super::lock::{DataDirLock, LockError};
use parking_lot::RwLock;
use qc_01_ledger::{Block, ChainRef, Storage, StorageError, StoredChain};
use qc_02_gossip::{Peer, PeerDirectory, PeerStoreError};
use serde::{Deserialize, Serialize};
use shared_crypto::{from_base58, to_base58};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Payloads larger than this are written to their own file.
pub const SPILL_THRESHOLD: usize = 100 * 1024;

const SPILL_MARKER: &str = "*";
const CHAINS_FILE: &str = "chains.json";
const PEERS_FILE: &str = "peers.json";
const BLOCKS_DIR: &str = "blocks";
const PAYLOADS_DIR: &str = "payloads";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BlockRecord {
    height: u64,
    time: u64,
    #[serde(default)]
    prev_hash: String,
    hash: String,
    signature: String,
    payload: String,
}

impl BlockRecord {
    fn is_spilled(&self) -> bool {
        self.payload == SPILL_MARKER
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ChainIndex {
    next_ref: ChainRef,
    chains: Vec<StoredChain>,
}

#[derive(Default)]
struct State {
    chains: BTreeMap<ChainRef, StoredChain>,
    next_ref: ChainRef,
    blocks: HashMap<ChainRef, BTreeMap<u64, BlockRecord>>,
    peers: BTreeMap<String, Peer>,
}

/// File-backed chain, block and peer store.
pub struct FileStorage {
    root: PathBuf,
    state: RwLock<State>,
    _lock: DataDirLock,
}

impl FileStorage {
    /// Open (or create) a store rooted at `root`.
    ///
    /// Fails with [`StorageError::Locked`] while another `FileStorage`, in
    /// this or any other process, has the directory open.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(BLOCKS_DIR)).map_err(io_error)?;
        fs::create_dir_all(root.join(PAYLOADS_DIR)).map_err(io_error)?;
        let lock = DataDirLock::acquire(&root).map_err(lock_error)?;

        let mut state = State::default();

        if let Some(index) = read_json::<ChainIndex>(&root.join(CHAINS_FILE))? {
            state.next_ref = index.next_ref;
            for chain in index.chains {
                state.next_ref = state.next_ref.max(chain.reference);
                state.chains.insert(chain.reference, chain);
            }
        }

        for reference in state.chains.keys().copied().collect::<Vec<_>>() {
            let records = load_block_records(&root.join(BLOCKS_DIR).join(blocks_file(reference)))?;
            state.blocks.insert(reference, records);
        }

        if let Some(peers) = read_json::<Vec<Peer>>(&root.join(PEERS_FILE))? {
            state.peers = peers.into_iter().map(|p| (p.address.clone(), p)).collect();
        }

        info!(
            root = %root.display(),
            chains = state.chains.len(),
            peers = state.peers.len(),
            "[node] 💾 file storage opened"
        );

        Ok(Self {
            root,
            state: RwLock::new(state),
            _lock: lock,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn payload_path(&self, hash: &str) -> PathBuf {
        self.root.join(PAYLOADS_DIR).join(hash)
    }

    fn blocks_path(&self, reference: ChainRef) -> PathBuf {
        self.root.join(BLOCKS_DIR).join(blocks_file(reference))
    }

    fn persist_chains(&self, state: &State) -> Result<(), StorageError> {
        let index = ChainIndex {
            next_ref: state.next_ref,
            chains: state.chains.values().cloned().collect(),
        };
        let bytes = serde_json::to_vec_pretty(&index).map_err(serialization_error)?;
        write_atomic(&self.root.join(CHAINS_FILE), &bytes).map_err(io_error)
    }

    fn persist_peers(&self, state: &State) -> Result<(), PeerStoreError> {
        let peers: Vec<&Peer> = state.peers.values().collect();
        let bytes = serde_json::to_vec_pretty(&peers)
            .map_err(|e| PeerStoreError::Serialization(e.to_string()))?;
        write_atomic(&self.root.join(PEERS_FILE), &bytes)
            .map_err(|e| PeerStoreError::Io(e.to_string()))
    }

    fn to_record(&self, block: &Block) -> Result<BlockRecord, StorageError> {
        let payload = if block.payload.len() > SPILL_THRESHOLD {
            write_atomic(&self.payload_path(&block.hash), &block.payload).map_err(io_error)?;
            debug!(
                hash = %block.hash,
                size = block.payload.len(),
                "[node] payload spilled to file"
            );
            SPILL_MARKER.to_string()
        } else {
            to_base58(&block.payload)
        };

        Ok(BlockRecord {
            height: block.height,
            time: block.time,
            prev_hash: block.prev_hash.clone(),
            hash: block.hash.clone(),
            signature: block.signature.clone(),
            payload,
        })
    }

    fn to_block(&self, record: &BlockRecord) -> Result<Block, StorageError> {
        let payload = if record.is_spilled() {
            fs::read(self.payload_path(&record.hash)).map_err(io_error)?
        } else {
            from_base58(&record.payload).map_err(serialization_error)?
        };

        Ok(Block {
            height: record.height,
            time: record.time,
            prev_hash: record.prev_hash.clone(),
            hash: record.hash.clone(),
            signature: record.signature.clone(),
            payload,
        })
    }
}

impl Storage for FileStorage {
    fn get_chain(&self, id: &str) -> Result<Option<StoredChain>, StorageError> {
        Ok(self
            .state
            .read()
            .chains
            .values()
            .find(|chain| chain.id == id)
            .cloned())
    }

    fn get_all_chains(&self) -> Result<Vec<StoredChain>, StorageError> {
        Ok(self.state.read().chains.values().cloned().collect())
    }

    fn get_block(&self, chain: ChainRef, height: u64) -> Result<Option<Block>, StorageError> {
        let state = self.state.read();
        state
            .blocks
            .get(&chain)
            .and_then(|records| records.get(&height))
            .map(|record| self.to_block(record))
            .transpose()
    }

    fn get_block_by_hash(
        &self,
        chain: ChainRef,
        hash: &str,
    ) -> Result<Option<Block>, StorageError> {
        let state = self.state.read();
        state
            .blocks
            .get(&chain)
            .and_then(|records| records.values().find(|record| record.hash == hash))
            .map(|record| self.to_block(record))
            .transpose()
    }

    fn get_blocks(&self, chain: ChainRef, from: u64, to: u64) -> Result<Vec<Block>, StorageError> {
        if from > to {
            return Ok(Vec::new());
        }
        let state = self.state.read();
        match state.blocks.get(&chain) {
            Some(records) => records
                .range(from..=to)
                .map(|(_, record)| self.to_block(record))
                .collect(),
            None => Ok(Vec::new()),
        }
    }

    fn save_chain(&self, id: &str, wif: Option<&str>) -> Result<ChainRef, StorageError> {
        let mut state = self.state.write();
        if state.chains.values().any(|chain| chain.id == id) {
            return Err(StorageError::ChainExists(id.to_string()));
        }

        state.next_ref += 1;
        let reference = state.next_ref;
        state.chains.insert(
            reference,
            StoredChain {
                reference,
                id: id.to_string(),
                wif: wif.map(str::to_string),
                count: 0,
            },
        );
        state.blocks.insert(reference, BTreeMap::new());
        self.persist_chains(&state)?;

        Ok(reference)
    }

    fn increment_count(&self, chain: ChainRef) -> Result<u64, StorageError> {
        let mut state = self.state.write();
        let stored = state
            .chains
            .get_mut(&chain)
            .ok_or(StorageError::UnknownReference(chain))?;
        stored.count += 1;
        let count = stored.count;
        self.persist_chains(&state)?;
        Ok(count)
    }

    fn save_block(&self, chain: ChainRef, block: &Block) -> Result<(), StorageError> {
        let mut state = self.state.write();
        if !state.chains.contains_key(&chain) {
            return Err(StorageError::UnknownReference(chain));
        }

        let record = self.to_record(block)?;
        let mut line = serde_json::to_vec(&record).map_err(serialization_error)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.blocks_path(chain))
            .map_err(io_error)?;
        file.write_all(&line).map_err(io_error)?;
        file.sync_data().map_err(io_error)?;

        state
            .blocks
            .entry(chain)
            .or_default()
            .insert(record.height, record);
        Ok(())
    }

    fn delete_chain(&self, chain: ChainRef) -> Result<(), StorageError> {
        let mut state = self.state.write();
        if state.chains.remove(&chain).is_none() {
            return Ok(());
        }

        for record in state.blocks.remove(&chain).unwrap_or_default().values() {
            if record.is_spilled() {
                remove_if_exists(&self.payload_path(&record.hash)).map_err(io_error)?;
            }
        }
        remove_if_exists(&self.blocks_path(chain)).map_err(io_error)?;
        self.persist_chains(&state)
    }
}

impl PeerDirectory for FileStorage {
    fn count_of_peers(&self) -> Result<usize, PeerStoreError> {
        Ok(self.state.read().peers.len())
    }

    fn get_peer(&self, address: &str) -> Result<Option<Peer>, PeerStoreError> {
        Ok(self.state.read().peers.get(address).cloned())
    }

    fn get_peers(&self, limit: usize) -> Result<Vec<Peer>, PeerStoreError> {
        let mut peers: Vec<Peer> = self.state.read().peers.values().cloned().collect();
        peers.sort_by(Peer::preference);
        if limit > 0 {
            peers.truncate(limit);
        }
        Ok(peers)
    }

    fn save_peer(&self, peer: &Peer) -> Result<(), PeerStoreError> {
        let mut state = self.state.write();
        state.peers.insert(peer.address.clone(), peer.clone());
        self.persist_peers(&state)
    }

    fn delete_peer(&self, address: &str) -> Result<(), PeerStoreError> {
        let mut state = self.state.write();
        if state.peers.remove(address).is_some() {
            self.persist_peers(&state)?;
        }
        Ok(())
    }
}

fn blocks_file(reference: ChainRef) -> String {
    format!("{reference}.jsonl")
}

fn load_block_records(path: &Path) -> Result<BTreeMap<u64, BlockRecord>, StorageError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(io_error(e)),
    };

    let mut records = BTreeMap::new();
    for (number, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<BlockRecord>(line) {
            Ok(record) => {
                records.insert(record.height, record);
            }
            Err(e) => warn!(
                file = %path.display(),
                line = number + 1,
                error = %e,
                "[node] skipping unreadable block record"
            ),
        }
    }
    Ok(records)
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, StorageError> {
    match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(serialization_error),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error(e)),
    }
}

/// Write via a temp file and rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let temp = path.with_extension("tmp");
    let mut file = fs::File::create(&temp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&temp, path)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn io_error(err: io::Error) -> StorageError {
    StorageError::Io(err.to_string())
}

fn serialization_error(err: impl std::fmt::Display) -> StorageError {
    StorageError::Serialization(err.to_string())
}

fn lock_error(err: LockError) -> StorageError {
    match err {
        LockError::AlreadyLocked { .. } => StorageError::Locked(err.to_string()),
        other => StorageError::Io(other.to_string()),
    }
}
