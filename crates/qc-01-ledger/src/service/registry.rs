use crate::domain::errors::{LedgerError, StorageError};
use crate::ports::outbound::{BlockHook, Storage, StoredChain};
use crate::service::chain::Chain;
use parking_lot::{Mutex, RwLock};
use shared_crypto::{validate_address, KeyPair};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared, exclusively locked chain.
pub type ChainHandle = Arc<Mutex<Chain>>;

/// Owner of all loaded chains.
///
/// Created once at node startup and shared by every message-handling task.
/// Each chain id maps to exactly one handle for the lifetime of the registry.
pub struct LedgerRegistry {
    storage: Arc<dyn Storage>,
    hook: Option<Arc<dyn BlockHook>>,
    chains: RwLock<HashMap<String, ChainHandle>>,
}

impl LedgerRegistry {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            hook: None,
            chains: RwLock::new(HashMap::new()),
        }
    }

    /// Attach a hook notified after every accepted block.
    pub fn with_hook(mut self, hook: Arc<dyn BlockHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Load every stored chain. Returns the number of chains loaded.
    pub fn load_all(&self) -> Result<usize, LedgerError> {
        let stored = self.storage.get_all_chains()?;
        let mut chains = self.chains.write();
        for record in stored {
            if chains.contains_key(&record.id) {
                continue;
            }
            let id = record.id.clone();
            match Chain::from_stored(record, self.storage.clone(), self.hook.clone()) {
                Ok(chain) => {
                    chains.insert(id, Arc::new(Mutex::new(chain)));
                }
                Err(e) => warn!(chain_id = %id, error = %e, "[qc-01] skipping unloadable chain"),
            }
        }
        info!(chains = chains.len(), "[qc-01] chains loaded");
        Ok(chains.len())
    }

    /// Handle for a locally tracked chain, loading it from storage on first use.
    pub fn chain(&self, id: &str) -> Result<Option<ChainHandle>, LedgerError> {
        if let Some(handle) = self.chains.read().get(id) {
            return Ok(Some(handle.clone()));
        }

        let mut chains = self.chains.write();
        if let Some(handle) = chains.get(id) {
            return Ok(Some(handle.clone()));
        }
        match self.storage.get_chain(id)? {
            Some(record) => Ok(Some(self.register(&mut chains, record)?)),
            None => Ok(None),
        }
    }

    fn register(
        &self,
        chains: &mut HashMap<String, ChainHandle>,
        record: StoredChain,
    ) -> Result<ChainHandle, LedgerError> {
        let id = record.id.clone();
        let chain = Chain::from_stored(record, self.storage.clone(), self.hook.clone())?;
        let handle = Arc::new(Mutex::new(chain));
        chains.insert(id, handle.clone());
        Ok(handle)
    }

    fn insert_new(&self, id: &str, wif: Option<&str>) -> Result<ChainHandle, LedgerError> {
        let mut chains = self.chains.write();
        if let Some(handle) = chains.get(id) {
            return Ok(handle.clone());
        }
        let record = match self.storage.save_chain(id, wif) {
            Ok(reference) => StoredChain {
                reference,
                id: id.to_string(),
                wif: wif.map(str::to_string),
                count: 0,
            },
            Err(StorageError::ChainExists(_)) => self
                .storage
                .get_chain(id)?
                .ok_or_else(|| LedgerError::UnknownChain(id.to_string()))?,
            Err(e) => return Err(e.into()),
        };
        self.register(&mut chains, record)
    }

    /// Create an owned chain under a fresh key and commit its genesis block.
    pub fn create_chain(&self, genesis_payload: Vec<u8>) -> Result<ChainHandle, LedgerError> {
        let key = KeyPair::generate();
        let handle = self.insert_new(&key.address(), Some(&key.to_wif()))?;
        {
            let mut chain = handle.lock();
            let genesis = chain.create_block(genesis_payload)?;
            chain.save_block(genesis)?;
            info!(chain_id = %chain.id(), "[qc-01] chain created");
        }
        Ok(handle)
    }

    /// Track an owned chain from its WIF key.
    ///
    /// If the chain is already known, the existing handle is returned.
    pub fn import_chain(&self, wif: &str) -> Result<ChainHandle, LedgerError> {
        let key = KeyPair::from_wif(wif)?;
        self.insert_new(&key.address(), Some(&key.to_wif()))
    }

    /// Track a read-only chain so its blocks are accepted from peers.
    pub fn track_chain(&self, id: &str) -> Result<ChainHandle, LedgerError> {
        validate_address(id).map_err(|e| LedgerError::InvalidChainId {
            id: id.to_string(),
            reason: e.to_string(),
        })?;
        self.insert_new(id, None)
    }

    /// Forget a chain and delete its blocks. Returns false if it was unknown.
    pub fn delete_chain(&self, id: &str) -> Result<bool, LedgerError> {
        let mut chains = self.chains.write();
        chains.remove(id);
        match self.storage.get_chain(id)? {
            Some(record) => {
                self.storage.delete_chain(record.reference)?;
                info!(chain_id = %id, "[qc-01] chain deleted");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Chain id to accepted-block count for every stored chain.
    pub fn summary(&self) -> Result<BTreeMap<String, u64>, LedgerError> {
        let mut summary = BTreeMap::new();
        for record in self.storage.get_all_chains()? {
            let count = match self.chains.read().get(&record.id) {
                Some(handle) => handle.lock().count(),
                None => record.count,
            };
            summary.insert(record.id, count);
        }
        Ok(summary)
    }

    /// Ids of every stored chain.
    pub fn ids(&self) -> Result<Vec<String>, LedgerError> {
        Ok(self
            .storage
            .get_all_chains()?
            .into_iter()
            .map(|record| record.id)
            .collect())
    }
}
