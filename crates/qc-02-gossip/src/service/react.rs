//! Reactions: state changes and follow-up behaviors after validation.

use super::GossipService;
use crate::domain::behavior::{
    Behavior, BroadcastBlock, Info, RequestBlocks, RequestPeers, ResponseBlocks, ResponsePeers,
};
use crate::domain::errors::ProtocolError;
use crate::domain::peer::Peer;
use qc_01_ledger::Block;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

impl GossipService {
    /// Apply a validated behavior and produce follow-up behaviors.
    pub fn react(&self, behavior: Behavior) -> Result<Vec<Behavior>, ProtocolError> {
        match behavior {
            Behavior::Info(info) => self.react_info(&info),
            Behavior::RequestPeers(request) => self.react_request_peers(&request),
            Behavior::RequestBlocks(request) => self.react_request_blocks(&request),
            Behavior::ResponsePeers(response) => self.react_response_peers(&response),
            Behavior::ResponseBlocks(response) => self.react_response_blocks(&response),
            Behavior::BroadcastBlock(broadcast) => self.react_broadcast(broadcast),
            Behavior::Error(reply) => {
                warn!(code = %reply.code, desc = %reply.desc, "[qc-02] peer reported error");
                Ok(Vec::new())
            }
        }
    }

    fn react_info(&self, info: &Info) -> Result<Vec<Behavior>, ProtocolError> {
        let mut replies = Vec::new();
        if info.peers > 0 && self.config.peer_sync {
            replies.push(Behavior::RequestPeers(RequestPeers { count: info.peers }));
        }

        for (chain_id, &remote) in &info.chains {
            let Some(chain) = self.ledger.chain(chain_id)? else {
                continue;
            };
            let local = chain.lock().count();
            if local < remote {
                debug!(chain_id = %chain_id, local, remote, "[qc-02] requesting missing blocks");
                replies.push(Behavior::RequestBlocks(RequestBlocks {
                    chain_id: chain_id.clone(),
                    from: local,
                    to: remote - 1,
                }));
            }
        }
        Ok(replies)
    }

    fn react_request_peers(&self, request: &RequestPeers) -> Result<Vec<Behavior>, ProtocolError> {
        let limit = usize::try_from(request.count).unwrap_or(0);
        let peers = self
            .peers
            .get_peers(limit)?
            .into_iter()
            .map(|peer| peer.address)
            .collect();
        Ok(vec![Behavior::ResponsePeers(ResponsePeers { peers })])
    }

    fn react_request_blocks(&self, request: &RequestBlocks) -> Result<Vec<Behavior>, ProtocolError> {
        let chain = self
            .ledger
            .chain(&request.chain_id)?
            .ok_or_else(|| ProtocolError::ChainNotAccepted(request.chain_id.clone()))?;

        let mut blocks = Vec::new();
        {
            let chain = chain.lock();
            for height in request.from..=request.to {
                match chain.get_block(height)? {
                    Some(block) => blocks.push(block),
                    None => break,
                }
            }
        }

        let cap = if self.config.division {
            self.config.max_message_size
        } else {
            usize::MAX
        };
        chunk_blocks(blocks, cap)
            .iter()
            .map(|batch| ResponseBlocks::from_blocks(batch).map(Behavior::ResponseBlocks))
            .collect()
    }

    fn react_response_peers(&self, response: &ResponsePeers) -> Result<Vec<Behavior>, ProtocolError> {
        for address in &response.peers {
            if self.peers.get_peer(address)?.is_none() {
                self.peers.save_peer(&Peer::discovered(address.clone()))?;
            }
        }
        Ok(Vec::new())
    }

    fn react_response_blocks(&self, response: &ResponseBlocks) -> Result<Vec<Behavior>, ProtocolError> {
        let chain_ids: BTreeSet<String> = response
            .decoded
            .iter()
            .map(Block::recover_chain_id)
            .collect();

        for chain_id in chain_ids {
            if let Some(chain) = self.ledger.chain(&chain_id)? {
                let mut chain = chain.lock();
                let committed = chain.commit_cache()?;
                info!(
                    chain_id = %chain_id,
                    committed,
                    count = chain.count(),
                    "[qc-02] synced blocks from peer"
                );
            }
        }
        Ok(Vec::new())
    }

    fn react_broadcast(&self, broadcast: BroadcastBlock) -> Result<Vec<Behavior>, ProtocolError> {
        let Some(block) = broadcast.decoded.clone() else {
            return Err(ProtocolError::Internal("broadcast reacted before validation".into()));
        };
        let chain_id = block.recover_chain_id();
        let chain = self
            .ledger
            .chain(&chain_id)?
            .ok_or_else(|| ProtocolError::ChainNotAccepted(chain_id.clone()))?;

        let accepted = chain.lock().save_block(block)?;
        let first_sighting = self.memo.mark_seen(&broadcast.id);
        if accepted && first_sighting {
            debug!(id = %broadcast.id, chain_id = %chain_id, "[qc-02] re-broadcasting block");
            self.publish(&broadcast)?;
        }
        Ok(Vec::new())
    }
}

/// Greedy batching: a new batch starts whenever the next block would push the
/// current one past `cap`. A block larger than `cap` travels alone.
pub(crate) fn chunk_blocks(blocks: Vec<Block>, cap: usize) -> Vec<Vec<Block>> {
    let mut batches = Vec::new();
    let mut batch: Vec<Block> = Vec::new();
    let mut size = 0usize;

    for block in blocks {
        let block_size = block.size();
        if !batch.is_empty() && size.saturating_add(block_size) > cap {
            batches.push(std::mem::take(&mut batch));
            size = 0;
        }
        size = size.saturating_add(block_size);
        batch.push(block);
    }
    if !batch.is_empty() {
        batches.push(batch);
    }
    batches
}
