//! Validation: read-only checks run before any reaction.

use super::GossipService;
use crate::domain::behavior::{
    Behavior, BroadcastBlock, Info, RequestBlocks, RequestPeers, ResponseBlocks, ResponsePeers,
};
use crate::domain::errors::ProtocolError;
use crate::PROTOCOL_VERSION;
use qc_01_ledger::{Block, BlockValidationError, ChainHandle};
use serde_json::Value;
use tracing::debug;
use url::Url;

impl GossipService {
    /// Check a behavior against local state.
    ///
    /// `response:blocks` additionally stages its blocks in the pending cache
    /// of their chain (blocks already held are skipped). A batch that fails
    /// leaves the cache as it was. Both block-carrying variants keep the
    /// decoded blocks for the reaction.
    pub fn validate(&self, behavior: &mut Behavior) -> Result<(), ProtocolError> {
        match behavior {
            Behavior::Info(info) => validate_info(info),
            Behavior::RequestPeers(request) => validate_request_peers(request),
            Behavior::RequestBlocks(request) => self.validate_request_blocks(request),
            Behavior::ResponsePeers(response) => validate_response_peers(response),
            Behavior::ResponseBlocks(response) => self.validate_response_blocks(response),
            Behavior::BroadcastBlock(broadcast) => self.validate_broadcast(broadcast),
            Behavior::Error(_) => Ok(()),
        }
    }

    fn tracked_chain(&self, id: &str) -> Result<ChainHandle, ProtocolError> {
        self.ledger
            .chain(id)?
            .ok_or_else(|| ProtocolError::ChainNotAccepted(id.to_string()))
    }

    fn validate_request_blocks(&self, request: &RequestBlocks) -> Result<(), ProtocolError> {
        let chain = self.tracked_chain(&request.chain_id)?;
        if request.from > request.to {
            return Err(ProtocolError::BadRequest(format!(
                "'from' ({}) must not exceed 'to' ({})",
                request.from, request.to
            )));
        }
        let count = chain.lock().count();
        if request.from > count {
            return Err(ProtocolError::BadRequest(format!(
                "requested height {} but chain has {count} blocks",
                request.from
            )));
        }
        Ok(())
    }

    fn validate_response_blocks(&self, response: &mut ResponseBlocks) -> Result<(), ProtocolError> {
        response.decoded.clear();
        let mut staged: Vec<(ChainHandle, u64)> = Vec::new();

        let outcome = self.stage_blocks(response, &mut staged);
        if outcome.is_err() {
            for (chain, height) in staged.iter().rev() {
                chain.lock().discard_pending(*height);
            }
            response.decoded.clear();
        }
        outcome
    }

    /// Cache every block of the batch, recording what was inserted so a
    /// failure later in the batch can be undone.
    fn stage_blocks(
        &self,
        response: &mut ResponseBlocks,
        staged: &mut Vec<(ChainHandle, u64)>,
    ) -> Result<(), ProtocolError> {
        for raw in &response.blocks {
            let block = decode_block(raw)?;
            let chain_id = block.verify()?;
            let chain = self
                .ledger
                .chain(&chain_id)?
                .ok_or_else(|| {
                    ProtocolError::ChainNotAccepted(format!("recovered chain id {chain_id}"))
                })?;

            let height = block.height;
            let cached = chain.lock().cache_block(block.clone());
            match cached {
                Ok(()) => staged.push((chain, height)),
                Err(e) if matches!(e.as_validation(), Some(BlockValidationError::ExistBlock { .. })) => {
                    debug!(chain_id = %chain_id, height, "[qc-02] block already held, skipping");
                }
                Err(e) => return Err(e.into()),
            }
            response.decoded.push(block);
        }
        Ok(())
    }

    fn validate_broadcast(&self, broadcast: &mut BroadcastBlock) -> Result<(), ProtocolError> {
        let block = decode_block(&broadcast.block)?;
        if self.memo.contains(&broadcast.id) {
            return Err(ProtocolError::DuplicateBroadcast(broadcast.id.clone()));
        }

        let chain_id = block.verify()?;
        let chain = self
            .ledger
            .chain(&chain_id)?
            .ok_or_else(|| ProtocolError::ChainNotAccepted(format!("recovered chain id {chain_id}")))?;
        chain.lock().validate_block(&block)?;

        broadcast.decoded = Some(block);
        Ok(())
    }
}

fn validate_info(info: &Info) -> Result<(), ProtocolError> {
    if info.version != PROTOCOL_VERSION {
        return Err(ProtocolError::IncompatibleProtocolVersion(format!(
            "only accept v{PROTOCOL_VERSION} protocol, got '{}'",
            info.version
        )));
    }
    if info.peers < 0 {
        return Err(ProtocolError::BadRequest(
            "'peers' needs to be a non-negative number".into(),
        ));
    }
    Ok(())
}

fn validate_request_peers(request: &RequestPeers) -> Result<(), ProtocolError> {
    if request.count < 0 {
        return Err(ProtocolError::BadRequest(
            "'count' needs to be a non-negative number".into(),
        ));
    }
    Ok(())
}

fn validate_response_peers(response: &ResponsePeers) -> Result<(), ProtocolError> {
    for peer in &response.peers {
        let url = Url::parse(peer).map_err(|e| ProtocolError::InvalidUrl(format!("{peer}: {e}")))?;
        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(ProtocolError::InvalidUrl(format!(
                "{peer}: not a websocket URL"
            )));
        }
    }
    Ok(())
}

fn decode_block(raw: &Value) -> Result<Block, ProtocolError> {
    serde_json::from_value(raw.clone()).map_err(|e| ProtocolError::JsonDecode(e.to_string()))
}
