//! Transport-facing adapter over the gossip service.

use qc_02_gossip::GossipService;
use qc_03_transport::FrameHandler;
use std::sync::Arc;
use tracing::warn;

/// Feeds inbound frames to [`GossipService::handle_message`].
pub struct GossipFrameHandler {
    gossip: Arc<GossipService>,
}

impl GossipFrameHandler {
    pub fn new(gossip: Arc<GossipService>) -> Self {
        Self { gossip }
    }
}

impl FrameHandler for GossipFrameHandler {
    fn greeting(&self) -> Option<Vec<u8>> {
        match self.gossip.greeting() {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(error = %e, "[node] cannot build info greeting");
                None
            }
        }
    }

    fn handle(&self, sender: &str, frame: &[u8]) -> Vec<Vec<u8>> {
        self.gossip.handle_message(sender, frame)
    }
}
