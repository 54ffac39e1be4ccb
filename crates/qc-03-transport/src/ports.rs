//! # Inbound Port
//!
//! What the transport calls into. Implemented by the node on top of the
//! gossip service.

/// Frame-level message handler.
pub trait FrameHandler: Send + Sync + 'static {
    /// Frame sent to every peer right after it joins.
    fn greeting(&self) -> Option<Vec<u8>>;

    /// Process one frame from `sender` and return the frames to send back.
    fn handle(&self, sender: &str, frame: &[u8]) -> Vec<Vec<u8>>;
}
