//! Outbound dialing with exponential back-off.

use qc_02_gossip::{Peer, PeerDirectory};
use qc_03_transport::{PeerInfo, RegistryHandle, TransportError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// First retry delay; doubles per attempt.
pub const BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Upper bound on a single retry delay.
pub const BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Dial `url` once and record the peer on success.
pub async fn dial(
    registry: &RegistryHandle,
    peers: &dyn PeerDirectory,
    url: &str,
) -> Result<PeerInfo, TransportError> {
    let info = registry.connect(url).await?;

    let mut peer = Peer::connected(url);
    match peers.get_peer(url) {
        Ok(Some(known)) => peer.rank = known.rank,
        Ok(None) => {}
        Err(e) => debug!(peer = url, error = %e, "[node] peer lookup failed"),
    }
    if let Err(e) = peers.save_peer(&peer) {
        warn!(peer = url, error = %e, "[node] failed to record peer");
    }

    Ok(info)
}

/// Dial `url` up to `attempts` times. Returns whether a connection was made.
pub async fn dial_with_retry(
    registry: &RegistryHandle,
    peers: &dyn PeerDirectory,
    url: &str,
    attempts: u32,
    base: Duration,
) -> bool {
    let mut delay = base;
    for attempt in 1..=attempts.max(1) {
        match dial(registry, peers, url).await {
            Ok(_) => {
                info!(peer = url, attempt, "[node] ✓ connected to peer");
                return true;
            }
            Err(e) if attempt < attempts => {
                debug!(peer = url, attempt, error = %e, retry_in = ?delay, "[node] dial failed");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(BACKOFF_MAX);
            }
            Err(e) => {
                warn!(peer = url, attempts, error = %e, "[node] giving up on peer");
            }
        }
    }
    false
}

/// Bootstrap list followed by stored peers, without duplicates.
pub fn dial_targets(bootstrap: &[String], known: &[Peer]) -> Vec<String> {
    let mut targets: Vec<String> = Vec::new();
    for address in bootstrap
        .iter()
        .cloned()
        .chain(known.iter().map(|peer| peer.address.clone()))
    {
        if !targets.contains(&address) {
            targets.push(address);
        }
    }
    targets
}
