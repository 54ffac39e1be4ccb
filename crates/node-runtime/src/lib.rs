//! # Node Runtime Library
//!
//! Storage adapters, configuration and wiring for the `quill-node` binary.
//! Exposed as a library so the workspace integration tests can build nodes.
//!
//! ## Modules
//!
//! - `config/` - `NodeConfig` (TOML + `QC_*` environment overrides)
//! - `adapters/` - File storage and peer directory, block webhook
//! - `wiring/` - `NodeRuntime`: startup, fan-out, memo sweep, dialing, shutdown

pub mod adapters;
pub mod config;
pub mod wiring;

pub use adapters::{FileStorage, WebhookBlockHook};
pub use config::{ConfigError, NodeConfig};
pub use wiring::{GossipFrameHandler, NodeRuntime};
