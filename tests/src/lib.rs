//! # Quill-Chain Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── harness.rs      # In-process nodes wired through handle_message
//!     ├── sync_flows.rs   # Info → request:blocks → response:blocks
//!     ├── broadcast.rs    # Flooding, de-duplication, rejection
//!     └── adversarial.rs  # Forged, tampered and forked blocks
//! tests/benches/
//! └── ledger_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p qc-tests
//! cargo test -p qc-tests integration::broadcast::
//! cargo bench -p qc-tests
//! ```

pub mod integration;
