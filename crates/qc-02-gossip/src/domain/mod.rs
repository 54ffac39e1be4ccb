//! Domain layer: envelope, behaviors, peers, de-duplication memo and errors.

pub mod behavior;
pub mod errors;
pub mod memo;
pub mod message;
pub mod peer;
