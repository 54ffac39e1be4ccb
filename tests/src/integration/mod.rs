//! Cross-crate flows between in-process nodes.

pub mod harness;

#[cfg(test)]
mod adversarial;
#[cfg(test)]
mod broadcast;
#[cfg(test)]
mod sync_flows;
