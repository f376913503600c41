//! Shared types for the OpenBand steering engine.
//!
//! This crate contains:
//! - **Identity types** — `PhyId`/`VifId`/`MacAddr`/`Channel`, driver-supplied
//!   opaque keys
//! - **Error taxonomy** — `OswError`, shared by every other crate
//! - **ID generation** — prefixed UUIDv7 handles for ephemeral objects
//! - **Logging/counters** — ambient plumbing every binary wires up the same way

pub mod counters;
pub mod error;
pub mod ids;
pub mod log;
pub mod types;

pub use error::{OswError, OswResult};
pub use types::{Channel, ChannelWidth, MacAddr, PhyId, VifId};
