//! OpenBand client steering engine.
//!
//! Module map, in dependency order:
//! - [`config`] — tunables and their documented defaults
//! - [`observer`] — generic, reentrant-safe pub/sub bus reused by every
//!   component below
//! - [`cache`] — exclusive owner of Phy/Vif records and raw station presence
//! - [`assoc`] — logical, cross-link station tracking (MLO aggregation)
//! - [`capstore`] — per-station capability/RRM/SNR/MBO cache
//! - [`steer`] — the steering state machine and hard/soft SNR levels
//! - [`btm`] — BTM request construction, submission, and retries
//! - [`csa`] — the Xphy-CSA config mutator
//! - [`driver`] — the bounded dispatch queue tying all of the above together

pub mod assoc;
pub mod btm;
pub mod cache;
pub mod capstore;
pub mod config;
pub mod csa;
pub mod driver;
pub mod observer;
pub mod steer;

pub use driver::{Dispatcher, DriverEvent, Engine};
