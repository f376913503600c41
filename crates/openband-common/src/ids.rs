//! Prefixed ID generation for ephemeral object handles.
//!
//! BTM requests and observer registrations need a short, log-correlatable
//! handle. `PhyId`/`VifId`/`MacAddr` are driver-supplied keys and are not
//! generated here — see [`crate::types`].

use uuid::Uuid;

fn prefixed_id(prefix: &str) -> String {
    let id = Uuid::now_v7();
    format!("{}_{}", prefix, id.as_simple())
}

/// Generate a BTM request ID: `btm_<uuid7>`
pub fn btm_request_id() -> String {
    prefixed_id("btm")
}

/// Generate an observer registration handle: `obs_<uuid7>`
pub fn observer_handle() -> String {
    prefixed_id("obs")
}
