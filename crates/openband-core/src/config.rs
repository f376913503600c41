//! Engine-wide and per-client tunables.
//!
//! Plain `serde`-derived structs with a `Default` impl giving the
//! documented numeric defaults, loadable from a `toml` file by
//! `openband-cli`.

use serde::{Deserialize, Serialize};

/// Bounded dispatcher queue capacity (§5).
pub const DISPATCH_QUEUE_CAPACITY: usize = 4096;

/// RRM beacon report cache entry TTL, in seconds (§3/§4.E).
pub const RRM_REPORT_TTL_SECS: u64 = 10;
/// RRM beacon report cache GC sweep period, in seconds (§4.E).
pub const RRM_REPORT_GC_PERIOD_SECS: u64 = 30;

/// Station ageout if it was ever connected, in seconds (§3): 7 days.
pub const STA_AGEOUT_CONNECTED_SECS: u64 = 7 * 24 * 3600;
/// Station ageout if only ever probed, in seconds (§3): 10 minutes.
pub const STA_AGEOUT_PROBED_ONLY_SECS: u64 = 10 * 60;

/// Max per-ifname vector entries for one steering client (§4.F).
pub const MAX_IFNAME_ENTRIES: usize = 16;
/// Max groups of 4 ifnames (§4.F).
pub const MAX_IFNAME_GROUPS: usize = 4;

/// Fixed backstop timer armed when a station reaches `Level::Hard` (§2 supplement).
pub const HARD_DISASSOC_DELAY_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KickType {
    Disassoc,
    Deauth,
    Btm,
    RrmBr,
    BtmDisassoc,
    BtmDeauth,
    RrmDisassoc,
    RrmDeauth,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectMode {
    None,
    ProbeAll,
    ProbeNull,
    ProbeDirect,
    AuthBlocked,
}

/// Per-(mac, group) steering-client policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SteeringPolicy {
    pub hwm_dbm: i32,
    pub lwm_dbm: i32,
    pub max_rejects: u32,
    pub max_rejects_period_secs: u64,
    pub backoff_period_secs: u64,
    pub backoff_exp_base: u32,
    pub kick_type: KickType,
    pub pre_assoc_auth_block: bool,
    pub preq_snr_thr_db: i32,
    pub preq_time_th: u32,
    pub reject_mode: RejectMode,
    pub kick_debounce_period_secs: u64,
    pub kick_guard_time_secs: u64,
    pub settling_backoff_time_secs: u64,
    pub kick_upon_idle: bool,
    pub btm_retries: u32,
    pub btm_retry_interval_secs: u64,
    /// Hard/soft SNR-level steering (`ow_steer_hs` supplement), disabled by default.
    pub hard_soft_enabled: bool,
    pub soft_snr_db: i32,
    pub hard_snr_db: i32,
}

impl Default for SteeringPolicy {
    fn default() -> Self {
        SteeringPolicy {
            hwm_dbm: -65,
            lwm_dbm: -80,
            max_rejects: 5,
            max_rejects_period_secs: 120,
            backoff_period_secs: 30,
            backoff_exp_base: 2,
            kick_type: KickType::Btm,
            pre_assoc_auth_block: false,
            preq_snr_thr_db: -80,
            preq_time_th: 3,
            reject_mode: RejectMode::ProbeAll,
            kick_debounce_period_secs: 30,
            kick_guard_time_secs: 30,
            settling_backoff_time_secs: 10,
            kick_upon_idle: true,
            btm_retries: 3,
            btm_retry_interval_secs: 3,
            hard_soft_enabled: false,
            soft_snr_db: -75,
            hard_snr_db: -85,
        }
    }
}

/// BTM Request Engine defaults (§4.G).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BtmPolicy {
    pub valid_interval_tbtts: u8,
    pub abridged: bool,
    pub pref: bool,
    pub disassoc_imminent: bool,
    pub bss_termination: bool,
    pub max_candidates: usize,
}

impl Default for BtmPolicy {
    fn default() -> Self {
        BtmPolicy {
            valid_interval_tbtts: 255,
            abridged: true,
            pref: true,
            disassoc_imminent: true,
            bss_termination: false,
            max_candidates: 3,
        }
    }
}

/// SNR hysteresis applied to crossing detection, in dB (§4.E).
pub const DEFAULT_SNR_HYSTERESIS_DB: i32 = 2;
