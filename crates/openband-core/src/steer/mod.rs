//! Steering State Machine (§4.F), plus the hard/soft SNR-level supplement
//! from `ow_steer_hs.c` (§2).

use crate::config::{SteeringPolicy, HARD_DISASSOC_DELAY_SECS, MAX_IFNAME_ENTRIES, MAX_IFNAME_GROUPS};
use openband_common::{MacAddr, VifId};

const NANOS_PER_SEC: u64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteeringState {
    Disconnected,
    Connected,
    Steering,
    Backoff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KickClass {
    Steering,
    Sticky,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Good,
    Soft,
    Hard,
}

/// All-or-nothing per-link threshold rule from `ow_steer_hs_sta_derive_level`:
/// `Hard` only if every link is at or below the hard threshold, `Soft` only
/// if every link is at or below the soft threshold, else `Good`.
pub fn derive_level(snr_per_link_db: &[i32], soft_thr_db: i32, hard_thr_db: i32) -> Level {
    if snr_per_link_db.is_empty() {
        return Level::Good;
    }
    if snr_per_link_db.iter().all(|&s| s <= hard_thr_db) {
        Level::Hard
    } else if snr_per_link_db.iter().all(|&s| s <= soft_thr_db) {
        Level::Soft
    } else {
        Level::Good
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteerEvent {
    ProbeRejected { blocked: bool },
    StaConnected,
    StaDisconnected,
    SnrCrossedHwm,
    SnrBelowLwm,
    BackoffTimerFired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteerAction {
    RequestKick(KickClass),
    DeferKickUntilIdle(KickClass),
    ArmBackoffTimer { expiry_ns: u64 },
    ClearRejects,
    RecordSteeringSuccess,
    BlockPreAssocAuth,
    UnblockPreAssocAuth,
    ArmHardDisassoc { expiry_ns: u64 },
    DisarmHardDisassoc,
}

#[derive(Debug, Clone)]
pub struct IfnameEntry {
    pub vif: VifId,
    pub group: u8,
    pub bs_allowed: bool,
}

#[derive(Debug, Clone)]
pub struct SteeringClient {
    pub mac: MacAddr,
    pub group: String,
    pub policy: SteeringPolicy,
    pub state: SteeringState,
    num_rejects: u32,
    reject_window_start_ns: Option<u64>,
    backoff_expiry_ns: Option<u64>,
    backoff_count: u32,
    last_kick_ns: std::collections::HashMap<KickClass, u64>,
    last_any_kick_ns: Option<u64>,
    last_transition_ns: u64,
    preq_bad_streak: u32,
    auth_blocked: bool,
    level: Level,
    hard_disassoc_armed_at: Option<u64>,
    ifnames: Vec<IfnameEntry>,
}

impl SteeringClient {
    pub fn new(mac: MacAddr, group: impl Into<String>, policy: SteeringPolicy) -> Self {
        SteeringClient {
            mac,
            group: group.into(),
            policy,
            state: SteeringState::Disconnected,
            num_rejects: 0,
            reject_window_start_ns: None,
            backoff_expiry_ns: None,
            backoff_count: 0,
            last_kick_ns: std::collections::HashMap::new(),
            last_any_kick_ns: None,
            last_transition_ns: 0,
            preq_bad_streak: 0,
            auth_blocked: false,
            level: Level::Good,
            hard_disassoc_armed_at: None,
            ifnames: Vec::new(),
        }
    }

    pub fn add_ifname(&mut self, vif: VifId, group: u8, bs_allowed: bool) -> bool {
        if self.ifnames.len() >= MAX_IFNAME_ENTRIES {
            return false;
        }
        let groups_in_use: std::collections::HashSet<u8> =
            self.ifnames.iter().map(|e| e.group).collect();
        if !groups_in_use.contains(&group) && groups_in_use.len() >= MAX_IFNAME_GROUPS {
            return false;
        }
        self.ifnames.push(IfnameEntry { vif, group, bs_allowed });
        true
    }

    fn within_guard(&self, class: KickClass, now_ns: u64) -> bool {
        if let Some(&last) = self.last_kick_ns.get(&class) {
            let debounce_ns = self.policy.kick_debounce_period_secs * NANOS_PER_SEC;
            if debounce_ns > 0 && now_ns.saturating_sub(last) < debounce_ns {
                return true;
            }
        }
        if let Some(last_any) = self.last_any_kick_ns {
            let guard_ns = self.policy.kick_guard_time_secs * NANOS_PER_SEC;
            if guard_ns > 0 && now_ns.saturating_sub(last_any) < guard_ns {
                return true;
            }
        }
        false
    }

    fn within_settling(&self, now_ns: u64) -> bool {
        let settle_ns = self.policy.settling_backoff_time_secs * NANOS_PER_SEC;
        settle_ns > 0 && now_ns.saturating_sub(self.last_transition_ns) < settle_ns
    }

    fn transition(&mut self, to: SteeringState, now_ns: u64) {
        self.state = to;
        self.last_transition_ns = now_ns;
    }

    pub fn process_event(&mut self, event: SteerEvent, now_ns: u64) -> Vec<SteerAction> {
        let mut actions = Vec::new();
        match (self.state, event) {
            (SteeringState::Disconnected, SteerEvent::ProbeRejected { blocked: true }) => {
                if !matches!(self.policy.reject_mode, crate::config::RejectMode::None) {
                    if self.reject_window_start_ns.is_none()
                        || now_ns.saturating_sub(self.reject_window_start_ns.unwrap())
                            > self.policy.max_rejects_period_secs * NANOS_PER_SEC
                    {
                        self.reject_window_start_ns = Some(now_ns);
                        self.num_rejects = 0;
                    }
                    self.num_rejects += 1;
                    self.transition(SteeringState::Steering, now_ns);
                    if self.policy.max_rejects > 0 && self.num_rejects >= self.policy.max_rejects {
                        let backoff_secs = self
                            .policy
                            .backoff_exp_base
                            .saturating_pow(self.backoff_count)
                            .saturating_mul(self.policy.backoff_period_secs as u32)
                            as u64;
                        self.backoff_count += 1;
                        if self.policy.backoff_period_secs > 0 {
                            let expiry_ns = now_ns + backoff_secs * NANOS_PER_SEC;
                            self.backoff_expiry_ns = Some(expiry_ns);
                            self.transition(SteeringState::Backoff, now_ns);
                            actions.push(SteerAction::ArmBackoffTimer { expiry_ns });
                        }
                    }
                }
            }
            (SteeringState::Disconnected, SteerEvent::StaConnected) => {
                self.num_rejects = 0;
                self.reject_window_start_ns = None;
                self.transition(SteeringState::Connected, now_ns);
                actions.push(SteerAction::ClearRejects);
            }
            (SteeringState::Steering, SteerEvent::StaConnected) => {
                self.transition(SteeringState::Connected, now_ns);
                actions.push(SteerAction::RecordSteeringSuccess);
            }
            (SteeringState::Backoff, SteerEvent::BackoffTimerFired) => {
                self.num_rejects = 0;
                self.reject_window_start_ns = None;
                self.transition(SteeringState::Disconnected, now_ns);
            }
            (SteeringState::Connected, SteerEvent::SnrCrossedHwm) => {
                if self.policy.hwm_dbm != 0
                    && !self.within_guard(KickClass::Steering, now_ns)
                    && !self.within_settling(now_ns)
                {
                    self.last_kick_ns.insert(KickClass::Steering, now_ns);
                    self.last_any_kick_ns = Some(now_ns);
                    actions.push(SteerAction::RequestKick(KickClass::Steering));
                }
            }
            (SteeringState::Connected, SteerEvent::SnrBelowLwm) => {
                if self.policy.lwm_dbm != 0
                    && !self.within_guard(KickClass::Sticky, now_ns)
                    && !self.within_settling(now_ns)
                {
                    self.last_kick_ns.insert(KickClass::Sticky, now_ns);
                    self.last_any_kick_ns = Some(now_ns);
                    if self.policy.kick_upon_idle {
                        actions.push(SteerAction::DeferKickUntilIdle(KickClass::Sticky));
                    } else {
                        actions.push(SteerAction::RequestKick(KickClass::Sticky));
                    }
                }
            }
            (SteeringState::Connected, SteerEvent::StaDisconnected) => {
                self.transition(SteeringState::Disconnected, now_ns);
            }
            _ => {}
        }
        actions
    }

    /// Pre-assoc auth block: blackhole auth attempts once SNR observed
    /// from probes stays below `preq_snr_thr_db` for `preq_time_th`
    /// consecutive observations; unblock once it recovers for one sample.
    pub fn observe_probe_snr(&mut self, snr_db: i32) -> Vec<SteerAction> {
        let mut actions = Vec::new();
        if !self.policy.pre_assoc_auth_block {
            return actions;
        }
        if snr_db < self.policy.preq_snr_thr_db {
            self.bad_streak_inc();
            if self.bad_streak() >= self.policy.preq_time_th && !self.auth_blocked {
                self.auth_blocked = true;
                actions.push(SteerAction::BlockPreAssocAuth);
            }
        } else {
            self.bad_streak_reset();
            if self.auth_blocked {
                self.auth_blocked = false;
                actions.push(SteerAction::UnblockPreAssocAuth);
            }
        }
        actions
    }

    fn bad_streak_inc(&mut self) {
        self.preq_bad_streak += 1;
    }
    fn bad_streak_reset(&mut self) {
        self.preq_bad_streak = 0;
    }
    fn bad_streak(&self) -> u32 {
        self.preq_bad_streak
    }

    /// Recompute the hard/soft level from current per-link SNR, gated by
    /// `policy.hard_soft_enabled`. Reaching `Hard` requests an immediate
    /// kick and arms the fixed backstop disassoc timer.
    pub fn recalc_level(&mut self, snr_per_link_db: &[i32], now_ns: u64) -> Vec<SteerAction> {
        let mut actions = Vec::new();
        if !self.policy.hard_soft_enabled {
            return actions;
        }
        let new_level = derive_level(snr_per_link_db, self.policy.soft_snr_db, self.policy.hard_snr_db);
        if new_level == self.level {
            return actions;
        }
        self.level = new_level;
        match new_level {
            Level::Hard => {
                actions.push(SteerAction::RequestKick(KickClass::Steering));
                let expiry_ns = now_ns + HARD_DISASSOC_DELAY_SECS * NANOS_PER_SEC;
                self.hard_disassoc_armed_at = Some(expiry_ns);
                actions.push(SteerAction::ArmHardDisassoc { expiry_ns });
            }
            Level::Soft => {
                actions.push(SteerAction::RequestKick(KickClass::Steering));
                if self.hard_disassoc_armed_at.take().is_some() {
                    actions.push(SteerAction::DisarmHardDisassoc);
                }
            }
            Level::Good => {
                if self.hard_disassoc_armed_at.take().is_some() {
                    actions.push(SteerAction::DisarmHardDisassoc);
                }
            }
        }
        actions
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn is_auth_blocked(&self) -> bool {
        self.auth_blocked
    }
}
