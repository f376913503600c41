//! BTM Request Engine (§4.G): request construction, submission state
//! machine, and retry policy.

use crate::config::BtmPolicy;
use openband_common::{ids, MacAddr};
use openband_frame::btm::{BtmRequestFrame, MboCellPreference, NeighborCandidate, RequestMode};
use openband_frame::rrm::BeaconReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BtmRequestState {
    Prepared,
    Queued,
    Sent,
    Responded,
    Completed,
    Failed,
    Dropped,
}

/// MBO reason/cell-preference selection, exact to `ow_steer_hs`: reason is
/// always `low_rssi` when MBO attributes are present; `recommend_cell`
/// only for a hard kick, `avoid_cell` only for a soft kick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KickSeverity {
    Hard,
    Soft,
}

fn mbo_cell_preference(mbo_capable: bool, severity: Option<KickSeverity>) -> Option<MboCellPreference> {
    if !mbo_capable {
        return None;
    }
    match severity {
        Some(KickSeverity::Hard) => Some(MboCellPreference::RecommendCell),
        Some(KickSeverity::Soft) => Some(MboCellPreference::AvoidCell),
        None => None,
    }
}

pub struct PendingBtmRequest {
    pub id: String,
    pub target_sta_mac: MacAddr,
    pub frame: BtmRequestFrame,
    pub state: BtmRequestState,
    retries_attempted: u32,
    last_sent_ns: Option<u64>,
}

impl PendingBtmRequest {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            BtmRequestState::Completed | BtmRequestState::Failed | BtmRequestState::Dropped
        )
    }

    pub fn drop_request(&mut self) {
        self.state = BtmRequestState::Dropped;
    }
}

/// Disassoc-imminent delay target, in seconds (§4.G): the BTM request's
/// `disassoc_timer_tbtts` is sized so the disassoc actually lands about
/// this long after the request is sent.
pub const DISASSOC_TIMER_TARGET_SECS: u64 = 5;

/// 1 TU (the beacon interval's native unit) is 1024 microseconds.
const TU_MICROS: u64 = 1024;

/// Beacon intervals are conventionally given in TU; convert the
/// disassoc-imminent target into a TBTT count against the station's actual
/// beacon interval, capped at `u16::MAX`.
fn disassoc_timer_tbtts(disassoc_imminent: bool, beacon_interval_tu: u16) -> u16 {
    if !disassoc_imminent {
        return 0;
    }
    let interval_micros = (beacon_interval_tu.max(1) as u64) * TU_MICROS;
    let target_micros = DISASSOC_TIMER_TARGET_SECS * 1_000_000;
    (target_micros / interval_micros).min(u16::MAX as u64) as u16
}

/// Build a BTM request for `target`, ranking up to `policy.max_candidates`
/// neighbor BSSIDs by RCPI descending from the RRM cache. `beacon_interval_tu`
/// is the target BSS's beacon interval (TU), used to size
/// `disassoc_timer_tbtts` to roughly `DISASSOC_TIMER_TARGET_SECS`.
pub fn build_request(
    policy: &BtmPolicy,
    target_sta_mac: MacAddr,
    dialog_token: u8,
    ranked_reports: &[BeaconReport],
    mbo_capable: bool,
    severity: Option<KickSeverity>,
    beacon_interval_tu: u16,
) -> PendingBtmRequest {
    let candidates: Vec<NeighborCandidate> = ranked_reports
        .iter()
        .take(policy.max_candidates)
        .map(|r| NeighborCandidate {
            bssid: r.bssid,
            bssid_info: openband_frame::btm::DEFAULT_BSSID_INFO,
            op_class: r.op_class,
            channel: r.channel,
            phy_type: 9, // VHT, the common case for 5 GHz neighbor candidates
        })
        .collect();

    let frame = BtmRequestFrame {
        dialog_token,
        mode: RequestMode {
            pref: policy.pref,
            abridged: policy.abridged,
            disassoc_imminent: policy.disassoc_imminent,
            bss_termination: policy.bss_termination,
            ess_disassoc_imminent: false,
        },
        disassoc_timer_tbtts: disassoc_timer_tbtts(policy.disassoc_imminent, beacon_interval_tu),
        valid_interval: policy.valid_interval_tbtts,
        candidates,
        mbo_cell_preference: mbo_cell_preference(mbo_capable, severity),
    };

    PendingBtmRequest {
        id: ids::btm_request_id(),
        target_sta_mac,
        frame,
        state: BtmRequestState::Prepared,
        retries_attempted: 0,
        last_sent_ns: None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BtmEngineAction {
    TransmitFrame,
    ScheduleRetry { at_ns: u64 },
    FallThroughToDisassocOrDeauth,
}

pub struct BtmEngine {
    pub policy: BtmPolicy,
}

impl BtmEngine {
    pub fn new(policy: BtmPolicy) -> Self {
        BtmEngine { policy }
    }

    pub fn submit(&self, req: &mut PendingBtmRequest, now_ns: u64) -> Vec<BtmEngineAction> {
        req.state = BtmRequestState::Queued;
        req.last_sent_ns = Some(now_ns);
        req.state = BtmRequestState::Sent;
        vec![BtmEngineAction::TransmitFrame]
    }

    /// Decode the response status code; `0` is success, anything else a
    /// rejection that still counts as `Responded` before the caller marks
    /// `Completed`/`Failed`.
    pub fn on_response(&self, req: &mut PendingBtmRequest, status_code: u8) {
        req.state = BtmRequestState::Responded;
        if status_code == 0 {
            req.state = BtmRequestState::Completed;
        } else {
            req.state = BtmRequestState::Failed;
        }
    }

    /// Retry policy: up to `btm_retries` at `retry_interval`s; on
    /// exhaustion, fall through to disassoc/deauth if configured.
    pub fn on_retry_timer(
        &self,
        req: &mut PendingBtmRequest,
        retry_interval_secs: u64,
        max_retries: u32,
        now_ns: u64,
    ) -> Vec<BtmEngineAction> {
        const NANOS_PER_SEC: u64 = 1_000_000_000;
        if req.is_terminal() {
            return Vec::new();
        }
        if req.retries_attempted >= max_retries {
            req.state = BtmRequestState::Failed;
            return vec![BtmEngineAction::FallThroughToDisassocOrDeauth];
        }
        req.retries_attempted += 1;
        req.last_sent_ns = Some(now_ns);
        vec![
            BtmEngineAction::TransmitFrame,
            BtmEngineAction::ScheduleRetry {
                at_ns: now_ns + retry_interval_secs * NANOS_PER_SEC,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(bssid: MacAddr, rcpi: u8) -> BeaconReport {
        BeaconReport {
            op_class: 115,
            channel: 36,
            rcpi,
            rsni: 10,
            bssid,
        }
    }

    #[test]
    fn build_request_caps_candidates_at_policy_max() {
        let policy = BtmPolicy::default();
        let reports = vec![
            report(MacAddr([1; 6]), 100),
            report(MacAddr([2; 6]), 200),
            report(MacAddr([3; 6]), 150),
            report(MacAddr([4; 6]), 50),
        ];
        let req = build_request(&policy, MacAddr([9; 6]), 1, &reports, false, None, 100);
        assert_eq!(req.frame.candidates.len(), policy.max_candidates);
    }

    #[test]
    fn mbo_reason_and_preference_follow_severity() {
        assert_eq!(
            mbo_cell_preference(true, Some(KickSeverity::Hard)),
            Some(MboCellPreference::RecommendCell)
        );
        assert_eq!(
            mbo_cell_preference(true, Some(KickSeverity::Soft)),
            Some(MboCellPreference::AvoidCell)
        );
        assert_eq!(mbo_cell_preference(true, None), None);
        assert_eq!(mbo_cell_preference(false, Some(KickSeverity::Hard)), None);
    }

    #[test]
    fn disassoc_timer_scales_with_beacon_interval() {
        // 100 TU (~102.4ms) beacon interval: ~5s / 102.4ms ≈ 48 TBTTs.
        let req = build_request(&BtmPolicy::default(), MacAddr([1; 6]), 1, &[], false, None, 100);
        assert_eq!(req.frame.disassoc_timer_tbtts, 48);

        // Doubling the beacon interval halves the TBTT count.
        let req = build_request(&BtmPolicy::default(), MacAddr([1; 6]), 1, &[], false, None, 200);
        assert_eq!(req.frame.disassoc_timer_tbtts, 24);
    }

    #[test]
    fn disassoc_timer_is_zero_when_not_disassoc_imminent() {
        let mut policy = BtmPolicy::default();
        policy.disassoc_imminent = false;
        let req = build_request(&policy, MacAddr([1; 6]), 1, &[], false, None, 100);
        assert_eq!(req.frame.disassoc_timer_tbtts, 0);
    }

    #[test]
    fn submit_transitions_to_sent() {
        let engine = BtmEngine::new(BtmPolicy::default());
        let mut req = build_request(&BtmPolicy::default(), MacAddr([1; 6]), 1, &[], false, None, 100);
        engine.submit(&mut req, 0);
        assert_eq!(req.state, BtmRequestState::Sent);
    }

    #[test]
    fn response_status_zero_completes_others_fail() {
        let engine = BtmEngine::new(BtmPolicy::default());
        let mut req = build_request(&BtmPolicy::default(), MacAddr([1; 6]), 1, &[], false, None, 100);
        engine.submit(&mut req, 0);
        engine.on_response(&mut req, 0);
        assert_eq!(req.state, BtmRequestState::Completed);

        let mut req2 = build_request(&BtmPolicy::default(), MacAddr([1; 6]), 1, &[], false, None, 100);
        engine.submit(&mut req2, 0);
        engine.on_response(&mut req2, 1);
        assert_eq!(req2.state, BtmRequestState::Failed);
    }

    #[test]
    fn retries_exhaust_and_fall_through() {
        let engine = BtmEngine::new(BtmPolicy::default());
        let mut req = build_request(&BtmPolicy::default(), MacAddr([1; 6]), 1, &[], false, None, 100);
        engine.submit(&mut req, 0);
        for _ in 0..3 {
            engine.on_retry_timer(&mut req, 3, 3, 0);
        }
        let actions = engine.on_retry_timer(&mut req, 3, 3, 0);
        assert_eq!(req.state, BtmRequestState::Failed);
        assert!(actions.contains(&BtmEngineAction::FallThroughToDisassocOrDeauth));
    }

    #[test]
    fn dropping_a_request_cancels_retries() {
        let engine = BtmEngine::new(BtmPolicy::default());
        let mut req = build_request(&BtmPolicy::default(), MacAddr([1; 6]), 1, &[], false, None, 100);
        engine.submit(&mut req, 0);
        req.drop_request();
        let actions = engine.on_retry_timer(&mut req, 3, 3, 0);
        assert!(actions.is_empty());
    }
}
