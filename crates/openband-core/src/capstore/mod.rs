//! Capability & Cache Store (§4.E): per-station supported-channel set,
//! RRM beacon report cache, SNR crossing detection, and MBO state.
//!
//! The RRM cache is keyed by `(sta, bssid)`, not just `sta`, matching
//! `osw_rrm_bcn_meas_rpt_cache.c` — the BTM Request Engine ranks
//! candidates per-BSSID rather than keeping one report per station.

use crate::observer::{ObserverBus, ObserverHandle};
use openband_common::MacAddr;
use openband_frame::ie::CellularDataCapability;
use openband_frame::rrm::BeaconReport;
use std::collections::HashMap;

pub const NANOS_PER_SEC: u64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelProvenance {
    CurrentOperatingChannel,
    OperatingClassList,
    ChannelList,
    RecentProbeRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Support {
    Supported,
    NotSupported,
    Maybe,
}

struct SupportedFreqEntry {
    provenance: Vec<ChannelProvenance>,
    expires_ns: u64,
}

struct RrmCacheEntry {
    report: BeaconReport,
    expires_ns: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MboState {
    pub capable: bool,
    pub cell_capability: CellularDataCapability,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapStoreEvent {
    SnrCrossed {
        sta: MacAddr,
        vif_bssid: MacAddr,
        snr_db: i32,
    },
    MboChanged {
        sta: MacAddr,
        state: MboState,
    },
}

#[derive(Default)]
struct StationCaps {
    supported_channels: HashMap<u32, SupportedFreqEntry>,
    rrm_cache: HashMap<MacAddr, RrmCacheEntry>,
    last_snr_db: HashMap<MacAddr, i32>,
    mbo: MboState,
}

#[derive(Default)]
pub struct CapStore {
    stations: HashMap<MacAddr, StationCaps>,
    bus: ObserverBus<CapStoreEvent>,
}

impl CapStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn station_mut(&mut self, sta: MacAddr) -> &mut StationCaps {
        self.stations.entry(sta).or_default()
    }

    // ---- supported channel set ----

    pub fn note_supported_freq(
        &mut self,
        sta: MacAddr,
        freq_mhz: u32,
        provenance: ChannelProvenance,
        now_ns: u64,
        ageout_secs: u64,
    ) {
        let expires_ns = now_ns + ageout_secs * NANOS_PER_SEC;
        let caps = self.station_mut(sta);
        let entry = caps
            .supported_channels
            .entry(freq_mhz)
            .or_insert_with(|| SupportedFreqEntry {
                provenance: Vec::new(),
                expires_ns,
            });
        if !entry.provenance.contains(&provenance) {
            entry.provenance.push(provenance);
        }
        entry.expires_ns = expires_ns;
    }

    pub fn supports(&self, sta: &MacAddr, freq_mhz: u32, now_ns: u64) -> Support {
        let Some(caps) = self.stations.get(sta) else {
            return Support::Maybe;
        };
        match caps.supported_channels.get(&freq_mhz) {
            Some(entry) if entry.expires_ns > now_ns => Support::Supported,
            Some(_) => Support::Maybe, // aged out, but station seen before
            None if caps.supported_channels.is_empty() => Support::Maybe,
            None => Support::NotSupported,
        }
    }

    pub fn provenance_of(&self, sta: &MacAddr, freq_mhz: u32) -> Vec<ChannelProvenance> {
        self.stations
            .get(sta)
            .and_then(|c| c.supported_channels.get(&freq_mhz))
            .map(|e| e.provenance.clone())
            .unwrap_or_default()
    }

    // ---- RRM beacon report cache, keyed (sta, bssid) ----

    pub fn upsert_beacon_report(&mut self, sta: MacAddr, report: BeaconReport, now_ns: u64) {
        let expires_ns = now_ns + crate::config::RRM_REPORT_TTL_SECS * NANOS_PER_SEC;
        let bssid = report.bssid;
        self.station_mut(sta)
            .rrm_cache
            .insert(bssid, RrmCacheEntry { report, expires_ns });
    }

    /// Evict expired entries for one station. Called every GC period
    /// per station per §4.E.
    pub fn gc_station(&mut self, sta: &MacAddr, now_ns: u64) -> usize {
        let Some(caps) = self.stations.get_mut(sta) else {
            return 0;
        };
        let before = caps.rrm_cache.len();
        caps.rrm_cache.retain(|_, e| e.expires_ns > now_ns);
        before - caps.rrm_cache.len()
    }

    /// Non-expired beacon reports for a station, ranked by RCPI descending
    /// and capped at `limit` — the shape the BTM Request Engine consumes
    /// directly for candidate selection.
    pub fn ranked_beacon_reports(&self, sta: &MacAddr, now_ns: u64, limit: usize) -> Vec<BeaconReport> {
        let Some(caps) = self.stations.get(sta) else {
            return Vec::new();
        };
        let mut reports: Vec<&BeaconReport> = caps
            .rrm_cache
            .values()
            .filter(|e| e.expires_ns > now_ns)
            .map(|e| &e.report)
            .collect();
        reports.sort_by(|a, b| b.rcpi.cmp(&a.rcpi));
        reports.into_iter().take(limit).cloned().collect()
    }

    // ---- SNR stream ----

    /// Update the last-known SNR for (sta, vif_bssid). Returns `Some` only
    /// when the change exceeds `hysteresis_db`, in which case observers
    /// are also notified with a `SnrCrossed` event.
    pub fn update_snr(
        &mut self,
        sta: MacAddr,
        vif_bssid: MacAddr,
        snr_db: i32,
        hysteresis_db: i32,
    ) -> Option<i32> {
        let caps = self.station_mut(sta);
        let crossed = match caps.last_snr_db.get(&vif_bssid) {
            Some(&prev) => (snr_db - prev).abs() >= hysteresis_db,
            None => true,
        };
        caps.last_snr_db.insert(vif_bssid, snr_db);
        if crossed {
            self.bus.notify(&CapStoreEvent::SnrCrossed {
                sta,
                vif_bssid,
                snr_db,
            });
            Some(snr_db)
        } else {
            None
        }
    }

    // ---- MBO state ----

    pub fn update_mbo(&mut self, sta: MacAddr, state: MboState) {
        let caps = self.station_mut(sta);
        if caps.mbo != state {
            caps.mbo = state;
            self.bus.notify(&CapStoreEvent::MboChanged { sta, state });
        }
    }

    pub fn mbo_state(&self, sta: &MacAddr) -> MboState {
        self.stations.get(sta).map(|c| c.mbo).unwrap_or_default()
    }

    pub fn register(
        &mut self,
        filter: impl Fn(&CapStoreEvent) -> bool + 'static,
        callback: impl FnMut(&CapStoreEvent) + 'static,
    ) -> ObserverHandle {
        self.bus.register(filter, callback, Vec::new())
    }

    pub fn unregister(&mut self, handle: ObserverHandle) {
        self.bus.unregister(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(b: u8) -> MacAddr {
        MacAddr([b; 6])
    }

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
    fn supports_is_maybe_for_unknown_station() {
        let store = CapStore::new();
        assert_eq!(store.supports(&mac(1), 2412, 0), Support::Maybe);
    }

    #[test]
    fn supports_returns_supported_within_ageout() {
        let mut store = CapStore::new();
        store.note_supported_freq(mac(1), 2412, ChannelProvenance::CurrentOperatingChannel, 0, 3600);
        assert_eq!(store.supports(&mac(1), 2412, 1000), Support::Supported);
    }

    #[test]
    fn supports_returns_not_supported_for_other_freq_on_known_station() {
        let mut store = CapStore::new();
        store.note_supported_freq(mac(1), 2412, ChannelProvenance::CurrentOperatingChannel, 0, 3600);
        assert_eq!(store.supports(&mac(1), 5180, 1000), Support::NotSupported);
    }

    #[test]
    fn rrm_cache_ranks_by_rcpi_descending() {
        let mut store = CapStore::new();
        store.upsert_beacon_report(mac(1), report(mac(10), 150), 0);
        store.upsert_beacon_report(mac(1), report(mac(11), 200), 0);
        store.upsert_beacon_report(mac(1), report(mac(12), 100), 0);
        let ranked = store.ranked_beacon_reports(&mac(1), 0, 3);
        assert_eq!(ranked[0].bssid, mac(11));
        assert_eq!(ranked[1].bssid, mac(10));
        assert_eq!(ranked[2].bssid, mac(12));
    }

    #[test]
    fn rrm_cache_respects_ttl() {
        let mut store = CapStore::new();
        store.upsert_beacon_report(mac(1), report(mac(10), 150), 0);
        let ttl_ns = crate::config::RRM_REPORT_TTL_SECS * NANOS_PER_SEC;
        assert_eq!(store.ranked_beacon_reports(&mac(1), ttl_ns - 1, 3).len(), 1);
        assert_eq!(store.ranked_beacon_reports(&mac(1), ttl_ns + 1, 3).len(), 0);
    }

    #[test]
    fn gc_station_evicts_expired_only() {
        let mut store = CapStore::new();
        store.upsert_beacon_report(mac(1), report(mac(10), 150), 0);
        let ttl_ns = crate::config::RRM_REPORT_TTL_SECS * NANOS_PER_SEC;
        let evicted = store.gc_station(&mac(1), ttl_ns + 1);
        assert_eq!(evicted, 1);
    }

    #[test]
    fn snr_update_below_hysteresis_does_not_cross() {
        let mut store = CapStore::new();
        store.update_snr(mac(1), mac(2), -70, 2);
        assert_eq!(store.update_snr(mac(1), mac(2), -71, 2), None);
    }

    #[test]
    fn snr_update_beyond_hysteresis_crosses() {
        let mut store = CapStore::new();
        store.update_snr(mac(1), mac(2), -70, 2);
        assert_eq!(store.update_snr(mac(1), mac(2), -73, 2), Some(-73));
    }

    #[test]
    fn mbo_state_change_notifies_observers() {
        let mut store = CapStore::new();
        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let seen2 = seen.clone();
        store.register(|_| true, move |e| seen2.borrow_mut().push(*e));
        store.update_mbo(
            mac(1),
            MboState {
                capable: true,
                cell_capability: CellularDataCapability::Available,
            },
        );
        assert_eq!(seen.borrow().len(), 1);
        // Repeating the same state must not re-notify.
        store.update_mbo(
            mac(1),
            MboState {
                capable: true,
                cell_capability: CellularDataCapability::Available,
            },
        );
        assert_eq!(seen.borrow().len(), 1);
    }
}
