//! Station-Assoc Tracker (§4.C): logical stations aggregated across links.
//!
//! A legacy station maps 1:1 link→station. An MLO station is discovered
//! when connects on different vifs share the same driver-reported station
//! mac and `local_mld_addr`; those links merge into one logical station
//! as additional `active_links`. Supplemented link accessors
//! (`find_link`/`active_local_addrs`/`active_remote_addrs`) follow
//! `osw_sta_assoc.h`.

use crate::observer::{ObserverBus, ObserverHandle};
use openband_common::{MacAddr, VifId};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CellStatus {
    #[default]
    Unknown,
    Available,
    NotAvailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub local_sta_addr: MacAddr,
    pub remote_sta_addr: MacAddr,
    pub vif: VifId,
    pub connected: bool,
    pub last_connect_ns: u64,
    pub last_probe_ns: Option<u64>,
    pub assoc_ies: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct StationEntry {
    pub mac: MacAddr,
    pub local_mld_addr: Option<MacAddr>,
    pub cell_status: CellStatus,
    active_links: Vec<Link>,
    stale_links: Vec<Link>,
    ever_connected: bool,
    last_activity_ns: u64,
}

impl StationEntry {
    fn new(mac: MacAddr, now_ns: u64) -> Self {
        StationEntry {
            mac,
            local_mld_addr: None,
            cell_status: CellStatus::Unknown,
            active_links: Vec::new(),
            stale_links: Vec::new(),
            ever_connected: false,
            last_activity_ns: now_ns,
        }
    }

    pub fn is_connected(&self) -> bool {
        !self.active_links.is_empty()
    }

    /// MLO iff some active link's remote address differs from the
    /// station's own mac (legacy stations have exactly one active link
    /// whose remote_sta_addr equals the station mac).
    pub fn is_mlo(&self) -> bool {
        self.active_links.len() > 1
            || self
                .active_links
                .iter()
                .any(|l| l.remote_sta_addr != self.mac)
    }

    pub fn get_active_links(&self) -> &[Link] {
        &self.active_links
    }

    pub fn get_stale_links(&self) -> &[Link] {
        &self.stale_links
    }

    pub fn find_link(&self, local: &MacAddr, remote: &MacAddr) -> Option<&Link> {
        self.active_links
            .iter()
            .chain(self.stale_links.iter())
            .find(|l| l.local_sta_addr == *local && l.remote_sta_addr == *remote)
    }

    pub fn active_local_addrs(&self) -> Vec<MacAddr> {
        self.active_links.iter().map(|l| l.local_sta_addr).collect()
    }

    pub fn active_remote_addrs(&self) -> Vec<MacAddr> {
        self.active_links.iter().map(|l| l.remote_sta_addr).collect()
    }

    pub fn last_activity_ns(&self) -> u64 {
        self.last_activity_ns
    }

    pub fn ever_connected(&self) -> bool {
        self.ever_connected
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationEventKind {
    Connected,
    Reconnected,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationEvent {
    pub mac: MacAddr,
    pub kind: StationEventKind,
}

#[derive(Default)]
pub struct StationAssocTracker {
    stations: std::collections::HashMap<MacAddr, StationEntry>,
    bus: ObserverBus<StationEvent>,
}

impl StationAssocTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, mac: MacAddr, now_ns: u64) -> &mut StationEntry {
        self.stations
            .entry(mac)
            .or_insert_with(|| StationEntry::new(mac, now_ns))
    }

    /// Record a probe observation, creating the station if this is the
    /// first time it's been seen.
    pub fn on_probe(&mut self, mac: MacAddr, now_ns: u64) {
        let entry = self.entry(mac, now_ns);
        entry.last_activity_ns = now_ns;
    }

    /// Record a connect event for one link. Emits `Connected` on first
    /// active link, `Reconnected` on any subsequent active-link change of
    /// an already-connected station.
    pub fn on_connect(
        &mut self,
        vif: VifId,
        local_sta_addr: MacAddr,
        remote_sta_addr: MacAddr,
        mac: MacAddr,
        local_mld_addr: Option<MacAddr>,
        assoc_ies: Option<Vec<u8>>,
        now_ns: u64,
    ) {
        let was_connected = self.stations.get(&mac).is_some_and(|s| s.is_connected());
        let entry = self.entry(mac, now_ns);
        entry.local_mld_addr = local_mld_addr.or(entry.local_mld_addr);
        entry.ever_connected = true;
        entry.last_activity_ns = now_ns;
        entry.active_links.retain(|l| {
            !(l.local_sta_addr == local_sta_addr && l.remote_sta_addr == remote_sta_addr)
        });
        entry.active_links.push(Link {
            local_sta_addr,
            remote_sta_addr,
            vif,
            connected: true,
            last_connect_ns: now_ns,
            last_probe_ns: None,
            assoc_ies,
        });

        let kind = if was_connected {
            StationEventKind::Reconnected
        } else {
            StationEventKind::Connected
        };
        self.bus.notify(&StationEvent { mac, kind });
    }

    /// Record a disconnect for one link, moving it to `stale_links`. Emits
    /// `Disconnected` when `active_links` becomes empty, or `Reconnected`
    /// when the station stays connected on its remaining links (an MLO
    /// station dropping down to fewer links).
    pub fn on_disconnect(
        &mut self,
        vif: &VifId,
        local_sta_addr: MacAddr,
        remote_sta_addr: MacAddr,
        mac: MacAddr,
        now_ns: u64,
    ) {
        let Some(entry) = self.stations.get_mut(&mac) else {
            return;
        };
        entry.last_activity_ns = now_ns;
        let Some(pos) = entry.active_links.iter().position(|l| {
            &l.vif == vif && l.local_sta_addr == local_sta_addr && l.remote_sta_addr == remote_sta_addr
        }) else {
            return;
        };
        let mut link = entry.active_links.remove(pos);
        link.connected = false;
        entry.stale_links.push(link);

        let kind = if entry.active_links.is_empty() {
            StationEventKind::Disconnected
        } else {
            StationEventKind::Reconnected
        };
        self.bus.notify(&StationEvent { mac, kind });
    }

    pub fn lookup(&self, mac: &MacAddr) -> Option<&StationEntry> {
        self.stations.get(mac)
    }

    /// Remove stations that have been disconnected past their ageout:
    /// 7 days if ever connected, 10 minutes if only ever probed.
    pub fn sweep_ageouts(&mut self, now_ns: u64) -> Vec<MacAddr> {
        const NANOS_PER_SEC: u64 = 1_000_000_000;
        let connected_ageout = crate::config::STA_AGEOUT_CONNECTED_SECS * NANOS_PER_SEC;
        let probed_ageout = crate::config::STA_AGEOUT_PROBED_ONLY_SECS * NANOS_PER_SEC;

        let mut removed = Vec::new();
        self.stations.retain(|mac, entry| {
            if entry.is_connected() {
                return true;
            }
            let ageout = if entry.ever_connected {
                connected_ageout
            } else {
                probed_ageout
            };
            let idle = now_ns.saturating_sub(entry.last_activity_ns);
            if idle >= ageout {
                removed.push(*mac);
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn register(
        &mut self,
        filter: impl Fn(&StationEvent) -> bool + 'static,
        callback: impl FnMut(&StationEvent) + 'static,
    ) -> ObserverHandle {
        let replay: Vec<StationEvent> = self
            .stations
            .values()
            .map(|s| StationEvent {
                mac: s.mac,
                kind: if s.is_connected() {
                    StationEventKind::Connected
                } else {
                    StationEventKind::Disconnected
                },
            })
            .filter(|e| filter(e))
            .collect();
        self.bus.register(filter, callback, replay)
    }

    pub fn unregister(&mut self, handle: ObserverHandle) {
        self.bus.unregister(handle);
    }
}
