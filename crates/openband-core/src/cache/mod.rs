//! State Cache (§4.B): exclusive owner of Phy/Vif records and raw
//! per-(vif, mac) station presence.
//!
//! The logical, cross-link "Station" object from the data model is owned
//! by [`crate::assoc`], which consumes the raw upserts this cache emits.
//! Splitting the two keeps the driver-facing presence bookkeeping (this
//! module) independent of the MLO merge policy (assoc).

use openband_common::{Channel, MacAddr, OswError, OswResult, PhyId, VifId};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VifKind {
    Ap,
    ApVlan,
    Sta,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VifStatus {
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaLinkStatus {
    Disconnected,
    Connecting,
    Connected,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct ApVifState {
    pub channel: Channel,
    pub ssid: String,
    pub security: String,
}

#[derive(Debug, Clone)]
pub struct StaVifState {
    pub link_status: StaLinkStatus,
    pub linked_bssid: Option<MacAddr>,
    pub linked_channel: Option<Channel>,
}

#[derive(Debug, Clone)]
pub struct PhyRecord {
    pub id: PhyId,
    pub channels: Vec<Channel>,
    pub capabilities: Vec<String>,
    vifs: HashSet<VifId>,
}

#[derive(Debug, Clone)]
pub struct VifRecord {
    pub id: VifId,
    pub phy: PhyId,
    pub kind: VifKind,
    pub status: VifStatus,
    pub bssid: MacAddr,
    pub ap: Option<ApVifState>,
    pub sta: Option<StaVifState>,
    stations: HashSet<MacAddr>,
}

/// Raw per-(vif, mac) presence, as reported directly by the driver. This
/// is deliberately thin — no MLO logic lives here.
#[derive(Debug, Clone)]
pub struct RawStaState {
    pub connected: bool,
    pub last_connect_ns: Option<u64>,
    pub last_probe_ns: Option<u64>,
    pub assoc_ies: Option<Vec<u8>>,
    pub local_mld_addr: Option<MacAddr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RawStaKey {
    vif: VifIdHandle,
    mac: MacAddr,
}

/// `VifId` wraps a `String`, which isn't `Copy`; intern vif keys behind a
/// cheap handle so `RawStaKey` can stay `Copy` for fast hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct VifIdHandle(usize);

#[derive(Default)]
pub struct StateCache {
    phys: HashMap<PhyId, PhyRecord>,
    vifs: HashMap<VifId, VifRecord>,
    vif_handles: HashMap<VifId, VifIdHandle>,
    vif_handle_names: Vec<VifId>,
    raw_stas: HashMap<RawStaKey, RawStaState>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle_for(&mut self, vif: &VifId) -> VifIdHandle {
        if let Some(h) = self.vif_handles.get(vif) {
            return *h;
        }
        let h = VifIdHandle(self.vif_handle_names.len());
        self.vif_handle_names.push(vif.clone());
        self.vif_handles.insert(vif.clone(), h);
        h
    }

    // ---- Phy ----

    pub fn upsert_phy(&mut self, id: PhyId, channels: Vec<Channel>, capabilities: Vec<String>) {
        match self.phys.get_mut(&id) {
            Some(rec) => {
                rec.channels = channels;
                rec.capabilities = capabilities;
            }
            None => {
                self.phys.insert(
                    id.clone(),
                    PhyRecord {
                        id,
                        channels,
                        capabilities,
                        vifs: HashSet::new(),
                    },
                );
            }
        }
    }

    /// Remove a phy and cascade-remove its vifs (and their stas).
    /// Returns the vif ids that were torn down, for the caller to report
    /// onward (e.g. to the assoc tracker and observers).
    pub fn remove_phy(&mut self, id: &PhyId) -> Vec<VifId> {
        let Some(rec) = self.phys.remove(id) else {
            return Vec::new();
        };
        let vif_ids: Vec<VifId> = rec.vifs.into_iter().collect();
        for vif_id in &vif_ids {
            self.remove_vif(vif_id);
        }
        vif_ids
    }

    pub fn lookup_phy(&self, id: &PhyId) -> OswResult<&PhyRecord> {
        self.phys
            .get(id)
            .ok_or_else(|| OswError::not_found(id.to_string()))
    }

    pub fn phy_ids(&self) -> impl Iterator<Item = &PhyId> {
        self.phys.keys()
    }

    // ---- Vif ----

    pub fn upsert_vif(
        &mut self,
        phy: &PhyId,
        id: VifId,
        kind: VifKind,
        status: VifStatus,
        bssid: MacAddr,
        ap: Option<ApVifState>,
        sta: Option<StaVifState>,
    ) -> OswResult<()> {
        if !self.phys.contains_key(phy) {
            return Err(OswError::not_found(phy.to_string()));
        }
        self.handle_for(&id);
        match self.vifs.get_mut(&id) {
            Some(rec) => {
                rec.kind = kind;
                rec.status = status;
                rec.bssid = bssid;
                rec.ap = ap;
                rec.sta = sta;
            }
            None => {
                self.vifs.insert(
                    id.clone(),
                    VifRecord {
                        id: id.clone(),
                        phy: phy.clone(),
                        kind,
                        status,
                        bssid,
                        ap,
                        sta,
                        stations: HashSet::new(),
                    },
                );
                if let Some(phy_rec) = self.phys.get_mut(phy) {
                    phy_rec.vifs.insert(id);
                }
            }
        }
        Ok(())
    }

    /// Remove a vif and cascade-remove its stas. Returns the station macs
    /// that were present on this vif.
    pub fn remove_vif(&mut self, id: &VifId) -> Vec<MacAddr> {
        let Some(rec) = self.vifs.remove(id) else {
            return Vec::new();
        };
        if let Some(phy_rec) = self.phys.get_mut(&rec.phy) {
            phy_rec.vifs.remove(id);
        }
        let handle = self.vif_handles.get(id).copied();
        let macs: Vec<MacAddr> = rec.stations.into_iter().collect();
        if let Some(handle) = handle {
            for mac in &macs {
                self.raw_stas.remove(&RawStaKey { vif: handle, mac: *mac });
            }
        }
        macs
    }

    pub fn lookup_vif(&self, id: &VifId) -> OswResult<&VifRecord> {
        self.vifs
            .get(id)
            .ok_or_else(|| OswError::not_found(id.to_string()))
    }

    pub fn vif_ids_of(&self, phy: &PhyId) -> Vec<VifId> {
        self.phys
            .get(phy)
            .map(|rec| rec.vifs.iter().cloned().collect())
            .unwrap_or_default()
    }

    // ---- raw station presence ----

    pub fn upsert_sta(&mut self, vif: &VifId, mac: MacAddr, state: RawStaState) -> OswResult<()> {
        if !self.vifs.contains_key(vif) {
            return Err(OswError::not_found(vif.to_string()));
        }
        let handle = self.handle_for(vif);
        self.raw_stas.insert(RawStaKey { vif: handle, mac }, state);
        if let Some(rec) = self.vifs.get_mut(vif) {
            rec.stations.insert(mac);
        }
        Ok(())
    }

    pub fn remove_sta(&mut self, vif: &VifId, mac: &MacAddr) -> OswResult<()> {
        let handle = self
            .vif_handles
            .get(vif)
            .copied()
            .ok_or_else(|| OswError::not_found(vif.to_string()))?;
        self.raw_stas.remove(&RawStaKey { vif: handle, mac: *mac });
        if let Some(rec) = self.vifs.get_mut(vif) {
            rec.stations.remove(mac);
        }
        Ok(())
    }

    pub fn lookup_sta(&self, vif: &VifId, mac: &MacAddr) -> OswResult<&RawStaState> {
        let handle = self
            .vif_handles
            .get(vif)
            .copied()
            .ok_or_else(|| OswError::not_found(vif.to_string()))?;
        self.raw_stas
            .get(&RawStaKey { vif: handle, mac: *mac })
            .ok_or_else(|| OswError::not_found(mac.to_string()))
    }
}
