//! Xphy-CSA Config Mutator (§4.H), grounded on `ow_xphy_csa_conf.c`.
//!
//! `apply()` returns a six-outcome result rather than a boolean, so a
//! no-op pass documents exactly why — load-bearing for the idempotence
//! property in §8.

use openband_common::{Channel, PhyId, VifId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsaResult {
    /// Override is not armed; nothing to do.
    Inactive,
    /// More than one STA vif is enabled across phys; can't safely re-home.
    MultiStaVif,
    /// The target phy has no STA vif at all.
    NoTargetStaVif,
    /// No STA vif is currently enabled anywhere to move.
    NoCurrentStaVif,
    /// The target STA vif is already enabled; override is disarmed.
    Disarm,
    /// The re-home was applied.
    Applied,
}

#[derive(Debug, Clone)]
pub struct DesiredStaVif {
    pub id: VifId,
    pub enabled: bool,
    pub network_list: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DesiredApVif {
    pub id: VifId,
    pub channel: Channel,
}

#[derive(Debug, Clone)]
pub struct DesiredPhy {
    pub id: PhyId,
    pub sta_vif: Option<DesiredStaVif>,
    pub ap_vifs: Vec<DesiredApVif>,
}

#[derive(Debug, Clone, Default)]
pub struct DesiredConfig {
    pub phys: Vec<DesiredPhy>,
}

impl DesiredConfig {
    fn phy_mut(&mut self, id: &PhyId) -> Option<&mut DesiredPhy> {
        self.phys.iter_mut().find(|p| &p.id == id)
    }

    fn enabled_sta_vif_phys(&self) -> Vec<usize> {
        self.phys
            .iter()
            .enumerate()
            .filter(|(_, p)| p.sta_vif.as_ref().is_some_and(|v| v.enabled))
            .map(|(i, _)| i)
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CsaOverride {
    pub active: bool,
    pub target_phy: PhyId,
    pub target_channel: Channel,
}

/// Apply the override to `config` in place, returning which of the six
/// outcomes occurred. Re-applying an already-applied override is
/// idempotent: the second pass observes the target STA vif already
/// enabled and returns `Disarm`.
pub fn apply(config: &mut DesiredConfig, over: &CsaOverride) -> CsaResult {
    if !over.active {
        return CsaResult::Inactive;
    }

    let enabled_sta = config.enabled_sta_vif_phys();
    if enabled_sta.len() > 1 {
        return CsaResult::MultiStaVif;
    }

    let Some(target_phy) = config.phy_mut(&over.target_phy) else {
        return CsaResult::NoTargetStaVif;
    };
    if target_phy.sta_vif.is_none() {
        return CsaResult::NoTargetStaVif;
    }
    if target_phy.sta_vif.as_ref().unwrap().enabled {
        return CsaResult::Disarm;
    }

    if enabled_sta.is_empty() {
        return CsaResult::NoCurrentStaVif;
    }

    apply_vsta(config, over, enabled_sta[0]);
    apply_channel(config, over);
    CsaResult::Applied
}

fn apply_vsta(config: &mut DesiredConfig, over: &CsaOverride, current_idx: usize) {
    let net_list = config.phys[current_idx]
        .sta_vif
        .as_ref()
        .map(|v| v.network_list.clone())
        .unwrap_or_default();
    if let Some(current) = config.phys[current_idx].sta_vif.as_mut() {
        current.enabled = false;
    }
    if let Some(target) = config.phy_mut(&over.target_phy) {
        if let Some(target_vif) = target.sta_vif.as_mut() {
            target_vif.enabled = true;
            target_vif.network_list = net_list;
        }
    }
}

fn apply_channel(config: &mut DesiredConfig, over: &CsaOverride) {
    if let Some(target) = config.phy_mut(&over.target_phy) {
        for ap in target.ap_vifs.iter_mut() {
            ap.channel = over.target_channel;
        }
    }
}
