//! Driver Abstraction Sink (§4.A): a bounded dispatch queue plus a single
//! worker thread that drains it in order, feeding every other component.
//!
//! Grounded on `strata-bonding::runtime::BondingRuntime`'s
//! channel-plus-worker-thread shape: callers never block on the engine,
//! the worker thread owns all mutable state, and shutdown drains and
//! joins cleanly.

use crate::assoc::StationAssocTracker;
use crate::btm::{BtmEngine, PendingBtmRequest};
use crate::cache::{RawStaState, StateCache, VifKind, VifStatus};
use crate::capstore::CapStore;
use crate::config::{RejectMode, SteeringPolicy};
use crate::csa::CsaOverride;
use crate::steer::{KickClass, SteerAction, SteerEvent, SteeringClient};
use openband_common::counters::EngineCounters;
use openband_common::{Channel, MacAddr, PhyId, VifId};
use openband_frame::ie::CellularDataCapability;
use openband_frame::wnm::MboCellUpdate;
use openband_frame::ActionFrame;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::collections::HashMap;
use std::thread;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub enum DriverEvent {
    PhyAdded { phy: PhyId, channels: Vec<Channel> },
    PhyChanged { phy: PhyId, channels: Vec<Channel> },
    PhyRemoved { phy: PhyId },
    VifAdded { phy: PhyId, vif: VifId },
    VifChanged { vif: VifId },
    VifRemoved { vif: VifId },
    StaConnected { vif: VifId, mac: MacAddr, local_mld_addr: Option<MacAddr>, assoc_ies: Vec<u8>, now_ns: u64 },
    StaChanged { vif: VifId, mac: MacAddr, snr_db: i32, now_ns: u64 },
    StaDisconnected { vif: VifId, mac: MacAddr, now_ns: u64 },
    VifFrameRx { vif: VifId, mac: MacAddr, body: Vec<u8>, now_ns: u64 },
    VifProbeReq { vif: VifId, mac: MacAddr, snr_db: i32, blocked: bool, ssid_null: bool, now_ns: u64 },
    CsaToPhy { from_vif: VifId, phy: PhyId, channel: Channel },
}

/// Error reported when an event cannot be handed off to the worker.
#[derive(Debug)]
pub enum DispatchError {
    QueueFull,
    Disconnected,
}

/// All engine state, owned exclusively by the dispatcher worker thread —
/// never touched from any other thread.
pub struct Engine {
    pub cache: StateCache,
    pub assoc: StationAssocTracker,
    pub capstore: CapStore,
    pub steer_policy: SteeringPolicy,
    pub steer_clients: HashMap<MacAddr, SteeringClient>,
    pub btm: BtmEngine,
    pub pending_btm: HashMap<MacAddr, PendingBtmRequest>,
    pub csa_override: Option<CsaOverride>,
    pub counters: EngineCounters,
}

impl Engine {
    pub fn new(steer_policy: SteeringPolicy, btm: BtmEngine) -> Self {
        Engine {
            cache: StateCache::default(),
            assoc: StationAssocTracker::default(),
            capstore: CapStore::new(),
            steer_policy,
            steer_clients: HashMap::new(),
            btm,
            pending_btm: HashMap::new(),
            csa_override: None,
            counters: EngineCounters::new(),
        }
    }

    fn client_mut(&mut self, mac: MacAddr) -> &mut SteeringClient {
        let policy = self.steer_policy.clone();
        self.steer_clients
            .entry(mac)
            .or_insert_with(|| SteeringClient::new(mac, "default", policy))
    }

    /// Act on the counters side effect of a state-machine transition. The
    /// action list itself is exhausted here; transmitting a kick/BTM
    /// request is still the caller's concern via the dispatcher boundary.
    fn apply_steer_actions(&mut self, actions: &[SteerAction]) {
        for action in actions {
            match action {
                SteerAction::RecordSteeringSuccess => self.counters.steering_success_cnt += 1,
                SteerAction::RequestKick(KickClass::Sticky)
                | SteerAction::DeferKickUntilIdle(KickClass::Sticky) => {
                    self.counters.sticky_kick_cnt += 1;
                }
                _ => {}
            }
        }
    }

    /// Process one event in order. Returns nothing: side effects land in
    /// `cache`/`assoc`/`capstore`/`steer_clients`/`counters`, and any
    /// resulting `SteerAction`s are the caller's concern to act on via the
    /// observer buses those components expose.
    pub fn handle(&mut self, event: DriverEvent) {
        match event {
            DriverEvent::PhyAdded { phy, channels } | DriverEvent::PhyChanged { phy, channels } => {
                self.cache.upsert_phy(phy, channels, Vec::new());
            }
            DriverEvent::PhyRemoved { phy } => {
                self.cache.remove_phy(&phy);
            }
            DriverEvent::VifAdded { phy, vif } => {
                if let Err(err) = self.cache.upsert_vif(
                    &phy,
                    vif,
                    VifKind::Sta,
                    VifStatus::Enabled,
                    MacAddr::ZERO,
                    None,
                    None,
                ) {
                    warn!(%err, "vif_added referenced unknown phy");
                }
            }
            DriverEvent::VifChanged { .. } => {}
            DriverEvent::VifRemoved { vif } => {
                self.cache.remove_vif(&vif);
            }
            DriverEvent::StaConnected {
                vif,
                mac,
                local_mld_addr,
                assoc_ies,
                now_ns,
            } => {
                let raw_state = RawStaState {
                    connected: true,
                    last_connect_ns: Some(now_ns),
                    last_probe_ns: None,
                    assoc_ies: Some(assoc_ies.clone()),
                    local_mld_addr,
                };
                if let Err(err) = self.cache.upsert_sta(&vif, mac, raw_state) {
                    warn!(%err, "sta_connected referenced unknown vif");
                }
                self.assoc.on_connect(
                    vif,
                    mac,
                    mac,
                    mac,
                    local_mld_addr,
                    Some(assoc_ies),
                    now_ns,
                );
                let actions = self.client_mut(mac).process_event(SteerEvent::StaConnected, now_ns);
                self.apply_steer_actions(&actions);
            }
            DriverEvent::StaChanged { vif, mac, snr_db, now_ns } => {
                let vif_bssid = self.cache.lookup_vif(&vif).map(|rec| rec.bssid).unwrap_or(MacAddr::ZERO);
                let crossed = self.capstore.update_snr(mac, vif_bssid, snr_db, crate::config::DEFAULT_SNR_HYSTERESIS_DB);
                if let Some(new_snr) = crossed {
                    let actions = self.steer_clients.get_mut(&mac).and_then(|client| {
                        let hwm = client.policy.hwm_dbm;
                        let lwm = client.policy.lwm_dbm;
                        let event = if hwm != 0 && new_snr >= hwm {
                            Some(SteerEvent::SnrCrossedHwm)
                        } else if lwm != 0 && new_snr <= lwm {
                            Some(SteerEvent::SnrBelowLwm)
                        } else {
                            None
                        };
                        event.map(|e| client.process_event(e, now_ns))
                    });
                    if let Some(actions) = actions {
                        self.apply_steer_actions(&actions);
                    }
                }
                let actions = self.steer_clients.get_mut(&mac).map(|client| client.recalc_level(&[snr_db], now_ns));
                if let Some(actions) = actions {
                    self.apply_steer_actions(&actions);
                }
            }
            DriverEvent::StaDisconnected { vif, mac, now_ns } => {
                if let Err(err) = self.cache.remove_sta(&vif, &mac) {
                    warn!(%err, "sta_disconnected for an untracked (vif, mac)");
                }
                self.assoc.on_disconnect(&vif, mac, mac, mac, now_ns);
                if let Some(client) = self.steer_clients.get_mut(&mac) {
                    client.process_event(SteerEvent::StaDisconnected, now_ns);
                }
            }
            DriverEvent::VifFrameRx { mac, body, now_ns, .. } => {
                match openband_frame::parse_action_frame(&body) {
                    Ok(ActionFrame::RrmMeasurementReport(reports)) => {
                        for report in reports {
                            self.capstore.upsert_beacon_report(mac, report, now_ns);
                        }
                    }
                    Ok(ActionFrame::WnmNotificationRequest(notif)) => {
                        if let openband_frame::wnm::WnmNotification::MboCellularUpdate(update) = notif {
                            let mut state = self.capstore.mbo_state(&mac);
                            state.capable = true;
                            state.cell_capability = match update {
                                MboCellUpdate::Available => CellularDataCapability::Available,
                                MboCellUpdate::NotAvailable => CellularDataCapability::NotAvailable,
                                MboCellUpdate::NotCapable => CellularDataCapability::NotCapable,
                                MboCellUpdate::Unknown => CellularDataCapability::Unknown,
                            };
                            self.capstore.update_mbo(mac, state);
                        }
                    }
                    Ok(ActionFrame::BtmResponse(resp)) => {
                        let terminal = if let Some(req) = self.pending_btm.get_mut(&mac) {
                            self.btm.on_response(req, resp.status_code);
                            Some(req.is_terminal())
                        } else {
                            warn!(%mac, "btm response for an untracked request");
                            None
                        };
                        if terminal == Some(true) {
                            self.pending_btm.remove(&mac);
                        }
                    }
                    Ok(ActionFrame::Other { .. }) => {}
                    Err(err) => {
                        if body.len() >= 2
                            && body[0] == openband_frame::rrm::RRM_CATEGORY
                            && body[1] == openband_frame::rrm::RRM_ACTION_MEASUREMENT_REPORT
                        {
                            self.counters.rrm_reports_dropped += 1;
                        }
                        warn!(%err, "failed to parse management frame body");
                    }
                }
            }
            DriverEvent::VifProbeReq { mac, snr_db, blocked, ssid_null, now_ns, .. } => {
                self.assoc.on_probe(mac, now_ns);
                let client = self.client_mut(mac);
                let counts_as_reject = blocked
                    && match client.policy.reject_mode {
                        RejectMode::None => false,
                        RejectMode::ProbeAll => true,
                        RejectMode::ProbeNull => ssid_null,
                        RejectMode::ProbeDirect => !ssid_null,
                        RejectMode::AuthBlocked => false,
                    };
                let mut actions = client.observe_probe_snr(snr_db);
                actions.extend(client.process_event(SteerEvent::ProbeRejected { blocked: counts_as_reject }, now_ns));
                self.apply_steer_actions(&actions);
            }
            DriverEvent::CsaToPhy { from_vif, phy, channel } => {
                debug!(%from_vif, %phy, ?channel, "csa_to_phy armed");
                self.csa_override = Some(CsaOverride {
                    active: true,
                    target_phy: phy,
                    target_channel: channel,
                });
            }
        }
    }
}

/// Non-blocking handle to the dispatch worker. Dropping it drains and
/// joins the worker thread.
pub struct Dispatcher {
    sender: Sender<DriverEvent>,
    handle: Option<thread::JoinHandle<Engine>>,
}

impl Dispatcher {
    pub fn spawn(engine: Engine, capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        let handle = thread::Builder::new()
            .name("openband-dispatch".into())
            .spawn(move || worker(rx, engine))
            .expect("failed to spawn dispatch worker");
        Dispatcher {
            sender: tx,
            handle: Some(handle),
        }
    }

    /// Enqueue an event. Never blocks; on a full queue this increments
    /// the engine's own overflow counter via the worker, but the caller
    /// only learns that the send itself did not land.
    pub fn try_dispatch(&self, event: DriverEvent) -> Result<(), DispatchError> {
        match self.sender.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!("dispatch queue full, dropping event");
                Err(DispatchError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => Err(DispatchError::Disconnected),
        }
    }

    /// Stop the worker and recover the engine state it was holding.
    pub fn shutdown(mut self) -> Option<Engine> {
        let handle = self.handle.take();
        drop(self.sender); // closes the channel; worker's recv() returns Err and exits
        handle.and_then(|h| h.join().ok())
    }
}

fn worker(rx: Receiver<DriverEvent>, mut engine: Engine) -> Engine {
    while let Ok(event) = rx.recv() {
        engine.handle(event);
    }
    engine
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BtmPolicy, SteeringPolicy};

    fn engine() -> Engine {
        Engine::new(SteeringPolicy::default(), BtmEngine::new(BtmPolicy::default()))
    }

    #[test]
    fn phy_vif_sta_lifecycle_flows_through_cache() {
        let mut engine = engine();
        engine.handle(DriverEvent::PhyAdded {
            phy: PhyId::from("phy0"),
            channels: vec![],
        });
        engine.handle(DriverEvent::VifAdded {
            phy: PhyId::from("phy0"),
            vif: VifId::from("wlan0"),
        });
        assert!(engine.cache.lookup_vif(&VifId::from("wlan0")).is_ok());

        engine.handle(DriverEvent::StaConnected {
            vif: VifId::from("wlan0"),
            mac: MacAddr([1; 6]),
            local_mld_addr: None,
            assoc_ies: vec![],
            now_ns: 0,
        });
        assert!(engine.assoc.lookup(&MacAddr([1; 6])).unwrap().is_connected());

        engine.handle(DriverEvent::StaDisconnected {
            vif: VifId::from("wlan0"),
            mac: MacAddr([1; 6]),
            now_ns: 1,
        });
        assert!(!engine.assoc.lookup(&MacAddr([1; 6])).unwrap().is_connected());
    }

    #[test]
    fn vif_added_for_unknown_phy_is_rejected_without_panicking() {
        let mut engine = engine();
        engine.handle(DriverEvent::VifAdded {
            phy: PhyId::from("ghost"),
            vif: VifId::from("wlan1"),
        });
        assert!(engine.cache.lookup_vif(&VifId::from("wlan1")).is_err());
    }

    #[test]
    fn dispatcher_drains_events_in_order() {
        let dispatcher = Dispatcher::spawn(engine(), 16);
        dispatcher
            .try_dispatch(DriverEvent::PhyAdded {
                phy: PhyId::from("phy0"),
                channels: vec![],
            })
            .unwrap();
        dispatcher
            .try_dispatch(DriverEvent::VifAdded {
                phy: PhyId::from("phy0"),
                vif: VifId::from("wlan0"),
            })
            .unwrap();
        let engine = dispatcher.shutdown().expect("worker should join cleanly");
        assert!(engine.cache.lookup_vif(&VifId::from("wlan0")).is_ok());
    }

    #[test]
    fn full_queue_reports_overflow_without_blocking() {
        let dispatcher = Dispatcher::spawn(engine(), 1);
        let mut saw_full = false;
        for _ in 0..10_000 {
            let res = dispatcher.try_dispatch(DriverEvent::VifChanged {
                vif: VifId::from("wlan0"),
            });
            if matches!(res, Err(DispatchError::QueueFull)) {
                saw_full = true;
                break;
            }
        }
        assert!(saw_full, "queue should eventually report full under flood");
        dispatcher.shutdown();
    }

    #[test]
    fn sta_connected_drives_steering_client_to_connected() {
        let mut engine = engine();
        engine.handle(DriverEvent::StaConnected {
            vif: VifId::from("wlan0"),
            mac: MacAddr([2; 6]),
            local_mld_addr: None,
            assoc_ies: vec![],
            now_ns: 0,
        });
        assert_eq!(
            engine.steer_clients.get(&MacAddr([2; 6])).unwrap().state,
            crate::steer::SteeringState::Connected
        );
    }

    #[test]
    fn sta_changed_crossing_lwm_requests_sticky_kick() {
        let mut policy = SteeringPolicy::default();
        policy.lwm_dbm = -80;
        policy.kick_upon_idle = false;
        let mut engine = Engine::new(policy, BtmEngine::new(BtmPolicy::default()));
        let mac = MacAddr([3; 6]);
        engine.handle(DriverEvent::StaConnected {
            vif: VifId::from("wlan0"),
            mac,
            local_mld_addr: None,
            assoc_ies: vec![],
            now_ns: 0,
        });
        // past the default settling-backoff window so the kick isn't suppressed
        engine.handle(DriverEvent::StaChanged {
            vif: VifId::from("wlan0"),
            mac,
            snr_db: -90,
            now_ns: 100 * 1_000_000_000,
        });
        assert_eq!(engine.counters.sticky_kick_cnt, 1);
    }

    #[test]
    fn probe_reject_with_probe_all_mode_escalates_steering_state() {
        let mut policy = SteeringPolicy::default();
        policy.reject_mode = crate::config::RejectMode::ProbeAll;
        policy.max_rejects = 1;
        let mut engine = Engine::new(policy, BtmEngine::new(BtmPolicy::default()));
        let mac = MacAddr([4; 6]);
        engine.handle(DriverEvent::VifProbeReq {
            vif: VifId::from("wlan0"),
            mac,
            snr_db: -70,
            blocked: true,
            ssid_null: true,
            now_ns: 0,
        });
        assert_ne!(
            engine.steer_clients.get(&mac).unwrap().state,
            crate::steer::SteeringState::Disconnected
        );
    }

    #[test]
    fn probe_reject_with_reject_mode_none_is_ignored() {
        let mut policy = SteeringPolicy::default();
        policy.reject_mode = crate::config::RejectMode::None;
        let mut engine = Engine::new(policy, BtmEngine::new(BtmPolicy::default()));
        let mac = MacAddr([5; 6]);
        engine.handle(DriverEvent::VifProbeReq {
            vif: VifId::from("wlan0"),
            mac,
            snr_db: -70,
            blocked: true,
            ssid_null: true,
            now_ns: 0,
        });
        assert_eq!(
            engine.steer_clients.get(&mac).unwrap().state,
            crate::steer::SteeringState::Disconnected
        );
    }

    #[test]
    fn csa_to_phy_arms_the_override() {
        let mut engine = engine();
        assert!(engine.csa_override.is_none());
        engine.handle(DriverEvent::CsaToPhy {
            from_vif: VifId::from("v1_p1"),
            phy: PhyId::from("p2"),
            channel: Channel {
                control_freq_mhz: 5200,
                center_freq0_mhz: 5200,
                center_freq1_mhz: None,
                width: openband_common::ChannelWidth::Mhz20,
            },
        });
        let over = engine.csa_override.expect("override armed");
        assert!(over.active);
        assert_eq!(over.target_phy, PhyId::from("p2"));
    }

    #[test]
    fn wnm_notification_updates_mbo_cell_capability() {
        let mut engine = engine();
        let mac = MacAddr([6; 6]);
        let mut body = vec![openband_frame::wnm::WNM_CATEGORY, openband_frame::wnm::WNM_ACTION_NOTIFICATION_REQUEST, 0, 0xDD];
        body.extend_from_slice(&[0x50, 0x6f, 0x9a, 0x16]); // MBO OUI + subtype
        body.extend_from_slice(&[0x03, 1, 2]); // cellular data capability = not_available
        engine.handle(DriverEvent::VifFrameRx {
            vif: VifId::from("wlan0"),
            mac,
            body,
            now_ns: 0,
        });
        let state = engine.capstore.mbo_state(&mac);
        assert!(state.capable);
        assert_eq!(state.cell_capability, openband_frame::ie::CellularDataCapability::NotAvailable);
    }

    #[test]
    fn malformed_non_rrm_frame_does_not_inflate_rrm_counter() {
        let mut engine = engine();
        engine.handle(DriverEvent::VifFrameRx {
            vif: VifId::from("wlan0"),
            mac: MacAddr([7; 6]),
            body: vec![openband_frame::btm::WNM_CATEGORY], // truncated BTM response, 1 byte
            now_ns: 0,
        });
        assert_eq!(engine.counters.rrm_reports_dropped, 0);
    }

    #[test]
    fn malformed_rrm_frame_increments_rrm_counter() {
        let mut engine = engine();
        engine.handle(DriverEvent::VifFrameRx {
            vif: VifId::from("wlan0"),
            mac: MacAddr([8; 6]),
            body: vec![openband_frame::rrm::RRM_CATEGORY, openband_frame::rrm::RRM_ACTION_MEASUREMENT_REPORT],
            now_ns: 0,
        });
        assert_eq!(engine.counters.rrm_reports_dropped, 1);
    }
}
