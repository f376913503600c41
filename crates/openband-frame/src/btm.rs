//! BSS Transition Management (802.11v), category=10 (WNM).
//!
//! Covers the three frames the engine touches: the Request we build and
//! push to the driver (action=7), and the Query/Response we parse back
//! (action=6/8).

use bytes::{BufMut, BytesMut};
use openband_common::{MacAddr, OswError, OswResult};

pub const WNM_CATEGORY: u8 = 10;
pub const ACTION_BTM_QUERY: u8 = 6;
pub const ACTION_BTM_REQUEST: u8 = 7;
pub const ACTION_BTM_RESPONSE: u8 = 8;

/// Default Neighbor Report BSSID Info: reachable, security, key scope.
pub const DEFAULT_BSSID_INFO: u32 = 0x8F;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestMode {
    pub pref: bool,
    pub abridged: bool,
    pub disassoc_imminent: bool,
    pub bss_termination: bool,
    pub ess_disassoc_imminent: bool,
}

impl RequestMode {
    fn to_byte(self) -> u8 {
        let mut b = 0u8;
        if self.pref {
            b |= 0b0000_0001;
        }
        if self.abridged {
            b |= 0b0000_0010;
        }
        if self.disassoc_imminent {
            b |= 0b0000_0100;
        }
        if self.bss_termination {
            b |= 0b0000_1000;
        }
        if self.ess_disassoc_imminent {
            b |= 0b0001_0000;
        }
        b
    }

    fn from_byte(b: u8) -> Self {
        RequestMode {
            pref: b & 0b0000_0001 != 0,
            abridged: b & 0b0000_0010 != 0,
            disassoc_imminent: b & 0b0000_0100 != 0,
            bss_termination: b & 0b0000_1000 != 0,
            ess_disassoc_imminent: b & 0b0001_0000 != 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborCandidate {
    pub bssid: MacAddr,
    pub bssid_info: u32,
    pub op_class: u8,
    pub channel: u8,
    pub phy_type: u8,
}

impl NeighborCandidate {
    const ELEMENT_ID: u8 = 52; // Neighbor Report

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(Self::ELEMENT_ID);
        buf.put_u8(13); // fixed body length, no optional subelements
        buf.put_u32_le(self.bssid_info);
        buf.put_slice(&self.bssid.0);
        buf.put_u8(self.op_class);
        buf.put_u8(self.channel);
        buf.put_u8(self.phy_type);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MboCellPreference {
    RecommendCell,
    AvoidCell,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BtmRequestFrame {
    pub dialog_token: u8,
    pub mode: RequestMode,
    pub disassoc_timer_tbtts: u16,
    pub valid_interval: u8,
    pub candidates: Vec<NeighborCandidate>,
    pub mbo_cell_preference: Option<MboCellPreference>,
}

impl BtmRequestFrame {
    /// Encode the full action-frame body (category/action not included;
    /// those are framed by the caller alongside the management header).
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_u8(self.dialog_token);
        buf.put_u8(self.mode.to_byte());
        buf.put_u16_le(self.disassoc_timer_tbtts);
        buf.put_u8(self.valid_interval);
        for candidate in &self.candidates {
            candidate.encode(&mut buf);
        }
        if let Some(pref) = self.mbo_cell_preference {
            const MBO_ATTR_CELLULAR_DATA_CAPABILITIES: u8 = 0x03;
            buf.put_u8(221); // vendor-specific element id
            buf.put_u8(6); // OUI(3) + subtype(1) + attr header(2) .. value appended below
            buf.put_slice(&[0x50, 0x6f, 0x9a, 0x16]);
            buf.put_u8(MBO_ATTR_CELLULAR_DATA_CAPABILITIES);
            buf.put_u8(1);
            buf.put_u8(match pref {
                MboCellPreference::RecommendCell => 1,
                MboCellPreference::AvoidCell => 2,
            });
        }
        buf
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BtmResponseFrame {
    pub dialog_token: u8,
    pub status_code: u8,
    pub bss_termination_delay: u8,
    pub target_bssid: Option<MacAddr>,
}

impl BtmResponseFrame {
    /// Decode a BTM Response body: dialog_token(1), status(1), term_delay(1),
    /// optional target BSSID(6) present only when status == 0 (accept).
    pub fn decode(body: &[u8]) -> OswResult<Self> {
        if body.len() < 3 {
            return Err(OswError::malformed(
                "btm_response",
                0,
                "body shorter than fixed fields",
            ));
        }
        let dialog_token = body[0];
        let status_code = body[1];
        let bss_termination_delay = body[2];
        let target_bssid = if status_code == 0 && body.len() >= 9 {
            MacAddr::from_slice(&body[3..9])
        } else {
            None
        };
        Ok(BtmResponseFrame {
            dialog_token,
            status_code,
            bss_termination_delay,
            target_bssid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_mode_roundtrips_through_byte() {
        let mode = RequestMode {
            pref: true,
            abridged: true,
            disassoc_imminent: true,
            bss_termination: false,
            ess_disassoc_imminent: false,
        };
        assert_eq!(RequestMode::from_byte(mode.to_byte()), mode);
    }

    #[test]
    fn encodes_request_with_candidates() {
        let req = BtmRequestFrame {
            dialog_token: 1,
            mode: RequestMode {
                pref: true,
                abridged: true,
                disassoc_imminent: true,
                bss_termination: false,
                ess_disassoc_imminent: false,
            },
            disassoc_timer_tbtts: 10,
            valid_interval: 255,
            candidates: vec![NeighborCandidate {
                bssid: MacAddr([1, 2, 3, 4, 5, 6]),
                bssid_info: DEFAULT_BSSID_INFO,
                op_class: 115,
                channel: 36,
                phy_type: 9,
            }],
            mbo_cell_preference: Some(MboCellPreference::RecommendCell),
        };
        let encoded = req.encode();
        assert!(encoded.len() > 5);
        assert_eq!(encoded[0], 1); // dialog_token
        assert_eq!(encoded[3], 10); // disassoc_timer low byte
    }

    #[test]
    fn decodes_accept_response_with_target_bssid() {
        let mut body = vec![1u8, 0u8, 0u8];
        body.extend_from_slice(&[9, 8, 7, 6, 5, 4]);
        let resp = BtmResponseFrame::decode(&body).unwrap();
        assert_eq!(resp.status_code, 0);
        assert_eq!(resp.target_bssid, Some(MacAddr([9, 8, 7, 6, 5, 4])));
    }

    #[test]
    fn decodes_reject_response_without_target_bssid() {
        let body = vec![1u8, 1u8, 0u8];
        let resp = BtmResponseFrame::decode(&body).unwrap();
        assert_eq!(resp.status_code, 1);
        assert_eq!(resp.target_bssid, None);
    }

    #[test]
    fn rejects_truncated_response() {
        assert!(BtmResponseFrame::decode(&[1u8]).is_err());
    }
}
