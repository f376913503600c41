//! Association/Reassociation Request information-element walk.
//!
//! IEs are a flat `(id: u8, len: u8, data[len])*` sequence. We walk once,
//! classifying each element, rather than building a generic IE map — the
//! caller only cares about a fixed handful of element IDs.

use openband_common::{OswError, OswResult};

pub const IE_SUPPORTED_RATES: u8 = 1;
pub const IE_EXTENDED_RATES: u8 = 50;
pub const IE_HT_CAPS: u8 = 45;
pub const IE_SUPPORTED_OP_CLASSES: u8 = 59;
pub const IE_RRM_ENABLED_CAPS: u8 = 70;
pub const IE_EXT_CAPS: u8 = 127;
pub const IE_VHT_CAPS: u8 = 191;
pub const IE_VENDOR_SPECIFIC: u8 = 221;
pub const IE_EXTENSION: u8 = 255;
pub const IE_EXT_HE_CAPS: u8 = 35;

pub const MBO_OUI: [u8; 3] = [0x50, 0x6f, 0x9a];
pub const MBO_OUI_TYPE: u8 = 0x16;

/// Supported Channel Width Set field values from VHT Capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VhtChannelWidth {
    NoneOrSubset,
    Plus160,
    Plus80Plus80,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellularDataCapability {
    #[default]
    Unknown,
    Available,
    NotAvailable,
    NotCapable,
}

impl CellularDataCapability {
    fn from_byte(b: u8) -> Self {
        match b {
            1 => CellularDataCapability::Available,
            2 => CellularDataCapability::NotAvailable,
            3 => CellularDataCapability::NotCapable,
            _ => CellularDataCapability::Unknown,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssocCapabilities {
    pub supports_40mhz: bool,
    pub vht_channel_width: Option<VhtChannelWidth>,
    pub he_6ghz_present: bool,
    pub primary_op_class: Option<u8>,
    pub op_classes: Vec<u8>,
    pub rrm_beacon_passive: bool,
    pub rrm_beacon_active: bool,
    pub rrm_beacon_table: bool,
    pub rrm_neighbor_report: bool,
    pub bss_transition: bool,
    pub mbo_capable: bool,
    pub mbo_cell_capability: CellularDataCapability,
    pub mbo_non_preferred_channels: Vec<(u8, u8)>,
}

/// Walk the IE sequence of an Association/Reassociation Request body,
/// extracting the capabilities the steering engine needs.
///
/// Returns `Err` with the offset of the first malformed element; callers
/// never see a partially-walked result mixed with an error.
pub fn parse_assoc_ies(body: &[u8]) -> OswResult<AssocCapabilities> {
    let mut caps = AssocCapabilities::default();
    let mut offset = 0usize;

    while offset < body.len() {
        if offset + 2 > body.len() {
            return Err(OswError::malformed(
                "assoc_ie",
                offset,
                "truncated IE header",
            ));
        }
        let id = body[offset];
        let len = body[offset + 1] as usize;
        let data_start = offset + 2;
        let data_end = data_start + len;
        if data_end > body.len() {
            return Err(OswError::malformed(
                "assoc_ie",
                offset,
                "element length exceeds buffer",
            ));
        }
        let data = &body[data_start..data_end];

        match id {
            IE_HT_CAPS => {
                if let Some(&b1) = data.first() {
                    caps.supports_40mhz = b1 & 0b0000_0010 != 0;
                }
            }
            IE_VHT_CAPS => {
                if let Some(&b0) = data.first() {
                    let width_bits = b0 & 0b0000_0011;
                    caps.vht_channel_width = Some(match width_bits {
                        0b10 => VhtChannelWidth::Plus80Plus80,
                        0b01 => VhtChannelWidth::Plus160,
                        _ => VhtChannelWidth::NoneOrSubset,
                    });
                }
            }
            IE_EXTENSION => {
                if data.first() == Some(&IE_EXT_HE_CAPS) {
                    caps.he_6ghz_present = data.len() > 20;
                }
            }
            IE_SUPPORTED_OP_CLASSES => {
                if let Some((&primary, rest)) = data.split_first() {
                    caps.primary_op_class = Some(primary);
                    caps.op_classes = rest.to_vec();
                }
            }
            IE_RRM_ENABLED_CAPS => {
                if let Some(&b0) = data.first() {
                    caps.rrm_beacon_passive = b0 & 0b0001_0000 != 0;
                    caps.rrm_beacon_active = b0 & 0b0010_0000 != 0;
                    caps.rrm_beacon_table = b0 & 0b0100_0000 != 0;
                }
                if let Some(&b1) = data.get(1) {
                    caps.rrm_neighbor_report = b1 & 0b0000_0010 != 0;
                }
            }
            IE_EXT_CAPS => {
                // Extended Capabilities bit 19 -> byte 2, bit 3.
                if let Some(&b2) = data.get(2) {
                    caps.bss_transition = b2 & 0b0000_1000 != 0;
                }
            }
            IE_VENDOR_SPECIFIC => {
                if data.len() >= 4 && data[0..3] == MBO_OUI && data[3] == MBO_OUI_TYPE {
                    parse_mbo_attributes(&data[4..], &mut caps);
                }
            }
            _ => {}
        }

        offset = data_end;
    }

    Ok(caps)
}

/// MBO attribute TLVs nested inside the vendor-specific IE body, after the
/// OUI + subtype prefix has been stripped.
fn parse_mbo_attributes(mut rest: &[u8], caps: &mut AssocCapabilities) {
    caps.mbo_capable = true;
    const ATTR_NON_PREFERRED_CHANNEL_REPORT: u8 = 0x02;
    const ATTR_CELLULAR_DATA_CAPABILITIES: u8 = 0x03;

    while rest.len() >= 2 {
        let attr_id = rest[0];
        let attr_len = rest[1] as usize;
        if rest.len() < 2 + attr_len {
            break;
        }
        let attr_data = &rest[2..2 + attr_len];
        match attr_id {
            ATTR_CELLULAR_DATA_CAPABILITIES => {
                if let Some(&b) = attr_data.first() {
                    caps.mbo_cell_capability = CellularDataCapability::from_byte(b);
                }
            }
            ATTR_NON_PREFERRED_CHANNEL_REPORT => {
                // op_class, then a list of channel numbers with shared preference.
                if let Some((&op_class, channels)) = attr_data.split_first() {
                    for &ch in channels {
                        caps.mbo_non_preferred_channels.push((op_class, ch));
                    }
                }
            }
            _ => {}
        }
        rest = &rest[2 + attr_len..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ie(id: u8, data: &[u8]) -> Vec<u8> {
        let mut out = vec![id, data.len() as u8];
        out.extend_from_slice(data);
        out
    }

    #[test]
    fn parses_ht_40mhz_bit() {
        let body = ie(IE_HT_CAPS, &[0b0000_0010, 0]);
        let caps = parse_assoc_ies(&body).unwrap();
        assert!(caps.supports_40mhz);
    }

    #[test]
    fn parses_vht_width_80plus80() {
        let body = ie(IE_VHT_CAPS, &[0b0000_0010, 0, 0]);
        let caps = parse_assoc_ies(&body).unwrap();
        assert_eq!(caps.vht_channel_width, Some(VhtChannelWidth::Plus80Plus80));
    }

    #[test]
    fn parses_supported_op_classes() {
        let body = ie(IE_SUPPORTED_OP_CLASSES, &[115, 116, 117]);
        let caps = parse_assoc_ies(&body).unwrap();
        assert_eq!(caps.primary_op_class, Some(115));
        assert_eq!(caps.op_classes, vec![116, 117]);
    }

    #[test]
    fn parses_ext_caps_btm_bit() {
        let body = ie(IE_EXT_CAPS, &[0, 0, 0b0000_1000]);
        let caps = parse_assoc_ies(&body).unwrap();
        assert!(caps.bss_transition);
    }

    #[test]
    fn parses_mbo_cellular_capability() {
        let mut vendor_data = MBO_OUI.to_vec();
        vendor_data.push(MBO_OUI_TYPE);
        vendor_data.extend_from_slice(&[0x03, 1, 1]); // attr=cell data cap, len=1, val=available
        let body = ie(IE_VENDOR_SPECIFIC, &vendor_data);
        let caps = parse_assoc_ies(&body).unwrap();
        assert!(caps.mbo_capable);
        assert_eq!(caps.mbo_cell_capability, CellularDataCapability::Available);
    }

    #[test]
    fn truncated_length_is_malformed_with_offset() {
        let body = vec![IE_HT_CAPS, 10, 1, 2]; // claims 10 bytes, only 2 present
        let err = parse_assoc_ies(&body).unwrap_err();
        assert!(err.to_string().contains('0'));
    }

    #[test]
    fn unknown_ie_ids_are_skipped() {
        let mut body = ie(99, &[1, 2, 3]);
        body.extend(ie(IE_HT_CAPS, &[0b0000_0010]));
        let caps = parse_assoc_ies(&body).unwrap();
        assert!(caps.supports_40mhz);
    }

    proptest::proptest! {
        #[test]
        fn arbitrary_bytes_never_panic(body in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..256)) {
            let _ = parse_assoc_ies(&body);
        }

        #[test]
        fn vht_width_bits_classify_into_exactly_one_class(b0 in proptest::prelude::any::<u8>()) {
            let body = ie(IE_VHT_CAPS, &[b0, 0]);
            let caps = parse_assoc_ies(&body).unwrap();
            let width = caps.vht_channel_width.expect("vht ie always yields a width");
            match b0 & 0b0000_0011 {
                0b10 => assert_eq!(width, VhtChannelWidth::Plus80Plus80),
                0b01 => assert_eq!(width, VhtChannelWidth::Plus160),
                _ => assert_eq!(width, VhtChannelWidth::NoneOrSubset),
            }
        }
    }
}
