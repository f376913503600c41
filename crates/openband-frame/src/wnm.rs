//! WNM (802.11v) Notification Request, category=10 action=26.
//!
//! The only type byte we care about is vendor-specific (0xDD), which nests
//! a WFA-MBO subelement walk carrying updated cellular data capability.

use openband_common::{OswError, OswResult};

pub const WNM_CATEGORY: u8 = 10;
pub const WNM_ACTION_NOTIFICATION_REQUEST: u8 = 26;

const WNM_TYPE_FIRMWARE_UPDATE: u8 = 0x00;
const WNM_TYPE_BEACON_PROTECTION: u8 = 0x02;
const WNM_TYPE_VENDOR_SPECIFIC: u8 = 0xDD;

const MBO_ATTR_CELLULAR_DATA_CAPABILITIES: u8 = 0x03;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MboCellUpdate {
    #[default]
    Unknown,
    Available,
    NotAvailable,
    NotCapable,
}

impl MboCellUpdate {
    fn from_byte(b: u8) -> Self {
        match b {
            1 => MboCellUpdate::Available,
            2 => MboCellUpdate::NotAvailable,
            3 => MboCellUpdate::NotCapable,
            _ => MboCellUpdate::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WnmNotification {
    FirmwareUpdate,
    BeaconProtection,
    MboCellularUpdate(MboCellUpdate),
    Other(u8),
}

/// Parse a WNM Notification Request body: dialog_token(1), type(1), subelements.
pub fn parse_notification_request(body: &[u8]) -> OswResult<WnmNotification> {
    if body.len() < 2 {
        return Err(OswError::malformed(
            "wnm_notification_request",
            0,
            "body shorter than fixed fields",
        ));
    }
    let notification_type = body[1];
    match notification_type {
        WNM_TYPE_FIRMWARE_UPDATE => Ok(WnmNotification::FirmwareUpdate),
        WNM_TYPE_BEACON_PROTECTION => Ok(WnmNotification::BeaconProtection),
        WNM_TYPE_VENDOR_SPECIFIC => {
            let update = parse_mbo_subelements(&body[2..])?;
            Ok(WnmNotification::MboCellularUpdate(update))
        }
        other => Ok(WnmNotification::Other(other)),
    }
}

/// Walk the WFA-MBO vendor subelements nested inside the notification body,
/// after the dialog_token/type prefix has been stripped. Mirrors the
/// OUI(3) + subtype(1) prefix used by the association-request MBO IE.
fn parse_mbo_subelements(mut rest: &[u8]) -> OswResult<MboCellUpdate> {
    if rest.len() < 4 {
        return Err(OswError::malformed(
            "wnm_mbo_subelements",
            0,
            "vendor body shorter than OUI prefix",
        ));
    }
    // skip OUI(3) + subtype(1)
    rest = &rest[4..];

    let mut update = MboCellUpdate::Unknown;
    while rest.len() >= 2 {
        let attr_id = rest[0];
        let attr_len = rest[1] as usize;
        if rest.len() < 2 + attr_len {
            break;
        }
        let attr_data = &rest[2..2 + attr_len];
        if attr_id == MBO_ATTR_CELLULAR_DATA_CAPABILITIES {
            if let Some(&b) = attr_data.first() {
                update = MboCellUpdate::from_byte(b);
            }
        }
        rest = &rest[2 + attr_len..];
    }
    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_firmware_update_type() {
        let body = [0u8, WNM_TYPE_FIRMWARE_UPDATE];
        assert_eq!(
            parse_notification_request(&body).unwrap(),
            WnmNotification::FirmwareUpdate
        );
    }

    #[test]
    fn parses_mbo_cellular_update() {
        let mut body = vec![0u8, WNM_TYPE_VENDOR_SPECIFIC];
        body.extend_from_slice(&[0x50, 0x6f, 0x9a, 0x16]); // OUI + subtype
        body.extend_from_slice(&[0x03, 1, 2]); // attr=cell data, len=1, val=not available
        let parsed = parse_notification_request(&body).unwrap();
        assert_eq!(
            parsed,
            WnmNotification::MboCellularUpdate(MboCellUpdate::NotAvailable)
        );
    }

    #[test]
    fn rejects_truncated_body() {
        assert!(parse_notification_request(&[0u8]).is_err());
    }
}
