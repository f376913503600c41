//! Action frame (category, action) discrimination.
//!
//! The management header has already been stripped by the caller; `body`
//! starts at the category byte.

use crate::btm::{self, BtmResponseFrame};
use crate::rrm::{self, BeaconReport};
use crate::wnm::{self, WnmNotification};
use openband_common::{OswError, OswResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionFrame {
    WnmNotificationRequest(WnmNotification),
    BtmResponse(BtmResponseFrame),
    RrmMeasurementReport(Vec<BeaconReport>),
    Other { category: u8, action: u8 },
}

pub fn parse_action_frame(body: &[u8]) -> OswResult<ActionFrame> {
    if body.len() < 2 {
        return Err(OswError::malformed(
            "action_frame",
            0,
            "body shorter than category/action",
        ));
    }
    let category = body[0];
    let action = body[1];
    let rest = &body[2..];

    match (category, action) {
        (wnm::WNM_CATEGORY, wnm::WNM_ACTION_NOTIFICATION_REQUEST) => {
            Ok(ActionFrame::WnmNotificationRequest(
                wnm::parse_notification_request(rest)?,
            ))
        }
        (btm::WNM_CATEGORY, btm::ACTION_BTM_RESPONSE) => {
            Ok(ActionFrame::BtmResponse(BtmResponseFrame::decode(rest)?))
        }
        (rrm::RRM_CATEGORY, rrm::RRM_ACTION_MEASUREMENT_REPORT) => Ok(
            ActionFrame::RrmMeasurementReport(rrm::parse_measurement_report(rest)?),
        ),
        _ => Ok(ActionFrame::Other { category, action }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_btm_response() {
        let mut body = vec![btm::WNM_CATEGORY, btm::ACTION_BTM_RESPONSE];
        body.extend_from_slice(&[1, 0, 0, 1, 2, 3, 4, 5, 6]);
        let parsed = parse_action_frame(&body).unwrap();
        assert!(matches!(parsed, ActionFrame::BtmResponse(_)));
    }

    #[test]
    fn dispatches_wnm_notification() {
        let body = vec![wnm::WNM_CATEGORY, wnm::WNM_ACTION_NOTIFICATION_REQUEST, 0, 0];
        let parsed = parse_action_frame(&body).unwrap();
        assert!(matches!(
            parsed,
            ActionFrame::WnmNotificationRequest(WnmNotification::FirmwareUpdate)
        ));
    }

    #[test]
    fn unrecognized_category_action_is_other() {
        let body = vec![200u8, 201u8];
        let parsed = parse_action_frame(&body).unwrap();
        assert_eq!(
            parsed,
            ActionFrame::Other {
                category: 200,
                action: 201
            }
        );
    }

    #[test]
    fn rejects_truncated_action_frame() {
        assert!(parse_action_frame(&[1u8]).is_err());
    }
}
