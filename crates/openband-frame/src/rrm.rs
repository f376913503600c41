//! RRM (802.11k) Measurement Report action frame, category=5 action=1.
//!
//! Only the Beacon Report subelement of measurement report element 39 is
//! extracted; other measurement types are skipped.

use bytes::Buf;
use openband_common::{MacAddr, OswError, OswResult};

pub const RRM_CATEGORY: u8 = 5;
pub const RRM_ACTION_MEASUREMENT_REPORT: u8 = 1;
pub const MEASUREMENT_REPORT_ELEMENT_ID: u8 = 39;
const MEASUREMENT_TYPE_BEACON: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconReport {
    pub op_class: u8,
    pub channel: u8,
    pub rcpi: u8,
    pub rsni: u8,
    pub bssid: MacAddr,
}

/// Parse the body of a Measurement Report action frame, returning every
/// Beacon Report measurement element found (there may be several reports
/// batched in one frame).
pub fn parse_measurement_report(mut body: &[u8]) -> OswResult<Vec<BeaconReport>> {
    let mut reports = Vec::new();
    let mut consumed = 0usize;

    // dialog_token(1) + repetitions(1) precede the element sequence.
    if body.len() < 2 {
        return Err(OswError::malformed(
            "rrm_measurement_report",
            0,
            "body shorter than fixed fields",
        ));
    }
    body.advance(2);
    consumed += 2;

    while !body.is_empty() {
        if body.len() < 5 {
            return Err(OswError::malformed(
                "rrm_measurement_report",
                consumed,
                "truncated measurement element header",
            ));
        }
        let element_id = body[0];
        let len = body[1] as usize;
        if body.len() < 2 + len {
            return Err(OswError::malformed(
                "rrm_measurement_report",
                consumed,
                "element length exceeds buffer",
            ));
        }
        let element = &body[2..2 + len];

        if element_id == MEASUREMENT_REPORT_ELEMENT_ID {
            if let Some(report) = parse_measurement_element(element, consumed)? {
                reports.push(report);
            }
        }

        let advance = 2 + len;
        body.advance(advance);
        consumed += advance;
    }

    Ok(reports)
}

fn parse_measurement_element(element: &[u8], offset: usize) -> OswResult<Option<BeaconReport>> {
    // token(1) + mode(1) + type(1) + report body
    if element.len() < 3 {
        return Err(OswError::malformed(
            "rrm_measurement_element",
            offset,
            "truncated measurement element",
        ));
    }
    let measurement_type = element[2];
    if measurement_type != MEASUREMENT_TYPE_BEACON {
        return Ok(None);
    }
    let report_body = &element[3..];
    // Beacon report subelement fixed fields: op_class(1) channel(1) start_time(8)
    // duration(2) frame_info(1) rcpi(1) rsni(1) bssid(6) antenna_id(1) parent_tsf(4)
    const FIXED_LEN: usize = 1 + 1 + 8 + 2 + 1 + 1 + 1 + 6 + 1 + 4;
    if report_body.len() < FIXED_LEN {
        return Err(OswError::malformed(
            "rrm_beacon_report",
            offset,
            "truncated beacon report subelement",
        ));
    }
    let op_class = report_body[0];
    let channel = report_body[1];
    let rcpi = report_body[13];
    let rsni = report_body[14];
    let bssid = MacAddr::from_slice(&report_body[15..21])
        .ok_or_else(|| OswError::malformed("rrm_beacon_report", offset, "bad bssid"))?;

    Ok(Some(BeaconReport {
        op_class,
        channel,
        rcpi,
        rsni,
        bssid,
    }))
}
