//! 802.11 management header (24 bytes, fixed).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Frame Control (16, LE)     |   Duration (16, LE)          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                       Address 1 (DA, 6 bytes)                 |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                       Address 2 (SA, 6 bytes)                  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                       Address 3 (BSSID, 6 bytes)               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Seq Control (16, LE)       |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use bytes::Buf;
use openband_common::{MacAddr, OswError, OswResult};

pub const MGMT_HEADER_LEN: usize = 24;

/// Frame type as carried in the frame control field's type subfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Management,
    Control,
    Data,
    Extension,
}

impl FrameType {
    fn from_bits(bits: u8) -> Self {
        match bits {
            0 => FrameType::Management,
            1 => FrameType::Control,
            2 => FrameType::Data,
            _ => FrameType::Extension,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameControl {
    pub frame_type: FrameType,
    pub subtype: u8,
}

impl FrameControl {
    fn decode(raw: u16) -> Self {
        let protocol_subfields = raw & 0x00ff;
        let frame_type = FrameType::from_bits(((protocol_subfields >> 2) & 0x3) as u8);
        let subtype = ((protocol_subfields >> 4) & 0xf) as u8;
        FrameControl {
            frame_type,
            subtype,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagementHeader {
    pub frame_control: FrameControl,
    pub da: MacAddr,
    pub sa: MacAddr,
    pub bssid: MacAddr,
    pub seq_control: u16,
}

impl ManagementHeader {
    /// Parse the fixed 24-byte management header. `buf` is advanced past it.
    pub fn decode(buf: &mut impl Buf) -> OswResult<Self> {
        if buf.remaining() < MGMT_HEADER_LEN {
            return Err(OswError::malformed(
                "mgmt_header",
                0,
                "buffer shorter than fixed header",
            ));
        }
        let fc_raw = buf.get_u16_le();
        let frame_control = FrameControl::decode(fc_raw);
        let _duration = buf.get_u16_le();

        let mut addr = |offset: usize| -> OswResult<MacAddr> {
            let mut bytes = [0u8; 6];
            buf.copy_to_slice(&mut bytes);
            MacAddr::from_slice(&bytes)
                .ok_or_else(|| OswError::malformed("mgmt_header", offset, "bad address"))
        };
        let da = addr(4)?;
        let sa = addr(10)?;
        let bssid = addr(16)?;
        let seq_control = buf.get_u16_le();

        Ok(ManagementHeader {
            frame_control,
            da,
            sa,
            bssid,
            seq_control,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};

    fn sample_header_bytes() -> BytesMut {
        let mut buf = BytesMut::new();
        // type=management(0), subtype=assoc-req(0) -> protocol subfields 0x00
        buf.put_u16_le(0x0000);
        buf.put_u16_le(0); // duration
        buf.put_slice(&[0xaa; 6]); // da
        buf.put_slice(&[0xbb; 6]); // sa
        buf.put_slice(&[0xcc; 6]); // bssid
        buf.put_u16_le(0); // seq control
        buf
    }

    #[test]
    fn decodes_fixed_header() {
        let mut buf = sample_header_bytes();
        let hdr = ManagementHeader::decode(&mut buf).unwrap();
        assert_eq!(hdr.frame_control.frame_type, FrameType::Management);
        assert_eq!(hdr.sa, MacAddr([0xbb; 6]));
        assert_eq!(hdr.bssid, MacAddr([0xcc; 6]));
    }

    #[test]
    fn rejects_short_buffer() {
        let mut buf = BytesMut::from(&b"short"[..]);
        assert!(ManagementHeader::decode(&mut buf).is_err());
    }

    #[test]
    fn decodes_action_frame_type() {
        let mut buf = BytesMut::new();
        // type=management(0), subtype=action(13=0b1101) -> bits: type(2) at pos2..3, subtype(4) at pos4..7
        let protocol_subfields: u16 = (0b1101 << 4) | (0 << 2);
        buf.put_u16_le(protocol_subfields);
        buf.put_u16_le(0);
        buf.put_slice(&[0; 18]);
        buf.put_u16_le(0);
        let hdr = ManagementHeader::decode(&mut buf).unwrap();
        assert_eq!(hdr.frame_control.subtype, 13);
    }
}
