//! Iridium AT command builders and the `AT+SBDRB` buffer decoder.
//!
//! All functions are pure. They produce command text (without the carriage
//! return, which the link layer appends) or consume raw bytes, and never
//! perform I/O.
//!
//! # Command reference
//!
//! Based on the ISU AT Command Reference for the 9522B, 9602 and 9603.
//! Commands starting with `-MS` are Iridium proprietary; the `+SBD` family
//! drives the Short Burst Data service.

use iridium_core::message::{CHECKSUM_LEN, checksum};
use iridium_core::{Error, Result};

/// Length of the big-endian length prefix on an `AT+SBDRB` buffer.
pub const LENGTH_PREFIX_LEN: usize = 2;

// ---------------------------------------------------------------
// Bring-up
// ---------------------------------------------------------------

/// Restore the active profile (`ATZ`).
pub const RESET: &str = "ATZ";
/// Turn command echo off (`ATE0`).
pub const ECHO_OFF: &str = "ATE0";
/// Enable RTS/CTS flow control (`AT&K3`).
pub const FLOW_CONTROL_RTS_CTS: &str = "AT&K3";
/// Make a DTR drop abort the current command (`AT&D2`).
pub const DTR_ABORTS: &str = "AT&D2";
/// Query the firmware revision (`AT+GMR`).
pub const FIRMWARE_REVISION: &str = "AT+GMR";

// ---------------------------------------------------------------
// Short Burst Data
// ---------------------------------------------------------------

/// Query the local mailbox status (`AT+SBDS`).
pub const MAILBOX_STATUS: &str = "AT+SBDS";
/// Start an extended SBD session (`AT+SBDIX`).
pub const SESSION: &str = "AT+SBDIX";
/// Start a legacy SBD session (`AT+SBDI`).
pub const LEGACY_SESSION: &str = "AT+SBDI";
/// Read the inbound buffer as binary (`AT+SBDRB`).
pub const READ_BINARY: &str = "AT+SBDRB";
/// Clear the outbound buffer (`AT+SBDD0`).
pub const CLEAR_OUTBOUND: &str = "AT+SBDD0";
/// Clear the inbound buffer (`AT+SBDD1`).
pub const CLEAR_INBOUND: &str = "AT+SBDD1";
/// Copy the outbound buffer into the inbound buffer (`AT+SBDTC`).
pub const LOOPBACK: &str = "AT+SBDTC";

/// Handshake line the transceiver sends when it is ready for payload bytes.
pub const READY: &str = "READY";

/// Build an "announce binary write" command (`AT+SBDWB=<n>`).
///
/// `len` counts payload bytes only, not the two checksum bytes that follow.
///
/// ```
/// use iridium_sbd::commands::cmd_write_binary;
///
/// assert_eq!(cmd_write_binary(5), "AT+SBDWB=5");
/// ```
pub fn cmd_write_binary(len: usize) -> String {
    format!("AT+SBDWB={len}")
}

// ---------------------------------------------------------------
// Queries
// ---------------------------------------------------------------

/// Query the network system time (`AT-MSSTM`).
pub const SYSTEM_TIME: &str = "AT-MSSTM";
/// Query the network geolocation fix (`AT-MSGEO`).
pub const GEOLOCATION: &str = "AT-MSGEO";
/// Query signal quality (`AT+CSQ`).
pub const SIGNAL_QUALITY: &str = "AT+CSQ";
/// Query the built-in GPS receiver (`AT+GPSPOS`, handsets only).
pub const GPS_POSITION: &str = "AT+GPSPOS";

// ---------------------------------------------------------------
// Inbound buffer framing
// ---------------------------------------------------------------

/// Split an `AT+SBDRB` buffer into its validated payload.
///
/// The buffer is a 2-byte big-endian payload length, the payload, then the
/// 2-byte checksum of the payload.
///
/// # Errors
///
/// - [`Error::Framing`] if the buffer is shorter than an empty frame or its
///   size disagrees with the declared length.
/// - [`Error::Checksum`] if the trailer does not match the payload.
pub fn decode_read_buffer(buf: &[u8]) -> Result<&[u8]> {
    if buf.len() < LENGTH_PREFIX_LEN + CHECKSUM_LEN {
        let declared = match buf {
            [hi, lo, ..] => usize::from(u16::from_be_bytes([*hi, *lo])),
            _ => 0,
        };
        return Err(Error::Framing {
            declared,
            received: buf.len(),
        });
    }

    let declared = usize::from(u16::from_be_bytes([buf[0], buf[1]]));
    if buf.len() != LENGTH_PREFIX_LEN + declared + CHECKSUM_LEN {
        return Err(Error::Framing {
            declared,
            received: buf.len(),
        });
    }

    let (payload, trailer) = buf[LENGTH_PREFIX_LEN..].split_at(declared);
    let expected = checksum(payload);
    let actual = u16::from_be_bytes([trailer[0], trailer[1]]);
    if expected != actual {
        return Err(Error::Checksum { expected, actual });
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    const READ_VECTOR: &[u8] = b"\x00\x07\x07\x08\x19\x17\x17\x12\x13\x00{";

    #[test]
    fn write_announce_carries_payload_length() {
        assert_eq!(cmd_write_binary(0), "AT+SBDWB=0");
        assert_eq!(cmd_write_binary(340), "AT+SBDWB=340");
    }

    #[test]
    fn decode_valid_buffer() {
        let payload = decode_read_buffer(READ_VECTOR).unwrap();
        assert_eq!(payload, b"\x07\x08\x19\x17\x17\x12\x13");
    }

    #[test]
    fn decode_empty_message() {
        assert_eq!(decode_read_buffer(&[0, 0, 0, 0]).unwrap(), b"");
    }

    #[test]
    fn decode_too_short() {
        match decode_read_buffer(&[0x00, 0x07, 0x01]) {
            Err(Error::Framing { declared, received }) => {
                assert_eq!(declared, 7);
                assert_eq!(received, 3);
            }
            other => panic!("expected Framing, got {other:?}"),
        }
        assert!(matches!(
            decode_read_buffer(&[]),
            Err(Error::Framing {
                declared: 0,
                received: 0
            })
        ));
    }

    #[test]
    fn decode_length_mismatch() {
        let mut long = READ_VECTOR.to_vec();
        long.push(0);
        assert!(matches!(
            decode_read_buffer(&long),
            Err(Error::Framing {
                declared: 7,
                received: 12
            })
        ));

        let short = &READ_VECTOR[..READ_VECTOR.len() - 1];
        assert!(matches!(
            decode_read_buffer(short),
            Err(Error::Framing { .. })
        ));
    }

    #[test]
    fn decode_bad_checksum() {
        let mut corrupt = READ_VECTOR.to_vec();
        corrupt[4] ^= 0x01;
        match decode_read_buffer(&corrupt) {
            Err(Error::Checksum { expected, actual }) => {
                assert_eq!(actual, 0x007B);
                assert_ne!(expected, actual);
            }
            other => panic!("expected Checksum, got {other:?}"),
        }
    }
}
