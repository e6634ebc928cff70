//! Shared value types for the SBD session layer.
//!
//! Status records are freshly built from every parsed response and never
//! mutated afterwards. The transceiver is the only source of truth for
//! sequence numbers and mailbox flags.

use std::fmt;

/// Local mailbox state of the transceiver (`AT+SBDS`).
///
/// Reflects only what the unit holds in its own buffers; no satellite
/// contact is involved in producing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Mobile-originated message sequence number (MOMSN).
    pub outbound_msn: i32,
    /// Mobile-terminated message sequence number (MTMSN). `-1` when the unit
    /// has never received a message.
    pub inbound_msn: i32,
    /// Whether the outbound buffer holds a message.
    ///
    /// For session results this flag instead reports that the outbound
    /// transfer failed (see [`TransferStatus`]).
    pub outbound_msg_present: bool,
    /// Whether the inbound buffer holds a message.
    pub inbound_msg_present: bool,
    /// Number of messages waiting at the gateway. Only session results carry
    /// this; plain status queries leave it `None`.
    pub inbound_queued: Option<u32>,
}

/// Outcome of the most recent SBD session (`AT+SBDIX` / `AT+SBDI`).
///
/// Both protocol generations are normalised to the `+SBDIX` status code
/// scale, so callers can treat them uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferStatus {
    /// Mailbox state as reported at the end of the session.
    pub mailbox: MailboxStatus,
    /// Mobile-originated transfer status. 0..=4 mean success, 5 and above
    /// indicate failure.
    pub last_outbound_status: i32,
    /// Mobile-terminated transfer status. 0 = no message, 1 = received,
    /// 2 = mailbox check failed.
    pub last_inbound_status: i32,
}

impl TransferStatus {
    /// Whether the outbound part of the session succeeded.
    pub fn outbound_succeeded(&self) -> bool {
        self.last_outbound_status <= 4
    }
}

/// What sort of device sits at the other end of the link.
///
/// Selected once during bring-up and threaded through the session layer; it
/// decides which mailbox-status line shape is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceKind {
    /// A physical transceiver (9522, 9523, 9602, 9603 ...).
    #[default]
    Real,
    /// A software emulator that prefixes some responses with extra text and
    /// rejects several configuration commands.
    Emulated,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Real => write!(f, "transceiver"),
            DeviceKind::Emulated => write!(f, "emulated transceiver"),
        }
    }
}

/// Hemisphere-tagged position reported by `AT+GPSPOS`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsPosition {
    /// Signed latitude in degrees (south is negative).
    pub latitude: f64,
    /// Signed longitude in degrees (west is negative).
    pub longitude: f64,
    /// Fix-quality character as sent by the device (`V` = no fix).
    pub fix_quality: char,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailbox() -> MailboxStatus {
        MailboxStatus {
            outbound_msn: 5,
            inbound_msn: -1,
            outbound_msg_present: true,
            inbound_msg_present: false,
            inbound_queued: None,
        }
    }

    #[test]
    fn mailbox_equality_covers_every_field() {
        let a = mailbox();
        assert_eq!(a, mailbox());

        let mut b = mailbox();
        b.inbound_queued = Some(0);
        assert_ne!(a, b);

        let mut c = mailbox();
        c.outbound_msg_present = false;
        assert_ne!(a, c);
    }

    #[test]
    fn transfer_equality_extends_mailbox_equality() {
        let a = TransferStatus {
            mailbox: mailbox(),
            last_outbound_status: 0,
            last_inbound_status: 0,
        };
        let mut b = a;
        assert_eq!(a, b);

        b.last_inbound_status = 2;
        assert_ne!(a, b);

        let mut c = a;
        c.mailbox.inbound_msn = 3;
        assert_ne!(a, c);
    }

    #[test]
    fn outbound_success_threshold() {
        let mut s = TransferStatus {
            mailbox: mailbox(),
            last_outbound_status: 4,
            last_inbound_status: 0,
        };
        assert!(s.outbound_succeeded());
        s.last_outbound_status = 5;
        assert!(!s.outbound_succeeded());
    }

    #[test]
    fn device_kind_default_is_real() {
        assert_eq!(DeviceKind::default(), DeviceKind::Real);
        assert_eq!(DeviceKind::Emulated.to_string(), "emulated transceiver");
    }
}
