//! Turning parsed response fields into status records.
//!
//! Session results come in two generations. `+SBDIX` reports outbound
//! status codes on a 0..=65 scale where 0..=4 mean success. The legacy
//! `+SBDI` uses 0 (nothing to send), 1 (sent) and 2 (failed). Legacy codes
//! are mapped onto the `+SBDIX` scale here so callers see one shape.

use iridium_core::types::{MailboxStatus, TransferStatus};

use crate::response::{MailboxFields, SessionFields};

/// First `+SBDIX` outbound status code that means failure.
pub const MO_FAILURE: i32 = 5;

/// Legacy `+SBDI` outbound code for a failed transfer.
const LEGACY_MO_FAILED: i32 = 2;

/// Build a [`MailboxStatus`] from an `+SBDS` line.
///
/// A flag counts as set only when it is exactly `1`. Plain status queries
/// carry no gateway queue count.
pub fn mailbox_status(fields: &MailboxFields) -> MailboxStatus {
    MailboxStatus {
        outbound_msn: fields.outbound_msn,
        inbound_msn: fields.inbound_msn,
        outbound_msg_present: fields.outbound_flag == 1,
        inbound_msg_present: fields.inbound_flag == 1,
        inbound_queued: None,
    }
}

/// Build a [`TransferStatus`] from an `+SBDIX` line.
///
/// `outbound_msg_present` is set when the outbound transfer failed, since
/// the message is then still sitting in the outbound buffer. An inbound
/// message is present whenever the reported MT length is non-zero.
pub fn transfer_status(fields: &SessionFields) -> TransferStatus {
    TransferStatus {
        mailbox: MailboxStatus {
            outbound_msn: fields.mo_msn,
            inbound_msn: fields.mt_msn,
            outbound_msg_present: fields.mo_status > MO_FAILURE,
            inbound_msg_present: fields.mt_length != 0,
            inbound_queued: Some(fields.mt_queued),
        },
        last_outbound_status: fields.mo_status,
        last_inbound_status: fields.mt_status,
    }
}

/// Map a legacy `+SBDI` outbound code onto the `+SBDIX` scale.
///
/// ```
/// use iridium_sbd::status::normalize_legacy_mo_status;
///
/// assert_eq!(normalize_legacy_mo_status(1), 0);
/// assert_eq!(normalize_legacy_mo_status(2), 5);
/// ```
pub fn normalize_legacy_mo_status(raw: i32) -> i32 {
    if raw < LEGACY_MO_FAILED { 0 } else { MO_FAILURE }
}

/// Build a [`TransferStatus`] from a legacy `+SBDI` line.
pub fn legacy_transfer_status(fields: &SessionFields) -> TransferStatus {
    TransferStatus {
        mailbox: MailboxStatus {
            outbound_msn: fields.mo_msn,
            inbound_msn: fields.mt_msn,
            outbound_msg_present: fields.mo_status == LEGACY_MO_FAILED,
            inbound_msg_present: fields.mt_length != 0,
            inbound_queued: Some(fields.mt_queued),
        },
        last_outbound_status: normalize_legacy_mo_status(fields.mo_status),
        last_inbound_status: fields.mt_status,
    }
}
