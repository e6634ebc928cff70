//! Short Burst Data session control for Iridium transceivers.
//!
//! This crate drives the SBD service of an Iridium transceiver over any
//! [`AtTransport`](iridium_core::AtTransport). It provides:
//!
//! - **Command builders** ([`commands`]) -- the exact AT command text for
//!   every SBD and query operation, plus the `AT+SBDRB` buffer decoder.
//! - **Response parsing** ([`response`]) -- the closed set of response line
//!   shapes and one parser per shape.
//! - **Status interpretation** ([`status`]) -- mailbox and session records,
//!   with legacy `+SBDI` codes mapped onto the `+SBDIX` scale.
//! - **Device bring-up** ([`device`]) -- the configuration sequence and the
//!   probe that tells real transceivers from emulators.
//! - **Session control** ([`modem`]) -- [`IridiumModem`] and the exclusive
//!   [`SbdSession`] guard that runs write, read and session operations.
//! - **Builder** ([`builder`]) -- fluent construction of [`IridiumModem`]
//!   with serial port and timeout settings.
//!
//! # Example
//!
//! ```
//! use iridium_sbd::response::{ResponseLine, classify};
//! use iridium_sbd::status::transfer_status;
//!
//! if let ResponseLine::SessionResult(fields) = classify("+SBDIX: 0, 8, 0, 0, 0, 0").unwrap() {
//!     let status = transfer_status(&fields);
//!     assert!(status.outbound_succeeded());
//!     assert_eq!(status.mailbox.outbound_msn, 8);
//! }
//! ```

pub mod builder;
pub mod commands;
pub mod device;
pub mod modem;
pub mod response;
pub mod status;

// Re-export the primary types for ergonomic `use iridium_sbd::*`.
pub use builder::IridiumBuilder;
pub use modem::{IridiumModem, SbdSession};
pub use response::ResponseLine;
