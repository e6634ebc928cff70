//! IridiumModem -- SBD session control over an [`AtTransport`].
//!
//! [`IridiumModem`] owns the link to one transceiver. Every operation runs
//! on an [`SbdSession`], a guard obtained from [`IridiumModem::session`]
//! that holds the link exclusively, so command sequences from different
//! tasks can never interleave on the wire.
//!
//! Each operation sends one or more commands in a fixed order and parses
//! exactly one response line per command, except `AT+SBDRB`, whose buffer
//! is read as a length-prefixed binary frame. Nothing is retried: the first
//! failure ends the operation and is returned to the caller.
//!
//! # Writing a message
//!
//! ```text
//! AT+SBDWB=<n>    -> READY
//! <payload><sum>  -> <code>        (0 = accepted)
//! AT+SBDS         -> +SBDS: ...    (sequence number for the message)
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use iridium_core::geo::{self, GeoFix};
use iridium_core::message::{BinaryMessage, MAX_OUTBOUND_PAYLOAD};
use iridium_core::time::{self, Era};
use iridium_core::transport::AtTransport;
use iridium_core::types::{DeviceKind, GpsPosition, MailboxStatus, TransferStatus};
use iridium_core::{Error, Result};

use crate::commands;
use crate::response;
use crate::status;

/// `AT+CSQ` value meaning the signal strength is unknown.
const SIGNAL_UNKNOWN: u8 = 99;

/// Per-link settings fixed at build time.
#[derive(Debug, Clone, Copy)]
struct Settings {
    device_kind: DeviceKind,
    command_timeout: Duration,
    session_timeout: Duration,
    era: Era,
}

/// A connected Iridium transceiver.
///
/// Constructed via [`IridiumBuilder`](crate::builder::IridiumBuilder).
pub struct IridiumModem {
    transport: Mutex<Box<dyn AtTransport>>,
    settings: Settings,
}

impl IridiumModem {
    /// Create a modem from an initialised link.
    ///
    /// This is called by [`IridiumBuilder`](crate::builder::IridiumBuilder);
    /// callers should use the builder API instead.
    pub(crate) fn new(
        transport: Box<dyn AtTransport>,
        device_kind: DeviceKind,
        command_timeout: Duration,
        session_timeout: Duration,
        era: Era,
    ) -> Self {
        IridiumModem {
            transport: Mutex::new(transport),
            settings: Settings {
                device_kind,
                command_timeout,
                session_timeout,
                era,
            },
        }
    }

    /// The kind of device detected during bring-up.
    pub fn device_kind(&self) -> DeviceKind {
        self.settings.device_kind
    }

    /// The network era used to decode times.
    pub fn era(&self) -> Era {
        self.settings.era
    }

    /// Timeout for ordinary commands.
    pub fn command_timeout(&self) -> Duration {
        self.settings.command_timeout
    }

    /// Timeout for `AT+SBDIX` / `AT+SBDI`.
    pub fn session_timeout(&self) -> Duration {
        self.settings.session_timeout
    }

    /// Take exclusive use of the link.
    ///
    /// Waits until any other session on this modem has been dropped.
    pub async fn session(&self) -> SbdSession<'_> {
        SbdSession {
            transport: self.transport.lock().await,
            settings: self.settings,
        }
    }

    /// Close the link. Later operations fail with whatever the link reports
    /// for a closed port.
    pub async fn close(&self) -> Result<()> {
        self.transport.lock().await.close().await
    }
}

/// Exclusive handle on a transceiver's link.
///
/// All SBD operations are methods on this guard. Dropping it releases the
/// link for the next caller.
pub struct SbdSession<'a> {
    transport: MutexGuard<'a, Box<dyn AtTransport>>,
    settings: Settings,
}

impl SbdSession<'_> {
    async fn command(&mut self, command: &str, timeout: Duration) -> Result<Vec<String>> {
        debug!(command, timeout_s = timeout.as_secs(), "sending");
        self.transport.command(command, timeout, None).await
    }

    // ---------------------------------------------------------------
    // Mailbox
    // ---------------------------------------------------------------

    /// Read the local mailbox status (`AT+SBDS`). No satellite contact.
    pub async fn status(&mut self) -> Result<MailboxStatus> {
        let lines = self
            .command(commands::MAILBOX_STATUS, self.settings.command_timeout)
            .await?;
        let fields = response::parse_mailbox_status(
            first_line(&lines, "+SBDS")?,
            self.settings.device_kind,
        )?;
        Ok(status::mailbox_status(&fields))
    }

    /// Place `msg` in the outbound buffer.
    ///
    /// On success the transceiver's mailbox status is returned and the
    /// message takes the outbound sequence number the device reports.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidParameter`] if the payload exceeds 340 bytes.
    /// - [`Error::Protocol`] if the device does not answer `READY`, including
    ///   when it rejects the announce outright.
    /// - [`Error::WriteRejected`] if the device refuses the payload.
    pub async fn write_outbound_message(
        &mut self,
        msg: &mut BinaryMessage,
    ) -> Result<MailboxStatus> {
        let len = msg.data().len();
        if len > MAX_OUTBOUND_PAYLOAD {
            return Err(Error::InvalidParameter(format!(
                "payload is {len} bytes, the outbound buffer holds {MAX_OUTBOUND_PAYLOAD}"
            )));
        }

        let announce = commands::cmd_write_binary(len);
        debug!(command = %announce, "announcing write");
        let lines = self
            .transport
            .command(
                &announce,
                self.settings.command_timeout,
                Some(commands::READY),
            )
            .await
            .map_err(|e| match e {
                Error::CommandFailed { response, .. } => Error::Protocol(format!(
                    "expected READY after {announce}, got {response}"
                )),
                e => e,
            })?;
        match lines.first() {
            Some(line) if response::is_ready(line) => {}
            other => {
                return Err(Error::Protocol(format!(
                    "expected READY after {announce}, got {other:?}"
                )));
            }
        }

        let wire = msg.to_wire();
        debug!(bytes = wire.len(), "writing payload");
        let lines = self
            .transport
            .write_raw(&wire, self.settings.command_timeout)
            .await?;
        let code = response::parse_result_code(first_line(&lines, "result code")?)?;
        if code != 0 {
            return Err(Error::WriteRejected(code));
        }

        let status = self.status().await?;
        msg.assign_sequence(status.outbound_msn);
        debug!(momsn = status.outbound_msn, "outbound message stored");
        Ok(status)
    }

    /// Read the inbound buffer.
    ///
    /// The message takes the inbound sequence number from an `AT+SBDS`
    /// query made just before the read. A message arriving between the two
    /// commands would carry a stale number; the device offers no atomic
    /// alternative.
    ///
    /// # Errors
    ///
    /// - [`Error::Framing`] if the buffer size disagrees with its length prefix.
    /// - [`Error::Checksum`] if the checksum trailer does not match.
    pub async fn read_inbound_message(&mut self) -> Result<BinaryMessage> {
        let status = self.status().await?;

        debug!(command = commands::READ_BINARY, "reading inbound buffer");
        let raw = self
            .transport
            .read_binary(commands::READ_BINARY, self.settings.command_timeout)
            .await?;
        let payload = commands::decode_read_buffer(&raw)?;

        debug!(mtmsn = status.inbound_msn, bytes = payload.len(), "inbound message read");
        Ok(BinaryMessage::received(status.inbound_msn, payload))
    }

    /// Clear the outbound buffer (`AT+SBDD0`).
    pub async fn clear_outbound(&mut self) -> Result<()> {
        self.command(commands::CLEAR_OUTBOUND, self.settings.command_timeout)
            .await
            .map(drop)
    }

    /// Clear the inbound buffer (`AT+SBDD1`).
    pub async fn clear_inbound(&mut self) -> Result<()> {
        self.command(commands::CLEAR_INBOUND, self.settings.command_timeout)
            .await
            .map(drop)
    }

    /// Copy the outbound buffer into the inbound buffer (`AT+SBDTC`).
    ///
    /// Returns the number of bytes copied. Useful for testing a write/read
    /// round trip without airtime.
    pub async fn copy_outbound_to_inbound(&mut self) -> Result<usize> {
        let lines = self
            .command(commands::LOOPBACK, self.settings.command_timeout)
            .await?;
        response::parse_loopback_size(first_line(&lines, "SBDTC")?)
    }

    // ---------------------------------------------------------------
    // Sessions
    // ---------------------------------------------------------------

    /// Run an extended SBD session (`AT+SBDIX`).
    ///
    /// Satellite acquisition can take minutes, so this uses the session
    /// timeout rather than the command timeout.
    pub async fn initiate_session(&mut self) -> Result<TransferStatus> {
        let lines = self
            .command(commands::SESSION, self.settings.session_timeout)
            .await?;
        let fields = response::parse_session_result(first_line(&lines, "+SBDIX")?)?;
        let status = status::transfer_status(&fields);
        debug!(?status, "session complete");
        Ok(status)
    }

    /// Run a legacy SBD session (`AT+SBDI`), normalised to the `+SBDIX`
    /// status scale.
    pub async fn initiate_legacy_session(&mut self) -> Result<TransferStatus> {
        let lines = self
            .command(commands::LEGACY_SESSION, self.settings.session_timeout)
            .await?;
        let fields = response::parse_legacy_session_result(first_line(&lines, "+SBDI")?)?;
        let status = status::legacy_transfer_status(&fields);
        debug!(?status, "legacy session complete");
        Ok(status)
    }

    // ---------------------------------------------------------------
    // Network and position queries
    // ---------------------------------------------------------------

    /// Current network time (`AT-MSSTM`), decoded in the configured era.
    pub async fn system_time(&mut self) -> Result<DateTime<Utc>> {
        let lines = self
            .command(commands::SYSTEM_TIME, self.settings.command_timeout)
            .await?;
        let ticks = response::parse_network_time(first_line(&lines, "-MSSTM")?)?;
        time::ticks_to_datetime(ticks, self.settings.era)
    }

    /// Position of the last network geolocation fix (`AT-MSGEO`).
    pub async fn geolocation(&mut self) -> Result<GeoFix> {
        let lines = self
            .command(commands::GEOLOCATION, self.settings.command_timeout)
            .await?;
        let (x, y, z, fix_ticks) = response::parse_geolocation(first_line(&lines, "-MSGEO")?)?;
        geo::decode_fix(x, y, z, &fix_ticks, self.settings.era)
    }

    /// Signal strength in bars (0..=5), or `None` when unknown (`AT+CSQ`).
    pub async fn signal_quality(&mut self) -> Result<Option<u8>> {
        let lines = self
            .command(commands::SIGNAL_QUALITY, self.settings.command_timeout)
            .await?;
        let value = response::parse_signal_quality(first_line(&lines, "+CSQ")?)?;
        Ok((value != SIGNAL_UNKNOWN).then_some(value))
    }

    /// Position from the built-in GPS receiver (`AT+GPSPOS`).
    pub async fn gps_position(&mut self) -> Result<GpsPosition> {
        let lines = self
            .command(commands::GPS_POSITION, self.settings.command_timeout)
            .await?;
        response::parse_gps_position(first_line(&lines, "+GPSPOS")?)
    }
}

/// The single line a query is answered with.
fn first_line<'a>(lines: &'a [String], expected: &'static str) -> Result<&'a str> {
    lines
        .first()
        .map(String::as_str)
        .ok_or_else(|| Error::malformed(expected, ""))
}
