//! Transport traits for transceiver communication.
//!
//! Two layers are defined here:
//!
//! - [`Transport`] abstracts over the physical byte link (a serial port, or a
//!   scripted mock in tests).
//! - [`AtTransport`] is the AT-command exchange the SBD session layer is
//!   written against: send one command, get back the response lines. The
//!   `iridium-at-io` crate implements it over any [`Transport`].
//!
//! Keeping the session layer on [`AtTransport`] means the protocol logic in
//! `iridium-sbd` never touches line framing, echo handling, or read loops, and
//! can be tested deterministically with `MockAtTransport` from the
//! `iridium-test-harness` crate.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a transceiver.
///
/// Implementations handle buffering and error reporting at the physical
/// layer. Line framing and command/response pairing are handled by the
/// consumers of this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the transceiver.
    ///
    /// Implementations should block until all bytes have been written to
    /// the underlying transport.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the transceiver into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Will wait up to `timeout`
    /// for data to arrive; returns [`Error::Timeout`](crate::error::Error::Timeout)
    /// if no data is received within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}

/// Line-oriented AT command exchange.
///
/// Response lines are returned in order, with the command echo and the final
/// `OK` removed. Each line is decoded as ISO-8859-1, one `char` per byte.
/// Binary replies such as the `AT+SBDRB` buffer can hold any byte, CR and LF
/// included, so they are read with [`read_binary`](AtTransport::read_binary)
/// instead of being split into lines.
///
/// A final `ERROR` result must be reported as
/// [`Error::CommandFailed`](crate::error::Error::CommandFailed).
#[async_trait]
pub trait AtTransport: Send {
    /// Send `command` followed by a carriage return and collect the response.
    ///
    /// Reading stops at the final result code, or at the first line equal to
    /// `terminator` when one is given (used for the `READY` handshake, which
    /// is not followed by `OK`).
    async fn command(
        &mut self,
        command: &str,
        timeout: Duration,
        terminator: Option<&str>,
    ) -> Result<Vec<String>>;

    /// Send raw bytes with no terminator appended and collect the response.
    async fn write_raw(&mut self, data: &[u8], timeout: Duration) -> Result<Vec<String>>;

    /// Send `command` and read its length-prefixed binary reply.
    ///
    /// The reply is a 2-byte big-endian length `n`, `n` payload bytes and a
    /// 2-byte checksum, followed by the final result code. The returned
    /// bytes are the whole frame, prefix and checksum included, with no
    /// line splitting applied.
    async fn read_binary(&mut self, command: &str, timeout: Duration) -> Result<Vec<u8>>;

    /// Release the underlying link.
    async fn close(&mut self) -> Result<()>;
}

/// Decode raw bytes as ISO-8859-1, one `char` per byte.
pub fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
