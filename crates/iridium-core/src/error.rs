//! Error types for the Iridium SBD stack.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Link-level failures, malformed device
//! responses, message framing problems, and time-range violations are all
//! captured here.

/// The error type for all Iridium SBD operations.
///
/// Every variant is terminal for the operation that produced it. Nothing in
/// the session layer retries or substitutes default values.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A link-level error (serial port, byte transport).
    #[error("transport error: {0}")]
    Transport(String),

    /// Timed out waiting for a response from the transceiver.
    ///
    /// Session commands (`AT+SBDIX`) may legitimately take minutes while the
    /// unit acquires a satellite, so this usually means the configured
    /// session timeout is too short or the antenna has no sky view.
    #[error("timeout waiting for response")]
    Timeout,

    /// No connection to the transceiver has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the transceiver was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// The transceiver answered a command with `ERROR` or `+CME ERROR`.
    #[error("command {command} failed: {response}")]
    CommandFailed {
        /// The command text, without terminator.
        command: String,
        /// The final result line reported by the device.
        response: String,
    },

    /// A response line did not have the shape expected for the command.
    #[error("malformed {expected} response: {line:?}")]
    MalformedResponse {
        /// Which response shape was expected (e.g. `"+SBDS"`).
        expected: &'static str,
        /// The offending line, verbatim.
        line: String,
    },

    /// A protocol handshake went wrong (e.g. no `READY` after `AT+SBDWB`).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The declared payload length of an inbound message does not match the
    /// number of bytes received.
    #[error("framing error: declared {declared} payload bytes, received {received} bytes")]
    Framing {
        /// Payload length from the 2-byte length prefix.
        declared: usize,
        /// Total number of bytes in the received buffer.
        received: usize,
    },

    /// The checksum trailer of an inbound message does not match its payload.
    #[error("checksum mismatch: expected {expected:04X}, got {actual:04X}")]
    Checksum {
        /// Checksum computed over the received payload.
        expected: u16,
        /// Checksum carried in the trailer.
        actual: u16,
    },

    /// The transceiver rejected an outbound write with a non-zero result code.
    ///
    /// Codes reported by `AT+SBDWB`: 1 = write timeout, 2 = checksum
    /// mismatch, 3 = message size out of range.
    #[error("outbound write rejected with code {0}")]
    WriteRejected(i32),

    /// A calendar time cannot be represented in any network era.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// An invalid parameter was passed to an operation.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a [`Error::MalformedResponse`] for the given expected shape.
    pub fn malformed(expected: &'static str, line: impl Into<String>) -> Self {
        Error::MalformedResponse {
            expected,
            line: line.into(),
        }
    }
}
