//! IridiumBuilder -- fluent builder for constructing [`IridiumModem`] instances.
//!
//! Separates configuration from construction so that callers can set up
//! serial port parameters, timeouts and the network era before the link is
//! opened and the transceiver brought up.
//!
//! # Example
//!
//! ```no_run
//! use iridium_sbd::IridiumBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> iridium_core::Result<()> {
//! let modem = IridiumBuilder::new()
//!     .serial_port("/dev/ttyUSB0")
//!     .session_timeout(Duration::from_secs(120))
//!     .build()
//!     .await?;
//! let status = modem.session().await.status().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tracing::debug;

use iridium_at_io::AtLink;
use iridium_core::error::{Error, Result};
use iridium_core::time::Era;
use iridium_core::transport::AtTransport;
use iridium_core::types::DeviceKind;
use iridium_transport::SerialTransport;
use iridium_transport::serial::DEFAULT_BAUD_RATE;

use crate::device;
use crate::modem::IridiumModem;

/// Default timeout for ordinary commands. Transceivers answer slowly, so
/// nothing shorter is useful.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for `AT+SBDIX` / `AT+SBDI`, which wait for a satellite.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(300);

/// Fluent builder for [`IridiumModem`].
///
/// Every setting has a default suited to a factory-configured transceiver,
/// so the simplest usage is:
///
/// ```ignore
/// let modem = IridiumBuilder::new()
///     .serial_port("/dev/ttyUSB0")
///     .build()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct IridiumBuilder {
    serial_port: Option<String>,
    baud_rate: u32,
    command_timeout: Duration,
    session_timeout: Duration,
    era: Era,
    device_kind: Option<DeviceKind>,
    skip_init: bool,
}

impl Default for IridiumBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IridiumBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        IridiumBuilder {
            serial_port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            era: Era::default(),
            device_kind: None,
            skip_init: false,
        }
    }

    /// Set the serial port path (e.g. `/dev/ttyUSB0` or `COM3`).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    /// Override the default baud rate (19200).
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = baud;
        self
    }

    /// Set the timeout for ordinary commands (default: 30s).
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the timeout for SBD sessions (default: 300s).
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Set the network era used to decode times (default: the current era).
    pub fn era(mut self, era: Era) -> Self {
        self.era = era;
        self
    }

    /// Declare the device kind up front instead of detecting it.
    ///
    /// `None` (the default) detects the kind during bring-up.
    pub fn device_kind(mut self, kind: Option<DeviceKind>) -> Self {
        self.device_kind = kind;
        self
    }

    /// Skip the bring-up commands entirely.
    ///
    /// The device kind is then the one given to
    /// [`device_kind()`](Self::device_kind), or [`DeviceKind::Real`].
    pub fn skip_init(mut self, skip: bool) -> Self {
        self.skip_init = skip;
        self
    }

    /// Build an [`IridiumModem`] on a caller-provided link.
    ///
    /// This is the primary entry point for testing (pass a
    /// `MockAtTransport` from `iridium-test-harness`) and for links other
    /// than a local serial port.
    pub async fn build_with_transport(
        self,
        mut transport: Box<dyn AtTransport>,
    ) -> Result<IridiumModem> {
        if self.command_timeout.is_zero() || self.session_timeout.is_zero() {
            return Err(Error::InvalidParameter("timeouts must be non-zero".into()));
        }

        let kind = match (self.skip_init, self.device_kind) {
            (true, kind) => kind.unwrap_or_default(),
            (false, None) => device::initialize(transport.as_mut(), self.command_timeout).await?,
            (false, Some(kind)) => {
                // Emulators reject part of the bring-up sequence, which is
                // harmless once the kind is already known.
                for command in device::BRING_UP {
                    if let Err(e) = transport
                        .command(command, self.command_timeout, None)
                        .await
                    {
                        match e {
                            Error::CommandFailed { .. } if kind == DeviceKind::Emulated => {
                                debug!(command, "bring-up command rejected")
                            }
                            e => return Err(e),
                        }
                    }
                }
                kind
            }
        };

        Ok(IridiumModem::new(
            transport,
            kind,
            self.command_timeout,
            self.session_timeout,
            self.era,
        ))
    }

    /// Build an [`IridiumModem`] on a serial port.
    ///
    /// Requires that [`serial_port()`](Self::serial_port) has been called.
    pub async fn build(self) -> Result<IridiumModem> {
        let port = self
            .serial_port
            .as_ref()
            .ok_or_else(|| Error::InvalidParameter("serial_port is required for build()".into()))?;

        let serial = SerialTransport::open(port, self.baud_rate).await?;
        let link = AtLink::new(Box::new(serial));
        self.build_with_transport(Box::new(link)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iridium_test_harness::MockAtTransport;

    fn accepting_mock() -> MockAtTransport {
        let mut mock = MockAtTransport::new();
        for command in device::BRING_UP {
            mock.expect_command(command, &[]);
        }
        mock
    }

    #[tokio::test]
    async fn builder_defaults() {
        let modem = IridiumBuilder::new()
            .build_with_transport(Box::new(accepting_mock()))
            .await
            .unwrap();

        assert_eq!(modem.device_kind(), DeviceKind::Real);
        assert_eq!(modem.era(), Era::Current);
        assert_eq!(modem.command_timeout(), Duration::from_secs(30));
        assert_eq!(modem.session_timeout(), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn builder_custom_settings() {
        let modem = IridiumBuilder::new()
            .serial_port("/dev/ttyUSB0")
            .baud_rate(9600)
            .command_timeout(Duration::from_secs(45))
            .session_timeout(Duration::from_secs(120))
            .era(Era::Rollover2007)
            .build_with_transport(Box::new(accepting_mock()))
            .await
            .unwrap();

        assert_eq!(modem.era(), Era::Rollover2007);
        assert_eq!(modem.command_timeout(), Duration::from_secs(45));
        assert_eq!(modem.session_timeout(), Duration::from_secs(120));
    }

    #[tokio::test]
    async fn builder_detects_emulator() {
        let mut mock = MockAtTransport::new();
        mock.expect_command_error("ATZ", "ERROR");
        mock.expect_command("AT+GMR", &["Call Processor Version: Long string"]);
        mock.expect_command("ATE0", &[]);

        let modem = IridiumBuilder::new()
            .build_with_transport(Box::new(mock))
            .await
            .unwrap();
        assert_eq!(modem.device_kind(), DeviceKind::Emulated);
    }

    #[tokio::test]
    async fn builder_skip_init_sends_nothing() {
        let mock = MockAtTransport::new();
        let log = mock.sent_log();

        let modem = IridiumBuilder::new()
            .skip_init(true)
            .device_kind(Some(DeviceKind::Emulated))
            .build_with_transport(Box::new(mock))
            .await
            .unwrap();

        assert_eq!(modem.device_kind(), DeviceKind::Emulated);
        assert!(log.items().is_empty());
    }

    #[tokio::test]
    async fn builder_declared_emulator_tolerates_rejections() {
        let mut mock = MockAtTransport::new();
        mock.expect_command("ATZ", &[]);
        mock.expect_command("ATE0", &[]);
        mock.expect_command_error("AT&K3", "ERROR");
        mock.expect_command_error("AT&D2", "ERROR");
        let log = mock.sent_log();

        let modem = IridiumBuilder::new()
            .device_kind(Some(DeviceKind::Emulated))
            .build_with_transport(Box::new(mock))
            .await
            .unwrap();

        assert_eq!(modem.device_kind(), DeviceKind::Emulated);
        assert!(!log.commands().contains(&"AT+GMR".to_string()));
    }

    #[tokio::test]
    async fn builder_declared_real_device_must_accept_bring_up() {
        let mut mock = MockAtTransport::new();
        mock.expect_command_error("ATZ", "ERROR");

        let result = IridiumBuilder::new()
            .device_kind(Some(DeviceKind::Real))
            .build_with_transport(Box::new(mock))
            .await;
        assert!(matches!(result, Err(Error::CommandFailed { .. })));
    }

    #[tokio::test]
    async fn builder_rejects_zero_timeouts() {
        let result = IridiumBuilder::new()
            .skip_init(true)
            .session_timeout(Duration::ZERO)
            .build_with_transport(Box::new(MockAtTransport::new()))
            .await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn builder_serial_port_required_for_build() {
        let result = IridiumBuilder::new().build().await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }
}
