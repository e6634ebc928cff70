//! Serial data port of an Iridium transceiver.
//!
//! Every Iridium unit frames its data port as 8N1; only the baud rate and
//! the handshake lines vary. SBD modules (9602/9603) usually expose a
//! 3-wire interface, while handsets and the 9522B support RTS/CTS once the
//! device side has been switched over with `AT&K3`.
//!
//! # Example
//!
//! ```no_run
//! use iridium_transport::{PortSettings, SerialTransport};
//!
//! # async fn example() -> iridium_core::Result<()> {
//! let settings = PortSettings {
//!     rts_cts: true,
//!     ..PortSettings::default()
//! };
//! let transport = SerialTransport::open_with("/dev/ttyUSB0", settings).await?;
//! # Ok(())
//! # }
//! ```

use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, trace, warn};

use iridium_core::error::{Error, Result};
use iridium_core::transport::Transport;

/// Factory default baud rate of Iridium transceivers.
pub const DEFAULT_BAUD_RATE: u32 = 19200;

/// Line settings for a transceiver's data port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSettings {
    /// Baud rate. Transceivers autobaud between 600 and 115200.
    pub baud_rate: u32,
    /// RTS/CTS handshaking. Must agree with the device's `AT&K` setting.
    pub rts_cts: bool,
    /// Hold DTR asserted while the port is open. Under `AT&D2` a drop in
    /// DTR aborts the command in progress.
    pub hold_dtr: bool,
}

impl Default for PortSettings {
    fn default() -> Self {
        PortSettings {
            baud_rate: DEFAULT_BAUD_RATE,
            rts_cts: false,
            hold_dtr: true,
        }
    }
}

impl PortSettings {
    fn flow_control(&self) -> tokio_serial::FlowControl {
        if self.rts_cts {
            tokio_serial::FlowControl::Hardware
        } else {
            tokio_serial::FlowControl::None
        }
    }
}

/// [`Transport`] over a transceiver's serial data port.
pub struct SerialTransport {
    stream: Option<SerialStream>,
    path: String,
    settings: PortSettings,
}

impl SerialTransport {
    /// Open `path` at `baud_rate`, 3-wire, with DTR held.
    pub async fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let settings = PortSettings {
            baud_rate,
            ..PortSettings::default()
        };
        Self::open_with(path, settings).await
    }

    /// Open `path` with explicit line settings.
    pub async fn open_with(path: &str, settings: PortSettings) -> Result<Self> {
        if settings.baud_rate == 0 {
            return Err(Error::InvalidParameter("baud rate must be non-zero".into()));
        }
        debug!(path, ?settings, "opening data port");

        let mut stream = tokio_serial::new(path, settings.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(settings.flow_control())
            .open_native_async()
            .map_err(|e| Error::Transport(format!("cannot open {path}: {e}")))?;

        if settings.hold_dtr {
            if let Err(e) = stream.write_data_terminal_ready(true) {
                warn!(path, error = %e, "cannot assert DTR");
            }
        }

        info!(
            path,
            baud = settings.baud_rate,
            rts_cts = settings.rts_cts,
            "data port open"
        );
        Ok(SerialTransport {
            stream: Some(stream),
            path: path.to_string(),
            settings,
        })
    }

    /// Device path the port was opened on.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn settings(&self) -> PortSettings {
        self.settings
    }

    fn stream(&mut self) -> Result<&mut SerialStream> {
        self.stream.as_mut().ok_or(Error::NotConnected)
    }
}

/// A vanished USB adapter shows up as one of these kinds; anything else is
/// reported as plain I/O.
fn map_io_error(e: std::io::Error) -> Error {
    match e.kind() {
        ErrorKind::BrokenPipe | ErrorKind::NotConnected | ErrorKind::UnexpectedEof => {
            Error::ConnectionLost
        }
        _ => Error::Io(e),
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        trace!(path = %self.path, tx = ?data);
        let stream = self.stream()?;
        stream.write_all(data).await.map_err(map_io_error)?;
        stream.flush().await.map_err(map_io_error)
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let stream = self.stream()?;
        let n = tokio::time::timeout(timeout, stream.read(buf))
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(map_io_error)?;
        if n == 0 {
            warn!(path = %self.path, "data port reached end of stream");
            return Err(Error::ConnectionLost);
        }
        trace!(path = %self.path, rx = ?&buf[..n]);
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        if let Err(e) = stream.flush().await {
            warn!(path = %self.path, error = %e, "flush on close failed");
        }
        info!(path = %self.path, "data port closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}
