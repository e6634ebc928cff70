//! Transport implementations for the Iridium SBD stack.
//!
//! This crate provides [`SerialTransport`], a concrete implementation of the
//! [`Transport`](iridium_core::Transport) trait for the RS-232 / USB serial
//! data port of Iridium transceivers (9522B, 9523, 9555, 9602, 9603 and
//! RockBLOCK-style carrier boards).
//!
//! # Example
//!
//! ```no_run
//! use iridium_transport::SerialTransport;
//! use iridium_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> iridium_core::Result<()> {
//! let mut transport = SerialTransport::open("/dev/ttyUSB0", 19200).await?;
//!
//! transport.send(b"AT+CSQ\r").await?;
//!
//! let mut buf = [0u8; 256];
//! let n = transport.receive(&mut buf, Duration::from_secs(60)).await?;
//! # Ok(())
//! # }
//! ```

pub mod serial;

pub use serial::{PortSettings, SerialTransport};
