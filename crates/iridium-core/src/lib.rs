//! iridium-core: Core traits, types, codecs, and error definitions for
//! Iridium Short Burst Data (SBD) transceivers.
//!
//! This crate holds everything that does not depend on a particular link:
//! the SBD message model with its checksum, the network time and
//! geolocation codecs, the mailbox/session status records, and the
//! transport traits the session layer in `iridium-sbd` is written against.
//!
//! # Key types
//!
//! - [`BinaryMessage`] / [`TextMessage`] -- SBD payloads
//! - [`MailboxStatus`] / [`TransferStatus`] -- parsed transceiver state
//! - [`Era`] and [`time`] -- 90 ms network tick codec
//! - [`GeoFix`] and [`geo`] -- Cartesian fix to latitude/longitude
//! - [`Transport`] / [`AtTransport`] -- byte link and AT command exchange
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod geo;
pub mod message;
pub mod time;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use iridium_core::*`.
pub use error::{Error, Result};
pub use geo::GeoFix;
pub use message::{BinaryMessage, SbdMessage, TextMessage};
pub use time::Era;
pub use transport::{AtTransport, Transport};
pub use types::*;
