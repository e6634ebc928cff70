//! iridium-test-harness: Test utilities and mock transports for the
//! Iridium SBD stack.
//!
//! This crate provides [`MockTransport`] for deterministic testing of the
//! byte-level line framing in `iridium-at-io`, and [`MockAtTransport`] for
//! testing the SBD session layer against scripted AT command exchanges,
//! without a transceiver attached.

pub mod mock_at;
pub mod mock_serial;

pub use mock_at::{MockAtTransport, SentItem, SentLog};
pub use mock_serial::MockTransport;
