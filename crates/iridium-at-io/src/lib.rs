//! Shared AT command exchange for Iridium transceivers.
//!
//! This crate turns any byte-level [`Transport`](iridium_core::Transport)
//! into an [`AtTransport`](iridium_core::AtTransport): commands go out
//! terminated by a carriage return, response lines come back with the echo
//! and the final result code stripped. Binary buffers are read by their
//! length prefix, never split on line ends.
//!
//! # Architecture
//!
//! - [`protocol`] -- command encoding, line splitting, result-code detection
//! - [`io`] -- [`AtLink`], the read loop that pairs commands with responses

pub mod io;
pub mod protocol;

pub use io::AtLink;
