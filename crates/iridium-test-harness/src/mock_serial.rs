//! Scripted byte-level stand-in for a transceiver's data port.
//!
//! [`MockTransport`] plays back a script of exchanges: each write must match
//! the next scripted request, and the scripted reply is then handed to the
//! reader. It exercises AT framing (command termination, echo, result codes
//! and fragmented reads) without a serial port.
//!
//! # Example
//!
//! ```
//! use iridium_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! mock.answer("AT+CSQ", &["+CSQ:4"]);
//! mock.expect(b"AT+SBDRT\r", b"\r\nERROR\r\n");
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;

use iridium_core::error::{Error, Result};
use iridium_core::transport::Transport;

/// One scripted exchange: the bytes the link must write, and what the
/// device sends back. An empty reply leaves the reader waiting.
#[derive(Debug)]
struct Exchange {
    request: Vec<u8>,
    reply: Vec<u8>,
}

/// A [`Transport`] that replays a script of AT exchanges.
///
/// Replies are handed out at most `chunk_size` bytes per `receive()`, so a
/// response can be delivered in fragments the way a UART delivers it. With
/// echo on, each write is reflected back ahead of its reply, as a device
/// does before `ATE0`.
#[derive(Debug)]
pub struct MockTransport {
    script: VecDeque<Exchange>,
    rx: VecDeque<u8>,
    writes: Vec<Vec<u8>>,
    chunk_size: usize,
    echo: bool,
    open: bool,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// An open port with echo off and unfragmented reads.
    pub fn new() -> Self {
        MockTransport {
            script: VecDeque::new(),
            rx: VecDeque::new(),
            writes: Vec::new(),
            chunk_size: usize::MAX,
            echo: false,
            open: true,
        }
    }

    /// Reflect every write back to the reader before its reply.
    pub fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Script an exact write and the raw bytes sent back for it.
    pub fn expect(&mut self, request: &[u8], reply: &[u8]) {
        self.script.push_back(Exchange {
            request: request.to_vec(),
            reply: reply.to_vec(),
        });
    }

    /// Script `command` (CR-terminated on the wire) answered by `lines`
    /// and a final `OK`, each framed by CR LF.
    pub fn answer(&mut self, command: &str, lines: &[&str]) {
        let mut reply = Vec::new();
        for line in lines.iter().chain(&["OK"]) {
            reply.extend_from_slice(b"\r\n");
            reply.extend_from_slice(line.as_bytes());
            reply.extend_from_slice(b"\r\n");
        }
        self.expect(format!("{command}\r").as_bytes(), &reply);
    }

    /// Script a write that the device never answers.
    pub fn expect_silence(&mut self, request: &[u8]) {
        self.expect(request, &[]);
    }

    /// Cap the number of bytes a single `receive()` returns.
    pub fn set_chunk_size(&mut self, chunk_size: usize) {
        self.chunk_size = chunk_size.max(1);
    }

    /// Every write made so far, one entry per `send()`.
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// Scripted exchanges not yet consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.script.len()
    }

    /// Simulate the adapter being unplugged or replugged.
    pub fn set_connected(&mut self, connected: bool) {
        self.open = connected;
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.open {
            return Err(Error::NotConnected);
        }
        self.writes.push(data.to_vec());

        let Some(exchange) = self.script.pop_front() else {
            return Err(Error::Transport(format!(
                "unscripted write {:?}",
                String::from_utf8_lossy(data)
            )));
        };
        if exchange.request != data {
            return Err(Error::Transport(format!(
                "scripted {:?}, link wrote {:?}",
                String::from_utf8_lossy(&exchange.request),
                String::from_utf8_lossy(data)
            )));
        }

        if self.echo {
            self.rx.extend(data);
        }
        self.rx.extend(exchange.reply);
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        if !self.open {
            return Err(Error::NotConnected);
        }
        let n = self.rx.len().min(buf.len()).min(self.chunk_size);
        if n == 0 {
            return Err(Error::Timeout);
        }
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        self.open = false;
        self.rx.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::from_millis(10);

    async fn drain(mock: &mut MockTransport) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 16];
        while let Ok(n) = mock.receive(&mut buf, T).await {
            out.extend_from_slice(&buf[..n]);
        }
        out
    }

    #[tokio::test]
    async fn answer_frames_lines_and_ok() {
        let mut mock = MockTransport::new();
        mock.answer("AT+SBDS", &["+SBDS: 0, 1, 0, -1"]);

        mock.send(b"AT+SBDS\r").await.unwrap();
        assert_eq!(
            drain(&mut mock).await,
            b"\r\n+SBDS: 0, 1, 0, -1\r\n\r\nOK\r\n".to_vec()
        );
    }

    #[tokio::test]
    async fn echo_precedes_reply() {
        let mut mock = MockTransport::new().with_echo();
        mock.answer("AT", &[]);

        mock.send(b"AT\r").await.unwrap();
        assert_eq!(drain(&mut mock).await, b"AT\r\r\nOK\r\n".to_vec());
    }

    #[tokio::test]
    async fn writes_are_recorded_in_order() {
        let mut mock = MockTransport::new();
        mock.answer("ATE0", &[]);
        mock.answer("AT&K3", &[]);

        mock.send(b"ATE0\r").await.unwrap();
        mock.send(b"AT&K3\r").await.unwrap();
        assert_eq!(mock.writes(), &[b"ATE0\r".to_vec(), b"AT&K3\r".to_vec()]);
        assert_eq!(mock.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn off_script_write_fails() {
        let mut mock = MockTransport::new();
        mock.answer("AT+SBDS", &[]);
        assert!(matches!(
            mock.send(b"AT+SBDIX\r").await,
            Err(Error::Transport(_))
        ));
        assert!(matches!(mock.send(b"AT\r").await, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn silence_times_out() {
        let mut mock = MockTransport::new();
        mock.expect_silence(b"AT+SBDIX\r");
        mock.send(b"AT+SBDIX\r").await.unwrap();

        let mut buf = [0u8; 8];
        assert!(matches!(mock.receive(&mut buf, T).await, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn reads_are_fragmented() {
        let mut mock = MockTransport::new();
        mock.set_chunk_size(3);
        mock.expect(b"AT\r", b"OK\r\n");
        mock.send(b"AT\r").await.unwrap();

        let mut buf = [0u8; 64];
        let n = mock.receive(&mut buf, T).await.unwrap();
        assert_eq!(&buf[..n], b"OK\r");
        let n = mock.receive(&mut buf, T).await.unwrap();
        assert_eq!(&buf[..n], b"\n");
    }

    #[tokio::test]
    async fn closed_port_refuses_io() {
        let mut mock = MockTransport::new();
        mock.close().await.unwrap();
        assert!(!mock.is_connected());
        assert!(matches!(mock.send(b"AT\r").await, Err(Error::NotConnected)));

        mock.set_connected(true);
        let mut buf = [0u8; 8];
        assert!(matches!(mock.receive(&mut buf, T).await, Err(Error::Timeout)));
    }
}
