//! [`AtLink`]: AT command exchange over a byte transport.
//!
//! One `AtLink` owns its transport exclusively. Each exchange sends a
//! command (or a raw payload), then reads and splits lines until the final
//! result code, an early terminator line, or the deadline. Binary replies
//! are read by length instead, so payload bytes never pass through the line
//! splitter. Nothing is retried here; a timeout is reported to the caller
//! as-is.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use iridium_core::error::{Error, Result};
use iridium_core::transport::{AtTransport, Transport};

use crate::protocol::{self, BINARY_PREFIX_LEN, DecodeResult, FinalResult, TERMINATOR};

/// Maximum buffered response size before the exchange is abandoned.
/// The largest legitimate response is a 270-byte `AT+SBDRB` buffer plus
/// framing.
const MAX_BUF: usize = 8192;

/// Label used in errors for unterminated payload writes.
const RAW_WRITE: &str = "<raw write>";

/// An [`AtTransport`] built on any byte-level [`Transport`].
pub struct AtLink {
    transport: Box<dyn Transport>,
    /// Bytes received but not yet consumed.
    pending: Vec<u8>,
}

impl AtLink {
    /// Wrap a byte transport.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        AtLink {
            transport,
            pending: Vec::new(),
        }
    }

    /// Give back the underlying transport.
    pub fn into_inner(self) -> Box<dyn Transport> {
        self.transport
    }

    /// Drop anything left over from an earlier exchange and send `payload`.
    async fn send(&mut self, label: &str, payload: &[u8]) -> Result<()> {
        if !self.pending.is_empty() {
            debug!(
                stale = self.pending.len(),
                "discarding unread bytes before new exchange"
            );
            self.pending.clear();
        }

        trace!(command = label, bytes = payload.len(), "sending");
        self.transport.send(payload).await
    }

    /// Append one read from the transport to the pending bytes.
    async fn receive(&mut self, label: &str, deadline: Instant) -> Result<()> {
        let now = Instant::now();
        if now >= deadline {
            debug!(command = label, "deadline reached");
            return Err(Error::Timeout);
        }

        let mut recv_buf = [0u8; 256];
        let n = self.transport.receive(&mut recv_buf, deadline - now).await?;
        self.pending.extend_from_slice(&recv_buf[..n]);

        if self.pending.len() > MAX_BUF {
            warn!(len = self.pending.len(), "response buffer overflow");
            self.pending.clear();
            return Err(Error::Protocol(format!(
                "response to {label} exceeded {MAX_BUF} bytes"
            )));
        }
        Ok(())
    }

    /// Receive until at least `len` bytes are pending.
    async fn fill(&mut self, label: &str, len: usize, deadline: Instant) -> Result<()> {
        while self.pending.len() < len {
            self.receive(label, deadline).await?;
        }
        Ok(())
    }

    /// Collect response lines up to the final result code or `terminator`.
    ///
    /// `echo` is the command text whose echo should be dropped, if any.
    async fn read_lines(
        &mut self,
        label: &str,
        echo: Option<&str>,
        deadline: Instant,
        terminator: Option<&str>,
    ) -> Result<Vec<String>> {
        let mut lines = Vec::new();

        loop {
            while let DecodeResult::Line { text, consumed } = protocol::decode_line(&self.pending)
            {
                self.pending.drain(..consumed);

                if text.is_empty() {
                    continue;
                }
                if echo.is_some_and(|cmd| protocol::is_echo(&text, cmd)) {
                    trace!(command = label, "skipping echo");
                    continue;
                }

                match protocol::final_result(&text) {
                    Some(FinalResult::Ok) => {
                        debug!(command = label, lines = lines.len(), "OK");
                        return Ok(lines);
                    }
                    Some(FinalResult::Error) => {
                        debug!(command = label, response = %text, "command failed");
                        return Err(Error::CommandFailed {
                            command: label.to_string(),
                            response: text,
                        });
                    }
                    None => {}
                }

                debug!(command = label, line = ?text, "response line");
                let done = terminator.is_some_and(|t| text == t);
                lines.push(text);
                if done {
                    return Ok(lines);
                }
            }

            self.receive(label, deadline).await?;
        }
    }
}

#[async_trait]
impl AtTransport for AtLink {
    async fn command(
        &mut self,
        command: &str,
        timeout: Duration,
        terminator: Option<&str>,
    ) -> Result<Vec<String>> {
        self.send(command, &protocol::encode_command(command)).await?;
        let deadline = Instant::now() + timeout;
        self.read_lines(command, Some(command), deadline, terminator)
            .await
    }

    async fn write_raw(&mut self, data: &[u8], timeout: Duration) -> Result<Vec<String>> {
        self.send(RAW_WRITE, data).await?;
        let deadline = Instant::now() + timeout;
        self.read_lines(RAW_WRITE, None, deadline, None).await
    }

    async fn read_binary(&mut self, command: &str, timeout: Duration) -> Result<Vec<u8>> {
        let encoded = protocol::encode_command(command);
        self.send(command, &encoded).await?;
        let deadline = Instant::now() + timeout;

        // An echo starts with the command's own first byte, which no length
        // prefix under MAX_BUF can.
        self.fill(command, 1, deadline).await?;
        if self.pending[0] == encoded[0] {
            self.fill(command, encoded.len(), deadline).await?;
            if !self.pending.starts_with(&encoded) {
                return Err(Error::Protocol(format!(
                    "garbled echo before {command} buffer"
                )));
            }
            trace!(command, "skipping echo");
            self.pending.drain(..encoded.len());
        }

        // A text reply (`ERROR`, `+CME ERROR`) starts with CR, which would
        // also be a length prefix of at least 3328 bytes.
        self.fill(command, 1, deadline).await?;
        if self.pending[0] == TERMINATOR {
            let lines = self.read_lines(command, None, deadline, None).await?;
            return Err(Error::Protocol(format!(
                "expected a binary buffer from {command}, got {lines:?}"
            )));
        }

        self.fill(command, BINARY_PREFIX_LEN, deadline).await?;
        let frame_len = protocol::binary_frame_len([self.pending[0], self.pending[1]]);
        if frame_len > MAX_BUF {
            self.pending.clear();
            return Err(Error::Protocol(format!(
                "{command} buffer declares {frame_len} bytes"
            )));
        }
        self.fill(command, frame_len, deadline).await?;
        let frame: Vec<u8> = self.pending.drain(..frame_len).collect();
        debug!(command, bytes = frame.len(), "binary buffer received");

        let trailing = self.read_lines(command, None, deadline, None).await?;
        if !trailing.is_empty() {
            return Err(Error::Protocol(format!(
                "unexpected lines after {command} buffer: {trailing:?}"
            )));
        }
        Ok(frame)
    }

    async fn close(&mut self) -> Result<()> {
        self.pending.clear();
        self.transport.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iridium_test_harness::MockTransport;

    const T: Duration = Duration::from_secs(5);

    fn link(mock: MockTransport) -> AtLink {
        AtLink::new(Box::new(mock))
    }

    #[tokio::test]
    async fn command_returns_lines_before_ok() {
        let mut mock = MockTransport::new();
        mock.answer("AT+SBDS", &["+SBDS: 1, 5, 0, -1"]);

        let mut at = link(mock);
        let lines = at.command("AT+SBDS", T, None).await.unwrap();
        assert_eq!(lines, vec!["+SBDS: 1, 5, 0, -1".to_string()]);
    }

    #[tokio::test]
    async fn echo_is_stripped() {
        let mut mock = MockTransport::new().with_echo();
        mock.answer("AT+CSQ", &["+CSQ:4"]);

        let mut at = link(mock);
        let lines = at.command("AT+CSQ", T, None).await.unwrap();
        assert_eq!(lines, vec!["+CSQ:4".to_string()]);
    }

    #[tokio::test]
    async fn fragmented_response_is_reassembled() {
        let mut mock = MockTransport::new();
        mock.set_chunk_size(2);
        mock.expect(
            b"AT+SBDIX\r",
            b"\r\n+SBDIX: 0, 8, 0, 0, 0, 0\r\n\r\nOK\r\n",
        );

        let mut at = link(mock);
        let lines = at.command("AT+SBDIX", T, None).await.unwrap();
        assert_eq!(lines, vec!["+SBDIX: 0, 8, 0, 0, 0, 0".to_string()]);
    }

    #[tokio::test]
    async fn error_result_fails_command() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT&K3\r", b"\r\nERROR\r\n");

        let mut at = link(mock);
        match at.command("AT&K3", T, None).await {
            Err(Error::CommandFailed { command, response }) => {
                assert_eq!(command, "AT&K3");
                assert_eq!(response, "ERROR");
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cme_error_fails_command() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+CPIN?\r", b"\r\n+CME ERROR: 11\r\n");

        let mut at = link(mock);
        assert!(matches!(
            at.command("AT+CPIN?", T, None).await,
            Err(Error::CommandFailed { .. })
        ));
    }

    #[tokio::test]
    async fn terminator_ends_exchange_early() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+SBDWB=5\r", b"\r\nREADY\r\n");

        let mut at = link(mock);
        let lines = at.command("AT+SBDWB=5", T, Some("READY")).await.unwrap();
        assert_eq!(lines, vec!["READY".to_string()]);
    }

    #[tokio::test]
    async fn raw_write_is_unterminated() {
        let mut mock = MockTransport::new();
        mock.expect(b"hello\x02\x14", b"\r\n0\r\n\r\nOK\r\n");

        let mut at = link(mock);
        let lines = at.write_raw(b"hello\x02\x14", T).await.unwrap();
        assert_eq!(lines, vec!["0".to_string()]);
    }

    /// `0123456789` framed as the device sends it: the length prefix holds
    /// an LF and the checksum (0x020D) holds a CR.
    const TEN_BYTE_FRAME: &[u8] = b"\x00\x0A0123456789\x02\x0D";

    #[tokio::test]
    async fn binary_read_returns_whole_frame() {
        let mut mock = MockTransport::new();
        mock.expect(
            b"AT+SBDRB\r",
            b"\x00\x07\x07\x08\x19\x17\x17\x12\x13\x00{\r\nOK\r\n",
        );

        let mut at = link(mock);
        let frame = at.read_binary("AT+SBDRB", T).await.unwrap();
        assert_eq!(frame, b"\x00\x07\x07\x08\x19\x17\x17\x12\x13\x00{".to_vec());
    }

    #[tokio::test]
    async fn binary_read_of_ten_byte_message() {
        let mut reply = TEN_BYTE_FRAME.to_vec();
        reply.extend_from_slice(b"\r\nOK\r\n");
        let mut mock = MockTransport::new();
        mock.expect(b"AT+SBDRB\r", &reply);

        let mut at = link(mock);
        assert_eq!(
            at.read_binary("AT+SBDRB", T).await.unwrap(),
            TEN_BYTE_FRAME.to_vec()
        );
    }

    #[tokio::test]
    async fn binary_read_keeps_line_feeds_in_payload() {
        let mut mock = MockTransport::new();
        mock.set_chunk_size(3);
        mock.expect(
            b"AT+SBDRB\r",
            b"\x00\x0Bline1\nline2\x03\xBD\r\nOK\r\n",
        );

        let mut at = link(mock);
        assert_eq!(
            at.read_binary("AT+SBDRB", T).await.unwrap(),
            b"\x00\x0Bline1\nline2\x03\xBD".to_vec()
        );
    }

    #[tokio::test]
    async fn binary_read_payload_may_contain_ok() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+SBDRB\r", b"\x00\x04OK\r\n\x00\xB1\r\nOK\r\n");

        let mut at = link(mock);
        assert_eq!(
            at.read_binary("AT+SBDRB", T).await.unwrap(),
            b"\x00\x04OK\r\n\x00\xB1".to_vec()
        );
    }

    #[tokio::test]
    async fn binary_read_skips_echo() {
        let mut mock = MockTransport::new().with_echo();
        let mut reply = TEN_BYTE_FRAME.to_vec();
        reply.extend_from_slice(b"\r\nOK\r\n");
        mock.expect(b"AT+SBDRB\r", &reply);

        let mut at = link(mock);
        assert_eq!(
            at.read_binary("AT+SBDRB", T).await.unwrap(),
            TEN_BYTE_FRAME.to_vec()
        );
    }

    #[tokio::test]
    async fn binary_read_error_reply_fails_command() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+SBDRB\r", b"\r\nERROR\r\n");

        let mut at = link(mock);
        assert!(matches!(
            at.read_binary("AT+SBDRB", T).await,
            Err(Error::CommandFailed { .. })
        ));
    }

    #[tokio::test]
    async fn binary_read_short_frame_times_out() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+SBDRB\r", b"\x00\x0A01234");

        let mut at = link(mock);
        assert!(matches!(
            at.read_binary("AT+SBDRB", T).await,
            Err(Error::Timeout)
        ));
    }

    #[tokio::test]
    async fn binary_read_rejects_text_after_frame() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+SBDRB\r", b"\x00\x00\x00\x00\r\nnoise\r\nOK\r\n");

        let mut at = link(mock);
        assert!(matches!(
            at.read_binary("AT+SBDRB", T).await,
            Err(Error::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn silence_times_out() {
        let mut mock = MockTransport::new();
        mock.expect_silence(b"AT+SBDIX\r");

        let mut at = link(mock);
        assert!(matches!(
            at.command("AT+SBDIX", T, None).await,
            Err(Error::Timeout)
        ));
    }

    #[tokio::test]
    async fn missing_final_result_times_out() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT-MSSTM\r", b"\r\n-MSSTM: 7b8bd31d\r\n");

        let mut at = link(mock);
        assert!(matches!(
            at.command("AT-MSSTM", T, None).await,
            Err(Error::Timeout)
        ));
    }

    #[tokio::test]
    async fn close_closes_transport() {
        let mut at = link(MockTransport::new());
        at.close().await.unwrap();
        let transport = at.into_inner();
        assert!(!transport.is_connected());
    }
}
