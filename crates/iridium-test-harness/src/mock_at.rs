//! Scripted [`AtTransport`] for testing the SBD session layer.
//!
//! [`MockAtTransport`] answers AT commands from an ordered script of
//! exchanges, so session-controller tests can assert exactly which commands
//! were issued, with which timeouts and terminators, and feed back canned
//! response lines or binary `AT+SBDRB` buffers.
//!
//! # Example
//!
//! ```
//! use iridium_test_harness::MockAtTransport;
//!
//! let mut mock = MockAtTransport::new();
//! mock.expect_command("AT+SBDS", &["+SBDS: 1, 5, 0, -1"]);
//! mock.expect_command_error("AT+SBDIX", "ERROR");
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use iridium_core::error::{Error, Result};
use iridium_core::transport::AtTransport;

/// What the mock does once an exchange is matched.
#[derive(Debug, Clone)]
enum Reply {
    Lines(Vec<String>),
    Bytes(Vec<u8>),
    CommandFailed(String),
    Timeout,
    Transport(String),
}

/// What the mock expects to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Request {
    Command(String),
    Binary(String),
    Raw(Vec<u8>),
}

impl Request {
    /// Name used for the command in [`Error::CommandFailed`].
    fn label(&self) -> String {
        match self {
            Request::Command(command) | Request::Binary(command) => command.clone(),
            Request::Raw(_) => "<raw write>".into(),
        }
    }
}

#[derive(Debug, Clone)]
struct Exchange {
    request: Request,
    reply: Reply,
}

/// One item recorded by the mock, in send order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentItem {
    /// A terminated AT command.
    Command {
        /// Command text without the carriage return.
        text: String,
        /// Timeout the caller asked for.
        timeout: Duration,
        /// Early terminator line the caller asked for, if any.
        terminator: Option<String>,
    },
    /// An unterminated raw write.
    Raw {
        /// Bytes written.
        data: Vec<u8>,
        /// Timeout the caller asked for.
        timeout: Duration,
    },
}

impl SentItem {
    /// The command text, or `None` for raw writes.
    pub fn command_text(&self) -> Option<&str> {
        match self {
            SentItem::Command { text, .. } => Some(text),
            SentItem::Raw { .. } => None,
        }
    }
}

/// Shared record of everything a [`MockAtTransport`] was sent.
///
/// Stays readable after the mock has been boxed and handed to the code
/// under test.
#[derive(Debug, Clone, Default)]
pub struct SentLog(Arc<Mutex<Vec<SentItem>>>);

impl SentLog {
    fn push(&self, item: SentItem) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item);
    }

    /// Everything sent so far, in order.
    pub fn items(&self) -> Vec<SentItem> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Command texts sent so far, skipping raw writes.
    pub fn commands(&self) -> Vec<String> {
        self.items()
            .iter()
            .filter_map(SentItem::command_text)
            .map(str::to_string)
            .collect()
    }
}

/// A mock [`AtTransport`] driven by an ordered script of exchanges.
///
/// Sending anything that does not match the next scripted exchange fails
/// with [`Error::Transport`], so unexpected commands surface as test
/// failures rather than silently passing.
#[derive(Debug, Default)]
pub struct MockAtTransport {
    script: VecDeque<Exchange>,
    sent_log: SentLog,
    closed: bool,
}

impl MockAtTransport {
    /// Create a mock with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, request: Request, reply: Reply) {
        self.script.push_back(Exchange { request, reply });
    }

    /// Expect `command` and answer with `lines` (final `OK` already removed).
    pub fn expect_command(&mut self, command: &str, lines: &[&str]) {
        self.push(
            Request::Command(command.to_string()),
            Reply::Lines(lines.iter().map(|l| l.to_string()).collect()),
        );
    }

    /// Expect a binary read of `command` and answer with `frame`.
    pub fn expect_binary(&mut self, command: &str, frame: &[u8]) {
        self.push(
            Request::Binary(command.to_string()),
            Reply::Bytes(frame.to_vec()),
        );
    }

    /// Expect a binary read of `command` and fail it as if the device
    /// answered `response`.
    pub fn expect_binary_error(&mut self, command: &str, response: &str) {
        self.push(
            Request::Binary(command.to_string()),
            Reply::CommandFailed(response.to_string()),
        );
    }

    /// Expect `command` and fail it as if the device answered `response`.
    pub fn expect_command_error(&mut self, command: &str, response: &str) {
        self.push(
            Request::Command(command.to_string()),
            Reply::CommandFailed(response.to_string()),
        );
    }

    /// Expect `command` and let it time out.
    pub fn expect_command_timeout(&mut self, command: &str) {
        self.push(Request::Command(command.to_string()), Reply::Timeout);
    }

    /// Expect `command` and fail it with a link-level error.
    pub fn expect_command_transport_error(&mut self, command: &str, message: &str) {
        self.push(
            Request::Command(command.to_string()),
            Reply::Transport(message.to_string()),
        );
    }

    /// Expect an unterminated raw write of `data` and answer with `lines`.
    pub fn expect_raw(&mut self, data: &[u8], lines: &[&str]) {
        self.push(
            Request::Raw(data.to_vec()),
            Reply::Lines(lines.iter().map(|l| l.to_string()).collect()),
        );
    }

    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<SentItem> {
        self.sent_log.items()
    }

    /// Command texts sent so far, skipping raw writes.
    pub fn sent_commands(&self) -> Vec<String> {
        self.sent_log.commands()
    }

    /// A handle on the send record that outlives the mock's move into a
    /// `Box<dyn AtTransport>`.
    pub fn sent_log(&self) -> SentLog {
        self.sent_log.clone()
    }

    /// Number of scripted exchanges not yet consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.script.len()
    }

    /// Whether [`AtTransport::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn answer(&mut self, request: Request) -> Result<Reply> {
        if self.closed {
            return Err(Error::NotConnected);
        }

        let exchange = self
            .script
            .pop_front()
            .ok_or_else(|| Error::Transport(format!("unscripted request {request:?}")))?;

        if exchange.request != request {
            return Err(Error::Transport(format!(
                "unexpected request: expected {:?}, got {:?}",
                exchange.request, request
            )));
        }

        match exchange.reply {
            Reply::CommandFailed(response) => Err(Error::CommandFailed {
                command: request.label(),
                response,
            }),
            Reply::Timeout => Err(Error::Timeout),
            Reply::Transport(message) => Err(Error::Transport(message)),
            reply => Ok(reply),
        }
    }

    fn answer_lines(&mut self, request: Request) -> Result<Vec<String>> {
        match self.answer(request)? {
            Reply::Lines(lines) => Ok(lines),
            other => Err(Error::Transport(format!(
                "scripted {other:?} for a line exchange"
            ))),
        }
    }
}

#[async_trait]
impl AtTransport for MockAtTransport {
    async fn command(
        &mut self,
        command: &str,
        timeout: Duration,
        terminator: Option<&str>,
    ) -> Result<Vec<String>> {
        self.sent_log.push(SentItem::Command {
            text: command.to_string(),
            timeout,
            terminator: terminator.map(str::to_string),
        });
        self.answer_lines(Request::Command(command.to_string()))
    }

    async fn write_raw(&mut self, data: &[u8], timeout: Duration) -> Result<Vec<String>> {
        self.sent_log.push(SentItem::Raw {
            data: data.to_vec(),
            timeout,
        });
        self.answer_lines(Request::Raw(data.to_vec()))
    }

    async fn read_binary(&mut self, command: &str, timeout: Duration) -> Result<Vec<u8>> {
        self.sent_log.push(SentItem::Command {
            text: command.to_string(),
            timeout,
            terminator: None,
        });
        match self.answer(Request::Binary(command.to_string()))? {
            Reply::Bytes(frame) => Ok(frame),
            other => Err(Error::Transport(format!(
                "scripted {other:?} for a binary read"
            ))),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
