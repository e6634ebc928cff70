//! AT command encoding and response line decoding.
//!
//! Commands are ASCII text terminated by a carriage return. The transceiver
//! answers with `\r\n`-delimited lines ending in a final result code (`OK`
//! or `ERROR`). When echo is on, the command itself comes back first,
//! terminated by its own `\r`.

use bytes::{BufMut, BytesMut};

use iridium_core::transport::latin1_to_string;

/// The carriage return that terminates every AT command.
pub const TERMINATOR: u8 = b'\r';

/// The line feed that ends every response line.
pub const LINE_END: u8 = b'\n';

/// Length prefix of a binary reply: a big-endian payload length.
pub const BINARY_PREFIX_LEN: usize = 2;

/// Checksum trailer that follows a binary reply's payload.
pub const BINARY_TRAILER_LEN: usize = 2;

/// Final result code of an AT exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalResult {
    /// `OK`
    Ok,
    /// `ERROR`, `+CME ERROR: <n>` or `+CMS ERROR: <n>`
    Error,
}

/// Result of attempting to decode one line from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// A complete line was decoded.
    Line {
        /// Line text with its `\r\n` removed, one `char` per byte.
        text: String,
        /// Number of bytes consumed from the input buffer.
        consumed: usize,
    },

    /// The buffer does not yet contain a complete line. More data is needed.
    Incomplete,
}

/// Encode an AT command into raw bytes ready for transmission.
///
/// ```
/// use iridium_at_io::protocol::encode_command;
///
/// assert_eq!(encode_command("AT+SBDS"), b"AT+SBDS\r");
/// ```
pub fn encode_command(command: &str) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(command.len() + 1);
    buf.put_slice(command.as_bytes());
    buf.put_u8(TERMINATOR);
    buf.to_vec()
}

/// Decode one line from a byte buffer.
///
/// A line runs up to the next `\n`; a single `\r` before it is dropped.
/// Bytes are mapped to `char`s one-for-one so binary responses survive.
pub fn decode_line(buf: &[u8]) -> DecodeResult {
    let end = match buf.iter().position(|&b| b == LINE_END) {
        Some(pos) => pos,
        None => return DecodeResult::Incomplete,
    };

    let body = &buf[..end];
    let body = body.strip_suffix(&[TERMINATOR]).unwrap_or(body);

    DecodeResult::Line {
        text: latin1_to_string(body),
        consumed: end + 1,
    }
}

/// Total size of a binary reply frame, from its length prefix.
///
/// ```
/// use iridium_at_io::protocol::binary_frame_len;
///
/// assert_eq!(binary_frame_len([0x00, 0x0A]), 14);
/// ```
pub fn binary_frame_len(prefix: [u8; BINARY_PREFIX_LEN]) -> usize {
    BINARY_PREFIX_LEN + usize::from(u16::from_be_bytes(prefix)) + BINARY_TRAILER_LEN
}

/// Classify a response line as a final result code, if it is one.
pub fn final_result(line: &str) -> Option<FinalResult> {
    match line.trim() {
        "OK" => Some(FinalResult::Ok),
        "ERROR" => Some(FinalResult::Error),
        l if l.starts_with("+CME ERROR") || l.starts_with("+CMS ERROR") => {
            Some(FinalResult::Error)
        }
        _ => None,
    }
}

/// Whether `line` is the echo of `command`.
///
/// Echoed commands arrive terminated by their own `\r`, immediately followed
/// by the `\r\n` of the first response line, so a stray `\r` may remain.
pub fn is_echo(line: &str, command: &str) -> bool {
    line.trim_end_matches('\r') == command
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_appends_carriage_return() {
        assert_eq!(encode_command("AT+SBDWB=5"), b"AT+SBDWB=5\r");
        assert_eq!(encode_command(""), b"\r");
    }

    #[test]
    fn decode_empty_buffer() {
        assert_eq!(decode_line(b""), DecodeResult::Incomplete);
    }

    #[test]
    fn decode_without_line_end() {
        assert_eq!(decode_line(b"+SBDS: 0, 1"), DecodeResult::Incomplete);
    }

    #[test]
    fn decode_crlf_line() {
        assert_eq!(
            decode_line(b"+CSQ:5\r\nOK\r\n"),
            DecodeResult::Line {
                text: "+CSQ:5".into(),
                consumed: 8,
            }
        );
    }

    #[test]
    fn decode_blank_line() {
        assert_eq!(
            decode_line(b"\r\n+CSQ:5\r\n"),
            DecodeResult::Line {
                text: "".into(),
                consumed: 2,
            }
        );
    }

    #[test]
    fn decode_echo_keeps_inner_carriage_return() {
        match decode_line(b"AT+SBDS\r\r\n") {
            DecodeResult::Line { text, consumed } => {
                assert_eq!(text, "AT+SBDS\r");
                assert_eq!(consumed, 10);
                assert!(is_echo(&text, "AT+SBDS"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decode_preserves_high_bytes() {
        match decode_line(b"\x00\x02\xFF\x80\x00\x00\r\n") {
            DecodeResult::Line { text, .. } => {
                let bytes: Vec<u8> = text.chars().map(|c| c as u8).collect();
                assert_eq!(bytes, vec![0x00, 0x02, 0xFF, 0x80, 0x00, 0x00]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn binary_frame_sizes() {
        assert_eq!(binary_frame_len([0x00, 0x00]), 4);
        assert_eq!(binary_frame_len([0x01, 0x0E]), 274);
    }

    #[test]
    fn final_result_codes() {
        assert_eq!(final_result("OK"), Some(FinalResult::Ok));
        assert_eq!(final_result("ERROR"), Some(FinalResult::Error));
        assert_eq!(final_result("+CME ERROR: 11"), Some(FinalResult::Error));
        assert_eq!(final_result("+CMS ERROR: 500"), Some(FinalResult::Error));
        assert_eq!(final_result("READY"), None);
        assert_eq!(final_result("0"), None);
        assert_eq!(final_result("OKAY"), None);
    }

    #[test]
    fn echo_detection() {
        assert!(is_echo("ATE0", "ATE0"));
        assert!(!is_echo("+SBDS: 0, 1, 0, -1", "AT+SBDS"));
    }
}
