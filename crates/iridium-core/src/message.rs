//! Short Burst Data message model and checksum codec.
//!
//! SBD messages carry a sequence number that is assigned by the transceiver
//! when a message is written to (or read from) its buffers. Callers never
//! pick it: freshly built messages are unassigned until a write session
//! completes.
//!
//! Binary transfers are protected by a 16-bit additive checksum: the sum of
//! all payload bytes modulo 65536, sent big-endian after the payload.

/// Largest outbound payload accepted by `AT+SBDWB`, in bytes.
pub const MAX_OUTBOUND_PAYLOAD: usize = 340;

/// Number of checksum bytes trailing a binary payload.
pub const CHECKSUM_LEN: usize = 2;

/// Compute the 16-bit additive checksum of `data`.
pub fn checksum(data: &[u8]) -> u16 {
    data.iter()
        .fold(0u16, |sum, &byte| sum.wrapping_add(u16::from(byte)))
}

/// Compute the checksum of `data` in its wire encoding (high byte first).
///
/// ```
/// use iridium_core::message::generate_checksum;
///
/// assert_eq!(generate_checksum(b"hello"), [0x02, 0x14]);
/// ```
pub fn generate_checksum(data: &[u8]) -> [u8; CHECKSUM_LEN] {
    checksum(data).to_be_bytes()
}

/// Check a received checksum trailer against `data`.
///
/// Returns `true` only when `candidate` is byte-for-byte the checksum of
/// `data`; candidates of any other length never validate.
pub fn validate_checksum(data: &[u8], candidate: &[u8]) -> bool {
    candidate == generate_checksum(data).as_slice()
}

/// Common capability of SBD messages.
pub trait SbdMessage {
    /// Sequence number assigned by the transceiver, if any.
    fn sequence(&self) -> Option<u32>;

    /// The message payload as raw bytes.
    fn payload(&self) -> &[u8];
}

/// A UTF-8 text SBD message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextMessage {
    sequence: Option<u32>,
    text: String,
}

impl TextMessage {
    /// Create an unassigned text message.
    pub fn new(text: impl Into<String>) -> Self {
        TextMessage {
            sequence: None,
            text: text.into(),
        }
    }

    /// The message text.
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl SbdMessage for TextMessage {
    fn sequence(&self) -> Option<u32> {
        self.sequence
    }

    fn payload(&self) -> &[u8] {
        self.text.as_bytes()
    }
}

/// A binary SBD message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BinaryMessage {
    sequence: Option<u32>,
    data: Vec<u8>,
}

impl BinaryMessage {
    /// Create an unassigned binary message.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        BinaryMessage {
            sequence: None,
            data: data.into(),
        }
    }

    /// Build a message read back from the transceiver.
    ///
    /// `msn` is the sequence number the device reported; negative values
    /// (the device's "none yet" marker) leave the message unassigned.
    pub fn received(msn: i32, data: impl Into<Vec<u8>>) -> Self {
        BinaryMessage {
            sequence: u32::try_from(msn).ok(),
            data: data.into(),
        }
    }

    /// The payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The payload checksum in wire order.
    pub fn checksum(&self) -> [u8; CHECKSUM_LEN] {
        generate_checksum(&self.data)
    }

    /// Check a checksum trailer against this message's payload.
    pub fn validate_checksum(&self, candidate: &[u8]) -> bool {
        validate_checksum(&self.data, candidate)
    }

    /// Payload followed by its checksum, as written after the `READY`
    /// handshake of `AT+SBDWB`.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(self.data.len() + CHECKSUM_LEN);
        wire.extend_from_slice(&self.data);
        wire.extend_from_slice(&self.checksum());
        wire
    }

    /// Record the outbound sequence number reported after a successful write.
    ///
    /// Only the session layer calls this, once per completed write.
    pub fn assign_sequence(&mut self, msn: i32) {
        self.sequence = u32::try_from(msn).ok();
    }
}

impl SbdMessage for BinaryMessage {
    fn sequence(&self) -> Option<u32> {
        self.sequence
    }

    fn payload(&self) -> &[u8] {
        &self.data
    }
}

impl From<TextMessage> for BinaryMessage {
    fn from(msg: TextMessage) -> Self {
        BinaryMessage {
            sequence: msg.sequence,
            data: msg.text.into_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_of_hello() {
        assert_eq!(generate_checksum(b"hello"), [0x02, 0x14]);
    }

    #[test]
    fn checksum_wraps_modulo_65536() {
        assert_eq!(generate_checksum(&[0xFF, 0xFF]), [0x01, 0xFE]);
        assert_eq!(checksum(&[0xFF; 258]), 0x00FE);
    }

    #[test]
    fn checksum_of_long_alternating_pattern() {
        let mut data = Vec::new();
        for _ in 0..21 {
            data.extend_from_slice(&[0xFF, 0x00]);
        }
        // Trailing zero pads to 43 bytes without changing the sum.
        data.push(0x00);
        assert_eq!(data.len(), 43);
        assert_eq!(generate_checksum(&data), [0x14, 0xEB]);
    }

    #[test]
    fn checksum_of_empty_payload() {
        assert_eq!(generate_checksum(&[]), [0x00, 0x00]);
    }

    #[test]
    fn validate_accepts_exact_checksum_only() {
        let data = b"\x07\x08\x19\x17\x17\x12\x13";
        assert!(validate_checksum(data, &[0x00, 0x7B]));
        assert!(!validate_checksum(data, &[0x00, 0x7C]));
        assert!(!validate_checksum(data, &[0x00]));
        assert!(!validate_checksum(data, &[0x00, 0x7B, 0x00]));
    }

    #[test]
    fn single_bit_flips_fail_validation() {
        let data = b"satellite".to_vec();
        let sum = generate_checksum(&data);

        for i in 0..data.len() {
            for bit in 0..8 {
                let mut flipped = data.clone();
                flipped[i] ^= 1 << bit;
                assert!(!validate_checksum(&flipped, &sum), "byte {i} bit {bit}");
            }
        }
        for i in 0..CHECKSUM_LEN {
            for bit in 0..8 {
                let mut flipped = sum;
                flipped[i] ^= 1 << bit;
                assert!(!validate_checksum(&data, &flipped), "sum byte {i} bit {bit}");
            }
        }
    }

    #[test]
    fn new_messages_are_unassigned() {
        assert_eq!(BinaryMessage::new(b"abc".to_vec()).sequence(), None);
        assert_eq!(TextMessage::new("abc").sequence(), None);
    }

    #[test]
    fn received_message_keeps_device_sequence() {
        assert_eq!(BinaryMessage::received(12, vec![1]).sequence(), Some(12));
        assert_eq!(BinaryMessage::received(-1, vec![1]).sequence(), None);
    }

    #[test]
    fn assign_sequence_sets_msn() {
        let mut msg = BinaryMessage::new(vec![1, 2, 3]);
        msg.assign_sequence(42);
        assert_eq!(msg.sequence(), Some(42));
    }

    #[test]
    fn wire_form_appends_checksum() {
        let msg = BinaryMessage::new(b"hello".to_vec());
        assert_eq!(msg.to_wire(), b"hello\x02\x14");
    }

    #[test]
    fn text_converts_to_binary_payload() {
        let text = TextMessage::new("hi there");
        assert_eq!(text.payload(), b"hi there");
        let bin = BinaryMessage::from(text);
        assert_eq!(bin.data(), b"hi there");
        assert_eq!(bin.sequence(), None);
    }
}
