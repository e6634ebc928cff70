//! Iridium network time codec.
//!
//! The transceiver reports time (`AT-MSSTM`, and the fix time of `AT-MSGEO`)
//! as a 32-bit hexadecimal count of 90 ms ticks since a network epoch. The
//! network has used three epochs so far; the counter is only meaningful
//! together with the era it is measured from.
//!
//! | Era | Epoch (UTC)            |
//! |-----|------------------------|
//! | 0   | 1996-06-01 00:00:11    |
//! | 1   | 2007-03-08 03:50:21    |
//! | 2   | 2014-05-11 14:23:55    |
//!
//! All arithmetic is done in integer milliseconds.

use chrono::{DateTime, TimeDelta, Timelike, Utc};

use crate::error::{Error, Result};

/// Length of one network time tick, in milliseconds.
pub const TICK_MILLIS: i64 = 90;

/// One of the fixed network epochs the tick counter is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Era {
    /// Epoch 0: 1996-06-01T00:00:11Z.
    Launch,
    /// Epoch 1: 2007-03-08T03:50:21Z.
    Rollover2007,
    /// Epoch 2: 2014-05-11T14:23:55Z, used by current firmware.
    #[default]
    Current,
}

impl Era {
    /// All eras, oldest first.
    pub const ALL: [Era; 3] = [Era::Launch, Era::Rollover2007, Era::Current];

    /// Milliseconds from the Unix epoch to the start of this era.
    pub const fn base_millis(self) -> i64 {
        match self {
            Era::Launch => 833_587_211_000,
            Era::Rollover2007 => 1_173_325_821_000,
            Era::Current => 1_399_818_235_000,
        }
    }

    /// Numeric index of the era (0, 1 or 2).
    pub const fn index(self) -> u8 {
        match self {
            Era::Launch => 0,
            Era::Rollover2007 => 1,
            Era::Current => 2,
        }
    }
}

impl TryFrom<u8> for Era {
    type Error = Error;

    fn try_from(index: u8) -> Result<Self> {
        match index {
            0 => Ok(Era::Launch),
            1 => Ok(Era::Rollover2007),
            2 => Ok(Era::Current),
            _ => Err(Error::InvalidParameter(format!(
                "network era must be 0, 1 or 2, got {index}"
            ))),
        }
    }
}

/// Parse a hexadecimal tick count as sent by the transceiver.
pub fn parse_ticks(hex_ticks: &str) -> Result<u64> {
    let digits = hex_ticks.trim();
    if digits.is_empty() || digits.len() > 16 {
        return Err(Error::malformed("network time", hex_ticks));
    }
    u64::from_str_radix(digits, 16).map_err(|_| Error::malformed("network time", hex_ticks))
}

/// Convert a tick count in `era` to UTC calendar time.
pub fn ticks_to_datetime(ticks: u64, era: Era) -> Result<DateTime<Utc>> {
    let offset = i64::try_from(ticks)
        .ok()
        .and_then(|t| t.checked_mul(TICK_MILLIS))
        .and_then(|ms| ms.checked_add(era.base_millis()))
        .ok_or_else(|| Error::OutOfRange(format!("tick count {ticks:#x} overflows")))?;

    let dt = DateTime::<Utc>::from_timestamp_millis(offset)
        .ok_or_else(|| Error::OutOfRange(format!("tick count {ticks:#x} overflows")))?;

    Ok(snap_to_tick_resolution(dt))
}

/// Decode a hexadecimal tick count (e.g. `"2c781713"`) in `era` to UTC.
///
/// ```
/// use iridium_core::time::{decode, Era};
///
/// let dt = decode("2c781713", Era::Current).unwrap();
/// assert_eq!(dt.to_rfc3339(), "2016-06-26T18:05:30.790+00:00");
/// ```
pub fn decode(hex_ticks: &str, era: Era) -> Result<DateTime<Utc>> {
    ticks_to_datetime(parse_ticks(hex_ticks)?, era)
}

/// Convert a UTC time to a tick count.
///
/// The newest era is tried first, falling back to older eras when the time
/// predates it. Times before the network launch fail with
/// [`Error::OutOfRange`]. Partial ticks are truncated.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use iridium_core::time::encode;
///
/// let dt = Utc.with_ymd_and_hms(2016, 6, 30, 21, 38, 36).unwrap()
///     + chrono::TimeDelta::milliseconds(10);
/// assert_eq!(encode(&dt).unwrap(), 0x2cb4d9fd);
/// ```
pub fn encode(time: &DateTime<Utc>) -> Result<u64> {
    encode_with_era(time).map(|(ticks, _)| ticks)
}

/// Like [`encode`], also reporting which era the count is measured from.
pub fn encode_with_era(time: &DateTime<Utc>) -> Result<(u64, Era)> {
    let millis = time.timestamp_millis();

    for era in Era::ALL.into_iter().rev() {
        let since_base = millis - era.base_millis();
        if since_base >= 0 {
            // Non-negative, so the cast cannot lose the sign.
            return Ok(((since_base / TICK_MILLIS) as u64, era));
        }
    }

    Err(Error::OutOfRange(format!(
        "{} predates the Iridium network",
        time.to_rfc3339()
    )))
}

/// Format a tick count the way the transceiver does (8 lower-case hex digits).
pub fn format_ticks(ticks: u64) -> String {
    format!("{ticks:08x}")
}

/// Fold a trailing-9 millisecond digit up to the next 10 ms.
///
/// Tick boundaries always land on a multiple of 10 ms, so a trailing 9 can
/// only come from a lossy seconds conversion upstream.
fn snap_to_tick_resolution(dt: DateTime<Utc>) -> DateTime<Utc> {
    let millis = dt.nanosecond() / 1_000_000;
    if millis % 10 == 9 {
        dt + TimeDelta::milliseconds(1)
    } else {
        dt
    }
}
