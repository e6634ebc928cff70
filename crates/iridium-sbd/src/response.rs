//! Response line shapes and their parsers.
//!
//! Every query the session layer issues is answered by exactly one line of a
//! fixed shape. [`ResponseLine`] is the closed set of those shapes and
//! [`classify`] tries them in a fixed priority order. The session layer
//! itself calls the per-shape `parse_*` functions, since it always knows
//! which shape it is waiting for.
//!
//! Field lists are comma separated, with optional whitespace after each
//! comma. Integers are an optional `-` followed by decimal digits. Anything
//! that does not fit a shape is a [`Error::MalformedResponse`]; no field is
//! ever defaulted.

use iridium_core::time;
use iridium_core::types::{DeviceKind, GpsPosition};
use iridium_core::{Error, Result};

const CSQ: &str = "+CSQ:";
const MSSTM: &str = "-MSSTM:";
const MSGEO: &str = "-MSGEO:";
const SBDS: &str = "+SBDS:";
/// Marker of the mailbox line from emulated devices, found anywhere in the
/// line rather than at its start.
const LEGACY_SBDS: &str = "SBDS:";
const SBDIX: &str = "+SBDIX:";
const SBDI: &str = "+SBDI:";
const SBDTC_SIZE: &str = "size =";

/// Fields of a mailbox status line, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxFields {
    /// `1` when the outbound buffer holds a message.
    pub outbound_flag: i32,
    /// Outbound sequence number (MOMSN).
    pub outbound_msn: i32,
    /// `1` when the inbound buffer holds a message.
    pub inbound_flag: i32,
    /// Inbound sequence number (MTMSN), `-1` if none received yet.
    pub inbound_msn: i32,
}

/// Fields of a session result line, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionFields {
    /// Mobile-originated transfer status.
    pub mo_status: i32,
    /// Mobile-originated sequence number.
    pub mo_msn: i32,
    /// Mobile-terminated transfer status.
    pub mt_status: i32,
    /// Mobile-terminated sequence number.
    pub mt_msn: i32,
    /// Length of the message received, `0` if none.
    pub mt_length: i32,
    /// Messages still waiting at the gateway.
    pub mt_queued: u32,
}

/// One recognised response line.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseLine {
    /// `+CSQ: <n>`, 0..=5 bars or 99 for unknown.
    SignalQuality(u8),
    /// `-MSSTM: <hex>`, ticks since the era base.
    NetworkTime(u64),
    /// `-MSGEO: <x>,<y>,<z>,<hex>`, Earth-centred coordinates in km and the
    /// fix time in ticks.
    Geolocation {
        x: i32,
        y: i32,
        z: i32,
        fix_ticks: String,
    },
    /// `<deg>.<frac>,<N|S>,<deg>.<frac>,<E|W>,<q>` from `AT+GPSPOS`.
    GpsPosition(GpsPosition),
    /// `+SBDS: ...` at the start of the line.
    MailboxStatus(MailboxFields),
    /// `SBDS: ...` anywhere in the line, as sent by emulated devices.
    LegacyMailboxStatus(MailboxFields),
    /// `+SBDIX: ...`
    SessionResult(SessionFields),
    /// `+SBDI: ...`, status codes still on the legacy 0/1/2 scale.
    LegacySessionResult(SessionFields),
    /// `READY` handshake after `AT+SBDWB`.
    Ready,
    /// A bare integer result code.
    ResultCode(i32),
    /// `SBDTC: Outbound SBD Copied to Inbound SBD: size = <n>`
    LoopbackCopied(usize),
}

/// Recognise any single response line.
///
/// Shapes are tried in this order: the prefixed queries (`+CSQ`, `-MSSTM`,
/// `-MSGEO`), session results (`+SBDIX` before `+SBDI`), mailbox status
/// (line-start before mid-line), `READY`, a bare result code, the loopback
/// confirmation, and finally a GPS position.
pub fn classify(line: &str) -> Result<ResponseLine> {
    let t = line.trim();

    if t.starts_with(CSQ) {
        return parse_signal_quality(line).map(ResponseLine::SignalQuality);
    }
    if t.starts_with(MSSTM) {
        return parse_network_time(line).map(ResponseLine::NetworkTime);
    }
    if t.starts_with(MSGEO) {
        let (x, y, z, fix_ticks) = parse_geolocation(line)?;
        return Ok(ResponseLine::Geolocation { x, y, z, fix_ticks });
    }
    if t.starts_with(SBDIX) {
        return parse_session_result(line).map(ResponseLine::SessionResult);
    }
    if t.starts_with(SBDI) {
        return parse_legacy_session_result(line).map(ResponseLine::LegacySessionResult);
    }
    if t.starts_with(SBDS) {
        return parse_mailbox_status(line, DeviceKind::Real).map(ResponseLine::MailboxStatus);
    }
    if t.contains(LEGACY_SBDS) {
        return parse_mailbox_status(line, DeviceKind::Emulated)
            .map(ResponseLine::LegacyMailboxStatus);
    }
    if is_ready(line) {
        return Ok(ResponseLine::Ready);
    }
    if let Some(code) = parse_int(t) {
        return Ok(ResponseLine::ResultCode(code));
    }
    if t.contains(SBDTC_SIZE) {
        return parse_loopback_size(line).map(ResponseLine::LoopbackCopied);
    }
    parse_gps_position(line)
        .map(ResponseLine::GpsPosition)
        .map_err(|_| Error::malformed("AT", line))
}

// ---------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------

/// Parse `-?\d+` exactly.
fn parse_int(s: &str) -> Option<i32> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Split a comma-separated list of exactly `N` integers.
fn int_fields<const N: usize>(s: &str) -> Option<[i32; N]> {
    let mut out = [0; N];
    let mut parts = s.split(',');
    for slot in out.iter_mut() {
        *slot = parse_int(parts.next()?.trim())?;
    }
    match parts.next() {
        Some(_) => None,
        None => Some(out),
    }
}

/// The text after `prefix`, which must start the line.
fn after_prefix<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    line.trim().strip_prefix(prefix)
}

// ---------------------------------------------------------------
// Per-shape parsers
// ---------------------------------------------------------------

/// Parse `+CSQ: <n>` into the raw signal value.
pub fn parse_signal_quality(line: &str) -> Result<u8> {
    after_prefix(line, CSQ)
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| Error::malformed("+CSQ", line))
}

/// Parse `-MSSTM: <hex>` into network ticks.
pub fn parse_network_time(line: &str) -> Result<u64> {
    after_prefix(line, MSSTM)
        .map(str::trim)
        .filter(|v| is_hex(v))
        .and_then(|v| time::parse_ticks(v).ok())
        .ok_or_else(|| Error::malformed("-MSSTM", line))
}

/// Parse `-MSGEO: <x>,<y>,<z>,<hex>`.
///
/// The fix time is returned as the hex string the device sent, ready for
/// [`iridium_core::geo::decode_fix`].
pub fn parse_geolocation(line: &str) -> Result<(i32, i32, i32, String)> {
    let malformed = || Error::malformed("-MSGEO", line);
    let body = after_prefix(line, MSGEO).ok_or_else(malformed)?;

    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    let [x, y, z, ticks] = parts.as_slice() else {
        return Err(malformed());
    };
    match (parse_int(x), parse_int(y), parse_int(z)) {
        (Some(x), Some(y), Some(z)) if is_hex(ticks) => Ok((x, y, z, ticks.to_string())),
        _ => Err(malformed()),
    }
}

/// One `<deg>.<frac>` coordinate, scaled the way the device reports it:
/// the fraction is in ten-thousandths of a degree.
fn gps_coordinate(s: &str) -> Option<f64> {
    let (deg, frac) = s.split_once('.')?;
    let negative = deg.starts_with('-');
    let deg = parse_int(deg)?;
    let frac = parse_int(frac).filter(|f| *f >= 0)?;
    let magnitude = f64::from(deg.unsigned_abs()) + f64::from(frac) / 10_000.0;
    Some(if negative { -magnitude } else { magnitude })
}

/// Parse an `AT+GPSPOS` line such as `00.0000,N,000.0000,E,V`.
///
/// Southern latitudes and western longitudes come back negative.
pub fn parse_gps_position(line: &str) -> Result<GpsPosition> {
    let malformed = || Error::malformed("+GPSPOS", line);

    let parts: Vec<&str> = line.trim().split(',').map(str::trim).collect();
    let [lat, ns, lon, ew, quality] = parts.as_slice() else {
        return Err(malformed());
    };

    let lat = gps_coordinate(lat).ok_or_else(malformed)?;
    let lon = gps_coordinate(lon).ok_or_else(malformed)?;
    let lat_sign = match *ns {
        "N" | "n" => 1.0,
        "S" | "s" => -1.0,
        _ => return Err(malformed()),
    };
    let lon_sign = match *ew {
        "E" | "e" => 1.0,
        "W" | "w" => -1.0,
        _ => return Err(malformed()),
    };

    let mut chars = quality.chars();
    let fix_quality = match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphanumeric() => c,
        _ => return Err(malformed()),
    };

    Ok(GpsPosition {
        latitude: lat_sign * lat,
        longitude: lon_sign * lon,
        fix_quality,
    })
}

/// Parse a mailbox status line in the shape `kind` produces.
///
/// Real transceivers start the line with `+SBDS:`. Emulated devices put
/// other text in front of a bare `SBDS:`, so for them the marker may
/// appear anywhere in the line.
pub fn parse_mailbox_status(line: &str, kind: DeviceKind) -> Result<MailboxFields> {
    let (body, expected) = match kind {
        DeviceKind::Real => (after_prefix(line, SBDS), "+SBDS"),
        DeviceKind::Emulated => (
            line.find(LEGACY_SBDS)
                .map(|pos| &line[pos + LEGACY_SBDS.len()..]),
            "SBDS",
        ),
    };

    let [outbound_flag, outbound_msn, inbound_flag, inbound_msn] = body
        .and_then(int_fields::<4>)
        .ok_or_else(|| Error::malformed(expected, line))?;

    Ok(MailboxFields {
        outbound_flag,
        outbound_msn,
        inbound_flag,
        inbound_msn,
    })
}

fn session_fields(line: &str, prefix: &str, expected: &'static str) -> Result<SessionFields> {
    let [mo_status, mo_msn, mt_status, mt_msn, mt_length, mt_queued] = after_prefix(line, prefix)
        .and_then(int_fields::<6>)
        .ok_or_else(|| Error::malformed(expected, line))?;

    let mt_queued = u32::try_from(mt_queued).map_err(|_| Error::malformed(expected, line))?;

    Ok(SessionFields {
        mo_status,
        mo_msn,
        mt_status,
        mt_msn,
        mt_length,
        mt_queued,
    })
}

/// Parse a `+SBDIX: <mo>,<momsn>,<mt>,<mtmsn>,<mtlen>,<queued>` line.
pub fn parse_session_result(line: &str) -> Result<SessionFields> {
    session_fields(line, SBDIX, "+SBDIX")
}

/// Parse a legacy `+SBDI:` line. Field order matches `+SBDIX`.
pub fn parse_legacy_session_result(line: &str) -> Result<SessionFields> {
    session_fields(line, SBDI, "+SBDI")
}

/// Whether `line` is the `READY` write handshake.
pub fn is_ready(line: &str) -> bool {
    line.trim_start().starts_with(crate::commands::READY)
}

/// Parse the bare integer result code that ends a payload write.
pub fn parse_result_code(line: &str) -> Result<i32> {
    parse_int(line.trim()).ok_or_else(|| Error::malformed("result code", line))
}

/// Parse the byte count from an `AT+SBDTC` confirmation line.
pub fn parse_loopback_size(line: &str) -> Result<usize> {
    line.rfind(SBDTC_SIZE)
        .map(|pos| line[pos + SBDTC_SIZE.len()..].trim())
        .filter(|v| !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| Error::malformed("SBDTC", line))
}
