// sbd-tool -- CLI for exercising an Iridium transceiver's Short Burst Data
// service and network queries from the command line.
//
// Usage:
//   sbd-tool --port /dev/ttyUSB0 status
//   sbd-tool --port /dev/ttyUSB0 send "hello world"
//   sbd-tool --port /dev/ttyUSB0 send --hex 0708191717
//   sbd-tool --port /dev/ttyUSB0 session
//   sbd-tool --port /dev/ttyUSB0 read
//   sbd-tool --port /dev/ttyUSB0 --era 1 time
//   sbd-tool --port /dev/ttyACM0 --debug loopback "ping"
//   sbd-tool --port /dev/ttyUSB0 wait-signal 3 --samples 3

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::Level;

use iridium_core::message::{BinaryMessage, SbdMessage, TextMessage};
use iridium_core::time::Era;
use iridium_core::types::{DeviceKind, MailboxStatus, TransferStatus};
use iridium_sbd::{IridiumBuilder, IridiumModem};

/// Polls made by `wait-signal` before giving up.
const SIGNAL_POLLS: u32 = 90;

/// Pause between `wait-signal` polls.
const SIGNAL_POLL_INTERVAL: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// sbd-tool -- exercises an Iridium transceiver from the command line.
#[derive(Parser)]
#[command(name = "sbd-tool", version, about)]
struct Cli {
    /// Serial port path (e.g. /dev/ttyUSB0, COM3).
    #[arg(long, default_value = "/dev/ttyUSB0")]
    port: String,

    /// Serial baud rate.
    #[arg(long, default_value_t = 19200)]
    baud: u32,

    /// Network era used to decode times: 0 (1996), 1 (2007) or 2 (2014).
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(0..=2))]
    era: u8,

    /// Session timeout in seconds for `session`.
    #[arg(long, default_value_t = 300)]
    session_timeout: u64,

    /// Treat the device as an emulator instead of probing it.
    #[arg(long)]
    emulated: bool,

    /// Log every command and response line to stderr.
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the local mailbox status.
    Status,

    /// Print signal strength (0-5 bars).
    Signal,

    /// Print the network system time.
    Time,

    /// Print the last network geolocation fix.
    Geo,

    /// Print the built-in GPS position (handsets only).
    Gps,

    /// Write a message into the outbound buffer.
    Send {
        /// Message text, sent as UTF-8 bytes.
        #[arg(required_unless_present = "hex", conflicts_with = "hex")]
        text: Option<String>,

        /// Binary payload as hex digits (e.g. 0708191717).
        #[arg(long, value_parser = parse_hex_payload)]
        hex: Option<HexPayload>,
    },

    /// Read the inbound buffer.
    Read,

    /// Run an SBD session with the gateway.
    Session {
        /// Use the legacy AT+SBDI command.
        #[arg(long)]
        legacy: bool,
    },

    /// Clear a message buffer.
    Clear {
        #[arg(value_enum)]
        buffer: Buffer,
    },

    /// Write a message, copy it to the inbound buffer and read it back,
    /// without using any airtime.
    Loopback {
        /// Message text.
        text: String,
    },

    /// Poll signal strength until enough successive samples reach a minimum.
    WaitSignal {
        /// Minimum number of bars (1-5).
        #[arg(value_parser = clap::value_parser!(u8).range(1..=5))]
        minimum: u8,

        /// Successive good samples required.
        #[arg(long, default_value_t = 3)]
        samples: u32,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Buffer {
    Outbound,
    Inbound,
}

/// Raw bytes given on the command line as hex digits.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HexPayload(Vec<u8>);

/// Parse a hex string like "0708ff" into bytes.
fn parse_hex_payload(s: &str) -> std::result::Result<HexPayload, String> {
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if s.len() % 2 != 0 {
        return Err("hex payload must have an even number of digits".into());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            s.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| format!("invalid hex byte at offset {i}"))
        })
        .collect::<std::result::Result<Vec<u8>, String>>()
        .map(HexPayload)
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn print_mailbox(status: &MailboxStatus) {
    println!("Mailbox");
    println!("  MOMSN:            {}", status.outbound_msn);
    println!("  MTMSN:            {}", status.inbound_msn);
    println!("  Outbound message: {}", status.outbound_msg_present);
    println!("  Inbound message:  {}", status.inbound_msg_present);
    if let Some(queued) = status.inbound_queued {
        println!("  Queued at server: {queued}");
    }
}

fn print_transfer(status: &TransferStatus) {
    let outcome = if status.outbound_succeeded() {
        "ok"
    } else {
        "failed"
    };
    println!(
        "Outbound transfer: {} ({outcome})",
        status.last_outbound_status
    );
    println!("Inbound transfer:  {}", status.last_inbound_status);
    print_mailbox(&status.mailbox);
}

fn print_message(msg: &BinaryMessage) {
    match msg.sequence() {
        Some(seq) => println!("Message #{seq}, {} bytes", msg.data().len()),
        None => println!("Message (unnumbered), {} bytes", msg.data().len()),
    }
    match std::str::from_utf8(msg.data()) {
        Ok(text) => println!("  Text: {text:?}"),
        Err(_) => {
            let hex: String = msg.data().iter().map(|b| format!("{b:02x}")).collect();
            println!("  Hex:  {hex}");
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_send(modem: &IridiumModem, mut msg: BinaryMessage) -> Result<()> {
    let status = modem
        .session()
        .await
        .write_outbound_message(&mut msg)
        .await
        .context("writing outbound message")?;
    match msg.sequence() {
        Some(seq) => println!("Stored as message #{seq}"),
        None => println!("Stored"),
    }
    print_mailbox(&status);
    Ok(())
}

async fn cmd_loopback(modem: &IridiumModem, text: &str) -> Result<()> {
    let mut session = modem.session().await;
    let mut msg = BinaryMessage::from(TextMessage::new(text));

    session.clear_outbound().await.context("clearing outbound buffer")?;
    session
        .write_outbound_message(&mut msg)
        .await
        .context("writing outbound message")?;
    session.clear_inbound().await.context("clearing inbound buffer")?;

    let copied = session
        .copy_outbound_to_inbound()
        .await
        .context("copying outbound to inbound")?;
    println!("Copied {copied} bytes");

    let received = session
        .read_inbound_message()
        .await
        .context("reading inbound message")?;
    session.clear_inbound().await.context("clearing inbound buffer")?;

    print_message(&received);
    if received.data() != msg.data() {
        bail!("loopback payload differs from the message written");
    }
    println!("Loopback OK");
    Ok(())
}

async fn cmd_wait_signal(modem: &IridiumModem, minimum: u8, samples: u32) -> Result<()> {
    let mut good = 0;
    for poll in 0..SIGNAL_POLLS {
        if poll > 0 {
            tokio::time::sleep(SIGNAL_POLL_INTERVAL).await;
        }
        let bars = modem.session().await.signal_quality().await?;
        match bars {
            Some(b) => print!("{b}"),
            None => print!("?"),
        }
        std::io::stdout().flush().ok();
        if bars.is_some_and(|b| b >= minimum) {
            good += 1;
        } else {
            good = 0;
        }
        if good >= samples {
            println!();
            println!("Success");
            return Ok(());
        }
    }
    println!();
    bail!("failed to acquire a good signal after {SIGNAL_POLLS} samples")
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.debug { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .init();

    let era = Era::try_from(cli.era)?;
    let modem = IridiumBuilder::new()
        .serial_port(&cli.port)
        .baud_rate(cli.baud)
        .era(era)
        .session_timeout(Duration::from_secs(cli.session_timeout))
        .device_kind(cli.emulated.then_some(DeviceKind::Emulated))
        .build()
        .await
        .with_context(|| format!("connecting to {} at {} baud", cli.port, cli.baud))?;
    println!("Connected to {} ({})", cli.port, modem.device_kind());

    let result = match &cli.command {
        Command::Status => {
            let status = modem.session().await.status().await?;
            print_mailbox(&status);
            Ok(())
        }
        Command::Signal => {
            match modem.session().await.signal_quality().await? {
                Some(bars) => println!("Signal: {bars}/5"),
                None => println!("Signal: unknown"),
            }
            Ok(())
        }
        Command::Time => {
            let now = modem.session().await.system_time().await?;
            println!("Network time: {}", now.format("%Y-%m-%d %H:%M:%S%.3f UTC"));
            Ok(())
        }
        Command::Geo => {
            let fix = modem.session().await.geolocation().await?;
            println!(
                "lat {:.6} lon {:.6} fix time {}",
                fix.latitude,
                fix.longitude,
                fix.fix_time.format("%Y-%m-%d %H:%M:%S%.3f UTC")
            );
            Ok(())
        }
        Command::Gps => {
            let pos = modem.session().await.gps_position().await?;
            println!(
                "lat {:.4} lon {:.4} quality {}",
                pos.latitude, pos.longitude, pos.fix_quality
            );
            Ok(())
        }
        Command::Send { text, hex } => {
            let msg = match (text, hex) {
                (_, Some(HexPayload(bytes))) => BinaryMessage::new(bytes.clone()),
                (Some(text), None) => BinaryMessage::from(TextMessage::new(text.as_str())),
                (None, None) => bail!("either a text message or --hex is required"),
            };
            cmd_send(&modem, msg).await
        }
        Command::Read => {
            let msg = modem.session().await.read_inbound_message().await?;
            print_message(&msg);
            Ok(())
        }
        Command::Session { legacy } => {
            let mut session = modem.session().await;
            let status = if *legacy {
                session.initiate_legacy_session().await?
            } else {
                session.initiate_session().await?
            };
            print_transfer(&status);
            Ok(())
        }
        Command::Clear { buffer } => {
            let mut session = modem.session().await;
            match buffer {
                Buffer::Outbound => session.clear_outbound().await?,
                Buffer::Inbound => session.clear_inbound().await?,
            }
            println!("Cleared");
            Ok(())
        }
        Command::Loopback { text } => cmd_loopback(&modem, text).await,
        Command::WaitSignal { minimum, samples } => {
            cmd_wait_signal(&modem, *minimum, *samples).await
        }
    };

    modem.close().await.ok();
    result
}
