//! Connection bring-up and device detection.
//!
//! A freshly opened link is configured with `ATZ`, `ATE0`, `AT&K3` and
//! `AT&D2`. Software emulators reject some of these; such a rejection is
//! absorbed and the firmware revision is probed instead. An emulator
//! reports its call processor version as `: Long string`, which is the
//! only signal used to tell it apart from real hardware.

use std::time::Duration;

use tracing::{debug, info, warn};

use iridium_core::transport::AtTransport;
use iridium_core::types::DeviceKind;
use iridium_core::{Error, Result};

use crate::commands;

/// Commands sent, in order, to configure a freshly opened link.
pub const BRING_UP: [&str; 4] = [
    commands::RESET,
    commands::ECHO_OFF,
    commands::FLOW_CONTROL_RTS_CTS,
    commands::DTR_ABORTS,
];

/// Firmware text reported by emulated devices.
const EMULATOR_MARKER: &str = ": Long string";

/// Decide the device kind from the lines of an `AT+GMR` response.
///
/// Only the first two lines are inspected.
pub fn classify_firmware(lines: &[String]) -> DeviceKind {
    if lines.iter().take(2).any(|l| l.contains(EMULATOR_MARKER)) {
        DeviceKind::Emulated
    } else {
        DeviceKind::Real
    }
}

/// Ask for the firmware revision and classify the device.
///
/// Emulators come up with echo on, so they get a second `ATE0`.
pub async fn probe(transport: &mut dyn AtTransport, timeout: Duration) -> Result<DeviceKind> {
    let lines = transport
        .command(commands::FIRMWARE_REVISION, timeout, None)
        .await?;
    let kind = classify_firmware(&lines);

    if kind == DeviceKind::Emulated {
        transport.command(commands::ECHO_OFF, timeout, None).await?;
    }

    info!(device = %kind, "device detected");
    Ok(kind)
}

/// Run the bring-up sequence, probing the device if any step is rejected.
///
/// A device that accepts every configuration command is a real
/// transceiver. Only [`Error::CommandFailed`] is absorbed; link failures
/// and timeouts still end the bring-up.
pub async fn initialize(transport: &mut dyn AtTransport, timeout: Duration) -> Result<DeviceKind> {
    for command in BRING_UP {
        match transport.command(command, timeout, None).await {
            Ok(_) => debug!(command, "bring-up command accepted"),
            Err(Error::CommandFailed { response, .. }) => {
                warn!(command, %response, "bring-up command rejected, probing device");
                return probe(transport, timeout).await;
            }
            Err(e) => return Err(e),
        }
    }

    info!(device = %DeviceKind::Real, "bring-up complete");
    Ok(DeviceKind::Real)
}

#[cfg(test)]
mod tests {
    use super::*;
    use iridium_test_harness::{MockAtTransport, SentItem};

    const T: Duration = Duration::from_secs(30);

    #[test]
    fn firmware_classification() {
        let emulated = vec![
            "Call Processor Version: Long string".to_string(),
            "Modem DSP Version: 1.7 svn: 2358".to_string(),
        ];
        assert_eq!(classify_firmware(&emulated), DeviceKind::Emulated);

        let second_line = vec![
            "IMEI 300234010000000".to_string(),
            "Call Processor Version: Long string".to_string(),
        ];
        assert_eq!(classify_firmware(&second_line), DeviceKind::Emulated);

        let real = vec![
            "Call Processor Version: TA16005".to_string(),
            "DSP Version: 1.7 svn: 2358".to_string(),
            "Call Processor Version: Long string".to_string(),
        ];
        assert_eq!(classify_firmware(&real), DeviceKind::Real);
        assert_eq!(classify_firmware(&[]), DeviceKind::Real);
    }

    #[tokio::test]
    async fn real_device_accepts_everything() {
        let mut mock = MockAtTransport::new();
        for command in BRING_UP {
            mock.expect_command(command, &[]);
        }

        let kind = initialize(&mut mock, T).await.unwrap();
        assert_eq!(kind, DeviceKind::Real);
        assert_eq!(mock.sent_commands(), BRING_UP.to_vec());
        assert_eq!(mock.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn rejected_command_triggers_firmware_query() {
        let mut mock = MockAtTransport::new();
        mock.expect_command("ATZ", &[]);
        mock.expect_command("ATE0", &[]);
        mock.expect_command_error("AT&K3", "ERROR");
        mock.expect_command(
            "AT+GMR",
            &["Call Processor Version: Long string", "Modem DSP Version: 1"],
        );
        mock.expect_command("ATE0", &[]);

        let kind = initialize(&mut mock, T).await.unwrap();
        assert_eq!(kind, DeviceKind::Emulated);
        assert_eq!(
            mock.sent_commands(),
            vec!["ATZ", "ATE0", "AT&K3", "AT+GMR", "ATE0"]
        );
    }

    #[tokio::test]
    async fn firmware_query_of_real_device_skips_echo_off() {
        let mut mock = MockAtTransport::new();
        mock.expect_command_error("ATZ", "ERROR");
        mock.expect_command("AT+GMR", &["Call Processor Version: TA16005"]);

        let kind = initialize(&mut mock, T).await.unwrap();
        assert_eq!(kind, DeviceKind::Real);
        assert_eq!(mock.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn timeouts_are_not_absorbed() {
        let mut mock = MockAtTransport::new();
        mock.expect_command_timeout("ATZ");

        assert!(matches!(
            initialize(&mut mock, T).await,
            Err(Error::Timeout)
        ));
    }

    #[tokio::test]
    async fn failed_firmware_query_propagates() {
        let mut mock = MockAtTransport::new();
        mock.expect_command_error("ATZ", "ERROR");
        mock.expect_command_error("AT+GMR", "ERROR");

        assert!(matches!(
            initialize(&mut mock, T).await,
            Err(Error::CommandFailed { .. })
        ));
    }

    #[tokio::test]
    async fn bring_up_uses_given_timeout() {
        let mut mock = MockAtTransport::new();
        for command in BRING_UP {
            mock.expect_command(command, &[]);
        }
        let timeout = Duration::from_secs(45);
        initialize(&mut mock, timeout).await.unwrap();

        assert!(mock.sent().iter().all(|item| matches!(
            item,
            SentItem::Command { timeout: t, terminator: None, .. } if *t == timeout
        )));
    }
}
