//! Serial link to the lab interface board.
//!
//! The board runs a small firmware exposing both converters over a line
//! protocol. `IDN?` answers one identification line, `DAC <code> <0|1>`
//! loads the MCP4725 output register (the flag also persists the code to
//! the converter's EEPROM) and answers `OK`, and `ADC <n>` answers one
//! decimal count from front-end channel `n`. A command the firmware cannot
//! honor answers `ERR <reason>`.

use std::io::{Read, Write};
use std::thread;
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use serialport::SerialPort;

use crate::bench::Bench;
use crate::config::{AnalogPin, ADC_MAX_COUNT, DAC_MAX_CODE};

/// Line rate of the bridge firmware.
pub const BAUD_RATE: u32 = 115_200;
/// How long one reply may take before the link is considered dead.
const REPLY_TIMEOUT: Duration = Duration::from_secs(2);
/// Replies longer than this are line noise, not protocol.
const MAX_REPLY_BYTES: usize = 256;

pub struct SerialBridge {
    port: Box<dyn SerialPort>,
    identity: String,
}

impl SerialBridge {
    /// Opens the port and asks the firmware to identify itself.
    pub fn connect(path: &str) -> Result<Self> {
        let mut port = serialport::new(path, BAUD_RATE)
            .timeout(REPLY_TIMEOUT)
            .open()
            .with_context(|| format!("opening bridge port {path}"))?;
        let identity = transact(&mut port, "IDN?").context("identifying the bridge")?;
        log::info!("bridge at {path}: {identity}");
        Ok(SerialBridge { port, identity })
    }
}

impl Bench for SerialBridge {
    fn set_dac(&mut self, code: u16, persist: bool) -> Result<()> {
        ensure!(
            code <= DAC_MAX_CODE,
            "DAC code {code} exceeds the 12-bit range"
        );
        let command = format!("DAC {code} {}", u8::from(persist));
        let reply = transact(&mut self.port, &command)?;
        ensure!(reply == "OK", "unexpected reply {reply:?} to a DAC write");
        Ok(())
    }

    fn read_adc(&mut self, pin: AnalogPin) -> Result<u16> {
        let reply = transact(&mut self.port, &format!("ADC {}", pin.index()))?;
        parse_count(&reply).with_context(|| format!("reading {}", pin.label()))
    }

    fn settle(&mut self, wait: Duration) {
        thread::sleep(wait);
    }

    fn identity(&self) -> String {
        self.identity.clone()
    }
}

/// Sends one command line and reads one reply line, surfacing firmware
/// refusals as errors.
fn transact<L: Read + Write>(link: &mut L, command: &str) -> Result<String> {
    send_line(link, command).with_context(|| format!("sending {command:?}"))?;
    let reply = read_line(link).with_context(|| format!("awaiting the reply to {command:?}"))?;
    if let Some(reason) = reply.strip_prefix("ERR") {
        bail!("bridge refused {command:?}: {}", reason.trim());
    }
    Ok(reply)
}

fn send_line<W: Write>(link: &mut W, command: &str) -> Result<()> {
    link.write_all(command.as_bytes())?;
    link.write_all(b"\n")?;
    link.flush()?;
    Ok(())
}

/// Accumulates bytes up to a newline. Carriage returns are dropped so LF and
/// CRLF firmwares read the same.
fn read_line<R: Read>(link: &mut R) -> Result<String> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match link.read(&mut byte) {
            Ok(0) => bail!("link closed before a full reply"),
            Ok(_) => match byte[0] {
                b'\n' => break,
                b'\r' => {}
                other => {
                    line.push(other);
                    ensure!(
                        line.len() <= MAX_REPLY_BYTES,
                        "reply exceeds {MAX_REPLY_BYTES} bytes"
                    );
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e).context("reading from the bridge"),
        }
    }
    String::from_utf8(line).context("reply is not UTF-8")
}

fn parse_count(reply: &str) -> Result<u16> {
    let count: u16 = reply
        .trim()
        .parse()
        .with_context(|| format!("unexpected reply {reply:?}"))?;
    ensure!(count <= ADC_MAX_COUNT, "count {count} exceeds the 10-bit range");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    struct TwoWire {
        reply: Cursor<Vec<u8>>,
        sent: Vec<u8>,
    }

    impl TwoWire {
        fn scripted(reply: &str) -> Self {
            TwoWire {
                reply: Cursor::new(reply.as_bytes().to_vec()),
                sent: Vec::new(),
            }
        }
    }

    impl Read for TwoWire {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reply.read(buf)
        }
    }

    impl Write for TwoWire {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.sent.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn send_line_terminates_with_newline() {
        let mut sent = Vec::new();
        send_line(&mut sent, "IDN?").unwrap();
        assert_eq!(sent, b"IDN?\n");
    }

    #[test]
    fn read_line_strips_carriage_returns() {
        let mut link = Cursor::new(b"OK\r\nleftover".to_vec());
        assert_eq!(read_line(&mut link).unwrap(), "OK");
    }

    #[test]
    fn read_line_rejects_a_closed_link() {
        let mut link = Cursor::new(Vec::new());
        assert!(read_line(&mut link).is_err());
    }

    #[test]
    fn read_line_rejects_unterminated_garbage() {
        let mut link = Cursor::new(vec![b'x'; MAX_REPLY_BYTES + 1]);
        assert!(read_line(&mut link).is_err());
    }

    #[test]
    fn transact_round_trips_a_command() {
        let mut wire = TwoWire::scripted("513\n");
        let reply = transact(&mut wire, "ADC 0").unwrap();
        assert_eq!(reply, "513");
        assert_eq!(wire.sent, b"ADC 0\n");
    }

    #[test]
    fn transact_surfaces_firmware_refusals() {
        let mut wire = TwoWire::scripted("ERR bad pin\n");
        let err = transact(&mut wire, "ADC 7").unwrap_err();
        assert!(err.to_string().contains("bad pin"));
    }

    #[test]
    fn counts_parse_within_the_adc_range() {
        assert_eq!(parse_count("0").unwrap(), 0);
        assert_eq!(parse_count(" 1023 ").unwrap(), 1023);
        assert!(parse_count("1024").is_err());
        assert!(parse_count("OK").is_err());
    }
}
