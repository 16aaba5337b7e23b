//! Interactive test console for the fob reader.

use std::io::{BufRead, Write};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::bus::BusTransport;
use crate::error::{AppError, Result};
use crate::fob::{DeviceSession, SessionState};

const MENU: &str = "\
**********************************
*                                *
*   Fob Reader Test Console      *
*                                *
*         Main Menu              *
* a) Run RFID Self-Test          *
* b) Request Tag Data            *
* c) Restart                     *
* q) Quit                        *
*                                *
**********************************";

/// Menu-driven console over a [`DeviceSession`].
pub struct Shell<T: BusTransport, R, W> {
    session: DeviceSession<T>,
    input: R,
    output: W,
    tag_read_delay: Duration,
}

impl<T: BusTransport, R: BufRead, W: Write> Shell<T, R, W> {
    pub fn new(session: DeviceSession<T>, input: R, output: W) -> Self {
        Self {
            session,
            input,
            output,
            tag_read_delay: Duration::ZERO,
        }
    }

    /// Pause between a positive presence poll and the tag data request.
    pub fn with_tag_read_delay(mut self, delay: Duration) -> Self {
        self.tag_read_delay = delay;
        self
    }

    /// Print the startup summary for the current session.
    pub fn print_summary(&mut self) -> Result<()> {
        let Some(address) = self.session.address() else {
            writeln!(self.output, "Fob reader: NONE FOUND")?;
            return Ok(());
        };

        writeln!(self.output, "Fob reader at address 0x{address:02X}")?;
        if self.session.state() == SessionState::Initialized {
            writeln!(self.output, "Reader FW version = {}", self.session.firmware_version())?;
            writeln!(
                self.output,
                "RFID reader FW version = 0x{:02X} - {}",
                self.session.peripheral_version(),
                self.session.peripheral_version_label()
            )?;
        } else {
            writeln!(self.output, "Reader is not initialized")?;
        }
        Ok(())
    }

    /// Show the menu and handle commands until quit or end of input.
    pub fn run(&mut self) -> Result<()> {
        loop {
            writeln!(self.output)?;
            writeln!(self.output, "{MENU}")?;
            writeln!(self.output)?;
            writeln!(self.output, "Enter selection (A/B/C/Q): ")?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                debug!("Console input closed");
                return Ok(());
            }

            let Some(command) = line.trim().chars().next() else {
                continue;
            };
            if !self.dispatch(command.to_ascii_lowercase())? {
                info!("Leaving console");
                return Ok(());
            }
        }
    }

    /// Run one command. Returns `false` when the console should exit.
    fn dispatch(&mut self, command: char) -> Result<bool> {
        match command {
            'a' => {
                let outcome = self.session.self_test();
                match outcome {
                    Ok(passed) => {
                        writeln!(self.output, "Result = {}", if passed { "PASS" } else { "FAIL" })?
                    }
                    Err(e) => self.report(&e)?,
                }
            }
            'b' => self.request_tag_data()?,
            'c' => {
                let outcome = self.session.restart();
                if let Err(e) = outcome {
                    self.report(&e)?;
                }
                self.print_summary()?;
            }
            'q' => return Ok(false),
            _ => writeln!(self.output, "WARN: Unrecognized command.")?,
        }
        Ok(true)
    }

    fn request_tag_data(&mut self) -> Result<()> {
        match self.session.is_tag_present() {
            Ok(true) => {}
            Ok(false) => {
                writeln!(self.output, "No tag data available.")?;
                return Ok(());
            }
            Err(e) => return self.report(&e),
        }

        writeln!(self.output, "Has tag data")?;
        thread::sleep(self.tag_read_delay);

        let outcome = self.session.read_tag_data().map(|tag| tag.to_string());
        match outcome {
            Ok(hex) => writeln!(self.output, "Tag ={hex}")?,
            Err(AppError::NoDevice) => self.report(&AppError::NoDevice)?,
            Err(e) => {
                debug!("Tag data request failed: {e}");
                writeln!(self.output, "Failed to retrieve tag data.")?;
            }
        }
        Ok(())
    }

    fn report(&mut self, error: &AppError) -> Result<()> {
        writeln!(self.output, "ERROR: {error}")?;
        Ok(())
    }

    /// Give back the session and console handles.
    pub fn into_parts(self) -> (DeviceSession<T>, R, W) {
        (self.session, self.input, self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{SimulatedBus, SimulatedReader};
    use crate::fob::{CMD_GET_AVAILABLE, CMD_GET_TAGS};

    fn run_console(
        bus: SimulatedBus,
        start: bool,
        input: &str,
    ) -> (DeviceSession<SimulatedBus>, String) {
        let mut session = DeviceSession::new(bus);
        if start {
            session.start().unwrap();
        }
        let mut shell = Shell::new(session, input.as_bytes(), Vec::new());
        shell.run().unwrap();
        let (session, _, output) = shell.into_parts();
        (session, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_self_test_command() {
        let bus = SimulatedBus::new().with_reader(SimulatedReader::new(0x42));
        let (_, output) = run_console(bus, true, "a\n");
        assert!(output.contains("Result = PASS"));

        let reader = SimulatedReader::new(0x42).with_self_test(false);
        let bus = SimulatedBus::new().with_reader(reader);
        let (_, output) = run_console(bus, true, "A\n");
        assert!(output.contains("Result = FAIL"));
    }

    #[test]
    fn test_tag_command_with_tag() {
        let reader = SimulatedReader::new(0x42).with_tag(1, &[0x04, 0xA1, 0x2B, 0x7C]);
        let bus = SimulatedBus::new().with_reader(reader);
        let (session, output) = run_console(bus, true, "b\nq\n");

        assert!(output.contains("Has tag data"));
        assert!(output.contains("Tag = 04 A1 2B 7C"));
        assert!(session.tag().is_valid());
    }

    #[test]
    fn test_tag_command_without_tag() {
        let bus = SimulatedBus::new().with_reader(SimulatedReader::new(0x42));
        let (_, output) = run_console(bus, true, "b\n");
        assert!(output.contains("No tag data available."));
        assert!(!output.contains("Has tag data"));
    }

    #[test]
    fn test_tag_command_with_bad_frame() {
        let mut bus = SimulatedBus::new().with_reader(SimulatedReader::new(0x42));
        bus.push_reply(&[0xDA]);
        bus.push_reply(&[0xFB]);
        bus.push_reply(&[0xFC, 0]);
        bus.push_reply(&[0xFC, 0]);
        bus.push_reply(&[0xDB, 0x92]);
        bus.push_reply(&[CMD_GET_AVAILABLE, 0x01]);
        bus.push_reply(&[CMD_GET_TAGS, 1, 11]);
        let (session, output) = run_console(bus, true, "b\n");

        assert!(output.contains("Has tag data"));
        assert!(output.contains("Failed to retrieve tag data."));
        assert!(!session.tag().is_valid());
    }

    #[test]
    fn test_commands_without_device() {
        let (_, output) = run_console(SimulatedBus::new(), false, "a\nb\n");
        assert_eq!(output.matches("ERROR: No device").count(), 2);
    }

    #[test]
    fn test_restart_command_prints_summary() {
        let reader = SimulatedReader::new(0x42).with_peripheral_version(0x12);
        let bus = SimulatedBus::new().with_reader(reader);
        let (session, output) = run_console(bus, false, "c\n");

        assert_eq!(session.state(), SessionState::Initialized);
        assert!(output.contains("Fob reader at address 0x42"));
        assert!(output.contains("Reader FW version = 1.0"));
        assert!(output.contains("RFID reader FW version = 0x12 - counterfeit chip"));
    }

    #[test]
    fn test_unrecognized_and_quit() {
        let bus = SimulatedBus::new().with_reader(SimulatedReader::new(0x42));
        let (session, output) = run_console(bus, true, "\nz\nq\na\n");

        assert!(output.contains("WARN: Unrecognized command."));
        // Nothing after quit runs
        assert!(!output.contains("Result ="));
        let sent = session.bus().sent_opcodes();
        assert!(!sent.contains(&crate::fob::CMD_SELF_TEST));
    }
}
