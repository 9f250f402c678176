// --- Mock Implementations ---
//
// Shared by the unit tests of every module. Exact frame sequences are checked
// with embedded-hal-mock; these mocks cover the property-style tests where a
// full expectation list would be unwieldy.

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

use crate::clock::Clock;
use crate::protocol::Command;

/// Clock that advances by a fixed tick on every reading.
pub struct FakeClock {
    now: u32,
    tick: u32,
    yields: usize,
}

impl FakeClock {
    pub fn new(start: u32, tick: u32) -> Self {
        Self {
            now: start,
            tick,
            yields: 0,
        }
    }

    pub fn now(&self) -> u32 {
        self.now
    }

    pub fn yields(&self) -> usize {
        self.yields
    }
}

impl Clock for FakeClock {
    fn now_ms(&mut self) -> u32 {
        let now = self.now;
        self.now = self.now.wrapping_add(self.tick);
        now
    }

    fn yield_now(&mut self) {
        self.yields += 1;
    }
}

/// I2C bus that records every written frame and can refuse selected ones.
#[derive(Default)]
pub struct RecordingBus {
    pub frames: Vec<(u8, Vec<u8>)>,
    /// Zero-based indices (counting attempts) of writes that get no acknowledge.
    pub fail_on: Vec<usize>,
    /// Addresses that never acknowledge.
    pub absent: Vec<u8>,
    attempts: usize,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(fail_on: &[usize]) -> Self {
        Self {
            fail_on: fail_on.to_vec(),
            ..Self::default()
        }
    }

    pub fn commands(&self) -> Vec<Command> {
        self.frames
            .iter()
            .map(|(_, bytes)| Command::decode(bytes).unwrap())
            .collect()
    }

    pub fn channel_patterns(&self) -> Vec<u8> {
        self.commands()
            .into_iter()
            .filter_map(|command| match command {
                Command::ChannelSet { pattern } => Some(pattern),
                _ => None,
            })
            .collect()
    }
}

impl ErrorType for RecordingBus {
    type Error = ErrorKind;
}

impl I2c for RecordingBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        for operation in operations.iter_mut() {
            let attempt = self.attempts;
            self.attempts += 1;
            if self.absent.contains(&address) {
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
            }
            if self.fail_on.contains(&attempt) {
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data));
            }
            match operation {
                Operation::Write(bytes) => self.frames.push((address, bytes.to_vec())),
                Operation::Read(buffer) => buffer.fill(0),
            }
        }
        Ok(())
    }
}
