//! Command encoder for the I2C motor shield.
//!
//! [`Shield`] turns commands into frames and writes them over any
//! [`embedded_hal::i2c::I2c`] bus. It keeps no state besides the bus itself;
//! the target address is passed to every call.

use embedded_hal::i2c::I2c;
use tracing::{trace, warn};

use crate::error::MotorError;
use crate::protocol::{Command, MAX_ADDRESS, Persistence, Phase};

/// Checks that `address` fits in 7 bits.
pub fn check_address<E>(address: u8) -> Result<u8, MotorError<E>> {
    if address > MAX_ADDRESS {
        return Err(MotorError::Range("device address must fit in 7 bits"));
    }
    Ok(address)
}

/// Frame writer for one I2C bus.
pub struct Shield<I2C> {
    i2c: I2C,
}

impl<I2C: I2c> Shield<I2C> {
    /// Wraps an initialized bus.
    pub fn new(i2c: I2C) -> Self {
        Self { i2c }
    }

    /// Encodes `command` and writes it to `address`.
    ///
    /// Blocks until the bus acknowledges or fails. A failure is reported as
    /// [`MotorError::Transport`] and logged; nothing is retried.
    pub fn send(&mut self, address: u8, command: Command) -> Result<(), MotorError<I2C::Error>> {
        check_address(address)?;
        let frame = command.encode();
        trace!(address, ?frame, "Writing shield frame");
        self.i2c.write(address, &frame).map_err(|cause| {
            warn!(address, command = ?command, error = ?cause, "Shield did not acknowledge frame");
            MotorError::Transport {
                address,
                command: command.opcode(),
                cause,
            }
        })
    }

    /// Sets the four H-bridge inputs to `pattern` (low nibble).
    pub fn send_channel(&mut self, address: u8, pattern: u8) -> Result<(), MotorError<I2C::Error>> {
        if pattern > 0x0f {
            return Err(MotorError::Range("channel pattern must fit in 4 bits"));
        }
        self.send(address, Command::ChannelSet { pattern })
    }

    /// Sets the H-bridge inputs to the pattern of `phase`.
    pub fn send_phase(&mut self, address: u8, phase: Phase) -> Result<(), MotorError<I2C::Error>> {
        let pattern = phase.pattern();
        self.send(address, Command::ChannelSet { pattern })
    }

    /// Sets both bridge outputs to `duty`.
    pub fn send_pwm(&mut self, address: u8, duty: u8) -> Result<(), MotorError<I2C::Error>> {
        self.send(address, Command::PwmSet { duty })
    }

    /// Sets the PWM switching frequency prescaler.
    pub fn send_frequency_prescaler(
        &mut self,
        address: u8,
        prescaler: u8,
    ) -> Result<(), MotorError<I2C::Error>> {
        self.send(address, Command::FrequencySet { prescaler })
    }

    /// Asks the shield at `address` to move to `new_address`.
    pub fn send_address_change(
        &mut self,
        address: u8,
        new_address: u8,
        persistence: Persistence,
    ) -> Result<(), MotorError<I2C::Error>> {
        check_address(new_address)?;
        let command = Command::AddressChange {
            new_address,
            persistence,
        };
        self.send(address, command)
    }

    /// Returns a mutable reference to the bus.
    pub fn inner(&mut self) -> &mut I2C {
        &mut self.i2c
    }

    /// Returns the bus.
    pub fn into_inner(self) -> I2C {
        self.i2c
    }
}
