//! Error types for the stepper driver.
//!
//! [`MotorError`] is returned by every operation that touches the shield or
//! validates caller input. [`FrameError`] is returned when decoding raw
//! command frames.

use crate::protocol::Opcode;

/// Errors that can occur while configuring or driving a stepper motor.
///
/// `E` is the error type of the underlying I2C transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MotorError<E> {
    /// A speed or geometry value that cannot produce a step delay.
    /// Returned for zero speeds, zero steps per revolution, or a move
    /// requested before any speed was set.
    #[error("invalid configuration: {0}")]
    Configuration(&'static str),
    /// A value wider than the protocol field that carries it.
    /// Returned for addresses above 7 bits and channel patterns above 4 bits.
    #[error("value out of range: {0}")]
    Range(&'static str),
    /// The bus did not acknowledge a command frame.
    ///
    /// The effect of the command on the shield is unknown; it may have
    /// partially executed.
    #[error("shield at {address:#04x} did not acknowledge {command}: {cause:?}")]
    Transport {
        /// Device address the frame was sent to.
        address: u8,
        /// Command carried by the failed frame.
        command: Opcode,
        /// Error reported by the transport.
        cause: E,
    },
}

impl<E> MotorError<E> {
    /// Returns `true` if the error came from the bus rather than from input validation.
    pub fn is_transport(&self) -> bool {
        matches!(self, MotorError::Transport { .. })
    }
}

/// Errors that can occur while decoding a raw command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Every command frame is exactly three bytes long.
    #[error("expected a 3-byte frame, got {0} bytes")]
    Length(usize),
    /// The first byte is not one of the shield's opcodes.
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
    /// The third byte of an address-change frame is neither `'S'` nor `'N'`.
    #[error("unknown persist marker {0:#04x}")]
    PersistMarker(u8),
    /// A channel-set pattern with bits above the low nibble.
    #[error("channel pattern {0:#010b} does not fit in 4 bits")]
    Pattern(u8),
    /// A new address above the 7-bit range.
    #[error("address {0:#04x} does not fit in 7 bits")]
    Address(u8),
}
