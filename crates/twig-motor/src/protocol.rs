//! Wire format of the shield's command interface.
//!
//! Every command is a 3-byte frame `[opcode, arg1, arg2]` written to the
//! shield's 7-bit address:
//!
//! | Command         | Opcode | Byte 2      | Byte 3                  |
//! |-----------------|--------|-------------|-------------------------|
//! | Channel set     | `0xAA` | pattern     | `0x00`                  |
//! | PWM set         | `0x82` | duty        | duty (repeated)         |
//! | Address change  | `0x83` | new address | `'S'` save / `'N'` keep |
//! | Frequency set   | `0x84` | prescaler   | `0x00`                  |
//!
//! The channel pattern drives the four H-bridge inputs `IN1..IN4`, one bit
//! each, in the low nibble.

use core::fmt;

use crate::error::FrameError;

/// Length of every command frame in bytes.
pub const FRAME_LEN: usize = 3;

/// Highest valid 7-bit device address.
pub const MAX_ADDRESS: u8 = 0x7f;

/// Channel pattern with every H-bridge input low.
pub const CHANNELS_OFF: u8 = 0b0000;

/// Duty value that energizes both bridge outputs fully.
pub const FULL_DUTY: u8 = 255;

/// Command opcodes understood by the shield.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Set the four H-bridge inputs.
    ChannelSet = 0xaa,
    /// Set the PWM duty of both bridge outputs.
    PwmSet = 0x82,
    /// Move the shield to a new bus address.
    AddressChange = 0x83,
    /// Set the PWM switching frequency prescaler.
    FrequencySet = 0x84,
}

impl Opcode {
    /// Returns the opcode byte.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Opcode {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0xaa => Ok(Opcode::ChannelSet),
            0x82 => Ok(Opcode::PwmSet),
            0x83 => Ok(Opcode::AddressChange),
            0x84 => Ok(Opcode::FrequencySet),
            other => Err(FrameError::UnknownOpcode(other)),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Opcode::ChannelSet => "channel set",
            Opcode::PwmSet => "PWM set",
            Opcode::AddressChange => "address change",
            Opcode::FrequencySet => "frequency set",
        };
        write!(f, "{} ({:#04x})", name, self.as_u8())
    }
}

/// Whether the shield keeps a new address across power cycles.
///
/// Encoded as two distinct marker bytes rather than a boolean.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Persistence {
    /// Store the new address in the shield's non-volatile memory.
    Save = b'S',
    /// Use the new address until the next power cycle only.
    NoSave = b'N',
}

impl Persistence {
    /// Returns the marker byte sent in the third frame position.
    pub const fn marker(self) -> u8 {
        self as u8
    }
}

impl From<bool> for Persistence {
    fn from(persist: bool) -> Self {
        if persist {
            Persistence::Save
        } else {
            Persistence::NoSave
        }
    }
}

impl TryFrom<u8> for Persistence {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            b'S' => Ok(Persistence::Save),
            b'N' => Ok(Persistence::NoSave),
            other => Err(FrameError::PersistMarker(other)),
        }
    }
}

/// One position of the 4-step full-drive sequence.
///
/// Each variant's discriminant is its channel pattern (`IN1 IN2 IN3 IN4`,
/// most significant bit first). Neighbouring phases swap exactly one
/// winding, so the cycle never has both or neither winding energized.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Phase 0, pattern `1010`.
    A = 0b1010,
    /// Phase 1, pattern `0110`.
    B = 0b0110,
    /// Phase 2, pattern `0101`.
    C = 0b0101,
    /// Phase 3, pattern `1001`.
    D = 0b1001,
}

impl Phase {
    /// The drive sequence in step order.
    pub const SEQUENCE: [Phase; 4] = [Phase::A, Phase::B, Phase::C, Phase::D];

    /// Returns the phase for a motor step number.
    ///
    /// Only the step number modulo 4 matters, so a motor whose steps per
    /// revolution is not a multiple of 4 still maps every step onto the
    /// table; the sequence simply does not line up with the revolution.
    pub const fn for_step(step: u32) -> Phase {
        Phase::SEQUENCE[(step % 4) as usize]
    }

    /// Returns the 4-bit channel pattern for this phase.
    pub const fn pattern(self) -> u8 {
        self as u8
    }

    /// Returns the position of this phase in [`Phase::SEQUENCE`].
    pub const fn index(self) -> u8 {
        match self {
            Phase::A => 0,
            Phase::B => 1,
            Phase::C => 2,
            Phase::D => 3,
        }
    }
}

impl TryFrom<u8> for Phase {
    type Error = u8;

    /// Converts a phase index (0-3) into a [`Phase`]; returns the index back on failure.
    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Phase::SEQUENCE.get(index as usize).copied().ok_or(index)
    }
}

/// Returns the channel pattern for a phase index, or `None` if the index is not in `0..4`.
pub fn phase_pattern(index: u8) -> Option<u8> {
    Phase::try_from(index).ok().map(Phase::pattern)
}

/// A decoded shield command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Drive the H-bridge inputs with a 4-bit pattern.
    ChannelSet {
        /// Pattern in the low nibble.
        pattern: u8,
    },
    /// Drive both bridge outputs at the same duty.
    PwmSet {
        /// Duty value, 0 (off) to 255 (fully on).
        duty: u8,
    },
    /// Move the shield to a new address.
    AddressChange {
        /// New 7-bit address.
        new_address: u8,
        /// Whether the shield keeps the address across power cycles.
        persistence: Persistence,
    },
    /// Set the PWM switching frequency prescaler.
    FrequencySet {
        /// Prescaler value, passed through to the shield untouched.
        prescaler: u8,
    },
}

impl Command {
    /// Returns the opcode of this command.
    pub const fn opcode(&self) -> Opcode {
        match self {
            Command::ChannelSet { .. } => Opcode::ChannelSet,
            Command::PwmSet { .. } => Opcode::PwmSet,
            Command::AddressChange { .. } => Opcode::AddressChange,
            Command::FrequencySet { .. } => Opcode::FrequencySet,
        }
    }

    /// Encodes the command into its 3-byte frame.
    pub const fn encode(&self) -> [u8; FRAME_LEN] {
        let opcode = self.opcode().as_u8();
        match *self {
            Command::ChannelSet { pattern } => [opcode, pattern, 0x00],
            Command::PwmSet { duty } => [opcode, duty, duty],
            Command::AddressChange {
                new_address,
                persistence,
            } => [opcode, new_address, persistence.marker()],
            Command::FrequencySet { prescaler } => [opcode, prescaler, 0x00],
        }
    }

    /// Decodes a raw frame.
    ///
    /// The reserved trailing byte of channel-set and frequency-set frames is
    /// not checked. A PWM frame whose two duty bytes differ decodes to the
    /// first one.
    pub fn decode(frame: &[u8]) -> Result<Command, FrameError> {
        let [opcode, arg1, arg2] = <[u8; FRAME_LEN]>::try_from(frame)
            .map_err(|_| FrameError::Length(frame.len()))?;

        match Opcode::try_from(opcode)? {
            Opcode::ChannelSet => {
                if arg1 > 0x0f {
                    return Err(FrameError::Pattern(arg1));
                }
                Ok(Command::ChannelSet { pattern: arg1 })
            }
            Opcode::PwmSet => Ok(Command::PwmSet { duty: arg1 }),
            Opcode::AddressChange => {
                if arg1 > MAX_ADDRESS {
                    return Err(FrameError::Address(arg1));
                }
                Ok(Command::AddressChange {
                    new_address: arg1,
                    persistence: Persistence::try_from(arg2)?,
                })
            }
            Opcode::FrequencySet => Ok(Command::FrequencySet { prescaler: arg1 }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_table() {
        assert_eq!(phase_pattern(0), Some(0b1010));
        assert_eq!(phase_pattern(1), Some(0b0110));
        assert_eq!(phase_pattern(2), Some(0b0101));
        assert_eq!(phase_pattern(3), Some(0b1001));
        assert_eq!(phase_pattern(4), None);
        assert_eq!(Phase::try_from(7), Err(7));
    }

    #[test]
    fn test_phase_neighbours_swap_one_winding() {
        // The table is fixed by the shield firmware. A step turns one input of a
        // single winding off and its partner on, so neighbours always differ in
        // two bits of the same pair (IN1/IN2 or IN3/IN4), never in one bit.
        for (i, phase) in Phase::SEQUENCE.iter().enumerate() {
            let next = Phase::SEQUENCE[(i + 1) % 4];
            let changed = phase.pattern() ^ next.pattern();
            assert!(
                changed == 0b1100 || changed == 0b0011,
                "phase {i} changes {changed:04b}"
            );
            // Never both or neither input of a winding pair
            assert_eq!((phase.pattern() >> 2).count_ones(), 1);
            assert_eq!((phase.pattern() & 0b11).count_ones(), 1);
        }
    }

    #[test]
    fn test_phase_for_step_reduces_mod_4() {
        assert_eq!(Phase::for_step(0), Phase::A);
        assert_eq!(Phase::for_step(5), Phase::B);
        assert_eq!(Phase::for_step(198), Phase::C);
        assert_eq!(Phase::for_step(u32::MAX), Phase::D);
        for step in 0..50 {
            assert_eq!(Phase::for_step(step).index() as u32, step % 4);
        }
    }

    #[test]
    fn test_encode_frames() {
        let channels = Command::ChannelSet { pattern: 0b0110 };
        let prescaler = Command::FrequencySet { prescaler: 3 };
        let save = Command::AddressChange {
            new_address: 0x0f,
            persistence: Persistence::Save,
        };
        let keep = Command::AddressChange {
            new_address: 0x0f,
            persistence: Persistence::NoSave,
        };

        assert_eq!(channels.encode(), [0xaa, 0x06, 0x00]);
        assert_eq!(Command::PwmSet { duty: 200 }.encode(), [0x82, 200, 200]);
        assert_eq!(prescaler.encode(), [0x84, 3, 0x00]);
        assert_eq!(save.encode(), [0x83, 0x0f, b'S']);
        assert_eq!(keep.encode(), [0x83, 0x0f, b'N']);
    }

    #[test]
    fn test_decode_frames() {
        let keep = Command::AddressChange {
            new_address: 0x20,
            persistence: Persistence::NoSave,
        };

        assert_eq!(
            Command::decode(&[0xaa, 0x09, 0x00]),
            Ok(Command::ChannelSet { pattern: 0b1001 })
        );
        assert_eq!(
            Command::decode(&[0x82, 0, 0]),
            Ok(Command::PwmSet { duty: 0 })
        );
        assert_eq!(Command::decode(&[0x83, 0x20, b'N']), Ok(keep));
        assert_eq!(
            Command::decode(&[0x84, 1, 0]),
            Ok(Command::FrequencySet { prescaler: 1 })
        );
    }

    #[test]
    fn test_decode_rejects_malformed_frames() {
        let decode = |frame: &[u8]| Command::decode(frame).unwrap_err();

        assert_eq!(decode(&[0xaa, 0x09]), FrameError::Length(2));
        assert_eq!(decode(&[0x82, 1, 1, 1]), FrameError::Length(4));
        assert_eq!(decode(&[0x10, 0, 0]), FrameError::UnknownOpcode(0x10));
        assert_eq!(decode(&[0xaa, 0x1a, 0]), FrameError::Pattern(0x1a));
        assert_eq!(decode(&[0x83, 0x20, 1]), FrameError::PersistMarker(1));
        assert_eq!(decode(&[0x83, 0x80, b'S']), FrameError::Address(0x80));
    }

    #[test]
    fn test_persistence_markers() {
        assert_eq!(Persistence::from(true).marker(), b'S');
        assert_eq!(Persistence::from(false).marker(), b'N');
        assert_ne!(Persistence::Save.marker(), 1);
        assert_ne!(Persistence::NoSave.marker(), 0);
    }

    #[test]
    fn test_opcode_display() {
        assert_eq!(Opcode::ChannelSet.to_string(), "channel set (0xaa)");
        assert_eq!(Opcode::try_from(0x84), Ok(Opcode::FrequencySet));
    }
}
