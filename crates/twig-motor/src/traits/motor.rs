use crate::protocol::Persistence;

/// Rotation direction of a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Direction {
    /// Step numbers count up.
    #[default]
    Forward,
    /// Step numbers count down.
    Backward,
}

impl Direction {
    /// Returns the opposite direction.
    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

/// Operational state of a stepper handle.
///
/// A move is the only way into [`Activity::Stepping`]; it always ends in
/// [`Activity::Idle`], either by finishing or by an explicit release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activity {
    /// PWM off, all channels low.
    #[default]
    Idle,
    /// PWM on, channels cycling through the drive sequence.
    Stepping,
}

/// Snapshot of a stepper handle.
///
/// Captures everything the handle believes about its motor. The shield
/// itself is never queried, so after a transport failure this may differ
/// from what the hardware is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorState {
    /// Address the last command was sent to.
    pub address: u8,
    /// Steps per full revolution of the phase cycle.
    pub steps_per_revolution: u32,
    /// Current step number, always in `[0, steps_per_revolution)`.
    pub step_number: u32,
    /// Direction of the last move.
    pub direction: Direction,
    /// Requested speed in revolutions per minute, if one was set.
    pub rpm: Option<u32>,
    /// Delay between steps derived from `rpm`.
    pub step_delay_ms: Option<u32>,
    /// Whether the motor is being driven.
    pub activity: Activity,
}

/// Core trait defining the interface for stepper control
pub trait StepperControl {
    type Error;

    /// Set the speed of the phase cycle in revolutions per minute
    fn set_speed(&mut self, rpm: u32) -> Result<(), Self::Error>;

    /// Step `steps` times in `direction` on the shield at `address`, then release it.
    /// Only the magnitude of `steps` is used.
    fn move_steps(
        &mut self,
        address: u8,
        steps: i32,
        direction: Direction,
    ) -> Result<(), Self::Error>;

    /// De-energize the shield at `address`
    fn release(&mut self, address: u8) -> Result<(), Self::Error>;

    /// Move the shield at `current` to the bus address `new`
    fn change_address(
        &mut self,
        current: u8,
        new: u8,
        persistence: Persistence,
    ) -> Result<(), Self::Error>;

    /// Get the current state of the handle
    fn get_state(&self) -> MotorState;
}
