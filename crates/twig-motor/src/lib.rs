#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![doc = "A `no_std` driver for 4-wire stepper motors behind an I2C H-bridge shield."]
#![doc = ""]
#![doc = "The shield takes 3-byte command frames that set its four H-bridge inputs,"]
#![doc = "its PWM duty, its PWM prescaler and its bus address. [`StepperMotor`] turns a"]
#![doc = "speed and a step count into a timed sequence of those frames."]
#![doc = ""]
#![doc = "```ignore"]
#![doc = "let mut motor = StepperMotor::new(i2c, clock, 200, 0x28)?;"]
#![doc = "motor.set_speed(60)?; // 5 ms per step"]
#![doc = "motor.move_steps(0x28, 200, Direction::Forward)?; // one revolution, then release"]
#![doc = "```"]

pub mod clock;
pub mod config;
pub mod devices;
pub mod error;
pub mod protocol;
pub mod shield;
pub mod traits;

#[cfg(test)]
mod testing;

pub use clock::{Clock, SchedulingPolicy};
pub use config::{AddressCommit, MotorConfig};
pub use devices::stepper::{StepperMotor, VERSION, step_delay_ms};
pub use error::{FrameError, MotorError};
pub use protocol::{Command, Opcode, Persistence, Phase, phase_pattern};
pub use shield::Shield;
pub use traits::motor::{Activity, Direction, MotorState, StepperControl};
