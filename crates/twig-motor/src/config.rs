//! Static configuration of a stepper handle.

use crate::clock::SchedulingPolicy;
use crate::protocol::FULL_DUTY;

/// What to do with the handle's address when an address change is not acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AddressCommit {
    /// Keep the old address unless the shield acknowledged the change.
    #[default]
    OnSuccess,
    /// Switch to the new address whatever the bus reported.
    Always,
}

/// Parameters of one motor behind one shield.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MotorConfig {
    /// Steps per revolution of the phase cycle. Must be positive.
    pub steps_per_revolution: u32,
    /// Initial 7-bit shield address.
    pub address: u8,
    /// Initial speed in revolutions per minute, applied at construction when set.
    pub rpm: Option<u32>,
    /// Wait policy of the stepping loop.
    pub scheduling: SchedulingPolicy,
    /// Address-change commit policy.
    pub address_commit: AddressCommit,
    /// PWM duty used while stepping.
    pub energize_duty: u8,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            steps_per_revolution: 200,
            address: 0x28,
            rpm: None,
            scheduling: SchedulingPolicy::Blocking,
            address_commit: AddressCommit::OnSuccess,
            energize_duty: FULL_DUTY,
        }
    }
}

impl MotorConfig {
    /// Config with the given geometry and address and defaults for the rest.
    pub fn new(steps_per_revolution: u32, address: u8) -> Self {
        Self {
            steps_per_revolution,
            address,
            ..Self::default()
        }
    }
}
