use embedded_hal::i2c::I2c;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SchedulingPolicy, elapsed_ms};
use crate::config::{AddressCommit, MotorConfig};
use crate::error::MotorError;
use crate::protocol::{CHANNELS_OFF, Persistence, Phase};
use crate::shield::{Shield, check_address};
use crate::traits::motor::{Activity, Direction, MotorState, StepperControl};

/// Version of the shield command set this driver speaks.
pub const VERSION: u8 = 1;

/// Milliseconds between steps for a speed in revolutions per minute.
///
/// Computed as `60000 / (steps_per_revolution * rpm)`, truncated. Returns
/// `None` when either factor is zero. Speeds above 60000 steps per minute
/// truncate to a zero delay, so the motor steps as fast as the bus allows.
pub fn step_delay_ms(steps_per_revolution: u32, rpm: u32) -> Option<u32> {
    if steps_per_revolution == 0 || rpm == 0 {
        return None;
    }
    let steps_per_minute = u64::from(steps_per_revolution) * u64::from(rpm);
    Some((60_000 / steps_per_minute) as u32)
}

fn keep_first<E>(slot: &mut Option<MotorError<E>>, result: Result<(), MotorError<E>>) {
    if let Err(err) = result {
        if slot.is_none() {
            *slot = Some(err);
        }
    }
}

/// Step scheduler for one 4-wire stepper behind an I2C shield.
///
/// Owns the bus and the clock it was given. Several handles can share one
/// physical bus as long as the `I2C` implementation serializes their frames
/// (for example a mutex-guarded bus device per handle).
pub struct StepperMotor<I2C, C> {
    shield: Shield<I2C>,
    clock: C,
    address: u8,
    steps_per_revolution: u32,
    rpm: Option<u32>,
    step_delay_ms: Option<u32>,
    step_number: u32,
    direction: Direction,
    last_step_ms: u32,
    activity: Activity,
    scheduling: SchedulingPolicy,
    address_commit: AddressCommit,
    energize_duty: u8,
}

impl<I2C, C> StepperMotor<I2C, C>
where
    I2C: I2c,
    C: Clock,
{
    /// Creates a handle with default settings.
    ///
    /// The bus must already be initialized. Nothing is sent until the first
    /// command.
    ///
    /// # Errors
    ///
    /// Returns `Err(MotorError::Configuration)` if `steps_per_revolution` is zero.
    /// Returns `Err(MotorError::Range)` if `address` does not fit in 7 bits.
    pub fn new(
        i2c: I2C,
        clock: C,
        steps_per_revolution: u32,
        address: u8,
    ) -> Result<Self, MotorError<I2C::Error>> {
        let config = MotorConfig::new(steps_per_revolution, address);
        Self::from_config(i2c, clock, &config)
    }

    /// Creates a handle from a [`MotorConfig`].
    ///
    /// If the config carries a speed it is applied as by [`StepperMotor::set_speed`].
    pub fn from_config(
        i2c: I2C,
        clock: C,
        config: &MotorConfig,
    ) -> Result<Self, MotorError<I2C::Error>> {
        if config.steps_per_revolution == 0 {
            return Err(MotorError::Configuration("steps per revolution must be positive"));
        }
        let address = check_address(config.address)?;

        let mut motor = Self {
            shield: Shield::new(i2c),
            clock,
            address,
            steps_per_revolution: config.steps_per_revolution,
            rpm: None,
            step_delay_ms: None,
            step_number: 0,
            direction: Direction::Forward,
            last_step_ms: 0,
            activity: Activity::Idle,
            scheduling: config.scheduling,
            address_commit: config.address_commit,
            energize_duty: config.energize_duty,
        };
        if let Some(rpm) = config.rpm {
            motor.set_speed(rpm)?;
        }
        Ok(motor)
    }

    /// Sets the speed of the phase cycle in revolutions per minute.
    ///
    /// This is the speed of the motor shaft itself; any gearing is up to the
    /// caller.
    ///
    /// # Errors
    ///
    /// Returns `Err(MotorError::Configuration)` if `rpm` is zero. The previous
    /// speed is kept.
    pub fn set_speed(&mut self, rpm: u32) -> Result<(), MotorError<I2C::Error>> {
        let delay = step_delay_ms(self.steps_per_revolution, rpm)
            .ok_or(MotorError::Configuration("speed must be positive"))?;
        self.rpm = Some(rpm);
        self.step_delay_ms = Some(delay);
        debug!(rpm, step_delay_ms = delay, "Speed set");
        Ok(())
    }

    /// Steps the motor `|steps|` times in `direction`, then releases it.
    ///
    /// Blocks until the last step has been taken: the whole move takes about
    /// `|steps| * step_delay_ms` milliseconds. Between deadlines the loop
    /// waits according to the handle's [`SchedulingPolicy`]. The sign of
    /// `steps` is ignored.
    ///
    /// Frames that the bus does not acknowledge do not stop the move; a
    /// half-finished sequence would leave the windings in an arbitrary state.
    /// The move always runs to the end and always releases the motor.
    ///
    /// # Errors
    ///
    /// Returns `Err(MotorError::Configuration)` if no speed was set and
    /// `Err(MotorError::Range)` for an invalid address; in both cases nothing
    /// is sent. Otherwise returns the first transport error of the move, if
    /// any, after the move has finished.
    pub fn move_steps(
        &mut self,
        address: u8,
        steps: i32,
        direction: Direction,
    ) -> Result<(), MotorError<I2C::Error>> {
        let delay = self
            .step_delay_ms
            .ok_or(MotorError::Configuration("speed must be set before moving"))?;
        self.address = check_address(address)?;
        self.direction = direction;

        let total = steps.unsigned_abs();
        info!(address, steps = total, ?direction, step_delay_ms = delay, "Starting move");

        let mut first_error = None;
        let mut failed_writes = 0u32;

        self.activity = Activity::Stepping;
        let energized = self.shield.send_pwm(address, self.energize_duty);
        if energized.is_err() {
            failed_writes += 1;
        }
        keep_first(&mut first_error, energized);

        let mut remaining = total;
        while remaining > 0 {
            let now = self.clock.now_ms();
            if elapsed_ms(now, self.last_step_ms) < delay {
                self.scheduling.wait(&mut self.clock);
                continue;
            }
            self.last_step_ms = now;
            self.advance();
            remaining -= 1;

            let phase = Phase::for_step(self.step_number);
            debug!(step = self.step_number, pattern = phase.pattern(), "Step");
            let written = self.shield.send_phase(address, phase);
            if written.is_err() {
                failed_writes += 1;
            }
            keep_first(&mut first_error, written);
        }

        let released = self.release(address);
        if failed_writes > 0 {
            warn!(address, failed_writes, "Move finished with lost frames");
        } else {
            info!(address, step = self.step_number, "Move finished");
        }

        match first_error {
            Some(err) => Err(err),
            None => released,
        }
    }

    fn advance(&mut self) {
        self.step_number = match self.direction {
            Direction::Forward => (self.step_number + 1) % self.steps_per_revolution,
            Direction::Backward => self
                .step_number
                .checked_sub(1)
                .unwrap_or(self.steps_per_revolution - 1),
        };
    }

    /// De-energizes the shield at `address`.
    ///
    /// Cuts PWM before dropping the channels, so the bridge never passes
    /// full current through a half-set pattern. Both frames are always
    /// attempted.
    ///
    /// # Errors
    ///
    /// Returns `Err(MotorError::Range)` for an invalid address, or the first
    /// transport error of the two frames.
    pub fn release(&mut self, address: u8) -> Result<(), MotorError<I2C::Error>> {
        self.address = check_address(address)?;
        let pwm = self.shield.send_pwm(address, 0);
        let channels = self.shield.send_channel(address, CHANNELS_OFF);
        self.activity = Activity::Idle;
        pwm.and(channels)
    }

    /// Moves the shield at `current` to the bus address `new`.
    ///
    /// With [`AddressCommit::OnSuccess`] the handle only switches to `new` if
    /// the shield acknowledged; with [`AddressCommit::Always`] it switches
    /// regardless.
    ///
    /// # Errors
    ///
    /// Returns `Err(MotorError::Range)` if either address does not fit in 7
    /// bits, or the transport error of the address-change frame.
    pub fn change_address(
        &mut self,
        current: u8,
        new: u8,
        persistence: Persistence,
    ) -> Result<(), MotorError<I2C::Error>> {
        check_address(current)?;
        let result = self.shield.send_address_change(current, new, persistence);
        match (&result, self.address_commit) {
            (Ok(()), _) => {
                info!(from = current, to = new, ?persistence, "Shield address changed");
                self.address = new;
            }
            (Err(MotorError::Transport { .. }), AddressCommit::Always) => {
                warn!(from = current, to = new, "Switching address despite NACK");
                self.address = new;
            }
            (Err(_), _) => {}
        }
        result
    }

    /// Sets the shield's PWM switching frequency prescaler.
    ///
    /// Never sent by the scheduler itself.
    pub fn set_frequency_prescaler(&mut self, prescaler: u8) -> Result<(), MotorError<I2C::Error>> {
        let address = self.address;
        self.shield.send_frequency_prescaler(address, prescaler)
    }

    /// Points the handle at another shield without sending anything.
    pub fn set_address(&mut self, address: u8) -> Result<(), MotorError<I2C::Error>> {
        self.address = check_address(address)?;
        Ok(())
    }

    /// Changes how the stepping loop waits between deadlines.
    pub fn set_scheduling(&mut self, scheduling: SchedulingPolicy) {
        self.scheduling = scheduling;
    }

    /// Returns the command set version, always [`VERSION`].
    pub fn version(&self) -> u8 {
        VERSION
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn step_number(&self) -> u32 {
        self.step_number
    }

    pub fn step_delay_ms(&self) -> Option<u32> {
        self.step_delay_ms
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Returns a snapshot of the handle.
    pub fn get_state(&self) -> MotorState {
        MotorState {
            address: self.address,
            steps_per_revolution: self.steps_per_revolution,
            step_number: self.step_number,
            direction: self.direction,
            rpm: self.rpm,
            step_delay_ms: self.step_delay_ms,
            activity: self.activity,
        }
    }

    /// Consumes the handle and returns the bus and the clock.
    pub fn release_bus(self) -> (I2C, C) {
        (self.shield.into_inner(), self.clock)
    }
}

impl<I2C, C> StepperControl for StepperMotor<I2C, C>
where
    I2C: I2c,
    C: Clock,
{
    type Error = MotorError<I2C::Error>;

    fn set_speed(&mut self, rpm: u32) -> Result<(), Self::Error> {
        StepperMotor::set_speed(self, rpm)
    }

    fn move_steps(
        &mut self,
        address: u8,
        steps: i32,
        direction: Direction,
    ) -> Result<(), Self::Error> {
        StepperMotor::move_steps(self, address, steps, direction)
    }

    fn release(&mut self, address: u8) -> Result<(), Self::Error> {
        StepperMotor::release(self, address)
    }

    fn change_address(
        &mut self,
        current: u8,
        new: u8,
        persistence: Persistence,
    ) -> Result<(), Self::Error> {
        StepperMotor::change_address(self, current, new, persistence)
    }

    fn get_state(&self) -> MotorState {
        StepperMotor::get_state(self)
    }
}
