use std::collections::BTreeMap;
use std::sync::Arc;

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use parking_lot::Mutex;
use tracing::{debug, warn};
use twig_motor::{Command, Persistence};

/// What a simulated shield is currently doing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShieldState {
    pub pattern: u8,
    pub duty: u8,
    pub prescaler: Option<u8>,
    /// Set once an address change asked the shield to keep its address
    pub address_saved: bool,
    pub frames: usize,
}

/// Simulated I2C bus with motor shields listening on it.
///
/// Clones share the same shields. Every transaction holds the bus lock for
/// its whole duration, so handles running on different threads never
/// interleave their frames.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBus {
    shields: Arc<Mutex<BTreeMap<u8, ShieldState>>>,
}

impl SimulatedBus {
    pub fn with_shields(addresses: &[u8]) -> Self {
        let shields = addresses
            .iter()
            .map(|&address| (address, ShieldState::default()))
            .collect();
        Self {
            shields: Arc::new(Mutex::new(shields)),
        }
    }

    pub fn shield(&self, address: u8) -> Option<ShieldState> {
        self.shields.lock().get(&address).cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<u8, ShieldState> {
        self.shields.lock().clone()
    }
}

fn apply(
    shields: &mut BTreeMap<u8, ShieldState>,
    address: u8,
    bytes: &[u8],
) -> Result<(), ErrorKind> {
    let Some(shield) = shields.get_mut(&address) else {
        debug!(address, "No shield at address");
        return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
    };

    let command = Command::decode(bytes).map_err(|e| {
        warn!(address, ?bytes, error = %e, "Shield rejected malformed frame");
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)
    })?;
    debug!(address, ?command, "Shield received command");
    shield.frames += 1;

    match command {
        Command::ChannelSet { pattern } => shield.pattern = pattern,
        Command::PwmSet { duty } => shield.duty = duty,
        Command::FrequencySet { prescaler } => shield.prescaler = Some(prescaler),
        Command::AddressChange {
            new_address,
            persistence,
        } => {
            // Two shields answering one address would corrupt every later frame
            if new_address != address && shields.contains_key(&new_address) {
                warn!(address, new_address, "Address already taken");
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data));
            }
            let mut moved = shields.remove(&address).unwrap_or_default();
            moved.address_saved = persistence == Persistence::Save;
            shields.insert(new_address, moved);
        }
    }
    Ok(())
}

impl ErrorType for SimulatedBus {
    type Error = ErrorKind;
}

impl I2c for SimulatedBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut shields = self.shields.lock();
        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => apply(&mut shields, address, bytes)?,
                // The shield has no readable registers
                Operation::Read(buffer) => buffer.fill(0),
            }
        }
        Ok(())
    }
}
