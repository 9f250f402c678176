mod bus; // simulated shield bus shared by all motors
mod clock; // host millisecond clock
mod settings; // runner configuration

use bus::SimulatedBus;
use clock::HostClock;
use settings::MotorEntry;

use tracing::{error, info, info_span, warn};
use tracing_subscriber::{self, EnvFilter};
use twig_motor::StepperMotor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| settings::DEFAULT_CONFIG_PATH.to_string());
    let app = settings::load_config(&path)?;

    info!(driver_version = twig_motor::VERSION, "Simulation started");
    let bus = SimulatedBus::with_shields(&app.bus.shields);

    // Every move blocks its thread for its whole duration, so each motor gets
    // its own blocking thread and the bus lock keeps their frames apart.
    let mut tasks = Vec::new();
    for entry in app.motors {
        let bus = bus.clone();
        let name = entry.name.clone();
        let task = tokio::task::spawn_blocking(move || run_motor(entry, bus));
        tasks.push((name, task));
    }

    let mut failed = 0;
    for (name, task) in tasks {
        match task.await? {
            Ok(()) => info!(motor = %name, "Motor script finished"),
            Err(e) => {
                error!(motor = %name, "Motor script failed: {:#}", e);
                failed += 1;
            }
        }
    }

    for (address, shield) in bus.snapshot() {
        info!(
            address = format_args!("{:#04x}", address),
            duty = shield.duty,
            pattern = format_args!("{:04b}", shield.pattern),
            prescaler = ?shield.prescaler,
            saved = shield.address_saved,
            frames = shield.frames,
            "Shield state"
        );
    }

    if failed > 0 {
        anyhow::bail!("{} motor script(s) failed", failed);
    }
    Ok(())
}

fn run_motor(entry: MotorEntry, bus: SimulatedBus) -> anyhow::Result<()> {
    let span = info_span!("motor", name = %entry.name);
    let _enter = span.enter();

    let mut motor = StepperMotor::from_config(bus, HostClock::new(), &entry.motor)?;

    if let Some(prescaler) = entry.frequency_prescaler {
        motor.set_frequency_prescaler(prescaler)?;
    }

    for step in &entry.moves {
        if let Some(rpm) = step.rpm {
            motor.set_speed(rpm)?;
        }
        let address = step.address.unwrap_or(motor.address());
        // A bus failure spoils one move, not the rest of the script
        if let Err(e) = motor.move_steps(address, step.steps, step.direction) {
            if !e.is_transport() {
                return Err(e.into());
            }
            warn!(address, "Move completed with bus errors: {}", e);
        }
    }

    if let Some(change) = &entry.change_address {
        motor.change_address(motor.address(), change.new_address, change.persistence)?;
    }

    info!(state = ?motor.get_state(), "Final handle state");
    Ok(())
}
