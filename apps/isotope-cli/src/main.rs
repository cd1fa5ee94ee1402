use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use isotope_fleet::{Fleet, FleetConfig};
use serial_transport::{MockLink, SerialLink, UsbSerialLink};

#[derive(Parser, Debug)]
#[command(
    name = "isotope",
    version,
    about = "Isotope Breakout fleet CLI",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Backend {
    Mock,
    Serial,
}

const DEFAULT_CONFIG: &str = "configs/example_fleet.yaml";

#[derive(Subcommand, Debug)]
enum Commands {
    /// List candidate serial ports
    Ports {
        #[arg(long, value_enum, default_value_t = Backend::Serial)]
        backend: Backend,
    },
    /// Parse a fleet configuration and validate the device registry
    Validate {
        #[arg(long, default_value = DEFAULT_CONFIG)]
        config: String,
        /// Emit the merged configuration as JSON
        #[arg(long)]
        json: bool,
    },
    /// Connect to every board and report identity and firmware
    Identify {
        #[arg(long, default_value = DEFAULT_CONFIG)]
        config: String,
        #[arg(long, value_enum, default_value_t = Backend::Mock)]
        backend: Backend,
        /// Dump Prometheus metrics after the handshake
        #[arg(long)]
        metrics: bool,
    },
    /// Spin a pump continuously
    PumpRun {
        #[arg(long, default_value = DEFAULT_CONFIG)]
        config: String,
        #[arg(long)]
        name: String,
        /// Override the configured rpm
        #[arg(long)]
        rpm: Option<u32>,
        #[arg(long, value_enum, default_value_t = Backend::Mock)]
        backend: Backend,
    },
    /// Move a volume of liquid through a pump
    PumpDispense {
        #[arg(long, default_value = DEFAULT_CONFIG)]
        config: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        ml: f64,
        #[arg(long, value_enum, default_value_t = Backend::Mock)]
        backend: Backend,
    },
    /// Release a pump's motor port
    PumpStop {
        #[arg(long, default_value = DEFAULT_CONFIG)]
        config: String,
        #[arg(long)]
        name: String,
        #[arg(long, value_enum, default_value_t = Backend::Mock)]
        backend: Backend,
    },
    /// Open a valve
    ValveOpen {
        #[arg(long, default_value = DEFAULT_CONFIG)]
        config: String,
        #[arg(long)]
        name: String,
        #[arg(long, value_enum, default_value_t = Backend::Mock)]
        backend: Backend,
    },
    /// Close a valve
    ValveClose {
        #[arg(long, default_value = DEFAULT_CONFIG)]
        config: String,
        #[arg(long)]
        name: String,
        #[arg(long, value_enum, default_value_t = Backend::Mock)]
        backend: Backend,
    },
    /// Read a temperature sensor port on one board
    ReadTemp {
        #[arg(long, default_value = DEFAULT_CONFIG)]
        config: String,
        #[arg(long)]
        board: String,
        #[arg(long, default_value_t = 0u8)]
        port_id: u8,
        #[arg(long, value_enum, default_value_t = Backend::Mock)]
        backend: Backend,
    },
    /// Read an analogue input port on one board
    ReadAnalog {
        #[arg(long, default_value = DEFAULT_CONFIG)]
        config: String,
        #[arg(long)]
        board: String,
        #[arg(long, default_value_t = 0u8)]
        port_id: u8,
        #[arg(long, value_enum, default_value_t = Backend::Mock)]
        backend: Backend,
    },
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Ports { backend } => ports(backend),
        Commands::Validate { config, json } => validate(&config, json),
        Commands::Identify {
            config,
            backend,
            metrics,
        } => identify(&config, backend, metrics),
        Commands::PumpRun {
            config,
            name,
            rpm,
            backend,
        } => with_fleet(&config, backend, |fleet| {
            fleet.get_pump(&name)?.run(rpm)?;
            info!(pump = %name, "running");
            Ok(())
        }),
        Commands::PumpDispense {
            config,
            name,
            ml,
            backend,
        } => with_fleet(&config, backend, |fleet| {
            fleet.get_pump(&name)?.dispense(ml)?;
            info!(pump = %name, ml, "dispense accepted");
            Ok(())
        }),
        Commands::PumpStop {
            config,
            name,
            backend,
        } => with_fleet(&config, backend, |fleet| {
            fleet.get_pump(&name)?.stop()?;
            info!(pump = %name, "stopped");
            Ok(())
        }),
        Commands::ValveOpen {
            config,
            name,
            backend,
        } => with_fleet(&config, backend, |fleet| {
            fleet.get_valve(&name)?.open()?;
            info!(valve = %name, "opened");
            Ok(())
        }),
        Commands::ValveClose {
            config,
            name,
            backend,
        } => with_fleet(&config, backend, |fleet| {
            fleet.get_valve(&name)?.close()?;
            info!(valve = %name, "closed");
            Ok(())
        }),
        Commands::ReadTemp {
            config,
            board,
            port_id,
            backend,
        } => with_fleet(&config, backend, |fleet| {
            let session = fleet
                .board(&board)
                .ok_or_else(|| anyhow::anyhow!("unknown board: {board}"))?;
            let value = session.read_temperature(port_id)?;
            println!("{value}");
            Ok(())
        }),
        Commands::ReadAnalog {
            config,
            board,
            port_id,
            backend,
        } => with_fleet(&config, backend, |fleet| {
            let session = fleet
                .board(&board)
                .ok_or_else(|| anyhow::anyhow!("unknown board: {board}"))?;
            let value = session.read_analogue(port_id)?;
            println!("{value}");
            Ok(())
        }),
    }
}

fn setup_tracing() {
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn ports(backend: Backend) -> Result<()> {
    let ports = match backend {
        Backend::Mock => MockLink::list()?,
        Backend::Serial => UsbSerialLink::list()?,
    };
    for port in ports {
        println!("{}\t{}", port.name, port.driver);
    }
    Ok(())
}

fn load(config: &str) -> Result<FleetConfig> {
    isotope_fleet::load_config_file(config)
}

fn validate(config: &str, json: bool) -> Result<()> {
    let cfg = load(config)?;
    let registry = isotope_fleet::DeviceRegistry::build(&cfg)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&cfg)?);
        return Ok(());
    }
    for board in registry.boards() {
        println!("board\t{}\t{}", board.name, board.port);
    }
    for name in registry.pump_names() {
        let pump = registry.resolve_pump(name)?;
        println!("pump\t{name}\t{}", pump.address());
    }
    for name in registry.valve_names() {
        let valve = registry.resolve_valve(name)?;
        println!("valve\t{name}\t{}", valve.address());
    }
    Ok(())
}

fn identify(config: &str, backend: Backend, metrics: bool) -> Result<()> {
    let fleet = open_fleet(config, backend)?;
    for board in fleet.registry().boards() {
        if let Some(session) = fleet.board(&board.name) {
            let identity = session.identify()?;
            println!("{}\t{}\t{}", board.name, identity.board, identity.firmware);
        }
    }
    if metrics {
        print!("{}", fleet.metrics_text());
    }
    fleet.shutdown();
    Ok(())
}

fn open_fleet(config: &str, backend: Backend) -> Result<Fleet> {
    let cfg = load(config)?;
    let fleet = match backend {
        Backend::Mock => Fleet::connect::<MockLink>(&cfg)?,
        Backend::Serial => Fleet::connect::<UsbSerialLink>(&cfg)?,
    };
    Ok(fleet)
}

fn with_fleet(
    config: &str,
    backend: Backend,
    op: impl FnOnce(&Fleet) -> Result<()>,
) -> Result<()> {
    let fleet = open_fleet(config, backend)?;
    let result = op(&fleet);
    fleet.shutdown();
    result
}
