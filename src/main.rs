use clap::{Parser, Subcommand};
use sio_tty::config::{Config, ConfigLoader};
use sio_tty::device::{DeviceClassCache, DeviceClassMap, DeviceId, SysfsLocator};
use sio_tty::port::{interact, Port, PortSettings, STOPS};
use sio_tty::{logging, AppError, AppResult, ModemLines};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::Duration;

/// How long the pump waits for a command before polling the line again.
const PUMP_IDLE: Duration = Duration::from_millis(20);

/// Time given to queued commands after stdin closes.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "sio-tty",
    version,
    about = "Inspect and talk to POSIX serial tty devices.",
    long_about = "Opens a tty in raw mode with the configured line settings. Settings come from sio-tty.toml, SIO_TTY_* environment variables, and the flags below, in increasing priority."
)]
struct Args {
    /// Explicit configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Line speed, overriding the configuration.
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    /// Per-call deadline in milliseconds; 0 blocks indefinitely.
    #[arg(short, long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open a device and report its identity, settings and line state.
    Info {
        device: Option<PathBuf>,
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Write one command line and print the reply up to OK or ERROR.
    Send { device: PathBuf, line: String },
    /// Dump the kernel device-class map.
    Classes {
        #[arg(long)]
        json: bool,
    },
    /// List sysfs directories for a device number.
    Locate { major: u32, minor: u32 },
    /// Forward stdin lines to the device and device output to stdout.
    Interact { device: Option<PathBuf> },
}

fn main() {
    let args = Args::parse();
    if let Err(err) = run(args) {
        tracing::error!(error = %err, "command failed");
        eprintln!("sio-tty: {err}");
        std::process::exit(err.exit_code());
    }
}

fn run(args: Args) -> AppResult<()> {
    let loader = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    let mut config = loader.into_config();
    if let Some(baud) = args.baud {
        config.serial.baud = baud;
    }
    if let Some(ms) = args.timeout_ms {
        config.serial.timeout_ms = ms;
    }
    logging::init(&config.logging)?;

    match args.command {
        Command::Info { device, json } => info(&config, device, json),
        Command::Send { device, line } => send(&config, device, &line),
        Command::Classes { json } => classes(&config, json),
        Command::Locate { major, minor } => locate(&config, DeviceId::new(major, minor)),
        Command::Interact { device } => run_interact(&config, device),
    }
}

fn class_cache(config: &Config) -> Arc<DeviceClassCache> {
    Arc::new(DeviceClassCache::new(config.device.class_sources()))
}

fn open(config: &Config, device: Option<PathBuf>) -> AppResult<Port> {
    let path = device
        .or_else(|| config.serial.device.clone())
        .ok_or_else(|| AppError::InvalidArgument("no device given and none configured".into()))?;
    let settings: PortSettings = config.port_settings()?;

    let port = Port::with_identity(
        class_cache(config),
        SysfsLocator::new(&config.device.sysfs_root),
    );
    port.set_timeout(config.serial.timeout());
    port.open_with(&path, settings)?;
    Ok(port)
}

fn info(config: &Config, device: Option<PathBuf>, json: bool) -> AppResult<()> {
    let port = open(config, device)?;
    let settings = port.settings()?;
    let lines = port.modem_lines().ok();
    let in_waiting = port.in_waiting().ok();
    let out_waiting = port.out_waiting().ok();

    if json {
        let report = serde_json::json!({
            "path": port.path(),
            "device": port.device_id(),
            "class": port.device_class_name(),
            "sysfs": port.sysfs(),
            "settings": settings,
            "low_latency": port.low_latency().ok(),
            "modem": lines.map(|l| serde_json::json!({
                "cts": l.contains(ModemLines::CTS),
                "dsr": l.contains(ModemLines::DSR),
                "ri": l.contains(ModemLines::RI),
                "cd": l.contains(ModemLines::CD),
            })),
            "in_waiting": in_waiting,
            "out_waiting": out_waiting,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{port}");
    println!("  line:        {}", settings.termios);
    if let Some(id) = port.device_id() {
        println!("  device:      {id}");
    }
    for dir in port.sysfs() {
        println!("  sysfs:       {}", dir.display());
    }
    match lines {
        Some(l) => println!(
            "  modem:       cts={} dsr={} ri={} cd={}",
            l.contains(ModemLines::CTS),
            l.contains(ModemLines::DSR),
            l.contains(ModemLines::RI),
            l.contains(ModemLines::CD),
        ),
        None => println!("  modem:       unavailable"),
    }
    if let (Some(rx), Some(tx)) = (in_waiting, out_waiting) {
        println!("  queued:      {rx} in, {tx} out");
    }
    Ok(())
}

fn send(config: &Config, device: PathBuf, line: &str) -> AppResult<()> {
    let port = open(config, Some(device))?;
    port.write_line(line)?;
    let reply = port.read_until(&STOPS)?;
    print!("{reply}");
    io::stdout().flush()?;
    port.close();
    Ok(())
}

fn classes(config: &Config, json: bool) -> AppResult<()> {
    let map = DeviceClassMap::load(&config.device.class_sources());
    if json {
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(());
    }
    for (major, _) in map.iter() {
        println!("{major:>4}  {}", map.name(major));
    }
    Ok(())
}

fn locate(config: &Config, id: DeviceId) -> AppResult<()> {
    let locator = SysfsLocator::new(&config.device.sysfs_root);
    let found = locator.locate(&config.device.sysfs_class, id);
    if found.is_empty() {
        return Err(AppError::InvalidArgument(format!(
            "no {} device {id} under {}",
            config.device.sysfs_class,
            locator.class_dir(&config.device.sysfs_class).display()
        )));
    }
    for dir in found {
        println!("{}", dir.display());
    }
    Ok(())
}

fn run_interact(config: &Config, device: Option<PathBuf>) -> AppResult<()> {
    let port = open(config, device)?;
    eprintln!("{port} ({}); Ctrl-D to quit", port.settings()?.termios);

    let (tx, rx) = mpsc::channel::<Vec<u8>>();
    let port = Arc::new(port);
    let closer = Arc::clone(&port);
    // Detached: a blocked stdin read must not keep the process alive once
    // the pump stops.
    std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(mut line) = line else { break };
                line.push('\r');
                if tx.send(line.into_bytes()).is_err() {
                    return;
                }
            }
            drop(tx);
            std::thread::sleep(DRAIN_GRACE);
            closer.close();
        })?;

    let mut stdout = io::stdout();
    interact(
        port.as_ref(),
        &rx,
        |bytes| {
            stdout.write_all(bytes)?;
            stdout.flush()
        },
        PUMP_IDLE,
    )?;
    port.close();
    Ok(())
}
