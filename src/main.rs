use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use tracemate::{
    DailySessionPolicy, DeviceNodeGateway, EventBusError, EventFilter, EventReceiver,
    FilePermissionStore, KeyCommand, KeyboardInputHandler, MediaGateway, PermissionState, Point,
    SimulatedGateway, TraceEvent, TraceMateConfig, TracingSurface,
};

#[derive(Parser, Debug)]
#[command(name = "tracemate")]
#[command(about = "Trace a reference image over a live camera feed")]
#[command(version)]
#[command(long_about = "Interactive tracing session: keeps one camera stream alive across \
transient failures and moves the overlay with keyboard-driven drag, zoom, rotate, pinch \
and tilt gestures. Keys: arrows drag, +/- zoom, [ ] rotate, s/S pinch-scale, t tilt, \
h hide/show, p pause/resume, n next camera, g request permission, r reset, l lock, q quit.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "tracemate.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Write logs to a daily-rolling file in this directory instead of stderr
    #[arg(long, value_name = "DIR")]
    log_dir: Option<String>,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting a session")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Use a simulated camera gateway with N devices
    #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "2")]
    simulate: Option<usize>,

    /// Camera device to start with
    #[arg(long, value_name = "DEVICE_ID")]
    device: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let _log_guard = init_logging(&args)?;

    info!("Starting TraceMate v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = match TraceMateConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    if args.validate_config {
        println!("✓ Configuration is valid");
        return Ok(());
    }

    if let Some(device) = &args.device {
        config.camera.initial_device = Some(device.clone());
    }

    run_session(config, args.simulate).await
}

async fn run_session(config: TraceMateConfig, simulate: Option<usize>) -> Result<()> {
    let gateway: Arc<dyn MediaGateway> = match simulate {
        Some(devices) => Arc::new(SimulatedGateway::new(devices)),
        None => Arc::new(DeviceNodeGateway::from_config(&config.camera)),
    };
    info!("Using {} camera gateway", gateway.name());

    let store = Arc::new(FilePermissionStore::new(&config.storage.state_path));
    let mut surface = TracingSurface::new(
        &config,
        gateway,
        store,
        Arc::new(DailySessionPolicy::unrestricted()),
    );

    let shutdown = CancellationToken::new();
    let printer = spawn_event_printer(&surface, shutdown.clone());

    surface.mount().await?;
    report(&surface);

    let (sender, mut commands) = mpsc::unbounded_channel();
    let keyboard = KeyboardInputHandler::new(shutdown.child_token());
    keyboard.start(sender);

    let center = Point::new(0.0, 0.0);
    loop {
        let command = tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT signal (Ctrl+C)");
                break;
            }
            command = commands.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        match command {
            KeyCommand::Quit => break,
            KeyCommand::ToggleVisibility => {
                let hidden = !surface.is_hidden();
                surface.on_visibility_change(hidden).await;
            }
            KeyCommand::TogglePause => {
                if surface.camera().is_active() {
                    surface.camera().pause();
                } else {
                    surface.camera().resume().await;
                }
            }
            KeyCommand::NextCamera => {
                surface.next_camera().await;
            }
            KeyCommand::RequestPermission => {
                surface.camera().request_permission().await;
            }
            KeyCommand::Reset => surface.reset_overlay(),
            KeyCommand::ToggleLock => {
                let locked = !surface.gesture().is_locked();
                surface.set_locked(locked);
                print_line(&format!("Overlay {}", if locked { "locked" } else { "unlocked" }));
            }
            gesture => {
                for input in gesture.pointer_inputs(center) {
                    surface.handle_input(input);
                }
            }
        }
        report(&surface);
    }

    info!("Shutting down tracing session");
    keyboard.stop();
    surface.unmount();
    shutdown.cancel();
    if let Err(e) = printer.await {
        warn!("Event printer task failed: {}", e);
    }
    Ok(())
}

fn spawn_event_printer(
    surface: &TracingSurface,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let filter = EventFilter::EventTypes(vec![
        "camera_started",
        "camera_stopped",
        "permission_changed",
        "camera_failed",
        "retry_scheduled",
        "devices_changed",
        "transform_changed",
    ]);
    let mut receiver = EventReceiver::new(
        surface.event_bus().subscribe(),
        filter,
        "printer".to_string(),
    );

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = receiver.recv() => match event {
                    Ok(TraceEvent::TransformChanged { transform }) => {
                        print_line(&format!("transform: {}", transform.css_transform()));
                    }
                    Ok(event) => print_line(&event.description()),
                    Err(EventBusError::ChannelClosed) => break,
                    Err(e) => warn!("Event printer: {}", e),
                },
            }
        }
    })
}

fn report(surface: &TracingSurface) {
    let state = surface.camera().snapshot();
    let camera = match (&state.stream, state.permission) {
        (Some(stream), _) => format!("live on {}", stream.device_id()),
        (None, PermissionState::Denied) => "permission denied (press g to grant)".to_string(),
        (None, _) if state.error.is_some() => "failed (press p twice to retry)".to_string(),
        (None, _) => "idle".to_string(),
    };
    let devices: Vec<String> = state.devices.iter().map(|d| d.display_label()).collect();

    print_line(&format!(
        "camera: {} | devices: [{}] | retries: {}",
        camera,
        devices.join(", "),
        state.retry_count
    ));
    if let Some(error) = &state.error {
        print_line(&format!("error: {}", error));
    }
}

// Raw mode disables newline translation
fn print_line(line: &str) {
    print!("{}\r\n", line);
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tracemate={}", log_level)));

    let (writer, guard) = match &args.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "tracemate.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (fmt::writer::BoxMakeWriter::new(writer), Some(guard))
        }
        None => (fmt::writer::BoxMakeWriter::new(std::io::stderr), None),
    };
    let ansi = args.log_dir.is_none();

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(true)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# TraceMate Configuration File");
    println!("# Every key can be overridden with TRACEMATE_<SECTION>__<KEY>");
    println!();
    println!("{}", toml::to_string_pretty(&TraceMateConfig::default())?);
    Ok(())
}
