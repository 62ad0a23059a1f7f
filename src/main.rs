use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use log::LevelFilter;
use serde_json::{Map, Value};
use std::path::PathBuf;
use xray_manager_lib::logging;
use xray_manager_lib::xray::commands;
use xray_manager_lib::xray::{
    CoreManager, ManagerSettings, OutboundToggle, PidFileGuard, StartOutcome, StopOutcome,
};

#[derive(Parser)]
#[command(name = "xray-manager")]
#[command(about = "Install, configure and supervise a local Xray core", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to settings.json
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", value_parser = parse_level)]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download and unpack the configured Xray release
    Install,
    /// Print the release URL for this platform
    Url,
    /// Show installed / configured / running status
    Status,
    /// Start the core in the background
    Start,
    /// Send a termination signal to the core
    Stop,
    /// Stop, then start the core
    Restart,
    /// Start the core and stay in the foreground until Ctrl-C
    Run,
    /// Check a config with `xray run -test`
    Validate {
        /// Config to check (defaults to the managed config.json)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Replace config.json with the built-in default
    ResetConfig,
    /// Print the stored config.json
    ShowConfig,
    /// Enable or disable an outbound matched by field=value pairs
    #[command(group(ArgGroup::new("state").required(true).args(["enable", "disable"])))]
    Toggle {
        /// Identifying fields, e.g. name=proxy-a or tag=direct
        #[arg(required = true, value_parser = parse_field)]
        fields: Vec<(String, Value)>,

        #[arg(long)]
        enable: bool,

        #[arg(long)]
        disable: bool,
    },
}

fn parse_level(raw: &str) -> Result<LevelFilter, String> {
    raw.parse()
        .map_err(|_| format!("unknown log level {}", raw))
}

/// Parse `key=value`; the value is JSON when it parses as such, else a string
fn parse_field(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got {}", raw))?;
    if key.is_empty() {
        return Err(format!("empty field name in {}", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings_path = cli.settings.unwrap_or_else(ManagerSettings::default_path);
    let settings = ManagerSettings::load(&settings_path);
    let paths = settings.paths();

    let _log_handle = logging::init_logger(&paths.log_dir(), cli.log_level)
        .context("Failed to initialize logging")?;

    let manager = CoreManager::new(paths);

    match cli.command {
        Commands::Install => {
            let binary = commands::install_core(&manager, &settings)
                .await
                .context("Install failed")?;
            println!("{}", binary.display());
        }
        Commands::Url => {
            let url = xray_manager_lib::xray::provisioner::release_url(&settings)?;
            println!("{}", url);
        }
        Commands::Status => {
            let status = commands::get_core_status(&manager);
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Start => {
            report_start(commands::start_core(&manager).context("Start failed")?);
        }
        Commands::Stop => {
            report_stop(commands::stop_core(&manager).context("Stop failed")?);
        }
        Commands::Restart => {
            let (stopped, started) = commands::restart_core(&manager).context("Restart failed")?;
            report_stop(stopped);
            report_start(started);
        }
        Commands::Run => {
            let outcome = commands::start_core(&manager).context("Start failed")?;
            report_start(outcome);
            if let StartOutcome::Started(_) = outcome {
                let _guard = PidFileGuard::new(manager.paths().pid_file());
                tokio::signal::ctrl_c()
                    .await
                    .context("Failed to listen for Ctrl-C")?;
                log::info!("Interrupted, shutting down");
                report_stop(commands::stop_core(&manager).context("Stop failed")?);
            }
        }
        Commands::Validate { path } => {
            let valid = commands::validate_core_config(&manager, path.as_deref());
            println!("{}", if valid { "valid" } else { "invalid" });
            if !valid {
                std::process::exit(1);
            }
        }
        Commands::ResetConfig => {
            commands::reset_core_config(&manager)?;
            println!("{}", manager.store().path().display());
        }
        Commands::ShowConfig => match commands::get_core_config(&manager) {
            Some(config) => println!("{}", serde_json::to_string_pretty(&config)?),
            None => anyhow::bail!(
                "No readable config at {}",
                manager.store().path().display()
            ),
        },
        Commands::Toggle {
            fields,
            enable,
            disable: _,
        } => {
            let selector: Map<String, Value> = fields.into_iter().collect();
            let ack = commands::patch_outbound(&manager, OutboundToggle::new(selector, enable))?;
            println!("{}", serde_json::to_string(&ack)?);
        }
    }

    Ok(())
}

fn report_start(outcome: StartOutcome) {
    match outcome {
        StartOutcome::Started(pid) => println!("started (pid {})", pid),
        StartOutcome::SkippedNoConfig => println!("skipped: no usable config"),
        StartOutcome::SkippedNoInbound => println!("skipped: config has no inbound port"),
    }
}

fn report_stop(outcome: StopOutcome) {
    match outcome {
        StopOutcome::NotTracked => println!("not running (no PID file)"),
        StopOutcome::Empty => println!("not running (empty PID file)"),
        StopOutcome::Stale(pid) => println!("not running (pid {} already exited)", pid),
        StopOutcome::Signalled(pid) => println!("stopped (pid {})", pid),
    }
}
