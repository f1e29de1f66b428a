use dostate::config::Config;
use dostate::inventory;
use dostate::modules::{run_module, MODULE_NAMES};

/// Version injected at compile time via DOSTATE_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("DOSTATE_VERSION") {
    Some(v) => v,
    None => "dev",
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Declarative state management for DigitalOcean resources
#[derive(Parser, Debug)]
#[command(name = "dostate", version = VERSION, about, long_about = None)]
struct Args {
    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one module invocation and print its JSON report
    Run {
        /// Module name (see `dostate modules`)
        module: String,

        /// Parameter file (.json, .yml, .yaml); reads stdin when omitted
        #[arg(long)]
        params: Option<PathBuf>,

        /// Check mode: classify and report, but issue no mutation
        #[arg(long)]
        check: bool,
    },

    /// List available modules
    Modules,

    /// Emit a dynamic inventory document from the droplet listing
    Inventory {
        /// Parameter file for token/client overrides
        #[arg(long)]
        params: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

/// Logs go to a file: stdout is reserved for the JSON report.
fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    else {
        eprintln!("warning: could not open log file {log_path:?}, logging disabled");
        return None;
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("dostate started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("dostate").join("dostate.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".dostate").join("dostate.log");
    }
    PathBuf::from("dostate.log")
}

/// Read the parameter object from a file or stdin. YAML is accepted for
/// files with a .yml/.yaml extension, JSON otherwise.
fn read_params(path: Option<&PathBuf>) -> Result<Value> {
    let (raw, is_yaml) = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read params file {path:?}"))?;
            let is_yaml = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yml") | Some("yaml")
            );
            (raw, is_yaml)
        }
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("failed to read params from stdin")?;
            (raw, false)
        }
    };

    if raw.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }

    let value: Value = if is_yaml {
        serde_yaml::from_str(&raw).context("failed to parse YAML params")?
    } else {
        serde_json::from_str(&raw).context("failed to parse JSON params")?
    };

    if !value.is_object() {
        anyhow::bail!("params must be an object");
    }
    Ok(value)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    let config = Config::load();

    match args.command {
        Command::Run {
            module,
            params,
            check,
        } => {
            let params = read_params(params.as_ref())?;
            let report = run_module(&module, &params, check, &config).await;
            println!("{}", serde_json::to_string_pretty(&report.to_json())?);
            if report.is_failure() {
                std::process::exit(1);
            }
        }
        Command::Modules => {
            for name in MODULE_NAMES {
                println!("{name}");
            }
        }
        Command::Inventory { params } => {
            let params = read_params(params.as_ref())?;
            match run_inventory(&params, &config).await {
                Ok(doc) => println!("{}", serde_json::to_string_pretty(&doc)?),
                Err(e) => {
                    let failure = dostate::modules::Report::fail(e);
                    println!("{}", serde_json::to_string_pretty(&failure.to_json())?);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

async fn run_inventory(
    params: &Value,
    config: &Config,
) -> std::result::Result<Value, dostate::digitalocean::error::ErrorShape> {
    use dostate::digitalocean::auth;
    use dostate::digitalocean::client::DoClient;

    let token = auth::resolve_token(params.get("token").and_then(|v| v.as_str()))?;

    let mut opts = config.client_options();
    if let Some(overrides) = params.get("client_override_options") {
        opts.apply_overrides(overrides)?;
    }

    let client = DoClient::new(&token, opts)?;
    inventory::gather(&client).await
}
