//! sigcomp - signal transform and LTI analysis from the command line
//!
//! Every analysis subcommand runs one engine operation and prints the result
//! as JSON on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{debug, info};
use serde::Serialize;
use sigcomp_engine::{EngineError, SignalEngine};
use std::path::PathBuf;

mod config;

use config::{ConfigLoader, SigcompConfig};

#[derive(Parser)]
#[command(
    name = "sigcomp",
    version = env!("CARGO_PKG_VERSION"),
    about = "Laplace transforms, convolution and LTI analysis of signal expressions",
    long_about = r#"
sigcomp evaluates signal and system expressions written in plain text and
prints structured JSON results.

Examples:
  sigcomp properties "y[n] = x[n] + x[n-1]"    # Classify system properties
  sigcomp laplace "exp(-2*t)*u(t)"             # Forward Laplace transform
  sigcomp inverse "1/(s+2)"                    # Inverse transform with derivation steps
  sigcomp inverse "1/(s+2)" --non-causal       # Inverse without the Heaviside(t) factor
  sigcomp convolve "u(t)" "exp(-t)*u(t)"       # Sampled convolution
  sigcomp lti "1/(s^2+3*s+2)"                  # Poles, stability, Bode and step data
  sigcomp config generate --output .sigcomp.yaml
"#,
    after_help = r#"
Environment Variables:
  SIGCOMP_CONFIG=<path>       Path to configuration file
  SIGCOMP_DEBUG=1             Enable debug logging
  SIGCOMP_LOG_LEVEL=debug     Set log level (error, warn, info, debug, trace)
  SIGCOMP_CONV_POINTS=<n>     Samples per signal for convolution (default: 200)
  SIGCOMP_FREQ_POINTS=<n>     Frequency response points (default: 100)
  SIGCOMP_STEP_POINTS=<n>     Step response points (default: 100)
  SIGCOMP_PRETTY=0            Print compact JSON

Exit status is 2 for invalid input and 1 when a result cannot be computed.
"#
)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Set log level
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevel>,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON on a single line
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// Classify linearity, causality, stability, memory and time invariance
    Properties {
        /// System equation, e.g. "y[n] = x[n] + x[n-1]"
        #[arg(allow_hyphen_values = true)]
        equation: String,
    },
    /// One-sided Laplace transform of a time-domain signal
    Laplace {
        /// Expression in t
        #[arg(allow_hyphen_values = true)]
        expression: String,
    },
    /// Inverse Laplace transform by partial fractions
    Inverse {
        /// Expression in s
        #[arg(allow_hyphen_values = true)]
        expression: String,
        /// Do not multiply the result by Heaviside(t)
        #[arg(long)]
        non_causal: bool,
    },
    /// Sampled convolution of two signals
    Convolve {
        /// Input signal x(t)
        #[arg(allow_hyphen_values = true)]
        x: String,
        /// Impulse response h(t)
        #[arg(allow_hyphen_values = true)]
        h: String,
    },
    /// Poles, zeros, stability, DC gain, frequency and step response of H(s)
    Lti {
        /// Transfer function in s
        #[arg(allow_hyphen_values = true)]
        transfer_function: String,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        config_command: ConfigCommand,
    },
    /// Show version information
    Version {
        /// Show detailed build information
        #[arg(long)]
        detailed: bool,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Generate a sample configuration (stdout when no output path is given)
    Generate {
        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("Error: {err:#}");
        std::process::exit(exit_code(&err));
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<EngineError>() {
        Some(engine_err) if engine_err.is_input_error() => 2,
        _ => 1,
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_configuration(&cli)?;
    init_logging(&cli, &config);
    debug!("Configuration loaded: {config:?}");

    let pretty = config.output.pretty && !cli.compact;
    let engine = SignalEngine::with_config(config.engine.clone());

    match cli.command {
        Commands::Properties { equation } => {
            print_json(&engine.classify_system_properties(&equation)?, pretty)
        }
        Commands::Laplace { expression } => {
            print_json(&engine.forward_laplace(&expression)?, pretty)
        }
        Commands::Inverse {
            expression,
            non_causal,
        } => print_json(&engine.inverse_laplace(&expression, !non_causal)?, pretty),
        Commands::Convolve { x, h } => print_json(&engine.convolve(&x, &h)?, pretty),
        Commands::Lti { transfer_function } => {
            print_json(&engine.analyze_lti(&transfer_function)?, pretty)
        }
        Commands::Config { config_command } => execute_config_command(config_command, &config),
        Commands::Version { detailed } => {
            show_version(detailed);
            Ok(())
        }
    }
}

fn load_configuration(cli: &Cli) -> Result<SigcompConfig> {
    match &cli.config {
        Some(path) => {
            if !path.is_file() {
                anyhow::bail!("Specified config file does not exist: {}", path.display());
            }
            ConfigLoader::load_with_file(path)
        }
        None => ConfigLoader::load(),
    }
}

fn init_logging(cli: &Cli, config: &SigcompConfig) {
    let log_level = if cli.debug || config.logging.debug {
        log::LevelFilter::Debug
    } else if let Some(level) = cli.log_level {
        level.into()
    } else {
        config.logging.level.into()
    };

    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .filter_level(log_level)
        .init();
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("Failed to serialize result")?;
    println!("{text}");
    Ok(())
}

fn execute_config_command(config_command: ConfigCommand, config: &SigcompConfig) -> Result<()> {
    match config_command {
        ConfigCommand::Show => {
            let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
            print!("{yaml}");
        }
        ConfigCommand::Generate { output: None } => {
            print!("{}", ConfigLoader::generate_sample_config());
        }
        ConfigCommand::Generate {
            output: Some(output),
        } => {
            ConfigLoader::save_to_file(&SigcompConfig::default(), &output)
                .with_context(|| format!("Failed to write config to {}", output.display()))?;
            info!("Sample configuration generated: {}", output.display());
            println!("Sample configuration generated: {}", output.display());
        }
    }
    Ok(())
}

fn show_version(detailed: bool) {
    println!("sigcomp v{}", env!("CARGO_PKG_VERSION"));

    if detailed {
        println!(
            "Target: {}-{}",
            std::env::consts::ARCH,
            std::env::consts::OS
        );
        println!(
            "Profile: {}",
            if cfg!(debug_assertions) {
                "debug"
            } else {
                "release"
            }
        );
    }
}
