//! Server configuration and CLI argument parsing
//!
//! Configuration comes from three layers:
//! - Command-line arguments
//! - Environment variables (with GATELIMIT_ prefix)
//! - TOML configuration file (`--config` / `GATELIMIT_CONFIG`)
//!
//! # Configuration Priority
//!
//! The configuration system follows this precedence order:
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Configuration file values
//! 4. Default values (lowest priority)
//!
//! # Example Usage
//!
//! ```bash
//! # Using CLI arguments
//! gatelimit-server --preset api --bind 0.0.0.0:8080
//!
//! # Using environment variables
//! export GATELIMIT_PRESET=strict
//! export GATELIMIT_PROTECT=true
//! gatelimit-server
//!
//! # Mixed (CLI overrides env)
//! export GATELIMIT_MAX_REQUESTS=100
//! gatelimit-server --max-requests 50  # Uses 50
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Result, anyhow};
use clap::Parser;
use gatelimit::{Preset, RateLimitPolicy};
use serde::Deserialize;

use crate::service::{DEFAULT_BUFFER_SIZE, DEFAULT_STORE_CAPACITY};

/// Main configuration structure for the server
///
/// Fully resolved: every knob has its final value after the CLI,
/// environment, file and default layers are folded together.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind: SocketAddr,
    /// Base policy profile
    pub preset: Preset,
    /// Window length override (seconds)
    pub window: Option<u64>,
    /// Per-window admission limit override
    pub max_requests: Option<u32>,
    /// Rejection message override
    pub message: Option<String>,
    /// Emit quota headers on responses
    pub headers: bool,
    /// Use draft `RateLimit-*` headers instead of legacy `X-RateLimit-*`
    pub draft_headers: bool,
    /// Rate limit the service's own endpoints
    pub protect: bool,
    /// Channel buffer size for actor communication
    pub buffer_size: usize,
    /// Idle-key sweep interval (seconds); `None` means one window
    pub sweep_interval: Option<u64>,
    /// Expected number of distinct keys
    pub store_capacity: usize,
    /// Logging level (error, warn, info, debug, trace)
    pub log_level: String,
}

/// Values read from a TOML configuration file
///
/// Everything is optional; missing keys fall through to the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    pub bind: Option<SocketAddr>,
    pub preset: Option<String>,
    pub window: Option<u64>,
    pub max_requests: Option<u32>,
    pub message: Option<String>,
    pub headers: Option<bool>,
    pub draft_headers: Option<bool>,
    pub protect: Option<bool>,
    pub buffer_size: Option<usize>,
    pub sweep_interval: Option<u64>,
    pub store_capacity: Option<usize>,
    pub log_level: Option<String>,
}

impl Settings {
    fn load(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}

/// Command-line arguments for the server
///
/// All arguments can also be set via environment variables with the
/// GATELIMIT_ prefix. CLI arguments take precedence over environment
/// variables; both override values from the configuration file.
///
/// # Examples
///
/// Basic usage with the default `normal` preset:
/// ```bash
/// gatelimit-server
/// ```
///
/// An auth gate on a public interface:
/// ```bash
/// gatelimit-server --preset auth --bind 0.0.0.0:8080
/// ```
///
/// Self-protected with debug logging:
/// ```bash
/// gatelimit-server --protect true --log-level debug
/// ```
#[derive(Parser, Debug)]
#[command(
    name = "gatelimit-server",
    about = "Standalone admission control service",
    long_about = "A standalone admission control service with sliding window rate limiting.\n\nEnvironment variables with GATELIMIT_ prefix are supported. CLI arguments take precedence over environment variables; both override values from the configuration file."
)]
pub struct Args {
    // Server
    #[arg(
        long,
        value_name = "ADDR",
        help = "Bind address [default: 127.0.0.1:8080]",
        env = "GATELIMIT_BIND"
    )]
    pub bind: Option<SocketAddr>,
    #[arg(
        long,
        value_name = "BOOL",
        help = "Rate limit the service's own endpoints [default: false]",
        env = "GATELIMIT_PROTECT"
    )]
    pub protect: Option<bool>,

    // Policy
    #[arg(
        long,
        value_name = "NAME",
        help = "Preset: strict, normal, relaxed, api, auth, search, compute [default: normal]",
        env = "GATELIMIT_PRESET"
    )]
    pub preset: Option<Preset>,
    #[arg(
        long,
        value_name = "SECS",
        help = "Window length override (seconds)",
        env = "GATELIMIT_WINDOW"
    )]
    pub window: Option<u64>,
    #[arg(
        long,
        value_name = "N",
        help = "Per-window admission limit override",
        env = "GATELIMIT_MAX_REQUESTS"
    )]
    pub max_requests: Option<u32>,
    #[arg(
        long,
        value_name = "TEXT",
        help = "Rejection message override",
        env = "GATELIMIT_MESSAGE"
    )]
    pub message: Option<String>,
    #[arg(
        long,
        value_name = "BOOL",
        help = "Emit quota headers [default: true]",
        env = "GATELIMIT_HEADERS"
    )]
    pub headers: Option<bool>,
    #[arg(
        long,
        value_name = "BOOL",
        help = "Use draft RateLimit-* headers [default: false]",
        env = "GATELIMIT_DRAFT_HEADERS"
    )]
    pub draft_headers: Option<bool>,

    // Limiter sizing
    #[arg(
        long,
        value_name = "SIZE",
        help = "Channel buffer size [default: 100000]",
        env = "GATELIMIT_BUFFER_SIZE"
    )]
    pub buffer_size: Option<usize>,
    #[arg(
        long,
        value_name = "SECS",
        help = "Idle-key sweep interval [default: window]",
        env = "GATELIMIT_SWEEP_INTERVAL"
    )]
    pub sweep_interval: Option<u64>,
    #[arg(
        long,
        value_name = "SIZE",
        help = "Expected number of distinct keys [default: 100000]",
        env = "GATELIMIT_STORE_CAPACITY"
    )]
    pub store_capacity: Option<usize>,

    // General options
    #[arg(
        long,
        value_name = "PATH",
        help = "TOML configuration file",
        env = "GATELIMIT_CONFIG"
    )]
    pub config: Option<PathBuf>,
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace [default: info]",
        env = "GATELIMIT_LOG_LEVEL"
    )]
    pub log_level: Option<String>,

    // Utility options
    #[arg(
        long,
        help = "List all environment variables and exit",
        action = clap::ArgAction::SetTrue
    )]
    pub list_env_vars: bool,
}

impl Config {
    /// Build configuration from the file, environment variables and CLI
    /// arguments
    ///
    /// Clap folds the CLI and environment layers (CLI winning); values
    /// still unset fall through to the configuration file and finally to
    /// the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read, names
    /// an unknown preset, or a resolved value fails validation.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        // Handle --list-env-vars
        if args.list_env_vars {
            Self::print_env_vars();
            std::process::exit(0);
        }

        let settings = match &args.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };

        let config = Self::resolve(args, settings)?;
        config.validate()?;
        Ok(config)
    }

    /// The policy the resolved configuration stands for
    ///
    /// Starts from the preset and applies the overrides; a preset's
    /// custom message survives unless explicitly replaced.
    pub fn policy(&self) -> RateLimitPolicy {
        let mut policy = self
            .preset
            .policy()
            .with_headers(self.headers)
            .with_draft_headers(self.draft_headers);

        if let Some(secs) = self.window {
            policy = policy.with_window(Duration::from_secs(secs));
        }
        if let Some(max_requests) = self.max_requests {
            policy = policy.with_max_requests(max_requests);
        }
        if let Some(message) = &self.message {
            policy = policy.with_message(message.clone());
        }

        policy
    }

    fn resolve(args: Args, file: Settings) -> Result<Self> {
        let preset = match args.preset {
            Some(preset) => preset,
            None => file
                .preset
                .as_deref()
                .map(Preset::from_str)
                .transpose()?
                .unwrap_or(Preset::Normal),
        };

        Ok(Config {
            bind: args.bind.or(file.bind).unwrap_or_else(default_bind),
            preset,
            window: args.window.or(file.window),
            max_requests: args.max_requests.or(file.max_requests),
            message: args.message.or(file.message),
            headers: args.headers.or(file.headers).unwrap_or(true),
            draft_headers: args.draft_headers.or(file.draft_headers).unwrap_or(false),
            protect: args.protect.or(file.protect).unwrap_or(false),
            buffer_size: args
                .buffer_size
                .or(file.buffer_size)
                .unwrap_or(DEFAULT_BUFFER_SIZE),
            sweep_interval: args.sweep_interval.or(file.sweep_interval),
            store_capacity: args
                .store_capacity
                .or(file.store_capacity)
                .unwrap_or(DEFAULT_STORE_CAPACITY),
            log_level: args
                .log_level
                .or(file.log_level)
                .unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the resolved configuration
    ///
    /// # Errors
    ///
    /// Returns an error when a zero value would make the limiter
    /// degenerate.
    fn validate(&self) -> Result<()> {
        if self.window == Some(0) {
            return Err(anyhow!("Window must be at least 1 second"));
        }
        if self.max_requests == Some(0) {
            return Err(anyhow!("Max requests must be at least 1"));
        }
        if self.sweep_interval == Some(0) {
            return Err(anyhow!("Sweep interval must be at least 1 second"));
        }
        if self.buffer_size == 0 {
            return Err(anyhow!("Buffer size must be at least 1"));
        }
        if self.store_capacity == 0 {
            return Err(anyhow!("Store capacity must be at least 1"));
        }
        Ok(())
    }

    /// Print all available environment variables and their descriptions
    ///
    /// This is called when the --list-env-vars flag is used.
    fn print_env_vars() {
        println!("Gatelimit Environment Variables");
        println!("===============================");
        println!();
        println!("All environment variables use the GATELIMIT_ prefix.");
        println!("CLI arguments take precedence over environment variables;");
        println!("both override values from the configuration file.");
        println!();

        println!("Server:");
        println!("  GATELIMIT_BIND=<addr>                 Bind address [default: 127.0.0.1:8080]");
        println!(
            "  GATELIMIT_PROTECT=true|false          Rate limit the service's own endpoints [default: false]"
        );
        println!();

        println!("Policy:");
        println!(
            "  GATELIMIT_PRESET=<name>               strict, normal, relaxed, api, auth, search, compute [default: normal]"
        );
        println!("  GATELIMIT_WINDOW=<secs>               Window length override");
        println!("  GATELIMIT_MAX_REQUESTS=<n>            Per-window admission limit override");
        println!("  GATELIMIT_MESSAGE=<text>              Rejection message override");
        println!("  GATELIMIT_HEADERS=true|false          Emit quota headers [default: true]");
        println!(
            "  GATELIMIT_DRAFT_HEADERS=true|false    Use draft RateLimit-* headers [default: false]"
        );
        println!();

        println!("Limiter:");
        println!(
            "  GATELIMIT_BUFFER_SIZE=<size>          Channel buffer size [default: 100000]"
        );
        println!(
            "  GATELIMIT_SWEEP_INTERVAL=<secs>       Idle-key sweep interval [default: window]"
        );
        println!(
            "  GATELIMIT_STORE_CAPACITY=<size>       Expected number of distinct keys [default: 100000]"
        );
        println!();

        println!("General Configuration:");
        println!("  GATELIMIT_CONFIG=<path>               TOML configuration file");
        println!(
            "  GATELIMIT_LOG_LEVEL=<level>           Log level: error, warn, info, debug, trace [default: info]"
        );
        println!();

        println!("Examples:");
        println!("  # Gate login endpoints on a public interface");
        println!("  export GATELIMIT_PRESET=auth");
        println!("  export GATELIMIT_BIND=0.0.0.0:8080");
        println!("  gatelimit-server");
        println!();
        println!("  # Run server (CLI args override env vars)");
        println!("  gatelimit-server --preset api --max-requests 50");
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_args() -> Args {
        Args {
            bind: None,
            protect: None,
            preset: None,
            window: None,
            max_requests: None,
            message: None,
            headers: None,
            draft_headers: None,
            buffer_size: None,
            sweep_interval: None,
            store_capacity: None,
            config: None,
            log_level: None,
            list_env_vars: false,
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::resolve(empty_args(), Settings::default()).unwrap();

        assert_eq!(config.bind, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.preset, Preset::Normal);
        assert_eq!(config.window, None);
        assert_eq!(config.max_requests, None);
        assert!(config.headers);
        assert!(!config.draft_headers);
        assert!(!config.protect);
        assert_eq!(config.buffer_size, 100_000);
        assert_eq!(config.store_capacity, 100_000);
        assert_eq!(config.sweep_interval, None);
        assert_eq!(config.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_args_override_file_values() {
        let args = Args {
            window: Some(30),
            log_level: Some("debug".to_string()),
            ..empty_args()
        };
        let file = Settings {
            window: Some(120),
            max_requests: Some(7),
            log_level: Some("trace".to_string()),
            ..Settings::default()
        };

        let config = Config::resolve(args, file).unwrap();

        assert_eq!(config.window, Some(30));
        assert_eq!(config.log_level, "debug");
        // File values untouched by args flow through
        assert_eq!(config.max_requests, Some(7));
    }

    #[test]
    fn test_file_preset_is_parsed() {
        let file = Settings {
            preset: Some("AUTH".to_string()),
            ..Settings::default()
        };

        let config = Config::resolve(empty_args(), file).unwrap();
        assert_eq!(config.preset, Preset::Auth);

        let bad = Settings {
            preset: Some("burst".to_string()),
            ..Settings::default()
        };
        assert!(Config::resolve(empty_args(), bad).is_err());
    }

    #[test]
    fn test_policy_assembly_keeps_preset_message() {
        let args = Args {
            preset: Some(Preset::Auth),
            max_requests: Some(3),
            headers: Some(false),
            ..empty_args()
        };

        let config = Config::resolve(args, Settings::default()).unwrap();
        let policy = config.policy();

        assert_eq!(policy.window, Duration::from_secs(900));
        assert_eq!(policy.max_requests, 3);
        assert!(!policy.headers);
        // Tightening the limit does not clear the preset's lockout message
        assert_eq!(
            policy.message.as_deref(),
            Some("Too many authentication attempts, please try again later.")
        );
    }

    #[test]
    fn test_message_override_replaces_preset_message() {
        let args = Args {
            preset: Some(Preset::Compute),
            message: Some("Slow down.".to_string()),
            ..empty_args()
        };

        let config = Config::resolve(args, Settings::default()).unwrap();
        assert_eq!(config.policy().message.as_deref(), Some("Slow down."));
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let zero_window = Config {
            window: Some(0),
            ..Config::resolve(empty_args(), Settings::default()).unwrap()
        };
        assert!(zero_window.validate().is_err());

        let zero_buffer = Config {
            buffer_size: 0,
            ..Config::resolve(empty_args(), Settings::default()).unwrap()
        };
        assert!(zero_buffer.validate().is_err());

        let zero_sweep = Config {
            sweep_interval: Some(0),
            ..Config::resolve(empty_args(), Settings::default()).unwrap()
        };
        assert!(zero_sweep.validate().is_err());
    }
}
