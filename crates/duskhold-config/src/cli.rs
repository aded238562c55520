//! Command-line argument parsing for the Duskhold world server.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Duskhold world-server command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "duskhold", about = "Duskhold world server")]
pub struct CliArgs {
    /// Bind address.
    #[arg(long)]
    pub bind: Option<String>,

    /// World server port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Maximum concurrent connections.
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// World tick interval in milliseconds.
    #[arg(long)]
    pub tick_ms: Option<u64>,

    /// Path to an opcode definition file overriding the built-in table.
    #[arg(long)]
    pub definitions: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref bind) = args.bind {
            self.network.bind_address = bind.clone();
        }
        if let Some(port) = args.port {
            self.network.port = port;
        }
        if let Some(max) = args.max_connections {
            self.network.max_connections = max;
        }
        if let Some(tick) = args.tick_ms {
            self.dispatch.world_tick_ms = tick;
        }
        if let Some(ref path) = args.definitions {
            self.dispatch.definitions_path = Some(path.clone());
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            bind: Some("10.0.0.5".to_string()),
            port: Some(9100),
            max_connections: None,
            tick_ms: None,
            definitions: None,
            log_level: Some("debug".to_string()),
            config: None,
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.network.bind_address, "10.0.0.5");
        assert_eq!(config.network.port, 9100);
        assert_eq!(config.debug.log_level, "debug");
        // Non-overridden fields retain defaults
        assert_eq!(config.network.max_connections, 1024);
        assert_eq!(config.dispatch.world_tick_ms, 50);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        let args = CliArgs {
            bind: None,
            port: None,
            max_connections: None,
            tick_ms: None,
            definitions: None,
            log_level: None,
            config: None,
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config, original);
    }
}
