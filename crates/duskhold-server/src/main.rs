//! Binary entry point for the Duskhold world server.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;

use duskhold_config::{CliArgs, Config};
use duskhold_net::{
    Dispatcher, FrameConfig, ServerConfig, SessionManager, WorldServer, process_world_queue,
};
use duskhold_registry::{DefinitionTable, HandlerRegistry, OpcodeTable, load_definitions};
use duskhold_server::{DEFAULT_DEFINITIONS, handlers};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    // Resolve config directory
    let config_dir = args
        .config
        .clone()
        .unwrap_or_else(duskhold_config::default_config_dir);

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    // Initialize logging with config and debug settings
    let log_dir = config_dir.join("logs");
    duskhold_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    // Opcode definition table: configured override, or the built-in copy.
    let definitions = match &config.dispatch.definitions_path {
        Some(path) => match DefinitionTable::load(path) {
            Ok(defs) => defs,
            Err(err) => {
                tracing::error!(
                    "Failed to load {}: {err}; falling back to built-in table",
                    path.display()
                );
                builtin_definitions()
            }
        },
        None => builtin_definitions(),
    };

    // The one-time registration step: build the table before anything can
    // read it, then freeze it behind an Arc.
    let mut handler_registry = HandlerRegistry::new();
    handlers::register_default_handlers(&mut handler_registry);
    let mut table = OpcodeTable::new();
    let summary = load_definitions(&mut table, &definitions, &handler_registry);
    tracing::info!(
        registered = summary.registered,
        rejected = summary.rejected.len(),
        "opcode table ready"
    );
    let table = Arc::new(table);

    let sessions = Arc::new(SessionManager::new());

    let bind_addr = format!("{}:{}", config.network.bind_address, config.network.port);
    let bind_addr = match bind_addr.parse() {
        Ok(addr) => addr,
        Err(err) => {
            tracing::error!("Invalid bind address {bind_addr}: {err}");
            std::process::exit(1);
        }
    };

    let (packet_tx, mut packet_rx) = mpsc::channel(config.dispatch.incoming_queue_depth);
    let server = Arc::new(WorldServer::new(
        ServerConfig {
            bind_addr,
            max_connections: config.network.max_connections,
            frame: FrameConfig {
                max_payload_size: config.network.max_payload_bytes,
            },
        },
        Arc::clone(&sessions),
        packet_tx,
    ));
    let connections = Arc::clone(&server.connections);

    let (dispatcher, mut world_rx) = Dispatcher::new(
        Arc::clone(&table),
        Arc::clone(&sessions),
        Arc::clone(&connections),
        config.dispatch.world_queue_depth,
    );

    // Dispatcher task: drains the reader→dispatcher channel.
    tokio::spawn(async move {
        while let Some(packet) = packet_rx.recv().await {
            dispatcher.dispatch(packet).await;
        }
    });

    // World tick: thread-unsafe handlers, grace periods, stale sessions.
    {
        let table = Arc::clone(&table);
        let sessions = Arc::clone(&sessions);
        let connections = Arc::clone(&connections);
        let tick = Duration::from_millis(config.dispatch.world_tick_ms);
        let grace = Duration::from_secs(config.network.logout_grace_secs);
        let timeout = Duration::from_secs(config.network.session_timeout_secs);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                interval.tick().await;
                process_world_queue(&mut world_rx, &table, &sessions, &connections).await;
                sessions.purge_logged_out(grace).await;
                for id in sessions.stale_connections(timeout).await {
                    tracing::warn!("Session {id:?} timed out");
                    sessions.on_disconnect(id).await;
                    connections.remove(&id).await;
                }
            }
        });
    }

    if let Err(err) = server.run().await {
        tracing::error!("World server terminated: {err}");
        std::process::exit(1);
    }
}

fn builtin_definitions() -> DefinitionTable {
    DefinitionTable::from_ron(DEFAULT_DEFINITIONS).unwrap_or_else(|err| {
        eprintln!("Built-in opcode table is invalid: {err}");
        std::process::exit(1);
    })
}
