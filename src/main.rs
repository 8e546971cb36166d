//! Trellis server binary.
//!
//! Process boundary: parse the CLI, initialize logging, load and validate
//! the configuration, compile the route table, bind, serve until
//! signaled, drain, exit. Any startup failure (config, compile, bind)
//! exits non-zero before traffic is accepted.
//!
//! Applications embed the `trellis` crate as a library and register their
//! own endpoints; this binary ships only the built-in liveness endpoint.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use trellis::observability::{logging, metrics};
use trellis::{Endpoint, Endpoints, Reply, Server, ServerConfig, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "trellis", about = "REST server with a compile-time route table")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured bind address (host:port).
    #[arg(long)]
    bind: Option<String>,
}

fn builtin_endpoints() -> Endpoints {
    Endpoints::new().mount(Endpoint::get("/status", |_args| async {
        Ok(Reply::json(serde_json::json!({ "status": "ok" })))
    }))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match trellis::config::load_config(path) {
            Ok(config) => config,
            Err(e) => {
                // Logging is not up yet; stderr is all we have.
                eprintln!("trellis: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability.log_filter);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        handler_workers = config.handler_pool.workers,
        "configuration loaded"
    );

    let table = match builtin_endpoints().compile() {
        Ok(table) => table,
        Err(e) => {
            tracing::error!(error = %e, "route compilation failed");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(routes = table.len(), "route table compiled");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => {
                tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    "failed to parse metrics address"
                );
            }
        }
    }

    let server = match Server::bind(&config, table, Default::default()).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    let signals = trellis::lifecycle::signals::shutdown_on_signal(&shutdown);

    let run = server.run(&shutdown);
    tokio::pin!(run);

    let result = tokio::select! {
        res = &mut run => res,
        _ = signals => {
            // Shutdown already triggered; let the server drain.
            run.await
        }
    };

    match result {
        Ok(()) => {
            tracing::info!("shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "server error");
            ExitCode::FAILURE
        }
    }
}
