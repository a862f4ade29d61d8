use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use filedrop_backend::{build_app, logging::init_tracing, AppState};
use filedrop_shared::AddrInfo;

use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = filedrop_backend::cli::CliOpts::parse();

    init_tracing(cli.debug);
    debug!("Starting with {:?}", cli);

    let shared_state = Arc::new(AppState::new(&cli));
    if let Some(path) = shared_state.service.store().db_path() {
        info!("Storing files in {}", path.display());
    }

    let addrinfo = AddrInfo::from_env();

    let app: axum::Router = build_app(&shared_state, &cli.cors_origin);

    let listener = match tokio::net::TcpListener::bind(&addrinfo.as_addr()).await {
        Ok(val) => {
            info!("Listening on {}", addrinfo.as_url());
            val
        }
        Err(err) => {
            error!("Failed to bind to {}: {:?}", addrinfo.as_url(), err);
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = axum::serve(listener, app).await {
        error!("Server error: {:?}", err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
