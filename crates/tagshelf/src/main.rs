use std::process::ExitCode;

use tagshelf::{Config, Server};

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(error) => {
            log::error!("invalid configuration: {error}");
            return ExitCode::FAILURE;
        }
    };

    let mut server = match Server::from_config(&config).await {
        Ok(server) => server,
        Err(error) => {
            log::error!("failed to start server: {error}");
            return ExitCode::FAILURE;
        }
    };
    log::info!("tagshelf listening on http://{}", server.addr());

    if let Err(error) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {error}");
    }
    log::info!("shutting down");
    if let Err(error) = server.shutdown() {
        log::warn!("{error}");
    }
    ExitCode::SUCCESS
}
