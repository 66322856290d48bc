use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

mod bridge;
mod config;
mod device;
mod dispatch;
mod error;
mod firebase;
mod session;
mod timer;

use config::Config;
use dispatch::{Dispatcher, Intervals};
use firebase::{Endpoints, FirebaseClient};
use session::Session;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let device = device::identity(config.device_id.as_deref());
    info!("Board id: {}", device);

    let endpoints = Endpoints::new(&config.firebase_url, config.firebase_auth.clone())?;
    let remote = Arc::new(FirebaseClient::new(
        config.connect_timeout(),
        config.http_timeout(),
    )?);
    let channel =
        bridge::select_channel(config.channel, &config.bridge_addr, config.connect_timeout())
            .await;

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                let _ = stop_tx.send(true);
            }
            Err(e) => error!("Cannot listen for Ctrl-C: {}", e),
        }
    });

    let dispatcher = Dispatcher::new(
        Session::new(device),
        endpoints,
        remote,
        channel,
        Intervals::from(&config),
    );
    dispatcher.run(stop_rx).await;

    Ok(())
}
