use std::process;

use clap::{Arg, Command};
use log::{error, info};
use tokio::signal;

mod config;
mod daemon;
mod engine;
mod view;

use config::Config;
use daemon::Daemon;

#[tokio::main]
async fn main() {
    env_logger::init();

    let matches = Command::new("fmeshd")
        .version("0.1.0")
        .about("fmesh node agent - announces liveness and file inventory to the rendezvous server")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/etc/fmesh/fmeshd.conf"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").unwrap();

    info!("Starting fmesh node agent");
    info!("Config file: {}", config_path);

    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            process::exit(1);
        }
    };

    let mut daemon = Daemon::new(config);

    if let Err(e) = daemon.start().await {
        error!("Failed to start node agent: {:#}", e);
        process::exit(1);
    }

    info!("fmesh node agent started");

    signal::ctrl_c().await.expect("Failed to listen for ctrl+c");

    info!("Shutting down fmesh node agent");
    daemon.stop();
}
