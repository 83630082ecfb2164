mod api;
mod broadcaster;
mod error;
mod games;
mod matchmaking;
mod server_config;
mod session_manager;
mod store;
mod timers;
mod web_server;
mod ws_handler;

use clap::Parser;

use common::config::{ConfigManager, FileContentConfigProvider};
use common::{log, logger};

use server_config::ServerConfig;
use store::MemoryStore;
use web_server::{WebServerState, run_web_server};

#[derive(Parser)]
#[command(name = "connect_four_server")]
struct Args {
    /// YAML config file; defaults are used when it does not exist
    #[arg(long, default_value = "connect_four_server.yaml")]
    config: String,

    #[arg(long)]
    use_log_prefix: bool,

    /// Overrides `listen_address` from the config file
    #[arg(long)]
    listen: Option<String>,

    /// Print the effective config as YAML and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let prefix = if args.use_log_prefix {
        Some("Server".to_string())
    } else {
        None
    };
    logger::init_logger(prefix);

    let config_manager: ConfigManager<FileContentConfigProvider, ServerConfig> =
        ConfigManager::from_yaml_file(&args.config);
    let mut config = config_manager.get_config()?;
    if let Some(listen) = args.listen {
        config.listen_address = listen;
    }

    if args.print_config {
        print!("{}", config_manager.render(&config)?);
        return Ok(());
    }

    log!("Connect Four server starting with config {}", args.config);

    let state = WebServerState::new(
        MemoryStore::new(),
        config.match_settings(),
        config.leaderboard.default_page_size,
    );
    run_web_server(state, &config).await?;

    Ok(())
}
