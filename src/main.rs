mod cli;
mod commands;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use em_core::config::Config;

async fn start_server(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting enigmamachine");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    em_server::start(config).await?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "enigmamachine=trace,em_server=trace,em_pipeline=trace,em_av=trace,em_db=debug,em_core=debug,tower_http=debug".to_string()
        } else {
            "enigmamachine=info,em_server=info,em_pipeline=info,em_av=info,em_db=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    let config = load_config(cli.config.as_deref(), cli.db);

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(config, host, port))
        }
        Commands::CheckTools => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(check_tools(&config))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("enigmamachine {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Encoder(cmd) => {
            let db = em_server::open_database(&config)?;
            commands::run_encoder(&db, cmd)
        }
        Commands::Video(cmd) => {
            let db = em_server::open_database(&config)?;
            commands::run_video(&db, cmd)
        }
    }
}

fn load_config(path: Option<&Path>, db_override: Option<PathBuf>) -> Config {
    let mut config = Config::load_or_default(path);
    if let Some(db) = db_override {
        config.server.db_path = db;
    }
    config
}

async fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let registry = em_av::ToolRegistry::discover(&config.tools);
    let tools = registry.check_all().await;
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({version})");
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("ffmpeg is missing. Install it or set tools.ffmpeg_path in the config.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let contents = std::fs::read_to_string(p)?;
            let config = Config::from_json(&contents)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Database: {}", config.server.db_path.display());
    println!(
        "  Poll interval: {}s",
        config.scheduler.poll_interval().as_secs()
    );
    match config.scheduler.concurrency_limit() {
        Some(n) => println!("  Max concurrent encodes: {n}"),
        None => println!("  Max concurrent encodes: unbounded"),
    }
    println!("  Progress mode: {:?}", config.pipeline.progress_mode);

    for warning in config.validate() {
        println!("  warning: {warning}");
    }

    Ok(())
}
