use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use invterm::cli::{self, Cli, Command};
use invterm::config;
use invterm::reports::ReportWriter;
use invterm::store::InventoryStore;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Command::HashPassword { password }) => {
            return invterm::auth::password::hash_password_cli(password.as_deref());
        }
        Some(Command::CheckConfig) => {
            let cfg = config::load_config(&cli.config)?;
            println!("Configuration is valid.");
            println!("  Listen: {}", cfg.server.listen);
            match &cfg.storage.data_dir {
                Some(dir) => println!("  Data directory: {}", dir.display()),
                None => println!("  Data directory: (in memory)"),
            }
            println!("  Reports: {}", cfg.reports.output_dir.display());
            println!("  Max login attempts: {}", cfg.limits.max_login_attempts);
            return Ok(());
        }
        Some(Command::Serve) | None => {}
        Some(command) => {
            let cfg = config::load_or_default(&cli.config)?;
            let level = cli.log_level.as_deref().unwrap_or("warn");
            invterm::logging::setup_logging(level, cfg.logging.format);
            let Some(dir) = &cfg.storage.data_dir else {
                anyhow::bail!("storage.data_dir must be set to change the inventory offline");
            };
            let store = InventoryStore::open(dir)
                .with_context(|| format!("opening inventory store in {}", dir.display()))?;
            let reports = ReportWriter::new(cfg.reports.output_dir.clone());
            if let Some(message) = cli::apply_store_command(&store, &reports, command)? {
                println!("{}", message);
            }
            return Ok(());
        }
    }

    let app_config = config::load_or_default(&cli.config)?;
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| app_config.logging.level.to_string());
    invterm::logging::setup_logging(&level, app_config.logging.format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %app_config.server.listen,
        "Starting invterm"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        if let Err(e) = invterm::server::run(app_config).await {
            error!(error = %e, "Server error");
            std::process::exit(1);
        }
    });

    Ok(())
}
