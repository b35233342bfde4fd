use anyhow::Result;
use clap::Parser;

use filewatch_daemon::cli::DaemonCli;
use filewatch_daemon::logging::init_tracing;
use filewatch_daemon::orchestrator::{ConfigOrigin, Orchestrator, load_config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // 설정 로드: 파일 -> 환경변수 -> CLI
    let (mut config, origin) = load_config(cli.config.as_deref()).await?;
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if cli.validate {
        match &origin {
            ConfigOrigin::File(path) => println!("configuration is valid: {}", path.display()),
            ConfigOrigin::Defaults(_) => println!("configuration is valid: built-in defaults"),
        }
        return Ok(());
    }

    init_tracing(&config.general)?;

    match &origin {
        ConfigOrigin::File(path) => {
            tracing::info!(path = %path.display(), "configuration loaded")
        }
        ConfigOrigin::Defaults(path) => tracing::warn!(
            path = %path.display(),
            "config file not found, using built-in defaults"
        ),
    }
    tracing::info!("filewatch-daemon starting");

    let mut orchestrator = Orchestrator::build_from_config(config)?;
    orchestrator.run().await?;

    tracing::info!("filewatch-daemon shut down");
    Ok(())
}
