use clap::Parser;
use std::io::IsTerminal;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ftplayback::{PlaybackError, PlaybackSession, Preflight, TcpBufferClient};

mod cli;

use cli::Cli;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version are reported as errors too, but go to stdout
            let _ = e.print();
            return if e.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS };
        }
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let suggestions = e.recovery_suggestions();
            error!("{:#}", anyhow::Error::from(e));
            for suggestion in suggestions {
                info!("  - {}", suggestion);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), PlaybackError> {
    let config = cli.playback_config()?;

    let mut session = PlaybackSession::load(&cli.directory)?;
    if session.preflight()? == Preflight::NothingToPlay {
        return Ok(());
    }

    info!("Trying to connect to {}:{}...", config.host, config.port);
    let mut client = TcpBufferClient::connect(&config.host, config.port).await?;

    session.play(&mut client, &config).await?;

    client.close().await
}
