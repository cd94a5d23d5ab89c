//! live-serve binary entry point.

use std::process::ExitCode;

use live_serve::cli::{self, Args};
use live_serve::config::Config;
use live_serve::{logging, SessionController};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("Run 'live-serve --help' for usage.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(&args)?;

    // A second subscriber only happens in tests; keep going without it.
    let _ = logging::init_with_level(config.log_filter());

    info!("live-serve v{}", env!("CARGO_PKG_VERSION"));

    let workspace = std::env::current_dir()?;
    let controller = SessionController::new(workspace);

    let info = controller.go_live(config.to_live_options()?).await?;
    info!(root = %info.root.display(), "Serving at {}", info.url());
    println!("Serving {} at {}", info.root.display(), info.url());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    controller.go_offline().await?;
    Ok(())
}
