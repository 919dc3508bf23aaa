use clap::Parser;

mod cli;
mod loaders;

use cli::args::Cli;
use cli::commands::dispatch;

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fatal: {e:?}");
            aipo_evidence::EXIT_CONFIG_ERROR
        }
    };
    std::process::exit(code);
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_env("AIPO_LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();
}
