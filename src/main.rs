use std::env;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use geoguardian::cli;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args: Vec<String> = env::args().collect();
    let code = cli::run_with_args(&args).await;
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
