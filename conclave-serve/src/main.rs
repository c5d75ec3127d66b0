//! conclave-serve binary: starts the WebSocket server.

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "conclave-serve")]
#[command(about = "conclave — multi-agent chat backend WebSocket server")]
struct Args {
    /// Address to listen on.
    #[arg(long, value_name = "HOST:PORT")]
    addr: Option<String>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_logging();
    let args = Args::parse();
    conclave_serve::run_serve(args.addr.as_deref(), false).await
}
