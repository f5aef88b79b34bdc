use clap::Parser;
use docqa_cli::{Cli, init_telemetry, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_telemetry(cli.log_format);
    run(cli).await
}
