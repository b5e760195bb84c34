mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志系统
    ocrun::logger::init_logger(if cli.verbose { "debug" } else { "info" });

    let passed = match cli.command {
        Commands::Run(args) => cli::run(args, cli.verbose).await?,
    };

    if !passed {
        std::process::exit(1);
    }
    Ok(())
}
