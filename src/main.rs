use std::process;

use anyhow::{Context, Result};
use authgate::config::GatewayConfig;
use authgate::paths::ConfigArgs;
use clap::Parser;
use log::{error, info};

/// Policy enforcement gateway for content APIs.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct GatewayArgs {
    /// Print gateway configuration data (JSON) and exit.
    #[arg(long)]
    pub print_config: bool,

    #[command(flatten)]
    pub config: ConfigArgs,
}

async fn run(args: GatewayArgs) -> Result<()> {
    let cfg: GatewayConfig = args.config.load("gateway")?;

    if args.print_config {
        let json = serde_json::to_string_pretty(&cfg).context("encode config")?;
        println!("{json}");
        return Ok(());
    }

    cfg.logs.init("gateway")?;

    let ctx = cfg.build_ctx()?;
    let restful_server = cfg.build_restful_server(ctx)?;

    restful_server.run().await.context("run restful server")?;

    info!("Gateway exited by user");
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = GatewayArgs::parse();
    match run(args).await {
        Ok(()) => {}
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
