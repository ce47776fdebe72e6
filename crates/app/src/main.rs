mod args;

use args::{Args, Command};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Some(Command::Version) => {
            println!("{}", serde_json::to_string_pretty(&common::prelude::build_info())?);
        }
        None => {
            service::spawn_service(&args.serve.service_config()).await;
        }
    }

    Ok(())
}
