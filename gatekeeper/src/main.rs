use args::Args;
use clap::Parser;
use config::Config;
use server::ServeConfig;

mod args;
mod logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Installed before loading the configuration, so its warnings are visible.
    logger::init(&args);

    let config = args.config()?;

    if let Err(e) = server::serve(serve_config(&args, config)).await {
        log::error!("Server failed to start: {e}");
        std::process::exit(1);
    }

    Ok(())
}

fn serve_config(args: &Args, config: Config) -> ServeConfig {
    let listen_address = args.listen_address.unwrap_or(config.server.listen_address);

    ServeConfig { listen_address, config }
}
