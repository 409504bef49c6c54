mod args;
mod file_state;
mod logging;
mod notifier;
mod op;
mod ops;
mod services;
mod state;
mod version;

use args::Args;
use clap::{Parser, Subcommand};
use op::Op;
use ops::{Fetch, Init, Object, Shares, Version};
use state::{AppConfig, AppState};

command_enum! {
    (Init, Init),
    (Version, Version),
    (Share, Shares),
    (Object, Object),
    (Fetch, Fetch),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let ctx = op::OpContext::new(args.config_path);

    // before init there is no config yet, log with the defaults
    let config = AppState::load(ctx.config_path.clone())
        .map(|state| state.config)
        .unwrap_or_else(|_| AppConfig::default());
    let guards = logging::init_logging(&config);

    let code = match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => {
            tracing::debug!("command failed: {:?}", e);
            eprintln!("Error: {}", e);
            1
        }
    };

    // flush pending log lines
    drop(guards);
    std::process::exit(code);
}
