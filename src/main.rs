// src/main.rs

use assetdag::{cli, logging};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    let code = match start(args).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("assetdag: {err:?}");
            1
        }
    };
    std::process::exit(code);
}

async fn start(args: cli::CliArgs) -> anyhow::Result<i32> {
    logging::init_logging(args.log_level)?;
    assetdag::run(args).await
}
