use std::process;

use clap::Parser;
use tracing::error;

use youtube_batch_downloader_lib::cli::Args;
use youtube_batch_downloader_lib::{init_logging, run};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args).await {
        error!("Application error: {}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
