use clap::Parser;
use enroll_capture::cli::{self, Args};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = cli::run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
