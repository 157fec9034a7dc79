mod cli;
mod logging;
mod progress;

#[tokio::main]
async fn main() {
    // Initialize logging before anything can emit events.
    logging::init_logging_stderr();

    if let Err(err) = cli::run_from_args().await {
        eprintln!("vkserial error: {:#}", err);
        std::process::exit(1);
    }
}
