use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    trailscan_cli::main_entry().await
}
