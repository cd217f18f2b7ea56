use std::process::ExitCode;
use vnet::cli::initialize_from_arguments;

#[tokio::main]
async fn main() -> ExitCode {
    println!("vnet v{}", env!("CARGO_PKG_VERSION"));
    initialize_from_arguments().await
}
