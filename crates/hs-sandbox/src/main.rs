use std::process;

use hs_sandbox::{worker, WorkerConfig};

/// Exit status when the control connection cannot be opened.
const CONNECT_FAILURE: i32 = 1;
const USAGE_FAILURE: i32 = 2;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let config = match WorkerConfig::from_args(std::env::args()) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("hs-worker: {error}");
            eprintln!(r#"usage: hs-worker '{{"controlServerPort": <port>, "token": "<token>"}}'"#);
            process::exit(USAGE_FAILURE);
        }
    };

    match worker::run(&config).await {
        Ok(never) => match never {},
        Err(error) => {
            eprintln!("hs-worker: {error}");
            process::exit(CONNECT_FAILURE);
        }
    }
}
