//! Video generation worker binary.
//!
//! Reads one generation request as JSON (path argument or stdin), runs it
//! to completion, and prints the job result as JSON.

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vgen_models::GenerationRequest;
use vgen_worker::{Orchestrator, WorkerConfig};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vgen=info".parse().unwrap())
        .add_directive("hyper=warn".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting vgen-worker");

    let request = match read_request() {
        Ok(r) => r,
        Err(e) => {
            error!("Failed to read request: {}", e);
            std::process::exit(2);
        }
    };

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let orchestrator = match Orchestrator::from_env(config).await {
        Ok(o) => o,
        Err(e) => {
            error!("Failed to wire up orchestrator: {}", e);
            std::process::exit(1);
        }
    };

    match orchestrator.run_generation(request).await {
        Ok(result) => {
            let json = serde_json::to_string_pretty(&result)
                .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e));
            println!("{}", json);
        }
        Err(e) => {
            error!("Generation refused: {}", e);
            std::process::exit(1);
        }
    }

    info!("Worker finished");
}

fn read_request() -> Result<GenerationRequest, String> {
    let source = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path)
            .map_err(|e| format!("cannot read {}: {}", path, e))?,
        None => {
            use std::io::Read;
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| format!("cannot read stdin: {}", e))?;
            buf
        }
    };

    serde_json::from_str(&source).map_err(|e| format!("invalid request JSON: {}", e))
}
