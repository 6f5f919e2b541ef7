//! paperchat server entrypoint.
//!
//! Usage:
//!   GEMINI_API_KEY=... paperchat [--bind ADDR:PORT]
//!
//! All other knobs come from PAPERCHAT_* environment variables; see
//! `settings`.

use paperchat::server::{router, AppState};
use paperchat::settings::Settings;

#[tokio::main]
async fn main() {
    // Parse simple args (no clap to keep binary small)
    let args: Vec<String> = std::env::args().collect();
    let mut bind_arg: Option<&str> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" if i + 1 < args.len() => {
                bind_arg = Some(&args[i + 1]);
                i += 2;
            }
            "--help" | "-h" => {
                println!("paperchat - document Q&A HTTP API");
                println!();
                println!("Usage: paperchat [--bind ADDR:PORT]");
                println!();
                println!("Environment variables:");
                println!("  GEMINI_API_KEY               Gemini API key (required)");
                println!("  PAPERCHAT_BIND               Bind address (default: 127.0.0.1:3000)");
                println!("  PAPERCHAT_MODEL              Model name (default: gemini-2.0-flash)");
                println!("  PAPERCHAT_MAX_CONTEXT_CHARS  Document chars sent per prompt (default: 8000)");
                println!("  PAPERCHAT_MAX_OUTPUT_TOKENS  Answer length cap (default: 500)");
                println!("  PAPERCHAT_TEMPERATURE        Generation temperature (default: 0.2)");
                println!("  PAPERCHAT_TIMEOUT_SECS       Upstream request timeout (default: 300)");
                println!("  PAPERCHAT_UPLOAD_DIR         Temp dir for uploads (default: OS temp dir)");
                std::process::exit(0);
            }
            _ => {
                i += 1;
            }
        }
    }

    let settings = match Settings::from_env(bind_arg) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("[Server] {}", e);
            std::process::exit(1);
        }
    };

    println!("[Server] Model: {}", settings.model);
    println!("[Server] Upload dir: {}", settings.upload_dir.display());
    println!("[Server] Binding to: {}", settings.bind_addr);

    let bind_addr = settings.bind_addr.clone();
    let state = match AppState::new(settings) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("[Server] Failed to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let app = router(state);

    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("[Server] Failed to bind to {}: {}", bind_addr, e);
            std::process::exit(1);
        }
    };

    println!("[Server] Listening on {}", bind_addr);
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("[Server] Server error: {}", e);
        std::process::exit(1);
    }
}
