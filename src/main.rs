use clap::Parser;
use copilot_chat::backend::{RealtimeClient, SupabaseClient};
use copilot_chat::core::config;
use copilot_chat::core::session::SessionFile;
use copilot_chat::dispatch::Services;
use copilot_chat::inference::GeminiProvider;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::fs::File;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "copilot-chat", about = "Terminal chat with an AI writing copilot")]
struct Args {
    /// Screen to open first, as a path (`/`, `/login`, `/chat`, ...)
    #[arg(short, long)]
    route: Option<String>,

    /// Log file verbosity
    #[arg(long, default_value_t = LevelFilter::Debug)]
    log_level: LevelFilter,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // File logger: the terminal belongs to the UI
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();
    if let Ok(log_file) = File::create("copilot-chat.log") {
        let _ = WriteLogger::init(args.log_level, log_config, log_file);
    }

    let resolved = match config::load_config()
        .and_then(|config| config::resolve(&config, args.route.as_deref()))
    {
        Ok(resolved) => resolved,
        Err(e) => {
            log::error!("Configuration error: {}", e);
            eprintln!("copilot-chat: {e}");
            return ExitCode::FAILURE;
        }
    };
    log::info!(
        "Copilot Chat starting against {} (start route {})",
        resolved.backend_url,
        resolved.start_route.path()
    );

    let http = reqwest::Client::builder()
        .timeout(resolved.request_timeout)
        .build()
        .unwrap_or_else(|e| {
            log::warn!("Falling back to a default HTTP client: {}", e);
            reqwest::Client::new()
        });
    let supabase = Arc::new(SupabaseClient::with_http(
        resolved.backend_url.clone(),
        resolved.anon_key.clone(),
        http,
    ));
    let feed = match RealtimeClient::new(&resolved.backend_url, &resolved.anon_key) {
        Ok(feed) => Arc::new(feed),
        Err(e) => {
            eprintln!("copilot-chat: invalid backend url: {e}");
            return ExitCode::FAILURE;
        }
    };
    let copilot = match GeminiProvider::new(
        resolved.copilot_api_key.clone(),
        resolved.copilot_base_url.clone(),
        resolved.copilot_model.clone(),
        resolved.request_timeout,
    ) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            eprintln!("copilot-chat: {e} (set GEMINI_API_KEY or [copilot] base_url)");
            return ExitCode::FAILURE;
        }
    };

    let services = Services {
        auth: supabase.clone(),
        store: supabase,
        feed,
        copilot,
        session_file: SessionFile::default_location(),
    };

    match copilot_chat::tui::run(&resolved, services) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Terminal error: {}", e);
            eprintln!("copilot-chat: {e}");
            ExitCode::FAILURE
        }
    }
}
