use std::io::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chatlink::client::ChatSocket;
use chatlink::config::TransportConfig;
use chatlink::endpoint::{ApiVersion, Endpoint};
use chatlink::handlers::EventHandlers;
use chatlink::logging;
use chatlink::protocol::InboundEvent;
use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};

// ── API versions ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ApiVersionArg {
    V1,
    V2,
}

impl From<ApiVersionArg> for ApiVersion {
    fn from(value: ApiVersionArg) -> Self {
        match value {
            ApiVersionArg::V1 => ApiVersion::V1,
            ApiVersionArg::V2 => ApiVersion::V2,
        }
    }
}

// ── CLI ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "chatlink",
    version,
    about = "chatlink — interactive client for the chat WebSocket API"
)]
struct Cli {
    /// Conversation to join
    #[arg(value_name = "CONVERSATION_ID")]
    conversation_id: String,
    /// HTTP(S) or WS(S) base URL of the chat server
    #[arg(
        long,
        env = "CHATLINK_BASE_URL",
        value_name = "URL",
        default_value = "http://127.0.0.1:8000"
    )]
    base_url: String,
    /// Short-lived session token
    #[arg(long, env = "CHATLINK_TOKEN", value_name = "TOKEN")]
    token: String,
    /// Long-lived authorization token
    #[arg(long, env = "CHATLINK_AUTHORIZATION_TOKEN", value_name = "TOKEN")]
    authorization_token: Option<String>,
    /// Chat API version
    #[arg(long, value_enum, default_value_t = ApiVersionArg::V1)]
    api_version: ApiVersionArg,
    /// API key forwarded with each message
    #[arg(long, value_name = "KEY")]
    api_key: Option<String>,
    /// TOML file with transport timing overrides
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn render_event(event: InboundEvent) {
    match event {
        InboundEvent::AssistantTyping { status } => {
            if status {
                println!("* assistant is typing");
            }
        }
        InboundEvent::AssistantMessageChunk { chunk } => {
            print!("{chunk}");
            let _ = std::io::stdout().flush();
        }
        InboundEvent::AssistantMessageComplete { message } => {
            println!();
            println!("[{} in {} ms]", message.model_used, message.response_time_ms);
        }
        InboundEvent::Error { error } => {
            eprintln!("* server error: {error}");
        }
        // Our own echo and keep-alive answers add nothing on a terminal.
        InboundEvent::UserMessage { .. } | InboundEvent::Pong => {}
        InboundEvent::Application { event_type, .. } => {
            println!("* event: {event_type}");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_from_env();

    let config = TransportConfig::load(cli.config.clone())?;
    let endpoint = Endpoint::new(
        &cli.base_url,
        cli.conversation_id.clone(),
        cli.token.clone(),
        cli.authorization_token.clone(),
        cli.api_version.into(),
    )?;

    let handlers = EventHandlers::new()
        .on_open(|| println!("* connected"))
        .on_message(render_event)
        .on_error(|description| eprintln!("* transport error: {description}"))
        .on_close(|event| println!("* closed ({} {})", event.code, event.reason));

    let socket = ChatSocket::new(endpoint, handlers, config);
    socket.connect();

    println!("type a message and press enter; /quit to exit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line? {
                None => break,
                Some(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if line == "/quit" {
                        break;
                    }
                    if let Err(err) = socket.send_message(line, cli.api_key.clone()) {
                        eprintln!("* not sent: {err}");
                    }
                }
            },
        }
    }

    socket.close();
    // Let the close handshake flush before the runtime tears down.
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}
