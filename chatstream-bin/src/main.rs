use std::io::{self, Write};
use std::path::PathBuf;

use chatstream_core::{
    ChatStreamError, Config, Message, Session, SessionEvent, SessionOptions, WireFormat,
};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "chatstream decoder CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a chat response body (prints content as it grows)
    Decode {
        #[arg(short, long, help = "Body file; stdin when omitted")]
        input: Option<PathBuf>,
        #[arg(short, long, help = "plain | prefixed | provider-line")]
        format: Option<WireFormat>,
        #[arg(short, long, help = "Config file (JSON or TOML)")]
        config: Option<PathBuf>,
        #[arg(long, help = "Print the final message and data as JSON")]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Decode {
            input,
            format,
            config,
            json,
        } => {
            let cfg = match config {
                Some(path) => Config::from_path(path)?,
                None => Config::default(),
            };
            init_tracing(&cfg);

            let reader: Box<dyn AsyncRead + Send + Unpin> = match input {
                Some(path) => Box::new(tokio::fs::File::open(path).await?),
                None => Box::new(tokio::io::stdin()),
            };
            let body = ReaderStream::new(reader)
                .map(|r| r.map_err(|e| ChatStreamError::Transport(e.to_string())));

            let format = format.unwrap_or(cfg.stream.default_format);
            let options = SessionOptions {
                format: Some(format),
                ..cfg.session_options()
            };
            let mut session = Session::from_stream(body, options);

            let stop = session.stop_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupt received, stopping");
                    stop.stop();
                }
            });

            let mut printed = String::new();
            while let Some(ev) = session.next_event().await {
                match ev {
                    SessionEvent::Snapshot(snapshot) => {
                        if json {
                            continue;
                        }
                        if let Some(draft) = snapshot.draft() {
                            print_growth(&mut printed, &draft.content);
                        }
                    }
                    SessionEvent::Finished { message, data } => {
                        report(&printed, &message, &data, json)?;
                    }
                    SessionEvent::Cancelled { message, data } => {
                        report(&printed, &message, &data, json)?;
                        eprintln!("[cancelled]");
                    }
                    SessionEvent::Failed { error, published } => {
                        if !printed.is_empty() {
                            println!();
                        }
                        anyhow::bail!("decode failed (partial output: {published}): {error}");
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(())
}

fn init_tracing(cfg: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.logging.filter.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Content is cumulative; print only what was not printed yet.
fn print_growth(printed: &mut String, content: &str) {
    match content.strip_prefix(printed.as_str()) {
        Some(rest) if !rest.is_empty() => {
            print!("{rest}");
            printed.push_str(rest);
        }
        Some(_) => {}
        None => {
            // not an extension of what is on screen; start over on a new line
            println!();
            print!("{content}");
            *printed = content.to_string();
        }
    }
    io::stdout().flush().ok();
}

fn report(printed: &str, message: &Message, data: &[serde_json::Value], json: bool) -> anyhow::Result<()> {
    if json {
        let out = serde_json::json!({ "message": message, "data": data });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    let mut printed = printed.to_string();
    print_growth(&mut printed, &message.content);
    if !printed.is_empty() {
        println!();
    }
    if let Some(fc) = message.function_call.as_ref().and_then(|s| s.as_complete()) {
        println!("[function_call: {}({})]", fc.name, fc.arguments);
    }
    if !data.is_empty() {
        println!("[data: {}]", serde_json::to_string(data)?);
    }
    Ok(())
}
