//! Chatline CLI entry point: a terminal front end over the dispatch engine.

use anyhow::Context as _;
use chatline::config::Config;
use chatline::dispatch::{DispatchEngine, Disposition, EngineEvent, SubmissionId, TokioPacer};
use chatline::gateway::{GatewayClient, HttpGateway};
use chatline::session::{FileStorage, MemoryStorage, Session, SessionStorage};
use chatline::{Message, Origin, markdown};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser)]
#[command(name = "chatline")]
#[command(about = "Chat with a remote reply service from the terminal")]
struct Cli {
    /// Path to config file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Write logs to daily files in this directory instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Persist the session to this JSON file so it survives restarts
    #[arg(long)]
    session_file: Option<PathBuf>,

    /// Reply service endpoint, overrides the config
    #[arg(long)]
    endpoint: Option<String>,

    /// Print agent replies as rendered HTML
    #[arg(long)]
    html: bool,
}

type Engine = DispatchEngine<HttpGateway, TokioPacer>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.log_dir {
        Some(log_dir) => chatline::logging::init_file_tracing(log_dir, cli.debug),
        None => chatline::logging::init_terminal_tracing(cli.debug),
    }

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(endpoint) = cli.endpoint {
        config.gateway.endpoint = Some(endpoint);
    }

    let storage: Arc<dyn SessionStorage> = match &cli.session_file {
        Some(path) => Arc::new(FileStorage::open(path.clone())),
        None => Arc::new(MemoryStorage::new()),
    };
    let session = Session::open(storage, config.storage.clone());

    let gateway = HttpGateway::new(&config.gateway)
        .with_context(|| "reply service endpoint is not configured (set CHATLINE_GATEWAY_URL or pass --endpoint)")?;
    tracing::info!(endpoint = %gateway.endpoint(), session_id = %session.id(), "chatline started");

    let engine: Engine = DispatchEngine::new(
        session,
        GatewayClient::new(gateway, &config),
        TokioPacer,
        &config,
    );

    for message in engine.messages() {
        print_message(&message, cli.html);
    }
    print_quick_questions(&engine);

    let printer = tokio::spawn(print_events(engine.subscribe(), cli.html));

    tokio::select! {
        result = read_input(&engine) => {
            result?;
            engine.wait_idle().await;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    printer.abort();
    tracing::info!("chatline stopped");
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<Config> {
    if let Some(path) = path {
        return Config::load_from_path(path)
            .with_context(|| format!("failed to load config from {}", path.display()));
    }

    match Config::default_path().filter(|path| path.exists()) {
        Some(path) => Config::load_from_path(&path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Config::load().with_context(|| "failed to load configuration from environment"),
    }
}

async fn read_input(engine: &Engine) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let line = line.trim();
        let (command, argument) = match line.split_once(' ') {
            Some((command, argument)) => (command, argument.trim()),
            None => (line, ""),
        };

        match command {
            "/quit" => break,
            "/history" => {
                for message in engine.messages() {
                    print_message(&message, false);
                }
            }
            "/quick" if argument.is_empty() => print_quick_questions(engine),
            "/quick" => match argument.parse::<usize>() {
                Ok(number) if number > 0 => {
                    match engine.submit_quick_question(number - 1) {
                        Some(submission) => report(submission.id, submission.disposition),
                        None => println!("no quick question #{number}"),
                    }
                }
                _ => println!("usage: /quick [number]"),
            },
            "/queue" => {
                let pending = engine.pending();
                if pending.is_empty() {
                    println!("nothing queued");
                }
                for (id, text) in pending {
                    println!("{id} {text}");
                }
            }
            "/cancel" => match argument.trim_start_matches('#').parse::<u64>() {
                Ok(id) if engine.cancel_queued(SubmissionId(id)) => println!("cancelled #{id}"),
                Ok(id) => println!("#{id} is not queued"),
                Err(_) => println!("usage: /cancel <id>"),
            },
            _ => {
                if let Some(submission) = engine.submit(line) {
                    report(submission.id, submission.disposition);
                }
            }
        }
    }

    Ok(())
}

async fn print_events(mut events: broadcast::Receiver<EngineEvent>, html: bool) {
    loop {
        match events.recv().await {
            Ok(EngineEvent::MessageAppended(message)) if message.origin == Origin::Agent => {
                print_message(&message, html);
            }
            Ok(EngineEvent::TypingChanged(Some(status))) => println!("  ... {status}"),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "terminal fell behind engine events");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn report(id: SubmissionId, disposition: Disposition) {
    if disposition == Disposition::Queued {
        println!("  (queued as {id}, /cancel {} to withdraw)", id.0);
    }
}

fn print_message(message: &Message, html: bool) {
    let speaker = match message.origin {
        Origin::User => "you",
        Origin::Agent => "agent",
    };
    let text = if html && message.origin == Origin::Agent {
        markdown::render(&message.text)
    } else {
        message.text.clone()
    };
    println!("[{}] {speaker}: {text}", message.time_label());
}

fn print_quick_questions(engine: &Engine) {
    for (index, question) in engine.quick_questions().iter().enumerate() {
        println!("  /quick {} -> {question}", index + 1);
    }
}
