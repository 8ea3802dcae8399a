mod app;
mod controller;
mod theme;
mod ui;

use anyhow::{bail, Context, Result};
use app::App;
use clap::Parser;
use controller::Controller;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use halo_core::run::RunInput;
use halo_relay::{router, AgentClient, RelayState};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{io, net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const QUEUE_CAPACITY: usize = 256;

#[derive(Parser, Debug)]
#[command(name = "halo-overlay")]
struct Args {
    /// Loopback address the relay endpoint binds to.
    #[arg(long, default_value = "")]
    listen: String,
    /// Base URL of the agent server.
    #[arg(long, default_value = "")]
    agent_url: String,
    #[arg(long, default_value_t = 10)]
    http_timeout: u64,
}

#[derive(Clone, Debug)]
struct Config {
    listen: String,
    agent_url: String,
    http_timeout: Duration,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config();
    init_logging();

    let addr: SocketAddr = config
        .listen
        .parse()
        .with_context(|| format!("invalid listen address {}", config.listen))?;
    if !addr.ip().is_loopback() {
        bail!("relay must bind loopback, got {addr}");
    }

    let client = AgentClient::new(&config.agent_url, config.http_timeout)
        .context("building agent client")?;

    // One queue, one consumer: pushes from the relay and user commands
    // both land here and apply in arrival order.
    let (input_tx, mut input_rx) = mpsc::channel::<RunInput>(QUEUE_CAPACITY);
    let (push_tx, mut push_rx) = mpsc::channel(QUEUE_CAPACITY);

    let pump_tx = input_tx.clone();
    tokio::spawn(async move {
        while let Some(event) = push_rx.recv().await {
            if pump_tx.send(RunInput::StatusEvent(event)).await.is_err() {
                return;
            }
        }
    });

    let relay_state = Arc::new(RelayState {
        events: push_tx,
        agent: client.clone(),
    });
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding relay on {addr}"))?;
    info!(event = "relay_start", addr = %addr, agent_url = %config.agent_url);
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router(relay_state)).await {
            warn!(event = "relay_error", error = %err);
        }
    });

    let mut app = App::new(Controller::new(client, input_tx));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let mut events = EventStream::new();

    let result = run_loop(&mut terminal, &mut app, &mut input_rx, &mut events).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    input_rx: &mut mpsc::Receiver<RunInput>,
    events: &mut EventStream,
) -> Result<()> {
    loop {
        terminal.draw(|frame| ui::render(frame, app))?;

        tokio::select! {
            Some(input) = input_rx.recv() => {
                app.apply_input(input);
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) => {
                        if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                            app.handle_key(key);
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(event = "input_error", error = %err);
                    }
                    None => break,
                }
            }
        }

        if app.should_quit() {
            break;
        }
    }
    Ok(())
}

fn load_config() -> Config {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    Config {
        listen: resolve_value(&args.listen, "HALO_RELAY_ADDR", "127.0.0.1:4810"),
        agent_url: resolve_value(&args.agent_url, "HALO_AGENT_URL", "http://127.0.0.1:4820"),
        http_timeout: Duration::from_secs(args.http_timeout),
    }
}

fn resolve_value(flag: &str, env_key: &str, default: &str) -> String {
    if !flag.trim().is_empty() {
        return flag.to_string();
    }
    if let Ok(value) = std::env::var(env_key) {
        if !value.trim().is_empty() {
            return value;
        }
    }
    default.to_string()
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_enabled = matches!(
        std::env::var("HALO_LOG_STDOUT").ok().as_deref(),
        Some("1") | Some("true") | Some("yes")
    );
    // The terminal belongs to the overlay; logs go nowhere unless asked for.
    if stdout_enabled {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::sink)
            .try_init();
    }
}
